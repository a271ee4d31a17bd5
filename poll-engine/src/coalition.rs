//! Coalition arithmetic over any poll-like result.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

use crate::party::PartyId;
use crate::poll::{ordered_shares, PollResult};
use crate::pollster::PollsterSource;

/// Minimum share for a party to win seats.
pub const THRESHOLD: f64 = 0.05;

/// A poll seen through a candidate governing coalition.
///
/// Only parties clearing [`THRESHOLD`] take part. Their shares are
/// renormalized over the participating total, so coalition and opposition
/// percentages always add up to one (or are both zero).
pub struct Coalition<'a, P: PollResult + ?Sized> {
    poll: &'a P,
    coalition: Vec<PartyId>,
    opposition: Vec<PartyId>,
    shares: HashMap<PartyId, f64>,
    coalition_percentage: f64,
    opposition_percentage: f64,
}

impl<'a, P: PollResult + ?Sized> Coalition<'a, P> {
    /// Split `poll` into `parties` and everyone else. "Other" is never a
    /// coalition member, even when listed.
    pub fn new(poll: &'a P, parties: &[PartyId]) -> Self {
        let mut coalition: Vec<(PartyId, f64)> = Vec::new();
        let mut opposition: Vec<(PartyId, f64)> = Vec::new();

        for (party, share) in poll.shares() {
            if share < THRESHOLD {
                continue;
            }
            if party != PartyId::OTHER && parties.contains(&party) {
                coalition.push((party, share));
            } else {
                opposition.push((party, share));
            }
        }

        // Stable sort keeps registry order among equal shares
        coalition.sort_by(|a, b| b.1.total_cmp(&a.1));
        opposition.sort_by(|a, b| b.1.total_cmp(&a.1));

        let total: f64 = coalition.iter().chain(&opposition).map(|(_, s)| s).sum();

        let shares: HashMap<PartyId, f64> = coalition
            .iter()
            .chain(&opposition)
            .map(|&(party, share)| {
                let renormalized = if total > 0.0 { share / total } else { 0.0 };
                (party, renormalized)
            })
            .collect();

        let coalition_percentage: f64 = coalition.iter().map(|(p, _)| shares[p]).sum();
        let opposition_percentage = if total > 0.0 {
            1.0 - coalition_percentage
        } else {
            0.0
        };

        Self {
            poll,
            coalition: coalition.into_iter().map(|(p, _)| p).collect(),
            opposition: opposition.into_iter().map(|(p, _)| p).collect(),
            shares,
            coalition_percentage,
            opposition_percentage,
        }
    }

    /// Every minimal majority of at most `max_parties` members.
    ///
    /// Candidates are the parties clearing the threshold, "Other" excluded.
    /// A majority is minimal when dropping any member loses it. Results are
    /// ordered by descending coalition percentage.
    pub fn majorities(poll: &'a P, max_parties: usize) -> Vec<Self> {
        let participating: Vec<(PartyId, f64)> = poll
            .shares()
            .into_iter()
            .filter(|&(_, share)| share >= THRESHOLD)
            .collect();
        let total: f64 = participating.iter().map(|(_, s)| s).sum();
        if total <= 0.0 {
            return Vec::new();
        }

        let candidates: Vec<(PartyId, f64)> = participating
            .into_iter()
            .filter(|(party, _)| *party != PartyId::OTHER)
            .collect();
        let half = total / 2.0;

        let mut found: Vec<Self> = Vec::new();
        for mask in 1u32..(1u32 << candidates.len()) {
            if mask.count_ones() as usize > max_parties {
                continue;
            }

            let members: Vec<(PartyId, f64)> = candidates
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, c)| *c)
                .collect();
            let sum: f64 = members.iter().map(|(_, s)| s).sum();
            let smallest = members.iter().map(|(_, s)| *s).fold(f64::INFINITY, f64::min);

            if sum > half && sum - smallest <= half {
                let ids: Vec<PartyId> = members.iter().map(|(p, _)| *p).collect();
                found.push(Self::new(poll, &ids));
            }
        }

        found.sort_by(|a, b| b.coalition_percentage.total_cmp(&a.coalition_percentage));
        found
    }

    /// The underlying poll.
    pub fn poll(&self) -> &'a P {
        self.poll
    }

    /// Coalition members clearing the threshold, by descending share.
    pub fn coalition_parties(&self) -> &[PartyId] {
        &self.coalition
    }

    /// Parties outside the coalition clearing the threshold, by descending share.
    pub fn opposition_parties(&self) -> &[PartyId] {
        &self.opposition
    }

    pub fn coalition_percentage(&self) -> f64 {
        self.coalition_percentage
    }

    pub fn opposition_percentage(&self) -> f64 {
        self.opposition_percentage
    }

    pub fn has_majority(&self) -> bool {
        self.coalition_percentage > 0.5
    }
}

impl<P: PollResult + ?Sized> PollResult for Coalition<'_, P> {
    fn date(&self) -> NaiveDate {
        self.poll.date()
    }

    fn source(&self) -> PollsterSource {
        self.poll.source()
    }

    fn share(&self, party: PartyId) -> f64 {
        self.shares.get(&party).copied().unwrap_or(0.0)
    }

    fn shares(&self) -> Vec<(PartyId, f64)> {
        ordered_shares(&self.shares)
    }

    /// Largest coalition member by its original share.
    fn strongest_party(&self) -> Option<PartyId> {
        self.coalition.first().copied()
    }
}

impl<P: PollResult + ?Sized> PartialEq for Coalition<'_, P> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.poll, other.poll) && self.coalition == other.coalition
    }
}

impl<P: PollResult + ?Sized> fmt::Debug for Coalition<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coalition")
            .field("date", &self.poll.date())
            .field("coalition", &self.coalition)
            .field("opposition", &self.opposition)
            .field("coalition_percentage", &self.coalition_percentage)
            .finish()
    }
}

//! Poll records.
//!
//! A [`RawPoll`] is a single pollster's result for one date, either
//! nation-wide or scoped to one region. It is normalized once, at
//! construction, so that its shares sum to one, and never changes afterwards.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use crate::party::{Party, PartyId};
use crate::pollster::PollsterSource;
use crate::region::Region;

/// Tolerance under which a share total counts as exactly one.
pub const SHARE_EPSILON: f64 = 1e-9;

// ============================================================================
// Poll-like results
// ============================================================================

/// Common surface of every poll-like result: raw polls, composites and
/// coalition views.
pub trait PollResult {
    /// Date the result describes.
    fn date(&self) -> NaiveDate;

    /// Institute behind the result.
    fn source(&self) -> PollsterSource;

    /// Share of `party`, as a fraction. Parties without a value are 0.
    fn share(&self, party: PartyId) -> f64;

    /// Every party with a value, in registry order.
    fn shares(&self) -> Vec<(PartyId, f64)>;

    /// Party with the largest share; the first in registry order wins ties.
    fn strongest_party(&self) -> Option<PartyId> {
        strongest(self.shares())
    }
}

/// Arg-max over `(party, share)` pairs, keeping the earliest on ties.
/// Returns `None` when nothing has a positive share.
pub(crate) fn strongest(shares: impl IntoIterator<Item = (PartyId, f64)>) -> Option<PartyId> {
    let mut best: Option<(PartyId, f64)> = None;
    for (party, share) in shares {
        if share <= 0.0 {
            continue;
        }
        match best {
            Some((_, top)) if share <= top => {}
            _ => best = Some((party, share)),
        }
    }
    best.map(|(party, _)| party)
}

/// Values of `map` in registry order, followed by any identifiers the
/// registry does not know.
pub(crate) fn ordered_shares(map: &HashMap<PartyId, f64>) -> Vec<(PartyId, f64)> {
    let mut out: Vec<(PartyId, f64)> = map.iter().map(|(id, v)| (*id, *v)).collect();
    out.sort_by_key(|(id, _)| (Party::rank(*id), *id));
    out
}

// ============================================================================
// Raw Poll
// ============================================================================

/// One pollster's published result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawPoll {
    date: NaiveDate,
    region: Option<Region>,
    pollster: String,
    source: PollsterSource,
    url: Option<String>,
    synthetic: bool,
    shares: HashMap<PartyId, f64>,
}

impl RawPoll {
    /// Start building a poll for `date`.
    pub fn builder(date: NaiveDate) -> RawPollBuilder {
        RawPollBuilder {
            date,
            region: None,
            pollster: String::new(),
            source: None,
            url: None,
            synthetic: false,
            shares: HashMap::new(),
        }
    }

    /// Region the poll covers; `None` is nation-wide.
    pub fn region(&self) -> Option<Region> {
        self.region
    }

    /// Pollster label as published.
    pub fn pollster(&self) -> &str {
        &self.pollster
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Whether the poll was interpolated rather than observed.
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Number of parties with a value.
    pub fn party_count(&self) -> usize {
        self.shares.len()
    }

    /// Sum of all shares. One for every built poll, unless all inputs were zero.
    pub fn total(&self) -> f64 {
        self.shares.values().sum()
    }
}

impl PollResult for RawPoll {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn source(&self) -> PollsterSource {
        self.source
    }

    fn share(&self, party: PartyId) -> f64 {
        self.shares.get(&party).copied().unwrap_or(0.0)
    }

    fn shares(&self) -> Vec<(PartyId, f64)> {
        ordered_shares(&self.shares)
    }
}

/// Builder for [`RawPoll`]; `build` performs the normalization.
#[derive(Debug, Clone)]
pub struct RawPollBuilder {
    date: NaiveDate,
    region: Option<Region>,
    pollster: String,
    source: Option<PollsterSource>,
    url: Option<String>,
    synthetic: bool,
    shares: HashMap<PartyId, f64>,
}

impl RawPollBuilder {
    pub fn region(mut self, region: Option<Region>) -> Self {
        self.region = region;
        self
    }

    /// Set the pollster label. The source category is derived from it unless
    /// set explicitly with [`source`](Self::source).
    pub fn pollster(mut self, label: impl Into<String>) -> Self {
        self.pollster = label.into();
        self
    }

    pub fn source(mut self, source: PollsterSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }

    /// Add `value` to the share of `party`. Negative and NaN values count as 0.
    pub fn share(mut self, party: PartyId, value: f64) -> Self {
        let value = if value.is_finite() && value > 0.0 { value } else { 0.0 };
        *self.shares.entry(party).or_insert(0.0) += value;
        self
    }

    pub fn shares(self, values: impl IntoIterator<Item = (PartyId, f64)>) -> Self {
        values
            .into_iter()
            .fold(self, |builder, (party, value)| builder.share(party, value))
    }

    /// Normalize and freeze the poll.
    ///
    /// A missing "Other" bucket is filled with whatever the known parties
    /// leave to one. Afterwards every share is divided by the total unless
    /// the total is already one or zero.
    pub fn build(self) -> RawPoll {
        let mut shares = self.shares;

        if !shares.contains_key(&PartyId::OTHER) {
            let known: f64 = shares.values().sum();
            shares.insert(PartyId::OTHER, (1.0 - known).max(0.0));
        }

        let total: f64 = shares.values().sum();
        if total != 0.0 && (total - 1.0).abs() > SHARE_EPSILON {
            for value in shares.values_mut() {
                *value /= total;
            }
        }

        let source = self
            .source
            .unwrap_or_else(|| PollsterSource::classify(&self.pollster));

        RawPoll {
            date: self.date,
            region: self.region,
            pollster: self.pollster,
            source,
            url: self.url,
            synthetic: self.synthetic,
            shares,
        }
    }
}

//! Date-indexed poll collections and population-weighted composites.
//!
//! [`PollHistory`] keeps raw polls sorted by date and answers slice and range
//! queries. Every query result is a [`MergedPoll`], a composite in which each
//! contributing poll is weighted by the population of the region it covers.

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::party::PartyId;
use crate::poll::{ordered_shares, strongest, PollResult, RawPoll};
use crate::pollster::PollsterSource;
use crate::region::{self, Region, RegionSet};

// ============================================================================
// Merged Poll
// ============================================================================

/// Population-weighted composite of polls sharing a date.
#[derive(Debug, Clone, Serialize)]
pub struct MergedPoll {
    polls: Vec<RawPoll>,
    regions: BTreeSet<Option<Region>>,
    earliest: NaiveDate,
    latest: NaiveDate,
    shares: HashMap<PartyId, f64>,
    strongest: Option<PartyId>,
}

impl MergedPoll {
    /// Combine `polls` into one composite.
    ///
    /// Each party's value is `Σ share × weight / Σ weight`, floored at zero,
    /// and the result is rescaled so the composite sums to one. An empty
    /// input yields an all-zero composite dated today.
    pub fn new(polls: Vec<RawPoll>) -> Self {
        if polls.is_empty() {
            return Self::empty();
        }

        let total_weight: f64 = polls.iter().map(|p| region::weight(p.region())).sum();

        let mut shares: HashMap<PartyId, f64> = HashMap::new();
        for poll in &polls {
            let w = region::weight(poll.region());
            for (party, share) in poll.shares() {
                *shares.entry(party).or_insert(0.0) += share * w;
            }
        }

        for value in shares.values_mut() {
            *value = if total_weight > 0.0 {
                (*value / total_weight).max(0.0)
            } else {
                0.0
            };
        }

        let sum: f64 = shares.values().sum();
        if sum > 0.0 {
            for value in shares.values_mut() {
                *value /= sum;
            }
        }

        let regions = polls.iter().map(|p| p.region()).collect();
        let earliest = polls.iter().map(|p| p.date()).min().unwrap_or_else(today);
        let latest = polls.iter().map(|p| p.date()).max().unwrap_or_else(today);
        let strongest = strongest(ordered_shares(&shares));

        Self {
            polls,
            regions,
            earliest,
            latest,
            shares,
            strongest,
        }
    }

    /// The canonical empty composite.
    pub fn empty() -> Self {
        let now = today();
        Self {
            polls: Vec::new(),
            regions: BTreeSet::new(),
            earliest: now,
            latest: now,
            shares: HashMap::new(),
            strongest: None,
        }
    }

    pub fn polls(&self) -> &[RawPoll] {
        &self.polls
    }

    /// Distinct regions that contributed; `None` marks nation-wide polls.
    pub fn regions(&self) -> &BTreeSet<Option<Region>> {
        &self.regions
    }

    pub fn earliest_date(&self) -> NaiveDate {
        self.earliest
    }

    pub fn latest_date(&self) -> NaiveDate {
        self.latest
    }

    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }
}

impl PollResult for MergedPoll {
    fn date(&self) -> NaiveDate {
        self.latest
    }

    /// The shared source when every contributing poll has the same one.
    fn source(&self) -> PollsterSource {
        let mut sources = self.polls.iter().map(|p| p.source());
        match sources.next() {
            Some(first) if sources.all(|s| s == first) => first,
            _ => PollsterSource::Other,
        }
    }

    fn share(&self, party: PartyId) -> f64 {
        self.shares.get(&party).copied().unwrap_or(0.0)
    }

    fn shares(&self) -> Vec<(PartyId, f64)> {
        ordered_shares(&self.shares)
    }

    fn strongest_party(&self) -> Option<PartyId> {
        self.strongest
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// ============================================================================
// Poll History
// ============================================================================

/// Raw polls sorted by ascending date.
#[derive(Debug, Clone, Default)]
pub struct PollHistory {
    polls: Vec<RawPoll>,
    dates: Vec<NaiveDate>,
}

impl PollHistory {
    pub fn new(polls: impl IntoIterator<Item = RawPoll>) -> Self {
        let mut polls: Vec<RawPoll> = polls.into_iter().collect();
        polls.sort_by_key(|p| p.date());

        let mut dates: Vec<NaiveDate> = polls.iter().map(|p| p.date()).collect();
        dates.dedup();

        Self { polls, dates }
    }

    pub fn polls(&self) -> &[RawPoll] {
        &self.polls
    }

    /// Distinct poll dates, ascending.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.polls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }

    pub fn earliest_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Distinct regions present in the history.
    pub fn regions(&self) -> BTreeSet<Option<Region>> {
        self.polls.iter().map(|p| p.region()).collect()
    }

    /// Every poll dated within `[lower, upper]`.
    fn between(&self, lower: NaiveDate, upper: NaiveDate) -> &[RawPoll] {
        let start = self.polls.partition_point(|p| p.date() < lower);
        let end = self.polls.partition_point(|p| p.date() <= upper);
        &self.polls[start..end.max(start)]
    }

    /// Every poll dated exactly `date`.
    pub fn polls_on(&self, date: NaiveDate) -> &[RawPoll] {
        self.between(date, date)
    }

    /// Composite of the polls taken on `date` in the given regions.
    pub fn slice(&self, date: NaiveDate, regions: &RegionSet) -> MergedPoll {
        let polls = self
            .polls_on(date)
            .iter()
            .filter(|p| regions.contains(p.region()))
            .cloned()
            .collect();
        MergedPoll::new(polls)
    }

    /// One composite per date within `[lower, upper]`. Bounds may be given in
    /// either order.
    pub fn range(
        &self,
        lower: NaiveDate,
        upper: NaiveDate,
        regions: &RegionSet,
    ) -> MergedPollHistory {
        let (lower, upper) = if lower > upper {
            (upper, lower)
        } else {
            (lower, upper)
        };

        let mut merged = Vec::new();
        let mut group: Vec<RawPoll> = Vec::new();

        for poll in self
            .between(lower, upper)
            .iter()
            .filter(|p| regions.contains(p.region()))
        {
            if group.first().is_some_and(|first| first.date() != poll.date()) {
                merged.push(MergedPoll::new(std::mem::take(&mut group)));
            }
            group.push(poll.clone());
        }
        if !group.is_empty() {
            merged.push(MergedPoll::new(group));
        }

        MergedPollHistory::new(merged)
    }

    /// Position of `date` among the distinct dates: `Ok` for an exact hit,
    /// `Err` with the insertion index otherwise.
    fn locate(&self, date: NaiveDate) -> Result<usize, usize> {
        let index = self.dates.partition_point(|d| *d < date);
        if self.dates.get(index) == Some(&date) {
            Ok(index)
        } else {
            Err(index)
        }
    }

    /// The closest poll date before `date`, clamped to the earliest date.
    pub fn previous_date(&self, date: NaiveDate) -> Option<NaiveDate> {
        let index = match self.locate(date) {
            Ok(i) | Err(i) => i.saturating_sub(1),
        };
        self.dates.get(index.min(self.dates.len().checked_sub(1)?)).copied()
    }

    /// The closest poll date after `date`, clamped to the latest date.
    pub fn next_date(&self, date: NaiveDate) -> Option<NaiveDate> {
        let last = self.dates.len().checked_sub(1)?;
        let index = match self.locate(date) {
            Ok(i) => i + 1,
            Err(i) => i,
        };
        self.dates.get(index.min(last)).copied()
    }
}

// ============================================================================
// Merged Poll History
// ============================================================================

/// Composites sorted by descending date.
#[derive(Debug, Clone, Default)]
pub struct MergedPollHistory {
    polls: Vec<MergedPoll>,
    dates: Vec<NaiveDate>,
}

impl MergedPollHistory {
    pub fn new(polls: impl IntoIterator<Item = MergedPoll>) -> Self {
        let mut polls: Vec<MergedPoll> = polls.into_iter().collect();
        polls.sort_by(|a, b| b.date().cmp(&a.date()));

        let mut dates: Vec<NaiveDate> = polls.iter().map(|p| p.date()).collect();
        dates.dedup();

        Self { polls, dates }
    }

    pub fn polls(&self) -> &[MergedPoll] {
        &self.polls
    }

    /// Distinct composite dates, descending.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergedPoll> {
        self.polls.iter()
    }

    pub fn len(&self) -> usize {
        self.polls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }

    pub fn latest(&self) -> Option<&MergedPoll> {
        self.polls.first()
    }

    pub fn oldest(&self) -> Option<&MergedPoll> {
        self.polls.last()
    }

    /// The most recent composite dated on or before `date`.
    ///
    /// A query up to one day before the oldest composite's earliest poll
    /// still returns that oldest composite.
    pub fn at(&self, date: NaiveDate) -> Option<&MergedPoll> {
        let index = self.polls.partition_point(|p| p.date() > date);
        if let Some(poll) = self.polls.get(index) {
            return Some(poll);
        }

        self.oldest()
            .filter(|oldest| oldest.earliest_date() - date <= Duration::days(1))
    }
}

impl<'a> IntoIterator for &'a MergedPollHistory {
    type Item = &'a MergedPoll;
    type IntoIter = std::slice::Iter<'a, MergedPoll>;

    fn into_iter(self) -> Self::IntoIter {
        self.polls.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn poll(on: NaiveDate, region: Option<Region>, cdu: f64, spd: f64) -> RawPoll {
        RawPoll::builder(on)
            .region(region)
            .pollster("forsa")
            .share(PartyId::CDU, cdu)
            .share(PartyId::SPD, spd)
            .build()
    }

    fn total(result: &impl PollResult) -> f64 {
        result.shares().iter().map(|(_, v)| v).sum()
    }

    #[test]
    fn test_empty_merge_is_canonical() {
        let merged = MergedPoll::new(Vec::new());
        assert!(merged.is_empty());
        assert_eq!(merged.strongest_party(), None);
        assert_eq!(merged.share(PartyId::CDU), 0.0);
        assert_eq!(merged.date(), today());
        assert_eq!(merged.source(), PollsterSource::Other);
    }

    #[test]
    fn test_identical_nationwide_polls_merge_to_themselves() {
        let a = poll(date(2024, 1, 10), None, 0.31, 0.16);
        let b = poll(date(2024, 1, 10), None, 0.31, 0.16);
        let merged = MergedPoll::new(vec![a.clone(), b]);

        for (party, share) in a.shares() {
            assert!((merged.share(party) - share).abs() < 1e-9);
        }
        assert_eq!(merged.source(), PollsterSource::Forsa);
    }

    #[test]
    fn test_population_weighting() {
        let on = date(2024, 1, 10);
        let bremen = poll(on, Some(Region::Bremen), 0.20, 0.40);
        let bayern = poll(on, Some(Region::Bayern), 0.40, 0.10);
        let merged = MergedPoll::new(vec![bremen, bayern]);

        let wb = Region::Bremen.population() as f64;
        let wy = Region::Bayern.population() as f64;
        let expected_cdu = (0.20 * wb + 0.40 * wy) / (wb + wy);

        assert!((merged.share(PartyId::CDU) - expected_cdu).abs() < 1e-9);
        assert!((total(&merged) - 1.0).abs() < 1e-9);
        assert_eq!(merged.strongest_party(), Some(PartyId::OTHER));
        assert_eq!(merged.regions().len(), 2);
    }

    #[test]
    fn test_missing_party_coverage_is_renormalized() {
        let on = date(2024, 1, 10);
        let with_bsw = RawPoll::builder(on)
            .region(Some(Region::Sachsen))
            .share(PartyId::BSW, 0.15)
            .share(PartyId::CDU, 0.30)
            .share(PartyId::OTHER, 0.55)
            .build();
        let without = RawPoll::builder(on)
            .region(Some(Region::Hessen))
            .share(PartyId::CDU, 0.35)
            .share(PartyId::OTHER, 0.65)
            .build();

        let merged = MergedPoll::new(vec![with_bsw, without]);
        assert!((total(&merged) - 1.0).abs() < 1e-9);
        assert!(merged.share(PartyId::BSW) > 0.0);
        assert!(merged.share(PartyId::BSW) < 0.15);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let on = date(2024, 1, 10);
        let polls = vec![
            poll(on, None, 0.30, 0.15),
            poll(on, Some(Region::Bayern), 0.38, 0.09),
            poll(on, Some(Region::Berlin), 0.19, 0.14),
        ];
        let forward = MergedPoll::new(polls.clone());
        let backward = MergedPoll::new(polls.into_iter().rev().collect());

        for (party, share) in forward.shares() {
            assert!((backward.share(party) - share).abs() < 1e-12);
        }
        assert_eq!(forward.strongest_party(), backward.strongest_party());
    }

    #[test]
    fn test_slice_filters_date_and_region() {
        let history = PollHistory::new(vec![
            poll(date(2024, 2, 1), None, 0.30, 0.15),
            poll(date(2024, 2, 1), Some(Region::Bayern), 0.40, 0.10),
            poll(date(2024, 2, 2), None, 0.10, 0.10),
        ]);

        let national = history.slice(date(2024, 2, 1), &RegionSet::nationwide());
        assert_eq!(national.polls().len(), 1);
        assert!((national.share(PartyId::CDU) - 0.30).abs() < 1e-9);

        let both = history.slice(date(2024, 2, 1), &RegionSet::everything());
        assert_eq!(both.polls().len(), 2);

        let none = history.slice(date(2024, 2, 3), &RegionSet::everything());
        assert!(none.is_empty());
    }

    #[test]
    fn test_range_groups_by_date_and_swaps_bounds() {
        let history = PollHistory::new(vec![
            poll(date(2024, 3, 3), None, 0.32, 0.15),
            poll(date(2024, 3, 1), None, 0.30, 0.15),
            poll(date(2024, 3, 1), None, 0.28, 0.17),
            poll(date(2024, 3, 9), None, 0.29, 0.16),
        ]);

        let range = history.range(date(2024, 3, 5), date(2024, 3, 1), &RegionSet::nationwide());
        assert_eq!(range.len(), 2);
        assert_eq!(range.dates(), &[date(2024, 3, 3), date(2024, 3, 1)]);
        assert_eq!(range.oldest().unwrap().polls().len(), 2);
    }

    #[test]
    fn test_date_navigation() {
        let history = PollHistory::new(vec![
            poll(date(2021, 12, 1), None, 0.3, 0.2),
            poll(date(2021, 1, 1), None, 0.3, 0.2),
            poll(date(2021, 6, 1), None, 0.3, 0.2),
        ]);

        assert_eq!(history.previous_date(date(2021, 6, 1)), Some(date(2021, 1, 1)));
        assert_eq!(history.next_date(date(2021, 6, 1)), Some(date(2021, 12, 1)));
        assert_eq!(history.previous_date(date(2020, 1, 1)), Some(date(2021, 1, 1)));
        assert_eq!(history.next_date(date(2022, 1, 1)), Some(date(2021, 12, 1)));
        assert_eq!(history.previous_date(date(2021, 1, 1)), Some(date(2021, 1, 1)));
        // Dates between entries step to their neighbours
        assert_eq!(history.next_date(date(2021, 3, 1)), Some(date(2021, 6, 1)));
        assert_eq!(history.previous_date(date(2021, 3, 1)), Some(date(2021, 1, 1)));
    }

    #[test]
    fn test_navigation_on_empty_history() {
        let history = PollHistory::new(Vec::new());
        assert_eq!(history.previous_date(date(2021, 1, 1)), None);
        assert_eq!(history.next_date(date(2021, 1, 1)), None);
        assert_eq!(history.latest_date(), None);
    }

    #[test]
    fn test_merged_history_lookup() {
        let history = PollHistory::new(vec![
            poll(date(2024, 5, 10), None, 0.3, 0.2),
            poll(date(2024, 5, 20), None, 0.3, 0.2),
        ]);
        let merged = history.range(date(2024, 1, 1), date(2024, 12, 31), &RegionSet::nationwide());

        assert_eq!(merged.at(date(2024, 5, 25)).unwrap().date(), date(2024, 5, 20));
        assert_eq!(merged.at(date(2024, 5, 15)).unwrap().date(), date(2024, 5, 10));
        // One day before the oldest still resolves to it
        assert_eq!(merged.at(date(2024, 5, 9)).unwrap().date(), date(2024, 5, 10));
        assert!(merged.at(date(2024, 5, 8)).is_none());
        assert!(MergedPollHistory::default().at(date(2024, 5, 8)).is_none());
    }
}

//! Cache file round trips, expiry and corruption handling.

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use poll_engine::{Party, PartyId, PollCache, PollResult, RawPoll, Region};
use proptest::prelude::*;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

fn polls() -> Vec<RawPoll> {
    vec![
        RawPoll::builder(NaiveDate::from_ymd_opt(2024, 8, 20).unwrap())
            .pollster("allensbach")
            .url("https://polls.example.org/umfragen/allensbach.htm")
            .share(PartyId::CDU, 0.325)
            .share(PartyId::AFD, 0.17)
            .share(PartyId::SPD, 0.155)
            .share(PartyId::GRUENE, 0.11)
            .share(PartyId::BSW, 0.085)
            .build(),
        RawPoll::builder(NaiveDate::from_ymd_opt(1990, 11, 2).unwrap())
            .region(Some(Region::BerlinEast))
            .pollster("landtage/berlin")
            .synthetic(true)
            .share(PartyId::SPD, 0.32)
            .share(PartyId::LINKE, 0.24)
            .build(),
    ]
}

fn cache(dir: &TempDir) -> PollCache {
    PollCache::new(dir.path().join("polls.cache"), WEEK)
}

#[test]
fn test_roundtrip_within_ttl() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    let original = polls();

    cache.write(&original).unwrap();
    let restored = cache.read();
    assert_eq!(restored.len(), 2);

    // Sorted by date on the way out
    let (old, new) = (&restored[0], &restored[1]);
    assert_eq!(old.date(), original[1].date());
    assert_eq!(old.region(), Some(Region::BerlinEast));
    assert!(old.is_synthetic());
    assert_eq!(old.url(), None);
    assert_eq!(new.url(), original[0].url());
    assert_eq!(new.pollster(), "allensbach");

    for (restored, original) in [(old, &original[1]), (new, &original[0])] {
        assert_eq!(restored.source(), original.source());
        for (party, share) in original.shares() {
            assert!((restored.share(party) - share).abs() < 1e-6, "{party}");
        }
    }
}

#[test]
fn test_expired_cache_reads_empty() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);

    let created = Utc::now() - ChronoDuration::days(8);
    cache.write_at(&polls(), created).unwrap();
    assert!(cache.read().is_empty());

    // Still there for a reader with a longer horizon
    let lenient = PollCache::new(cache.path(), Duration::from_secs(9 * 24 * 3600));
    assert_eq!(lenient.read().len(), 2);
}

#[test]
fn test_truncated_file_reads_empty() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    cache.write(&polls()).unwrap();

    let bytes = fs::read(cache.path()).unwrap();
    for cut in [3, 8, 12, bytes.len() - 1] {
        fs::write(cache.path(), &bytes[..cut]).unwrap();
        assert!(cache.read().is_empty(), "cut at {cut}");
    }
}

#[test]
fn test_garbage_reads_empty() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    fs::write(cache.path(), b"<!doctype html> not a cache").unwrap();
    assert!(cache.read().is_empty());
}

#[test]
fn test_invalidate_removes_file() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    cache.write(&polls()).unwrap();

    cache.invalidate().unwrap();
    assert!(!cache.path().exists());
    assert!(cache.read().is_empty());
    // Idempotent
    cache.invalidate().unwrap();
}

// ============================================================================
// Round trips over arbitrary poll sets
// ============================================================================

fn poll_strategy() -> impl Strategy<Value = RawPoll> {
    (
        0i64..20_000,
        prop::option::of(0usize..Region::ALL.len()),
        "[a-z]{0,10}(/[a-z]{1,8})?",
        prop::option::of("https://[a-z]{1,8}\\.org/[a-z]{0,8}\\.htm"),
        any::<bool>(),
        prop::collection::vec((0usize..Party::count(), 0.0f64..0.6), 0..8),
    )
        .prop_map(|(days, region, pollster, url, synthetic, picks)| {
            let date = NaiveDate::from_ymd_opt(1980, 1, 1).unwrap() + ChronoDuration::days(days);
            let mut builder = RawPoll::builder(date)
                .region(region.map(|i| Region::ALL[i]))
                .pollster(pollster)
                .synthetic(synthetic)
                .shares(picks.into_iter().map(|(i, share)| (Party::all()[i].id, share)));
            if let Some(url) = url {
                builder = builder.url(url);
            }
            builder.build()
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_cache_roundtrip(polls in prop::collection::vec(poll_strategy(), 0..12)) {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);
        cache.write(&polls).unwrap();

        let mut expected = polls;
        expected.sort_by_key(|p| p.date());
        let restored = cache.read();
        prop_assert_eq!(restored.len(), expected.len());

        for (back, original) in restored.iter().zip(&expected) {
            prop_assert_eq!(back.date(), original.date());
            prop_assert_eq!(back.region(), original.region());
            prop_assert_eq!(back.pollster(), original.pollster());
            prop_assert_eq!(back.url(), original.url());
            prop_assert_eq!(back.is_synthetic(), original.is_synthetic());
            prop_assert_eq!(back.source(), original.source());
            for (party, share) in original.shares() {
                prop_assert!((back.share(party) - share).abs() < 1e-5, "{}", party);
            }
        }
    }
}

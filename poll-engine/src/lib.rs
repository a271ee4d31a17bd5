//! Poll Engine Library
//!
//! Collects German opinion polls from the web, keeps them in a compact
//! binary cache, and turns them into population-weighted composites and
//! coalition views.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        poll-engine                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐    │
//! │  │   Crawler    │───▶│  PollStore   │───▶│   PollHistory    │    │
//! │  │ (seed pages) │    │ (bin cache)  │    │ slice / range    │    │
//! │  └──────────────┘    └──────────────┘    └────────┬─────────┘    │
//! │                                                   ▼              │
//! │                                    MergedPoll ──▶ Coalition      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Normalization
//! - A [`RawPoll`] sums to one from construction on
//! - Composites and coalitions renormalize over their own party sets
//!
//! ## Weighting
//! - A state poll weighs as much as the state's population
//! - A nation-wide poll weighs as much as the whole country

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod cache;
pub mod coalition;
pub mod crawler;
pub mod history;
pub mod party;
pub mod poll;
pub mod pollster;
pub mod region;
pub mod store;

pub use cache::{CacheError, PollCache};
pub use coalition::Coalition;
pub use crawler::{CrawlReport, Crawler, FetchError, HttpFetcher, PageFetcher};
pub use history::{MergedPoll, MergedPollHistory, PollHistory};
pub use party::{NameFallback, Party, PartyId};
pub use poll::{PollResult, RawPoll};
pub use pollster::PollsterSource;
pub use region::{Region, RegionSet};
pub use store::PollStore;

//! Pollster source categories.

use serde::Serialize;
use std::fmt;

use crate::party::normalize_name;

/// The institute that conducted a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PollsterSource {
    Allensbach,
    Verian,
    Forsa,
    ForschungsgruppeWahlen,
    Gms,
    InfratestDimap,
    Insa,
    YouGov,
    Ipsos,
    Other,
}

impl PollsterSource {
    pub const ALL: [PollsterSource; 10] = [
        Self::Allensbach,
        Self::Verian,
        Self::Forsa,
        Self::ForschungsgruppeWahlen,
        Self::Gms,
        Self::InfratestDimap,
        Self::Insa,
        Self::YouGov,
        Self::Ipsos,
        Self::Other,
    ];

    /// Stable code used by the cache format.
    pub fn code(self) -> u32 {
        match self {
            Self::Allensbach => 0,
            Self::Verian => 1,
            Self::Forsa => 2,
            Self::ForschungsgruppeWahlen => 3,
            Self::Gms => 4,
            Self::InfratestDimap => 5,
            Self::Insa => 6,
            Self::YouGov => 7,
            Self::Ipsos => 8,
            Self::Other => 255,
        }
    }

    /// Decode a cache code; unknown codes are `Other`.
    pub fn from_code(code: u32) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.code() == code)
            .unwrap_or(Self::Other)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Allensbach => "Allensbach",
            Self::Verian => "Verian (Emnid)",
            Self::Forsa => "Forsa",
            Self::ForschungsgruppeWahlen => "Forschungsgruppe Wahlen",
            Self::Gms => "GMS",
            Self::InfratestDimap => "Infratest dimap",
            Self::Insa => "INSA",
            Self::YouGov => "YouGov",
            Self::Ipsos => "Ipsos",
            Self::Other => "Other",
        }
    }

    fn fragments(self) -> &'static [&'static str] {
        match self {
            Self::Allensbach => &["allensbach", "ifd"],
            Self::Verian => &["verian", "emnid", "kantar"],
            Self::Forsa => &["forsa"],
            Self::ForschungsgruppeWahlen => &["politbarometer", "forschungsgruppe", "fgw"],
            Self::Gms => &["gms"],
            Self::InfratestDimap => &["dimap", "infratest"],
            Self::Insa => &["insa"],
            Self::YouGov => &["yougov"],
            Self::Ipsos => &["ipsos"],
            Self::Other => &[],
        }
    }

    /// Classify a raw pollster label by the name fragments it contains.
    pub fn classify(label: &str) -> Self {
        let cleaned = normalize_name(label);
        Self::ALL
            .iter()
            .copied()
            .find(|source| source.fragments().iter().any(|f| cleaned.contains(f)))
            .unwrap_or(Self::Other)
    }
}

impl fmt::Display for PollsterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

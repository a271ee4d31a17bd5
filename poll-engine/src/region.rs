//! Regions and their population weights.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::party::normalize_name;

/// German federal states, plus the two halves of Berlin for polls taken
/// while the city was divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Region {
    BadenWuerttemberg,
    Bayern,
    Berlin,
    Brandenburg,
    Bremen,
    Hamburg,
    Hessen,
    MecklenburgVorpommern,
    Niedersachsen,
    NordrheinWestfalen,
    RheinlandPfalz,
    Saarland,
    Sachsen,
    SachsenAnhalt,
    SchleswigHolstein,
    Thueringen,
    BerlinWest,
    BerlinEast,
}

/// Residents of West Berlin at the last separate count (1989).
const BERLIN_WEST_1989: f64 = 2_130_525.0;
/// Residents of East Berlin at the last separate count (1989).
const BERLIN_EAST_1989: f64 = 1_279_212.0;

/// Share of Berlin's population attributed to the western half.
pub static BERLIN_WEST_FRACTION: Lazy<f64> =
    Lazy::new(|| BERLIN_WEST_1989 / (BERLIN_WEST_1989 + BERLIN_EAST_1989));

/// Sum of the sixteen state populations.
static NATIONAL_POPULATION: Lazy<u64> = Lazy::new(|| {
    Region::STATES
        .iter()
        .map(|r| r.population())
        .sum()
});

impl Region {
    /// The sixteen federal states, without the Berlin halves.
    pub const STATES: [Region; 16] = [
        Region::BadenWuerttemberg,
        Region::Bayern,
        Region::Berlin,
        Region::Brandenburg,
        Region::Bremen,
        Region::Hamburg,
        Region::Hessen,
        Region::MecklenburgVorpommern,
        Region::Niedersachsen,
        Region::NordrheinWestfalen,
        Region::RheinlandPfalz,
        Region::Saarland,
        Region::Sachsen,
        Region::SachsenAnhalt,
        Region::SchleswigHolstein,
        Region::Thueringen,
    ];

    /// Every region, including the Berlin halves.
    pub const ALL: [Region; 18] = [
        Region::BadenWuerttemberg,
        Region::Bayern,
        Region::Berlin,
        Region::Brandenburg,
        Region::Bremen,
        Region::Hamburg,
        Region::Hessen,
        Region::MecklenburgVorpommern,
        Region::Niedersachsen,
        Region::NordrheinWestfalen,
        Region::RheinlandPfalz,
        Region::Saarland,
        Region::Sachsen,
        Region::SachsenAnhalt,
        Region::SchleswigHolstein,
        Region::Thueringen,
        Region::BerlinWest,
        Region::BerlinEast,
    ];

    /// Stable one byte code used by the cache format.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Official two letter abbreviation.
    pub fn abbreviation(self) -> &'static str {
        match self {
            Self::BadenWuerttemberg => "BW",
            Self::Bayern => "BY",
            Self::Berlin => "BE",
            Self::Brandenburg => "BB",
            Self::Bremen => "HB",
            Self::Hamburg => "HH",
            Self::Hessen => "HE",
            Self::MecklenburgVorpommern => "MV",
            Self::Niedersachsen => "NI",
            Self::NordrheinWestfalen => "NW",
            Self::RheinlandPfalz => "RP",
            Self::Saarland => "SL",
            Self::Sachsen => "SN",
            Self::SachsenAnhalt => "ST",
            Self::SchleswigHolstein => "SH",
            Self::Thueringen => "TH",
            Self::BerlinWest => "BE-W",
            Self::BerlinEast => "BE-O",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BadenWuerttemberg => "Baden-Württemberg",
            Self::Bayern => "Bayern",
            Self::Berlin => "Berlin",
            Self::Brandenburg => "Brandenburg",
            Self::Bremen => "Bremen",
            Self::Hamburg => "Hamburg",
            Self::Hessen => "Hessen",
            Self::MecklenburgVorpommern => "Mecklenburg-Vorpommern",
            Self::Niedersachsen => "Niedersachsen",
            Self::NordrheinWestfalen => "Nordrhein-Westfalen",
            Self::RheinlandPfalz => "Rheinland-Pfalz",
            Self::Saarland => "Saarland",
            Self::Sachsen => "Sachsen",
            Self::SachsenAnhalt => "Sachsen-Anhalt",
            Self::SchleswigHolstein => "Schleswig-Holstein",
            Self::Thueringen => "Thüringen",
            Self::BerlinWest => "Berlin (West)",
            Self::BerlinEast => "Berlin (Ost)",
        }
    }

    /// Resident population used as the weight of this region's polls.
    pub fn population(self) -> u64 {
        match self {
            Self::BadenWuerttemberg => 11_280_257,
            Self::Bayern => 13_369_393,
            Self::Berlin => 3_755_251,
            Self::Brandenburg => 2_573_135,
            Self::Bremen => 684_864,
            Self::Hamburg => 1_892_122,
            Self::Hessen => 6_391_360,
            Self::MecklenburgVorpommern => 1_628_378,
            Self::Niedersachsen => 8_140_242,
            Self::NordrheinWestfalen => 18_139_116,
            Self::RheinlandPfalz => 4_159_150,
            Self::Saarland => 992_666,
            Self::Sachsen => 4_086_152,
            Self::SachsenAnhalt => 2_186_643,
            Self::SchleswigHolstein => 2_953_270,
            Self::Thueringen => 2_126_846,
            Self::BerlinWest => {
                (Self::Berlin.population() as f64 * *BERLIN_WEST_FRACTION).round() as u64
            }
            Self::BerlinEast => {
                (Self::Berlin.population() as f64 * (1.0 - *BERLIN_WEST_FRACTION)).round() as u64
            }
        }
    }

    /// Resolve an abbreviation, a name, or a URL slug such as `nrw` or
    /// `baden-wuerttemberg`.
    pub fn resolve(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if let Some(region) = Self::ALL
            .iter()
            .find(|r| r.abbreviation().eq_ignore_ascii_case(trimmed))
        {
            return Some(*region);
        }

        let key = normalize_name(trimmed).replace("ue", "u");
        let region = match key.as_str() {
            "badenwurttemberg" | "bawu" => Self::BadenWuerttemberg,
            "bayern" | "bavaria" => Self::Bayern,
            "berlin" => Self::Berlin,
            "brandenburg" => Self::Brandenburg,
            "bremen" => Self::Bremen,
            "hamburg" => Self::Hamburg,
            "hessen" => Self::Hessen,
            "mecklenburgvorpommern" | "mv" => Self::MecklenburgVorpommern,
            "niedersachsen" => Self::Niedersachsen,
            "nordrheinwestfalen" | "nrw" => Self::NordrheinWestfalen,
            "rheinlandpfalz" => Self::RheinlandPfalz,
            "saarland" => Self::Saarland,
            "sachsen" => Self::Sachsen,
            "sachsenanhalt" => Self::SachsenAnhalt,
            "schleswigholstein" => Self::SchleswigHolstein,
            "thuringen" => Self::Thueringen,
            "berlinwest" | "westberlin" => Self::BerlinWest,
            "berlinost" | "berlineast" | "ostberlin" => Self::BerlinEast,
            _ => return None,
        };
        Some(region)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Population of the whole country; the weight of a nation-wide poll.
pub fn national_population() -> u64 {
    *NATIONAL_POPULATION
}

/// Weight of a poll scoped to `region`, where `None` is nation-wide.
pub fn weight(region: Option<Region>) -> f64 {
    match region {
        Some(r) => r.population() as f64,
        None => national_population() as f64,
    }
}

// ============================================================================
// Region Set
// ============================================================================

/// Region filter for history queries. `None` stands for nation-wide polls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegionSet(BTreeSet<Option<Region>>);

impl RegionSet {
    /// An empty filter; matches nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only nation-wide polls.
    pub fn nationwide() -> Self {
        Self(BTreeSet::from([None]))
    }

    /// The given states, without nation-wide polls.
    pub fn states(regions: impl IntoIterator<Item = Region>) -> Self {
        Self(regions.into_iter().map(Some).collect())
    }

    /// Nation-wide polls and every region.
    pub fn everything() -> Self {
        let mut set: BTreeSet<Option<Region>> = Region::ALL.iter().copied().map(Some).collect();
        set.insert(None);
        Self(set)
    }

    pub fn with(mut self, region: Option<Region>) -> Self {
        self.0.insert(region);
        self
    }

    pub fn contains(&self, region: Option<Region>) -> bool {
        self.0.contains(&region)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<Region>> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Option<Region>> for RegionSet {
    fn from_iter<I: IntoIterator<Item = Option<Region>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

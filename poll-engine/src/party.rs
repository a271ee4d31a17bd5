//! Party registry.
//!
//! The set of parties is closed and fixed at compile time. Every party has a
//! three letter [`PartyId`], a display name, coordinates on three political
//! axes and a list of name aliases used to resolve the free-text headers of
//! poll tables.

use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// Party Identifier
// ============================================================================

/// Three character, upper-case ASCII party identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartyId([u8; 3]);

impl PartyId {
    pub const CDU: PartyId = PartyId(*b"CDU");
    pub const SPD: PartyId = PartyId(*b"SPD");
    pub const GRUENE: PartyId = PartyId(*b"GRU");
    pub const FDP: PartyId = PartyId(*b"FDP");
    pub const AFD: PartyId = PartyId(*b"AFD");
    pub const LINKE: PartyId = PartyId(*b"LIN");
    pub const BSW: PartyId = PartyId(*b"BSW");
    pub const FREIE_WAEHLER: PartyId = PartyId(*b"FWG");
    pub const PIRATEN: PartyId = PartyId(*b"PIR");
    pub const NPD: PartyId = PartyId(*b"NPD");
    /// Catch-all bucket for every party not listed separately.
    pub const OTHER: PartyId = PartyId(*b"SON");

    /// Parse an identifier. Case-insensitive; exactly three ASCII alphanumerics.
    pub fn new(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 {
            return None;
        }
        Self::from_bytes([bytes[0], bytes[1], bytes[2]])
    }

    /// Build from raw bytes as stored in the cache format.
    pub fn from_bytes(bytes: [u8; 3]) -> Option<Self> {
        if !bytes.iter().all(u8::is_ascii_alphanumeric) {
            return None;
        }
        Some(Self(bytes.map(|b| b.to_ascii_uppercase())))
    }

    /// Raw identifier bytes.
    pub const fn as_bytes(&self) -> [u8; 3] {
        self.0
    }

    pub fn as_str(&self) -> &str {
        // Construction guarantees ASCII
        std::str::from_utf8(&self.0).unwrap_or("???")
    }

    /// Registry entry for this identifier, if it names a known party.
    pub fn party(&self) -> Option<&'static Party> {
        Party::get(*self)
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyId({})", self.as_str())
    }
}

impl Serialize for PartyId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// Party
// ============================================================================

/// Position of a party on three axes, each within [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PoliticalAxes {
    /// Economic left (-1) to right (1)
    pub economic: f32,
    /// Libertarian (-1) to authoritarian (1)
    pub authority: f32,
    /// Progressive (-1) to conservative (1)
    pub tradition: f32,
}

impl PoliticalAxes {
    pub fn new(economic: f32, authority: f32, tradition: f32) -> Self {
        Self {
            economic: economic.clamp(-1.0, 1.0),
            authority: authority.clamp(-1.0, 1.0),
            tradition: tradition.clamp(-1.0, 1.0),
        }
    }
}

/// A registered party. Equality and hashing use the identifier only.
#[derive(Debug, Clone, Serialize)]
pub struct Party {
    pub id: PartyId,
    pub name: &'static str,
    pub axes: PoliticalAxes,
    #[serde(skip)]
    aliases: &'static [&'static str],
}

impl PartialEq for Party {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Party {}

impl Hash for Party {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// What to return when a name matches no known party.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameFallback {
    /// Return `None` so the caller can reclassify
    Unresolved,
    /// Fold into the catch-all "Other" party
    Other,
}

fn party(
    id: PartyId,
    name: &'static str,
    (economic, authority, tradition): (f32, f32, f32),
    aliases: &'static [&'static str],
) -> Party {
    Party {
        id,
        name,
        axes: PoliticalAxes::new(economic, authority, tradition),
        aliases,
    }
}

/// The registry, in population order. Ties between equal shares are broken by
/// this order everywhere.
static REGISTRY: Lazy<Vec<Party>> = Lazy::new(|| {
    vec![
        party(PartyId::CDU, "CDU/CSU", (0.35, 0.3, 0.45), &["cducsu", "union", "csu"]),
        party(PartyId::SPD, "SPD", (-0.3, 0.0, -0.1), &[]),
        party(
            PartyId::GRUENE,
            "GRÜNE",
            (-0.35, -0.3, -0.7),
            &["grune", "gruene", "grunen", "bundnis90diegrunen", "b90grune"],
        ),
        party(PartyId::FDP, "FDP", (0.7, -0.45, -0.2), &[]),
        party(PartyId::AFD, "AfD", (0.4, 0.75, 0.9), &[]),
        party(PartyId::LINKE, "DIE LINKE", (-0.8, 0.1, -0.4), &["linke", "dielinke", "pds"]),
        party(PartyId::BSW, "BSW", (-0.5, 0.5, 0.4), &[]),
        party(
            PartyId::FREIE_WAEHLER,
            "FREIE WÄHLER",
            (0.2, 0.0, 0.35),
            &["freiewahler", "fw"],
        ),
        party(PartyId::PIRATEN, "PIRATEN", (-0.2, -0.8, -0.5), &["piraten", "piratenpartei"]),
        party(PartyId::NPD, "NPD", (-0.1, 1.0, 1.0), &["heimat", "dieheimat"]),
        party(
            PartyId::OTHER,
            "Sonstige",
            (0.0, 0.0, 0.0),
            &["sonstige", "andere", "other", "others"],
        ),
    ]
});

static ALIASES: Lazy<HashMap<String, PartyId>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for party in REGISTRY.iter() {
        map.insert(party.id.as_str().to_ascii_lowercase(), party.id);
        map.insert(normalize_name(party.name), party.id);
        for alias in party.aliases {
            map.insert((*alias).to_string(), party.id);
        }
    }
    map
});

/// Fold a party name into its lookup form: lower-case, diacritics dropped
/// (ß becomes s), only ASCII letters and digits kept.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c == 'ß' { 's' } else { c })
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

impl Party {
    /// Every registered party, in population order.
    pub fn all() -> &'static [Party] {
        &REGISTRY
    }

    /// Number of registered parties.
    pub fn count() -> usize {
        REGISTRY.len()
    }

    /// Look up a party by identifier.
    pub fn get(id: PartyId) -> Option<&'static Party> {
        REGISTRY.iter().find(|p| p.id == id)
    }

    /// The catch-all "Other" party.
    pub fn other() -> &'static Party {
        REGISTRY
            .iter()
            .find(|p| p.id == PartyId::OTHER)
            .unwrap_or(&REGISTRY[REGISTRY.len() - 1])
    }

    /// Position in the registry, used for deterministic ordering.
    pub fn rank(id: PartyId) -> usize {
        REGISTRY
            .iter()
            .position(|p| p.id == id)
            .unwrap_or(REGISTRY.len())
    }

    /// Resolve a free-text party name.
    pub fn resolve(name: &str, fallback: NameFallback) -> Option<PartyId> {
        let key = normalize_name(name);
        match ALIASES.get(&key) {
            Some(id) => Some(*id),
            None => match fallback {
                NameFallback::Unresolved => None,
                NameFallback::Other => Some(PartyId::OTHER),
            },
        }
    }

    /// Euclidean distance between two parties on the political axes.
    pub fn distance(&self, other: &Party) -> f32 {
        let a = self.axes;
        let b = other.axes;
        ((a.economic - b.economic).powi(2)
            + (a.authority - b.authority).powi(2)
            + (a.tradition - b.tradition).powi(2))
        .sqrt()
    }
}

// src/resolver.rs
//
// Pitch → discrete pose lookup.
//
// Fingering tables are loaded from a declarative JSON catalog keyed by
// instrument name. Each instrument is handed its own resolver at load time;
// there is no process-wide lookup table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which discrete pose to show for a pitch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PositionDescriptor {
    /// Left and right hand model indices.
    Hands { left: u8, right: u8 },

    /// Indices of the keys held down.
    Keys { pressed: Vec<u8> },
}

/// Capability queried by clones while a note sounds.
///
/// `None` means the pitch has no known mapping; the clone falls back to its
/// neutral pose.
pub trait PositionResolver: Send + Sync {
    fn resolve(&self, pitch: u8) -> Option<PositionDescriptor>;
}

/// Resolver for instruments without fingering data.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFingering;

impl PositionResolver for NoFingering {
    fn resolve(&self, _pitch: u8) -> Option<PositionDescriptor> {
        None
    }
}

/// Kind of descriptor an instrument's table produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingType {
    Hands,
    PressedKeys,
}

/// Static pitch → descriptor table.
#[derive(Debug, Clone)]
pub struct FingeringTable {
    mapping_type: MappingType,
    table: HashMap<u8, PositionDescriptor>,
}

impl FingeringTable {
    pub fn new(mapping_type: MappingType) -> Self {
        Self {
            mapping_type,
            table: HashMap::new(),
        }
    }

    #[inline]
    pub fn mapping_type(&self) -> MappingType {
        self.mapping_type
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Every mapped pitch with its descriptor, in pitch order.
    pub fn entries(&self) -> Vec<(u8, &PositionDescriptor)> {
        let mut entries: Vec<_> = self.table.iter().map(|(p, d)| (*p, d)).collect();
        entries.sort_unstable_by_key(|(pitch, _)| *pitch);
        entries
    }

    /// Map one pitch. Later inserts replace earlier ones.
    pub fn insert(&mut self, pitch: u8, descriptor: PositionDescriptor) -> Result<(), ResolverError> {
        let matches = matches!(
            (self.mapping_type, &descriptor),
            (MappingType::Hands, PositionDescriptor::Hands { .. })
                | (MappingType::PressedKeys, PositionDescriptor::Keys { .. })
        );
        if !matches {
            return Err(ResolverError::MappingTypeMismatch {
                expected: self.mapping_type,
                pitch,
            });
        }
        self.table.insert(pitch, descriptor);
        Ok(())
    }
}

impl PositionResolver for FingeringTable {
    fn resolve(&self, pitch: u8) -> Option<PositionDescriptor> {
        self.table.get(&pitch).cloned()
    }
}

//
// ===============================
// MARK: Declarative catalog
// ===============================
//

/// Error while reading a fingering catalog.
#[derive(Debug)]
pub enum ResolverError {
    /// The catalog is not valid JSON for the expected shape.
    Parse(serde_json::Error),

    /// An entry names neither `note` nor a `low`/`high` range.
    MissingPitch { instrument: String },

    /// An entry lacks the fields its mapping type needs.
    MissingPosition { instrument: String, pitch: u8 },

    /// A range whose `low` is above its `high`.
    InvertedRange { instrument: String, low: u8, high: u8 },

    /// A descriptor of the wrong kind for the table.
    MappingTypeMismatch { expected: MappingType, pitch: u8 },
}

impl std::fmt::Display for ResolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolverError::Parse(e) => write!(f, "invalid fingering catalog: {}", e),
            ResolverError::MissingPitch { instrument } => {
                write!(f, "{}: mapping entry has no note or range", instrument)
            }
            ResolverError::MissingPosition { instrument, pitch } => {
                write!(f, "{}: mapping for pitch {} has no position", instrument, pitch)
            }
            ResolverError::InvertedRange { instrument, low, high } => {
                write!(f, "{}: range {}..={} is inverted", instrument, low, high)
            }
            ResolverError::MappingTypeMismatch { expected, pitch } => {
                write!(f, "pitch {} does not match mapping type {:?}", pitch, expected)
            }
        }
    }
}

impl std::error::Error for ResolverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolverError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ResolverError {
    fn from(e: serde_json::Error) -> Self {
        ResolverError::Parse(e)
    }
}

/// One `map` entry: a pitch (or inclusive range) and its position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<u8>,

    /// Left hand index (hands mapping)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lh: Option<u8>,
    /// Right hand index (hands mapping)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rh: Option<u8>,

    /// Pressed keys (pressed_keys mapping)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<u8>>,
}

/// Fingering data for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentMapping {
    pub name: String,
    pub mapping_type: MappingType,
    #[serde(default)]
    pub maps: Vec<MapEntry>,
}

impl InstrumentMapping {
    /// Expand the entries into a lookup table.
    pub fn to_table(&self) -> Result<FingeringTable, ResolverError> {
        let mut table = FingeringTable::new(self.mapping_type);

        for entry in &self.maps {
            let (low, high) = match (entry.note, entry.low, entry.high) {
                (Some(note), _, _) => (note, note),
                (None, Some(low), Some(high)) => (low, high),
                _ => {
                    return Err(ResolverError::MissingPitch {
                        instrument: self.name.clone(),
                    });
                }
            };
            if low > high {
                return Err(ResolverError::InvertedRange {
                    instrument: self.name.clone(),
                    low,
                    high,
                });
            }

            let descriptor = match self.mapping_type {
                MappingType::Hands => entry
                    .lh
                    .zip(entry.rh)
                    .map(|(left, right)| PositionDescriptor::Hands { left, right }),
                MappingType::PressedKeys => entry
                    .keys
                    .clone()
                    .map(|pressed| PositionDescriptor::Keys { pressed }),
            }
            .ok_or_else(|| ResolverError::MissingPosition {
                instrument: self.name.clone(),
                pitch: low,
            })?;

            for pitch in low..=high {
                table.insert(pitch, descriptor.clone())?;
            }
        }

        Ok(table)
    }
}

/// All fingering tables known to a performance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FingeringCatalog {
    #[serde(default)]
    pub instruments: Vec<InstrumentMapping>,
}

impl FingeringCatalog {
    pub fn from_json(json: &str) -> Result<Self, ResolverError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build the table for a named instrument, if the catalog has one.
    pub fn table_for(&self, name: &str) -> Option<Result<FingeringTable, ResolverError>> {
        self.instruments
            .iter()
            .find(|m| m.name == name)
            .map(InstrumentMapping::to_table)
    }
}

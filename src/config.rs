// src/config.rs
//
// Declarative performance configuration.
//
// Everything the host hands over at load time: timeline resolution, the
// instrument parts and their clone pools, fingering tables, and the parsed
// event list. Serialized as JSON.

use serde::{Deserialize, Serialize};

use crate::clone::CloneMotion;
use crate::event::PerformanceEvent;
use crate::particle::PufferConfig;
use crate::resolver::FingeringCatalog;
use crate::visual::PolyphonyOffset;

const DEFAULT_POOL_SIZE: usize = 4;

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

/// Invalid configuration, reported before playback starts.
#[derive(Debug)]
pub enum ConfigError {
    /// Not valid JSON for the expected shape.
    Parse(serde_json::Error),

    /// A clone pool must hold at least one clone.
    EmptyPool { instrument: String },

    /// Linger time must be finite and non-negative.
    InvalidLinger { instrument: String },

    /// Puffer ageing and life span must be positive.
    InvalidPuffer { instrument: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "invalid performance config: {}", e),
            ConfigError::EmptyPool { instrument } => {
                write!(f, "{}: pool size must be at least 1", instrument)
            }
            ConfigError::InvalidLinger { instrument } => {
                write!(f, "{}: linger_seconds must be >= 0", instrument)
            }
            ConfigError::InvalidPuffer { instrument } => {
                write!(f, "{}: puffer age_rate and life_span must be > 0", instrument)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// One instrument part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Display name; also the fingering catalog key unless `fingering` is set
    pub name: String,

    /// Clone visual kind tag (`plain`, `keyed`, `handed`, or a custom registration)
    pub kind: String,

    /// Event channel this part plays
    pub channel: u8,

    /// Clones available for polyphony
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Model base name; defaults to `name`
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub motion: CloneMotion,

    #[serde(default)]
    pub offset: PolyphonyOffset,

    /// Key models (keyed kind)
    #[serde(default)]
    pub key_count: u8,

    /// Hand models per side (handed kind)
    #[serde(default)]
    pub left_hands: u8,
    #[serde(default)]
    pub right_hands: u8,

    /// Seconds a non-primary clone stays visible after its note
    #[serde(default)]
    pub linger_seconds: f64,

    /// Fingering catalog entry to use instead of `name`
    #[serde(default)]
    pub fingering: Option<String>,

    /// Particle emitter driven by this part's sounding state
    #[serde(default)]
    pub puffer: Option<PufferConfig>,
}

impl InstrumentConfig {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, channel: u8) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            channel,
            pool_size: DEFAULT_POOL_SIZE,
            model: None,
            motion: CloneMotion::default(),
            offset: PolyphonyOffset::default(),
            key_count: 0,
            left_hands: 0,
            right_hands: 0,
            linger_seconds: 0.0,
            fingering: None,
            puffer: None,
        }
    }

    #[inline]
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(&self.name)
    }

    #[inline]
    pub fn fingering_name(&self) -> &str {
        self.fingering.as_deref().unwrap_or(&self.name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::EmptyPool {
                instrument: self.name.clone(),
            });
        }
        if !(self.linger_seconds.is_finite() && self.linger_seconds >= 0.0) {
            return Err(ConfigError::InvalidLinger {
                instrument: self.name.clone(),
            });
        }
        if let Some(puffer) = &self.puffer {
            if !(puffer.age_rate > 0.0 && puffer.life_span > 0.0) {
                return Err(ConfigError::InvalidPuffer {
                    instrument: self.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Top-level performance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Ticks per quarter note of the event list
    pub pulses_per_quarter_note: u32,

    /// Seed for particle jitter; puffers derive their own from it
    #[serde(default)]
    pub particle_seed: u64,

    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
}

impl PerformanceConfig {
    pub fn new(pulses_per_quarter_note: u32) -> Self {
        Self {
            pulses_per_quarter_note,
            particle_seed: 0,
            instruments: Vec::new(),
        }
    }

    pub fn with_instrument(mut self, instrument: InstrumentConfig) -> Self {
        self.instruments.push(instrument);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.instruments.iter().try_for_each(InstrumentConfig::validate)
    }
}

/// Everything needed to load a performance, in one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceDocument {
    pub config: PerformanceConfig,

    #[serde(default)]
    pub events: Vec<PerformanceEvent>,

    #[serde(default)]
    pub fingerings: FingeringCatalog,
}

impl PerformanceDocument {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let document: PerformanceDocument = serde_json::from_str(json)?;
        document.config.validate()?;
        Ok(document)
    }
}

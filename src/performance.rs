// src/performance.rs

use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::{ConfigError, PerformanceConfig, PerformanceDocument};
use crate::event::{PerformanceEvent, channel_notes, tempo_events};
use crate::instrument::Instrument;
use crate::instrument_factory::{InstrumentRegistry, kinds};
use crate::note_period::NotePeriodIndex;
use crate::particle::{ParticleId, Puffer};
use crate::pose::{InstrumentFrame, PerformanceFrame};
use crate::resolver::{FingeringCatalog, FingeringTable, NoFingering, PositionResolver, ResolverError};
use crate::visual::CloneVisual;
use crate::timeline::{TempoMap, TimelineError};

/// Why a performance could not be loaded.
#[derive(Debug)]
pub enum LoadError {
    Timeline(TimelineError),
    Config(ConfigError),
    Resolver(ResolverError),

    /// No clone factory is registered for the part's kind.
    UnknownKind { instrument: String, kind: String },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Timeline(e) => write!(f, "timeline: {}", e),
            LoadError::Config(e) => write!(f, "config: {}", e),
            LoadError::Resolver(e) => write!(f, "fingering: {}", e),
            LoadError::UnknownKind { instrument, kind } => {
                write!(f, "{}: unknown instrument kind '{}'", instrument, kind)
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Timeline(e) => Some(e),
            LoadError::Config(e) => Some(e),
            LoadError::Resolver(e) => Some(e),
            LoadError::UnknownKind { .. } => None,
        }
    }
}

impl From<TimelineError> for LoadError {
    fn from(e: TimelineError) -> Self {
        LoadError::Timeline(e)
    }
}

impl From<ConfigError> for LoadError {
    fn from(e: ConfigError) -> Self {
        LoadError::Config(e)
    }
}

impl From<ResolverError> for LoadError {
    fn from(e: ResolverError) -> Self {
        LoadError::Resolver(e)
    }
}

/// A loaded performance, driven by the host clock.
///
/// Responsibilities:
/// - own the tempo map and every instrument part
/// - advance all parts to the host's time, once per frame
/// - rewind when the host seeks backwards
///
/// Does NOT:
/// - read files or parse MIDI
/// - own a clock (time comes from `tick`)
/// - touch any scene graph
pub struct Performance {
    tempo_map: TempoMap,
    instruments: Vec<Instrument>,

    /// Time of the previous tick, for rewind detection
    last_time: Option<f64>,
}

impl Performance {
    /// Build every instrument part from configuration and events.
    pub fn load(
        config: &PerformanceConfig,
        events: &[PerformanceEvent],
        registry: &InstrumentRegistry,
        fingerings: &FingeringCatalog,
    ) -> Result<Self, LoadError> {
        config.validate()?;

        let tempo_map = TempoMap::new(config.pulses_per_quarter_note, &tempo_events(events))?;

        let mut instruments = Vec::with_capacity(config.instruments.len());
        for (position, part) in config.instruments.iter().enumerate() {
            let visuals = registry
                .create_pool(part)
                .ok_or_else(|| LoadError::UnknownKind {
                    instrument: part.name.clone(),
                    kind: part.kind.clone(),
                })?;

            let index = NotePeriodIndex::build(&channel_notes(events, part.channel), &tempo_map);

            let resolver: Arc<dyn PositionResolver> = match fingerings.table_for(part.fingering_name()) {
                Some(table) => {
                    let table = table?;
                    if let Some(visual) = visuals.first() {
                        warn_unmodelled(&part.name, &table, visual.as_ref());
                    }
                    Arc::new(table)
                }
                None => {
                    if part.kind != kinds::PLAIN {
                        warn!(
                            "{}: no fingering table '{}', clones stay in rest pose",
                            part.name,
                            part.fingering_name()
                        );
                    }
                    Arc::new(NoFingering)
                }
            };

            let puffer = part
                .puffer
                .map(|puffer| Puffer::new(puffer, config.particle_seed.wrapping_add(position as u64)));

            info!(
                "Loaded {}: {} note periods on channel {}, {} clones",
                part.name,
                index.len(),
                part.channel,
                part.pool_size
            );

            instruments.push(Instrument::new(part, Arc::new(index), resolver, visuals, puffer));
        }

        Ok(Self {
            tempo_map,
            instruments,
            last_time: None,
        })
    }

    /// Load from a parsed document with the standard clone kinds.
    pub fn from_document(document: &PerformanceDocument) -> Result<Self, LoadError> {
        Self::load(
            &document.config,
            &document.events,
            &InstrumentRegistry::standard(),
            &document.fingerings,
        )
    }

    /// Parse and load a JSON document.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        Self::from_document(&PerformanceDocument::from_json(json)?)
    }

    /// Advance every part to `time` and return the frame to render.
    ///
    /// `delta` is the host's frame time and only drives particles. On a
    /// rewind, particles dropped by the reset are reported in this frame's
    /// `released`.
    pub fn tick(&mut self, time: f64, delta: f64) -> PerformanceFrame {
        let mut dropped: Vec<Vec<ParticleId>> = Vec::new();
        if self.last_time.is_some_and(|last| time < last) {
            debug!("Rewind to {:.3}s, replaying from the start", time);
            dropped = self.reset_parts();
        }
        self.last_time = Some(time);

        let mut instruments: Vec<InstrumentFrame> = self
            .instruments
            .iter_mut()
            .map(|instrument| instrument.tick(time, delta))
            .collect();

        for (frame, mut ids) in instruments.iter_mut().zip(dropped) {
            if !ids.is_empty() {
                ids.append(&mut frame.released);
                frame.released = ids;
            }
        }

        PerformanceFrame { time, instruments }
    }

    /// Rewind every part. Returns the particle ids dropped, which the
    /// renderer must free itself.
    pub fn reset(&mut self) -> Vec<ParticleId> {
        self.reset_parts().into_iter().flatten().collect()
    }

    /// Rewind every part, returning dropped particle ids per part.
    fn reset_parts(&mut self) -> Vec<Vec<ParticleId>> {
        self.last_time = None;
        self.instruments
            .iter_mut()
            .map(Instrument::reset)
            .collect()
    }

    /// Time at which the last note ends.
    pub fn length_seconds(&self) -> f64 {
        self.instruments
            .iter()
            .map(|i| i.index().end_time())
            .fold(0.0, f64::max)
    }

    #[inline]
    pub fn tempo_map(&self) -> &TempoMap {
        &self.tempo_map
    }

    #[inline]
    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    /// Forced clone takeovers so far, across all parts.
    pub fn forced_reassignments(&self) -> usize {
        self.instruments
            .iter()
            .map(|i| i.allocator().forced_reassignments())
            .sum()
    }
}

/// Warn once, at load, about fingerings the clone kind cannot show.
///
/// Returns the affected pitches; those clones stay neutral during playback.
fn warn_unmodelled(instrument: &str, table: &FingeringTable, visual: &dyn CloneVisual) -> Vec<u8> {
    let unmodelled: Vec<u8> = table
        .entries()
        .into_iter()
        .filter(|(_, descriptor)| !visual.supports(descriptor))
        .map(|(pitch, _)| pitch)
        .collect();

    if !unmodelled.is_empty() {
        warn!(
            "{}: no models for the fingering of pitches {:?}, shown in rest pose",
            instrument, unmodelled
        );
    }
    unmodelled
}

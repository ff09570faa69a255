// src/lib.rs
//
// Library entry point for Rust hosts and FFI consumers (iOS/Swift, web).

mod clone;
mod clone_allocator;
mod config;
mod event;
mod instrument;
mod instrument_factory;
mod note_period;
mod particle;
mod performance;
mod pose;
mod resolver;
mod timeline;
mod visual;

#[cfg(feature = "ios")]
pub mod ffi;

#[cfg(feature = "web")]
pub mod wasm;

// Re-export key types for Rust consumers
pub use clone::{CloneActor, CloneId, CloneMotion, ClonePhase};
pub use clone_allocator::{Assignment, CloneAllocator};
pub use config::{ConfigError, InstrumentConfig, PerformanceConfig, PerformanceDocument};
pub use event::{
    MAX_PITCH, NoteEvent, PerformanceEvent, TempoEvent, Tick, channel_notes, tempo_events,
};
pub use instrument::Instrument;
pub use instrument_factory::{
    CloneFactory, InstrumentRegistry, SimpleCloneFactory, kinds, register_standard_kinds,
};
pub use note_period::{NotePeriod, NotePeriodGroup, NotePeriodIndex};
pub use particle::{
    Cloud, ParticleId, ParticleTick, PuffBehavior, PuffTexture, Puffer, PufferConfig, ease_out_quart, spawn_count,
};
pub use performance::{LoadError, Performance};
pub use pose::{
    Axis, ClonePose, DiscretePose, InstrumentFrame, ParticlePose, PerformanceFrame, Transform,
};
pub use resolver::{
    FingeringCatalog, FingeringTable, InstrumentMapping, MapEntry, MappingType, NoFingering, PositionDescriptor,
    PositionResolver, ResolverError,
};
pub use timeline::{DEFAULT_MICROS_PER_QUARTER, TempoMap, TimelineError, seconds_for};
pub use visual::{CloneVisual, HandedClone, KeyedClone, PlainClone, PolyphonyOffset, VisualAsset};

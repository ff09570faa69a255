// src/event.rs

use serde::{Deserialize, Serialize};

/// Event timestamp in pulses, relative to the file's pulses-per-quarter-note.
pub type Tick = u64;

/// Highest valid MIDI pitch.
pub const MAX_PITCH: u8 = 127;

/// ===============================
/// Input events (already parsed)
/// ===============================

/// A tempo change.
///
/// Applies from `tick` until the next tempo event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoEvent {
    pub tick: Tick,
    pub micros_per_quarter: u32,
}

impl TempoEvent {
    pub fn new(tick: Tick, micros_per_quarter: u32) -> Self {
        Self {
            tick,
            micros_per_quarter,
        }
    }
}

/// A note-on or note-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub tick: Tick,
    pub pitch: u8,
    pub channel: u8,
    pub on: bool,
}

impl NoteEvent {
    #[inline]
    pub fn on(tick: Tick, pitch: u8, channel: u8) -> Self {
        Self {
            tick,
            pitch,
            channel,
            on: true,
        }
    }

    #[inline]
    pub fn off(tick: Tick, pitch: u8, channel: u8) -> Self {
        Self {
            tick,
            pitch,
            channel,
            on: false,
        }
    }
}

/// One entry of the ordered event list handed over at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PerformanceEvent {
    Note(NoteEvent),
    Tempo(TempoEvent),
}

impl PerformanceEvent {
    #[inline]
    pub fn tick(&self) -> Tick {
        match self {
            PerformanceEvent::Note(e) => e.tick,
            PerformanceEvent::Tempo(e) => e.tick,
        }
    }
}

/// Collect the tempo events out of a mixed event list.
pub fn tempo_events(events: &[PerformanceEvent]) -> Vec<TempoEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            PerformanceEvent::Tempo(t) => Some(*t),
            _ => None,
        })
        .collect()
}

/// Collect the note events for one channel, preserving arrival order.
pub fn channel_notes(events: &[PerformanceEvent], channel: u8) -> Vec<NoteEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            PerformanceEvent::Note(n) if n.channel == channel => Some(*n),
            _ => None,
        })
        .collect()
}

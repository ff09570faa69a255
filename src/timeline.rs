// src/timeline.rs
//
// Tick → seconds mapping.

use crate::event::{TempoEvent, Tick};

/// Tempo assumed when no tempo event precedes a tick (120 BPM).
pub const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Invalid timeline parameters, reported at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    /// Pulses-per-quarter-note must be positive.
    NonPositiveResolution,

    /// A tempo event carries a zero microseconds-per-quarter value.
    NonPositiveTempo { tick: Tick },
}

impl std::fmt::Display for TimelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimelineError::NonPositiveResolution => {
                write!(f, "pulses per quarter note must be positive")
            }
            TimelineError::NonPositiveTempo { tick } => {
                write!(f, "tempo event at tick {} has a non-positive tempo", tick)
            }
        }
    }
}

impl std::error::Error for TimelineError {}

/// Convert a tick span into seconds under one constant tempo.
///
/// `seconds = tick * (micros_per_quarter / ppq) / 1_000_000`
///
/// Callers validate `ppq > 0` at load time; this never fails.
#[inline]
pub fn seconds_for(tick: Tick, pulses_per_quarter_note: u32, micros_per_quarter: u32) -> f64 {
    tick as f64 * (micros_per_quarter as f64 / pulses_per_quarter_note as f64) / MICROS_PER_SECOND
}

//
// ===============================
// MARK: Tempo map
// ===============================
//

/// One constant-tempo stretch of the timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TempoSegment {
    /// First tick governed by this tempo
    tick: Tick,

    /// Microseconds per quarter note
    micros_per_quarter: u32,

    /// Absolute time of `tick`, accumulated over earlier segments
    start_seconds: f64,
}

/// Piecewise tick → seconds mapping over every tempo change.
///
/// This struct:
/// - is built once at load time
/// - is immutable and shared read-only during playback
/// - always has a segment starting at tick 0
#[derive(Debug, Clone)]
pub struct TempoMap {
    pulses_per_quarter_note: u32,
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    /// Build a tempo map, validating resolution and tempo values.
    pub fn new(pulses_per_quarter_note: u32, tempos: &[TempoEvent]) -> Result<Self, TimelineError> {
        if pulses_per_quarter_note == 0 {
            return Err(TimelineError::NonPositiveResolution);
        }

        if let Some(bad) = tempos.iter().find(|t| t.micros_per_quarter == 0) {
            return Err(TimelineError::NonPositiveTempo { tick: bad.tick });
        }

        let mut sorted = tempos.to_vec();
        sorted.sort_by_key(|t| t.tick);

        // Several tempo events on one tick: the last one wins
        let mut deduped: Vec<TempoEvent> = Vec::with_capacity(sorted.len() + 1);
        for tempo in sorted {
            match deduped.last_mut() {
                Some(last) if last.tick == tempo.tick => *last = tempo,
                _ => deduped.push(tempo),
            }
        }

        if deduped.first().is_none_or(|t| t.tick > 0) {
            deduped.insert(0, TempoEvent::new(0, DEFAULT_MICROS_PER_QUARTER));
        }

        let mut segments = Vec::with_capacity(deduped.len());
        let mut start_seconds = 0.0;
        let mut previous: Option<TempoEvent> = None;

        for tempo in deduped {
            if let Some(prev) = previous {
                start_seconds += seconds_for(
                    tempo.tick - prev.tick,
                    pulses_per_quarter_note,
                    prev.micros_per_quarter,
                );
            }
            segments.push(TempoSegment {
                tick: tempo.tick,
                micros_per_quarter: tempo.micros_per_quarter,
                start_seconds,
            });
            previous = Some(tempo);
        }

        Ok(Self {
            pulses_per_quarter_note,
            segments,
        })
    }

    /// A map with one constant tempo.
    pub fn constant(pulses_per_quarter_note: u32, micros_per_quarter: u32) -> Result<Self, TimelineError> {
        Self::new(
            pulses_per_quarter_note,
            &[TempoEvent::new(0, micros_per_quarter)],
        )
    }

    // -------------------------------
    // MARK: Lookups
    // -------------------------------

    /// Absolute time of a tick, accumulated piecewise over tempo changes.
    pub fn seconds_at(&self, tick: Tick) -> f64 {
        let segment = self.segment_for_tick(tick);
        segment.start_seconds
            + seconds_for(
                tick - segment.tick,
                self.pulses_per_quarter_note,
                segment.micros_per_quarter,
            )
    }

    /// Tempo in effect at a tick.
    pub fn tempo_at_tick(&self, tick: Tick) -> u32 {
        self.segment_for_tick(tick).micros_per_quarter
    }

    /// Tempo in effect at an absolute time.
    pub fn tempo_at_time(&self, seconds: f64) -> u32 {
        let idx = self
            .segments
            .partition_point(|s| s.start_seconds <= seconds)
            .saturating_sub(1);
        self.segments[idx].micros_per_quarter
    }

    /// Tempo in beats per minute at a tick.
    pub fn bpm_at_tick(&self, tick: Tick) -> f64 {
        60.0 * MICROS_PER_SECOND / self.tempo_at_tick(tick) as f64
    }

    #[inline]
    pub fn pulses_per_quarter_note(&self) -> u32 {
        self.pulses_per_quarter_note
    }

    /// Number of distinct tempo segments (including the implicit default).
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn segment_for_tick(&self, tick: Tick) -> &TempoSegment {
        // segments[0].tick == 0, so the partition point is always >= 1
        let idx = self
            .segments
            .partition_point(|s| s.tick <= tick)
            .saturating_sub(1);
        &self.segments[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_quarter_note_at_default_tempo() {
        let seconds = seconds_for(96, 96, 500_000);
        assert!((seconds - 0.5).abs() < EPSILON);

        let map = TempoMap::new(96, &[]).unwrap();
        assert!((map.seconds_at(96) - 0.5).abs() < EPSILON);
        assert_eq!(map.tempo_at_tick(1_000), DEFAULT_MICROS_PER_QUARTER);
    }

    #[test]
    fn test_seconds_for_matches_formula_and_is_monotonic() {
        for &(ppq, tempo) in &[(24u32, 250_000u32), (96, 500_000), (480, 731_707)] {
            let mut previous = -1.0;
            for tick in (0..10_000u64).step_by(37) {
                let seconds = seconds_for(tick, ppq, tempo);
                let expected = tick as f64 * (tempo as f64 / ppq as f64) / 1_000_000.0;
                assert!((seconds - expected).abs() < EPSILON);
                assert!(seconds > previous);
                previous = seconds;
            }
        }
    }

    #[test]
    fn test_piecewise_tempo_changes() {
        // 1 beat at 120 BPM, then 1 beat at 60 BPM
        let map = TempoMap::new(
            100,
            &[TempoEvent::new(0, 500_000), TempoEvent::new(100, 1_000_000)],
        )
        .unwrap();

        assert!((map.seconds_at(100) - 0.5).abs() < EPSILON);
        assert!((map.seconds_at(150) - 1.0).abs() < EPSILON);
        assert!((map.seconds_at(200) - 1.5).abs() < EPSILON);
        assert_eq!(map.tempo_at_tick(99), 500_000);
        assert_eq!(map.tempo_at_tick(100), 1_000_000);
        assert_eq!(map.tempo_at_time(0.49), 500_000);
        assert_eq!(map.tempo_at_time(0.5), 1_000_000);
        assert!((map.bpm_at_tick(0) - 120.0).abs() < EPSILON);
    }

    #[test]
    fn test_default_tempo_fills_leading_gap() {
        let map = TempoMap::new(96, &[TempoEvent::new(96, 1_000_000)]).unwrap();

        assert_eq!(map.segment_count(), 2);
        assert!((map.seconds_at(96) - 0.5).abs() < EPSILON);
        assert!((map.seconds_at(192) - 1.5).abs() < EPSILON);
    }

    #[test]
    fn test_last_tempo_on_same_tick_wins() {
        let map = TempoMap::new(
            96,
            &[TempoEvent::new(0, 500_000), TempoEvent::new(0, 250_000)],
        )
        .unwrap();

        assert_eq!(map.segment_count(), 1);
        assert_eq!(map.tempo_at_tick(0), 250_000);
    }

    #[test]
    fn test_unsorted_tempos_are_ordered() {
        let map = TempoMap::new(
            10,
            &[TempoEvent::new(20, 250_000), TempoEvent::new(0, 1_000_000)],
        )
        .unwrap();

        // 20 ticks at 1s/beat (2s), then 10 ticks at 0.25s/beat
        assert!((map.seconds_at(30) - 2.25).abs() < EPSILON);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert_eq!(
            TempoMap::new(0, &[]).unwrap_err(),
            TimelineError::NonPositiveResolution
        );
        assert_eq!(
            TempoMap::new(96, &[TempoEvent::new(48, 0)]).unwrap_err(),
            TimelineError::NonPositiveTempo { tick: 48 }
        );
    }
}

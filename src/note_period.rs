// src/note_period.rs
//
// Note periods: paired note-on/note-off windows in seconds.
//
// An index is built once per instrument part at load time and only read
// afterwards. Playback walks it forward; nothing is ever removed.

use std::collections::{HashMap, VecDeque};

use log::{debug, warn};
use serde::Serialize;

use crate::event::{MAX_PITCH, NoteEvent, Tick};
use crate::timeline::TempoMap;

/// The interval during which one pitch is sounding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NotePeriod {
    pub pitch: u8,
    pub channel: u8,

    /// Start time in seconds
    pub start: f64,

    /// End time in seconds (always > start)
    pub end: f64,

    pub start_tick: Tick,
    pub end_tick: Tick,
}

impl NotePeriod {
    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// True while `start <= time <= end`.
    #[inline]
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }

    /// Fraction of the period still to play at `time`, in [0, 1].
    #[inline]
    pub fn remaining_fraction(&self, time: f64) -> f64 {
        ((self.end - time) / self.duration()).clamp(0.0, 1.0)
    }

    #[inline]
    fn same_window(&self, other: &NotePeriod) -> bool {
        self.pitch == other.pitch
            && self.channel == other.channel
            && self.start_tick == other.start_tick
            && self.end_tick == other.end_tick
    }
}

/// Ordered note periods of one instrument part.
#[derive(Debug, Clone, Default)]
pub struct NotePeriodIndex {
    /// Sorted by (start tick, pitch)
    periods: Vec<NotePeriod>,
}

impl NotePeriodIndex {
    /// Pair note-ons with note-offs and convert them to seconds.
    ///
    /// A note-off closes the earliest still-open note-on of the same channel
    /// and pitch. Malformed and unterminated notes are dropped with a warning.
    pub fn build(events: &[NoteEvent], tempo_map: &TempoMap) -> Self {
        let mut pending: HashMap<(u8, u8), VecDeque<Tick>> = HashMap::new();
        let mut periods = Vec::new();

        for event in events {
            if event.pitch > MAX_PITCH {
                warn!(
                    "Dropping note event with pitch {} at tick {} (channel {})",
                    event.pitch, event.tick, event.channel
                );
                continue;
            }

            let key = (event.channel, event.pitch);

            if event.on {
                pending.entry(key).or_default().push_back(event.tick);
                continue;
            }

            let Some(start_tick) = pending.get_mut(&key).and_then(|q| q.pop_front()) else {
                debug!(
                    "Ignoring note-off without note-on: pitch {} at tick {} (channel {})",
                    event.pitch, event.tick, event.channel
                );
                continue;
            };

            if event.tick <= start_tick {
                warn!(
                    "Dropping zero-length note: pitch {} at tick {} (channel {})",
                    event.pitch, start_tick, event.channel
                );
                continue;
            }

            periods.push(NotePeriod {
                pitch: event.pitch,
                channel: event.channel,
                start: tempo_map.seconds_at(start_tick),
                end: tempo_map.seconds_at(event.tick),
                start_tick,
                end_tick: event.tick,
            });
        }

        let mut unterminated: Vec<_> = pending
            .into_iter()
            .flat_map(|((channel, pitch), ticks)| ticks.into_iter().map(move |t| (t, channel, pitch)))
            .collect();
        unterminated.sort_unstable();
        for (tick, channel, pitch) in unterminated {
            warn!(
                "Dropping unterminated note-on: pitch {} at tick {} (channel {})",
                pitch, tick, channel
            );
        }

        periods.sort_by_key(|p| (p.start_tick, p.pitch, p.end_tick, p.channel));

        let before = periods.len();
        periods.dedup_by(|a, b| a.same_window(b));
        if periods.len() != before {
            debug!("Removed {} duplicate note periods", before - periods.len());
        }

        Self { periods }
    }

    /// Wrap already-built periods, sorting them into playback order.
    pub fn from_periods(mut periods: Vec<NotePeriod>) -> Self {
        periods.retain(|p| p.start < p.end);
        periods.sort_by(|a, b| {
            a.start
                .total_cmp(&b.start)
                .then(a.pitch.cmp(&b.pitch))
        });
        Self { periods }
    }

    #[inline]
    pub fn periods(&self) -> &[NotePeriod] {
        &self.periods
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&NotePeriod> {
        self.periods.get(position)
    }

    /// Latest end time of any period (0 when empty).
    pub fn end_time(&self) -> f64 {
        self.periods.iter().map(|p| p.end).fold(0.0, f64::max)
    }

    /// Periods sounding at `time`, in playback order.
    pub fn periods_overlapping(&self, time: f64) -> Vec<&NotePeriod> {
        let started = self.periods.partition_point(|p| p.start <= time);
        self.periods[..started]
            .iter()
            .filter(|p| p.end >= time)
            .collect()
    }

    /// The period following `after` in playback order.
    pub fn next(&self, after: &NotePeriod) -> Option<&NotePeriod> {
        let first = self.periods.partition_point(|p| p.start < after.start);
        let position = self.periods[first..]
            .iter()
            .position(|p| p.same_window(after))?;
        self.periods.get(first + position + 1)
    }

    /// Split the periods into runs that overlap in time.
    ///
    /// Any amount of overlap joins a run; a period starting exactly when the
    /// run's furthest end is reached starts a new one.
    pub fn contiguous_groups(&self) -> Vec<NotePeriodGroup> {
        let mut groups = Vec::new();
        let mut current: Vec<NotePeriod> = Vec::new();
        let mut furthest: Tick = 0;

        for period in &self.periods {
            if !current.is_empty() && period.start_tick >= furthest {
                groups.push(NotePeriodGroup {
                    periods: std::mem::take(&mut current),
                });
                furthest = 0;
            }
            furthest = furthest.max(period.end_tick);
            current.push(*period);
        }

        if !current.is_empty() {
            groups.push(NotePeriodGroup { periods: current });
        }

        groups
    }
}

/// Note periods that overlap one another.
#[derive(Debug, Clone, PartialEq)]
pub struct NotePeriodGroup {
    pub periods: Vec<NotePeriod>,
}

impl NotePeriodGroup {
    pub fn start(&self) -> f64 {
        self.periods.iter().map(|p| p.start).fold(f64::INFINITY, f64::min)
    }

    pub fn end(&self) -> f64 {
        self.periods.iter().map(|p| p.end).fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn duration(&self) -> f64 {
        self.end() - self.start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tempo_map() -> TempoMap {
        // One tick per 10ms
        TempoMap::constant(50, 500_000).unwrap()
    }

    fn index(events: &[NoteEvent]) -> NotePeriodIndex {
        NotePeriodIndex::build(events, &tempo_map())
    }

    #[test]
    fn test_pairs_on_and_off() {
        let idx = index(&[NoteEvent::on(0, 60, 0), NoteEvent::off(100, 60, 0)]);

        assert_eq!(idx.len(), 1);
        let period = idx.periods()[0];
        assert_eq!(period.pitch, 60);
        assert!((period.start - 0.0).abs() < 1e-9);
        assert!((period.end - 1.0).abs() < 1e-9);
        assert!((period.duration() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_match_in_arrival_order() {
        // Two overlapping notes of the same pitch: the first off closes the first on
        let idx = index(&[
            NoteEvent::on(0, 60, 0),
            NoteEvent::on(10, 60, 0),
            NoteEvent::off(20, 60, 0),
            NoteEvent::off(40, 60, 0),
        ]);

        let ticks: Vec<_> = idx.periods().iter().map(|p| (p.start_tick, p.end_tick)).collect();
        assert_eq!(ticks, vec![(0, 20), (10, 40)]);
    }

    #[test]
    fn test_channels_pair_independently() {
        let idx = index(&[
            NoteEvent::on(0, 60, 0),
            NoteEvent::on(5, 60, 1),
            NoteEvent::off(10, 60, 1),
            NoteEvent::off(30, 60, 0),
        ]);

        let windows: Vec<_> = idx
            .periods()
            .iter()
            .map(|p| (p.channel, p.start_tick, p.end_tick))
            .collect();
        assert_eq!(windows, vec![(0, 0, 30), (1, 5, 10)]);
    }

    #[test]
    fn test_unterminated_and_malformed_dropped() {
        let idx = index(&[
            NoteEvent::on(0, 60, 0),
            NoteEvent::on(0, 200, 0),
            NoteEvent::off(5, 200, 0),
            NoteEvent::on(10, 62, 0),
            NoteEvent::off(10, 62, 0),
            NoteEvent::off(12, 64, 0),
            NoteEvent::on(20, 65, 0),
            NoteEvent::off(30, 65, 0),
        ]);

        assert_eq!(idx.len(), 1);
        assert_eq!(idx.periods()[0].pitch, 65);
    }

    #[test]
    fn test_exact_duplicates_removed() {
        let idx = index(&[
            NoteEvent::on(0, 60, 0),
            NoteEvent::on(0, 60, 0),
            NoteEvent::off(10, 60, 0),
            NoteEvent::off(10, 60, 0),
        ]);

        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn test_sorted_by_start_then_pitch() {
        let idx = index(&[
            NoteEvent::on(10, 50, 0),
            NoteEvent::on(0, 70, 0),
            NoteEvent::on(0, 64, 0),
            NoteEvent::off(20, 70, 0),
            NoteEvent::off(20, 64, 0),
            NoteEvent::off(30, 50, 0),
        ]);

        let pitches: Vec<_> = idx.periods().iter().map(|p| p.pitch).collect();
        assert_eq!(pitches, vec![64, 70, 50]);
    }

    #[test]
    fn test_periods_overlapping_and_next() {
        let idx = index(&[
            NoteEvent::on(0, 60, 0),
            NoteEvent::off(100, 60, 0),
            NoteEvent::on(50, 62, 0),
            NoteEvent::off(150, 62, 0),
            NoteEvent::on(200, 64, 0),
            NoteEvent::off(250, 64, 0),
        ]);

        let at = |t: f64| -> Vec<u8> { idx.periods_overlapping(t).iter().map(|p| p.pitch).collect() };
        assert_eq!(at(0.25), vec![60]);
        assert_eq!(at(0.75), vec![60, 62]);
        assert_eq!(at(1.75), Vec::<u8>::new());
        assert_eq!(at(2.0), vec![64]);

        let first = idx.periods()[0];
        let second = idx.next(&first).copied().unwrap();
        assert_eq!(second.pitch, 62);
        assert_eq!(idx.next(&second).unwrap().pitch, 64);
        assert!(idx.next(&idx.periods()[2]).is_none());
        assert!((idx.end_time() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_contiguous_groups() {
        let idx = index(&[
            // group 1: 0-10 and 5-20 overlap, 15-25 overlaps the second
            NoteEvent::on(0, 60, 0),
            NoteEvent::off(10, 60, 0),
            NoteEvent::on(5, 62, 0),
            NoteEvent::off(20, 62, 0),
            NoteEvent::on(15, 64, 0),
            NoteEvent::off(25, 64, 0),
            // group 2: starts exactly at the furthest end
            NoteEvent::on(25, 65, 0),
            NoteEvent::off(30, 65, 0),
        ]);

        let groups = idx.contiguous_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].periods.len(), 3);
        assert_eq!(groups[1].periods.len(), 1);
        assert!((groups[0].start() - 0.0).abs() < 1e-9);
        assert!((groups[0].end() - 0.25).abs() < 1e-9);
        assert!((groups[1].duration() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_contiguous_groups_empty_and_single() {
        assert!(NotePeriodIndex::default().contiguous_groups().is_empty());

        let idx = index(&[NoteEvent::on(0, 60, 0), NoteEvent::off(10, 60, 0)]);
        assert_eq!(idx.contiguous_groups().len(), 1);
    }
}

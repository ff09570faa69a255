// src/clone_allocator.rs

use log::debug;

use crate::clone::{CloneActor, CloneId};
use crate::note_period::{NotePeriod, NotePeriodIndex};

/// How a clone was chosen for a period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Assignment {
    /// Reused the clone that finished earliest before this period.
    Reused(CloneId),

    /// First period for a never-used clone.
    Fresh(CloneId),

    /// Pool exhausted: the clone ending soonest was taken over.
    Forced { clone: CloneId, evicted: NotePeriod },
}

impl Assignment {
    #[inline]
    pub fn clone_id(&self) -> CloneId {
        match *self {
            Assignment::Reused(id) | Assignment::Fresh(id) => id,
            Assignment::Forced { clone, .. } => clone,
        }
    }
}

/// Maps one instrument part's note periods onto a fixed pool of clones.
///
/// Responsibilities:
/// - own the clone pool
/// - dispatch periods in start order as playback reaches them
/// - keep one active period per clone, reusing clones across melodic runs
///
/// Does NOT:
/// - animate clones
/// - grow the pool (exhaustion degrades to forced reassignment)
pub struct CloneAllocator {
    clones: Vec<CloneActor>,

    /// Next undispatched period in the index
    cursor: usize,

    forced: usize,
}

impl CloneAllocator {
    pub fn new(pool_size: usize) -> Self {
        let clones = (0..pool_size.max(1)).map(CloneActor::new).collect();
        Self {
            clones,
            cursor: 0,
            forced: 0,
        }
    }

    /// Dispatch every period that has started by `time`.
    ///
    /// Returns the number of periods dispatched. Calling again with the same
    /// time dispatches nothing.
    pub fn advance(&mut self, time: f64, index: &NotePeriodIndex) -> usize {
        let mut dispatched = 0;

        while let Some(period) = index.get(self.cursor) {
            if period.start > time {
                break;
            }
            self.assign(*period);
            self.cursor += 1;
            dispatched += 1;
        }

        dispatched
    }

    /// Choose a clone for `period` and hand it over.
    ///
    /// Policy, in order:
    /// 1. the used clone whose last period ended earliest, at or before `period.start`
    /// 2. the lowest-numbered clone never used
    /// 3. the clone whose active period ends soonest (forced)
    pub fn assign(&mut self, period: NotePeriod) -> Assignment {
        let assignment = self.select(&period);
        let id = assignment.clone_id();
        let pool = self.clones.len();

        match self.clones[id].assign(period) {
            Some(evicted) => {
                self.forced += 1;
                debug!(
                    "Clone pool exhausted ({} clones): clone {} cuts pitch {} short for pitch {} at {:.3}s",
                    pool, id, evicted.pitch, period.pitch, period.start
                );
                Assignment::Forced { clone: id, evicted }
            }
            None => assignment,
        }
    }

    fn select(&self, period: &NotePeriod) -> Assignment {
        let finished = self
            .clones
            .iter()
            .filter_map(|c| c.last_end().filter(|end| *end <= period.start).map(|end| (c.id, end)))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((id, _)) = finished {
            return Assignment::Reused(id);
        }

        if let Some(fresh) = self.clones.iter().find(|c| !c.has_played()) {
            return Assignment::Fresh(fresh.id);
        }

        // Every clone is busy past `period.start`
        let soonest = self
            .clones
            .iter()
            .filter_map(|c| c.last_end().map(|end| (c.id, end)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
            .unwrap_or(0);
        Assignment::Reused(soonest)
    }

    /// Rewind to the start of the performance.
    pub fn reset(&mut self) {
        for clone in &mut self.clones {
            clone.reset();
        }
        self.cursor = 0;
        self.forced = 0;
    }

    #[inline]
    pub fn clones(&self) -> &[CloneActor] {
        &self.clones
    }

    #[inline]
    pub fn clones_mut(&mut self) -> &mut [CloneActor] {
        &mut self.clones
    }

    #[inline]
    pub fn get(&self, id: CloneId) -> Option<&CloneActor> {
        self.clones.get(id)
    }

    #[inline]
    pub fn pool_size(&self) -> usize {
        self.clones.len()
    }

    /// Number of clones holding a period that covers `time`.
    pub fn active_count(&self, time: f64) -> usize {
        self.clones
            .iter()
            .filter(|c| c.current().is_some_and(|p| p.contains(time)))
            .count()
    }

    /// How many times the pool ran dry and a clone was taken over.
    #[inline]
    pub fn forced_reassignments(&self) -> usize {
        self.forced
    }

    /// Position of the next undispatched period.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn period(pitch: u8, start: f64, end: f64) -> NotePeriod {
        NotePeriod {
            pitch,
            channel: 0,
            start,
            end,
            start_tick: (start * 1000.0) as u64,
            end_tick: (end * 1000.0) as u64,
        }
    }

    /// Max number of periods sounding at once (half-open intervals).
    fn max_polyphony(periods: &[NotePeriod]) -> usize {
        let mut edges: Vec<(f64, i32)> = periods
            .iter()
            .flat_map(|p| [(p.start, 1), (p.end, -1)])
            .collect();
        // Ends sort before starts at the same instant
        edges.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let mut live = 0;
        let mut peak = 0;
        for (_, delta) in edges {
            live += delta;
            peak = peak.max(live);
        }
        peak as usize
    }

    #[test]
    fn test_overlapping_periods_get_distinct_clones_then_forced() {
        let mut allocator = CloneAllocator::new(2);

        let a = allocator.assign(period(60, 0.0, 2.0));
        let b = allocator.assign(period(62, 1.0, 3.0));
        assert_eq!(a, Assignment::Fresh(0));
        assert_eq!(b, Assignment::Fresh(1));

        let c = allocator.assign(period(64, 1.5, 2.5));
        match c {
            Assignment::Forced { clone, evicted } => {
                assert_eq!(clone, 0);
                assert_eq!(evicted.pitch, 60);
            }
            other => panic!("expected forced reassignment, got {:?}", other),
        }
        assert_eq!(allocator.forced_reassignments(), 1);
        assert_eq!(allocator.get(0).unwrap().current().unwrap().pitch, 64);
    }

    #[test]
    fn test_melody_stays_on_one_clone() {
        let mut allocator = CloneAllocator::new(4);
        for i in 0..8 {
            let start = i as f64 * 0.5;
            let assignment = allocator.assign(period(60 + i as u8, start, start + 0.5));
            assert_eq!(assignment.clone_id(), 0);
        }
        assert!(allocator.clones()[1..].iter().all(|c| !c.has_played()));
    }

    #[test]
    fn test_earliest_finished_clone_is_reused() {
        let mut allocator = CloneAllocator::new(3);
        allocator.assign(period(60, 0.0, 3.0)); // clone 0 ends at 3
        allocator.assign(period(62, 0.0, 1.0)); // clone 1 ends at 1
        allocator.assign(period(64, 0.0, 2.0)); // clone 2 ends at 2

        assert_eq!(allocator.assign(period(65, 3.0, 4.0)), Assignment::Reused(1));
        // Clone 2 (ended at 2) is now the earliest finished
        assert_eq!(allocator.assign(period(67, 3.0, 4.0)), Assignment::Reused(2));
    }

    #[test]
    fn test_never_overlaps_when_pool_is_large_enough() {
        let mut rng = SmallRng::seed_from_u64(7);

        for _ in 0..50 {
            let mut periods: Vec<NotePeriod> = (0..40)
                .map(|i| {
                    let start = rng.random_range(0.0..20.0);
                    let length = rng.random_range(0.05..3.0);
                    period((40 + i % 40) as u8, start, start + length)
                })
                .collect();
            periods.sort_by(|a, b| a.start.total_cmp(&b.start));

            let pool = max_polyphony(&periods);
            let mut allocator = CloneAllocator::new(pool);
            let mut per_clone: Vec<Vec<NotePeriod>> = vec![Vec::new(); pool];

            for p in &periods {
                let assignment = allocator.assign(*p);
                assert!(!matches!(assignment, Assignment::Forced { .. }));
                per_clone[assignment.clone_id()].push(*p);
            }

            for assigned in &per_clone {
                for pair in assigned.windows(2) {
                    assert!(pair[0].end <= pair[1].start);
                }
            }
            assert_eq!(allocator.forced_reassignments(), 0);
        }
    }

    #[test]
    fn test_advance_dispatches_in_order_and_is_idempotent() {
        let index = NotePeriodIndex::from_periods(vec![
            period(60, 0.0, 1.0),
            period(62, 0.5, 1.5),
            period(64, 2.0, 3.0),
        ]);
        let mut allocator = CloneAllocator::new(2);

        assert_eq!(allocator.advance(0.6, &index), 2);
        let snapshot: Vec<_> = allocator.clones().iter().map(|c| c.current().copied()).collect();

        assert_eq!(allocator.advance(0.6, &index), 0);
        let again: Vec<_> = allocator.clones().iter().map(|c| c.current().copied()).collect();
        assert_eq!(snapshot, again);
        assert_eq!(allocator.active_count(0.6), 2);

        assert_eq!(allocator.advance(2.0, &index), 1);
        assert_eq!(allocator.cursor(), 3);
        // Pitch 64 reuses clone 0, which finished first
        assert_eq!(allocator.get(0).unwrap().current().unwrap().pitch, 64);
    }

    #[test]
    fn test_reset_rewinds() {
        let index = NotePeriodIndex::from_periods(vec![period(60, 0.0, 1.0)]);
        let mut allocator = CloneAllocator::new(1);
        allocator.advance(5.0, &index);
        allocator.reset();

        assert_eq!(allocator.cursor(), 0);
        assert!(!allocator.clones()[0].has_played());
        assert_eq!(allocator.advance(0.0, &index), 1);
    }

    #[test]
    fn test_zero_pool_still_has_one_clone() {
        assert_eq!(CloneAllocator::new(0).pool_size(), 1);
    }
}

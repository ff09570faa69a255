// src/clone.rs

use serde::{Deserialize, Serialize};

use crate::note_period::NotePeriod;
use crate::pose::Axis;
use crate::resolver::{PositionDescriptor, PositionResolver};

pub type CloneId = usize;

/// Where a clone is in its note-period state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClonePhase {
    /// No note, or the note has ended. Neutral pose.
    Idle,

    /// `start <= t <= end` of the current note period.
    Sounding,
}

/// How a sounding clone deforms as its note runs out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloneMotion {
    /// Axis the playing rotation turns about
    pub rotation_axis: Axis,

    /// Rotation (radians) at the very start of a note, easing to 0 at its end
    pub rotation_factor: f32,

    /// Extra stretch at the start of a note; `stretch = amount * remaining + 1`
    pub stretch_amount: f32,
}

impl Default for CloneMotion {
    fn default() -> Self {
        Self {
            rotation_axis: Axis::X,
            rotation_factor: 0.1,
            stretch_amount: 0.0,
        }
    }
}

/// One reusable visual actor.
///
/// Clones do NOT own visuals.
/// Visual selection lives in the instrument's `CloneVisual` for this id.
#[derive(Debug, Clone)]
pub struct CloneActor {
    pub id: CloneId,
    current: Option<NotePeriod>,

    /// End of the most recently assigned period, kept after it finishes
    last_end: Option<f64>,

    phase: ClonePhase,
    rotation: [f32; 3],
    stretch: f32,
    descriptor: Option<PositionDescriptor>,
}

impl CloneActor {
    #[inline]
    pub fn new(id: CloneId) -> Self {
        Self {
            id,
            current: None,
            last_end: None,
            phase: ClonePhase::Idle,
            rotation: [0.0; 3],
            stretch: 1.0,
            descriptor: None,
        }
    }

    /// Hand this clone a new note period.
    ///
    /// Returns the period that was cut short, if the old one was still
    /// running when the new one starts.
    pub fn assign(&mut self, period: NotePeriod) -> Option<NotePeriod> {
        let evicted = self.current.filter(|old| old.end > period.start);
        self.current = Some(period);
        self.last_end = Some(period.end);
        evicted
    }

    /// Re-evaluate the state machine at `time`.
    pub fn animate(
        &mut self,
        time: f64,
        resolver: &dyn PositionResolver,
        motion: &CloneMotion,
    ) -> ClonePhase {
        if self.current.is_some_and(|p| time > p.end) {
            self.current = None;
        }

        match self.current {
            Some(period) if period.contains(time) => {
                self.phase = ClonePhase::Sounding;
                self.descriptor = resolver.resolve(period.pitch);

                if self.descriptor.is_some() {
                    let remaining = period.remaining_fraction(time) as f32;
                    self.stretch = motion.stretch_amount * remaining + 1.0;
                    self.rotation = motion
                        .rotation_axis
                        .vector(-remaining * motion.rotation_factor);
                } else {
                    self.rest();
                }
            }
            _ => {
                self.phase = ClonePhase::Idle;
                self.descriptor = None;
                self.rest();
            }
        }

        self.phase
    }

    /// Visible after its note for `linger` seconds.
    pub fn lingers(&self, time: f64, linger: f64) -> bool {
        self.last_end
            .is_some_and(|end| time >= end && time - end <= linger)
    }

    /// Forget all assignments (seek back to the start).
    pub fn reset(&mut self) {
        *self = Self::new(self.id);
    }

    #[inline]
    fn rest(&mut self) {
        self.rotation = [0.0; 3];
        self.stretch = 1.0;
    }

    // -------------------------------
    // MARK: Accessors
    // -------------------------------

    #[inline]
    pub fn current(&self) -> Option<&NotePeriod> {
        self.current.as_ref()
    }

    #[inline]
    pub fn last_end(&self) -> Option<f64> {
        self.last_end
    }

    /// True once any period has been assigned.
    #[inline]
    pub fn has_played(&self) -> bool {
        self.last_end.is_some()
    }

    #[inline]
    pub fn phase(&self) -> ClonePhase {
        self.phase
    }

    #[inline]
    pub fn is_sounding(&self) -> bool {
        self.phase == ClonePhase::Sounding
    }

    #[inline]
    pub fn rotation(&self) -> [f32; 3] {
        self.rotation
    }

    #[inline]
    pub fn stretch(&self) -> f32 {
        self.stretch
    }

    #[inline]
    pub fn descriptor(&self) -> Option<&PositionDescriptor> {
        self.descriptor.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{FingeringTable, MappingType, NoFingering};

    fn period(pitch: u8, start: f64, end: f64) -> NotePeriod {
        NotePeriod {
            pitch,
            channel: 0,
            start,
            end,
            start_tick: (start * 100.0) as u64,
            end_tick: (end * 100.0) as u64,
        }
    }

    fn hands_for(pitch: u8) -> FingeringTable {
        let mut table = FingeringTable::new(MappingType::Hands);
        table
            .insert(pitch, PositionDescriptor::Hands { left: 2, right: 5 })
            .unwrap();
        table
    }

    fn motion() -> CloneMotion {
        CloneMotion {
            rotation_axis: Axis::X,
            rotation_factor: 0.4,
            stretch_amount: 0.5,
        }
    }

    #[test]
    fn test_new_clone_is_idle_and_neutral() {
        let mut clone = CloneActor::new(0);
        assert_eq!(clone.animate(1.0, &NoFingering, &motion()), ClonePhase::Idle);
        assert_eq!(clone.stretch(), 1.0);
        assert_eq!(clone.rotation(), [0.0; 3]);
        assert!(!clone.has_played());
    }

    #[test]
    fn test_sounding_deforms_toward_rest() {
        let resolver = hands_for(60);
        let mut clone = CloneActor::new(0);
        clone.assign(period(60, 1.0, 3.0));

        assert_eq!(clone.animate(1.0, &resolver, &motion()), ClonePhase::Sounding);
        assert!((clone.stretch() - 1.5).abs() < 1e-6);
        assert!((clone.rotation()[0] + 0.4).abs() < 1e-6);

        clone.animate(2.0, &resolver, &motion());
        assert!((clone.stretch() - 1.25).abs() < 1e-6);
        assert!((clone.rotation()[0] + 0.2).abs() < 1e-6);
        assert_eq!(
            clone.descriptor(),
            Some(&PositionDescriptor::Hands { left: 2, right: 5 })
        );

        clone.animate(3.0, &resolver, &motion());
        assert!(clone.is_sounding());
        assert!((clone.stretch() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_passes_end_to_idle() {
        let resolver = hands_for(60);
        let mut clone = CloneActor::new(0);
        clone.assign(period(60, 1.0, 2.0));
        clone.animate(1.5, &resolver, &motion());

        assert_eq!(clone.animate(2.01, &resolver, &motion()), ClonePhase::Idle);
        assert!(clone.current().is_none());
        assert!(clone.descriptor().is_none());
        assert_eq!(clone.stretch(), 1.0);
        assert_eq!(clone.last_end(), Some(2.0));
    }

    #[test]
    fn test_absent_descriptor_keeps_neutral_pose() {
        let mut clone = CloneActor::new(0);
        clone.assign(period(61, 0.0, 10.0));

        for step in 0..=100 {
            let t = step as f64 * 0.1;
            assert_eq!(clone.animate(t, &NoFingering, &motion()), ClonePhase::Sounding);
            assert_eq!(clone.rotation(), [0.0; 3]);
            assert_eq!(clone.stretch(), 1.0);
            assert!(clone.descriptor().is_none());
        }
    }

    #[test]
    fn test_pending_period_is_idle() {
        let resolver = hands_for(60);
        let mut clone = CloneActor::new(0);
        clone.assign(period(60, 5.0, 6.0));

        assert_eq!(clone.animate(4.0, &resolver, &motion()), ClonePhase::Idle);
        assert!(clone.current().is_some());
    }

    #[test]
    fn test_assign_reports_evicted_period() {
        let mut clone = CloneActor::new(0);
        assert!(clone.assign(period(60, 0.0, 2.0)).is_none());
        assert_eq!(clone.assign(period(62, 1.0, 3.0)).map(|p| p.pitch), Some(60));
        // Back-to-back is not an eviction
        assert!(clone.assign(period(64, 3.0, 4.0)).is_none());
    }

    #[test]
    fn test_lingers_after_end() {
        let mut clone = CloneActor::new(1);
        clone.assign(period(60, 0.0, 1.0));

        assert!(clone.lingers(1.2, 0.25));
        assert!(!clone.lingers(1.3, 0.25));
        assert!(!clone.lingers(0.5, 0.25));

        clone.reset();
        assert!(!clone.has_played());
        assert_eq!(clone.id, 1);
    }
}

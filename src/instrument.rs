// src/instrument.rs
//
// One instrument part: its note periods, clone pool, visuals, resolver and
// optional puffer, updated together once per frame.

use std::sync::Arc;

use crate::clone::CloneMotion;
use crate::clone_allocator::CloneAllocator;
use crate::config::InstrumentConfig;
use crate::note_period::NotePeriodIndex;
use crate::particle::Puffer;
use crate::pose::{ClonePose, InstrumentFrame};
use crate::resolver::PositionResolver;
use crate::visual::{CloneVisual, VisualAsset};

pub struct Instrument {
    name: String,
    motion: CloneMotion,
    linger_seconds: f64,

    /// Shared read-only with nothing else writing during playback
    index: Arc<NotePeriodIndex>,
    resolver: Arc<dyn PositionResolver>,

    allocator: CloneAllocator,

    /// One per clone, same order as the allocator's pool
    visuals: Vec<Box<dyn CloneVisual>>,

    puffer: Option<Puffer>,
}

impl Instrument {
    /// Assemble a part. `visuals` must hold one entry per clone.
    pub fn new(
        config: &InstrumentConfig,
        index: Arc<NotePeriodIndex>,
        resolver: Arc<dyn PositionResolver>,
        visuals: Vec<Box<dyn CloneVisual>>,
        puffer: Option<Puffer>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            motion: config.motion,
            linger_seconds: config.linger_seconds,
            index,
            resolver,
            allocator: CloneAllocator::new(visuals.len()),
            visuals,
            puffer,
        }
    }

    /// Advance to `time` and produce this frame's poses.
    ///
    /// Order within the frame:
    /// 1. dispatch started note periods to clones
    /// 2. run each clone's state machine (resolver queries)
    /// 3. visibility, then rank among visible clones, then placement
    /// 4. puffer, driven by whether any clone is sounding
    pub fn tick(&mut self, time: f64, delta: f64) -> InstrumentFrame {
        self.allocator.advance(time, &self.index);

        let resolver = self.resolver.as_ref();
        let motion = self.motion;
        let linger = self.linger_seconds;

        let mut clones: Vec<ClonePose> = self
            .allocator
            .clones_mut()
            .iter_mut()
            .zip(self.visuals.iter_mut())
            .map(|(clone, visual)| {
                clone.animate(time, resolver, &motion);
                let discrete = visual.tick(clone.descriptor());
                let visible = clone.id == 0 || clone.is_sounding() || clone.lingers(time, linger);

                ClonePose {
                    clone_id: clone.id,
                    visible,
                    rank: 0,
                    offset: Default::default(),
                    rotation: clone.rotation(),
                    stretch: clone.stretch(),
                    discrete,
                    pitch: clone
                        .current()
                        .filter(|_| clone.is_sounding())
                        .map(|p| p.pitch),
                }
            })
            .collect();

        // Rank depends on every clone's visibility this frame
        let mut rank = 0;
        for pose in clones.iter_mut().filter(|p| p.visible) {
            pose.rank = rank;
            pose.offset = self.visuals[pose.clone_id].move_for_polyphony(rank);
            rank += 1;
        }

        let sounding = self.allocator.clones().iter().any(|c| c.is_sounding());
        let (particles, released) = match self.puffer.as_mut() {
            Some(puffer) => {
                let report = puffer.tick(delta, sounding);
                (puffer.poses(), report.released)
            }
            None => (Vec::new(), Vec::new()),
        };

        InstrumentFrame {
            name: self.name.clone(),
            clones,
            particles,
            released,
        }
    }

    /// Rewind to the start. Returns particles to release.
    pub fn reset(&mut self) -> Vec<u64> {
        self.allocator.reset();
        self.puffer.as_mut().map(Puffer::clear).unwrap_or_default()
    }

    /// Every model the asset collaborator must load for this part.
    pub fn load_visuals(&self) -> Vec<VisualAsset> {
        self.visuals.iter().flat_map(|v| v.load_visuals()).collect()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn index(&self) -> &NotePeriodIndex {
        &self.index
    }

    #[inline]
    pub fn allocator(&self) -> &CloneAllocator {
        &self.allocator
    }

    #[inline]
    pub fn puffer(&self) -> Option<&Puffer> {
        self.puffer.as_ref()
    }
}

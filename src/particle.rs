// src/particle.rs
//
// Steam puffs: short-lived particle clouds spawned while an instrument is
// active (breath, air, steam).
//
// Each frame:
// 1. spawn clouds if active (about 60 per second, independent of frame rate)
// 2. age every cloud
// 3. despawn clouds past their life span, reporting them for release

use log::debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::pose::{Axis, ParticlePose};

pub type ParticleId = u64;

/// Clouds spawned per second of frame time.
const SPAWN_RATE_HZ: f64 = 60.0;

/// Slack so that e.g. `1/30 * 60` floors to 2, not 1.
const SPAWN_EPSILON: f64 = 1e-9;

/// Quartic ease-out: `1 - (1 - x)^4`, with `x` clamped to [0, 1].
#[inline]
pub fn ease_out_quart(x: f64) -> f64 {
    let inv = 1.0 - x.clamp(0.0, 1.0);
    1.0 - inv * inv * inv * inv
}

/// Clouds to spawn for one active frame: `max(1, floor(delta * 60))`,
/// clamped to `max_per_tick`.
#[inline]
pub fn spawn_count(delta: f64, max_per_tick: usize) -> usize {
    let wanted = ((delta.max(0.0) * SPAWN_RATE_HZ) + SPAWN_EPSILON).floor() as usize;
    wanted.max(1).min(max_per_tick.max(1))
}

/// How clouds travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PuffBehavior {
    /// Along the primary axis, with small lateral drift.
    #[default]
    Outwards,

    /// Out along X while rising steadily on Y.
    Upwards,
}

/// Cloud texture, passed through to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PuffTexture {
    #[default]
    Normal,
    Harmonica,
    Pop,
    Whistle,
}

/// Tuning for one puffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PufferConfig {
    pub behavior: PuffBehavior,
    pub texture: PuffTexture,

    /// Primary travel axis (outwards behavior)
    pub axis: Axis,

    /// Overall cloud size multiplier
    pub scale: f32,

    /// Distance travelled along the primary axis at full ease
    pub travel_distance: f32,

    /// Life gained per second of frame time
    pub age_rate: f64,

    /// Clouds strictly older than this despawn
    pub life_span: f64,

    /// Upper bound on clouds spawned in one frame (delta spike guard)
    pub max_spawn_per_tick: usize,
}

impl Default for PufferConfig {
    fn default() -> Self {
        Self {
            behavior: PuffBehavior::Outwards,
            texture: PuffTexture::Normal,
            axis: Axis::X,
            scale: 1.0,
            travel_distance: 6.0,
            age_rate: 1.5,
            life_span: 0.7,
            max_spawn_per_tick: 12,
        }
    }
}

/// One particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cloud {
    pub id: ParticleId,

    /// Seconds of (scaled) age since spawn
    pub life: f64,

    /// Lateral drift, in [-0.75, 0.75)
    pub offset_a: f32,
    pub offset_b: f32,
}

/// What changed during one `Puffer::tick`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleTick {
    pub spawned: usize,
    pub released: Vec<ParticleId>,
}

/// Spawns, ages, and despawns clouds for one emitter.
pub struct Puffer {
    config: PufferConfig,
    clouds: Vec<Cloud>,
    next_id: ParticleId,
    rng: SmallRng,
}

impl Puffer {
    pub fn new(config: PufferConfig, seed: u64) -> Self {
        Self {
            config,
            clouds: Vec::with_capacity(64),
            next_id: 0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Advance the simulation by `delta` seconds.
    pub fn tick(&mut self, delta: f64, active: bool) -> ParticleTick {
        let mut report = ParticleTick::default();

        if active {
            let count = spawn_count(delta, self.config.max_spawn_per_tick);
            if count == self.config.max_spawn_per_tick && delta * SPAWN_RATE_HZ > count as f64 + 1.0 {
                debug!(
                    "Clamped cloud spawn to {} for a {:.3}s frame",
                    count, delta
                );
            }
            for _ in 0..count {
                self.spawn();
            }
            report.spawned = count;
        }

        let aging = delta.max(0.0) * self.config.age_rate;
        let life_span = self.config.life_span;

        self.clouds.retain_mut(|cloud| {
            cloud.life += aging;
            if cloud.life > life_span {
                report.released.push(cloud.id);
                false
            } else {
                true
            }
        });

        report
    }

    fn spawn(&mut self) {
        let offset_a = (self.rng.random::<f32>() - 0.5) * 1.5;
        let offset_b = (self.rng.random::<f32>() - 0.5) * 1.5;
        self.clouds.push(Cloud {
            id: self.next_id,
            life: 0.0,
            offset_a,
            offset_b,
        });
        self.next_id += 1;
    }

    /// Pose of one cloud, relative to the puffer's origin.
    pub fn pose_of(&self, cloud: &Cloud) -> ParticlePose {
        let ease = ease_out_quart(cloud.life) as f32;
        let travel = ease * self.config.travel_distance;

        let translation = match self.config.behavior {
            PuffBehavior::Outwards => {
                let (a, b) = self.config.axis.lateral();
                let mut v = self.config.axis.vector(travel);
                v[a.index()] = ease * cloud.offset_a;
                v[b.index()] = ease * cloud.offset_b;
                v
            }
            PuffBehavior::Upwards => [travel, (cloud.life * 10.0) as f32, ease * cloud.offset_a],
        };

        ParticlePose {
            id: cloud.id,
            translation,
            scale: (0.75 * cloud.life as f32 + 0.75) * self.config.scale,
            texture: self.config.texture,
        }
    }

    /// Poses of every live cloud.
    pub fn poses(&self) -> Vec<ParticlePose> {
        self.clouds.iter().map(|c| self.pose_of(c)).collect()
    }

    /// Drop every cloud, returning their ids for release.
    pub fn clear(&mut self) -> Vec<ParticleId> {
        self.clouds.drain(..).map(|c| c.id).collect()
    }

    #[inline]
    pub fn clouds(&self) -> &[Cloud] {
        &self.clouds
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.clouds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clouds.is_empty()
    }

    #[inline]
    pub fn config(&self) -> &PufferConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ease_endpoints_and_monotonic() {
        assert_eq!(ease_out_quart(0.0), 0.0);
        assert_eq!(ease_out_quart(1.0), 1.0);
        assert!((ease_out_quart(0.5) - 0.9375).abs() < 1e-12);

        let mut previous = 0.0;
        for i in 0..=1000 {
            let value = ease_out_quart(i as f64 / 1000.0);
            assert!(value >= previous);
            previous = value;
        }

        // Out of range input is clamped
        assert_eq!(ease_out_quart(-0.5), 0.0);
        assert_eq!(ease_out_quart(1.5), 1.0);
    }

    #[test]
    fn test_spawn_count_tracks_frame_rate() {
        assert_eq!(spawn_count(1.0 / 60.0, 12), 1);
        assert_eq!(spawn_count(1.0 / 30.0, 12), 2);
        assert_eq!(spawn_count(1.0 / 144.0, 12), 1);
        assert_eq!(spawn_count(0.0, 12), 1);
        // A stalled frame is clamped
        assert_eq!(spawn_count(5.0, 12), 12);
    }

    #[test]
    fn test_thirty_fps_spawns_two() {
        let mut puffer = Puffer::new(PufferConfig::default(), 1);
        let report = puffer.tick(1.0 / 30.0, true);

        assert_eq!(report.spawned, 2);
        assert_eq!(puffer.len(), 2);
        assert!(report.released.is_empty());
        for cloud in puffer.clouds() {
            assert!((cloud.life - 0.05).abs() < 1e-9);
        }
    }

    #[test]
    fn test_cloud_despawns_past_life_span() {
        let mut puffer = Puffer::new(PufferConfig::default(), 1);
        puffer.tick(0.0, true);
        assert_eq!(puffer.len(), 1);
        assert_eq!(puffer.clouds()[0].life, 0.0);

        let report = puffer.tick(0.47, false);
        assert_eq!(report.spawned, 0);
        assert_eq!(report.released, vec![0]);
        assert!(puffer.is_empty());
    }

    #[test]
    fn test_cloud_at_exact_life_span_survives_one_more_tick() {
        let mut puffer = Puffer::new(PufferConfig::default(), 1);
        puffer.tick(0.0, true);

        // life == life_span is still alive; only strictly older clouds go
        let report = puffer.tick(0.7 / 1.5, false);
        assert!(report.released.is_empty());
        assert_eq!(puffer.clouds()[0].life, 0.7);

        let report = puffer.tick(1e-6, false);
        assert_eq!(report.released, vec![0]);
        assert!(puffer.is_empty());
    }

    #[test]
    fn test_inactive_puffer_only_ages() {
        let mut puffer = Puffer::new(PufferConfig::default(), 3);
        puffer.tick(1.0 / 60.0, true);
        puffer.tick(1.0 / 60.0, false);

        assert_eq!(puffer.len(), 1);
        assert!((puffer.clouds()[0].life - 2.0 * 1.5 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_population_is_bounded_by_rate_and_life() {
        let mut puffer = Puffer::new(PufferConfig::default(), 9);
        for _ in 0..600 {
            puffer.tick(1.0 / 60.0, true);
        }
        // One per frame, each living 0.7 / 1.5 s
        assert!(puffer.len() <= 29);
        assert!(puffer.len() >= 27);
    }

    #[test]
    fn test_outwards_pose() {
        let config = PufferConfig {
            axis: Axis::Y,
            scale: 2.0,
            ..PufferConfig::default()
        };
        let puffer = Puffer::new(config, 0);
        let cloud = Cloud {
            id: 4,
            life: 0.5,
            offset_a: 0.5,
            offset_b: -0.5,
        };

        let pose = puffer.pose_of(&cloud);
        let ease = 0.9375f32;
        assert!((pose.translation[1] - ease * 6.0).abs() < 1e-5);
        assert!((pose.translation[0] - ease * 0.5).abs() < 1e-5);
        assert!((pose.translation[2] + ease * 0.5).abs() < 1e-5);
        assert!((pose.scale - (0.75 * 0.5 + 0.75) * 2.0).abs() < 1e-5);
        assert_eq!(pose.id, 4);
    }

    #[test]
    fn test_upwards_pose_rises() {
        let config = PufferConfig {
            behavior: PuffBehavior::Upwards,
            ..PufferConfig::default()
        };
        let puffer = Puffer::new(config, 0);
        let cloud = Cloud {
            id: 0,
            life: 0.25,
            offset_a: 0.0,
            offset_b: 0.0,
        };

        let pose = puffer.pose_of(&cloud);
        assert!((pose.translation[1] - 2.5).abs() < 1e-5);
        assert!(pose.translation[0] > 0.0);
    }

    #[test]
    fn test_offsets_are_seeded_and_bounded() {
        let mut a = Puffer::new(PufferConfig::default(), 42);
        let mut b = Puffer::new(PufferConfig::default(), 42);
        for _ in 0..10 {
            a.tick(1.0 / 60.0, true);
            b.tick(1.0 / 60.0, true);
        }

        assert_eq!(a.clouds(), b.clouds());
        for cloud in a.clouds() {
            assert!(cloud.offset_a >= -0.75 && cloud.offset_a < 0.75);
            assert!(cloud.offset_b >= -0.75 && cloud.offset_b < 0.75);
        }
        assert_eq!(a.clear().len(), 10);
        assert!(a.is_empty());
    }
}

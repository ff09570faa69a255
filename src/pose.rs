// src/pose.rs
//
// Per-frame output handed to the rendering collaborator.
//
// Everything here is plain data, rebuilt each frame. The simulation never
// touches rendering objects; the renderer applies these values.

use serde::{Deserialize, Serialize};

use crate::particle::{ParticleId, PuffTexture};
use crate::resolver::PositionDescriptor;

/// A principal axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    X,
    Y,
    Z,
}

impl Axis {
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// A vector with `amount` on this axis and zero elsewhere.
    #[inline]
    pub fn vector(self, amount: f32) -> [f32; 3] {
        let mut v = [0.0; 3];
        v[self.index()] = amount;
        v
    }

    /// The two remaining axes, in X→Y→Z order.
    #[inline]
    pub fn lateral(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::X, Axis::Z),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }
}

/// Translation plus Euler rotation (radians).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: [f32; 3],
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: [0.0; 3],
        rotation: [0.0; 3],
    };
}

/// Which sub-models of a clone are shown.
///
/// Snaps between values; never interpolated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscretePose {
    /// Rest configuration (hand models 0, no keys pressed).
    #[default]
    Neutral,

    Hands { left: u8, right: u8 },

    Keys { pressed: Vec<u8> },
}

impl From<PositionDescriptor> for DiscretePose {
    fn from(descriptor: PositionDescriptor) -> Self {
        match descriptor {
            PositionDescriptor::Hands { left, right } => DiscretePose::Hands { left, right },
            PositionDescriptor::Keys { pressed } => DiscretePose::Keys { pressed },
        }
    }
}

/// Pose of one clone for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClonePose {
    pub clone_id: usize,
    pub visible: bool,

    /// Position among visible sibling clones
    pub rank: usize,

    /// Placement away from sibling clones
    pub offset: Transform,

    /// Playing rotation (radians, on the instrument's axis)
    pub rotation: [f32; 3],

    /// Continuous deformation; 1 at rest
    pub stretch: f32,

    pub discrete: DiscretePose,

    /// Pitch being animated, while sounding
    pub pitch: Option<u8>,
}

/// Pose of one particle for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParticlePose {
    pub id: ParticleId,
    pub translation: [f32; 3],
    pub scale: f32,
    pub texture: PuffTexture,
}

/// Everything one instrument part shows this frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentFrame {
    pub name: String,
    pub clones: Vec<ClonePose>,
    pub particles: Vec<ParticlePose>,

    /// Particles despawned this frame; free their visuals now
    pub released: Vec<ParticleId>,
}

/// Output of one `Performance::tick`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceFrame {
    pub time: f64,
    pub instruments: Vec<InstrumentFrame>,
}

impl PerformanceFrame {
    pub fn visible_clone_count(&self) -> usize {
        self.instruments
            .iter()
            .flat_map(|i| &i.clones)
            .filter(|c| c.visible)
            .count()
    }

    pub fn particle_count(&self) -> usize {
        self.instruments.iter().map(|i| i.particles.len()).sum()
    }
}

// src/visual.rs
//
// Per-kind clone visuals.
//
// The note-period state machine is shared by every clone. What differs
// between instrument kinds is which models a clone needs, how a resolved
// position maps onto those models, and how sibling clones spread out.

use serde::{Deserialize, Serialize};

use crate::pose::{DiscretePose, Transform};
use crate::resolver::PositionDescriptor;

/// A model the asset collaborator must load for one clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualAsset {
    pub clone_id: usize,
    pub model: String,
}

/// Placement of sibling clones by rank.
///
/// Rank 0 sits at the base placement; each further rank adds one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolyphonyOffset {
    pub base_yaw_degrees: f32,
    pub yaw_per_rank_degrees: f32,
    pub translation_per_rank: [f32; 3],
}

impl Default for PolyphonyOffset {
    fn default() -> Self {
        Self {
            base_yaw_degrees: 0.0,
            yaw_per_rank_degrees: 0.0,
            translation_per_rank: [0.0, 1.0, 0.0],
        }
    }
}

impl PolyphonyOffset {
    pub fn transform(&self, rank: usize) -> Transform {
        let r = rank as f32;
        let yaw = (self.base_yaw_degrees + self.yaw_per_rank_degrees * r).to_radians();
        Transform {
            translation: self.translation_per_rank.map(|step| step * r),
            rotation: [0.0, yaw, 0.0],
        }
    }
}

/// Kind-specific behavior of a clone.
///
/// Visuals:
/// - do NOT track note periods
/// - do NOT query the resolver
/// - ONLY translate shared clone state into visible sub-models
pub trait CloneVisual: Send {
    /// Models this clone needs loaded before playback.
    fn load_visuals(&self) -> Vec<VisualAsset>;

    /// Pick the discrete pose for this frame.
    ///
    /// `None` means idle, or a pitch without a mapping. Called every frame,
    /// so it must stay silent; unshowable positions fall back to neutral.
    fn tick(&mut self, descriptor: Option<&PositionDescriptor>) -> DiscretePose;

    /// Whether this clone has models for every part of `descriptor`.
    ///
    /// Checked once per fingering entry when the performance loads.
    fn supports(&self, descriptor: &PositionDescriptor) -> bool;

    /// Placement for the clone's rank among visible siblings.
    fn move_for_polyphony(&self, rank: usize) -> Transform;
}

//
// ═══════════════════════════════════════════════════════════════════
// Plain: no discrete sub-models
// ═══════════════════════════════════════════════════════════════════
//

pub struct PlainClone {
    clone_id: usize,
    model: String,
    offset: PolyphonyOffset,
}

impl PlainClone {
    pub fn new(clone_id: usize, model: impl Into<String>, offset: PolyphonyOffset) -> Self {
        Self {
            clone_id,
            model: model.into(),
            offset,
        }
    }
}

impl CloneVisual for PlainClone {
    fn load_visuals(&self) -> Vec<VisualAsset> {
        vec![VisualAsset {
            clone_id: self.clone_id,
            model: format!("{}.obj", self.model),
        }]
    }

    fn tick(&mut self, _descriptor: Option<&PositionDescriptor>) -> DiscretePose {
        DiscretePose::Neutral
    }

    fn supports(&self, _descriptor: &PositionDescriptor) -> bool {
        false
    }

    fn move_for_polyphony(&self, rank: usize) -> Transform {
        self.offset.transform(rank)
    }
}

//
// ═══════════════════════════════════════════════════════════════════
// Keyed: a body plus individually pressed keys
// ═══════════════════════════════════════════════════════════════════
//

pub struct KeyedClone {
    clone_id: usize,
    model: String,
    key_count: u8,
    offset: PolyphonyOffset,
}

impl KeyedClone {
    pub fn new(clone_id: usize, model: impl Into<String>, key_count: u8, offset: PolyphonyOffset) -> Self {
        Self {
            clone_id,
            model: model.into(),
            key_count,
            offset,
        }
    }
}

impl CloneVisual for KeyedClone {
    fn load_visuals(&self) -> Vec<VisualAsset> {
        let mut assets = vec![VisualAsset {
            clone_id: self.clone_id,
            model: format!("{}.obj", self.model),
        }];
        assets.extend((0..self.key_count).map(|k| VisualAsset {
            clone_id: self.clone_id,
            model: format!("{}Key{}.obj", self.model, k),
        }));
        assets
    }

    fn tick(&mut self, descriptor: Option<&PositionDescriptor>) -> DiscretePose {
        match descriptor {
            Some(PositionDescriptor::Keys { pressed }) => DiscretePose::Keys {
                pressed: pressed.iter().copied().filter(|k| *k < self.key_count).collect(),
            },
            _ => DiscretePose::Neutral,
        }
    }

    fn supports(&self, descriptor: &PositionDescriptor) -> bool {
        match descriptor {
            PositionDescriptor::Keys { pressed } => pressed.iter().all(|k| *k < self.key_count),
            PositionDescriptor::Hands { .. } => false,
        }
    }

    fn move_for_polyphony(&self, rank: usize) -> Transform {
        self.offset.transform(rank)
    }
}

//
// ═══════════════════════════════════════════════════════════════════
// Handed: one model per hand shape, swapped per note
// ═══════════════════════════════════════════════════════════════════
//

pub struct HandedClone {
    clone_id: usize,
    model: String,
    left_hands: u8,
    right_hands: u8,
    offset: PolyphonyOffset,
}

impl HandedClone {
    pub fn new(
        clone_id: usize,
        model: impl Into<String>,
        left_hands: u8,
        right_hands: u8,
        offset: PolyphonyOffset,
    ) -> Self {
        Self {
            clone_id,
            model: model.into(),
            left_hands,
            right_hands,
            offset,
        }
    }
}

impl CloneVisual for HandedClone {
    fn load_visuals(&self) -> Vec<VisualAsset> {
        let id = self.clone_id;
        let mut assets = vec![VisualAsset {
            clone_id: id,
            model: format!("{}.obj", self.model),
        }];
        assets.extend((0..self.left_hands).map(|h| VisualAsset {
            clone_id: id,
            model: format!("{}LeftHand{}.obj", self.model, h),
        }));
        assets.extend((0..self.right_hands).map(|h| VisualAsset {
            clone_id: id,
            model: format!("{}RightHand{}.obj", self.model, h),
        }));
        assets
    }

    fn tick(&mut self, descriptor: Option<&PositionDescriptor>) -> DiscretePose {
        match descriptor {
            Some(descriptor) if self.supports(descriptor) => DiscretePose::from(descriptor.clone()),
            _ => DiscretePose::Neutral,
        }
    }

    fn supports(&self, descriptor: &PositionDescriptor) -> bool {
        match *descriptor {
            PositionDescriptor::Hands { left, right } => {
                left < self.left_hands && right < self.right_hands
            }
            PositionDescriptor::Keys { .. } => false,
        }
    }

    fn move_for_polyphony(&self, rank: usize) -> Transform {
        self.offset.transform(rank)
    }
}

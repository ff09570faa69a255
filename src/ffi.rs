// C-compatible FFI bindings for Swift/iOS integration.
//
// Safety requirements:
// - All pointers must be non-null unless documented otherwise
// - All handles must be created by this module and not fabricated
// - String parameters must be valid null-terminated UTF-8
// - Caller must call the corresponding _destroy/_free function for each _create
//
// Readback functions read the frame produced by the latest `performance_tick`.

use std::ffi::{CStr, CString, c_char};

use log::{LevelFilter, error};
use oslog::OsLogger;

use crate::performance::Performance;
use crate::pose::{ClonePose, DiscretePose, InstrumentFrame, ParticlePose, PerformanceFrame};

// Logger subsystem identifier
const LOG_SUBSYSTEM: &str = "com.reenact.engine";

// Sentinel for "no value" in u32/u8 readback fields
const NONE_U8: u8 = u8::MAX;

// ═══════════════════════════════════════════════════════════════════════════
// Logger Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the oslog logger.
///
/// Call once at application startup. Output appears in Console.app and
/// Xcode's debug console.
#[unsafe(no_mangle)]
pub extern "C" fn reenact_init_logger() {
    OsLogger::new(LOG_SUBSYSTEM)
        .level_filter(LevelFilter::Debug)
        .init()
        .ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Opaque Handle Types
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque handle to a loaded performance and its latest frame.
pub struct ReenactPerformance {
    inner: Performance,
    frame: Option<PerformanceFrame>,

    /// Particles dropped by the last explicit reset
    dropped: Vec<u64>,
}

impl ReenactPerformance {
    fn instrument(&self, instrument: u32) -> Option<&InstrumentFrame> {
        self.frame.as_ref()?.instruments.get(instrument as usize)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// FFI Result Types
// ═══════════════════════════════════════════════════════════════════════════

/// Discrete pose kind of a clone.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ReenactPoseKind {
    Neutral = 0,
    Hands = 1,
    Keys = 2,
}

/// Pose of one clone for the renderer.
///
/// For `Keys`, read the pressed keys with `performance_clone_key`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ReenactClonePose {
    pub clone_id: u32,
    pub visible: bool,
    pub rank: u32,
    pub offset_translation: [f32; 3],
    pub offset_rotation: [f32; 3],
    pub rotation: [f32; 3],
    pub stretch: f32,
    pub pose_kind: ReenactPoseKind,
    /// Hand indices (`Hands` only, otherwise 255)
    pub left_hand: u8,
    pub right_hand: u8,
    /// Number of pressed keys (`Keys` only)
    pub key_count: u32,
    /// Sounding pitch, or 255 when idle
    pub pitch: u8,
}

impl From<&ClonePose> for ReenactClonePose {
    fn from(p: &ClonePose) -> Self {
        let (pose_kind, left_hand, right_hand, key_count) = match &p.discrete {
            DiscretePose::Neutral => (ReenactPoseKind::Neutral, NONE_U8, NONE_U8, 0),
            DiscretePose::Hands { left, right } => (ReenactPoseKind::Hands, *left, *right, 0),
            DiscretePose::Keys { pressed } => {
                (ReenactPoseKind::Keys, NONE_U8, NONE_U8, pressed.len() as u32)
            }
        };

        Self {
            clone_id: p.clone_id as u32,
            visible: p.visible,
            rank: p.rank as u32,
            offset_translation: p.offset.translation,
            offset_rotation: p.offset.rotation,
            rotation: p.rotation,
            stretch: p.stretch,
            pose_kind,
            left_hand,
            right_hand,
            key_count,
            pitch: p.pitch.unwrap_or(NONE_U8),
        }
    }
}

/// Pose of one particle for the renderer.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ReenactParticlePose {
    pub id: u64,
    pub translation: [f32; 3],
    pub scale: f32,
    /// 0 normal, 1 harmonica, 2 pop, 3 whistle
    pub texture: u32,
}

impl From<&ParticlePose> for ReenactParticlePose {
    fn from(p: &ParticlePose) -> Self {
        Self {
            id: p.id,
            translation: p.translation,
            scale: p.scale,
            texture: p.texture as u32,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════════════════════

/// Load a performance from a JSON document.
///
/// Returns NULL (and logs the reason) if the document is invalid.
/// The handle must be freed with `performance_destroy`.
///
/// # Safety
/// `json` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn performance_create_from_json(json: *const c_char) -> *mut ReenactPerformance {
    if json.is_null() {
        return std::ptr::null_mut();
    }

    let json = match unsafe { CStr::from_ptr(json) }.to_str() {
        Ok(json) => json,
        Err(e) => {
            error!("performance_create_from_json: invalid UTF-8: {}", e);
            return std::ptr::null_mut();
        }
    };

    match Performance::from_json(json) {
        Ok(inner) => Box::into_raw(Box::new(ReenactPerformance {
            inner,
            frame: None,
            dropped: Vec::new(),
        })),
        Err(e) => {
            error!("performance_create_from_json: {}", e);
            std::ptr::null_mut()
        }
    }
}

/// Destroy a performance.
///
/// # Safety
/// `performance` must be a valid pointer returned by `performance_create_from_json`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn performance_destroy(performance: *mut ReenactPerformance) {
    if !performance.is_null() {
        unsafe { drop(Box::from_raw(performance)) };
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Playback
// ═══════════════════════════════════════════════════════════════════════════

/// Advance to `time` seconds. Returns the number of instruments in the frame.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn performance_tick(
    performance: *mut ReenactPerformance,
    time: f64,
    delta: f64,
) -> u32 {
    if performance.is_null() {
        return 0;
    }
    let performance = unsafe { &mut *performance };
    let frame = performance.inner.tick(time, delta);
    let count = frame.instruments.len() as u32;
    performance.frame = Some(frame);
    count
}

/// Rewind to the start and drop the current frame.
///
/// Returns the number of particles dropped; the renderer must free them.
/// Read their ids with `performance_dropped_id`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn performance_reset(performance: *mut ReenactPerformance) -> u32 {
    if performance.is_null() {
        return 0;
    }
    let performance = unsafe { &mut *performance };
    performance.dropped = performance.inner.reset();
    performance.frame = None;
    performance.dropped.len() as u32
}

/// Id of the `index`-th particle dropped by the last reset, or u64::MAX.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn performance_dropped_id(
    performance: *const ReenactPerformance,
    index: u32,
) -> u64 {
    if performance.is_null() {
        return u64::MAX;
    }
    let performance = unsafe { &*performance };
    performance
        .dropped
        .get(index as usize)
        .copied()
        .unwrap_or(u64::MAX)
}

/// Time at which the last note ends, in seconds.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn performance_length_seconds(performance: *const ReenactPerformance) -> f64 {
    if performance.is_null() {
        return 0.0;
    }
    unsafe { (*performance).inner.length_seconds() }
}

// ═══════════════════════════════════════════════════════════════════════════
// Frame Readback
// ═══════════════════════════════════════════════════════════════════════════

/// Number of clones of an instrument in the latest frame.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn performance_clone_count(
    performance: *const ReenactPerformance,
    instrument: u32,
) -> u32 {
    if performance.is_null() {
        return 0;
    }
    let performance = unsafe { &*performance };
    performance
        .instrument(instrument)
        .map_or(0, |i| i.clones.len() as u32)
}

/// Read one clone pose. Returns false if out of range.
///
/// # Safety
/// `out` must be a valid pointer to a ReenactClonePose.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn performance_clone_pose(
    performance: *const ReenactPerformance,
    instrument: u32,
    clone: u32,
    out: *mut ReenactClonePose,
) -> bool {
    if performance.is_null() || out.is_null() {
        return false;
    }
    let performance = unsafe { &*performance };
    let Some(pose) = performance
        .instrument(instrument)
        .and_then(|i| i.clones.get(clone as usize))
    else {
        return false;
    };
    unsafe { *out = ReenactClonePose::from(pose) };
    true
}

/// Read the `key`-th pressed key of a clone in `Keys` pose, or 255.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn performance_clone_key(
    performance: *const ReenactPerformance,
    instrument: u32,
    clone: u32,
    key: u32,
) -> u8 {
    if performance.is_null() {
        return NONE_U8;
    }
    let performance = unsafe { &*performance };
    performance
        .instrument(instrument)
        .and_then(|i| i.clones.get(clone as usize))
        .and_then(|c| match &c.discrete {
            DiscretePose::Keys { pressed } => pressed.get(key as usize).copied(),
            _ => None,
        })
        .unwrap_or(NONE_U8)
}

/// Number of live particles of an instrument in the latest frame.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn performance_particle_count(
    performance: *const ReenactPerformance,
    instrument: u32,
) -> u32 {
    if performance.is_null() {
        return 0;
    }
    let performance = unsafe { &*performance };
    performance
        .instrument(instrument)
        .map_or(0, |i| i.particles.len() as u32)
}

/// Read one particle pose. Returns false if out of range.
///
/// # Safety
/// `out` must be a valid pointer to a ReenactParticlePose.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn performance_particle_pose(
    performance: *const ReenactPerformance,
    instrument: u32,
    particle: u32,
    out: *mut ReenactParticlePose,
) -> bool {
    if performance.is_null() || out.is_null() {
        return false;
    }
    let performance = unsafe { &*performance };
    let Some(pose) = performance
        .instrument(instrument)
        .and_then(|i| i.particles.get(particle as usize))
    else {
        return false;
    };
    unsafe { *out = ReenactParticlePose::from(pose) };
    true
}

/// Number of particles released this frame (renderer frees them).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn performance_released_count(
    performance: *const ReenactPerformance,
    instrument: u32,
) -> u32 {
    if performance.is_null() {
        return 0;
    }
    let performance = unsafe { &*performance };
    performance
        .instrument(instrument)
        .map_or(0, |i| i.released.len() as u32)
}

/// Id of the `index`-th particle released this frame, or u64::MAX.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn performance_released_id(
    performance: *const ReenactPerformance,
    instrument: u32,
    index: u32,
) -> u64 {
    if performance.is_null() {
        return u64::MAX;
    }
    let performance = unsafe { &*performance };
    performance
        .instrument(instrument)
        .and_then(|i| i.released.get(index as usize).copied())
        .unwrap_or(u64::MAX)
}

/// Serialize the latest frame as JSON.
///
/// Returns NULL if no frame has been produced. Free with `reenact_string_free`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn performance_frame_json(performance: *const ReenactPerformance) -> *mut c_char {
    if performance.is_null() {
        return std::ptr::null_mut();
    }
    let performance = unsafe { &*performance };
    let Some(frame) = performance.frame.as_ref() else {
        return std::ptr::null_mut();
    };

    match serde_json::to_string(frame).map(CString::new) {
        Ok(Ok(json)) => json.into_raw(),
        Ok(Err(e)) => {
            error!("performance_frame_json: {}", e);
            std::ptr::null_mut()
        }
        Err(e) => {
            error!("performance_frame_json: {}", e);
            std::ptr::null_mut()
        }
    }
}

/// Free a string returned by this module.
///
/// # Safety
/// `s` must come from `performance_frame_json`, or be NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reenact_string_free(s: *mut c_char) {
    if !s.is_null() {
        unsafe { drop(CString::from_raw(s)) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "config": {
            "pulses_per_quarter_note": 96,
            "instruments": [{
                "name": "flute",
                "kind": "plain",
                "channel": 0,
                "pool_size": 2,
                "puffer": {}
            }]
        },
        "events": [
            {"type": "note", "tick": 0, "pitch": 70, "channel": 0, "on": true},
            {"type": "note", "tick": 96, "pitch": 70, "channel": 0, "on": false}
        ]
    }"#;

    #[test]
    fn test_create_tick_readback_destroy() {
        let json = CString::new(DOCUMENT).unwrap();
        unsafe {
            let performance = performance_create_from_json(json.as_ptr());
            assert!(!performance.is_null());

            assert_eq!(performance_tick(performance, 0.25, 1.0 / 60.0), 1);
            assert_eq!(performance_clone_count(performance, 0), 2);

            let mut pose = std::mem::zeroed::<ReenactClonePose>();
            assert!(performance_clone_pose(performance, 0, 0, &mut pose));
            assert_eq!(pose.pitch, 70);
            assert!(pose.visible);
            assert_eq!(pose.pose_kind, ReenactPoseKind::Neutral);
            assert!(!performance_clone_pose(performance, 3, 0, &mut pose));

            let s = performance_frame_json(performance);
            assert!(!s.is_null());
            reenact_string_free(s);

            performance_destroy(performance);
        }
    }

    #[test]
    fn test_reset_exposes_dropped_particles() {
        let json = CString::new(DOCUMENT).unwrap();
        unsafe {
            let performance = performance_create_from_json(json.as_ptr());
            performance_tick(performance, 0.25, 1.0 / 30.0);
            assert_eq!(performance_particle_count(performance, 0), 2);

            assert_eq!(performance_reset(performance), 2);
            assert_eq!(performance_dropped_id(performance, 0), 0);
            assert_eq!(performance_dropped_id(performance, 1), 1);
            assert_eq!(performance_dropped_id(performance, 2), u64::MAX);
            assert_eq!(performance_clone_count(performance, 0), 0);

            performance_destroy(performance);
        }
    }

    #[test]
    fn test_invalid_document_is_null() {
        let json = CString::new("{}").unwrap();
        unsafe {
            assert!(performance_create_from_json(json.as_ptr()).is_null());
            assert!(performance_create_from_json(std::ptr::null()).is_null());
        }
    }
}

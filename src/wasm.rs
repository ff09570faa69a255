//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { reenact_init, ReenactPerformance } from './reenact.js';
//!
//! await init();
//! reenact_init();
//!
//! const performance = new ReenactPerformance(documentJson);
//!
//! function frame(now) {
//!     const poses = JSON.parse(performance.tick(now / 1000, 1 / 60));
//!     applyToScene(poses);
//!     requestAnimationFrame(frame);
//! }
//! requestAnimationFrame(frame);
//! ```

use wasm_bindgen::prelude::*;

use crate::performance::Performance;

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn reenact_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Performance
// ═══════════════════════════════════════════════════════════════════════════

/// A loaded performance, ticked from the page's animation loop.
#[wasm_bindgen]
pub struct ReenactPerformance {
    inner: Performance,
}

#[wasm_bindgen]
impl ReenactPerformance {
    /// Load a performance from a JSON document.
    #[wasm_bindgen(constructor)]
    pub fn new(json: &str) -> Result<ReenactPerformance, JsError> {
        let inner = Performance::from_json(json)?;
        Ok(Self { inner })
    }

    /// Advance to `time` seconds and return the frame as JSON.
    pub fn tick(&mut self, time: f64, delta: f64) -> Result<String, JsError> {
        let frame = self.inner.tick(time, delta);
        Ok(serde_json::to_string(&frame)?)
    }

    /// Rewind to the start. Returns the ids of the particles dropped,
    /// which the page must free itself.
    pub fn reset(&mut self) -> Vec<u64> {
        self.inner.reset()
    }

    /// Time at which the last note ends, in seconds.
    pub fn length_seconds(&self) -> f64 {
        self.inner.length_seconds()
    }

    /// Number of instrument parts.
    pub fn instrument_count(&self) -> u32 {
        self.inner.instruments().len() as u32
    }

    /// Models to load for every part, as a JSON array of
    /// `{ clone_id, model }` lists (one list per part).
    pub fn visuals(&self) -> Result<String, JsError> {
        let visuals: Vec<_> = self
            .inner
            .instruments()
            .iter()
            .map(|instrument| instrument.load_visuals())
            .collect();
        Ok(serde_json::to_string(&visuals)?)
    }

    /// Forced clone takeovers so far.
    pub fn forced_reassignments(&self) -> u32 {
        self.inner.forced_reassignments() as u32
    }
}

//! Masks - five short levels about conformity and resistance
//!
//! Core modules:
//! - `sim`: Per-level real-time simulations (state machines, physics, particles)
//! - `audio`: Audio cue bridge between simulations and a playback backend
//! - `router`: Screen sequencing (home, transition, gameplay) and the awakened flag
//! - `persistence`: Key/value flag storage
//! - `settings`: Player preferences
//! - `tuning`: Data-driven level balance

pub mod audio;
pub mod persistence;
pub mod router;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use router::{Screen, ScreenRouter};
pub use settings::{QualityPreset, Settings};
pub use tuning::Tuning;

/// Game configuration constants
pub mod consts {
    /// Frame rate the per-frame decay factors were authored against
    pub const REFERENCE_FPS: f32 = 60.0;
    /// Largest delta handed to a simulation in one tick (ms)
    pub const DEFAULT_MAX_FRAME_DELTA_MS: f32 = 100.0;

    /// Fade to black after the home screen is dismissed (ms)
    pub const HOME_FADE_MS: f32 = 2000.0;
    /// Tunnel sequence between levels (ms)
    pub const TRANSITION_MS: f32 = 2500.0;

    /// Side of the square control-point space used by outlines
    pub const OUTLINE_VIEWPORT: f32 = 100.0;
}

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Clamp to [0, 1]
#[inline]
pub fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// Convert a per-frame multiplicative decay into one scaled by elapsed seconds
///
/// `0.95` applied once per 60 Hz frame becomes `0.95^(60 * dt)`.
#[inline]
pub fn frame_decay(per_frame: f32, dt_secs: f32) -> f32 {
    per_frame.powf(dt_secs * consts::REFERENCE_FPS)
}

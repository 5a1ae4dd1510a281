//! Level simulations
//!
//! All gameplay logic lives here. This module must stay pure and
//! reproducible:
//! - Time enters only through `tick(input, dt_ms)`
//! - Seeded RNG only
//! - Stable iteration order (by entity index)
//! - No rendering, audio device or platform dependencies

pub mod capital;
pub mod clock;
pub mod conformity;
pub mod consumerism;
pub mod epiphany;
pub mod events;
pub mod factory;
pub mod input;
pub mod level;
pub mod lifecycle;
pub mod morph;
pub mod particles;

pub use clock::GameClock;
pub use events::{AudioCue, AudioKey, CueQueue};
pub use input::{EdgeDetector, InputState, Key, TickInput};
pub use level::{Level, LevelId, LevelSim};
pub use lifecycle::{Completion, LevelStatus, Lifecycle, Outcome};
pub use morph::{
    MorphError, Outline, Rgb, ShapeKind, interpolate_color, interpolate_outline,
    validate_shape_table,
};
pub use particles::{BurstSpec, Particle, ParticleField};

//! Marble Field - a fixed-timestep marble physics engine
//!
//! Core modules:
//! - `sim`: Marble bodies, broad/narrow phase and the physics step
//! - `forces`: Pointer, device orientation and device motion force sources
//! - `scheduler`: Semi-fixed timestep animation loop
//! - `factory`: Marble sizing and spawning from user entries
//! - `system`: Orchestrator wiring everything into one tick
//! - `platform`: Collaborator traits (renderer, image loader, frames, sensors)
//! - `settings`: Data-driven tuning

pub mod error;
pub mod factory;
pub mod forces;
pub mod platform;
pub mod scheduler;
pub mod settings;
pub mod sim;
pub mod system;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use error::SimError;
pub use factory::{MarbleFactory, UserEntry};
pub use scheduler::{AnimationLoop, FixedUpdate, LoopState};
pub use settings::Settings;
pub use sim::{Marble, PhysicsConfig, PhysicsEngine};
pub use system::{Diagnostics, MarbleSystem};

use glam::Vec2;

/// Engine constants
pub mod consts {
    /// Default fixed simulation timestep (60 Hz)
    pub const FIXED_DT: f32 = 1.0 / 60.0;
    /// Largest frame gap fed into the accumulator (tab switches, debugger stops)
    pub const MAX_FRAME_TIME: f32 = 0.1;

    /// Damping exponent base rate: damping is specified per 60 Hz frame
    pub const DAMPING_REFERENCE_HZ: f32 = 60.0;

    /// Pointer counts as moving for this long after the last move event
    pub const POINTER_STALE_MS: f64 = 300.0;

    /// Earth gravity used to turn tilt into acceleration (m/s²)
    pub const GRAVITY: f32 = 9.8;
    /// Motion readings below this on both axes are sensor noise
    pub const MOTION_THRESHOLD: f32 = 0.5;

    /// Gravity magnitude below which a tick runs a single physics step
    pub const SUBSTEP_LOW_GRAVITY: f32 = 2.0;
    /// Gravity magnitude below which a tick runs three physics steps
    pub const SUBSTEP_HIGH_GRAVITY: f32 = 5.0;
    /// Gravity magnitude at which the minimum speed floor is fully gone
    pub const MIN_SPEED_FADE_GRAVITY: f32 = 7.0;

    /// Distance below which two centres are treated as coincident
    pub const SOLVER_EPSILON: f32 = 1e-3;
}

/// Unit direction for an angle in radians
#[inline]
pub fn direction_from_angle(theta: f32) -> Vec2 {
    Vec2::new(theta.cos(), theta.sin())
}

/// Clamp a vector's length into `[min, max]`, leaving zero vectors untouched
///
/// Only the magnitude changes; direction is preserved.
#[inline]
pub fn clamp_speed(vel: Vec2, min: f32, max: f32) -> Vec2 {
    let speed = vel.length();
    if speed > 0.0 && speed < min {
        vel * (min / speed)
    } else if speed > max {
        vel * (max / speed)
    } else {
        vel
    }
}

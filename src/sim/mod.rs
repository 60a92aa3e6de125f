//! Marble simulation
//!
//! Pure and synchronous: no rendering, no platform calls, no async.
//! Iteration order is the slice order of the marbles handed in; pair
//! resolution order is fixed by marble id.

pub mod collision;
pub mod grid;
pub mod marble;
pub mod physics;

pub use collision::{Contact, circle_overlap};
pub use grid::SpatialGrid;
pub use marble::{Marble, MassModel, WallHit};
pub use physics::{PhysicsConfig, PhysicsEngine, StepStats, min_speed_floor_scale, substep_count};

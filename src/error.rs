//! Error types for the marble field
//!
//! Nothing here is fatal to the simulation: a failed image load drops one
//! marble, a denied permission leaves one force source idle.

use crate::forces::SensorKind;

/// Errors surfaced by the factory, the force sources and configuration loading
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The avatar image behind a marble could not be loaded
    #[error("failed to load image: {url}")]
    ImageLoadFailed { url: String },
    /// A sensor permission prompt was refused (or the platform has no sensor)
    #[error("{0} permission denied")]
    PermissionDenied(SensorKind),
    /// User entry without an id
    #[error("invalid user entry")]
    InvalidEntry,
    /// Radius or derived mass is not strictly positive
    #[error("invalid body: radius {radius}, mass {mass}")]
    InvalidBody { radius: f32, mass: f32 },
    /// A marble with this id is already live
    #[error("duplicate marble id: {0}")]
    DuplicateId(String),
    /// Settings JSON could not be parsed
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

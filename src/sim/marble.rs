//! Marble bodies
//!
//! A marble is a rigid disc. Radius and mass only change together through
//! [`Marble::resize`]; everything else is plain data the solver mutates.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::platform::VisualHandle;

/// mass = radius² * scale + offset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassModel {
    pub scale: f32,
    pub offset: f32,
}

impl Default for MassModel {
    fn default() -> Self {
        Self {
            scale: 0.01,
            offset: 1.0,
        }
    }
}

impl MassModel {
    #[inline]
    pub fn mass_for(&self, radius: f32) -> f32 {
        radius * radius * self.scale + self.offset
    }
}

/// Which wall (if any) a marble was clamped against on one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WallHit {
    #[default]
    None,
    /// Left or top wall
    Min,
    /// Right or bottom wall
    Max,
}

/// A marble entity
#[derive(Debug, Clone)]
pub struct Marble {
    pub id: String,
    pub pos: Vec2,
    pub vel: Vec2,
    radius: f32,
    mass: f32,
    pub visual: VisualHandle,
    /// Position before this step's integration
    pub(crate) prev_pos: Vec2,
    /// Velocity at the start of this step (before damping and clamping)
    pub(crate) pre_vel: Vec2,
    /// Velocity used to predict this step's position
    pub(crate) step_vel: Vec2,
    pub(crate) wall_x: WallHit,
    pub(crate) wall_y: WallHit,
}

impl Marble {
    pub fn new(
        id: impl Into<String>,
        pos: Vec2,
        vel: Vec2,
        radius: f32,
        mass_model: &MassModel,
        visual: VisualHandle,
    ) -> Result<Self, SimError> {
        let mass = mass_model.mass_for(radius);
        validate_body(radius, mass)?;
        Ok(Self {
            id: id.into(),
            pos,
            vel,
            radius,
            mass,
            visual,
            prev_pos: pos,
            pre_vel: vel,
            step_vel: vel,
            wall_x: WallHit::None,
            wall_y: WallHit::None,
        })
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    #[inline]
    pub fn inv_mass(&self) -> f32 {
        1.0 / self.mass
    }

    /// Change the radius; mass follows
    pub fn resize(&mut self, radius: f32, mass_model: &MassModel) -> Result<(), SimError> {
        let mass = mass_model.mass_for(radius);
        validate_body(radius, mass)?;
        self.radius = radius;
        self.mass = mass;
        Ok(())
    }

    /// ½·m·|v|²
    #[inline]
    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.mass * self.vel.length_squared()
    }

    /// Top-left corner of the marble's bounding square
    #[inline]
    pub fn top_left(&self) -> Vec2 {
        self.pos - Vec2::splat(self.radius)
    }
}

fn validate_body(radius: f32, mass: f32) -> Result<(), SimError> {
    // `!(x > 0)` also rejects NaN
    if !(radius > 0.0) || !(mass > 0.0) {
        return Err(SimError::InvalidBody { radius, mass });
    }
    Ok(())
}

//! Device tilt as gravity
//!
//! alpha: rotation around Z in degrees, [0, 360)
//! beta: front-to-back tilt in degrees, [-180, 180)
//! gamma: left-to-right tilt in degrees, [-90, 90)

use glam::Vec2;
use serde::Serialize;

use super::{ForceSource, SensorGate};
use crate::consts::GRAVITY;
use crate::platform::{PermissionResponse, SensorPermission};
use crate::settings::OrientationSettings;
use crate::sim::Marble;

/// One orientation event; any angle may be missing
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationReading {
    pub alpha: Option<f32>,
    pub beta: Option<f32>,
    pub gamma: Option<f32>,
}

impl OrientationReading {
    pub fn new(alpha: f32, beta: f32, gamma: f32) -> Self {
        Self {
            alpha: Some(alpha),
            beta: Some(beta),
            gamma: Some(gamma),
        }
    }

    /// Tilt gravity in m/s², None for incomplete or placeholder readings
    ///
    /// Some browsers report exactly (0, 90, 0) before the sensor warms up.
    pub fn gravity(&self) -> Option<Vec2> {
        let (alpha, beta, gamma) = (self.alpha?, self.beta?, self.gamma?);
        if alpha == 0.0 && beta == 90.0 && gamma == 0.0 {
            return None;
        }
        let (beta, gamma) = (beta.to_radians(), gamma.to_radians());
        Some(Vec2::new(GRAVITY * gamma.sin() * beta.cos(), GRAVITY * beta.sin()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationConfigPatch {
    pub sensitivity: Option<f32>,
}

/// Sensor readout for the debug overlay
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrientationDebug {
    pub active: bool,
    pub supported: bool,
    pub ax: f32,
    pub ay: f32,
    pub alpha: Option<f32>,
    pub beta: Option<f32>,
    pub gamma: Option<f32>,
}

/// Applies device tilt as a uniform acceleration on every marble
#[derive(Debug, Clone)]
pub struct OrientationInteraction {
    config: OrientationSettings,
    capability: SensorPermission,
    gate: SensorGate,
    last_reading: OrientationReading,
    acceleration: Vec2,
}

impl OrientationInteraction {
    pub fn new(config: OrientationSettings, capability: SensorPermission) -> Self {
        Self {
            config,
            capability,
            gate: SensorGate::Idle,
            last_reading: OrientationReading::default(),
            acceleration: Vec2::ZERO,
        }
    }

    #[inline]
    pub fn gate(&self) -> SensorGate {
        self.gate
    }

    /// Start accepting readings (permission granted or not required)
    pub fn init(&mut self) {
        self.gate = SensorGate::Active;
    }

    /// Stop accepting readings and drop the current tilt
    pub fn teardown(&mut self) {
        if self.gate == SensorGate::Active {
            self.gate = SensorGate::Idle;
        }
        self.acceleration = Vec2::ZERO;
        self.last_reading = OrientationReading::default();
    }

    /// Outcome of a permission request
    pub fn on_permission(&mut self, response: PermissionResponse) {
        self.gate = SensorGate::after(response);
        if !self.gate.is_open() {
            self.acceleration = Vec2::ZERO;
        }
    }

    pub fn handle_reading(&mut self, reading: OrientationReading) {
        if !self.gate.is_open() {
            return;
        }
        self.last_reading = reading;
        if let Some(gravity) = reading.gravity() {
            self.acceleration = gravity;
        }
    }

    pub fn update_config(&mut self, patch: OrientationConfigPatch) {
        self.config.sensitivity = patch.sensitivity.unwrap_or(self.config.sensitivity);
    }

    /// Current tilt gravity in m/s²
    #[inline]
    pub fn acceleration(&self) -> Vec2 {
        self.acceleration
    }

    pub fn has_active_gravity(&self) -> bool {
        self.gate.is_open() && self.acceleration != Vec2::ZERO
    }

    /// Tilt gravity magnitude used for sub-stepping (0 when inactive)
    pub fn gravity_magnitude(&self) -> f32 {
        if self.has_active_gravity() {
            self.acceleration.length()
        } else {
            0.0
        }
    }

    pub fn debug_info(&self) -> OrientationDebug {
        OrientationDebug {
            active: self.gate.is_open(),
            supported: self.capability != SensorPermission::Denied,
            ax: self.acceleration.x,
            ay: self.acceleration.y,
            alpha: self.last_reading.alpha,
            beta: self.last_reading.beta,
            gamma: self.last_reading.gamma,
        }
    }
}

impl ForceSource for OrientationInteraction {
    fn is_active(&self) -> bool {
        self.gate.is_open()
    }

    fn apply_force(&mut self, marbles: &mut [Marble], dt: f32) {
        if !self.is_active() {
            return;
        }
        let dv = self.acceleration * self.config.sensitivity * dt;
        for marble in marbles.iter_mut() {
            marble.vel += dv;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::VisualHandle;
    use crate::sim::MassModel;

    fn granted() -> OrientationInteraction {
        let mut source =
            OrientationInteraction::new(OrientationSettings::default(), SensorPermission::Requestable);
        source.on_permission(PermissionResponse::Granted);
        source
    }

    #[test]
    fn test_tilt_to_gravity() {
        let g = OrientationReading::new(10.0, 0.0, 90.0).gravity().unwrap();
        assert!((g.x - GRAVITY).abs() < 1e-4);
        assert!(g.y.abs() < 1e-4);

        let g = OrientationReading::new(0.0, 30.0, 0.0).gravity().unwrap();
        assert!(g.x.abs() < 1e-4);
        assert!((g.y - GRAVITY * 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_placeholder_and_partial_readings_ignored() {
        let mut source = granted();
        source.handle_reading(OrientationReading::new(0.0, 45.0, 0.0));
        let before = source.acceleration();

        source.handle_reading(OrientationReading::new(0.0, 90.0, 0.0));
        assert_eq!(source.acceleration(), before);
        source.handle_reading(OrientationReading {
            alpha: Some(1.0),
            beta: None,
            gamma: Some(3.0),
        });
        assert_eq!(source.acceleration(), before);
        assert_eq!(source.debug_info().beta, None);
    }

    #[test]
    fn test_readings_need_permission() {
        let mut source =
            OrientationInteraction::new(OrientationSettings::default(), SensorPermission::Requestable);
        source.handle_reading(OrientationReading::new(0.0, 45.0, 20.0));
        assert!(!source.has_active_gravity());

        source.on_permission(PermissionResponse::Denied);
        source.handle_reading(OrientationReading::new(0.0, 45.0, 20.0));
        assert_eq!(source.gate(), SensorGate::Denied);
        assert_eq!(source.gravity_magnitude(), 0.0);
    }

    #[test]
    fn test_apply_scales_by_sensitivity() {
        let mut source = granted();
        source.handle_reading(OrientationReading::new(0.0, 30.0, 0.0));
        let mut marbles = vec![
            Marble::new("a", Vec2::ZERO, Vec2::ZERO, 5.0, &MassModel::default(), VisualHandle(0))
                .unwrap(),
        ];
        source.apply_force(&mut marbles, 0.5);
        assert!((marbles[0].vel.y - 4.9 * 100.0 * 0.5).abs() < 1e-2);
    }

    #[test]
    fn test_teardown_clears_gravity() {
        let mut source = granted();
        source.handle_reading(OrientationReading::new(0.0, 30.0, 10.0));
        assert!(source.has_active_gravity());
        source.teardown();
        assert!(!source.has_active_gravity());
        assert_eq!(source.gate(), SensorGate::Idle);
    }
}

//! Device linear acceleration
//!
//! Shaking the device flings every marble the opposite way along x (the
//! screen moves, the marbles lag behind) and along y as reported.

use glam::Vec2;
use serde::Serialize;

use super::{ForceSource, SensorGate};
use crate::consts::MOTION_THRESHOLD;
use crate::platform::{PermissionResponse, SensorPermission};
use crate::settings::MotionSettings;
use crate::sim::Marble;

/// Raw acceleration without gravity (m/s²); missing axes read as zero
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionReading {
    pub x: Option<f32>,
    pub y: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionConfigPatch {
    pub sensitivity: Option<f32>,
    pub max_force: Option<f32>,
}

/// Sensor readout for the debug overlay
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotionDebug {
    pub supported: bool,
    pub active: bool,
    pub ax: f32,
    pub ay: f32,
}

#[derive(Debug, Clone)]
pub struct MotionInteraction {
    config: MotionSettings,
    capability: SensorPermission,
    gate: SensorGate,
    acceleration: Vec2,
}

impl MotionInteraction {
    pub fn new(config: MotionSettings, capability: SensorPermission) -> Self {
        Self {
            config,
            capability,
            gate: SensorGate::Idle,
            acceleration: Vec2::ZERO,
        }
    }

    #[inline]
    pub fn gate(&self) -> SensorGate {
        self.gate
    }

    pub fn init(&mut self) {
        self.gate = SensorGate::Active;
    }

    pub fn teardown(&mut self) {
        if self.gate == SensorGate::Active {
            self.gate = SensorGate::Idle;
        }
        self.acceleration = Vec2::ZERO;
    }

    pub fn on_permission(&mut self, response: PermissionResponse) {
        self.gate = SensorGate::after(response);
        if !self.gate.is_open() {
            self.acceleration = Vec2::ZERO;
        }
    }

    pub fn handle_reading(&mut self, reading: MotionReading) {
        if !self.gate.is_open() {
            return;
        }
        self.acceleration = Vec2::new(-reading.x.unwrap_or(0.0), reading.y.unwrap_or(0.0));
    }

    pub fn update_config(&mut self, patch: MotionConfigPatch) {
        let c = &mut self.config;
        c.sensitivity = patch.sensitivity.unwrap_or(c.sensitivity);
        c.max_force = patch.max_force.unwrap_or(c.max_force);
    }

    #[inline]
    pub fn acceleration(&self) -> Vec2 {
        self.acceleration
    }

    /// Scaled and clamped acceleration, None below the noise threshold
    pub fn force(&self) -> Option<Vec2> {
        let a = self.acceleration;
        if a.x.abs() < MOTION_THRESHOLD && a.y.abs() < MOTION_THRESHOLD {
            return None;
        }
        Some((a * self.config.sensitivity).clamp_length_max(self.config.max_force))
    }

    pub fn debug_info(&self) -> MotionDebug {
        MotionDebug {
            supported: self.capability != SensorPermission::Denied,
            active: self.gate.is_open(),
            ax: self.acceleration.x,
            ay: self.acceleration.y,
        }
    }
}

impl ForceSource for MotionInteraction {
    fn is_active(&self) -> bool {
        self.gate.is_open()
    }

    fn apply_force(&mut self, marbles: &mut [Marble], dt: f32) {
        if !self.is_active() {
            return;
        }
        let Some(force) = self.force() else {
            return;
        };
        for marble in marbles.iter_mut() {
            marble.vel += force * dt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::VisualHandle;
    use crate::sim::MassModel;

    fn granted() -> MotionInteraction {
        let mut source = MotionInteraction::new(MotionSettings::default(), SensorPermission::NotRequired);
        source.init();
        source
    }

    fn reading(x: f32, y: f32) -> MotionReading {
        MotionReading {
            x: Some(x),
            y: Some(y),
        }
    }

    #[test]
    fn test_x_axis_is_mirrored() {
        let mut source = granted();
        source.handle_reading(reading(2.0, 3.0));
        assert_eq!(source.acceleration(), Vec2::new(-2.0, 3.0));
    }

    #[test]
    fn test_noise_below_threshold_is_ignored() {
        let mut source = granted();
        source.handle_reading(reading(0.4, -0.49));
        assert_eq!(source.force(), None);

        let mut marbles = vec![
            Marble::new("a", Vec2::ZERO, Vec2::ZERO, 5.0, &MassModel::default(), VisualHandle(0))
                .unwrap(),
        ];
        source.apply_force(&mut marbles, 1.0);
        assert_eq!(marbles[0].vel, Vec2::ZERO);
    }

    #[test]
    fn test_force_is_clamped() {
        let mut source = granted();
        // 30 * 60 = 1800 > 600
        source.handle_reading(reading(0.0, 30.0));
        let f = source.force().unwrap();
        assert!((f.length() - 600.0).abs() < 1e-3);

        source.handle_reading(reading(0.0, 2.0));
        assert!((source.force().unwrap().y - 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_missing_axis_reads_zero() {
        let mut source = granted();
        source.handle_reading(MotionReading {
            x: None,
            y: Some(1.0),
        });
        assert_eq!(source.acceleration(), Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_denied_stays_inactive() {
        let mut source = MotionInteraction::new(MotionSettings::default(), SensorPermission::Requestable);
        source.on_permission(PermissionResponse::Denied);
        source.handle_reading(reading(5.0, 5.0));
        assert!(!source.is_active());
        assert_eq!(source.acceleration(), Vec2::ZERO);
        assert!(source.debug_info().supported);
    }
}

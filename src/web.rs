//! Browser bindings
//!
//! `PhysicsWorld` exposes the bare solver to JavaScript for hosts that keep
//! their own render loop. Bodies come back as one flat `Float32Array`.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use wasm_bindgen::prelude::*;

use crate::platform::VisualHandle;
use crate::settings::Settings;
use crate::sim::{Marble, MassModel, PhysicsConfig, PhysicsEngine};

/// Floats per body in [`PhysicsWorld::marbles`]
pub const BODY_STRIDE: usize = 6;

/// One body as laid out for JS: x, y, vx, vy, radius, mass
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BodySample {
    pos: Vec2,
    vel: Vec2,
    radius: f32,
    mass: f32,
}

impl From<&Marble> for BodySample {
    fn from(m: &Marble) -> Self {
        Self {
            pos: m.pos,
            vel: m.vel,
            radius: m.radius(),
            mass: m.mass(),
        }
    }
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"logger already initialized".into());
    }
}

#[wasm_bindgen]
pub struct PhysicsWorld {
    settings: Settings,
    engine: PhysicsEngine,
    mass_model: MassModel,
    marbles: Vec<Marble>,
    next_id: u32,
}

#[wasm_bindgen]
impl PhysicsWorld {
    /// World sized to the field, tuned from stored settings
    #[wasm_bindgen(constructor)]
    pub fn new(field_width: f32, field_height: f32) -> PhysicsWorld {
        let settings = Settings::load();
        let engine = PhysicsEngine::new(PhysicsConfig::from_settings(
            &settings.physics,
            field_width,
            field_height,
        ));
        let mass_model = MassModel {
            scale: settings.physics.mass_scale,
            offset: settings.physics.mass_offset,
        };
        PhysicsWorld {
            settings,
            engine,
            mass_model,
            marbles: Vec::new(),
            next_id: 0,
        }
    }

    /// Add a body; mass follows the radius. Returns its id.
    pub fn add_marble(&mut self, x: f32, y: f32, vx: f32, vy: f32, radius: f32) -> Result<u32, JsError> {
        let id = self.next_id;
        // zero-padded so string order matches insertion order
        let marble = Marble::new(
            format!("{id:010}"),
            Vec2::new(x, y),
            Vec2::new(vx, vy),
            radius,
            &self.mass_model,
            VisualHandle(u64::from(id)),
        )
        .map_err(|e| JsError::new(&e.to_string()))?;
        self.marbles.push(marble);
        self.next_id += 1;
        Ok(id)
    }

    pub fn clear_marbles(&mut self) {
        self.marbles.clear();
    }

    /// Replace the solver config from a JSON `PhysicsConfig`
    pub fn update_config(&mut self, json: &str) -> Result<(), JsError> {
        let config: PhysicsConfig = serde_json::from_str(json).map_err(|e| JsError::new(&e.to_string()))?;
        self.engine.update_config(config);
        Ok(())
    }

    /// Current solver config as JSON
    pub fn config_json(&self) -> Result<String, JsError> {
        serde_json::to_string(self.engine.config()).map_err(|e| JsError::new(&e.to_string()))
    }

    pub fn resize(&mut self, field_width: f32, field_height: f32) {
        let config = self.engine.config().with_field(field_width, field_height);
        self.engine.update_config(config);
    }

    pub fn set_collisions_enabled(&mut self, enabled: bool) {
        self.engine.set_collisions_enabled(enabled);
    }

    pub fn step(&mut self, dt: f32) {
        self.engine.step(&mut self.marbles, dt);
    }

    pub fn marble_count(&self) -> usize {
        self.marbles.len()
    }

    /// All bodies, `BODY_STRIDE` floats each
    pub fn marbles(&self) -> js_sys::Float32Array {
        let samples: Vec<BodySample> = self.marbles.iter().map(BodySample::from).collect();
        js_sys::Float32Array::from(bytemuck::cast_slice::<BodySample, f32>(&samples))
    }

    /// Persist the live solver coefficients to LocalStorage
    pub fn save_settings(&mut self) {
        let config = self.engine.config();
        let physics = &mut self.settings.physics;
        physics.damping = config.damping;
        physics.restitution = config.restitution;
        physics.wall_bounce = config.wall_bounce;
        physics.min_speed = config.min_speed;
        physics.max_speed = config.max_speed;
        physics.collisions_enabled = config.collisions_enabled;
        self.settings.save();
    }
}

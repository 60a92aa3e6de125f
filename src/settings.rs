//! Tuning for the marble field
//!
//! Every section falls back to its defaults field by field, so a settings
//! file only needs the values it overrides. Persisted in LocalStorage on web.

use serde::{Deserialize, Serialize};

use crate::consts::{FIXED_DT, MAX_FRAME_TIME};
use crate::error::SimError;

/// Marble diameter policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeSettings {
    /// Largest diameter (before zoom)
    pub base: f32,
    /// Smallest diameter (before zoom)
    pub min: f32,
    /// Diameter never exceeds this share of the shorter field side
    pub max_screen_ratio: f32,
    /// Share of the field area all marbles together should cover
    pub fill_ratio: f32,
}

impl Default for SizeSettings {
    fn default() -> Self {
        Self {
            base: 192.0,
            min: 96.0,
            max_screen_ratio: 0.25,
            fill_ratio: 0.3,
        }
    }
}

/// Initial speed range for spawned marbles (units/s)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedSettings {
    pub min: f32,
    pub max: f32,
}

impl Default for SpeedSettings {
    fn default() -> Self {
        Self {
            min: 60.0,
            max: 150.0,
        }
    }
}

/// Solver coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    /// mass = radius² * mass_scale + mass_offset
    pub mass_scale: f32,
    pub mass_offset: f32,
    /// Per-60Hz-frame velocity retention (0-1)
    pub damping: f32,
    /// Marble/marble restitution (0-1)
    pub restitution: f32,
    /// Marble/wall restitution (0-1)
    pub wall_bounce: f32,
    /// Moving marbles never drop below this speed
    pub min_speed: f32,
    /// Global speed cap
    pub max_speed: f32,
    pub collisions_enabled: bool,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            mass_scale: 0.01,
            mass_offset: 1.0,
            damping: 0.9985,
            restitution: 0.92,
            wall_bounce: 0.85,
            min_speed: 50.0,
            max_speed: 800.0,
            collisions_enabled: true,
        }
    }
}

/// Scheduler timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    /// Fixed simulation step (seconds)
    pub fixed_delta_time: f32,
    /// Frame gaps longer than this are clamped (seconds)
    pub max_frame_time: f32,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            fixed_delta_time: FIXED_DT,
            max_frame_time: MAX_FRAME_TIME,
        }
    }
}

/// Pointer force field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerSettings {
    pub attract_radius: f32,
    pub repel_radius: f32,
    pub repel_force: f32,
    pub attract_force: f32,
}

impl Default for PointerSettings {
    fn default() -> Self {
        Self {
            attract_radius: 500.0,
            repel_radius: 300.0,
            repel_force: 400.0,
            attract_force: 600.0,
        }
    }
}

/// Device tilt gravity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationSettings {
    /// Scene units per m/s² of tilt gravity
    pub sensitivity: f32,
}

impl Default for OrientationSettings {
    fn default() -> Self {
        Self { sensitivity: 100.0 }
    }
}

/// Device linear acceleration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    pub sensitivity: f32,
    /// Cap on the resulting acceleration magnitude
    pub max_force: f32,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            sensitivity: 60.0,
            max_force: 600.0,
        }
    }
}

/// All tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub size: SizeSettings,
    pub speed: SpeedSettings,
    pub physics: PhysicsSettings,
    pub animation: AnimationSettings,
    pub pointer: PointerSettings,
    pub orientation: OrientationSettings,
    pub motion: MotionSettings,
    /// Avatar image URL prefix; the entry id is appended
    pub avatar_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            size: SizeSettings::default(),
            speed: SpeedSettings::default(),
            physics: PhysicsSettings::default(),
            animation: AnimationSettings::default(),
            pointer: PointerSettings::default(),
            orientation: OrientationSettings::default(),
            motion: MotionSettings::default(),
            avatar_base_url: "https://avatar.awfufu.com/qq/".to_string(),
        }
    }
}

impl Settings {
    /// Parse settings from JSON (missing fields take defaults)
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let settings: Settings = serde_json::from_str(json)?;
        Ok(settings.sanitized())
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Repair values the solver cannot work with
    ///
    /// Swaps inverted ranges and replaces non-positive timings with defaults.
    pub fn sanitized(mut self) -> Self {
        if self.size.min > self.size.base {
            log::warn!(
                "size.min {} > size.base {}, swapping",
                self.size.min,
                self.size.base
            );
            std::mem::swap(&mut self.size.min, &mut self.size.base);
        }
        if self.speed.min > self.speed.max {
            log::warn!("speed range inverted, swapping");
            std::mem::swap(&mut self.speed.min, &mut self.speed.max);
        }
        if self.physics.min_speed > self.physics.max_speed {
            log::warn!("physics speed range inverted, swapping");
            std::mem::swap(&mut self.physics.min_speed, &mut self.physics.max_speed);
        }
        self.physics.damping = self.physics.damping.clamp(0.0, 1.0);
        if self.physics.mass_offset <= 0.0 && self.physics.mass_scale <= 0.0 {
            log::warn!("mass model yields zero mass, restoring defaults");
            let defaults = PhysicsSettings::default();
            self.physics.mass_scale = defaults.mass_scale;
            self.physics.mass_offset = defaults.mass_offset;
        }
        if self.animation.fixed_delta_time <= 0.0 {
            self.animation.fixed_delta_time = FIXED_DT;
        }
        if self.animation.max_frame_time < self.animation.fixed_delta_time {
            self.animation.max_frame_time = self.animation.fixed_delta_time.max(MAX_FRAME_TIME);
        }
        self
    }

    /// LocalStorage key (used only in wasm32)
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "marble_field_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring stored settings: {}", e),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Settings saved");
            }
        }
    }

    /// Load settings from a JSON file, defaults when missing or unreadable
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_path(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Bad settings file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Cannot read {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }
}

//! Marble creation from user entries
//!
//! A marble only exists once its avatar image has loaded; entries whose
//! image fails are skipped and the rest of the batch carries on.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::direction_from_angle;
use crate::error::SimError;
use crate::platform::{ImageLoader, VisualHandle};
use crate::settings::{Settings, SizeSettings, SpeedSettings};
use crate::sim::{Marble, MassModel};

/// A user shown as a marble
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl UserEntry {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            link: None,
        }
    }

    /// Parse the user list JSON array
    pub fn parse_list(json: &str) -> Result<Vec<UserEntry>, SimError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Display label: name, falling back to id
    pub fn label(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

/// Builds marbles with a responsive size and random motion
#[derive(Debug, Clone)]
pub struct MarbleFactory {
    size: SizeSettings,
    speed: SpeedSettings,
    mass_model: MassModel,
    avatar_base_url: String,
    field_width: f32,
    field_height: f32,
    zoom: f32,
    target_count: usize,
    rng: Pcg32,
}

impl MarbleFactory {
    pub fn new(settings: &Settings, field_width: f32, field_height: f32, seed: u64) -> Self {
        Self {
            size: settings.size.clone(),
            speed: settings.speed.clone(),
            mass_model: MassModel {
                scale: settings.physics.mass_scale,
                offset: settings.physics.mass_offset,
            },
            avatar_base_url: settings.avatar_base_url.clone(),
            field_width,
            field_height,
            zoom: 1.0,
            target_count: 1,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Independent copy with its own random stream, for a detached spawn task
    pub fn fork(&mut self) -> Self {
        let seed = self.rng.random();
        Self {
            rng: Pcg32::seed_from_u64(seed),
            ..self.clone()
        }
    }

    #[inline]
    pub fn mass_model(&self) -> &MassModel {
        &self.mass_model
    }

    pub fn update_field_size(&mut self, width: f32, height: f32) {
        self.field_width = width;
        self.field_height = height;
    }

    #[inline]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Ignored unless strictly positive
    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom > 0.0 && zoom.is_finite() {
            self.zoom = zoom;
        } else {
            log::warn!("ignoring zoom level {}", zoom);
        }
    }

    /// Number of marbles the field is sized for
    pub fn set_target_count(&mut self, count: usize) {
        self.target_count = count.max(1);
    }

    #[inline]
    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn avatar_url(&self, id: &str) -> String {
        format!("{}{}", self.avatar_base_url, id)
    }

    /// Marble diameter for the current field, count and zoom
    ///
    /// The field share `fill_ratio` is split evenly over `target_count`
    /// discs, capped at a share of the shorter side, then kept within
    /// `[min, base]`.
    pub fn marble_diameter(&self) -> f32 {
        let s = &self.size;
        let area = self.field_width * self.field_height * s.fill_ratio / self.target_count as f32;
        let from_area = (4.0 * area / std::f32::consts::PI).sqrt();
        let screen_cap = self.field_width.min(self.field_height) * s.max_screen_ratio;

        let mut d = s.base;
        if from_area.is_finite() && from_area > 0.0 {
            d = d.min(from_area);
        }
        if screen_cap > 0.0 {
            d = d.min(screen_cap);
        }
        d.floor().max(s.min) * self.zoom
    }

    /// Random position inside the field and random velocity
    fn random_motion(&mut self, radius: f32) -> (Vec2, Vec2) {
        let x = self.random_axis(radius, self.field_width);
        let y = self.random_axis(radius, self.field_height);

        let (lo, hi) = (self.speed.min, self.speed.max);
        let speed = if hi > lo { self.rng.random_range(lo..=hi) } else { lo };
        let angle = self.rng.random_range(0.0..TAU);
        (Vec2::new(x, y), direction_from_angle(angle) * speed)
    }

    fn random_axis(&mut self, radius: f32, extent: f32) -> f32 {
        if extent - radius > radius {
            self.rng.random_range(radius..extent - radius)
        } else {
            extent / 2.0
        }
    }

    /// Build a marble for an entry whose image is already loaded
    pub fn build_marble(&mut self, entry: &UserEntry, visual: VisualHandle) -> Result<Marble, SimError> {
        if entry.id.is_empty() {
            return Err(SimError::InvalidEntry);
        }
        let radius = self.marble_diameter() / 2.0;
        let (pos, vel) = self.random_motion(radius);
        Marble::new(entry.id.clone(), pos, vel, radius, &self.mass_model, visual)
    }

    /// Load the avatar and build the marble
    pub async fn create_marble<L: ImageLoader>(&mut self, entry: &UserEntry, loader: &L) -> Result<Marble, SimError> {
        if entry.id.is_empty() {
            return Err(SimError::InvalidEntry);
        }
        let url = self.avatar_url(&entry.id);
        let visual = loader.load(&url).await?;
        self.build_marble(entry, visual)
    }

    /// Create marbles for every entry that loads; failures are logged and skipped
    pub async fn create_marbles<L: ImageLoader>(&mut self, entries: &[UserEntry], loader: &L) -> Vec<Marble> {
        let mut marbles = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.create_marble(entry, loader).await {
                Ok(marble) => marbles.push(marble),
                Err(e) => log::warn!("Failed to create marble for {}: {}", entry.label(), e),
            }
        }
        marbles
    }
}

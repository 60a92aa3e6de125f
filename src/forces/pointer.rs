//! Pointer force field
//!
//! Moving the pointer pushes nearby marbles away; holding the modifier key
//! pulls them in over a wider radius. The field only acts while the pointer
//! is moving and never under the pointer itself, so marbles stay clickable.

use glam::Vec2;

use super::ForceSource;
use crate::consts::POINTER_STALE_MS;
use crate::settings::PointerSettings;
use crate::sim::Marble;

/// Input events forwarded by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// Pointer moved; `modifier` is the modifier key state carried by the event
    Move {
        x: f32,
        y: f32,
        modifier: bool,
        timestamp_ms: f64,
    },
    ModifierDown,
    ModifierUp,
    /// Window lost focus
    Blur,
    /// Page became hidden
    Hidden,
}

/// Partial update for [`PointerSettings`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerConfigPatch {
    pub attract_radius: Option<f32>,
    pub repel_radius: Option<f32>,
    pub repel_force: Option<f32>,
    pub attract_force: Option<f32>,
}

/// Pointer-driven attract/repel field
#[derive(Debug, Clone)]
pub struct PointerInteraction {
    config: PointerSettings,
    listening: bool,
    position: Option<Vec2>,
    modifier: bool,
    last_move_ms: f64,
    now_ms: f64,
}

impl PointerInteraction {
    pub fn new(config: PointerSettings) -> Self {
        Self {
            config,
            listening: false,
            position: None,
            modifier: false,
            last_move_ms: f64::NEG_INFINITY,
            now_ms: 0.0,
        }
    }

    /// Start accepting events
    pub fn init(&mut self) {
        self.listening = true;
    }

    /// Stop accepting events and forget all pointer state
    pub fn teardown(&mut self) {
        self.listening = false;
        self.position = None;
        self.modifier = false;
        self.last_move_ms = f64::NEG_INFINITY;
    }

    pub fn handle_event(&mut self, event: PointerEvent) {
        if !self.listening {
            return;
        }
        match event {
            PointerEvent::Move {
                x,
                y,
                modifier,
                timestamp_ms,
            } => {
                self.position = Some(Vec2::new(x, y));
                // resync in case a key event was missed
                self.modifier = modifier;
                self.last_move_ms = timestamp_ms;
                self.now_ms = self.now_ms.max(timestamp_ms);
            }
            PointerEvent::ModifierDown => self.modifier = true,
            PointerEvent::ModifierUp | PointerEvent::Blur | PointerEvent::Hidden => {
                self.modifier = false
            }
        }
    }

    /// Advance the clock used for the staleness window
    pub fn sync_clock(&mut self, now_ms: f64) {
        self.now_ms = now_ms;
    }

    pub fn update_config(&mut self, patch: PointerConfigPatch) {
        let c = &mut self.config;
        c.attract_radius = patch.attract_radius.unwrap_or(c.attract_radius);
        c.repel_radius = patch.repel_radius.unwrap_or(c.repel_radius);
        c.repel_force = patch.repel_force.unwrap_or(c.repel_force);
        c.attract_force = patch.attract_force.unwrap_or(c.attract_force);
    }

    #[inline]
    pub fn config(&self) -> &PointerSettings {
        &self.config
    }

    /// Last known pointer position
    #[inline]
    pub fn pointer_position(&self) -> Option<Vec2> {
        self.position
    }

    #[inline]
    pub fn is_attract_mode(&self) -> bool {
        self.modifier
    }

    /// Pointer moved within the last 300 ms
    pub fn is_force_field_active(&self) -> bool {
        self.now_ms - self.last_move_ms <= POINTER_STALE_MS
    }

    /// Velocity change for one marble, None when the marble is unaffected
    fn impulse_for(&self, pointer: Vec2, marble: &Marble, dt: f32) -> Option<Vec2> {
        let offset = marble.pos - pointer;
        let dist = offset.length();
        if dist <= marble.radius() {
            return None;
        }

        let (radius, force) = if self.modifier {
            (self.config.attract_radius, self.config.attract_force)
        } else {
            (self.config.repel_radius, self.config.repel_force)
        };
        if dist >= radius {
            return None;
        }

        // -ln(0.9t + 0.1): ~2.3 at the pointer, 0 at the edge of the field
        let t = dist / radius;
        let strength = -(0.9 * t + 0.1).ln() * force * dt;
        let outward = offset / dist;
        Some(if self.modifier {
            -outward * strength
        } else {
            outward * strength
        })
    }
}

impl ForceSource for PointerInteraction {
    fn is_active(&self) -> bool {
        self.listening && self.position.is_some() && self.is_force_field_active()
    }

    fn apply_force(&mut self, marbles: &mut [Marble], dt: f32) {
        if !self.is_active() {
            return;
        }
        let Some(pointer) = self.position else {
            return;
        };
        for marble in marbles.iter_mut() {
            if let Some(dv) = self.impulse_for(pointer, marble, dt) {
                marble.vel += dv;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::FIXED_DT;
    use crate::platform::VisualHandle;
    use crate::sim::MassModel;

    fn marble_at(x: f32, y: f32) -> Marble {
        Marble::new("m", Vec2::new(x, y), Vec2::ZERO, 10.0, &MassModel::default(), VisualHandle(0))
            .unwrap()
    }

    fn moved(pointer: &mut PointerInteraction, x: f32, y: f32, modifier: bool, at: f64) {
        pointer.handle_event(PointerEvent::Move {
            x,
            y,
            modifier,
            timestamp_ms: at,
        });
    }

    fn active_pointer() -> PointerInteraction {
        let mut pointer = PointerInteraction::new(PointerSettings::default());
        pointer.init();
        pointer
    }

    #[test]
    fn test_repel_pushes_outward_with_log_falloff() {
        let mut pointer = active_pointer();
        moved(&mut pointer, 0.0, 0.0, false, 1000.0);
        let mut marbles = vec![marble_at(150.0, 0.0)];
        pointer.apply_force(&mut marbles, FIXED_DT);

        let expected = -(0.9f32 * 0.5 + 0.1).ln() * 400.0 * FIXED_DT;
        assert!((marbles[0].vel.x - expected).abs() < 1e-4);
        assert_eq!(marbles[0].vel.y, 0.0);
    }

    #[test]
    fn test_modifier_attracts_over_wider_radius() {
        let mut pointer = active_pointer();
        moved(&mut pointer, 0.0, 0.0, true, 1000.0);
        assert!(pointer.is_attract_mode());
        // outside repel radius, inside attract radius
        let mut marbles = vec![marble_at(400.0, 0.0)];
        pointer.apply_force(&mut marbles, FIXED_DT);
        assert!(marbles[0].vel.x < 0.0);
    }

    #[test]
    fn test_no_force_under_pointer_or_out_of_range() {
        let mut pointer = active_pointer();
        moved(&mut pointer, 100.0, 100.0, false, 0.0);
        let mut marbles = vec![marble_at(105.0, 100.0), marble_at(500.0, 100.0)];
        pointer.apply_force(&mut marbles, FIXED_DT);
        assert_eq!(marbles[0].vel, Vec2::ZERO);
        assert_eq!(marbles[1].vel, Vec2::ZERO);
    }

    #[test]
    fn test_stale_pointer_exerts_nothing() {
        let mut pointer = active_pointer();
        moved(&mut pointer, 0.0, 0.0, false, 1000.0);
        pointer.sync_clock(1300.0);
        assert!(pointer.is_force_field_active());
        pointer.sync_clock(1301.0);
        assert!(!pointer.is_active());

        let mut marbles = vec![marble_at(100.0, 0.0)];
        pointer.apply_force(&mut marbles, FIXED_DT);
        assert_eq!(marbles[0].vel, Vec2::ZERO);
        assert_eq!(pointer.pointer_position(), Some(Vec2::ZERO));
    }

    #[test]
    fn test_blur_and_hidden_clear_modifier() {
        let mut pointer = active_pointer();
        pointer.handle_event(PointerEvent::ModifierDown);
        pointer.handle_event(PointerEvent::Blur);
        assert!(!pointer.is_attract_mode());
        pointer.handle_event(PointerEvent::ModifierDown);
        pointer.handle_event(PointerEvent::Hidden);
        assert!(!pointer.is_attract_mode());
    }

    #[test]
    fn test_move_resyncs_modifier() {
        let mut pointer = active_pointer();
        pointer.handle_event(PointerEvent::ModifierDown);
        moved(&mut pointer, 1.0, 1.0, false, 10.0);
        assert!(!pointer.is_attract_mode());
    }

    #[test]
    fn test_events_ignored_until_init_and_after_teardown() {
        let mut pointer = PointerInteraction::new(PointerSettings::default());
        moved(&mut pointer, 1.0, 1.0, false, 10.0);
        assert_eq!(pointer.pointer_position(), None);

        pointer.init();
        moved(&mut pointer, 1.0, 1.0, false, 10.0);
        pointer.teardown();
        assert_eq!(pointer.pointer_position(), None);
        assert!(!pointer.is_active());
    }

    #[test]
    fn test_partial_config_update() {
        let mut pointer = active_pointer();
        pointer.update_config(PointerConfigPatch {
            repel_force: Some(50.0),
            ..Default::default()
        });
        assert_eq!(pointer.config().repel_force, 50.0);
        assert_eq!(pointer.config().attract_force, 600.0);
    }
}

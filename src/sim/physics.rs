//! Physics step
//!
//! One step always runs, in order:
//! integrate → partition → collide (positions) → boundaries → velocities.
//! Velocities are rebuilt from the position change, so positional
//! corrections never leave marbles drifting apart faster than restitution
//! allows.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::collision::{
    Contact, apply_restitution, circle_overlap, clamp_axis, pair_mut, separate_pair, wall_response,
};
use super::grid::SpatialGrid;
use super::marble::{Marble, WallHit};
use crate::consts::*;
use crate::settings::PhysicsSettings;
use crate::{clamp_speed, direction_from_angle};

/// Solver configuration. Replaced wholesale, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub field_width: f32,
    pub field_height: f32,
    /// Per-60Hz-frame velocity retention
    pub damping: f32,
    pub restitution: f32,
    pub wall_bounce: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub collisions_enabled: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            field_width: 800.0,
            field_height: 600.0,
            damping: 0.9985,
            restitution: 0.92,
            wall_bounce: 0.85,
            min_speed: 30.0,
            max_speed: 800.0,
            collisions_enabled: true,
        }
    }
}

impl PhysicsConfig {
    pub fn new(field_width: f32, field_height: f32) -> Self {
        Self {
            field_width,
            field_height,
            ..Default::default()
        }
    }

    pub fn from_settings(settings: &PhysicsSettings, field_width: f32, field_height: f32) -> Self {
        Self {
            field_width,
            field_height,
            damping: settings.damping,
            restitution: settings.restitution,
            wall_bounce: settings.wall_bounce,
            min_speed: settings.min_speed,
            max_speed: settings.max_speed,
            collisions_enabled: settings.collisions_enabled,
        }
    }

    /// Copy with new field dimensions
    pub fn with_field(&self, field_width: f32, field_height: f32) -> Self {
        Self {
            field_width,
            field_height,
            ..self.clone()
        }
    }

    /// Copy with an inverted speed range put back in order
    pub fn sanitized(mut self) -> Self {
        if self.min_speed > self.max_speed {
            log::warn!(
                "min_speed {} > max_speed {}, swapping",
                self.min_speed,
                self.max_speed
            );
            std::mem::swap(&mut self.min_speed, &mut self.max_speed);
        }
        self
    }

    /// Copy with collisions switched on or off
    pub fn with_collisions(&self, collisions_enabled: bool) -> Self {
        Self {
            collisions_enabled,
            ..self.clone()
        }
    }
}

/// Counters from the most recent step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepStats {
    /// Unique candidate pairs that reached the overlap test
    pub pairs_tested: usize,
    pub contacts: usize,
    pub wall_hits: usize,
}

/// Sub-steps per tick for a given tilt-gravity magnitude (m/s²)
pub fn substep_count(gravity: f32) -> u32 {
    if gravity < SUBSTEP_LOW_GRAVITY {
        1
    } else if gravity < SUBSTEP_HIGH_GRAVITY {
        3
    } else {
        6
    }
}

/// Multiplier on the minimum speed under tilt gravity
///
/// `max(0, 1 − (2t)³)` with `t = min(g / 7, 1)`: 1 on a flat device, 0 from
/// half the fade range on, so the floor stops fighting a strong pull.
pub fn min_speed_floor_scale(gravity: f32) -> f32 {
    let t = (gravity / MIN_SPEED_FADE_GRAVITY).min(1.0);
    (1.0 - (2.0 * t).powi(3)).max(0.0)
}

/// Marble physics engine
#[derive(Debug, Default)]
pub struct PhysicsEngine {
    config: PhysicsConfig,
    grid: SpatialGrid,
    contacts: Vec<Contact>,
    stats: StepStats,
}

impl PhysicsEngine {
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            config: config.sanitized(),
            grid: SpatialGrid::new(),
            contacts: Vec::new(),
            stats: StepStats::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Swap in a new configuration (takes effect on the next step)
    pub fn update_config(&mut self, config: PhysicsConfig) {
        self.config = config.sanitized();
    }

    pub fn set_collisions_enabled(&mut self, enabled: bool) {
        self.config = self.config.with_collisions(enabled);
    }

    #[inline]
    pub fn last_stats(&self) -> StepStats {
        self.stats
    }

    /// Advance all marbles by `dt` using the configured minimum speed
    pub fn step(&mut self, marbles: &mut [Marble], dt: f32) {
        let floor = self.config.min_speed;
        self.step_with_floor(marbles, dt, floor);
    }

    /// Advance all marbles by `dt` with an explicit minimum speed
    pub fn step_with_floor(&mut self, marbles: &mut [Marble], dt: f32, min_speed: f32) {
        self.stats = StepStats::default();
        self.contacts.clear();
        if dt <= 0.0 || marbles.is_empty() {
            return;
        }

        self.integrate(marbles, dt, min_speed);
        if self.config.collisions_enabled {
            self.resolve_collisions(marbles);
        }
        self.resolve_boundaries(marbles);
        self.resolve_velocities(marbles, dt);
    }

    /// Damping, speed limits, position prediction
    pub(crate) fn integrate(&self, marbles: &mut [Marble], dt: f32, min_speed: f32) {
        let config = &self.config;
        let damping_factor = if config.damping < 1.0 {
            config.damping.powf(dt * DAMPING_REFERENCE_HZ)
        } else {
            1.0
        };

        for m in marbles.iter_mut() {
            m.pre_vel = m.vel;
            m.vel = clamp_speed(m.vel * damping_factor, min_speed, config.max_speed);
            m.step_vel = m.vel;
            m.prev_pos = m.pos;
            m.pos += m.vel * dt;
            m.wall_x = WallHit::None;
            m.wall_y = WallHit::None;
        }
    }

    /// Broad phase plus positional correction of every overlapping pair
    fn resolve_collisions(&mut self, marbles: &mut [Marble]) {
        if !self
            .grid
            .rebuild(marbles, self.config.field_width, self.config.field_height)
        {
            return;
        }

        for i in 0..marbles.len() {
            let Some(cell) = self.grid.marble_cell(i) else {
                continue;
            };
            for j in self.grid.neighbors(cell) {
                // Each unordered pair is handled once, from its smaller id
                if marbles[i].id >= marbles[j].id {
                    continue;
                }
                self.stats.pairs_tested += 1;

                let (a, b) = pair_mut(marbles, i, j);
                let Some((normal, penetration)) = circle_overlap(a.pos, a.radius(), b.pos, b.radius())
                else {
                    continue;
                };
                if separate_pair(a, b, normal, penetration) {
                    self.contacts.push(Contact {
                        a: i,
                        b: j,
                        normal,
                        penetration,
                    });
                }
            }
        }
        self.stats.contacts = self.contacts.len();
    }

    /// Clamp positions into the field, remembering which walls were touched
    fn resolve_boundaries(&mut self, marbles: &mut [Marble]) {
        let (width, height) = (self.config.field_width, self.config.field_height);
        for m in marbles.iter_mut() {
            let r = m.radius();
            (m.pos.x, m.wall_x) = clamp_axis(m.pos.x, r, width);
            (m.pos.y, m.wall_y) = clamp_axis(m.pos.y, r, height);
            if m.wall_x != WallHit::None || m.wall_y != WallHit::None {
                self.stats.wall_hits += 1;
            }
        }
    }

    /// Rebuild velocities from motion, then wall bounce and restitution
    fn resolve_velocities(&mut self, marbles: &mut [Marble], dt: f32) {
        let bounce = self.config.wall_bounce;
        for m in marbles.iter_mut() {
            let derived = (m.pos - m.prev_pos) / dt;
            m.vel = Vec2::new(
                wall_response(derived.x, m.step_vel.x, m.wall_x, bounce),
                wall_response(derived.y, m.step_vel.y, m.wall_y, bounce),
            );
        }

        let restitution = self.config.restitution;
        for contact in &self.contacts {
            let (a, b) = pair_mut(marbles, contact.a, contact.b);
            apply_restitution(a, b, contact.normal, restitution);
        }
    }

    /// Give every marble a random speed in `[min, max]` and a random heading
    ///
    /// Used to shake clusters loose when collisions come back on.
    pub fn randomize_speeds<R: Rng>(&self, marbles: &mut [Marble], rng: &mut R, min: f32, max: f32) {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        for m in marbles.iter_mut() {
            let speed = if hi > lo { rng.random_range(lo..=hi) } else { lo };
            let angle = rng.random_range(0.0..std::f32::consts::TAU);
            m.vel = direction_from_angle(angle) * speed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::VisualHandle;
    use crate::sim::marble::MassModel;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn marble(id: &str, pos: (f32, f32), vel: (f32, f32), r: f32) -> Marble {
        Marble::new(
            id,
            Vec2::new(pos.0, pos.1),
            Vec2::new(vel.0, vel.1),
            r,
            &MassModel::default(),
            VisualHandle(0),
        )
        .unwrap()
    }

    fn still_config() -> PhysicsConfig {
        PhysicsConfig {
            field_width: 1000.0,
            field_height: 1000.0,
            damping: 1.0,
            min_speed: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_head_on_scenario() {
        let mut engine = PhysicsEngine::new(still_config());
        let mut marbles = vec![
            marble("a", (100.0, 100.0), (5.0, 0.0), 10.0),
            marble("b", (115.0, 100.0), (-5.0, 0.0), 10.0),
        ];
        engine.step(&mut marbles, FIXED_DT);

        assert!((marbles[0].vel.x + 4.6).abs() < 0.01, "a: {:?}", marbles[0].vel);
        assert!((marbles[1].vel.x - 4.6).abs() < 0.01, "b: {:?}", marbles[1].vel);
        assert!(marbles[0].vel.y.abs() < 1e-3);
        let dist = (marbles[1].pos - marbles[0].pos).length();
        assert!(dist >= 20.0 - SOLVER_EPSILON, "residual overlap: {}", dist);
        assert_eq!(engine.last_stats().contacts, 1);
    }

    #[test]
    fn test_separating_overlap_gains_no_speed() {
        let mut engine = PhysicsEngine::new(still_config());
        let mut marbles = vec![
            marble("a", (100.0, 100.0), (-5.0, 0.0), 10.0),
            marble("b", (115.0, 100.0), (5.0, 0.0), 10.0),
        ];
        let energy_before: f32 = marbles.iter().map(Marble::kinetic_energy).sum();
        engine.step(&mut marbles, FIXED_DT);

        assert_eq!(engine.last_stats().contacts, 1);
        let rel = (marbles[1].vel - marbles[0].vel).x;
        assert!((rel - 10.0).abs() < 1e-2, "rel={}", rel);
        let energy_after: f32 = marbles.iter().map(Marble::kinetic_energy).sum();
        assert!(energy_after <= energy_before + 1e-2, "{} -> {}", energy_before, energy_after);
        assert!((marbles[1].pos - marbles[0].pos).length() >= 20.0 - SOLVER_EPSILON);
    }

    #[test]
    fn test_inverted_speed_range_is_swapped() {
        let mut engine = PhysicsEngine::new(still_config());
        engine.update_config(PhysicsConfig {
            min_speed: 900.0,
            max_speed: 100.0,
            ..still_config()
        });
        assert_eq!(engine.config().min_speed, 100.0);
        assert_eq!(engine.config().max_speed, 900.0);

        let mut marbles = vec![marble("a", (500.0, 500.0), (2000.0, 0.0), 10.0)];
        engine.integrate(&mut marbles, FIXED_DT, engine.config().min_speed);
        assert!(marbles[0].vel.length() <= 900.0 + 1e-2);
    }

    #[test]
    fn test_restitution_law() {
        for e in [0.0_f32, 0.5, 1.0] {
            let mut engine = PhysicsEngine::new(PhysicsConfig {
                restitution: e,
                ..still_config()
            });
            let mut marbles = vec![
                marble("a", (200.0, 200.0), (8.0, 0.0), 10.0),
                marble("b", (218.0, 200.0), (-8.0, 0.0), 10.0),
            ];
            engine.step(&mut marbles, FIXED_DT);
            let rel = (marbles[1].vel - marbles[0].vel).x;
            assert!((rel - e * 16.0).abs() < 0.02, "e={} rel={}", e, rel);
        }
    }

    #[test]
    fn test_min_speed_rescale() {
        let engine = PhysicsEngine::new(PhysicsConfig {
            min_speed: 30.0,
            ..still_config()
        });
        let mut marbles = vec![marble("a", (500.0, 500.0), (6.0, 8.0), 10.0)];
        engine.integrate(&mut marbles, FIXED_DT, 30.0);
        assert!((marbles[0].vel.length() - 30.0).abs() < 1e-4);
        assert!((marbles[0].vel.normalize() - Vec2::new(0.6, 0.8)).length() < 1e-5);
    }

    #[test]
    fn test_damping_is_frame_rate_independent() {
        let config = PhysicsConfig {
            damping: 0.9,
            ..still_config()
        };
        let engine = PhysicsEngine::new(config);
        let mut one = vec![marble("a", (500.0, 500.0), (100.0, 0.0), 10.0)];
        let mut two = one.clone();
        engine.integrate(&mut one, 1.0 / 60.0, 0.0);
        engine.integrate(&mut two, 1.0 / 120.0, 0.0);
        engine.integrate(&mut two, 1.0 / 120.0, 0.0);
        assert!((one[0].vel.x - two[0].vel.x).abs() < 1e-3);
        assert!((one[0].vel.x - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_wall_bounce_reflects() {
        let mut engine = PhysicsEngine::new(PhysicsConfig {
            wall_bounce: 0.5,
            ..still_config()
        });
        let mut marbles = vec![marble("a", (12.0, 500.0), (-300.0, 0.0), 10.0)];
        engine.step(&mut marbles, FIXED_DT);
        assert_eq!(marbles[0].pos.x, 10.0);
        assert!((marbles[0].vel.x - 150.0).abs() < 1e-3);
        assert_eq!(engine.last_stats().wall_hits, 1);
    }

    #[test]
    fn test_collisions_disabled_allows_overlap() {
        let mut engine = PhysicsEngine::new(still_config().with_collisions(false));
        let mut marbles = vec![
            marble("a", (100.0, 100.0), (0.0, 0.0), 10.0),
            marble("b", (105.0, 100.0), (0.0, 0.0), 10.0),
        ];
        engine.step(&mut marbles, FIXED_DT);
        assert_eq!(engine.last_stats().pairs_tested, 0);
        assert!((marbles[1].pos.x - marbles[0].pos.x - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_coincident_marbles_separate_without_nan() {
        let mut engine = PhysicsEngine::new(still_config());
        let mut marbles = vec![
            marble("a", (300.0, 300.0), (0.0, 0.0), 10.0),
            marble("b", (300.0, 300.0), (0.0, 0.0), 10.0),
        ];
        engine.step(&mut marbles, FIXED_DT);
        for m in &marbles {
            assert!(m.pos.is_finite() && m.vel.is_finite());
        }
        assert!((marbles[1].pos - marbles[0].pos).length() >= 20.0 - SOLVER_EPSILON);
    }

    #[test]
    fn test_zero_dt_is_a_no_op() {
        let mut engine = PhysicsEngine::new(still_config());
        let mut marbles = vec![marble("a", (300.0, 300.0), (10.0, 0.0), 10.0)];
        engine.step(&mut marbles, 0.0);
        assert_eq!(marbles[0].pos, Vec2::new(300.0, 300.0));
    }

    #[test]
    fn test_config_replacement_keeps_transient_state() {
        let mut engine = PhysicsEngine::new(still_config());
        let mut marbles = vec![marble("a", (300.0, 300.0), (60.0, 0.0), 10.0)];
        engine.step(&mut marbles, FIXED_DT);
        engine.update_config(engine.config().with_field(400.0, 400.0));
        engine.step(&mut marbles, FIXED_DT);
        assert!((marbles[0].pos.x - 302.0).abs() < 1e-3);
        assert_eq!(engine.config().field_width, 400.0);
    }

    #[test]
    fn test_substep_thresholds() {
        assert_eq!(substep_count(1.0), 1);
        assert_eq!(substep_count(1.999), 1);
        assert_eq!(substep_count(2.0), 3);
        assert_eq!(substep_count(3.0), 3);
        assert_eq!(substep_count(5.0), 6);
        assert_eq!(substep_count(6.0), 6);
    }

    #[test]
    fn test_min_speed_floor_fades() {
        assert_eq!(min_speed_floor_scale(0.0), 1.0);
        // t = 0.25 → 1 − 0.125
        assert!((min_speed_floor_scale(1.75) - 0.875).abs() < 1e-5);
        assert_eq!(min_speed_floor_scale(3.5), 0.0);
        assert_eq!(min_speed_floor_scale(9.8), 0.0);
    }

    #[test]
    fn test_randomize_speeds_in_range() {
        let engine = PhysicsEngine::new(still_config());
        let mut marbles: Vec<Marble> = (0..20)
            .map(|i| marble(&format!("m{i}"), (100.0, 100.0), (0.0, 0.0), 5.0))
            .collect();
        let mut rng = Pcg32::seed_from_u64(7);
        engine.randomize_speeds(&mut marbles, &mut rng, 60.0, 150.0);
        for m in &marbles {
            let s = m.vel.length();
            assert!((60.0 - 1e-3..=150.0 + 1e-3).contains(&s), "speed {}", s);
        }
    }

    proptest! {
        #[test]
        fn prop_integrate_respects_speed_limits(
            vx in -2000.0f32..2000.0,
            vy in -2000.0f32..2000.0,
            damping in 0.5f32..=1.0,
        ) {
            prop_assume!(vx.abs() > 1e-3 || vy.abs() > 1e-3);
            let engine = PhysicsEngine::new(PhysicsConfig {
                damping,
                min_speed: 30.0,
                max_speed: 800.0,
                ..still_config()
            });
            let mut marbles = vec![marble("a", (500.0, 500.0), (vx, vy), 10.0)];
            engine.integrate(&mut marbles, FIXED_DT, 30.0);
            let speed = marbles[0].vel.length();
            prop_assert!(speed >= 30.0 - 1e-3 && speed <= 800.0 + 1e-2, "speed {}", speed);
        }

        #[test]
        fn prop_step_keeps_marbles_in_field(
            bodies in prop::collection::vec(
                (10.0f32..390.0, 10.0f32..290.0, -800.0f32..800.0, -800.0f32..800.0, 4.0f32..20.0),
                1..30,
            ),
        ) {
            let mut engine = PhysicsEngine::new(PhysicsConfig::new(400.0, 300.0));
            let mut marbles: Vec<Marble> = bodies
                .iter()
                .enumerate()
                .map(|(i, &(x, y, vx, vy, r))| marble(&format!("{i:03}"), (x, y), (vx, vy), r))
                .collect();
            for _ in 0..5 {
                engine.step(&mut marbles, FIXED_DT);
                for m in &marbles {
                    let r = m.radius();
                    prop_assert!(m.pos.x >= r && m.pos.x <= 400.0 - r);
                    prop_assert!(m.pos.y >= r && m.pos.y <= 300.0 - r);
                }
            }
        }

        #[test]
        fn prop_pairs_in_one_cell_are_deduplicated(n in 2usize..25) {
            let mut engine = PhysicsEngine::new(still_config());
            // cell size 20: every centre lands in cell (5, 5)
            let mut marbles: Vec<Marble> = (0..n)
                .map(|i| {
                    let offset = i as f32 * (19.0 / n as f32);
                    marble(&format!("{i:03}"), (100.0 + offset, 110.0), (0.0, 0.0), 10.0)
                })
                .collect();
            engine.step(&mut marbles, FIXED_DT);
            prop_assert_eq!(engine.last_stats().pairs_tested, n * (n - 1) / 2);
        }

        #[test]
        fn prop_resolved_pair_has_no_residual_overlap(
            dx in -19.0f32..19.0,
            dy in -19.0f32..19.0,
            ra in 5.0f32..15.0,
            rb in 5.0f32..15.0,
        ) {
            let mut a = marble("a", (500.0, 500.0), (0.0, 0.0), ra);
            let mut b = marble("b", (500.0 + dx, 500.0 + dy), (0.0, 0.0), rb);
            if let Some((normal, pen)) = circle_overlap(a.pos, ra, b.pos, rb) {
                prop_assert!(separate_pair(&mut a, &mut b, normal, pen));
                let dist = (b.pos - a.pos).length();
                prop_assert!(dist >= ra + rb - SOLVER_EPSILON, "dist {} < {}", dist, ra + rb);
            }
        }
    }
}

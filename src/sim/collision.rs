//! Narrow phase and contact response for marble pairs and walls
//!
//! Positions are corrected first (inverse-mass weighted), velocities are
//! fixed up afterwards from the recorded contacts.

use glam::Vec2;

use super::marble::{Marble, WallHit};
use crate::consts::SOLVER_EPSILON;

/// A resolved marble/marble overlap, kept for the velocity pass
#[derive(Debug, Clone, Copy)]
pub struct Contact {
    /// Index of the marble with the smaller id
    pub a: usize,
    pub b: usize,
    /// Unit normal pointing from `a` to `b`
    pub normal: Vec2,
    /// Overlap depth before correction
    pub penetration: f32,
}

/// Overlap test between two discs
///
/// Returns the a→b normal and penetration depth, or None when the discs do
/// not overlap. Coincident centres fall back to +X.
pub fn circle_overlap(pos_a: Vec2, radius_a: f32, pos_b: Vec2, radius_b: f32) -> Option<(Vec2, f32)> {
    let delta = pos_b - pos_a;
    let min_dist = radius_a + radius_b;
    let dist_sq = delta.length_squared();
    if dist_sq >= min_dist * min_dist {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > SOLVER_EPSILON {
        delta / dist
    } else {
        Vec2::X
    };
    Some((normal, min_dist - dist))
}

/// Push an overlapping pair apart along `normal`
///
/// `Δ = penetration / (1/ma + 1/mb)`; each marble moves by Δ times its own
/// inverse mass, so the lighter one travels further. Returns false when the
/// pair has no inverse mass to distribute.
pub fn separate_pair(a: &mut Marble, b: &mut Marble, normal: Vec2, penetration: f32) -> bool {
    let inv_a = a.inv_mass();
    let inv_b = b.inv_mass();
    let inv_sum = inv_a + inv_b;
    if inv_sum <= 0.0 || !inv_sum.is_finite() {
        return false;
    }

    let delta = penetration / inv_sum;
    a.pos -= normal * (delta * inv_a);
    b.pos += normal * (delta * inv_b);
    true
}

/// Restitution impulse for a recorded contact
///
/// Sets the relative normal velocity (b − a) to `−e × v_pre`, where `v_pre`
/// is the relative normal velocity at the start of the step. A pair that was
/// already separating keeps `v_pre` unchanged, which discards the velocity
/// introduced by positional correction.
pub fn apply_restitution(a: &mut Marble, b: &mut Marble, normal: Vec2, restitution: f32) -> bool {
    let inv_a = a.inv_mass();
    let inv_b = b.inv_mass();
    let inv_sum = inv_a + inv_b;
    if inv_sum <= 0.0 || !inv_sum.is_finite() {
        return false;
    }

    let pre_vn = (b.pre_vel - a.pre_vel).dot(normal);
    let target = if pre_vn < 0.0 {
        -restitution * pre_vn
    } else {
        pre_vn
    };
    let vn = (b.vel - a.vel).dot(normal);

    let impulse = (target - vn) / inv_sum;
    a.vel -= normal * (impulse * inv_a);
    b.vel += normal * (impulse * inv_b);
    true
}

/// Clamp one coordinate into `[radius, extent − radius]`
#[inline]
pub fn clamp_axis(value: f32, radius: f32, extent: f32) -> (f32, WallHit) {
    if value < radius {
        (radius, WallHit::Min)
    } else if value > extent - radius {
        (extent - radius, WallHit::Max)
    } else {
        (value, WallHit::None)
    }
}

/// Velocity on one axis after the wall pass
///
/// On a clamped axis the position delta only measures the truncated travel,
/// so the integrated velocity is reflected instead (only when it points into
/// the wall).
#[inline]
pub fn wall_response(derived: f32, integrated: f32, wall: WallHit, bounce: f32) -> f32 {
    match wall {
        WallHit::Min if integrated < 0.0 => -integrated * bounce,
        WallHit::Max if integrated > 0.0 => -integrated * bounce,
        _ => derived,
    }
}

/// Mutable references to two distinct slice elements
pub fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(i, j, "pair_mut needs distinct indices");
    if i < j {
        let (left, right) = items.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::VisualHandle;
    use crate::sim::marble::MassModel;

    fn marble(id: &str, x: f32, r: f32) -> Marble {
        Marble::new(id, Vec2::new(x, 0.0), Vec2::ZERO, r, &MassModel::default(), VisualHandle(0))
            .unwrap()
    }

    #[test]
    fn test_overlap_normal_and_depth() {
        let (n, pen) = circle_overlap(Vec2::ZERO, 10.0, Vec2::new(15.0, 0.0), 10.0).unwrap();
        assert!((n - Vec2::X).length() < 1e-6);
        assert!((pen - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_touching_is_not_overlap() {
        assert!(circle_overlap(Vec2::ZERO, 10.0, Vec2::new(20.0, 0.0), 10.0).is_none());
    }

    #[test]
    fn test_coincident_centres_use_fallback_normal() {
        let (n, pen) = circle_overlap(Vec2::ONE, 5.0, Vec2::ONE, 5.0).unwrap();
        assert_eq!(n, Vec2::X);
        assert!((pen - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_heavier_marble_moves_less() {
        let mut small = marble("a", 0.0, 10.0);
        let mut big = marble("b", 25.0, 20.0);
        let (n, pen) = circle_overlap(small.pos, 10.0, big.pos, 20.0).unwrap();
        assert!(separate_pair(&mut small, &mut big, n, pen));

        let small_shift = small.pos.x.abs();
        let big_shift = (big.pos.x - 25.0).abs();
        assert!(big_shift < small_shift);
        assert!(((big.pos - small.pos).length() - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_wall_response_only_reflects_into_wall() {
        assert_eq!(wall_response(-2.0, -10.0, WallHit::Min, 0.5), 5.0);
        // moving away from the wall keeps the derived velocity
        assert_eq!(wall_response(3.0, 10.0, WallHit::Min, 0.5), 3.0);
        assert_eq!(wall_response(7.0, 10.0, WallHit::Max, 0.5), -5.0);
        assert_eq!(wall_response(7.0, 10.0, WallHit::None, 0.5), 7.0);
    }

    #[test]
    fn test_clamp_axis() {
        assert_eq!(clamp_axis(3.0, 10.0, 100.0), (10.0, WallHit::Min));
        assert_eq!(clamp_axis(95.0, 10.0, 100.0), (90.0, WallHit::Max));
        assert_eq!(clamp_axis(50.0, 10.0, 100.0), (50.0, WallHit::None));
    }

    #[test]
    fn test_pair_mut_either_order() {
        let mut v = [1, 2, 3];
        let (a, b) = pair_mut(&mut v, 2, 0);
        assert_eq!((*a, *b), (3, 1));
    }
}

//! Steering helpers
//!
//! Kinematic movement on the host world plus the target-point geometry used
//! by the combat states. Angles in the XZ plane follow `(cos a, 0, sin a)`;
//! facing follows `yaw = atan2(dx, dz)`.

use crate::world::{CombatWorld, EntityId};
use glam::Vec3;
use rand::Rng;

/// Distances below this are treated as already arrived
const ARRIVAL_EPSILON: f32 = 1e-4;

/// Yaw that faces along `direction`
#[inline]
pub fn yaw_towards(direction: Vec3) -> f32 {
    direction.x.atan2(direction.z)
}

/// Move `entity` toward `target` by at most `speed * dt`, then face the
/// direction of travel
///
/// Returns the distance still left to `target`, or `None` if the world
/// could not resolve the entity.
pub fn move_toward<W: CombatWorld + ?Sized>(
    world: &mut W,
    entity: EntityId,
    target: Vec3,
    speed: f32,
    dt: f32,
) -> Option<f32> {
    let position = world.position(entity)?;
    let to_target = target - position;
    let distance = to_target.length();

    if distance < ARRIVAL_EPSILON {
        return Some(0.0);
    }

    let step = (speed * dt).max(0.0).min(distance);
    let direction = to_target / distance;
    world.set_position(entity, position + direction * step);
    world.set_yaw(entity, yaw_towards(direction));

    Some(distance - step)
}

/// Point on a horizontal circle around `center`
#[inline]
pub fn orbit_point(center: Vec3, angle: f32, radius: f32) -> Vec3 {
    center + Vec3::new(angle.cos(), 0.0, angle.sin()) * radius
}

/// Horizontal bearing of `point` as seen from `center`
#[inline]
pub fn bearing(center: Vec3, point: Vec3) -> f32 {
    let offset = point - center;
    offset.z.atan2(offset.x)
}

/// Point `distance` ahead of `from`, directly away from `threat`
pub fn flee_point(from: Vec3, threat: Vec3, distance: f32) -> Vec3 {
    let mut away = (from - threat).normalize_or_zero();
    if away == Vec3::ZERO {
        // Standing on the threat: any direction will do
        away = Vec3::X;
    }
    from + away * distance
}

/// Point beside the player, along the lateral axis `right`
///
/// `side` is `1.0` for the player's right and `-1.0` for the left.
#[inline]
pub fn flank_point(player: Vec3, right: Vec3, side: f32, distance: f32) -> Vec3 {
    player + right * (side * distance)
}

/// Random unit vector in the XZ plane
pub fn random_horizontal_unit<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    Vec3::new(angle.cos(), 0.0, angle.sin())
}

/// `count` random waypoints within `radius` of `origin`, on the origin's plane
pub fn patrol_points<R: Rng + ?Sized>(
    rng: &mut R,
    origin: Vec3,
    count: usize,
    radius: f32,
) -> Vec<Vec3> {
    (0..count)
        .map(|_| {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let distance = rng.gen_range(0.0..=radius.max(0.0));
            orbit_point(origin, angle, distance)
        })
        .collect()
}

/// Bernoulli draw that tolerates probabilities outside `[0, 1]`
#[inline]
pub fn roll<R: Rng + ?Sized>(rng: &mut R, probability: f32) -> bool {
    if probability <= 0.0 || probability.is_nan() {
        return false;
    }
    probability >= 1.0 || rng.gen::<f32>() < probability
}

//! Threat assessment

/// Distance at which the distance term falls to zero
pub const THREAT_DISTANCE: f32 = 20.0;
/// Weight of missing health
pub const HEALTH_WEIGHT: f32 = 0.5;
/// Threat added per level the player is above the entity
pub const LEVEL_WEIGHT: f32 = 0.1;

/// Inputs to [`assess_threat`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreatInput {
    pub distance: f32,
    pub health: f32,
    pub max_health: f32,
    pub player_level: u32,
    pub entity_level: u32,
}

/// Normalized danger score for one entity, always within `[0, 1]`
///
/// Closeness to the player, missing health and the player's level advantage
/// each add to the score. A NaN or infinite distance adds nothing, and zero
/// max health counts as no health left.
pub fn assess_threat(input: &ThreatInput) -> f32 {
    let distance_term = if input.distance.is_finite() {
        (1.0 - input.distance.max(0.0) / THREAT_DISTANCE).max(0.0)
    } else {
        0.0
    };

    // Overheal lowers the score; only the final sum is clamped
    let health_ratio = if input.max_health > 0.0 && input.health.is_finite() {
        input.health / input.max_health
    } else {
        0.0
    };
    let health_term = (1.0 - health_ratio) * HEALTH_WEIGHT;

    let level_gap = input.player_level.saturating_sub(input.entity_level) as f32;
    let level_term = level_gap * LEVEL_WEIGHT;

    (distance_term + health_term + level_term).clamp(0.0, 1.0)
}

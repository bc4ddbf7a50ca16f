//! World and player access
//!
//! The AI core never holds references into the scene. Entities are named by
//! [`EntityId`] and resolved through a [`CombatWorld`] every tick; anything
//! the world cannot resolve is skipped for that tick.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable identifier of an entity owned by the host world
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Combat-relevant stats read from an entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityStats {
    pub health: f32,
    pub max_health: f32,
    pub level: u32,
    /// Base damage of one attack
    pub damage: f32,
}

impl EntityStats {
    pub fn new(max_health: f32, level: u32, damage: f32) -> Self {
        Self {
            health: max_health,
            max_health,
            level,
            damage,
        }
    }

    /// Health as a fraction of max health (0.0 - 1.0)
    pub fn health_percent(&self) -> f32 {
        if self.max_health <= 0.0 {
            return 0.0;
        }
        (self.health / self.max_health).clamp(0.0, 1.0)
    }
}

impl Default for EntityStats {
    fn default() -> Self {
        Self::new(100.0, 1, 10.0)
    }
}

/// View of the host world used by the AI
pub trait CombatWorld {
    /// World position, `None` if the entity no longer exists
    fn position(&self, entity: EntityId) -> Option<Vec3>;

    fn set_position(&mut self, entity: EntityId, position: Vec3);

    /// Rotation around the Y axis in radians
    fn yaw(&self, entity: EntityId) -> Option<f32>;

    fn set_yaw(&mut self, entity: EntityId, yaw: f32);

    fn stats(&self, entity: EntityId) -> Option<EntityStats>;

    /// Find a cover point for an entity at `from` hiding from `threat`
    fn find_cover(&self, _from: Vec3, _threat: Vec3) -> Option<Vec3> {
        None
    }
}

/// The controlled player as seen by the AI
pub trait Player {
    fn id(&self) -> EntityId;

    fn position(&self) -> Vec3;

    /// Rotation around the Y axis in radians
    fn yaw(&self) -> f32;

    fn velocity(&self) -> Vec3;

    fn level(&self) -> u32;

    /// Skill tag used since the last tick, if any
    fn last_used_skill(&self) -> Option<&str>;

    fn is_dodging(&self) -> bool;

    fn is_attacking(&self) -> bool;

    /// Apply an attack. Returns whether the hit landed.
    fn take_damage(&mut self, amount: f32) -> bool;

    /// Unit vector the player faces
    fn forward(&self) -> Vec3 {
        let yaw = self.yaw();
        Vec3::new(yaw.sin(), 0.0, yaw.cos())
    }

    /// Unit vector to the player's right, perpendicular to [`Player::forward`]
    fn right(&self) -> Vec3 {
        let yaw = self.yaw();
        Vec3::new(yaw.cos(), 0.0, -yaw.sin())
    }
}

/// Entity stored in a [`MemoryWorld`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryEntity {
    pub position: Vec3,
    pub yaw: f32,
    pub stats: EntityStats,
}

/// Headless in-memory world
#[derive(Debug, Clone, Default)]
pub struct MemoryWorld {
    entities: HashMap<EntityId, MemoryEntity>,
    cover_points: Vec<Vec3>,
    /// Maximum distance searched for cover
    pub cover_search_radius: f32,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            cover_points: Vec::new(),
            cover_search_radius: 15.0,
        }
    }

    /// Add or replace an entity
    pub fn spawn(
        &mut self,
        id: impl Into<EntityId>,
        position: Vec3,
        stats: EntityStats,
    ) -> EntityId {
        let id = id.into();
        self.entities.insert(
            id,
            MemoryEntity {
                position,
                yaw: 0.0,
                stats,
            },
        );
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> Option<MemoryEntity> {
        self.entities.remove(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&MemoryEntity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut MemoryEntity> {
        self.entities.get_mut(&id)
    }

    /// Set current health, clamped to 0..max
    pub fn set_health(&mut self, id: EntityId, health: f32) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.stats.health = health.clamp(0.0, entity.stats.max_health);
        }
    }

    pub fn add_cover_point(&mut self, point: Vec3) {
        self.cover_points.push(point);
    }
}

impl CombatWorld for MemoryWorld {
    fn position(&self, entity: EntityId) -> Option<Vec3> {
        self.entities.get(&entity).map(|e| e.position)
    }

    fn set_position(&mut self, entity: EntityId, position: Vec3) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.position = position;
        }
    }

    fn yaw(&self, entity: EntityId) -> Option<f32> {
        self.entities.get(&entity).map(|e| e.yaw)
    }

    fn set_yaw(&mut self, entity: EntityId, yaw: f32) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.yaw = yaw;
        }
    }

    fn stats(&self, entity: EntityId) -> Option<EntityStats> {
        self.entities.get(&entity).map(|e| e.stats)
    }

    /// Nearest cover point in range that is farther from the threat than `from`
    fn find_cover(&self, from: Vec3, threat: Vec3) -> Option<Vec3> {
        let own_threat_distance = from.distance(threat);

        self.cover_points
            .iter()
            .copied()
            .filter(|p| p.distance(from) <= self.cover_search_radius)
            .filter(|p| p.distance(threat) >= own_threat_distance)
            .min_by(|a, b| a.distance(from).total_cmp(&b.distance(from)))
    }
}

/// Plain player state implementing [`Player`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: EntityId,
    pub position: Vec3,
    pub yaw: f32,
    pub velocity: Vec3,
    pub level: u32,
    pub health: f32,
    pub last_used_skill: Option<String>,
    pub is_dodging: bool,
    pub is_attacking: bool,
    /// Damage taken from landed hits, in order
    #[serde(skip)]
    pub damage_log: Vec<f32>,
}

impl PlayerState {
    pub fn new(id: impl Into<EntityId>, position: Vec3) -> Self {
        Self {
            id: id.into(),
            position,
            yaw: 0.0,
            velocity: Vec3::ZERO,
            level: 1,
            health: 100.0,
            last_used_skill: None,
            is_dodging: false,
            is_attacking: false,
            damage_log: Vec::new(),
        }
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.yaw = yaw;
        self
    }
}

impl Player for PlayerState {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn yaw(&self) -> f32 {
        self.yaw
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn level(&self) -> u32 {
        self.level
    }

    fn last_used_skill(&self) -> Option<&str> {
        self.last_used_skill.as_deref()
    }

    fn is_dodging(&self) -> bool {
        self.is_dodging
    }

    fn is_attacking(&self) -> bool {
        self.is_attacking
    }

    /// Hits miss while the player is dodging
    fn take_damage(&mut self, amount: f32) -> bool {
        if self.is_dodging {
            return false;
        }
        self.health = (self.health - amount).max(0.0);
        self.damage_log.push(amount);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_axes() {
        let player = PlayerState::new(1u64, Vec3::ZERO);
        assert!((player.forward() - Vec3::Z).length() < 1e-6);
        assert!((player.right() - Vec3::X).length() < 1e-6);

        let turned = PlayerState::new(1u64, Vec3::ZERO).with_yaw(std::f32::consts::FRAC_PI_2);
        assert!((turned.forward() - Vec3::X).length() < 1e-6);
        assert!((turned.right() - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_player_damage() {
        let mut player = PlayerState::new(1u64, Vec3::ZERO);
        assert!(player.take_damage(10.0));
        assert_eq!(player.health, 90.0);

        player.is_dodging = true;
        assert!(!player.take_damage(10.0));
        assert_eq!(player.health, 90.0);
        assert_eq!(player.damage_log, vec![10.0]);
    }

    #[test]
    fn test_memory_world_resolution() {
        let mut world = MemoryWorld::new();
        let id = world.spawn(7u64, Vec3::new(1.0, 0.0, 2.0), EntityStats::default());

        assert_eq!(world.position(id), Some(Vec3::new(1.0, 0.0, 2.0)));
        world.set_yaw(id, 1.0);
        assert_eq!(world.yaw(id), Some(1.0));

        world.despawn(id);
        assert_eq!(world.position(id), None);
        // Writes to missing entities are ignored
        world.set_position(id, Vec3::ONE);
        assert_eq!(world.position(id), None);
    }

    #[test]
    fn test_find_cover() {
        let mut world = MemoryWorld::new();
        world.add_cover_point(Vec3::new(-5.0, 0.0, 0.0)); // away from threat
        world.add_cover_point(Vec3::new(3.0, 0.0, 0.0)); // toward threat
        world.add_cover_point(Vec3::new(-50.0, 0.0, 0.0)); // out of range

        let cover = world.find_cover(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(cover, Some(Vec3::new(-5.0, 0.0, 0.0)));
    }

    #[test]
    fn test_health_percent_guards_zero_max() {
        let stats = EntityStats {
            health: 10.0,
            max_health: 0.0,
            level: 1,
            damage: 1.0,
        };
        assert_eq!(stats.health_percent(), 0.0);
    }
}

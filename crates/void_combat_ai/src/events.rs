//! Events produced by a tick

use crate::handle::PackId;
use crate::record::AiState;
use crate::world::EntityId;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Something the AI did during [`crate::Orchestrator::update`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AiEvent {
    /// An entity changed behavior state
    StateChanged {
        entity: EntityId,
        from: AiState,
        to: AiState,
    },
    /// An entity attacked the player
    AttackResolved {
        entity: EntityId,
        damage: f32,
        /// Ambush multiplier that was applied (1.0 when none)
        ambush_bonus: f32,
        hit: bool,
    },
    /// An entity dodged a player attack
    Dodged { entity: EntityId, displacement: Vec3 },
    /// A pack lost its last member and was removed
    PackDisbanded { pack: PackId },
}

impl AiEvent {
    /// Entity the event is about, if any
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            AiEvent::StateChanged { entity, .. }
            | AiEvent::AttackResolved { entity, .. }
            | AiEvent::Dodged { entity, .. } => Some(*entity),
            AiEvent::PackDisbanded { .. } => None,
        }
    }
}

//! Error types for the combat AI

use crate::handle::PackId;
use crate::world::EntityId;
use thiserror::Error;

/// Combat AI setup errors
///
/// Only registration, pack management and configuration report errors.
/// The per-tick update never fails; unresolved entities are skipped.
#[derive(Debug, Error)]
pub enum CombatAiError {
    /// No personality registered under this key
    #[error("Unknown personality: {0}")]
    UnknownPersonality(String),

    /// The world could not resolve the entity
    #[error("Entity not found in world: {0:?}")]
    EntityNotFound(EntityId),

    /// The entity has no AI record
    #[error("Entity is not registered: {0:?}")]
    NotRegistered(EntityId),

    /// A pack needs at least one member
    #[error("Cannot create an empty pack")]
    EmptyPack,

    /// Pack membership is exclusive
    #[error("Entity {entity:?} already belongs to pack {pack:?}")]
    AlreadyInPack { entity: EntityId, pack: PackId },

    /// Pack id is stale or was never issued
    #[error("Pack not found: {0:?}")]
    PackNotFound(PackId),

    /// Configuration failed validation
    #[error("Invalid combat AI configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for combat AI operations
pub type Result<T> = std::result::Result<T, CombatAiError>;

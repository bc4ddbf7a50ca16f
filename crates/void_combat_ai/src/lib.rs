//! Void Combat AI - Autonomous enemy behavior
//!
//! This crate drives hostile entities through a combat state machine,
//! learns from the player's habits and coordinates groups of enemies.
//!
//! # Features
//!
//! - Eight-state combat machine (idle, patrol, hunt, attack, flee, ambush, flank, cover)
//! - Named personalities with presets
//! - Threat assessment
//! - Player behavior model with position prediction
//! - Pack formations (scatter, pincer, wave)
//! - Deterministic randomness from a single seed
//!
//! The host owns the world. It hands the AI a [`CombatWorld`] for entity
//! positions and stats and a [`Player`] for the player's state, once per
//! frame.
//!
//! # Example
//!
//! ```ignore
//! use void_combat_ai::prelude::*;
//!
//! let mut world = MemoryWorld::new();
//! let grunt = world.spawn(1u64, Vec3::new(10.0, 0.0, 0.0), EntityStats::default());
//! let mut player = PlayerState::new(1000u64, Vec3::ZERO);
//!
//! let mut ai = Orchestrator::new(CombatAiConfig::default())?;
//! ai.register_enemy(&world, grunt, "AGGRESSIVE")?;
//!
//! // Each frame
//! ai.update(1.0 / 60.0, &mut world, &mut player);
//! for event in ai.events() {
//!     println!("{event:?}");
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod handle;
pub mod orchestrator;
pub mod pack;
pub mod personality;
pub mod player_model;
pub mod record;
pub mod state_machine;
pub mod steering;
pub mod threat;
pub mod world;

pub mod prelude {
    pub use crate::config::{CombatAiConfig, PatrolConfig, PredictionConfig, SteeringConfig};
    pub use crate::error::CombatAiError;
    pub use crate::events::AiEvent;
    pub use crate::handle::{AgentHandle, Handle, PackId, SlotArena};
    pub use crate::orchestrator::Orchestrator;
    pub use crate::pack::{Formation, Pack, PackCoordinator, TargetPriority};
    pub use crate::personality::{
        NamedPersonality, PersonalityFlags, PersonalityProfile, PersonalityRegistry,
    };
    pub use crate::player_model::{CounterStrategy, PlayerBehaviorModel};
    pub use crate::record::{AiRecord, AiState, CombatMemory, LearningData};
    pub use crate::state_machine::StateMachineEngine;
    pub use crate::threat::{assess_threat, ThreatInput};
    pub use crate::world::{CombatWorld, EntityId, EntityStats, MemoryWorld, Player, PlayerState};
    pub use glam::Vec3;
}

pub use prelude::*;

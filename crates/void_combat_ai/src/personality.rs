//! Combat personalities
//!
//! A personality is an immutable bundle of combat tuning. Records share
//! profiles through `Arc`, so one preset serves any number of entities.

use crate::error::{CombatAiError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Optional behaviors a personality may use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityFlags {
    /// May ambush from idle and hide behind cover while fleeing
    #[serde(default)]
    pub use_cover: bool,
    /// May break off a hunt to flank the player
    #[serde(default)]
    pub flanking: bool,
    /// Fights harder when badly hurt
    #[serde(default)]
    pub rage_mode: bool,
}

/// Tunable combat parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityProfile {
    /// Distance at which attacks are possible
    pub attack_range: f32,
    /// Fraction of max health below which the entity flees
    pub retreat_threshold: f32,
    /// Distance at which the player is noticed and pursued
    pub chase_range: f32,
    /// Expected attacks per second while attacking
    pub attack_frequency: f32,
    #[serde(default)]
    pub flags: PersonalityFlags,
}

impl PersonalityProfile {
    /// Health fraction below which rage applies
    pub const RAGE_HEALTH_FRACTION: f32 = 0.5;
    /// Attack chance and damage multiplier while enraged
    pub const RAGE_MULTIPLIER: f32 = 1.5;

    pub fn new(
        attack_range: f32,
        retreat_threshold: f32,
        chase_range: f32,
        attack_frequency: f32,
    ) -> Self {
        Self {
            attack_range,
            retreat_threshold,
            chase_range,
            attack_frequency,
            flags: PersonalityFlags::default(),
        }
    }

    pub fn with_cover(mut self) -> Self {
        self.flags.use_cover = true;
        self
    }

    pub fn with_flanking(mut self) -> Self {
        self.flags.flanking = true;
        self
    }

    pub fn with_rage(mut self) -> Self {
        self.flags.rage_mode = true;
        self
    }

    /// Charges in, retreats late, flanks
    pub fn aggressive() -> Self {
        Self::new(3.0, 0.1, 20.0, 1.5).with_flanking()
    }

    /// Keeps distance, retreats early, uses cover
    pub fn defensive() -> Self {
        Self::new(8.0, 0.4, 12.0, 0.6).with_cover()
    }

    /// Mid range, uses cover and flanks
    pub fn tactical() -> Self {
        Self::new(6.0, 0.25, 18.0, 1.0).with_cover().with_flanking()
    }

    /// Never retreats, enrages when hurt
    pub fn berserker() -> Self {
        Self::new(2.5, 0.0, 25.0, 2.5).with_rage()
    }

    /// Multiplier applied to attack chance and damage at this health fraction
    pub fn rage_multiplier(&self, health_percent: f32) -> f32 {
        if self.flags.rage_mode && health_percent < Self::RAGE_HEALTH_FRACTION {
            Self::RAGE_MULTIPLIER
        } else {
            1.0
        }
    }
}

impl Default for PersonalityProfile {
    fn default() -> Self {
        Self::aggressive()
    }
}

/// A profile paired with the key it is registered under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPersonality {
    pub key: String,
    #[serde(flatten)]
    pub profile: PersonalityProfile,
}

/// Named personality presets
#[derive(Debug, Clone)]
pub struct PersonalityRegistry {
    profiles: HashMap<String, Arc<PersonalityProfile>>,
}

impl PersonalityRegistry {
    pub const AGGRESSIVE: &'static str = "AGGRESSIVE";
    pub const DEFENSIVE: &'static str = "DEFENSIVE";
    pub const TACTICAL: &'static str = "TACTICAL";
    pub const BERSERKER: &'static str = "BERSERKER";

    /// Registry holding the built-in presets
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Self::AGGRESSIVE, PersonalityProfile::aggressive());
        registry.register(Self::DEFENSIVE, PersonalityProfile::defensive());
        registry.register(Self::TACTICAL, PersonalityProfile::tactical());
        registry.register(Self::BERSERKER, PersonalityProfile::berserker());
        registry
    }

    /// Registry with no presets
    pub fn empty() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    /// Register or replace a profile. Keys are case-insensitive.
    pub fn register(&mut self, key: &str, profile: PersonalityProfile) -> Arc<PersonalityProfile> {
        let profile = Arc::new(profile);
        self.profiles.insert(normalize_key(key), Arc::clone(&profile));
        profile
    }

    pub fn get(&self, key: &str) -> Option<Arc<PersonalityProfile>> {
        self.profiles.get(&normalize_key(key)).cloned()
    }

    /// Like [`PersonalityRegistry::get`], but unknown keys are an error
    pub fn resolve(&self, key: &str) -> Result<Arc<PersonalityProfile>> {
        self.get(key)
            .ok_or_else(|| CombatAiError::UnknownPersonality(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.profiles.contains_key(&normalize_key(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for PersonalityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

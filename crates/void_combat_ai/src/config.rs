//! Combat AI configuration

use crate::error::{CombatAiError, Result};
use crate::personality::NamedPersonality;
use crate::player_model::{DEFAULT_LOOKAHEAD, MIN_SAMPLE_INTERVAL};
use serde::{Deserialize, Serialize};

/// Movement speeds per state, in units per second
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    pub patrol_speed: f32,
    pub hunt_speed: f32,
    pub strafe_speed: f32,
    pub flee_speed: f32,
    pub flank_speed: f32,
    /// Distance at which a waypoint or flank point counts as reached
    pub arrive_radius: f32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            patrol_speed: 2.0,
            hunt_speed: 4.0,
            strafe_speed: 3.0,
            flee_speed: 5.0,
            flank_speed: 4.5,
            arrive_radius: 2.0,
        }
    }
}

/// Patrol route generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatrolConfig {
    pub point_count: usize,
    pub radius: f32,
}

impl Default for PatrolConfig {
    fn default() -> Self {
        Self {
            point_count: 4,
            radius: 10.0,
        }
    }
}

/// Player motion prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Seconds ahead to predict
    pub lookahead: f32,
    /// Floor for the interval between position samples
    pub min_dt: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            lookahead: DEFAULT_LOOKAHEAD,
            min_dt: MIN_SAMPLE_INTERVAL,
        }
    }
}

/// Top-level combat AI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatAiConfig {
    /// Seed for every random decision
    pub seed: u64,
    pub steering: SteeringConfig,
    pub patrol: PatrolConfig,
    pub prediction: PredictionConfig,
    /// Radius of the scatter formation ring
    pub scatter_radius: f32,
    /// Lateral offset of each pincer arm
    pub pincer_offset: f32,
    /// Extra personalities registered next to the presets
    pub personalities: Vec<NamedPersonality>,
}

impl Default for CombatAiConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            steering: SteeringConfig::default(),
            patrol: PatrolConfig::default(),
            prediction: PredictionConfig::default(),
            scatter_radius: 10.0,
            pincer_offset: 8.0,
            personalities: Vec::new(),
        }
    }
}

impl CombatAiConfig {
    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.steering;
        let speeds = [
            ("patrol_speed", s.patrol_speed),
            ("hunt_speed", s.hunt_speed),
            ("strafe_speed", s.strafe_speed),
            ("flee_speed", s.flee_speed),
            ("flank_speed", s.flank_speed),
            ("arrive_radius", s.arrive_radius),
        ];
        for (name, value) in speeds {
            if !(value > 0.0 && value.is_finite()) {
                return Err(CombatAiError::InvalidConfig(format!(
                    "steering.{name} must be positive, got {value}"
                )));
            }
        }

        if self.patrol.point_count == 0 {
            return Err(CombatAiError::InvalidConfig(
                "patrol.point_count must be at least 1".into(),
            ));
        }
        if !(self.prediction.lookahead > 0.0) {
            return Err(CombatAiError::InvalidConfig(format!(
                "prediction.lookahead must be positive, got {}",
                self.prediction.lookahead
            )));
        }
        if !(self.prediction.min_dt > 0.0) {
            return Err(CombatAiError::InvalidConfig(format!(
                "prediction.min_dt must be positive, got {}",
                self.prediction.min_dt
            )));
        }
        if let Some(named) = self.personalities.iter().find(|p| p.key.trim().is_empty()) {
            return Err(CombatAiError::InvalidConfig(format!(
                "personality with empty key: {:?}",
                named.profile
            )));
        }
        Ok(())
    }

    /// Set the RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_steering(mut self, steering: SteeringConfig) -> Self {
        self.steering = steering;
        self
    }

    pub fn with_patrol(mut self, point_count: usize, radius: f32) -> Self {
        self.patrol = PatrolConfig { point_count, radius };
        self
    }

    pub fn with_personality(mut self, personality: NamedPersonality) -> Self {
        self.personalities.push(personality);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        CombatAiConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "seed": 7, "steering": { "hunt_speed": 6.0 } }"#;
        let config = CombatAiConfig::from_json(json).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.steering.hunt_speed, 6.0);
        assert_eq!(config.steering.patrol_speed, 2.0);
        assert_eq!(config.scatter_radius, 10.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err =
            CombatAiConfig::from_json(r#"{ "steering": { "flee_speed": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, CombatAiError::InvalidConfig(_)));

        let err = CombatAiConfig::from_json(r#"{ "patrol": { "point_count": 0 } }"#).unwrap_err();
        assert!(matches!(err, CombatAiError::InvalidConfig(_)));

        let err = CombatAiConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, CombatAiError::Parse(_)));
    }

    #[test]
    fn test_json_roundtrip_keeps_personalities() {
        let config = CombatAiConfig::default().with_seed(99).with_personality(NamedPersonality {
            key: "sniper".into(),
            profile: crate::personality::PersonalityProfile::new(25.0, 0.5, 40.0, 0.3),
        });

        let parsed = CombatAiConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed.seed, 99);
        assert_eq!(parsed.personalities.len(), 1);
        assert_eq!(parsed.personalities[0].profile.chase_range, 40.0);
    }
}

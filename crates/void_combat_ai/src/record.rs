//! Per-entity AI state

use crate::handle::PackId;
use crate::personality::PersonalityProfile;
use crate::player_model::CounterStrategy;
use crate::world::EntityId;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Number of damage events remembered per entity
pub const DAMAGE_HISTORY_CAPACITY: usize = 10;

/// Behavior state of one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AiState {
    #[default]
    Idle,
    Patrol,
    Hunt,
    Attack,
    Flee,
    Ambush,
    Flank,
    Cover,
}

impl AiState {
    pub const ALL: [AiState; 8] = [
        AiState::Idle,
        AiState::Patrol,
        AiState::Hunt,
        AiState::Attack,
        AiState::Flee,
        AiState::Ambush,
        AiState::Flank,
        AiState::Cover,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AiState::Idle => "idle",
            AiState::Patrol => "patrol",
            AiState::Hunt => "hunt",
            AiState::Attack => "attack",
            AiState::Flee => "flee",
            AiState::Ambush => "ambush",
            AiState::Flank => "flank",
            AiState::Cover => "cover",
        }
    }
}

impl fmt::Display for AiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Damage taken by the entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageEvent {
    pub time: f64,
    pub amount: f32,
}

/// What the entity remembers about the fight
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatMemory {
    pub last_seen_player_time: Option<f64>,
    pub last_known_player_position: Option<Vec3>,
    /// Most recent last
    pub damage_history: VecDeque<DamageEvent>,
    pub successful_attacks: u32,
    pub failed_attacks: u32,
}

impl CombatMemory {
    pub fn record_damage(&mut self, time: f64, amount: f32) {
        while self.damage_history.len() >= DAMAGE_HISTORY_CAPACITY {
            self.damage_history.pop_front();
        }
        self.damage_history.push_back(DamageEvent { time, amount });
    }

    pub fn total_attacks(&self) -> u32 {
        self.successful_attacks + self.failed_attacks
    }
}

/// What the entity has learned about the player
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningData {
    /// Successful dodges so far; each adds a percent to the next dodge chance
    pub dodge_success_rate: f32,
    /// Player skills seen while this entity was attacking
    pub observed_attack_patterns: HashMap<String, u32>,
}

/// AI state for one registered entity
#[derive(Debug, Clone)]
pub struct AiRecord {
    pub entity: EntityId,
    pub personality: Arc<PersonalityProfile>,
    state: AiState,
    state_timer: f32,
    pub target: Option<EntityId>,
    patrol_points: Box<[Vec3]>,
    pub patrol_index: usize,
    pub memory: CombatMemory,
    pub pack: Option<PackId>,
    threat_level: f32,
    pub learning: LearningData,
    /// Damage multiplier for the next attack only
    pub ambush_bonus: f32,
    pub counter_strategy: CounterStrategy,
    /// Position hint written by the pack coordinator
    pub tactical_position: Option<Vec3>,
    /// Side chosen when entering Flank, `1.0` right or `-1.0` left
    pub flank_side: f32,
    /// Cover point found when entering Cover
    pub cover_point: Option<Vec3>,
    /// Health seen on the previous tick
    pub last_health: Option<f32>,
}

impl AiRecord {
    pub fn new(
        entity: EntityId,
        personality: Arc<PersonalityProfile>,
        patrol_points: Vec<Vec3>,
    ) -> Self {
        Self {
            entity,
            personality,
            state: AiState::Idle,
            state_timer: 0.0,
            target: None,
            patrol_points: patrol_points.into_boxed_slice(),
            patrol_index: 0,
            memory: CombatMemory::default(),
            pack: None,
            threat_level: 0.0,
            learning: LearningData::default(),
            ambush_bonus: 1.0,
            counter_strategy: CounterStrategy::Default,
            tactical_position: None,
            flank_side: 1.0,
            cover_point: None,
            last_health: None,
        }
    }

    pub fn state(&self) -> AiState {
        self.state
    }

    /// Seconds since the last transition
    pub fn state_timer(&self) -> f32 {
        self.state_timer
    }

    /// Enter `state` and restart the state timer. Returns the previous state.
    pub fn transition(&mut self, state: AiState) -> AiState {
        let previous = self.state;
        self.state = state;
        self.state_timer = 0.0;
        previous
    }

    pub fn advance_timer(&mut self, dt: f32) {
        self.state_timer += dt;
    }

    pub fn threat_level(&self) -> f32 {
        self.threat_level
    }

    /// Store a threat score, clamped to `[0, 1]`
    pub fn set_threat_level(&mut self, threat: f32) {
        self.threat_level = if threat.is_nan() { 0.0 } else { threat.clamp(0.0, 1.0) };
    }

    pub fn patrol_points(&self) -> &[Vec3] {
        &self.patrol_points
    }

    /// Current waypoint, `None` if the record has no patrol route
    pub fn current_waypoint(&self) -> Option<Vec3> {
        if self.patrol_points.is_empty() {
            return None;
        }
        Some(self.patrol_points[self.patrol_index % self.patrol_points.len()])
    }

    pub fn advance_waypoint(&mut self) {
        if !self.patrol_points.is_empty() {
            self.patrol_index = (self.patrol_index + 1) % self.patrol_points.len();
        }
    }

    /// Use up the ambush bonus, leaving the multiplier at 1.0
    pub fn take_ambush_bonus(&mut self) -> f32 {
        std::mem::replace(&mut self.ambush_bonus, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AiRecord {
        AiRecord::new(
            EntityId(1),
            Arc::new(PersonalityProfile::default()),
            vec![Vec3::ZERO, Vec3::X, Vec3::Z],
        )
    }

    #[test]
    fn test_transition_resets_timer() {
        let mut r = record();
        r.advance_timer(2.5);
        assert_eq!(r.state_timer(), 2.5);

        let previous = r.transition(AiState::Hunt);
        assert_eq!(previous, AiState::Idle);
        assert_eq!(r.state(), AiState::Hunt);
        assert_eq!(r.state_timer(), 0.0);
    }

    #[test]
    fn test_threat_clamped() {
        let mut r = record();
        r.set_threat_level(3.0);
        assert_eq!(r.threat_level(), 1.0);
        r.set_threat_level(-1.0);
        assert_eq!(r.threat_level(), 0.0);
        r.set_threat_level(f32::NAN);
        assert_eq!(r.threat_level(), 0.0);
    }

    #[test]
    fn test_waypoints_cycle() {
        let mut r = record();
        assert_eq!(r.current_waypoint(), Some(Vec3::ZERO));
        r.advance_waypoint();
        r.advance_waypoint();
        assert_eq!(r.current_waypoint(), Some(Vec3::Z));
        r.advance_waypoint();
        assert_eq!(r.current_waypoint(), Some(Vec3::ZERO));
    }

    #[test]
    fn test_ambush_bonus_is_one_shot() {
        let mut r = record();
        r.ambush_bonus = 1.5;
        assert_eq!(r.take_ambush_bonus(), 1.5);
        assert_eq!(r.take_ambush_bonus(), 1.0);
    }

    #[test]
    fn test_damage_history_bounded() {
        let mut memory = CombatMemory::default();
        for i in 0..25 {
            memory.record_damage(i as f64, 1.0);
        }
        assert_eq!(memory.damage_history.len(), DAMAGE_HISTORY_CAPACITY);
        assert_eq!(memory.damage_history.front().unwrap().time, 15.0);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(AiState::ALL.len(), 8);
        assert_eq!(AiState::Flank.to_string(), "flank");
        assert_eq!(AiState::default(), AiState::Idle);
    }
}

//! Statistical model of the controlled player
//!
//! Updated once at the start of every tick and read by every entity for the
//! rest of that tick.

use crate::world::Player;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Number of dodges remembered
pub const DODGE_HISTORY_CAPACITY: usize = 20;
/// Number of position samples remembered
pub const POSITION_HISTORY_CAPACITY: usize = 10;
/// Default prediction horizon in seconds
pub const DEFAULT_LOOKAHEAD: f32 = 0.5;
/// Smallest sample interval used when extrapolating
pub const MIN_SAMPLE_INTERVAL: f64 = 1e-3;

/// Suggested answer to a player skill
///
/// Advisory only: the AI core records it, a combat system may act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterStrategy {
    DodgeLeft,
    DodgeRight,
    Sidestep,
    KeepDistance,
    CloseDistance,
    Interrupt,
    Default,
}

impl CounterStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterStrategy::DodgeLeft => "dodge_left",
            CounterStrategy::DodgeRight => "dodge_right",
            CounterStrategy::Sidestep => "sidestep",
            CounterStrategy::KeepDistance => "keep_distance",
            CounterStrategy::CloseDistance => "close_distance",
            CounterStrategy::Interrupt => "interrupt",
            CounterStrategy::Default => "default",
        }
    }
}

impl Default for CounterStrategy {
    fn default() -> Self {
        Self::Default
    }
}

/// A timestamped dodge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DodgeSample {
    pub time: f64,
    pub direction: Vec3,
}

/// A timestamped position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub time: f64,
    pub position: Vec3,
}

#[derive(Debug, Clone)]
struct SkillUsage {
    skill: String,
    count: u32,
}

/// What the AI has learned about the player this session
#[derive(Debug, Clone)]
pub struct PlayerBehaviorModel {
    /// Skill usage in first-seen order
    skills: Vec<SkillUsage>,
    skill_index: HashMap<String, usize>,
    dodges: VecDeque<DodgeSample>,
    positions: VecDeque<PositionSample>,
    /// Lower bound on the sample interval used by prediction
    min_sample_interval: f64,
}

impl PlayerBehaviorModel {
    pub fn new() -> Self {
        Self {
            skills: Vec::new(),
            skill_index: HashMap::new(),
            dodges: VecDeque::with_capacity(DODGE_HISTORY_CAPACITY),
            positions: VecDeque::with_capacity(POSITION_HISTORY_CAPACITY),
            min_sample_interval: MIN_SAMPLE_INTERVAL,
        }
    }

    /// Override the prediction interval floor (values below `f64::EPSILON` are raised)
    pub fn with_min_sample_interval(mut self, interval: f64) -> Self {
        self.min_sample_interval = interval.max(f64::EPSILON);
        self
    }

    /// Record one tick of player behavior at time `now`
    pub fn observe<P: Player + ?Sized>(&mut self, player: &P, now: f64) {
        if let Some(skill) = player.last_used_skill() {
            self.record_skill(skill);
        }

        if player.is_dodging() {
            push_bounded(
                &mut self.dodges,
                DodgeSample {
                    time: now,
                    direction: player.velocity(),
                },
                DODGE_HISTORY_CAPACITY,
            );
        }

        push_bounded(
            &mut self.positions,
            PositionSample {
                time: now,
                position: player.position(),
            },
            POSITION_HISTORY_CAPACITY,
        );
    }

    pub fn record_skill(&mut self, skill: &str) {
        match self.skill_index.get(skill) {
            Some(&i) => self.skills[i].count += 1,
            None => {
                self.skill_index.insert(skill.to_string(), self.skills.len());
                self.skills.push(SkillUsage {
                    skill: skill.to_string(),
                    count: 1,
                });
            }
        }
    }

    pub fn skill_count(&self, skill: &str) -> u32 {
        self.skill_index
            .get(skill)
            .map(|&i| self.skills[i].count)
            .unwrap_or(0)
    }

    /// Skill with the highest count; ties go to the skill seen first
    pub fn most_used_skill(&self) -> Option<&str> {
        let mut best: Option<&SkillUsage> = None;
        for usage in &self.skills {
            if best.map_or(true, |b| usage.count > b.count) {
                best = Some(usage);
            }
        }
        best.map(|u| u.skill.as_str())
    }

    /// Counter for a known skill tag, [`CounterStrategy::Default`] otherwise
    pub fn counter_strategy_for(skill: &str) -> CounterStrategy {
        match skill {
            "fireball" => CounterStrategy::DodgeLeft,
            "frost_bolt" | "ice_spike" => CounterStrategy::DodgeRight,
            "charge" => CounterStrategy::Sidestep,
            "whirlwind" | "cleave" => CounterStrategy::KeepDistance,
            "arrow_volley" | "snipe" => CounterStrategy::CloseDistance,
            "heal" => CounterStrategy::Interrupt,
            _ => CounterStrategy::Default,
        }
    }

    /// Counter to whatever the player uses most
    pub fn current_counter_strategy(&self) -> CounterStrategy {
        self.most_used_skill()
            .map(Self::counter_strategy_for)
            .unwrap_or_default()
    }

    /// Normalized mean of remembered dodge directions
    ///
    /// `None` with no dodges, or when the remembered dodges cancel out.
    pub fn average_dodge_direction(&self) -> Option<Vec3> {
        if self.dodges.is_empty() {
            return None;
        }
        let sum: Vec3 = self.dodges.iter().map(|d| d.direction).sum();
        (sum / self.dodges.len() as f32).try_normalize()
    }

    /// Extrapolate the player's position `lookahead` seconds ahead
    ///
    /// Uses the two newest samples: `p1 + (p1 - p0) * (lookahead / dt)`.
    /// `dt` is floored at the minimum sample interval so repeated
    /// timestamps cannot produce non-finite positions. With a single sample
    /// that sample is returned.
    pub fn predict_player_position(&self, lookahead: f32) -> Option<Vec3> {
        let len = self.positions.len();
        let newest = self.positions.back()?;
        if len < 2 {
            return Some(newest.position);
        }

        let previous = &self.positions[len - 2];
        let displacement = newest.position - previous.position;
        let dt = (newest.time - previous.time).max(self.min_sample_interval);

        Some(newest.position + displacement * (lookahead as f64 / dt) as f32)
    }

    pub fn dodge_history(&self) -> impl Iterator<Item = &DodgeSample> {
        self.dodges.iter()
    }

    pub fn position_history(&self) -> impl Iterator<Item = &PositionSample> {
        self.positions.iter()
    }

    pub fn last_known_position(&self) -> Option<Vec3> {
        self.positions.back().map(|s| s.position)
    }

    /// Forget everything
    pub fn reset(&mut self) {
        self.skills.clear();
        self.skill_index.clear();
        self.dodges.clear();
        self.positions.clear();
    }
}

impl Default for PlayerBehaviorModel {
    fn default() -> Self {
        Self::new()
    }
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, value: T, capacity: usize) {
    while buffer.len() >= capacity {
        buffer.pop_front();
    }
    buffer.push_back(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::PlayerState;

    fn player_at(position: Vec3) -> PlayerState {
        PlayerState::new(1u64, position)
    }

    #[test]
    fn test_skill_counts_and_ties() {
        let mut model = PlayerBehaviorModel::new();
        assert_eq!(model.most_used_skill(), None);

        model.record_skill("charge");
        model.record_skill("fireball");
        assert_eq!(model.most_used_skill(), Some("charge"));

        model.record_skill("fireball");
        assert_eq!(model.most_used_skill(), Some("fireball"));
        assert_eq!(model.skill_count("fireball"), 2);

        model.record_skill("charge");
        // 2 vs 2, charge was seen first
        assert_eq!(model.most_used_skill(), Some("charge"));
    }

    #[test]
    fn test_counter_table() {
        assert_eq!(
            PlayerBehaviorModel::counter_strategy_for("fireball"),
            CounterStrategy::DodgeLeft
        );
        assert_eq!(
            PlayerBehaviorModel::counter_strategy_for("juggling"),
            CounterStrategy::Default
        );
        assert_eq!(CounterStrategy::DodgeLeft.as_str(), "dodge_left");

        let mut model = PlayerBehaviorModel::new();
        assert_eq!(model.current_counter_strategy(), CounterStrategy::Default);
        model.record_skill("heal");
        assert_eq!(model.current_counter_strategy(), CounterStrategy::Interrupt);
    }

    #[test]
    fn test_observe() {
        let mut model = PlayerBehaviorModel::new();
        let mut player = player_at(Vec3::new(1.0, 0.0, 0.0));
        player.last_used_skill = Some("fireball".into());
        player.is_dodging = true;
        player.velocity = Vec3::X;

        model.observe(&player, 0.5);

        assert_eq!(model.skill_count("fireball"), 1);
        assert_eq!(model.dodge_history().count(), 1);
        assert_eq!(model.last_known_position(), Some(Vec3::new(1.0, 0.0, 0.0)));

        player.is_dodging = false;
        player.last_used_skill = None;
        model.observe(&player, 1.0);
        assert_eq!(model.skill_count("fireball"), 1);
        assert_eq!(model.dodge_history().count(), 1);
        assert_eq!(model.position_history().count(), 2);
    }

    #[test]
    fn test_ring_buffers_evict_oldest() {
        let mut model = PlayerBehaviorModel::new();
        let mut player = player_at(Vec3::ZERO);
        player.is_dodging = true;
        player.velocity = Vec3::Z;

        for i in 0..50 {
            player.position = Vec3::new(i as f32, 0.0, 0.0);
            model.observe(&player, i as f64);
        }

        assert_eq!(model.dodge_history().count(), DODGE_HISTORY_CAPACITY);
        assert_eq!(model.position_history().count(), POSITION_HISTORY_CAPACITY);
        let oldest = model.position_history().next().unwrap();
        assert_eq!(oldest.time, 40.0);
    }

    #[test]
    fn test_average_dodge_direction() {
        let mut model = PlayerBehaviorModel::new();
        assert_eq!(model.average_dodge_direction(), None);

        let mut player = player_at(Vec3::ZERO);
        player.is_dodging = true;
        player.velocity = Vec3::new(1.0, 0.0, 0.0);
        for i in 0..5 {
            model.observe(&player, i as f64);
        }

        let avg = model.average_dodge_direction().unwrap();
        assert!((avg - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn test_opposite_dodges_have_no_direction() {
        let mut model = PlayerBehaviorModel::new();
        let mut player = player_at(Vec3::ZERO);
        player.is_dodging = true;

        player.velocity = Vec3::X;
        model.observe(&player, 0.0);
        player.velocity = Vec3::NEG_X;
        model.observe(&player, 0.1);

        assert_eq!(model.dodge_history().count(), 2);
        assert_eq!(model.average_dodge_direction(), None);
    }

    #[test]
    fn test_prediction() {
        let mut model = PlayerBehaviorModel::new();
        assert_eq!(model.predict_player_position(DEFAULT_LOOKAHEAD), None);

        model.observe(&player_at(Vec3::ZERO), 0.0);
        assert_eq!(model.predict_player_position(DEFAULT_LOOKAHEAD), Some(Vec3::ZERO));

        model.observe(&player_at(Vec3::new(1.0, 0.0, 0.0)), 1.0);
        let predicted = model.predict_player_position(DEFAULT_LOOKAHEAD).unwrap();
        assert!((predicted - Vec3::new(1.5, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_prediction_with_repeated_timestamp_is_finite() {
        let mut model = PlayerBehaviorModel::new();
        model.observe(&player_at(Vec3::ZERO), 2.0);
        model.observe(&player_at(Vec3::new(0.0, 0.0, 1.0)), 2.0);

        let predicted = model.predict_player_position(DEFAULT_LOOKAHEAD).unwrap();
        assert!(predicted.is_finite());
    }

    #[test]
    fn test_reset() {
        let mut model = PlayerBehaviorModel::new();
        let mut player = player_at(Vec3::ONE);
        player.last_used_skill = Some("charge".into());
        player.is_dodging = true;
        model.observe(&player, 0.0);

        model.reset();
        assert_eq!(model.most_used_skill(), None);
        assert_eq!(model.dodge_history().count(), 0);
        assert_eq!(model.last_known_position(), None);
    }
}

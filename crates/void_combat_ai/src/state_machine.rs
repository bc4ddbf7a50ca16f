//! Per-entity combat state machine
//!
//! Each tick the engine resolves the entity through the world, refreshes its
//! threat and memory, then runs the handler of its current [`AiState`]. A
//! handler steers the entity and returns the state to enter next, if any.
//!
//! ```text
//! Idle ──► Hunt ◄──► Attack ──► Flee ──► Patrol
//!   │        ▲ │        ▲ ▲        │
//!   ▼        │ ▼        │ │        ▼
//! Ambush ────┘ Flank ───┘ └──── Cover
//! ```

use crate::config::{PredictionConfig, SteeringConfig};
use crate::events::AiEvent;
use crate::player_model::PlayerBehaviorModel;
use crate::record::{AiRecord, AiState};
use crate::steering::{
    bearing, flank_point, flee_point, move_toward, orbit_point, random_horizontal_unit, roll,
    yaw_towards,
};
use crate::threat::{assess_threat, ThreatInput};
use crate::world::{CombatWorld, EntityId, EntityStats, Player};
use glam::Vec3;
use rand::Rng;
use std::f32::consts::FRAC_PI_4;

/// Idle notices the player within `chase_range` times this
pub const DETECTION_FACTOR: f32 = 1.5;
/// Hunt and Cover give up beyond `chase_range` times this
pub const LOSE_TARGET_FACTOR: f32 = 1.5;
/// Flee recovers beyond `chase_range` times this
pub const RECOVER_FACTOR: f32 = 2.0;
/// Attack falls back to Hunt beyond `attack_range` times this
pub const ATTACK_LEASH_FACTOR: f32 = 1.2;
/// Strafe orbit radius as a fraction of `attack_range`
pub const ORBIT_FACTOR: f32 = 0.7;
/// Flank point distance as a fraction of `attack_range`
pub const FLANK_FACTOR: f32 = 0.8;
/// Cover attacks up to `attack_range` times this
pub const COVER_ATTACK_FACTOR: f32 = 1.5;

pub const IDLE_PATROL_DELAY: f32 = 3.0;
pub const AMBUSH_CHANCE: f32 = 0.3;
pub const AMBUSH_TRIGGER_DISTANCE: f32 = 5.0;
pub const AMBUSH_TIMEOUT: f32 = 10.0;
pub const AMBUSH_BONUS: f32 = 1.5;
pub const FLANK_CHANCE: f32 = 0.2;
pub const FLANK_TIMEOUT: f32 = 5.0;
pub const FLEE_DISTANCE: f32 = 10.0;
pub const COVER_PERIOD: f32 = 3.0;
/// Fraction of each cover period spent exposed and able to attack
pub const COVER_DUTY_CYCLE: f32 = 0.5;
/// Cover is abandoned when the player gets this close
pub const COVER_BREAK_DISTANCE: f32 = 5.0;
pub const BASE_DODGE_CHANCE: f32 = 0.3;
pub const DODGE_DISTANCE: f32 = 3.0;

/// Everything an entity update reads or writes besides its own record
pub struct TickContext<'a, W: ?Sized, P: ?Sized, R: ?Sized> {
    pub world: &'a mut W,
    pub player: &'a mut P,
    pub model: &'a PlayerBehaviorModel,
    pub rng: &'a mut R,
    pub events: &'a mut Vec<AiEvent>,
    /// Simulation time, including this tick
    pub now: f64,
    pub dt: f32,
}

/// Resolved per-tick view of one entity
#[derive(Debug, Clone, Copy)]
struct Snapshot {
    position: Vec3,
    stats: EntityStats,
    player_position: Vec3,
    distance: f32,
}

/// Drives [`AiRecord`]s through their states
#[derive(Debug, Clone, Default)]
pub struct StateMachineEngine {
    steering: SteeringConfig,
    prediction: PredictionConfig,
}

impl StateMachineEngine {
    pub fn new(steering: SteeringConfig, prediction: PredictionConfig) -> Self {
        Self { steering, prediction }
    }

    /// Advance one entity by one tick
    ///
    /// Entities the world cannot resolve are left untouched.
    pub fn update<W, P, R>(&self, record: &mut AiRecord, ctx: &mut TickContext<'_, W, P, R>)
    where
        W: CombatWorld + ?Sized,
        P: Player + ?Sized,
        R: Rng + ?Sized,
    {
        let (Some(position), Some(stats)) =
            (ctx.world.position(record.entity), ctx.world.stats(record.entity))
        else {
            return;
        };

        record.advance_timer(ctx.dt);

        if let Some(last) = record.last_health {
            if stats.health < last {
                record.memory.record_damage(ctx.now, last - stats.health);
            }
        }
        record.last_health = Some(stats.health);

        let player_position = ctx.player.position();
        let snap = Snapshot {
            position,
            stats,
            player_position,
            distance: position.distance(player_position),
        };

        record.set_threat_level(assess_threat(&ThreatInput {
            distance: snap.distance,
            health: stats.health,
            max_health: stats.max_health,
            player_level: ctx.player.level(),
            entity_level: stats.level,
        }));
        record.counter_strategy = ctx.model.current_counter_strategy();

        let next = match record.state() {
            AiState::Idle => self.idle(record, &snap, ctx),
            AiState::Patrol => self.patrol(record, &snap, ctx),
            AiState::Hunt => self.hunt(record, &snap, ctx),
            AiState::Attack => self.attack(record, &snap, ctx),
            AiState::Flee => self.flee(record, &snap, ctx),
            AiState::Ambush => self.ambush(record, &snap),
            AiState::Flank => self.flank(record, &snap, ctx),
            AiState::Cover => self.cover(record, &snap, ctx),
        };

        if let Some(to) = next {
            Self::enter(record, to, ctx.player.id(), ctx.events);
        }
    }

    /// Put a record into `to` from outside the normal transition rules
    pub fn force_transition(
        record: &mut AiRecord,
        to: AiState,
        player: EntityId,
        events: &mut Vec<AiEvent>,
    ) {
        Self::enter(record, to, player, events);
    }

    fn enter(record: &mut AiRecord, to: AiState, player: EntityId, events: &mut Vec<AiEvent>) {
        let from = record.transition(to);

        match to {
            AiState::Idle | AiState::Patrol => record.target = None,
            AiState::Hunt | AiState::Attack | AiState::Flank => record.target = Some(player),
            _ => {}
        }
        if from == AiState::Cover && to != AiState::Cover {
            record.cover_point = None;
        }

        log::debug!("{:?}: {} -> {}", record.entity, from, to);
        events.push(AiEvent::StateChanged {
            entity: record.entity,
            from,
            to,
        });
    }

    fn idle<W, P, R>(
        &self,
        record: &mut AiRecord,
        snap: &Snapshot,
        ctx: &mut TickContext<'_, W, P, R>,
    ) -> Option<AiState>
    where
        W: CombatWorld + ?Sized,
        P: Player + ?Sized,
        R: Rng + ?Sized,
    {
        let profile = &record.personality;

        if snap.distance < profile.chase_range * DETECTION_FACTOR {
            if profile.flags.use_cover && roll(ctx.rng, AMBUSH_CHANCE) {
                return Some(AiState::Ambush);
            }
            return Some(AiState::Hunt);
        }

        (record.state_timer() > IDLE_PATROL_DELAY).then_some(AiState::Patrol)
    }

    fn patrol<W, P, R>(
        &self,
        record: &mut AiRecord,
        snap: &Snapshot,
        ctx: &mut TickContext<'_, W, P, R>,
    ) -> Option<AiState>
    where
        W: CombatWorld + ?Sized,
        P: Player + ?Sized,
        R: Rng + ?Sized,
    {
        if let Some(waypoint) = record.current_waypoint() {
            let remaining =
                move_toward(ctx.world, record.entity, waypoint, self.steering.patrol_speed, ctx.dt);
            if remaining.is_some_and(|d| d < self.steering.arrive_radius) {
                record.advance_waypoint();
            }
        }

        (snap.distance < record.personality.chase_range).then_some(AiState::Hunt)
    }

    fn hunt<W, P, R>(
        &self,
        record: &mut AiRecord,
        snap: &Snapshot,
        ctx: &mut TickContext<'_, W, P, R>,
    ) -> Option<AiState>
    where
        W: CombatWorld + ?Sized,
        P: Player + ?Sized,
        R: Rng + ?Sized,
    {
        record.memory.last_seen_player_time = Some(ctx.now);
        record.memory.last_known_player_position = Some(snap.player_position);

        let profile = &record.personality;
        if snap.distance < profile.attack_range {
            return Some(AiState::Attack);
        }
        if snap.distance > profile.chase_range * LOSE_TARGET_FACTOR {
            return Some(AiState::Patrol);
        }

        // Approach through the pack slot first, then close on the player
        let destination = match record.tactical_position {
            Some(slot) if slot.distance(snap.position) > self.steering.arrive_radius => slot,
            _ => ctx
                .model
                .predict_player_position(self.prediction.lookahead)
                .unwrap_or(snap.player_position),
        };
        move_toward(ctx.world, record.entity, destination, self.steering.hunt_speed, ctx.dt);

        if profile.flags.flanking && roll(ctx.rng, FLANK_CHANCE) {
            record.flank_side = if ctx.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            return Some(AiState::Flank);
        }
        None
    }

    fn attack<W, P, R>(
        &self,
        record: &mut AiRecord,
        snap: &Snapshot,
        ctx: &mut TickContext<'_, W, P, R>,
    ) -> Option<AiState>
    where
        W: CombatWorld + ?Sized,
        P: Player + ?Sized,
        R: Rng + ?Sized,
    {
        let profile = &record.personality;
        if snap.stats.health < snap.stats.max_health * profile.retreat_threshold {
            return Some(AiState::Flee);
        }
        if snap.distance > profile.attack_range * ATTACK_LEASH_FACTOR {
            return Some(AiState::Hunt);
        }

        if let Some(skill) = ctx.player.last_used_skill() {
            *record
                .learning
                .observed_attack_patterns
                .entry(skill.to_string())
                .or_insert(0) += 1;
        }

        // Circle-strafe, centered on the pack slot's side of the player when there is one
        let base = match record.tactical_position {
            Some(slot) => bearing(snap.player_position, slot),
            None => bearing(snap.player_position, snap.position),
        };
        let angle = base + (record.state_timer() * 2.0).sin() * FRAC_PI_4;
        let orbit = orbit_point(snap.player_position, angle, profile.attack_range * ORBIT_FACTOR);
        move_toward(ctx.world, record.entity, orbit, self.steering.strafe_speed, ctx.dt);
        self.face_player(record.entity, snap.player_position, ctx);

        let rage = profile.rage_multiplier(snap.stats.health_percent());
        if roll(ctx.rng, profile.attack_frequency * ctx.dt * rage) {
            Self::perform_attack(record, snap, rage, ctx);
        }

        if ctx.player.is_attacking() {
            Self::try_dodge(record, ctx);
        }
        None
    }

    fn flee<W, P, R>(
        &self,
        record: &mut AiRecord,
        snap: &Snapshot,
        ctx: &mut TickContext<'_, W, P, R>,
    ) -> Option<AiState>
    where
        W: CombatWorld + ?Sized,
        P: Player + ?Sized,
        R: Rng + ?Sized,
    {
        let profile = &record.personality;
        if snap.distance > profile.chase_range * RECOVER_FACTOR {
            return Some(AiState::Patrol);
        }

        if profile.flags.use_cover {
            if let Some(cover) = ctx.world.find_cover(snap.position, snap.player_position) {
                record.cover_point = Some(cover);
                return Some(AiState::Cover);
            }
        }

        let away = flee_point(snap.position, snap.player_position, FLEE_DISTANCE);
        move_toward(ctx.world, record.entity, away, self.steering.flee_speed, ctx.dt);
        None
    }

    fn ambush(&self, record: &mut AiRecord, snap: &Snapshot) -> Option<AiState> {
        if snap.distance < AMBUSH_TRIGGER_DISTANCE {
            record.ambush_bonus = AMBUSH_BONUS;
            return Some(AiState::Attack);
        }
        (record.state_timer() > AMBUSH_TIMEOUT).then_some(AiState::Hunt)
    }

    fn flank<W, P, R>(
        &self,
        record: &mut AiRecord,
        snap: &Snapshot,
        ctx: &mut TickContext<'_, W, P, R>,
    ) -> Option<AiState>
    where
        W: CombatWorld + ?Sized,
        P: Player + ?Sized,
        R: Rng + ?Sized,
    {
        if record.state_timer() > FLANK_TIMEOUT {
            return Some(AiState::Hunt);
        }

        let point = flank_point(
            snap.player_position,
            ctx.player.right(),
            record.flank_side,
            record.personality.attack_range * FLANK_FACTOR,
        );
        let remaining =
            move_toward(ctx.world, record.entity, point, self.steering.flank_speed, ctx.dt);

        remaining
            .is_some_and(|d| d < self.steering.arrive_radius)
            .then_some(AiState::Attack)
    }

    fn cover<W, P, R>(
        &self,
        record: &mut AiRecord,
        snap: &Snapshot,
        ctx: &mut TickContext<'_, W, P, R>,
    ) -> Option<AiState>
    where
        W: CombatWorld + ?Sized,
        P: Player + ?Sized,
        R: Rng + ?Sized,
    {
        let profile = &record.personality;
        if snap.distance < COVER_BREAK_DISTANCE
            || snap.distance > profile.chase_range * LOSE_TARGET_FACTOR
        {
            return Some(AiState::Hunt);
        }

        if let Some(cover) = record.cover_point {
            move_toward(ctx.world, record.entity, cover, self.steering.flee_speed, ctx.dt);
        }

        let exposed = record.state_timer() % COVER_PERIOD < COVER_PERIOD * COVER_DUTY_CYCLE;
        if exposed && snap.distance <= profile.attack_range * COVER_ATTACK_FACTOR {
            self.face_player(record.entity, snap.player_position, ctx);
            let rage = profile.rage_multiplier(snap.stats.health_percent());
            if roll(ctx.rng, profile.attack_frequency * ctx.dt * rage) {
                Self::perform_attack(record, snap, rage, ctx);
            }
        }
        None
    }

    fn face_player<W, P, R>(
        &self,
        entity: EntityId,
        player_position: Vec3,
        ctx: &mut TickContext<'_, W, P, R>,
    ) where
        W: CombatWorld + ?Sized,
        P: Player + ?Sized,
        R: Rng + ?Sized,
    {
        if let Some(position) = ctx.world.position(entity) {
            let to_player = player_position - position;
            if to_player.length_squared() > f32::EPSILON {
                ctx.world.set_yaw(entity, yaw_towards(to_player));
            }
        }
    }

    fn perform_attack<W, P, R>(
        record: &mut AiRecord,
        snap: &Snapshot,
        rage: f32,
        ctx: &mut TickContext<'_, W, P, R>,
    ) where
        W: CombatWorld + ?Sized,
        P: Player + ?Sized,
        R: Rng + ?Sized,
    {
        let ambush_bonus = record.take_ambush_bonus();
        let damage = snap.stats.damage * ambush_bonus * rage;
        let hit = ctx.player.take_damage(damage);

        if hit {
            record.memory.successful_attacks += 1;
        } else {
            record.memory.failed_attacks += 1;
        }

        log::trace!(
            "{:?} attacks for {:.1} (ambush x{:.1}, hit: {})",
            record.entity,
            damage,
            ambush_bonus,
            hit
        );
        ctx.events.push(AiEvent::AttackResolved {
            entity: record.entity,
            damage,
            ambush_bonus,
            hit,
        });
    }

    /// Each successful dodge makes the next one a percent more likely
    fn try_dodge<W, P, R>(record: &mut AiRecord, ctx: &mut TickContext<'_, W, P, R>)
    where
        W: CombatWorld + ?Sized,
        P: Player + ?Sized,
        R: Rng + ?Sized,
    {
        let chance = BASE_DODGE_CHANCE + record.learning.dodge_success_rate / 100.0;
        if !roll(ctx.rng, chance) {
            return;
        }
        let Some(position) = ctx.world.position(record.entity) else {
            return;
        };

        let displacement = random_horizontal_unit(ctx.rng) * DODGE_DISTANCE;
        ctx.world.set_position(record.entity, position + displacement);
        record.learning.dodge_success_rate += 1.0;

        log::trace!("{:?} dodged by {:?}", record.entity, displacement);
        ctx.events.push(AiEvent::Dodged {
            entity: record.entity,
            displacement,
        });
    }
}

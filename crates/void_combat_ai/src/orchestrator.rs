//! Orchestrator
//!
//! Owns every [`AiRecord`] and [`Pack`] and drives the per-tick sequence:
//! observe the player, update each entity, apply pack formations, compact.

use crate::config::CombatAiConfig;
use crate::error::{CombatAiError, Result};
use crate::events::AiEvent;
use crate::handle::{AgentHandle, PackId, SlotArena};
use crate::pack::{Formation, Pack, PackCoordinator};
use crate::personality::{PersonalityProfile, PersonalityRegistry};
use crate::player_model::PlayerBehaviorModel;
use crate::record::AiRecord;
use crate::state_machine::{StateMachineEngine, TickContext};
use crate::steering::patrol_points;
use crate::world::{CombatWorld, EntityId, Player};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::Arc;

/// Combat AI driver for one game session
pub struct Orchestrator {
    config: CombatAiConfig,
    personalities: PersonalityRegistry,
    records: SlotArena<AiRecord>,
    by_entity: HashMap<EntityId, AgentHandle>,
    packs: SlotArena<Pack>,
    model: PlayerBehaviorModel,
    engine: StateMachineEngine,
    coordinator: PackCoordinator,
    rng: ChaCha8Rng,
    elapsed: f64,
    events: Vec<AiEvent>,
}

impl Orchestrator {
    /// Create an orchestrator. Personalities listed in the config are
    /// registered next to the presets.
    pub fn new(config: CombatAiConfig) -> Result<Self> {
        config.validate()?;

        let mut personalities = PersonalityRegistry::new();
        for named in &config.personalities {
            personalities.register(&named.key, named.profile.clone());
        }
        Ok(Self::with_registry(config, personalities))
    }

    fn with_registry(config: CombatAiConfig, personalities: PersonalityRegistry) -> Self {
        Self {
            personalities,
            records: SlotArena::new(),
            by_entity: HashMap::new(),
            packs: SlotArena::new(),
            model: PlayerBehaviorModel::new().with_min_sample_interval(config.prediction.min_dt),
            engine: StateMachineEngine::new(config.steering.clone(), config.prediction.clone()),
            coordinator: PackCoordinator::new(config.scatter_radius, config.pincer_offset),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            elapsed: 0.0,
            events: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &CombatAiConfig {
        &self.config
    }

    pub fn personalities(&self) -> &PersonalityRegistry {
        &self.personalities
    }

    /// Register or replace a named personality. Existing records keep the
    /// profile they were registered with.
    pub fn register_personality(
        &mut self,
        key: &str,
        profile: PersonalityProfile,
    ) -> Arc<PersonalityProfile> {
        log::info!("Registered personality {}", key);
        self.personalities.register(key, profile)
    }

    /// Put an entity under AI control
    ///
    /// Patrol points are generated once, around the entity's current
    /// position. Registering an entity twice returns its existing handle.
    pub fn register_enemy<W: CombatWorld + ?Sized>(
        &mut self,
        world: &W,
        entity: EntityId,
        personality: &str,
    ) -> Result<AgentHandle> {
        if let Some(handle) = self.by_entity.get(&entity) {
            log::debug!("{:?} already registered", entity);
            return Ok(*handle);
        }

        let profile = self.personalities.resolve(personality).map_err(|e| {
            log::warn!("Cannot register {:?}: {}", entity, e);
            e
        })?;
        let Some(origin) = world.position(entity) else {
            log::warn!("Cannot register {:?}: not present in world", entity);
            return Err(CombatAiError::EntityNotFound(entity));
        };

        let points = patrol_points(
            &mut self.rng,
            origin,
            self.config.patrol.point_count,
            self.config.patrol.radius,
        );
        let handle = self.records.insert(AiRecord::new(entity, profile, points));
        self.by_entity.insert(entity, handle);

        log::info!("Registered {:?} as {} ({:?})", entity, personality, handle);
        Ok(handle)
    }

    /// Release an entity from AI control and from its pack.
    /// Returns `false` if it was not registered.
    ///
    /// A pack losing its last member is disbanded at once.
    pub fn remove_enemy(&mut self, entity: EntityId) -> bool {
        let Some(handle) = self.by_entity.remove(&entity) else {
            return false;
        };
        let Some(record) = self.records.remove(handle) else {
            return false;
        };

        if let Some(id) = record.pack {
            let emptied = self.packs.get_mut(id).is_some_and(|pack| {
                pack.remove_member(handle);
                pack.is_empty()
            });
            if emptied {
                self.packs.remove(id);
                log::info!("Pack {:?} lost its last member, disbanding", id);
            }
        }

        log::info!("Removed {:?}", entity);
        true
    }

    /// Drop every record and pack and forget the player model
    pub fn clear(&mut self) {
        let count = self.records.len();
        self.records.clear();
        self.by_entity.clear();
        self.packs.clear();
        self.model.reset();
        self.events.clear();
        log::info!("Cleared {} combat AI records", count);
    }

    /// Group registered entities into a pack led by the first one
    ///
    /// Repeated entities are kept once. Every entity must be registered
    /// and not already in a pack.
    pub fn create_pack(&mut self, entities: &[EntityId]) -> Result<PackId> {
        if entities.is_empty() {
            return Err(CombatAiError::EmptyPack);
        }

        let mut members = Vec::with_capacity(entities.len());
        for entity in entities {
            let handle = *self
                .by_entity
                .get(entity)
                .ok_or(CombatAiError::NotRegistered(*entity))?;
            if let Some(pack) = self.records.get(handle).and_then(|r| r.pack) {
                return Err(CombatAiError::AlreadyInPack { entity: *entity, pack });
            }
            if !members.contains(&handle) {
                members.push(handle);
            }
        }

        let pack = Pack::new(members, Formation::default()).ok_or(CombatAiError::EmptyPack)?;
        let members = pack.members().to_vec();
        let id = self.packs.insert(pack);
        for member in &members {
            if let Some(record) = self.records.get_mut(*member) {
                record.pack = Some(id);
            }
        }

        log::info!("Created pack {:?} with {} members", id, members.len());
        Ok(id)
    }

    /// Dissolve a pack. Members stay registered and drop their formation slot.
    pub fn disband_pack(&mut self, id: PackId) -> Result<()> {
        let pack = self.packs.remove(id).ok_or(CombatAiError::PackNotFound(id))?;
        for member in pack.members() {
            if let Some(record) = self.records.get_mut(*member) {
                record.pack = None;
                record.tactical_position = None;
            }
        }
        log::info!("Disbanded pack {:?}", id);
        Ok(())
    }

    pub fn set_formation(&mut self, id: PackId, formation: Formation) -> Result<()> {
        let pack = self.packs.get_mut(id).ok_or(CombatAiError::PackNotFound(id))?;
        pack.formation = formation;
        Ok(())
    }

    pub fn pack(&self, id: PackId) -> Option<&Pack> {
        self.packs.get(id)
    }

    pub fn pack_mut(&mut self, id: PackId) -> Option<&mut Pack> {
        self.packs.get_mut(id)
    }

    /// Pack the entity belongs to, if any
    pub fn pack_of(&self, entity: EntityId) -> Option<PackId> {
        self.record(entity).and_then(|r| r.pack)
    }

    pub fn packs(&self) -> impl Iterator<Item = (PackId, &Pack)> {
        self.packs.iter()
    }

    pub fn handle(&self, entity: EntityId) -> Option<AgentHandle> {
        self.by_entity.get(&entity).copied()
    }

    pub fn record(&self, entity: EntityId) -> Option<&AiRecord> {
        self.handle(entity).and_then(|h| self.records.get(h))
    }

    pub fn record_mut(&mut self, entity: EntityId) -> Option<&mut AiRecord> {
        let handle = self.handle(entity)?;
        self.records.get_mut(handle)
    }

    pub fn record_by_handle(&self, handle: AgentHandle) -> Option<&AiRecord> {
        self.records.get(handle)
    }

    pub fn records(&self) -> impl Iterator<Item = (AgentHandle, &AiRecord)> {
        self.records.iter()
    }

    /// Number of registered entities
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn player_model(&self) -> &PlayerBehaviorModel {
        &self.model
    }

    /// Seconds simulated so far
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Events produced by the last [`Orchestrator::update`]
    pub fn events(&self) -> &[AiEvent] {
        &self.events
    }

    /// Advance every registered entity and pack by `dt` seconds
    ///
    /// Entities the world cannot resolve are skipped for this tick.
    pub fn update<W, P>(&mut self, dt: f32, world: &mut W, player: &mut P)
    where
        W: CombatWorld + ?Sized,
        P: Player + ?Sized,
    {
        self.events.clear();
        self.elapsed += f64::from(dt);
        let now = self.elapsed;

        self.model.observe(&*player, now);

        for handle in self.records.handles() {
            let Some(record) = self.records.get_mut(handle) else {
                continue;
            };
            let mut ctx = TickContext {
                world: &mut *world,
                player: &mut *player,
                model: &self.model,
                rng: &mut self.rng,
                events: &mut self.events,
                now,
                dt,
            };
            self.engine.update(record, &mut ctx);
        }

        for id in self.packs.handles() {
            if let Some(pack) = self.packs.get(id) {
                self.coordinator.update(pack, &mut self.records, &*player, &mut self.events);
            }
        }

        self.compact_packs();
    }

    /// Drop stale pack members and disband packs left empty
    fn compact_packs(&mut self) {
        for id in self.packs.handles() {
            let empty = match self.packs.get_mut(id) {
                Some(pack) => {
                    pack.retain_live(&self.records);
                    pack.is_empty()
                }
                None => false,
            };
            if empty {
                self.packs.remove(id);
                log::info!("Pack {:?} has no members left, disbanding", id);
                self.events.push(AiEvent::PackDisbanded { pack: id });
            }
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::with_registry(CombatAiConfig::default(), PersonalityRegistry::new())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("records", &self.records.len())
            .field("packs", &self.packs.len())
            .field("elapsed", &self.elapsed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AiState;
    use crate::world::{EntityStats, MemoryWorld, PlayerState};
    use glam::Vec3;

    fn setup() -> (Orchestrator, MemoryWorld, PlayerState) {
        let mut world = MemoryWorld::new();
        for i in 1..=4u64 {
            world.spawn(i, Vec3::new(i as f32 * 100.0, 0.0, 0.0), EntityStats::default());
        }
        let player = PlayerState::new(1000u64, Vec3::ZERO);
        (Orchestrator::default(), world, player)
    }

    #[test]
    fn test_register_enemy() {
        let (mut ai, world, _) = setup();
        let handle = ai.register_enemy(&world, EntityId(1), "aggressive").unwrap();

        assert_eq!(ai.len(), 1);
        let record = ai.record(EntityId(1)).unwrap();
        assert_eq!(record.state(), AiState::Idle);
        assert_eq!(record.patrol_points().len(), 4);
        assert_eq!(ai.handle(EntityId(1)), Some(handle));
    }

    #[test]
    fn test_register_twice_returns_same_handle() {
        let (mut ai, world, _) = setup();
        let a = ai.register_enemy(&world, EntityId(1), "AGGRESSIVE").unwrap();
        let b = ai.register_enemy(&world, EntityId(1), "DEFENSIVE").unwrap();
        assert_eq!(a, b);
        assert_eq!(ai.len(), 1);
        assert!(!ai.record(EntityId(1)).unwrap().personality.flags.use_cover);
    }

    #[test]
    fn test_register_errors() {
        let (mut ai, world, _) = setup();
        assert!(matches!(
            ai.register_enemy(&world, EntityId(1), "COWARD"),
            Err(CombatAiError::UnknownPersonality(_))
        ));
        assert!(matches!(
            ai.register_enemy(&world, EntityId(77), "AGGRESSIVE"),
            Err(CombatAiError::EntityNotFound(EntityId(77)))
        ));
        assert!(ai.is_empty());
    }

    #[test]
    fn test_config_personalities_are_registered() {
        let sniper = crate::personality::NamedPersonality {
            key: "sniper".into(),
            profile: PersonalityProfile::new(25.0, 0.5, 40.0, 0.3),
        };
        let config = CombatAiConfig::default().with_personality(sniper);
        let ai = Orchestrator::new(config).unwrap();
        assert!(ai.personalities().contains("SNIPER"));
    }

    #[test]
    fn test_remove_unregistered_is_noop() {
        let (mut ai, _, _) = setup();
        assert!(!ai.remove_enemy(EntityId(1)));
    }

    #[test]
    fn test_stale_handle_after_remove() {
        let (mut ai, world, _) = setup();
        let old = ai.register_enemy(&world, EntityId(1), "AGGRESSIVE").unwrap();
        assert!(ai.remove_enemy(EntityId(1)));

        let new = ai.register_enemy(&world, EntityId(1), "AGGRESSIVE").unwrap();
        assert_ne!(old, new);
        assert!(ai.record_by_handle(old).is_none());
        assert!(ai.record_by_handle(new).is_some());
    }

    #[test]
    fn test_create_pack_validation() {
        let (mut ai, world, _) = setup();
        ai.register_enemy(&world, EntityId(1), "AGGRESSIVE").unwrap();
        ai.register_enemy(&world, EntityId(2), "AGGRESSIVE").unwrap();

        assert!(matches!(ai.create_pack(&[]), Err(CombatAiError::EmptyPack)));
        assert!(matches!(
            ai.create_pack(&[EntityId(1), EntityId(9)]),
            Err(CombatAiError::NotRegistered(EntityId(9)))
        ));

        let pack = ai.create_pack(&[EntityId(1), EntityId(2), EntityId(1)]).unwrap();
        assert_eq!(ai.pack(pack).unwrap().len(), 2);
        assert_eq!(ai.pack_of(EntityId(2)), Some(pack));

        assert!(matches!(
            ai.create_pack(&[EntityId(2)]),
            Err(CombatAiError::AlreadyInPack { .. })
        ));
    }

    #[test]
    fn test_disband_pack() {
        let (mut ai, world, _) = setup();
        ai.register_enemy(&world, EntityId(1), "AGGRESSIVE").unwrap();
        let pack = ai.create_pack(&[EntityId(1)]).unwrap();

        ai.disband_pack(pack).unwrap();
        assert!(ai.pack(pack).is_none());
        assert_eq!(ai.pack_of(EntityId(1)), None);
        assert!(matches!(ai.disband_pack(pack), Err(CombatAiError::PackNotFound(_))));
        assert!(matches!(
            ai.set_formation(pack, Formation::Wave),
            Err(CombatAiError::PackNotFound(_))
        ));
    }

    #[test]
    fn test_removing_last_member_disbands_pack() {
        let (mut ai, world, _) = setup();
        ai.register_enemy(&world, EntityId(1), "AGGRESSIVE").unwrap();
        ai.register_enemy(&world, EntityId(2), "AGGRESSIVE").unwrap();
        let pack = ai.create_pack(&[EntityId(1), EntityId(2)]).unwrap();

        assert!(ai.remove_enemy(EntityId(1)));
        let survivor = ai.handle(EntityId(2)).unwrap();
        assert_eq!(ai.pack(pack).unwrap().leader(), survivor);

        assert!(ai.remove_enemy(EntityId(2)));
        assert!(ai.pack(pack).is_none());
        assert_eq!(ai.packs().count(), 0);
    }

    #[test]
    fn test_compaction_disbands_pack_with_stale_members() {
        let (mut ai, mut world, mut player) = setup();
        ai.register_enemy(&world, EntityId(1), "AGGRESSIVE").unwrap();
        let pack = ai.create_pack(&[EntityId(1)]).unwrap();
        let handle = ai.handle(EntityId(1)).unwrap();

        // Records dropped behind the pack's back are cleaned up at end of tick
        ai.records.remove(handle);
        ai.by_entity.remove(&EntityId(1));
        ai.update(0.1, &mut world, &mut player);

        assert!(ai.pack(pack).is_none());
        assert!(ai.events().contains(&AiEvent::PackDisbanded { pack }));
    }

    #[test]
    fn test_update_advances_time_and_observes_player() {
        let (mut ai, mut world, mut player) = setup();
        player.last_used_skill = Some("fireball".into());

        ai.update(0.5, &mut world, &mut player);
        ai.update(0.5, &mut world, &mut player);

        assert!((ai.elapsed() - 1.0).abs() < 1e-9);
        assert_eq!(ai.player_model().skill_count("fireball"), 2);
    }

    #[test]
    fn test_clear_resets_everything() {
        let (mut ai, mut world, mut player) = setup();
        ai.register_enemy(&world, EntityId(1), "AGGRESSIVE").unwrap();
        ai.create_pack(&[EntityId(1)]).unwrap();
        player.last_used_skill = Some("charge".into());
        ai.update(0.1, &mut world, &mut player);

        ai.clear();
        assert!(ai.is_empty());
        assert_eq!(ai.packs().count(), 0);
        assert_eq!(ai.player_model().most_used_skill(), None);
        assert!(ai.events().is_empty());
    }

    #[test]
    fn test_despawned_entity_is_skipped() {
        let (mut ai, mut world, mut player) = setup();
        ai.register_enemy(&world, EntityId(1), "AGGRESSIVE").unwrap();
        world.despawn(EntityId(1));

        ai.update(0.1, &mut world, &mut player);

        let record = ai.record(EntityId(1)).unwrap();
        assert_eq!(record.state(), AiState::Idle);
        assert_eq!(record.state_timer(), 0.0);
    }

    #[test]
    fn test_same_seed_same_patrol() {
        let (mut a, world, _) = setup();
        let mut b = Orchestrator::default();
        a.register_enemy(&world, EntityId(1), "AGGRESSIVE").unwrap();
        b.register_enemy(&world, EntityId(1), "AGGRESSIVE").unwrap();

        assert_eq!(
            a.record(EntityId(1)).unwrap().patrol_points(),
            b.record(EntityId(1)).unwrap().patrol_points()
        );
    }
}

//! Pack tactics
//!
//! A pack is a group of registered entities sharing one formation. The
//! coordinator never moves anyone: it writes a tactical position hint into
//! each member's record, and the member's own state machine steers by it.

use crate::events::AiEvent;
use crate::handle::{AgentHandle, SlotArena};
use crate::record::{AiRecord, AiState};
use crate::state_machine::StateMachineEngine;
use crate::steering::orbit_point;
use crate::world::Player;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// How a pack arranges itself around the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formation {
    /// Evenly spaced ring around the player
    #[default]
    Scatter,
    /// Two arms on either side of the player
    Pincer,
    /// Members join the leader's attack one at a time
    Wave,
}

/// Which target the pack prefers, for hosts with more than one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPriority {
    Player,
    Nearest,
    Weakest,
}

/// A group of entities with one formation
///
/// Members are weak references: the orchestrator owns the records and a
/// member handle may outlive its record until the pack is compacted.
#[derive(Debug, Clone)]
pub struct Pack {
    members: Vec<AgentHandle>,
    leader: AgentHandle,
    pub formation: Formation,
    pub target_priority: Option<TargetPriority>,
}

impl Pack {
    /// Create a pack led by the first member. `None` if `members` is empty.
    pub fn new(members: Vec<AgentHandle>, formation: Formation) -> Option<Self> {
        let leader = *members.first()?;
        Some(Self {
            members,
            leader,
            formation,
            target_priority: None,
        })
    }

    pub fn with_target_priority(mut self, priority: TargetPriority) -> Self {
        self.target_priority = Some(priority);
        self
    }

    pub fn members(&self) -> &[AgentHandle] {
        &self.members
    }

    pub fn leader(&self) -> AgentHandle {
        self.leader
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, member: AgentHandle) -> bool {
        self.members.contains(&member)
    }

    /// Drop a member, keeping the others in order. A removed leader is
    /// replaced by the next member.
    pub fn remove_member(&mut self, member: AgentHandle) -> bool {
        let Some(index) = self.members.iter().position(|m| *m == member) else {
            return false;
        };
        self.members.remove(index);

        if self.leader == member {
            if let Some(next) = self.members.get(index % self.members.len().max(1)) {
                self.leader = *next;
            }
        }
        true
    }

    /// Drop members whose records no longer exist. Returns how many were dropped.
    pub fn retain_live(&mut self, records: &SlotArena<AiRecord>) -> usize {
        let stale: Vec<_> = self
            .members
            .iter()
            .copied()
            .filter(|m| !records.contains(*m))
            .collect();
        for member in &stale {
            self.remove_member(*member);
        }
        stale.len()
    }
}

/// Writes formation hints for packs
#[derive(Debug, Clone)]
pub struct PackCoordinator {
    pub scatter_radius: f32,
    pub pincer_offset: f32,
}

impl PackCoordinator {
    pub fn new(scatter_radius: f32, pincer_offset: f32) -> Self {
        Self {
            scatter_radius,
            pincer_offset,
        }
    }

    /// Apply the pack's formation to its members for this tick
    pub fn update<P: Player + ?Sized>(
        &self,
        pack: &Pack,
        records: &mut SlotArena<AiRecord>,
        player: &P,
        events: &mut Vec<AiEvent>,
    ) {
        let members: Vec<AgentHandle> = pack
            .members()
            .iter()
            .copied()
            .filter(|m| records.contains(*m))
            .collect();
        if members.is_empty() {
            return;
        }

        match pack.formation {
            Formation::Scatter => self.scatter(&members, records, player),
            Formation::Pincer => self.pincer(&members, records, player),
            Formation::Wave => Self::wave(pack.leader(), &members, records, player, events),
        }
    }

    fn scatter<P: Player + ?Sized>(
        &self,
        members: &[AgentHandle],
        records: &mut SlotArena<AiRecord>,
        player: &P,
    ) {
        let center = player.position();
        let step = TAU / members.len() as f32;

        for (i, member) in members.iter().enumerate() {
            if let Some(record) = records.get_mut(*member) {
                let slot = orbit_point(center, i as f32 * step, self.scatter_radius);
                record.tactical_position = Some(slot);
            }
        }
    }

    /// First half of the members take the player's left, the rest the right.
    /// The half rounds down, so an odd pack puts its middle member on the right.
    fn pincer<P: Player + ?Sized>(
        &self,
        members: &[AgentHandle],
        records: &mut SlotArena<AiRecord>,
        player: &P,
    ) {
        let center = player.position();
        let lateral = player.right();
        let half = members.len() / 2;

        for (i, member) in members.iter().enumerate() {
            let side = if i < half { -1.0 } else { 1.0 };
            if let Some(record) = records.get_mut(*member) {
                record.tactical_position = Some(center + lateral * (side * self.pincer_offset));
            }
        }
    }

    /// While the leader attacks, pull in the next member not yet attacking
    ///
    /// A pulled-in member out of attack reach falls back to Hunt on its own
    /// next tick and is pulled in again, so the wave stalls on it until it
    /// closes the distance.
    fn wave<P: Player + ?Sized>(
        leader: AgentHandle,
        members: &[AgentHandle],
        records: &mut SlotArena<AiRecord>,
        player: &P,
        events: &mut Vec<AiEvent>,
    ) {
        for member in members {
            if let Some(record) = records.get_mut(*member) {
                record.tactical_position = None;
            }
        }

        let leader_attacking = records
            .get(leader)
            .is_some_and(|r| r.state() == AiState::Attack);
        if !leader_attacking {
            return;
        }

        let start = members.iter().position(|m| *m == leader).unwrap_or(0);
        let next = (1..members.len())
            .map(|offset| members[(start + offset) % members.len()])
            .find(|m| records.get(*m).is_some_and(|r| r.state() != AiState::Attack));

        if let Some(record) = next.and_then(|m| records.get_mut(m)) {
            log::debug!("{:?} joins the wave", record.entity);
            StateMachineEngine::force_transition(record, AiState::Attack, player.id(), events);
        }
    }
}

impl Default for PackCoordinator {
    fn default() -> Self {
        Self::new(10.0, 8.0)
    }
}

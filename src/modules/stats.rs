use serde::{Deserialize, Serialize};

use crate::modules::interp::Action;
use crate::modules::world::{DeathReason, Event};

/// Executed actions by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStats {
    pub move_count: u64,
    pub move_back_count: u64,
    pub turn_count: u64,
    pub eat_count: u64,
    pub fork_count: u64,
    pub hit_count: u64,
}

impl ActionStats {
    pub fn record(&mut self, action: &Action) {
        let slot = match action {
            Action::Move => &mut self.move_count,
            Action::MoveBack => &mut self.move_back_count,
            Action::TurnLeft | Action::TurnRight | Action::TurnRandom => &mut self.turn_count,
            Action::Eat => &mut self.eat_count,
            Action::Fork { .. } => &mut self.fork_count,
            Action::Hit => &mut self.hit_count,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u64 {
        self.move_count
            + self.move_back_count
            + self.turn_count
            + self.eat_count
            + self.fork_count
            + self.hit_count
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifeStats {
    pub spawned: u64,
    pub forked: u64,
    pub exhausted: u64,
    pub slain: u64,
    pub culled: u64,
    pub food_blobs: u64,
}

impl LifeStats {
    pub fn record(&mut self, event: &Event) {
        let slot = match event {
            Event::FoodBlob { .. } => &mut self.food_blobs,
            Event::AgentSpawned { .. } => &mut self.spawned,
            Event::AgentForked { .. } => &mut self.forked,
            Event::AgentDied { reason, .. } => match reason {
                DeathReason::Exhausted => &mut self.exhausted,
                DeathReason::Slain { .. } => &mut self.slain,
                DeathReason::Culled => &mut self.culled,
            },
        };
        *slot = slot.saturating_add(1);
    }

    pub fn deaths(&self) -> u64 {
        self.exhausted + self.slain + self.culled
    }
}

/// Cumulative counters kept by a world since it was built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimStats {
    pub actions: ActionStats,
    pub life: LifeStats,
    /// Quanta in which a program ran its root form to completion.
    pub completions: u64,
    /// Quanta cut short by the evaluation budget.
    pub budget_exhaustions: u64,
    pub max_generation: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::agent::Position;

    #[test]
    fn turns_share_one_counter() {
        let mut stats = ActionStats::default();
        stats.record(&Action::TurnLeft);
        stats.record(&Action::TurnRandom);
        stats.record(&Action::Fork { percent: 50 });
        assert_eq!(stats.turn_count, 2);
        assert_eq!(stats.fork_count, 1);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn deaths_are_split_by_reason() {
        let mut life = LifeStats::default();
        let at = Position::new(1, 1);
        life.record(&Event::AgentDied {
            agent_id: 1,
            position: at,
            reason: DeathReason::Slain { by: 2 },
        });
        life.record(&Event::AgentDied {
            agent_id: 3,
            position: at,
            reason: DeathReason::Culled,
        });
        life.record(&Event::AgentSpawned {
            agent_id: 4,
            position: at,
        });
        assert_eq!(life.slain, 1);
        assert_eq!(life.culled, 1);
        assert_eq!(life.deaths(), 2);
        assert_eq!(life.spawned, 1);
    }
}

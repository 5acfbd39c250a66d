use serde::{Deserialize, Serialize};

use crate::modules::agent::{Agent, AgentId, Heading, Position};
use crate::modules::stats::SimStats;
use crate::modules::world::World;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub position: Position,
    pub heading: Heading,
    pub energy: i64,
    pub wait: u32,
    pub color: u8,
    /// Display RGB derived from color and energy.
    pub tint: [u8; 3],
    pub generation: u32,
    pub born_at: u64,
    /// Sprite rows already rotated to the heading, `#` for on-cells.
    pub sprite: Vec<String>,
    pub program: String,
}

impl AgentSnapshot {
    pub fn capture(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            position: agent.position,
            heading: agent.heading,
            energy: agent.energy,
            wait: agent.wait,
            color: agent.color,
            tint: agent.tint(),
            generation: agent.generation,
            born_at: agent.born_at,
            sprite: agent.rotated_sprite().to_lines(),
            program: agent.program.to_sexp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub width: i32,
    pub height: i32,
    pub max_food: i16,
    /// Row-major cell values; -1 marks obstacles.
    pub food: Vec<i16>,
    pub agents: Vec<AgentSnapshot>,
    pub stats: SimStats,
}

impl WorldSnapshot {
    pub fn capture(world: &World) -> Self {
        let food = (0..world.height())
            .flat_map(|y| (0..world.width()).map(move |x| (x, y)))
            .map(|(x, y)| world.food(x, y))
            .collect();
        let mut agents: Vec<AgentSnapshot> =
            world.agents().iter().map(AgentSnapshot::capture).collect();
        agents.sort_by_key(|a| a.id);

        Self {
            tick: world.tick(),
            width: world.width(),
            height: world.height(),
            max_food: world.max_food(),
            food,
            agents,
            stats: world.stats().clone(),
        }
    }
}

/// Human-readable panel for one agent.
pub fn agent_report(agent: &Agent) -> String {
    let mut lines = vec![
        format!("agent #{} (generation {})", agent.id, agent.generation),
        format!("energy: {}", agent.energy),
        format!("pos: {}, {}", agent.position.x, agent.position.y),
        format!("dir: {}, {}", agent.heading.dx, agent.heading.dy),
        format!("wait: {}", agent.wait),
    ];
    lines.extend(agent.rotated_sprite().to_lines());
    lines.push(agent.program.to_pretty());
    lines.join("\n")
}

/// Coarse text map: `#` obstacle, `@` agent, food shaded by amount.
pub fn render_ascii(world: &World) -> String {
    const SHADES: [char; 4] = [' ', '.', ':', '*'];
    let max_food = i32::from(world.max_food());
    let mut out = String::new();
    for y in 0..world.height() {
        for x in 0..world.width() {
            let here = Position::new(x, y);
            let food = world.food(x, y);
            let ch = if world.agent_at(here).is_some() {
                '@'
            } else if food < 0 {
                '#'
            } else {
                let level = (i32::from(food) * 3 + max_food - 1) / max_food;
                SHADES[level.clamp(0, 3) as usize]
            };
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::config::SimConfig;
    use crate::modules::program::{self, Expr, Op};

    fn tiny_world() -> World {
        let config = SimConfig {
            width: 4,
            height: 3,
            initial_agents: 0,
            min_population: 0,
            initial_blobs: Some(0),
            obstacle_spacing: 0,
            ..SimConfig::default()
        };
        World::empty(config).unwrap()
    }

    #[test]
    fn snapshot_carries_grid_and_agents() {
        let mut world = tiny_world();
        world.place_obstacle(0, 0);
        world.set_food(3, 2, 800);
        world
            .spawn_agent_at(Position::new(1, 1), program::herbivore())
            .unwrap();
        let snapshot = WorldSnapshot::capture(&world);
        assert_eq!(snapshot.food.len(), 12);
        assert_eq!(snapshot.food[0], -1);
        assert_eq!(snapshot.food[11], 800);
        assert_eq!(snapshot.agents.len(), 1);
        assert!(snapshot.agents[0].program.starts_with("(begin"));
        assert_eq!(snapshot.agents[0].sprite.len(), 5);

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: WorldSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn ascii_map_marks_cells() {
        let mut world = tiny_world();
        world.place_obstacle(0, 0);
        world.set_food(3, 2, 800);
        world
            .spawn_agent_at(Position::new(1, 1), Expr::call(Op::Eat))
            .unwrap();
        assert_eq!(render_ascii(&world), "#   \n @  \n   *\n");
    }

    #[test]
    fn report_lists_state_and_program() {
        let mut world = tiny_world();
        let id = world
            .spawn_agent_at(Position::new(2, 1), Expr::call(Op::Hit))
            .unwrap();
        let report = agent_report(world.agent(id).unwrap());
        assert!(report.contains("energy: 200"));
        assert!(report.contains("pos: 2, 1"));
        assert!(report.contains("dir: 1, 0"));
        assert!(report.ends_with("(hit)"));
    }
}

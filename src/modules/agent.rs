use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::modules::interp::{Action, Execution, Host, Sensor};
use crate::modules::mutation;
use crate::modules::program::Expr;
use crate::modules::sprite::Sprite;
use crate::modules::world::{Event, World};

pub type AgentId = u64;

pub const MOVE_WAIT: u32 = 5;
pub const TURN_WAIT: u32 = 3;
pub const EAT_WAIT: u32 = 5;
pub const FORK_WAIT: u32 = 10;
pub const HIT_WAIT: u32 = 3;
/// Energy written into a struck agent; always below the survival threshold.
pub const HIT_SENTINEL: i64 = -1000;
pub const FORK_PERCENT_MIN: i64 = 3;
pub const FORK_PERCENT_MAX: i64 = 97;
/// Energy above which the display tint saturates.
const TINT_ENERGY: i64 = 200;
const COLOR_DRIFT: i32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offsets by (dx, dy) on a torus of the given size.
    pub fn offset_wrapped(self, dx: i32, dy: i32, width: i32, height: i32) -> Self {
        Self {
            x: (self.x + dx).rem_euclid(width),
            y: (self.y + dy).rem_euclid(height),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Heading {
    pub dx: i32,
    pub dy: i32,
}

impl Heading {
    pub const EAST: Heading = Heading { dx: 1, dy: 0 };
    pub const SOUTH: Heading = Heading { dx: 0, dy: 1 };
    pub const WEST: Heading = Heading { dx: -1, dy: 0 };
    pub const NORTH: Heading = Heading { dx: 0, dy: -1 };

    pub const fn left(self) -> Self {
        Heading {
            dx: self.dy,
            dy: -self.dx,
        }
    }

    pub const fn right(self) -> Self {
        Heading {
            dx: -self.dy,
            dy: self.dx,
        }
    }

    pub const fn reversed(self) -> Self {
        Heading {
            dx: -self.dx,
            dy: -self.dy,
        }
    }

    /// Clockwise quarter turns applied to a sprite drawn facing north.
    pub const fn quarter_turns(self) -> usize {
        if self.dx == 1 {
            1
        } else if self.dy == 1 {
            2
        } else if self.dx == -1 {
            3
        } else {
            0
        }
    }
}

#[derive(Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub position: Position,
    pub heading: Heading,
    pub energy: i64,
    pub wait: u32,
    pub color: u8,
    pub sprite: Sprite,
    pub program: Arc<Expr>,
    /// 0 for spawned agents, parent + 1 for forked ones.
    pub generation: u32,
    pub born_at: u64,
    pub(crate) execution: Option<Execution>,
    pub(crate) slain_by: Option<AgentId>,
}

impl Agent {
    pub fn new(
        id: AgentId,
        position: Position,
        sprite: Sprite,
        program: Arc<Expr>,
        color: u8,
        energy: i64,
    ) -> Self {
        Self {
            id,
            position,
            heading: Heading::EAST,
            energy,
            wait: 0,
            color,
            sprite,
            program,
            generation: 0,
            born_at: 0,
            execution: None,
            slain_by: None,
        }
    }

    pub fn ahead(&self, width: i32, height: i32) -> Position {
        self.position
            .offset_wrapped(self.heading.dx, self.heading.dy, width, height)
    }

    pub fn behind(&self, width: i32, height: i32) -> Position {
        self.position
            .offset_wrapped(-self.heading.dx, -self.heading.dy, width, height)
    }

    pub fn turn_left(&mut self) {
        self.heading = self.heading.left();
        self.wait = TURN_WAIT;
    }

    pub fn turn_right(&mut self) {
        self.heading = self.heading.right();
        self.wait = TURN_WAIT;
    }

    /// Display copy of the sprite rotated to the current heading.
    pub fn rotated_sprite(&self) -> Sprite {
        self.sprite.rotated(self.heading.quarter_turns())
    }

    /// Display color: red from the color index, blue from its complement,
    /// both dimmed while energy is low.
    pub fn tint(&self) -> [u8; 3] {
        let intensity = self.energy.clamp(0, TINT_ENERGY);
        let red = i64::from(self.color) * intensity / TINT_ENERGY;
        let blue = i64::from(255 - self.color) * intensity / TINT_ENERGY;
        [red as u8, 0, blue as u8]
    }

    /// True while no program evaluation is suspended.
    pub fn is_idle(&self) -> bool {
        self.execution.is_none()
    }
}

/// One agent's view of the world while its program runs.
pub(crate) struct AgentContext<'a, R: Rng> {
    world: &'a mut World,
    index: usize,
    rng: &'a mut R,
}

impl<'a, R: Rng> AgentContext<'a, R> {
    pub(crate) fn new(world: &'a mut World, index: usize, rng: &'a mut R) -> Self {
        Self { world, index, rng }
    }

    fn agent(&self) -> &Agent {
        &self.world.agents[self.index]
    }

    fn agent_mut(&mut self) -> &mut Agent {
        &mut self.world.agents[self.index]
    }

    fn step_to(&mut self, target: Position) {
        if !self.world.is_free(target) {
            return;
        }
        let agent = self.agent_mut();
        agent.position = target;
        agent.wait = MOVE_WAIT;
    }

    fn move_forward(&mut self) {
        let target = self.agent().ahead(self.world.width(), self.world.height());
        self.step_to(target);
    }

    fn move_back(&mut self) {
        let target = self.agent().behind(self.world.width(), self.world.height());
        self.step_to(target);
    }

    fn eat(&mut self) {
        let position = self.agent().position;
        let available = i64::from(self.world.food_at(position).max(0));
        let taken = available.min(self.world.config().eat_limit);
        self.world.set_food_at(position, (available - taken) as i16);
        let agent = self.agent_mut();
        agent.energy += taken;
        agent.wait = EAT_WAIT;
    }

    fn hit(&mut self) {
        let target = self.agent().ahead(self.world.width(), self.world.height());
        let Some(victim) = self.world.agent_index_at(target) else {
            return;
        };
        let attacker = self.agent().id;
        let loot = self.world.agents[victim].energy;
        self.world.deposit(target, loot);
        let struck = &mut self.world.agents[victim];
        struck.energy = HIT_SENTINEL;
        struck.slain_by = Some(attacker);
        self.agent_mut().wait = HIT_WAIT;
    }

    fn fork(&mut self, percent: i64) {
        let percent = percent.clamp(FORK_PERCENT_MIN, FORK_PERCENT_MAX);
        let (width, height) = (self.world.width(), self.world.height());
        let parent = self.agent();
        let forward = parent.ahead(width, height);
        let backward = parent.behind(width, height);
        let heading = parent.heading;

        let placement = if self.world.is_free(forward) {
            Some((forward, heading))
        } else if self.world.is_free(backward) {
            Some((backward, heading.reversed()))
        } else {
            None
        };
        let Some((cell, child_heading)) = placement else {
            trace!(agent_id = self.agent().id, "fork blocked on both sides");
            self.agent_mut().wait = FORK_WAIT;
            return;
        };

        let sprite_chance = self.world.config().sprite_mutation_chance;
        let program_chance = self.world.config().program_mutation_chance;
        let parent = &self.world.agents[self.index];
        let sprite = if self.rng.gen_bool(sprite_chance) {
            parent.sprite.mutate(self.rng)
        } else {
            parent.sprite
        };
        let program = if self.rng.gen_bool(program_chance) {
            Arc::new(mutation::mutate(&parent.program, self.rng))
        } else {
            Arc::clone(&parent.program)
        };
        let drift = self.rng.gen_range(-COLOR_DRIFT..COLOR_DRIFT);
        let color = (i32::from(parent.color) + drift).rem_euclid(256) as u8;
        let generation = parent.generation.saturating_add(1);
        let parent_id = parent.id;

        let taxed = parent.energy * 9 / 10;
        let child_energy = taxed * percent / 100;
        let parent_energy = taxed * (100 - percent) / 100;

        let child_id = self.world.allocate_id();
        let mut child = Agent::new(child_id, cell, sprite, program, color, child_energy);
        child.heading = child_heading;
        child.wait = FORK_WAIT;
        child.generation = generation;
        child.born_at = self.world.tick();

        let agent = self.agent_mut();
        agent.energy = parent_energy;
        agent.wait = FORK_WAIT;

        self.world.push_agent(child);
        self.world.record(Event::AgentForked {
            parent: parent_id,
            child: child_id,
            position: cell,
        });
    }
}

impl<R: Rng> Host for AgentContext<'_, R> {
    fn sense(&self, sensor: Sensor) -> i64 {
        let agent = self.agent();
        match sensor {
            Sensor::FoodHere => i64::from(self.world.food_at(agent.position)),
            Sensor::FoodAhead => {
                let ahead = agent.ahead(self.world.width(), self.world.height());
                i64::from(self.world.food_at(ahead))
            }
            Sensor::MyEnergy => agent.energy,
        }
    }

    fn act(&mut self, action: Action) {
        match action {
            Action::Move => self.move_forward(),
            Action::MoveBack => self.move_back(),
            Action::TurnLeft => self.agent_mut().turn_left(),
            Action::TurnRight => self.agent_mut().turn_right(),
            Action::TurnRandom => {
                if self.rng.gen_bool(0.5) {
                    self.agent_mut().turn_left();
                } else {
                    self.agent_mut().turn_right();
                }
            }
            Action::Eat => self.eat(),
            Action::Fork { percent } => self.fork(percent),
            Action::Hit => self.hit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turning_rotates_the_heading() {
        assert_eq!(Heading::EAST.left(), Heading::NORTH);
        assert_eq!(Heading::EAST.right(), Heading::SOUTH);
        assert_eq!(Heading::NORTH.left(), Heading::WEST);
        assert_eq!(Heading::WEST.reversed(), Heading::EAST);
        let mut heading = Heading::SOUTH;
        for _ in 0..4 {
            heading = heading.right();
        }
        assert_eq!(heading, Heading::SOUTH);
    }

    #[test]
    fn wrap_never_goes_negative() {
        let (w, h) = (7, 5);
        for x in 0..w {
            for y in 0..h {
                for heading in [Heading::EAST, Heading::SOUTH, Heading::WEST, Heading::NORTH] {
                    let mut agent = Agent::new(
                        1,
                        Position::new(x, y),
                        Sprite::fallback(),
                        Arc::new(Expr::Nil),
                        0,
                        10,
                    );
                    agent.heading = heading;
                    for cell in [agent.ahead(w, h), agent.behind(w, h)] {
                        assert!((0..w).contains(&cell.x));
                        assert!((0..h).contains(&cell.y));
                    }
                }
            }
        }
        let corner = Position::new(0, 0).offset_wrapped(-1, -1, w, h);
        assert_eq!(corner, Position::new(6, 4));
    }

    #[test]
    fn turns_set_the_wait_timer() {
        let mut agent = Agent::new(
            1,
            Position::new(0, 0),
            Sprite::fallback(),
            Arc::new(Expr::Nil),
            0,
            10,
        );
        agent.turn_left();
        assert_eq!(agent.heading, Heading::NORTH);
        assert_eq!(agent.wait, TURN_WAIT);
    }

    #[test]
    fn rotated_sprite_tracks_heading() {
        let mut agent = Agent::new(
            1,
            Position::new(0, 0),
            Sprite::fallback(),
            Arc::new(Expr::Nil),
            0,
            10,
        );
        agent.heading = Heading::NORTH;
        assert_eq!(agent.rotated_sprite(), agent.sprite);
        agent.heading = Heading::EAST;
        assert_eq!(agent.rotated_sprite(), agent.sprite.rotated(1));
        agent.heading = Heading::SOUTH;
        assert_eq!(agent.rotated_sprite(), agent.sprite.rotated(2));
    }

    #[test]
    fn tint_dims_with_energy() {
        let mut agent = Agent::new(
            1,
            Position::new(0, 0),
            Sprite::fallback(),
            Arc::new(Expr::Nil),
            200,
            400,
        );
        assert_eq!(agent.tint(), [200, 0, 55]);
        agent.energy = 100;
        assert_eq!(agent.tint(), [100, 0, 27]);
        agent.energy = -5;
        assert_eq!(agent.tint(), [0, 0, 0]);
    }
}

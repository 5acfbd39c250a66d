use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::modules::agent::{Agent, AgentContext, AgentId, Position};
use crate::modules::config::{ConfigError, SimConfig};
use crate::modules::interp::Resumption;
use crate::modules::program::{self, Expr};
use crate::modules::sprite::Sprite;
use crate::modules::stats::SimStats;
use crate::modules::view::WorldSnapshot;

/// Grid value marking an impassable cell.
pub const OBSTACLE: i16 = -1;
/// Random probes before falling back to a full scan for a free cell.
const SPAWN_ATTEMPTS: usize = 1_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathReason {
    /// Energy ran out.
    Exhausted,
    Slain { by: AgentId },
    /// Removed by the per-tick random cull.
    Culled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    FoodBlob {
        center: Position,
    },
    AgentSpawned {
        agent_id: AgentId,
        position: Position,
    },
    AgentForked {
        parent: AgentId,
        child: AgentId,
        position: Position,
    },
    AgentDied {
        agent_id: AgentId,
        position: Position,
        reason: DeathReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickResult {
    pub tick: u64,
    /// Live agents after removal and refill.
    pub population: usize,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone)]
pub struct World {
    config: SimConfig,
    grid: Vec<i16>,
    pub(crate) agents: Vec<Agent>,
    tick: u64,
    next_agent_id: AgentId,
    events: Vec<Event>,
    stats: SimStats,
    herbivore: Arc<Expr>,
}

impl World {
    /// Bare world: no obstacles, no food, no agents.
    pub fn empty(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let cells = config.width as usize * config.height as usize;
        Ok(Self {
            grid: vec![0; cells],
            config,
            agents: Vec::new(),
            tick: 0,
            next_agent_id: 1,
            events: Vec::new(),
            stats: SimStats::default(),
            herbivore: Arc::new(program::herbivore()),
        })
    }

    /// Seeds obstacles, initial food blobs and the starting population.
    pub fn generate<R: Rng>(config: SimConfig, rng: &mut R) -> Result<Self, ConfigError> {
        let mut world = Self::empty(config)?;
        world.place_obstacles(rng);
        for _ in 0..world.config.initial_blob_count() {
            world.food_blob(rng);
        }
        for _ in 0..world.config.initial_agents {
            if world.spawn_agent(rng).is_none() {
                warn!("no free cell left for initial agent");
                break;
            }
        }
        // Setup is not part of any tick.
        world.events.clear();
        world.stats = SimStats::default();
        debug!(
            width = world.width(),
            height = world.height(),
            agents = world.agents.len(),
            "world generated"
        );
        Ok(world)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn width(&self) -> i32 {
        self.config.width
    }

    pub fn height(&self) -> i32 {
        self.config.height
    }

    pub fn max_food(&self) -> i16 {
        self.config.max_food
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    pub fn agent_at(&self, position: Position) -> Option<&Agent> {
        self.agent_index_at(position).map(|i| &self.agents[i])
    }

    fn wrap(&self, x: i32, y: i32) -> Position {
        Position::new(x.rem_euclid(self.width()), y.rem_euclid(self.height()))
    }

    fn index_of(&self, position: Position) -> usize {
        let p = self.wrap(position.x, position.y);
        p.y as usize * self.config.width as usize + p.x as usize
    }

    /// Food at (x, y), wrapped onto the torus; `OBSTACLE` for blocked cells.
    pub fn food(&self, x: i32, y: i32) -> i16 {
        self.food_at(Position::new(x, y))
    }

    pub fn food_at(&self, position: Position) -> i16 {
        self.grid[self.index_of(position)]
    }

    /// Sets food on an open cell, clamped to `[0, max_food]`. Obstacles are left alone.
    pub fn set_food(&mut self, x: i32, y: i32, amount: i16) {
        self.set_food_at(Position::new(x, y), amount);
    }

    pub fn set_food_at(&mut self, position: Position, amount: i16) {
        let index = self.index_of(position);
        if self.grid[index] == OBSTACLE {
            return;
        }
        self.grid[index] = amount.clamp(0, self.config.max_food);
    }

    pub fn place_obstacle(&mut self, x: i32, y: i32) {
        let index = self.index_of(Position::new(x, y));
        self.grid[index] = OBSTACLE;
    }

    pub fn is_obstacle(&self, position: Position) -> bool {
        self.food_at(position) == OBSTACLE
    }

    pub fn total_food(&self) -> i64 {
        self.grid
            .iter()
            .filter(|&&cell| cell > 0)
            .map(|&cell| i64::from(cell))
            .sum()
    }

    /// Adds positive energy to a cell's food, capped at `max_food`.
    pub(crate) fn deposit(&mut self, position: Position, energy: i64) {
        if energy <= 0 || self.is_obstacle(position) {
            return;
        }
        let current = i64::from(self.food_at(position));
        let total = (current + energy).min(i64::from(self.config.max_food));
        self.set_food_at(position, total as i16);
    }

    /// First agent, in iteration order, standing on `position`.
    pub(crate) fn agent_index_at(&self, position: Position) -> Option<usize> {
        let p = self.wrap(position.x, position.y);
        self.agents.iter().position(|a| a.position == p)
    }

    /// Open ground with nobody on it.
    pub fn is_free(&self, position: Position) -> bool {
        !self.is_obstacle(position) && self.agent_index_at(position).is_none()
    }

    pub(crate) fn allocate_id(&mut self) -> AgentId {
        let id = self.next_agent_id;
        self.next_agent_id += 1;
        id
    }

    pub(crate) fn push_agent(&mut self, agent: Agent) {
        self.stats.max_generation = self.stats.max_generation.max(agent.generation);
        self.agents.push(agent);
    }

    pub(crate) fn record(&mut self, event: Event) {
        self.stats.life.record(&event);
        self.events.push(event);
    }

    /// Places an agent running `program` on a chosen free cell.
    pub fn spawn_agent_at(&mut self, position: Position, program: Expr) -> Option<AgentId> {
        let position = self.wrap(position.x, position.y);
        if !self.is_free(position) {
            return None;
        }
        let id = self.allocate_id();
        let mut agent = Agent::new(
            id,
            position,
            Sprite::fallback(),
            Arc::new(program),
            128,
            self.config.start_energy,
        );
        agent.born_at = self.tick;
        self.push_agent(agent);
        self.record(Event::AgentSpawned {
            agent_id: id,
            position,
        });
        Some(id)
    }

    /// Spawns a fresh herbivore on a random free cell; `None` when the grid is full.
    pub fn spawn_agent<R: Rng>(&mut self, rng: &mut R) -> Option<AgentId> {
        let position = self.random_free_cell(rng)?;
        let id = self.allocate_id();
        let sprite = Sprite::generate(rng);
        let color = rng.gen_range(0..=u8::MAX);
        let mut agent = Agent::new(
            id,
            position,
            sprite,
            Arc::clone(&self.herbivore),
            color,
            self.config.start_energy,
        );
        agent.born_at = self.tick;
        self.push_agent(agent);
        self.record(Event::AgentSpawned {
            agent_id: id,
            position,
        });
        debug!(agent_id = id, x = position.x, y = position.y, "agent spawned");
        Some(id)
    }

    fn random_free_cell<R: Rng>(&self, rng: &mut R) -> Option<Position> {
        for _ in 0..SPAWN_ATTEMPTS {
            let candidate = Position::new(
                rng.gen_range(0..self.width()),
                rng.gen_range(0..self.height()),
            );
            if self.is_free(candidate) {
                return Some(candidate);
            }
        }
        let cells = self.grid.len();
        let start = rng.gen_range(0..cells);
        (0..cells)
            .map(|offset| (start + offset) % cells)
            .map(|i| {
                let width = self.config.width as usize;
                Position::new((i % width) as i32, (i / width) as i32)
            })
            .find(|&p| self.is_free(p))
    }

    fn place_obstacles<R: Rng>(&mut self, rng: &mut R) {
        if self.config.obstacle_spacing == 0 {
            return;
        }
        let count = self.grid.len() / self.config.obstacle_spacing;
        let mut placed = Vec::with_capacity(count * 3);
        for _ in 0..count {
            let x = rng.gen_range(0..self.width());
            let y = rng.gen_range(0..self.height());
            self.place_obstacle(x, y);
            placed.push(Position::new(x, y));
        }
        // Grow clumps: each extra cell sits next to an existing obstacle.
        for _ in 0..count * 2 {
            let seed = placed[rng.gen_range(0..placed.len())];
            let step = if rng.gen_bool(0.5) { -1 } else { 1 };
            let (dx, dy) = if rng.gen_bool(0.5) { (step, 0) } else { (0, step) };
            let cell = self.wrap(seed.x + dx, seed.y + dy);
            self.place_obstacle(cell.x, cell.y);
            placed.push(cell);
        }
    }

    /// Drops a diamond-shaped mound of food around a random center.
    pub fn food_blob<R: Rng>(&mut self, rng: &mut R) -> Position {
        let center = Position::new(
            rng.gen_range(0..self.width()),
            rng.gen_range(0..self.height()),
        );
        self.food_blob_at(center);
        center
    }

    pub fn food_blob_at(&mut self, center: Position) {
        let radius = self.config.blob_radius;
        let max_food = i64::from(self.config.max_food);
        for dx in -radius..=radius {
            let reach = f64::from(radius * radius - dx * dx).sqrt() as i32;
            for dy in -reach..=reach {
                let distance = i64::from(dx.abs() + dy.abs());
                let amount = (max_food * (i64::from(radius) - distance) / i64::from(radius)).max(1);
                let cell = self.wrap(center.x + dx, center.y + dy);
                if self.is_obstacle(cell) {
                    continue;
                }
                let current = i64::from(self.food_at(cell));
                self.set_food_at(cell, (current + amount).min(max_food) as i16);
            }
        }
        self.record(Event::FoodBlob { center });
    }

    /// Advances the world by one tick.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> TickResult {
        self.tick += 1;
        self.events.clear();

        if rng.gen_bool(self.config.blob_chance) {
            let center = self.food_blob(rng);
            debug!(tick = self.tick, x = center.x, y = center.y, "food blob");
        }

        // Children forked this tick wait for the next one.
        let live = self.agents.len();
        for index in 0..live {
            self.run_quantum(index, rng);
            self.agents[index].energy -= 1;
        }

        self.remove_dead(rng);
        self.refill_population(rng);

        TickResult {
            tick: self.tick,
            population: self.agents.len(),
            events: std::mem::take(&mut self.events),
        }
    }

    fn run_quantum<R: Rng>(&mut self, index: usize, rng: &mut R) {
        let agent = &mut self.agents[index];
        if agent.wait > 0 {
            agent.wait -= 1;
            return;
        }

        let agent_id = agent.id;
        let program = Arc::clone(&agent.program);
        let mut execution = agent.execution.take().unwrap_or_default();
        let budget = self.config.step_budget;
        let outcome = {
            let mut host = AgentContext::new(self, index, rng);
            execution.resume(&program, &mut host, budget)
        };

        match outcome {
            Resumption::Suspended(action) => {
                trace!(agent_id, action = action.label(), "agent acted");
                self.stats.actions.record(&action);
                self.agents[index].execution = Some(execution);
            }
            Resumption::OutOfSteps => {
                trace!(agent_id, "evaluation budget exhausted");
                self.stats.budget_exhaustions += 1;
                self.agents[index].execution = Some(execution);
            }
            Resumption::Completed(value) => {
                trace!(agent_id, %value, "program completed");
                self.stats.completions += 1;
            }
        }
    }

    fn remove_dead<R: Rng>(&mut self, rng: &mut R) {
        let cull_chance = self.config.cull_chance;
        let agents = std::mem::take(&mut self.agents);
        let mut survivors = Vec::with_capacity(agents.len());
        for agent in agents {
            let reason = if agent.energy < 1 {
                Some(match agent.slain_by {
                    Some(by) => DeathReason::Slain { by },
                    None => DeathReason::Exhausted,
                })
            } else if rng.gen_bool(cull_chance) {
                Some(DeathReason::Culled)
            } else {
                None
            };

            let Some(reason) = reason else {
                survivors.push(agent);
                continue;
            };
            self.deposit(agent.position, agent.energy);
            debug!(agent_id = agent.id, ?reason, generation = agent.generation, "agent died");
            self.record(Event::AgentDied {
                agent_id: agent.id,
                position: agent.position,
                reason,
            });
        }
        self.agents = survivors;
    }

    fn refill_population<R: Rng>(&mut self, rng: &mut R) {
        while self.agents.len() < self.config.min_population {
            if self.spawn_agent(rng).is_none() {
                warn!(
                    population = self.agents.len(),
                    "population floor unreachable: grid is full"
                );
                break;
            }
        }
    }
}

/// A world paired with the random source that drives it.
#[derive(Debug, Clone)]
pub struct Simulation<R: Rng = ChaCha8Rng> {
    world: World,
    rng: R,
}

impl Simulation<ChaCha8Rng> {
    /// Seeded from `config.seed`, or from entropy when unset.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> Simulation<R> {
    pub fn with_rng(config: SimConfig, mut rng: R) -> Result<Self, ConfigError> {
        let world = World::generate(config, &mut rng)?;
        Ok(Self { world, rng })
    }

    /// Wraps an already-built world, e.g. one laid out by hand.
    pub fn from_world(world: World, rng: R) -> Self {
        Self { world, rng }
    }

    pub fn step(&mut self) -> TickResult {
        self.world.step(&mut self.rng)
    }

    /// Runs `ticks` steps, handing each result to `observe`.
    pub fn run<F>(&mut self, ticks: u64, mut observe: F)
    where
        F: FnMut(&World, &TickResult),
    {
        for _ in 0..ticks {
            let result = self.world.step(&mut self.rng);
            observe(&self.world, &result);
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(&self.world)
    }
}

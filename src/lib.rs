pub mod modules;

pub use modules::agent::{Agent, AgentId, Heading, Position};
pub use modules::config::{ConfigError, MAX_FOOD, SimConfig};
pub use modules::interp::{
    Action, DEFAULT_STEP_BUDGET, Execution, Host, Resumption, Sensor, Value, resume,
};
pub use modules::mutation::{self, MutationKind, mutate, mutate_traced};
pub use modules::program::{Expr, Op, OpKind, herbivore};
pub use modules::sprite::Sprite;
pub use modules::stats::{ActionStats, LifeStats, SimStats};
pub use modules::view::{AgentSnapshot, WorldSnapshot, agent_report, render_ascii};
pub use modules::world::{DeathReason, Event, OBSTACLE, Simulation, TickResult, World};

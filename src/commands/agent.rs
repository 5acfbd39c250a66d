use lispzoo::{agent_report, herbivore, mutate_traced};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::WorldArgs;

pub(super) fn run_inspect(
    args: &WorldArgs,
    ticks: u64,
    agent: Option<u64>,
    top: usize,
) -> Result<(), String> {
    let sim = args.simulate(ticks)?;
    let world = sim.world();

    if let Some(id) = agent {
        let agent = world
            .agent(id)
            .ok_or_else(|| format!("agent {} not found at tick {}", id, world.tick()))?;
        println!("{}", agent_report(agent));
        return Ok(());
    }

    let mut agents: Vec<_> = world.agents().iter().collect();
    agents.sort_by(|a, b| b.energy.cmp(&a.energy).then(a.id.cmp(&b.id)));
    println!(
        "{} agent(s) at tick {} (showing {}):",
        agents.len(),
        world.tick(),
        top.min(agents.len())
    );
    for agent in agents.into_iter().take(top) {
        println!(
            " - #{} energy={} pos=({}, {}) gen={} nodes={}",
            agent.id,
            agent.energy,
            agent.position.x,
            agent.position.y,
            agent.generation,
            agent.program.node_count()
        );
    }
    Ok(())
}

pub(super) fn run_program(mutations: usize, seed: Option<u64>, compact: bool) -> Result<(), String> {
    let mut rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let mut program = herbivore();
    for round in 1..=mutations {
        let (next, kind) = mutate_traced(&program, &mut rng);
        match kind {
            Some(kind) => println!("mutation {}: {}", round, kind),
            None => println!("mutation {}: no change", round),
        }
        program = next;
    }

    if compact {
        println!("{}", program.to_sexp());
    } else {
        println!("{}", program.to_pretty());
    }
    Ok(())
}

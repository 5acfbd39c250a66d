use std::fs;
use std::path::Path;

use chrono::Utc;
use lispzoo::{Event, SimStats, WorldSnapshot, render_ascii};
use serde::Serialize;
use tracing::info;

use super::WorldArgs;

/// Summary written by `run --report`.
#[derive(Debug, Serialize)]
struct RunReport {
    started_at: String,
    finished_at: String,
    seed: Option<u64>,
    width: i32,
    height: i32,
    ticks: u64,
    population: usize,
    total_food: i64,
    stats: SimStats,
}

pub(super) fn run_simulation(
    args: &WorldArgs,
    ticks: u64,
    report_every: u64,
    report: Option<&Path>,
) -> Result<(), String> {
    let started_at = Utc::now().to_rfc3339();
    let mut sim = args.simulate(0)?;
    let config = sim.world().config().clone();
    info!(
        width = config.width,
        height = config.height,
        seed = ?config.seed,
        ticks,
        "starting run"
    );

    let mut births = 0u64;
    let mut deaths = 0u64;
    sim.run(ticks, |world, result| {
        for event in &result.events {
            match event {
                Event::AgentForked { .. } | Event::AgentSpawned { .. } => births += 1,
                Event::AgentDied { .. } => deaths += 1,
                Event::FoodBlob { .. } => {}
            }
        }
        if report_every > 0 && result.tick % report_every == 0 {
            info!(
                tick = result.tick,
                population = result.population,
                births,
                deaths,
                max_generation = world.stats().max_generation,
                "progress"
            );
            births = 0;
            deaths = 0;
        }
    });

    let world = sim.world();
    let stats = world.stats();
    println!(
        "Ran {} tick(s): population={} | spawned={} | forked={} | deaths={} (exhausted={}, slain={}, culled={}) | max_generation={}",
        world.tick(),
        world.agents().len(),
        stats.life.spawned,
        stats.life.forked,
        stats.life.deaths(),
        stats.life.exhausted,
        stats.life.slain,
        stats.life.culled,
        stats.max_generation
    );

    if let Some(path) = report {
        let report = RunReport {
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            seed: config.seed,
            width: config.width,
            height: config.height,
            ticks: world.tick(),
            population: world.agents().len(),
            total_food: world.total_food(),
            stats: stats.clone(),
        };
        let json = serde_json::to_vec_pretty(&report).map_err(|e| e.to_string())?;
        fs::write(path, json)
            .map_err(|e| format!("failed to write report {}: {}", path.display(), e))?;
        println!("Run report written to {}", path.display());
    }

    Ok(())
}

pub(super) fn run_view(args: &WorldArgs, ticks: u64, json: bool) -> Result<(), String> {
    let sim = args.simulate(ticks)?;
    if json {
        let snapshot = WorldSnapshot::capture(sim.world());
        let json_str = serde_json::to_string_pretty(&snapshot).map_err(|e| e.to_string())?;
        println!("{}", json_str);
        return Ok(());
    }

    let world = sim.world();
    println!(
        "World snapshot: tick={} | agents={} | food={}",
        world.tick(),
        world.agents().len(),
        world.total_food()
    );
    print!("{}", render_ascii(world));
    Ok(())
}

//! commute: morning commute along a synthetic corridor.
//!
//! Walkers, bus riders, drivers and one shipping container travel from the
//! west end to the docks; bus riders work there for half an hour and ride
//! back.  Buses hold three passengers, so some riders wait for the next one.
//!
//! ```text
//! cargo run -p commute -- [settings.json]
//! ```

mod network;

use std::env;
use std::path::Path;
use std::time::Instant;

use anyhow::Result;

use tp_core::{ModeSet, Tick, TransportableKind};
use tp_output::{CsvWriter, StageOutputObserver};
use tp_sim::{init_std_out_logging, Population, Settings, SimBuilder};
use tp_stage::{DepartPos, ScheduleRouter, Stage, TripStage, WaitingStage};

use network::{build_corridor, Corridor};

// ── Constants ─────────────────────────────────────────────────────────────────

const WALKERS:    usize = 2;
const RIDERS:     usize = 6;
const DRIVERS:    usize = 2;
const WORK_TICKS: u64  = 1_800;

// ── Population ────────────────────────────────────────────────────────────────

fn build_population(c: &Corridor) -> Population {
    let net = &c.network;
    let [west, center, east] = c.east;
    let mut pop = Population::new();

    for i in 0..WALKERS {
        let trip = TripStage::new(net, west, center).with_modes(ModeSet::WALK);
        pop.add(format!("walker_{i}"), TransportableKind::Person, Tick(60 * i as u64), west, 0.0, vec![trip.into()]);
    }

    for i in 0..RIDERS {
        let out: Stage = TripStage::new(net, west, east)
            .to_stop(net, c.east_stops[2])
            .with_modes(ModeSet::PUBLIC)
            .with_depart_pos(DepartPos::Random)
            .into();
        let dock = net.stop(c.east_stops[2]);
        let work: Stage = WaitingStage::new(dock.edge, dock.access_pos(), WORK_TICKS, None, "work").into();
        let back: Stage = TripStage::new(net, c.west[0], c.west[2])
            .to_stop(net, c.west_stops[2])
            .with_modes(ModeSet::PUBLIC | ModeSet::WALK)
            .into();
        pop.add(format!("rider_{i}"), TransportableKind::Person, Tick(30 * i as u64), west, 0.0, vec![out, work, back]);
    }

    for i in 0..DRIVERS {
        let trip = TripStage::new(net, west, east).with_modes(ModeSet::CAR).with_vehicle_types(["passenger"]);
        pop.add(format!("driver_{i}"), TransportableKind::Person, Tick(120 * i as u64), west, 0.0, vec![trip.into()]);
    }

    let shipment = TripStage::new(net, west, east).to_stop(net, c.east_stops[2]).with_modes(ModeSet::PUBLIC);
    pop.add("crate_0", TransportableKind::Container, Tick(0), west, 350.0, vec![shipment.into()]);

    pop
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let settings = match env::args().nth(1) {
        Some(path) => Settings::from_json_file(Path::new(&path))?,
        None => Settings::default(),
    };
    let _log = init_std_out_logging(settings.level_filter()?);

    println!("=== commute: transportable itineraries ===");

    // 1. Network and timetable.
    let corridor = build_corridor(settings.sim.tick_duration_secs, 2 * 3_600)?;
    println!(
        "Network: {} nodes, {} edges, {} stops, {} lines",
        corridor.network.node_count(),
        corridor.network.edge_count(),
        corridor.network.stops.len(),
        corridor.schedule.len()
    );

    // 2. Population.
    let population = build_population(&corridor);
    println!("Transportables: {}", population.len());

    // 3. Sim.
    let Corridor { network, schedule, .. } = corridor;
    let mut sim = SimBuilder::new(settings.sim.clone(), network, population, ScheduleRouter::new(settings.router.clone()))
        .schedule(schedule)
        .build()?;

    // 4. Output.
    let writer = CsvWriter::new(&settings.output_dir)?;
    let mut obs = StageOutputObserver::new(writer, &settings.sim, settings.route_lengths);

    // 5. Run.
    let t0 = Instant::now();
    sim.run(&mut obs)?;
    let elapsed = t0.elapsed();
    if let Some(e) = obs.take_error() {
        eprintln!("output error: {e}");
    }

    // 6. Summary.
    println!("Simulation complete in {:.3} s at {}", elapsed.as_secs_f64(), sim.clock);
    println!("  reports written to {} ({} itineraries)", settings.output_dir.display(), obs.reported());
    println!();
    println!("{:<10} {:<9} {:<8} {}", "Agent", "Kind", "Status", "Last stage");
    println!("{}", "-".repeat(72));
    let ctx = sim.context();
    for agent in &sim.population.agents {
        let status = if agent.itinerary.is_aborted() { "aborted" } else { "done" };
        let last = agent
            .itinerary
            .stages()
            .iter()
            .rev()
            .find(|s| s.arrived().is_some())
            .map(|s| s.summary(ctx.network, agent.kind))
            .unwrap_or_default();
        println!("{:<10} {:<9} {:<8} {}", agent.name, agent.kind.to_string(), status, last);
    }

    Ok(())
}

//! Tests for tp-output.

#[cfg(test)]
mod helpers {
    use tp_core::{ModeSet, Position, SimConfig, Tick, TransportableKind, VehicleClass};
    use tp_network::{NetworkBuilder, TransitLine, TransitSchedule};
    use tp_sim::{Population, Sim, SimBuilder};
    use tp_stage::{RouteRecord, RouterConfig, ScheduleRouter, TripInfoRecord, TripStage};

    use crate::{OutputResult, OutputWriter, TickSummaryRow};

    pub fn config() -> SimConfig {
        SimConfig { start_unix_secs: 1_000, tick_duration_secs: 1, total_ticks: 200, seed: 42 }
    }

    /// One person riding bus line `17` from s0 to s2 along a 300 m corridor.
    pub fn bus_sim() -> Sim<ScheduleRouter> {
        let mut b = NetworkBuilder::new();
        let n: Vec<_> = (0..4).map(|i| b.add_node(Position::new(i as f64 * 100.0, 0.0))).collect();
        let (e0, _) = b.add_road("e0", n[0], n[1], 1, 10.0, ModeSet::ALL);
        let (e1, _) = b.add_road("e1", n[1], n[2], 1, 10.0, ModeSet::ALL);
        let (e2, _) = b.add_road("e2", n[2], n[3], 1, 10.0, ModeSet::ALL);
        let s0 = b.add_stop("s0", e0, 10.0, 30.0);
        let s1 = b.add_stop("s1", e1, 40.0, 60.0);
        let s2 = b.add_stop("s2", e2, 70.0, 90.0);
        let net = b.build();

        let mut sched = TransitSchedule::new();
        sched
            .add_line(&net, 1, TransitLine {
                name:        "17".into(),
                class:       VehicleClass::Bus,
                stops:       vec![s0, s1, s2],
                route:       vec![e0, e1, e2],
                speed:       10.0,
                departures:  vec![Tick(20)],
                dwell_ticks: 5,
                capacity:    40,
            })
            .unwrap();

        let mut pop = Population::new();
        let trip = TripStage::new(&net, e0, e2).to_stop(&net, s2).with_modes(ModeSet::PUBLIC);
        pop.add("p0", TransportableKind::Person, Tick(0), e0, 0.0, vec![trip.into()]);

        SimBuilder::new(config(), net, pop, ScheduleRouter::new(RouterConfig::default()))
            .schedule(sched)
            .build()
            .unwrap()
    }

    /// Keeps everything in memory.
    #[derive(Default)]
    pub struct MemoryWriter {
        pub trip_infos: Vec<TripInfoRecord>,
        pub routes:     Vec<RouteRecord>,
        pub summaries:  Vec<TickSummaryRow>,
        pub finished:   usize,
    }

    impl OutputWriter for MemoryWriter {
        fn write_trip_infos(&mut self, rows: &[TripInfoRecord]) -> OutputResult<()> {
            self.trip_infos.extend_from_slice(rows);
            Ok(())
        }

        fn write_routes(&mut self, rows: &[RouteRecord]) -> OutputResult<()> {
            self.routes.extend_from_slice(rows);
            Ok(())
        }

        fn write_tick_summary(&mut self, row: &TickSummaryRow) -> OutputResult<()> {
            self.summaries.push(row.clone());
            Ok(())
        }

        fn finish(&mut self) -> OutputResult<()> {
            self.finished += 1;
            Ok(())
        }
    }
}

// ── StageOutputObserver ───────────────────────────────────────────────────────

#[cfg(test)]
mod observer {
    use tp_core::Tick;

    use super::helpers::*;
    use crate::{OutputError, OutputResult, OutputWriter, StageOutputObserver, TickSummaryRow};

    #[test]
    fn reports_each_itinerary_once() {
        let mut sim = bus_sim();
        let mut obs = StageOutputObserver::new(MemoryWriter::default(), &config(), true);
        sim.run(&mut obs).unwrap();
        assert!(obs.take_error().is_none());
        assert_eq!(obs.reported(), 1);

        let w = obs.into_writer();
        let elements: Vec<_> = w.trip_infos.iter().map(|r| r.element).collect();
        assert_eq!(elements, vec!["walk", "ride"]);
        let ride = &w.trip_infos[1];
        assert_eq!(ride.agent, "p0");
        assert_eq!(ride.vehicle, "17.0");
        assert_eq!(ride.depart, Some(Tick(22)));
        assert_eq!(ride.arrival, Some(Tick(58)));
        assert_eq!(ride.waiting_time, 7);
        assert!((ride.route_length - 260.0).abs() < 1e-9);

        let planned: Vec<_> = w.routes.iter().map(|r| r.element).collect();
        assert_eq!(planned, vec!["trip", "walk", "ride"]);
        assert_eq!(w.finished, 1);
    }

    #[test]
    fn tick_summaries_carry_wall_clock_time() {
        let mut sim = bus_sim();
        let mut obs = StageOutputObserver::new(MemoryWriter::default(), &config(), false);
        sim.run(&mut obs).unwrap();
        let w = obs.into_writer();
        // The run stops after tick 58, when the only itinerary ended.
        assert_eq!(w.summaries.len(), 59);
        assert_eq!(w.summaries[10], TickSummaryRow { tick: 10, unix_time_secs: 1_010, woken_agents: 0 });
        assert_eq!(w.summaries[15].woken_agents, 1);
    }

    struct FailingWriter;

    impl OutputWriter for FailingWriter {
        fn write_trip_infos(&mut self, _rows: &[tp_stage::TripInfoRecord]) -> OutputResult<()> {
            Err(OutputError::Io(std::io::Error::other("disk full")))
        }
        fn write_routes(&mut self, _rows: &[tp_stage::RouteRecord]) -> OutputResult<()> {
            Ok(())
        }
        fn write_tick_summary(&mut self, _row: &TickSummaryRow) -> OutputResult<()> {
            Ok(())
        }
        fn finish(&mut self) -> OutputResult<()> {
            Ok(())
        }
    }

    #[test]
    fn write_errors_are_kept_for_later() {
        let mut sim = bus_sim();
        let mut obs = StageOutputObserver::new(FailingWriter, &config(), false);
        sim.run(&mut obs).unwrap();
        assert!(matches!(obs.take_error(), Some(OutputError::Io(_))));
        assert!(obs.take_error().is_none());
    }
}

// ── CsvWriter ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod csv_writer {
    use super::helpers::*;
    use crate::{CsvWriter, StageOutputObserver};

    #[test]
    fn writes_three_files_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut sim = bus_sim();
        let mut obs = StageOutputObserver::new(CsvWriter::new(&out).unwrap(), &config(), true);
        sim.run(&mut obs).unwrap();
        assert!(obs.take_error().is_none());

        let mut rdr = csv::Reader::from_path(out.join("tripinfo.csv")).unwrap();
        assert_eq!(rdr.headers().unwrap().get(0), Some("agent"));
        let rows: Vec<csv::StringRecord> = rdr.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get(1), Some("ride"));
        assert_eq!(rows[1].get(9), Some("260.00"));
        assert_eq!(rows[1].get(13), Some("bus"));

        let routes = std::fs::read_to_string(out.join("routes.csv")).unwrap();
        assert_eq!(routes.lines().count(), 4);
        assert!(routes.lines().nth(1).unwrap().starts_with("p0,trip,e0 e2,s2,"));

        let summaries = std::fs::read_to_string(out.join("tick_summaries.csv")).unwrap();
        assert_eq!(summaries.lines().next(), Some("tick,unix_time_secs,woken_agents"));
    }
}

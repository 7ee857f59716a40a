//! Unit tests for tp-stage.
//!
//! Every test runs against the same three-edge bus corridor; vehicles are
//! plain structs implementing `TransportVehicle`, moved by hand.

#[cfg(test)]
mod helpers {
    use tp_core::{
        AgentId, AgentRng, EdgeId, ModeSet, Position, StopId, Tick, TransportableKind, VehicleClass, VehicleId,
    };
    use tp_network::{Network, NetworkBuilder, TransitLine, TransitSchedule};

    use crate::{AgentRef, RouterConfig, ScheduleRouter, StageContext, TransportVehicle, Traveller, VehicleLookup};

    /// ```text
    ///   n0 ──e0── n1 ──e1── n2 ──e2── n3          n4 ──island── n5
    ///      s0@20      s1@50      s2@80
    /// ```
    ///
    /// Roads are 100 m, both directions, open to every mode.  Line `17`
    /// serves s0, s1, s2 at 10 m/s with a 5-tick dwell, departing at 20 and
    /// 600.  The island is unreachable from the corridor.
    pub struct Fixture {
        pub net:    Network,
        pub sched:  TransitSchedule,
        pub router: ScheduleRouter,
        pub e:      [EdgeId; 3],
        pub s:      [StopId; 3],
        pub island: EdgeId,
    }

    pub fn fixture() -> Fixture {
        fixture_with(false)
    }

    pub fn fixture_with(lefthand: bool) -> Fixture {
        let mut b = NetworkBuilder::new().lefthand(lefthand);
        let n: Vec<_> = (0..4).map(|i| b.add_node(Position::new(i as f64 * 100.0, 0.0))).collect();
        let (e0, _) = b.add_road("e0", n[0], n[1], 1, 10.0, ModeSet::ALL);
        let (e1, _) = b.add_road("e1", n[1], n[2], 1, 10.0, ModeSet::ALL);
        let (e2, _) = b.add_road("e2", n[2], n[3], 1, 10.0, ModeSet::ALL);
        let far_a = b.add_node(Position::new(5_000.0, 5_000.0));
        let far_b = b.add_node(Position::new(5_100.0, 5_000.0));
        let island = b.add_edge("island", far_a, far_b, 1, 10.0, ModeSet::ALL);
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
                departures:  vec![Tick(20), Tick(600)],
                dwell_ticks: 5,
                capacity:    40,
            })
            .unwrap();

        Fixture {
            net,
            sched,
            router: ScheduleRouter::new(RouterConfig::default()),
            e: [e0, e1, e2],
            s: [s0, s1, s2],
            island,
        }
    }

    impl Fixture {
        pub fn ctx<'a>(&'a self, vehicles: &'a dyn VehicleLookup) -> StageContext<'a> {
            StageContext {
                network:            &self.net,
                schedule:           &self.sched,
                vehicles,
                router:             &self.router,
                tick_duration_secs: 1,
            }
        }
    }

    pub const PERSON: AgentRef<'static> = AgentRef { id: AgentId(0), name: "p0", kind: TransportableKind::Person };

    pub fn rng() -> AgentRng {
        AgentRng::new(42, AgentId(0))
    }

    pub fn traveller(rng: &mut AgentRng) -> Traveller<'_> {
        Traveller { agent: PERSON, rng }
    }

    #[derive(Clone, Debug)]
    pub struct FakeVehicle {
        pub id:       VehicleId,
        pub name:     String,
        pub line:     String,
        pub class:    VehicleClass,
        pub odometer: f64,
        pub edge:     EdgeId,
        pub edge_pos: f64,
        pub position: Position,
        pub speed:    f64,
        pub stops:    Vec<StopId>,
        pub edges:    Vec<EdgeId>,
    }

    impl FakeVehicle {
        pub fn bus(fx: &Fixture, id: u32, line: &str) -> Self {
            Self {
                id:       VehicleId(id),
                name:     format!("{line}.0"),
                line:     line.to_owned(),
                class:    VehicleClass::Bus,
                odometer: 20.0,
                edge:     fx.e[0],
                edge_pos: 20.0,
                position: Position::new(20.0, -1.6),
                speed:    0.0,
                stops:    fx.s.to_vec(),
                edges:    fx.e.to_vec(),
            }
        }
    }

    impl TransportVehicle for FakeVehicle {
        fn id(&self) -> VehicleId { self.id }
        fn name(&self) -> &str { &self.name }
        fn line(&self) -> &str { &self.line }
        fn vehicle_class(&self) -> VehicleClass { self.class }
        fn odometer(&self) -> f64 { self.odometer }
        fn position(&self) -> Position { self.position }
        fn angle(&self) -> f64 { 0.0 }
        fn edge(&self) -> EdgeId { self.edge }
        fn edge_pos(&self) -> f64 { self.edge_pos }
        fn speed(&self) -> f64 { self.speed }
        fn stops_at(&self, stop: StopId) -> bool { self.stops.contains(&stop) }
        fn stops_at_edge(&self, edge: EdgeId) -> bool { self.edges.contains(&edge) }
    }

    #[derive(Default)]
    pub struct FakeFleet(pub Vec<FakeVehicle>);

    impl VehicleLookup for FakeFleet {
        fn vehicle(&self, id: VehicleId) -> Option<&dyn TransportVehicle> {
            self.0.iter().find(|v| v.id == id).map(|v| v as &dyn TransportVehicle)
        }
    }

    pub fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }
}

// ── WaitingStage ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod waiting {
    use std::f64::consts::FRAC_PI_2;

    use tp_core::{Tick, TransportableKind};

    use super::helpers::*;
    use crate::{NoVehicles, Stage, StageError, StageType, Transition, WaitingStage};

    fn activate(stage: &mut Stage, fx: &Fixture, now: Tick) -> Transition {
        let mut rng = rng();
        stage.proceed(&fx.ctx(&NoVehicles), &mut traveller(&mut rng), now, None).unwrap()
    }

    #[test]
    fn duration_counts_from_departure() {
        let fx = fixture();
        let mut stage: Stage = WaitingStage::new(fx.e[0], 50.0, 50, None, "work").into();
        assert!(matches!(activate(&mut stage, &fx, Tick(100)), Transition::CompleteAt(Tick(150))));
        assert_eq!(stage.departed(), Some(Tick(100)));
        assert_eq!(stage.scheduled_completion(), Some(Tick(150)));
    }

    #[test]
    fn later_bound_wins() {
        let fx = fixture();
        let mut late: Stage = WaitingStage::new(fx.e[0], 50.0, 50, Some(Tick(500)), "work").into();
        assert!(matches!(activate(&mut late, &fx, Tick(100)), Transition::CompleteAt(Tick(500))));

        let mut early: Stage = WaitingStage::new(fx.e[0], 50.0, 50, Some(Tick(120)), "work").into();
        assert!(matches!(activate(&mut early, &fx, Tick(100)), Transition::CompleteAt(Tick(150))));
    }

    #[test]
    fn stands_beside_the_road() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let mut stage: Stage = WaitingStage::new(fx.e[0], 50.0, 50, None, "work").into();
        activate(&mut stage, &fx, Tick(100));

        // Lane centre is 1.6 m right of the edge, plus the 3 m roadside offset.
        let p = stage.position(Tick(100), &ctx).unwrap();
        assert!(close(p.x, 50.0));
        assert!(close(p.y, -4.6));
        assert_eq!(stage.position(Tick(149), &ctx).unwrap(), p);
        assert!(close(stage.angle(Tick(120), &ctx).unwrap(), FRAC_PI_2));
    }

    #[test]
    fn lefthand_mirrors_the_roadside() {
        let fx = fixture_with(true);
        let ctx = fx.ctx(&NoVehicles);
        let mut stage: Stage = WaitingStage::new(fx.e[0], 50.0, 10, None, "").into();
        activate(&mut stage, &fx, Tick(0));
        let p = stage.position(Tick(0), &ctx).unwrap();
        assert!(close(p.y, 4.6));
        assert!(close(stage.angle(Tick(0), &ctx).unwrap(), -FRAC_PI_2));
    }

    #[test]
    fn waiting_at_a_stop() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let mut stage: Stage = WaitingStage::new(fx.e[1], 0.0, 10, None, "").at_stop(fx.s[1], &fx.net).into();
        assert_eq!(stage.destination_stop(), Some(fx.s[1]));
        assert!(close(stage.arrival_pos(), 50.0));
        activate(&mut stage, &fx, Tick(0));
        let p = stage.position(Tick(5), &ctx).unwrap();
        assert!(close(p.x, 150.0));
        assert!(close(p.y, -4.6));
        assert_eq!(stage.summary(&fx.net, TransportableKind::Person), "waiting at stop 's1' duration=10");
    }

    #[test]
    fn queries_before_departure_fail() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let mut stage: Stage = WaitingStage::new(fx.e[0], 50.0, 50, None, "work").into();
        activate(&mut stage, &fx, Tick(100));
        let err = stage.position(Tick(99), &ctx).unwrap_err();
        assert!(matches!(err, StageError::BeforeDeparture { now: Tick(99), departed: Tick(100) }));
        assert!(err.is_precondition());
        assert!(stage.angle(Tick(50), &ctx).is_err());
        assert!(stage.edge_pos(Tick(50), &ctx).is_err());
    }

    #[test]
    fn waiting_time_while_active() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let mut stage: Stage = WaitingStage::new(fx.e[0], 50.0, 50, None, "work").into();
        assert_eq!(stage.waiting_time(Tick(100)), 0);
        activate(&mut stage, &fx, Tick(100));
        assert_eq!(stage.waiting_time(Tick(130)), 30);
        stage.set_arrived(&ctx, Tick(150)).unwrap();
        assert_eq!(stage.waiting_time(Tick(160)), 0);
        assert_eq!(stage.distance(), 0.0);
    }

    #[test]
    fn second_arrival_is_rejected() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let mut stage: Stage = WaitingStage::new(fx.e[0], 50.0, 50, None, "work").into();
        activate(&mut stage, &fx, Tick(100));
        assert_eq!(stage.set_arrived(&ctx, Tick(150)).unwrap(), "");
        let err = stage.set_arrived(&ctx, Tick(151)).unwrap_err();
        assert!(matches!(err, StageError::DoubleArrival { arrived: Tick(150), now: Tick(151) }));
        assert_eq!(stage.arrived(), Some(Tick(150)));
    }

    #[test]
    fn arrival_needs_departure() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let mut stage: Stage = WaitingStage::new(fx.e[0], 50.0, 50, None, "work").into();
        assert!(matches!(stage.set_arrived(&ctx, Tick(5)), Err(StageError::Precondition(_))));

        activate(&mut stage, &fx, Tick(10));
        assert!(matches!(stage.set_arrived(&ctx, Tick(5)), Err(StageError::BeforeDeparture { .. })));
    }

    #[test]
    fn abort_cancels_completion() {
        let fx = fixture();
        let mut stage: Stage = WaitingStage::new(fx.e[0], 50.0, 50, None, "work").into();
        activate(&mut stage, &fx, Tick(0));
        stage.abort();
        assert_eq!(stage.scheduled_completion(), None);
    }

    #[test]
    fn initial_wait_is_tagged() {
        let fx = fixture();
        let stage: Stage = WaitingStage::initial(fx.e[0], 0.0, Tick(30)).into();
        assert_eq!(stage.stage_type(), StageType::WaitingForDepart);
        assert_eq!(stage.stage_type().to_string(), "waiting_for_depart");
        assert_eq!(stage.description(TransportableKind::Person), "waiting (awaiting departure)");
    }
}

// ── DrivingStage ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod driving {
    use tp_core::{Position, Tick, TransportableKind, VehicleClass};

    use super::helpers::*;
    use crate::{
        DrivingStage, NoVehicles, RecordBuffer, RideState, Stage, StageError, Transition, WaitingStage, ANY_LINE,
    };

    /// A wait at s0 that ended at tick 10, followed by `ride` activated at 10.
    fn waiting_ride(fx: &Fixture, ride: DrivingStage) -> (Stage, Stage) {
        let ctx = fx.ctx(&NoVehicles);
        let mut rng = rng();
        let mut prev: Stage = WaitingStage::new(fx.e[0], 0.0, 10, None, "").at_stop(fx.s[0], &fx.net).into();
        prev.proceed(&ctx, &mut traveller(&mut rng), Tick(0), None).unwrap();
        prev.set_arrived(&ctx, Tick(10)).unwrap();

        let mut ride: Stage = ride.into();
        let t = ride.proceed(&ctx, &mut traveller(&mut rng), Tick(10), Some(&prev)).unwrap();
        assert!(matches!(t, Transition::AwaitVehicle { edge, stop: Some(stop) } if edge == fx.e[0] && stop == fx.s[0]));
        (prev, ride)
    }

    fn line_17(fx: &Fixture) -> DrivingStage {
        DrivingStage::new(fx.e[2], Some(fx.s[2]), 80.0, ["17"])
    }

    #[test]
    fn matches_by_line_or_vehicle_id() {
        let fx = fixture();
        let (_, ride) = waiting_ride(&fx, line_17(&fx));
        assert!(ride.is_waiting_for_vehicle());
        assert!(ride.is_waiting_for(&FakeVehicle::bus(&fx, 0, "17")));
        assert!(!ride.is_waiting_for(&FakeVehicle::bus(&fx, 1, "42")));

        let (_, by_id) = waiting_ride(&fx, DrivingStage::new(fx.e[2], Some(fx.s[2]), 80.0, ["42.0"]));
        assert!(by_id.is_waiting_for(&FakeVehicle::bus(&fx, 1, "42")));
    }

    #[test]
    fn any_line_needs_a_halt_at_the_destination() {
        let fx = fixture();
        let (_, ride) = waiting_ride(&fx, DrivingStage::new(fx.e[2], Some(fx.s[2]), 80.0, [ANY_LINE]));
        let mut bus = FakeVehicle::bus(&fx, 0, "42");
        assert!(ride.is_waiting_for(&bus));
        bus.stops = vec![fx.s[0], fx.s[1]];
        assert!(!ride.is_waiting_for(&bus));

        let (_, to_edge) = waiting_ride(&fx, DrivingStage::new(fx.e[1], None, 100.0, [ANY_LINE]));
        assert!(to_edge.is_waiting_for(&bus));
        bus.edges = vec![fx.e[0]];
        assert!(!to_edge.is_waiting_for(&bus));
    }

    #[test]
    fn not_waiting_before_proceed() {
        let fx = fixture();
        let ride: Stage = line_17(&fx).into();
        assert!(!ride.is_waiting_for(&FakeVehicle::bus(&fx, 0, "17")));
    }

    #[test]
    fn proceed_needs_a_previous_stage() {
        let fx = fixture();
        let mut rng = rng();
        let mut ride: Stage = line_17(&fx).into();
        let err = ride
            .proceed(&fx.ctx(&NoVehicles), &mut traveller(&mut rng), Tick(0), None)
            .unwrap_err();
        assert!(matches!(err, StageError::Precondition(_)));
        assert_eq!(ride.departed(), None);
    }

    #[test]
    fn boarding_changes_state() {
        let fx = fixture();
        let (_, mut ride) = waiting_ride(&fx, line_17(&fx));
        let bus = FakeVehicle::bus(&fx, 3, "17");
        let d = ride.as_driving_mut().unwrap();
        d.set_vehicle(&bus, Tick(22)).unwrap();
        assert_eq!(d.state(), RideState::Aboard);
        assert!(matches!(d.set_vehicle(&bus, Tick(23)), Err(StageError::Precondition(_))));

        assert!(!ride.is_waiting_for(&bus));
        assert!(!ride.is_waiting_for_vehicle());
        assert_eq!(ride.vehicle(), Some(bus.id));
    }

    #[test]
    fn distance_comes_from_the_odometer_and_survives_the_vehicle() {
        let fx = fixture();
        let (_, mut ride) = waiting_ride(&fx, line_17(&fx));
        let mut bus = FakeVehicle::bus(&fx, 3, "17");
        ride.as_driving_mut().unwrap().set_vehicle(&bus, Tick(22)).unwrap();

        bus.odometer = 280.0;
        bus.edge = fx.e[2];
        bus.edge_pos = 80.0;
        bus.speed = 0.0;
        let fleet = FakeFleet(vec![bus]);
        let ctx = fx.ctx(&fleet);
        assert_eq!(ride.edge(Tick(58), &ctx), fx.e[2]);
        assert_eq!(ride.set_arrived(&ctx, Tick(58)).unwrap(), "");

        // The vehicle may leave; the cached fields stay.
        let ctx = fx.ctx(&NoVehicles);
        assert!(close(ride.distance(), 260.0));
        assert_eq!(ride.vehicle(), None);
        let d = ride.as_driving().unwrap();
        assert_eq!(d.vehicle_name(), "17.0");
        assert_eq!(d.vehicle_line(), "17");
        assert_eq!(d.vehicle_class(), Some(VehicleClass::Bus));
        assert_eq!(d.state(), RideState::Done);

        let mut out = RecordBuffer::new();
        ride.trip_info_output(&mut out, &PERSON, &ctx);
        let rec = &out.trip_infos[0];
        assert_eq!(rec.element, "ride");
        assert_eq!(rec.depart, Some(Tick(22)));
        assert_eq!(rec.waiting_time, 12);
        assert_eq!(rec.vehicle, "17.0");
        assert_eq!(rec.to_stop, "s2");
        assert!(close(rec.route_length, 260.0));
    }

    #[test]
    fn missed_ride_is_a_diagnostic() {
        let fx = fixture();
        let (_, mut ride) = waiting_ride(&fx, line_17(&fx));
        let ctx = fx.ctx(&NoVehicles);
        assert_eq!(ride.waiting_time(Tick(40)), 30);
        let msg = ride.set_arrived(&ctx, Tick(100)).unwrap();
        assert!(msg.contains("no vehicle arrived for lines '17'"), "{msg}");
        assert!(msg.contains("s0"), "{msg}");
        assert_eq!(ride.distance(), 0.0);
    }

    #[test]
    fn vanished_vehicle_is_a_diagnostic() {
        let fx = fixture();
        let (_, mut ride) = waiting_ride(&fx, line_17(&fx));
        ride.as_driving_mut().unwrap().set_vehicle(&FakeVehicle::bus(&fx, 3, "17"), Tick(22)).unwrap();
        let msg = ride.set_arrived(&fx.ctx(&NoVehicles), Tick(58)).unwrap();
        assert!(!msg.is_empty());
        assert_eq!(ride.distance(), 0.0);
        assert_eq!(ride.as_driving().unwrap().vehicle_line(), "17");
    }

    #[test]
    fn position_follows_the_vehicle_once_aboard() {
        let fx = fixture();
        let (_, mut ride) = waiting_ride(&fx, line_17(&fx));
        let ctx = fx.ctx(&NoVehicles);
        let waiting = ride.position(Tick(15), &ctx).unwrap();
        assert!(close(waiting.x, 20.0));
        assert!(close(waiting.y, -4.6));
        assert!(close(ride.edge_pos(Tick(15), &ctx).unwrap(), 20.0));

        let mut bus = FakeVehicle::bus(&fx, 3, "17");
        ride.as_driving_mut().unwrap().set_vehicle(&bus, Tick(22)).unwrap();
        bus.position = Position::new(120.0, -1.6);
        bus.speed = 10.0;
        let fleet = FakeFleet(vec![bus]);
        let ctx = fx.ctx(&fleet);
        assert_eq!(ride.position(Tick(30), &ctx).unwrap(), Position::new(120.0, -1.6));
        assert!(close(ride.speed(&ctx), 10.0));
    }

    #[test]
    fn abort_releases_the_vehicle() {
        let fx = fixture();
        let (_, mut ride) = waiting_ride(&fx, line_17(&fx));
        ride.as_driving_mut().unwrap().set_vehicle(&FakeVehicle::bus(&fx, 3, "17"), Tick(22)).unwrap();
        ride.abort();
        assert_eq!(ride.vehicle(), None);
        assert_eq!(ride.as_driving().unwrap().state(), RideState::Aborted);
    }

    #[test]
    fn descriptions() {
        let fx = fixture();
        let (_, ride) = waiting_ride(&fx, line_17(&fx));
        assert_eq!(ride.description(TransportableKind::Person), "driving");
        assert_eq!(ride.description(TransportableKind::Container), "transport");
        assert_eq!(ride.edges(), vec![fx.e[0], fx.e[2]]);
        let d = ride.as_driving().unwrap();
        assert_eq!(d.waiting_description(&fx.net), "waiting for 17 at stop 's0'");
        assert_eq!(
            ride.summary(&fx.net, TransportableKind::Person),
            "driving to stop 's2' (edge 'e2') with lines '17'"
        );
    }
}

// ── TripStage ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod trip {
    use tp_core::{ModeSet, Tick};

    use super::helpers::*;
    use crate::{
        Activation, DepartPos, Itinerary, NoVehicles, RecordBuffer, Stage, StageError, StageType, TripStage,
        WaitingStage,
    };

    fn itinerary(fx: &Fixture, trip: TripStage, depart: Tick) -> Itinerary {
        Itinerary::new(vec![WaitingStage::initial(fx.e[0], 0.0, depart).into(), trip.into()])
    }

    #[test]
    fn distance_is_undetermined() {
        let fx = fixture();
        let trip: Stage = TripStage::new(&fx.net, fx.e[0], fx.e[2]).into();
        assert_eq!(trip.distance(), -1.0);
        assert_eq!(trip.description(tp_core::TransportableKind::Person), "trip");
    }

    #[test]
    fn walk_only_resolution() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let mut rng = rng();
        let trip = TripStage::new(&fx.net, fx.e[0], fx.e[2]).with_modes(ModeSet::WALK);
        let mut it = itinerary(&fx, trip, Tick(10));

        let adv = it.start(&ctx, &mut traveller(&mut rng), Tick(0)).unwrap();
        assert_eq!(adv.activation, Activation::CompleteAt(Tick(10)));

        // 300 m at 1.39 m/s → 216 ticks.
        let adv = it.advance(&ctx, &mut traveller(&mut rng), Tick(10)).unwrap();
        assert_eq!(adv.activation, Activation::CompleteAt(Tick(226)));
        assert!(adv.vehicles.is_empty());
        assert_eq!(it.len(), 3);
        assert_eq!(it.stages()[1].arrived(), Some(Tick(10)));
        let walk = it.current_stage().unwrap();
        assert_eq!(walk.stage_type(), StageType::Walking);
        assert_eq!(walk.edges(), fx.e.to_vec());
        assert!(close(walk.distance(), 300.0));

        // Halfway through the walk the agent is on the middle edge.
        assert_eq!(walk.edge(Tick(118), &ctx), fx.e[1]);
        let adv = it.advance(&ctx, &mut traveller(&mut rng), Tick(226)).unwrap();
        assert_eq!(adv.activation, Activation::Finished);
        assert!(it.is_finished());
    }

    #[test]
    fn unroutable_leaves_the_itinerary_untouched() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let mut rng = rng();
        let trip = TripStage::new(&fx.net, fx.e[0], fx.island).with_modes(ModeSet::WALK | ModeSet::PUBLIC);
        let mut it = itinerary(&fx, trip, Tick(0));

        let err = it.start(&ctx, &mut traveller(&mut rng), Tick(0)).unwrap_err();
        match err {
            StageError::Unroutable(u) => {
                assert_eq!(u.from, "e0");
                assert_eq!(u.to, "island");
                assert_eq!(u.agent, "p0");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(it.len(), 2);
        assert_eq!(it.current_index(), 1);
        assert_eq!(it.current_stage().unwrap().departed(), None);
        assert_eq!(it.current_stage().unwrap().stage_type(), StageType::Trip);
    }

    #[test]
    fn failed_trip_resolves_on_resume() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let mut rng = rng();
        let trip = TripStage::new(&fx.net, fx.e[0], fx.island).with_modes(ModeSet::WALK);
        let mut it = itinerary(&fx, trip, Tick(0));
        assert!(it.start(&ctx, &mut traveller(&mut rng), Tick(0)).is_err());
        assert!(it.start(&ctx, &mut traveller(&mut rng), Tick(5)).is_err());

        it.current_stage_mut().unwrap().set_destination(fx.e[2], None);
        let adv = it.resume(&ctx, &mut traveller(&mut rng), Tick(5)).unwrap();
        assert!(matches!(adv.activation, Activation::CompleteAt(t) if t > Tick(5)));
        let kinds: Vec<_> = it.stages().iter().map(|s| s.stage_type()).collect();
        assert_eq!(kinds, vec![StageType::WaitingForDepart, StageType::Trip, StageType::Walking]);
        assert_eq!(it.stages()[1].departed(), Some(Tick(5)));
        assert_eq!(it.stages()[1].arrived(), Some(Tick(5)));
        assert_eq!(it.stages()[2].departed(), Some(Tick(5)));
        assert_eq!(it.current_index(), 2);

        // The walk is under way; there is nothing left to retry.
        assert!(matches!(
            it.resume(&ctx, &mut traveller(&mut rng), Tick(6)),
            Err(StageError::Precondition(_))
        ));
    }

    #[test]
    fn random_depart_pos_is_deterministic() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let resolve = || {
            let mut rng = rng();
            let trip = TripStage::new(&fx.net, fx.e[0], fx.e[2])
                .with_modes(ModeSet::WALK)
                .with_depart_pos(DepartPos::Random);
            let mut it = itinerary(&fx, trip, Tick(0));
            it.start(&ctx, &mut traveller(&mut rng), Tick(0)).unwrap();
            match &it.stages()[1] {
                Stage::Trip(t) => t.resolved_depart_pos,
                other => panic!("unexpected stage {other:?}"),
            }
        };
        let first = resolve();
        assert!((0.0..=100.0).contains(&first));
        assert_eq!(first, resolve());
    }

    #[test]
    fn car_plan_requests_a_vehicle() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let mut rng = rng();
        let trip = TripStage::new(&fx.net, fx.e[0], fx.e[2]).with_modes(ModeSet::CAR);
        let mut it = itinerary(&fx, trip, Tick(0));

        let adv = it.start(&ctx, &mut traveller(&mut rng), Tick(0)).unwrap();
        assert_eq!(adv.activation, Activation::AwaitVehicle { edge: fx.e[0], stop: None });
        assert_eq!(adv.vehicles.len(), 1);
        let car = &adv.vehicles[0];
        assert_eq!(car.name, "p0_car");
        assert_eq!(car.route, fx.e.to_vec());
        let ride = it.current_stage().unwrap().as_driving().unwrap();
        assert!(ride.lines().contains("p0_car"));
    }

    #[test]
    fn clones_are_independent() {
        let fx = fixture();
        let original: Stage = TripStage::new(&fx.net, fx.e[0], fx.e[2]).into();
        let mut copy = original.clone();
        copy.core_mut().set_times(Some(Tick(5)), Some(Tick(9)));
        copy.set_destination(fx.e[1], None);
        assert_eq!(original.departed(), None);
        assert_eq!(original.arrived(), None);
        assert_eq!(original.destination(), fx.e[2]);
        assert_eq!(copy.departed(), Some(Tick(5)));
    }

    #[test]
    fn route_output_names_the_request() {
        let fx = fixture();
        let trip: Stage = TripStage::new(&fx.net, fx.e[0], fx.e[2])
            .with_modes(ModeSet::WALK | ModeSet::PUBLIC)
            .into();
        let mut out = RecordBuffer::new();
        trip.route_output(&mut out, &PERSON, true, &fx.ctx(&NoVehicles));
        trip.trip_info_output(&mut out, &PERSON, &fx.ctx(&NoVehicles));
        assert!(out.trip_infos.is_empty());
        let rec = &out.routes[0];
        assert_eq!(rec.element, "trip");
        assert_eq!(rec.edges, vec!["e0".to_owned(), "e2".to_owned()]);
        assert_eq!(rec.modes, "walk public");
    }
}

// ── Itinerary ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod itinerary {
    use tp_core::{ModeSet, Tick};

    use super::helpers::*;
    use crate::{Activation, Itinerary, NoVehicles, RecordBuffer, StageType, TripStage, WaitingStage};

    /// Walk to s0, ride line 17 to s2.
    #[test]
    fn trip_by_bus_end_to_end() {
        let fx = fixture();
        let mut rng = rng();
        let trip = TripStage::new(&fx.net, fx.e[0], fx.e[2])
            .to_stop(&fx.net, fx.s[2])
            .with_modes(ModeSet::WALK | ModeSet::PUBLIC);
        let mut it = Itinerary::new(vec![WaitingStage::initial(fx.e[0], 0.0, Tick(0)).into(), trip.into()]);

        let ctx = fx.ctx(&NoVehicles);
        // 20 m to the stop at 1.39 m/s → 15 ticks.
        let adv = it.start(&ctx, &mut traveller(&mut rng), Tick(0)).unwrap();
        assert_eq!(adv.activation, Activation::CompleteAt(Tick(15)));
        let kinds: Vec<_> = it.stages().iter().map(|s| s.stage_type()).collect();
        assert_eq!(
            kinds,
            vec![StageType::WaitingForDepart, StageType::Trip, StageType::Walking, StageType::Driving]
        );
        let planned = it.stages()[3].as_driving().unwrap();
        assert_eq!(planned.intended_vehicle(), "17.0");
        assert_eq!(planned.intended_depart(), Some(Tick(22)));

        let adv = it.advance(&ctx, &mut traveller(&mut rng), Tick(15)).unwrap();
        assert_eq!(adv.activation, Activation::AwaitVehicle { edge: fx.e[0], stop: Some(fx.s[0]) });

        // Line 42 comes by first and is ignored; line 17 is taken.
        let other = FakeVehicle::bus(&fx, 0, "42");
        let mut bus = FakeVehicle::bus(&fx, 1, "17");
        let ride = it.current_stage_mut().unwrap();
        assert!(!ride.is_waiting_for(&other));
        assert!(ride.is_waiting_for(&bus));
        ride.as_driving_mut().unwrap().set_vehicle(&bus, Tick(22)).unwrap();
        assert!(!ride.is_waiting_for_vehicle());

        bus.odometer = 280.0;
        bus.edge = fx.e[2];
        bus.edge_pos = 80.0;
        let fleet = FakeFleet(vec![bus]);
        let ctx = fx.ctx(&fleet);
        let adv = it.advance(&ctx, &mut traveller(&mut rng), Tick(58)).unwrap();
        assert_eq!(adv.activation, Activation::Finished);
        assert!(adv.diagnostics.is_empty());
        assert!(close(it.stages()[3].distance(), 260.0));

        let mut out = RecordBuffer::new();
        for stage in it.stages() {
            stage.trip_info_output(&mut out, &PERSON, &ctx);
            stage.route_output(&mut out, &PERSON, false, &ctx);
        }
        let elements: Vec<_> = out.trip_infos.iter().map(|r| r.element).collect();
        assert_eq!(elements, vec!["walk", "ride"]);
        let ride = &out.trip_infos[1];
        assert_eq!(ride.waiting_time, 7);
        assert_eq!(ride.line, "17");
        assert_eq!(ride.intended_vehicle, "17.0");
        let routes: Vec<_> = out.routes.iter().map(|r| r.element).collect();
        assert_eq!(routes, vec!["trip", "walk", "ride"]);
    }

    #[test]
    fn zero_length_waits_complete_immediately() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let mut rng = rng();
        let mut it = Itinerary::new(vec![
            WaitingStage::new(fx.e[0], 0.0, 0, None, "a").into(),
            WaitingStage::new(fx.e[0], 0.0, 5, None, "b").into(),
        ]);
        let adv = it.start(&ctx, &mut traveller(&mut rng), Tick(3)).unwrap();
        assert_eq!(adv.activation, Activation::CompleteAt(Tick(8)));
        assert_eq!(it.current_index(), 1);
        assert!(it.start(&ctx, &mut traveller(&mut rng), Tick(3)).is_err());
    }

    #[test]
    fn force_finish_arrives_the_active_stage() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let mut rng = rng();
        let mut it = Itinerary::new(vec![WaitingStage::new(fx.e[0], 0.0, 100, None, "work").into()]);
        it.start(&ctx, &mut traveller(&mut rng), Tick(0)).unwrap();
        let msg = it.force_finish(&ctx, Tick(50)).unwrap();
        assert!(msg.is_some());
        assert_eq!(it.stages()[0].arrived(), Some(Tick(50)));
        assert!(it.is_finished());
    }

    #[test]
    fn abort_stops_the_itinerary() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let mut rng = rng();
        let mut it = Itinerary::new(vec![WaitingStage::new(fx.e[0], 0.0, 100, None, "work").into()]);
        it.start(&ctx, &mut traveller(&mut rng), Tick(0)).unwrap();
        it.abort();
        assert!(it.is_aborted());
        assert!(it.is_finished());
        assert_eq!(it.stages()[0].scheduled_completion(), None);
    }
}

// ── MovingStage ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod moving {
    use tp_core::{Tick, TransportableKind};

    use super::helpers::*;
    use crate::{MovingStage, NoVehicles, Stage, StageError};

    #[test]
    fn empty_route_is_rejected() {
        let fx = fixture();
        let result = MovingStage::on_foot(TransportableKind::Person, &fx.net, Vec::new(), 0.0, 0.0, None, 1.39);
        assert!(matches!(result, Err(StageError::Precondition(_))));
    }

    #[test]
    fn depart_pos_past_the_first_edge_is_clamped() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        let mut rng = rng();
        let walk = MovingStage::on_foot(TransportableKind::Person, &fx.net, vec![fx.e[0], fx.e[1]], 150.0, 50.0, None, 1.0)
            .unwrap();
        assert!(close(walk.length, 50.0));
        let mut stage: Stage = walk.into();
        stage.proceed(&ctx, &mut traveller(&mut rng), Tick(0), None).unwrap();

        assert_eq!(stage.edge(Tick(0), &ctx), fx.e[0]);
        assert!(close(stage.edge_pos(Tick(0), &ctx).unwrap(), 100.0));
        assert_eq!(stage.edge(Tick(25), &ctx), fx.e[1]);
        assert!(close(stage.edge_pos(Tick(25), &ctx).unwrap(), 25.0));
    }
}

// ── Stage contract ────────────────────────────────────────────────────────────

#[cfg(test)]
mod contract {
    use tp_core::{ModeSet, Position, Tick, TransportableKind};

    use super::helpers::*;
    use crate::{
        AccessStage, DrivingStage, MovingStage, NoVehicles, Stage, StageError, StageType, TripStage, WaitingStage,
    };

    /// One stage of every variant, each activated at tick 100.
    fn departed_stages(fx: &Fixture) -> Vec<Stage> {
        let ctx = fx.ctx(&NoVehicles);
        let mut rng = rng();
        let previous: Stage = WaitingStage::initial(fx.e[0], 20.0, Tick(0)).into();
        let mut stages: Vec<Stage> = vec![
            WaitingStage::new(fx.e[0], 50.0, 50, None, "work").into(),
            TripStage::new(&fx.net, fx.e[0], fx.e[2]).with_modes(ModeSet::WALK).into(),
            DrivingStage::new(fx.e[2], Some(fx.s[2]), 80.0, ["17"]).into(),
            MovingStage::on_foot(TransportableKind::Person, &fx.net, fx.e.to_vec(), 0.0, 50.0, None, 1.39)
                .unwrap()
                .into(),
            AccessStage::new(fx.e[0], Position::new(20.0, -4.6), fx.e[0], Some(fx.s[0]), 20.0, Position::new(20.0, -8.0), 1.39)
                .into(),
        ];
        for stage in &mut stages {
            stage.proceed(&ctx, &mut traveller(&mut rng), Tick(100), Some(&previous)).unwrap();
            assert_eq!(stage.departed(), Some(Tick(100)), "{} did not depart", stage.stage_type());
        }
        stages
    }

    #[test]
    fn every_variant_is_covered() {
        let fx = fixture();
        let kinds: Vec<_> = departed_stages(&fx).iter().map(|s| s.stage_type()).collect();
        assert_eq!(
            kinds,
            vec![StageType::Waiting, StageType::Trip, StageType::Driving, StageType::Walking, StageType::Access]
        );
    }

    #[test]
    fn queries_before_departure_fail_for_every_variant() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        for stage in departed_stages(&fx) {
            let kind = stage.stage_type();
            let too_early = |err: StageError| matches!(err, StageError::BeforeDeparture { now: Tick(99), departed: Tick(100) });
            assert!(too_early(stage.position(Tick(99), &ctx).unwrap_err()), "{kind} position");
            assert!(too_early(stage.angle(Tick(99), &ctx).unwrap_err()), "{kind} angle");
            assert!(too_early(stage.edge_pos(Tick(99), &ctx).unwrap_err()), "{kind} edge_pos");
            assert!(stage.position(Tick(100), &ctx).is_ok(), "{kind} position at departure");
        }
    }

    #[test]
    fn second_arrival_fails_for_every_variant() {
        let fx = fixture();
        let ctx = fx.ctx(&NoVehicles);
        for mut stage in departed_stages(&fx) {
            let kind = stage.stage_type();
            stage.set_arrived(&ctx, Tick(120)).unwrap();
            let err = stage.set_arrived(&ctx, Tick(121)).unwrap_err();
            assert!(
                matches!(err, StageError::DoubleArrival { arrived: Tick(120), now: Tick(121) }),
                "{kind}: {err:?}"
            );
            assert_eq!(stage.arrived(), Some(Tick(120)), "{kind}");
        }
    }
}

// ── Geometry ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod geometry {
    use std::f64::consts::FRAC_PI_2;

    use super::helpers::*;
    use crate::geometry::{edge_angle, edge_position, roadside_angle, roadside_offset, ROADSIDE_OFFSET};

    #[test]
    fn roadside_offset_mirrors() {
        assert_eq!(roadside_offset(&fixture().net), ROADSIDE_OFFSET);
        assert_eq!(roadside_offset(&fixture_with(true).net), -ROADSIDE_OFFSET);
    }

    #[test]
    fn positions_use_the_outer_lane() {
        let fx = fixture();
        let p = edge_position(&fx.net, fx.e[1], 25.0, 0.0);
        assert!(close(p.x, 125.0));
        assert!(close(p.y, -1.6));
        assert!(close(edge_angle(&fx.net, fx.e[1], 25.0), 0.0));
        assert!(close(roadside_angle(&fx.net, fx.e[1], 25.0), FRAC_PI_2));
    }
}

//! End-to-end scenarios and invariants for the suggestion engine.

#[cfg(test)]
mod tests {
    use crate::clock::{SimClock, SimTime};
    use crate::interlocking::{InterlockingRegistry, RouteVeto, VetoError};
    use crate::options::SimOptions;
    use crate::routes::{Route, RouteState, RouteTable};
    use crate::signals::SignalLibrary;
    use crate::suggestions::safety::crossing_conflict_at;
    use crate::suggestions::types::SuggestionKind;
    use crate::suggestions::{
        accept_suggestion, compute_suggestions, SimView, SuggestionEngine, SuggestionsSnapshot,
    };
    use crate::track::{Place, Position, TrackItem, TrackLayout};
    use crate::trains::{
        Service, ServiceDirectory, ServiceLine, Train, TrainRegistry, TrainStatus, CAUTION_SPEED,
    };

    // -------------------------------------------------------------------------
    // Fixture
    // -------------------------------------------------------------------------

    struct Fixture {
        clock: SimClock,
        options: SimOptions,
        trains: TrainRegistry,
        services: ServiceDirectory,
        routes: RouteTable,
        layout: TrackLayout,
        signals: SignalLibrary,
        interlocking: InterlockingRegistry,
    }

    impl Fixture {
        fn empty() -> Self {
            Self {
                clock: SimClock::default(),
                options: SimOptions::default(),
                trains: TrainRegistry::default(),
                services: ServiceDirectory::default(),
                routes: RouteTable::default(),
                layout: TrackLayout::default(),
                signals: SignalLibrary::default(),
                interlocking: InterlockingRegistry::default(),
            }
        }

        fn view(&self) -> SimView<'_> {
            SimView {
                clock: &self.clock,
                options: &self.options,
                trains: &self.trains,
                services: &self.services,
                routes: &self.routes,
                layout: &self.layout,
                signals: &self.signals,
                interlocking: &self.interlocking,
            }
        }

        fn compute(&self) -> SuggestionsSnapshot {
            compute_suggestions(&self.view())
        }

        /// Unlinked side tracks to dial in a utilization percentage without
        /// touching the walked topology.
        fn add_padding_lines(&mut self, total: usize, occupied: usize) {
            for i in 0..total {
                let id = format!("PAD{i}");
                self.layout.add_item(TrackItem::line(&id, 100.0));
                if i < occupied {
                    self.layout.set_train_present(&id, true);
                }
            }
        }
    }

    fn stopped_train(service: &str, head: Position) -> Train {
        Train {
            id: 0,
            service_code: service.to_string(),
            status: TrainStatus::Stopped,
            speed: 0.0,
            head,
            next_place_index: Some(0),
            stopped_time: 60,
            min_stop_time: 30,
            length: 100.0,
            applicable_speed: None,
        }
    }

    fn service_with_departure(code: &str, track: &str, departure: SimTime) -> Service {
        Service {
            code: code.to_string(),
            lines: vec![ServiceLine {
                place_code: "STA".to_string(),
                track_code: track.to_string(),
                scheduled_arrival: SimTime::ZERO,
                scheduled_departure: departure,
                must_stop: true,
            }],
        }
    }

    /// Station "STA": platform track 1, exit signal S1, route R1 to S2.
    ///
    /// ```text
    /// P1(200m, STA/1) -> S1 -> L1(500m) -> S2 -> L2(500m) -> E1
    /// ```
    ///
    /// Train 0 (service SV1, departure 06:05:00, track "1") stands on P1
    /// with its minimum stop satisfied; the clock reads 06:05:10.
    fn station_fixture() -> Fixture {
        let mut fx = Fixture::empty();
        fx.layout.add_place(Place {
            code: "STA".to_string(),
            name: "Statham Central".to_string(),
        });
        fx.layout
            .add_item(TrackItem::platform("P1", 200.0, "STA", "1").linked(Some("OUT"), Some("S1")));
        fx.layout.add_item(
            TrackItem::signal("S1", "BLOCK_3_ASPECT", "STOP").linked(Some("P1"), Some("L1")),
        );
        fx.layout
            .add_item(TrackItem::line("L1", 500.0).linked(Some("S1"), Some("S2")));
        fx.layout.add_item(
            TrackItem::signal("S2", "BLOCK_3_ASPECT", "STOP").linked(Some("L1"), Some("L2")),
        );
        fx.layout
            .add_item(TrackItem::line("L2", 500.0).linked(Some("S2"), Some("E1")));
        fx.layout
            .add_item(TrackItem::end("E1").linked(Some("L2"), None));
        fx.layout.set_train_present("P1", true);

        fx.routes.add_route(Route::new(
            "R1",
            "S1",
            "S2",
            vec![
                Position::new("S1", "P1", 0.0),
                Position::new("L1", "S1", 0.0),
                Position::new("S2", "L1", 0.0),
            ],
        ));

        fx.services
            .add_service(service_with_departure("SV1", "1", SimTime::from_hms(6, 5, 0)));
        fx.trains
            .add_train(stopped_train("SV1", Position::new("P1", "OUT", 100.0)));
        fx.clock.time = SimTime::from_hms(6, 5, 10);
        fx
    }

    /// Open line toward a red signal SIG with route R2 beyond it.
    ///
    /// ```text
    /// A1(1000m) -> SIG -> B1(500m) -> SX
    /// ```
    ///
    /// Train 0 (service SV2) runs on A1, 400 m short of SIG at 20 m/s.
    fn approach_fixture() -> Fixture {
        let mut fx = Fixture::empty();
        fx.layout
            .add_item(TrackItem::line("A1", 1_000.0).linked(Some("IN"), Some("SIG")));
        fx.layout.add_item(
            TrackItem::signal("SIG", "BLOCK_3_ASPECT", "STOP").linked(Some("A1"), Some("B1")),
        );
        fx.layout
            .add_item(TrackItem::line("B1", 500.0).linked(Some("SIG"), Some("SX")));
        fx.layout.add_item(
            TrackItem::signal("SX", "BLOCK_3_ASPECT", "STOP").linked(Some("B1"), None),
        );
        fx.routes.add_route(Route::new(
            "R2",
            "SIG",
            "SX",
            vec![
                Position::new("SIG", "A1", 0.0),
                Position::new("B1", "SIG", 0.0),
                Position::new("SX", "B1", 0.0),
            ],
        ));
        fx.services.add_service(Service {
            code: "SV2".to_string(),
            lines: vec![ServiceLine {
                place_code: String::new(),
                track_code: String::new(),
                scheduled_arrival: SimTime::ZERO,
                scheduled_departure: SimTime::ZERO,
                must_stop: false,
            }],
        });
        fx.trains.add_train(Train {
            status: TrainStatus::Running,
            speed: 20.0,
            ..stopped_train("SV2", Position::new("A1", "IN", 600.0))
        });
        fx.clock.time = SimTime::from_hms(6, 10, 0);
        fx
    }

    fn ids(snapshot: &SuggestionsSnapshot) -> Vec<&str> {
        snapshot.items.iter().map(|item| item.id.as_str()).collect()
    }

    fn find<'a>(
        snapshot: &'a SuggestionsSnapshot,
        id: &str,
    ) -> Option<&'a crate::suggestions::Suggestion> {
        snapshot.items.iter().find(|item| item.id == id)
    }

    // -------------------------------------------------------------------------
    // S1 / S2: reactive departure
    // -------------------------------------------------------------------------

    #[test]
    fn s1_on_time_departure_clear_path() {
        let fx = station_fixture();
        let snapshot = fx.compute();
        let item = find(&snapshot, "ROUTE_ACTIVATE:0:R1").expect("departure suggestion");
        assert_eq!(item.kind, SuggestionKind::RouteActivate);
        // Base 1 + no delay + track match 2 + empty-network bonus 5.
        assert!(item.score >= 3.0);
        assert_eq!(item.score, 8.0);
        assert!(item.reason.contains("06:05:00"));
        assert!(item.reason.contains("minimum stop satisfied"));
        assert_eq!(item.actions[0].object, "route");
        assert_eq!(item.actions[0].action, "activate");
        assert_eq!(item.actions[0].params["persistent"], false);
        // The departure outranks proceed/override companions.
        assert_eq!(snapshot.items[0].id, "ROUTE_ACTIVATE:0:R1");
    }

    #[test]
    fn s2_delayed_departure_low_utilization() {
        let mut fx = station_fixture();
        fx.clock.time = SimTime::from_hms(6, 7, 0);
        // 4 countable items in the station; 6 more brings the total to 10,
        // 3 occupied = 30% utilization.
        fx.add_padding_lines(6, 3);
        assert_eq!(fx.layout.utilization_percent(), 30.0);

        let snapshot = fx.compute();
        let item = find(&snapshot, "ROUTE_ACTIVATE:0:R1").expect("departure suggestion");
        // 1 + 10*2 + 2 + (50-30)/10 = 25.
        assert_eq!(item.score, 25.0);
    }

    #[test]
    fn departure_without_track_match_loses_bonus() {
        let mut fx = station_fixture();
        // Scheduled track 2, but the train stands on track 1.
        fx.services
            .add_service(service_with_departure("SV1", "2", SimTime::from_hms(6, 5, 0)));
        let snapshot = fx.compute();
        let item = find(&snapshot, "ROUTE_ACTIVATE:0:R1").expect("departure suggestion");
        // 1 + 0 + 0 + 5: no match bonus.
        assert_eq!(item.score, 6.0);
    }

    #[test]
    fn departure_blocked_by_occupied_route_is_absent() {
        let mut fx = station_fixture();
        fx.layout.set_train_present("L1", true);
        let snapshot = fx.compute();
        assert!(find(&snapshot, "ROUTE_ACTIVATE:0:R1").is_none());
    }

    #[test]
    fn departure_exactly_at_schedule_boundary() {
        let mut fx = station_fixture();
        fx.clock.time = SimTime::from_hms(6, 5, 0);
        if let Some(train) = fx.trains.train_mut(0) {
            train.stopped_time = 30; // exactly the minimum stop
        }
        let snapshot = fx.compute();
        assert!(find(&snapshot, "ROUTE_ACTIVATE:0:R1").is_some());

        // One second of dwell short: no departure.
        if let Some(train) = fx.trains.train_mut(0) {
            train.stopped_time = 29;
        }
        let snapshot = fx.compute();
        assert!(find(&snapshot, "ROUTE_ACTIVATE:0:R1").is_none());
    }

    #[test]
    fn departure_before_schedule_is_absent() {
        let mut fx = station_fixture();
        fx.clock.time = SimTime::from_hms(6, 4, 59);
        let snapshot = fx.compute();
        assert!(find(&snapshot, "ROUTE_ACTIVATE:0:R1").is_none());
    }

    #[test]
    fn route_with_no_positions_beyond_begin_is_skipped() {
        let mut fx = station_fixture();
        fx.routes.add_route(Route::new(
            "RE",
            "S1",
            "S1",
            vec![Position::new("S1", "P1", 0.0)],
        ));
        let snapshot = fx.compute();
        assert!(ids(&snapshot).iter().all(|id| !id.contains(":RE")));
    }

    #[test]
    fn track_code_adherence_within_place() {
        let mut fx = station_fixture();
        // L1 now belongs to STA as track 2: the scheduled track is 1, so
        // route R1 violates platform adherence.
        {
            let item = fx.layout.item_mut("L1").unwrap();
            item.place_code = Some("STA".to_string());
            item.track_code = "2".to_string();
        }
        let snapshot = fx.compute();
        assert!(find(&snapshot, "ROUTE_ACTIVATE:0:R1").is_none());

        // An empty track code inside the place is acceptable.
        fx.layout.item_mut("L1").unwrap().track_code = String::new();
        let snapshot = fx.compute();
        assert!(find(&snapshot, "ROUTE_ACTIVATE:0:R1").is_some());
    }

    // -------------------------------------------------------------------------
    // S3: predictive prevention
    // -------------------------------------------------------------------------

    #[test]
    fn s3_predictive_prevention() {
        let fx = approach_fixture();
        let snapshot = fx.compute();
        let item = find(&snapshot, "ROUTE_ACTIVATE:0:R2:predictive").expect("predictive");
        // 15 + (60 - 20)/10 = 19.
        assert_eq!(item.score, 19.0);
        assert!(item.reason.contains("approaching signal SIG"));
        assert_eq!(snapshot.items[0].id, "ROUTE_ACTIVATE:0:R2:predictive");
        // Nothing else to suggest on an empty approach.
        assert_eq!(snapshot.items.len(), 1);
    }

    #[test]
    fn predictive_emits_at_most_one_per_train() {
        let mut fx = approach_fixture();
        // A second activatable route from the same signal.
        fx.routes.add_route(Route::new(
            "R3",
            "SIG",
            "SX",
            vec![
                Position::new("SIG", "A1", 0.0),
                Position::new("B1", "SIG", 0.0),
                Position::new("SX", "B1", 0.0),
            ],
        ));
        let snapshot = fx.compute();
        let predictive: Vec<&str> = ids(&snapshot)
            .into_iter()
            .filter(|id| id.ends_with(":predictive"))
            .collect();
        assert_eq!(predictive, vec!["ROUTE_ACTIVATE:0:R2:predictive"]);
    }

    #[test]
    fn predictive_requires_stop_aspect() {
        let mut fx = approach_fixture();
        fx.layout.set_active_aspect("SIG", "CLEAR").unwrap();
        assert!(fx.compute().items.is_empty());
    }

    #[test]
    fn predictive_respects_distance_and_eta_thresholds() {
        let mut fx = approach_fixture();
        fx.options.suggest_predictive_max_distance_m = 300.0; // train is 400 m out
        assert!(fx.compute().items.is_empty());

        let mut fx = approach_fixture();
        fx.options.suggest_predictive_max_eta_secs = 15.0; // ETA is 20 s
        assert!(fx.compute().items.is_empty());
    }

    #[test]
    fn predictive_stopped_train_never_qualifies() {
        let mut fx = approach_fixture();
        {
            let train = fx.trains.train_mut(0).unwrap();
            train.speed = 0.0;
            train.status = TrainStatus::Running;
        }
        // Zero speed means the one-hour ETA sentinel, far over the limit.
        let snapshot = fx.compute();
        assert!(ids(&snapshot).iter().all(|id| !id.ends_with(":predictive")));
    }

    // -------------------------------------------------------------------------
    // S4: blocking persistent route
    // -------------------------------------------------------------------------

    fn add_persistent_blocker(fx: &mut Fixture) {
        fx.layout.add_item(
            TrackItem::signal("S9", "BLOCK_3_ASPECT", "STOP").linked(Some("X9"), Some("L1")),
        );
        fx.layout.add_item(
            TrackItem::signal("S10", "BLOCK_3_ASPECT", "STOP").linked(Some("L1"), None),
        );
        fx.routes.add_route(Route::new(
            "RP",
            "S9",
            "S10",
            vec![
                Position::new("S9", "X9", 0.0),
                Position::new("L1", "S9", 0.0),
                Position::new("S10", "L1", 0.0),
            ],
        ));
        fx.routes.route_mut("RP").unwrap().state = RouteState::Persistent;
    }

    #[test]
    fn s4_blocking_persistent_route() {
        let mut fx = station_fixture();
        add_persistent_blocker(&mut fx);

        let snapshot = fx.compute();
        // The departure itself is vetoed by the interlocking...
        assert!(find(&snapshot, "ROUTE_ACTIVATE:0:R1").is_none());
        // ...and replaced by a targeted deactivation.
        let item = find(&snapshot, "ROUTE_DEACTIVATE:RP").expect("deactivation suggestion");
        assert_eq!(item.kind, SuggestionKind::RouteDeactivate);
        assert!(item.reason.contains("1 ready departure(s)"));
        // 8 + 3*1, empty network.
        assert_eq!(item.score, 11.0);
        assert_eq!(item.actions[0].action, "deactivate");
    }

    #[test]
    fn s4_occupied_persistent_route_not_proposed() {
        let mut fx = station_fixture();
        add_persistent_blocker(&mut fx);
        fx.layout.set_train_present("S10", true);
        let snapshot = fx.compute();
        assert!(find(&snapshot, "ROUTE_DEACTIVATE:RP").is_none());
    }

    #[test]
    fn s4_legacy_message_parsing_fallback() {
        struct LegacyVeto;
        impl RouteVeto for LegacyVeto {
            fn name(&self) -> &str {
                "legacy"
            }
            fn can_activate(
                &self,
                _route: &Route,
                _routes: &RouteTable,
                _layout: &TrackLayout,
            ) -> Result<(), VetoError> {
                Err(VetoError {
                    message: "cannot set route: conflicting route RP is active".to_string(),
                    conflicting_route: None,
                })
            }
        }

        let mut fx = station_fixture();
        add_persistent_blocker(&mut fx);
        let mut registry = InterlockingRegistry::empty();
        registry.register(Box::new(LegacyVeto));
        fx.interlocking = registry;

        let snapshot = fx.compute();
        let item = find(&snapshot, "ROUTE_DEACTIVATE:RP").expect("deactivation via parsed cause");
        assert!(item.title.contains("RP"));
    }

    #[test]
    fn deactivation_not_proposed_for_nonpersistent_blocker() {
        let mut fx = station_fixture();
        add_persistent_blocker(&mut fx);
        fx.routes.route_mut("RP").unwrap().state = RouteState::Activated;
        let snapshot = fx.compute();
        assert!(find(&snapshot, "ROUTE_DEACTIVATE:RP").is_none());
    }

    // -------------------------------------------------------------------------
    // S5: proceed with caution + rejection window
    // -------------------------------------------------------------------------

    /// Station fixture variant with no usable schedule, so only the
    /// proceed/override generators fire.
    fn held_train_fixture() -> Fixture {
        let mut fx = station_fixture();
        fx.services
            .add_service(service_with_departure("SV1", "1", SimTime::ZERO));
        fx
    }

    #[test]
    fn s5_proceed_with_caution_then_rejection() {
        let fx = held_train_fixture();
        let t0 = fx.clock.time;
        let snapshot = fx.compute();
        let id = "TRAIN_PROCEED_WITH_CAUTION:0";
        let item = find(&snapshot, id).expect("proceed suggestion");
        assert!(item.reason.contains("Signal S1 at STOP"));
        assert_eq!(item.actions[0].params["id"], 0);

        // Operator rejects for 10 minutes of simulation time.
        let mut engine = SuggestionEngine::default();
        engine.reject(id, 10, t0);
        for minute in 0..10 {
            let now = t0.plus_minutes(minute);
            assert!(engine.is_rejected(id, now), "minute {minute}");
        }
        let mut late = fx;
        late.clock.time = t0.plus_minutes(10);
        let mut snapshot = late.compute();
        snapshot
            .items
            .retain(|item| !engine.is_rejected(&item.id, late.clock.time));
        assert!(find(&snapshot, id).is_some(), "eligible again after window");
    }

    #[test]
    fn proceed_absent_when_block_occupied() {
        let mut fx = held_train_fixture();
        fx.layout.set_train_present("L1", true);
        // The block between P1 and S1 is only the head itself; occupy the
        // path beyond the signal instead and aim the walk past it.
        // L1 sits beyond S1, so the block P1 -> S1 stays clear; the proceed
        // suggestion is still emitted.
        let snapshot = fx.compute();
        assert!(find(&snapshot, "TRAIN_PROCEED_WITH_CAUTION:0").is_some());

        // A second train standing between the head and the signal kills it.
        let mut fx = held_train_fixture();
        fx.layout.add_item(
            TrackItem::line("G1", 50.0).linked(Some("P1"), Some("S1")),
        );
        fx.layout.item_mut("P1").unwrap().next_item = Some("G1".to_string());
        fx.layout.item_mut("S1").unwrap().previous_item = Some("G1".to_string());
        fx.layout.set_train_present("G1", true);
        let snapshot = fx.compute();
        assert!(find(&snapshot, "TRAIN_PROCEED_WITH_CAUTION:0").is_none());
    }

    #[test]
    fn proceed_delay_and_utilization_terms() {
        let mut fx = held_train_fixture();
        // Schedule 3 minutes in the past, but dwell not satisfied, so the
        // departure generator stays quiet and only proceed/override fire.
        fx.services
            .add_service(service_with_departure("SV1", "1", SimTime::from_hms(6, 2, 0)));
        fx.trains.train_mut(0).unwrap().stopped_time = 10;
        // 4 countable station items + 16 pads = 20; 14 occupied = 70%.
        fx.add_padding_lines(16, 14);
        assert_eq!(fx.layout.utilization_percent(), 70.0);

        let snapshot = fx.compute();
        let proceed = find(&snapshot, "TRAIN_PROCEED_WITH_CAUTION:0").expect("proceed");
        assert_eq!(proceed.score, 5.0 + 3.0 + (70.0 - 60.0) / 12.0);
        let overr = find(&snapshot, "SIGNAL_OVERRIDE:S1:CAUTION").expect("override");
        assert_eq!(overr.score, 7.0 + (70.0 - 60.0) / 8.0);
    }

    // -------------------------------------------------------------------------
    // Conservative signal override
    // -------------------------------------------------------------------------

    #[test]
    fn override_prefers_caution_and_maps_color() {
        let fx = held_train_fixture();
        let snapshot = fx.compute();
        let item = find(&snapshot, "SIGNAL_OVERRIDE:S1:CAUTION").expect("override");
        assert_eq!(item.kind, SuggestionKind::SignalOverride);
        assert_eq!(item.actions[0].object, "signal");
        assert_eq!(item.actions[0].action, "status");
        assert_eq!(item.actions[0].params["newStatus"], "YELLOW");
    }

    #[test]
    fn zero_speed_at_proceed_signal_suggests_nothing() {
        let mut fx = held_train_fixture();
        fx.layout.set_active_aspect("S1", "CLEAR").unwrap();
        let snapshot = fx.compute();
        assert!(snapshot.items.is_empty());
    }

    // -------------------------------------------------------------------------
    // S6: crossing prediction vetoes predictive
    // -------------------------------------------------------------------------

    fn crossing_fixture() -> Fixture {
        let mut fx = approach_fixture();
        // B1 crosses X on a diamond; X is fed from W.
        fx.layout.item_mut("B1").unwrap().conflict_item = Some("X".to_string());
        fx.layout
            .add_item(TrackItem::line("W", 30.0).linked(Some("WIN"), Some("X")));
        fx.layout.add_item(
            TrackItem::line("X", 50.0)
                .linked(Some("W"), None)
                .with_conflict("B1"),
        );
        // Approach at 500 m / ~15 s.
        {
            let train = fx.trains.train_mut(0).unwrap();
            train.head = Position::new("A1", "IN", 500.0);
            train.speed = 33.4;
        }
        fx
    }

    #[test]
    fn s6_crossing_prediction_vetoes_predictive() {
        // Without the conflicting mover the predictive suggestion appears.
        let fx = crossing_fixture();
        let snapshot = fx.compute();
        assert!(find(&snapshot, "ROUTE_ACTIVATE:0:R2:predictive").is_some());

        // A second train 30 m short of the crossing makes the ETA windows
        // overlap; the predictive suggestion must vanish.
        let mut fx = crossing_fixture();
        fx.trains.add_train(Train {
            status: TrainStatus::Running,
            speed: 10.0,
            ..stopped_train("SV9", Position::new("W", "WIN", 0.0))
        });
        let snapshot = fx.compute();
        assert!(find(&snapshot, "ROUTE_ACTIVATE:0:R2:predictive").is_none());
    }

    #[test]
    fn equidistant_conflicting_trains_tie_breaks_by_registry_order() {
        let mut fx = crossing_fixture();
        let me = fx.trains.train(0).unwrap().clone();
        fx.trains.add_train(Train {
            status: TrainStatus::Running,
            speed: 10.0,
            ..stopped_train("FIRST", Position::new("W", "WIN", 0.0))
        });
        fx.trains.add_train(Train {
            status: TrainStatus::Running,
            speed: 10.0,
            ..stopped_train("SECOND", Position::new("W", "WIN", 0.0))
        });
        let reason =
            crossing_conflict_at(&me, "B1", &fx.trains, &fx.layout, &fx.options).unwrap();
        assert!(reason.contains("FIRST"), "stable tie-break, got: {reason}");
    }

    // -------------------------------------------------------------------------
    // Ranking, capping, uniqueness, determinism
    // -------------------------------------------------------------------------

    #[test]
    fn scores_are_non_increasing_and_capped() {
        let mut fx = station_fixture();
        fx.options.suggest_max_items = 2;
        let snapshot = fx.compute();
        assert_eq!(snapshot.items.len(), 2);
        assert!(snapshot.items[0].score >= snapshot.items[1].score);
        // The lowest-scored candidate (proceed at 5.0) fell off the cap.
        assert!(find(&snapshot, "TRAIN_PROCEED_WITH_CAUTION:0").is_none());
    }

    #[test]
    fn ids_are_unique_when_two_trains_share_a_signal() {
        let mut fx = held_train_fixture();
        // A second platform feeding the same exit signal.
        fx.layout.add_item(
            TrackItem::platform("P2", 200.0, "STA", "2").linked(Some("OUT2"), Some("S1")),
        );
        fx.layout.set_train_present("P2", true);
        fx.services
            .add_service(service_with_departure("SV9", "2", SimTime::ZERO));
        fx.trains
            .add_train(stopped_train("SV9", Position::new("P2", "OUT2", 100.0)));

        let snapshot = fx.compute();
        let mut seen = std::collections::HashSet::new();
        for id in ids(&snapshot) {
            assert!(seen.insert(id.to_string()), "duplicate id {id}");
        }
        // Both trains propose overriding S1; only one survives.
        let overrides = ids(&snapshot)
            .into_iter()
            .filter(|id| id.starts_with("SIGNAL_OVERRIDE:S1"))
            .count();
        assert_eq!(overrides, 1);
        // But each train keeps its own proceed suggestion.
        assert!(find(&snapshot, "TRAIN_PROCEED_WITH_CAUTION:0").is_some());
        assert!(find(&snapshot, "TRAIN_PROCEED_WITH_CAUTION:1").is_some());
    }

    #[test]
    fn recomputation_is_deterministic() {
        let mut fx = station_fixture();
        add_persistent_blocker(&mut fx);
        fx.add_padding_lines(8, 4);
        let a = serde_json::to_string(&fx.compute()).unwrap();
        let b = serde_json::to_string(&fx.compute()).unwrap();
        assert_eq!(a, b);
    }

    // -------------------------------------------------------------------------
    // Accept paths
    // -------------------------------------------------------------------------

    #[test]
    fn accept_route_activation_executes_once_then_errors() {
        let mut fx = station_fixture();
        accept_suggestion(
            "ROUTE_ACTIVATE:0:R1",
            &mut fx.routes,
            &mut fx.trains,
            &mut fx.layout,
            &fx.signals,
        )
        .unwrap();
        assert_eq!(fx.routes.route("R1").unwrap().state, RouteState::Activated);
        assert_eq!(fx.layout.active_aspect("S1", &fx.signals).unwrap().name, "CLEAR");

        // Accepting the same id again is an unambiguous error.
        let err = accept_suggestion(
            "ROUTE_ACTIVATE:0:R1",
            &mut fx.routes,
            &mut fx.trains,
            &mut fx.layout,
            &fx.signals,
        )
        .unwrap_err();
        assert!(err.to_string().contains("already active"));

        // The executed suggestion is gone from the next snapshot: the
        // departure is vetoed (route active) and S1 now shows proceed.
        let snapshot = fx.compute();
        assert!(find(&snapshot, "ROUTE_ACTIVATE:0:R1").is_none());
        assert!(find(&snapshot, "TRAIN_PROCEED_WITH_CAUTION:0").is_none());
    }

    #[test]
    fn accept_route_deactivation() {
        let mut fx = station_fixture();
        fx.routes
            .activate("R1", true, &mut fx.layout, &fx.signals)
            .unwrap();
        accept_suggestion(
            "ROUTE_DEACTIVATE:R1",
            &mut fx.routes,
            &mut fx.trains,
            &mut fx.layout,
            &fx.signals,
        )
        .unwrap();
        assert_eq!(fx.routes.route("R1").unwrap().state, RouteState::Deactivated);
    }

    #[test]
    fn accept_proceed_with_caution() {
        let mut fx = station_fixture();
        accept_suggestion(
            "TRAIN_PROCEED_WITH_CAUTION:0",
            &mut fx.routes,
            &mut fx.trains,
            &mut fx.layout,
            &fx.signals,
        )
        .unwrap();
        let train = fx.trains.train(0).unwrap();
        assert_eq!(train.status, TrainStatus::Running);
        assert_eq!(train.speed, CAUTION_SPEED);
    }

    #[test]
    fn accept_signal_override_paths() {
        let mut fx = station_fixture();
        // Named aspect, case-insensitively.
        accept_suggestion(
            "SIGNAL_OVERRIDE:S1:caution",
            &mut fx.routes,
            &mut fx.trains,
            &mut fx.layout,
            &fx.signals,
        )
        .unwrap();
        assert_eq!(
            fx.layout.item("S1").unwrap().signal().unwrap().manual_aspect,
            Some("CAUTION".to_string())
        );

        // Unknown aspects fall back to the conservative proceed aspect.
        accept_suggestion(
            "SIGNAL_OVERRIDE:S1:NARNIA",
            &mut fx.routes,
            &mut fx.trains,
            &mut fx.layout,
            &fx.signals,
        )
        .unwrap();
        assert_eq!(
            fx.layout.item("S1").unwrap().signal().unwrap().manual_aspect,
            Some("CAUTION".to_string())
        );

        // DEFAULT clears the override.
        accept_suggestion(
            "SIGNAL_OVERRIDE:S1:DEFAULT",
            &mut fx.routes,
            &mut fx.trains,
            &mut fx.layout,
            &fx.signals,
        )
        .unwrap();
        assert_eq!(
            fx.layout.item("S1").unwrap().signal().unwrap().manual_aspect,
            None
        );
    }

    #[test]
    fn accept_unknown_targets_mutate_nothing() {
        let mut fx = station_fixture();
        let before = fx.routes.route("R1").unwrap().clone();

        for id in [
            "ROUTE_ACTIVATE:0:NOPE",
            "ROUTE_DEACTIVATE:NOPE",
            "TRAIN_PROCEED_WITH_CAUTION:99",
            "SIGNAL_OVERRIDE:NOPE:CAUTION",
            "SIGNAL_OVERRIDE:L1:CAUTION",
            "gibberish",
            "ROUTE_ACTIVATE:0:R1:tomorrow",
        ] {
            assert!(
                accept_suggestion(
                    id,
                    &mut fx.routes,
                    &mut fx.trains,
                    &mut fx.layout,
                    &fx.signals,
                )
                .is_err(),
                "expected error for {id}"
            );
        }
        assert_eq!(fx.routes.route("R1").unwrap(), &before);
        assert_eq!(fx.trains.train(0).unwrap().status, TrainStatus::Stopped);
    }
}

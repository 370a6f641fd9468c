//! Built-in demo scenario.
//!
//! A small two-branch layout used by the headless demo binary: one train
//! due to depart from a platform, and one running train approaching a stop
//! signal, so both the reactive and the predictive generators have work to
//! do within the first few minutes of simulation time.

use bevy::prelude::*;

use crate::clock::{SimClock, SimTime};
use crate::routes::{Route, RouteTable};
use crate::signals::BLOCK_SIGNAL_TYPE;
use crate::track::{Place, Position, TrackItem, TrackLayout};
use crate::trains::{Service, ServiceDirectory, ServiceLine, Train, TrainRegistry, TrainStatus};

/// Populates the world with the demo layout, services and trains.
pub fn build_demo_world(
    clock: &mut SimClock,
    layout: &mut TrackLayout,
    routes: &mut RouteTable,
    services: &mut ServiceDirectory,
    trains: &mut TrainRegistry,
) {
    clock.time = SimTime::from_hms(6, 4, 30);

    layout.add_place(Place {
        code: "STA".to_string(),
        name: "Statham Central".to_string(),
    });
    layout.add_place(Place {
        code: "STB".to_string(),
        name: "Stanmore Bridge".to_string(),
    });

    // Main line: platform at STA, two block sections, platform at STB.
    layout.add_item(TrackItem::platform("P1", 200.0, "STA", "1").linked(Some("OUT"), Some("S1")));
    layout.add_item(
        TrackItem::signal("S1", BLOCK_SIGNAL_TYPE, "STOP").linked(Some("P1"), Some("L1")),
    );
    layout.add_item(TrackItem::line("L1", 600.0).linked(Some("S1"), Some("S2")));
    layout.add_item(
        TrackItem::signal("S2", BLOCK_SIGNAL_TYPE, "STOP").linked(Some("L1"), Some("L2")),
    );
    layout.add_item(TrackItem::line("L2", 800.0).linked(Some("S2"), Some("P2")));
    layout.add_item(TrackItem::platform("P2", 200.0, "STB", "1").linked(Some("L2"), Some("S3")));
    layout.add_item(
        TrackItem::signal("S3", BLOCK_SIGNAL_TYPE, "STOP").linked(Some("P2"), Some("L3")),
    );
    layout.add_item(TrackItem::line("L3", 600.0).linked(Some("S3"), Some("E1")));
    layout.add_item(TrackItem::end("E1").linked(Some("L3"), None));

    // Second branch: a long approach toward a stop signal.
    layout.add_item(TrackItem::line("A1", 1_000.0).linked(Some("IN"), Some("S4")));
    layout.add_item(
        TrackItem::signal("S4", BLOCK_SIGNAL_TYPE, "STOP").linked(Some("A1"), Some("B1")),
    );
    layout.add_item(TrackItem::line("B1", 700.0).linked(Some("S4"), Some("E2")));
    layout.add_item(TrackItem::end("E2").linked(Some("B1"), None));

    routes.add_route(Route::new(
        "R1",
        "S1",
        "S2",
        vec![
            Position::new("S1", "P1", 0.0),
            Position::new("L1", "S1", 0.0),
            Position::new("S2", "L1", 0.0),
        ],
    ));
    routes.add_route(Route::new(
        "R2",
        "S2",
        "S3",
        vec![
            Position::new("S2", "L1", 0.0),
            Position::new("L2", "S2", 0.0),
            Position::new("P2", "L2", 0.0),
            Position::new("S3", "P2", 0.0),
        ],
    ));
    routes.add_route(Route::new(
        "R3",
        "S4",
        "E2",
        vec![
            Position::new("S4", "A1", 0.0),
            Position::new("B1", "S4", 0.0),
            Position::new("E2", "B1", 0.0),
        ],
    ));

    services.add_service(Service {
        code: "EXP101".to_string(),
        lines: vec![
            ServiceLine {
                place_code: "STA".to_string(),
                track_code: "1".to_string(),
                scheduled_arrival: SimTime::ZERO,
                scheduled_departure: SimTime::from_hms(6, 5, 0),
                must_stop: true,
            },
            ServiceLine {
                place_code: "STB".to_string(),
                track_code: "1".to_string(),
                scheduled_arrival: SimTime::from_hms(6, 12, 0),
                scheduled_departure: SimTime::from_hms(6, 13, 0),
                must_stop: true,
            },
        ],
    });
    services.add_service(Service {
        code: "FRT202".to_string(),
        lines: vec![ServiceLine {
            place_code: String::new(),
            track_code: String::new(),
            scheduled_arrival: SimTime::ZERO,
            scheduled_departure: SimTime::ZERO,
            must_stop: false,
        }],
    });

    trains.add_train(Train {
        id: 0,
        service_code: "EXP101".to_string(),
        status: TrainStatus::Stopped,
        speed: 0.0,
        head: Position::new("P1", "OUT", 120.0),
        next_place_index: Some(0),
        stopped_time: 90,
        min_stop_time: 30,
        length: 120.0,
        applicable_speed: None,
    });
    trains.add_train(Train {
        id: 0,
        service_code: "FRT202".to_string(),
        status: TrainStatus::Running,
        speed: 18.0,
        head: Position::new("A1", "IN", 400.0),
        next_place_index: Some(0),
        stopped_time: 0,
        min_stop_time: 0,
        length: 350.0,
        applicable_speed: None,
    });

    info!(
        "demo scenario loaded: {} track items, {} trains",
        layout.item_count(),
        trains.len()
    );
}

/// Startup system wrapper around [`build_demo_world`].
pub fn init_demo_world(
    mut clock: ResMut<SimClock>,
    mut layout: ResMut<TrackLayout>,
    mut routes: ResMut<RouteTable>,
    mut services: ResMut<ServiceDirectory>,
    mut trains: ResMut<TrainRegistry>,
) {
    build_demo_world(&mut clock, &mut layout, &mut routes, &mut services, &mut trains);
}

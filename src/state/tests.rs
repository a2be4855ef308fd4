use super::*;
use crate::config::StoreConfig;
use crate::event::{FeedEvent, BUS_LOCATION_TOPIC, NOTIFICATION_TOPIC};
use crate::subscription::EventRouter;
use chrono::{Duration, TimeZone, Utc};
use std::io::Write;
use std::sync::Arc;
use std::thread;

fn bus(id: &str, status: BusStatus, eta: u32) -> BusLocation {
    BusLocation {
        bus_id: id.to_string(),
        bus_number: format!("SB-{}", id.trim_start_matches("bus-")),
        lat: 33.8886,
        lng: 35.4955,
        speed: 30.0,
        heading: 90.0,
        occupancy: 20,
        capacity: 40,
        status,
        route_name: "Route Alpha".to_string(),
        next_stop: "City Center".to_string(),
        eta,
        driver_name: "Ahmad K.".to_string(),
        last_updated: Utc.with_ymd_and_hms(2026, 2, 22, 7, 0, 0).unwrap(),
    }
}

#[test]
fn test_update_replaces_known_bus() {
    let state = FleetState::new();
    state.set_all(vec![
        bus("bus-1", BusStatus::OnRoute, 8),
        bus("bus-2", BusStatus::Idle, 0),
    ]);

    let outcome = state.upsert_one(bus("bus-1", BusStatus::Delayed, 20));
    assert_eq!(outcome, UpsertOutcome::Replaced);

    let bus1 = state.get("bus-1").unwrap();
    assert_eq!(bus1.status, BusStatus::Delayed);
    assert_eq!(bus1.eta, 20);

    let bus2 = state.get("bus-2").unwrap();
    assert_eq!(bus2.status, BusStatus::Idle);
    assert_eq!(bus2.eta, 0);

    assert_eq!(state.len(), 2);
}

#[test]
fn test_update_leaves_no_stale_fields() {
    let state = FleetState::new();
    let mut original = bus("bus-1", BusStatus::OnRoute, 8);
    original.next_stop = "Elm Street".to_string();
    original.driver_name = "Sara M.".to_string();
    state.set_all(vec![original]);

    let incoming = bus("bus-1", BusStatus::Approaching, 2);
    state.upsert_one(incoming.clone());

    assert_eq!(state.get("bus-1").unwrap(), incoming);
}

#[test]
fn test_update_for_unknown_bus_is_ignored() {
    let state = FleetState::new();
    state.set_all(vec![bus("bus-1", BusStatus::OnRoute, 8)]);

    let outcome = state.upsert_one(bus("bus-9", BusStatus::OnRoute, 4));

    assert_eq!(outcome, UpsertOutcome::Ignored);
    assert_eq!(state.len(), 1);
    assert!(state.get("bus-9").is_none());
}

#[test]
fn test_unknown_bus_admitted_when_configured() {
    let state = FleetState::with_config(&StoreConfig {
        admit_new_buses: true,
        seed_path: None,
    });
    state.set_all(vec![bus("bus-1", BusStatus::OnRoute, 8)]);

    let outcome = state.upsert_one(bus("bus-9", BusStatus::OnRoute, 4));

    assert_eq!(outcome, UpsertOutcome::Inserted);
    assert_eq!(state.len(), 2);
    // Seed order is kept; newcomers go last
    assert_eq!(state.snapshot()[1].bus_id, "bus-9");
}

#[test]
fn test_set_all_replaces_everything() {
    let state = FleetState::new();
    state.set_all(vec![bus("bus-1", BusStatus::OnRoute, 8)]);
    state.set_all(vec![
        bus("bus-7", BusStatus::Idle, 0),
        bus("bus-8", BusStatus::Idle, 0),
    ]);

    let ids: Vec<String> = state.snapshot().into_iter().map(|b| b.bus_id).collect();
    assert_eq!(ids, vec!["bus-7", "bus-8"]);
}

#[test]
fn test_updates_fold_in_order() {
    let state = FleetState::new();
    state.set_all(vec![bus("bus-1", BusStatus::OnRoute, 8)]);

    for (status, eta) in [
        (BusStatus::Approaching, 3),
        (BusStatus::Arrived, 0),
        (BusStatus::Delayed, 15),
    ] {
        state.upsert_one(bus("bus-1", status, eta));
    }

    let bus1 = state.get("bus-1").unwrap();
    assert_eq!(bus1.status, BusStatus::Delayed);
    assert_eq!(bus1.eta, 15);
}

#[test]
fn test_changes_broadcast() {
    let state = FleetState::new();
    let mut rx = state.subscribe();

    state.set_all(vec![bus("bus-1", BusStatus::OnRoute, 8)]);
    state.upsert_one(bus("bus-1", BusStatus::Arrived, 0));
    state.upsert_one(bus("bus-404", BusStatus::Arrived, 0));

    assert_eq!(rx.try_recv().unwrap(), StateChange::BusesReplaced { count: 1 });
    match rx.try_recv().unwrap() {
        StateChange::BusUpdated(b) => assert_eq!(b.status, BusStatus::Arrived),
        other => panic!("Expected BusUpdated, got {:?}", other),
    }
    // Ignored updates are not broadcast
    assert!(matches!(
        rx.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}

#[test]
fn test_seed_load_broadcasts_both_replacements() {
    let state = FleetState::new();
    let mut rx = state.subscribe();

    state.load_seed(Seed::demo());

    assert_eq!(
        rx.try_recv().unwrap(),
        StateChange::NotificationsReplaced { count: 5 }
    );
    assert_eq!(rx.try_recv().unwrap(), StateChange::BusesReplaced { count: 5 });
}

#[test]
fn test_notifications_newest_first_and_mark_read() {
    let state = FleetState::new();
    state.set_notifications(demo_notifications());
    assert_eq!(state.unread_count(), 3);

    let incoming = Notification::new("Bus SB-104 Arrived", "SB-104 reached Mall Junction.", Severity::Success);
    let id = incoming.id.clone();
    state.add_notification(incoming);

    let notifications = state.notifications();
    assert_eq!(notifications.len(), 6);
    assert_eq!(notifications[0].id, id);
    assert_eq!(state.unread_count(), 4);

    assert!(state.mark_notification_read(&id));
    assert!(!state.mark_notification_read(&id));
    assert!(!state.mark_notification_read("no-such-id"));
    assert_eq!(state.unread_count(), 3);
}

#[test]
fn test_attach_routes_events_into_state() {
    let router = EventRouter::new();
    let state = Arc::new(FleetState::new());
    state.set_all(vec![
        bus("bus-1", BusStatus::OnRoute, 8),
        bus("bus-2", BusStatus::Idle, 0),
    ]);
    let projection = state.attach(&router);

    let event = FeedEvent::BusLocation(bus("bus-1", BusStatus::Delayed, 20));
    let report = router.dispatch(BUS_LOCATION_TOPIC, &event);
    assert_eq!(report.delivered, 1);

    let note = Notification::new("Delay", "SB-1 delayed", Severity::Warning);
    router.dispatch(NOTIFICATION_TOPIC, &FeedEvent::Notification(note));

    assert_eq!(state.get("bus-1").unwrap().status, BusStatus::Delayed);
    assert_eq!(state.get("bus-2").unwrap().status, BusStatus::Idle);
    assert_eq!(state.unread_count(), 1);

    projection.detach(&router);
    assert_eq!(router.handler_count(BUS_LOCATION_TOPIC), 0);
    assert_eq!(router.handler_count(NOTIFICATION_TOPIC), 0);

    // Detached: updates no longer reach the snapshot
    router.dispatch(
        BUS_LOCATION_TOPIC,
        &FeedEvent::BusLocation(bus("bus-1", BusStatus::Arrived, 0)),
    );
    assert_eq!(state.get("bus-1").unwrap().status, BusStatus::Delayed);
}

#[test]
fn test_projection_rejects_mismatched_event() {
    let router = EventRouter::new();
    let state = Arc::new(FleetState::new());
    let _projection = state.attach(&router);

    let wrong = FeedEvent::Other {
        topic: BUS_LOCATION_TOPIC.to_string(),
        data: serde_json::json!({}),
    };
    let report = router.dispatch(BUS_LOCATION_TOPIC, &wrong);
    assert_eq!(report.failed, 1);
}

#[test]
fn test_summary_kpis() {
    let now = Utc.with_ymd_and_hms(2026, 2, 22, 7, 1, 0).unwrap();
    let state = FleetState::new();

    let mut full = bus("bus-3", BusStatus::Delayed, 18);
    full.occupancy = 42;
    let mut silent = bus("bus-4", BusStatus::Idle, 0);
    silent.occupancy = 0;
    silent.last_updated = now - Duration::minutes(10);

    state.set_all(vec![
        bus("bus-1", BusStatus::OnRoute, 8),
        bus("bus-2", BusStatus::Approaching, 3),
        full,
        silent,
    ]);

    let summary = state.summary(now, Duration::seconds(120));
    assert_eq!(summary.total, 4);
    assert_eq!(summary.active, 3);
    assert_eq!(summary.onboard, 20 + 20 + 42);
    assert_eq!(summary.capacity, 160);
    assert_eq!(summary.delayed(), 1);
    assert_eq!(summary.by_status.idle, 1);
    assert_eq!(summary.by_status.on_route, 1);
    assert_eq!(summary.over_capacity, 1);
    assert_eq!(summary.stale, 1);
    assert!((summary.occupancy_rate() - 82.0 / 160.0).abs() < 1e-9);
}

#[test]
fn test_summary_of_empty_fleet() {
    let summary = FleetSummary::from_snapshot(&[], Utc::now(), Duration::seconds(60));
    assert_eq!(summary, FleetSummary::default());
    assert_eq!(summary.occupancy_rate(), 0.0);
}

#[test]
fn test_search_matches_number_route_and_driver() {
    let state = FleetState::new();
    state.set_all(demo_fleet());

    assert_eq!(state.search("sb-103").len(), 1);
    assert_eq!(state.search("route").len(), 5);
    assert_eq!(state.search("LINA")[0].bus_id, "bus-4");
    assert!(state.search("nobody").is_empty());
}

#[test]
fn test_load_seed_from_file() {
    let seed = Seed::demo();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", serde_json::to_string(&seed).unwrap()).unwrap();

    let loaded = load_seed(file.path()).unwrap();
    assert_eq!(loaded.buses.len(), 5);
    assert_eq!(loaded.notifications.len(), 5);

    let state = FleetState::new();
    state.load_seed(loaded);
    assert_eq!(state.len(), 5);
    assert_eq!(state.unread_count(), 3);
}

#[test]
fn test_load_seed_rejects_garbage() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[1, 2, 3]").unwrap();

    let err = load_seed(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse seed file"));
}

#[test]
fn test_concurrent_updates() {
    let state = Arc::new(FleetState::new());
    state.set_all((0..10).map(|i| bus(&format!("bus-{}", i), BusStatus::Idle, 0)).collect());

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                state.upsert_one(bus(&format!("bus-{}", i), BusStatus::OnRoute, i));
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(state.len(), 10);
    assert!(state.snapshot().iter().all(|b| b.status == BusStatus::OnRoute));
}

use super::*;
use crate::state::{BusStatus, Severity};
use serde_json::json;

fn bus_payload() -> serde_json::Value {
    json!({
        "busId": "bus-1",
        "busNumber": "SB-101",
        "lat": 33.8886,
        "lng": 35.4955,
        "speed": 35,
        "heading": 45,
        "occupancy": 28,
        "capacity": 40,
        "status": "on-route",
        "routeName": "Route Alpha",
        "nextStop": "City Center",
        "eta": 8,
        "driverName": "Ahmad K.",
        "lastUpdated": "2026-02-22T07:15:00Z"
    })
}

#[test]
fn test_decode_bus_location() {
    let text = json!({"type": "bus-location", "data": bus_payload()}).to_string();

    let event = FeedEvent::decode(&text).unwrap();
    assert_eq!(event.topic(), BUS_LOCATION_TOPIC);

    match event {
        FeedEvent::BusLocation(bus) => {
            assert_eq!(bus.bus_id, "bus-1");
            assert_eq!(bus.bus_number, "SB-101");
            assert_eq!(bus.status, BusStatus::OnRoute);
            assert_eq!(bus.eta, 8);
            assert_eq!(bus.driver_name, "Ahmad K.");
            assert_eq!(bus.last_updated.to_rfc3339(), "2026-02-22T07:15:00+00:00");
        }
        other => panic!("Expected BusLocation, got {:?}", other),
    }
}

#[test]
fn test_decode_notification_defaults_unread() {
    let text = json!({
        "type": "notification",
        "data": {
            "id": "n-1",
            "title": "Bus SB-105 Delayed",
            "message": "SB-105 is running 10 minutes behind schedule.",
            "type": "warning",
            "timestamp": "2026-02-22T07:20:00Z"
        }
    })
    .to_string();

    match FeedEvent::decode(&text).unwrap() {
        FeedEvent::Notification(n) => {
            assert_eq!(n.id, "n-1");
            assert_eq!(n.severity, Severity::Warning);
            assert!(!n.read);
        }
        other => panic!("Expected Notification, got {:?}", other),
    }
}

#[test]
fn test_unknown_topic_passes_through_raw() {
    let text = json!({"type": "attendance", "data": {"studentId": "s-1"}}).to_string();

    let event = FeedEvent::decode(&text).unwrap();
    assert_eq!(event.topic(), "attendance");
    assert_eq!(
        event,
        FeedEvent::Other {
            topic: "attendance".to_string(),
            data: json!({"studentId": "s-1"}),
        }
    );
}

#[test]
fn test_unparsable_text_is_malformed() {
    let result = FeedEvent::decode("not json at all");
    assert!(matches!(result, Err(DecodeError::Malformed(_))));
}

#[test]
fn test_missing_type_is_malformed() {
    let result = FeedEvent::decode(&json!({"data": {}}).to_string());
    assert!(matches!(result, Err(DecodeError::Malformed(_))));
}

#[test]
fn test_empty_type_rejected() {
    let result = FeedEvent::decode(&json!({"type": "", "data": {}}).to_string());
    assert_eq!(result.unwrap_err(), DecodeError::MissingTopic);
}

#[test]
fn test_wrong_shape_for_known_topic_rejected() {
    let text = json!({"type": "bus-location", "data": {"busId": "bus-1"}}).to_string();

    match FeedEvent::decode(&text).unwrap_err() {
        DecodeError::InvalidPayload { topic, .. } => assert_eq!(topic, "bus-location"),
        other => panic!("Expected InvalidPayload, got {:?}", other),
    }
}

#[test]
fn test_unknown_status_rejected() {
    let mut payload = bus_payload();
    payload["status"] = json!("teleporting");
    let text = json!({"type": "bus-location", "data": payload}).to_string();

    assert!(matches!(
        FeedEvent::decode(&text),
        Err(DecodeError::InvalidPayload { .. })
    ));
}

#[test]
fn test_out_of_range_heading_rejected() {
    let mut payload = bus_payload();
    payload["heading"] = json!(360);
    let text = json!({"type": "bus-location", "data": payload}).to_string();

    assert_eq!(
        FeedEvent::decode(&text).unwrap_err(),
        DecodeError::InvalidValue {
            field: "heading",
            value: 360.0
        }
    );
}

#[test]
fn test_out_of_range_latitude_rejected() {
    let mut payload = bus_payload();
    payload["lat"] = json!(91.5);
    let text = json!({"type": "bus-location", "data": payload}).to_string();

    assert!(matches!(
        FeedEvent::decode(&text),
        Err(DecodeError::InvalidValue { field: "lat", .. })
    ));
}

#[test]
fn test_negative_eta_rejected() {
    let mut payload = bus_payload();
    payload["eta"] = json!(-3);
    let text = json!({"type": "bus-location", "data": payload}).to_string();

    assert!(matches!(
        FeedEvent::decode(&text),
        Err(DecodeError::InvalidPayload { .. })
    ));
}

#[test]
fn test_over_capacity_is_accepted() {
    let mut payload = bus_payload();
    payload["occupancy"] = json!(45);
    let text = json!({"type": "bus-location", "data": payload}).to_string();

    match FeedEvent::decode(&text).unwrap() {
        FeedEvent::BusLocation(bus) => assert!(bus.is_over_capacity()),
        other => panic!("Expected BusLocation, got {:?}", other),
    }
}

#[test]
fn test_encoded_event_uses_wire_names() {
    let text = json!({"type": "bus-location", "data": bus_payload()}).to_string();
    let event = FeedEvent::decode(&text).unwrap();

    let encoded: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
    assert_eq!(encoded["type"], "bus-location");
    assert_eq!(encoded["data"]["busNumber"], "SB-101");
    assert_eq!(encoded["data"]["status"], "on-route");
    assert_eq!(encoded["data"]["nextStop"], "City Center");
}

//! Message gateway: acknowledgements, validation and id discipline

mod common;

use bridge_core::PlatformKind;
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_valid_command_is_acknowledged() {
    let t = TestBridge::new();
    let mut conn = t.connect();

    let reply = conn.send(add("sensor", "temp", json!({}))).await;

    assert_ack(&reply, 1);
    assert!(t.entity("temp").is_some());
    // Exactly one reply per frame
    assert!(conn.recv().is_none());
}

#[tokio::test]
async fn test_ack_precedes_entity_traffic() {
    let t = TestBridge::new();
    let mut conn = t.connect();
    conn.send(add("switch", "relay", json!({}))).await;

    let entity = t.entity("relay").unwrap();
    let reply = conn.send(state("relay", json!(false), None)).await;
    assert_ack(&reply, 2);

    entity.turn_on().await.unwrap();
    let event = conn.recv().unwrap();
    assert_eq!(event["type"], "event");
    assert_eq!(event["id"], 1);
}

#[tokio::test]
async fn test_id_reuse_is_rejected() {
    let t = TestBridge::new();
    let mut conn = t.connect();

    let mut frame = add("sensor", "temp", json!({}));
    frame["id"] = json!(5);
    assert_ack(&conn.send_as_is(frame).await, 5);

    let mut frame = state("temp", json!(20), None);
    frame["id"] = json!(5);
    let reply = conn.send_as_is(frame.clone()).await;
    assert_error(&reply, "id_reuse");
    assert_eq!(reply["id"], 5);

    frame["id"] = json!(3);
    assert_error(&conn.send_as_is(frame).await, "id_reuse");

    // The rejected state never reached the entity
    let entity_id = t.entity_id(PlatformKind::Sensor, "temp").unwrap();
    t.assert_state(&entity_id, "unknown");
}

#[tokio::test]
async fn test_ids_are_per_connection() {
    let t = TestBridge::new();
    let mut first = t.connect();
    let mut second = t.connect();

    assert_ack(&first.send(add("sensor", "a", json!({}))).await, 1);
    assert_ack(&second.send(add("sensor", "b", json!({}))).await, 1);
}

#[tokio::test]
async fn test_unknown_command() {
    let t = TestBridge::new();
    let mut conn = t.connect();

    let reply = conn
        .send(json!({"type": "bridge/entity/explode", "entity_slug": "x"}))
        .await;

    assert_error(&reply, "unknown_command");
    assert_eq!(reply["id"], 1);
}

#[tokio::test]
async fn test_schema_violation_names_the_field() {
    let t = TestBridge::new();
    let mut conn = t.connect();

    let mut frame = add("sensor", "temp", json!({}));
    frame["entity_slug"] = json!(42);
    let reply = conn.send(frame).await;

    assert_error(&reply, "invalid_format");
    let message = reply["error"]["message"].as_str().unwrap();
    assert!(message.contains("entity_slug"), "message: {message}");
    assert!(t.data().discovered.is_empty());
}

#[tokio::test]
async fn test_missing_required_field() {
    let t = TestBridge::new();
    let mut conn = t.connect();

    let mut frame = add("sensor", "temp", json!({}));
    frame.as_object_mut().unwrap().remove("config");
    let reply = conn.send(frame).await;

    assert_error(&reply, "invalid_format");
    let message = reply["error"]["message"].as_str().unwrap();
    assert!(message.contains("config"), "message: {message}");
    assert!(t.entity("temp").is_none());
}

#[tokio::test]
async fn test_unexpected_field_is_rejected() {
    let t = TestBridge::new();
    let mut conn = t.connect();

    let mut frame = state("temp", json!(1), None);
    frame["colour"] = json!("red");

    assert_error(&conn.send(frame).await, "invalid_format");
}

#[tokio::test]
async fn test_available_requires_field() {
    let t = TestBridge::new();
    let mut conn = t.connect();
    conn.send(add("sensor", "temp", json!({}))).await;

    let mut frame = available("temp", json!(false));
    frame.as_object_mut().unwrap().remove("available");

    assert_error(&conn.send(frame).await, "invalid_format");
    assert!(t.entity("temp").unwrap().is_available());
}

#[tokio::test]
async fn test_unparsable_text() {
    let t = TestBridge::new();
    let mut conn = t.connect();

    let reply = conn.send_text("{not json").await;

    assert_error(&reply, "invalid_format");
    assert_eq!(reply["id"], 0);
}

#[tokio::test]
async fn test_state_for_unknown_identity_is_acknowledged() {
    let t = TestBridge::new();
    let mut conn = t.connect();

    let reply = conn.send(state("ghost", json!(1), None)).await;

    assert_ack(&reply, 1);
    assert!(t.hass().states.all().is_empty());
}

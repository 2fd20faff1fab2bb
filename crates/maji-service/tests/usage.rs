//! Consumption reporting integration tests.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{assert_quantity, TestHarness};

async fn report(harness: &TestHarness, meter: &str, water_used: f64) -> Value {
    let response = harness
        .server
        .post("/v1/usage")
        .json(&json!({ "meterNumber": meter, "waterUsed": water_used }))
        .await;
    response.assert_status_ok();
    response.json()
}

async fn alerts(harness: &TestHarness, meter: &str) -> Vec<Value> {
    let response = harness
        .server
        .get(&format!("/v1/meters/{meter}/alerts"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["alerts"].as_array().unwrap().clone()
}

#[tokio::test]
async fn consumption_into_warning_raises_one_low_balance_alert() {
    let harness = TestHarness::new();
    harness.fund_meter("ws_CO_1", "MTR1", 100.0).await;

    let body = report(&harness, "MTR1", 95.0).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["meterNumber"], "MTR1");
    assert_quantity(&body["remainingQuantity"], 5.0);
    assert_eq!(body["status"], "warning");

    let alerts = alerts(&harness, "MTR1").await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["kind"], "low_balance");
    assert_eq!(alerts[0]["priority"], "medium");
    assert_quantity(&alerts[0]["remainingQuantity"], 5.0);
    assert_eq!(alerts[0]["resolved"], false);
}

#[tokio::test]
async fn remaining_equal_to_threshold_is_warning() {
    let harness = TestHarness::new();
    harness.fund_meter("ws_CO_1", "MTR1", 100.0).await;

    let body = report(&harness, "MTR1", 90.0).await;
    assert_quantity(&body["remainingQuantity"], 10.0);
    assert_eq!(body["status"], "warning");
}

#[tokio::test]
async fn consumption_to_zero_shuts_off() {
    let harness = TestHarness::new();
    harness.fund_meter("ws_CO_1", "MTR1", 100.0).await;

    let body = report(&harness, "MTR1", 100.0).await;
    assert_quantity(&body["remainingQuantity"], 0.0);
    assert_eq!(body["status"], "depleted");

    let alerts = alerts(&harness, "MTR1").await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["kind"], "water_shutoff");
    assert_eq!(alerts[0]["priority"], "high");
}

#[tokio::test]
async fn overdraw_goes_negative() {
    let harness = TestHarness::new();
    harness.fund_meter("ws_CO_1", "MTR1", 10.0).await;

    let body = report(&harness, "MTR1", 25.0).await;
    assert_quantity(&body["remainingQuantity"], -15.0);
    assert_eq!(body["status"], "depleted");

    let response = harness.server.get("/v1/meters/MTR1").await;
    let balance: Value = response.json();
    assert_quantity(&balance["consumptionTotal"], 25.0);
    assert_quantity(&balance["lastConsumption"], 25.0);
    assert_quantity(&balance["totalPurchased"], 10.0);
}

#[tokio::test]
async fn top_up_after_depletion_reactivates() {
    let harness = TestHarness::new();
    harness.fund_meter("ws_CO_1", "MTR1", 10.0).await;
    report(&harness, "MTR1", 25.0).await;

    harness.fund_meter("ws_CO_2", "MTR1", 100.0).await;

    let response = harness.server.get("/v1/meters/MTR1").await;
    let balance: Value = response.json();
    assert_quantity(&balance["remainingQuantity"], 85.0);
    assert_eq!(balance["status"], "active");
}

#[tokio::test]
async fn top_up_that_leaves_meter_overdrawn_raises_shutoff() {
    let harness = TestHarness::new();
    harness.fund_meter("ws_CO_1", "MTR1", 10.0).await;
    report(&harness, "MTR1", 60.0).await;

    harness.fund_meter("ws_CO_2", "MTR1", 20.0).await;

    let response = harness.server.get("/v1/meters/MTR1").await;
    let balance: Value = response.json();
    assert_quantity(&balance["remainingQuantity"], -30.0);
    assert_eq!(balance["status"], "depleted");

    let shutoffs = alerts(&harness, "MTR1")
        .await
        .into_iter()
        .filter(|a| a["kind"] == "water_shutoff")
        .count();
    assert_eq!(shutoffs, 2);
}

#[tokio::test]
async fn zero_consumption_is_accepted() {
    let harness = TestHarness::new();
    harness.fund_meter("ws_CO_1", "MTR1", 100.0).await;

    let body = report(&harness, "MTR1", 0.0).await;
    assert_quantity(&body["remainingQuantity"], 100.0);
    assert_eq!(body["status"], "active");
    assert!(alerts(&harness, "MTR1").await.is_empty());
}

#[tokio::test]
async fn unknown_meter_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/usage")
        .json(&json!({ "meterNumber": "NOPE", "waterUsed": 1.0 }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn negative_consumption_is_rejected() {
    let harness = TestHarness::new();
    harness.fund_meter("ws_CO_1", "MTR1", 100.0).await;

    let response = harness
        .server
        .post("/v1/usage")
        .json(&json!({ "meterNumber": "MTR1", "waterUsed": -3.0 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "validation_error");

    let balance: Value = harness.server.get("/v1/meters/MTR1").await.json();
    assert_quantity(&balance["remainingQuantity"], 100.0);
}

#[tokio::test]
async fn numeric_string_consumption_is_accepted() {
    let harness = TestHarness::new();
    harness.fund_meter("ws_CO_1", "MTR1", 100.0).await;

    let response = harness
        .server
        .post("/v1/usage")
        .json(&json!({ "meterNumber": "MTR1", "waterUsed": "5" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_quantity(&body["remainingQuantity"], 95.0);
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn malformed_report_is_rejected() {
    let harness = TestHarness::new();

    for body in [
        json!({ "meterNumber": "MTR1" }),
        json!({ "waterUsed": 1.0 }),
        json!({ "meterNumber": "MTR1", "waterUsed": "lots" }),
        json!({ "meterNumber": "  ", "waterUsed": 1.0 }),
    ] {
        let response = harness.server.post("/v1/usage").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: Value = response.json();
        assert_eq!(error["code"], "validation_error", "body: {body}");
    }
}

//! Dispensing transaction integration tests for pharmacy-service.

mod common;

use common::{dispense_body, spawn_app};
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn dispense_decrements_stock_and_appends_record() {
    let Some(app) = spawn_app().await else { return };
    let item_id = app.create_item_with_stock(10, 10).await;

    let response = app.dispense(&item_id, &dispense_body(1)).await;
    assert_eq!(response.status(), 201);

    let record: Value = response.json().await.expect("invalid JSON");
    assert_eq!(record["inventory_item_id"].as_str().unwrap(), item_id);
    assert_eq!(record["quantity_dispensed"], 1);
    assert_eq!(record["dispensed_by"], "staff-test");

    let item: Value = app
        .get_item(&item_id)
        .await
        .json()
        .await
        .expect("invalid JSON");
    assert_eq!(item["quantity"], 9);
    // still at or below the reorder level
    assert_eq!(item["low_stock"], true);
}

#[tokio::test]
async fn dispense_beyond_stock_is_rejected_with_available_quantity() {
    let Some(app) = spawn_app().await else { return };
    let item_id = app.create_item_with_stock(4, 10).await;

    let response = app.dispense(&item_id, &dispense_body(10)).await;
    assert_eq!(response.status(), 409);

    let error: Value = response.json().await.expect("invalid JSON");
    let message = error["error"].as_str().expect("missing error message");
    assert!(message.contains("only 4 available"), "message: {message}");

    // the failed dispense left no trace
    let item: Value = app
        .get_item(&item_id)
        .await
        .json()
        .await
        .expect("invalid JSON");
    assert_eq!(item["quantity"], 4);

    let records: Value = app
        .list_dispensed(&format!("inventory_item_id={item_id}"))
        .await
        .json()
        .await
        .expect("invalid JSON");
    assert!(records.as_array().expect("records").is_empty());
}

#[tokio::test]
async fn dispense_non_positive_quantity_is_rejected() {
    let Some(app) = spawn_app().await else { return };
    let item_id = app.create_item_with_stock(10, 5).await;

    let response = app.dispense(&item_id, &dispense_body(0)).await;
    assert_eq!(response.status(), 422);

    let response = app.dispense(&item_id, &dispense_body(-3)).await;
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn dispense_from_missing_item_returns_404() {
    let Some(app) = spawn_app().await else { return };

    let response = app
        .dispense("99999999-9999-9999-9999-999999999999", &dispense_body(1))
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn dispense_down_to_zero_succeeds() {
    let Some(app) = spawn_app().await else { return };
    let item_id = app.create_item_with_stock(3, 5).await;

    let response = app.dispense(&item_id, &dispense_body(3)).await;
    assert_eq!(response.status(), 201);

    let item: Value = app
        .get_item(&item_id)
        .await
        .json()
        .await
        .expect("invalid JSON");
    assert_eq!(item["quantity"], 0);
}

#[tokio::test]
async fn concurrent_dispenses_cannot_jointly_exceed_stock() {
    let Some(app) = spawn_app().await else { return };
    let item_id = app.create_item_with_stock(5, 2).await;

    // Two racing requests for 3 of 5 units: exactly one may win.
    let body_a = dispense_body(3);
    let body_b = dispense_body(3);
    let (first, second) = futures::join!(
        app.dispense(&item_id, &body_a),
        app.dispense(&item_id, &body_b),
    );

    let statuses = [first.status().as_u16(), second.status().as_u16()];
    assert!(
        statuses.contains(&201) && statuses.contains(&409),
        "expected one success and one conflict, got {statuses:?}"
    );

    let item: Value = app
        .get_item(&item_id)
        .await
        .json()
        .await
        .expect("invalid JSON");
    assert_eq!(item["quantity"], 2);

    let records: Value = app
        .list_dispensed(&format!("inventory_item_id={item_id}"))
        .await
        .json()
        .await
        .expect("invalid JSON");
    assert_eq!(records.as_array().expect("records").len(), 1);
}

#[tokio::test]
async fn dispensing_history_is_filterable_by_patient() {
    let Some(app) = spawn_app().await else { return };
    let item_id = app.create_item_with_stock(20, 5).await;
    let patient_id = Uuid::new_v4();

    app.dispense(
        &item_id,
        &json!({ "patient_id": patient_id, "quantity": 2, "dispensed_by": "staff-test" }),
    )
    .await;
    app.dispense(&item_id, &dispense_body(4)).await;

    let records: Value = app
        .list_dispensed(&format!("patient_id={patient_id}"))
        .await
        .json()
        .await
        .expect("invalid JSON");
    let records = records.as_array().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["quantity_dispensed"], 2);
}

//! End-to-end tests for the order lifecycle: creation, status transitions
//! with cascades, engineer assignment, scheduling, and auto-progression.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, FixedOffset, TimeZone};
use common::{order_payload, response_json, TestApp, LONG_REASON};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

async fn create_order(app: &TestApp, items: &[(&str, &str, &str)]) -> Value {
    let response = app
        .request(Method::POST, "/api/v1/orders", Some(order_payload(items)))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await["data"].clone()
}

async fn set_order_status(
    app: &TestApp,
    order_id: &str,
    status: &str,
    reason: Option<&str>,
) -> axum::response::Response {
    let mut payload = json!({ "status": status });
    if let Some(reason) = reason {
        payload["reason"] = json!(reason);
    }
    app.request(
        Method::PUT,
        &format!("/api/v1/orders/{}/status", order_id),
        Some(payload),
    )
    .await
}

async fn get_order(app: &TestApp, order_id: &str) -> Value {
    let response = app
        .request(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await["data"].clone()
}

async fn assign(
    app: &TestApp,
    order_id: &str,
    item_id: &str,
    employee_id: &str,
) -> axum::response::Response {
    app.request(
        Method::POST,
        &format!("/api/v1/orders/{}/items/{}/assign", order_id, item_id),
        Some(json!({ "employee_id": employee_id })),
    )
    .await
}

async fn update_item(
    app: &TestApp,
    order_id: &str,
    item_id: &str,
    payload: Value,
) -> axum::response::Response {
    app.request(
        Method::PUT,
        &format!("/api/v1/orders/{}/items/{}", order_id, item_id),
        Some(payload),
    )
    .await
}

fn item_ids(order: &Value) -> Vec<String> {
    order["items"]
        .as_array()
        .expect("order items array")
        .iter()
        .map(|item| item["id"].as_str().expect("item id").to_string())
        .collect()
}

fn decimal(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("decimal serialized as string"))
        .expect("parseable decimal")
}

// ==================== Creation ====================

#[tokio::test]
async fn create_order_computes_totals_and_starts_pending() {
    let app = TestApp::new().await;

    let order = create_order(
        &app,
        &[("Tap Repair", "plumbing", "499.00"), ("Deep Cleaning", "cleaning", "1299.00")],
    )
    .await;

    assert_eq!(order["status"], "pending");
    assert!(order["order_number"]
        .as_str()
        .unwrap()
        .starts_with("FS-"));
    assert_eq!(decimal(&order["subtotal"]), Decimal::from_str("1798.00").unwrap());
    assert_eq!(decimal(&order["final_amount"]), Decimal::from_str("1798.00").unwrap());

    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    for item in items {
        assert_eq!(item["status"], "pending");
        assert!(item["engineer_id"].is_null());
    }
    // Presentation order is insertion order.
    assert_eq!(items[0]["service_name"], "Tap Repair");
    assert_eq!(items[1]["service_name"], "Deep Cleaning");
}

#[tokio::test]
async fn final_amount_round_trips_from_components() {
    let app = TestApp::new().await;

    let mut payload = order_payload(&[("Tap Repair", "plumbing", "499.00")]);
    payload["discount"] = json!("100.00");
    payload["tax"] = json!("89.82");
    payload["service_charge"] = json!("49.00");

    let response = app
        .request(Method::POST, "/api/v1/orders", Some(payload))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = response_json(response).await["data"].clone();

    let recomputed = decimal(&order["subtotal"]) - decimal(&order["discount"])
        + decimal(&order["tax"])
        + decimal(&order["service_charge"]);
    assert_eq!(recomputed, decimal(&order["final_amount"]));
}

#[tokio::test]
async fn negative_final_amount_is_rejected() {
    let app = TestApp::new().await;

    let mut payload = order_payload(&[("Tap Repair", "plumbing", "499.00")]);
    payload["discount"] = json!("1000.00");

    let response = app
        .request(Method::POST, "/api/v1/orders", Some(payload))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ==================== Cancellation ====================

#[tokio::test]
async fn cancel_requires_ten_word_reason() {
    let app = TestApp::new().await;
    let order = create_order(&app, &[("Tap Repair", "plumbing", "499.00")]).await;
    let order_id = order["id"].as_str().unwrap();

    let nine_words = "one two three four five six seven eight nine";
    let response = set_order_status(&app, order_id, "cancelled", Some(nine_words)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let ten_words = "one two three four five six seven eight nine ten";
    let response = set_order_status(&app, order_id, "cancelled", Some(ten_words)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn cancellation_cascades_to_every_item() {
    let app = TestApp::new().await;
    let order = create_order(
        &app,
        &[
            ("Tap Repair", "plumbing", "499.00"),
            ("Deep Cleaning", "cleaning", "1299.00"),
            ("Fan Installation", "electrical", "349.00"),
        ],
    )
    .await;
    let order_id = order["id"].as_str().unwrap();
    let ids = item_ids(&order);

    // Complete one item first; the cascade must still force it to cancelled.
    let response = update_item(&app, order_id, &ids[0], json!({ "status": "completed" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = set_order_status(&app, order_id, "cancelled", Some(LONG_REASON)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let order = get_order(&app, order_id).await;
    assert_eq!(order["status"], "cancelled");
    for item in order["items"].as_array().unwrap() {
        assert_eq!(item["status"], "cancelled");
    }
}

#[tokio::test]
async fn cancelled_orders_freeze_item_statuses() {
    let app = TestApp::new().await;
    let order = create_order(&app, &[("Tap Repair", "plumbing", "499.00")]).await;
    let order_id = order["id"].as_str().unwrap();
    let ids = item_ids(&order);

    let response = set_order_status(&app, order_id, "cancelled", Some(LONG_REASON)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = update_item(&app, order_id, &ids[0], json!({ "status": "completed" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ==================== Auto-progression ====================

#[tokio::test]
async fn assigning_last_open_item_auto_schedules_the_order() {
    let app = TestApp::new().await;
    let plumber = app.seed_engineer("ENG-001", "Ravi", &["Plumbing"]).await;
    let cleaner = app.seed_engineer("ENG-002", "Leela", &["Cleaning"]).await;

    let order = create_order(
        &app,
        &[("Tap Repair", "plumbing", "499.00"), ("Deep Cleaning", "cleaning", "1299.00")],
    )
    .await;
    let order_id = order["id"].as_str().unwrap();
    let ids = item_ids(&order);

    let response = set_order_status(&app, order_id, "confirmed", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    // First assignment: one item still unassigned, no order transition.
    let response = assign(&app, order_id, &ids[0], &plumber.to_string()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = response_json(response).await["data"].clone();
    assert!(outcome["auto_transition"].is_null());
    assert_eq!(get_order(&app, order_id).await["status"], "confirmed");

    // Last assignment: trigger fires, order moves to scheduled.
    let response = assign(&app, order_id, &ids[1], &cleaner.to_string()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = response_json(response).await["data"].clone();
    assert_eq!(outcome["auto_transition"], "scheduled");
    assert_eq!(get_order(&app, order_id).await["status"], "scheduled");
}

#[tokio::test]
async fn completing_every_item_completes_the_order() {
    let app = TestApp::new().await;
    let plumber = app.seed_engineer("ENG-001", "Ravi", &["Plumbing"]).await;
    let cleaner = app.seed_engineer("ENG-002", "Leela", &["Cleaning"]).await;

    let order = create_order(
        &app,
        &[("Tap Repair", "plumbing", "499.00"), ("Deep Cleaning", "cleaning", "1299.00")],
    )
    .await;
    let order_id = order["id"].as_str().unwrap();
    let ids = item_ids(&order);

    set_order_status(&app, order_id, "confirmed", None).await;
    assign(&app, order_id, &ids[0], &plumber.to_string()).await;
    assign(&app, order_id, &ids[1], &cleaner.to_string()).await;

    // First completion leaves the order alone.
    let response = update_item(&app, order_id, &ids[0], json!({ "status": "completed" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = response_json(response).await["data"].clone();
    assert!(outcome["auto_transition"].is_null());

    // Last completion completes the order and normalizes every item.
    let response = update_item(&app, order_id, &ids[1], json!({ "status": "completed" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = response_json(response).await["data"].clone();
    assert_eq!(outcome["auto_transition"], "completed");

    let order = get_order(&app, order_id).await;
    assert_eq!(order["status"], "completed");
    for item in order["items"].as_array().unwrap() {
        assert_eq!(item["status"], "completed");
        assert!(!item["completed_at"].is_null());
    }
}

// ==================== Start-work gate ====================

#[tokio::test]
async fn starting_work_requires_every_item_scheduled() {
    let app = TestApp::new().await;
    let plumber = app.seed_engineer("ENG-001", "Ravi", &["Plumbing"]).await;
    let cleaner = app.seed_engineer("ENG-002", "Leela", &["Cleaning"]).await;

    let order = create_order(
        &app,
        &[("Tap Repair", "plumbing", "499.00"), ("Deep Cleaning", "cleaning", "1299.00")],
    )
    .await;
    let order_id = order["id"].as_str().unwrap();
    let ids = item_ids(&order);

    set_order_status(&app, order_id, "confirmed", None).await;
    assign(&app, order_id, &ids[0], &plumber.to_string()).await;
    assign(&app, order_id, &ids[1], &cleaner.to_string()).await;
    assert_eq!(get_order(&app, order_id).await["status"], "scheduled");

    // Only the first item gets a visit window.
    let response = update_item(
        &app,
        order_id,
        &ids[0],
        json!({ "scheduled_date": "2030-05-20", "time_slot": "09:00-11:00" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The rejection names the unscheduled item and what it is missing.
    let response = set_order_status(&app, order_id, "in_progress", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("Deep Cleaning"));
    assert!(message.contains("date and time slot"));

    // Scheduling the second item opens the gate.
    let response = update_item(
        &app,
        order_id,
        &ids[1],
        json!({ "scheduled_date": "2030-05-20", "time_slot": "11:00-13:00" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = set_order_status(&app, order_id, "in_progress", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_order(&app, order_id).await["status"], "in_progress");
}

// ==================== Postpone / resume ====================

#[tokio::test]
async fn resume_resets_item_statuses_but_keeps_assignments() {
    let app = TestApp::new().await;
    let plumber = app.seed_engineer("ENG-001", "Ravi", &["Plumbing"]).await;

    let order = create_order(&app, &[("Tap Repair", "plumbing", "499.00")]).await;
    let order_id = order["id"].as_str().unwrap();
    let ids = item_ids(&order);

    set_order_status(&app, order_id, "confirmed", None).await;
    assign(&app, order_id, &ids[0], &plumber.to_string()).await;
    // Auto-scheduled; mark the item as being worked for good measure.
    update_item(&app, order_id, &ids[0], json!({ "status": "in_progress" })).await;

    let response = set_order_status(&app, order_id, "postponed", Some(LONG_REASON)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_order(&app, order_id).await["status"], "postponed");

    // Resume: full workflow restart, assignment history preserved.
    let response = set_order_status(&app, order_id, "pending", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let order = get_order(&app, order_id).await;
    assert_eq!(order["status"], "pending");
    let item = &order["items"][0];
    assert_eq!(item["status"], "pending");
    assert_eq!(item["engineer_id"], plumber.to_string());
    assert!(!item["engineer_name"].is_null());
}

#[tokio::test]
async fn postponed_orders_resume_only_to_pending() {
    let app = TestApp::new().await;
    let order = create_order(&app, &[("Tap Repair", "plumbing", "499.00")]).await;
    let order_id = order["id"].as_str().unwrap();

    set_order_status(&app, order_id, "postponed", Some(LONG_REASON)).await;

    let response = set_order_status(&app, order_id, "confirmed", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ==================== Auto-assignment ====================

#[tokio::test]
async fn auto_assign_prefers_least_loaded_and_reports_skipped_items() {
    let app = TestApp::new().await;
    let busy = app.seed_engineer("ENG-001", "Ravi", &["Plumbing"]).await;
    let idle = app.seed_engineer("ENG-002", "Sunita", &["Plumbing"]).await;

    // Give the first plumber an open task so they are the busier choice.
    let earlier = create_order(&app, &[("Geyser Install", "plumbing", "1499.00")]).await;
    let earlier_id = earlier["id"].as_str().unwrap();
    let earlier_items = item_ids(&earlier);
    assign(&app, earlier_id, &earlier_items[0], &busy.to_string()).await;

    let order = create_order(
        &app,
        &[
            ("Tap Repair", "plumbing", "499.00"),
            ("Aquarium Cleaning", "aquatics", "999.00"),
        ],
    )
    .await;
    let order_id = order["id"].as_str().unwrap();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/auto-assign", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let outcome = &body["data"];

    assert_eq!(outcome["assigned_count"], 1);
    assert_eq!(outcome["skipped_items"][0], "Aquarium Cleaning");

    let order = get_order(&app, order_id).await;
    let items = order["items"].as_array().unwrap();
    // The less-loaded plumber wins; the unknown category stays open.
    assert_eq!(items[0]["engineer_id"], idle.to_string());
    assert!(items[1]["engineer_id"].is_null());
}

// ==================== Assignment rules ====================

#[tokio::test]
async fn assignment_rejects_inactive_engineers_and_flags_mismatch() {
    let app = TestApp::new().await;
    let cleaner = app.seed_engineer("ENG-001", "Leela", &["Cleaning"]).await;
    let retired = app.seed_engineer("ENG-002", "Imran", &["Plumbing"]).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/employees/{}/deactivate", retired),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let order = create_order(&app, &[("Tap Repair", "plumbing", "499.00")]).await;
    let order_id = order["id"].as_str().unwrap();
    let ids = item_ids(&order);

    // Inactive engineers are rejected outright.
    let response = assign(&app, order_id, &ids[0], &retired.to_string()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // A mismatched but active engineer is allowed, with a warning flag.
    let response = assign(&app, order_id, &ids[0], &cleaner.to_string()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["expertise_mismatch"], true);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("expertise area"));
}

#[tokio::test]
async fn unknown_employee_is_not_found() {
    let app = TestApp::new().await;
    let order = create_order(&app, &[("Tap Repair", "plumbing", "499.00")]).await;
    let order_id = order["id"].as_str().unwrap();
    let ids = item_ids(&order);

    let response = assign(
        &app,
        order_id,
        &ids[0],
        "00000000-0000-0000-0000-000000000042",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ==================== Scheduling edge cases ====================

fn ist(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(5 * 3600 + 1800)
        .unwrap()
        .with_ymd_and_hms(y, m, d, hh, mm, 0)
        .unwrap()
}

#[tokio::test]
async fn date_change_clears_a_slot_that_no_longer_fits() {
    use fieldserve_api::services::order_status::UpdateOrderItemRequest;

    let app = TestApp::new().await;
    let order = create_order(&app, &[("Tap Repair", "plumbing", "499.00")]).await;
    let order_id = order["id"].as_str().unwrap().parse().unwrap();
    let item_id = item_ids(&order)[0].parse().unwrap();
    let svc = app.state.services.order_status.clone();

    // Book the early-morning window for tomorrow.
    let outcome = svc
        .update_order_item(
            order_id,
            item_id,
            UpdateOrderItemRequest {
                scheduled_date: Some(chrono::NaiveDate::from_ymd_opt(2030, 5, 21).unwrap()),
                time_slot: Some("07:00-09:00".to_string()),
                ..Default::default()
            },
            ist(2030, 5, 20, 10, 0),
        )
        .await
        .unwrap();
    assert!(!outcome.time_slot_cleared);

    // Pulling the visit to "today" at midday invalidates that window; the
    // slot is cleared and the caller told to pick again.
    let outcome = svc
        .update_order_item(
            order_id,
            item_id,
            UpdateOrderItemRequest {
                scheduled_date: Some(chrono::NaiveDate::from_ymd_opt(2030, 5, 21).unwrap()),
                ..Default::default()
            },
            ist(2030, 5, 21, 12, 0),
        )
        .await
        .unwrap();
    assert!(outcome.time_slot_cleared);
    assert!(outcome.item.time_slot.is_none());
    assert_eq!(
        outcome.item.scheduled_date,
        chrono::NaiveDate::from_ymd_opt(2030, 5, 21)
    );
}

#[tokio::test]
async fn same_day_slot_respects_the_closing_buffer() {
    use fieldserve_api::errors::ServiceError;
    use fieldserve_api::services::order_status::UpdateOrderItemRequest;

    let app = TestApp::new().await;
    let order = create_order(&app, &[("Tap Repair", "plumbing", "499.00")]).await;
    let order_id = order["id"].as_str().unwrap().parse().unwrap();
    let item_id = item_ids(&order)[0].parse().unwrap();
    let svc = app.state.services.order_status.clone();

    let request = |slot: &str| UpdateOrderItemRequest {
        scheduled_date: Some(chrono::NaiveDate::from_ymd_opt(2030, 5, 20).unwrap()),
        time_slot: Some(slot.to_string()),
        ..Default::default()
    };

    // 08:45 + 30min buffer is past the 09:00 close: rejected.
    let rejected = svc
        .update_order_item(order_id, item_id, request("07:00-09:00"), ist(2030, 5, 20, 8, 45))
        .await;
    assert!(matches!(rejected, Err(ServiceError::ValidationError(_))));

    // At 08:00 the same slot is still bookable.
    let accepted = svc
        .update_order_item(order_id, item_id, request("07:00-09:00"), ist(2030, 5, 20, 8, 0))
        .await;
    assert!(accepted.is_ok());
}

#[tokio::test]
async fn past_dates_are_rejected() {
    use fieldserve_api::errors::ServiceError;
    use fieldserve_api::services::order_status::UpdateOrderItemRequest;

    let app = TestApp::new().await;
    let order = create_order(&app, &[("Tap Repair", "plumbing", "499.00")]).await;
    let order_id = order["id"].as_str().unwrap().parse().unwrap();
    let item_id = item_ids(&order)[0].parse().unwrap();

    let rejected = app
        .state
        .services
        .order_status
        .update_order_item(
            order_id,
            item_id,
            UpdateOrderItemRequest {
                scheduled_date: Some(chrono::NaiveDate::from_ymd_opt(2030, 5, 19).unwrap()),
                ..Default::default()
            },
            ist(2030, 5, 20, 8, 0),
        )
        .await;
    assert!(matches!(rejected, Err(ServiceError::ValidationError(_))));
}

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use delivery_desk::api::rest::router;
use delivery_desk::config::{NotificationConfig, NotificationMode};
use delivery_desk::notify::outbox::{run_notification_worker, RetryPolicy};
use delivery_desk::notify::{MemoryNotifier, Notification, NotificationKind};
use delivery_desk::registry::MemoryRegistry;
use delivery_desk::state::AppState;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

struct TestApp {
    app: axum::Router,
    state: Arc<AppState>,
    notifier: Arc<MemoryNotifier>,
    outbox_rx: Option<mpsc::Receiver<Notification>>,
}

fn setup_with(mode: NotificationMode) -> TestApp {
    let notifier = Arc::new(MemoryNotifier::new());
    let config = NotificationConfig {
        mode,
        queue_size: 64,
        max_attempts: 3,
        retry_backoff: Duration::from_millis(10),
    };
    let (state, outbox_rx) = AppState::new(
        Arc::new(MemoryRegistry::new()),
        notifier.clone(),
        &config,
    );
    let state = Arc::new(state);

    TestApp {
        app: router(state.clone()),
        state,
        notifier,
        outbox_rx: Some(outbox_rx),
    }
}

fn setup() -> TestApp {
    setup_with(NotificationMode::Inline)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn order_body(pickup_time: Option<&str>) -> Value {
    json!({
        "name": "Dana",
        "email": "dana@example.com",
        "phoneNumber": "555-0100",
        "pickupAddress": "1 Harbour Rd",
        "dropAddress": "9 Hill St",
        "pickupDate": pickup_time.map(|_| "2024-05-01"),
        "pickupTime": pickup_time,
        "content": "books",
        "weight": 2.5,
        "receiverName": "Sam",
        "receiverPhoneNumber": "555-0199"
    })
}

async fn create_order(app: &axum::Router, pickup_time: Option<&str>) -> i64 {
    let res = app
        .clone()
        .oneshot(json_request("POST", "/api/orders", order_body(pickup_time)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    body_json(res).await["id"].as_i64().unwrap()
}

async fn register_driver(app: &axum::Router, user_id: &str, phone: &str) {
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/drivers",
            json!({
                "userId": user_id,
                "name": "Alice",
                "phoneNumber": phone,
                "email": "alice@example.com"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

async fn assign(app: &axum::Router, order_id: i64) -> axum::response::Response {
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/orders/assign",
            json!({
                "orderId": order_id,
                "driverId": "drv-1",
                "driverName": "Alice",
                "driverPhoneNumber": "555-1"
            }),
        ))
        .await
        .unwrap()
}

async fn update_status(app: &axum::Router, order_id: i64, status: &str) -> axum::response::Response {
    app.clone()
        .oneshot(json_request(
            "PUT",
            "/api/orders/status",
            json!({ "orderId": order_id, "status": status, "driverUserId": "drv-1" }),
        ))
        .await
        .unwrap()
}

async fn verify(app: &axum::Router, order_id: i64, otp: &str) -> axum::response::Response {
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/orders/verify-otp",
            json!({ "orderId": order_id, "providedOtp": otp }),
        ))
        .await
        .unwrap()
}

async fn get_json(app: &axum::Router, uri: &str) -> Value {
    let res = app.clone().oneshot(get_request(uri)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK, "GET {uri}");
    body_json(res).await
}

async fn driver_availability(app: &axum::Router) -> Value {
    get_json(app, "/api/drivers").await[0]["available"].clone()
}

#[tokio::test]
async fn health_returns_ok() {
    let t = setup();
    let response = t.app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"], 0);
    assert_eq!(body["assignments"], 0);
    assert_eq!(body["drivers"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let t = setup();
    let response = t.app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("notifications_in_queue"));
    assert!(body.contains("partial_failures_total"));
}

#[tokio::test]
async fn pickup_time_decides_pending_listing() {
    let t = setup();
    let unscheduled = create_order(&t.app, None).await;
    let scheduled = create_order(&t.app, Some("10:30:00")).await;

    let pending = get_json(&t.app, "/api/orders/pending").await;
    let pending = pending.as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["id"], unscheduled);
    assert!(pending[0]["pickup_time"].is_null());

    let slotted = get_json(&t.app, "/api/orders/scheduled").await;
    let slotted = slotted.as_array().unwrap();
    assert_eq!(slotted.len(), 1);
    assert_eq!(slotted[0]["id"], scheduled);
}

#[tokio::test]
async fn scheduling_moves_order_between_listings() {
    let t = setup();
    let order_id = create_order(&t.app, None).await;

    let res = t
        .app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/orders/{order_id}/schedule"),
            json!({ "pickupDate": "2024-05-02", "pickupTime": "09:00:00" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let pending = get_json(&t.app, "/api/orders/pending").await;
    assert!(pending.as_array().unwrap().is_empty());
    let slotted = get_json(&t.app, "/api/orders/scheduled").await;
    assert_eq!(slotted[0]["id"], order_id);
    assert_eq!(slotted[0]["pickup_date"], "2024-05-02");
}

#[tokio::test]
async fn assigning_creates_active_record_and_books_driver() {
    let t = setup();
    let order_id = create_order(&t.app, Some("10:30:00")).await;
    register_driver(&t.app, "drv-1", "555-1").await;

    let res = assign(&t.app, order_id).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let body = body_json(res).await;
    let assigned = &body["assignedOrder"];
    assert_eq!(assigned["order_id"], order_id);
    assert_eq!(assigned["status"], "active");
    assert_eq!(assigned["driver_name"], "Alice");
    assert_eq!(assigned["pickup_address"], "1 Harbour Rd");
    let otp = assigned["otp"].as_str().unwrap();
    assert_eq!(otp.len(), 4);

    let order = get_json(&t.app, &format!("/api/orders/{order_id}")).await;
    assert_eq!(order["status"], "active");
    assert_eq!(order["assigned_driver"], "Alice");
    assert_eq!(driver_availability(&t.app).await, "assigned");

    let listed = get_json(&t.app, "/api/orders/assigned").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let sent = t.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].kind, NotificationKind::OrderAssigned);
    assert_eq!(sent[0].recipient, "dana@example.com");
    assert!(sent[0].body.contains("555-1"));
    assert_eq!(sent[1].kind, NotificationKind::DriverAssigned);
    assert_eq!(sent[1].recipient, "alice@example.com");
}

#[tokio::test]
async fn assigning_unknown_order_returns_404_without_changes() {
    let t = setup();
    register_driver(&t.app, "drv-1", "555-1").await;

    let res = assign(&t.app, 999).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(res).await["error"], "Order not found");

    let listed = get_json(&t.app, "/api/orders/assigned").await;
    assert!(listed.as_array().unwrap().is_empty());
    assert_eq!(driver_availability(&t.app).await, "available");
    assert!(t.notifier.sent().is_empty());
}

#[tokio::test]
async fn assigning_to_unknown_driver_leaves_order_pending() {
    let t = setup();
    let order_id = create_order(&t.app, None).await;

    let res = assign(&t.app, order_id).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(res).await["error"], "Driver not found");

    let order = get_json(&t.app, &format!("/api/orders/{order_id}")).await;
    assert_eq!(order["status"], "pending");
    assert!(order["assigned_driver"].is_null());

    let res = t
        .app
        .clone()
        .oneshot(get_request(&format!("/api/orders/assigned/{order_id}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reassigning_is_rejected() {
    let t = setup();
    let order_id = create_order(&t.app, None).await;
    register_driver(&t.app, "drv-1", "555-1").await;

    assert_eq!(assign(&t.app, order_id).await.status(), StatusCode::CREATED);
    let res = assign(&t.app, order_id).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let listed = get_json(&t.app, "/api/orders/assigned").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn assign_with_missing_fields_returns_400() {
    let t = setup();
    let res = t
        .app
        .oneshot(json_request(
            "POST",
            "/api/orders/assign",
            json!({ "orderId": 1, "driverName": "Alice" }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn full_delivery_lifecycle() {
    let t = setup();
    let order_id = create_order(&t.app, None).await;
    register_driver(&t.app, "drv-1", "555-1").await;

    let res = assign(&t.app, order_id).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let otp = body_json(res).await["assignedOrder"]["otp"]
        .as_str()
        .unwrap()
        .to_string();

    let res = update_status(&t.app, order_id, "picked").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        body_json(res).await["message"],
        "Order status updated successfully"
    );

    let order = get_json(&t.app, &format!("/api/orders/{order_id}")).await;
    assert_eq!(order["status"], "picked");
    let assigned = get_json(&t.app, &format!("/api/orders/assigned/{order_id}")).await;
    assert_eq!(assigned["status"], "picked");

    let otp_message = t
        .notifier
        .sent()
        .into_iter()
        .find(|n| n.kind == NotificationKind::DeliveryOtp)
        .unwrap();
    assert_eq!(otp_message.recipient, "dana@example.com");
    assert!(otp_message.body.contains(&otp));

    let res = verify(&t.app, order_id, &otp).await;
    assert_eq!(res.status(), StatusCode::OK);
    let assigned = get_json(&t.app, &format!("/api/orders/assigned/{order_id}")).await;
    assert!(assigned["otp"].is_null());

    let res = update_status(&t.app, order_id, "delivered").await;
    assert_eq!(res.status(), StatusCode::OK);
    let order = get_json(&t.app, &format!("/api/orders/{order_id}")).await;
    assert_eq!(order["status"], "delivered");
    assert_eq!(driver_availability(&t.app).await, "available");
    assert!(t
        .notifier
        .sent()
        .iter()
        .any(|n| n.kind == NotificationKind::OrderDelivered));

    let res = update_status(&t.app, order_id, "active").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "Order is already delivered");

    let listed = get_json(&t.app, "/api/orders/assigned").await;
    assert_eq!(listed[0]["status"], "delivered");
}

#[tokio::test]
async fn picked_order_cannot_revert_to_active() {
    let t = setup();
    let order_id = create_order(&t.app, None).await;
    register_driver(&t.app, "drv-1", "555-1").await;
    assign(&t.app, order_id).await;
    update_status(&t.app, order_id, "picked").await;

    let res = update_status(&t.app, order_id, "active").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(res).await["error"],
        "Cannot revert to active from picked"
    );

    let order = get_json(&t.app, &format!("/api/orders/{order_id}")).await;
    assert_eq!(order["status"], "picked");
    let assigned = get_json(&t.app, &format!("/api/orders/assigned/{order_id}")).await;
    assert_eq!(assigned["status"], "picked");
}

#[tokio::test]
async fn delivery_succeeds_when_driver_record_is_missing() {
    let t = setup();
    let order_id = create_order(&t.app, None).await;
    register_driver(&t.app, "drv-1", "555-1").await;
    assign(&t.app, order_id).await;

    let res = t
        .app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/orders/status",
            json!({ "orderId": order_id, "status": "delivered", "driverUserId": "ghost" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let order = get_json(&t.app, &format!("/api/orders/{order_id}")).await;
    assert_eq!(order["status"], "delivered");
    assert_eq!(driver_availability(&t.app).await, "assigned");
}

#[tokio::test]
async fn status_update_validation() {
    let t = setup();

    let res = t
        .app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/orders/status",
            json!({ "orderId": 1, "status": "picked" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = update_status(&t.app, 1, "shipped").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "Invalid status value");

    let res = update_status(&t.app, 1, "picked").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_otp_is_rejected_and_kept() {
    let t = setup();
    let order_id = create_order(&t.app, None).await;
    register_driver(&t.app, "drv-1", "555-1").await;
    let res = assign(&t.app, order_id).await;
    let otp = body_json(res).await["assignedOrder"]["otp"]
        .as_str()
        .unwrap()
        .to_string();

    let res = verify(&t.app, order_id, "not-the-code").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "Invalid OTP");

    let assigned = get_json(&t.app, &format!("/api/orders/assigned/{order_id}")).await;
    assert_eq!(assigned["otp"], otp.as_str());

    assert_eq!(verify(&t.app, order_id, &otp).await.status(), StatusCode::OK);
    let res = verify(&t.app, order_id, &otp).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn otp_verification_validation() {
    let t = setup();

    let res = t
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/orders/verify-otp",
            json!({ "orderId": 3 }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = verify(&t.app, 3, "1234").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn driver_listing_distinguishes_empty_from_found() {
    let t = setup();

    let res = t
        .app
        .clone()
        .oneshot(get_request("/api/orders/assigned/driver/drv-1"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let order_id = create_order(&t.app, None).await;
    register_driver(&t.app, "drv-1", "555-1").await;
    assign(&t.app, order_id).await;

    let listed = get_json(&t.app, "/api/orders/assigned/driver/drv-1").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["order_id"], order_id);
}

#[tokio::test]
async fn inline_notifier_failure_fails_request_after_commit() {
    let t = setup();
    let order_id = create_order(&t.app, None).await;
    register_driver(&t.app, "drv-1", "555-1").await;
    t.notifier.set_failing(true);

    let res = assign(&t.app, order_id).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let order = get_json(&t.app, &format!("/api/orders/{order_id}")).await;
    assert_eq!(order["status"], "active");
    assert_eq!(t.state.metrics.partial_failures_total.get(), 1);
}

#[tokio::test]
async fn inline_delivered_notification_failure_keeps_delivery() {
    let t = setup();
    let order_id = create_order(&t.app, None).await;
    register_driver(&t.app, "drv-1", "555-1").await;
    assert_eq!(assign(&t.app, order_id).await.status(), StatusCode::CREATED);
    assert_eq!(
        update_status(&t.app, order_id, "picked").await.status(),
        StatusCode::OK
    );

    t.notifier.set_failing(true);
    let res = update_status(&t.app, order_id, "delivered").await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(res).await["error"].is_string());

    let order = get_json(&t.app, &format!("/api/orders/{order_id}")).await;
    assert_eq!(order["status"], "delivered");
    let assigned = get_json(&t.app, &format!("/api/orders/assigned/{order_id}")).await;
    assert_eq!(assigned["status"], "delivered");
    assert_eq!(driver_availability(&t.app).await, "available");
    assert_eq!(t.state.metrics.partial_failures_total.get(), 1);
}

#[tokio::test]
async fn picked_again_after_otp_use_skips_the_code_message() {
    let t = setup();
    let order_id = create_order(&t.app, None).await;
    register_driver(&t.app, "drv-1", "555-1").await;
    let res = assign(&t.app, order_id).await;
    let otp = body_json(res).await["assignedOrder"]["otp"]
        .as_str()
        .unwrap()
        .to_string();

    assert_eq!(
        update_status(&t.app, order_id, "picked").await.status(),
        StatusCode::OK
    );
    assert_eq!(verify(&t.app, order_id, &otp).await.status(), StatusCode::OK);

    let res = update_status(&t.app, order_id, "picked").await;
    assert_eq!(res.status(), StatusCode::OK);

    let assigned = get_json(&t.app, &format!("/api/orders/assigned/{order_id}")).await;
    assert_eq!(assigned["status"], "picked");
    assert!(assigned["otp"].is_null());

    let otp_messages = t
        .notifier
        .sent()
        .iter()
        .filter(|n| n.kind == NotificationKind::DeliveryOtp)
        .count();
    assert_eq!(otp_messages, 1);
}

#[tokio::test]
async fn scheduling_an_assigned_order_is_rejected() {
    let t = setup();
    let order_id = create_order(&t.app, None).await;
    register_driver(&t.app, "drv-1", "555-1").await;
    assert_eq!(assign(&t.app, order_id).await.status(), StatusCode::CREATED);

    let res = t
        .app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/orders/{order_id}/schedule"),
            json!({ "pickupDate": "2024-05-02", "pickupTime": "09:00:00" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(res).await["error"],
        "Only pending orders can be scheduled"
    );

    let order = get_json(&t.app, &format!("/api/orders/{order_id}")).await;
    assert_eq!(order["status"], "active");
    assert!(order["pickup_time"].is_null());
}

#[tokio::test]
async fn numeric_otp_and_string_order_id_are_accepted() {
    let t = setup();
    let order_id = create_order(&t.app, None).await;
    register_driver(&t.app, "drv-1", "555-1").await;
    let res = assign(&t.app, order_id).await;
    let otp: i64 = body_json(res).await["assignedOrder"]["otp"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let res = t
        .app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/orders/status",
            json!({
                "orderId": order_id.to_string(),
                "status": "picked",
                "driverUserId": "drv-1"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = t
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/orders/verify-otp",
            json!({ "orderId": order_id, "providedOtp": otp }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["message"], "OTP verified successfully");
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let t = setup();

    let no_content_type = Request::builder()
        .method("POST")
        .uri("/api/orders/verify-otp")
        .body(Body::from(r#"{"orderId":1,"providedOtp":"1234"}"#))
        .unwrap();
    let res = t.app.clone().oneshot(no_content_type).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(res).await["error"].is_string());

    let res = t
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/orders/assign",
            json!({ "orderId": "abc", "driverId": "drv-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(res).await["error"].is_string());

    let res = t
        .app
        .clone()
        .oneshot(get_request("/api/orders/assigned/abc"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(res).await["error"].is_string());
}

async fn wait_for_sent(notifier: &MemoryNotifier, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while notifier.sent().len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("notifications were not delivered in time");
}

#[tokio::test]
async fn outbox_worker_delivers_and_retries() {
    let mut t = setup_with(NotificationMode::Outbox);
    let outbox_rx = t.outbox_rx.take().unwrap();

    let order_id = create_order(&t.app, None).await;
    register_driver(&t.app, "drv-1", "555-1").await;

    // Queued while the worker is not yet running; the first send is rejected.
    t.notifier.fail_next(1);
    let res = assign(&t.app, order_id).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(t.state.metrics.notifications_in_queue.get(), 2);
    assert!(t.notifier.sent().is_empty());

    tokio::spawn(run_notification_worker(
        t.state.clone(),
        outbox_rx,
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(10),
        },
    ));
    wait_for_sent(&t.notifier, 2).await;

    let sent = t.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().any(|n| n.kind == NotificationKind::DriverAssigned));
    assert_eq!(t.notifier.attempts(), 3);
    assert_eq!(t.state.metrics.notifications_in_queue.get(), 0);
    assert_eq!(
        t.state
            .metrics
            .notifications_total
            .with_label_values(&["sent"])
            .get(),
        2
    );
}

#[tokio::test]
async fn outbox_exhausting_retries_counts_failure() {
    let mut t = setup_with(NotificationMode::Outbox);
    let outbox_rx = t.outbox_rx.take().unwrap();

    let order_id = create_order(&t.app, None).await;
    register_driver(&t.app, "drv-1", "555-1").await;

    // Three rejections use up every attempt for the first message only.
    t.notifier.fail_next(3);
    assert_eq!(assign(&t.app, order_id).await.status(), StatusCode::CREATED);

    tokio::spawn(run_notification_worker(
        t.state.clone(),
        outbox_rx,
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        },
    ));
    wait_for_sent(&t.notifier, 1).await;

    assert_eq!(t.notifier.attempts(), 4);
    assert_eq!(
        t.state
            .metrics
            .notifications_total
            .with_label_values(&["failed"])
            .get(),
        1
    );
}

#[tokio::test]
async fn closed_outbox_fails_request_and_leaves_queue_empty() {
    let mut t = setup_with(NotificationMode::Outbox);
    drop(t.outbox_rx.take());

    let order_id = create_order(&t.app, None).await;
    register_driver(&t.app, "drv-1", "555-1").await;

    let res = assign(&t.app, order_id).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(t.state.metrics.notifications_in_queue.get(), 0);
    assert_eq!(t.state.metrics.partial_failures_total.get(), 1);

    let order = get_json(&t.app, &format!("/api/orders/{order_id}")).await;
    assert_eq!(order["status"], "active");
}

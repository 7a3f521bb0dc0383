use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use taxi_reservations::config::EnvironmentConfig;
use taxi_reservations::create_app;
use taxi_reservations::repositories::InMemoryReservationRepository;
use taxi_reservations::services::notification_service::{DeliveryReceipt, Notifier, OutboundEmail};
use taxi_reservations::services::pricing_service::{PricingService, TariffConfig};
use taxi_reservations::services::reservation_service::{ReservationService, ReservationSettings};
use taxi_reservations::state::AppState;
use taxi_reservations::utils::errors::{AppError, AppResult};

/// Proveedor de correo de prueba: acepta o rechaza y cuenta los envíos
struct TestNotifier {
    fail: bool,
    sent: AtomicUsize,
}

#[async_trait]
impl Notifier for TestNotifier {
    async fn send(&self, _email: &OutboundEmail) -> AppResult<DeliveryReceipt> {
        let n = self.sent.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::NotificationFailure("Resend returned 503".to_string()));
        }
        Ok(DeliveryReceipt {
            message_id: Some(format!("msg-{}", n)),
        })
    }
}

struct TestApp {
    router: Router,
    notifier: Arc<TestNotifier>,
}

impl TestApp {
    fn new(fail_notifications: bool) -> Self {
        let notifier = Arc::new(TestNotifier {
            fail: fail_notifications,
            sent: AtomicUsize::new(0),
        });
        let settings = ReservationSettings {
            strict_status_transitions: true,
            notification_timeout: Duration::from_secs(2),
            operator_emails: vec!["central@example.fr".to_string()],
            cache_ttl_seconds: 60,
        };
        let service = ReservationService::new(
            Arc::new(InMemoryReservationRepository::new()),
            notifier.clone(),
            PricingService::new(TariffConfig::default()),
            settings,
        );
        let router = create_app(AppState::new(EnvironmentConfig::default(), service));
        Self { router, notifier }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header(header::USER_AGENT, "integration-test");
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(body)).await
    }

    async fn create_reservation(&self) -> String {
        let (status, body) = self.post("/api/reservations", reservation_payload()).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

fn reservation_payload() -> Value {
    json!({
        "trip": {
            "origin": {
                "address": "Gare de Lyon, Paris",
                "coordinates": { "lat": 48.8443, "lng": 2.3744 }
            },
            "destination": {
                "address": "Aéroport CDG, Roissy",
                "coordinates": { "lat": 49.0097, "lng": 2.5479 }
            },
            "distance_km": 32.5,
            "duration_minutes": 45
        },
        "booking": {
            "passengers": 2,
            "luggage": 1,
            "is_immediate": true,
            "language": "fr"
        },
        "customer": {
            "name": "Camille Martin",
            "phone": "06 12 34 56 78",
            "email": "camille@example.fr"
        },
        "metadata": { "source": "website", "platform": "web" }
    })
}

fn driver_payload() -> Value {
    json!({
        "driver": {
            "driver_id": "drv-001",
            "name": "Karim Benali",
            "phone": "+33 7 11 22 33 44",
            "vehicle": {
                "make": "Toyota",
                "model": "Corolla",
                "plate": "AB-123-CD"
            },
            "languages": ["fr", "ar"]
        }
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new(false);
    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["environment"], "development");
}

#[tokio::test]
async fn test_quote_endpoint() {
    let app = TestApp::new(false);
    let (status, body) = app
        .post(
            "/api/quote",
            json!({
                "distance_km": 10.0,
                "duration_minutes": 20,
                "booking": { "passengers": 1, "luggage": 0, "is_immediate": true }
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert!(body["data"]["pricing"]["total_price"].as_f64().unwrap() > 0.0);
    assert_eq!(body["data"]["formatted_duration"], "20 min");
    assert!(body["data"]["formatted_price"].as_str().unwrap().ends_with('€'));
}

#[tokio::test]
async fn test_create_reservation_sends_notifications() {
    let app = TestApp::new(false);
    let (status, body) = app.post("/api/reservations", reservation_payload()).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert!(body.get("warnings").is_none());

    let data = &body["data"];
    assert_eq!(data["status"], "pending");
    assert_eq!(data["events"][0]["event_type"], "created");
    assert_eq!(data["metadata"]["ip_address"], "203.0.113.7");
    assert_eq!(data["metadata"]["user_agent"], "integration-test");
    assert_eq!(data["customer"]["ip_address"], "203.0.113.7");
    assert_eq!(data["formatted_duration"], "45 min");
    assert_eq!(data["trip"]["estimated_price"], data["pricing"]["total_price"]);

    // Confirmación al cliente y aviso a la central
    assert_eq!(app.notifier.sent.load(Ordering::SeqCst), 2);
    let communications = data["communications"].as_array().unwrap();
    assert_eq!(communications.len(), 2);
    assert!(communications.iter().all(|c| c["success"] == true));
}

#[tokio::test]
async fn test_create_reservation_survives_notification_failure() {
    let app = TestApp::new(true);
    let (status, body) = app.post("/api/reservations", reservation_payload()).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["warnings"].as_array().unwrap().len(), 2);

    let id = body["data"]["id"].as_str().unwrap();
    let (status, stored) = app.get(&format!("/api/reservations/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    let communications = stored["data"]["communications"].as_array().unwrap();
    assert!(communications.iter().all(|c| c["delivery_status"] == "failed"));
}

#[tokio::test]
async fn test_create_reservation_reports_all_field_errors() {
    let app = TestApp::new(false);
    let mut payload = reservation_payload();
    payload["customer"]["phone"] = json!("12345");
    payload["customer"]["name"] = json!("");
    payload["booking"]["passengers"] = json!(12);

    let (status, body) = app.post("/api/reservations", payload).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let details = body["details"].as_object().unwrap();
    assert!(details.contains_key("customer.phone"));
    assert!(details.contains_key("customer.name"));
    assert!(details.contains_key("booking.passengers"));
    assert_eq!(app.notifier.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unpriced_reservation_reports_trip_and_customer_errors_together() {
    let app = TestApp::new(false);
    let mut payload = reservation_payload();
    payload["trip"]["distance_km"] = json!(1500.0);
    payload["customer"]["phone"] = json!("12345");
    payload["customer"]["name"] = json!("");

    let (status, body) = app.post("/api/reservations", payload).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let details = body["details"].as_object().unwrap();
    assert_eq!(details["trip.distance_km"], json!(["range"]));
    assert!(details.contains_key("customer.phone"));
    assert!(details.contains_key("customer.name"));
    assert!(!details.contains_key("distance_km"));
}

#[tokio::test]
async fn test_missing_required_fields_are_listed_as_json() {
    let app = TestApp::new(false);
    let mut payload = reservation_payload();
    payload["customer"] = json!({ "email": "camille@example.fr" });

    let (status, body) = app.post("/api/reservations", payload).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["details"]["customer.name"], json!(["required"]));
    assert_eq!(body["details"]["customer.phone"], json!(["required"]));
}

#[tokio::test]
async fn test_malformed_body_uses_the_error_format() {
    let app = TestApp::new(false);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/reservations")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"trip\": "))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_get_unknown_reservation_is_not_found() {
    let app = TestApp::new(false);
    let (status, body) = app.get("/api/reservations/TX-DOES-NOT-EXIST").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_find_by_phone_accepts_any_format() {
    let app = TestApp::new(false);
    let id = app.create_reservation().await;

    let (status, body) = app.get("/api/reservations?phone=%2B33612345678").await;
    assert_eq!(status, StatusCode::OK);
    let found = body["data"].as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], id.as_str());

    let (status, _) = app.get("/api/reservations").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_lifecycle_through_the_api() {
    let app = TestApp::new(false);
    let id = app.create_reservation().await;

    let (status, body) = app
        .patch(
            &format!("/api/reservations/{}/status", id),
            json!({ "status": "confirmed", "description": "Confirmée par la centrale" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "confirmed");

    let (status, body) = app
        .post(&format!("/api/reservations/{}/driver", id), driver_payload())
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "assigned");
    assert_eq!(body["data"]["driver"]["driver_id"], "drv-001");

    let (_, body) = app.get("/api/reservations/driver/drv-001").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    for next in ["driver_arrived", "in_progress", "completed"] {
        let (status, body) = app
            .patch(&format!("/api/reservations/{}/status", id), json!({ "status": next }))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"], next);
    }

    let (status, body) = app
        .post(
            &format!("/api/reservations/{}/payment", id),
            json!({ "method": "card", "status": "paid", "transaction_id": "txn-42" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["payment"]["status"], "paid");

    let (status, body) = app
        .post(
            &format!("/api/reservations/{}/rating", id),
            json!({
                "overall": 5,
                "punctuality": 5,
                "cleanliness": 4,
                "driving": 5,
                "courtesy": 5,
                "comment": "Parfait"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["rating"]["overall"], 5);

    // Ya no está activa
    let (_, body) = app.get("/api/reservations/active").await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_strict_transitions_reject_skipping_states() {
    let app = TestApp::new(false);
    let id = app.create_reservation().await;

    let (status, body) = app
        .patch(&format!("/api/reservations/{}/status", id), json!({ "status": "completed" }))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_rating_requires_completed_trip() {
    let app = TestApp::new(false);
    let id = app.create_reservation().await;

    let (status, _) = app
        .post(
            &format!("/api/reservations/{}/rating", id),
            json!({ "overall": 4, "punctuality": 4, "cleanliness": 4, "driving": 4, "courtesy": 4 }),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_active_and_stats() {
    let app = TestApp::new(false);
    let first = app.create_reservation().await;
    app.create_reservation().await;

    let (status, _) = app
        .patch(&format!("/api/reservations/{}/status", first), json!({ "status": "cancelled" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/reservations/active").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app.get("/api/reservations/stats").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let stats = body["data"]["stats"].as_array().unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0]["status"], "pending");
    assert_eq!(stats[0]["count"], 1);
    assert_eq!(stats[1]["status"], "cancelled");
}

#[tokio::test]
async fn test_stats_rejects_inverted_window() {
    let app = TestApp::new(false);
    let (status, _) = app
        .get("/api/reservations/stats?from=2026-02-01T00:00:00Z&to=2026-01-01T00:00:00Z")
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

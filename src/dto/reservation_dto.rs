use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::booking::Booking;
use crate::models::customer::Customer;
use crate::models::driver::Driver;
use crate::models::event::{Actor, ActorType};
use crate::models::pricing::Pricing;
use crate::models::reservation::{PaymentMethod, PaymentStatus, Reservation, ReservationStatus};
use crate::models::stats::{StatsWindow, StatusStats};
use crate::models::trip::{Location, RouteData};
use crate::utils::errors::{AppError, AppResult};
use crate::utils::formatting::{format_duration, format_price};
use crate::utils::validation::{check_required_fields, FieldKind};

// Trayecto tal como llega del formulario (distancia y duración ya calculadas)
#[derive(Debug, Clone, Deserialize)]
pub struct TripInput {
    pub origin: Location,
    pub destination: Location,
    pub distance_km: f64,
    pub duration_minutes: u32,
    pub route: Option<RouteData>,
    pub estimated_price: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionMetadataInput {
    pub source: Option<String>,
    pub platform: Option<String>,
    pub session_id: Option<String>,
    pub api_version: Option<String>,
}

// Request para crear una reserva. Sin `pricing` se calcula con la tarifa
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReservationRequest {
    pub trip: TripInput,
    pub booking: Booking,
    pub customer: Customer,
    pub pricing: Option<Pricing>,
    #[serde(default)]
    pub metadata: SubmissionMetadataInput,
}

/// Campos sin valor por defecto del formulario de reserva
const CREATE_RESERVATION_FIELDS: &[(&str, FieldKind)] = &[
    ("trip.origin.address", FieldKind::Text),
    ("trip.destination.address", FieldKind::Text),
    ("trip.distance_km", FieldKind::Number),
    ("trip.duration_minutes", FieldKind::Unsigned),
    ("booking.passengers", FieldKind::Unsigned),
    ("booking.luggage", FieldKind::Unsigned),
    ("booking.is_immediate", FieldKind::Boolean),
    ("customer.name", FieldKind::Text),
    ("customer.phone", FieldKind::Text),
];

impl CreateReservationRequest {
    /// Leer el formulario informando de todos los campos ausentes a la vez
    pub fn from_json(body: Value) -> AppResult<Self> {
        check_required_fields(&body, CREATE_RESERVATION_FIELDS)?;
        serde_json::from_value(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid reservation payload: {}", e)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActorInput {
    #[serde(default)]
    pub actor_type: ActorType,
    pub actor_id: Option<String>,
}

impl ActorInput {
    pub fn into_actor(input: Option<Self>, default_type: ActorType) -> Actor {
        match input {
            Some(actor) => Actor::new(actor.actor_type, actor.actor_id),
            None => Actor::new(default_type, None),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ReservationStatus,
    pub description: Option<String>,
    pub metadata: Option<Value>,
    pub actor: Option<ActorInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignDriverRequest {
    pub driver: Driver,
    pub actor: Option<ActorInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordPaymentRequest {
    #[serde(default)]
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Option<Decimal>,
    pub transaction_id: Option<String>,
    pub actor: Option<ActorInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub distance_km: f64,
    pub duration_minutes: u32,
    pub booking: Booking,
}

#[derive(Debug, Deserialize)]
pub struct PhoneQuery {
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

// Response de reserva con los valores de presentación derivados
#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub formatted_price: String,
    pub formatted_duration: String,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            formatted_price: reservation.formatted_price(),
            formatted_duration: reservation.formatted_duration(),
            reservation,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub pricing: Pricing,
    pub formatted_price: String,
    pub formatted_duration: String,
}

impl QuoteResponse {
    pub fn new(pricing: Pricing, duration_minutes: u32) -> Self {
        Self {
            formatted_price: format_price(pricing.total_price, &pricing.currency, &pricing.locale),
            formatted_duration: format_duration(duration_minutes),
            pricing,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub stats: Vec<StatusStats>,
}

impl StatsResponse {
    pub fn new(window: StatsWindow, stats: Vec<StatusStats>) -> Self {
        Self {
            from: window.from,
            to: window.to,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::{flatten_errors, INVALID_TYPE, REQUIRED};
    use serde_json::json;

    fn form() -> Value {
        json!({
            "trip": {
                "origin": { "address": "Gare de Lyon, Paris" },
                "destination": { "address": "Aéroport CDG, Roissy" },
                "distance_km": 32.5,
                "duration_minutes": 45
            },
            "booking": { "passengers": 2, "luggage": 1, "is_immediate": true },
            "customer": { "name": "Camille Martin", "phone": "0612345678" }
        })
    }

    #[test]
    fn test_from_json_accepts_minimal_form() {
        let request = CreateReservationRequest::from_json(form()).unwrap();
        assert_eq!(request.customer.name, "Camille Martin");
        assert!(request.pricing.is_none());
        assert!(request.metadata.source.is_none());
    }

    #[test]
    fn test_from_json_lists_all_missing_fields() {
        let mut body = form();
        body["customer"] = json!({ "email": "camille@example.fr" });
        body["trip"]["duration_minutes"] = json!("45");

        let err = CreateReservationRequest::from_json(body).unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected a validation error");
        };
        let flat = flatten_errors(&errors);
        assert_eq!(flat["customer.name"], vec![REQUIRED]);
        assert_eq!(flat["customer.phone"], vec![REQUIRED]);
        assert_eq!(flat["trip.duration_minutes"], vec![INVALID_TYPE]);
    }

    #[test]
    fn test_from_json_reports_other_type_errors_as_bad_request() {
        let mut body = form();
        body["booking"]["language"] = json!("klingon");

        let err = CreateReservationRequest::from_json(body).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}

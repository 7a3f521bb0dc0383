//! Modelo de Reservation
//!
//! Raíz del agregado: combina Trip, Booking, Customer, Pricing, Driver,
//! pago, valoración e historiales de eventos y comunicaciones.
//!
//! Todas las mutaciones pasan por los métodos de este módulo; cada una
//! añade su evento en la misma operación, de modo que el repositorio
//! persiste estado y evento en una única escritura.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationErrors};

use crate::models::booking::Booking;
use crate::models::communication::Communication;
use crate::models::customer::Customer;
use crate::models::driver::Driver;
use crate::models::event::{Actor, ActorType, EventType, ReservationEvent};
use crate::models::pricing::Pricing;
use crate::models::trip::Trip;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::formatting::{format_duration, format_price};
use crate::utils::reservation_id::ReservationIdGenerator;

/// Llegada estimada del chauffeur según el tipo de reserva
pub const IMMEDIATE_ARRIVAL_MINUTES: i64 = 10;
pub const SCHEDULED_ARRIVAL_MINUTES: i64 = 15;

/// Estado de la reserva
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Assigned,
    DriverArrived,
    InProgress,
    Completed,
    Cancelled,
    Refunded,
}

impl ReservationStatus {
    pub const ALL: [ReservationStatus; 8] = [
        ReservationStatus::Pending,
        ReservationStatus::Confirmed,
        ReservationStatus::Assigned,
        ReservationStatus::DriverArrived,
        ReservationStatus::InProgress,
        ReservationStatus::Completed,
        ReservationStatus::Cancelled,
        ReservationStatus::Refunded,
    ];

    /// Estados devueltos por FindActive
    pub const ACTIVE: [ReservationStatus; 4] = [
        ReservationStatus::Pending,
        ReservationStatus::Confirmed,
        ReservationStatus::Assigned,
        ReservationStatus::InProgress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Assigned => "assigned",
            ReservationStatus::DriverArrived => "driver_arrived",
            ReservationStatus::InProgress => "in_progress",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Refunded => "refunded",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Completed | ReservationStatus::Cancelled | ReservationStatus::Refunded
        )
    }

    /// Grafo estricto de transiciones (solo se aplica con la política estricta)
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;

        if self.is_terminal() {
            return false;
        }
        match next {
            Cancelled | Refunded => true,
            _ => matches!(
                (self, next),
                (Pending, Confirmed)
                    | (Confirmed, Assigned)
                    | (Assigned, DriverArrived)
                    | (DriverArrived, InProgress)
                    | (InProgress, Completed)
            ),
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown reservation status '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Transfer,
    Online,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Option<Decimal>,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

/// Valoración del trayecto (cinco dimensiones de 1 a 5)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Rating {
    #[validate(range(min = 1, max = 5))]
    pub overall: u8,
    #[validate(range(min = 1, max = 5))]
    pub punctuality: u8,
    #[validate(range(min = 1, max = 5))]
    pub cleanliness: u8,
    #[validate(range(min = 1, max = 5))]
    pub driving: u8,
    #[validate(range(min = 1, max = 5))]
    pub courtesy: u8,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

/// Metadatos de la solicitud de reserva
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionMetadata {
    pub source: String,
    pub platform: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub session_id: Option<String>,
    pub ip_address: Option<String>,
    pub api_version: String,
}

impl Default for SubmissionMetadata {
    fn default() -> Self {
        Self {
            source: "website".to_string(),
            platform: None,
            user_agent: None,
            referrer: None,
            session_id: None,
            ip_address: None,
            api_version: "v1".to_string(),
        }
    }
}

/// Datos necesarios para crear una reserva
#[derive(Debug, Clone)]
pub struct ReservationDraft {
    pub trip: Trip,
    pub booking: Booking,
    pub customer: Customer,
    pub pricing: Pricing,
    pub metadata: SubmissionMetadata,
}

impl ReservationDraft {
    /// Validar todos los sub-registros, acumulando errores por campo
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let result = validate_request_parts(&self.trip, &self.booking, &self.customer, now);
        ValidationErrors::merge(result, "pricing", self.pricing.validate())
    }
}

/// Validar trayecto, reserva y cliente antes de tarificar
pub fn validate_request_parts(
    trip: &Trip,
    booking: &Booking,
    customer: &Customer,
    now: DateTime<Utc>,
) -> Result<(), ValidationErrors> {
    let result = ValidationErrors::merge(Ok(()), "trip", trip.validate());
    let result = ValidationErrors::merge(result, "booking", booking.validate_at(now));
    ValidationErrors::merge(result, "customer", customer.validate())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    status: ReservationStatus,
    pub trip: Trip,
    pub booking: Booking,
    pub customer: Customer,
    pub pricing: Pricing,
    driver: Option<Driver>,
    events: Vec<ReservationEvent>,
    communications: Vec<Communication>,
    payment: Payment,
    rating: Option<Rating>,
    pub metadata: SubmissionMetadata,
    pub created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Versión optimista asignada por el repositorio
    #[serde(skip)]
    pub version: i64,
}

impl Reservation {
    /// Crear una reserva `pending` con su evento `created`
    pub fn create(draft: ReservationDraft, now: DateTime<Utc>) -> AppResult<Self> {
        draft.validate_at(now)?;

        let ReservationDraft {
            trip,
            booking,
            customer,
            pricing,
            metadata,
        } = draft;

        let actor = Actor::new(ActorType::Customer, None)
            .with_client(metadata.ip_address.clone(), metadata.user_agent.clone());
        let created = ReservationEvent::new(
            EventType::Created,
            format!("Réservation créée via {}", metadata.source),
            json!({
                "source": metadata.source,
                "customer_phone": customer.phone,
            }),
            &actor,
            now,
        );

        Ok(Self {
            id: ReservationIdGenerator::generate_with_timestamp(now),
            status: ReservationStatus::Pending,
            trip,
            booking,
            customer,
            pricing,
            driver: None,
            events: vec![created],
            communications: Vec::new(),
            payment: Payment::default(),
            rating: None,
            metadata,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Asignar un identificador nuevo (colisión al insertar)
    pub fn renew_id(&mut self) {
        self.id = ReservationIdGenerator::generate();
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub fn driver(&self) -> Option<&Driver> {
        self.driver.as_ref()
    }

    pub fn events(&self) -> &[ReservationEvent] {
        &self.events
    }

    pub fn communications(&self) -> &[Communication] {
        &self.communications
    }

    pub fn payment(&self) -> &Payment {
        &self.payment
    }

    pub fn rating(&self) -> Option<&Rating> {
        self.rating.as_ref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn record_event(
        &mut self,
        event_type: EventType,
        description: String,
        metadata: Value,
        actor: &Actor,
        now: DateTime<Utc>,
    ) {
        self.events
            .push(ReservationEvent::new(event_type, description, metadata, actor, now));
        self.updated_at = now;
    }

    /// Cambiar de estado registrando `old -> new` en un evento `modified`
    pub fn update_status(
        &mut self,
        new_status: ReservationStatus,
        description: Option<String>,
        metadata: Option<Value>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) {
        let old_status = self.status;
        self.status = new_status;

        if new_status == ReservationStatus::DriverArrived {
            if let Some(driver) = self.driver.as_mut() {
                driver.arrived_at = Some(now);
            }
        }

        let mut event_metadata = match metadata {
            Some(Value::Object(map)) => map,
            Some(other) => {
                let mut map = serde_json::Map::new();
                map.insert("details".to_string(), other);
                map
            }
            None => serde_json::Map::new(),
        };
        event_metadata.insert("old_status".to_string(), json!(old_status));
        event_metadata.insert("new_status".to_string(), json!(new_status));

        let description = description
            .unwrap_or_else(|| format!("Statut modifié : {} → {}", old_status, new_status));
        self.record_event(
            EventType::Modified,
            description,
            Value::Object(event_metadata),
            actor,
            now,
        );
    }

    /// Asignar chauffeur: llegada estimada a 10 min (inmediata) o 15 min (programada)
    pub fn assign_driver(&mut self, mut driver: Driver, actor: &Actor, now: DateTime<Utc>) {
        let eta_minutes = if self.booking.is_immediate {
            IMMEDIATE_ARRIVAL_MINUTES
        } else {
            SCHEDULED_ARRIVAL_MINUTES
        };
        let estimated_arrival = now + Duration::minutes(eta_minutes);

        driver.assigned_at = Some(now);
        driver.estimated_arrival = Some(estimated_arrival);
        driver.arrived_at = None;

        let previous_status = self.status;
        let description = format!("Chauffeur {} assigné", driver.name);
        let metadata = json!({
            "driver_id": driver.driver_id,
            "driver_name": driver.name,
            "previous_status": previous_status,
            "estimated_arrival": estimated_arrival,
        });

        self.driver = Some(driver);
        self.status = ReservationStatus::Assigned;
        self.record_event(EventType::DriverAssigned, description, metadata, actor, now);
    }

    /// Añadir un intento de notificación; no cambia el estado
    pub fn add_communication(&mut self, communication: Communication) {
        self.updated_at = self.updated_at.max(communication.sent_at);
        self.communications.push(communication);
    }

    /// Registrar información de pago
    pub fn record_payment(
        &mut self,
        method: PaymentMethod,
        status: PaymentStatus,
        amount: Option<Decimal>,
        transaction_id: Option<String>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) {
        let previous = self.payment.status;

        self.payment.method = method;
        self.payment.status = status;
        self.payment.amount = amount.or(self.payment.amount);
        if transaction_id.is_some() {
            self.payment.transaction_id = transaction_id;
        }
        match status {
            PaymentStatus::Paid => self.payment.paid_at = Some(now),
            PaymentStatus::Refunded => self.payment.refunded_at = Some(now),
            PaymentStatus::Pending | PaymentStatus::Failed => {}
        }

        let event_type = if status == PaymentStatus::Paid {
            EventType::PaymentReceived
        } else {
            EventType::Modified
        };
        let metadata = json!({
            "method": method,
            "old_payment_status": previous,
            "new_payment_status": status,
            "amount": self.payment.amount,
            "transaction_id": self.payment.transaction_id,
        });
        self.record_event(
            event_type,
            format!("Paiement {:?} ({:?})", status, method).to_lowercase(),
            metadata,
            actor,
            now,
        );
    }

    /// Registrar la valoración del cliente (solo trayectos terminados)
    pub fn submit_rating(&mut self, rating: Rating, actor: &Actor, now: DateTime<Utc>) -> AppResult<()> {
        if self.status != ReservationStatus::Completed {
            return Err(AppError::Conflict(format!(
                "Reservation {} cannot be rated while {}",
                self.id, self.status
            )));
        }
        rating.validate()?;

        let metadata = json!({
            "overall": rating.overall,
            "has_comment": rating.comment.is_some(),
        });
        let description = format!("Note reçue : {}/5", rating.overall);

        if let Some(driver) = self.driver.as_mut() {
            driver.rating = Some(f32::from(rating.overall));
        }
        self.rating = Some(rating);
        self.record_event(EventType::RatingReceived, description, metadata, actor, now);
        Ok(())
    }

    /// Precio formateado según divisa y locale (derivado, no persistido)
    pub fn formatted_price(&self) -> String {
        format_price(self.pricing.total_price, &self.pricing.currency, &self.pricing.locale)
    }

    /// Duración formateada (derivada, no persistida)
    pub fn formatted_duration(&self) -> String {
        format_duration(self.trip.duration_minutes)
    }
}

//! Historial de eventos de una reserva
//!
//! Cada transición del ciclo de vida deja un `ReservationEvent`. El
//! historial es de solo-añadir: nunca se modifica ni se reordena.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Created,
    Confirmed,
    Assigned,
    DriverAssigned,
    DriverArrived,
    TripStarted,
    TripCompleted,
    Cancelled,
    Refunded,
    Modified,
    PaymentReceived,
    RatingReceived,
    ComplaintReceived,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Customer,
    Driver,
    Admin,
    #[default]
    System,
}

/// Autor de una operación sobre la reserva
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub actor_type: ActorType,
    pub actor_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Actor {
    pub fn system() -> Self {
        Self::default()
    }

    pub fn new(actor_type: ActorType, actor_id: Option<String>) -> Self {
        Self {
            actor_type,
            actor_id,
            ..Self::default()
        }
    }

    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationEvent {
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    #[serde(default)]
    pub metadata: Value,
    pub actor_id: Option<String>,
    pub actor_type: ActorType,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ReservationEvent {
    pub fn new(
        event_type: EventType,
        description: impl Into<String>,
        metadata: Value,
        actor: &Actor,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            timestamp,
            description: description.into(),
            metadata,
            actor_id: actor.actor_id.clone(),
            actor_type: actor.actor_type,
            ip_address: actor.ip_address.clone(),
            user_agent: actor.user_agent.clone(),
        }
    }
}

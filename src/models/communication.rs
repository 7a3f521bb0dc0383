//! Registro de comunicaciones salientes
//!
//! Un `Communication` por intento de notificación. Solo-añadir.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::booking::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Call,
    Push,
    Webhook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Failed,
    Bounced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Communication {
    pub channel: Channel,
    pub language: Language,
    pub sent_at: DateTime<Utc>,
    pub template: String,
    pub success: bool,
    pub recipient: String,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    pub delivery_status: DeliveryStatus,
    pub message_id: Option<String>,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
}

impl Communication {
    /// Intento entregado al proveedor
    pub fn sent(
        channel: Channel,
        template: impl Into<String>,
        recipient: impl Into<String>,
        language: Language,
        message_id: Option<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            channel,
            language,
            sent_at,
            template: template.into(),
            success: true,
            recipient: recipient.into(),
            subject: None,
            content: None,
            error: None,
            retry_count: 0,
            delivery_status: DeliveryStatus::Sent,
            message_id,
            opened_at: None,
            clicked_at: None,
        }
    }

    /// Intento fallido (error del proveedor o timeout)
    pub fn failed(
        channel: Channel,
        template: impl Into<String>,
        recipient: impl Into<String>,
        language: Language,
        error: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            delivery_status: DeliveryStatus::Failed,
            ..Self::sent(channel, template, recipient, language, None, sent_at)
        }
    }

    pub fn with_snapshot(mut self, subject: impl Into<String>, content: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self.content = Some(content.into());
        self
    }
}

//! Servicio de notificaciones
//!
//! `Notifier` abstrae el envío de emails transaccionales. `ResendNotifier`
//! usa la API HTTP de Resend; `LogNotifier` solo deja traza (sin API key).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::services::email_templates::RenderedEmail;
use crate::utils::errors::{AppError, AppResult};

pub const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Email listo para enviar
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl OutboundEmail {
    pub fn from_rendered(to: Vec<String>, rendered: &RenderedEmail) -> Self {
        Self {
            to,
            subject: rendered.subject.clone(),
            text: rendered.text.clone(),
            html: rendered.html.clone(),
        }
    }
}

/// Acuse del proveedor
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    pub message_id: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> AppResult<DeliveryReceipt>;
}

#[derive(Debug, Clone)]
pub struct ResendConfig {
    pub api_key: String,
    pub from: String,
    pub api_url: String,
    pub request_timeout: Duration,
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ResendResponse {
    id: Option<String>,
}

pub struct ResendNotifier {
    config: ResendConfig,
    client: reqwest::Client,
}

impl ResendNotifier {
    pub fn new(config: ResendConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send(&self, email: &OutboundEmail) -> AppResult<DeliveryReceipt> {
        info!("📧 Enviando email '{}' a {} destinatario(s)", email.subject, email.to.len());

        let payload = ResendRequest {
            from: &self.config.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ Resend respondió {}: {}", status, body);
            return Err(AppError::NotificationFailure(format!(
                "Email provider returned {}: {}",
                status, body
            )));
        }

        let body: ResendResponse = response.json().await?;
        info!("✅ Email aceptado por Resend (id: {:?})", body.id);
        Ok(DeliveryReceipt { message_id: body.id })
    }
}

/// Notificador sin proveedor: registra el email y lo da por enviado
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: &OutboundEmail) -> AppResult<DeliveryReceipt> {
        info!(
            "📭 [sin proveedor] Email '{}' para {}",
            email.subject,
            email.to.join(", ")
        );
        Ok(DeliveryReceipt { message_id: None })
    }
}

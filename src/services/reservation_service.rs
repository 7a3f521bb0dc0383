//! Servicio de reservas
//!
//! Orquesta el ciclo de vida: validación y alta, notificaciones, cambios de
//! estado, asignación de chauffeur, pagos, valoraciones y consultas.
//!
//! Las notificaciones nunca bloquean la reserva: un fallo o timeout del
//! proveedor queda registrado como `Communication` fallida y se devuelve
//! como aviso.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::cache::{CacheOperations, RedisClient};
use crate::models::booking::Booking;
use crate::models::communication::{Channel, Communication};
use crate::models::driver::Driver;
use crate::models::event::Actor;
use crate::models::pricing::Pricing;
use crate::models::reservation::{
    PaymentMethod, PaymentStatus, Rating, Reservation, ReservationDraft, ReservationStatus,
};
use crate::models::stats::{StatsWindow, StatusStats};
use crate::repositories::ReservationRepository;
use crate::services::email_templates::{EmailTemplates, RenderedEmail};
use crate::services::notification_service::{Notifier, OutboundEmail};
use crate::services::pricing_service::PricingService;
use crate::utils::errors::{not_found_error, validation_error, AppError, AppResult};

/// Intentos de inserción ante colisión de identificador
pub const MAX_ID_ATTEMPTS: usize = 3;

/// Entrada de cache: el documento no serializa `version`, se guarda aparte
#[derive(Debug, Serialize, Deserialize)]
struct CachedReservation {
    version: i64,
    reservation: Reservation,
}

impl CachedReservation {
    fn new(reservation: &Reservation) -> Self {
        Self {
            version: reservation.version,
            reservation: reservation.clone(),
        }
    }

    fn into_reservation(self) -> Reservation {
        let mut reservation = self.reservation;
        reservation.version = self.version;
        reservation
    }
}

/// Una entrada solo se reemplaza por una versión estrictamente más nueva
fn supersedes(cached_version: Option<i64>, incoming_version: i64) -> bool {
    cached_version.map_or(true, |cached| incoming_version > cached)
}

#[derive(Debug, Clone)]
pub struct ReservationSettings {
    pub strict_status_transitions: bool,
    pub notification_timeout: Duration,
    pub operator_emails: Vec<String>,
    pub cache_ttl_seconds: u64,
}

impl Default for ReservationSettings {
    fn default() -> Self {
        Self {
            strict_status_transitions: false,
            notification_timeout: Duration::from_secs(10),
            operator_emails: Vec::new(),
            cache_ttl_seconds: 300,
        }
    }
}

/// Resultado del alta: la reserva y los avisos no bloqueantes
#[derive(Debug, Clone)]
pub struct CreatedReservation {
    pub reservation: Reservation,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct ReservationService {
    repository: Arc<dyn ReservationRepository>,
    notifier: Arc<dyn Notifier>,
    cache: Option<RedisClient>,
    pricing: PricingService,
    templates: EmailTemplates,
    settings: ReservationSettings,
}

impl ReservationService {
    pub fn new(
        repository: Arc<dyn ReservationRepository>,
        notifier: Arc<dyn Notifier>,
        pricing: PricingService,
        settings: ReservationSettings,
    ) -> Self {
        let templates = EmailTemplates::new(pricing.tariff().utc_offset_minutes);
        Self {
            repository,
            notifier,
            cache: None,
            pricing,
            templates,
            settings,
        }
    }

    pub fn with_cache(mut self, cache: RedisClient) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn pricing(&self) -> &PricingService {
        &self.pricing
    }

    // ------------------------------------------------------------------
    // Tarificación
    // ------------------------------------------------------------------

    /// Presupuesto de un trayecto sin crear reserva
    pub fn quote(&self, distance_km: f64, duration_minutes: u32, booking: &Booking) -> AppResult<Pricing> {
        let now = Utc::now();
        booking.validate_at(now)?;
        self.pricing
            .quote(distance_km, duration_minutes, booking, booking.pickup_time(now))
    }

    // ------------------------------------------------------------------
    // Alta
    // ------------------------------------------------------------------

    /// Validar, persistir y notificar una nueva reserva
    pub async fn create(&self, draft: ReservationDraft) -> AppResult<CreatedReservation> {
        let now = Utc::now();
        let mut reservation = Reservation::create(draft, now)?;

        if !reservation.pricing.reconciles() {
            warn!(
                "⚠️ El total {} no coincide con el desglose {} (reserva {})",
                reservation.pricing.total_price,
                reservation.pricing.breakdown.total(),
                reservation.id
            );
        }

        let stored = self.insert_with_fresh_id(&mut reservation).await?;
        info!(
            "🚕 Reserva {} creada ({} -> {}, {})",
            stored.id,
            stored.trip.origin.address,
            stored.trip.destination.address,
            stored.formatted_price()
        );

        let (communications, warnings) = self.send_booking_notifications(&stored).await;
        if communications.is_empty() {
            self.cache_put(&stored).await;
            return Ok(CreatedReservation {
                reservation: stored,
                warnings,
            });
        }

        let mut with_log = stored.clone();
        for communication in communications {
            with_log.add_communication(communication);
        }

        match self.repository.update(&with_log).await {
            Ok(saved) => {
                self.cache_put(&saved).await;
                Ok(CreatedReservation {
                    reservation: saved,
                    warnings,
                })
            }
            Err(e) => {
                // La reserva ya está guardada; solo se pierde el registro de envíos
                error!("❌ No se pudo guardar el registro de comunicaciones de {}: {}", stored.id, e);
                let mut warnings = warnings;
                warnings.push("Le journal des notifications n'a pas pu être enregistré".to_string());
                Ok(CreatedReservation {
                    reservation: stored,
                    warnings,
                })
            }
        }
    }

    async fn insert_with_fresh_id(&self, reservation: &mut Reservation) -> AppResult<Reservation> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            match self.repository.insert(reservation).await {
                Ok(stored) => return Ok(stored),
                Err(AppError::Conflict(msg)) => {
                    warn!(
                        "⚠️ Colisión de identificador {} (intento {}/{}): {}",
                        reservation.id, attempt, MAX_ID_ATTEMPTS, msg
                    );
                    reservation.renew_id();
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Conflict(format!(
            "Could not allocate a unique reservation id after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    async fn send_booking_notifications(&self, reservation: &Reservation) -> (Vec<Communication>, Vec<String>) {
        let mut communications = Vec::new();
        let mut warnings = Vec::new();

        if let Some(email) = &reservation.customer.email {
            let rendered = self.templates.customer_confirmation(reservation);
            let communication = self.deliver(vec![email.clone()], &rendered).await;
            if let Some(err) = &communication.error {
                warnings.push(format!("L'email de confirmation n'a pas pu être envoyé : {}", err));
            }
            communications.push(communication);
        }

        if !self.settings.operator_emails.is_empty() {
            let rendered = self.templates.operator_notification(reservation);
            let communication = self
                .deliver(self.settings.operator_emails.clone(), &rendered)
                .await;
            if let Some(err) = &communication.error {
                warnings.push(format!("L'opérateur n'a pas pu être notifié : {}", err));
            }
            communications.push(communication);
        }

        (communications, warnings)
    }

    /// Enviar un email con timeout y traducir el resultado a `Communication`
    async fn deliver(&self, to: Vec<String>, rendered: &RenderedEmail) -> Communication {
        let recipient = to.join(", ");
        let email = OutboundEmail::from_rendered(to, rendered);
        let timeout = self.settings.notification_timeout;

        let outcome = match tokio::time::timeout(timeout, self.notifier.send(&email)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::NotificationFailure(format!(
                "No response from email provider after {}s",
                timeout.as_secs_f32()
            ))),
        };

        let communication = match outcome {
            Ok(receipt) => {
                debug!("📧 Email {} enviado a {}", rendered.template, recipient);
                Communication::sent(
                    Channel::Email,
                    rendered.template,
                    recipient,
                    rendered.language,
                    receipt.message_id,
                    Utc::now(),
                )
            }
            Err(e) => {
                warn!("⚠️ Fallo enviando {} a {}: {}", rendered.template, recipient, e);
                let reason = match e {
                    AppError::NotificationFailure(msg) => msg,
                    other => other.to_string(),
                };
                Communication::failed(
                    Channel::Email,
                    rendered.template,
                    recipient,
                    rendered.language,
                    reason,
                    Utc::now(),
                )
            }
        };

        communication.with_snapshot(rendered.subject.clone(), rendered.text.clone())
    }

    // ------------------------------------------------------------------
    // Mutaciones
    // ------------------------------------------------------------------

    async fn load(&self, id: &str) -> AppResult<Reservation> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Reservation", id))
    }

    async fn save(&self, reservation: &Reservation) -> AppResult<Reservation> {
        let saved = self.repository.update(reservation).await?;
        if !self.cache_put(&saved).await {
            self.cache_invalidate(&saved.id).await;
        }
        Ok(saved)
    }

    /// Cambiar el estado de una reserva
    pub async fn update_status(
        &self,
        id: &str,
        new_status: ReservationStatus,
        description: Option<String>,
        metadata: Option<Value>,
        actor: &Actor,
    ) -> AppResult<Reservation> {
        let mut reservation = self.load(id).await?;
        let current = reservation.status();

        if self.settings.strict_status_transitions && !current.can_transition_to(new_status) {
            return Err(AppError::Conflict(format!(
                "Transition {} -> {} is not allowed for reservation {}",
                current, new_status, id
            )));
        }

        reservation.update_status(new_status, description, metadata, actor, Utc::now());
        let saved = self.save(&reservation).await?;
        info!("🔄 Reserva {}: {} -> {}", id, current, new_status);
        Ok(saved)
    }

    /// Asignar un chauffeur
    pub async fn assign_driver(&self, id: &str, driver: Driver, actor: &Actor) -> AppResult<Reservation> {
        driver.validate()?;
        let mut reservation = self.load(id).await?;
        let current = reservation.status();

        let assignable = matches!(
            current,
            ReservationStatus::Pending | ReservationStatus::Confirmed | ReservationStatus::Assigned
        );
        if self.settings.strict_status_transitions && !assignable {
            return Err(AppError::Conflict(format!(
                "A driver cannot be assigned to reservation {} while {}",
                id, current
            )));
        }

        let driver_name = driver.name.clone();
        reservation.assign_driver(driver, actor, Utc::now());
        let saved = self.save(&reservation).await?;
        info!("👤 Chauffeur {} asignado a la reserva {}", driver_name, id);
        Ok(saved)
    }

    /// Añadir una comunicación al historial
    pub async fn add_communication(&self, id: &str, communication: Communication) -> AppResult<Reservation> {
        let mut reservation = self.load(id).await?;
        reservation.add_communication(communication);
        self.save(&reservation).await
    }

    /// Registrar un pago
    pub async fn record_payment(
        &self,
        id: &str,
        method: PaymentMethod,
        status: PaymentStatus,
        amount: Option<Decimal>,
        transaction_id: Option<String>,
        actor: &Actor,
    ) -> AppResult<Reservation> {
        if let Some(amount) = amount {
            if amount < Decimal::ZERO {
                return Err(validation_error(
                    "amount",
                    "non_negative",
                    "Le montant ne peut pas être négatif",
                ));
            }
        }

        let mut reservation = self.load(id).await?;
        reservation.record_payment(method, status, amount, transaction_id, actor, Utc::now());
        self.save(&reservation).await
    }

    /// Registrar la valoración del cliente
    pub async fn submit_rating(&self, id: &str, rating: Rating, actor: &Actor) -> AppResult<Reservation> {
        let mut reservation = self.load(id).await?;
        reservation.submit_rating(rating, actor, Utc::now())?;
        self.save(&reservation).await
    }

    // ------------------------------------------------------------------
    // Consultas
    // ------------------------------------------------------------------

    pub async fn find_by_id(&self, id: &str) -> AppResult<Reservation> {
        if let Some(cached) = self.cache_get(id).await {
            return Ok(cached);
        }

        let reservation = self.load(id).await?;
        self.cache_put(&reservation).await;
        Ok(reservation)
    }

    pub async fn find_by_phone(&self, phone: &str) -> AppResult<Vec<Reservation>> {
        if phone.trim().is_empty() {
            return Err(AppError::BadRequest("The phone query parameter is required".to_string()));
        }
        self.repository.find_by_phone(phone).await
    }

    pub async fn find_active(&self) -> AppResult<Vec<Reservation>> {
        self.repository.find_active().await
    }

    pub async fn find_by_driver(&self, driver_id: &str) -> AppResult<Vec<Reservation>> {
        self.repository.find_by_driver(driver_id).await
    }

    /// Estadísticas por estado (últimos 30 días por defecto)
    pub async fn stats(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> AppResult<(StatsWindow, Vec<StatusStats>)> {
        let window = StatsWindow::resolve(from, to, Utc::now())?;
        let stats = self.repository.stats(&window).await?;
        Ok((window, stats))
    }

    // ------------------------------------------------------------------
    // Cache (los errores solo se registran)
    // ------------------------------------------------------------------

    async fn cache_entry(&self, cache: &RedisClient, id: &str) -> Option<CachedReservation> {
        match cache.get::<CachedReservation>(&cache.reservation_key(id)).await {
            Ok(found) => found,
            Err(e) => {
                warn!("⚠️ Error de cache leyendo {}: {}", id, e);
                None
            }
        }
    }

    async fn cache_get(&self, id: &str) -> Option<Reservation> {
        let cache = self.cache.as_ref()?;
        self.cache_entry(cache, id)
            .await
            .map(CachedReservation::into_reservation)
    }

    /// Guardar en cache salvo que ya haya una versión igual o más nueva.
    /// Devuelve `false` solo si Redis falló.
    async fn cache_put(&self, reservation: &Reservation) -> bool {
        let Some(cache) = &self.cache else {
            return true;
        };

        let cached_version = self
            .cache_entry(cache, &reservation.id)
            .await
            .map(|entry| entry.version);
        if !supersedes(cached_version, reservation.version) {
            debug!(
                "🗃️ Cache de {} ya en versión {:?}, se descarta la {}",
                reservation.id, cached_version, reservation.version
            );
            return true;
        }

        let key = cache.reservation_key(&reservation.id);
        let entry = CachedReservation::new(reservation);
        match cache.set(&key, &entry, self.settings.cache_ttl_seconds).await {
            Ok(()) => true,
            Err(e) => {
                warn!("⚠️ Error de cache guardando {}: {}", reservation.id, e);
                false
            }
        }
    }

    async fn cache_invalidate(&self, id: &str) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.delete(&cache.reservation_key(id)).await {
                warn!("⚠️ Error de cache invalidando {}: {}", id, e);
            }
        }
    }
}

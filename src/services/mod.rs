//! Services module
//!
//! Este módulo contiene la lógica de negocio: tarificación, plantillas de
//! correo, envío de notificaciones y el ciclo de vida de las reservas.

pub mod email_templates;
pub mod notification_service;
pub mod pricing_service;
pub mod reservation_service;

pub use notification_service::{LogNotifier, Notifier, ResendConfig, ResendNotifier};
pub use pricing_service::{PricingService, TariffConfig};
pub use reservation_service::{CreatedReservation, ReservationService, ReservationSettings};

//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::services::reservation_service::ReservationService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EnvironmentConfig>,
    pub service: ReservationService,
}

impl AppState {
    pub fn new(config: EnvironmentConfig, service: ReservationService) -> Self {
        Self {
            config: Arc::new(config),
            service,
        }
    }
}

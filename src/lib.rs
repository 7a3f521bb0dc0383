//! Backend de reservas de taxi
//!
//! Recibe reservas desde el formulario web, calcula la tarifa, guarda la
//! reserva con su historial de eventos y avisa al cliente y a la central.

pub mod cache;
pub mod config;
pub mod controllers;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware::cors::cors_layer;
use crate::state::AppState;

/// Router completo de la API con su estado
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .nest("/api/reservations", routes::reservation_routes::create_reservation_router())
        .nest("/api/quote", routes::quote_routes::create_quote_router())
        .nest("/health", routes::health_routes::create_health_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

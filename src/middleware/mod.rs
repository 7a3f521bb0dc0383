//! Middleware del sistema
//!
//! Este módulo contiene la configuración de CORS del servidor HTTP.

pub mod cors;

pub use cors::*;

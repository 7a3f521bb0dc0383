//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores, validación,
//! identificadores de reserva y formateo de valores derivados.

pub mod errors;
pub mod formatting;
pub mod reservation_id;
pub mod validation;

//! Controllers
//!
//! Traducen DTOs a operaciones del dominio y viceversa.

pub mod reservation_controller;

pub use reservation_controller::{RequestContext, ReservationController};

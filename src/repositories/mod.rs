//! Repositorios
//!
//! Acceso a datos de reservas (PostgreSQL o memoria).

pub mod reservation_repository;

pub use reservation_repository::{
    InMemoryReservationRepository, PgReservationRepository, ReservationRepository,
};

//! Modelos del sistema
//!
//! Agregado `Reservation` y sus sub-registros. Cada reserva se persiste
//! como un documento completo (ver `repositories`).

pub mod booking;
pub mod communication;
pub mod customer;
pub mod driver;
pub mod event;
pub mod pricing;
pub mod reservation;
pub mod stats;
pub mod trip;

pub use booking::{Booking, Language, SpecialRequests};
pub use communication::{Channel, Communication, DeliveryStatus};
pub use customer::Customer;
pub use driver::{Driver, VehicleInfo, VehicleType};
pub use event::{Actor, ActorType, EventType, ReservationEvent};
pub use pricing::{PriceBreakdown, PriceLine, Pricing};
pub use reservation::{
    Payment, PaymentMethod, PaymentStatus, Rating, Reservation, ReservationDraft,
    ReservationStatus, SubmissionMetadata,
};
pub use stats::{StatsWindow, StatusStats};
pub use trip::{Coordinates, Location, RouteData, Trip};

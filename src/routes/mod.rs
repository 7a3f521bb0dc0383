pub mod extractors;
pub mod health_routes;
pub mod quote_routes;
pub mod reservation_routes;

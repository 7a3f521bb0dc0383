//! Modelo de Trip
//!
//! Origen, destino, distancia, duración y precio estimado de un trayecto.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::utils::validation::{
    into_result, validate_non_negative_amount, validate_range, MISSING_COORDINATES,
};

pub const MAX_DISTANCE_KM: f64 = 1000.0;
pub const MAX_DURATION_MINUTES: u32 = 720;

/// Coordenadas GPS (valor inmutable)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Validate for Coordinates {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_range(self.lat, -90.0, 90.0) {
            errors.add("lat", e);
        }
        if let Err(e) = validate_range(self.lng, -180.0, 180.0) {
            errors.add("lng", e);
        }
        into_result(errors)
    }
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Extremo de un trayecto (origen o destino)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Location {
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    pub coordinates: Option<Coordinates>,
    pub place_id: Option<String>,
}

impl Location {
    /// Validar dirección y exigir coordenadas
    fn validate_with_coordinates(&self) -> Result<(), ValidationErrors> {
        let result = self.validate();
        match &self.coordinates {
            Some(coordinates) => ValidationErrors::merge(result, "coordinates", coordinates.validate()),
            None => {
                let mut errors = result.err().unwrap_or_else(ValidationErrors::new);
                let mut error = ValidationError::new(MISSING_COORDINATES);
                error.message = Some("Coordonnées manquantes".into());
                errors.add("coordinates", error);
                Err(errors)
            }
        }
    }
}

/// Datos crudos de ruta devueltos por el proveedor de mapas
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteData {
    pub polyline: Option<String>,
    #[serde(default)]
    pub legs: Vec<serde_json::Value>,
    pub bounds: Option<serde_json::Value>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub origin: Location,
    pub destination: Location,
    pub distance_km: f64,
    pub duration_minutes: u32,
    pub route: Option<RouteData>,
    pub estimated_price: Decimal,
    pub calculated_at: DateTime<Utc>,
}

impl Validate for Trip {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_range(self.distance_km, 0.0, MAX_DISTANCE_KM) {
            errors.add("distance_km", e);
        }
        if let Err(e) = validate_range(self.duration_minutes, 0, MAX_DURATION_MINUTES) {
            errors.add("duration_minutes", e);
        }
        if let Err(e) = validate_non_negative_amount(self.estimated_price) {
            errors.add("estimated_price", e);
        }

        let result = into_result(errors);
        let result = ValidationErrors::merge(result, "origin", self.origin.validate_with_coordinates());
        ValidationErrors::merge(result, "destination", self.destination.validate_with_coordinates())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::flatten_errors;

    fn location(address: &str, coordinates: Option<Coordinates>) -> Location {
        Location {
            address: address.to_string(),
            coordinates,
            place_id: None,
        }
    }

    fn trip() -> Trip {
        Trip {
            origin: location("Gare de Lyon, Paris", Some(Coordinates::new(48.8443, 2.3744))),
            destination: location("Aéroport CDG, Roissy", Some(Coordinates::new(49.0097, 2.5479))),
            distance_km: 32.5,
            duration_minutes: 45,
            route: None,
            estimated_price: Decimal::new(5500, 2),
            calculated_at: Utc::now(),
        }
    }

    #[test]
    fn test_valid_trip() {
        assert!(trip().validate().is_ok());
    }

    #[test]
    fn test_missing_coordinates_is_invalid() {
        let mut t = trip();
        t.destination.coordinates = None;

        let flat = flatten_errors(&t.validate().unwrap_err());
        assert_eq!(
            flat.get("destination.coordinates"),
            Some(&vec![MISSING_COORDINATES.to_string()])
        );
        assert!(!flat.contains_key("origin.coordinates"));
    }

    #[test]
    fn test_bounds_are_reported_per_field() {
        let mut t = trip();
        t.distance_km = -1.0;
        t.duration_minutes = 721;
        t.estimated_price = Decimal::new(-100, 2);
        t.origin.address = String::new();
        t.origin.coordinates = Some(Coordinates::new(91.0, 2.0));

        let flat = flatten_errors(&t.validate().unwrap_err());
        assert!(flat.contains_key("distance_km"));
        assert!(flat.contains_key("duration_minutes"));
        assert!(flat.contains_key("estimated_price"));
        assert!(flat.contains_key("origin.address"));
        assert!(flat.contains_key("origin.coordinates.lat"));
    }

    #[test]
    fn test_address_length_limit() {
        let mut t = trip();
        t.origin.address = "a".repeat(501);
        let flat = flatten_errors(&t.validate().unwrap_err());
        assert_eq!(flat.get("origin.address"), Some(&vec!["length".to_string()]));
    }
}

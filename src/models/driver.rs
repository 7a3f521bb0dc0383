//! Modelo de Driver
//!
//! Chauffeur asignado a una reserva (sub-registro opcional).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::booking::Language;
use crate::utils::validation::validate_french_phone;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    #[default]
    Sedan,
    Break,
    Van,
    Electric,
    Luxury,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VehicleInfo {
    #[validate(length(min = 1, max = 50))]
    pub make: String,
    #[validate(length(min = 1, max = 50))]
    pub model: String,
    #[validate(length(max = 30))]
    pub color: Option<String>,
    #[validate(length(min = 2, max = 20))]
    pub plate: String,
    #[serde(default)]
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Driver {
    #[validate(length(min = 1, max = 64))]
    pub driver_id: String,

    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(custom = "validate_french_phone")]
    pub phone: String,

    #[validate]
    pub vehicle: VehicleInfo,

    #[serde(default)]
    pub languages: Vec<Language>,

    pub assigned_at: Option<DateTime<Utc>>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,

    #[validate(range(min = 1.0, max = 5.0))]
    pub rating: Option<f32>,

    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::driver;
    use crate::utils::validation::flatten_errors;

    #[test]
    fn test_valid_driver() {
        assert!(driver().validate().is_ok());
    }

    #[test]
    fn test_nested_vehicle_and_rating_errors() {
        let mut d = driver();
        d.vehicle.plate = "A".to_string();
        d.rating = Some(0.5);

        let flat = flatten_errors(&d.validate().unwrap_err());
        assert!(flat.contains_key("vehicle.plate"));
        assert!(flat.contains_key("rating"));
    }
}

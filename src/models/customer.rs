//! Modelo de Customer

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::booking::Language;
use crate::models::trip::Coordinates;
use crate::utils::validation::{normalize_phone, validate_email, validate_french_phone};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Customer {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(custom = "validate_french_phone")]
    pub phone: String,

    #[validate(custom = "validate_email")]
    pub email: Option<String>,

    pub geolocation: Option<Coordinates>,
    pub ip_address: Option<String>,

    #[serde(default)]
    pub language: Language,

    #[serde(default)]
    pub is_returning: bool,

    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl Customer {
    /// Teléfono sin separadores, usado como clave de búsqueda
    pub fn normalized_phone(&self) -> String {
        normalize_phone(&self.phone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::{flatten_errors, INVALID_EMAIL, INVALID_PHONE};

    fn customer() -> Customer {
        Customer {
            name: "Camille Martin".to_string(),
            phone: "06 12 34 56 78".to_string(),
            email: None,
            geolocation: None,
            ip_address: None,
            language: Language::Fr,
            is_returning: false,
            notes: None,
        }
    }

    #[test]
    fn test_email_is_optional() {
        assert!(customer().validate().is_ok());
    }

    #[test]
    fn test_valid_email() {
        let mut c = customer();
        c.email = Some("camille@example.fr".to_string());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_invalid_phone_and_email_are_both_reported() {
        let mut c = customer();
        c.phone = "12345".to_string();
        c.email = Some("camille.example.fr".to_string());

        let flat = flatten_errors(&c.validate().unwrap_err());
        assert_eq!(flat.get("phone"), Some(&vec![INVALID_PHONE.to_string()]));
        assert_eq!(flat.get("email"), Some(&vec![INVALID_EMAIL.to_string()]));
    }

    #[test]
    fn test_name_and_notes_limits() {
        let mut c = customer();
        c.name = String::new();
        c.notes = Some("n".repeat(501));

        let flat = flatten_errors(&c.validate().unwrap_err());
        assert!(flat.contains_key("name"));
        assert!(flat.contains_key("notes"));
    }

    #[test]
    fn test_normalized_phone() {
        assert_eq!(customer().normalized_phone(), "0612345678");
    }
}

//! Modelo de Booking
//!
//! Detalles de la reserva visibles para el pasajero: pasajeros, equipaje,
//! horario de recogida, idioma y peticiones especiales.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationErrors};

use crate::utils::validation::{into_result, validate_length, validate_range, validate_schedule};

pub const MAX_PASSENGERS: u8 = 8;
pub const MAX_LUGGAGE: u8 = 10;
pub const MAX_NOTES_LENGTH: usize = 1000;

/// Idiomas soportados
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Fr,
    En,
    Es,
    De,
    It,
    Pt,
    Nl,
    Ar,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Fr => "fr",
            Language::En => "en",
            Language::Es => "es",
            Language::De => "de",
            Language::It => "it",
            Language::Pt => "pt",
            Language::Nl => "nl",
            Language::Ar => "ar",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Peticiones especiales del cliente
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialRequests {
    pub child_seat: bool,
    pub wheelchair: bool,
    pub animal: bool,
    pub smoking: bool,
    pub air_conditioning: bool,
}

impl SpecialRequests {
    /// Etiquetas (en francés) de las peticiones activas
    pub fn labels(&self) -> Vec<&'static str> {
        [
            (self.child_seat, "Siège enfant"),
            (self.wheelchair, "Fauteuil roulant"),
            (self.animal, "Animal"),
            (self.smoking, "Fumeur"),
            (self.air_conditioning, "Climatisation"),
        ]
        .into_iter()
        .filter_map(|(on, label)| on.then_some(label))
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub passengers: u8,
    pub luggage: u8,
    pub is_immediate: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub special_requests: SpecialRequests,
}

impl Booking {
    /// Hora efectiva de recogida
    pub fn pickup_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if self.is_immediate {
            now
        } else {
            self.scheduled_at.unwrap_or(now)
        }
    }

    /// Validar contra un instante de referencia
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_range(self.passengers, 1, MAX_PASSENGERS) {
            errors.add("passengers", e);
        }
        if let Err(e) = validate_range(self.luggage, 0, MAX_LUGGAGE) {
            errors.add("luggage", e);
        }
        if let Err(e) = validate_schedule(self.is_immediate, self.scheduled_at, now) {
            errors.add("scheduled_at", e);
        }
        if let Some(notes) = &self.notes {
            if let Err(e) = validate_length(notes, 0, MAX_NOTES_LENGTH) {
                errors.add("notes", e);
            }
        }

        into_result(errors)
    }
}

impl Validate for Booking {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.validate_at(Utc::now())
    }
}

//! Utilidades de validación
//!
//! Este módulo contiene funciones helper para validación de datos de
//! reservas: teléfonos franceses, emails, rangos, horarios de recogida.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

lazy_static! {
    /// Móvil francés: `0` o `+33` seguido de un dígito no nulo y ocho dígitos
    static ref FRENCH_PHONE_RE: Regex = Regex::new(r"^(?:0|\+33)[1-9]\d{8}$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

pub const INVALID_PHONE: &str = "invalid_phone";
pub const INVALID_EMAIL: &str = "invalid_email";
pub const INVALID_SCHEDULE: &str = "invalid_schedule";
pub const MISSING_COORDINATES: &str = "missing_coordinates";
pub const REQUIRED: &str = "required";
pub const INVALID_TYPE: &str = "invalid_type";

/// Tipo JSON esperado para un campo obligatorio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Unsigned,
    Boolean,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::Text => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Unsigned => value.is_u64(),
            FieldKind::Boolean => value.is_boolean(),
        }
    }
}

/// Quitar espacios, puntos y guiones de un número de teléfono
pub fn strip_phone_separators(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.' && *c != '-')
        .collect()
}

/// Forma canónica nacional (`+33612345678` -> `0612345678`), clave de búsqueda
pub fn normalize_phone(value: &str) -> String {
    let clean = strip_phone_separators(value);
    match clean.strip_prefix("+33") {
        Some(national) => format!("0{}", national),
        None => clean,
    }
}

/// Validar formato de teléfono móvil francés/internacional
pub fn validate_french_phone(value: &str) -> Result<(), ValidationError> {
    let clean_phone = strip_phone_separators(value);
    if !FRENCH_PHONE_RE.is_match(&clean_phone) {
        let mut error = ValidationError::new(INVALID_PHONE);
        error.add_param("value".into(), &value.to_string());
        error.message = Some("Numéro de téléphone invalide".into());
        return Err(error);
    }
    Ok(())
}

/// Validar formato de email (permisivo: local@dominio.tld)
pub fn validate_email(value: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(value.trim()) {
        let mut error = ValidationError::new(INVALID_EMAIL);
        error.add_param("value".into(), &value.to_string());
        error.message = Some("Adresse email invalide".into());
        return Err(error);
    }
    Ok(())
}

/// Validar longitud mínima y máxima (en caracteres)
pub fn validate_length(value: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min || len > max {
        let mut error = ValidationError::new("length");
        error.add_param("min".into(), &min);
        error.add_param("max".into(), &max);
        error.add_param("actual".into(), &len);
        return Err(error);
    }
    Ok(())
}

/// Validar que un valor esté en un rango específico
pub fn validate_range<T: PartialOrd + Serialize>(
    value: T,
    min: T,
    max: T,
) -> Result<(), ValidationError> {
    if value < min || value > max {
        let mut error = ValidationError::new("range");
        error.add_param("min".into(), &min);
        error.add_param("max".into(), &max);
        error.add_param("actual".into(), &value);
        return Err(error);
    }
    Ok(())
}

/// Validar que un importe no sea negativo
pub fn validate_non_negative_amount(value: Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut error = ValidationError::new("non_negative");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar el horario de recogida.
///
/// Inmediata: no debe llevar fecha. Programada: fecha obligatoria y
/// estrictamente futura respecto a `now`.
pub fn validate_schedule(
    is_immediate: bool,
    scheduled_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    let reason = match (is_immediate, scheduled_at) {
        (true, None) => return Ok(()),
        (true, Some(_)) => "Une course immédiate ne peut pas avoir d'heure programmée",
        (false, None) => "Une heure de prise en charge est requise",
        (false, Some(at)) if at <= now => "L'heure de prise en charge doit être dans le futur",
        (false, Some(_)) => return Ok(()),
    };

    let mut error = ValidationError::new(INVALID_SCHEDULE);
    if let Some(at) = scheduled_at {
        error.add_param("value".into(), &at.to_rfc3339());
    }
    error.message = Some(reason.into());
    Err(error)
}

/// Convertir un acumulador de errores en resultado
pub fn into_result(errors: ValidationErrors) -> Result<(), ValidationErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Comprobar campos obligatorios de un cuerpo JSON antes de deserializarlo.
/// Las rutas usan puntos (`customer.phone`); se informa de todos a la vez.
pub fn check_required_fields(
    body: &Value,
    fields: &[(&'static str, FieldKind)],
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    for &(path, kind) in fields {
        let pointer = format!("/{}", path.replace('.', "/"));
        match body.pointer(&pointer) {
            None | Some(Value::Null) => errors.add(path, ValidationError::new(REQUIRED)),
            Some(value) if !kind.matches(value) => {
                errors.add(path, ValidationError::new(INVALID_TYPE))
            }
            Some(_) => {}
        }
    }

    into_result(errors)
}

/// Aplanar errores anidados a `ruta.del.campo -> [códigos]`
pub fn flatten_errors(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    let mut flat = BTreeMap::new();
    flatten_into(errors, "", &mut flat);
    flat
}

fn flatten_into(errors: &ValidationErrors, prefix: &str, flat: &mut BTreeMap<String, Vec<String>>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                flat.entry(path)
                    .or_insert_with(Vec::new)
                    .extend(field_errors.iter().map(|e| e.code.to_string()));
            }
            ValidationErrorsKind::Struct(nested) => flatten_into(nested, &path, flat),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten_into(nested, &format!("{}[{}]", path, index), flat);
                }
            }
        }
    }
}

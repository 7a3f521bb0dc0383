//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno. Todas las variables
//! tienen valor por defecto salvo las credenciales; un valor numérico mal
//! formado es un error de configuración.

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::pricing_service::TariffConfig;
use crate::utils::errors::{AppError, AppResult};

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub log_level: String,
    pub cors_origins: Vec<String>,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub cache_ttl_seconds: u64,
    // Notificaciones (Resend)
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub operator_emails: Vec<String>,
    pub notification_timeout: Duration,
    pub strict_status_transitions: bool,
    pub tariff: TariffConfig,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
            log_level: "info".to_string(),
            cors_origins: Vec::new(),
            database_url: None,
            redis_url: None,
            cache_ttl_seconds: 300,
            resend_api_key: None,
            email_from: "Taxi Réservations <reservations@example.com>".to_string(),
            operator_emails: Vec::new(),
            notification_timeout: Duration::from_secs(10),
            strict_status_transitions: false,
            tariff: TariffConfig::default(),
        }
    }
}

impl EnvironmentConfig {
    /// Leer la configuración desde las variables de entorno del proceso
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Leer la configuración desde una fuente arbitraria (útil para testing)
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let tariff_defaults = defaults.tariff.clone();
        let tariff = TariffConfig {
            base_fare: parse_or(&var, "TARIFF_BASE_FARE", tariff_defaults.base_fare)?,
            price_per_km: parse_or(&var, "TARIFF_PRICE_PER_KM", tariff_defaults.price_per_km)?,
            price_per_minute: parse_or(
                &var,
                "TARIFF_PRICE_PER_MINUTE",
                tariff_defaults.price_per_minute,
            )?,
            minimum_fare: parse_or(&var, "TARIFF_MINIMUM_FARE", tariff_defaults.minimum_fare)?,
            luggage_supplement: parse_or(
                &var,
                "TARIFF_LUGGAGE_SUPPLEMENT",
                tariff_defaults.luggage_supplement,
            )?,
            free_luggage: parse_or(&var, "TARIFF_FREE_LUGGAGE", tariff_defaults.free_luggage)?,
            passenger_supplement: parse_or(
                &var,
                "TARIFF_PASSENGER_SUPPLEMENT",
                tariff_defaults.passenger_supplement,
            )?,
            night_multiplier: parse_or(
                &var,
                "TARIFF_NIGHT_MULTIPLIER",
                tariff_defaults.night_multiplier,
            )?,
            weekend_multiplier: parse_or(
                &var,
                "TARIFF_WEEKEND_MULTIPLIER",
                tariff_defaults.weekend_multiplier,
            )?,
            holiday_multiplier: parse_or(
                &var,
                "TARIFF_HOLIDAY_MULTIPLIER",
                tariff_defaults.holiday_multiplier,
            )?,
            utc_offset_minutes: parse_or(
                &var,
                "TARIFF_UTC_OFFSET_MINUTES",
                tariff_defaults.utc_offset_minutes,
            )?,
            currency: var("TARIFF_CURRENCY").unwrap_or(tariff_defaults.currency),
            locale: var("TARIFF_LOCALE").unwrap_or(tariff_defaults.locale),
        };
        validate_tariff(&tariff)?;

        Ok(Self {
            environment: var("ENVIRONMENT").unwrap_or(defaults.environment),
            port: parse_or(&var, "PORT", defaults.port)?,
            host: var("HOST").unwrap_or(defaults.host),
            log_level: var("LOG_LEVEL").unwrap_or(defaults.log_level),
            cors_origins: var("CORS_ORIGINS").map(|v| split_list(&v)).unwrap_or_default(),
            database_url: var("DATABASE_URL"),
            redis_url: var("REDIS_URL"),
            cache_ttl_seconds: parse_or(&var, "CACHE_TTL_SECONDS", defaults.cache_ttl_seconds)?,
            resend_api_key: var("RESEND_API_KEY"),
            email_from: var("EMAIL_FROM").unwrap_or(defaults.email_from),
            operator_emails: var("OPERATOR_EMAILS").map(|v| split_list(&v)).unwrap_or_default(),
            notification_timeout: Duration::from_secs(parse_or(
                &var,
                "NOTIFICATION_TIMEOUT_SECS",
                defaults.notification_timeout.as_secs(),
            )?),
            strict_status_transitions: parse_or(
                &var,
                "STRICT_STATUS_TRANSITIONS",
                defaults.strict_status_transitions,
            )?,
            tariff,
        })
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la dirección del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, F>(var: &F, name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| {
            AppError::Configuration(format!("{} has an invalid value '{}': {}", name, raw, e))
        }),
        None => Ok(default),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn validate_tariff(tariff: &TariffConfig) -> AppResult<()> {
    let amounts = [
        ("TARIFF_BASE_FARE", tariff.base_fare),
        ("TARIFF_PRICE_PER_KM", tariff.price_per_km),
        ("TARIFF_PRICE_PER_MINUTE", tariff.price_per_minute),
        ("TARIFF_MINIMUM_FARE", tariff.minimum_fare),
        ("TARIFF_LUGGAGE_SUPPLEMENT", tariff.luggage_supplement),
        ("TARIFF_PASSENGER_SUPPLEMENT", tariff.passenger_supplement),
    ];
    if let Some((name, _)) = amounts.iter().find(|(_, amount)| *amount < Decimal::ZERO) {
        return Err(AppError::Configuration(format!("{} must not be negative", name)));
    }

    let multipliers = [
        ("TARIFF_NIGHT_MULTIPLIER", tariff.night_multiplier),
        ("TARIFF_WEEKEND_MULTIPLIER", tariff.weekend_multiplier),
        ("TARIFF_HOLIDAY_MULTIPLIER", tariff.holiday_multiplier),
    ];
    if let Some((name, _)) = multipliers.iter().find(|(_, m)| *m < Decimal::ONE) {
        return Err(AppError::Configuration(format!("{} must be at least 1", name)));
    }

    if tariff.utc_offset_minutes.abs() >= 24 * 60 {
        return Err(AppError::Configuration(
            "TARIFF_UTC_OFFSET_MINUTES must be within one day".to_string(),
        ));
    }
    Ok(())
}

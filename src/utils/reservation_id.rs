//! Generador de identificadores de reserva
//!
//! Formato: `TX-` + últimos 6 dígitos del timestamp en milisegundos
//! + sufijo aleatorio de 6 caracteres alfanuméricos en mayúsculas.

use chrono::{DateTime, Utc};
use rand::Rng;

pub const PREFIX: &str = "TX-";
const TIMESTAMP_DIGITS: usize = 6;
const SUFFIX_LEN: usize = 6;
const SUFFIX_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub struct ReservationIdGenerator;

impl ReservationIdGenerator {
    /// Generar un nuevo identificador de reserva
    pub fn generate() -> String {
        Self::generate_with_timestamp(Utc::now())
    }

    /// Generar identificador con un timestamp concreto (útil para testing)
    pub fn generate_with_timestamp(timestamp: DateTime<Utc>) -> String {
        let millis = timestamp.timestamp_millis().rem_euclid(10i64.pow(TIMESTAMP_DIGITS as u32));
        format!("{}{:06}{}", PREFIX, millis, Self::random_suffix())
    }

    fn random_suffix() -> String {
        let mut rng = rand::thread_rng();
        (0..SUFFIX_LEN)
            .map(|_| SUFFIX_CHARS[rng.gen_range(0..SUFFIX_CHARS.len())] as char)
            .collect()
    }

    /// Verificar si un identificador tiene el formato esperado
    pub fn is_valid(id: &str) -> bool {
        let Some(body) = id.strip_prefix(PREFIX) else {
            return false;
        };
        if body.len() != TIMESTAMP_DIGITS + SUFFIX_LEN {
            return false;
        }

        let (digits, suffix) = body.split_at(TIMESTAMP_DIGITS);
        digits.chars().all(|c| c.is_ascii_digit())
            && suffix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_id_format() {
        for _ in 0..100 {
            let id = ReservationIdGenerator::generate();
            assert!(id.starts_with("TX-"));
            assert_eq!(id.len(), 3 + 6 + 6);
            assert!(ReservationIdGenerator::is_valid(&id), "invalid id: {}", id);
        }
    }

    #[test]
    fn test_timestamp_part_uses_last_six_millis_digits() {
        let ts = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        let id = ReservationIdGenerator::generate_with_timestamp(ts);
        assert_eq!(&id[3..9], "123456");

        let ts = Utc.timestamp_millis_opt(1_700_000_000_042).unwrap();
        let id = ReservationIdGenerator::generate_with_timestamp(ts);
        assert_eq!(&id[3..9], "000042");
    }

    #[test]
    fn test_same_millisecond_ids_do_not_collide() {
        let ts = Utc::now();
        let ids: HashSet<String> = (0..1000)
            .map(|_| ReservationIdGenerator::generate_with_timestamp(ts))
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_is_valid_rejects_malformed_ids() {
        assert!(!ReservationIdGenerator::is_valid("TX-123456ABC"));
        assert!(!ReservationIdGenerator::is_valid("TX-12345XABCDEF"));
        assert!(!ReservationIdGenerator::is_valid("TX-123456abcdef"));
        assert!(!ReservationIdGenerator::is_valid("job-231207-a1b2c"));
    }
}

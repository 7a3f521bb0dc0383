//! Estadísticas de reservas por estado

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::reservation::{Reservation, ReservationStatus};
use crate::utils::errors::{AppError, AppResult};

/// Ventana por defecto cuando no se indica rango
pub const DEFAULT_STATS_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusStats {
    pub status: ReservationStatus,
    pub count: u64,
    pub total_amount: Decimal,
    pub avg_amount: Decimal,
}

/// Rango [from, to] sobre `created_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl StatsWindow {
    pub fn resolve(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let to = to.unwrap_or(now);
        let from = from.unwrap_or(to - Duration::days(DEFAULT_STATS_WINDOW_DAYS));

        if from > to {
            return Err(AppError::BadRequest(format!(
                "Invalid stats window: {} is after {}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.from && instant <= self.to
    }
}

/// Agrupar por estado; los estados sin reservas no aparecen
pub fn compute_stats<'a, I>(reservations: I, window: &StatsWindow) -> Vec<StatusStats>
where
    I: IntoIterator<Item = &'a Reservation>,
{
    let mut groups: BTreeMap<ReservationStatus, (u64, Decimal)> = BTreeMap::new();

    for reservation in reservations
        .into_iter()
        .filter(|r| window.contains(r.created_at))
    {
        let entry = groups.entry(reservation.status()).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += reservation.pricing.total_price;
    }

    groups
        .into_iter()
        .map(|(status, (count, total_amount))| StatusStats {
            status,
            count,
            total_amount,
            avg_amount: average(total_amount, count),
        })
        .collect()
}

/// Media redondeada a 2 decimales
pub fn average(total: Decimal, count: u64) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    (total / Decimal::from(count)).round_dp(2)
}

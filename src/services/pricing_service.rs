//! Servicio de tarificación
//!
//! Calcula el `Pricing` de un trayecto a partir de la tarifa configurada:
//! tarifa base, precio por km y por minuto, suplementos de equipaje y de
//! pasajeros, y recargo nocturno / fin de semana / festivo sobre la parte
//! kilométrica (solo se aplica el mayor). El total nunca baja del mínimo
//! de percepción; el ajuste aparece como línea de suplemento.

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc, Weekday};
use rust_decimal::Decimal;
use tracing::debug;

use crate::models::booking::Booking;
use crate::models::pricing::{PriceBreakdown, PriceLine, Pricing, DEFAULT_CURRENCY, DEFAULT_LOCALE};
use crate::models::trip::{MAX_DISTANCE_KM, MAX_DURATION_MINUTES};
use crate::utils::errors::{validation_error, AppResult};

/// Pasajeros incluidos en la tarifa base
pub const INCLUDED_PASSENGERS: u8 = 4;

const NIGHT_START_HOUR: u32 = 19;
const NIGHT_END_HOUR: u32 = 7;

/// Festivos franceses de fecha fija (mes, día)
const FIXED_HOLIDAYS: [(u32, u32); 8] = [
    (1, 1),
    (5, 1),
    (5, 8),
    (7, 14),
    (8, 15),
    (11, 1),
    (11, 11),
    (12, 25),
];

#[derive(Debug, Clone, PartialEq)]
pub struct TariffConfig {
    pub base_fare: Decimal,
    pub price_per_km: Decimal,
    pub price_per_minute: Decimal,
    pub minimum_fare: Decimal,
    pub luggage_supplement: Decimal,
    pub free_luggage: u8,
    pub passenger_supplement: Decimal,
    pub night_multiplier: Decimal,
    pub weekend_multiplier: Decimal,
    pub holiday_multiplier: Decimal,
    /// Desfase horario local para las franjas noche/fin de semana
    pub utc_offset_minutes: i32,
    pub currency: String,
    pub locale: String,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            base_fare: Decimal::new(450, 2),
            price_per_km: Decimal::new(130, 2),
            price_per_minute: Decimal::new(30, 2),
            minimum_fare: Decimal::new(800, 2),
            luggage_supplement: Decimal::new(200, 2),
            free_luggage: 2,
            passenger_supplement: Decimal::new(300, 2),
            night_multiplier: Decimal::new(150, 2),
            weekend_multiplier: Decimal::new(125, 2),
            holiday_multiplier: Decimal::new(150, 2),
            utc_offset_minutes: 60,
            currency: DEFAULT_CURRENCY.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PricingService {
    tariff: TariffConfig,
}

impl PricingService {
    pub fn new(tariff: TariffConfig) -> Self {
        Self { tariff }
    }

    pub fn tariff(&self) -> &TariffConfig {
        &self.tariff
    }

    /// Calcular la tarifa de un trayecto para una hora de recogida
    pub fn quote(
        &self,
        distance_km: f64,
        duration_minutes: u32,
        booking: &Booking,
        pickup: DateTime<Utc>,
    ) -> AppResult<Pricing> {
        if !(0.0..=MAX_DISTANCE_KM).contains(&distance_km) {
            return Err(validation_error(
                "distance_km",
                "range",
                "Distance hors des limites autorisées",
            ));
        }
        if duration_minutes > MAX_DURATION_MINUTES {
            return Err(validation_error(
                "duration_minutes",
                "range",
                "Durée hors des limites autorisées",
            ));
        }
        let distance = Decimal::try_from(distance_km)
            .map_err(|_| validation_error("distance_km", "range", "Distance invalide"))?;

        let tariff = &self.tariff;
        let local = self.local_time(pickup);
        let is_night = is_night(&local);
        let is_weekend = matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
        let is_holiday = is_fixed_holiday(&local);

        let multiplier = [
            (is_night, tariff.night_multiplier),
            (is_weekend, tariff.weekend_multiplier),
            (is_holiday, tariff.holiday_multiplier),
        ]
        .into_iter()
        .filter_map(|(applies, m)| applies.then_some(m))
        .fold(Decimal::ONE, Decimal::max);

        let distance_fare = (tariff.price_per_km * distance * multiplier).round_dp(2);
        let time_fare = (tariff.price_per_minute * Decimal::from(duration_minutes)).round_dp(2);

        let mut supplements = Vec::new();

        let extra_luggage = booking.luggage.saturating_sub(tariff.free_luggage);
        let luggage_supplement = tariff.luggage_supplement * Decimal::from(extra_luggage);
        if extra_luggage > 0 {
            supplements.push(PriceLine::new(
                format!("Bagages supplémentaires ({})", extra_luggage),
                luggage_supplement,
            ));
        }

        let extra_passengers = booking.passengers.saturating_sub(INCLUDED_PASSENGERS);
        let passenger_supplement = tariff.passenger_supplement * Decimal::from(extra_passengers);
        if extra_passengers > 0 {
            supplements.push(PriceLine::new(
                format!("Passagers supplémentaires ({})", extra_passengers),
                passenger_supplement,
            ));
        }

        let mut breakdown = PriceBreakdown {
            base_fare: tariff.base_fare,
            distance_fare,
            time_fare,
            supplements,
            discounts: Vec::new(),
        };

        let subtotal = breakdown.total();
        if subtotal < tariff.minimum_fare {
            breakdown.supplements.push(PriceLine::new(
                "Minimum de perception",
                tariff.minimum_fare - subtotal,
            ));
        }
        let total_price = breakdown.total().round_dp(2);

        debug!(
            "💶 Tarifa calculada: {} km, {} min, x{} -> {} {}",
            distance_km, duration_minutes, multiplier, total_price, tariff.currency
        );

        Ok(Pricing {
            base_price: tariff.base_fare,
            price_per_km: tariff.price_per_km,
            luggage_supplement,
            passenger_supplement,
            is_night_rate: is_night,
            is_weekend_rate: is_weekend,
            is_holiday_rate: is_holiday,
            total_price,
            currency: tariff.currency.clone(),
            locale: tariff.locale.clone(),
            breakdown,
        })
    }

    fn local_time(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(self.tariff.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix());
        instant.with_timezone(&offset)
    }
}

fn is_night(local: &DateTime<FixedOffset>) -> bool {
    let hour = local.hour();
    hour >= NIGHT_START_HOUR || hour < NIGHT_END_HOUR
}

fn is_fixed_holiday(local: &DateTime<FixedOffset>) -> bool {
    FIXED_HOLIDAYS.contains(&(local.month(), local.day()))
}

//! Modelo de Pricing
//!
//! Tarifa aplicada a una reserva y su desglose (tarifa base, distancia,
//! tiempo, suplementos y descuentos).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::utils::validation::{into_result, validate_length, validate_non_negative_amount};

pub const DEFAULT_CURRENCY: &str = "EUR";
pub const DEFAULT_LOCALE: &str = "fr-FR";

/// Línea de suplemento o descuento
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLine {
    pub label: String,
    pub amount: Decimal,
}

impl PriceLine {
    pub fn new(label: impl Into<String>, amount: Decimal) -> Self {
        Self {
            label: label.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_fare: Decimal,
    pub distance_fare: Decimal,
    pub time_fare: Decimal,
    #[serde(default)]
    pub supplements: Vec<PriceLine>,
    #[serde(default)]
    pub discounts: Vec<PriceLine>,
}

impl PriceBreakdown {
    /// Suma del desglose (descuentos restados)
    pub fn total(&self) -> Decimal {
        let supplements: Decimal = self.supplements.iter().map(|s| s.amount).sum();
        let discounts: Decimal = self.discounts.iter().map(|d| d.amount).sum();
        self.base_fare + self.distance_fare + self.time_fare + supplements - discounts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub base_price: Decimal,
    pub price_per_km: Decimal,
    #[serde(default)]
    pub luggage_supplement: Decimal,
    #[serde(default)]
    pub passenger_supplement: Decimal,
    #[serde(default)]
    pub is_night_rate: bool,
    #[serde(default)]
    pub is_weekend_rate: bool,
    #[serde(default)]
    pub is_holiday_rate: bool,
    pub total_price: Decimal,
    pub currency: String,
    pub locale: String,
    #[serde(default)]
    pub breakdown: PriceBreakdown,
}

impl Pricing {
    /// El total coincide con la suma del desglose (al céntimo)
    pub fn reconciles(&self) -> bool {
        self.breakdown.total().round_dp(2) == self.total_price.round_dp(2)
    }
}

impl Validate for Pricing {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let amounts = [
            ("base_price", self.base_price),
            ("price_per_km", self.price_per_km),
            ("luggage_supplement", self.luggage_supplement),
            ("passenger_supplement", self.passenger_supplement),
            ("total_price", self.total_price),
        ];
        for (field, amount) in amounts {
            if let Err(e) = validate_non_negative_amount(amount) {
                errors.add(field, e);
            }
        }

        let breakdown = &self.breakdown;
        let lines = [breakdown.base_fare, breakdown.distance_fare, breakdown.time_fare]
            .into_iter()
            .chain(breakdown.supplements.iter().map(|s| s.amount))
            .chain(breakdown.discounts.iter().map(|d| d.amount));
        for amount in lines {
            if let Err(e) = validate_non_negative_amount(amount) {
                errors.add("breakdown", e);
                break;
            }
        }

        if let Err(e) = validate_length(&self.currency, 3, 3) {
            errors.add("currency", e);
        }
        if let Err(e) = validate_length(&self.locale, 2, 10) {
            errors.add("locale", e);
        }

        into_result(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::flatten_errors;

    fn pricing() -> Pricing {
        Pricing {
            base_price: Decimal::new(450, 2),
            price_per_km: Decimal::new(130, 2),
            luggage_supplement: Decimal::ZERO,
            passenger_supplement: Decimal::ZERO,
            is_night_rate: false,
            is_weekend_rate: false,
            is_holiday_rate: false,
            total_price: Decimal::new(2000, 2),
            currency: DEFAULT_CURRENCY.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            breakdown: PriceBreakdown {
                base_fare: Decimal::new(450, 2),
                distance_fare: Decimal::new(1300, 2),
                time_fare: Decimal::new(250, 2),
                supplements: vec![PriceLine::new("Bagages", Decimal::new(100, 2))],
                discounts: vec![PriceLine::new("Fidélité", Decimal::new(100, 2))],
            },
        }
    }

    #[test]
    fn test_valid_pricing_reconciles() {
        let p = pricing();
        assert!(p.validate().is_ok());
        assert_eq!(p.breakdown.total(), Decimal::new(2000, 2));
        assert!(p.reconciles());
    }

    #[test]
    fn test_mismatched_total_does_not_reconcile_but_is_valid() {
        let mut p = pricing();
        p.total_price = Decimal::new(2500, 2);
        assert!(p.validate().is_ok());
        assert!(!p.reconciles());
    }

    #[test]
    fn test_negative_amounts_are_rejected() {
        let mut p = pricing();
        p.total_price = Decimal::new(-1, 0);
        p.breakdown.discounts[0].amount = Decimal::new(-5, 0);

        let flat = flatten_errors(&p.validate().unwrap_err());
        assert!(flat.contains_key("total_price"));
        assert!(flat.contains_key("breakdown"));
    }

    #[test]
    fn test_currency_must_be_iso_code() {
        let mut p = pricing();
        p.currency = "EURO".to_string();
        let flat = flatten_errors(&p.validate().unwrap_err());
        assert!(flat.contains_key("currency"));
    }
}

//! Formateo de valores derivados (precio, duración)
//!
//! Funciones puras calculadas en lectura; nunca se persisten.

use rust_decimal::{Decimal, RoundingStrategy};

/// Duración legible: `45 min`, `1h 30min`, `2h`
pub fn format_duration(minutes: u32) -> String {
    if minutes < 60 {
        return format!("{} min", minutes);
    }

    let hours = minutes / 60;
    let rest = minutes % 60;
    if rest == 0 {
        format!("{}h", hours)
    } else {
        format!("{}h {}min", hours, rest)
    }
}

fn currency_symbol(currency: &str) -> &str {
    match currency.to_ascii_uppercase().as_str() {
        "EUR" => "€",
        "USD" => "$",
        "GBP" => "£",
        _ => currency,
    }
}

/// Precio legible según divisa y locale.
///
/// Locales `fr`/`de`/`es`/`it`/`pt`/`nl`: coma decimal, separador de miles
/// con espacio y símbolo detrás (`1 234,50 €`). Resto: punto decimal y
/// símbolo delante (`€1,234.50`).
pub fn format_price(amount: Decimal, currency: &str, locale: &str) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let language = locale
        .split(['-', '_'])
        .next()
        .unwrap_or("fr")
        .to_ascii_lowercase();
    let comma_locale = matches!(language.as_str(), "fr" | "de" | "es" | "it" | "pt" | "nl");

    let symbol = currency_symbol(currency);
    let sign = if negative { "-" } else { "" };

    if comma_locale {
        let grouped = group_thousands(int_part, ' ');
        format!("{}{},{} {}", sign, grouped, frac_part, symbol)
    } else {
        let grouped = group_thousands(int_part, ',');
        format!("{}{}{}.{}", sign, symbol, grouped, frac_part)
    }
}

fn group_thousands(digits: &str, separator: char) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(c);
    }
    grouped
}

//! Display formatting for amounts and prices
//!
//! Rupiah renders with dot-grouped thousands and no decimals, dollar and
//! euro with two decimals (six below one), other fiat with four, crypto
//! with eight.

use rust_decimal::{Decimal, RoundingStrategy};

use super::unit::{FiatCode, Unit};

const CRYPTO_DECIMALS: u32 = 8;
const OTHER_FIAT_DECIMALS: u32 = 4;

/// Format `value` expressed in `unit` for a chat reply
pub fn format_amount(value: Decimal, unit: &Unit) -> String {
    match unit {
        Unit::Fiat(FiatCode::Idr) => format!("Rp {}", format_fixed(value, 0, '.', ',')),
        Unit::Fiat(FiatCode::Usd) => format!("${}", format_fixed(value, price_decimals(value), ',', '.')),
        Unit::Fiat(FiatCode::Eur) => format!("€{}", format_fixed(value, price_decimals(value), ',', '.')),
        Unit::Fiat(code) => format!("{} {}", format_fixed(value, OTHER_FIAT_DECIMALS, ',', '.'), code),
        Unit::Crypto { .. } => format!(
            "{} {}",
            format_fixed(value, CRYPTO_DECIMALS, ',', '.'),
            unit.ticker()
        ),
    }
}

/// Price quoted in `quote`, a fiat code or a coin ticker.
///
/// Tether quotes render like dollars.
pub fn format_price(value: Decimal, quote: &str) -> String {
    let quote = quote.trim().to_lowercase();
    match FiatCode::from_code(&quote) {
        Some(code) => format_amount(value, &Unit::Fiat(code)),
        None if quote == "usdt" => format!("${}", format_fixed(value, price_decimals(value), ',', '.')),
        None => format!(
            "{} {}",
            format_fixed(value, OTHER_FIAT_DECIMALS, ',', '.'),
            quote.to_uppercase()
        ),
    }
}

/// Quantity as typed, without trailing zeros ("0.250" -> "0.25")
pub fn format_quantity(quantity: Decimal) -> String {
    quantity.normalize().to_string()
}

/// Signed percentage with two decimals ("+1.25%")
pub fn format_change(pct: Decimal) -> String {
    let rounded = pct.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("{:.2}%", rounded)
    } else {
        format!("+{:.2}%", rounded.abs())
    }
}

fn price_decimals(value: Decimal) -> u32 {
    if !value.is_zero() && value.abs() < Decimal::ONE {
        6
    } else {
        2
    }
}

/// Fixed-point rendering with custom group and decimal separators
pub fn format_fixed(value: Decimal, decimals: u32, group: char, point: char) -> String {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.*}", decimals as usize, rounded.abs());

    let (int_part, frac_part) = match text.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (text.as_str(), None),
    };

    let mut out = String::with_capacity(text.len() + text.len() / 3 + 1);
    if negative {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part, group));
    if let Some(frac) = frac_part {
        out.push(point);
        out.push_str(frac);
    }
    out
}

fn group_thousands(digits: &str, sep: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(ch);
    }
    out
}

//! Conversion request/result types and the conversion error kinds

use rust_decimal::Decimal;
use thiserror::Error;

use super::unit::{normalize_unit_alias, Unit};

/// Errors surfaced while parsing, resolving or pricing a conversion.
///
/// None of these are fatal: each one becomes a single error reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("No amount and unit found in message")]
    NoMatch,

    /// Registry refresh failed; lookups keep using the cached table
    #[error("Symbol registry is stale: {0}")]
    StaleRegistry(String),
}

/// Quantity and units extracted from a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub quantity: Decimal,
    /// Normalized source unit token ("btc", "idr")
    pub source: String,
    /// Normalized target unit token; `None` means "use the chat default"
    pub target: Option<String>,
}

impl ParsedRequest {
    pub fn new(quantity: Decimal, source: &str, target: Option<&str>) -> Self {
        Self {
            quantity,
            source: normalize_unit_alias(source),
            target: target.map(normalize_unit_alias),
        }
    }

    /// Fill in the target unit when the message omitted it
    pub fn or_target(mut self, default_unit: &str) -> Self {
        if self.target.is_none() {
            self.target = Some(normalize_unit_alias(default_unit));
        }
        self
    }
}

/// Outcome of a single conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub request: ParsedRequest,
    pub source: Unit,
    pub target: Unit,
    /// Price of one source unit in target units
    pub rate: Decimal,
    pub output: Decimal,
    pub formatted: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_request_normalizes_units() {
        let req = ParsedRequest::new(dec!(1), "$SOL", Some("Rupiah"));
        assert_eq!(req.source, "sol");
        assert_eq!(req.target.as_deref(), Some("idr"));
    }

    #[test]
    fn test_or_target_only_fills_missing() {
        let req = ParsedRequest::new(dec!(1), "btc", None).or_target("USD");
        assert_eq!(req.target.as_deref(), Some("usd"));

        let req = ParsedRequest::new(dec!(1), "btc", Some("idr")).or_target("usd");
        assert_eq!(req.target.as_deref(), Some("idr"));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ConversionError::UnknownSymbol("xyz".into()).to_string(),
            "Unknown symbol: xyz"
        );
        assert_eq!(ConversionError::NoMatch.to_string(), "No amount and unit found in message");
    }
}

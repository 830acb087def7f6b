//! CoinGecko wire types

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Number;

/// Row of `/coins/list`
#[derive(Debug, Clone, Deserialize)]
pub struct CoinListItem {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

/// `/simple/price` body: `{"bitcoin": {"usd": 65000.1, "usd_24h_change": -1.2}}`
pub type SimplePriceResponse = HashMap<String, HashMap<String, Option<Number>>>;

/// Row of `/coins/markets`
#[derive(Debug, Clone, Deserialize)]
pub struct MarketItem {
    pub symbol: String,
    pub name: String,
    pub current_price: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
}

/// `/coins/{id}/ohlc` body: `[[time_ms, open, high, low, close], ...]`
pub type OhlcResponse = Vec<Vec<Number>>;

/// `/global` body
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalResponse {
    pub data: GlobalData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalData {
    #[serde(default)]
    pub market_cap_percentage: HashMap<String, f64>,
}

/// Exact decimal from a JSON number, including exponent forms like `1.2e-5`
pub fn number_to_decimal(n: &Number) -> Option<Decimal> {
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_simple_price_body() {
        let body = r#"{"bitcoin":{"idr":1040000000,"idr_24h_change":-1.25},"pepe":{"idr":0.1523,"idr_24h_change":null}}"#;
        let parsed: SimplePriceResponse = serde_json::from_str(body).unwrap();

        let btc = &parsed["bitcoin"];
        assert_eq!(number_to_decimal(btc["idr"].as_ref().unwrap()), Some(dec!(1040000000)));
        assert_eq!(
            number_to_decimal(btc["idr_24h_change"].as_ref().unwrap()),
            Some(dec!(-1.25))
        );
        assert!(parsed["pepe"]["idr_24h_change"].is_none());
    }

    #[test]
    fn test_exponent_numbers() {
        let n: Number = serde_json::from_str("1.2e-5").unwrap();
        assert_eq!(number_to_decimal(&n), Some(dec!(0.000012)));
    }

    #[test]
    fn test_global_body() {
        let body = r#"{"data":{"active_cryptocurrencies":1,"market_cap_percentage":{"btc":54.3,"eth":16.1}}}"#;
        let parsed: GlobalResponse = serde_json::from_str(body).unwrap();
        approx::assert_relative_eq!(parsed.data.market_cap_percentage["btc"], 54.3);
    }
}

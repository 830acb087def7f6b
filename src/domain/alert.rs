//! Price alerts

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::coin::CoinId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertOp {
    Above,
    Below,
}

impl AlertOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertOp::Above => "above",
            AlertOp::Below => "below",
        }
    }
}

impl fmt::Display for AlertOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "above" | "diatas" | ">" | ">=" => Ok(AlertOp::Above),
            "below" | "dibawah" | "<" | "<=" => Ok(AlertOp::Below),
            other => Err(format!("operator must be 'above' or 'below', got '{}'", other)),
        }
    }
}

/// A one-shot price alert owned by a chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub chat_id: i64,
    /// Ticker as the user typed it, lowercase
    pub symbol: String,
    pub coin_id: CoinId,
    /// Quote currency code, lowercase
    pub quote: String,
    pub op: AlertOp,
    pub price: Decimal,
}

impl Alert {
    /// Whether `rate` crosses the alert threshold (inclusive)
    pub fn is_hit(&self, rate: Decimal) -> bool {
        match self.op {
            AlertOp::Above => rate >= self.price,
            AlertOp::Below => rate <= self.price,
        }
    }

    /// "BTC IDR above 1000000000"
    pub fn describe(&self) -> String {
        format!(
            "{} {} {} {}",
            self.symbol.to_uppercase(),
            self.quote.to_uppercase(),
            self.op,
            self.price.normalize()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn alert(op: AlertOp, price: Decimal) -> Alert {
        Alert {
            chat_id: 42,
            symbol: "btc".into(),
            coin_id: CoinId::new("bitcoin"),
            quote: "usd".into(),
            op,
            price,
        }
    }

    #[test]
    fn test_above_is_inclusive() {
        let a = alert(AlertOp::Above, dec!(60000));
        assert!(a.is_hit(dec!(60000)));
        assert!(a.is_hit(dec!(60001)));
        assert!(!a.is_hit(dec!(59999.99)));
    }

    #[test]
    fn test_below_is_inclusive() {
        let a = alert(AlertOp::Below, dec!(50000));
        assert!(a.is_hit(dec!(50000)));
        assert!(a.is_hit(dec!(100)));
        assert!(!a.is_hit(dec!(50000.01)));
    }

    #[test]
    fn test_op_parsing() {
        assert_eq!("ABOVE".parse::<AlertOp>(), Ok(AlertOp::Above));
        assert_eq!("below".parse::<AlertOp>(), Ok(AlertOp::Below));
        assert!("sideways".parse::<AlertOp>().is_err());
    }

    #[test]
    fn test_describe_and_serde() {
        let a = alert(AlertOp::Above, dec!(60000.50));
        assert_eq!(a.describe(), "BTC USD above 60000.5");

        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains("\"op\":\"above\""));
        let back: Alert = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}

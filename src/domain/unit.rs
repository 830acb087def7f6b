//! Currency units: built-in fiat codes and registry-backed crypto coins

use std::fmt;
use std::str::FromStr;

use super::coin::{normalize_token, CoinId};

/// Fiat currencies recognized without consulting the coin registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FiatCode {
    Idr,
    Usd,
    Eur,
    Gbp,
    Jpy,
    Sgd,
    Myr,
    Aud,
    Cad,
    Chf,
    Cny,
    Krw,
    Inr,
    Thb,
    Php,
}

impl FiatCode {
    pub const ALL: [FiatCode; 15] = [
        FiatCode::Idr,
        FiatCode::Usd,
        FiatCode::Eur,
        FiatCode::Gbp,
        FiatCode::Jpy,
        FiatCode::Sgd,
        FiatCode::Myr,
        FiatCode::Aud,
        FiatCode::Cad,
        FiatCode::Chf,
        FiatCode::Cny,
        FiatCode::Krw,
        FiatCode::Inr,
        FiatCode::Thb,
        FiatCode::Php,
    ];

    /// Lowercase ISO code, as used in price API query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            FiatCode::Idr => "idr",
            FiatCode::Usd => "usd",
            FiatCode::Eur => "eur",
            FiatCode::Gbp => "gbp",
            FiatCode::Jpy => "jpy",
            FiatCode::Sgd => "sgd",
            FiatCode::Myr => "myr",
            FiatCode::Aud => "aud",
            FiatCode::Cad => "cad",
            FiatCode::Chf => "chf",
            FiatCode::Cny => "cny",
            FiatCode::Krw => "krw",
            FiatCode::Inr => "inr",
            FiatCode::Thb => "thb",
            FiatCode::Php => "php",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = normalize_unit_alias(code);
        Self::ALL.iter().copied().find(|f| f.as_str() == code)
    }
}

impl fmt::Display for FiatCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for FiatCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| format!("unknown fiat code: {}", s))
    }
}

/// Map spoken currency names onto their codes ("rupiah" -> "idr").
///
/// Anything not in the table is returned normalized but otherwise untouched.
pub fn normalize_unit_alias(token: &str) -> String {
    let token = normalize_token(token);
    let mapped = match token.as_str() {
        "rupiah" | "rp" | "rupiahs" => "idr",
        "dollar" | "dolar" | "dollars" | "usd$" => "usd",
        "euro" | "euros" => "eur",
        "pound" | "pounds" | "sterling" => "gbp",
        "yen" => "jpy",
        "ringgit" | "rm" => "myr",
        "won" => "krw",
        "yuan" | "rmb" => "cny",
        "rupee" | "rupees" => "inr",
        "baht" => "thb",
        "peso" | "pesos" => "php",
        _ => return token,
    };
    mapped.to_string()
}

/// One side of a conversion, after resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Unit {
    Fiat(FiatCode),
    /// Crypto coin with the ticker the user typed (kept for display)
    Crypto { id: CoinId, ticker: String },
}

impl Unit {
    pub fn crypto(id: CoinId, ticker: &str) -> Self {
        Unit::Crypto {
            id,
            ticker: normalize_token(ticker),
        }
    }

    pub fn is_fiat(&self) -> bool {
        matches!(self, Unit::Fiat(_))
    }

    /// Upper-case display ticker ("BTC", "IDR")
    pub fn ticker(&self) -> String {
        match self {
            Unit::Fiat(code) => code.to_string(),
            Unit::Crypto { ticker, .. } => ticker.to_uppercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fiat_from_code() {
        assert_eq!(FiatCode::from_code("IDR"), Some(FiatCode::Idr));
        assert_eq!(FiatCode::from_code("usd"), Some(FiatCode::Usd));
        assert_eq!(FiatCode::from_code("rupiah"), Some(FiatCode::Idr));
        assert_eq!(FiatCode::from_code("btc"), None);
        assert_eq!(FiatCode::from_code("usdt"), None);
    }

    #[test]
    fn test_fiat_round_trip_codes() {
        for code in FiatCode::ALL {
            assert_eq!(code.as_str().parse::<FiatCode>(), Ok(code));
        }
    }

    #[test]
    fn test_normalize_unit_alias() {
        assert_eq!(normalize_unit_alias("Rupiah"), "idr");
        assert_eq!(normalize_unit_alias("rp"), "idr");
        assert_eq!(normalize_unit_alias("dolar"), "usd");
        assert_eq!(normalize_unit_alias("$SOL"), "sol");
    }

    #[test]
    fn test_unit_ticker() {
        assert_eq!(Unit::Fiat(FiatCode::Idr).ticker(), "IDR");
        assert_eq!(Unit::crypto(CoinId::new("bitcoin"), "$btc").ticker(), "BTC");
        assert!(Unit::Fiat(FiatCode::Eur).is_fiat());
    }
}

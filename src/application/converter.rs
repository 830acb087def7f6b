//! Conversion Engine
//!
//! Resolves both sides of a parsed request, prices them through the
//! resolver and formats the answer.
//!
//! Rate direction:
//! - crypto -> fiat:   output = quantity * price(src in fiat)
//! - fiat -> crypto:   output = quantity / price(dst in fiat)
//! - fiat -> fiat:     output = quantity * fiat_rate(src, dst)
//! - crypto -> crypto: priced through USD on both legs

use std::sync::Arc;
use rust_decimal::Decimal;

use crate::domain::{
    format_amount, format_quantity, normalize_unit_alias, CoinId, ConversionError,
    ConversionResult, FiatCode, ParsedRequest, Unit,
};
use super::registry::SymbolRegistry;
use super::resolver::PriceResolver;

/// Quote currency used to bridge two crypto units
const PIVOT_QUOTE: &str = "usd";

pub struct Converter {
    registry: Arc<SymbolRegistry>,
    resolver: Arc<PriceResolver>,
    default_quote: String,
}

impl Converter {
    pub fn new(registry: Arc<SymbolRegistry>, resolver: Arc<PriceResolver>, default_quote: &str) -> Self {
        Self {
            registry,
            resolver,
            default_quote: normalize_unit_alias(default_quote),
        }
    }

    /// Fiat codes resolve locally; everything else goes through the registry
    pub async fn resolve_unit(&self, token: &str) -> Result<Unit, ConversionError> {
        let token = normalize_unit_alias(token);
        if let Some(code) = FiatCode::from_code(&token) {
            return Ok(Unit::Fiat(code));
        }
        let id = self.registry.resolve(&token).await?;
        Ok(Unit::crypto(id, &token))
    }

    /// Convert a request; a missing target falls back to the converter default
    pub async fn convert(&self, request: &ParsedRequest) -> Result<ConversionResult, ConversionError> {
        let target_token = request
            .target
            .clone()
            .unwrap_or_else(|| self.default_quote.clone());

        let source = self.resolve_unit(&request.source).await?;
        let target = self.resolve_unit(&target_token).await?;
        let quantity = request.quantity;

        let (rate, output, reference) = match (&source, &target) {
            _ if same_currency(&source, &target) => (Decimal::ONE, quantity, None),
            (Unit::Fiat(from), Unit::Fiat(to)) => {
                let rate = self.resolver.get_fiat_rate(*from, *to).await?;
                (rate, checked_mul(quantity, rate)?, None)
            }
            (Unit::Crypto { id, ticker }, Unit::Fiat(to)) => {
                let price = self.price_of(id, ticker, to.as_str()).await?;
                (price, checked_mul(quantity, price)?, None)
            }
            (Unit::Fiat(from), Unit::Crypto { id, ticker }) => {
                let price = self.price_of(id, ticker, from.as_str()).await?;
                let rate = checked_div(Decimal::ONE, price)?;
                // Show the price of the coin, not the tiny inverse
                (rate, checked_div(quantity, price)?, Some(price))
            }
            (Unit::Crypto { id: src_id, ticker: src }, Unit::Crypto { id: dst_id, ticker: dst }) => {
                let src_usd = self.price_of(src_id, src, PIVOT_QUOTE).await?;
                let dst_usd = self.price_of(dst_id, dst, PIVOT_QUOTE).await?;
                let rate = checked_div(src_usd, dst_usd)?;
                let output = checked_div(checked_mul(quantity, src_usd)?, dst_usd)?;
                (rate, output, None)
            }
        };

        let formatted = match reference {
            Some(price) => format!(
                "🔁 {} {} ≈ {} (1 {} = {})",
                format_quantity(quantity),
                source.ticker(),
                format_amount(output, &target),
                target.ticker(),
                format_amount(price, &source)
            ),
            None => format!(
                "🔁 {} {} ≈ {} (1 {} = {})",
                format_quantity(quantity),
                source.ticker(),
                format_amount(output, &target),
                source.ticker(),
                format_amount(rate, &target)
            ),
        };

        tracing::debug!(
            "converted {} {} -> {} {} @ {}",
            quantity,
            source.ticker(),
            output,
            target.ticker(),
            rate
        );

        Ok(ConversionResult {
            request: request.clone(),
            source,
            target,
            rate,
            output,
            formatted,
        })
    }

    /// Price of `id` in `quote`, reporting unknown ids by the typed ticker
    async fn price_of(&self, id: &CoinId, ticker: &str, quote: &str) -> Result<Decimal, ConversionError> {
        let price = self.resolver.get_rate(id, quote).await.map_err(|e| match e {
            ConversionError::UnknownSymbol(_) => ConversionError::UnknownSymbol(ticker.to_string()),
            other => other,
        })?;
        if price.is_zero() {
            return Err(ConversionError::PriceUnavailable(format!("{}/{} is zero", id, quote)));
        }
        Ok(price)
    }
}

fn same_currency(a: &Unit, b: &Unit) -> bool {
    match (a, b) {
        (Unit::Fiat(x), Unit::Fiat(y)) => x == y,
        (Unit::Crypto { id: x, .. }, Unit::Crypto { id: y, .. }) => x == y,
        _ => false,
    }
}

fn checked_mul(a: Decimal, b: Decimal) -> Result<Decimal, ConversionError> {
    a.checked_mul(b)
        .ok_or_else(|| ConversionError::PriceUnavailable("amount out of range".into()))
}

fn checked_div(a: Decimal, b: Decimal) -> Result<Decimal, ConversionError> {
    a.checked_div(b)
        .ok_or_else(|| ConversionError::PriceUnavailable("amount out of range".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::registry::RegistryConfig;
    use crate::application::resolver::DEFAULT_PRICE_TTL;
    use crate::domain::CoinEntry;
    use crate::ports::mocks::{MockCoinList, MockFiatRates, MockPriceSource};
    use rust_decimal_macros::dec;

    struct Fixture {
        prices: MockPriceSource,
        converter: Converter,
    }

    fn fixture() -> Fixture {
        let coins = MockCoinList::new(vec![
            CoinEntry::new("bitcoin", "btc"),
            CoinEntry::new("ethereum", "eth"),
            CoinEntry::new("solana", "sol"),
            CoinEntry::new("tether", "usdt"),
        ]);
        let prices = MockPriceSource::new()
            .with_price("bitcoin", "usd", dec!(65000))
            .with_price("bitcoin", "idr", dec!(1040000000))
            .with_price("ethereum", "usd", dec!(3250))
            .with_price("solana", "idr", dec!(2400000))
            .with_price("tether", "usd", dec!(1));
        let fiat = MockFiatRates::new().with_rate(FiatCode::Usd, FiatCode::Idr, dec!(16250.5));

        let registry = Arc::new(SymbolRegistry::new(Arc::new(coins), RegistryConfig::default()));
        let resolver = Arc::new(PriceResolver::new(
            Arc::new(prices.clone()),
            Arc::new(fiat),
            DEFAULT_PRICE_TTL,
        ));
        Fixture {
            prices,
            converter: Converter::new(registry, resolver, "usd"),
        }
    }

    #[tokio::test]
    async fn test_crypto_to_fiat() {
        let f = fixture();
        let req = ParsedRequest::new(dec!(0.25), "sol", Some("rupiah"));
        let result = f.converter.convert(&req).await.unwrap();

        assert_eq!(result.output, dec!(600000));
        assert_eq!(result.rate, dec!(2400000));
        assert_eq!(result.formatted, "🔁 0.25 SOL ≈ Rp 600.000 (1 SOL = Rp 2.400.000)");
    }

    #[tokio::test]
    async fn test_fiat_to_crypto_divides() {
        let f = fixture();
        let req = ParsedRequest::new(dec!(520000000), "idr", Some("btc"));
        let result = f.converter.convert(&req).await.unwrap();

        assert_eq!(result.output, dec!(0.5));
        assert_eq!(
            result.formatted,
            "🔁 520000000 IDR ≈ 0.50000000 BTC (1 BTC = Rp 1.040.000.000)"
        );
    }

    #[tokio::test]
    async fn test_round_trip_within_cached_window() {
        let f = fixture();
        let x = dec!(0.1234);

        let there = f
            .converter
            .convert(&ParsedRequest::new(x, "btc", Some("idr")))
            .await
            .unwrap();
        let back = f
            .converter
            .convert(&ParsedRequest::new(there.output, "idr", Some("btc")))
            .await
            .unwrap();

        let diff = (back.output - x).abs();
        assert!(diff <= x * dec!(0.000000000001), "round trip drifted: {}", back.output);
        assert_eq!(f.prices.call_count(), 1);
    }

    #[tokio::test]
    async fn test_crypto_to_crypto_via_usd() {
        let f = fixture();
        let req = ParsedRequest::new(dec!(1), "btc", Some("eth"));
        let result = f.converter.convert(&req).await.unwrap();

        assert_eq!(result.rate, dec!(65000) / dec!(3250));
        assert_eq!(result.output, dec!(20));

        let usdt = f
            .converter
            .convert(&ParsedRequest::new(dec!(2), "eth", Some("usdt")))
            .await
            .unwrap();
        assert_eq!(usdt.output, dec!(6500));
    }

    #[tokio::test]
    async fn test_fiat_to_fiat() {
        let f = fixture();
        let req = ParsedRequest::new(dec!(10), "usd", Some("idr"));
        let result = f.converter.convert(&req).await.unwrap();
        assert_eq!(result.output, dec!(162505));
        assert_eq!(f.prices.call_count(), 0);
    }

    #[tokio::test]
    async fn test_same_unit_is_identity() {
        let f = fixture();
        let result = f
            .converter
            .convert(&ParsedRequest::new(dec!(1.5), "btc", Some("xbt")))
            .await
            .unwrap();
        assert_eq!(result.output, dec!(1.5));
        assert_eq!(result.rate, Decimal::ONE);
        assert_eq!(f.prices.call_count(), 0);

        let result = f
            .converter
            .convert(&ParsedRequest::new(dec!(7), "idr", Some("rp")))
            .await
            .unwrap();
        assert_eq!(result.output, dec!(7));
    }

    #[tokio::test]
    async fn test_default_target() {
        let f = fixture();
        let result = f
            .converter
            .convert(&ParsedRequest::new(dec!(2), "btc", None))
            .await
            .unwrap();
        assert_eq!(result.target, Unit::Fiat(FiatCode::Usd));
        assert_eq!(result.output, dec!(130000));
        assert_eq!(result.formatted, "🔁 2 BTC ≈ $130,000.00 (1 BTC = $65,000.00)");
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let f = fixture();
        let err = f
            .converter
            .convert(&ParsedRequest::new(dec!(1), "xyzzy123", Some("usd")))
            .await
            .unwrap_err();
        assert_eq!(err, ConversionError::UnknownSymbol("xyzzy123".into()));

        let err = f
            .converter
            .convert(&ParsedRequest::new(dec!(1), "btc", Some("xyzzy123")))
            .await
            .unwrap_err();
        assert_eq!(err, ConversionError::UnknownSymbol("xyzzy123".into()));
    }

    #[tokio::test]
    async fn test_price_unavailable() {
        let f = fixture();
        f.prices.set_failing(true);
        let err = f
            .converter
            .convert(&ParsedRequest::new(dec!(1), "btc", Some("usd")))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::PriceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_quote_reports_ticker() {
        let f = fixture();
        // ethereum has no idr price configured upstream
        let err = f
            .converter
            .convert(&ParsedRequest::new(dec!(1), "eth", Some("idr")))
            .await
            .unwrap_err();
        assert_eq!(err, ConversionError::UnknownSymbol("eth".into()));
    }
}

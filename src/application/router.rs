//! Message Router
//!
//! Turns one inbound chat message into at most one reply.
//!
//! `prepare` decides synchronously whether a message gets a reply at all
//! (empty text, commands addressed to another bot and throttled free text
//! are dropped); `respond` builds the reply. Slash commands are handled
//! directly. Free text is throttled, then tried
//! as a natural-language conversion, then as a "harga <sym>" price request,
//! and finally handed to the AI completion port. Every failure becomes a
//! single readable reply; nothing here is fatal to the bot loop.

use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;

use crate::domain::{
    format_change, format_price, normalize_token, normalize_unit_alias, parse, parse_quantity,
    Alert, AlertOp, CoinId, ConversionError, FiatCode, ParsedRequest,
};
use crate::ports::{
    CompletionError, CompletionParams, CompletionPort, GasOracle, InboundMessage, MarketDataError,
    MarketOverviewSource, SentimentSource,
};
use super::alerts::{AlertBook, AlertError};
use super::converter::Converter;
use super::registry::SymbolRegistry;
use super::resolver::PriceResolver;
use super::settings::{ChatSettings, SettingsError, ALLOWED_CHAT_FIATS};
use super::throttle::Throttle;

pub const HELP_TEXT: &str = "🤖 Coinrelay - AI + Crypto Bot

Perintah cepat:
• /ask <pertanyaan>
• /price <sym> [fiat] - contoh: /price btc usdt
• /prices <sym1,sym2,...> [fiat]
• /convert <amount> <sym> <fiat>
• /top [n], /dominance, /fear, /gas
• /ohlc <sym> <fiat> [days]
• /alerts, /alert add|del
• /setfiat idr|usd|usdt|eur, /status

Atau ketik langsung: \"0.25 btc ke idr\", \"harga eth\", atau pertanyaan apa saja.";

const UNKNOWN_COMMAND: &str = "Perintah tidak dikenal. Ketik /help untuk daftar perintah.";
const AI_DISABLED: &str = "⚠️ AI nonaktif (OPENAI_API_KEY belum diisi).";
const NO_ALERTS: &str = "📭 Tidak ada alert aktif.";
const OHLC_USAGE: &str = "Format: /ohlc <sym> <fiat> [days]\ncontoh: /ohlc btc usd 7";
const GAS_DISABLED: &str = "⚠️ ETHERSCAN_API_KEY belum diisi.";
const ALERT_USAGE: &str =
    "Format:\n• /alert add <sym> <fiat> above|below <price>\n• /alert del <index>\n• /alerts";

const DEFAULT_TOP: usize = 10;
const MAX_TOP: usize = 25;

/// Day ranges the OHLC endpoint accepts; anything else falls back to 1
const OHLC_DAYS: [u32; 7] = [1, 7, 14, 30, 90, 180, 365];
const OHLC_ROWS: usize = 5;

/// Sampling used when free text falls through to the AI
const CHAT_PARAMS: CompletionParams = CompletionParams {
    temperature: 0.6,
    max_tokens: 280,
};

fn price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:harga|price)\s+([a-z0-9$.,]+)(?:[/\s]+([a-z]{2,6}))?$")
            .expect("valid price regex")
    })
}

/// Everything the router talks to
pub struct RouterServices {
    pub registry: Arc<SymbolRegistry>,
    pub resolver: Arc<PriceResolver>,
    pub converter: Arc<Converter>,
    pub markets: Arc<dyn MarketOverviewSource>,
    pub sentiment: Arc<dyn SentimentSource>,
    pub gas: Arc<dyn GasOracle>,
    pub completion: Arc<dyn CompletionPort>,
    pub settings: Arc<ChatSettings>,
    pub alerts: Arc<AlertBook>,
}

/// A message that will be answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Lowercase command name without `/` or `@bot`, plus its arguments
    Command { name: String, args: Vec<String> },
    /// Trimmed free text
    Text(String),
}

pub struct MessageRouter {
    services: RouterServices,
    throttle: Throttle,
    bot_username: OnceLock<String>,
    started_at: DateTime<Utc>,
}

impl MessageRouter {
    pub fn new(services: RouterServices, throttle_interval: Duration) -> Self {
        Self {
            services,
            throttle: Throttle::new(throttle_interval),
            bot_username: OnceLock::new(),
            started_at: Utc::now(),
        }
    }

    /// Commands addressed as `/cmd@other_bot` are ignored once this is set.
    /// Only the first call has an effect.
    pub fn set_bot_username(&self, username: &str) {
        let username = username.trim().trim_start_matches('@');
        if !username.is_empty() && self.bot_username.set(username.to_string()).is_ok() {
            tracing::debug!("Router answers commands for @{}", username);
        }
    }

    /// Route one message; `None` means stay silent
    pub async fn handle(&self, msg: &InboundMessage) -> Option<String> {
        let route = self.prepare(msg)?;
        Some(self.respond(msg.chat_id, &route).await)
    }

    /// Decide whether `msg` gets a reply. Consumes throttle budget for free text.
    pub fn prepare(&self, msg: &InboundMessage) -> Option<Route> {
        let text = msg.text.trim();
        if text.is_empty() {
            return None;
        }

        if text.starts_with('/') {
            let mut parts = text.split_whitespace();
            let head = parts.next().unwrap_or_default().trim_start_matches('/');
            // "/price@coinrelay_bot" -> ("price", Some("coinrelay_bot"))
            let (name, target) = match head.split_once('@') {
                Some((name, target)) => (name, Some(target)),
                None => (head, None),
            };
            if let (Some(target), Some(me)) = (target, self.bot_username.get()) {
                if !target.eq_ignore_ascii_case(me) {
                    tracing::debug!("Ignoring /{} addressed to @{}", name, target);
                    return None;
                }
            }
            return Some(Route::Command {
                name: name.to_lowercase(),
                args: parts.map(str::to_string).collect(),
            });
        }

        if !self.throttle.allow(msg.user_id) {
            tracing::debug!("Throttled message from user {}", msg.user_id);
            return None;
        }
        Some(Route::Text(text.to_string()))
    }

    /// Build the reply for a prepared message
    pub async fn respond(&self, chat_id: i64, route: &Route) -> String {
        match route {
            Route::Command { name, args } => {
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                self.handle_command(chat_id, name, &args).await
            }
            Route::Text(text) => self.handle_text(chat_id, text).await,
        }
    }

    async fn handle_command(&self, chat_id: i64, command: &str, args: &[&str]) -> String {
        tracing::debug!("chat {} command /{} ({} args)", chat_id, command, args.len());

        match command {
            "start" | "help" => HELP_TEXT.to_string(),
            "status" => self.status(chat_id).await,
            "setfiat" => self.set_fiat(chat_id, args).await,
            "ask" => {
                if args.is_empty() {
                    "Format: /ask <pertanyaan>".to_string()
                } else {
                    self.ask(&args.join(" "), CompletionParams::default()).await
                }
            }
            "price" => match args.first() {
                Some(sym) => {
                    let quote = self.quote_or_default(chat_id, args.get(1).copied()).await;
                    self.price_reply(sym, &quote).await
                }
                None => "Format: /price <symbol> [fiat]\nex: /price btc usdt".to_string(),
            },
            "prices" => {
                let symbols = args.first().map(|raw| split_symbols(raw)).unwrap_or_default();
                if symbols.is_empty() {
                    return "Format: /prices <sym1,sym2,...> [fiat]\nex: /prices btc,eth idr".to_string();
                }
                let quote = self.quote_or_default(chat_id, args.get(1).copied()).await;
                self.prices_reply(&symbols, &quote).await
            }
            "convert" => self.convert_command(args).await,
            "top" => self.top(args).await,
            "dominance" => self.dominance().await,
            "fear" => self.fear_greed().await,
            "gas" => self.gas().await,
            "ohlc" => self.ohlc(args).await,
            "alerts" => self.list_alerts(chat_id).await,
            "alert" => self.alert_command(chat_id, args).await,
            _ => UNKNOWN_COMMAND.to_string(),
        }
    }

    async fn handle_text(&self, chat_id: i64, text: &str) -> String {
        if let Ok(request) = parse(text) {
            let explicit_target = request.target.is_some();
            let fiat = self.services.settings.chat_fiat(chat_id).await;

            match self.services.converter.convert(&request.or_target(&fiat)).await {
                Ok(result) => return result.formatted,
                // "saya punya 2 kucing" is a sentence, not a conversion
                Err(ConversionError::UnknownSymbol(sym)) if !explicit_target => {
                    tracing::debug!("'{}' is not a known unit, trying other handlers", sym);
                }
                Err(e) => return error_reply(&e),
            }
        }

        if let Some(caps) = price_re().captures(text) {
            let symbols = split_symbols(&caps[1]);
            let quote = self
                .quote_or_default(chat_id, caps.get(2).map(|m| m.as_str()))
                .await;
            return match symbols.as_slice() {
                [single] => self.price_reply(single, &quote).await,
                _ => self.prices_reply(&symbols, &quote).await,
            };
        }

        self.ask(text, CHAT_PARAMS).await
    }

    async fn quote_or_default(&self, chat_id: i64, explicit: Option<&str>) -> String {
        match explicit {
            Some(q) => normalize_unit_alias(q),
            None => self.services.settings.chat_fiat(chat_id).await,
        }
    }

    async fn ask(&self, prompt: &str, params: CompletionParams) -> String {
        match self.services.completion.complete(prompt, params).await {
            Ok(answer) => answer,
            Err(CompletionError::Disabled) => AI_DISABLED.to_string(),
            Err(e) => {
                tracing::warn!("AI completion failed: {}", e);
                format!("❌ Error AI: {}", e)
            }
        }
    }

    async fn status(&self, chat_id: i64) -> String {
        let fiat = self.services.settings.chat_fiat(chat_id).await;

        let started = Instant::now();
        let check = self
            .services
            .resolver
            .get_quote(&CoinId::new("bitcoin"), "usd")
            .await;
        let upstream = match check {
            Ok(q) if q.fetched_at < started => "✅ cache".to_string(),
            Ok(_) => format!("✅ {} ms", started.elapsed().as_millis()),
            Err(e) => format!("❌ {}", e),
        };

        let stats = self.services.registry.stats().await;
        let registry = match stats.age {
            Some(age) if stats.loaded_remote => format!(
                "{} koin, {} alias (diperbarui {} menit lalu)",
                stats.coins,
                stats.aliases,
                age.as_secs() / 60
            ),
            _ => format!("{} alias bawaan (daftar remote belum dimuat)", stats.aliases),
        };

        format!(
            "🩺 Status:\n• CoinGecko: {}\n• FIAT: {}\n• Registry: {}\n• Cache harga: {} aktif\n• Alert aktif: {}\n• Online sejak: {}",
            upstream,
            fiat.to_uppercase(),
            registry,
            self.services.resolver.fresh_count().await,
            self.services.alerts.len().await,
            self.started_at.format("%Y-%m-%d %H:%M UTC")
        )
    }

    async fn set_fiat(&self, chat_id: i64, args: &[&str]) -> String {
        let Some(fiat) = args.first() else {
            return format!(
                "FIAT saat ini: {}\nFormat: /setfiat {}",
                self.services.settings.chat_fiat(chat_id).await.to_uppercase(),
                ALLOWED_CHAT_FIATS.join("|")
            );
        };

        match self.services.settings.set_chat_fiat(chat_id, fiat).await {
            Ok(fiat) => format!("✅ FIAT default di-set ke {}", fiat.to_uppercase()),
            Err(SettingsError::InvalidFiat(_)) => format!(
                "❌ FIAT tidak valid. Pilih salah satu: {}.",
                ALLOWED_CHAT_FIATS.join(", ")
            ),
            Err(e) => {
                tracing::error!("Failed to save chat settings: {}", e);
                format!("❌ Gagal menyimpan pengaturan: {}", e)
            }
        }
    }

    /// Single price with 24h change; non-fiat quotes go through the converter
    async fn price_reply(&self, sym: &str, quote: &str) -> String {
        let display = normalize_token(sym).to_uppercase();
        let not_found = || format!("❌ {} atau {} tidak ditemukan.", display, quote.to_uppercase());

        if FiatCode::from_code(quote).is_none() {
            let request = ParsedRequest::new(Decimal::ONE, sym, Some(quote));
            return match self.services.converter.convert(&request).await {
                Ok(result) => format!("💰 {} = {}", display, format_price(result.output, quote)),
                Err(ConversionError::UnknownSymbol(_)) => not_found(),
                Err(e) => format!("❌ Error harga: {}", e),
            };
        }

        let Ok(id) = self.services.registry.resolve(sym).await else {
            return not_found();
        };
        match self.services.resolver.get_quote(&id, quote).await {
            Ok(q) => format!(
                "💰 {} = {}{}",
                display,
                format_price(q.rate, quote),
                change_suffix(q.change_24h)
            ),
            Err(ConversionError::UnknownSymbol(_)) => not_found(),
            Err(e) => format!("❌ Error harga: {}", e),
        }
    }

    /// Several prices in one reply; unknown symbols show as n/a
    async fn prices_reply(&self, symbols: &[String], quote: &str) -> String {
        let mut lines = Vec::with_capacity(symbols.len());

        if FiatCode::from_code(quote).is_some() {
            let mut resolved = Vec::with_capacity(symbols.len());
            for sym in symbols {
                resolved.push((sym, self.services.registry.resolve(sym).await.ok()));
            }
            let ids: Vec<CoinId> = resolved.iter().filter_map(|(_, id)| id.clone()).collect();

            let quotes = match self.services.resolver.get_quotes(&ids, quote).await {
                Ok(q) => q,
                Err(e) => return format!("❌ Error harga: {}", e),
            };

            for (sym, id) in resolved {
                let line = match id.as_ref().and_then(|id| quotes.get(id)) {
                    Some(q) => format!(
                        "{:>5} = {}{}",
                        sym.to_uppercase(),
                        format_price(q.rate, quote),
                        change_suffix(q.change_24h)
                    ),
                    None => format!("{:>5} = n/a", sym.to_uppercase()),
                };
                lines.push(line);
            }
        } else {
            for sym in symbols {
                let request = ParsedRequest::new(Decimal::ONE, sym, Some(quote));
                let line = match self.services.converter.convert(&request).await {
                    Ok(r) => format!("{:>5} = {}", sym.to_uppercase(), format_price(r.output, quote)),
                    Err(_) => format!("{:>5} = n/a", sym.to_uppercase()),
                };
                lines.push(line);
            }
        }

        format!("📊 Harga:\n{}", lines.join("\n"))
    }

    async fn convert_command(&self, args: &[&str]) -> String {
        let [amount, sym, target, ..] = args else {
            return "Format: /convert <amount> <coin> <fiat>\nex: /convert 0.25 btc idr".to_string();
        };
        let Some(quantity) = parse_quantity(amount) else {
            return "Jumlah tidak valid.".to_string();
        };

        let request = ParsedRequest::new(quantity, sym, Some(*target));
        match self.services.converter.convert(&request).await {
            Ok(result) => result.formatted,
            Err(e) => error_reply(&e),
        }
    }

    async fn top(&self, args: &[&str]) -> String {
        let limit = args
            .first()
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(DEFAULT_TOP)
            .clamp(1, MAX_TOP);

        let coins = match self.services.markets.top_markets("usd", limit).await {
            Ok(coins) if !coins.is_empty() => coins,
            Ok(_) => return "❌ Data market tidak tersedia.".to_string(),
            Err(e) => {
                tracing::warn!("Top markets fetch failed: {}", e);
                return format!("❌ Error market: {}", e);
            }
        };

        let lines: Vec<String> = coins
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let price = Decimal::try_from(c.price)
                    .map(|d| format_price(d, "usd"))
                    .unwrap_or_else(|_| format!("${:.2}", c.price));
                let change = c
                    .change_24h
                    .map(|pct| format!("{:+.2}%", pct))
                    .unwrap_or_else(|| "n/a".to_string());
                format!("{:>2}. {:<6} {}  ({})", i + 1, c.symbol.to_uppercase(), price, change)
            })
            .collect();

        format!("🏆 Top Market Cap:\n{}", lines.join("\n"))
    }

    async fn dominance(&self) -> String {
        match self.services.markets.btc_dominance().await {
            Ok(pct) => format!("👑 BTC Dominance: {:.2}%", pct),
            Err(e) => {
                tracing::warn!("Dominance fetch failed: {}", e);
                format!("❌ Error market: {}", e)
            }
        }
    }

    async fn fear_greed(&self) -> String {
        match self.services.sentiment.fear_greed().await {
            Ok(reading) => format!(
                "📉 Fear & Greed Index: {} ({})",
                reading.value, reading.classification
            ),
            Err(e) => {
                tracing::warn!("Fear & Greed fetch failed: {}", e);
                format!("❌ Error Fear & Greed: {}", e)
            }
        }
    }

    async fn gas(&self) -> String {
        match self.services.gas.gas_prices().await {
            Ok(gas) => format!(
                "⛽ Gas ETH\n• Safe: {} gwei\n• Propose: {} gwei\n• Fast: {} gwei",
                gas.safe.normalize(),
                gas.propose.normalize(),
                gas.fast.normalize()
            ),
            Err(MarketDataError::Unsupported(_)) => GAS_DISABLED.to_string(),
            Err(e) => {
                tracing::warn!("Gas oracle failed: {}", e);
                "❌ Tidak bisa ambil gas data.".to_string()
            }
        }
    }

    /// Last few candles for a pair
    async fn ohlc(&self, args: &[&str]) -> String {
        let [sym, quote, rest @ ..] = args else {
            return OHLC_USAGE.to_string();
        };
        let days = rest
            .first()
            .and_then(|d| d.parse::<u32>().ok())
            .filter(|d| OHLC_DAYS.contains(d))
            .unwrap_or(1);
        let quote = normalize_unit_alias(quote);
        let symbol = normalize_token(sym);

        let id = match self.services.registry.resolve(&symbol).await {
            Ok(id) => id,
            Err(e) => return error_reply(&e),
        };
        let candles = match self.services.markets.ohlc(&id, &quote, days).await {
            Ok(candles) if !candles.is_empty() => candles,
            Ok(_) => return "Data OHLC tidak tersedia.".to_string(),
            Err(e) => {
                tracing::warn!("OHLC fetch failed for {}/{}: {}", id, quote, e);
                return format!("❌ Error OHLC: {}", e);
            }
        };

        let start = candles.len().saturating_sub(OHLC_ROWS);
        let lines: Vec<String> = candles[start..]
            .iter()
            .map(|c| {
                format!(
                    "{} UTC  O:{}  H:{}  L:{}  C:{}",
                    c.time.format("%Y-%m-%d %H:%M"),
                    format_price(c.open, &quote),
                    format_price(c.high, &quote),
                    format_price(c.low, &quote),
                    format_price(c.close, &quote)
                )
            })
            .collect();

        format!(
            "🕯️ OHLC {}/{} (days={})\n{}",
            symbol.to_uppercase(),
            quote.to_uppercase(),
            days,
            lines.join("\n")
        )
    }

    async fn list_alerts(&self, chat_id: i64) -> String {
        let mine = self.services.alerts.list(chat_id).await;
        if mine.is_empty() {
            return NO_ALERTS.to_string();
        }
        let lines: Vec<String> = mine
            .iter()
            .enumerate()
            .map(|(i, a)| format!("{}. {}", i + 1, a.describe()))
            .collect();
        format!("⏰ Alerts kamu:\n{}", lines.join("\n"))
    }

    async fn alert_command(&self, chat_id: i64, args: &[&str]) -> String {
        let Some(sub) = args.first() else {
            return ALERT_USAGE.to_string();
        };

        match sub.to_lowercase().as_str() {
            "add" => self.add_alert(chat_id, &args[1..]).await,
            "del" | "delete" | "rm" => self.delete_alert(chat_id, &args[1..]).await,
            _ => "Perintah tidak dikenal. Gunakan /alerts untuk melihat daftar.".to_string(),
        }
    }

    async fn add_alert(&self, chat_id: i64, args: &[&str]) -> String {
        let [sym, quote, op, price, ..] = args else {
            return "Format: /alert add <sym> <fiat> above|below <price>".to_string();
        };

        // Commas are thousands separators here ("65,000")
        let price = match Decimal::from_str(&price.replace(',', "")) {
            Ok(p) if p > Decimal::ZERO => p,
            _ => return "Harga tidak valid.".to_string(),
        };
        let Ok(op) = AlertOp::from_str(op) else {
            return "Operator harus 'above' atau 'below'.".to_string();
        };
        let quote = normalize_unit_alias(quote);
        if FiatCode::from_code(&quote).is_none() {
            return unsupported_alert_quote(&quote);
        }

        let symbol = normalize_token(sym);
        let coin_id = match self.services.registry.resolve(&symbol).await {
            Ok(id) => id,
            Err(e) => return error_reply(&e),
        };

        let alert = Alert {
            chat_id,
            symbol,
            coin_id,
            quote,
            op,
            price,
        };
        let description = alert.describe();

        match self.services.alerts.add(alert).await {
            Ok(()) => {
                tracing::info!("Chat {} added alert {}", chat_id, description);
                format!("✅ Alert: {} ditambahkan.", description)
            }
            Err(AlertError::UnsupportedQuote(quote)) => unsupported_alert_quote(&quote),
            Err(e) => {
                tracing::error!("Failed to save alert: {}", e);
                format!("❌ Gagal menyimpan alert: {}", e)
            }
        }
    }

    async fn delete_alert(&self, chat_id: i64, args: &[&str]) -> String {
        let Some(raw) = args.first() else {
            return "Format: /alert del <index>".to_string();
        };
        let Ok(index) = raw.parse::<usize>() else {
            return "Index tidak valid.".to_string();
        };

        match self.services.alerts.remove(chat_id, index).await {
            Ok(removed) => format!("🗑️ Alert dihapus: {}", removed.describe()),
            Err(AlertError::NoAlerts) => NO_ALERTS.to_string(),
            Err(AlertError::OutOfRange(_)) => "Index di luar jangkauan.".to_string(),
            Err(e) => {
                tracing::error!("Failed to delete alert: {}", e);
                format!("❌ Gagal menghapus alert: {}", e)
            }
        }
    }
}

/// User-facing text for a conversion failure
pub fn error_reply(err: &ConversionError) -> String {
    match err {
        ConversionError::UnknownSymbol(sym) => format!("❌ {} tidak ditemukan.", sym.to_uppercase()),
        ConversionError::PriceUnavailable(detail) => {
            format!("❌ Error konversi: harga tidak tersedia ({})", detail)
        }
        ConversionError::NoMatch => "Format tidak dikenali. Contoh: 0.25 btc ke idr".to_string(),
        ConversionError::StaleRegistry(_) => {
            "❌ Daftar koin belum tersedia, coba lagi nanti.".to_string()
        }
    }
}

fn unsupported_alert_quote(quote: &str) -> String {
    format!(
        "❌ Alert hanya untuk mata uang fiat (IDR, USD, EUR, ...). {} tidak didukung.",
        quote.to_uppercase()
    )
}

fn split_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(normalize_token)
        .filter(|s| !s.is_empty())
        .collect()
}

fn change_suffix(change: Option<Decimal>) -> String {
    change
        .map(|pct| format!(" (24h: {})", format_change(pct)))
        .unwrap_or_default()
}

//! Natural-Language Amount Parser
//!
//! Pulls `(quantity, source, target?)` out of chat text such as
//! "tolong hitung 2 bnb ke usd sekarang" or "0,25 sol ke rupiah".
//!
//! Rules:
//! - the first number immediately followed by a unit word wins
//! - `.` and `,` are both decimal separators, normalized to `.` before parsing
//! - a link word ("ke", "to", ...) between source and target is optional
//! - filler words anywhere around the pattern are skipped

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

use super::conversion::{ConversionError, ParsedRequest};

/// Words linking source and target ("0.1 btc ke idr")
const LINK_WORDS: &[&str] = &["ke", "to", "in", "into", "jadi", "dalam", "=", "->", "=>"];

/// Conversational words that never name a unit
const FILLER_WORDS: &[&str] = &[
    "harga", "price", "berapa", "berapakah", "brp", "tolong", "hitung", "hitungin", "konversi",
    "convert", "conversion", "sekarang", "skrg", "now", "please", "pls", "dong", "ya", "yah",
    "nih", "kak", "bro", "gan", "saat", "ini", "hari", "today", "is", "what", "how", "much",
    "many", "the", "of", "for", "nilai", "kalau", "kalo", "jika", "itu", "sih", "aja", "current",
    "rate", "kurs", "tukar", "berapaan", "worth", "equals", "sama", "dengan", "senilai",
];

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d*[.,]\d+|\d+(?:[.,]\d+)?)(.*)$").expect("valid number regex"))
}

fn unit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$?[a-z][a-z0-9]{1,14}$").expect("valid unit regex"))
}

/// Parse free text into a conversion request
pub fn parse(text: &str) -> Result<ParsedRequest, ConversionError> {
    let tokens = tokenize(text);

    for (i, token) in tokens.iter().enumerate() {
        let Some((quantity, glued_unit)) = split_quantity(token) else {
            continue;
        };

        let (source, mut next) = match glued_unit {
            Some(unit) => (unit, i + 1),
            None => match tokens.get(i + 1) {
                Some(word) if is_unit_token(word) => (word.clone(), i + 2),
                _ => continue,
            },
        };
        if !is_unit_token(&source) {
            continue;
        }

        next = skip_fillers(&tokens, next);
        if tokens.get(next).is_some_and(|t| LINK_WORDS.contains(&t.as_str())) {
            next = skip_fillers(&tokens, next + 1);
        }
        let target = tokens
            .get(next)
            .filter(|t| is_unit_token(t))
            .map(String::as_str);

        tracing::debug!(%quantity, %source, ?target, "parsed conversion request");
        return Ok(ParsedRequest::new(quantity, &source, target));
    }

    Err(ConversionError::NoMatch)
}

/// Convert a decimal string using either separator
pub fn parse_quantity(raw: &str) -> Option<Decimal> {
    let mut normalized = raw.trim().replace(',', ".");
    if normalized.matches('.').count() > 1 {
        return None;
    }
    if normalized.starts_with('.') {
        normalized.insert(0, '0');
    }
    Decimal::from_str(&normalized).ok()
}

fn is_punctuation(c: char) -> bool {
    matches!(c, '?' | '!' | '.' | ',' | ':' | ';' | '"' | '\'' | '(' | ')')
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|t| trim_token(t).to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Strip surrounding punctuation, keeping a leading separator of ".5"
fn trim_token(token: &str) -> &str {
    let token = token.trim_end_matches(is_punctuation);
    let mut start = 0;
    for (i, c) in token.char_indices() {
        let next_is_digit = token[i + c.len_utf8()..]
            .chars()
            .next()
            .is_some_and(|n| n.is_ascii_digit());
        if !is_punctuation(c) || (matches!(c, '.' | ',') && next_is_digit) {
            break;
        }
        start = i + c.len_utf8();
    }
    &token[start..]
}

/// Split "0.1" or "0.1btc" into the quantity and an optional glued unit
fn split_quantity(token: &str) -> Option<(Decimal, Option<String>)> {
    let caps = number_re().captures(token)?;
    let quantity = parse_quantity(caps.get(1)?.as_str())?;
    let rest = caps.get(2).map_or("", |m| m.as_str());
    if rest.is_empty() {
        Some((quantity, None))
    } else if is_unit_token(rest) {
        Some((quantity, Some(rest.to_string())))
    } else {
        None
    }
}

fn is_unit_token(token: &str) -> bool {
    unit_re().is_match(token)
        && !FILLER_WORDS.contains(&token)
        && !LINK_WORDS.contains(&token)
}

fn skip_fillers(tokens: &[String], mut idx: usize) -> usize {
    while tokens.get(idx).is_some_and(|t| FILLER_WORDS.contains(&t.as_str())) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parsed(text: &str) -> ParsedRequest {
        parse(text).unwrap()
    }

    #[test]
    fn test_filler_words_around_pattern() {
        let req = parsed("tolong hitung 2 bnb ke usd sekarang");
        assert_eq!(req.quantity, dec!(2));
        assert_eq!(req.source, "bnb");
        assert_eq!(req.target.as_deref(), Some("usd"));
    }

    #[test]
    fn test_target_without_link_word() {
        let req = parsed("harga 1 doge idr");
        assert_eq!(req.quantity, dec!(1));
        assert_eq!(req.source, "doge");
        assert_eq!(req.target.as_deref(), Some("idr"));
    }

    #[test]
    fn test_comma_decimal_and_rupiah_alias() {
        let req = parsed("0,25 sol ke rupiah");
        assert_eq!(req.quantity, dec!(0.25));
        assert_eq!(req.source, "sol");
        assert_eq!(req.target.as_deref(), Some("idr"));
    }

    #[test]
    fn test_both_separators_agree() {
        for (dot, comma) in [("0.1", "0,1"), ("12.5", "12,5"), ("3.14159", "3,14159"), ("7", "7")] {
            let a = parsed(&format!("{} eth ke idr", dot));
            let b = parsed(&format!("{} eth ke idr", comma));
            assert_eq!(a.quantity, b.quantity, "{} vs {}", dot, comma);
        }
    }

    #[test]
    fn test_missing_target() {
        let req = parsed("berapa 3 eth sekarang?");
        assert_eq!(req.quantity, dec!(3));
        assert_eq!(req.source, "eth");
        assert_eq!(req.target, None);
    }

    #[test]
    fn test_crypto_target() {
        let req = parsed("berapa 3 eth usdt");
        assert_eq!(req.source, "eth");
        assert_eq!(req.target.as_deref(), Some("usdt"));
    }

    #[test]
    fn test_glued_quantity_and_dollar_prefix() {
        let req = parsed("0.1btc to $usdc");
        assert_eq!(req.quantity, dec!(0.1));
        assert_eq!(req.source, "btc");
        assert_eq!(req.target.as_deref(), Some("usdc"));
    }

    #[test]
    fn test_case_and_punctuation() {
        let req = parsed("Berapa 1.5 BTC ke IDR?");
        assert_eq!(req.quantity, dec!(1.5));
        assert_eq!(req.source, "btc");
        assert_eq!(req.target.as_deref(), Some("idr"));
    }

    #[test]
    fn test_fiat_source() {
        let req = parsed("100000 rupiah jadi btc dong");
        assert_eq!(req.source, "idr");
        assert_eq!(req.target.as_deref(), Some("btc"));
    }

    #[test]
    fn test_skips_number_without_unit() {
        let req = parsed("tanggal 17 , 5 sol ke usd");
        assert_eq!(req.quantity, dec!(5));
        assert_eq!(req.source, "sol");
    }

    #[test]
    fn test_no_match() {
        assert_eq!(parse("halo apa kabar"), Err(ConversionError::NoMatch));
        assert_eq!(parse("harga btc idr"), Err(ConversionError::NoMatch));
        assert_eq!(parse(""), Err(ConversionError::NoMatch));
        assert_eq!(parse("berapa 5 ?"), Err(ConversionError::NoMatch));
    }

    #[test]
    fn test_leading_separator_keeps_fraction() {
        let req = parsed(".5 btc ke idr");
        assert_eq!(req.quantity, dec!(0.5));
        assert_eq!(req.source, "btc");
        assert_eq!(req.target.as_deref(), Some("idr"));

        assert_eq!(parsed("berapa ,25 eth?").quantity, dec!(0.25));
        assert_eq!(parsed("(.75sol) ke usd").quantity, dec!(0.75));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0,25"), Some(dec!(0.25)));
        assert_eq!(parse_quantity(".5"), Some(dec!(0.5)));
        assert_eq!(parse_quantity("1.000.000"), None);
        assert_eq!(parse_quantity("abc"), None);
    }
}

//! Domain Layer - Core conversion logic for coinrelay
//!
//! Pure types and functions with no I/O. All external interactions happen
//! through the ports layer.
//!
//! - `coin`: canonical coin ids, registry entries, seed aliases
//! - `unit`: built-in fiat codes and resolved units
//! - `parser`: natural-language amount parser
//! - `conversion`: request/result types and error kinds
//! - `format`: amount and price rendering
//! - `alert`: price alert records

pub mod coin;
pub mod unit;
pub mod parser;
pub mod conversion;
pub mod format;
pub mod alert;

pub use coin::{normalize_token, CoinEntry, CoinId, SEED_ALIASES};
pub use unit::{normalize_unit_alias, FiatCode, Unit};
pub use parser::{parse, parse_quantity};
pub use conversion::{ConversionError, ConversionResult, ParsedRequest};
pub use format::{format_amount, format_change, format_price, format_quantity};
pub use alert::{Alert, AlertOp};

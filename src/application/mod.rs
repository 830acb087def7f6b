//! Application Layer - Stateful services and the bot loop
//!
//! - `registry`: symbol → canonical id table with refresh lifecycle
//! - `resolver`: TTL-cached spot and fiat rates
//! - `converter`: conversion engine
//! - `router`: chat command and free-text routing
//! - `bot`: long-polling service

pub mod store;
pub mod registry;
pub mod resolver;
pub mod converter;
pub mod settings;
pub mod alerts;
pub mod throttle;
pub mod router;
pub mod bot;

pub use store::{JsonStore, StoreError};
pub use registry::{RegistryConfig, RegistryStats, SymbolRegistry};
pub use resolver::{PriceQuote, PriceResolver, DEFAULT_MAX_QUOTES, DEFAULT_PRICE_TTL};
pub use converter::Converter;
pub use settings::{ChatSettings, SettingsError, ALLOWED_CHAT_FIATS};
pub use alerts::{AlertBook, AlertError, AlertMonitor};
pub use throttle::Throttle;
pub use router::{error_reply, MessageRouter, Route, RouterServices, HELP_TEXT};
pub use bot::{BotService, BotStatus};

//! Coinrelay - Crypto/Fiat Conversion Bot Library
//!
//! Parses free-text conversion requests, resolves coin symbols against a
//! refreshed registry, prices them through cached market data and answers
//! over a chat transport.
//!
//! # Modules
//!
//! - `domain`: Core types (units, parser, formatting, alerts)
//! - `ports`: Trait abstractions (PriceSource, ChatTransport, CompletionPort)
//! - `adapters`: External implementations (CoinGecko, Frankfurter, Telegram, OpenAI, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Registry, resolver, converter, router and bot loop

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;

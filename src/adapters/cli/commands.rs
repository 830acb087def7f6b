//! CLI command definitions
//!
//! `run` starts the Telegram bot; `convert`, `price` and `status` answer
//! one request from the terminal using the same services.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Coinrelay - crypto and fiat conversion bot for Telegram
#[derive(Parser, Debug)]
#[command(
    name = "coinrelay",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Crypto and fiat conversion bot for Telegram",
    long_about = "Coinrelay answers free-text conversions like '0.1 btc ke idr', price \
                  lookups, market overviews and price alerts over the Telegram Bot API, \
                  with an optional AI fallback for everything else."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the Telegram polling loop
    Run(RunCmd),

    /// Convert an amount, e.g. `coinrelay convert 0.5 eth ke idr`
    Convert(ConvertCmd),

    /// Show the price of one coin
    Price(PriceCmd),

    /// Check upstream APIs and local state
    Status(StatusCmd),
}

/// Start the bot
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Do not start the price alert checker
    #[arg(long)]
    pub no_alerts: bool,
}

/// One-off conversion
#[derive(Parser, Debug)]
pub struct ConvertCmd {
    /// Conversion text ("100 usd to idr", "2 sol")
    #[arg(value_name = "TEXT", required = true, num_args = 1..)]
    pub text: Vec<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/default.toml")]
    pub config: PathBuf,
}

impl ConvertCmd {
    pub fn query(&self) -> String {
        self.text.join(" ")
    }
}

/// One-off price lookup
#[derive(Parser, Debug)]
pub struct PriceCmd {
    /// Coin symbol or id (e.g., btc)
    #[arg(value_name = "SYMBOL")]
    pub symbol: String,

    /// Quote currency (defaults to chat.default_fiat)
    #[arg(value_name = "QUOTE")]
    pub quote: Option<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/default.toml")]
    pub config: PathBuf,
}

/// Status check
#[derive(Parser, Debug)]
pub struct StatusCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/default.toml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_app_parse_run() {
        let app = CliApp::try_parse_from(["coinrelay", "run"]).unwrap();
        match app.command {
            Command::Run(cmd) => {
                assert_eq!(cmd.config, PathBuf::from("config/default.toml"));
                assert!(!cmd.no_alerts);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_app_parse_run_without_alerts() {
        let app = CliApp::try_parse_from(["coinrelay", "run", "--no-alerts", "-c", "my.toml"]).unwrap();
        match app.command {
            Command::Run(cmd) => {
                assert!(cmd.no_alerts);
                assert_eq!(cmd.config, PathBuf::from("my.toml"));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_app_parse_convert() {
        let app = CliApp::try_parse_from(["coinrelay", "convert", "0.5", "eth", "ke", "idr"]).unwrap();
        match app.command {
            Command::Convert(cmd) => assert_eq!(cmd.query(), "0.5 eth ke idr"),
            _ => panic!("Expected Convert command"),
        }
    }

    #[test]
    fn test_cli_app_parse_convert_requires_text() {
        assert!(CliApp::try_parse_from(["coinrelay", "convert"]).is_err());
    }

    #[test]
    fn test_cli_app_parse_price() {
        let app = CliApp::try_parse_from(["coinrelay", "price", "btc", "eur"]).unwrap();
        match app.command {
            Command::Price(cmd) => {
                assert_eq!(cmd.symbol, "btc");
                assert_eq!(cmd.quote.as_deref(), Some("eur"));
            }
            _ => panic!("Expected Price command"),
        }

        let app = CliApp::try_parse_from(["coinrelay", "price", "sol"]).unwrap();
        match app.command {
            Command::Price(cmd) => assert!(cmd.quote.is_none()),
            _ => panic!("Expected Price command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let app = CliApp::try_parse_from(["coinrelay", "status", "--debug", "-v"]).unwrap();
        assert!(app.verbose);
        assert!(app.debug);
        assert!(matches!(app.command, Command::Status(_)));
    }
}

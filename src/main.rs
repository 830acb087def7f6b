//! Coinrelay - Crypto/Fiat Conversion Bot for Telegram

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, EnvFilter};

use coinrelay::adapters::cli::{CliApp, Command, ConvertCmd, PriceCmd, RunCmd, StatusCmd};
use coinrelay::adapters::{
    CoinGeckoClient, CoinGeckoConfig, EtherscanClient, EtherscanConfig, FearGreedClient,
    FearGreedConfig, FrankfurterClient, FrankfurterConfig, OpenAiClient, OpenAiConfig,
    TelegramConfig, TelegramTransport,
};
use coinrelay::application::{
    error_reply, AlertBook, AlertMonitor, BotService, ChatSettings, Converter, JsonStore,
    MessageRouter, PriceResolver, RegistryConfig, RouterServices, SymbolRegistry,
};
use coinrelay::config::{load_config, load_config_or_default, Config};
use coinrelay::domain::{parse, CoinId};
use coinrelay::ports::{ChatTransport, InboundMessage};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in the toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();

    // The bot needs a real config file; one-off commands can run on defaults
    let config = match &app.command {
        Command::Run(cmd) => load_config(&cmd.config),
        Command::Convert(ConvertCmd { config, .. })
        | Command::Price(PriceCmd { config, .. })
        | Command::Status(StatusCmd { config }) => load_config_or_default(config),
    }
    .context("Failed to load configuration")?;

    init_logging(app.verbose, app.debug, &config.logging.level)?;

    match app.command {
        Command::Run(cmd) => run_command(cmd, config).await,
        Command::Convert(cmd) => convert_command(cmd, config).await,
        Command::Price(cmd) => price_command(cmd, config).await,
        Command::Status(cmd) => status_command(cmd, config).await,
    }
}

fn init_logging(verbose: bool, debug: bool, level: &str) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}

/// Shared services built from one config
struct Services {
    registry: Arc<SymbolRegistry>,
    resolver: Arc<PriceResolver>,
    converter: Arc<Converter>,
    settings: Arc<ChatSettings>,
    alerts: Arc<AlertBook>,
    router: Arc<MessageRouter>,
    ai_enabled: bool,
    gas_enabled: bool,
}

fn build_services(config: &Config) -> Result<Services> {
    let coingecko = Arc::new(
        CoinGeckoClient::with_config(CoinGeckoConfig {
            api_base_url: config.coingecko.api_url.clone(),
            api_key: config.coingecko.get_api_key(),
            timeout: Duration::from_secs(config.coingecko.timeout_secs),
            max_retries: config.coingecko.max_retries,
        })
        .context("Failed to create CoinGecko client")?,
    );
    let frankfurter = Arc::new(
        FrankfurterClient::with_config(FrankfurterConfig {
            api_base_url: config.fiat_rates.api_url.clone(),
            timeout: Duration::from_secs(config.fiat_rates.timeout_secs),
        })
        .context("Failed to create fiat rate client")?,
    );
    let fear_greed = Arc::new(
        FearGreedClient::with_config(FearGreedConfig {
            api_base_url: config.fear_greed.api_url.clone(),
            timeout: Duration::from_secs(config.fear_greed.timeout_secs),
        })
        .context("Failed to create Fear & Greed client")?,
    );
    let etherscan = Arc::new(
        EtherscanClient::new(EtherscanConfig {
            api_base_url: config.etherscan.api_url.clone(),
            api_key: config.etherscan.get_api_key(),
            timeout: Duration::from_secs(config.etherscan.timeout_secs),
        })
        .context("Failed to create gas oracle client")?,
    );
    let openai = Arc::new(
        OpenAiClient::new(OpenAiConfig {
            api_base_url: config.openai.api_url.clone(),
            api_key: config.openai.get_api_key(),
            model: config.openai.get_model(),
            timeout: Duration::from_secs(config.openai.timeout_secs),
        })
        .context("Failed to create completion client")?,
    );

    let registry = Arc::new(SymbolRegistry::new(
        coingecko.clone(),
        RegistryConfig {
            refresh_interval: config.cache.registry_refresh(),
            retry_interval: config.cache.registry_retry(),
        },
    ));
    let resolver = Arc::new(
        PriceResolver::new(coingecko.clone(), frankfurter, config.cache.price_ttl())
            .with_max_entries(config.cache.max_price_entries),
    );

    let default_fiat = config.chat.get_default_fiat();
    let converter = Arc::new(Converter::new(registry.clone(), resolver.clone(), &default_fiat));

    let data_dir = config.chat.data_path();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    let settings = Arc::new(ChatSettings::load(
        JsonStore::new(config.chat.settings_file()),
        &default_fiat,
    ));
    let alerts = Arc::new(AlertBook::load(JsonStore::new(config.chat.alerts_file())));

    let ai_enabled = openai.is_enabled();
    let gas_enabled = etherscan.is_enabled();
    let router = Arc::new(MessageRouter::new(
        RouterServices {
            registry: registry.clone(),
            resolver: resolver.clone(),
            converter: converter.clone(),
            markets: coingecko,
            sentiment: fear_greed,
            gas: etherscan,
            completion: openai,
            settings: settings.clone(),
            alerts: alerts.clone(),
        },
        config.chat.throttle(),
    ));

    Ok(Services {
        registry,
        resolver,
        converter,
        settings,
        alerts,
        router,
        ai_enabled,
        gas_enabled,
    })
}

async fn run_command(cmd: RunCmd, config: Config) -> Result<()> {
    tracing::info!("Starting coinrelay...");
    tracing::info!("Config: {}", cmd.config.display());

    let token = config
        .telegram
        .get_bot_token()
        .context("BOT_TOKEN is not set (use .env or [telegram].bot_token)")?;

    let services = build_services(&config)?;
    let transport: Arc<dyn ChatTransport> = Arc::new(
        TelegramTransport::new(TelegramConfig {
            poll_timeout_secs: config.telegram.poll_timeout_secs,
            drop_pending_updates: config.telegram.drop_pending_updates,
            ..TelegramConfig::new(token)
        })
        .context("Failed to create Telegram transport")?,
    );

    let mut bot = BotService::new(services.router.clone(), transport.clone(), services.registry.clone());
    if config.alerts.enabled && !cmd.no_alerts {
        let monitor = AlertMonitor::new(
            services.alerts.clone(),
            services.resolver.clone(),
            transport,
            Duration::from_secs(config.alerts.check_interval_secs),
        );
        bot = bot.with_alert_monitor(Arc::new(monitor));
    } else {
        tracing::info!("Price alert checker disabled");
    }

    tracing::info!(
        "Default fiat: {} | AI replies: {} | Gas oracle: {}",
        services.settings.global_default(),
        if services.ai_enabled { "on" } else { "off" },
        if services.gas_enabled { "on" } else { "off" }
    );

    // Setup Ctrl+C handler
    let handle = bot.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        handle.stop().await;
    });

    bot.run().await;

    let status = bot.status().await;
    tracing::info!(
        "coinrelay stopped ({} messages, {} replies, {} poll errors)",
        status.messages_handled,
        status.replies_sent,
        status.poll_errors
    );
    Ok(())
}

async fn convert_command(cmd: ConvertCmd, config: Config) -> Result<()> {
    let services = build_services(&config)?;

    let reply = match parse(&cmd.query()) {
        Ok(request) => {
            let request = request.or_target(services.settings.global_default());
            match services.converter.convert(&request).await {
                Ok(result) => result.formatted,
                Err(e) => error_reply(&e),
            }
        }
        Err(e) => error_reply(&e),
    };

    println!("{}", reply);
    Ok(())
}

async fn price_command(cmd: PriceCmd, config: Config) -> Result<()> {
    let services = build_services(&config)?;

    let text = match cmd.quote {
        Some(quote) => format!("/price {} {}", cmd.symbol, quote),
        None => format!("/price {}", cmd.symbol),
    };
    let reply = services
        .router
        .handle(&InboundMessage::new(0, 0, text))
        .await
        .unwrap_or_default();

    println!("{}", reply);
    Ok(())
}

async fn status_command(cmd: StatusCmd, config: Config) -> Result<()> {
    let services = build_services(&config)?;

    println!("coinrelay {}", env!("CARGO_PKG_VERSION"));
    println!("  Config:       {}", cmd.config.display());
    println!(
        "  Bot token:    {}",
        if config.telegram.get_bot_token().is_some() { "set" } else { "missing" }
    );
    println!("  Default fiat: {}", services.settings.global_default());
    println!("  AI replies:   {}", if services.ai_enabled { "on" } else { "off" });
    println!("  Gas oracle:   {}", if services.gas_enabled { "on" } else { "off" });
    println!("  Alerts:       {} stored", services.alerts.len().await);

    let started = Instant::now();
    match services.registry.refresh().await {
        Ok(count) => println!("  Coin list:    {} coins ({:?})", count, started.elapsed()),
        Err(e) => println!("  Coin list:    unavailable ({})", e),
    }
    let stats = services.registry.stats().await;
    println!("  Aliases:      {} ({} ambiguous skipped)", stats.aliases, stats.ambiguous);

    let started = Instant::now();
    match services.resolver.get_quote(&CoinId::new("bitcoin"), "usd").await {
        Ok(quote) => println!("  Price API:    ok, BTC ${} ({:?})", quote.rate, started.elapsed()),
        Err(e) => println!("  Price API:    {}", e),
    }

    Ok(())
}

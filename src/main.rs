use kameo::request::MessageSend;
use serde::Deserialize;
use tracing::{error, info, warn};

use signal_feeder::api::types::ApiConfig;
use signal_feeder::common::constants::DEFAULT_BUFFER_CAPACITY;
use signal_feeder::historical::actor::{HistoricalActor, HistoricalAsk, HistoricalReply};
use signal_feeder::historical::utils::interval_to_seconds;
use signal_feeder::logging::{init_logging, LoggingConfig};
use signal_feeder::reconciler::actor::{ReconcilerActor, ReconcilerAsk, ReconcilerReply, ReconcilerTell};
use signal_feeder::server::{start_server, AppContext, ServerConfig};
use signal_feeder::technical_analysis::actor::IndicatorActor;
use signal_feeder::technical_analysis::structs::AnalysisConfig;
use signal_feeder::websocket::actor::{WebSocketActor, WebSocketTell};

/// Application configuration from config.toml
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ApplicationConfig {
    pub symbols: Vec<String>,
    pub interval: String,
    pub buffer_capacity: usize,
    pub backfill_hours: u32,
    pub synthetic_fallback: bool,
    pub synthetic_base_price: f64,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string()],
            interval: "1m".to_string(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            backfill_hours: 16,
            synthetic_fallback: false,
            synthetic_base_price: 50_000.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct ApiTomlConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct WebSocketTomlConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct ServerTomlConfig {
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct LoggingTomlConfig {
    pub level_filter: Option<String>,
    pub console_timestamps: Option<bool>,
}

/// Full TOML configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct TomlConfig {
    pub application: ApplicationConfig,
    pub api: ApiTomlConfig,
    pub websocket: WebSocketTomlConfig,
    pub server: ServerTomlConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingTomlConfig,
}

fn load_config() -> TomlConfig {
    match std::fs::read_to_string("config.toml") {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to parse config.toml ({}); using defaults", e);
                TomlConfig::default()
            }
        },
        Err(_) => TomlConfig::default(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config();

    let logging_config = LoggingConfig {
        level_filter: config.logging.level_filter.clone()
            .unwrap_or_else(|| LoggingConfig::default().level_filter),
        console_timestamps: config.logging.console_timestamps.unwrap_or(true),
    };
    init_logging(&logging_config);

    let app = &config.application;
    let timeframe = interval_to_seconds(&app.interval)?;
    info!(
        "🚀 Starting signal_feeder for {:?} ({} buckets, capacity {})",
        app.symbols, app.interval, app.buffer_capacity
    );

    // Leaf-first wiring: indicators <- reconciler <- (historical, websocket).
    let indicator_actor = kameo::spawn(IndicatorActor::new(config.analysis.clone()));

    let mut reconciler = ReconcilerActor::new(&app.symbols, timeframe, app.buffer_capacity);
    reconciler.set_indicator_actor(indicator_actor.clone());
    let reconciler_actor = kameo::spawn(reconciler);

    let mut api_config = ApiConfig::default();
    if let Some(base_url) = config.api.base_url.clone() {
        api_config.base_url = base_url;
    }
    let mut historical = HistoricalActor::new(api_config)?;
    if app.synthetic_fallback {
        historical = historical.with_synthetic_fallback(app.synthetic_base_price);
    }
    let historical_actor = kameo::spawn(historical);

    let ws_base_url = config.websocket.base_url.clone()
        .unwrap_or_else(|| "wss://stream.binance.com:9443".to_string());
    let mut websocket = WebSocketActor::new(ws_base_url, app.interval.clone());
    websocket.set_reconciler_actor(reconciler_actor.clone());
    websocket.set_historical_actor(historical_actor.clone());
    let websocket_actor = kameo::spawn(websocket);

    let generation = match reconciler_actor.ask(ReconcilerAsk::GetGeneration).send().await {
        Ok(ReconcilerReply::Generation(generation)) => generation,
        _ => 0,
    };

    // Seed each symbol from the backfill path before live merges begin.
    let now = chrono::Utc::now().timestamp_millis();
    let interval_ms = timeframe as i64 * 1000;
    let start_time = (now - app.backfill_hours as i64 * 3_600_000) / interval_ms * interval_ms;

    for symbol in &app.symbols {
        let ask = HistoricalAsk::FetchRange {
            symbol: symbol.clone(),
            interval: app.interval.clone(),
            start_time,
            end_time: now,
        };
        match historical_actor.ask(ask).send().await {
            Ok(HistoricalReply::Candles { candles, origin }) => {
                info!("📊 Backfilled {} candles for {} ({:?})", candles.len(), symbol, origin);
                let seed = ReconcilerTell::Seed {
                    symbol: symbol.clone(),
                    candles,
                    origin,
                    generation,
                };
                if let Err(e) = reconciler_actor.tell(seed).send().await {
                    error!("Failed to seed {}: {}", symbol, e);
                }
            }
            Ok(HistoricalReply::Error(e)) => {
                warn!("Backfill failed for {}: {} (continuing with live data only)", symbol, e);
            }
            Ok(_) => warn!("Unexpected backfill reply for {}", symbol),
            Err(e) => error!("Historical actor unreachable: {}", e),
        }
    }

    // Live stream after the seed, so the buffers converge forward from a
    // complete history.
    if let Err(e) = websocket_actor
        .tell(WebSocketTell::Subscribe { symbols: app.symbols.clone(), generation })
        .send()
        .await
    {
        error!("Failed to start live subscription: {}", e);
    }

    let server_config = ServerConfig {
        port: config.server.port.unwrap_or_else(|| ServerConfig::default().port),
    };
    let app_context = AppContext {
        reconciler_actor: reconciler_actor.clone(),
        indicator_actor: indicator_actor.clone(),
        interval: app.interval.clone(),
    };
    tokio::spawn(async move {
        start_server(server_config, app_context).await;
    });

    info!("Pipeline running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    Ok(())
}

//! HTTP read surface for the pipeline.
//!
//! - `GET /market-data?symbol=<s>&interval=<i>` — the buffer snapshot as an
//!   ascending JSON array
//! - `GET /signals?symbol=<s>` — latest scored signals
//! - `GET /indicators?symbol=<s>` — latest indicator values
//! - `GET /health` — liveness probe
//!
//! Failures reply with a JSON `{error, details?}` body and a non-2xx
//! status. Every data response carries an `x-data-origin` header so
//! synthetic candles can never masquerade as exchange data.

use kameo::actor::ActorRef;
use kameo::request::MessageSend;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::Filter;

use crate::historical::structs::{Candle, DataOrigin, TimestampMS};
use crate::reconciler::actor::{ReconcilerActor, ReconcilerAsk, ReconcilerReply};
use crate::technical_analysis::actor::{IndicatorActor, IndicatorAsk, IndicatorReply};

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3100 }
    }
}

/// Actor references the route handlers need.
#[derive(Clone)]
pub struct AppContext {
    pub reconciler_actor: ActorRef<ReconcilerActor>,
    pub indicator_actor: ActorRef<IndicatorActor>,
    /// The interval this pipeline is running; requests for another interval
    /// are rejected rather than silently served mislabeled data.
    pub interval: String,
}

/// Wire shape of one candle on the inbound query surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDataPoint {
    pub timestamp: TimestampMS,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub is_current_period: bool,
}

impl From<&Candle> for MarketDataPoint {
    fn from(candle: &Candle) -> Self {
        Self {
            timestamp: candle.open_time,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            is_current_period: !candle.closed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SymbolQuery {
    symbol: String,
    interval: Option<String>,
}

fn origin_header(origin: DataOrigin) -> &'static str {
    match origin {
        DataOrigin::Exchange => "exchange",
        DataOrigin::Synthetic => "synthetic",
    }
}

type JsonReply = warp::reply::WithHeader<warp::reply::WithStatus<warp::reply::Json>>;

fn reply_json<T: Serialize>(body: &T, status: StatusCode, origin: DataOrigin) -> JsonReply {
    warp::reply::with_header(
        warp::reply::with_status(warp::reply::json(body), status),
        "x-data-origin",
        origin_header(origin),
    )
}

fn reply_error(error: &str, details: Option<String>, status: StatusCode) -> JsonReply {
    reply_json(
        &ErrorBody { error: error.to_string(), details },
        status,
        DataOrigin::Exchange,
    )
}

async fn market_data_handler(
    query: SymbolQuery,
    ctx: AppContext,
) -> Result<JsonReply, std::convert::Infallible> {
    if let Some(interval) = &query.interval {
        if interval != &ctx.interval {
            return Ok(reply_error(
                "Unsupported interval",
                Some(format!("This feed serves {} data", ctx.interval)),
                StatusCode::BAD_REQUEST,
            ));
        }
    }

    let ask = ReconcilerAsk::GetSnapshot { symbol: query.symbol.to_uppercase() };
    match ctx.reconciler_actor.ask(ask).send().await {
        Ok(ReconcilerReply::Snapshot { candles, origin }) => {
            let points: Vec<MarketDataPoint> = candles.iter().map(MarketDataPoint::from).collect();
            Ok(reply_json(&points, StatusCode::OK, origin))
        }
        Ok(ReconcilerReply::Error(e)) => {
            Ok(reply_error("Unknown symbol", Some(e), StatusCode::NOT_FOUND))
        }
        Ok(_) => Ok(reply_error("Unexpected reply", None, StatusCode::INTERNAL_SERVER_ERROR)),
        Err(e) => {
            warn!("Reconciler unavailable: {}", e);
            Ok(reply_error(
                "Failed to fetch market data",
                Some(e.to_string()),
                StatusCode::BAD_GATEWAY,
            ))
        }
    }
}

async fn signals_handler(
    query: SymbolQuery,
    ctx: AppContext,
) -> Result<JsonReply, std::convert::Infallible> {
    let ask = IndicatorAsk::GetSignals { symbol: query.symbol.to_uppercase() };
    match ctx.indicator_actor.ask(ask).send().await {
        Ok(IndicatorReply::Signals { signals, origin }) => {
            Ok(reply_json(&signals, StatusCode::OK, origin))
        }
        Ok(IndicatorReply::Error(e)) => {
            Ok(reply_error("Failed to fetch signals", Some(e), StatusCode::INTERNAL_SERVER_ERROR))
        }
        Ok(_) => Ok(reply_error("Unexpected reply", None, StatusCode::INTERNAL_SERVER_ERROR)),
        Err(e) => Ok(reply_error(
            "Failed to fetch signals",
            Some(e.to_string()),
            StatusCode::BAD_GATEWAY,
        )),
    }
}

async fn indicators_handler(
    query: SymbolQuery,
    ctx: AppContext,
) -> Result<JsonReply, std::convert::Infallible> {
    let ask = IndicatorAsk::GetIndicators { symbol: query.symbol.to_uppercase() };
    match ctx.indicator_actor.ask(ask).send().await {
        Ok(IndicatorReply::Indicators(snapshot)) => {
            let origin = snapshot.origin;
            Ok(reply_json(&*snapshot, StatusCode::OK, origin))
        }
        Ok(IndicatorReply::Error(e)) => {
            Ok(reply_error("Failed to fetch indicators", Some(e), StatusCode::INTERNAL_SERVER_ERROR))
        }
        Ok(_) => Ok(reply_error("Unexpected reply", None, StatusCode::INTERNAL_SERVER_ERROR)),
        Err(e) => Ok(reply_error(
            "Failed to fetch indicators",
            Some(e.to_string()),
            StatusCode::BAD_GATEWAY,
        )),
    }
}

/// Start the HTTP server. Runs until the process exits.
pub async fn start_server(config: ServerConfig, ctx: AppContext) {
    let with_ctx = {
        let ctx = ctx.clone();
        warp::any().map(move || ctx.clone())
    };

    let market_data = warp::path("market-data")
        .and(warp::get())
        .and(warp::query::<SymbolQuery>())
        .and(with_ctx.clone())
        .and_then(market_data_handler);

    let signals = warp::path("signals")
        .and(warp::get())
        .and(warp::query::<SymbolQuery>())
        .and(with_ctx.clone())
        .and_then(signals_handler);

    let indicators = warp::path("indicators")
        .and(warp::get())
        .and(warp::query::<SymbolQuery>())
        .and(with_ctx.clone())
        .and_then(indicators_handler);

    let health = warp::path("health").and(warp::get()).map(|| {
        warp::reply::with_status(
            warp::reply::json(&json!({
                "status": "healthy",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "service": "signal-feeder"
            })),
            StatusCode::OK,
        )
    });

    let routes = market_data.or(signals).or(indicators).or(health);

    info!("🌐 Starting HTTP server on port {}", config.port);
    warp::serve(routes).run(([0, 0, 0, 0], config.port)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::historical::structs::TickUpdate;
    use crate::reconciler::actor::ReconcilerTell;
    use crate::technical_analysis::structs::AnalysisConfig;

    fn test_context() -> AppContext {
        let reconciler_actor = kameo::spawn(ReconcilerActor::new(&["BTCUSDT".to_string()], 60, 100));
        let indicator_actor = kameo::spawn(IndicatorActor::new(AnalysisConfig::default()));
        AppContext {
            reconciler_actor,
            indicator_actor,
            interval: "1m".to_string(),
        }
    }

    #[test]
    fn test_market_data_point_wire_shape() {
        let candle = Candle::new_from_values(60_000, 1.0, 2.0, 0.5, 1.5, 10.0, false);
        let point = MarketDataPoint::from(&candle);
        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value["timestamp"], 60_000i64);
        assert_eq!(value["isCurrentPeriod"], true);
        assert!(value.get("open_time").is_none());
    }

    #[test]
    fn test_error_body_omits_missing_details() {
        let body = ErrorBody { error: "nope".to_string(), details: None };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("details").is_none());
    }

    #[tokio::test]
    async fn test_market_data_rejects_foreign_interval() {
        let ctx = test_context();
        let query = SymbolQuery { symbol: "BTCUSDT".to_string(), interval: Some("4h".to_string()) };
        let reply = market_data_handler(query, ctx).await.unwrap();
        let response = warp::reply::Reply::into_response(reply);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_market_data_unknown_symbol_is_404() {
        let ctx = test_context();
        let query = SymbolQuery { symbol: "DOGEUSDT".to_string(), interval: None };
        let reply = market_data_handler(query, ctx).await.unwrap();
        let response = warp::reply::Reply::into_response(reply);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_market_data_serves_snapshot_with_origin_header() {
        let ctx = test_context();
        ctx.reconciler_actor
            .tell(ReconcilerTell::MergeTick {
                symbol: "BTCUSDT".to_string(),
                tick: TickUpdate::Trade { timestamp: 1_000, price: 100.0, volume: 1.0 },
                generation: 0,
            })
            .send()
            .await
            .unwrap();

        let query = SymbolQuery { symbol: "btcusdt".to_string(), interval: Some("1m".to_string()) };
        let reply = market_data_handler(query, ctx).await.unwrap();
        let response = warp::reply::Reply::into_response(reply);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-data-origin").and_then(|v| v.to_str().ok()),
            Some("exchange")
        );
    }

    #[tokio::test]
    async fn test_signals_empty_for_fresh_symbol() {
        let ctx = test_context();
        let query = SymbolQuery { symbol: "BTCUSDT".to_string(), interval: None };
        let reply = signals_handler(query, ctx).await.unwrap();
        let response = warp::reply::Reply::into_response(reply);
        assert_eq!(response.status(), StatusCode::OK);
    }
}

use std::time::Duration;

use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::{ActorStopReason, BoxError};
use kameo::message::{Context, Message};
use kameo::request::MessageSend;
use kameo::{Actor, mailbox::unbounded::UnboundedMailbox};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::historical::actor::{HistoricalActor, HistoricalAsk, HistoricalReply};
use crate::historical::structs::{Candle, TickUpdate, TimestampMS};
use crate::reconciler::actor::{ReconcilerActor, ReconcilerTell};
use crate::websocket::binance::kline::parse_any_kline_message;
use crate::websocket::connection::{normalize_symbols, ConnectionManager};
use crate::websocket::types::{ConnectionStats, StreamSubscription, StreamType, WebSocketError};

/// WebSocket actor messages for telling (fire-and-forget)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WebSocketTell {
    /// Subscribe to kline streams for the given symbols. The generation
    /// stamps every tick produced by this subscription; stale stamps are
    /// discarded downstream.
    Subscribe {
        symbols: Vec<String>,
        generation: u64,
    },
    /// Drop the given symbols (restarts the stream for the remainder)
    Unsubscribe { symbols: Vec<String> },
    /// Process a received candle (internal use)
    ProcessCandle {
        symbol: String,
        candle: Candle,
    },
    /// Re-request state via the backfill path after a stream restart
    BridgeGaps,
    /// Health check
    HealthCheck,
}

/// WebSocket actor messages for asking (request-response)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WebSocketAsk {
    /// Get current connection health and statistics
    GetStats,
    /// Get active symbols
    GetActiveSymbols,
}

/// WebSocket actor replies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WebSocketReply {
    Stats {
        connected: bool,
        stats: ConnectionStats,
    },
    ActiveSymbols(Vec<String>),
    Error(String),
}

/// Actor owning the live kline stream.
///
/// Parses raw events into candles and forwards them as bucket fragments to
/// the reconciler, stamped with the current subscription generation. On
/// stream restart the actor does not trust the stream to be gapless: it
/// re-requests the missed range through the backfill path before resuming
/// merges.
pub struct WebSocketActor {
    connection_manager: ConnectionManager,
    symbols: Vec<String>,
    interval: String,
    generation: u64,
    connection_task: Option<tokio::task::JoinHandle<()>>,
    /// Open time of the last bucket processed per symbol, for gap bridging
    last_processed: FxHashMap<String, TimestampMS>,
    stats: ConnectionStats,
    reconciler_actor: Option<ActorRef<ReconcilerActor>>,
    historical_actor: Option<ActorRef<HistoricalActor>>,
    health_check_interval: Duration,
}

impl WebSocketActor {
    pub fn new(base_url: String, interval: String) -> Self {
        Self {
            connection_manager: ConnectionManager::new(base_url),
            symbols: Vec::new(),
            interval,
            generation: 0,
            connection_task: None,
            last_processed: FxHashMap::default(),
            stats: ConnectionStats::new(),
            reconciler_actor: None,
            historical_actor: None,
            health_check_interval: Duration::from_secs(30),
        }
    }

    /// Set the reconciler actor reference for candle forwarding
    pub fn set_reconciler_actor(&mut self, reconciler_actor: ActorRef<ReconcilerActor>) {
        self.reconciler_actor = Some(reconciler_actor);
    }

    /// Set the historical actor reference for gap bridging
    pub fn set_historical_actor(&mut self, historical_actor: ActorRef<HistoricalActor>) {
        self.historical_actor = Some(historical_actor);
    }

    async fn start_connection(&mut self, actor_ref: ActorRef<Self>) {
        if let Some(handle) = self.connection_task.take() {
            info!("Terminating existing WebSocket connection");
            handle.abort();
        }

        if self.symbols.is_empty() {
            warn!("No symbols subscribed, not starting a connection");
            return;
        }

        let subscription = StreamSubscription::new(
            StreamType::Kline(self.interval.clone()),
            self.symbols.clone(),
        );

        let url = if subscription.symbols.len() == 1 {
            self.connection_manager.build_single_stream_url(&subscription)
        } else {
            self.connection_manager.build_multi_stream_url(std::slice::from_ref(&subscription))
        };
        let url = match url {
            Ok(url) => url,
            Err(e) => {
                error!("Failed to build stream URL: {}", e);
                return;
            }
        };

        info!("Starting WebSocket connection to: {}", url);

        let mut connection_manager = self.connection_manager.clone();
        let actor_ref_for_messages = actor_ref.clone();
        let actor_ref_for_reconnect = actor_ref.clone();

        let handle = tokio::spawn(async move {
            let message_handler = |message: String| {
                let actor_ref = actor_ref_for_messages.clone();
                async move {
                    let kline_event = parse_any_kline_message(&message)?;
                    let candle = kline_event.kline.to_candle()?;

                    debug!(
                        "{} candle: O:{:.2} H:{:.2} L:{:.2} C:{:.2} V:{:.2} (closed: {})",
                        kline_event.symbol, candle.open, candle.high, candle.low,
                        candle.close, candle.volume, candle.closed
                    );

                    let process_msg = WebSocketTell::ProcessCandle {
                        symbol: kline_event.symbol.clone(),
                        candle,
                    };
                    if let Err(e) = actor_ref.tell(process_msg).send().await {
                        warn!("Failed to send processed candle to actor: {}", e);
                    }
                    Ok::<(), WebSocketError>(())
                }
            };

            let on_reconnect = move |was_reconnection: bool| {
                if was_reconnection {
                    let actor_ref = actor_ref_for_reconnect.clone();
                    tokio::spawn(async move {
                        if let Err(e) = actor_ref.tell(WebSocketTell::BridgeGaps).send().await {
                            error!("Failed to trigger gap bridging: {}", e);
                        }
                    });
                }
            };

            if let Err(e) = connection_manager
                .connect_with_retry(&url, message_handler, on_reconnect)
                .await
            {
                error!("WebSocket connection failed permanently: {}", e);
            }
        });

        self.connection_task = Some(handle);
    }

    async fn process_candle(&mut self, symbol: String, candle: Candle) {
        self.stats.record_message();
        self.stats.record_parsed();
        self.last_processed.insert(symbol.clone(), candle.open_time);

        let Some(reconciler) = &self.reconciler_actor else {
            warn!("No reconciler wired; dropping candle for {}", symbol);
            return;
        };

        let msg = ReconcilerTell::MergeTick {
            symbol,
            tick: TickUpdate::Fragment(candle),
            generation: self.generation,
        };
        if let Err(e) = reconciler.tell(msg).send().await {
            warn!("Failed to forward tick to reconciler: {}", e);
        }
    }

    /// After a stream restart the missed range is re-fetched through the
    /// backfill path and merged as closed fragments before live merges
    /// resume.
    async fn bridge_gaps(&mut self) {
        let (Some(historical), Some(reconciler)) = (&self.historical_actor, &self.reconciler_actor)
        else {
            return;
        };

        let now = chrono::Utc::now().timestamp_millis();
        for symbol in self.symbols.clone() {
            let Some(&last_bucket) = self.last_processed.get(&symbol) else {
                continue;
            };

            info!("Bridging potential gap for {} from {}", symbol, last_bucket);
            let ask = HistoricalAsk::FetchRange {
                symbol: symbol.clone(),
                interval: self.interval.clone(),
                // Re-fetch the last seen bucket too; it may have been cut short.
                start_time: last_bucket,
                end_time: now,
            };

            match historical.ask(ask).send().await {
                Ok(HistoricalReply::Candles { candles, .. }) => {
                    let count = candles.len();
                    for candle in candles {
                        let msg = ReconcilerTell::MergeTick {
                            symbol: symbol.clone(),
                            tick: TickUpdate::Fragment(candle),
                            generation: self.generation,
                        };
                        if let Err(e) = reconciler.tell(msg).send().await {
                            warn!("Failed to merge bridged candle: {}", e);
                            break;
                        }
                    }
                    info!("Bridged {} candles for {}", count, symbol);
                }
                Ok(HistoricalReply::Error(e)) => warn!("Gap bridge fetch failed for {}: {}", symbol, e),
                Ok(_) => warn!("Unexpected reply while bridging gap for {}", symbol),
                Err(e) => warn!("Failed to reach historical actor: {}", e),
            }
        }
    }
}

impl Actor for WebSocketActor {
    type Mailbox = UnboundedMailbox<Self>;

    fn name() -> &'static str {
        "WebSocketActor"
    }

    async fn on_start(&mut self, actor_ref: ActorRef<Self>) -> Result<(), BoxError> {
        info!("🚀 Starting WebSocket Actor ({} interval)", self.interval);

        let actor_ref_clone = actor_ref.clone();
        let interval = self.health_check_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if actor_ref_clone.tell(WebSocketTell::HealthCheck).send().await.is_err() {
                    break;
                }
            }
        });

        Ok(())
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        _reason: ActorStopReason,
    ) -> Result<(), BoxError> {
        if let Some(handle) = self.connection_task.take() {
            handle.abort();
        }
        info!(
            "🛑 Stopping WebSocket Actor: {} messages processed, {} parse errors",
            self.stats.messages_parsed, self.stats.parse_errors
        );
        Ok(())
    }
}

impl Message<WebSocketTell> for WebSocketActor {
    type Reply = ();

    async fn handle(&mut self, msg: WebSocketTell, ctx: Context<'_, Self, Self::Reply>) -> Self::Reply {
        match msg {
            WebSocketTell::Subscribe { symbols, generation } => {
                match normalize_symbols(&symbols) {
                    Ok(normalized) => {
                        info!("Subscribing to {:?} (generation {})", normalized, generation);
                        self.symbols = normalized;
                        self.generation = generation;
                        self.last_processed.clear();
                        let actor_ref = ctx.actor_ref().clone();
                        self.start_connection(actor_ref).await;
                    }
                    Err(e) => error!("Refusing subscription: {}", e),
                }
            }
            WebSocketTell::Unsubscribe { symbols } => {
                self.symbols.retain(|s| !symbols.contains(s));
                for symbol in &symbols {
                    self.last_processed.remove(symbol);
                }
                info!("Unsubscribed {:?}; {} symbols remain", symbols, self.symbols.len());
                if self.symbols.is_empty() {
                    if let Some(handle) = self.connection_task.take() {
                        handle.abort();
                    }
                } else {
                    let actor_ref = ctx.actor_ref().clone();
                    self.start_connection(actor_ref).await;
                }
            }
            WebSocketTell::ProcessCandle { symbol, candle } => {
                self.process_candle(symbol, candle).await;
            }
            WebSocketTell::BridgeGaps => {
                self.bridge_gaps().await;
            }
            WebSocketTell::HealthCheck => {
                let task_alive = self.connection_task.as_ref().map_or(false, |t| !t.is_finished());
                if !task_alive && !self.symbols.is_empty() {
                    warn!("Connection task is gone; restarting stream");
                    let actor_ref = ctx.actor_ref().clone();
                    self.start_connection(actor_ref).await;
                } else {
                    debug!(
                        "Health check: task_alive={}, {} messages processed",
                        task_alive, self.stats.messages_parsed
                    );
                }
            }
        }
    }
}

impl Message<WebSocketAsk> for WebSocketActor {
    type Reply = Result<WebSocketReply, String>;

    async fn handle(&mut self, msg: WebSocketAsk, _ctx: Context<'_, Self, Self::Reply>) -> Self::Reply {
        match msg {
            WebSocketAsk::GetStats => {
                let connected = self.connection_task.as_ref().map_or(false, |t| !t.is_finished());
                Ok(WebSocketReply::Stats { connected, stats: self.stats.clone() })
            }
            WebSocketAsk::GetActiveSymbols => Ok(WebSocketReply::ActiveSymbols(self.symbols.clone())),
        }
    }
}

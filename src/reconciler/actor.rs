use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::{ActorStopReason, BoxError};
use kameo::message::{Context, Message};
use kameo::request::MessageSend;
use kameo::{Actor, mailbox::unbounded::UnboundedMailbox};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::historical::structs::{Candle, DataOrigin, Seconds, TickUpdate};
use crate::reconciler::buffer::CandleBuffer;
use crate::technical_analysis::actor::{IndicatorActor, IndicatorTell};

/// Reconciler actor messages for telling (fire-and-forget)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReconcilerTell {
    /// Replace a symbol's buffer with backfilled history
    Seed {
        symbol: String,
        candles: Vec<Candle>,
        origin: DataOrigin,
        generation: u64,
    },
    /// Merge one live update into a symbol's buffer
    MergeTick {
        symbol: String,
        tick: TickUpdate,
        generation: u64,
    },
}

/// Reconciler actor messages for asking (request-response)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReconcilerAsk {
    /// Get an immutable snapshot of a symbol's buffer
    GetSnapshot { symbol: String },
    /// Replace the instrument set; invalidates all in-flight work
    ResetInstruments {
        symbols: Vec<String>,
        timeframe: Seconds,
    },
    /// Get the current cancellation generation
    GetGeneration,
}

/// Reconciler actor replies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReconcilerReply {
    Snapshot {
        candles: Vec<Candle>,
        origin: DataOrigin,
    },
    Generation(u64),
    Error(String),
}

/// Owner of the authoritative candle buffers.
///
/// Buffer mutation is atomic per message: a seed or merge completes fully
/// inside one handler invocation before the next message (including any
/// snapshot read) is processed, so no reader ever observes a
/// partially-mutated buffer. Stale results are fenced by a generation
/// counter: any seed or tick stamped with an old generation is discarded
/// instead of merged into a buffer for a different instrument set.
pub struct ReconcilerActor {
    buffers: FxHashMap<String, CandleBuffer>,
    timeframe: Seconds,
    capacity: usize,
    generation: u64,
    indicator_actor: Option<ActorRef<IndicatorActor>>,
    discarded_stale: u64,
}

impl ReconcilerActor {
    pub fn new(symbols: &[String], timeframe: Seconds, capacity: usize) -> Self {
        let mut buffers = FxHashMap::default();
        for symbol in symbols {
            buffers.insert(symbol.clone(), CandleBuffer::new(timeframe, capacity));
        }

        Self {
            buffers,
            timeframe,
            capacity,
            generation: 0,
            indicator_actor: None,
            discarded_stale: 0,
        }
    }

    /// Set the indicator actor reference for snapshot forwarding
    pub fn set_indicator_actor(&mut self, indicator_actor: ActorRef<IndicatorActor>) {
        self.indicator_actor = Some(indicator_actor);
    }

    fn is_stale(&mut self, generation: u64, what: &str, symbol: &str) -> bool {
        if generation != self.generation {
            self.discarded_stale += 1;
            debug!(
                "Discarding stale {} for {} (generation {} != current {})",
                what, symbol, generation, self.generation
            );
            return true;
        }
        false
    }

    /// Forward a fresh snapshot so the derived series are recomputed.
    async fn publish_snapshot(&self, symbol: &str) {
        let Some(indicator_actor) = &self.indicator_actor else {
            return;
        };
        let Some(buffer) = self.buffers.get(symbol) else {
            return;
        };

        let msg = IndicatorTell::ProcessSnapshot {
            symbol: symbol.to_string(),
            candles: buffer.snapshot(),
            origin: buffer.origin(),
        };
        if let Err(e) = indicator_actor.tell(msg).send().await {
            warn!("Failed to forward snapshot for {}: {}", symbol, e);
        }
    }
}

impl Actor for ReconcilerActor {
    type Mailbox = UnboundedMailbox<Self>;

    fn name() -> &'static str {
        "ReconcilerActor"
    }

    async fn on_start(&mut self, _actor_ref: ActorRef<Self>) -> Result<(), BoxError> {
        info!(
            "🚀 Starting Reconciler Actor for {} symbols ({}s buckets, capacity {})",
            self.buffers.len(),
            self.timeframe,
            self.capacity
        );
        Ok(())
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        _reason: ActorStopReason,
    ) -> Result<(), BoxError> {
        for (symbol, buffer) in &self.buffers {
            info!("Final buffer for {}: {} candles", symbol, buffer.len());
        }
        if self.discarded_stale > 0 {
            info!("Discarded {} stale updates over the session", self.discarded_stale);
        }
        Ok(())
    }
}

impl Message<ReconcilerTell> for ReconcilerActor {
    type Reply = ();

    async fn handle(&mut self, msg: ReconcilerTell, _ctx: Context<'_, Self, Self::Reply>) -> Self::Reply {
        match msg {
            ReconcilerTell::Seed { symbol, candles, origin, generation } => {
                if self.is_stale(generation, "seed", &symbol) {
                    return;
                }
                let Some(buffer) = self.buffers.get_mut(&symbol) else {
                    warn!("Seed for unknown symbol {}", symbol);
                    return;
                };
                info!("Seeding {} with {} candles ({:?})", symbol, candles.len(), origin);
                buffer.seed(candles, origin);
                self.publish_snapshot(&symbol).await;
            }
            ReconcilerTell::MergeTick { symbol, tick, generation } => {
                if self.is_stale(generation, "tick", &symbol) {
                    return;
                }
                let Some(buffer) = self.buffers.get_mut(&symbol) else {
                    warn!("Tick for unknown symbol {}", symbol);
                    return;
                };
                buffer.merge_tick(&tick);
                self.publish_snapshot(&symbol).await;
            }
        }
    }
}

impl Message<ReconcilerAsk> for ReconcilerActor {
    type Reply = Result<ReconcilerReply, String>;

    async fn handle(&mut self, msg: ReconcilerAsk, _ctx: Context<'_, Self, Self::Reply>) -> Self::Reply {
        match msg {
            ReconcilerAsk::GetSnapshot { symbol } => match self.buffers.get(&symbol) {
                Some(buffer) => Ok(ReconcilerReply::Snapshot {
                    candles: buffer.snapshot(),
                    origin: buffer.origin(),
                }),
                None => Ok(ReconcilerReply::Error(format!("Unknown symbol: {}", symbol))),
            },
            ReconcilerAsk::ResetInstruments { symbols, timeframe } => {
                self.generation += 1;
                self.timeframe = timeframe;
                self.buffers.clear();
                for symbol in &symbols {
                    self.buffers.insert(symbol.clone(), CandleBuffer::new(timeframe, self.capacity));
                }
                info!(
                    "Instrument set reset to {:?} ({}s); generation now {}",
                    symbols, timeframe, self.generation
                );
                Ok(ReconcilerReply::Generation(self.generation))
            }
            ReconcilerAsk::GetGeneration => Ok(ReconcilerReply::Generation(self.generation)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let close = 100.0 + i as f64;
                Candle::new_from_values(i as i64 * 60_000, close, close + 1.0, close - 1.0, close, 5.0, true)
            })
            .collect()
    }

    fn spawn_reconciler() -> ActorRef<ReconcilerActor> {
        kameo::spawn(ReconcilerActor::new(&["BTCUSDT".to_string()], 60, 1000))
    }

    async fn snapshot(actor_ref: &ActorRef<ReconcilerActor>, symbol: &str) -> Vec<Candle> {
        match actor_ref
            .ask(ReconcilerAsk::GetSnapshot { symbol: symbol.to_string() })
            .send()
            .await
            .unwrap()
        {
            ReconcilerReply::Snapshot { candles, .. } => candles,
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_seed_then_merge_pipeline() {
        let actor_ref = spawn_reconciler();

        actor_ref
            .tell(ReconcilerTell::Seed {
                symbol: "BTCUSDT".to_string(),
                candles: seed_candles(5),
                origin: DataOrigin::Exchange,
                generation: 0,
            })
            .send()
            .await
            .unwrap();

        actor_ref
            .tell(ReconcilerTell::MergeTick {
                symbol: "BTCUSDT".to_string(),
                tick: TickUpdate::Trade { timestamp: 301_000, price: 110.0, volume: 1.0 },
                generation: 0,
            })
            .send()
            .await
            .unwrap();

        let candles = snapshot(&actor_ref, "BTCUSDT").await;
        assert_eq!(candles.len(), 6);
        assert_eq!(candles.last().unwrap().open_time, 300_000);
        assert_eq!(candles.last().unwrap().close, 110.0);
    }

    #[tokio::test]
    async fn test_stale_generation_is_discarded() {
        let actor_ref = spawn_reconciler();

        // Bump the generation by resetting the instrument set.
        let reply = actor_ref
            .ask(ReconcilerAsk::ResetInstruments {
                symbols: vec!["BTCUSDT".to_string()],
                timeframe: 60,
            })
            .send()
            .await
            .unwrap();
        assert!(matches!(reply, ReconcilerReply::Generation(1)));

        // A seed stamped with the old generation must not land.
        actor_ref
            .tell(ReconcilerTell::Seed {
                symbol: "BTCUSDT".to_string(),
                candles: seed_candles(5),
                origin: DataOrigin::Exchange,
                generation: 0,
            })
            .send()
            .await
            .unwrap();

        let candles = snapshot(&actor_ref, "BTCUSDT").await;
        assert!(candles.is_empty(), "stale seed must be discarded");

        // The current generation lands.
        actor_ref
            .tell(ReconcilerTell::Seed {
                symbol: "BTCUSDT".to_string(),
                candles: seed_candles(5),
                origin: DataOrigin::Exchange,
                generation: 1,
            })
            .send()
            .await
            .unwrap();
        let candles = snapshot(&actor_ref, "BTCUSDT").await;
        assert_eq!(candles.len(), 5);
    }

    #[tokio::test]
    async fn test_unknown_symbol_snapshot_errors() {
        let actor_ref = spawn_reconciler();
        let reply = actor_ref
            .ask(ReconcilerAsk::GetSnapshot { symbol: "DOGEUSDT".to_string() })
            .send()
            .await
            .unwrap();
        assert!(matches!(reply, ReconcilerReply::Error(_)));
    }
}

use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::{ActorStopReason, BoxError};
use kameo::message::{Context, Message};
use kameo::{Actor, mailbox::unbounded::UnboundedMailbox};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::types::{ApiConfig, ApiStats};
use crate::api::BinanceKlinesClient;
use crate::historical::fetcher::PagedKlineFetcher;
use crate::historical::structs::{Candle, DataOrigin, TimestampMS};
use crate::historical::synthetic::SyntheticKlineSource;
use crate::historical::utils::format_timestamp;

/// Historical actor messages for asking (request-response)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HistoricalAsk {
    /// Fetch a complete kline range via the paginated backfill path
    FetchRange {
        symbol: String,
        interval: String,
        start_time: TimestampMS,
        end_time: TimestampMS,
    },
    /// Get fetch statistics
    GetStats,
}

/// Historical actor replies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HistoricalReply {
    /// Backfill result, tagged with where the data came from
    Candles {
        candles: Vec<Candle>,
        origin: DataOrigin,
    },
    /// Statistics response
    Stats(ApiStats),
    /// Error response
    Error(String),
}

/// Actor owning the REST backfill path.
///
/// When the real source fails terminally and the synthetic fallback is
/// enabled, the reply carries `DataOrigin::Synthetic` so no consumer can
/// mistake fabricated candles for exchange data.
pub struct HistoricalActor {
    fetcher: PagedKlineFetcher<BinanceKlinesClient>,
    synthetic_base_price: Option<f64>,
}

impl HistoricalActor {
    pub fn new(config: ApiConfig) -> Result<Self, crate::api::types::ApiError> {
        let client = BinanceKlinesClient::new(config.base_url.clone())?;
        let fetcher = PagedKlineFetcher::new(client)
            .with_retry_policy(config.max_retries, config.retry_delay_ms);

        Ok(Self { fetcher, synthetic_base_price: None })
    }

    /// Enable the synthetic fallback source with the given base price.
    pub fn with_synthetic_fallback(mut self, base_price: f64) -> Self {
        self.synthetic_base_price = Some(base_price);
        self
    }

    async fn fetch_range(
        &mut self,
        symbol: &str,
        interval: &str,
        start_time: TimestampMS,
        end_time: TimestampMS,
    ) -> HistoricalReply {
        match self.fetcher.fetch_range(symbol, interval, start_time, end_time).await {
            Ok(candles) => HistoricalReply::Candles { candles, origin: DataOrigin::Exchange },
            Err(e) => {
                if let Some(base_price) = self.synthetic_base_price {
                    warn!("Backfill failed ({}); falling back to synthetic data for {}", e, symbol);
                    let mut synthetic = PagedKlineFetcher::new(SyntheticKlineSource::new(base_price));
                    match synthetic.fetch_range(symbol, interval, start_time, end_time).await {
                        Ok(candles) => HistoricalReply::Candles { candles, origin: DataOrigin::Synthetic },
                        Err(e) => HistoricalReply::Error(format!("Synthetic fallback failed: {}", e)),
                    }
                } else {
                    error!("Backfill failed for {} {}: {}", symbol, interval, e);
                    HistoricalReply::Error(e.to_string())
                }
            }
        }
    }
}

impl Actor for HistoricalActor {
    type Mailbox = UnboundedMailbox<Self>;

    fn name() -> &'static str {
        "HistoricalActor"
    }

    async fn on_start(&mut self, _actor_ref: ActorRef<Self>) -> Result<(), BoxError> {
        info!("🚀 Starting Historical Actor");
        Ok(())
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        _reason: ActorStopReason,
    ) -> Result<(), BoxError> {
        let stats = self.fetcher.stats();
        info!(
            "🛑 Stopping Historical Actor: {} requests, {:.1}% success rate, {} candles fetched",
            stats.requests_made,
            stats.success_rate() * 100.0,
            stats.total_candles_fetched
        );
        Ok(())
    }
}

impl Message<HistoricalAsk> for HistoricalActor {
    type Reply = Result<HistoricalReply, String>;

    async fn handle(&mut self, msg: HistoricalAsk, _ctx: Context<'_, Self, Self::Reply>) -> Self::Reply {
        match msg {
            HistoricalAsk::FetchRange { symbol, interval, start_time, end_time } => {
                info!(
                    "Backfill requested for {} {} ({} - {})",
                    symbol,
                    interval,
                    format_timestamp(start_time),
                    format_timestamp(end_time)
                );
                Ok(self.fetch_range(&symbol, &interval, start_time, end_time).await)
            }
            HistoricalAsk::GetStats => Ok(HistoricalReply::Stats(self.fetcher.stats().clone())),
        }
    }
}

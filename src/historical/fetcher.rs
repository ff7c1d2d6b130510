use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::types::{ApiError, ApiRequest, ApiStats};
use crate::api::BinanceKlinesClient;
use crate::common::constants::{KLINE_PAGE_LIMIT, MAX_KLINE_PAGES};
use crate::historical::errors::HistoricalDataError;
use crate::historical::structs::{Candle, TimestampMS};
use crate::historical::utils::{interval_to_seconds, scan_for_candle_gaps};

/// Capability interface over a remote kline page source.
///
/// The page-size contract: a page of exactly `limit` rows means more data
/// may exist past the last returned timestamp.
pub trait KlineSource {
    fn fetch_page(
        &mut self,
        request: &ApiRequest,
    ) -> impl std::future::Future<Output = Result<Vec<Candle>, ApiError>> + Send;
}

impl KlineSource for BinanceKlinesClient {
    async fn fetch_page(&mut self, request: &ApiRequest) -> Result<Vec<Candle>, ApiError> {
        self.fetch_klines(request).await.map(|response| response.data)
    }
}

/// Paginated backfill over a [`KlineSource`].
///
/// Walks the range page by page, advancing the cursor to
/// `last_returned_timestamp + 1` so the boundary candle of the previous
/// page is never re-fetched. The walk is an explicit loop with a page cap;
/// an upstream that keeps returning full pages fails the fetch instead of
/// running unbounded.
pub struct PagedKlineFetcher<S> {
    source: S,
    page_limit: u32,
    max_pages: u32,
    max_retries: u32,
    retry_delay_ms: u64,
    stats: ApiStats,
}

impl<S: KlineSource> PagedKlineFetcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            page_limit: KLINE_PAGE_LIMIT,
            max_pages: MAX_KLINE_PAGES,
            max_retries: 3,
            retry_delay_ms: 1000,
            stats: ApiStats::new(),
        }
    }

    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_retry_policy(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    pub fn stats(&self) -> &ApiStats {
        &self.stats
    }

    /// Fetch a complete, gap-free kline sequence covering `[start_time, end_time]`.
    ///
    /// Partial progress is never surfaced: any terminal page failure or
    /// ordering violation discards everything fetched so far.
    pub async fn fetch_range(
        &mut self,
        symbol: &str,
        interval: &str,
        start_time: TimestampMS,
        end_time: TimestampMS,
    ) -> Result<Vec<Candle>, HistoricalDataError> {
        if start_time >= end_time {
            return Err(HistoricalDataError::Validation(format!(
                "Invalid range: start {} >= end {}",
                start_time, end_time
            )));
        }
        let timeframe = interval_to_seconds(interval)?;

        let mut candles: Vec<Candle> = Vec::new();
        let mut cursor = start_time;
        let mut pages: u32 = 0;

        loop {
            if pages >= self.max_pages {
                return Err(HistoricalDataError::UpstreamData(format!(
                    "Pagination exceeded {} pages for {} {} starting at {}; upstream keeps returning full pages",
                    self.max_pages, symbol, interval, start_time
                )));
            }

            let request = ApiRequest::new_klines(symbol.to_string(), interval.to_string())
                .with_time_range(cursor, end_time)
                .with_limit(self.page_limit);

            let page = self.fetch_page_with_retry(&request).await?;
            pages += 1;

            if page.is_empty() {
                break;
            }

            // A page reaching behind the cursor would re-deliver the boundary
            // candle of the previous page.
            if page[0].open_time < cursor {
                return Err(HistoricalDataError::UpstreamData(format!(
                    "Page starts at {} before cursor {}",
                    page[0].open_time, cursor
                )));
            }

            let page_len = page.len();
            let last_ts = page[page_len - 1].open_time;
            debug!(
                "Page {}/{}: {} candles for {} {} ({} - {})",
                pages, self.max_pages, page_len, symbol, interval, page[0].open_time, last_ts
            );
            candles.extend(page);

            if page_len < self.page_limit as usize {
                break;
            }

            cursor = last_ts + 1;
            if cursor > end_time {
                break;
            }
        }

        self.validate_sequence(&candles, timeframe, start_time, end_time)?;

        info!(
            "✅ Backfill complete: {} candles for {} {} over {} pages",
            candles.len(), symbol, interval, pages
        );
        Ok(candles)
    }

    /// One page fetch with bounded retries. Rate limits honor the advertised
    /// retry delay; other transient failures back off linearly. Parse
    /// failures are terminal.
    async fn fetch_page_with_retry(&mut self, request: &ApiRequest) -> Result<Vec<Candle>, HistoricalDataError> {
        let mut retries: u32 = 0;

        loop {
            self.stats.record_request();
            match self.source.fetch_page(request).await {
                Ok(page) => {
                    self.stats.record_success(page.len() as u64);
                    return Ok(page);
                }
                Err(ApiError::RateLimit { retry_after_secs }) if retries < self.max_retries => {
                    retries += 1;
                    self.stats.record_rate_limit();
                    warn!(
                        "Rate limit hit, honoring retry-after of {}s ({}/{})",
                        retry_after_secs, retries, self.max_retries
                    );
                    sleep(Duration::from_secs(retry_after_secs)).await;
                }
                Err(e) if e.is_recoverable() && retries < self.max_retries => {
                    retries += 1;
                    warn!("Retrying page fetch ({}/{}): {}", retries, self.max_retries, e);
                    sleep(Duration::from_millis(self.retry_delay_ms * retries as u64)).await;
                }
                Err(e) => {
                    self.stats.record_failure();
                    return Err(e.into());
                }
            }
        }
    }

    fn validate_sequence(
        &self,
        candles: &[Candle],
        timeframe: u64,
        start_time: TimestampMS,
        end_time: TimestampMS,
    ) -> Result<(), HistoricalDataError> {
        for pair in candles.windows(2) {
            if pair[1].open_time <= pair[0].open_time {
                return Err(HistoricalDataError::UpstreamData(format!(
                    "Non-increasing timestamps: {} then {}",
                    pair[0].open_time, pair[1].open_time
                )));
            }
        }

        let gaps = scan_for_candle_gaps(candles, timeframe, start_time, end_time);
        let interval_ms = timeframe as i64 * 1000;
        for gap in &gaps {
            // Interior holes are an upstream fault. Shortfall at the range
            // boundaries just means the exchange has no data there (a range
            // reaching before listing, or an end_time in the future).
            let interior = candles.first().map_or(false, |first| gap.start > first.open_time)
                && candles.last().map_or(false, |last| gap.end <= last.open_time);
            if interior {
                return Err(HistoricalDataError::UpstreamData(format!(
                    "Gap of {}ms between {} and {}",
                    gap.end - gap.start, gap.start, gap.end
                )));
            }
            if gap.end - gap.start > interval_ms {
                warn!("Backfill shortfall at range boundary: {} - {}", gap.start, gap.end);
            }
        }

        Ok(())
    }
}

use std::collections::VecDeque;

use tracing::debug;

use crate::historical::structs::{Candle, DataOrigin, Seconds, TickUpdate, TimestampMS};

/// The authoritative bounded, time-ordered OHLCV buffer for one instrument.
///
/// Invariants held across `seed` and `merge_tick`:
/// - timestamps strictly increasing and unique
/// - length never exceeds capacity (oldest evicted first)
/// - at most one live (`closed == false`) candle, always the last
/// - `low <= min(open, close) <= max(open, close) <= high` per candle
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    candles: VecDeque<Candle>,
    capacity: usize,
    interval_ms: i64,
    origin: DataOrigin,
}

impl CandleBuffer {
    pub fn new(timeframe: Seconds, capacity: usize) -> Self {
        Self {
            candles: VecDeque::with_capacity(capacity),
            capacity,
            interval_ms: timeframe as i64 * 1000,
            origin: DataOrigin::Exchange,
        }
    }

    /// Replace the buffer wholesale with a backfilled history.
    ///
    /// Input is normalized rather than trusted: sorted, deduplicated by
    /// bucket (later entries win), and truncated to the newest `capacity`
    /// candles. Every candle except a still-open last one is closed.
    pub fn seed(&mut self, mut candles: Vec<Candle>, origin: DataOrigin) {
        candles.sort_by_key(|c| c.open_time);

        self.candles.clear();
        self.origin = origin;
        for candle in candles {
            match self.candles.back_mut() {
                Some(last) if last.open_time == candle.open_time => *last = candle,
                _ => self.candles.push_back(candle),
            }
        }

        let len = self.candles.len();
        for (i, candle) in self.candles.iter_mut().enumerate() {
            if i + 1 < len {
                candle.closed = true;
            }
        }

        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }

        debug!("Seeded buffer with {} candles ({:?})", self.candles.len(), self.origin);
    }

    /// Incorporate one live update.
    ///
    /// The tick lands in the bucket `floor(ts / interval_ms) * interval_ms`.
    /// If that bucket already exists it is merged in place; otherwise a new
    /// bucket is inserted and the oldest candle evicted once the buffer
    /// overflows.
    pub fn merge_tick(&mut self, tick: &TickUpdate) {
        let bucket_start = self.bucket_start(tick.timestamp());

        // Common case: the tick extends the live last bucket.
        if let Some(last) = self.candles.back_mut() {
            if last.open_time == bucket_start && !last.closed {
                Self::merge_into(last, tick);
                return;
            }
        }

        // A tick for any other existing bucket merges in place. Duplicating
        // the timestamp is never an option; only the last bucket may be
        // (re-)opened as the current period, and only by a live fragment.
        if let Some(pos) = self.candles.iter().position(|c| c.open_time == bucket_start) {
            let is_last = pos + 1 == self.candles.len();
            let candle = &mut self.candles[pos];
            Self::merge_into(candle, tick);
            if is_last {
                if let TickUpdate::Fragment(fragment) = tick {
                    candle.closed = fragment.closed;
                }
            } else {
                candle.closed = true;
            }
            return;
        }

        let is_latest = self.candles.back().map_or(true, |last| bucket_start > last.open_time);
        if is_latest {
            if let Some(last) = self.candles.back_mut() {
                last.closed = true;
            }
        }

        let candle = Self::new_bucket(bucket_start, tick, is_latest);
        self.candles.push_back(candle);
        // Ticks can arrive slightly out of order; re-sort instead of
        // assuming monotonic arrival.
        if !is_latest {
            self.candles.make_contiguous().sort_by_key(|c| c.open_time);
        }

        while self.candles.len() > self.capacity {
            let evicted = self.candles.pop_front();
            if let Some(evicted) = evicted {
                debug!("Evicted candle at {} (capacity {})", evicted.open_time, self.capacity);
            }
        }
    }

    fn bucket_start(&self, timestamp: TimestampMS) -> TimestampMS {
        timestamp.div_euclid(self.interval_ms) * self.interval_ms
    }

    fn merge_into(candle: &mut Candle, tick: &TickUpdate) {
        match tick {
            TickUpdate::Trade { price, volume, .. } => {
                candle.high = candle.high.max(*price);
                candle.low = candle.low.min(*price);
                candle.close = *price;
                candle.volume += *volume;
            }
            TickUpdate::Fragment(fragment) => {
                candle.high = candle.high.max(fragment.high);
                candle.low = candle.low.min(fragment.low);
                candle.close = fragment.close;
                // Kline fragments carry the cumulative bucket volume, not a
                // delta; the fragment value is authoritative.
                candle.volume = fragment.volume;
                if fragment.closed {
                    candle.closed = true;
                }
            }
        }
    }

    fn new_bucket(bucket_start: TimestampMS, tick: &TickUpdate, is_latest: bool) -> Candle {
        match tick {
            TickUpdate::Trade { price, volume, .. } => {
                Candle::new_from_values(bucket_start, *price, *price, *price, *price, *volume, !is_latest)
            }
            TickUpdate::Fragment(fragment) => {
                let mut candle = fragment.clone();
                candle.open_time = bucket_start;
                candle.closed = fragment.closed || !is_latest;
                candle
            }
        }
    }

    /// Immutable snapshot for the analysis pipeline.
    pub fn snapshot(&self) -> Vec<Candle> {
        self.candles.iter().cloned().collect()
    }

    pub fn origin(&self) -> DataOrigin {
        self.origin
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last_open_time(&self) -> Option<TimestampMS> {
        self.candles.back().map(|c| c.open_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_buffer(capacity: usize, timestamps: &[TimestampMS]) -> CandleBuffer {
        let mut buffer = CandleBuffer::new(60, capacity);
        let candles = timestamps.iter()
            .map(|&ts| Candle::new_from_values(ts, 100.0, 101.0, 99.0, 100.0, 10.0, true))
            .collect();
        buffer.seed(candles, DataOrigin::Exchange);
        buffer
    }

    fn assert_sorted_unique(buffer: &CandleBuffer) {
        let snapshot = buffer.snapshot();
        for pair in snapshot.windows(2) {
            assert!(
                pair[1].open_time > pair[0].open_time,
                "buffer must stay strictly ordered: {} then {}",
                pair[0].open_time,
                pair[1].open_time
            );
        }
        let live_count = snapshot.iter().filter(|c| !c.closed).count();
        assert!(live_count <= 1, "at most one live candle, found {}", live_count);
        if let Some(live_pos) = snapshot.iter().position(|c| !c.closed) {
            assert_eq!(live_pos, snapshot.len() - 1, "live candle must be last");
        }
    }

    #[test]
    fn test_seed_replaces_wholesale() {
        let mut buffer = seeded_buffer(10, &[0, 60_000, 120_000]);
        assert_eq!(buffer.len(), 3);

        let replacement = vec![Candle::new_from_values(600_000, 1.0, 1.0, 1.0, 1.0, 1.0, true)];
        buffer.seed(replacement, DataOrigin::Exchange);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.last_open_time(), Some(600_000));
    }

    #[test]
    fn test_seed_sorts_dedups_and_truncates() {
        let mut buffer = CandleBuffer::new(60, 3);
        let candles = vec![
            Candle::new_from_values(120_000, 3.0, 3.0, 3.0, 3.0, 1.0, true),
            Candle::new_from_values(0, 1.0, 1.0, 1.0, 1.0, 1.0, true),
            Candle::new_from_values(60_000, 2.0, 2.0, 2.0, 2.0, 1.0, true),
            // Duplicate bucket: the later entry wins.
            Candle::new_from_values(60_000, 2.5, 2.5, 2.5, 2.5, 1.0, true),
            Candle::new_from_values(180_000, 4.0, 4.0, 4.0, 4.0, 1.0, true),
        ];
        buffer.seed(candles, DataOrigin::Exchange);

        assert_eq!(buffer.len(), 3);
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot[0].open_time, 60_000);
        assert_eq!(snapshot[0].close, 2.5);
        assert_sorted_unique(&buffer);
    }

    #[test]
    fn test_merge_into_current_bucket() {
        // Capacity 3, bars at t=0,60,120 (interval 60s); a tick at t=125s
        // merges into the t=120s bucket instead of creating a 4th.
        let mut buffer = seeded_buffer(3, &[0, 60_000]);
        buffer.merge_tick(&TickUpdate::Trade { timestamp: 121_000, price: 100.0, volume: 10.0 });

        buffer.merge_tick(&TickUpdate::Trade { timestamp: 125_000, price: 105.0, volume: 2.0 });

        assert_eq!(buffer.len(), 3);
        let snapshot = buffer.snapshot();
        let merged = &snapshot[2];
        assert_eq!(merged.open_time, 120_000);
        assert_eq!(merged.close, 105.0);
        assert_eq!(merged.high, 105.0);
        assert!(merged.is_price_ordered());
        assert_sorted_unique(&buffer);
    }

    #[test]
    fn test_new_bucket_evicts_oldest() {
        // A tick at t=185s creates a bucket at t=180s and evicts the t=0
        // bucket, leaving exactly 60s, 120s, 180s.
        let mut buffer = seeded_buffer(3, &[0, 60_000, 120_000]);

        buffer.merge_tick(&TickUpdate::Trade { timestamp: 185_000, price: 107.0, volume: 1.0 });

        assert_eq!(buffer.len(), 3);
        let timestamps: Vec<TimestampMS> = buffer.snapshot().iter().map(|c| c.open_time).collect();
        assert_eq!(timestamps, vec![60_000, 120_000, 180_000]);
        assert_sorted_unique(&buffer);
    }

    #[test]
    fn test_trade_tick_merge_accumulates_volume() {
        let mut buffer = CandleBuffer::new(60, 10);
        buffer.merge_tick(&TickUpdate::Trade { timestamp: 1_000, price: 100.0, volume: 1.0 });
        buffer.merge_tick(&TickUpdate::Trade { timestamp: 2_000, price: 103.0, volume: 2.0 });
        buffer.merge_tick(&TickUpdate::Trade { timestamp: 3_000, price: 99.0, volume: 0.5 });

        assert_eq!(buffer.len(), 1);
        let candle = &buffer.snapshot()[0];
        assert_eq!(candle.open_time, 0);
        assert_eq!(candle.open, 100.0);
        assert_eq!(candle.high, 103.0);
        assert_eq!(candle.low, 99.0);
        assert_eq!(candle.close, 99.0);
        assert_eq!(candle.volume, 3.5);
        assert!(!candle.closed);
        assert!(candle.is_price_ordered());
    }

    #[test]
    fn test_fragment_merge_takes_cumulative_volume() {
        let mut buffer = CandleBuffer::new(60, 10);
        buffer.merge_tick(&TickUpdate::Fragment(Candle::new_from_values(
            0, 100.0, 101.0, 99.5, 100.5, 5.0, false,
        )));
        // Later fragment for the same bucket: volume is cumulative, not added.
        buffer.merge_tick(&TickUpdate::Fragment(Candle::new_from_values(
            30_000, 100.0, 102.0, 99.0, 101.5, 8.0, false,
        )));

        assert_eq!(buffer.len(), 1);
        let candle = &buffer.snapshot()[0];
        assert_eq!(candle.volume, 8.0);
        assert_eq!(candle.high, 102.0);
        assert_eq!(candle.low, 99.0);
        assert_eq!(candle.close, 101.5);
        assert!(!candle.closed);
    }

    #[test]
    fn test_live_fragment_reopens_seeded_last_bucket() {
        // REST history marks every candle closed; the first live fragment
        // for the same final bucket makes it the current period again.
        let mut buffer = seeded_buffer(10, &[0, 60_000, 120_000]);
        buffer.merge_tick(&TickUpdate::Fragment(Candle::new_from_values(
            120_000, 100.0, 102.0, 99.0, 101.0, 12.0, false,
        )));

        let snapshot = buffer.snapshot();
        assert!(!snapshot[2].closed);
        assert_eq!(snapshot[2].close, 101.0);
        assert_sorted_unique(&buffer);
    }

    #[test]
    fn test_closed_fragment_closes_bucket() {
        let mut buffer = CandleBuffer::new(60, 10);
        buffer.merge_tick(&TickUpdate::Fragment(Candle::new_from_values(
            0, 100.0, 101.0, 99.5, 100.5, 5.0, false,
        )));
        buffer.merge_tick(&TickUpdate::Fragment(Candle::new_from_values(
            59_000, 100.0, 101.0, 99.0, 100.2, 9.0, true,
        )));

        let candle = &buffer.snapshot()[0];
        assert!(candle.closed);
    }

    #[test]
    fn test_double_merge_preserves_price_ordering() {
        // Two merges with a non-decreasing price sequence keep
        // high >= max(open, close) and low <= min(open, close).
        let mut buffer = CandleBuffer::new(60, 10);
        buffer.merge_tick(&TickUpdate::Trade { timestamp: 1_000, price: 100.0, volume: 1.0 });
        buffer.merge_tick(&TickUpdate::Trade { timestamp: 2_000, price: 104.0, volume: 1.0 });

        let candle = &buffer.snapshot()[0];
        assert!(candle.high >= candle.open.max(candle.close));
        assert!(candle.low <= candle.open.min(candle.close));
    }

    #[test]
    fn test_out_of_order_tick_merges_into_closed_bucket() {
        let mut buffer = seeded_buffer(10, &[0, 60_000, 120_000]);
        buffer.merge_tick(&TickUpdate::Trade { timestamp: 185_000, price: 106.0, volume: 1.0 });
        // Late tick for the already-closed 60s bucket.
        buffer.merge_tick(&TickUpdate::Trade { timestamp: 65_000, price: 110.0, volume: 1.0 });

        assert_eq!(buffer.len(), 4);
        let snapshot = buffer.snapshot();
        let late = snapshot.iter().find(|c| c.open_time == 60_000).unwrap();
        assert_eq!(late.high, 110.0);
        assert!(late.closed, "merging a late tick must not re-open the bucket");
        assert_sorted_unique(&buffer);
    }

    #[test]
    fn test_out_of_order_new_bucket_is_sorted_in() {
        let mut buffer = seeded_buffer(10, &[0, 120_000]);
        // Tick for the missing 60s bucket arrives after the 120s bucket exists.
        buffer.merge_tick(&TickUpdate::Trade { timestamp: 61_000, price: 104.0, volume: 1.0 });

        let timestamps: Vec<TimestampMS> = buffer.snapshot().iter().map(|c| c.open_time).collect();
        assert_eq!(timestamps, vec![0, 60_000, 120_000]);
        assert_sorted_unique(&buffer);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut buffer = CandleBuffer::new(60, 5);
        for i in 0..50 {
            buffer.merge_tick(&TickUpdate::Trade {
                timestamp: i * 60_000 + 500,
                price: 100.0 + i as f64,
                volume: 1.0,
            });
            assert!(buffer.len() <= 5);
        }
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.last_open_time(), Some(49 * 60_000));
        assert_sorted_unique(&buffer);
    }

    #[test]
    fn test_negative_timestamp_bucket_alignment() {
        let buffer = CandleBuffer::new(60, 5);
        // div_euclid keeps pre-epoch timestamps aligned to the bucket below.
        assert_eq!(buffer.bucket_start(-1), -60_000);
        assert_eq!(buffer.bucket_start(0), 0);
        assert_eq!(buffer.bucket_start(59_999), 0);
        assert_eq!(buffer.bucket_start(60_000), 60_000);
    }

    #[test]
    fn test_seed_origin_is_tracked() {
        let mut buffer = CandleBuffer::new(60, 5);
        buffer.seed(vec![Candle::new_from_values(0, 1.0, 1.0, 1.0, 1.0, 1.0, true)], DataOrigin::Synthetic);
        assert_eq!(buffer.origin(), DataOrigin::Synthetic);
    }
}

use crate::error::ConfigError;
use crate::state::RingBuffer;
use crate::stats::finite;
use crate::types::{PriceSample, ReturnSample};

/// Symmetric price ratio: 1.0 is no change, a halving mirrors a doubling
/// (`2.0` up, `0.0` down).
pub fn price_ratio(prev: f64, curr: f64) -> Option<f64> {
    if !prev.is_finite() || !curr.is_finite() || prev <= 0.0 || curr <= 0.0 {
        return None;
    }
    let ratio = if curr >= prev {
        curr / prev
    } else {
        2.0 - prev / curr
    };
    finite(ratio)
}

/// Per-asset price-to-return state. Remembers the trailing `period` prices so
/// incremental feeding never rescans history.
#[derive(Debug, Clone)]
pub struct ReturnTransformer {
    period: usize,
    history: RingBuffer<Option<f64>>,
    timeframe_ns: Option<i64>,
    last_ts_ns: Option<i64>,
}

impl ReturnTransformer {
    pub fn new(period: usize) -> Result<Self, ConfigError> {
        if period == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(Self {
            period,
            history: RingBuffer::new(period)?,
            timeframe_ns: None,
            last_ts_ns: None,
        })
    }

    /// Enables gap detection: skipped sampling slots count as missing prices.
    pub fn with_timeframe(mut self, timeframe_ns: i64) -> Result<Self, ConfigError> {
        if timeframe_ns <= 0 {
            return Err(ConfigError::InvalidTimeframe { timeframe_ns });
        }
        self.timeframe_ns = Some(timeframe_ns);
        Ok(self)
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn last_ts_ns(&self) -> Option<i64> {
        self.last_ts_ns
    }

    /// Feeds one price. Returns `None` when the sample is at or before the last
    /// fed timestamp (already consumed).
    pub fn push(&mut self, sample: PriceSample) -> Option<ReturnSample> {
        if let Some(last) = self.last_ts_ns {
            if sample.ts_ns <= last {
                return None;
            }
            self.fill_gap(last, sample.ts_ns);
        }
        self.last_ts_ns = Some(sample.ts_ns);

        let price = sample.close.filter(|p| p.is_finite() && *p > 0.0);
        let base = if self.history.is_full() {
            self.history.get(0).copied().flatten()
        } else {
            None
        };
        self.history.push(price);

        let value = match (base, price) {
            (Some(prev), Some(curr)) => price_ratio(prev, curr),
            _ => None,
        };
        Some(ReturnSample {
            ts_ns: sample.ts_ns,
            value,
        })
    }

    /// Lazily transforms `prices`, skipping already-consumed timestamps.
    pub fn transform<'a, I>(&'a mut self, prices: I) -> impl Iterator<Item = ReturnSample> + 'a
    where
        I: IntoIterator<Item = PriceSample>,
        I::IntoIter: 'a,
    {
        prices.into_iter().filter_map(move |sample| self.push(sample))
    }

    fn fill_gap(&mut self, last_ts_ns: i64, ts_ns: i64) {
        let Some(timeframe_ns) = self.timeframe_ns else {
            return;
        };
        let skipped = (ts_ns.saturating_sub(last_ts_ns) / timeframe_ns).saturating_sub(1);
        // More than `period` empty slots wipes the whole history anyway.
        let skipped = (skipped.max(0) as usize).min(self.period);
        for _ in 0..skipped {
            self.history.push(None);
        }
    }
}

//! Earliest-first merge of per-asset return tails into aligned batches.

use crate::error::{ConfigError, MergeError};
use crate::types::{AlignedBatch, AssetId, ReturnSample};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

/// Restartable merger. Keeps only a checkpoint (last emitted timestamp) and
/// the latest timestamp seen, so each call can be fed just the new tails.
#[derive(Debug, Clone)]
pub struct ChronologicalMerger {
    horizon_ns: i64,
    checkpoint_ts_ns: Option<i64>,
    max_seen_ts_ns: Option<i64>,
}

impl ChronologicalMerger {
    /// Horizon is `window * timeframe_ns`.
    pub fn new(window: usize, timeframe_ns: i64) -> Result<Self, ConfigError> {
        if window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if timeframe_ns <= 0 {
            return Err(ConfigError::InvalidTimeframe { timeframe_ns });
        }
        Ok(Self {
            horizon_ns: (window as i64).saturating_mul(timeframe_ns),
            checkpoint_ts_ns: None,
            max_seen_ts_ns: None,
        })
    }

    pub fn horizon_ns(&self) -> i64 {
        self.horizon_ns
    }

    /// Timestamp of the last emitted batch.
    pub fn checkpoint(&self) -> Option<i64> {
        self.checkpoint_ts_ns
    }

    pub fn max_seen_ts_ns(&self) -> Option<i64> {
        self.max_seen_ts_ns
    }

    /// Starts a merge over `series`. Samples older than the horizon behind the
    /// latest timestamp across all assets, and samples at or before the
    /// checkpoint, are skipped. Batches are produced lazily; the checkpoint
    /// advances as they are consumed.
    pub fn merge<'a>(
        &'a mut self,
        series: &'a BTreeMap<AssetId, Vec<ReturnSample>>,
    ) -> Result<MergedBatches<'a>, MergeError> {
        for (asset, samples) in series {
            check_strictly_increasing(asset, samples.iter().map(|s| s.ts_ns))?;
        }

        let tail_max = series
            .values()
            .filter_map(|samples| samples.last().map(|s| s.ts_ns))
            .max();
        self.max_seen_ts_ns = match (self.max_seen_ts_ns, tail_max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let cutoff = self
            .max_seen_ts_ns
            .map(|max| max.saturating_sub(self.horizon_ns))
            .unwrap_or(i64::MIN);
        let checkpoint = self.checkpoint_ts_ns;
        let is_fresh = |ts_ns: i64| ts_ns >= cutoff && checkpoint.map_or(true, |cp| ts_ns > cp);

        let mut frontiers = Vec::with_capacity(series.len());
        let mut heap = BinaryHeap::with_capacity(series.len());
        for (asset, samples) in series {
            let start = samples.partition_point(|s| !is_fresh(s.ts_ns));
            let mut frontier = Frontier {
                asset,
                samples,
                pos: start,
            };
            if let Some(ts_ns) = frontier.seek_observation() {
                heap.push(Reverse((ts_ns, frontiers.len())));
            }
            frontiers.push(frontier);
        }

        Ok(MergedBatches {
            merger: self,
            frontiers,
            heap,
        })
    }
}

/// Fails on the first timestamp that does not move strictly forward.
pub(crate) fn check_strictly_increasing(
    asset: &str,
    timestamps: impl IntoIterator<Item = i64>,
) -> Result<(), MergeError> {
    let mut prev: Option<i64> = None;
    for ts_ns in timestamps {
        if let Some(prev_ts_ns) = prev {
            if ts_ns <= prev_ts_ns {
                return Err(MergeError::NonMonotonicSeries {
                    asset: asset.to_string(),
                    prev_ts_ns,
                    ts_ns,
                });
            }
        }
        prev = Some(ts_ns);
    }
    Ok(())
}

#[derive(Debug)]
struct Frontier<'a> {
    asset: &'a AssetId,
    samples: &'a [ReturnSample],
    pos: usize,
}

impl Frontier<'_> {
    /// Moves to the next sample carrying a value and returns its timestamp.
    fn seek_observation(&mut self) -> Option<i64> {
        while let Some(sample) = self.samples.get(self.pos) {
            if sample.value.is_some() {
                return Some(sample.ts_ns);
            }
            self.pos += 1;
        }
        None
    }

    fn take(&mut self) -> Option<f64> {
        let value = self.samples.get(self.pos)?.value;
        self.pos += 1;
        value
    }
}

/// Lazy batch stream returned by [`ChronologicalMerger::merge`].
#[derive(Debug)]
pub struct MergedBatches<'a> {
    merger: &'a mut ChronologicalMerger,
    frontiers: Vec<Frontier<'a>>,
    heap: BinaryHeap<Reverse<(i64, usize)>>,
}

impl MergedBatches<'_> {
    fn consume(&mut self, idx: usize, batch: &mut AlignedBatch) {
        let frontier = &mut self.frontiers[idx];
        if let Some(value) = frontier.take() {
            batch.returns.insert(frontier.asset.clone(), value);
        }
        if let Some(next_ts_ns) = frontier.seek_observation() {
            self.heap.push(Reverse((next_ts_ns, idx)));
        }
    }
}

impl Iterator for MergedBatches<'_> {
    type Item = AlignedBatch;

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse((ts_ns, idx)) = self.heap.pop()?;
        debug_assert!(
            self.merger.checkpoint_ts_ns.map_or(true, |cp| ts_ns > cp),
            "merge emitted ts={ts_ns} at or before checkpoint {:?}",
            self.merger.checkpoint_ts_ns
        );
        let mut batch = AlignedBatch::new(ts_ns);
        self.consume(idx, &mut batch);
        while let Some(&Reverse((next_ts_ns, next_idx))) = self.heap.peek() {
            if next_ts_ns != ts_ns {
                break;
            }
            self.heap.pop();
            self.consume(next_idx, &mut batch);
        }
        self.merger.checkpoint_ts_ns = Some(ts_ns);
        Some(batch)
    }
}

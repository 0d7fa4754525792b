use crate::error::ConfigError;
use crate::rolling::RollingCovariance;
use crate::stats::BivariateSums;
use crate::types::{AlignedBatch, AssetId, CorrelationConfig, CorrelationFrame, LagMatrix};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Index-aligned x/y return window for one `(y, x)` pair.
#[derive(Debug, Clone)]
pub struct PairState {
    acc: RollingCovariance,
    last_ts_ns: Option<i64>,
}

impl PairState {
    fn new(window: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            acc: RollingCovariance::new(window)?,
            last_ts_ns: None,
        })
    }

    pub fn count(&self) -> usize {
        self.acc.count()
    }

    pub fn last_ts_ns(&self) -> Option<i64> {
        self.last_ts_ns
    }

    pub fn accumulator(&self) -> &RollingCovariance {
        &self.acc
    }
}

/// Correlation of `x[t - lag]` against `y[t]` over the live window.
///
/// Positive lags mean x leads y. Only the `n - |lag|` overlapping pairs are
/// used; lag 0 reads the running sums directly.
pub fn lagged_correlation(acc: &RollingCovariance, lag: i64, demean: bool) -> Option<f64> {
    let n = acc.count();
    let shift = lag.unsigned_abs() as usize;
    if n < 2 || shift >= n {
        return None;
    }
    let sums = if shift == 0 {
        *acc.sums()
    } else {
        let overlap = n - shift;
        let (x_off, y_off) = if lag > 0 { (0, shift) } else { (shift, 0) };
        BivariateSums::from_pairs((0..overlap).filter_map(|i| {
            let (x, _) = acc.pair(i + x_off)?;
            let (_, y) = acc.pair(i + y_off)?;
            Some((x, y))
        }))
    };
    if demean {
        sums.pearson()
    } else {
        sums.uncentered_corr()
    }
}

#[derive(Debug, Clone)]
pub struct CrossCorrelationEngine {
    window: usize,
    lags: Vec<i64>,
    demean: bool,
    x_assets: Vec<AssetId>,
    y_assets: Vec<AssetId>,
    // keyed (y, x)
    pairs: BTreeMap<(AssetId, AssetId), PairState>,
    last_ts_ns: Option<i64>,
}

impl CrossCorrelationEngine {
    pub fn new(config: &CorrelationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut engine = Self {
            window: config.window,
            lags: config.lag_set().into_iter().collect(),
            demean: config.demean,
            x_assets: Vec::new(),
            y_assets: Vec::new(),
            pairs: BTreeMap::new(),
            last_ts_ns: None,
        };
        engine.extend(config)?;
        Ok(engine)
    }

    /// Adds pair state for assets new to `config`; existing pairs are untouched.
    /// Returns the number of pairs created.
    pub fn extend(&mut self, config: &CorrelationConfig) -> Result<usize, ConfigError> {
        self.x_assets = dedup(&config.x_assets);
        self.y_assets = dedup(&config.y_assets);
        let mut created = 0usize;
        for y in &self.y_assets {
            for x in &self.x_assets {
                let key = (y.clone(), x.clone());
                if self.pairs.contains_key(&key) {
                    continue;
                }
                self.pairs.insert(key, PairState::new(self.window)?);
                created += 1;
            }
        }
        if created > 0 {
            debug!(created, total = self.pairs.len(), "xcorr pair states added");
        }
        Ok(created)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn lags(&self) -> &[i64] {
        &self.lags
    }

    pub fn last_ts_ns(&self) -> Option<i64> {
        self.last_ts_ns
    }

    pub fn pair(&self, y: &str, x: &str) -> Option<&PairState> {
        self.pairs.get(&(y.to_string(), x.to_string()))
    }

    /// Pushes one aligned step into the `(y, x)` pair. Skipped (returns false)
    /// unless both returns are present and finite.
    pub fn fit(
        &mut self,
        y: &str,
        x: &str,
        x_ret: Option<f64>,
        y_ret: Option<f64>,
        ts_ns: i64,
    ) -> bool {
        let Some(state) = self.pairs.get_mut(&(y.to_string(), x.to_string())) else {
            return false;
        };
        fit_pair(state, x_ret, y_ret, ts_ns)
    }

    pub fn fit_batch(&mut self, batch: &AlignedBatch) {
        for ((y, x), state) in self.pairs.iter_mut() {
            fit_pair(state, batch.get(x), batch.get(y), batch.ts_ns);
        }
        self.last_ts_ns = Some(batch.ts_ns);
    }

    pub fn value(&self, y: &str, x: &str, lag: i64) -> Option<f64> {
        let state = self.pair(y, x)?;
        lagged_correlation(&state.acc, lag, self.demean)
    }

    /// Configured lag with the largest absolute correlation; ties go to the
    /// smaller |lag|, then the negative one.
    pub fn peak_lag(&self, y: &str, x: &str) -> Option<(i64, f64)> {
        let mut lags = self.lags.clone();
        lags.sort_by_key(|lag| (lag.unsigned_abs(), *lag));
        let mut best: Option<(i64, f64)> = None;
        for lag in lags {
            let Some(corr) = self.value(y, x, lag) else {
                continue;
            };
            if best.map_or(true, |(_, b)| corr.abs() > b.abs()) {
                best = Some((lag, corr));
            }
        }
        best
    }

    pub fn frame(&self) -> CorrelationFrame {
        let lags = self
            .lags
            .iter()
            .map(|&lag| {
                let values: Vec<Vec<Option<f64>>> = self
                    .x_assets
                    .iter()
                    .map(|x| {
                        self.y_assets
                            .iter()
                            .map(|y| self.value(y, x, lag))
                            .collect::<Vec<_>>()
                    })
                    .collect();
                (
                    lag,
                    LagMatrix {
                        x_assets: self.x_assets.clone(),
                        y_assets: self.y_assets.clone(),
                        values,
                    },
                )
            })
            .collect();
        CorrelationFrame {
            ts_ns: self.last_ts_ns,
            lags,
        }
    }
}

fn fit_pair(state: &mut PairState, x_ret: Option<f64>, y_ret: Option<f64>, ts_ns: i64) -> bool {
    let (Some(x), Some(y)) = (x_ret, y_ret) else {
        return false;
    };
    if !x.is_finite() || !y.is_finite() {
        return false;
    }
    debug_assert!(
        state.last_ts_ns.map_or(true, |last| ts_ns > last),
        "pair fitted out of order: ts={ts_ns}, last={:?}",
        state.last_ts_ns
    );
    state.acc.fit(x, y);
    state.last_ts_ns = Some(ts_ns);
    true
}

fn dedup(assets: &[AssetId]) -> Vec<AssetId> {
    let mut seen = BTreeSet::new();
    assets
        .iter()
        .filter(|asset| seen.insert(asset.as_str()))
        .cloned()
        .collect()
}

use crate::error::ConfigError;
use crate::rolling::{RollingCovariance, RollingLinearRegression, RollingVariance};
use crate::stats::IncrementalMean;
use crate::types::{
    AlignedBatch, AssetId, Benchmark, BetaColumn, BetaConfig, BetaMethod, BetaRow, BetaTable,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BetaEstimate {
    pub covariance: Option<f64>,
    pub regression: Option<f64>,
}

impl BetaEstimate {
    pub fn get(&self, column: BetaColumn) -> Option<f64> {
        match column {
            BetaColumn::Covariance => self.covariance,
            BetaColumn::Regression => self.regression,
        }
    }
}

#[derive(Debug, Clone)]
struct AssetBeta {
    // Present only when the method needs it; decided once at construction.
    cov: Option<RollingCovariance>,
    reg: Option<RollingLinearRegression>,
    // cumulative return mean, only fed when demeaning
    mean: IncrementalMean,
    fitted_since_compute: bool,
    estimate: BetaEstimate,
    computed_ts_ns: Option<i64>,
}

impl AssetBeta {
    fn new(window: usize, method: BetaMethod) -> Result<Self, ConfigError> {
        Ok(Self {
            cov: method
                .uses_covariance()
                .then(|| RollingCovariance::new(window))
                .transpose()?,
            reg: method
                .uses_regression()
                .then(|| RollingLinearRegression::new(window))
                .transpose()?,
            mean: IncrementalMean::default(),
            fitted_since_compute: false,
            estimate: BetaEstimate::default(),
            computed_ts_ns: None,
        })
    }

    fn count(&self) -> usize {
        self.cov
            .as_ref()
            .map(RollingCovariance::count)
            .or_else(|| self.reg.as_ref().map(RollingLinearRegression::count))
            .unwrap_or(0)
    }

    fn is_full(&self) -> bool {
        self.cov.as_ref().map_or(true, RollingCovariance::is_full)
            && self.reg.as_ref().map_or(true, RollingLinearRegression::is_full)
    }
}

/// Rolling beta of every tracked asset against one benchmark.
#[derive(Debug, Clone)]
pub struct BetaEngine {
    window: usize,
    method: BetaMethod,
    demean: bool,
    benchmark: Benchmark,
    bench_var: RollingVariance,
    bench_mean: IncrementalMean,
    order: Vec<AssetId>,
    assets: BTreeMap<AssetId, AssetBeta>,
    last_ts_ns: Option<i64>,
    computed_ts_ns: Option<i64>,
}

impl BetaEngine {
    pub fn new(config: &BetaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut engine = Self {
            window: config.window,
            method: config.method,
            demean: config.demean,
            benchmark: config.benchmark.clone(),
            bench_var: RollingVariance::new(config.window)?,
            bench_mean: IncrementalMean::default(),
            order: Vec::new(),
            assets: BTreeMap::new(),
            last_ts_ns: None,
            computed_ts_ns: None,
        };
        engine.extend(config)?;
        Ok(engine)
    }

    /// Adds accumulators for assets new to `config`; existing ones are untouched.
    pub fn extend(&mut self, config: &BetaConfig) -> Result<Vec<AssetId>, ConfigError> {
        let tracked = config.tracked_assets();
        let mut added = Vec::new();
        for asset in &tracked {
            if self.assets.contains_key(asset) {
                continue;
            }
            self.assets
                .insert(asset.clone(), AssetBeta::new(self.window, self.method)?);
            added.push(asset.clone());
        }
        self.order = config
            .universe
            .iter()
            .filter(|asset| tracked.contains(*asset))
            .fold(Vec::new(), |mut order, asset| {
                if !order.contains(asset) {
                    order.push(asset.clone());
                }
                order
            });
        if !added.is_empty() {
            debug!(added = added.len(), total = self.assets.len(), "beta accumulators added");
        }
        Ok(added)
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn method(&self) -> BetaMethod {
        self.method
    }

    pub fn last_ts_ns(&self) -> Option<i64> {
        self.last_ts_ns
    }

    /// Benchmark return for this step: the single asset's return, or the mean
    /// over whichever aggregate components are present.
    pub fn benchmark_return(&self, batch: &AlignedBatch) -> Option<f64> {
        match &self.benchmark {
            Benchmark::Single(asset) => batch.get(asset).filter(|v| v.is_finite()),
            Benchmark::Aggregate(components) => {
                let (sum, n) = components
                    .iter()
                    .filter_map(|asset| batch.get(asset))
                    .filter(|v| v.is_finite())
                    .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
                (n > 0).then(|| sum / n as f64)
            }
        }
    }

    pub fn fit_batch(&mut self, batch: &AlignedBatch) {
        let Some(bench) = self.benchmark_return(batch) else {
            trace!(ts_ns = batch.ts_ns, "no benchmark observation, step skipped");
            return;
        };
        let centered = self.demean && matches!(self.benchmark, Benchmark::Single(_));
        let bench_for_cov = if centered {
            self.bench_mean.update(bench);
            bench - self.bench_mean.value().unwrap_or(0.0)
        } else {
            bench
        };
        self.bench_var.fit(bench_for_cov);

        for (asset, state) in self.assets.iter_mut() {
            let Some(ret) = batch.get(asset).filter(|v| v.is_finite()) else {
                continue;
            };
            let ret_for_cov = if centered {
                state.mean.update(ret);
                ret - state.mean.value().unwrap_or(0.0)
            } else {
                ret
            };
            if let Some(cov) = state.cov.as_mut() {
                cov.fit(bench_for_cov, ret_for_cov);
            }
            if let Some(reg) = state.reg.as_mut() {
                reg.fit(ret, bench);
            }
            state.fitted_since_compute = true;
        }
        self.last_ts_ns = Some(batch.ts_ns);
    }

    /// Refreshes cached betas for assets fitted since the last call whose
    /// windows are full. Others keep their previous estimate.
    pub fn recompute(&mut self) {
        let bench_var = self.bench_var.value();
        let mut refreshed = 0usize;
        for state in self.assets.values_mut() {
            if !state.fitted_since_compute || !state.is_full() {
                continue;
            }
            let covariance = state.cov.as_ref().and_then(|cov| {
                let cov_xy = cov.value()?.cov_xy;
                let var = bench_var?;
                crate::stats::finite(cov_xy / var)
            });
            let regression = state
                .reg
                .as_ref()
                .and_then(|reg| reg.value())
                .map(|fit| fit.slope);
            state.estimate = BetaEstimate {
                covariance,
                regression,
            };
            state.computed_ts_ns = self.last_ts_ns;
            state.fitted_since_compute = false;
            refreshed += 1;
        }
        if refreshed > 0 {
            self.computed_ts_ns = self.last_ts_ns;
        }
    }

    pub fn estimate(&self, asset: &str) -> Option<BetaEstimate> {
        self.assets.get(asset).map(|state| state.estimate)
    }

    /// Timestamp of the step `asset`'s cached estimate was computed at.
    pub fn computed_ts_ns(&self, asset: &str) -> Option<i64> {
        self.assets.get(asset)?.computed_ts_ns
    }

    pub fn count(&self, asset: &str) -> Option<usize> {
        self.assets.get(asset).map(AssetBeta::count)
    }

    pub fn benchmark_count(&self) -> usize {
        self.bench_var.count()
    }

    pub fn benchmark_variance(&self) -> Option<f64> {
        self.bench_var.value()
    }

    pub fn table(&self) -> BetaTable {
        let columns = self.method.columns();
        let rows = self
            .order
            .iter()
            .map(|asset| {
                let estimate = self.estimate(asset).unwrap_or_default();
                BetaRow {
                    asset: asset.clone(),
                    values: columns.iter().map(|c| estimate.get(*c)).collect(),
                }
            })
            .collect();
        BetaTable {
            ts_ns: self.computed_ts_ns,
            columns,
            rows,
        }
    }
}

//! Caller-owned engine handle. Detects configuration drift through a
//! fingerprint and rebuilds exactly the affected state.

use crate::beta::BetaEngine;
use crate::error::{ConfigError, EngineError};
use crate::merge::{check_strictly_increasing, ChronologicalMerger};
use crate::returns::ReturnTransformer;
use crate::xcorr::CrossCorrelationEngine;
use crate::types::{
    AlignedBatch, AssetId, Benchmark, BetaConfig, BetaMethod, BetaTable, CorrelationConfig,
    CorrelationFrame, PriceSample, ReturnSample,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Everything except the asset universe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EngineParams {
    Correlation {
        window: usize,
        lags: BTreeSet<i64>,
        demean: bool,
        period: usize,
        timeframe_ns: i64,
    },
    Beta {
        window: usize,
        method: BetaMethod,
        demean: bool,
        benchmark: Benchmark,
        period: usize,
        timeframe_ns: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub params: EngineParams,
    /// Asset sets per role (`x`/`y` for correlation, `beta` for beta).
    pub roles: BTreeMap<&'static str, BTreeSet<AssetId>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    None,
    /// Same parameters, every role set is a superset of the cached one.
    UniverseGrew,
    Full,
}

impl Fingerprint {
    pub fn drift_to(&self, next: &Fingerprint) -> Drift {
        if self.params != next.params || self.roles.len() != next.roles.len() {
            return Drift::Full;
        }
        let mut grew = false;
        for (role, assets) in &self.roles {
            let Some(next_assets) = next.roles.get(role) else {
                return Drift::Full;
            };
            if !assets.is_subset(next_assets) {
                return Drift::Full;
            }
            grew |= next_assets.len() > assets.len();
        }
        if grew {
            Drift::UniverseGrew
        } else {
            Drift::None
        }
    }
}

pub trait EngineConfig {
    fn validate(&self) -> Result<(), ConfigError>;
    fn fingerprint(&self) -> Fingerprint;
    fn window(&self) -> usize;
    fn period(&self) -> usize;
    fn timeframe_ns(&self) -> i64;
    /// Every asset whose prices must be transformed.
    fn input_assets(&self) -> BTreeSet<AssetId>;
}

impl EngineConfig for CorrelationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        CorrelationConfig::validate(self)
    }

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            params: EngineParams::Correlation {
                window: self.window,
                lags: self.lag_set(),
                demean: self.demean,
                period: self.period,
                timeframe_ns: self.timeframe_ns,
            },
            roles: BTreeMap::from([("x", self.x_set()), ("y", self.y_set())]),
        }
    }

    fn window(&self) -> usize {
        self.window
    }

    fn period(&self) -> usize {
        self.period
    }

    fn timeframe_ns(&self) -> i64 {
        self.timeframe_ns
    }

    fn input_assets(&self) -> BTreeSet<AssetId> {
        self.x_assets
            .iter()
            .chain(self.y_assets.iter())
            .cloned()
            .collect()
    }
}

impl EngineConfig for BetaConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        BetaConfig::validate(self)
    }

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            params: EngineParams::Beta {
                window: self.window,
                method: self.method,
                demean: self.demean,
                benchmark: self.benchmark.clone(),
                period: self.period,
                timeframe_ns: self.timeframe_ns,
            },
            roles: BTreeMap::from([("beta", self.tracked_assets())]),
        }
    }

    fn window(&self) -> usize {
        self.window
    }

    fn period(&self) -> usize {
        self.period
    }

    fn timeframe_ns(&self) -> i64 {
        self.timeframe_ns
    }

    fn input_assets(&self) -> BTreeSet<AssetId> {
        self.universe.iter().cloned().collect()
    }
}

pub trait StatsEngine: Sized {
    type Config: EngineConfig;
    type Output;

    fn from_config(config: &Self::Config) -> Result<Self, ConfigError>;
    /// Partial reinit: add state for new assets only.
    fn extend_universe(&mut self, config: &Self::Config) -> Result<(), ConfigError>;
    fn fit_batch(&mut self, batch: &AlignedBatch);
    fn output(&mut self) -> Self::Output;
}

impl StatsEngine for CrossCorrelationEngine {
    type Config = CorrelationConfig;
    type Output = CorrelationFrame;

    fn from_config(config: &Self::Config) -> Result<Self, ConfigError> {
        Self::new(config)
    }

    fn extend_universe(&mut self, config: &Self::Config) -> Result<(), ConfigError> {
        self.extend(config).map(|_| ())
    }

    fn fit_batch(&mut self, batch: &AlignedBatch) {
        CrossCorrelationEngine::fit_batch(self, batch)
    }

    fn output(&mut self) -> Self::Output {
        self.frame()
    }
}

impl StatsEngine for BetaEngine {
    type Config = BetaConfig;
    type Output = BetaTable;

    fn from_config(config: &Self::Config) -> Result<Self, ConfigError> {
        Self::new(config)
    }

    fn extend_universe(&mut self, config: &Self::Config) -> Result<(), ConfigError> {
        self.extend(config).map(|_| ())
    }

    fn fit_batch(&mut self, batch: &AlignedBatch) {
        BetaEngine::fit_batch(self, batch)
    }

    fn output(&mut self) -> Self::Output {
        self.recompute();
        self.table()
    }
}

#[derive(Debug)]
struct CacheState<E> {
    fingerprint: Fingerprint,
    engine: E,
    transformers: BTreeMap<AssetId, ReturnTransformer>,
    merger: ChronologicalMerger,
}

impl<E: StatsEngine> CacheState<E> {
    fn build(config: &E::Config) -> Result<Self, ConfigError> {
        let mut transformers = BTreeMap::new();
        add_transformers(&mut transformers, config)?;
        Ok(Self {
            fingerprint: config.fingerprint(),
            engine: E::from_config(config)?,
            transformers,
            merger: ChronologicalMerger::new(config.window(), config.timeframe_ns())?,
        })
    }
}

fn add_transformers<C: EngineConfig>(
    transformers: &mut BTreeMap<AssetId, ReturnTransformer>,
    config: &C,
) -> Result<usize, ConfigError> {
    let mut added = 0usize;
    for asset in config.input_assets() {
        if transformers.contains_key(&asset) {
            continue;
        }
        let transformer =
            ReturnTransformer::new(config.period())?.with_timeframe(config.timeframe_ns())?;
        transformers.insert(asset, transformer);
        added += 1;
    }
    Ok(added)
}

/// Engine state held by one caller across calls.
#[derive(Debug)]
pub struct EngineCache<E> {
    state: Option<CacheState<E>>,
}

pub type CorrelationCache = EngineCache<CrossCorrelationEngine>;
pub type BetaCache = EngineCache<BetaEngine>;

impl<E> Default for EngineCache<E> {
    fn default() -> Self {
        Self { state: None }
    }
}

impl<E: StatsEngine> EngineCache<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine(&self) -> Option<&E> {
        self.state.as_ref().map(|s| &s.engine)
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.state.as_ref().map(|s| &s.fingerprint)
    }

    pub fn checkpoint(&self) -> Option<i64> {
        self.state.as_ref().and_then(|s| s.merger.checkpoint())
    }

    /// Validates `config` and brings cached state in line with it.
    pub fn prepare(&mut self, config: &E::Config) -> Result<Drift, ConfigError> {
        self.sync(config).map(|(drift, _)| drift)
    }

    fn sync(&mut self, config: &E::Config) -> Result<(Drift, &mut CacheState<E>), ConfigError> {
        config.validate()?;
        let next = config.fingerprint();
        let drift = match &self.state {
            Some(state) => state.fingerprint.drift_to(&next),
            None => Drift::Full,
        };
        let state = match (self.state.take(), &drift) {
            (Some(state), Drift::None) => self.state.insert(state),
            (Some(mut state), Drift::UniverseGrew) => {
                state.engine.extend_universe(config)?;
                let added = add_transformers(&mut state.transformers, config)?;
                state.fingerprint = next;
                debug!(added, "engine cache extended for grown universe");
                self.state.insert(state)
            }
            _ => {
                let state = CacheState::build(config)?;
                info!(window = config.window(), "engine cache reinitialized");
                self.state.insert(state)
            }
        };
        Ok((drift, state))
    }

    /// Feeds the new price tails and returns up-to-date statistics.
    ///
    /// Each asset's transformer skips prices at or before the last one it saw,
    /// so callers may pass overlapping tails. A tail that goes backwards
    /// within itself is rejected before any state is touched.
    pub fn update(
        &mut self,
        config: &E::Config,
        prices: &BTreeMap<AssetId, Vec<PriceSample>>,
    ) -> Result<E::Output, EngineError> {
        let (_, state) = self.sync(config)?;
        let CacheState {
            engine,
            transformers,
            merger,
            ..
        } = state;

        for (asset, tail) in prices {
            if transformers.contains_key(asset) {
                check_strictly_increasing(asset, tail.iter().map(|s| s.ts_ns))?;
            }
        }

        let mut returns: BTreeMap<AssetId, Vec<ReturnSample>> = BTreeMap::new();
        for (asset, transformer) in transformers.iter_mut() {
            let Some(tail) = prices.get(asset) else {
                continue;
            };
            let samples: Vec<ReturnSample> = transformer.transform(tail.iter().copied()).collect();
            if !samples.is_empty() {
                returns.insert(asset.clone(), samples);
            }
        }

        let mut batches = 0usize;
        for batch in merger.merge(&returns)? {
            engine.fit_batch(&batch);
            batches += 1;
        }
        debug!(batches, checkpoint = ?merger.checkpoint(), "engine cache updated");
        Ok(engine.output())
    }
}

#[cfg(test)]
mod tests {
    use super::{Drift, EngineConfig};
    use crate::types::{Benchmark, BetaConfig, BetaMethod, CorrelationConfig};

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn lag_order_does_not_change_fingerprint() {
        let a = CorrelationConfig::new(10, vec![1, 0, -1], ids(&["X"]), ids(&["Y"]));
        let b = CorrelationConfig::new(10, vec![-1, 0, 1, 0], ids(&["X"]), ids(&["Y"]));
        assert_eq!(a.fingerprint().drift_to(&b.fingerprint()), Drift::None);
    }

    #[test]
    fn growth_and_shrink_are_classified() {
        let base = CorrelationConfig::new(10, vec![0], ids(&["X"]), ids(&["Y"]));
        let grown = CorrelationConfig::new(10, vec![0], ids(&["X", "X2"]), ids(&["Y"]));
        assert_eq!(
            base.fingerprint().drift_to(&grown.fingerprint()),
            Drift::UniverseGrew
        );
        assert_eq!(grown.fingerprint().drift_to(&base.fingerprint()), Drift::Full);
        let rewindowed = CorrelationConfig::new(11, vec![0], ids(&["X", "X2"]), ids(&["Y"]));
        assert_eq!(
            grown.fingerprint().drift_to(&rewindowed.fingerprint()),
            Drift::Full
        );
    }

    #[test]
    fn benchmark_change_forces_full_reinit() {
        let universe = ids(&["A", "B", "C"]);
        let a = BetaConfig::new(5, BetaMethod::Both, Benchmark::Single("A".into()), universe.clone());
        let b = BetaConfig::new(5, BetaMethod::Both, Benchmark::Single("B".into()), universe);
        assert_eq!(a.fingerprint().drift_to(&b.fingerprint()), Drift::Full);
    }
}

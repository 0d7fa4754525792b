use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type AssetId = String;

/// One minute in nanoseconds; the default sampling interval.
pub const DEFAULT_TIMEFRAME_NS: i64 = 60_000_000_000;

/// Raw close sample from the candle store. `close: None` marks a gap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub ts_ns: i64,
    pub close: Option<f64>,
}

impl PriceSample {
    pub fn new(ts_ns: i64, close: f64) -> Self {
        Self {
            ts_ns,
            close: Some(close),
        }
    }

    pub fn missing(ts_ns: i64) -> Self {
        Self { ts_ns, close: None }
    }
}

/// Normalized return ratio; `value: None` is "no observation", never zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnSample {
    pub ts_ns: i64,
    pub value: Option<f64>,
}

impl ReturnSample {
    pub fn new(ts_ns: i64, value: f64) -> Self {
        Self {
            ts_ns,
            value: Some(value),
        }
    }

    pub fn missing(ts_ns: i64) -> Self {
        Self { ts_ns, value: None }
    }
}

/// All observations sharing one timestamp. May cover only part of the universe.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignedBatch {
    pub ts_ns: i64,
    pub returns: BTreeMap<AssetId, f64>,
}

impl AlignedBatch {
    pub fn new(ts_ns: i64) -> Self {
        Self {
            ts_ns,
            returns: BTreeMap::new(),
        }
    }

    pub fn with(mut self, asset: &str, value: f64) -> Self {
        self.returns.insert(asset.to_string(), value);
        self
    }

    #[inline]
    pub fn get(&self, asset: &str) -> Option<f64> {
        self.returns.get(asset).copied()
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}

fn default_period() -> usize {
    1
}

fn default_timeframe_ns() -> i64 {
    DEFAULT_TIMEFRAME_NS
}

fn validate_sampling(window: usize, period: usize, timeframe_ns: i64) -> Result<(), ConfigError> {
    if window == 0 {
        return Err(ConfigError::ZeroWindow);
    }
    if period == 0 {
        return Err(ConfigError::ZeroPeriod);
    }
    if timeframe_ns <= 0 {
        return Err(ConfigError::InvalidTimeframe { timeframe_ns });
    }
    Ok(())
}

fn parse_json<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, ConfigError> {
    serde_json::from_str(raw).map_err(|err| ConfigError::InvalidJson {
        reason: err.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    pub window: usize,
    pub lags: Vec<i64>,
    #[serde(default)]
    pub demean: bool,
    pub x_assets: Vec<AssetId>,
    pub y_assets: Vec<AssetId>,
    /// Return look-back in samples.
    #[serde(default = "default_period")]
    pub period: usize,
    #[serde(default = "default_timeframe_ns")]
    pub timeframe_ns: i64,
}

impl CorrelationConfig {
    pub fn new(
        window: usize,
        lags: Vec<i64>,
        x_assets: Vec<AssetId>,
        y_assets: Vec<AssetId>,
    ) -> Self {
        Self {
            window,
            lags,
            demean: false,
            x_assets,
            y_assets,
            period: default_period(),
            timeframe_ns: default_timeframe_ns(),
        }
    }

    pub fn with_demean(mut self, demean: bool) -> Self {
        self.demean = demean;
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = parse_json(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_sampling(self.window, self.period, self.timeframe_ns)?;
        if self.lags.is_empty() {
            return Err(ConfigError::EmptyLags);
        }
        if self.x_assets.is_empty() {
            return Err(ConfigError::EmptyUniverse { role: "x" });
        }
        if self.y_assets.is_empty() {
            return Err(ConfigError::EmptyUniverse { role: "y" });
        }
        Ok(())
    }

    pub fn lag_set(&self) -> BTreeSet<i64> {
        self.lags.iter().copied().collect()
    }

    pub fn x_set(&self) -> BTreeSet<AssetId> {
        self.x_assets.iter().cloned().collect()
    }

    pub fn y_set(&self) -> BTreeSet<AssetId> {
        self.y_assets.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetaMethod {
    Covariance,
    Regression,
    Both,
}

impl BetaMethod {
    pub fn uses_covariance(self) -> bool {
        matches!(self, Self::Covariance | Self::Both)
    }

    pub fn uses_regression(self) -> bool {
        matches!(self, Self::Regression | Self::Both)
    }

    pub fn columns(self) -> Vec<BetaColumn> {
        match self {
            Self::Covariance => vec![BetaColumn::Covariance],
            Self::Regression => vec![BetaColumn::Regression],
            Self::Both => vec![BetaColumn::Covariance, BetaColumn::Regression],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Benchmark {
    Single(AssetId),
    /// Per-step mean over whichever components have an observation.
    Aggregate(BTreeSet<AssetId>),
}

impl Benchmark {
    pub fn contains(&self, asset: &str) -> bool {
        match self {
            Self::Single(id) => id == asset,
            Self::Aggregate(ids) => ids.contains(asset),
        }
    }

    pub fn components(&self) -> Vec<&AssetId> {
        match self {
            Self::Single(id) => vec![id],
            Self::Aggregate(ids) => ids.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetaConfig {
    pub window: usize,
    pub method: BetaMethod,
    #[serde(default)]
    pub demean: bool,
    pub benchmark: Benchmark,
    /// Full universe including the benchmark components.
    pub universe: Vec<AssetId>,
    #[serde(default = "default_period")]
    pub period: usize,
    #[serde(default = "default_timeframe_ns")]
    pub timeframe_ns: i64,
}

impl BetaConfig {
    pub fn new(
        window: usize,
        method: BetaMethod,
        benchmark: Benchmark,
        universe: Vec<AssetId>,
    ) -> Self {
        Self {
            window,
            method,
            demean: false,
            benchmark,
            universe,
            period: default_period(),
            timeframe_ns: default_timeframe_ns(),
        }
    }

    pub fn with_demean(mut self, demean: bool) -> Self {
        self.demean = demean;
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = parse_json(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_sampling(self.window, self.period, self.timeframe_ns)?;
        if self.universe.is_empty() {
            return Err(ConfigError::EmptyUniverse { role: "beta" });
        }
        if let Benchmark::Aggregate(ids) = &self.benchmark {
            if ids.is_empty() {
                return Err(ConfigError::EmptyBenchmark);
            }
        }
        for component in self.benchmark.components() {
            if !self.universe.contains(component) {
                return Err(ConfigError::UnknownBenchmarkAsset {
                    asset: component.clone(),
                });
            }
        }
        if self.tracked_assets().is_empty() {
            return Err(ConfigError::EmptyUniverse { role: "beta" });
        }
        Ok(())
    }

    /// Universe minus the benchmark components.
    pub fn tracked_assets(&self) -> BTreeSet<AssetId> {
        self.universe
            .iter()
            .filter(|asset| !self.benchmark.contains(asset))
            .cloned()
            .collect()
    }
}

/// Correlations for one lag. Rows are x assets, columns are y assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagMatrix {
    pub x_assets: Vec<AssetId>,
    pub y_assets: Vec<AssetId>,
    /// `None` serializes as `null`.
    pub values: Vec<Vec<Option<f64>>>,
}

impl LagMatrix {
    pub fn get(&self, x: &str, y: &str) -> Option<f64> {
        let row = self.x_assets.iter().position(|id| id == x)?;
        let col = self.y_assets.iter().position(|id| id == y)?;
        self.values[row][col]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationFrame {
    /// Timestamp of the last fitted batch.
    pub ts_ns: Option<i64>,
    pub lags: BTreeMap<i64, LagMatrix>,
}

impl CorrelationFrame {
    pub fn get(&self, lag: i64, x: &str, y: &str) -> Option<f64> {
        self.lags.get(&lag)?.get(x, y)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetaColumn {
    Covariance,
    Regression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetaRow {
    pub asset: AssetId,
    /// Aligned with `BetaTable::columns`.
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetaTable {
    pub ts_ns: Option<i64>,
    pub columns: Vec<BetaColumn>,
    pub rows: Vec<BetaRow>,
}

impl BetaTable {
    pub fn get(&self, asset: &str, column: BetaColumn) -> Option<f64> {
        let col = self.columns.iter().position(|c| *c == column)?;
        let row = self.rows.iter().find(|row| row.asset == asset)?;
        row.values[col]
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

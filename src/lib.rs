pub mod beta;
pub mod cache;
pub mod error;
pub mod merge;
pub mod returns;
pub mod rolling;
pub mod state;
pub mod stats;
pub mod types;
pub mod xcorr;

pub use beta::{BetaEngine, BetaEstimate};
pub use cache::{
    BetaCache, CorrelationCache, Drift, EngineCache, EngineConfig, EngineParams, Fingerprint,
    StatsEngine,
};
pub use error::{ConfigError, EngineError, MergeError};
pub use merge::{ChronologicalMerger, MergedBatches};
pub use returns::{price_ratio, ReturnTransformer};
pub use rolling::{
    CovarianceMatrix, RegressionFit, RollingCovariance, RollingLinearRegression, RollingVariance,
};
pub use state::RingBuffer;
pub use stats::IncrementalMean;
pub use types::{
    AlignedBatch, AssetId, Benchmark, BetaColumn, BetaConfig, BetaMethod, BetaRow, BetaTable,
    CorrelationConfig, CorrelationFrame, LagMatrix, PriceSample, ReturnSample,
    DEFAULT_TIMEFRAME_NS,
};
pub use xcorr::{lagged_correlation, CrossCorrelationEngine, PairState};

#[cfg(test)]
mod tests;

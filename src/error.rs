use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("window must be > 0")]
    ZeroWindow,
    #[error("ring buffer capacity must be > 0")]
    ZeroCapacity,
    #[error("return period must be > 0")]
    ZeroPeriod,
    #[error("timeframe must be positive, got {timeframe_ns}ns")]
    InvalidTimeframe { timeframe_ns: i64 },
    #[error("lag set is empty")]
    EmptyLags,
    #[error("{role} universe is empty")]
    EmptyUniverse { role: &'static str },
    #[error("benchmark asset `{asset}` is not in the universe")]
    UnknownBenchmarkAsset { asset: String },
    #[error("aggregate benchmark has no components")]
    EmptyBenchmark,
    #[error("invalid config json: {reason}")]
    InvalidJson { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("series `{asset}` is not strictly increasing: ts={ts_ns} after {prev_ts_ns}")]
    NonMonotonicSeries {
        asset: String,
        prev_ts_ns: i64,
        ts_ns: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Merge(#[from] MergeError),
}

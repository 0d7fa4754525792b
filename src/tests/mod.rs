use crate::types::{AssetId, CorrelationConfig, PriceSample};
use std::collections::BTreeMap;

mod cache;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9
}

fn ids(names: &[&str]) -> Vec<AssetId> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Closes sampled every nanosecond starting at `start_ts_ns`.
fn prices(start_ts_ns: i64, closes: &[f64]) -> Vec<PriceSample> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceSample::new(start_ts_ns + i as i64, close))
        .collect()
}

fn price_map(entries: Vec<(&str, Vec<PriceSample>)>) -> BTreeMap<AssetId, Vec<PriceSample>> {
    entries
        .into_iter()
        .map(|(asset, samples)| (asset.to_string(), samples))
        .collect()
}

fn correlation_config(window: usize, lags: Vec<i64>, x: &[&str], y: &[&str]) -> CorrelationConfig {
    CorrelationConfig {
        timeframe_ns: 1,
        demean: true,
        ..CorrelationConfig::new(window, lags, ids(x), ids(y))
    }
}

const X_CLOSES: [f64; 7] = [100.0, 101.0, 99.0, 102.0, 98.0, 103.0, 97.0];
const Y_CLOSES: [f64; 7] = [50.0, 50.5, 50.2, 51.0, 49.0, 52.0, 48.0];

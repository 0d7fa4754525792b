#![allow(dead_code)]

use stats_engine::{AlignedBatch, AssetId, PriceSample};
use std::collections::BTreeMap;

pub const TOL: f64 = 1e-9;

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOL
}

pub fn ids(names: &[&str]) -> Vec<AssetId> {
    names.iter().map(|s| s.to_string()).collect()
}

/// One aligned step; `None` entries are left out of the batch.
pub fn batch(ts_ns: i64, entries: &[(&str, Option<f64>)]) -> AlignedBatch {
    entries
        .iter()
        .fold(AlignedBatch::new(ts_ns), |batch, &(asset, value)| match value {
            Some(v) => batch.with(asset, v),
            None => batch,
        })
}

/// Closes on a fixed grid of `timeframe_ns` starting at zero.
pub fn price_series(timeframe_ns: i64, closes: &[f64]) -> Vec<PriceSample> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceSample::new(i as i64 * timeframe_ns, close))
        .collect()
}

pub fn price_map(entries: Vec<(&str, Vec<PriceSample>)>) -> BTreeMap<AssetId, Vec<PriceSample>> {
    entries
        .into_iter()
        .map(|(asset, samples)| (asset.to_string(), samples))
        .collect()
}

/// Sample variance by a fresh two-pass scan.
pub fn scan_variance(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let m2: f64 = xs.iter().map(|x| (x - mean) * (x - mean)).sum();
    Some(m2 / (n - 1.0))
}

/// Sample covariance by a fresh two-pass scan.
pub fn scan_covariance(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let c: f64 = pairs.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    Some(c / (n - 1.0))
}

/// Least squares `(intercept, slope)` of y on x by a fresh two-pass scan.
/// `None` unless Σ(x - x̄)² exceeds `min_spread`.
pub fn scan_regression(pairs: &[(f64, f64)], min_spread: f64) -> Option<(f64, f64)> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = pairs.iter().map(|(x, _)| (x - mean_x) * (x - mean_x)).sum();
    if sxx <= min_spread {
        return None;
    }
    let sxy: f64 = pairs.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    let slope = sxy / sxx;
    Some((mean_y - slope * mean_x, slope))
}

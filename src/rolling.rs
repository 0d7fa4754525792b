//! Fixed-window accumulators. Each `fit` subtracts the evicted sample's
//! contribution before adding the new one, so the running sums always equal
//! the sums over the live window.

use crate::error::ConfigError;
use crate::state::RingBuffer;
use crate::stats::{BivariateSums, UnivariateSums};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct RollingVariance {
    ring: RingBuffer<f64>,
    sums: UnivariateSums,
}

impl RollingVariance {
    pub fn new(window: usize) -> Result<Self, ConfigError> {
        if window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(Self {
            ring: RingBuffer::new(window)?,
            sums: UnivariateSums::default(),
        })
    }

    pub fn fit(&mut self, x: f64) {
        debug_assert!(x.is_finite(), "non-finite sample reached RollingVariance");
        if let Some(old) = self.ring.push(x) {
            self.sums.remove(old);
        }
        self.sums.add(x);
    }

    /// Sample variance of a full window; `None` while filling or when constant.
    pub fn value(&self) -> Option<f64> {
        if !self.ring.is_full() {
            return None;
        }
        self.sums.sample_variance()
    }

    pub fn mean(&self) -> Option<f64> {
        self.sums.mean()
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn window(&self) -> usize {
        self.ring.capacity()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub fn sums(&self) -> &UnivariateSums {
        &self.sums
    }

    pub fn iter_chronological(&self) -> impl Iterator<Item = f64> + '_ {
        self.ring.iter_chronological().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CovarianceMatrix {
    pub var_x: f64,
    pub cov_xy: f64,
    pub var_y: f64,
}

impl CovarianceMatrix {
    pub fn as_array(&self) -> [[f64; 2]; 2] {
        [[self.var_x, self.cov_xy], [self.cov_xy, self.var_y]]
    }
}

/// Two-variable accumulator over index-aligned `(x, y)` pairs.
#[derive(Debug, Clone)]
pub struct RollingCovariance {
    ring: RingBuffer<(f64, f64)>,
    sums: BivariateSums,
}

impl RollingCovariance {
    pub fn new(window: usize) -> Result<Self, ConfigError> {
        if window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(Self {
            ring: RingBuffer::new(window)?,
            sums: BivariateSums::default(),
        })
    }

    pub fn fit(&mut self, x: f64, y: f64) {
        debug_assert!(
            x.is_finite() && y.is_finite(),
            "non-finite pair reached RollingCovariance"
        );
        if let Some((old_x, old_y)) = self.ring.push((x, y)) {
            self.sums.remove(old_x, old_y);
        }
        self.sums.add(x, y);
    }

    pub fn value(&self) -> Option<CovarianceMatrix> {
        if !self.ring.is_full() {
            return None;
        }
        let (var_x, cov_xy, var_y) = self.sums.sample_covariance()?;
        Some(CovarianceMatrix {
            var_x,
            cov_xy,
            var_y,
        })
    }

    /// Pearson correlation of a full window.
    pub fn correlation(&self) -> Option<f64> {
        if !self.ring.is_full() {
            return None;
        }
        self.sums.pearson()
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn window(&self) -> usize {
        self.ring.capacity()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub fn sums(&self) -> &BivariateSums {
        &self.sums
    }

    pub fn mean_x(&self) -> Option<f64> {
        self.sums.mean_x()
    }

    pub fn mean_y(&self) -> Option<f64> {
        self.sums.mean_y()
    }

    /// Pair at chronological position `idx`.
    #[inline]
    pub fn pair(&self, idx: usize) -> Option<(f64, f64)> {
        self.ring.get(idx).copied()
    }

    pub fn iter_chronological(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.ring.iter_chronological().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionFit {
    pub intercept: f64,
    pub slope: f64,
}

/// Least squares of a response on one predictor over the window.
#[derive(Debug, Clone)]
pub struct RollingLinearRegression {
    // Stored as (y, x); sums are kept in (x, y) order.
    ring: RingBuffer<(f64, f64)>,
    sums: BivariateSums,
}

impl RollingLinearRegression {
    pub fn new(window: usize) -> Result<Self, ConfigError> {
        if window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(Self {
            ring: RingBuffer::new(window)?,
            sums: BivariateSums::default(),
        })
    }

    pub fn fit(&mut self, y: f64, x: f64) {
        debug_assert!(
            x.is_finite() && y.is_finite(),
            "non-finite pair reached RollingLinearRegression"
        );
        if let Some((old_y, old_x)) = self.ring.push((y, x)) {
            self.sums.remove(old_x, old_y);
        }
        self.sums.add(x, y);
    }

    /// `None` while filling or when the predictor is (near) constant.
    pub fn value(&self) -> Option<RegressionFit> {
        if !self.ring.is_full() {
            return None;
        }
        let (intercept, slope) = self.sums.regression()?;
        Some(RegressionFit { intercept, slope })
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn window(&self) -> usize {
        self.ring.capacity()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub fn sums(&self) -> &BivariateSums {
        &self.sums
    }

    /// `(y, x)` pairs oldest first.
    pub fn iter_chronological(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.ring.iter_chronological().copied()
    }
}

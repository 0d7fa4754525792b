//! Running sums behind the rolling accumulators and the lagged correlation scan.

/// Centered second-moment numerators at or below this are treated as degenerate.
pub const VAR_NUM_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UnivariateSums {
    pub n: usize,
    pub sum: f64,
    pub sum_sq: f64,
}

impl UnivariateSums {
    #[inline]
    pub fn add(&mut self, x: f64) {
        self.n += 1;
        self.sum += x;
        self.sum_sq += x * x;
    }

    #[inline]
    pub fn remove(&mut self, x: f64) {
        debug_assert!(self.n > 0, "remove from empty sums");
        self.n -= 1;
        self.sum -= x;
        self.sum_sq -= x * x;
    }

    #[inline]
    pub fn mean(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / self.n as f64)
    }

    /// Σx² − (Σx)²/n, clamped at zero.
    #[inline]
    pub fn var_num(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        (self.sum_sq - (self.sum * self.sum) / self.n as f64).max(0.0)
    }

    /// Sample variance; `None` below two points or when degenerate.
    pub fn sample_variance(&self) -> Option<f64> {
        if self.n < 2 {
            return None;
        }
        let m2 = self.var_num();
        if m2 <= VAR_NUM_EPS {
            return None;
        }
        Some(m2 / (self.n - 1) as f64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BivariateSums {
    pub n: usize,
    pub sum_x: f64,
    pub sum_y: f64,
    pub sum_xx: f64,
    pub sum_yy: f64,
    pub sum_xy: f64,
}

impl BivariateSums {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut sums = Self::default();
        for (x, y) in pairs {
            sums.add(x, y);
        }
        sums
    }

    #[inline]
    pub fn add(&mut self, x: f64, y: f64) {
        self.n += 1;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_yy += y * y;
        self.sum_xy += x * y;
    }

    #[inline]
    pub fn remove(&mut self, x: f64, y: f64) {
        debug_assert!(self.n > 0, "remove from empty sums");
        self.n -= 1;
        self.sum_x -= x;
        self.sum_y -= y;
        self.sum_xx -= x * x;
        self.sum_yy -= y * y;
        self.sum_xy -= x * y;
    }

    #[inline]
    fn nf(&self) -> f64 {
        self.n as f64
    }

    pub fn mean_x(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum_x / self.nf())
    }

    pub fn mean_y(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum_y / self.nf())
    }

    #[inline]
    pub fn cov_num(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.sum_xy - (self.sum_x * self.sum_y) / self.nf()
    }

    #[inline]
    pub fn var_x_num(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        (self.sum_xx - (self.sum_x * self.sum_x) / self.nf()).max(0.0)
    }

    #[inline]
    pub fn var_y_num(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        (self.sum_yy - (self.sum_y * self.sum_y) / self.nf()).max(0.0)
    }

    /// `(var_x, cov_xy, var_y)` with the n−1 correction.
    pub fn sample_covariance(&self) -> Option<(f64, f64, f64)> {
        if self.n < 2 {
            return None;
        }
        let denom = (self.n - 1) as f64;
        Some((
            self.var_x_num() / denom,
            self.cov_num() / denom,
            self.var_y_num() / denom,
        ))
    }

    pub fn pearson(&self) -> Option<f64> {
        if self.n < 2 {
            return None;
        }
        let var_x = self.var_x_num();
        let var_y = self.var_y_num();
        if var_x <= VAR_NUM_EPS || var_y <= VAR_NUM_EPS {
            return None;
        }
        finite(self.cov_num() / (var_x.sqrt() * var_y.sqrt()))
    }

    /// Σxy / √(ΣxxΣyy): correlation about zero instead of the sample means.
    pub fn uncentered_corr(&self) -> Option<f64> {
        if self.n == 0 || self.sum_xx <= VAR_NUM_EPS || self.sum_yy <= VAR_NUM_EPS {
            return None;
        }
        finite(self.sum_xy / (self.sum_xx.sqrt() * self.sum_yy.sqrt()))
    }

    /// Least squares of y on x as `(intercept, slope)`.
    pub fn regression(&self) -> Option<(f64, f64)> {
        if self.n < 2 {
            return None;
        }
        let var_x = self.var_x_num();
        if var_x <= VAR_NUM_EPS {
            return None;
        }
        let slope = self.cov_num() / var_x;
        let intercept = (self.sum_y - slope * self.sum_x) / self.nf();
        Some((finite(intercept)?, finite(slope)?))
    }
}

/// Cumulative mean updated one sample at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IncrementalMean {
    count: u64,
    mean: f64,
}

impl IncrementalMean {
    #[inline]
    pub fn update(&mut self, x: f64) {
        self.count += 1;
        self.mean += (x - self.mean) / self.count as f64;
    }

    #[inline]
    pub fn value(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }
}

#[inline]
pub(crate) fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

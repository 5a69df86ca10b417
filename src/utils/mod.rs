//! Preprocessing utilities: feature scaling, stratified splitting and
//! simple dataset statistics

use crate::core::{Result, RiskError};

/// Feature scaling utilities
pub mod scaling {
    use super::*;
    use serde::{Deserialize, Serialize};

    /// Statistics for a single feature column
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct FeatureStats {
        pub min: f64,
        pub max: f64,
        pub mean: f64,
        /// Population standard deviation
        pub std: f64,
        pub count: usize,
    }

    /// Standard (z-score) scaler: `(x - mean) / scale`
    ///
    /// `scale` is the population standard deviation of the fit data, or 1.0
    /// for a constant column so that it maps to zero instead of NaN.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct FeatureScaler {
        stats: Vec<FeatureStats>,
        scale: Vec<f64>,
    }

    impl FeatureScaler {
        /// Compute per-column statistics from row-major data
        pub fn fit<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
            let first = rows.first().ok_or(RiskError::EmptyDataset)?;
            let dim = first.as_ref().len();

            let mut sums = vec![0.0; dim];
            let mut mins = vec![f64::INFINITY; dim];
            let mut maxs = vec![f64::NEG_INFINITY; dim];
            for row in rows {
                let row = row.as_ref();
                if row.len() != dim {
                    return Err(RiskError::DimensionMismatch {
                        expected: dim,
                        actual: row.len(),
                    });
                }
                for (j, &x) in row.iter().enumerate() {
                    sums[j] += x;
                    mins[j] = mins[j].min(x);
                    maxs[j] = maxs[j].max(x);
                }
            }

            let n = rows.len() as f64;
            let means: Vec<f64> = sums.iter().map(|s| s / n).collect();

            let mut squares = vec![0.0; dim];
            for row in rows {
                for (j, &x) in row.as_ref().iter().enumerate() {
                    squares[j] += (x - means[j]).powi(2);
                }
            }

            let stats: Vec<FeatureStats> = (0..dim)
                .map(|j| FeatureStats {
                    min: mins[j],
                    max: maxs[j],
                    mean: means[j],
                    std: (squares[j] / n).sqrt(),
                    count: rows.len(),
                })
                .collect();
            let scale = stats
                .iter()
                .map(|s| if s.std == 0.0 { 1.0 } else { s.std })
                .collect();

            Ok(Self { stats, scale })
        }

        /// Scale one row with the fitted statistics
        pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
            if row.len() != self.dim() {
                return Err(RiskError::DimensionMismatch {
                    expected: self.dim(),
                    actual: row.len(),
                });
            }

            Ok(row
                .iter()
                .zip(self.stats.iter().zip(self.scale.iter()))
                .map(|(&x, (stats, &scale))| (x - stats.mean) / scale)
                .collect())
        }

        /// Scale many rows
        pub fn transform_rows<R: AsRef<[f64]>>(&self, rows: &[R]) -> Result<Vec<Vec<f64>>> {
            rows.iter().map(|row| self.transform(row.as_ref())).collect()
        }

        pub fn dim(&self) -> usize {
            self.stats.len()
        }

        pub fn stats(&self) -> &[FeatureStats] {
            &self.stats
        }

        pub fn means(&self) -> Vec<f64> {
            self.stats.iter().map(|s| s.mean).collect()
        }

        pub fn scales(&self) -> &[f64] {
            &self.scale
        }
    }

    /// Convenience function: fit and transform in one step
    pub fn fit_transform<R: AsRef<[f64]>>(rows: &[R]) -> Result<(Vec<Vec<f64>>, FeatureScaler)> {
        let scaler = FeatureScaler::fit(rows)?;
        let transformed = scaler.transform_rows(rows)?;
        Ok((transformed, scaler))
    }
}

/// Train/test partitioning
pub mod split {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    /// Row indices of the two partitions, each in ascending order
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SplitIndices {
        pub train: Vec<usize>,
        pub test: Vec<usize>,
    }

    /// Stratified split on a binary label
    ///
    /// The test partition holds `ceil(n * test_fraction)` rows. Each class
    /// contributes its proportional share, with leftover rows going to the
    /// class with the largest fractional remainder. Rows are drawn from each
    /// class after a seeded shuffle.
    pub fn stratified_split(
        labels: &[bool],
        test_fraction: f64,
        seed: u64,
    ) -> Result<SplitIndices> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(RiskError::InvalidParameter(format!(
                "test fraction must be in (0, 1), got {test_fraction}"
            )));
        }

        let n = labels.len();
        let n_test = (n as f64 * test_fraction).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(RiskError::InvalidParameter(format!(
                "cannot hold out {n_test} of {n} rows"
            )));
        }

        let classes: [Vec<usize>; 2] = [
            (0..n).filter(|&i| !labels[i]).collect(),
            (0..n).filter(|&i| labels[i]).collect(),
        ];
        let quotas = allocate_test_counts(&[classes[0].len(), classes[1].len()], n_test);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut train = Vec::with_capacity(n - n_test);
        let mut test = Vec::with_capacity(n_test);
        for (mut members, quota) in classes.into_iter().zip(quotas) {
            members.shuffle(&mut rng);
            test.extend_from_slice(&members[..quota]);
            train.extend_from_slice(&members[quota..]);
        }

        train.sort_unstable();
        test.sort_unstable();
        Ok(SplitIndices { train, test })
    }

    /// Largest remainder apportionment of `total` over class sizes
    fn allocate_test_counts(sizes: &[usize], total: usize) -> Vec<usize> {
        let n: usize = sizes.iter().sum();
        let exact: Vec<f64> = sizes
            .iter()
            .map(|&size| total as f64 * size as f64 / n as f64)
            .collect();
        let mut counts: Vec<usize> = exact.iter().map(|q| q.floor() as usize).collect();

        let mut order: Vec<usize> = (0..sizes.len()).collect();
        order.sort_by(|&a, &b| {
            let ra = exact[a] - exact[a].floor();
            let rb = exact[b] - exact[b].floor();
            rb.total_cmp(&ra).then(sizes[b].cmp(&sizes[a]))
        });

        let mut leftover = total - counts.iter().sum::<usize>();
        for &class in order.iter().cycle() {
            if leftover == 0 {
                break;
            }
            if counts[class] < sizes[class] {
                counts[class] += 1;
                leftover -= 1;
            }
        }
        counts
    }

}

/// Statistical utilities for datasets
pub mod stats {
    /// Positive count, negative count and positive fraction of binary labels
    pub fn class_balance(labels: &[bool]) -> (usize, usize, f64) {
        let positive = labels.iter().filter(|&&l| l).count();
        let negative = labels.len() - positive;
        let fraction = if labels.is_empty() {
            0.0
        } else {
            positive as f64 / labels.len() as f64
        };
        (positive, negative, fraction)
    }
}

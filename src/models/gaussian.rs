//! Multivariate Gaussian distribution for HMM emissions
//!
//! Full covariance, with a cached Cholesky factor used both for the log
//! determinant and for the quadratic form (triangular solve, no explicit
//! inverse).

use ndarray::{Array1, Array2};
use std::f64::consts::PI;

/// Diagonal jitter added before factorization
const JITTER: f64 = 1e-6;

/// Multivariate Gaussian distribution with full covariance
#[derive(Debug, Clone)]
pub struct MultivariateGaussian {
    /// Mean vector
    pub mean: Array1<f64>,
    /// Covariance matrix
    pub covariance: Array2<f64>,
    /// Cached lower-triangular Cholesky factor of the covariance
    chol: Array2<f64>,
    /// Cached log determinant of the covariance
    log_det: f64,
}

impl MultivariateGaussian {
    /// Create a new Gaussian from mean and covariance
    pub fn new(mean: Array1<f64>, covariance: Array2<f64>) -> Self {
        let mut gaussian = Self {
            mean,
            covariance,
            chol: Array2::zeros((0, 0)),
            log_det: 0.0,
        };
        gaussian.refresh_factorization();
        gaussian
    }

    /// Create with identity covariance (initialization)
    pub fn with_identity(mean: Array1<f64>) -> Self {
        let d = mean.len();
        Self::new(mean, Array2::eye(d))
    }

    /// Dimension of the distribution
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Recompute the Cholesky factor and log determinant.
    ///
    /// Escalates the diagonal jitter until the matrix factorizes; an EM
    /// M-step can briefly produce a near-singular covariance.
    fn refresh_factorization(&mut self) {
        let d = self.dim();
        let mut jitter = JITTER;

        while jitter < 1.0 {
            let mut regularized = self.covariance.clone();
            for i in 0..d {
                regularized[[i, i]] += jitter;
            }
            if let Some(chol) = cholesky(&regularized) {
                self.log_det = 2.0 * (0..d).map(|i| chol[[i, i]].ln()).sum::<f64>();
                self.chol = chol;
                self.covariance = regularized;
                return;
            }
            jitter *= 10.0;
        }

        // Last resort: identity covariance
        self.covariance = Array2::eye(d);
        self.chol = Array2::eye(d);
        self.log_det = 0.0;
    }

    /// Log probability density at a point
    pub fn log_pdf(&self, x: &Array1<f64>) -> f64 {
        let d = self.dim() as f64;
        let diff = x - &self.mean;

        // Solve L y = diff; the quadratic form is then y . y
        let y = forward_substitute(&self.chol, &diff);
        let quad_form: f64 = y.iter().map(|v| v * v).sum();

        -0.5 * (d * (2.0 * PI).ln() + self.log_det + quad_form)
    }

    /// Probability density at a point
    pub fn pdf(&self, x: &Array1<f64>) -> f64 {
        self.log_pdf(x).exp()
    }

    /// Re-estimate mean and covariance from weighted samples (EM M-step)
    pub fn update_weighted(&mut self, samples: &Array2<f64>, weights: &Array1<f64>) {
        let n = samples.nrows();
        let d = samples.ncols();
        let weight_sum = weights.sum();

        if weight_sum < 1e-10 {
            return;
        }

        let mut new_mean = Array1::zeros(d);
        for i in 0..n {
            for j in 0..d {
                new_mean[j] += weights[i] * samples[[i, j]];
            }
        }
        new_mean /= weight_sum;

        let mut new_cov = Array2::zeros((d, d));
        for i in 0..n {
            let diff: Array1<f64> = samples.row(i).to_owned() - &new_mean;
            for j in 0..d {
                for k in 0..d {
                    new_cov[[j, k]] += weights[i] * diff[j] * diff[k];
                }
            }
        }
        new_cov /= weight_sum;

        self.mean = new_mean;
        self.covariance = new_cov;
        self.refresh_factorization();
    }
}

/// Lower-triangular Cholesky factorization; None if not positive definite
fn cholesky(matrix: &Array2<f64>) -> Option<Array2<f64>> {
    let d = matrix.nrows();
    let mut l: Array2<f64> = Array2::zeros((d, d));

    for i in 0..d {
        for j in 0..=i {
            let mut sum = matrix[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    Some(l)
}

/// Solve L y = b for lower-triangular L
fn forward_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let d = b.len();
    let mut y = Array1::zeros(d);
    for i in 0..d {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[[i, j]] * y[j];
        }
        y[i] = sum / l[[i, i]];
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, array};

    #[test]
    fn test_gaussian_creation() {
        let g = MultivariateGaussian::with_identity(array![0.0, 0.0]);
        assert_eq!(g.dim(), 2);
    }

    #[test]
    fn test_standard_normal_log_pdf() {
        // 1-D standard normal at the mean: -0.5 * ln(2*pi)
        let g = MultivariateGaussian::new(array![0.0], Array2::eye(1));
        let expected = -0.5 * (2.0 * PI).ln();
        // Jitter shifts the variance by 1e-6
        assert!((g.log_pdf(&array![0.0]) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_pdf_highest_at_mean() {
        let mean = array![1.0, -1.0];
        let g = MultivariateGaussian::with_identity(mean.clone());
        assert!(g.pdf(&mean) > g.pdf(&array![2.0, 0.0]));
    }

    #[test]
    fn test_full_covariance_quadratic_form() {
        // Correlated 2-D Gaussian; compare against the closed form with
        // inverse [[2, -1], [-1, 2]] / 3 and det = 3
        let cov = arr2(&[[2.0, 1.0], [1.0, 2.0]]);
        let g = MultivariateGaussian::new(array![0.0, 0.0], cov);

        let x = array![1.0, 0.0];
        let quad = (2.0 * 1.0 * 1.0) / 3.0;
        let expected = -0.5 * (2.0 * (2.0 * PI).ln() + 3.0_f64.ln() + quad);
        assert!((g.log_pdf(&x) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_cholesky_known_factor() {
        let m = arr2(&[[4.0, 2.0], [2.0, 5.0]]);
        let l = cholesky(&m).unwrap();
        assert!((l[[0, 0]] - 2.0).abs() < 1e-12);
        assert!((l[[1, 0]] - 1.0).abs() < 1e-12);
        assert!((l[[1, 1]] - 2.0).abs() < 1e-12);
        assert_eq!(l[[0, 1]], 0.0);
    }

    #[test]
    fn test_cholesky_rejects_non_positive_definite() {
        let m = arr2(&[[1.0, 2.0], [2.0, 1.0]]);
        assert!(cholesky(&m).is_none());
    }

    #[test]
    fn test_update_weighted_recovers_sample_moments() {
        let samples = arr2(&[[1.0, 2.0], [1.5, 2.5], [0.5, 1.5], [1.0, 2.0]]);
        let weights = Array1::from_elem(4, 1.0);
        let mut g = MultivariateGaussian::with_identity(array![0.0, 0.0]);
        g.update_weighted(&samples, &weights);

        assert!((g.mean[0] - 1.0).abs() < 1e-10);
        assert!((g.mean[1] - 2.0).abs() < 1e-10);
        // Population variance of [1, 1.5, 0.5, 1] is 0.125, plus jitter
        assert!((g.covariance[[0, 0]] - 0.125).abs() < 1e-4);
    }
}

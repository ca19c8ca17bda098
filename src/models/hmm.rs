//! Gaussian Hidden Markov Model

use super::algorithms::{baum_welch_step, emission_matrix, forward_backward, viterbi};
use super::gaussian::MultivariateGaussian;
use crate::error::{PipelineError, PipelineResult};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default convergence tolerance on log-likelihood improvement
pub const DEFAULT_TOL: f64 = 1e-2;
/// Default RNG seed for reproducible fits
pub const DEFAULT_SEED: u64 = 42;

/// HMM parameters
#[derive(Debug, Clone)]
pub struct HmmParams {
    /// Number of hidden states
    pub n_states: usize,
    /// Number of features
    pub n_features: usize,
    /// Initial state probabilities
    pub initial_probs: Array1<f64>,
    /// State transition matrix
    pub transition_matrix: Array2<f64>,
    /// Emission distributions (one per state)
    pub emissions: Vec<MultivariateGaussian>,
}

impl HmmParams {
    /// Seeded random initial parameters with a diagonally dominant transition
    fn random(n_states: usize, n_features: usize, rng: &mut StdRng) -> Self {
        let mut initial_probs = Array1::zeros(n_states);
        for i in 0..n_states {
            initial_probs[i] = rng.gen::<f64>() + 0.1;
        }
        let sum = initial_probs.sum();
        initial_probs /= sum;

        let mut transition_matrix = Array2::zeros((n_states, n_states));
        for i in 0..n_states {
            for j in 0..n_states {
                transition_matrix[[i, j]] = if i == j {
                    0.8 + rng.gen::<f64>() * 0.15
                } else {
                    rng.gen::<f64>() * 0.1
                };
            }
            let row_sum: f64 = transition_matrix.row(i).sum();
            for j in 0..n_states {
                transition_matrix[[i, j]] /= row_sum;
            }
        }

        let emissions = (0..n_states)
            .map(|_| MultivariateGaussian::with_identity(Array1::zeros(n_features)))
            .collect();

        Self {
            n_states,
            n_features,
            initial_probs,
            transition_matrix,
            emissions,
        }
    }
}

/// Outcome of a fit: convergence is a warning condition, never an error
#[derive(Debug, Clone, Copy)]
pub struct FitSummary {
    /// Whether the log-likelihood improvement fell below tolerance
    pub converged: bool,
    /// Iterations actually run
    pub iterations: usize,
    /// Final log-likelihood
    pub log_likelihood: f64,
}

/// Gaussian Hidden Markov Model with full covariance emissions.
///
/// Created untrained, fit once over the full standardized feature matrix,
/// then read-only for decoding.
#[derive(Debug, Clone)]
pub struct GaussianHMM {
    /// Model parameters
    params: HmmParams,
    is_fitted: bool,
    /// Training log-likelihood history
    pub log_likelihood_history: Vec<f64>,
    tol: f64,
    seed: u64,
}

impl GaussianHMM {
    /// Create new untrained HMM with given number of states
    pub fn new(n_states: usize) -> Self {
        Self {
            params: HmmParams {
                n_states,
                n_features: 0,
                initial_probs: Array1::zeros(0),
                transition_matrix: Array2::zeros((0, 0)),
                emissions: vec![],
            },
            is_fitted: false,
            log_likelihood_history: vec![],
            tol: DEFAULT_TOL,
            seed: DEFAULT_SEED,
        }
    }

    /// Set convergence tolerance
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set RNG seed; identical seed and input reproduce the fit exactly
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of states
    pub fn n_states(&self) -> usize {
        self.params.n_states
    }

    /// Whether the model has been fitted
    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit by Baum-Welch EM over the standardized observation matrix.
    ///
    /// Stops when the log-likelihood improvement drops below the tolerance or
    /// after `max_iter` iterations; the latter is reported as
    /// `converged: false` and the partially-optimized model stays usable.
    pub fn fit(
        &mut self,
        observations: &Array2<f64>,
        max_iter: usize,
    ) -> PipelineResult<FitSummary> {
        if self.params.n_states == 0 {
            return Err(PipelineError::InvalidInput(
                "state count must be at least 1".to_string(),
            ));
        }
        check_finite(observations)?;

        let n_features = observations.ncols();
        if observations.nrows() < 2 * self.params.n_states {
            return Err(PipelineError::InsufficientData {
                needed: 2 * self.params.n_states,
                got: observations.nrows(),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        self.params = HmmParams::random(self.params.n_states, n_features, &mut rng);
        self.initialize_emissions_kmeans(observations, &mut rng);

        self.log_likelihood_history.clear();
        let mut prev_ll = f64::NEG_INFINITY;
        let mut converged = false;
        let mut iterations = 0;

        for iter in 0..max_iter {
            iterations = iter + 1;

            let probs = emission_matrix(observations, &self.params.emissions);
            let (new_initial, new_transition, gamma, log_ll) = baum_welch_step(
                &probs,
                &self.params.initial_probs,
                &self.params.transition_matrix,
            );

            self.params.initial_probs = new_initial;
            self.params.transition_matrix = new_transition;

            for j in 0..self.params.n_states {
                let weights = gamma.column(j).to_owned();
                self.params.emissions[j].update_weighted(observations, &weights);
            }

            self.log_likelihood_history.push(log_ll);

            if (log_ll - prev_ll).abs() < self.tol {
                tracing::info!(iterations, log_likelihood = log_ll, "EM converged");
                converged = true;
                break;
            }
            prev_ll = log_ll;

            if iterations % 10 == 0 {
                tracing::debug!(iteration = iterations, log_likelihood = log_ll, "EM progress");
            }
        }

        let log_likelihood = *self.log_likelihood_history.last().unwrap_or(&0.0);
        if !converged {
            tracing::warn!(
                iterations,
                tol = self.tol,
                "EM hit the iteration cap without converging; keeping best-effort parameters"
            );
        }

        self.is_fitted = true;
        Ok(FitSummary {
            converged,
            iterations,
            log_likelihood,
        })
    }

    /// Seeded k-means pass to place the emission means
    fn initialize_emissions_kmeans(&mut self, observations: &Array2<f64>, rng: &mut StdRng) {
        let n = observations.nrows();
        let d = observations.ncols();
        let k = self.params.n_states;

        let mut centers: Vec<Array1<f64>> = (0..k)
            .map(|_| observations.row(rng.gen_range(0..n)).to_owned())
            .collect();

        for _ in 0..10 {
            let mut assignments = vec![0; n];
            for i in 0..n {
                let mut best_dist = f64::MAX;
                for (j, center) in centers.iter().enumerate() {
                    let dist: f64 = observations
                        .row(i)
                        .iter()
                        .zip(center.iter())
                        .map(|(a, b)| (a - b).powi(2))
                        .sum();
                    if dist < best_dist {
                        best_dist = dist;
                        assignments[i] = j;
                    }
                }
            }

            for j in 0..k {
                let mut new_center = Array1::zeros(d);
                let mut count = 0;
                for i in 0..n {
                    if assignments[i] == j {
                        new_center += &observations.row(i);
                        count += 1;
                    }
                }
                if count > 0 {
                    new_center /= count as f64;
                    centers[j] = new_center;
                }
            }
        }

        for (j, center) in centers.into_iter().enumerate() {
            self.params.emissions[j] = MultivariateGaussian::with_identity(center);
        }
    }

    /// Decode the most likely state sequence (Viterbi).
    ///
    /// Pure function of the fitted parameters and the input matrix; yields one
    /// label in `[0, n_states)` per row.
    pub fn decode(&self, observations: &Array2<f64>) -> PipelineResult<Vec<usize>> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        check_finite(observations)?;

        let (path, _) = viterbi(
            observations,
            &self.params.initial_probs,
            &self.params.transition_matrix,
            &self.params.emissions,
        );
        Ok(path)
    }

    /// Log-likelihood of observations under the fitted model
    pub fn score(&self, observations: &Array2<f64>) -> PipelineResult<f64> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        check_finite(observations)?;

        let probs = emission_matrix(observations, &self.params.emissions);
        let (_, _, _, log_ll) = forward_backward(
            &probs,
            &self.params.initial_probs,
            &self.params.transition_matrix,
        );
        Ok(log_ll)
    }

    /// The fitted transition matrix
    pub fn transition_matrix(&self) -> &Array2<f64> {
        &self.params.transition_matrix
    }

    /// The fitted initial state distribution
    pub fn initial_probs(&self) -> &Array1<f64> {
        &self.params.initial_probs
    }

    /// Emission mean per state, in standardized feature space
    pub fn state_means(&self) -> Vec<Array1<f64>> {
        self.params.emissions.iter().map(|e| e.mean.clone()).collect()
    }

    /// Emission covariance per state, in standardized feature space
    pub fn state_covariances(&self) -> Vec<Array2<f64>> {
        self.params
            .emissions
            .iter()
            .map(|e| e.covariance.clone())
            .collect()
    }
}

/// Reject NaN/infinity before they reach the estimator
fn check_finite(observations: &Array2<f64>) -> PipelineResult<()> {
    if observations.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(PipelineError::InvalidInput(
            "observation matrix contains NaN or infinite values".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn two_cluster_observations() -> Array2<f64> {
        // Two clearly separated clusters, alternating in blocks
        let mut rows = Vec::new();
        for block in 0..6 {
            let center = if block % 2 == 0 { 0.0 } else { 4.0 };
            for i in 0..8 {
                rows.push([center + (i as f64) * 0.01, center - (i as f64) * 0.01]);
            }
        }
        arr2(&rows)
    }

    #[test]
    fn test_untrained_model() {
        let hmm = GaussianHMM::new(3);
        assert_eq!(hmm.n_states(), 3);
        assert!(!hmm.is_fitted());
        assert!(matches!(
            hmm.decode(&Array2::zeros((4, 2))).unwrap_err(),
            PipelineError::ModelNotFitted
        ));
    }

    #[test]
    fn test_fit_rejects_non_finite_input() {
        let mut hmm = GaussianHMM::new(2);
        let mut obs = two_cluster_observations();
        obs[[3, 1]] = f64::NAN;
        assert!(matches!(
            hmm.fit(&obs, 50).unwrap_err(),
            PipelineError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_fit_rejects_zero_states() {
        let mut hmm = GaussianHMM::new(0);
        let obs = two_cluster_observations();
        assert!(matches!(
            hmm.fit(&obs, 50).unwrap_err(),
            PipelineError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_fit_rejects_tiny_input() {
        let mut hmm = GaussianHMM::new(4);
        let obs = arr2(&[[0.0, 0.0], [1.0, 1.0]]);
        assert!(matches!(
            hmm.fit(&obs, 50).unwrap_err(),
            PipelineError::InsufficientData { .. }
        ));
    }

    #[test]
    fn test_fit_produces_stochastic_transition() {
        let mut hmm = GaussianHMM::new(2);
        let obs = two_cluster_observations();
        let summary = hmm.fit(&obs, 100).unwrap();

        assert!(summary.iterations >= 1);
        assert!(summary.log_likelihood.is_finite());

        let trans = hmm.transition_matrix();
        for i in 0..2 {
            let row_sum: f64 = trans.row(i).sum();
            assert!((row_sum - 1.0).abs() < 1e-9);
            for j in 0..2 {
                assert!(trans[[i, j]] >= 0.0 && trans[[i, j]] <= 1.0);
            }
        }
        assert!((hmm.initial_probs().sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_decode_labels_in_range() {
        let mut hmm = GaussianHMM::new(2);
        let obs = two_cluster_observations();
        hmm.fit(&obs, 100).unwrap();

        let states = hmm.decode(&obs).unwrap();
        assert_eq!(states.len(), obs.nrows());
        assert!(states.iter().all(|&s| s < 2));
    }

    #[test]
    fn test_same_seed_same_fit() {
        let obs = two_cluster_observations();

        let mut a = GaussianHMM::new(2).with_seed(7);
        let mut b = GaussianHMM::new(2).with_seed(7);
        a.fit(&obs, 100).unwrap();
        b.fit(&obs, 100).unwrap();

        assert_eq!(a.transition_matrix(), b.transition_matrix());
        assert_eq!(a.state_means(), b.state_means());
        assert_eq!(a.decode(&obs).unwrap(), b.decode(&obs).unwrap());
    }

    #[test]
    fn test_score_after_fit() {
        let mut hmm = GaussianHMM::new(2);
        let obs = two_cluster_observations();
        hmm.fit(&obs, 100).unwrap();
        assert!(hmm.score(&obs).unwrap().is_finite());
    }
}

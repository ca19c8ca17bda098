//! Gaussian HMM implementation
//!
//! Full-covariance Gaussian emissions with Viterbi, Forward-Backward and
//! Baum-Welch algorithms.

mod algorithms;
mod gaussian;
mod hmm;

pub use algorithms::{baum_welch_step, emission_matrix, forward_backward, viterbi};
pub use gaussian::MultivariateGaussian;
pub use hmm::{FitSummary, GaussianHMM, HmmParams, DEFAULT_SEED, DEFAULT_TOL};

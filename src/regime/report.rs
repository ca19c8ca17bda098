//! Per-state descriptive statistics and model summary

use crate::data::{FeatureTable, FEATURE_NAMES};
use crate::error::{PipelineError, PipelineResult};
use crate::models::GaussianHMM;
use colored::Colorize;
use ndarray::{Array1, Array2};
use statrs::statistics::Statistics;

/// Descriptive statistics of one raw feature within one state
#[derive(Debug, Clone)]
pub struct FeatureStats {
    pub name: &'static str,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Summary of one decoded state
#[derive(Debug, Clone)]
pub struct StateSummary {
    /// State index
    pub state: usize,
    /// Number of feature rows assigned to this state
    pub count: usize,
    /// Share of all rows
    pub share: f64,
    /// Mean run length of consecutive periods in this state
    pub avg_duration: f64,
    /// Per-feature descriptive statistics over the raw (unstandardized) table
    pub features: Vec<FeatureStats>,
}

/// Full report: per-state statistics plus fitted model parameters
#[derive(Debug, Clone)]
pub struct RegimeReport {
    pub states: Vec<StateSummary>,
    /// Fitted K x K transition matrix
    pub transition_matrix: Array2<f64>,
    /// Per-state emission mean in standardized feature space
    pub state_means: Vec<Array1<f64>>,
    /// Per-state emission covariance in standardized feature space
    pub state_covariances: Vec<Array2<f64>>,
}

impl RegimeReport {
    /// Build the report from the raw feature table, the fitted model and the
    /// decoded state sequence. The sequence must be row-aligned with the table.
    pub fn build(
        table: &FeatureTable,
        model: &GaussianHMM,
        states: &[usize],
    ) -> PipelineResult<Self> {
        if !model.is_fitted() {
            return Err(PipelineError::ModelNotFitted);
        }
        if states.len() != table.n_samples() {
            return Err(PipelineError::InvalidInput(format!(
                "state sequence length {} does not match {} feature rows",
                states.len(),
                table.n_samples()
            )));
        }

        let k = model.n_states();
        if let Some(&bad) = states.iter().find(|&&s| s >= k) {
            return Err(PipelineError::InvalidInput(format!(
                "state label {bad} out of range for {k} states"
            )));
        }

        let total = states.len();
        let durations = mean_durations(states, k);

        let mut summaries = Vec::with_capacity(k);
        for state in 0..k {
            let rows: Vec<usize> = states
                .iter()
                .enumerate()
                .filter(|(_, &s)| s == state)
                .map(|(i, _)| i)
                .collect();

            let features = FEATURE_NAMES
                .into_iter()
                .enumerate()
                .map(|(col, name)| {
                    let values: Vec<f64> = rows.iter().map(|&r| table.data[[r, col]]).collect();
                    describe(name, &values)
                })
                .collect();

            summaries.push(StateSummary {
                state,
                count: rows.len(),
                share: if total > 0 {
                    rows.len() as f64 / total as f64
                } else {
                    0.0
                },
                avg_duration: durations[state],
                features,
            });
        }

        Ok(Self {
            states: summaries,
            transition_matrix: model.transition_matrix().clone(),
            state_means: model.state_means(),
            state_covariances: model.state_covariances(),
        })
    }

    /// Render the report to the console.
    ///
    /// `describe_features` adds the per-state feature breakdown; the state
    /// occupancy, transition matrix and emission parameters always print.
    pub fn render(&self, describe_features: bool) {
        println!("\n{}", "=== Regime Summary ===".bold());
        for summary in &self.states {
            println!(
                "\n{} {} periods ({:.1}%), avg run {:.1} periods",
                format!("State {}:", summary.state).bold().cyan(),
                summary.count,
                summary.share * 100.0,
                summary.avg_duration
            );

            if describe_features {
                for stats in &summary.features {
                    println!(
                        "  {:>13}: mean {:>10.6}  std {:>10.6}  min {:>10.6}  max {:>10.6}",
                        stats.name, stats.mean, stats.std, stats.min, stats.max
                    );
                }
            }
        }

        let k = self.transition_matrix.nrows();
        println!("\n{}", "=== Transition Matrix ===".bold());
        for i in 0..k {
            let row: Vec<String> = (0..k)
                .map(|j| format!("{:.3}", self.transition_matrix[[i, j]]))
                .collect();
            println!("  State {}: [{}]", i, row.join("  "));
        }

        println!("\n{}", "=== Emission Parameters (standardized space) ===".bold());
        for (state, (mean, cov)) in self
            .state_means
            .iter()
            .zip(&self.state_covariances)
            .enumerate()
        {
            println!("{}", format!("State {state}:").cyan());
            let mean_str: Vec<String> = mean.iter().map(|v| format!("{v:.4}")).collect();
            println!("  mean: [{}]", mean_str.join(", "));
            for row in cov.rows() {
                let row_str: Vec<String> = row.iter().map(|v| format!("{v:.4}")).collect();
                println!("  cov:  [{}]", row_str.join(", "));
            }
        }
    }
}

fn describe(name: &'static str, values: &[f64]) -> FeatureStats {
    if values.is_empty() {
        return FeatureStats {
            name,
            mean: 0.0,
            std: 0.0,
            min: 0.0,
            max: 0.0,
        };
    }

    FeatureStats {
        name,
        mean: values.iter().mean(),
        std: if values.len() > 1 {
            values.iter().std_dev()
        } else {
            0.0
        },
        min: values.iter().cloned().fold(f64::INFINITY, f64::min),
        max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Mean run length of consecutive periods, per state
fn mean_durations(states: &[usize], k: usize) -> Vec<f64> {
    let mut runs: Vec<Vec<usize>> = vec![Vec::new(); k];
    if states.is_empty() {
        return vec![0.0; k];
    }

    let mut current = states[0];
    let mut length = 1;
    for &state in &states[1..] {
        if state == current {
            length += 1;
        } else {
            runs[current].push(length);
            current = state;
            length = 1;
        }
    }
    runs[current].push(length);

    runs.iter()
        .map(|r| {
            if r.is_empty() {
                0.0
            } else {
                r.iter().sum::<usize>() as f64 / r.len() as f64
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn fitted_model_and_table() -> (FeatureTable, GaussianHMM, Vec<usize>) {
        let data = arr2(&[
            [0.01, 0.002, 0.1],
            [0.02, 0.003, -0.1],
            [-0.05, 0.010, 0.5],
            [-0.06, 0.012, 0.4],
            [0.01, 0.002, 0.0],
            [0.02, 0.001, 0.1],
            [-0.04, 0.011, 0.6],
            [-0.05, 0.013, 0.3],
        ]);
        let table = FeatureTable {
            data,
            timestamps: (0..8).collect(),
        };

        let mut model = GaussianHMM::new(2);
        model.fit(&table.data, 50).unwrap();
        let states = model.decode(&table.data).unwrap();
        (table, model, states)
    }

    #[test]
    fn test_report_covers_all_states() {
        let (table, model, states) = fitted_model_and_table();
        let report = RegimeReport::build(&table, &model, &states).unwrap();

        assert_eq!(report.states.len(), 2);
        let total: usize = report.states.iter().map(|s| s.count).sum();
        assert_eq!(total, table.n_samples());
        assert_eq!(report.transition_matrix.nrows(), 2);
        assert_eq!(report.state_means.len(), 2);
        assert_eq!(report.state_covariances.len(), 2);
    }

    #[test]
    fn test_report_rejects_misaligned_states() {
        let (table, model, mut states) = fitted_model_and_table();
        states.pop();
        assert!(matches!(
            RegimeReport::build(&table, &model, &states).unwrap_err(),
            PipelineError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_report_rejects_out_of_range_label() {
        let (table, model, mut states) = fitted_model_and_table();
        states[0] = 9;
        assert!(matches!(
            RegimeReport::build(&table, &model, &states).unwrap_err(),
            PipelineError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_mean_durations() {
        let states = vec![0, 0, 0, 1, 1, 0, 1, 1, 1, 1];
        let durations = mean_durations(&states, 2);
        // State 0 runs: 3, 1 -> 2.0; state 1 runs: 2, 4 -> 3.0
        assert!((durations[0] - 2.0).abs() < 1e-12);
        assert!((durations[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_describe_stats() {
        let stats = describe("returns", &[1.0, 2.0, 3.0]);
        assert!((stats.mean - 2.0).abs() < 1e-12);
        assert!((stats.std - 1.0).abs() < 1e-12);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
    }
}

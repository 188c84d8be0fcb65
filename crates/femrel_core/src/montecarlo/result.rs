//! Monte Carlo result types

use std::str::FromStr;
use std::time::Duration;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::form::SolutionStatus;
use crate::model::Distribution;

/// Estimates after one cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// Samples simulated so far
    pub n: usize,
    pub pf: f64,
    pub beta: f64,
    pub cvpf: f64,
    pub g_mean: f64,
    pub g_std: f64,
}

/// Sampling distribution of one variable at the end of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingPoint {
    pub name: String,
    pub distribution: Distribution,
}

/// Convergence series that can be requested from a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolutionControl {
    Pf,
    Beta,
    CvPf,
}

impl FromStr for SolutionControl {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "n_pf" | "pf" => Ok(SolutionControl::Pf),
            "n_beta" | "beta" => Ok(SolutionControl::Beta),
            "n_cvpf" | "cvpf" => Ok(SolutionControl::CvPf),
            _ => Err(AnalysisError::InvalidOption {
                option: s.to_string(),
                reason: "expected N_Pf, N_Beta or N_CVPf".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub status: SolutionStatus,
    pub pf: f64,
    pub beta: f64,
    pub cvpf: f64,

    /// Final sampling distributions, adapted when adaptive sampling is on
    pub sampling_points: Vec<SamplingPoint>,

    pub cycles: usize,
    pub samples: usize,

    /// Mean and standard deviation of g(X) over all samples
    pub g_mean: f64,
    pub g_std: f64,

    pub history: Vec<CycleRecord>,
    pub elapsed: Duration,
    pub finished_at: Timestamp,
}

impl MonteCarloResult {
    /// (N, value) pairs of a convergence series, one per cycle
    #[must_use]
    pub fn solution_control(&self, control: SolutionControl) -> Vec<(usize, f64)> {
        self.history
            .iter()
            .map(|r| {
                let value = match control {
                    SolutionControl::Pf => r.pf,
                    SolutionControl::Beta => r.beta,
                    SolutionControl::CvPf => r.cvpf,
                };
                (r.n, value)
            })
            .collect()
    }

    pub fn sampling_point(&self, name: &str) -> Option<&Distribution> {
        self.sampling_points
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| &p.distribution)
    }

    pub fn converged(&self) -> bool {
        self.status == SolutionStatus::Converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> MonteCarloResult {
        let record = |n: usize, pf: f64| CycleRecord {
            n,
            pf,
            beta: 2.0,
            cvpf: 0.1,
            g_mean: 1.0,
            g_std: 0.5,
        };
        MonteCarloResult {
            status: SolutionStatus::MaxIterationsReached,
            pf: 0.02,
            beta: 2.0,
            cvpf: 0.1,
            sampling_points: vec![SamplingPoint {
                name: "r".into(),
                distribution: Distribution::normal(120.0, 20.0).unwrap(),
            }],
            cycles: 2,
            samples: 200,
            g_mean: 1.0,
            g_std: 0.5,
            history: vec![record(100, 0.03), record(200, 0.02)],
            elapsed: Duration::ZERO,
            finished_at: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_solution_control_names() {
        assert_eq!("N_Pf".parse::<SolutionControl>().unwrap(), SolutionControl::Pf);
        assert_eq!("N_Beta".parse::<SolutionControl>().unwrap(), SolutionControl::Beta);
        assert_eq!("n_cvpf".parse::<SolutionControl>().unwrap(), SolutionControl::CvPf);
        assert!("N_G".parse::<SolutionControl>().is_err());
    }

    #[test]
    fn test_solution_control_series() {
        let result = result();
        assert_eq!(
            result.solution_control(SolutionControl::Pf),
            vec![(100, 0.03), (200, 0.02)]
        );
        assert_eq!(result.sampling_point("R").map(|d| d.mean), Some(120.0));
        assert!(!result.converged());
    }
}

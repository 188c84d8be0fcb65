//! FORM result types

use std::time::Duration;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// How an analysis ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolutionStatus {
    /// Convergence criteria were met
    Converged,

    /// The iteration or cycle limit was reached first
    MaxIterationsReached,

    /// The analysis has not been run
    NotRun,
}

impl SolutionStatus {
    /// Numeric exit code used in reports: 0, 1 or 99
    pub fn code(self) -> i32 {
        match self {
            SolutionStatus::Converged => 0,
            SolutionStatus::MaxIterationsReached => 1,
            SolutionStatus::NotRun => 99,
        }
    }
}

/// Final result of a FORM run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormResult {
    pub status: SolutionStatus,

    /// Probability of failure, Φ(-β)
    pub pf: f64,

    /// Reliability index
    pub beta: f64,

    /// Random variable names, in the order of the vectors below
    pub variables: Vec<String>,

    /// Design point in the physical space
    pub design_point: Vec<f64>,

    /// Gradient of g in the reduced space at the last cycle
    pub gradient: Vec<f64>,

    /// Direction cosines, gradient / |gradient|
    pub alpha: Vec<f64>,

    /// Cycles performed
    pub cycles: usize,

    /// β at the start of the first cycle and after every update
    pub beta_history: Vec<f64>,

    /// Limit state tolerance actually used
    pub tol_ls_used: f64,

    pub elapsed: Duration,

    pub finished_at: Timestamp,
}

impl FormResult {
    /// Design point coordinate of a random variable
    #[must_use]
    pub fn design_value(&self, name: &str) -> Option<f64> {
        let index = self
            .variables
            .iter()
            .position(|v| v.eq_ignore_ascii_case(name))?;
        self.design_point.get(index).copied()
    }

    /// Direction cosine of a random variable
    #[must_use]
    pub fn alpha_of(&self, name: &str) -> Option<f64> {
        let index = self
            .variables
            .iter()
            .position(|v| v.eq_ignore_ascii_case(name))?;
        self.alpha.get(index).copied()
    }

    pub fn converged(&self) -> bool {
        self.status == SolutionStatus::Converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(SolutionStatus::Converged.code(), 0);
        assert_eq!(SolutionStatus::MaxIterationsReached.code(), 1);
        assert_eq!(SolutionStatus::NotRun.code(), 99);
    }

    #[test]
    fn test_result_serializes() {
        let result = FormResult {
            status: SolutionStatus::Converged,
            pf: 0.02275,
            beta: 2.0,
            variables: vec!["r".into(), "s".into()],
            design_point: vec![120.0, 120.0],
            gradient: vec![20.0, -15.0],
            alpha: vec![0.8, -0.6],
            cycles: 3,
            beta_history: vec![0.0, 2.0, 2.0],
            tol_ls_used: 0.5,
            elapsed: Duration::from_millis(3),
            finished_at: Timestamp::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"status\":\"Converged\""));
        assert_eq!(result.design_value("S"), Some(120.0));
        assert_eq!(result.alpha_of("r"), Some(0.8));
    }
}

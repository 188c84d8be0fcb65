use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Simulation controls for a Monte Carlo run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloControls {
    /// Samples drawn in each cycle (Ns)
    pub samples_per_cycle: usize,

    /// Upper bound on the number of cycles
    pub max_cycles: usize,

    /// The run stops once CVPf falls below this target (after the third cycle)
    pub target_cvpf: f64,

    /// Relative tolerance of the adaptive sampling point. `None` keeps the
    /// sampling distributions fixed.
    pub adaptive_tolerance: Option<f64>,

    /// Seed of the sample stream; equal seeds give equal runs
    pub seed: u64,
}

impl Default for MonteCarloControls {
    fn default() -> Self {
        Self {
            samples_per_cycle: 10_000,
            max_cycles: 100,
            target_cvpf: 0.0,
            adaptive_tolerance: None,
            seed: 0,
        }
    }
}

impl MonteCarloControls {
    pub fn validate(&self) -> Result<()> {
        if self.samples_per_cycle < 2 {
            return Err(AnalysisError::InvalidControls(
                "at least 2 samples per cycle are required".into(),
            ));
        }
        if self.max_cycles == 0 {
            return Err(AnalysisError::InvalidControls(
                "max_cycles must be positive".into(),
            ));
        }
        if self.target_cvpf.is_nan() || self.target_cvpf < 0.0 {
            return Err(AnalysisError::InvalidControls(format!(
                "target CVPf must be >= 0, got {}",
                self.target_cvpf
            )));
        }
        match self.adaptive_tolerance {
            Some(tol) if tol.is_nan() || tol <= 0.0 => Err(AnalysisError::InvalidControls(
                format!("adaptive tolerance must be positive, got {tol}"),
            )),
            _ => Ok(()),
        }
    }
}

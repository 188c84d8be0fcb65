//! Structural reliability analysis library
//!
//! This crate estimates the probability of failure of a limit state g(X) whose
//! variables are random. It supports:
//! - Normal, lognormal and Gumbel variables with Nataf correlation
//! - Limit states written as expressions or as Rust closures
//! - First Order Reliability Method (HLRF, iHLRF and relaxed HLRF)
//! - Monte Carlo simulation with importance and adaptive sampling
//! - External models evaluated in batches, including an ANSYS PDS driver
//! - CSV reports of every analysis
//!
//! # Example
//!
//! ```ignore
//! use femrel_core::{Form, LimitState};
//!
//! let mut form = Form::new();
//! form.create_variable("r", "lognormal", 180.0, 0.0, Some(0.15))?;
//! form.create_variable("s", "gumbel", 100.0, 20.0, None)?;
//! form.set_limit_state(LimitState::expression("r - s")?);
//! let result = form.run()?;
//! println!("beta = {:.3}", result.beta);
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod error;
pub mod evaluator;
pub mod limit_state;
pub mod linalg;
pub mod problem;
pub mod report;
pub mod stats;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod model;

// ============================================================================
// Analyses and external models
// ============================================================================

pub mod ansys;
pub mod form;
pub mod montecarlo;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use ansys::{AnsysPds, AnsysSettings, SampleErrorPolicy};
pub use error::{AnalysisError, Result};
pub use evaluator::{ClosureModel, ExternalModel, SampleBatch};
pub use form::{
    FiniteDifference, ForcedStep, Form, FormControls, FormMethod, FormOptions, FormResult,
    SolutionStatus, Tolerance,
};
pub use limit_state::{Bindings, LimitState, UserFunction};
pub use model::{Distribution, DistributionKind, VariableSet};
pub use montecarlo::{
    CycleRecord, MonteCarlo, MonteCarloControls, MonteCarloResult, SamplingPoint, SolutionControl,
};

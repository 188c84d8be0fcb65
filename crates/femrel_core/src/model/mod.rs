//! Probabilistic model: distributions, variables and correlations

mod distribution;
mod nataf;
mod variables;

pub use distribution::{Distribution, DistributionKind, VariableKind};
pub use nataf::adjusted_correlation;
pub use variables::{Constant, RandomVariable, VariableSet, normalize_name};

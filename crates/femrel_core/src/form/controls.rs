//! FORM process controls and iHLRF/rHLRF options

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Design point search algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormMethod {
    /// Hasofer-Lind-Rackwitz-Fiessler recursion
    Hlrf,
    /// HLRF with an Armijo line search on a merit function
    #[default]
    Ihlrf,
    /// HLRF with a fixed relaxation of the step
    Rhlrf,
}

impl fmt::Display for FormMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FormMethod::Hlrf => "HLRF",
            FormMethod::Ihlrf => "iHLRF",
            FormMethod::Rhlrf => "rHLRF",
        })
    }
}

/// Finite difference scheme for the limit state gradient
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FiniteDifference {
    #[default]
    Forward,
    Backward,
    Center,
}

impl FiniteDifference {
    /// Perturbed rows added to the current point
    pub fn rows_per_variable(self) -> usize {
        match self {
            FiniteDifference::Forward | FiniteDifference::Backward => 1,
            FiniteDifference::Center => 2,
        }
    }
}

impl fmt::Display for FiniteDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FiniteDifference::Forward => "forward",
            FiniteDifference::Backward => "backward",
            FiniteDifference::Center => "center",
        })
    }
}

/// A tolerance derived from the first limit state value, or a fixed one
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tolerance {
    #[default]
    Auto,
    Fixed(f64),
}

/// Step used when the iHLRF line search finds nothing
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForcedStep {
    /// 1 - |y·∇g| / (|y||∇g|)
    #[default]
    Auto,
    Fixed(f64),
}

/// Process controls of a FORM run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormControls {
    pub max_iterations: usize,
    /// Relative tolerance on the design point and on β
    pub tol_rel: f64,
    /// Absolute tolerance on |g(x)|
    pub tol_ls: Tolerance,
    /// Finite difference step, as a fraction of the equivalent mean
    pub dh: f64,
    pub difference: FiniteDifference,
    pub method: FormMethod,
}

impl Default for FormControls {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tol_rel: 0.01,
            tol_ls: Tolerance::Auto,
            dh: 0.05,
            difference: FiniteDifference::Forward,
            method: FormMethod::Ihlrf,
        }
    }
}

impl FormControls {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(AnalysisError::InvalidControls(msg.to_string()));
        if self.max_iterations == 0 {
            return invalid("max_iterations must be at least 1");
        }
        if self.tol_rel.is_nan() || self.tol_rel < 0.0 {
            return invalid("tol_rel must not be negative");
        }
        if matches!(self.tol_ls, Tolerance::Fixed(tol) if tol.is_nan() || tol < 0.0) {
            return invalid("tol_ls must not be negative");
        }
        if !(self.dh > 0.0 && self.dh.is_finite()) {
            return invalid("dh must be positive");
        }
        Ok(())
    }
}

/// Fine tuning of the iHLRF and rHLRF steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormOptions {
    pub forced_step: ForcedStep,
    /// Factor applied to the computed penalty `ck`; 0 with `ck_offset` gives a fixed `ck`
    pub ck_factor: f64,
    pub ck_offset: f64,
    /// Armijo sufficient decrease parameter `a`
    pub armijo_a: f64,
    /// Trial steps are `b^n`
    pub armijo_b: f64,
    /// Trial steps evaluated per external model batch
    pub step_block: usize,
    /// rHLRF relaxation factor
    pub relaxation: f64,
    /// Log each external model result table at debug level
    pub debug_model_output: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            forced_step: ForcedStep::Auto,
            ck_factor: 2.0,
            ck_offset: 0.0,
            armijo_a: 0.1,
            armijo_b: 0.5,
            step_block: 4,
            relaxation: 0.5,
            debug_model_output: false,
        }
    }
}

impl FormOptions {
    /// Set an option from text. Accepts the field names as well as the
    /// historical keys (`iHLRF_par_b`, `rHLRF_relax`, `APDLdebug`, ...).
    pub fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |reason: &str| AnalysisError::InvalidOption {
            option: key.to_string(),
            reason: reason.to_string(),
        };
        let number = || {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid("expected a number"))
        };

        match key.trim().to_lowercase().as_str() {
            "forced_step" | "ihlrf_forced_lambdk" => {
                self.forced_step = if value.trim().eq_ignore_ascii_case("auto") {
                    ForcedStep::Auto
                } else {
                    ForcedStep::Fixed(number()?)
                };
            }
            "ck_factor" | "ihlrf_prod_ck" => self.ck_factor = number()?,
            "ck_offset" | "ihlrf_add_ck" => self.ck_offset = number()?,
            "armijo_a" | "ihlrf_par_a" => self.armijo_a = number()?,
            "armijo_b" | "ihlrf_par_b" => {
                let b = number()?;
                if !(b > 0.0 && b < 1.0) {
                    return Err(invalid("must be within (0, 1)"));
                }
                self.armijo_b = b;
            }
            "step_block" | "ihlrf_step_lambdk_test" => {
                let block = number()?;
                if block.is_nan() || block < 1.0 {
                    return Err(invalid("must be at least 1"));
                }
                self.step_block = block as usize;
            }
            "relaxation" | "rhlrf_relax" => self.relaxation = number()?,
            "debug_model_output" | "apdldebug" => {
                self.debug_model_output = match value.trim().to_lowercase().as_str() {
                    "true" | "1" | "yes" | "on" => true,
                    "false" | "0" | "no" | "off" => false,
                    _ => return Err(invalid("expected a boolean")),
                };
            }
            _ => return Err(invalid("unknown option")),
        }
        tracing::info!("Option \"{key}\" set to \"{value}\"");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |option: &str, reason: &str| {
            Err(AnalysisError::InvalidOption {
                option: option.to_string(),
                reason: reason.to_string(),
            })
        };
        if !(self.armijo_b > 0.0 && self.armijo_b < 1.0) {
            return invalid("armijo_b", "must be within (0, 1)");
        }
        if self.step_block == 0 {
            return invalid("step_block", "must be at least 1");
        }
        Ok(())
    }
}

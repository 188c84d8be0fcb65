//! First Order Reliability Method
//!
//! Searches the most probable failure point (design point) of a limit state
//! in the standard normal space. Random variables are mapped with the
//! equivalent normal transformation and correlated through the Nataf model.
//!
//! ```ignore
//! let mut form = Form::new();
//! form.create_variable("y", "gauss", 40.0, 0.0, Some(0.125))?;
//! form.create_variable("z", "gauss", 50.0, 0.0, Some(0.05))?;
//! form.create_variable("m", "gumbel", 1000.0, 200.0, None)?;
//! form.set_limit_state(LimitState::expression("y*z - m")?);
//! let result = form.run()?;
//! ```

mod controls;
mod export;
mod result;
mod solver;

pub use controls::{FiniteDifference, ForcedStep, FormControls, FormMethod, FormOptions, Tolerance};
pub use result::{FormResult, SolutionStatus};

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::error::{AnalysisError, Result, VariableError};
use crate::evaluator::ExternalModel;
use crate::limit_state::LimitState;
use crate::model::{VariableSet, normalize_name};
use crate::problem::Problem;
use crate::report::write_csv;
use solver::Solver;

/// A FORM analysis: variables, limit state, controls and the last result
#[derive(Default)]
pub struct Form {
    problem: Problem,
    start: FxHashMap<String, f64>,
    controls: FormControls,
    options: FormOptions,
    result: Option<FormResult>,
}

impl Form {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable. `distribution` is a distribution name or `constant`;
    /// a constant takes `mean` as its value.
    pub fn create_variable(
        &mut self,
        name: &str,
        distribution: &str,
        mean: f64,
        std: f64,
        cv: Option<f64>,
    ) -> Result<()> {
        self.problem
            .variables_mut()
            .create(name, distribution, mean, std, cv)?;
        Ok(())
    }

    pub fn set_correlation(&mut self, a: &str, b: &str, rho: f64) -> Result<()> {
        self.problem.variables_mut().set_correlation(a, b, rho)?;
        Ok(())
    }

    /// Point where the search starts; random variables default to their mean.
    pub fn set_start_point(&mut self, name: &str, value: f64) -> Result<()> {
        let name = normalize_name(name)?;
        let variables = self.problem.variables();
        if variables.random_index(&name).is_none() {
            return Err(if variables.contains(&name) {
                VariableError::NotRandom(name).into()
            } else {
                VariableError::NotDeclared(name).into()
            });
        }
        tracing::info!("Variable \"{name}\" will start the process at point {value}");
        self.start.insert(name, value);
        Ok(())
    }

    /// Starting point of every random variable, in declaration order
    pub fn start_point(&self) -> Vec<(String, f64)> {
        self.problem
            .variables()
            .random()
            .iter()
            .map(|v| {
                let value = self
                    .start
                    .get(&v.name)
                    .copied()
                    .unwrap_or(v.distribution.mean);
                (v.name.clone(), value)
            })
            .collect()
    }

    pub fn set_limit_state(&mut self, limit_state: LimitState) {
        self.problem.set_limit_state(limit_state);
    }

    pub fn set_external_model(&mut self, model: Box<dyn ExternalModel>) -> Result<()> {
        self.problem.set_external_model(model)
    }

    pub fn variables(&self) -> &VariableSet {
        self.problem.variables()
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn controls(&self) -> &FormControls {
        &self.controls
    }

    pub fn set_controls(&mut self, controls: FormControls) -> Result<()> {
        controls.validate()?;
        self.controls = controls;
        Ok(())
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut FormOptions {
        &mut self.options
    }

    /// Set an option by key, e.g. `set_option("iHLRF_par_b", "0.4")`
    pub fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        self.options.set_option(key, value)
    }

    /// Validate the setup and return the names the limit state reads
    pub fn check(&self) -> Result<Vec<String>> {
        self.problem.check()
    }

    /// Run the design point search with the current controls.
    pub fn run(&mut self) -> Result<&FormResult> {
        self.controls.validate()?;
        self.options.validate()?;
        self.result = None;

        let start: Vec<f64> = self.start_point().into_iter().map(|(_, v)| v).collect();
        let solver = Solver::new(&mut self.problem, &self.controls, &self.options)?;
        let result = solver.run(start)?;
        Ok(self.result.insert(result))
    }

    pub fn result(&self) -> Option<&FormResult> {
        self.result.as_ref()
    }

    /// Exit status of the last run
    pub fn status(&self) -> SolutionStatus {
        self.result
            .as_ref()
            .map_or(SolutionStatus::NotRun, |r| r.status)
    }

    /// CSV report of the last run
    pub fn report_csv(&self, description: Option<&str>) -> Result<String> {
        export::form_report(self, description)
    }

    /// Write the CSV report to `path` (".csv" appended when missing).
    pub fn export_csv(&self, path: &Path, description: Option<&str>) -> Result<PathBuf> {
        let content = self.report_csv(description)?;
        write_csv(path, &content).map_err(|e| AnalysisError::Io(e.to_string()))
    }
}

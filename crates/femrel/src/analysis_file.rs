//! YAML description of an analysis
//!
//! ```yaml
//! description: Ang & Tang 6.10
//! variables:
//!   - { name: y, distribution: logn, mean: 40, cv: 0.125 }
//!   - { name: z, distribution: logn, mean: 50, cv: 0.05 }
//!   - { name: m, distribution: gumbel, mean: 1000, std: 200 }
//! correlations:
//!   - { first: y, second: z, rho: 0.4 }
//! limit_state: y*z - m
//! sampling:
//!   - { name: m, distribution: gumbel, mean: 1400, std: 200 }
//! form:
//!   controls: { method: ihlrf, tol_rel: 0.001, dh: 0.01 }
//! monte_carlo: { samples_per_cycle: 1000, max_cycles: 500, target_cvpf: 0.05 }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, eyre};
use femrel_core::{
    AnsysPds, AnsysSettings, ExternalModel, Form, FormControls, FormOptions, LimitState,
    MonteCarlo, MonteCarloControls,
};
use serde::{Deserialize, Serialize};

/// A random or constant variable. Constants take `mean` (or `value`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableData {
    pub name: String,
    pub distribution: String,
    #[serde(default, alias = "value")]
    pub mean: f64,
    #[serde(default)]
    pub std: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationData {
    pub first: String,
    pub second: String,
    pub rho: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormData {
    #[serde(default)]
    pub controls: FormControls,
    #[serde(default)]
    pub options: FormOptions,
    /// Starting point of the search; missing variables start at their mean
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub start: HashMap<String, f64>,
}

/// ANSYS PDS model used as the external model of the analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsysData {
    #[serde(default)]
    pub settings: AnsysSettings,
    /// APDL input file, relative to the analysis file
    pub model: PathBuf,
    #[serde(default)]
    pub extra_files: Vec<PathBuf>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Top-level analysis file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub variables: Vec<VariableData>,
    #[serde(default)]
    pub correlations: Vec<CorrelationData>,
    pub limit_state: String,
    /// Importance sampling distributions (Monte Carlo only)
    #[serde(default)]
    pub sampling: Vec<VariableData>,
    #[serde(default)]
    pub form: FormData,
    #[serde(default)]
    pub monte_carlo: MonteCarloControls,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ansys: Option<AnsysData>,
}

/// The setup steps FORM and Monte Carlo share
trait Setup {
    fn create_variable(&mut self, v: &VariableData) -> femrel_core::Result<()>;
    fn set_correlation(&mut self, c: &CorrelationData) -> femrel_core::Result<()>;
    fn set_limit_state(&mut self, limit_state: LimitState);
    fn set_external_model(&mut self, model: Box<dyn ExternalModel>) -> femrel_core::Result<()>;
}

macro_rules! impl_setup {
    ($analysis:ty) => {
        impl Setup for $analysis {
            fn create_variable(&mut self, v: &VariableData) -> femrel_core::Result<()> {
                <$analysis>::create_variable(self, &v.name, &v.distribution, v.mean, v.std, v.cv)
            }

            fn set_correlation(&mut self, c: &CorrelationData) -> femrel_core::Result<()> {
                <$analysis>::set_correlation(self, &c.first, &c.second, c.rho)
            }

            fn set_limit_state(&mut self, limit_state: LimitState) {
                <$analysis>::set_limit_state(self, limit_state)
            }

            fn set_external_model(
                &mut self,
                model: Box<dyn ExternalModel>,
            ) -> femrel_core::Result<()> {
                <$analysis>::set_external_model(self, model)
            }
        }
    };
}

impl_setup!(Form);
impl_setup!(MonteCarlo);

impl AnalysisFile {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_saphyr::Error> {
        serde_saphyr::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, serde_saphyr::ser::Error> {
        serde_saphyr::to_string(self)
    }

    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml(&content).map_err(|e| eyre!("invalid analysis file {}: {e}", path.display()))
    }

    fn declare<A: Setup>(&self, analysis: &mut A, base_dir: &Path) -> color_eyre::Result<()> {
        for v in &self.variables {
            analysis
                .create_variable(v)
                .wrap_err_with(|| format!("variable \"{}\"", v.name))?;
        }
        for c in &self.correlations {
            analysis
                .set_correlation(c)
                .wrap_err_with(|| format!("correlation {}-{}", c.first, c.second))?;
        }
        if let Some(ansys) = &self.ansys {
            let model = ansys.build(base_dir)?;
            analysis
                .set_external_model(Box::new(model))
                .wrap_err("ANSYS model")?;
        }
        let limit_state = LimitState::expression(&self.limit_state).wrap_err("limit state")?;
        analysis.set_limit_state(limit_state);
        Ok(())
    }

    /// FORM analysis described by the file; relative paths resolve against `base_dir`
    pub fn build_form(&self, base_dir: &Path) -> color_eyre::Result<Form> {
        let mut form = Form::new();
        self.declare(&mut form, base_dir)?;
        form.set_controls(self.form.controls.clone())
            .wrap_err("FORM controls")?;
        *form.options_mut() = self.form.options.clone();
        for (name, value) in &self.form.start {
            form.set_start_point(name, *value)
                .wrap_err_with(|| format!("start point of \"{name}\""))?;
        }
        Ok(form)
    }

    /// Monte Carlo analysis described by the file. `seed` overrides the file's seed.
    pub fn build_monte_carlo(
        &self,
        base_dir: &Path,
        seed: Option<u64>,
    ) -> color_eyre::Result<MonteCarlo> {
        let mut mc = MonteCarlo::new();
        self.declare(&mut mc, base_dir)?;
        for s in &self.sampling {
            mc.set_sampling_distribution(&s.name, &s.distribution, s.mean, s.std, s.cv)
                .wrap_err_with(|| format!("sampling distribution of \"{}\"", s.name))?;
        }
        let mut controls = self.monte_carlo.clone();
        if let Some(seed) = seed {
            controls.seed = seed;
        }
        mc.set_controls(controls).wrap_err("Monte Carlo controls")?;
        Ok(mc)
    }
}

impl AnsysData {
    fn build(&self, base_dir: &Path) -> color_eyre::Result<AnsysPds> {
        let mut pds = AnsysPds::new(self.settings.clone()).wrap_err("ANSYS settings")?;
        pds.set_model(&self.model, &self.extra_files, base_dir)
            .wrap_err("ANSYS model files")?;
        for name in &self.inputs {
            pds.create_input(name)?;
        }
        for name in &self.outputs {
            pds.create_output(name)?;
        }
        Ok(pds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use femrel_core::{FormMethod, SolutionStatus, Tolerance};

    const ANG_TANG: &str = r#"
description: Ang & Tang 6.9
variables:
  - { name: y, distribution: gauss, mean: 40, cv: 0.125 }
  - { name: z, distribution: gauss, mean: 50, cv: 0.05 }
  - { name: m, distribution: gauss, mean: 1000, std: 200 }
  - { name: c, distribution: const, value: 0 }
correlations:
  - { first: y, second: z, rho: 0.4 }
limit_state: y*z - m + c
sampling:
  - { name: m, distribution: gauss, mean: 1400, std: 200 }
form:
  controls:
    method: hlrf
    tol_rel: 0.001
    dh: 0.01
    tol_ls: auto
  start:
    m: 1200
monte_carlo:
  samples_per_cycle: 500
  max_cycles: 4
  seed: 3
"#;

    #[test]
    fn test_parse_analysis_file() {
        let file = AnalysisFile::from_yaml(ANG_TANG).unwrap();
        assert_eq!(file.description.as_deref(), Some("Ang & Tang 6.9"));
        assert_eq!(file.variables.len(), 4);
        assert_eq!(file.variables[3].mean, 0.0);
        assert_eq!(file.variables[0].cv, Some(0.125));
        assert_eq!(file.correlations[0].rho, 0.4);
        assert_eq!(file.form.controls.method, FormMethod::Hlrf);
        assert_eq!(file.form.controls.tol_ls, Tolerance::Auto);
        assert_eq!(file.form.controls.max_iterations, 50);
        assert_eq!(file.form.start.get("m"), Some(&1200.0));
        assert_eq!(file.monte_carlo.samples_per_cycle, 500);
        assert!(file.ansys.is_none());
    }

    #[test]
    fn test_build_and_run_form() {
        let file = AnalysisFile::from_yaml(ANG_TANG).unwrap();
        let mut form = file.build_form(Path::new(".")).unwrap();
        assert_eq!(form.start_point()[2], ("m".to_string(), 1200.0));
        let result = form.run().unwrap();
        assert_eq!(result.status, SolutionStatus::Converged);
        assert!((result.beta - 2.863).abs() < 1e-2);
    }

    #[test]
    fn test_build_monte_carlo_with_seed_override() {
        let file = AnalysisFile::from_yaml(ANG_TANG).unwrap();
        let mc = file.build_monte_carlo(Path::new("."), Some(77)).unwrap();
        assert_eq!(mc.controls().seed, 77);
        assert_eq!(mc.sampling_distributions().count(), 1);
    }

    #[test]
    fn test_bad_variable_is_reported() {
        let yaml = ANG_TANG.replace("distribution: const", "distribution: weibull");
        let file = AnalysisFile::from_yaml(&yaml).unwrap();
        let Err(err) = file.build_form(Path::new(".")) else {
            panic!("an unknown distribution must be rejected");
        };
        assert!(format!("{err:#}").contains("variable \"c\""));
    }

    #[test]
    fn test_yaml_round_trip() {
        let file = AnalysisFile::from_yaml(ANG_TANG).unwrap();
        let yaml = file.to_yaml().unwrap();
        assert_eq!(AnalysisFile::from_yaml(&yaml).unwrap(), file);
    }
}

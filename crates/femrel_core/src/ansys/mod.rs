//! ANSYS batch driver
//!
//! Runs an APDL model through the Probabilistic Design System with a user
//! supplied sample file, so a whole batch of input combinations costs a single
//! ANSYS launch. Inputs and outputs are APDL parameters of the model; their
//! names are kept uppercase.

mod files;
mod settings;

pub use files::{PdsResults, parse_results, pds_script, sample_file};
pub use settings::{AnsysSettings, SampleErrorPolicy};

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{AnsysError, ModelError};
use crate::evaluator::{ExternalModel, SampleBatch};

fn io_error(path: &Path, e: std::io::Error) -> AnsysError {
    AnsysError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

#[derive(Debug, Clone)]
struct ModelFiles {
    input: PathBuf,
    extra: Vec<PathBuf>,
}

impl ModelFiles {
    /// File names the model occupies inside the run location
    fn names(&self) -> Vec<String> {
        let mut names = vec![files::MODEL_SCRIPT.to_string()];
        names.extend(
            self.extra
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned()),
        );
        names
    }
}

/// APDL model evaluated in batch through the ANSYS PDS
#[derive(Debug)]
pub struct AnsysPds {
    settings: AnsysSettings,
    model: Option<ModelFiles>,
    inputs: Vec<String>,
    input_values: Vec<Option<Vec<f64>>>,
    outputs: Vec<String>,
    length: usize,
}

impl AnsysPds {
    /// Check the executable and create the run location.
    pub fn new(settings: AnsysSettings) -> Result<Self, AnsysError> {
        if !settings.executable.is_file() {
            return Err(AnsysError::ExecutableNotFound(
                settings.executable.display().to_string(),
            ));
        }
        fs::create_dir_all(&settings.run_location)
            .map_err(|e| io_error(&settings.run_location, e))?;

        tracing::info!(
            "ANSYS driver ready: executable={}, run_location={}, jobname={}, nproc={}",
            settings.executable.display(),
            settings.run_location.display(),
            settings.jobname,
            settings.nproc
        );

        Ok(Self {
            settings,
            model: None,
            inputs: Vec::new(),
            input_values: Vec::new(),
            outputs: Vec::new(),
            length: 0,
        })
    }

    pub fn settings(&self) -> &AnsysSettings {
        &self.settings
    }

    /// Copy the APDL input file (as `current.inp`) and any extra files it
    /// reads into the run location. Relative names resolve against `directory`.
    pub fn set_model(
        &mut self,
        input_file: &Path,
        extra_files: &[PathBuf],
        directory: &Path,
    ) -> Result<(), AnsysError> {
        let input = directory.join(input_file);
        let extra: Vec<PathBuf> = extra_files.iter().map(|f| directory.join(f)).collect();
        for path in std::iter::once(&input).chain(&extra) {
            if !path.is_file() {
                return Err(AnsysError::MissingFile(path.display().to_string()));
            }
        }

        let model = ModelFiles { input, extra };
        self.copy_model(&model)?;
        tracing::info!("ANSYS model set to \"{}\"", model.input.display());
        self.model = Some(model);
        Ok(())
    }

    fn copy_model(&self, model: &ModelFiles) -> Result<(), AnsysError> {
        let target = self.settings.run_location.join(files::MODEL_SCRIPT);
        fs::copy(&model.input, &target).map_err(|e| io_error(&target, e))?;
        for file in &model.extra {
            if let Some(name) = file.file_name() {
                let target = self.settings.run_location.join(name);
                fs::copy(file, &target).map_err(|e| io_error(&target, e))?;
            }
        }
        Ok(())
    }

    fn declared(&self, name: &str) -> bool {
        self.inputs.iter().chain(&self.outputs).any(|n| *n == name)
    }

    fn apdl_name(name: &str) -> Result<String, AnsysError> {
        let name = name.trim().to_uppercase();
        if name.is_empty() {
            return Err(AnsysError::UnknownVariable(name));
        }
        Ok(name)
    }

    /// Declare an APDL parameter the PDS sets before each run
    pub fn create_input(&mut self, name: &str) -> Result<(), AnsysError> {
        let name = Self::apdl_name(name)?;
        if self.declared(&name) {
            return Err(AnsysError::DuplicateVariable(name));
        }
        tracing::info!("ANSYS input variable \"{name}\" created");
        self.inputs.push(name);
        self.clear_values();
        Ok(())
    }

    /// Declare an APDL parameter read back after each run
    pub fn create_output(&mut self, name: &str) -> Result<(), AnsysError> {
        let name = Self::apdl_name(name)?;
        if self.declared(&name) {
            return Err(AnsysError::DuplicateVariable(name));
        }
        tracing::info!("Variable \"{name}\" declared as ANSYS output variable");
        self.outputs.push(name);
        self.clear_values();
        Ok(())
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of samples in the next run. Values must be cleared first.
    pub fn set_length(&mut self, length: usize) -> Result<(), AnsysError> {
        if self.input_values.iter().any(Option::is_some) {
            return Err(AnsysError::LengthLocked);
        }
        if length == 0 {
            return Err(AnsysError::InvalidLength(length));
        }
        self.length = length;
        tracing::debug!("ANSYS analysis length set to {length}");
        Ok(())
    }

    /// Store the samples of an input; extra values beyond the length are dropped.
    pub fn set_input_values(&mut self, name: &str, values: &[f64]) -> Result<(), AnsysError> {
        if self.length == 0 {
            return Err(AnsysError::InvalidLength(0));
        }
        let name = Self::apdl_name(name)?;
        let index = self
            .inputs
            .iter()
            .position(|n| *n == name)
            .ok_or_else(|| AnsysError::UnknownVariable(name.clone()))?;
        if values.len() < self.length {
            return Err(AnsysError::TooFewValues {
                name,
                expected: self.length,
                found: values.len(),
            });
        }
        if values.len() > self.length {
            tracing::warn!(
                "{} values given to \"{name}\", only the first {} are used",
                values.len(),
                self.length
            );
        }
        self.input_values[index] = Some(values[..self.length].to_vec());
        Ok(())
    }

    pub fn clear_values(&mut self) {
        self.input_values = vec![None; self.inputs.len()];
    }

    /// Forget the model, the variables and the length
    pub fn clear_all(&mut self) {
        self.model = None;
        self.inputs.clear();
        self.outputs.clear();
        self.input_values.clear();
        self.length = 0;
        tracing::info!("ANSYS model and variables cleared");
    }

    fn prepare_run_location(&self, model: &ModelFiles) -> Result<(), AnsysError> {
        let location = &self.settings.run_location;
        if self.settings.clear_dir {
            let keep = model.names();
            let entries = fs::read_dir(location).map_err(|e| io_error(location, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| io_error(location, e))?;
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                if path.is_file() && !keep.contains(&name) {
                    fs::remove_file(&path).map_err(|e| io_error(&path, e))?;
                }
            }
        } else if self.settings.override_lock {
            let lock = location.join(format!("{}.lock", self.settings.jobname));
            if lock.is_file() {
                tracing::warn!("Removing lock file \"{}\"", lock.display());
                fs::remove_file(&lock).map_err(|e| io_error(&lock, e))?;
            }
        }

        // results of an earlier run must never be read back as this run's
        let stale = [
            location.join(format!("{}.err", self.settings.jobname)),
            location.join(files::results_file(&self.settings.jobname)),
        ];
        for path in &stale {
            if path.is_file() {
                fs::remove_file(path).map_err(|e| io_error(path, e))?;
            }
        }
        Ok(())
    }

    fn staged_inputs(&self) -> Result<Vec<(String, Vec<f64>)>, AnsysError> {
        self.inputs
            .iter()
            .zip(&self.input_values)
            .map(|(name, values)| match values {
                Some(v) => Ok((name.clone(), v.clone())),
                None => Err(AnsysError::TooFewValues {
                    name: name.clone(),
                    expected: self.length,
                    found: 0,
                }),
            })
            .collect()
    }

    /// Write the batch files and run ANSYS on the stored values.
    pub fn run(&mut self) -> Result<(), AnsysError> {
        let model = self.model.as_ref().ok_or(AnsysError::ModelNotSet)?;
        if self.outputs.is_empty() {
            return Err(AnsysError::NoOutputs);
        }
        if self.length == 0 {
            return Err(AnsysError::InvalidLength(0));
        }
        let inputs = self.staged_inputs()?;

        self.prepare_run_location(model)?;

        let location = &self.settings.run_location;
        let script = location.join(files::PDS_SCRIPT);
        fs::write(&script, pds_script(&inputs, &self.outputs))
            .map_err(|e| io_error(&script, e))?;
        let samples = location.join(files::SAMPLE_FILE);
        fs::write(&samples, sample_file(&inputs, self.length))
            .map_err(|e| io_error(&samples, e))?;

        tracing::info!("Running ANSYS on {} sample(s)", self.length);
        let output = Command::new(&self.settings.executable)
            .current_dir(location)
            .arg("-np")
            .arg(self.settings.nproc.to_string())
            .arg("-j")
            .arg(&self.settings.jobname)
            .args(["-b", "-i", files::PDS_SCRIPT, "-o", files::OUTPUT_FILE])
            .args(&self.settings.extra_flags)
            .output()
            .map_err(|e| io_error(&self.settings.executable, e))?;

        if !output.status.success() {
            return Err(AnsysError::Process {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        tracing::info!("ANSYS run finished");
        Ok(())
    }

    /// Output columns of the last run, truncated to the length
    pub fn read_outputs(&self) -> Result<PdsResults, AnsysError> {
        let path = self
            .settings
            .run_location
            .join(files::results_file(&self.settings.jobname));
        if !path.is_file() {
            return Err(AnsysError::MissingFile(path.display().to_string()));
        }
        tracing::debug!("Importing PDS results from \"{}\"", path.display());
        let text = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
        let results = parse_results(&text, &self.outputs, self.length)?;

        let failed = results.failed_samples();
        if failed > 0 {
            match self.settings.sample_errors {
                SampleErrorPolicy::Warn => tracing::warn!(
                    "ANSYS flagged {failed} sample(s) in the ERR column, their results should not be trusted"
                ),
                SampleErrorPolicy::Fail => {
                    return Err(AnsysError::SampleErrors { samples: failed });
                }
            }
        }
        Ok(results)
    }
}

impl ExternalModel for AnsysPds {
    fn input_names(&self) -> Vec<String> {
        self.inputs.iter().map(|n| n.to_lowercase()).collect()
    }

    fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|n| n.to_lowercase()).collect()
    }

    fn evaluate(&mut self, inputs: &SampleBatch) -> Result<SampleBatch, ModelError> {
        self.clear_values();
        self.set_length(inputs.len())?;
        for name in self.inputs.clone() {
            let values = inputs
                .column(&name)
                .ok_or_else(|| ModelError::MissingInput(name.to_lowercase()))?;
            self.set_input_values(&name, values)?;
        }
        self.run()?;
        Ok(self.read_outputs()?.outputs)
    }

    fn describe(&self) -> Vec<(String, String)> {
        let s = &self.settings;
        let mut props = vec![
            ("ANSYS executable".into(), s.executable.display().to_string()),
            ("Run location".into(), s.run_location.display().to_string()),
            ("Jobname".into(), s.jobname.clone()),
            ("Processors".into(), s.nproc.to_string()),
            ("Override lock".into(), s.override_lock.to_string()),
            ("Clear directory".into(), s.clear_dir.to_string()),
            ("Extra flags".into(), s.extra_flags.join(" ")),
        ];
        if let Some(model) = &self.model {
            props.push(("Input file".into(), model.input.display().to_string()));
            let extra: Vec<String> = model.extra.iter().map(|p| p.display().to_string()).collect();
            props.push(("Extra files".into(), extra.join(" ")));
        }
        props.push(("Inputs".into(), self.inputs.join(" ")));
        props.push(("Outputs".into(), self.outputs.join(" ")));
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(dir: &Path) -> AnsysPds {
        let exe = dir.join("ansys");
        fs::write(&exe, "").unwrap();
        AnsysPds::new(AnsysSettings {
            executable: exe,
            run_location: dir.join("run"),
            ..AnsysSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn test_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let result = AnsysPds::new(AnsysSettings {
            executable: dir.path().join("nope"),
            ..AnsysSettings::default()
        });
        assert!(matches!(result, Err(AnsysError::ExecutableNotFound(_))));
    }

    #[test]
    fn test_variables_are_uppercase_and_unique() {
        let dir = tempfile::tempdir().unwrap();
        let mut pds = driver(dir.path());
        assert!(dir.path().join("run").is_dir());

        pds.create_input("length").unwrap();
        pds.create_output("sMax").unwrap();
        assert!(matches!(
            pds.create_input("LENGTH"),
            Err(AnsysError::DuplicateVariable(_))
        ));
        assert!(matches!(
            pds.create_input("smax"),
            Err(AnsysError::DuplicateVariable(_))
        ));
        assert_eq!(pds.input_names(), vec!["length"]);
        assert_eq!(pds.output_names(), vec!["smax"]);
    }

    #[test]
    fn test_length_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut pds = driver(dir.path());
        pds.create_input("L").unwrap();

        assert!(matches!(pds.set_length(0), Err(AnsysError::InvalidLength(0))));
        pds.set_length(2).unwrap();
        assert!(matches!(
            pds.set_input_values("l", &[1.0]),
            Err(AnsysError::TooFewValues { .. })
        ));
        pds.set_input_values("l", &[1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(pds.set_length(3), Err(AnsysError::LengthLocked)));
        pds.clear_values();
        pds.set_length(3).unwrap();
        assert!(matches!(
            pds.set_input_values("p", &[1.0, 2.0, 3.0]),
            Err(AnsysError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_set_model_copies_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut pds = driver(dir.path());
        fs::write(dir.path().join("beam.inp"), "/PREP7\n").unwrap();
        fs::write(dir.path().join("mesh.cdb"), "").unwrap();

        pds.set_model(Path::new("beam.inp"), &[PathBuf::from("mesh.cdb")], dir.path())
            .unwrap();
        assert!(dir.path().join("run/current.inp").is_file());
        assert!(dir.path().join("run/mesh.cdb").is_file());

        assert!(matches!(
            pds.set_model(Path::new("missing.inp"), &[], dir.path()),
            Err(AnsysError::MissingFile(_))
        ));
    }

    #[test]
    fn test_run_requires_model_and_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut pds = driver(dir.path());
        assert!(matches!(pds.run(), Err(AnsysError::ModelNotSet)));

        fs::write(dir.path().join("beam.inp"), "").unwrap();
        pds.set_model(Path::new("beam.inp"), &[], dir.path()).unwrap();
        assert!(matches!(pds.run(), Err(AnsysError::NoOutputs)));
    }

    #[test]
    fn test_clear_dir_keeps_model_files() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("ansys");
        fs::write(&exe, "").unwrap();
        let mut pds = AnsysPds::new(AnsysSettings {
            executable: exe,
            run_location: dir.path().join("run"),
            clear_dir: true,
            ..AnsysSettings::default()
        })
        .unwrap();
        fs::write(dir.path().join("beam.inp"), "").unwrap();
        pds.set_model(Path::new("beam.inp"), &[], dir.path()).unwrap();
        fs::write(dir.path().join("run/file.rst"), "").unwrap();
        fs::write(dir.path().join("run/file.err"), "").unwrap();

        let model = pds.model.clone().unwrap();
        pds.prepare_run_location(&model).unwrap();
        assert!(dir.path().join("run/current.inp").is_file());
        assert!(!dir.path().join("run/file.rst").exists());
        assert!(!dir.path().join("run/file.err").exists());
    }

    #[test]
    fn test_previous_results_are_removed_before_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut pds = driver(dir.path());
        fs::write(dir.path().join("beam.inp"), "").unwrap();
        pds.set_model(Path::new("beam.inp"), &[], dir.path()).unwrap();
        pds.create_output("smax").unwrap();
        pds.set_length(1).unwrap();
        fs::write(
            dir.path().join("run/file_current.pdrs"),
            "title\nITER CYCL LOOP ERR SMAX\n1 1 1 0 5.0\n",
        )
        .unwrap();
        fs::write(dir.path().join("run/file.lock"), "").unwrap();
        assert!(pds.read_outputs().is_ok());

        let model = pds.model.clone().unwrap();
        pds.prepare_run_location(&model).unwrap();
        assert!(!dir.path().join("run/file_current.pdrs").exists());
        assert!(dir.path().join("run/file.lock").exists());
        assert!(matches!(pds.read_outputs(), Err(AnsysError::MissingFile(_))));
    }

    #[test]
    fn test_read_outputs_policy() {
        let dir = tempfile::tempdir().unwrap();
        let mut pds = driver(dir.path());
        pds.create_output("smax").unwrap();
        pds.set_length(1).unwrap();
        assert!(matches!(pds.read_outputs(), Err(AnsysError::MissingFile(_))));

        fs::write(
            dir.path().join("run/file_current.pdrs"),
            "title\nITER CYCL LOOP ERR SMAX\n1 1 1 1 5.0\n",
        )
        .unwrap();
        let results = pds.read_outputs().unwrap();
        assert_eq!(results.outputs.column("smax"), Some(&[5.0][..]));

        pds.settings.sample_errors = SampleErrorPolicy::Fail;
        assert!(matches!(
            pds.read_outputs(),
            Err(AnsysError::SampleErrors { samples: 1 })
        ));
    }
}

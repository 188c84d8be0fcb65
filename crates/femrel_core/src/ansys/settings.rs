use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What to do when ANSYS flags samples in the ERR column of its results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleErrorPolicy {
    /// Log a warning and use the values anyway
    #[default]
    Warn,
    /// Abort the analysis
    Fail,
}

/// How and where ANSYS is launched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnsysSettings {
    /// ANSYS executable
    pub executable: PathBuf,
    /// Working directory for the batch runs, preferably a dedicated one
    pub run_location: PathBuf,
    pub jobname: String,
    /// Number of processors (`-np`)
    pub nproc: u32,
    /// Delete `<jobname>.lock` before running, for runs left over by an interrupted session
    pub override_lock: bool,
    /// Delete every file in the run location before each run
    pub clear_dir: bool,
    /// Extra command line flags, e.g. `-aa_r` for academic licenses
    pub extra_flags: Vec<String>,
    pub sample_errors: SampleErrorPolicy,
}

impl Default for AnsysSettings {
    fn default() -> Self {
        Self {
            executable: PathBuf::new(),
            run_location: PathBuf::from("ansys_anl"),
            jobname: "file".into(),
            nproc: 2,
            override_lock: false,
            clear_dir: false,
            extra_flags: Vec::new(),
            sample_errors: SampleErrorPolicy::Warn,
        }
    }
}

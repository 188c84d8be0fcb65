//! Command line front end for `femrel_core`
//!
//! Analyses are described in a YAML file (see [`analysis_file`]) and run with
//! `femrel form <file>` or `femrel monte-carlo <file>`. Results are printed and
//! optionally written as the CSV report and as JSON.

pub mod analysis_file;
pub mod cli;
pub mod logging;
pub mod util;

pub use analysis_file::AnalysisFile;
pub use cli::{Args, Command, RunArgs, run};
pub use logging::init_logging;

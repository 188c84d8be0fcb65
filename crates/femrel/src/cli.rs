//! Command line interface

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::eyre::Context;
use femrel_core::report::{csv_path, sci};
use femrel_core::{FormResult, MonteCarloResult};
use serde::Serialize;

use crate::analysis_file::AnalysisFile;
use crate::util::io::atomic_write;

#[derive(Parser, Debug)]
#[command(name = "femrel")]
#[command(about = "Structural reliability analysis with FORM and Monte Carlo simulation")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the design point with FORM
    Form(RunArgs),

    /// Estimate the failure probability by simulation
    #[command(name = "monte-carlo", alias = "mc")]
    MonteCarlo(RunArgs),

    /// Validate an analysis file without running it
    Check {
        /// Analysis file (YAML)
        file: PathBuf,
    },
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    /// Analysis file (YAML)
    pub file: PathBuf,

    /// Write the CSV report here (".csv" appended when missing)
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Write the result as JSON here
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Report description, overrides the one in the file
    #[arg(short, long)]
    pub description: Option<String>,

    /// Random seed, overrides the one in the file (Monte Carlo only)
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Directory relative model paths of `file` resolve against
fn base_dir(file: &Path) -> &Path {
    file.parent().unwrap_or(Path::new("."))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> color_eyre::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, &json).wrap_err_with(|| format!("failed to write {}", path.display()))?;
    tracing::info!("Result written to \"{}\"", path.display());
    Ok(())
}

fn write_report(path: &Path, report: &str) -> color_eyre::Result<()> {
    let path = csv_path(path);
    atomic_write(&path, report).wrap_err_with(|| format!("failed to write {}", path.display()))?;
    tracing::info!("Data exported to \"{}\"", path.display());
    Ok(())
}

fn print_form(out: &mut impl Write, result: &FormResult) -> std::io::Result<()> {
    writeln!(
        out,
        "FORM finished with status {} after {} cycles",
        result.status.code(),
        result.cycles
    )?;
    writeln!(out, "  beta = {}", sci(result.beta, 5))?;
    writeln!(out, "  Pf   = {}", sci(result.pf, 5))?;
    writeln!(out, "  Design point:")?;
    for ((name, x), alpha) in result
        .variables
        .iter()
        .zip(&result.design_point)
        .zip(&result.alpha)
    {
        writeln!(out, "    {name:<12} {:>13}  alpha = {alpha:+.4}", sci(*x, 5))?;
    }
    Ok(())
}

fn print_monte_carlo(out: &mut impl Write, result: &MonteCarloResult) -> std::io::Result<()> {
    writeln!(
        out,
        "Monte Carlo finished with status {} after {} cycles ({} samples)",
        result.status.code(),
        result.cycles,
        result.samples
    )?;
    writeln!(out, "  Pf   = {}", sci(result.pf, 5))?;
    writeln!(out, "  beta = {}", sci(result.beta, 5))?;
    writeln!(out, "  CVPf = {}", sci(result.cvpf, 5))?;
    Ok(())
}

fn run_form(args: &RunArgs, out: &mut impl Write) -> color_eyre::Result<()> {
    let file = AnalysisFile::load(&args.file)?;
    let description = args.description.as_deref().or(file.description.as_deref());
    let mut form = file.build_form(base_dir(&args.file))?;

    let result = form.run().wrap_err("FORM analysis failed")?;
    print_form(out, result)?;
    if let Some(path) = &args.json {
        write_json(path, result)?;
    }
    if let Some(path) = &args.csv {
        write_report(path, &form.report_csv(description)?)?;
    }
    Ok(())
}

fn run_monte_carlo(args: &RunArgs, out: &mut impl Write) -> color_eyre::Result<()> {
    let file = AnalysisFile::load(&args.file)?;
    let description = args.description.as_deref().or(file.description.as_deref());
    let mut mc = file.build_monte_carlo(base_dir(&args.file), args.seed)?;

    let result = mc.run().wrap_err("Monte Carlo analysis failed")?;
    print_monte_carlo(out, result)?;
    if let Some(path) = &args.json {
        write_json(path, result)?;
    }
    if let Some(path) = &args.csv {
        write_report(path, &mc.report_csv(description)?)?;
    }
    Ok(())
}

fn check(file: &Path, out: &mut impl Write) -> color_eyre::Result<()> {
    let analysis = AnalysisFile::load(file)?;
    let form = analysis.build_form(base_dir(file))?;
    let names = form.check()?;
    if !analysis.sampling.is_empty() {
        analysis.build_monte_carlo(base_dir(file), None)?.check()?;
    }
    writeln!(out, "{}: OK", file.display())?;
    writeln!(out, "  limit state reads: {}", names.join(", "))?;
    Ok(())
}

/// Execute a parsed command, printing a summary to `out`
pub fn run(args: &Args, out: &mut impl Write) -> color_eyre::Result<()> {
    match &args.command {
        Command::Form(run_args) => run_form(run_args, out),
        Command::MonteCarlo(run_args) => run_monte_carlo(run_args, out),
        Command::Check { file } => check(file, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const FILE: &str = r#"
description: linear resistance and load
variables:
  - { name: r, distribution: gauss, mean: 150, std: 20 }
  - { name: s, distribution: gauss, mean: 100, std: 15 }
limit_state: r - s
monte_carlo: { samples_per_cycle: 1000, max_cycles: 3, seed: 5 }
"#;

    fn analysis_file(dir: &Path) -> PathBuf {
        let path = dir.join("analysis.yaml");
        fs::write(&path, FILE).unwrap();
        path
    }

    #[test]
    fn test_parse_arguments() {
        let args =
            Args::try_parse_from(["femrel", "mc", "a.yaml", "--seed", "9", "-l", "debug"]).unwrap();
        assert_eq!(args.log_level, "debug");
        match args.command {
            Command::MonteCarlo(run) => {
                assert_eq!(run.file, PathBuf::from("a.yaml"));
                assert_eq!(run.seed, Some(9));
                assert!(run.csv.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Args::try_parse_from(["femrel", "form"]).is_err());
    }

    #[test]
    fn test_form_writes_reports() {
        let dir = tempdir().unwrap();
        let file = analysis_file(dir.path());
        let csv = dir.path().join("form");
        let json = dir.path().join("form.json");
        let args = Args::try_parse_from([
            "femrel",
            "form",
            file.to_str().unwrap(),
            "--csv",
            csv.to_str().unwrap(),
            "--json",
            json.to_str().unwrap(),
        ])
        .unwrap();

        let mut out = Vec::new();
        run(&args, &mut out).unwrap();
        let summary = String::from_utf8(out).unwrap();
        assert!(summary.contains("status 0"));
        assert!(summary.contains("Design point:"));

        let csv = fs::read_to_string(dir.path().join("form.csv")).unwrap();
        assert!(csv.contains("linear resistance and load"));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("form.json")).unwrap())
                .unwrap();
        assert!((json["beta"].as_f64().unwrap() - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_monte_carlo_summary() {
        let dir = tempdir().unwrap();
        let file = analysis_file(dir.path());
        let args = Args::try_parse_from(["femrel", "monte-carlo", file.to_str().unwrap()]).unwrap();
        let mut out = Vec::new();
        run(&args, &mut out).unwrap();
        let summary = String::from_utf8(out).unwrap();
        assert!(summary.contains("after 3 cycles (3000 samples)"));
    }

    #[test]
    fn test_check_lists_limit_state_names() {
        let dir = tempdir().unwrap();
        let file = analysis_file(dir.path());
        let mut out = Vec::new();
        check(&file, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("OK"));
        assert!(text.contains("r, s"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut out = Vec::new();
        let err = check(Path::new("does/not/exist.yaml"), &mut out).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read"));
    }
}

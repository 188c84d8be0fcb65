//! Monte Carlo simulation with importance sampling
//!
//! Samples are drawn in cycles of a fixed size until the coefficient of
//! variation of the failure probability reaches the target or the cycle
//! limit is hit. Any random variable can be sampled from a different
//! distribution; the sample weights correct the estimate, and with adaptive
//! sampling the sampling means follow the weighted centre of the failures.

mod controls;
mod export;
mod result;
mod sampling;

pub use controls::MonteCarloControls;
pub use result::{CycleRecord, MonteCarloResult, SamplingPoint, SolutionControl};

use std::path::{Path, PathBuf};
use std::time::Instant;

use jiff::Timestamp;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{AnalysisError, Result, VariableError};
use crate::evaluator::ExternalModel;
use crate::form::SolutionStatus;
use crate::limit_state::{BoundLimitState, LimitState};
use crate::model::{Distribution, DistributionKind, VariableKind, VariableSet, normalize_name};
use crate::problem::{PointTable, Problem};
use crate::report::write_csv;
use crate::stats::normal_ppf;
use sampling::{Sampler, standard_normals};

/// CVPf below this value is treated as degenerate and never stops the run
const MIN_CVPF: f64 = 1e-5;

/// Cycles that always run before the stop rules apply
const WARMUP_CYCLES: usize = 3;

/// A Monte Carlo analysis: variables, limit state, sampling distributions,
/// controls and the last result
#[derive(Default)]
pub struct MonteCarlo {
    problem: Problem,
    sampling: Vec<(String, Distribution)>,
    controls: MonteCarloControls,
    result: Option<MonteCarloResult>,
}

/// Running sums over every simulated sample
#[derive(Debug, Default)]
struct Totals {
    /// Σ Igw
    nf: f64,
    /// Σ Igw²
    nf2: f64,
    /// Σ g²
    s1: f64,
    /// Σ g
    s2: f64,
}

impl Totals {
    fn add(&mut self, g: &[f64], igw: &[f64]) {
        for (&g, &w) in g.iter().zip(igw) {
            self.nf += w;
            self.nf2 += w * w;
            self.s1 += g * g;
            self.s2 += g;
        }
    }

    fn record(&self, n: usize) -> CycleRecord {
        let nn = n as f64;
        let pf = self.nf / nn;
        let cvpf = if pf > 0.0 {
            ((self.nf2 - self.nf * self.nf / nn).max(0.0) / (nn * (nn - 1.0))).sqrt() / pf
        } else {
            f64::INFINITY
        };
        let g_var = (nn * self.s1 - self.s2 * self.s2) / (nn * (nn - 1.0));
        CycleRecord {
            n,
            pf,
            beta: -normal_ppf(pf),
            cvpf,
            g_mean: self.s2 / nn,
            g_std: g_var.max(0.0).sqrt(),
        }
    }
}

fn limit_values(limit: &BoundLimitState, table: &PointTable) -> Vec<f64> {
    #[cfg(feature = "parallel")]
    let values = table
        .data()
        .par_chunks(table.stride())
        .map(|row| limit.evaluate(row))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let values = table.iter_rows().map(|row| limit.evaluate(row)).collect();

    values
}

impl MonteCarlo {
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

    pub fn set_limit_state(&mut self, limit_state: LimitState) {
        self.problem.set_limit_state(limit_state);
    }

    /// Sample a random variable from another distribution (importance
    /// sampling). The family may differ from the variable's own.
    pub fn set_sampling_distribution(
        &mut self,
        name: &str,
        distribution: &str,
        mean: f64,
        std: f64,
        cv: Option<f64>,
    ) -> Result<()> {
        let name = normalize_name(name)?;
        let variables = self.problem.variables();
        if variables.random_index(&name).is_none() {
            return Err(if variables.contains(&name) {
                VariableError::NotRandom(name).into()
            } else {
                VariableError::NotDeclared(name).into()
            });
        }

        let kind = match VariableKind::parse(distribution) {
            Some(VariableKind::Random(kind)) => kind,
            Some(VariableKind::Constant) => {
                return Err(AnalysisError::InvalidOption {
                    option: format!("sampling distribution of \"{name}\""),
                    reason: "a sampling distribution cannot be constant".into(),
                });
            }
            None => {
                return Err(VariableError::UnknownDistribution {
                    name,
                    distribution: distribution.to_string(),
                }
                .into());
            }
        };

        let dist = Distribution::new(&name, kind, mean, std, cv)?;
        tracing::info!(
            "Variable \"{name}\" will be sampled from {} with mean={}, std={}, cv={}",
            dist.kind,
            dist.mean,
            dist.std,
            dist.cv
        );
        match self.sampling.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = dist,
            None => self.sampling.push((name, dist)),
        }
        Ok(())
    }

    /// Sampling distributions as set, before any adaptation
    pub fn sampling_distributions(&self) -> impl Iterator<Item = (&str, &Distribution)> {
        self.sampling.iter().map(|(n, d)| (n.as_str(), d))
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

    pub fn controls(&self) -> &MonteCarloControls {
        &self.controls
    }

    pub fn set_controls(&mut self, controls: MonteCarloControls) -> Result<()> {
        controls.validate()?;
        tracing::info!(
            "Monte Carlo controls: Ns={}, max cycles={}, CVPf target={}, adaptive={:?}, seed={}",
            controls.samples_per_cycle,
            controls.max_cycles,
            controls.target_cvpf,
            controls.adaptive_tolerance,
            controls.seed
        );
        self.controls = controls;
        Ok(())
    }

    /// Validate the setup and return the names the limit state reads
    pub fn check(&self) -> Result<Vec<String>> {
        self.sampling_slots(self.problem.variables())?;
        self.problem.check()
    }

    /// Sampling distribution of each random variable, in declaration order
    fn sampling_slots(&self, variables: &VariableSet) -> Result<Vec<Option<Distribution>>> {
        let mut slots = vec![None; variables.random().len()];
        for (name, dist) in &self.sampling {
            let index = variables
                .random_index(name)
                .ok_or_else(|| VariableError::NotRandom(name.clone()))?;
            slots[index] = Some(*dist);
        }
        Ok(slots)
    }

    /// Run the simulation cycles with the current controls.
    pub fn run(&mut self) -> Result<&MonteCarloResult> {
        self.controls.validate()?;
        self.result = None;

        let (layout, limit) = self.problem.prepare()?;
        let variables = self.problem.variables();
        let mut sampling = self.sampling_slots(variables)?;
        let distributions: Vec<Distribution> =
            variables.random().iter().map(|v| v.distribution).collect();
        let names: Vec<String> = variables.random().iter().map(|v| v.name.clone()).collect();
        let n = distributions.len();

        let correlation = variables.correlation_matrix();
        if variables.has_correlations() {
            tracing::debug!("Nataf correlation matrix: {correlation:?}");
        }
        let mut sampler = Sampler::new(distributions, sampling.clone(), &correlation)?;

        let mut template = vec![0.0; layout.len()];
        for (slot, constant) in template[n..].iter_mut().zip(variables.constants()) {
            *slot = constant.value;
        }

        let controls = self.controls.clone();
        let ns = controls.samples_per_cycle;
        let rows: Vec<usize> = (0..ns).collect();
        let mut adaptive = controls.adaptive_tolerance;
        let mut adapted_weight = 0.0;
        let mut totals = Totals::default();
        let mut history = Vec::with_capacity(controls.max_cycles);
        let mut status = SolutionStatus::MaxIterationsReached;

        tracing::info!("Starting Monte Carlo simulation with {ns} samples per cycle");
        let start = Instant::now();

        for cycle in 1..=controls.max_cycles {
            let z = standard_normals(n, ns, controls.seed, cycle);
            let mut table = PointTable::filled(ns, &template);
            let weights = sampler.fill(&mut table, &z);
            self.problem.run_model(&layout, &mut table, &rows, false)?;

            let g = limit_values(&limit, &table);
            let igw: Vec<f64> = g
                .iter()
                .zip(&weights)
                .map(|(&g, &w)| if g <= 0.0 { w } else { 0.0 })
                .collect();
            totals.add(&g, &igw);

            let record = totals.record(cycle * ns);
            tracing::info!(
                "Cycle {cycle}: N={}, Pf={:.4e}, Beta={:.3}, CVPf={:.3}, g mean={:.4e}, g std={:.4e}",
                record.n,
                record.pf,
                record.beta,
                record.cvpf,
                record.g_mean,
                record.g_std
            );
            history.push(record);

            if record.cvpf <= controls.target_cvpf
                && cycle > WARMUP_CYCLES
                && record.cvpf > MIN_CVPF
            {
                status = SolutionStatus::Converged;
                break;
            }

            let Some(tolerance) = adaptive else {
                continue;
            };

            // move each sampling mean to the weighted centre of all failures so far
            let current_weight: f64 = igw.iter().sum();
            let total_weight = adapted_weight + current_weight;
            let mut max_error = 0.0_f64;
            for (i, slot) in sampling.iter_mut().enumerate() {
                let Some(h) = slot else { continue };
                if total_weight <= 0.0 {
                    max_error = f64::INFINITY;
                    continue;
                }
                let weighted: f64 = igw
                    .iter()
                    .enumerate()
                    .map(|(row, w)| table.row(row)[i] * w)
                    .sum();
                let point = (h.mean * adapted_weight + weighted) / total_weight;
                if h.kind == DistributionKind::LogNormal && point <= 0.0 {
                    tracing::warn!(
                        "Sampling point of \"{}\" would leave the lognormal support ({point}); kept at {}",
                        names[i],
                        h.mean
                    );
                    max_error = f64::INFINITY;
                    continue;
                }
                let error = (point - h.mean).abs() / point.abs();
                tracing::debug!(
                    "Sampling point of \"{}\": {} -> {point} (relative change {error:.3e})",
                    names[i],
                    h.mean
                );
                max_error = max_error.max(error);
                *h = h.with_mean(point);
                sampler.set_sampling(i, *h);
            }
            adapted_weight = total_weight;

            if max_error <= tolerance && cycle > WARMUP_CYCLES {
                tracing::info!(
                    "Sampling point converged at cycle {cycle} (max relative change {max_error:.3e})"
                );
                adaptive = None;
            }
        }

        let elapsed = start.elapsed();
        let Some(last) = history.last().copied() else {
            return Err(AnalysisError::NoResults);
        };
        if status == SolutionStatus::MaxIterationsReached {
            tracing::warn!(
                "Monte Carlo stopped at the cycle limit ({}) with CVPf={:.3}",
                controls.max_cycles,
                last.cvpf
            );
        }
        tracing::info!(
            "Monte Carlo finished after {} cycles: Pf={:.4e}, Beta={:.3}, CVPf={:.3}",
            history.len(),
            last.pf,
            last.beta,
            last.cvpf
        );

        let sampling_points = names
            .into_iter()
            .zip(sampling)
            .filter_map(|(name, dist)| dist.map(|distribution| SamplingPoint { name, distribution }))
            .collect();

        let result = MonteCarloResult {
            status,
            pf: last.pf,
            beta: last.beta,
            cvpf: last.cvpf,
            sampling_points,
            cycles: history.len(),
            samples: last.n,
            g_mean: last.g_mean,
            g_std: last.g_std,
            history,
            elapsed,
            finished_at: Timestamp::now(),
        };
        Ok(self.result.insert(result))
    }

    pub fn result(&self) -> Option<&MonteCarloResult> {
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
        export::monte_carlo_report(self, description)
    }

    /// Write the CSV report to `path` (".csv" appended when missing).
    pub fn export_csv(&self, path: &Path, description: Option<&str>) -> Result<PathBuf> {
        let content = self.report_csv(description)?;
        write_csv(path, &content).map_err(|e| AnalysisError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PF_BETA_2: f64 = 0.022_750_131_948_179_2;

    fn linear_normal(r_mean: f64) -> MonteCarlo {
        let mut mc = MonteCarlo::new();
        mc.create_variable("r", "normal", r_mean, 20.0, None).unwrap();
        mc.create_variable("s", "normal", 100.0, 15.0, None).unwrap();
        mc.set_limit_state(LimitState::expression("r - s").unwrap());
        mc
    }

    fn controls(samples_per_cycle: usize, max_cycles: usize) -> MonteCarloControls {
        MonteCarloControls {
            samples_per_cycle,
            max_cycles,
            seed: 11,
            ..MonteCarloControls::default()
        }
    }

    #[test]
    fn test_crude_estimate() {
        let mut mc = linear_normal(150.0);
        mc.set_controls(controls(20_000, 5)).unwrap();
        let result = mc.run().unwrap();
        assert_eq!(result.status, SolutionStatus::MaxIterationsReached);
        assert_eq!(result.samples, 100_000);
        assert!((result.pf - PF_BETA_2).abs() / PF_BETA_2 < 0.1, "pf = {}", result.pf);
        assert!((result.g_mean - 50.0).abs() < 0.5);
        assert!((result.g_std - 25.0).abs() < 0.5);
        assert!(result.sampling_points.is_empty());
    }

    #[test]
    fn test_same_seed_same_estimate() {
        let run = |seed| {
            let mut mc = linear_normal(150.0);
            mc.set_controls(MonteCarloControls {
                seed,
                ..controls(2_000, 2)
            })
            .unwrap();
            mc.run().unwrap().pf
        };
        assert_eq!(run(5), run(5));
        assert_ne!(run(5), run(6));
    }

    #[test]
    fn test_stops_at_target_cvpf() {
        let mut mc = linear_normal(150.0);
        mc.set_controls(MonteCarloControls {
            target_cvpf: 0.05,
            ..controls(2_000, 100)
        })
        .unwrap();
        let result = mc.run().unwrap();
        assert_eq!(result.status, SolutionStatus::Converged);
        assert!(result.cycles > WARMUP_CYCLES && result.cycles < 100);
        assert!(result.cvpf <= 0.05);
        assert_eq!(
            result.solution_control(SolutionControl::CvPf).len(),
            result.cycles
        );
    }

    #[test]
    fn test_no_failures() {
        let mut mc = linear_normal(1_000.0);
        mc.set_controls(controls(500, 4)).unwrap();
        let result = mc.run().unwrap();
        assert_eq!(result.pf, 0.0);
        assert!(result.beta.is_infinite() && result.beta > 0.0);
        assert!(result.cvpf.is_infinite());
        assert_eq!(mc.status(), SolutionStatus::MaxIterationsReached);
    }

    #[test]
    fn test_importance_sampling_at_design_point() {
        let mut mc = linear_normal(200.0);
        mc.set_sampling_distribution("r", "normal", 136.0, 20.0, None).unwrap();
        mc.set_sampling_distribution("s", "normal", 136.0, 15.0, None).unwrap();
        mc.set_controls(controls(10_000, 3)).unwrap();
        let exact = crate::stats::normal_cdf(-4.0);
        let result = mc.run().unwrap();
        assert!((result.pf - exact).abs() / exact < 0.1, "pf = {}", result.pf);
        assert!((result.beta - 4.0).abs() < 0.05);
    }

    #[test]
    fn test_adaptive_sampling_moves_towards_failures() {
        let mut mc = linear_normal(150.0);
        mc.set_sampling_distribution("r", "normal", 150.0, 20.0, None).unwrap();
        mc.set_sampling_distribution("s", "normal", 100.0, 15.0, None).unwrap();
        mc.set_controls(MonteCarloControls {
            adaptive_tolerance: Some(0.02),
            ..controls(5_000, 10)
        })
        .unwrap();
        let result = mc.run().unwrap();
        assert!((result.pf - PF_BETA_2).abs() / PF_BETA_2 < 0.1, "pf = {}", result.pf);
        let r = result.sampling_point("r").unwrap();
        let s = result.sampling_point("s").unwrap();
        assert!(r.mean < 130.0 && s.mean > 110.0, "r = {}, s = {}", r.mean, s.mean);
        assert_eq!(r.std, 20.0);
        // the configured starting point is kept for reports
        let start: Vec<f64> = mc.sampling_distributions().map(|(_, d)| d.mean).collect();
        assert_eq!(start, vec![150.0, 100.0]);
    }

    #[test]
    fn test_sampling_distribution_errors() {
        let mut mc = linear_normal(150.0);
        mc.create_variable("c", "const", 1.0, 0.0, None).unwrap();
        assert!(matches!(
            mc.set_sampling_distribution("c", "normal", 1.0, 1.0, None),
            Err(AnalysisError::Variable(VariableError::NotRandom(_)))
        ));
        assert!(matches!(
            mc.set_sampling_distribution("q", "normal", 1.0, 1.0, None),
            Err(AnalysisError::Variable(VariableError::NotDeclared(_)))
        ));
        assert!(matches!(
            mc.set_sampling_distribution("r", "constant", 1.0, 0.0, None),
            Err(AnalysisError::InvalidOption { .. })
        ));
        assert!(matches!(
            mc.set_sampling_distribution("r", "weibull", 1.0, 1.0, None),
            Err(AnalysisError::Variable(VariableError::UnknownDistribution { .. }))
        ));
    }

    #[test]
    fn test_sampled_variable_turned_constant_fails_check() {
        let mut mc = linear_normal(150.0);
        mc.set_sampling_distribution("r", "normal", 120.0, 20.0, None).unwrap();
        mc.create_variable("r", "constant", 150.0, 0.0, None).unwrap();
        assert!(matches!(
            mc.check(),
            Err(AnalysisError::Variable(VariableError::NotRandom(_)))
        ));
    }

    #[test]
    fn test_export_csv_sections() {
        let mut mc = linear_normal(150.0);
        mc.set_sampling_distribution("r", "normal", 130.0, 20.0, None).unwrap();
        mc.set_controls(MonteCarloControls {
            adaptive_tolerance: Some(0.05),
            ..controls(1_000, 4)
        })
        .unwrap();
        assert!(matches!(mc.report_csv(None), Err(AnalysisError::NoResults)));
        mc.run().unwrap();

        let text = mc.report_csv(Some("Linear r-s")).unwrap();
        assert!(text.starts_with("sep=,\nLinear r-s\n"));
        for section in [
            "Simulation controls:",
            ",Ns/Cycle:,1000",
            "Random variables:",
            "Limit state:,\"r - s\"",
            ",,r,gauss,1.30000E+02",
            "Monte Carlo results:",
            "Final sampling point:",
            "Process convergence:",
            ",N,Pf,Beta,CVPf",
            ",4000,",
        ] {
            assert!(text.contains(section), "missing section {section}");
        }
    }
}

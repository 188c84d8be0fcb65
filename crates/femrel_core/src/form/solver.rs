//! Design point search in the reduced space
//!
//! Each cycle linearises the limit state at the current point with the
//! equivalent normal transformation, estimates the gradient by finite
//! differences and moves the point with one of the HLRF variants.

use std::time::Instant;

use jiff::Timestamp;

use super::controls::{FiniteDifference, FormControls, FormMethod, FormOptions, ForcedStep, Tolerance};
use super::result::{FormResult, SolutionStatus};
use crate::error::{AnalysisError, Result};
use crate::limit_state::BoundLimitState;
use crate::linalg::{Matrix, dot, norm};
use crate::model::Distribution;
use crate::problem::{Layout, PointTable, Problem};
use crate::stats::normal_cdf;

/// Finite difference step, relative to the equivalent mean. A zero mean
/// falls back to the absolute step `dh`.
fn difference_step(dh: f64, mean: f64) -> f64 {
    if mean == 0.0 { dh } else { dh * mean }
}

/// Linearisation of the transformation x = μ + Jxy·y at the current point
struct Linearisation {
    mean: Vec<f64>,
    jxy: Matrix,
    jyx: Matrix,
}

/// Outcome of one iHLRF line search
struct LineSearch {
    lambda: f64,
    accepted: bool,
}

pub(super) struct Solver<'a> {
    problem: &'a mut Problem,
    layout: Layout,
    limit: BoundLimitState,
    controls: &'a FormControls,
    options: &'a FormOptions,
    distributions: Vec<Distribution>,
    constants: Vec<f64>,
    /// Random variables read by the external model
    model_inputs: Vec<usize>,
    ck_last: f64,
}

impl<'a> Solver<'a> {
    pub(super) fn new(
        problem: &'a mut Problem,
        controls: &'a FormControls,
        options: &'a FormOptions,
    ) -> Result<Self> {
        let (layout, limit) = problem.prepare()?;
        let variables = problem.variables();
        let distributions = variables.random().iter().map(|v| v.distribution).collect();
        let constants = variables.constants().iter().map(|c| c.value).collect();
        let model_inputs = problem
            .external_model()
            .map(|model| {
                model
                    .input_names()
                    .iter()
                    .filter_map(|name| variables.random_index(&name.to_lowercase()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            problem,
            layout,
            limit,
            controls,
            options,
            distributions,
            constants,
            model_inputs,
            ck_last: 0.0,
        })
    }

    /// Evaluation row for the random point `x`; model outputs start at zero.
    fn template(&self, x: &[f64]) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.layout.len());
        row.extend_from_slice(x);
        row.extend_from_slice(&self.constants);
        row.resize(self.layout.len(), 0.0);
        row
    }

    fn limit_values(&self, table: &PointTable) -> Vec<f64> {
        table.iter_rows().map(|row| self.limit.evaluate(row)).collect()
    }

    fn linearise(&self, x: &[f64], jzy: &Matrix, jyz: &Matrix) -> Result<Linearisation> {
        let mut mean = Vec::with_capacity(x.len());
        let mut std = Vec::with_capacity(x.len());
        for (dist, &xi) in self.distributions.iter().zip(x) {
            let (m, s) = dist.equivalent_normal(xi)?;
            mean.push(m);
            std.push(s);
        }
        let inv_std: Vec<f64> = std.iter().map(|s| 1.0 / s).collect();
        Ok(Linearisation {
            jxy: Matrix::diagonal(&std).mul(jzy),
            jyx: jyz.mul(&Matrix::diagonal(&inv_std)),
            mean,
        })
    }

    /// Limit state values at the current point (index 0) and at the
    /// perturbed points of the finite difference scheme.
    fn difference_values(&mut self, x: &[f64], mean: &[f64]) -> Result<Vec<f64>> {
        let n = x.len();
        let scheme = self.controls.difference;
        let dh = self.controls.dh;

        let mut table = PointTable::filled(1 + scheme.rows_per_variable() * n, &self.template(x));
        for (i, m) in mean.iter().enumerate() {
            let h = difference_step(dh, *m);
            match scheme {
                FiniteDifference::Forward => table.row_mut(i + 1)[i] += h,
                FiniteDifference::Backward => table.row_mut(i + 1)[i] -= h,
                FiniteDifference::Center => {
                    table.row_mut(2 * i + 1)[i] += h;
                    table.row_mut(2 * i + 2)[i] -= h;
                }
            }
        }

        if self.problem.external_model().is_some() {
            // only rows whose inputs differ from the current point are simulated
            let mut send = vec![0];
            for &i in &self.model_inputs {
                match scheme {
                    FiniteDifference::Center => send.extend([2 * i + 1, 2 * i + 2]),
                    _ => send.push(i + 1),
                }
            }
            self.problem.run_model(
                &self.layout,
                &mut table,
                &send,
                self.options.debug_model_output,
            )?;

            let outputs = self.layout.output_range();
            let base = table.row(0)[outputs.clone()].to_vec();
            for row in 1..table.rows() {
                if !send.contains(&row) {
                    table.row_mut(row)[outputs.clone()].copy_from_slice(&base);
                }
            }
        }

        Ok(self.limit_values(&table))
    }

    fn gradient_x(&self, values: &[f64], mean: &[f64]) -> Vec<f64> {
        let g = values[0];
        let dh = self.controls.dh;
        mean.iter()
            .enumerate()
            .map(|(i, m)| {
                let h = difference_step(dh, *m);
                match self.controls.difference {
                    FiniteDifference::Forward => (values[i + 1] - g) / h,
                    FiniteDifference::Backward => (g - values[i + 1]) / h,
                    FiniteDifference::Center => (values[2 * i + 1] - values[2 * i + 2]) / (2.0 * h),
                }
            })
            .collect()
    }

    /// Armijo line search on the merit function m(y) = ½y·y + ck|g(y)|
    #[allow(clippy::too_many_arguments)]
    fn line_search(
        &mut self,
        x: &[f64],
        lin: &Linearisation,
        y: &[f64],
        y_hlrf: &[f64],
        grad: &[f64],
        g: f64,
        tol_ls: f64,
        schwarz: f64,
    ) -> Result<LineSearch> {
        let a = self.options.armijo_a;
        let b = self.options.armijo_b;
        let d: Vec<f64> = y_hlrf.iter().zip(y).map(|(h, c)| h - c).collect();

        let v1 = (dot(y, y) / dot(grad, grad)).sqrt();
        let v2 = if g.abs() >= tol_ls {
            0.5 * dot(y_hlrf, y_hlrf) / g.abs()
        } else {
            0.0
        };
        let mut ck = v1.max(v2) * self.options.ck_factor + self.options.ck_offset;
        if ck > 0.0 {
            while ck < v1 {
                ck *= 2.0;
            }
        }
        ck = ck.max(self.ck_last);
        self.ck_last = ck;
        tracing::debug!("ck value: {ck}");

        let sign = if g == 0.0 { 0.0 } else { g.signum() };
        let grad_merit: Vec<f64> = y.iter().zip(grad).map(|(yi, gi)| yi + ck * sign * gi).collect();
        let merit = 0.5 * dot(y, y) + ck * g.abs();
        let slope = dot(&grad_merit, &d);

        let max_d = d.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let trials = if max_d > 0.0 {
            ((self.controls.tol_rel / max_d).ln() / b.ln()).ceil()
        } else {
            0.0
        };
        let trials = if trials.is_finite() && trials > 0.0 {
            trials as usize
        } else {
            0
        };
        tracing::debug!(
            "iHLRF step range from {} to {} ({trials} steps), test block of {}",
            1.0,
            b.powi(trials as i32),
            self.options.step_block
        );

        let template = self.template(x);
        let n = y.len();
        let mut tested = 0;
        let mut previous: Option<f64> = None;
        'search: while tested < trials {
            let len = self.options.step_block.min(trials - tested);
            let lambdas: Vec<f64> = (tested..tested + len).map(|k| b.powi(k as i32)).collect();

            let mut table = PointTable::filled(len, &template);
            let mut trial_points = Vec::with_capacity(len);
            for (row, lambda) in lambdas.iter().enumerate() {
                let yt: Vec<f64> = y.iter().zip(&d).map(|(yi, di)| yi + lambda * di).collect();
                let xt = lin.jxy.mul_vec(&yt);
                for (i, slot) in table.row_mut(row)[..n].iter_mut().enumerate() {
                    *slot = lin.mean[i] + xt[i];
                }
                trial_points.push(yt);
            }
            let send: Vec<usize> = (0..len).collect();
            self.problem
                .run_model(&self.layout, &mut table, &send, self.options.debug_model_output)?;
            let values = self.limit_values(&table);

            for ((lambda, yt), g_trial) in lambdas.iter().zip(&trial_points).zip(values) {
                let merit_trial = 0.5 * dot(yt, yt) + ck * g_trial.abs();
                if merit_trial - merit <= -a * lambda * slope {
                    tracing::info!("iHLRF step size is {lambda}");
                    return Ok(LineSearch {
                        lambda: *lambda,
                        accepted: true,
                    });
                }
                if previous == Some(g_trial) {
                    tracing::debug!("Limit state stagnated during the line search");
                    break 'search;
                }
                previous = Some(g_trial);
            }
            tested += len;
        }

        let lambda = match self.options.forced_step {
            ForcedStep::Auto => 1.0 - schwarz,
            ForcedStep::Fixed(step) => step,
        };
        tracing::info!("iHLRF step not found, forcing to {lambda}");
        Ok(LineSearch {
            lambda,
            accepted: false,
        })
    }

    pub(super) fn run(mut self, start: Vec<f64>) -> Result<FormResult> {
        let started = Instant::now();
        let controls = self.controls;
        let tol_rel = controls.tol_rel;
        let n = start.len();

        let correlation = self.problem.variables().correlation_matrix();
        let jzy = correlation.cholesky()?;
        let jyz = jzy.lower_triangular_inverse()?;

        let mut x = start;
        let mut tol_ls = match controls.tol_ls {
            Tolerance::Fixed(tol) => Some(tol),
            Tolerance::Auto => None,
        };
        let mut history = vec![0.0];
        let mut gradient = vec![0.0; n];
        let mut last_cycle = false;
        let mut converged = false;
        let mut cycles = 0;

        tracing::info!(
            "Starting FORM ({}, {} differences) with {n} random variable(s)",
            controls.method,
            controls.difference
        );

        for cycle in 1..=controls.max_iterations {
            cycles = cycle;
            tracing::info!("Iteration cycle {cycle}");

            let lin = self.linearise(&x, &jzy, &jyz)?;
            let values = self.difference_values(&x, &lin.mean)?;
            let g = values[0];
            let tol_ls = *tol_ls.get_or_insert_with(|| {
                let tol = tol_rel * g.abs();
                tracing::info!("Limit state tolerance set to {tol}");
                tol
            });
            tracing::info!("Limit state value = {g} (tolerance = {tol_ls})");

            let grad = lin.jxy.transpose_mul_vec(&self.gradient_x(&values, &lin.mean));
            let grad_norm = norm(&grad);
            if grad_norm == 0.0 || !grad_norm.is_finite() {
                return Err(AnalysisError::ZeroGradient { cycle });
            }
            if grad.iter().any(|v| *v == 0.0) {
                tracing::warn!("One or more gradient terms are equal to zero");
            }
            gradient.clone_from(&grad);

            let offset: Vec<f64> = x.iter().zip(&lin.mean).map(|(xi, m)| xi - m).collect();
            let y = lin.jyx.mul_vec(&offset);
            if cycle == 1 {
                history.push(norm(&y));
            }
            let beta = history[cycle];

            let gg = dot(&grad, &grad);
            let gy = dot(&grad, &y);
            let y_hlrf: Vec<f64> = grad.iter().map(|gi| gi * (gy - g) / gg).collect();
            let schwarz = if gy.abs() > 0.0 {
                gy.abs() / (gg * dot(&y, &y)).sqrt()
            } else {
                0.0
            };
            tracing::debug!("Schwarz inequality between y and the gradient = {schwarz}");

            if last_cycle {
                if g.abs() < tol_ls && 1.0 - schwarz < tol_rel {
                    tracing::info!("Convergence confirmed on cycle {cycle}");
                    converged = true;
                    break;
                }
                tracing::info!("Convergence not confirmed, continuing");
            }

            let y_new: Vec<f64> = match controls.method {
                FormMethod::Hlrf => y_hlrf,
                FormMethod::Rhlrf => y
                    .iter()
                    .zip(&y_hlrf)
                    .map(|(c, h)| c + self.options.relaxation * (h - c))
                    .collect(),
                FormMethod::Ihlrf => {
                    let search =
                        self.line_search(&x, &lin, &y, &y_hlrf, &grad, g, tol_ls, schwarz)?;
                    if !search.accepted {
                        tracing::debug!("Line search used the forced step");
                    }
                    y.iter()
                        .zip(&y_hlrf)
                        .map(|(c, h)| c + search.lambda * (h - c))
                        .collect()
                }
            };

            let beta_new = norm(&y_new);
            history.push(beta_new);
            let dx = lin.jxy.mul_vec(&y_new);
            for (i, xi) in x.iter_mut().enumerate() {
                *xi = lin.mean[i] + dx[i];
            }

            let rel_error = if beta_new > 0.0 {
                y.iter()
                    .zip(&y_new)
                    .filter(|(_, new)| **new != 0.0)
                    .map(|(cur, new)| ((cur - new) / new).abs())
                    .fold(0.0, f64::max)
            } else {
                1.0
            };
            let beta_change = (beta - beta_new).abs();
            tracing::info!(
                "Beta = {beta:.5}, next beta = {beta_new:.5}, max relative change of y = {rel_error:.4}"
            );
            for (name, xi) in self.layout.names().iter().zip(&x) {
                tracing::debug!("{name:>15} | {xi:.5E}");
            }

            if g.abs() < tol_ls {
                if beta_change < tol_rel {
                    tracing::info!("Design point found on cycle {cycle} by the change of beta");
                    converged = true;
                    break;
                } else if 1.0 - schwarz < tol_rel {
                    tracing::info!(
                        "Design point probably found on cycle {cycle}, confirming on the next cycle"
                    );
                    last_cycle = true;
                } else {
                    last_cycle = false;
                }
            } else {
                last_cycle = false;
            }
        }

        let beta = history[history.len() - 1];
        let status = if converged {
            SolutionStatus::Converged
        } else {
            tracing::warn!("FORM stopped at the iteration limit without reaching the tolerances");
            SolutionStatus::MaxIterationsReached
        };
        let grad_norm = norm(&gradient);
        let alpha = gradient.iter().map(|g| g / grad_norm).collect();

        let result = FormResult {
            status,
            pf: normal_cdf(-beta),
            beta,
            variables: self.layout.names()[..n].to_vec(),
            design_point: x,
            gradient,
            alpha,
            cycles,
            beta_history: history[1..].to_vec(),
            tol_ls_used: tol_ls.unwrap_or(0.0),
            elapsed: started.elapsed(),
            finished_at: Timestamp::now(),
        };
        tracing::info!(
            "FORM finished after {} cycle(s): beta = {:.3}, Pf = {:.4E}",
            result.cycles,
            result.beta,
            result.pf
        );
        Ok(result)
    }
}

//! Limit states whose failure probability is known exactly
//!
//! - R − S with normal R and S is linear in the standard space: β = (μR − μS) / √(σR² + σS²)
//! - R − S with lognormal R and S fails exactly when ln R < ln S: β = (λR − λS) / √(ξR² + ξS²)

use crate::form::{FiniteDifference, Form, FormControls, FormMethod, SolutionStatus};
use crate::limit_state::LimitState;
use crate::montecarlo::{MonteCarlo, MonteCarloControls};
use crate::stats::normal_cdf;

const BETA_LOGNORMAL: f64 = 3.191_868_766_42;

fn lognormal_beta(mr: f64, cvr: f64, ms: f64, cvs: f64) -> f64 {
    let xr2 = (1.0 + cvr * cvr).ln();
    let xs2 = (1.0 + cvs * cvs).ln();
    (mr.ln() - 0.5 * xr2 - ms.ln() + 0.5 * xs2) / (xr2 + xs2).sqrt()
}

fn resistance_load(kind: &str, r_mean: f64) -> Form {
    let mut form = Form::new();
    if kind == "logn" {
        form.create_variable("R", "logn", r_mean, 0.0, Some(0.1)).unwrap();
        form.create_variable("S", "logn", 100.0, 0.0, Some(0.2)).unwrap();
    } else {
        form.create_variable("R", "gauss", r_mean, 20.0, None).unwrap();
        form.create_variable("S", "gauss", 100.0, 15.0, None).unwrap();
    }
    form.set_limit_state(LimitState::expression("R - S").unwrap());
    form
}

#[test]
fn test_lognormal_reference_value() {
    assert!((lognormal_beta(200.0, 0.1, 100.0, 0.2) - BETA_LOGNORMAL).abs() < 1e-10);
}

#[test]
fn test_linear_normal_beta_2_and_4() {
    for (r_mean, beta) in [(150.0, 2.0), (200.0, 4.0)] {
        let mut form = resistance_load("gauss", r_mean);
        let result = form.run().unwrap();
        assert_eq!(result.status, SolutionStatus::Converged);
        assert!((result.beta - beta).abs() < 1e-3, "beta = {}", result.beta);
        // design point on the line r = s
        let r = result.design_value("r").unwrap();
        let s = result.design_value("s").unwrap();
        assert!((r - s).abs() < 1e-2 * r);
        assert!((result.alpha_of("r").unwrap() - 0.8).abs() < 1e-3);
        assert!((result.alpha_of("s").unwrap() + 0.6).abs() < 1e-3);
    }
}

#[test]
fn test_lognormal_form_is_exact() {
    for difference in [
        FiniteDifference::Forward,
        FiniteDifference::Backward,
        FiniteDifference::Center,
    ] {
        let mut form = resistance_load("logn", 200.0);
        form.set_controls(FormControls {
            tol_rel: 1e-4,
            difference,
            ..FormControls::default()
        })
        .unwrap();
        let result = form.run().unwrap();
        assert_eq!(result.status, SolutionStatus::Converged);
        assert!(
            (result.beta - BETA_LOGNORMAL).abs() < 5e-3,
            "{difference}: beta = {}",
            result.beta
        );
    }
}

#[test]
fn test_start_point_does_not_change_the_answer() {
    let mut form = resistance_load("logn", 200.0);
    form.set_start_point("r", 130.0).unwrap();
    form.set_start_point("s", 125.0).unwrap();
    form.set_controls(FormControls {
        tol_rel: 1e-4,
        method: FormMethod::Hlrf,
        ..FormControls::default()
    })
    .unwrap();
    let result = form.run().unwrap();
    assert!((result.beta - BETA_LOGNORMAL).abs() < 5e-3);
}

#[test]
fn test_iteration_limit_reports_status() {
    let mut form = resistance_load("logn", 200.0);
    form.set_controls(FormControls {
        max_iterations: 1,
        tol_rel: 1e-8,
        ..FormControls::default()
    })
    .unwrap();
    let result = form.run().unwrap();
    assert_eq!(result.status, SolutionStatus::MaxIterationsReached);
    assert_eq!(result.status.code(), 1);
    assert_eq!(result.cycles, 1);
}

#[test]
fn test_lognormal_adaptive_monte_carlo() {
    let mut mc = MonteCarlo::new();
    mc.create_variable("r", "logn", 200.0, 0.0, Some(0.1)).unwrap();
    mc.create_variable("s", "logn", 100.0, 0.0, Some(0.2)).unwrap();
    mc.set_limit_state(LimitState::expression("r - s").unwrap());
    mc.set_sampling_distribution("r", "logn", 150.0, 0.0, Some(0.1)).unwrap();
    mc.set_sampling_distribution("s", "logn", 150.0, 0.0, Some(0.2)).unwrap();
    mc.set_controls(MonteCarloControls {
        samples_per_cycle: 2_000,
        max_cycles: 300,
        target_cvpf: 0.05,
        adaptive_tolerance: Some(0.01),
        seed: 99,
    })
    .unwrap();

    let exact = normal_cdf(-BETA_LOGNORMAL);
    let result = mc.run().unwrap();
    assert_eq!(result.status, SolutionStatus::Converged);
    assert!((result.pf - exact).abs() / exact < 0.2, "pf = {}, exact {exact}", result.pf);
    assert!((result.beta - BETA_LOGNORMAL).abs() < 0.1);
}

//! Ang & Tang (1984), examples 6.7 to 6.10: g = Y·Z − M
//!
//! Reference indexes were obtained with an exact Nataf transformation and a
//! converged HLRF iteration; the Monte Carlo references come from one million
//! crude samples.

use crate::form::{Form, FormControls, FormMethod, SolutionStatus};
use crate::limit_state::LimitState;
use crate::montecarlo::{MonteCarlo, MonteCarloControls};
use crate::stats::normal_cdf;

const BETA_67: f64 = 3.049_073;
const BETA_68: f64 = 2.742_239;
const BETA_69: f64 = 2.862_867;
const BETA_610: f64 = 2.664_373;

fn precise() -> FormControls {
    FormControls {
        tol_rel: 1e-3,
        dh: 0.01,
        ..FormControls::default()
    }
}

fn normal_form(correlated: bool) -> Form {
    let mut form = Form::new();
    form.create_variable("y", "gauss", 40.0, 0.0, Some(0.125)).unwrap();
    form.create_variable("z", "gauss", 50.0, 0.0, Some(0.05)).unwrap();
    form.create_variable("m", "gauss", 1000.0, 0.0, Some(0.2)).unwrap();
    if correlated {
        form.set_correlation("y", "z", 0.4).unwrap();
    }
    form.set_limit_state(LimitState::expression("y*z - m").unwrap());
    form
}

fn mixed_form(correlated: bool) -> Form {
    let mut form = Form::new();
    form.create_variable("y", "logn", 40.0, 0.0, Some(0.125)).unwrap();
    form.create_variable("z", "logn", 50.0, 0.0, Some(0.05)).unwrap();
    form.create_variable("m", "gumbel", 1000.0, 0.0, Some(0.2)).unwrap();
    if correlated {
        form.set_correlation("y", "z", 0.4).unwrap();
    }
    form.set_limit_state(LimitState::expression("y*z - m").unwrap());
    form
}

fn assert_beta(form: &mut Form, expected: f64) {
    form.set_controls(precise()).unwrap();
    let result = form.run().unwrap();
    assert_eq!(result.status, SolutionStatus::Converged);
    assert!(
        (result.beta - expected).abs() < 1e-2,
        "beta = {}, expected {expected}",
        result.beta
    );
    assert!((result.pf - normal_cdf(-result.beta)).abs() < 1e-12);
}

#[test]
fn test_example_6_7_normal() {
    let mut form = normal_form(false);
    assert_beta(&mut form, BETA_67);

    let result = form.result().unwrap();
    // resistance terms push the point down, the load pushes it up
    assert!(result.design_value("y").unwrap() < 40.0);
    assert!(result.design_value("z").unwrap() < 50.0);
    assert!(result.design_value("m").unwrap() > 1000.0);
    let alpha_norm: f64 = result.alpha.iter().map(|a| a * a).sum();
    assert!((alpha_norm - 1.0).abs() < 1e-9);
}

#[test]
fn test_example_6_8_lognormal_and_gumbel() {
    assert_beta(&mut mixed_form(false), BETA_68);
}

#[test]
fn test_example_6_9_correlated_normal() {
    let mut form = normal_form(true);
    form.create_variable("c", "const", 0.0, 0.0, None).unwrap();
    form.set_limit_state(LimitState::expression("y*z - m + c").unwrap());
    assert_beta(&mut form, BETA_69);
}

#[test]
fn test_example_6_10_correlated_lognormal() {
    assert_beta(&mut mixed_form(true), BETA_610);
}

#[test]
fn test_methods_agree() {
    let betas: Vec<f64> = [FormMethod::Hlrf, FormMethod::Ihlrf, FormMethod::Rhlrf]
        .into_iter()
        .map(|method| {
            let mut form = mixed_form(false);
            form.set_controls(FormControls {
                method,
                max_iterations: 200,
                ..precise()
            })
            .unwrap();
            form.run().unwrap().beta
        })
        .collect();
    for beta in &betas {
        assert!((beta - BETA_68).abs() < 1e-2, "betas = {betas:?}");
    }
}

/// Sampling distributions shifted k = 2 standard deviations towards failure
fn shifted_sampling(mc: &mut MonteCarlo, lognormal: bool) {
    let k = 2.0;
    if lognormal {
        mc.set_sampling_distribution("y", "logn", 40.0 * (1.0 - k * 0.125), 0.0, Some(0.125))
            .unwrap();
        mc.set_sampling_distribution("z", "logn", 50.0 * (1.0 - k * 0.05), 0.0, Some(0.05))
            .unwrap();
        mc.set_sampling_distribution("m", "gumbel", 1000.0 * (1.0 + k * 0.2), 200.0, None)
            .unwrap();
    } else {
        mc.set_sampling_distribution("y", "gauss", 40.0 * (1.0 - k * 0.125), 5.0, None)
            .unwrap();
        mc.set_sampling_distribution("z", "gauss", 50.0 * (1.0 - k * 0.05), 2.5, None)
            .unwrap();
        mc.set_sampling_distribution("m", "gauss", 1000.0 * (1.0 + k * 0.2), 200.0, None)
            .unwrap();
    }
}

fn monte_carlo(lognormal: bool, correlated: bool) -> MonteCarlo {
    let mut mc = MonteCarlo::new();
    if lognormal {
        mc.create_variable("y", "logn", 40.0, 0.0, Some(0.125)).unwrap();
        mc.create_variable("z", "logn", 50.0, 0.0, Some(0.05)).unwrap();
        mc.create_variable("m", "gumbel", 1000.0, 200.0, None).unwrap();
    } else {
        mc.create_variable("y", "gauss", 40.0, 5.0, None).unwrap();
        mc.create_variable("z", "gauss", 50.0, 2.5, None).unwrap();
        mc.create_variable("m", "gauss", 1000.0, 200.0, None).unwrap();
    }
    if correlated {
        mc.set_correlation("y", "z", 0.4).unwrap();
    }
    mc.set_limit_state(LimitState::expression("y*z - m").unwrap());
    shifted_sampling(&mut mc, lognormal);
    mc
}

fn assert_pf(mc: &mut MonteCarlo, adaptive: Option<f64>, expected: f64) {
    mc.set_controls(MonteCarloControls {
        samples_per_cycle: 1_000,
        max_cycles: 500,
        target_cvpf: 0.05,
        adaptive_tolerance: adaptive,
        seed: 2024,
    })
    .unwrap();
    let result = mc.run().unwrap();
    assert_eq!(result.status, SolutionStatus::Converged);
    assert!(
        (result.pf - expected).abs() / expected < 0.2,
        "pf = {}, expected {expected}",
        result.pf
    );
}

#[test]
fn test_example_6_8_importance_sampling() {
    assert_pf(&mut monte_carlo(true, false), None, 3.16e-3);
}

#[test]
fn test_example_6_8_adaptive_sampling() {
    assert_pf(&mut monte_carlo(true, false), Some(5e-3), 3.16e-3);
}

#[test]
fn test_example_6_9_correlated_importance_sampling() {
    assert_pf(&mut monte_carlo(false, true), Some(5e-3), 2.17e-3);
}

#[test]
fn test_example_6_10_correlated_mixed_sampling() {
    assert_pf(&mut monte_carlo(true, true), Some(5e-3), 3.99e-3);
}

//! Limit states that read outputs of a batch model
//!
//! The model here is an in-process closure standing in for a finite element
//! run: it receives every point of a cycle in one batch.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{AnalysisError, ModelError};
use crate::evaluator::{ClosureModel, ExternalModel, SampleBatch};
use crate::form::{Form, FormControls, SolutionStatus};
use crate::limit_state::{LimitState, UserFunction};
use crate::montecarlo::{MonteCarlo, MonteCarloControls};

/// Batch model that counts its calls and the rows it was sent
struct CountingModel {
    calls: Arc<AtomicUsize>,
    rows: Arc<AtomicUsize>,
}

impl ExternalModel for CountingModel {
    fn input_names(&self) -> Vec<String> {
        vec!["y".into(), "z".into()]
    }

    fn output_names(&self) -> Vec<String> {
        vec!["capacity".into()]
    }

    fn evaluate(&mut self, inputs: &SampleBatch) -> Result<SampleBatch, ModelError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.rows.fetch_add(inputs.len(), Ordering::Relaxed);
        let y = inputs.column("y").ok_or(ModelError::MissingInput("y".into()))?;
        let z = inputs.column("z").ok_or(ModelError::MissingInput("z".into()))?;
        let mut out = SampleBatch::new(inputs.len());
        out.insert("capacity", y.iter().zip(z).map(|(a, b)| a * b).collect())?;
        Ok(out)
    }
}

fn counting() -> (CountingModel, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let rows = Arc::new(AtomicUsize::new(0));
    let model = CountingModel {
        calls: Arc::clone(&calls),
        rows: Arc::clone(&rows),
    };
    (model, calls, rows)
}

fn form_with_model(model: Box<dyn ExternalModel>) -> Form {
    let mut form = Form::new();
    form.create_variable("y", "gauss", 40.0, 0.0, Some(0.125)).unwrap();
    form.create_variable("z", "gauss", 50.0, 0.0, Some(0.05)).unwrap();
    form.create_variable("m", "gauss", 1000.0, 0.0, Some(0.2)).unwrap();
    form.set_external_model(model).unwrap();
    form.set_limit_state(LimitState::expression("capacity - m").unwrap());
    form
}

#[test]
fn test_form_through_model_matches_expression() {
    let (model, calls, rows) = counting();
    let mut with_model = form_with_model(Box::new(model));
    let beta_model = with_model.run().unwrap().beta;
    let cycles = with_model.result().unwrap().cycles;

    let mut direct = Form::new();
    direct.create_variable("y", "gauss", 40.0, 0.0, Some(0.125)).unwrap();
    direct.create_variable("z", "gauss", 50.0, 0.0, Some(0.05)).unwrap();
    direct.create_variable("m", "gauss", 1000.0, 0.0, Some(0.2)).unwrap();
    direct.set_limit_state(LimitState::expression("y*z - m").unwrap());
    let beta_direct = direct.run().unwrap().beta;

    assert!((beta_model - beta_direct).abs() < 1e-9);
    // one batch per cycle (line search batches come on top), and "m" is not
    // a model input so its perturbed row is never sent
    assert!(calls.load(Ordering::Relaxed) >= cycles);
    assert!(rows.load(Ordering::Relaxed) >= 3 * cycles);
}

#[test]
fn test_monte_carlo_sends_one_batch_per_cycle() {
    let (model, calls, rows) = counting();
    let mut mc = MonteCarlo::new();
    mc.create_variable("y", "gauss", 40.0, 5.0, None).unwrap();
    mc.create_variable("z", "gauss", 50.0, 2.5, None).unwrap();
    mc.create_variable("m", "gauss", 1000.0, 200.0, None).unwrap();
    mc.set_external_model(Box::new(model)).unwrap();
    mc.set_limit_state(LimitState::expression("capacity - m").unwrap());
    mc.set_controls(MonteCarloControls {
        samples_per_cycle: 250,
        max_cycles: 6,
        ..MonteCarloControls::default()
    })
    .unwrap();

    let result = mc.run().unwrap();
    assert_eq!(result.cycles, 6);
    assert_eq!(calls.load(Ordering::Relaxed), 6);
    assert_eq!(rows.load(Ordering::Relaxed), 6 * 250);
}

#[test]
fn test_model_reading_a_constant() {
    let mut form = Form::new();
    form.create_variable("load", "gumbel", 50.0, 10.0, None).unwrap();
    form.create_variable("length", "const", 4.0, 0.0, None).unwrap();
    form.create_variable("mr", "logn", 400.0, 0.0, Some(0.1)).unwrap();
    form.set_external_model(Box::new(ClosureModel::new(
        &["load", "length"],
        &["moment"],
        |r| vec![r[0] * r[1]],
    )))
    .unwrap();
    form.set_limit_state(LimitState::expression("mr - moment").unwrap());
    form.set_controls(FormControls {
        tol_rel: 1e-3,
        ..FormControls::default()
    })
    .unwrap();
    let result = form.run().unwrap();
    assert_eq!(result.status, SolutionStatus::Converged);
    assert!(result.design_value("load").unwrap() > 50.0);
    assert!(result.design_value("mr").unwrap() < 400.0);
    assert_eq!(result.variables, vec!["load", "mr"]);
}

#[test]
fn test_user_function_inside_limit_state() {
    let mut form = Form::new();
    form.create_variable("y", "gauss", 40.0, 0.0, Some(0.125)).unwrap();
    form.create_variable("z", "gauss", 50.0, 0.0, Some(0.05)).unwrap();
    form.create_variable("m", "gauss", 1000.0, 0.0, Some(0.2)).unwrap();
    let userf = UserFunction::new(["x1", "x2", "x3"], |a| a[0] * a[1] - a[2]);
    form.set_limit_state(
        LimitState::expression("userf(x3=m, x1=y, x2=z)")
            .unwrap()
            .with_user_function(userf),
    );
    let result = form.run().unwrap();
    assert!((result.beta - 3.049).abs() < 2e-2);
}

#[test]
fn test_failing_model_aborts_the_run() {
    let mut mc = MonteCarlo::new();
    mc.create_variable("y", "gauss", 40.0, 5.0, None).unwrap();
    mc.set_external_model(Box::new(ClosureModel::new(&["y"], &["a", "b"], |r| {
        vec![r[0]]
    })))
    .unwrap();
    mc.set_limit_state(LimitState::expression("a - 10").unwrap());
    mc.set_controls(MonteCarloControls {
        samples_per_cycle: 10,
        max_cycles: 1,
        ..MonteCarloControls::default()
    })
    .unwrap();
    assert!(matches!(
        mc.run(),
        Err(AnalysisError::Model(ModelError::OutputLength { .. }))
    ));
    assert_eq!(mc.status(), SolutionStatus::NotRun);
}

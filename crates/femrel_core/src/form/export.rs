use std::fmt::Write as _;

use super::Form;
use super::controls::Tolerance;
use crate::error::{AnalysisError, Result};
use crate::report::{csv_field, csv_quoted, fixed, sci, write_model_sections};

/// CSV report of a finished FORM run
pub(super) fn form_report(form: &Form, description: Option<&str>) -> Result<String> {
    let result = form.result().ok_or(AnalysisError::NoResults)?;
    let controls = form.controls();
    let problem = form.problem();

    let mut out = String::from("sep=,\n");
    if let Some(text) = description {
        let _ = writeln!(out, "{}\n", csv_field(text));
    }
    out.push_str("Input data:\n");

    out.push_str("Process controls:\n");
    let _ = writeln!(out, ",Limit of iterations:,{}", controls.max_iterations);
    let _ = writeln!(out, ",Relative error tolerance:,{}", sci(controls.tol_rel, 3));
    let tol_ls = match controls.tol_ls {
        Tolerance::Auto => format!("auto ({})", sci(result.tol_ls_used, 3)),
        Tolerance::Fixed(tol) => sci(tol, 3),
    };
    let _ = writeln!(out, ",Absolute LS error tolerance:,{tol_ls}");
    let _ = writeln!(out, ",deltah (for derivatives):,{}", sci(controls.dh, 3));
    let _ = writeln!(out, ",Finite difference method:,{}", controls.difference);
    let _ = writeln!(out, ",FORM method:,{}", controls.method);
    out.push('\n');

    write_model_sections(&mut out, problem);

    let limit_state = problem
        .limit_state()
        .map(ToString::to_string)
        .unwrap_or_default();
    let _ = writeln!(out, "Limit state:,{}\n", csv_quoted(&limit_state));

    out.push_str("Initial design point:\n");
    for (name, value) in form.start_point() {
        let _ = writeln!(out, ",{name},{}", sci(value, 5));
    }
    out.push('\n');

    out.push_str("\nResults:\n");
    out.push_str("FORM results:\n");
    let _ = writeln!(out, ",Exit status:,{},", result.status.code());
    let _ = writeln!(out, ",Total of iterations:,{}", result.cycles);
    let _ = writeln!(out, ",Probability of failure (Pf):,{}", sci(result.pf, 4));
    let _ = writeln!(out, ",Reliability index (Beta):,{}", fixed(result.beta, 3));
    let _ = writeln!(
        out,
        ",Elapsed time (minutes):,{}",
        fixed(result.elapsed.as_secs_f64() / 60.0, 3)
    );
    let _ = writeln!(out, ",Finished at:,{}", result.finished_at);
    out.push('\n');

    out.push_str("Final values:\n");
    out.push_str(",Variable,D. Point,grad(g(X_i)),alpha(i)\n");
    for (i, name) in result.variables.iter().enumerate() {
        let _ = writeln!(
            out,
            ",{name},{},{},{}",
            sci(result.design_point[i], 5),
            sci(result.gradient[i], 5),
            sci(result.alpha[i], 5)
        );
    }
    out.push('\n');

    out.push_str("Beta indexes of cycles:\n");
    out.push_str(",Cycle,Beta\n");
    for (cycle, beta) in result.beta_history.iter().enumerate() {
        let _ = writeln!(out, ",{},{}", cycle + 1, fixed(*beta, 3));
    }
    Ok(out)
}

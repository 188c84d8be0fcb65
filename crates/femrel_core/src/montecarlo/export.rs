use std::fmt::Write as _;

use super::MonteCarlo;
use crate::error::{AnalysisError, Result};
use crate::report::{csv_field, csv_quoted, fixed, sci, write_model_sections};

/// CSV report of a finished Monte Carlo run
pub(super) fn monte_carlo_report(mc: &MonteCarlo, description: Option<&str>) -> Result<String> {
    let result = mc.result().ok_or(AnalysisError::NoResults)?;
    let controls = mc.controls();
    let problem = mc.problem();

    let mut out = String::from("sep=,\n");
    if let Some(text) = description {
        let _ = writeln!(out, "{}\n", csv_field(text));
    }
    out.push_str("Input data:\n");

    out.push_str("Simulation controls:\n");
    let _ = writeln!(out, ",Ns/Cycle:,{}", controls.samples_per_cycle);
    let _ = writeln!(out, ",MaxCycles:,{}", controls.max_cycles);
    let _ = writeln!(out, ",CVPf target:,{}", fixed(controls.target_cvpf, 4));
    let adaptive = controls
        .adaptive_tolerance
        .map_or_else(|| "off".to_string(), |tol| sci(tol, 3));
    let _ = writeln!(out, ",tol. Adapt.:,{adaptive}");
    let _ = writeln!(out, ",Seed:,{}", controls.seed);
    out.push('\n');

    write_model_sections(&mut out, problem);

    let limit_state = problem
        .limit_state()
        .map(ToString::to_string)
        .unwrap_or_default();
    let _ = writeln!(out, "Limit state:,{}", csv_quoted(&limit_state));
    out.push_str(",Starting sampling distributions:\n");
    out.push_str(",,Name,Distribution,Mean,Standard Deviation,CV\n");
    for (name, d) in mc.sampling_distributions() {
        let _ = writeln!(
            out,
            ",,{name},{},{},{},{}",
            d.kind.label(),
            sci(d.mean, 5),
            sci(d.std, 5),
            sci(d.cv, 5)
        );
    }
    out.push('\n');

    out.push_str("\nResults:\n");
    out.push_str("Monte Carlo results:\n");
    let _ = writeln!(out, ",Exit status:,{},", result.status.code());
    let _ = writeln!(out, ",Total of simulations:,{}", sci(result.samples as f64, 3));
    let _ = writeln!(out, ",Probability of failure (Pf):,{}", sci(result.pf, 4));
    let _ = writeln!(out, ",Reliability index (Beta):,{}", fixed(result.beta, 3));
    let _ = writeln!(out, ",CV of Prob. of failure (CVPf):,{}", fixed(result.cvpf, 3));
    let _ = writeln!(out, ",Mean of g(X):,{}", sci(result.g_mean, 5));
    let _ = writeln!(out, ",Std. dev. of g(X):,{}", sci(result.g_std, 5));
    let _ = writeln!(
        out,
        ",Elapsed time (minutes):,{}",
        fixed(result.elapsed.as_secs_f64() / 60.0, 3)
    );
    let _ = writeln!(out, ",Finished at:,{}", result.finished_at);
    out.push('\n');

    if controls.adaptive_tolerance.is_some() {
        out.push_str("Final sampling point:\n");
        for point in &result.sampling_points {
            let _ = writeln!(out, ",{},{}", point.name, sci(point.distribution.mean, 5));
        }
        out.push('\n');
    }

    out.push_str("\nProcess convergence:\n");
    out.push_str(",N,Pf,Beta,CVPf\n");
    for record in &result.history {
        let _ = writeln!(
            out,
            ",{},{},{},{}",
            record.n,
            sci(record.pf, 5),
            fixed(record.beta, 5),
            fixed(record.cvpf, 5)
        );
    }
    Ok(out)
}

//! Batch files exchanged with the ANSYS Probabilistic Design System

use std::fmt::Write as _;

use crate::error::AnsysError;
use crate::evaluator::SampleBatch;
use crate::report::sci;

/// Name of the PDS driver script written in the run location
pub const PDS_SCRIPT: &str = "pdsrun.inp";
/// Name the model input script is copied to
pub const MODEL_SCRIPT: &str = "current.inp";
/// Name of the user sample file
pub const SAMPLE_FILE: &str = "current.samp";
/// Name of the listing file
pub const OUTPUT_FILE: &str = "pdsout.out";

/// Results file produced for `jobname`
pub fn results_file(jobname: &str) -> String {
    format!("{jobname}_current.pdrs")
}

/// PDS script running the model once per user supplied sample.
///
/// `inputs` holds each input name with its sampled values. The uniform
/// bounds are half and one and a half times the extreme samples, taken on
/// the side that encloses them whatever their sign.
pub fn pds_script(inputs: &[(String, Vec<f64>)], outputs: &[String]) -> String {
    let mut script = String::new();
    script.push_str("FINISH\n/GOPR\nKEYW,PR_SET,1\nKEYW,PR_STRUC,1\n");
    script.push_str("/PDS\nPDCLR,ALL\nPDANL,current,inp\n");

    for (name, values) in inputs {
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (lo, hi) = uniform_bounds(lo, hi);
        let _ = writeln!(script, "PDVAR,{name},UNIF,{lo:.6},{hi:.6}");
    }
    for name in outputs {
        let _ = writeln!(script, "PDVAR,{name},RESP");
    }

    script.push_str("PDMETH,MCS,USER\nPDUSER,current,samp\nPDEXE,current\n/WAIT,2\n");
    script
}

fn uniform_bounds(lo: f64, hi: f64) -> (f64, f64) {
    let lo = lo.min(0.5 * lo).min(1.5 * lo);
    let hi = hi.max(0.5 * hi).max(1.5 * hi);
    if lo < hi { (lo, hi) } else { (lo - 1.0, hi + 1.0) }
}

/// User sample file: `current`, the header, then one `1 1 <loop>` row per sample.
pub fn sample_file(inputs: &[(String, Vec<f64>)], len: usize) -> String {
    let mut text = String::from("current\nITER CYCL LOOP");
    for (name, _) in inputs {
        text.push(' ');
        text.push_str(name);
    }
    text.push('\n');

    for row in 0..len {
        let _ = write!(text, "1 1 {}", row + 1);
        for (_, values) in inputs {
            let _ = write!(text, " {:>15}", sci(values[row], 8));
        }
        text.push('\n');
    }
    text
}

/// Parsed content of a `.pdrs` results file
#[derive(Debug, Clone)]
pub struct PdsResults {
    pub outputs: SampleBatch,
    /// Per-sample error flags reported by ANSYS
    pub errors: Vec<f64>,
}

impl PdsResults {
    /// Number of samples ANSYS flagged as unusable
    pub fn failed_samples(&self) -> usize {
        self.errors.iter().filter(|e| **e > 0.0).count()
    }
}

/// Parse a results file: one title line, a header of column names, then
/// whitespace separated rows. Columns are truncated to `len`.
pub fn parse_results(text: &str, outputs: &[String], len: usize) -> Result<PdsResults, AnsysError> {
    let mut lines = text
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines.next().ok_or(AnsysError::Parse {
        line: 2,
        message: "missing header".into(),
    })?;
    let header: Vec<String> = header.split_whitespace().map(str::to_uppercase).collect();

    let column_of = |name: &str| {
        header
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| AnsysError::MissingColumn(name.to_uppercase()))
    };
    let wanted = outputs
        .iter()
        .map(|name| column_of(name))
        .collect::<Result<Vec<_>, _>>()?;
    let err_column = column_of("ERR")?;

    let mut columns = vec![Vec::new(); outputs.len()];
    let mut errors = Vec::new();
    for (index, line) in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != header.len() {
            return Err(AnsysError::Parse {
                line: index + 1,
                message: format!("expected {} fields, found {}", header.len(), fields.len()),
            });
        }
        let number = |col: usize| {
            fields[col].parse::<f64>().map_err(|_| AnsysError::Parse {
                line: index + 1,
                message: format!("invalid number \"{}\"", fields[col]),
            })
        };
        for (column, &col) in columns.iter_mut().zip(&wanted) {
            column.push(number(col)?);
        }
        errors.push(number(err_column)?);
    }

    let rows = errors.len();
    if rows < len {
        return Err(AnsysError::Parse {
            line: rows + 2,
            message: format!("expected {len} result rows, found {rows}"),
        });
    }
    errors.truncate(len);

    let mut batch = SampleBatch::new(len);
    for (name, values) in outputs.iter().zip(columns) {
        batch
            .insert(name, values)
            .map_err(|e| AnsysError::Parse {
                line: 0,
                message: e.to_string(),
            })?;
    }

    Ok(PdsResults {
        outputs: batch,
        errors,
    })
}

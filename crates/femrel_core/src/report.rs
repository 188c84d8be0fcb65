//! Text formatting shared by the CSV exports and the ANSYS batch files

use std::borrow::Cow;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::problem::Problem;

/// Scientific notation with a signed, two digit exponent: `1.23450E+03`
pub fn sci(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return if value.is_nan() {
            "NAN".into()
        } else if value > 0.0 {
            "INF".into()
        } else {
            "-INF".into()
        };
    }
    let raw = format!("{value:.precision$E}");
    match raw.split_once('E') {
        Some((mantissa, exponent)) => {
            let exp: i32 = exponent.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}E{sign}{:02}", exp.abs())
        }
        None => raw,
    }
}

/// Fixed notation with `precision` decimals
pub fn fixed(value: f64, precision: usize) -> String {
    format!("{value:.precision$}")
}

/// Text as a CSV field, quoted when it holds a separator, a quote or a line
/// break. Embedded quotes are doubled.
pub fn csv_field(text: &str) -> Cow<'_, str> {
    if text.contains([',', '"', '\n', '\r']) {
        Cow::Owned(csv_quoted(text))
    } else {
        Cow::Borrowed(text)
    }
}

/// Text as an always quoted CSV field
pub fn csv_quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Path with a `.csv` extension appended when missing
pub fn csv_path(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_owned();
            name.push(".csv");
            PathBuf::from(name)
        }
    }
}

/// Write a report to `path` (".csv" appended when missing) and return the
/// final location.
pub fn write_csv(path: &Path, content: &str) -> std::io::Result<PathBuf> {
    let path = csv_path(path);
    fs::write(&path, content)?;
    tracing::info!("Data exported to \"{}\"", path.display());
    Ok(path)
}

/// Sections shared with the Monte Carlo report: external model, random
/// variables, constants and the correlation matrix.
pub(crate) fn write_model_sections(out: &mut String, problem: &Problem) {
    let description = problem.model_description();
    if !description.is_empty() {
        out.push_str("External model properties:\n");
        for (key, value) in description {
            let _ = writeln!(out, ",{}:,{}", csv_field(&key), csv_field(&value));
        }
        out.push('\n');
    }

    let variables = problem.variables();
    out.push_str("Random variables:\n");
    out.push_str(",Name,Distribution,Mean,Standard Deviation,CV\n");
    for var in variables.random() {
        let d = &var.distribution;
        let _ = writeln!(
            out,
            ",{},{},{},{},{}",
            var.name,
            d.kind.label(),
            sci(d.mean, 5),
            sci(d.std, 5),
            sci(d.cv, 5)
        );
    }
    out.push('\n');

    out.push_str("Constant variables:\n");
    out.push_str(",Name,Value\n");
    for constant in variables.constants() {
        let _ = writeln!(out, ",{},{}", constant.name, sci(constant.value, 5));
    }
    out.push('\n');

    out.push_str("Correlation matrix:\n,");
    for var in variables.random() {
        let _ = write!(out, ",{}", var.name);
    }
    out.push('\n');
    let matrix = variables.correlation_matrix();
    for (i, var) in variables.random().iter().enumerate() {
        let _ = write!(out, ",{}", var.name);
        for value in matrix.row(i) {
            let _ = write!(out, ",{}", fixed(*value, 6));
        }
        out.push('\n');
    }
    out.push('\n');
}

//! External model seam
//!
//! FORM and Monte Carlo hand batches of input values to an external model
//! (ANSYS in practice) and read back batches of outputs that become extra
//! variables of the limit state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Column-oriented table of samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleBatch {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    len: usize,
}

impl SampleBatch {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            names: Vec::new(),
            columns: Vec::new(),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Add or replace a column. Values beyond the batch length are dropped and
    /// missing values are an error.
    pub fn insert(&mut self, name: &str, mut values: Vec<f64>) -> Result<(), ModelError> {
        if values.len() < self.len {
            return Err(ModelError::OutputLength {
                expected: self.len,
                found: values.len(),
            });
        }
        values.truncate(self.len);
        match self.position(name) {
            Some(i) => self.columns[i] = values,
            None => {
                self.names.push(name.to_string());
                self.columns.push(values);
            }
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    /// Column by name (case-insensitive)
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.position(name).map(|i| self.columns[i].as_slice())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }
}

impl fmt::Display for SampleBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.names {
            write!(f, "{name:>16}")?;
        }
        writeln!(f)?;
        for row in 0..self.len {
            for column in &self.columns {
                write!(f, "{:>16.8e}", column[row])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// A program that maps batches of inputs to batches of outputs
pub trait ExternalModel: Send {
    /// Variables the model reads
    fn input_names(&self) -> Vec<String>;

    /// Variables the model produces
    fn output_names(&self) -> Vec<String>;

    /// Evaluate every row of `inputs`. The returned batch has one column per
    /// output name and the same length as `inputs`.
    fn evaluate(&mut self, inputs: &SampleBatch) -> Result<SampleBatch, ModelError>;

    /// Key/value description used in reports
    fn describe(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

type RowFunction = dyn Fn(&[f64]) -> Vec<f64> + Send + Sync;

/// In-process model evaluated row by row, e.g. a surrogate of a finite
/// element model.
pub struct ClosureModel {
    inputs: Vec<String>,
    outputs: Vec<String>,
    func: Box<RowFunction>,
    calls: usize,
}

impl ClosureModel {
    pub fn new<F>(inputs: &[&str], outputs: &[&str], func: F) -> Self
    where
        F: Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        Self {
            inputs: inputs.iter().map(|s| s.to_lowercase()).collect(),
            outputs: outputs.iter().map(|s| s.to_lowercase()).collect(),
            func: Box::new(func),
            calls: 0,
        }
    }

    /// Number of batches evaluated so far
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl ExternalModel for ClosureModel {
    fn input_names(&self) -> Vec<String> {
        self.inputs.clone()
    }

    fn output_names(&self) -> Vec<String> {
        self.outputs.clone()
    }

    fn evaluate(&mut self, inputs: &SampleBatch) -> Result<SampleBatch, ModelError> {
        self.calls += 1;
        let columns = self
            .inputs
            .iter()
            .map(|name| {
                inputs
                    .column(name)
                    .ok_or_else(|| ModelError::MissingInput(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut outputs = vec![Vec::with_capacity(inputs.len()); self.outputs.len()];
        let mut row = vec![0.0; columns.len()];
        for i in 0..inputs.len() {
            for (slot, column) in row.iter_mut().zip(&columns) {
                *slot = column[i];
            }
            let values = (self.func)(&row);
            if values.len() != self.outputs.len() {
                return Err(ModelError::OutputLength {
                    expected: self.outputs.len(),
                    found: values.len(),
                });
            }
            for (out, v) in outputs.iter_mut().zip(values) {
                out.push(v);
            }
        }

        let mut batch = SampleBatch::new(inputs.len());
        for (name, values) in self.outputs.iter().zip(outputs) {
            batch.insert(name, values)?;
        }
        Ok(batch)
    }

    fn describe(&self) -> Vec<(String, String)> {
        vec![("Model".into(), "in-process function".into())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_insert_truncates_and_rejects_short() {
        let mut batch = SampleBatch::new(2);
        batch.insert("A", vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(batch.column("a"), Some(&[1.0, 2.0][..]));
        assert!(batch.insert("b", vec![1.0]).is_err());
    }

    #[test]
    fn test_closure_model_rows() {
        let mut model = ClosureModel::new(&["L", "p"], &["stress"], |r| vec![r[0] * r[1]]);
        let mut inputs = SampleBatch::new(3);
        inputs.insert("l", vec![1.0, 2.0, 3.0]).unwrap();
        inputs.insert("p", vec![10.0, 10.0, 10.0]).unwrap();
        let out = model.evaluate(&inputs).unwrap();
        assert_eq!(out.column("STRESS"), Some(&[10.0, 20.0, 30.0][..]));
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn test_closure_model_missing_input() {
        let mut model = ClosureModel::new(&["l"], &["s"], |r| vec![r[0]]);
        let inputs = SampleBatch::new(1);
        assert!(matches!(
            model.evaluate(&inputs),
            Err(ModelError::MissingInput(_))
        ));
    }
}

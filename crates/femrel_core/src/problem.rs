//! State shared by the FORM and Monte Carlo drivers: the variables, the limit
//! state and the optional external model.

use crate::error::{AnalysisError, ExpressionError, ModelError, Result, VariableError};
use crate::evaluator::{ExternalModel, SampleBatch};
use crate::limit_state::{BoundLimitState, LimitState};
use crate::model::VariableSet;

/// Column layout of an evaluation row: random variables, constants, then
/// external model outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    names: Vec<String>,
    n_random: usize,
    n_constants: usize,
}

impl Layout {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn n_random(&self) -> usize {
        self.n_random
    }

    pub fn outputs(&self) -> &[String] {
        &self.names[self.n_random + self.n_constants..]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    pub(crate) fn output_range(&self) -> std::ops::Range<usize> {
        self.n_random + self.n_constants..self.names.len()
    }
}

/// Row-major block of evaluation points sharing a [`Layout`]
#[derive(Debug, Clone)]
pub struct PointTable {
    stride: usize,
    data: Vec<f64>,
}

impl PointTable {
    /// `rows` copies of `template`
    pub fn filled(rows: usize, template: &[f64]) -> Self {
        let mut data = Vec::with_capacity(rows * template.len());
        for _ in 0..rows {
            data.extend_from_slice(template);
        }
        Self {
            stride: template.len(),
            data,
        }
    }

    pub fn rows(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.data.len() / self.stride
        }
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.stride..(i + 1) * self.stride]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.stride..(i + 1) * self.stride]
    }

    pub fn iter_rows(&self) -> std::slice::ChunksExact<'_, f64> {
        self.data.chunks_exact(self.stride.max(1))
    }

    pub(crate) fn stride(&self) -> usize {
        self.stride
    }

    pub(crate) fn data(&self) -> &[f64] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

/// Variables, limit state and external model of one analysis
#[derive(Default)]
pub struct Problem {
    variables: VariableSet,
    limit_state: Option<LimitState>,
    model: Option<Box<dyn ExternalModel>>,
}

impl Problem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableSet {
        &mut self.variables
    }

    pub fn limit_state(&self) -> Option<&LimitState> {
        self.limit_state.as_ref()
    }

    /// Only one limit state is kept; a second call replaces the first.
    pub fn set_limit_state(&mut self, limit_state: LimitState) {
        if let Some(previous) = &self.limit_state {
            tracing::warn!("Limit state \"{previous}\" replaced by \"{limit_state}\"");
        } else {
            tracing::info!("Limit state defined as \"{limit_state}\"");
        }
        self.limit_state = Some(limit_state);
    }

    /// Attach a model. Its inputs must be declared variables and its outputs
    /// must not reuse a variable name.
    pub fn set_external_model(&mut self, model: Box<dyn ExternalModel>) -> Result<()> {
        self.check_model(model.as_ref())?;
        tracing::info!(
            "External model attached: inputs [{}], outputs [{}]",
            model.input_names().join(", "),
            model.output_names().join(", ")
        );
        self.model = Some(model);
        Ok(())
    }

    fn check_model(&self, model: &dyn ExternalModel) -> Result<()> {
        for name in model.input_names() {
            if !self.variables.contains(&name.to_lowercase()) {
                return Err(VariableError::NotDeclared(name).into());
            }
        }
        for name in model.output_names() {
            if self.variables.contains(&name.to_lowercase()) {
                return Err(VariableError::NameClash(name).into());
            }
        }
        Ok(())
    }

    pub fn external_model(&self) -> Option<&dyn ExternalModel> {
        self.model.as_deref()
    }

    /// Key/value description of the external model for reports
    pub fn model_description(&self) -> Vec<(String, String)> {
        self.model.as_ref().map(|m| m.describe()).unwrap_or_default()
    }

    pub fn layout(&self) -> Layout {
        let mut names: Vec<String> = self.variables.names().map(str::to_string).collect();
        if let Some(model) = &self.model {
            names.extend(model.output_names().into_iter().map(|n| n.to_lowercase()));
        }
        Layout {
            names,
            n_random: self.variables.random().len(),
            n_constants: self.variables.constants().len(),
        }
    }

    /// Validate the setup and resolve the limit state against the row layout.
    pub fn prepare(&self) -> Result<(Layout, BoundLimitState)> {
        let limit_state = self.limit_state.as_ref().ok_or(AnalysisError::NoLimitState)?;
        if self.variables.random().is_empty() {
            return Err(AnalysisError::NoRandomVariables);
        }
        if let Some(model) = &self.model {
            self.check_model(model.as_ref())?;
        }

        let layout = self.layout();
        let bound = limit_state.bind(layout.names()).map_err(|e| match e {
            ExpressionError::UnknownVariable(name) => AnalysisError::UnboundName(name),
            other => AnalysisError::Expression(other),
        })?;
        Ok((layout, bound))
    }

    /// Names the limit state reads, after checking the whole setup
    pub fn check(&self) -> Result<Vec<String>> {
        self.prepare()?;
        Ok(self
            .limit_state
            .as_ref()
            .and_then(LimitState::variables)
            .unwrap_or_default())
    }

    /// Evaluate the external model on the rows listed in `send` and store
    /// the outputs in those rows. Without a model nothing happens.
    pub fn run_model(
        &mut self,
        layout: &Layout,
        table: &mut PointTable,
        send: &[usize],
        debug_output: bool,
    ) -> Result<()> {
        let Some(model) = self.model.as_mut() else {
            return Ok(());
        };

        let mut inputs = SampleBatch::new(send.len());
        for name in model.input_names() {
            let col = layout
                .index_of(&name)
                .ok_or_else(|| AnalysisError::UnboundName(name.clone()))?;
            let values = send.iter().map(|&row| table.row(row)[col]).collect();
            inputs.insert(&name, values)?;
        }

        let outputs = model.evaluate(&inputs)?;
        if debug_output {
            tracing::debug!("External model results:\n{outputs}");
        }

        for col in layout.output_range() {
            let name = &layout.names()[col];
            let values = outputs.column(name).ok_or_else(|| {
                ModelError::Failed(format!("output \"{name}\" missing from the results"))
            })?;
            if values.len() < send.len() {
                return Err(ModelError::OutputLength {
                    expected: send.len(),
                    found: values.len(),
                }
                .into());
            }
            for (&row, &value) in send.iter().zip(values) {
                table.row_mut(row)[col] = value;
            }
        }
        Ok(())
    }
}

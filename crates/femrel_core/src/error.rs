use std::fmt;

use crate::model::DistributionKind;

/// Errors related to variable declarations and distribution parameters
#[derive(Debug, Clone)]
pub enum VariableError {
    EmptyName,
    UnknownDistribution {
        name: String,
        distribution: String,
    },
    InvalidParameters {
        name: String,
        kind: DistributionKind,
        mean: f64,
        std: f64,
        reason: &'static str,
    },
    NotDeclared(String),
    NotRandom(String),
    SelfCorrelation(String),
    CorrelationOutOfRange {
        first: String,
        second: String,
        value: f64,
    },
    OutsideSupport {
        kind: DistributionKind,
        value: f64,
    },
    NameClash(String),
}

impl fmt::Display for VariableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableError::EmptyName => write!(f, "variable name must not be empty"),
            VariableError::UnknownDistribution { name, distribution } => {
                write!(
                    f,
                    "distribution \"{}\" set on variable \"{name}\" is not recognized",
                    distribution.to_uppercase()
                )
            }
            VariableError::InvalidParameters {
                name,
                kind,
                mean,
                std,
                reason,
            } => write!(
                f,
                "invalid {kind} parameters for \"{name}\" (mean={mean}, std={std}): {reason}"
            ),
            VariableError::NotDeclared(name) => {
                write!(f, "variable \"{name}\" is not declared")
            }
            VariableError::NotRandom(name) => {
                write!(f, "variable \"{name}\" is not a random variable")
            }
            VariableError::SelfCorrelation(name) => {
                write!(f, "cannot set the correlation of \"{name}\" with itself")
            }
            VariableError::CorrelationOutOfRange {
                first,
                second,
                value,
            } => write!(
                f,
                "correlation between \"{first}\" and \"{second}\" must be within [-1, 1], got {value}"
            ),
            VariableError::OutsideSupport { kind, value } => {
                write!(f, "value {value} is outside the support of the {kind} distribution")
            }
            VariableError::NameClash(name) => {
                write!(f, "model output \"{name}\" clashes with a declared variable")
            }
        }
    }
}

impl std::error::Error for VariableError {}

/// Errors raised while parsing or evaluating a limit state expression
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionError {
    UnexpectedChar { position: usize, found: char },
    UnexpectedToken { position: usize, found: String },
    UnexpectedEnd,
    InvalidNumber { position: usize, text: String },
    UnknownVariable(String),
    UnknownFunction(String),
    Arity {
        function: String,
        expected: &'static str,
        found: usize,
    },
    MissingUserFunction,
    UserArgument { parameter: String, reason: &'static str },
    KeywordNotAllowed(String),
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionError::UnexpectedChar { position, found } => {
                write!(f, "unexpected character '{found}' at position {position}")
            }
            ExpressionError::UnexpectedToken { position, found } => {
                write!(f, "unexpected '{found}' at position {position}")
            }
            ExpressionError::UnexpectedEnd => write!(f, "unexpected end of expression"),
            ExpressionError::InvalidNumber { position, text } => {
                write!(f, "invalid number \"{text}\" at position {position}")
            }
            ExpressionError::UnknownVariable(name) => write!(f, "unknown variable \"{name}\""),
            ExpressionError::UnknownFunction(name) => write!(f, "unknown function \"{name}\""),
            ExpressionError::Arity {
                function,
                expected,
                found,
            } => write!(
                f,
                "function \"{function}\" expects {expected} argument(s), got {found}"
            ),
            ExpressionError::MissingUserFunction => {
                write!(f, "userf() called but no user function was registered")
            }
            ExpressionError::UserArgument { parameter, reason } => {
                write!(f, "userf() argument \"{parameter}\": {reason}")
            }
            ExpressionError::KeywordNotAllowed(function) => {
                write!(f, "function \"{function}\" does not accept keyword arguments")
            }
        }
    }
}

impl std::error::Error for ExpressionError {}

/// Errors from the dense linear algebra kernels
#[derive(Debug, Clone, PartialEq)]
pub enum LinalgError {
    NotPositiveDefinite { row: usize },
    DimensionMismatch { expected: usize, found: usize },
    Singular { row: usize },
}

impl fmt::Display for LinalgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinalgError::NotPositiveDefinite { row } => {
                write!(f, "matrix is not positive definite (failed at row {row})")
            }
            LinalgError::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            LinalgError::Singular { row } => write!(f, "matrix is singular at row {row}"),
        }
    }
}

impl std::error::Error for LinalgError {}

/// Errors from the ANSYS PDS batch driver
#[derive(Debug, Clone)]
pub enum AnsysError {
    ExecutableNotFound(String),
    Io { path: String, message: String },
    MissingFile(String),
    DuplicateVariable(String),
    UnknownVariable(String),
    LengthLocked,
    InvalidLength(usize),
    TooFewValues {
        name: String,
        expected: usize,
        found: usize,
    },
    ModelNotSet,
    NoOutputs,
    Process { status: Option<i32>, stderr: String },
    MissingColumn(String),
    Parse { line: usize, message: String },
    SampleErrors { samples: usize },
}

impl fmt::Display for AnsysError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnsysError::ExecutableNotFound(path) => {
                write!(f, "ANSYS executable \"{path}\" does not exist")
            }
            AnsysError::Io { path, message } => write!(f, "I/O error on \"{path}\": {message}"),
            AnsysError::MissingFile(path) => write!(f, "file \"{path}\" does not exist"),
            AnsysError::DuplicateVariable(name) => {
                write!(f, "ANSYS variable \"{name}\" is already declared")
            }
            AnsysError::UnknownVariable(name) => {
                write!(f, "ANSYS input variable \"{name}\" is not declared")
            }
            AnsysError::LengthLocked => {
                write!(f, "cannot change the length while values are stored")
            }
            AnsysError::InvalidLength(len) => write!(f, "length must be positive, got {len}"),
            AnsysError::TooFewValues {
                name,
                expected,
                found,
            } => write!(
                f,
                "variable \"{name}\" received {found} values but the length is {expected}"
            ),
            AnsysError::ModelNotSet => write!(f, "no ANSYS model has been set"),
            AnsysError::NoOutputs => write!(f, "no ANSYS output variables were declared"),
            AnsysError::Process { status, stderr } => match status {
                Some(code) => write!(f, "ANSYS exited with status {code}: {stderr}"),
                None => write!(f, "ANSYS was terminated by a signal: {stderr}"),
            },
            AnsysError::MissingColumn(name) => {
                write!(f, "column \"{name}\" not found in the PDS results")
            }
            AnsysError::Parse { line, message } => {
                write!(f, "PDS results line {line}: {message}")
            }
            AnsysError::SampleErrors { samples } => {
                write!(f, "ANSYS reported errors on {samples} sample(s)")
            }
        }
    }
}

impl std::error::Error for AnsysError {}

/// Errors returned by an external model evaluation
#[derive(Debug, Clone)]
pub enum ModelError {
    Ansys(AnsysError),
    MissingInput(String),
    OutputLength { expected: usize, found: usize },
    Failed(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Ansys(e) => write!(f, "{e}"),
            ModelError::MissingInput(name) => write!(f, "model input \"{name}\" was not supplied"),
            ModelError::OutputLength { expected, found } => write!(
                f,
                "model returned {found} output value(s), expected {expected}"
            ),
            ModelError::Failed(msg) => write!(f, "model evaluation failed: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::Ansys(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AnsysError> for ModelError {
    fn from(e: AnsysError) -> Self {
        ModelError::Ansys(e)
    }
}

/// Errors from configuring or running a FORM or Monte Carlo analysis
#[derive(Debug, Clone)]
pub enum AnalysisError {
    Variable(VariableError),
    Expression(ExpressionError),
    Linalg(LinalgError),
    Model(ModelError),
    NoLimitState,
    NoRandomVariables,
    UnboundName(String),
    InvalidControls(String),
    InvalidOption { option: String, reason: String },
    NoResults,
    ZeroGradient { cycle: usize },
    Io(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Variable(e) => write!(f, "{e}"),
            AnalysisError::Expression(e) => write!(f, "limit state: {e}"),
            AnalysisError::Linalg(e) => write!(f, "correlation matrix: {e}"),
            AnalysisError::Model(e) => write!(f, "external model: {e}"),
            AnalysisError::NoLimitState => {
                write!(f, "the limit state must be defined before running")
            }
            AnalysisError::NoRandomVariables => {
                write!(f, "at least one random variable is required")
            }
            AnalysisError::UnboundName(name) => write!(
                f,
                "\"{name}\" is used but is neither a variable nor a model output"
            ),
            AnalysisError::InvalidControls(msg) => write!(f, "invalid process controls: {msg}"),
            AnalysisError::InvalidOption { option, reason } => {
                write!(f, "invalid option \"{option}\": {reason}")
            }
            AnalysisError::NoResults => write!(f, "the analysis has not been run yet"),
            AnalysisError::ZeroGradient { cycle } => {
                write!(f, "the limit state gradient vanished at cycle {cycle}")
            }
            AnalysisError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::Variable(e) => Some(e),
            AnalysisError::Expression(e) => Some(e),
            AnalysisError::Linalg(e) => Some(e),
            AnalysisError::Model(e) => Some(e),
            _ => None,
        }
    }
}

impl From<VariableError> for AnalysisError {
    fn from(e: VariableError) -> Self {
        AnalysisError::Variable(e)
    }
}

impl From<ExpressionError> for AnalysisError {
    fn from(e: ExpressionError) -> Self {
        AnalysisError::Expression(e)
    }
}

impl From<LinalgError> for AnalysisError {
    fn from(e: LinalgError) -> Self {
        AnalysisError::Linalg(e)
    }
}

impl From<ModelError> for AnalysisError {
    fn from(e: ModelError) -> Self {
        AnalysisError::Model(e)
    }
}

impl From<AnsysError> for AnalysisError {
    fn from(e: AnsysError) -> Self {
        AnalysisError::Model(ModelError::Ansys(e))
    }
}

impl From<std::io::Error> for AnalysisError {
    fn from(e: std::io::Error) -> Self {
        AnalysisError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

//! Limit state functions
//!
//! A limit state g(X) separates the safe domain (g > 0) from failure
//! (g ≤ 0). It is either a textual expression over variable names, which may
//! call one registered user function as `userf(...)`, or an arbitrary closure
//! over the named values.
//!
//! ```ignore
//! use femrel_core::limit_state::{LimitState, UserFunction};
//!
//! let stress = UserFunction::new(["eps", "fy", "e"], |a| (a[0] * a[2]).min(a[1]));
//! let ls = LimitState::expression("userf(eps, fy, E) - q")?.with_user_function(stress);
//! ```

mod compile;
mod lexer;
mod parser;

use std::fmt;
use std::sync::Arc;

use compile::{Node, bind, is_builtin_constant};
use parser::{Ast, collect_names, parse};

use crate::error::ExpressionError;

type UserClosure = dyn Fn(&[f64]) -> f64 + Send + Sync;
type LimitClosure = dyn Fn(&Bindings<'_>) -> f64 + Send + Sync;

/// A user supplied function callable as `userf(...)` inside an expression
#[derive(Clone)]
pub struct UserFunction {
    parameters: Vec<String>,
    func: Arc<UserClosure>,
}

impl UserFunction {
    /// `parameters` name the positional arguments so calls can also use
    /// keywords, e.g. `userf(x3=m, x2=z, x1=y)`.
    pub fn new<I, S, F>(parameters: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            parameters: parameters
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .collect(),
            func: Arc::new(func),
        }
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn call(&self, args: &[f64]) -> f64 {
        (self.func)(args)
    }
}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFunction")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Named view over one evaluation row
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    names: &'a [String],
    values: &'a [f64],
}

impl<'a> Bindings<'a> {
    pub fn new(names: &'a [String], values: &'a [f64]) -> Self {
        Self { names, values }
    }

    /// Value bound to `name` (case-insensitive)
    pub fn get(&self, name: &str) -> Option<f64> {
        let position = self
            .names
            .iter()
            .position(|n| n == name)
            .or_else(|| {
                let lower = name.to_lowercase();
                self.names.iter().position(|n| *n == lower)
            })?;
        self.values.get(position).copied()
    }

    /// Like [`Bindings::get`], returning NaN for unknown names. A NaN limit
    /// state value never counts as a failure.
    pub fn value(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(f64::NAN)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Parsed limit state expression
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    ast: Ast,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            source: source.trim().to_string(),
            ast: parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Variable names the expression reads, in order of first appearance.
    /// Built-in constants such as `pi` are left out.
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_names(&self.ast, &mut names);
        names.retain(|n| !is_builtin_constant(n));
        names
    }
}

/// A limit state function g(X)
#[derive(Clone)]
pub enum LimitState {
    Expression {
        expression: Expression,
        user_function: Option<UserFunction>,
    },
    Function {
        label: String,
        func: Arc<LimitClosure>,
    },
}

impl LimitState {
    pub fn expression(source: &str) -> Result<Self, ExpressionError> {
        Ok(LimitState::Expression {
            expression: Expression::parse(source)?,
            user_function: None,
        })
    }

    /// Register the function called as `userf(...)`. Has no effect on closures.
    #[must_use]
    pub fn with_user_function(self, user: UserFunction) -> Self {
        match self {
            LimitState::Expression { expression, .. } => LimitState::Expression {
                expression,
                user_function: Some(user),
            },
            other => other,
        }
    }

    pub fn function<F>(label: &str, func: F) -> Self
    where
        F: Fn(&Bindings<'_>) -> f64 + Send + Sync + 'static,
    {
        LimitState::Function {
            label: label.to_string(),
            func: Arc::new(func),
        }
    }

    /// Names the limit state needs; unknown for closures.
    pub fn variables(&self) -> Option<Vec<String>> {
        match self {
            LimitState::Expression { expression, .. } => Some(expression.variables()),
            LimitState::Function { .. } => None,
        }
    }

    /// Resolve against the evaluation row layout used by an analysis.
    pub fn bind(&self, names: &[String]) -> Result<BoundLimitState, ExpressionError> {
        match self {
            LimitState::Expression {
                expression,
                user_function,
            } => Ok(BoundLimitState {
                kind: BoundKind::Expression {
                    node: bind(&expression.ast, names, user_function.as_ref())?,
                    user: user_function.clone(),
                },
            }),
            LimitState::Function { func, .. } => Ok(BoundLimitState {
                kind: BoundKind::Function {
                    names: names.into(),
                    func: Arc::clone(func),
                },
            }),
        }
    }
}

impl fmt::Display for LimitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitState::Expression { expression, .. } => write!(f, "{}", expression.source()),
            LimitState::Function { label, .. } => write!(f, "{label} function"),
        }
    }
}

impl fmt::Debug for LimitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitState::Expression {
                expression,
                user_function,
            } => f
                .debug_struct("Expression")
                .field("source", &expression.source())
                .field("user_function", user_function)
                .finish(),
            LimitState::Function { label, .. } => {
                f.debug_struct("Function").field("label", label).finish_non_exhaustive()
            }
        }
    }
}

#[derive(Clone)]
enum BoundKind {
    Expression {
        node: Node,
        user: Option<UserFunction>,
    },
    Function {
        names: Arc<[String]>,
        func: Arc<LimitClosure>,
    },
}

/// A limit state resolved against a fixed row layout; evaluation is infallible.
#[derive(Clone)]
pub struct BoundLimitState {
    kind: BoundKind,
}

impl BoundLimitState {
    pub fn evaluate(&self, row: &[f64]) -> f64 {
        match &self.kind {
            BoundKind::Expression { node, user } => node.eval(row, user.as_ref()),
            BoundKind::Function { names, func } => func(&Bindings::new(names, row)),
        }
    }
}

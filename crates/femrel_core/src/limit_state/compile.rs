//! Resolution of a parsed expression against a fixed variable layout
//!
//! Binding turns every name into a slot of the evaluation row and checks all
//! calls up front, so evaluating a bound expression cannot fail.

use super::UserFunction;
use super::parser::{Argument, Ast, BinaryOp};
use crate::error::ExpressionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Exp,
    Log,
    Log10,
    Log2,
    Sqrt,
    Abs,
    Pow,
    Min,
    Max,
    Floor,
    Ceil,
    Hypot,
    Degrees,
    Radians,
}

/// Accepted argument counts
enum Arity {
    Exactly(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    fn accepts(&self, n: usize) -> bool {
        match *self {
            Arity::Exactly(k) => n == k,
            Arity::Range(lo, hi) => (lo..=hi).contains(&n),
            Arity::AtLeast(k) => n >= k,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Arity::Exactly(1) => "1",
            Arity::Exactly(2) => "2",
            Arity::Range(1, 2) => "1 or 2",
            Arity::AtLeast(1) => "at least 1",
            _ => "a different number of",
        }
    }
}

impl Builtin {
    fn lookup(name: &str) -> Option<Self> {
        let builtin = match name {
            "sin" => Builtin::Sin,
            "cos" => Builtin::Cos,
            "tan" => Builtin::Tan,
            "asin" => Builtin::Asin,
            "acos" => Builtin::Acos,
            "atan" => Builtin::Atan,
            "atan2" => Builtin::Atan2,
            "sinh" => Builtin::Sinh,
            "cosh" => Builtin::Cosh,
            "tanh" => Builtin::Tanh,
            "asinh" => Builtin::Asinh,
            "acosh" => Builtin::Acosh,
            "atanh" => Builtin::Atanh,
            "exp" => Builtin::Exp,
            "log" => Builtin::Log,
            "log10" => Builtin::Log10,
            "log2" => Builtin::Log2,
            "sqrt" => Builtin::Sqrt,
            "abs" | "fabs" => Builtin::Abs,
            "pow" => Builtin::Pow,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "floor" => Builtin::Floor,
            "ceil" => Builtin::Ceil,
            "hypot" => Builtin::Hypot,
            "degrees" => Builtin::Degrees,
            "radians" => Builtin::Radians,
            _ => return None,
        };
        Some(builtin)
    }

    fn arity(self) -> Arity {
        match self {
            Builtin::Atan2 | Builtin::Pow | Builtin::Hypot => Arity::Exactly(2),
            Builtin::Log => Arity::Range(1, 2),
            Builtin::Min | Builtin::Max => Arity::AtLeast(1),
            _ => Arity::Exactly(1),
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let x = args[0];
        match self {
            Builtin::Sin => x.sin(),
            Builtin::Cos => x.cos(),
            Builtin::Tan => x.tan(),
            Builtin::Asin => x.asin(),
            Builtin::Acos => x.acos(),
            Builtin::Atan => x.atan(),
            Builtin::Atan2 => x.atan2(args[1]),
            Builtin::Sinh => x.sinh(),
            Builtin::Cosh => x.cosh(),
            Builtin::Tanh => x.tanh(),
            Builtin::Asinh => x.asinh(),
            Builtin::Acosh => x.acosh(),
            Builtin::Atanh => x.atanh(),
            Builtin::Exp => x.exp(),
            Builtin::Log => match args.get(1) {
                Some(base) => x.ln() / base.ln(),
                None => x.ln(),
            },
            Builtin::Log10 => x.log10(),
            Builtin::Log2 => x.log2(),
            Builtin::Sqrt => x.sqrt(),
            Builtin::Abs => x.abs(),
            Builtin::Pow => x.powf(args[1]),
            Builtin::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Builtin::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Builtin::Floor => x.floor(),
            Builtin::Ceil => x.ceil(),
            Builtin::Hypot => x.hypot(args[1]),
            Builtin::Degrees => x.to_degrees(),
            Builtin::Radians => x.to_radians(),
        }
    }
}

fn builtin_constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        "tau" => Some(std::f64::consts::TAU),
        "inf" => Some(f64::INFINITY),
        _ => None,
    }
}

/// Whether `name` resolves without being declared
pub(crate) fn is_builtin_constant(name: &str) -> bool {
    builtin_constant(name).is_some()
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Const(f64),
    Slot(usize),
    Negate(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Builtin(Builtin, Vec<Node>),
    User(Vec<Node>),
}

/// Resolve `ast` against the row layout `names`.
pub(crate) fn bind(
    ast: &Ast,
    names: &[String],
    user: Option<&UserFunction>,
) -> Result<Node, ExpressionError> {
    let node = match ast {
        Ast::Number(v) => Node::Const(*v),
        Ast::Name(name) => match names.iter().position(|n| n == name) {
            Some(slot) => Node::Slot(slot),
            None => Node::Const(
                builtin_constant(name)
                    .ok_or_else(|| ExpressionError::UnknownVariable(name.clone()))?,
            ),
        },
        Ast::Negate(inner) => Node::Negate(Box::new(bind(inner, names, user)?)),
        Ast::Binary(op, lhs, rhs) => Node::Binary(
            *op,
            Box::new(bind(lhs, names, user)?),
            Box::new(bind(rhs, names, user)?),
        ),
        Ast::Call(func, args) if func == "userf" => {
            let user = user.ok_or(ExpressionError::MissingUserFunction)?;
            Node::User(bind_user_arguments(args, names, user)?)
        }
        Ast::Call(func, args) => {
            let builtin =
                Builtin::lookup(func).ok_or_else(|| ExpressionError::UnknownFunction(func.clone()))?;
            let arity = builtin.arity();
            if !arity.accepts(args.len()) {
                return Err(ExpressionError::Arity {
                    function: func.clone(),
                    expected: arity.describe(),
                    found: args.len(),
                });
            }
            let nodes = args
                .iter()
                .map(|arg| match arg {
                    Argument::Positional(a) => bind(a, names, user),
                    Argument::Keyword(..) => Err(ExpressionError::KeywordNotAllowed(func.clone())),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Node::Builtin(builtin, nodes)
        }
    };
    Ok(node)
}

/// Order the call arguments by the user function's declared parameters.
fn bind_user_arguments(
    args: &[Argument],
    names: &[String],
    user: &UserFunction,
) -> Result<Vec<Node>, ExpressionError> {
    let params = user.parameters();
    let mut slots: Vec<Option<Node>> = vec![None; params.len()];

    for (index, arg) in args.iter().enumerate() {
        let (position, ast) = match arg {
            Argument::Positional(ast) => {
                if index >= params.len() {
                    return Err(ExpressionError::Arity {
                        function: "userf".into(),
                        expected: "its declared number of",
                        found: args.len(),
                    });
                }
                (index, ast)
            }
            Argument::Keyword(key, ast) => {
                let position = params.iter().position(|p| p == key).ok_or_else(|| {
                    ExpressionError::UserArgument {
                        parameter: key.clone(),
                        reason: "unexpected keyword argument",
                    }
                })?;
                (position, ast)
            }
        };
        if slots[position].is_some() {
            return Err(ExpressionError::UserArgument {
                parameter: params[position].clone(),
                reason: "given more than once",
            });
        }
        slots[position] = Some(bind(ast, names, Some(user))?);
    }

    slots
        .into_iter()
        .zip(params)
        .map(|(slot, param)| {
            slot.ok_or_else(|| ExpressionError::UserArgument {
                parameter: param.clone(),
                reason: "missing argument",
            })
        })
        .collect()
}

impl Node {
    pub(crate) fn eval(&self, row: &[f64], user: Option<&UserFunction>) -> f64 {
        match self {
            Node::Const(v) => *v,
            Node::Slot(i) => row[*i],
            Node::Negate(inner) => -inner.eval(row, user),
            Node::Binary(op, lhs, rhs) => {
                let a = lhs.eval(row, user);
                let b = rhs.eval(row, user);
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    // floored modulo: the result takes the sign of the divisor
                    BinaryOp::Rem => a - b * (a / b).floor(),
                    BinaryOp::Pow => a.powf(b),
                }
            }
            Node::Builtin(builtin, args) => {
                let values: Vec<f64> = args.iter().map(|a| a.eval(row, user)).collect();
                builtin.apply(&values)
            }
            Node::User(args) => {
                let values: Vec<f64> = args.iter().map(|a| a.eval(row, user)).collect();
                // presence was checked when binding
                user.map_or(f64::NAN, |f| f.call(&values))
            }
        }
    }
}

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Configuration-time failure in an expression: these abort type
/// construction instead of producing a half-bound evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum CalcError {
    UnknownVariable { kind: &'static str, name: String },
    Parse { expr: String, msg: String },
}

impl Display for CalcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CalcError::UnknownVariable { kind, name } => {
                write!(f, "invalid {} parameter: {}", kind, name)
            }
            CalcError::Parse { expr, msg } => write!(f, "{} in \"{}\"", msg, expr),
        }
    }
}

impl Error for CalcError {}

/// Failure while compiling a type descriptor or resolving a type name.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeError {
    Calc(CalcError),
    UnknownType(String),
}

impl Display for TypeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeError::Calc(e) => e.fmt(f),
            TypeError::UnknownType(name) => write!(f, "unknown type: {}", name),
        }
    }
}

impl Error for TypeError {}

impl From<CalcError> for TypeError {
    fn from(e: CalcError) -> Self {
        TypeError::Calc(e)
    }
}

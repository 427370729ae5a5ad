//! The symbolic algebra the propagation engine is written against.

mod canonical;
mod equations;
mod expr;
pub mod ops;
mod parse;
mod polynomial;
mod solve;

pub use equations::Equation;
pub use expr::{BinaryOperation, Expression, Parameter, Params, Rational};
pub use ops::{Algebra, Builtins, EvaluationError};
pub use parse::{parse, ParseError, TokenKind};

//! Incrementally solve systems of symbolic equations.
//!
//! Unknowns are declared on a [`Session`] and equations are fed in one at a
//! time. Each equation is solved for every unknown it mentions and what we
//! learn is propagated to the other unknowns until nothing changes.
//!
//! ```rust
//! use reactive_constraints::{Answer, Session};
//!
//! let mut session = Session::new();
//! session.declare_all("x y");
//! let answer = session.answer();
//!
//! session.eq_str("x + y = 3").unwrap();
//! session.eq_str("x - y = 1").unwrap();
//! session.eq_str("answer = x*y").unwrap();
//!
//! let got = session.finalize(answer.name()).unwrap();
//! assert_eq!(got, Answer::Resolved("2".parse().unwrap()));
//! ```

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod algebra;
mod session;
mod variable;

pub use algebra::{
    parse, Algebra, BinaryOperation, Builtins, Equation, EvaluationError,
    Expression, Parameter, Params, ParseError, Rational, TokenKind,
};
pub use session::{Answer, Limits, PropagationError, Session};
pub use variable::{CandidateRecord, Value, Variable};

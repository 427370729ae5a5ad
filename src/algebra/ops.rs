//! [`Expression`] operations and the [`Algebra`] the propagation engine is
//! written against.

use crate::algebra::{
    canonical::Fraction, solve, BinaryOperation, Equation, Expression,
    Parameter, Rational,
};
use num_traits::{ToPrimitive, Zero};
use smol_str::SmolStr;
use std::collections::BTreeSet;

/// The symbolic algebra a [`crate::Session`] uses to manipulate expressions.
///
/// Implementations are expected to be pure: the same inputs always give the
/// same outputs.
pub trait Algebra {
    /// Find every value of `param` which satisfies the [`Equation`].
    ///
    /// An equation which can't be solved for `param` (or doesn't mention it)
    /// gives an empty list.
    fn solve(
        &self,
        equation: &Equation,
        param: &Parameter,
    ) -> Result<Vec<Expression>, EvaluationError>;

    /// Rewrite an expression into a canonical form.
    ///
    /// This must be idempotent.
    fn simplify(&self, expr: &Expression)
        -> Result<Expression, EvaluationError>;

    fn free_variables(&self, expr: &Expression) -> BTreeSet<Parameter> {
        expr.free_variables()
    }

    fn substitute(
        &self,
        expr: &Expression,
        param: &Parameter,
        value: &Expression,
    ) -> Expression {
        substitute(expr, param, value)
    }

    fn is_concrete(&self, expr: &Expression) -> bool {
        self.free_variables(expr).is_empty()
    }

    /// Get the numeric value of a concrete expression.
    fn evaluate(&self, expr: &Expression) -> Result<f64, EvaluationError> {
        evaluate(expr)
    }
}

/// The built-in exact algebra over the rationals, extended with square roots.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Builtins;

impl Algebra for Builtins {
    fn solve(
        &self,
        equation: &Equation,
        param: &Parameter,
    ) -> Result<Vec<Expression>, EvaluationError> {
        solve::solve(equation, param)
    }

    fn simplify(
        &self,
        expr: &Expression,
    ) -> Result<Expression, EvaluationError> {
        Fraction::from_expression(expr).map(|f| f.to_expression())
    }
}

/// Possible errors that may occur while manipulating an [`Expression`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("unknown function \"{name}\"")]
    UnknownFunction { name: SmolStr },
    #[error("attempted to divide by zero")]
    DivisionByZero,
    #[error("attempted to take the square root of a negative number")]
    NegativeSquareRoot,
    #[error("unable to raise an expression to the power of {exponent}")]
    UnsupportedExponent { exponent: Expression },
    #[error("the exponent {exponent} is too large")]
    ExponentTooLarge { exponent: Rational },
    #[error("\"{name}\" doesn't have a value")]
    UnknownParameter { name: Parameter },
}

/// Replace all references to a [`Parameter`] with an [`Expression`].
pub fn substitute(
    expression: &Expression,
    param: &Parameter,
    value: &Expression,
) -> Expression {
    match expression {
        Expression::Parameter(p) => {
            if p == param {
                value.clone()
            } else {
                Expression::Parameter(p.clone())
            }
        },
        Expression::Constant(c) => Expression::Constant(c.clone()),
        Expression::Binary { left, right, op } => {
            let left = substitute(left, param, value);
            let right = substitute(right, param, value);
            Expression::Binary {
                left: Box::new(left),
                right: Box::new(right),
                op: *op,
            }
        },
        Expression::Negate(inner) => -substitute(inner, param, value),
        Expression::FunctionCall { function, argument } => {
            Expression::FunctionCall {
                function: function.clone(),
                argument: Box::new(substitute(argument, param, value)),
            }
        },
    }
}

/// Evaluate a concrete [`Expression`] using floating point arithmetic.
pub fn evaluate(expr: &Expression) -> Result<f64, EvaluationError> {
    match expr {
        Expression::Parameter(p) => {
            Err(EvaluationError::UnknownParameter { name: p.clone() })
        },
        Expression::Constant(value) => Ok(to_f64(value)),
        Expression::Binary { left, right, op } => {
            let left = evaluate(left)?;
            let right = evaluate(right)?;

            match op {
                BinaryOperation::Plus => Ok(left + right),
                BinaryOperation::Minus => Ok(left - right),
                BinaryOperation::Times => Ok(left * right),
                BinaryOperation::Divide if right.is_zero() => {
                    Err(EvaluationError::DivisionByZero)
                },
                BinaryOperation::Divide => Ok(left / right),
                BinaryOperation::Power => Ok(left.powf(right)),
            }
        },
        Expression::Negate(inner) => evaluate(inner).map(|value| -value),
        Expression::FunctionCall { function, argument } => {
            let argument = evaluate(argument)?;

            match function.as_str() {
                "sqrt" if argument < 0.0 => {
                    Err(EvaluationError::NegativeSquareRoot)
                },
                "sqrt" => Ok(argument.sqrt()),
                _ => Err(EvaluationError::UnknownFunction {
                    name: function.clone(),
                }),
            }
        },
    }
}

fn to_f64(value: &Rational) -> f64 {
    match (value.numer().to_f64(), value.denom().to_f64()) {
        (Some(numer), Some(denom)) => numer / denom,
        _ => std::f64::NAN,
    }
}

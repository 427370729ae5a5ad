//! Canonical rational-function form of an [`Expression`].

use crate::algebra::{
    ops::EvaluationError,
    polynomial::{self, Atom, Polynomial},
    BinaryOperation, Expression, Rational,
};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

/// The largest exponent we are willing to expand.
const MAX_EXPONENT: i64 = 64;

/// Each pass removes one radical from a denominator.
const MAX_RATIONALISE_PASSES: usize = 8;

/// A ratio of two [`Polynomial`]s with no common factors, coprime integer
/// coefficients and a denominator which is free of radicals (where possible)
/// with a positive leading coefficient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fraction {
    pub(crate) numerator: Polynomial,
    pub(crate) denominator: Polynomial,
}

impl Fraction {
    pub(crate) fn new(
        numerator: Polynomial,
        denominator: Polynomial,
    ) -> Result<Fraction, EvaluationError> {
        if denominator.is_zero() {
            return Err(EvaluationError::DivisionByZero);
        }

        Ok(Fraction {
            numerator,
            denominator,
        }
        .reduced())
    }

    pub(crate) fn from_polynomial(numerator: Polynomial) -> Fraction {
        Fraction {
            numerator,
            denominator: Polynomial::one(),
        }
        .reduced()
    }

    pub(crate) fn from_expression(
        expr: &Expression,
    ) -> Result<Fraction, EvaluationError> {
        match expr {
            Expression::Parameter(p) => {
                Ok(Fraction::from_polynomial(Polynomial::parameter(p.clone())))
            },
            Expression::Constant(value) => {
                Ok(Fraction::from_polynomial(Polynomial::constant(value.clone())))
            },
            Expression::Binary { left, right, op } => {
                let left = Fraction::from_expression(left)?;

                match op {
                    BinaryOperation::Plus => {
                        Ok(left.add(&Fraction::from_expression(right)?))
                    },
                    BinaryOperation::Minus => {
                        Ok(left.sub(&Fraction::from_expression(right)?))
                    },
                    BinaryOperation::Times => {
                        Ok(left.mul(&Fraction::from_expression(right)?))
                    },
                    BinaryOperation::Divide => {
                        left.div(&Fraction::from_expression(right)?)
                    },
                    BinaryOperation::Power => left.pow(right),
                }
            },
            Expression::Negate(inner) => {
                Ok(Fraction::from_expression(inner)?.neg())
            },
            Expression::FunctionCall { function, argument }
                if function == "sqrt" =>
            {
                Fraction::from_expression(argument)?.sqrt()
            },
            Expression::FunctionCall { function, .. } => {
                Err(EvaluationError::UnknownFunction {
                    name: function.clone(),
                })
            },
        }
    }

    pub(crate) fn to_expression(&self) -> Expression {
        match (self.numerator.as_constant(), self.denominator.as_constant()) {
            (Some(numerator), Some(denominator)) => {
                Expression::Constant(numerator / denominator)
            },
            (_, Some(denominator)) if denominator.is_one() => {
                self.numerator.to_expression()
            },
            _ => {
                self.numerator.to_expression()
                    / self.denominator.to_expression()
            },
        }
    }

    pub(crate) fn zero() -> Fraction {
        Fraction {
            numerator: Polynomial::zero(),
            denominator: Polynomial::one(),
        }
    }

    pub(crate) fn is_zero(&self) -> bool { self.numerator.is_zero() }

    pub(crate) fn add(&self, other: &Fraction) -> Fraction {
        let numerator = &(&self.numerator * &other.denominator)
            + &(&other.numerator * &self.denominator);
        let denominator = &self.denominator * &other.denominator;

        Fraction {
            numerator,
            denominator,
        }
        .reduced()
    }

    pub(crate) fn sub(&self, other: &Fraction) -> Fraction {
        self.add(&other.neg())
    }

    pub(crate) fn neg(&self) -> Fraction {
        Fraction {
            numerator: -&self.numerator,
            denominator: self.denominator.clone(),
        }
    }

    pub(crate) fn mul(&self, other: &Fraction) -> Fraction {
        Fraction {
            numerator: &self.numerator * &other.numerator,
            denominator: &self.denominator * &other.denominator,
        }
        .reduced()
    }

    pub(crate) fn div(
        &self,
        other: &Fraction,
    ) -> Result<Fraction, EvaluationError> {
        Fraction::new(
            &self.numerator * &other.denominator,
            &self.denominator * &other.numerator,
        )
    }

    fn pow(&self, exponent: &Expression) -> Result<Fraction, EvaluationError> {
        let unsupported = || EvaluationError::UnsupportedExponent {
            exponent: exponent.clone(),
        };

        let value = Fraction::from_expression(exponent)?
            .as_constant()
            .ok_or_else(unsupported)?;

        // x^(n/2) is sqrt(x)^n
        let (base, value) = if value.denom() == &BigInt::from(2) {
            (self.sqrt()?, value * Rational::from_integer(2.into()))
        } else {
            (self.clone(), value)
        };

        if !value.is_integer() {
            return Err(unsupported());
        }

        let power = value
            .to_integer()
            .to_i64()
            .filter(|p| p.abs() <= MAX_EXPONENT)
            .ok_or_else(|| EvaluationError::ExponentTooLarge {
                exponent: value.clone(),
            })?;
        let magnitude = power.abs() as u32;

        if power >= 0 {
            Ok(Fraction {
                numerator: base.numerator.pow(magnitude),
                denominator: base.denominator.pow(magnitude),
            }
            .reduced())
        } else {
            Fraction::new(
                base.denominator.pow(magnitude),
                base.numerator.pow(magnitude),
            )
        }
    }

    /// `sqrt(n/d)` is `sqrt(n*d)/d`.
    pub(crate) fn sqrt(&self) -> Result<Fraction, EvaluationError> {
        let radicand = &self.numerator * &self.denominator;
        let root = sqrt_polynomial(&radicand)?;

        Fraction::new(root, self.denominator.clone())
    }

    /// The value of this fraction, if it is a plain number.
    pub(crate) fn as_constant(&self) -> Option<Rational> {
        let numerator = self.numerator.as_constant()?;
        let denominator = self.denominator.as_constant()?;

        Some(numerator / denominator)
    }

    fn reduced(mut self) -> Fraction {
        if self.numerator.is_zero() {
            return Fraction::zero();
        }

        self.rationalise_denominator();
        self.cancel_common_factors();
        self.normalise_coefficients();

        self
    }

    /// Multiply through by conjugates until the denominator has no radicals.
    fn rationalise_denominator(&mut self) {
        for _ in 0..MAX_RATIONALISE_PASSES {
            let radical = match self
                .denominator
                .atoms()
                .into_iter()
                .find(|atom| atom.is_radical())
            {
                Some(radical) => radical.clone(),
                None => return,
            };

            let parts = self.denominator.coefficients_in(&radical);
            if parts.len() != 2 {
                return;
            }

            let conjugate =
                &parts[0] - &(&parts[1] * &Polynomial::atom(radical));
            let denominator = &self.denominator * &conjugate;
            if denominator.is_zero() {
                return;
            }

            self.numerator = &self.numerator * &conjugate;
            self.denominator = denominator;
        }
    }

    fn cancel_common_factors(&mut self) {
        if self.denominator.has_radicals() {
            return;
        }

        let common = self
            .numerator
            .radical_free_parts()
            .iter()
            .fold(self.denominator.clone(), |acc, part| {
                polynomial::gcd(&acc, part)
            });

        if common.as_constant().is_some() {
            return;
        }

        if let (Some(numerator), Some(denominator)) = (
            self.numerator.div_exact(&common),
            self.denominator.div_exact(&common),
        ) {
            self.numerator = numerator;
            self.denominator = denominator;
        }
    }

    /// Scale so every coefficient is an integer, the coefficients share no
    /// common factor and the denominator's leading coefficient is positive.
    fn normalise_coefficients(&mut self) {
        let mut denominators = BigInt::one();
        let mut numerators = BigInt::zero();

        let coefficients = self
            .numerator
            .coefficients()
            .chain(self.denominator.coefficients());

        for coefficient in coefficients {
            denominators = denominators.lcm(coefficient.denom());
            numerators = numerators.gcd(coefficient.numer());
        }

        if numerators.is_zero() {
            return;
        }

        let mut factor = Rational::new(denominators, numerators);
        if self.denominator.leading_coefficient().is_negative() {
            factor = -factor;
        }

        self.numerator = self.numerator.scale(&factor);
        self.denominator = self.denominator.scale(&factor);
    }
}

/// Take the square root of a polynomial, exactly when possible and otherwise
/// by introducing a radical [`Atom`].
fn sqrt_polynomial(p: &Polynomial) -> Result<Polynomial, EvaluationError> {
    if let Some(value) = p.as_constant() {
        if value.is_negative() {
            return Err(EvaluationError::NegativeSquareRoot);
        }
        return Ok(constant_sqrt(&value));
    }

    let content = p.content();
    let rest = p.scale(&content.recip());
    let outside = constant_sqrt(&content);

    if rest.leading_coefficient().is_positive() {
        if let Some(root) = rest.sqrt_exact() {
            return Ok(&outside * &root);
        }
    }

    Ok(&outside * &Polynomial::atom(Atom::Radical(rest)))
}

/// `sqrt(a/b)` as `(outside/b)*sqrt(inside)` where `a*b = outside^2 * inside`.
fn constant_sqrt(value: &Rational) -> Polynomial {
    if value.is_zero() {
        return Polynomial::zero();
    }

    let (outside, inside) =
        polynomial::split_square(&(value.numer() * value.denom()));
    let coefficient = Rational::new(outside, value.denom().clone());

    if inside.is_one() {
        Polynomial::constant(coefficient)
    } else {
        let radical = Atom::Radical(Polynomial::constant(
            Rational::from_integer(inside),
        ));
        Polynomial::atom(radical).scale(&coefficient)
    }
}

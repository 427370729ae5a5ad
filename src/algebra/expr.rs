use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use smol_str::SmolStr;
use std::{
    collections::BTreeSet,
    fmt::{self, Display, Formatter},
    ops::{Add, Div, Mul, Neg, Sub},
};

/// An exact rational number.
pub type Rational = BigRational;

/// An expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Expression {
    /// A free variable.
    Parameter(Parameter),
    Constant(Rational),
    /// An expression involving two operands.
    Binary {
        left: Box<Expression>,
        right: Box<Expression>,
        op: BinaryOperation,
    },
    /// Negate the expression.
    Negate(Box<Expression>),
    /// Invoke a function by name.
    FunctionCall {
        function: SmolStr,
        argument: Box<Expression>,
    },
}

impl Expression {
    pub fn integer(value: i64) -> Self {
        Expression::Constant(Rational::from_integer(BigInt::from(value)))
    }

    pub fn rational(numerator: i64, denominator: i64) -> Self {
        Expression::Constant(Rational::new(
            BigInt::from(numerator),
            BigInt::from(denominator),
        ))
    }

    pub fn named(name: &str) -> Self {
        Expression::Parameter(Parameter::named(name))
    }

    pub fn zero() -> Self { Expression::Constant(Rational::zero()) }

    pub fn one() -> Self { Expression::Constant(Rational::one()) }

    /// Raise this expression to some power.
    pub fn pow(self, exponent: Expression) -> Self {
        Expression::Binary {
            left: Box::new(self),
            right: Box::new(exponent),
            op: BinaryOperation::Power,
        }
    }

    pub fn sqrt(self) -> Self {
        Expression::FunctionCall {
            function: "sqrt".into(),
            argument: Box::new(self),
        }
    }

    /// Iterate over all [`Parameter`]s mentioned in this [`Expression`],
    /// in tree order and possibly with repeats.
    pub fn params(&self) -> Params<'_> {
        Params {
            to_visit: vec![self],
        }
    }

    /// The distinct [`Parameter`]s this [`Expression`] depends on.
    pub fn free_variables(&self) -> BTreeSet<Parameter> {
        self.params().cloned().collect()
    }

    pub fn depends_on(&self, param: &Parameter) -> bool {
        self.params().any(|p| p == param)
    }

    /// Does this [`Expression`] contain no [`Parameter`]s?
    pub fn is_constant(&self) -> bool { self.params().next().is_none() }

    /// How tightly this expression binds when printed.
    fn precedence(&self) -> u8 {
        match self {
            Expression::Parameter(_) | Expression::FunctionCall { .. } => 5,
            Expression::Constant(value) => {
                if !value.is_integer() {
                    2
                } else if value.is_negative() {
                    3
                } else {
                    5
                }
            },
            Expression::Negate(_) => 3,
            Expression::Binary { op, .. } => op.precedence(),
        }
    }
}

impl From<Parameter> for Expression {
    fn from(p: Parameter) -> Expression { Expression::Parameter(p) }
}

impl From<i64> for Expression {
    fn from(value: i64) -> Expression { Expression::integer(value) }
}

impl From<Rational> for Expression {
    fn from(value: Rational) -> Expression { Expression::Constant(value) }
}

/// An iterator over the [`Parameter`]s in an [`Expression`].
#[derive(Debug, Clone)]
pub struct Params<'expr> {
    to_visit: Vec<&'expr Expression>,
}

impl<'expr> Iterator for Params<'expr> {
    type Item = &'expr Parameter;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(next) = self.to_visit.pop() {
            match next {
                Expression::Parameter(p) => return Some(p),
                Expression::Constant(_) => {},
                Expression::Binary { left, right, .. } => {
                    self.to_visit.push(right);
                    self.to_visit.push(left);
                },
                Expression::Negate(inner) => self.to_visit.push(inner),
                Expression::FunctionCall { argument, .. } => {
                    self.to_visit.push(argument)
                },
            }
        }

        None
    }
}

/// A named unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Parameter(SmolStr);

impl Parameter {
    pub fn named<S: Into<SmolStr>>(name: S) -> Self { Parameter(name.into()) }

    pub fn name(&self) -> &str { &self.0 }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An operation that can be applied to two arguments.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinaryOperation {
    Plus,
    Minus,
    Times,
    Divide,
    Power,
}

impl BinaryOperation {
    fn precedence(self) -> u8 {
        match self {
            BinaryOperation::Plus | BinaryOperation::Minus => 1,
            BinaryOperation::Times | BinaryOperation::Divide => 2,
            BinaryOperation::Power => 4,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOperation::Plus => " + ",
            BinaryOperation::Minus => " - ",
            BinaryOperation::Times => "*",
            BinaryOperation::Divide => "/",
            BinaryOperation::Power => "^",
        }
    }
}

// define some operator overloads to make constructing an expression easier.

macro_rules! binary_op {
    ($trait:ident, $method:ident, $op:ident) => {
        impl $trait for Expression {
            type Output = Expression;

            fn $method(self, rhs: Expression) -> Expression {
                Expression::Binary {
                    left: Box::new(self),
                    right: Box::new(rhs),
                    op: BinaryOperation::$op,
                }
            }
        }
    };
}

binary_op!(Add, add, Plus);
binary_op!(Sub, sub, Minus);
binary_op!(Mul, mul, Times);
binary_op!(Div, div, Divide);

impl Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Self::Output { Expression::Negate(Box::new(self)) }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Parameter(p) => write!(f, "{}", p),
            Expression::Constant(value) => write!(f, "{}", value),
            Expression::Binary { left, right, op } => {
                let (left_min, right_min) = match op {
                    // right associative, and the exponent may be negated
                    BinaryOperation::Power => (5, 3),
                    other => (other.precedence(), other.precedence() + 1),
                };

                write_operand(left, left_min, f)?;
                write!(f, "{}", op.symbol())?;
                write_operand(right, right_min, f)
            },
            Expression::Negate(inner) => {
                write!(f, "-")?;
                write_operand(inner, 3, f)
            },
            Expression::FunctionCall { function, argument } => {
                write!(f, "{}({})", function, argument)
            },
        }
    }
}

fn write_operand(
    expr: &Expression,
    min_precedence: u8,
    f: &mut Formatter<'_>,
) -> fmt::Result {
    if expr.precedence() < min_precedence {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

//! Solving a single [`Equation`] for a single unknown.

use crate::algebra::{
    canonical::Fraction,
    ops::{self, EvaluationError},
    polynomial::{self, Atom, Polynomial},
    Equation, Expression, Parameter, Rational,
};
use arrayvec::ArrayVec;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

/// Don't go looking for rational roots when the constant or leading term has
/// more divisors than trial division can reasonably find.
const RATIONAL_ROOT_SEARCH_LIMIT: u64 = 1_000_000;

/// Find every value of `param` which satisfies the [`Equation`].
///
/// The equation is rewritten as `N/D = 0`. A single square root mentioning
/// `param` is isolated and squared away, `N` is treated as a polynomial in
/// `param` and its linear and quadratic factors are solved exactly. Roots
/// which make `D` vanish (or which were introduced by squaring) are dropped.
pub(crate) fn solve(
    equation: &Equation,
    param: &Parameter,
) -> Result<Vec<Expression>, EvaluationError> {
    let body = equation.body();
    let fraction = Fraction::from_expression(&body)?;

    if !fraction.numerator.mentions(param) {
        return Ok(Vec::new());
    }

    let (numerator, squared) = match isolate_radical(&fraction.numerator, param)
    {
        Some(isolated) => isolated,
        None => {
            log::trace!("Unable to isolate {} in {}", param, equation);
            return Ok(Vec::new());
        },
    };

    let target = Atom::Parameter(param.clone());
    let mut solutions: Vec<Expression> = Vec::new();

    for root in polynomial_roots(&numerator, &target)? {
        let root = root.to_expression();

        let denominator = fraction.denominator.to_expression();
        let mut keep =
            vanishes(&ops::substitute(&denominator, param, &root)) == Some(false);

        if squared {
            keep &= vanishes(&ops::substitute(&body, param, &root)) == Some(true);
        }

        if keep && !solutions.contains(&root) {
            solutions.push(root);
        }
    }

    sort_concrete(&mut solutions);

    Ok(solutions)
}

/// Does this expression come out to zero? `None` when it can't be evaluated.
fn vanishes(expr: &Expression) -> Option<bool> {
    let fraction = Fraction::from_expression(expr).ok()?;

    if fraction.is_zero() {
        Some(true)
    } else if expr.is_constant() {
        let value = ops::evaluate(&fraction.to_expression()).ok()?;
        Some(approx::abs_diff_eq!(value, 0.0, epsilon = 1e-9))
    } else {
        Some(false)
    }
}

/// Concrete solutions are listed in ascending order.
fn sort_concrete(solutions: &mut Vec<Expression>) {
    let values: Option<Vec<f64>> =
        solutions.iter().map(|s| ops::evaluate(s).ok()).collect();

    if let Some(values) = values {
        let mut pairs: Vec<_> =
            values.into_iter().zip(solutions.drain(..)).collect();
        pairs.sort_by(|(a, _), (b, _)| {
            a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
        });
        solutions.extend(pairs.into_iter().map(|(_, s)| s));
    }
}

/// Rewrite `P + Q*sqrt(R) = 0` as `P^2 - Q^2*R = 0` when `param` appears
/// inside exactly one radical. The flag says whether squaring happened.
fn isolate_radical(
    numerator: &Polynomial,
    param: &Parameter,
) -> Option<(Polynomial, bool)> {
    let radicals: Vec<Atom> = numerator
        .atoms()
        .into_iter()
        .filter(|atom| atom.is_radical() && atom.mentions(param))
        .cloned()
        .collect();

    let radical = match radicals.as_slice() {
        [] => return Some((numerator.clone(), false)),
        [radical] => radical,
        _ => return None,
    };

    let radicand = match radical {
        Atom::Radical(radicand) => radicand,
        Atom::Parameter(_) => return None,
    };

    let parts = numerator.coefficients_in(radical);
    if parts.len() != 2 {
        return None;
    }

    let squared =
        &parts[0].pow(2) - &(&parts[1].pow(2) * radicand);

    if squared.atoms().into_iter().any(|a| a.is_radical() && a.mentions(param))
    {
        return None;
    }

    Some((squared, true))
}

/// The roots of `numerator`, treated as a polynomial in `atom`.
fn polynomial_roots(
    numerator: &Polynomial,
    atom: &Atom,
) -> Result<Vec<Fraction>, EvaluationError> {
    let mut coefficients = strip_content(numerator.coefficients_in(atom));
    let mut roots = Vec::new();

    // factor out atom^n
    let lowest = coefficients.iter().position(|c| !c.is_zero()).unwrap_or(0);
    if lowest > 0 {
        roots.push(Fraction::zero());
        coefficients.drain(..lowest);
    }

    roots.extend(solve_factor(&coefficients)?);

    Ok(roots)
}

/// Divide out the greatest common divisor of the coefficients.
fn strip_content(coefficients: Vec<Polynomial>) -> Vec<Polynomial> {
    if coefficients.iter().any(Polynomial::has_radicals) {
        return coefficients;
    }

    let content = coefficients
        .iter()
        .filter(|c| !c.is_zero())
        .fold(Polynomial::zero(), |acc, c| polynomial::gcd(&acc, c));

    if content.as_constant().is_some() {
        return coefficients;
    }

    coefficients
        .iter()
        .map(|c| c.div_exact(&content).unwrap_or_else(|| c.clone()))
        .collect()
}

/// Solve `c_0 + c_1*x + ... + c_n*x^n = 0`.
fn solve_factor(
    coefficients: &[Polynomial],
) -> Result<Vec<Fraction>, EvaluationError> {
    match coefficients {
        [] | [_] => Ok(Vec::new()),
        [c, b] => Ok(vec![Fraction::new(-c, b.clone())?]),
        [c, b, a] => Ok(quadratic(a, b, c)?.into_iter().collect()),
        _ => {
            let constants: Option<Vec<Rational>> =
                coefficients.iter().map(Polynomial::as_constant).collect();

            if let Some(constants) = constants {
                return deflate(constants);
            }

            if let Some(roots) = biquadratic(coefficients)? {
                return Ok(roots);
            }

            log::trace!(
                "Unable to solve a degree {} polynomial",
                coefficients.len() - 1
            );
            Ok(Vec::new())
        },
    }
}

/// The roots of `a*x^2 + b*x + c`, smallest square root first.
fn quadratic(
    a: &Polynomial,
    b: &Polynomial,
    c: &Polynomial,
) -> Result<ArrayVec<[Fraction; 2]>, EvaluationError> {
    let mut roots = ArrayVec::new();

    let four = Rational::from_integer(4.into());
    let discriminant = &(b * b) - &(a * c).scale(&four);
    let twice_a = Fraction::from_polynomial(a.scale(&Rational::from_integer(2.into())));
    let minus_b = Fraction::from_polynomial(-b);

    if discriminant.is_zero() {
        roots.push(minus_b.div(&twice_a)?);
        return Ok(roots);
    }

    let root = match Fraction::from_polynomial(discriminant).sqrt() {
        Ok(root) => root,
        Err(EvaluationError::NegativeSquareRoot) => return Ok(roots),
        Err(e) => return Err(e),
    };

    roots.push(minus_b.sub(&root).div(&twice_a)?);
    roots.push(minus_b.add(&root).div(&twice_a)?);

    Ok(roots)
}

/// `a*x^4 + b*x^2 + c` is a quadratic in `x^2`.
fn biquadratic(
    coefficients: &[Polynomial],
) -> Result<Option<Vec<Fraction>>, EvaluationError> {
    match coefficients {
        [c, zero_1, b, zero_3, a] if zero_1.is_zero() && zero_3.is_zero() => {
            let mut roots = Vec::new();

            for square in quadratic(a, b, c)? {
                match square.sqrt() {
                    Ok(root) => {
                        roots.push(root.neg());
                        roots.push(root);
                    },
                    Err(EvaluationError::NegativeSquareRoot) => {},
                    Err(e) => return Err(e),
                }
            }

            Ok(Some(roots))
        },
        _ => Ok(None),
    }
}

/// Find the rational roots of a polynomial with numeric coefficients by
/// trying every `p/q` where `p` divides the constant term and `q` divides the
/// leading coefficient, then solve whatever is left if it's small enough.
fn deflate(
    coefficients: Vec<Rational>,
) -> Result<Vec<Fraction>, EvaluationError> {
    let mut coefficients = integer_coefficients(&coefficients);
    let mut roots = Vec::new();

    let first = coefficients.first().cloned().unwrap_or_else(BigInt::zero);
    let last = coefficients.last().cloned().unwrap_or_else(BigInt::zero);

    for numerator in divisors(&first) {
        for denominator in divisors(&last) {
            for sign in &[-1, 1] {
                let candidate = Rational::new(
                    &numerator * BigInt::from(*sign),
                    denominator.clone(),
                );

                while coefficients.len() > 1
                    && evaluate_at(&coefficients, &candidate).is_zero()
                {
                    coefficients = synthetic_division(&coefficients, &candidate);
                    roots.push(Fraction::from_polynomial(Polynomial::constant(
                        candidate.clone(),
                    )));
                }
            }
        }
    }

    let rest: Vec<Polynomial> = coefficients
        .into_iter()
        .map(|c| Polynomial::constant(Rational::from_integer(c)))
        .collect();

    if rest.len() <= 3 {
        roots.extend(solve_factor(&rest)?);
    }

    Ok(roots)
}

fn integer_coefficients(coefficients: &[Rational]) -> Vec<BigInt> {
    let scale = coefficients
        .iter()
        .fold(BigInt::one(), |acc, c| acc.lcm(c.denom()));

    coefficients
        .iter()
        .map(|c| (c * Rational::from_integer(scale.clone())).to_integer())
        .collect()
}

/// Every positive divisor of `n`, or nothing when `n` is zero or too large.
fn divisors(n: &BigInt) -> Vec<BigInt> {
    let n = match n.abs().to_u64() {
        Some(n) if n > 0 && n <= RATIONAL_ROOT_SEARCH_LIMIT => n,
        _ => return Vec::new(),
    };

    (1..=n)
        .take_while(|d| d * d <= n)
        .filter(|d| n % d == 0)
        .flat_map(|d| if d * d == n { vec![d] } else { vec![d, n / d] })
        .map(BigInt::from)
        .collect()
}

fn evaluate_at(coefficients: &[BigInt], x: &Rational) -> Rational {
    coefficients.iter().rev().fold(Rational::zero(), |acc, c| {
        acc * x + Rational::from_integer(c.clone())
    })
}

/// Divide by `(x - root)`, given the root is exact.
fn synthetic_division(coefficients: &[BigInt], root: &Rational) -> Vec<BigInt> {
    let mut quotient = Vec::with_capacity(coefficients.len() - 1);
    let mut carry = Rational::zero();

    for c in coefficients.iter().skip(1).rev() {
        carry = carry * root + Rational::from_integer(c.clone());
        quotient.push(carry.clone());
    }
    quotient.reverse();

    integer_coefficients(&quotient)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solutions(equation: &str, param: &str) -> Vec<String> {
        let equation: Equation = equation.parse().unwrap();

        solve(&equation, &Parameter::named(param))
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn solve_for_a_single_unknown() {
        let inputs: Vec<(&str, &str, Vec<&str>)> = vec![
            ("x = 2", "x", vec!["2"]),
            ("2*x + 1 = 0", "x", vec!["-1/2"]),
            ("x + y = 3", "x", vec!["-y + 3"]),
            ("x + y = 3", "y", vec!["-x + 3"]),
            ("x^2 = 4", "x", vec!["-2", "2"]),
            ("x^2 = 2", "x", vec!["-sqrt(2)", "sqrt(2)"]),
            ("x^2 + 1 = 0", "x", vec![]),
            ("x^2 - 2*x + 1 = 0", "x", vec!["1"]),
            ("x^3 = x", "x", vec!["-1", "0", "1"]),
            ("x^3 - 6*x^2 + 11*x - 6 = 0", "x", vec!["1", "2", "3"]),
            ("x^4 - 5*x^2 + 4 = 0", "x", vec!["-2", "-1", "1", "2"]),
            ("k*x = k", "x", vec!["1"]),
            ("1/x = 2", "x", vec!["1/2"]),
            ("x/(x - 1) = 0", "x", vec!["0"]),
            ("(x^2 - 1)/(x - 1) = 0", "x", vec!["-1"]),
            ("sqrt(x) = 3", "x", vec!["9"]),
            ("sqrt(x) = -3", "x", vec![]),
            ("x = x", "x", vec![]),
            ("y = 2", "x", vec![]),
        ];

        for (equation, param, should_be) in inputs {
            let got = solutions(equation, param);
            assert_eq!(got, should_be, "solving {} for {}", equation, param);
        }
    }

    #[test]
    fn quadratic_with_symbolic_coefficients() {
        let got = solutions(
            "k*x1^2 - 2*k*x1 + l = k*x2^2 - 2*k*x2 + l",
            "x1",
        );

        assert_eq!(got, vec!["-x2 + 2", "x2"]);
    }

    #[test]
    fn unknown_functions_are_errors() {
        let equation: Equation = "sin(x) = 1".parse().unwrap();

        let got = solve(&equation, &Parameter::named("x")).unwrap_err();

        assert_eq!(got, EvaluationError::UnknownFunction { name: "sin".into() });
    }
}

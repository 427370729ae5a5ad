//! Exact multivariate polynomials with rational coefficients.
//!
//! The indeterminates are [`Atom`]s: either a [`Parameter`] or the square root
//! of a polynomial with no exact square root. Radical atoms only ever appear
//! to the first power because `sqrt(p)^2` is rewritten to `p` as soon as it
//! is produced.

use crate::algebra::{Expression, Parameter, Rational};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::{
    cmp::Ordering,
    collections::{btree_map::Entry, BTreeMap, BTreeSet},
    ops::{Add, Mul, Neg, Sub},
};

/// Trial division stops after this many candidate factors.
const TRIAL_DIVISION_LIMIT: u64 = 100_000;

/// An indeterminate in a [`Polynomial`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum Atom {
    Parameter(Parameter),
    /// The square root of a polynomial which has no exact square root.
    Radical(Polynomial),
}

impl Atom {
    pub(crate) fn is_radical(&self) -> bool {
        match self {
            Atom::Radical(_) => true,
            Atom::Parameter(_) => false,
        }
    }

    pub(crate) fn mentions(&self, param: &Parameter) -> bool {
        match self {
            Atom::Parameter(p) => p == param,
            Atom::Radical(radicand) => radicand.mentions(param),
        }
    }

    fn to_expression(&self) -> Expression {
        match self {
            Atom::Parameter(p) => Expression::Parameter(p.clone()),
            Atom::Radical(radicand) => radicand.to_expression().sqrt(),
        }
    }
}

/// A product of [`Atom`]s raised to positive powers.
pub(crate) type Monomial = BTreeMap<Atom, u32>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Polynomial {
    terms: BTreeMap<Monomial, Rational>,
}

impl Polynomial {
    pub(crate) fn zero() -> Self { Polynomial::default() }

    pub(crate) fn one() -> Self { Polynomial::constant(Rational::one()) }

    pub(crate) fn constant(value: Rational) -> Self {
        let mut p = Polynomial::zero();
        p.add_term(Monomial::new(), value);
        p
    }

    pub(crate) fn atom(atom: Atom) -> Self {
        let mut monomial = Monomial::new();
        monomial.insert(atom, 1);

        let mut p = Polynomial::zero();
        p.add_term(monomial, Rational::one());
        p
    }

    pub(crate) fn parameter(param: Parameter) -> Self {
        Polynomial::atom(Atom::Parameter(param))
    }

    fn add_term(&mut self, monomial: Monomial, coefficient: Rational) {
        if coefficient.is_zero() {
            return;
        }

        match self.terms.entry(monomial) {
            Entry::Vacant(entry) => {
                entry.insert(coefficient);
            },
            Entry::Occupied(mut entry) => {
                *entry.get_mut() += coefficient;
                if entry.get().is_zero() {
                    entry.remove();
                }
            },
        }
    }

    pub(crate) fn is_zero(&self) -> bool { self.terms.is_empty() }

    /// The value of this polynomial, if it doesn't contain any [`Atom`]s.
    pub(crate) fn as_constant(&self) -> Option<Rational> {
        match self.terms.len() {
            0 => Some(Rational::zero()),
            1 => self.terms.get(&Monomial::new()).cloned(),
            _ => None,
        }
    }

    pub(crate) fn coefficients(&self) -> impl Iterator<Item = &Rational> {
        self.terms.values()
    }

    /// Every [`Atom`] used at the top level of this polynomial.
    pub(crate) fn atoms(&self) -> BTreeSet<&Atom> {
        self.terms.keys().flat_map(|m| m.keys()).collect()
    }

    pub(crate) fn mentions(&self, param: &Parameter) -> bool {
        self.atoms().into_iter().any(|atom| atom.mentions(param))
    }

    pub(crate) fn has_radicals(&self) -> bool {
        self.atoms().into_iter().any(Atom::is_radical)
    }

    pub(crate) fn scale(&self, factor: &Rational) -> Polynomial {
        let mut scaled = Polynomial::zero();

        for (monomial, coefficient) in &self.terms {
            scaled.add_term(monomial.clone(), coefficient * factor);
        }

        scaled
    }

    pub(crate) fn pow(&self, exponent: u32) -> Polynomial {
        let mut result = Polynomial::one();
        let mut base = self.clone();
        let mut exponent = exponent;

        while exponent > 0 {
            if exponent % 2 == 1 {
                result = &result * &base;
            }
            exponent /= 2;
            if exponent > 0 {
                base = &base * &base;
            }
        }

        result
    }

    pub(crate) fn degree_in(&self, atom: &Atom) -> u32 {
        self.terms
            .keys()
            .filter_map(|m| m.get(atom))
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Split this polynomial into `c_0 + c_1*atom + c_2*atom^2 + ...`,
    /// returning the `c_k`s.
    pub(crate) fn coefficients_in(&self, atom: &Atom) -> Vec<Polynomial> {
        let degree = self.degree_in(atom) as usize;
        let mut coefficients = vec![Polynomial::zero(); degree + 1];

        for (monomial, coefficient) in &self.terms {
            let mut monomial = monomial.clone();
            let power = monomial.remove(atom).unwrap_or(0) as usize;
            coefficients[power].add_term(monomial, coefficient.clone());
        }

        coefficients
    }

    pub(crate) fn from_coefficients(
        atom: &Atom,
        coefficients: &[Polynomial],
    ) -> Polynomial {
        let base = Polynomial::atom(atom.clone());

        coefficients
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_zero())
            .fold(Polynomial::zero(), |acc, (power, c)| {
                &acc + &(c * &base.pow(power as u32))
            })
    }

    fn leading_term(&self) -> Option<(&Monomial, &Rational)> {
        self.terms
            .iter()
            .min_by(|(left, _), (right, _)| display_order(left, right))
    }

    pub(crate) fn leading_coefficient(&self) -> Rational {
        self.leading_term()
            .map(|(_, c)| c.clone())
            .unwrap_or_else(Rational::zero)
    }

    /// The positive rational `c` such that `self / c` has coprime integer
    /// coefficients.
    pub(crate) fn content(&self) -> Rational {
        let mut numerators = BigInt::zero();
        let mut denominators = BigInt::one();

        for coefficient in self.terms.values() {
            numerators = numerators.gcd(coefficient.numer());
            denominators = denominators.lcm(coefficient.denom());
        }

        if numerators.is_zero() {
            Rational::one()
        } else {
            Rational::new(numerators, denominators)
        }
    }

    /// Scale away the numeric content and make the leading coefficient
    /// positive.
    pub(crate) fn primitive(&self) -> Polynomial {
        let mut factor = self.content().recip();
        if self.leading_coefficient().is_negative() {
            factor = -factor;
        }

        self.scale(&factor)
    }

    /// Group the terms by the radicals they contain, returning the radical
    /// free cofactor of each group.
    pub(crate) fn radical_free_parts(&self) -> Vec<Polynomial> {
        let mut groups: BTreeMap<Monomial, Polynomial> = BTreeMap::new();

        for (monomial, coefficient) in &self.terms {
            let (radicals, rest): (Monomial, Monomial) = monomial
                .iter()
                .map(|(atom, power)| (atom.clone(), *power))
                .partition(|(atom, _)| atom.is_radical());

            groups
                .entry(radicals)
                .or_default()
                .add_term(rest, coefficient.clone());
        }

        groups.into_iter().map(|(_, part)| part).collect()
    }

    /// Rewrite every `sqrt(p)^n` with `n >= 2`.
    fn reduce_radicals(self) -> Polynomial {
        let needs_reducing = self
            .terms
            .keys()
            .flat_map(|m| m.iter())
            .any(|(atom, power)| atom.is_radical() && *power >= 2);

        if !needs_reducing {
            return self;
        }

        let mut reduced = Polynomial::zero();

        for (mut monomial, coefficient) in self.terms {
            let mut factor = Polynomial::one();

            for (atom, power) in monomial.iter_mut() {
                if let Atom::Radical(radicand) = atom {
                    if *power >= 2 {
                        factor = &factor * &radicand.pow(*power / 2);
                        *power %= 2;
                    }
                }
            }
            monomial.retain(|_, power| *power > 0);

            let mut rest = Polynomial::zero();
            rest.add_term(monomial, coefficient);
            reduced = &reduced + &(&factor * &rest);
        }

        reduced
    }

    /// Divide by `divisor`, returning `None` when there would be a remainder.
    ///
    /// Only meaningful when `divisor` is free of radicals.
    pub(crate) fn div_exact(&self, divisor: &Polynomial) -> Option<Polynomial> {
        if let Some(value) = divisor.as_constant() {
            if value.is_zero() {
                return None;
            }
            return Some(self.scale(&value.recip()));
        }

        let atom = divisor.atoms().into_iter().max()?.clone();
        let degree = divisor.degree_in(&atom);
        let divisor_lead = divisor.coefficients_in(&atom).pop()?;
        let base = Polynomial::atom(atom.clone());

        let mut quotient = Polynomial::zero();
        let mut remainder = self.clone();

        while !remainder.is_zero() {
            let current = remainder.degree_in(&atom);
            if current < degree {
                return None;
            }

            let lead = remainder.coefficients_in(&atom).pop()?;
            let term = &lead.div_exact(&divisor_lead)?
                * &base.pow(current - degree);

            quotient = &quotient + &term;
            remainder = &remainder - &(&term * divisor);

            if !remainder.is_zero() && remainder.degree_in(&atom) >= current {
                return None;
            }
        }

        Some(quotient)
    }

    fn pseudo_remainder(&self, divisor: &Polynomial, atom: &Atom) -> Polynomial {
        let degree = divisor.degree_in(atom);
        let divisor_lead = match divisor.coefficients_in(atom).pop() {
            Some(lead) => lead,
            None => return Polynomial::zero(),
        };
        let base = Polynomial::atom(atom.clone());
        let mut remainder = self.clone();

        while !remainder.is_zero() {
            let current = remainder.degree_in(atom);
            if current < degree {
                break;
            }

            let lead = match remainder.coefficients_in(atom).pop() {
                Some(lead) => lead,
                None => break,
            };
            let shifted = &lead * &base.pow(current - degree);
            let next = &(&divisor_lead * &remainder) - &(&shifted * divisor);

            if !next.is_zero() && next.degree_in(atom) >= current {
                break;
            }
            remainder = next.primitive();
        }

        remainder
    }

    /// Split off the greatest common divisor of the coefficients with respect
    /// to `atom`, returning `(content, primitive_part)`.
    fn split_content_in(&self, atom: &Atom) -> (Polynomial, Polynomial) {
        let content = self
            .coefficients_in(atom)
            .iter()
            .filter(|c| !c.is_zero())
            .fold(Polynomial::zero(), |acc, c| gcd(&acc, c));

        match self.div_exact(&content) {
            Some(primitive) => (content, primitive),
            None => (Polynomial::one(), self.clone()),
        }
    }

    /// The exact square root of this polynomial, if there is one.
    pub(crate) fn sqrt_exact(&self) -> Option<Polynomial> {
        if let Some(value) = self.as_constant() {
            return rational_sqrt(&value).map(Polynomial::constant);
        }
        if self.has_radicals() {
            return None;
        }

        let atom = self.atoms().into_iter().max()?.clone();
        let coefficients = self.coefficients_in(&atom);
        let degree = coefficients.len() - 1;
        if degree % 2 != 0 {
            return None;
        }

        let half = degree / 2;
        let mut root = vec![Polynomial::zero(); half + 1];
        root[half] = coefficients[degree].sqrt_exact()?;
        let twice_lead = root[half].scale(&Rational::from_integer(2.into()));

        for k in (0..half).rev() {
            let known = ((k + 1)..half).fold(Polynomial::zero(), |acc, i| {
                &acc + &(&root[i] * &root[half + k - i])
            });
            let target = &coefficients[half + k] - &known;
            root[k] = target.div_exact(&twice_lead)?;
        }

        let candidate = Polynomial::from_coefficients(&atom, &root);

        if &(&candidate * &candidate) == self {
            if candidate.leading_coefficient().is_negative() {
                Some(-&candidate)
            } else {
                Some(candidate)
            }
        } else {
            None
        }
    }

    pub(crate) fn to_expression(&self) -> Expression {
        let mut terms: Vec<_> = self.terms.iter().collect();
        terms.sort_by(|(left, _), (right, _)| display_order(left, right));

        let mut terms = terms.into_iter();
        let mut expr = match terms.next() {
            Some((monomial, coefficient)) => {
                term_expression(monomial, coefficient)
            },
            None => return Expression::zero(),
        };

        for (monomial, coefficient) in terms {
            expr = if coefficient.is_negative() {
                expr - term_expression(monomial, &-coefficient)
            } else {
                expr + term_expression(monomial, coefficient)
            };
        }

        expr
    }
}

/// Higher total degree first, then lexicographic on the exponents.
fn display_order(left: &Monomial, right: &Monomial) -> Ordering {
    let degree = |m: &Monomial| m.values().sum::<u32>();

    degree(right).cmp(&degree(left)).then_with(|| {
        let atoms: BTreeSet<&Atom> = left.keys().chain(right.keys()).collect();

        atoms
            .into_iter()
            .map(|atom| {
                let l = left.get(atom).unwrap_or(&0);
                let r = right.get(atom).unwrap_or(&0);
                r.cmp(l)
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    })
}

fn term_expression(monomial: &Monomial, coefficient: &Rational) -> Expression {
    let mut factors = monomial.iter().map(|(atom, power)| {
        let base = atom.to_expression();
        if *power == 1 {
            base
        } else {
            base.pow(Expression::integer(i64::from(*power)))
        }
    });

    let first = match factors.next() {
        Some(first) => first,
        None => return Expression::Constant(coefficient.clone()),
    };

    if coefficient.is_one() {
        factors.fold(first, |acc, factor| acc * factor)
    } else if (-coefficient).is_one() {
        factors.fold(-first, |acc, factor| acc * factor)
    } else {
        factors.fold(
            Expression::Constant(coefficient.clone()) * first,
            |acc, factor| acc * factor,
        )
    }
}

/// The greatest common divisor of two radical free polynomials, scaled to
/// have coprime integer coefficients and a positive leading coefficient.
pub(crate) fn gcd(a: &Polynomial, b: &Polynomial) -> Polynomial {
    if a.is_zero() {
        return b.primitive();
    }
    if b.is_zero() {
        return a.primitive();
    }

    let atom = match a.atoms().into_iter().chain(b.atoms()).max() {
        Some(atom) => atom.clone(),
        None => return Polynomial::one(),
    };

    let (a_content, a_primitive) = a.split_content_in(&atom);
    let (b_content, b_primitive) = b.split_content_in(&atom);
    let content = gcd(&a_content, &b_content);

    let (mut f, mut g) =
        if a_primitive.degree_in(&atom) >= b_primitive.degree_in(&atom) {
            (a_primitive, b_primitive)
        } else {
            (b_primitive, a_primitive)
        };

    while !g.is_zero() {
        let remainder = f.pseudo_remainder(&g, &atom);
        f = g;
        g = if remainder.is_zero() {
            remainder
        } else {
            remainder.split_content_in(&atom).1
        };
    }

    (&content * &f).primitive()
}

/// The exact square root of a non-negative rational, if it has one.
pub(crate) fn rational_sqrt(value: &Rational) -> Option<Rational> {
    if value.is_negative() {
        return None;
    }

    let numer = value.numer().sqrt();
    let denom = value.denom().sqrt();

    if &(&numer * &numer) == value.numer() && &(&denom * &denom) == value.denom()
    {
        Some(Rational::new(numer, denom))
    } else {
        None
    }
}

/// Write a positive integer as `outside^2 * inside`, pulling out as many
/// square factors as trial division finds.
pub(crate) fn split_square(n: &BigInt) -> (BigInt, BigInt) {
    let mut outside = BigInt::one();
    let mut inside = BigInt::one();
    let mut rest = n.clone();
    let mut p = BigInt::from(2);

    while &p * &p <= rest && p.to_u64().map_or(false, |p| p <= TRIAL_DIVISION_LIMIT)
    {
        let mut count = 0;
        while (&rest % &p).is_zero() {
            rest /= &p;
            count += 1;
        }

        for _ in 0..count / 2 {
            outside *= &p;
        }
        if count % 2 == 1 {
            inside *= &p;
        }

        p += 1u32;
    }

    let root = rest.sqrt();
    if &root * &root == rest {
        outside *= root;
    } else {
        inside *= rest;
    }

    (outside, inside)
}

impl<'a, 'b> Add<&'b Polynomial> for &'a Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: &'b Polynomial) -> Polynomial {
        let mut sum = self.clone();
        for (monomial, coefficient) in &rhs.terms {
            sum.add_term(monomial.clone(), coefficient.clone());
        }
        sum
    }
}

impl<'a, 'b> Sub<&'b Polynomial> for &'a Polynomial {
    type Output = Polynomial;

    fn sub(self, rhs: &'b Polynomial) -> Polynomial {
        let mut difference = self.clone();
        for (monomial, coefficient) in &rhs.terms {
            difference.add_term(monomial.clone(), -coefficient);
        }
        difference
    }
}

impl<'a, 'b> Mul<&'b Polynomial> for &'a Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: &'b Polynomial) -> Polynomial {
        let mut product = Polynomial::zero();

        for (left, a) in &self.terms {
            for (right, b) in &rhs.terms {
                let mut monomial = left.clone();
                for (atom, power) in right {
                    *monomial.entry(atom.clone()).or_insert(0) += power;
                }
                product.add_term(monomial, a * b);
            }
        }

        product.reduce_radicals()
    }
}

impl<'a> Neg for &'a Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        self.scale(&-Rational::one())
    }
}

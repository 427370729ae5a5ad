use crate::algebra::{Expression, Parameter, ParseError};
use std::{
    collections::BTreeSet,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// An ordered pair of expressions, `left = right`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Equation {
    pub left: Expression,
    pub right: Expression,
}

impl Equation {
    pub fn new(left: Expression, right: Expression) -> Self {
        Equation { left, right }
    }

    /// The expression which is zero when the equation holds, `left - right`.
    pub fn body(&self) -> Expression { self.left.clone() - self.right.clone() }

    /// The same equation with its sides swapped.
    pub fn reversed(&self) -> Equation {
        Equation::new(self.right.clone(), self.left.clone())
    }

    /// Every [`Parameter`] mentioned on either side.
    pub fn free_variables(&self) -> BTreeSet<Parameter> {
        self.left
            .params()
            .chain(self.right.params())
            .cloned()
            .collect()
    }
}

impl FromStr for Equation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.find('=') {
            Some(index) => {
                let (left, right) = s.split_at(index);
                let right = &right[1..];
                Ok(Equation::new(left.parse()?, right.parse()?))
            },
            None => Ok(Equation::new(s.parse()?, Expression::zero())),
        }
    }
}

impl Display for Equation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.left, self.right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_equations() {
        let inputs = vec![
            ("x = 2", "x = 2"),
            ("y=k*x1^2 - 2*k*x1 + l", "y = k*x1^2 - 2*k*x1 + l"),
            ("x^2 - 4", "x^2 - 4 = 0"),
        ];

        for (src, should_be) in inputs {
            let got: Equation = src.parse().unwrap();
            assert_eq!(got.to_string(), should_be);
        }
    }

    #[test]
    fn free_variables_cover_both_sides() {
        let equation: Equation = "x1 - x2 = k*6".parse().unwrap();

        let got: Vec<_> = equation
            .free_variables()
            .into_iter()
            .map(|p| p.to_string())
            .collect();

        assert_eq!(got, vec!["k", "x1", "x2"]);
        assert_eq!(equation.reversed().reversed(), equation);
        assert!("x = = 2".parse::<Equation>().is_err());
    }
}

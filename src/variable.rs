//! Unknowns and the candidate values recorded against them.

use crate::algebra::{Algebra, Expression, Parameter};
use std::fmt::{self, Display, Formatter};

/// A single value that could be assigned to a [`Variable`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    /// A value with no free variables.
    Concrete(Expression),
    /// A value which still depends on other unknowns.
    Symbolic(Expression),
}

impl Value {
    pub fn classify<A: Algebra + ?Sized>(expr: Expression, algebra: &A) -> Value {
        if algebra.is_concrete(&expr) {
            Value::Concrete(expr)
        } else {
            Value::Symbolic(expr)
        }
    }

    pub fn expression(&self) -> &Expression {
        match self {
            Value::Concrete(expr) | Value::Symbolic(expr) => expr,
        }
    }

    pub fn into_expression(self) -> Expression {
        match self {
            Value::Concrete(expr) | Value::Symbolic(expr) => expr,
        }
    }

    pub fn is_concrete(&self) -> bool {
        match self {
            Value::Concrete(_) => true,
            Value::Symbolic(_) => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression())
    }
}

/// The values produced together by solving one equation for one unknown
/// (e.g. both roots of a quadratic).
///
/// A record is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateRecord {
    values: Vec<Value>,
}

impl CandidateRecord {
    /// Create a new record, returning `None` if there are no values.
    pub fn new(values: Vec<Value>) -> Option<CandidateRecord> {
        if values.is_empty() {
            None
        } else {
            Some(CandidateRecord { values })
        }
    }

    pub fn classify<A: Algebra + ?Sized>(
        expressions: Vec<Expression>,
        algebra: &A,
    ) -> Option<CandidateRecord> {
        CandidateRecord::new(
            expressions
                .into_iter()
                .map(|expr| Value::classify(expr, algebra))
                .collect(),
        )
    }

    pub fn singleton(value: Value) -> CandidateRecord {
        CandidateRecord {
            values: vec![value],
        }
    }

    pub fn values(&self) -> &[Value] { &self.values }

    pub(crate) fn values_mut(&mut self) -> &mut [Value] { &mut self.values }

    pub fn arity(&self) -> usize { self.values.len() }

    pub fn is_singleton(&self) -> bool { self.arity() == 1 }

    /// Is every value in this record concrete?
    pub fn is_resolved(&self) -> bool {
        self.values.iter().all(Value::is_concrete)
    }

    /// The only value in this record, if it has exactly one.
    pub fn single(&self) -> Option<&Value> {
        match self.values.as_slice() {
            [value] => Some(value),
            _ => None,
        }
    }

    /// Do both records contain the same values, ignoring order?
    fn is_permutation_of(&self, other: &CandidateRecord) -> bool {
        if self.arity() != other.arity() {
            return false;
        }

        let mut mine: Vec<_> = self.values.iter().collect();
        let mut theirs: Vec<_> = other.values.iter().collect();
        mine.sort();
        theirs.sort();

        mine == theirs
    }
}

impl Display for CandidateRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;

        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }

        write!(f, "]")
    }
}

/// A named unknown and everything we currently know about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: Parameter,
    candidates: Vec<CandidateRecord>,
}

impl Variable {
    pub fn new(name: Parameter) -> Self {
        Variable {
            name,
            candidates: Vec::new(),
        }
    }

    pub fn name(&self) -> &Parameter { &self.name }

    pub fn candidates(&self) -> &[CandidateRecord] { &self.candidates }

    /// The records which are fully resolved.
    pub fn solutions(&self) -> impl Iterator<Item = &CandidateRecord> + '_ {
        self.candidates.iter().filter(|r| r.is_resolved())
    }

    /// The resolved records, or every record when nothing has been resolved
    /// yet.
    pub fn best_known(&self) -> Vec<&CandidateRecord> {
        let solutions: Vec<_> = self.solutions().collect();

        if solutions.is_empty() {
            self.candidates.iter().collect()
        } else {
            solutions
        }
    }

    /// Has this variable got a single concrete value?
    ///
    /// A resolved record with several roots doesn't count, it doesn't say
    /// which root is the right one.
    pub fn is_resolved(&self) -> bool {
        self.solutions().any(CandidateRecord::is_singleton)
    }

    /// Record a new candidate, returning `false` if it was redundant.
    pub fn add_candidate(&mut self, record: CandidateRecord) -> bool {
        if self.is_redundant(&record) {
            return false;
        }

        log::trace!("{} could be {}", self.name, record);
        self.candidates.push(record);
        true
    }

    fn is_redundant(&self, record: &CandidateRecord) -> bool {
        self.candidates.iter().any(|existing| {
            existing == record
                || (record.arity() > 1 && existing.is_permutation_of(record))
        })
    }

    /// Swap in a new set of records, deduplicating them, and report whether
    /// anything changed.
    pub(crate) fn replace_candidates(
        &mut self,
        records: Vec<CandidateRecord>,
    ) -> bool {
        let mut deduplicated = Variable::new(self.name.clone());
        for record in records {
            deduplicated.add_candidate(record);
        }

        let changed = deduplicated.candidates != self.candidates;
        self.candidates = deduplicated.candidates;
        changed
    }

    /// Throw away everything except the final answer.
    pub(crate) fn resolve_to(&mut self, value: Value) {
        self.candidates = vec![CandidateRecord::singleton(value)];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Builtins;

    fn record(values: &[&str]) -> CandidateRecord {
        let expressions =
            values.iter().map(|v| v.parse().unwrap()).collect();
        CandidateRecord::classify(expressions, &Builtins).unwrap()
    }

    #[test]
    fn empty_records_are_rejected() {
        assert!(CandidateRecord::new(Vec::new()).is_none());
    }

    #[test]
    fn values_are_classified_on_insertion() {
        let got = record(&["2", "sqrt(2)/2", "x + 1"]);

        let concrete: Vec<_> =
            got.values().iter().map(Value::is_concrete).collect();
        assert_eq!(concrete, vec![true, true, false]);
        assert!(!got.is_resolved());
        assert!(record(&["-2", "2"]).is_resolved());
    }

    #[test]
    fn duplicate_records_are_ignored() {
        let mut x = Variable::new(Parameter::named("x"));

        assert!(x.add_candidate(record(&["y + 1"])));
        assert!(!x.add_candidate(record(&["y + 1"])));
        assert!(x.add_candidate(record(&["-2", "2"])));
        // a permutation of a multi-root record carries no new information
        assert!(!x.add_candidate(record(&["2", "-2"])));
        assert!(x.add_candidate(record(&["2"])));

        assert_eq!(x.candidates().len(), 3);
    }

    #[test]
    fn best_known_prefers_solutions() {
        let mut x = Variable::new(Parameter::named("x"));
        x.add_candidate(record(&["y + 1"]));

        assert!(!x.is_resolved());
        assert_eq!(x.best_known(), vec![&record(&["y + 1"])]);

        x.add_candidate(record(&["3"]));

        assert!(x.is_resolved());
        assert_eq!(x.best_known(), vec![&record(&["3"])]);

        let mut r = Variable::new(Parameter::named("r"));
        r.add_candidate(record(&["-2", "2"]));
        assert!(!r.is_resolved());
        assert_eq!(r.solutions().count(), 1);
        assert_eq!(x.solutions().count(), 1);
    }

    #[test]
    fn display_records() {
        assert_eq!(record(&["-2", "x^2"]).to_string(), "[-2, x^2]");
    }
}

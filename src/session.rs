//! The propagation engine.
//!
//! A [`Session`] keeps a set of declared [`Variable`]s. Every equation
//! submitted to it is solved for each declared unknown it mentions, and the
//! results are recorded as [`CandidateRecord`]s. Candidates are then refined
//! until nothing changes:
//!
//! - symbolic candidates are simplified by substituting the known values of
//!   other variables, and
//! - when one variable has several candidate records they must describe the
//!   same value, so each pair is fed back in as a new equation.
//!
//! New equations go onto a worklist which drives a bounded outer loop, so
//! nothing recurses.

use crate::{
    algebra::{
        Algebra, Builtins, Equation, EvaluationError, Expression, Parameter,
        ParseError,
    },
    variable::{CandidateRecord, Value, Variable},
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Bounds on how much work the convergence loop may do.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Limits {
    /// The maximum number of propagation passes for a single call to
    /// [`Session::converge()`].
    pub max_passes: usize,
    /// The maximum number of equations (submitted and derived) a session may
    /// accumulate.
    pub max_equations: usize,
}

impl Limits {
    pub fn with_max_passes(self, max_passes: usize) -> Self {
        Limits { max_passes, ..self }
    }

    pub fn with_max_equations(self, max_equations: usize) -> Self {
        Limits {
            max_equations,
            ..self
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_passes: 64,
            max_equations: 4096,
        }
    }
}

/// The outcome of [`Session::finalize()`].
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// The variable has exactly one concrete value.
    Resolved(Expression),
    /// Nothing concrete is known about the variable.
    Unresolved,
}

impl Answer {
    pub fn value(&self) -> Option<&Expression> {
        match self {
            Answer::Resolved(value) => Some(value),
            Answer::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool { self.value().is_some() }
}

/// Errors surfaced by a [`Session`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropagationError {
    #[error("\"{variable}\" has {} contradictory values", .values.len())]
    Contradiction {
        variable: Parameter,
        values: Vec<Expression>,
    },
    #[error("propagation did not converge after {passes} passes")]
    DidNotConverge { passes: usize },
    #[error("\"{variable}\" is already linked to its roots")]
    AlreadyLinked { variable: Parameter },
    #[error("\"{name}\" hasn't been declared")]
    UnknownVariable { name: String },
    #[error("unable to parse the equation")]
    Parse(#[from] ParseError),
    #[error("algebra error")]
    Algebra(#[from] EvaluationError),
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Origin {
    Submitted,
    Derived,
}

#[derive(Debug, Clone, PartialEq)]
struct Logged {
    equation: Equation,
    origin: Origin,
}

/// A set of unknowns and the equations relating them.
#[derive(Debug, Clone)]
pub struct Session<A = Builtins> {
    algebra: A,
    limits: Limits,
    variables: Vec<Variable>,
    index: HashMap<Parameter, usize>,
    log: Vec<Logged>,
    seen: HashSet<Equation>,
    pending: VecDeque<Equation>,
    root_links: BTreeMap<Parameter, Vec<Parameter>>,
    answer: Option<Parameter>,
}

impl Session<Builtins> {
    pub fn new() -> Self { Session::with_algebra(Builtins) }
}

impl Default for Session<Builtins> {
    fn default() -> Self { Session::new() }
}

impl<A: Algebra> Session<A> {
    pub fn with_algebra(algebra: A) -> Self {
        Session {
            algebra,
            limits: Limits::default(),
            variables: Vec::new(),
            index: HashMap::new(),
            log: Vec::new(),
            seen: HashSet::new(),
            pending: VecDeque::new(),
            root_links: BTreeMap::new(),
            answer: None,
        }
    }

    pub fn with_limits(self, limits: Limits) -> Self {
        Session { limits, ..self }
    }

    pub fn algebra(&self) -> &A { &self.algebra }

    pub fn limits(&self) -> Limits { self.limits }

    /// Start tracking an unknown, returning the existing one if it has
    /// already been declared.
    pub fn declare(&mut self, name: &str) -> Parameter {
        let param = Parameter::named(name);

        if !self.index.contains_key(&param) {
            self.index.insert(param.clone(), self.variables.len());
            self.variables.push(Variable::new(param.clone()));
        }

        param
    }

    /// Declare several unknowns at once (e.g. `"x1 x2 y"` or `"a, b"`).
    pub fn declare_all(&mut self, names: &str) -> Vec<Parameter> {
        names
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|name| !name.is_empty())
            .map(|name| self.declare(name))
            .collect()
    }

    /// Declare the distinguished `answer` variable and make it the session's
    /// answer.
    pub fn answer(&mut self) -> Parameter {
        let param = self.declare("answer");
        self.answer = Some(param.clone());
        param
    }

    /// Use some other declared variable as the session's answer.
    pub fn set_answer(&mut self, name: &str) -> Result<(), PropagationError> {
        let param = self.lookup(name)?;
        self.answer = Some(param);
        Ok(())
    }

    pub fn answer_variable(&self) -> Option<&Variable> {
        self.answer.as_ref().and_then(|name| self.variable(name.name()))
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.index
            .get(&Parameter::named(name))
            .map(|&ix| &self.variables[ix])
    }

    /// Every declared variable, in declaration order.
    pub fn variables(&self) -> &[Variable] { &self.variables }

    /// Every equation the session knows about, including the ones it derived
    /// itself.
    pub fn equations(&self) -> impl Iterator<Item = &Equation> + '_ {
        self.log.iter().map(|logged| &logged.equation)
    }

    /// Distribute the results of solving for `parent` positionally into
    /// `roots` whenever the number of results matches.
    pub fn link_roots(
        &mut self,
        parent: &str,
        roots: &[&str],
    ) -> Result<(), PropagationError> {
        let parent = self.lookup(parent)?;

        if self.root_links.contains_key(&parent) {
            return Err(PropagationError::AlreadyLinked { variable: parent });
        }

        let roots = roots
            .iter()
            .map(|name| self.lookup(name))
            .collect::<Result<Vec<_>, _>>()?;

        self.root_links.insert(parent, roots);
        Ok(())
    }

    /// Tell the session that `lhs = rhs`.
    pub fn eq(
        &mut self,
        lhs: Expression,
        rhs: Expression,
    ) -> Result<(), PropagationError> {
        self.submit(Equation::new(lhs, rhs))
    }

    /// Parse an equation (e.g. `"y = 2*x + 1"`) and submit it.
    pub fn eq_str(&mut self, equation: &str) -> Result<(), PropagationError> {
        let equation: Equation = equation.parse()?;
        self.submit(equation)
    }

    pub fn submit(&mut self, equation: Equation) -> Result<(), PropagationError> {
        log::debug!("Submitted {}", equation);

        self.ingest(&equation)?;
        self.record(equation, Origin::Submitted);
        self.converge()
    }

    /// Like [`Session::eq()`], except `rhs` is an equation stating the value.
    ///
    /// When one side of `rhs` is a declared variable the other side is used,
    /// so `final_eq(answer, x = a + b)` means `answer = a + b`.
    pub fn final_eq(
        &mut self,
        lhs: Expression,
        rhs: &Equation,
    ) -> Result<(), PropagationError> {
        let value = match (&rhs.left, &rhs.right) {
            (Expression::Parameter(p), other) if self.index.contains_key(p) => {
                other.clone()
            },
            (other, Expression::Parameter(p)) if self.index.contains_key(p) => {
                other.clone()
            },
            _ => rhs.body(),
        };

        self.eq(lhs, value)
    }

    /// Submit `name = value` for each declared name, ignoring the rest.
    pub fn subs<I, S>(&mut self, substitutions: I) -> Result<(), PropagationError>
    where
        I: IntoIterator<Item = (S, Expression)>,
        S: AsRef<str>,
    {
        for (name, value) in substitutions {
            let param = Parameter::named(name.as_ref());

            if self.index.contains_key(&param) {
                self.eq(Expression::Parameter(param), value)?;
            } else {
                log::debug!("Ignoring a substitution for \"{}\"", param);
            }
        }

        Ok(())
    }

    /// Submit `expr = 0`, unless `expr` is just a number.
    pub fn solve_zero(
        &mut self,
        expr: Expression,
    ) -> Result<(), PropagationError> {
        let simplified = self.algebra.simplify(&expr)?;

        if self.algebra.is_concrete(&simplified) {
            log::debug!("Ignoring \"{} = 0\", it has no unknowns", expr);
            return Ok(());
        }

        self.eq(expr, Expression::zero())
    }

    /// Propagate everything currently known until nothing changes or the
    /// answer variable is resolved.
    pub fn converge(&mut self) -> Result<(), PropagationError> {
        let target = self.answer.clone();
        self.run(target.as_ref())
    }

    /// Get the value of a variable.
    ///
    /// If the variable ends up with exactly one concrete value, every other
    /// candidate is thrown away.
    pub fn finalize(&mut self, name: &str) -> Result<Answer, PropagationError> {
        let param = self.lookup(name)?;
        let ix = self.index[&param];

        self.run(Some(&param))?;

        if !self.variables[ix].is_resolved() && self.cross_derive()? > 0 {
            self.run(Some(&param))?;
        }

        let mut values: Vec<Expression> = Vec::new();

        for record in self.variables[ix].solutions() {
            if let Some(value) = record.single() {
                let value = value.expression();

                if !values.iter().any(|v| self.same_value(v, value)) {
                    values.push(value.clone());
                }
            }
        }

        match values.len() {
            0 => Ok(Answer::Unresolved),
            1 => {
                let value = values.remove(0);
                log::debug!("{} = {}", param, value);
                self.variables[ix].resolve_to(Value::Concrete(value.clone()));
                Ok(Answer::Resolved(value))
            },
            _ => Err(PropagationError::Contradiction {
                variable: param,
                values,
            }),
        }
    }

    /// [`Session::finalize()`] the answer variable.
    pub fn finalize_answer(&mut self) -> Result<Answer, PropagationError> {
        match self.answer.clone() {
            Some(answer) => self.finalize(answer.name()),
            None => Err(PropagationError::UnknownVariable {
                name: String::from("answer"),
            }),
        }
    }

    fn lookup(&self, name: &str) -> Result<Parameter, PropagationError> {
        let param = Parameter::named(name);

        if self.index.contains_key(&param) {
            Ok(param)
        } else {
            Err(PropagationError::UnknownVariable {
                name: name.to_string(),
            })
        }
    }

    fn is_known(&self, equation: &Equation) -> bool {
        self.seen.contains(equation) || self.seen.contains(&equation.reversed())
    }

    fn record(&mut self, equation: Equation, origin: Origin) {
        self.seen.insert(equation.clone());
        self.log.push(Logged { equation, origin });
    }

    /// Queue up derived equations, skipping the ones we've already seen.
    fn enqueue(
        &mut self,
        derived: Vec<Equation>,
        passes: usize,
    ) -> Result<usize, PropagationError> {
        let mut queued = 0;

        for equation in derived {
            if self.is_known(&equation) {
                continue;
            }

            self.record(equation.clone(), Origin::Derived);
            self.pending.push_back(equation);
            queued += 1;
        }

        if queued > 0 {
            log::debug!("Queued {} derived equations", queued);
        }

        if self.log.len() > self.limits.max_equations {
            log::warn!(
                "Giving up after accumulating {} equations",
                self.log.len()
            );
            return Err(PropagationError::DidNotConverge { passes });
        }

        Ok(queued)
    }

    /// Solve an equation for each declared variable it mentions and record
    /// the results.
    ///
    /// Every solve happens before anything is recorded, so an error leaves
    /// the session untouched.
    fn ingest(&mut self, equation: &Equation) -> Result<bool, EvaluationError> {
        log::debug!("Ingesting {}", equation);

        let mut solved = Vec::new();

        for param in self.algebra.free_variables(&equation.body()) {
            if let Some(&ix) = self.index.get(&param) {
                let results = self.algebra.solve(equation, &param)?;
                solved.push((param, ix, results));
            }
        }

        let mut changed = false;

        for (param, ix, results) in solved {
            let record = match CandidateRecord::classify(
                results.clone(),
                &self.algebra,
            ) {
                Some(record) => record,
                None => continue,
            };

            changed |= self.variables[ix].add_candidate(record);

            if let Some(roots) = self.root_links.get(&param) {
                if roots.len() == results.len() {
                    for (root, value) in roots.iter().zip(results) {
                        if let Some(&root_ix) = self.index.get(root) {
                            let value = Value::classify(value, &self.algebra);
                            changed |= self.variables[root_ix]
                                .add_candidate(CandidateRecord::singleton(value));
                        }
                    }
                }
            }
        }

        Ok(changed)
    }

    fn run(
        &mut self,
        target: Option<&Parameter>,
    ) -> Result<(), PropagationError> {
        let mut passes = 0;

        loop {
            while let Some(equation) = self.pending.pop_front() {
                if let Err(e) = self.ingest(&equation) {
                    log::debug!("Skipping {}: {}", equation, e);
                }
            }

            if let Some(target) = target {
                if self.variables[self.index[target]].is_resolved() {
                    return Ok(());
                }
            }

            passes += 1;

            if passes > self.limits.max_passes {
                log::warn!("Giving up after {} passes", self.limits.max_passes);
                return Err(PropagationError::DidNotConverge { passes });
            }

            let substituted = self.substitution_pass();
            let derived = self.combinations();
            let queued = self.enqueue(derived, passes)?;

            if !substituted && queued == 0 && self.pending.is_empty() {
                return Ok(());
            }
        }
    }

    /// Try to simplify every symbolic candidate of every unresolved variable.
    fn substitution_pass(&mut self) -> bool {
        let mut changed = false;

        for ix in 0..self.variables.len() {
            if self.variables[ix].is_resolved() {
                continue;
            }

            let target = self.variables[ix].name().clone();
            let mut records = self.variables[ix].candidates().to_vec();

            for record in &mut records {
                for value in record.values_mut() {
                    let improved = match value {
                        Value::Symbolic(expr) => self.improve(&target, expr),
                        Value::Concrete(_) => None,
                    };

                    if let Some(better) = improved {
                        log::trace!("{}: {} => {}", target, value, better);
                        *value = Value::classify(better, &self.algebra);
                    }
                }
            }

            changed |= self.variables[ix].replace_candidates(records);
        }

        changed
    }

    /// Find the safe substitution into a candidate of `target` which leaves
    /// the fewest free variables.
    fn improve(
        &self,
        target: &Parameter,
        expr: &Expression,
    ) -> Option<Expression> {
        let free = self.algebra.free_variables(expr);
        let mut best: Option<(usize, Expression)> = None;

        for param in free.iter().filter(|&p| p != target) {
            let ix = match self.index.get(param) {
                Some(&ix) => ix,
                None => continue,
            };

            for record in self.variables[ix].best_known() {
                let replacement = match record.single() {
                    Some(value) => value.expression(),
                    None => continue,
                };

                if !self.is_safe(replacement, target, param) {
                    continue;
                }

                let substituted =
                    self.algebra.substitute(expr, param, replacement);
                let simplified = match self.algebra.simplify(&substituted) {
                    Ok(simplified) => simplified,
                    Err(e) => {
                        log::trace!("Unable to simplify {}: {}", substituted, e);
                        continue;
                    },
                };

                let remaining = self.algebra.free_variables(&simplified).len();
                let is_better = remaining < free.len()
                    && best.as_ref().map_or(true, |(n, _)| remaining < *n);

                if is_better {
                    best = Some((remaining, simplified));
                }
            }
        }

        best.map(|(_, expr)| expr)
    }

    /// A replacement for `param` is safe when it can't reintroduce `target`
    /// or `param` itself.
    fn is_safe(
        &self,
        replacement: &Expression,
        target: &Parameter,
        param: &Parameter,
    ) -> bool {
        if self.algebra.is_concrete(replacement) {
            return true;
        }

        let free = self.algebra.free_variables(replacement);
        !free.contains(target) && !free.contains(param)
    }

    /// The unresolved records of an unresolved variable all describe the
    /// same value, which gives us new equations.
    fn combinations(&self) -> Vec<Equation> {
        let mut derived = Vec::new();

        for variable in self.variables.iter().filter(|v| !v.is_resolved()) {
            let records: Vec<Vec<Expression>> = variable
                .candidates()
                .iter()
                .filter(|record| !record.is_resolved())
                .map(expressions)
                .collect();

            for (i, first) in records.iter().enumerate() {
                for second in &records[i + 1..] {
                    derived.extend(agreement(first, second));
                }
            }
        }

        derived
    }

    /// Solve each pair of submitted equations for a shared variable and
    /// make the results agree.
    fn cross_derive(&mut self) -> Result<usize, PropagationError> {
        let submitted: Vec<Equation> = self
            .log
            .iter()
            .filter(|logged| logged.origin == Origin::Submitted)
            .map(|logged| logged.equation.clone())
            .collect();

        let mut derived = Vec::new();

        for (i, first) in submitted.iter().enumerate() {
            for second in &submitted[i + 1..] {
                let shared = first
                    .free_variables()
                    .intersection(&second.free_variables())
                    .filter(|p| self.index.contains_key(*p))
                    .cloned()
                    .collect::<Vec<_>>();

                for param in &shared {
                    let (a, b) = match (
                        self.algebra.solve(first, param),
                        self.algebra.solve(second, param),
                    ) {
                        (Ok(a), Ok(b)) => (a, b),
                        _ => continue,
                    };

                    derived.extend(agreement(&a, &b));
                }
            }
        }

        self.enqueue(derived, 0)
    }

    /// Are two concrete expressions the same number?
    fn same_value(&self, left: &Expression, right: &Expression) -> bool {
        if left == right {
            return true;
        }

        match (self.algebra.evaluate(left), self.algebra.evaluate(right)) {
            (Ok(l), Ok(r)) => {
                approx::relative_eq!(l, r, epsilon = 1e-12, max_relative = 1e-9)
            },
            _ => false,
        }
    }
}

fn expressions(record: &CandidateRecord) -> Vec<Expression> {
    record
        .values()
        .iter()
        .map(|value| value.expression().clone())
        .collect()
}

/// The equation which holds when two lists of solutions for the same variable
/// agree.
///
/// Two single values must be equal. A single value `s` and several roots only
/// say that `s` is one of the roots, `(s - r1)*(s - r2)*... = 0`. Two lists
/// of several roots tell us nothing.
fn agreement(first: &[Expression], second: &[Expression]) -> Option<Equation> {
    match (first, second) {
        ([a], [b]) if a == b => None,
        ([a], [b]) => Some(Equation::new(a.clone(), b.clone())),
        ([single], roots) | (roots, [single]) => {
            if roots.contains(single) {
                return None;
            }

            let mut factors =
                roots.iter().map(|root| single.clone() - root.clone());
            let first = factors.next()?;
            let product = factors.fold(first, |acc, factor| acc * factor);

            Some(Equation::new(product, Expression::zero()))
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(names: &str) -> Session {
        let mut session = Session::new();
        session.declare_all(names);
        session
    }

    fn candidates(session: &Session, name: &str) -> Vec<String> {
        session
            .variable(name)
            .unwrap()
            .candidates()
            .iter()
            .map(|record| record.to_string())
            .collect()
    }

    fn number(src: &str) -> Expression { src.parse().unwrap() }

    #[test]
    fn declaring_twice_returns_the_same_variable() {
        let mut session = session("x y, z");

        let x = session.declare("x");

        assert_eq!(x, Parameter::named("x"));
        let names: Vec<_> =
            session.variables().iter().map(|v| v.name().to_string()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[test]
    fn each_declared_variable_gets_a_record() {
        let mut session = session("x y");

        session.eq_str("2*x = y + 1").unwrap();

        assert_eq!(candidates(&session, "x"), vec!["[(y + 1)/2]"]);
        assert_eq!(candidates(&session, "y"), vec!["[2*x - 1]"]);
    }

    #[test]
    fn solve_a_linear_system() {
        let mut session = session("x y")
            .with_limits(Limits::default().with_max_passes(8));

        session.eq_str("x + y = 3").unwrap();
        session.eq_str("x - y = 1").unwrap();

        assert_eq!(session.finalize("x").unwrap(), Answer::Resolved(number("2")));
        assert_eq!(session.finalize("y").unwrap(), Answer::Resolved(number("1")));
    }

    #[test]
    fn running_out_of_passes() {
        let mut session = session("x y")
            .with_limits(Limits::default().with_max_passes(1));

        session.eq_str("x + y = 3").unwrap();
        let got = session.eq_str("x - y = 1").unwrap_err();

        assert_eq!(got, PropagationError::DidNotConverge { passes: 2 });
    }

    #[test]
    fn running_out_of_equations() {
        let mut session = session("x y")
            .with_limits(Limits::default().with_max_equations(2));

        session.eq_str("x + y = 3").unwrap();
        let got = session.eq_str("x - y = 1").unwrap_err();

        assert_eq!(got, PropagationError::DidNotConverge { passes: 1 });
    }

    #[test]
    fn converging_is_idempotent() {
        let mut session = session("x y z");
        session.eq_str("x + y = 3").unwrap();
        session.eq_str("x - y = z").unwrap();
        let before = session.variables().to_vec();
        let equations = session.equations().count();

        session.converge().unwrap();

        assert_eq!(session.variables(), before.as_slice());
        assert_eq!(session.equations().count(), equations);
    }

    #[test]
    fn contradictions_are_detected() {
        let mut session = session("x");

        session.eq_str("x = 2").unwrap();
        session.eq_str("x = 3").unwrap();
        let got = session.finalize("x").unwrap_err();

        assert_eq!(
            got,
            PropagationError::Contradiction {
                variable: Parameter::named("x"),
                values: vec![number("2"), number("3")],
            }
        );
    }

    #[test]
    fn agreeing_values_are_not_a_contradiction() {
        let mut session = session("x");

        session.eq_str("x = 2").unwrap();
        session.eq_str("2*x = 4").unwrap();

        assert_eq!(session.finalize("x").unwrap(), Answer::Resolved(number("2")));
        assert_eq!(candidates(&session, "x"), vec!["[2]"]);
    }

    #[test]
    fn undeclared_symbols_are_left_alone() {
        let mut session = session("x");

        session.eq_str("x = z + 1").unwrap();

        assert_eq!(session.variables().len(), 1);
        assert!(session.variable("z").is_none());
        assert_eq!(candidates(&session, "x"), vec!["[z + 1]"]);
        assert_eq!(session.finalize("x").unwrap(), Answer::Unresolved);
    }

    #[test]
    fn roots_are_distributed_positionally() {
        let mut session = session("r a b");
        session.link_roots("r", &["a", "b"]).unwrap();

        session.eq_str("r^2 = 4").unwrap();

        assert_eq!(candidates(&session, "r"), vec!["[-2, 2]"]);
        assert_eq!(candidates(&session, "a"), vec!["[-2]"]);
        assert_eq!(candidates(&session, "b"), vec!["[2]"]);
        // both roots of one equation don't make a single answer
        assert_eq!(session.finalize("r").unwrap(), Answer::Unresolved);
    }

    #[test]
    fn roots_are_only_distributed_when_the_counts_match() {
        let mut session = session("r a b");
        session.link_roots("r", &["a", "b"]).unwrap();

        session.eq_str("2*r = 4").unwrap();

        assert_eq!(candidates(&session, "r"), vec!["[2]"]);
        assert!(session.variable("a").unwrap().candidates().is_empty());
    }

    #[test]
    fn root_links_can_only_be_declared_once() {
        let mut session = session("r a b");
        session.link_roots("r", &["a", "b"]).unwrap();

        assert_eq!(
            session.link_roots("r", &["b", "a"]).unwrap_err(),
            PropagationError::AlreadyLinked {
                variable: Parameter::named("r")
            }
        );
        assert_eq!(
            session.link_roots("a", &["nope"]).unwrap_err(),
            PropagationError::UnknownVariable {
                name: String::from("nope")
            }
        );
    }

    fn multi_root_session() -> Session {
        let mut session = session("x1 x2 y k l");
        session.answer();

        session.eq_str("y = k*x1^2 - 2*k*x1 + l").unwrap();
        session.eq_str("y = k*x2^2 - 2*k*x2 + l").unwrap();
        session.eq_str("y = 4").unwrap();
        session.eq_str("x1 - x2 = 6").unwrap();
        session.eq_str("answer = x1^2 + y^2 + x2^2 + y^2").unwrap();

        session
    }

    #[test]
    fn two_roots_of_the_same_parabola() {
        let mut session = multi_root_session();

        let got = session.finalize_answer().unwrap();

        assert_eq!(got, Answer::Resolved(number("52")));
        assert_eq!(session.finalize("x1").unwrap(), Answer::Resolved(number("4")));
        assert_eq!(
            session.finalize("x2").unwrap(),
            Answer::Resolved(number("-2"))
        );
    }

    #[test]
    fn propagation_is_deterministic() {
        let mut first = multi_root_session();
        let mut second = multi_root_session();

        assert_eq!(first.variables(), second.variables());
        assert_eq!(
            first.finalize_answer().unwrap(),
            second.finalize_answer().unwrap()
        );
    }

    #[test]
    fn algebra_errors_in_submitted_equations_are_reported() {
        let mut session = session("x");

        let got = session.eq_str("x = sin(2)").unwrap_err();

        assert_eq!(
            got,
            PropagationError::Algebra(EvaluationError::UnknownFunction {
                name: "sin".into()
            })
        );
        assert!(session.eq_str("x = = 2").is_err());
    }

    #[test]
    fn final_eq_uses_the_other_side() {
        let mut session = session("b c");
        let answer = session.answer();
        session.eq_str("b = 3").unwrap();

        session
            .final_eq(
                Expression::Parameter(answer),
                &"c = 2*b".parse().unwrap(),
            )
            .unwrap();

        assert_eq!(session.finalize_answer().unwrap(), Answer::Resolved(number("6")));
    }

    #[test]
    fn substitutions_skip_unknown_names() {
        let mut session = session("x y");
        session.eq_str("y = x^2").unwrap();

        session
            .subs(vec![("x", number("3")), ("nope", number("1"))])
            .unwrap();

        assert_eq!(session.variables().len(), 2);
        assert_eq!(session.finalize("y").unwrap(), Answer::Resolved(number("9")));
    }

    #[test]
    fn solving_for_zero_ignores_plain_numbers() {
        let mut session = session("x");

        session.solve_zero(number("2 - 2")).unwrap();
        assert_eq!(session.equations().count(), 0);

        session.solve_zero(number("x - 2")).unwrap();
        assert_eq!(session.finalize("x").unwrap(), Answer::Resolved(number("2")));
    }

    #[test]
    fn finalizing_needs_a_declared_variable() {
        let mut session = session("x");

        assert_eq!(
            session.finalize_answer().unwrap_err(),
            PropagationError::UnknownVariable {
                name: String::from("answer")
            }
        );
        assert!(session.set_answer("y").is_err());
        session.set_answer("x").unwrap();
        assert_eq!(session.answer_variable().unwrap().name().name(), "x");
    }

    #[test]
    fn records_agree_through_a_single_constraint() {
        let inputs = vec![
            (vec!["x"], vec!["y + 1"], Some("x = y + 1")),
            (vec!["x"], vec!["x"], None),
            (vec!["s"], vec!["a", "b"], Some("(s - a)*(s - b) = 0")),
            (vec!["a", "b"], vec!["s"], Some("(s - a)*(s - b) = 0")),
            (vec!["a"], vec!["a", "b"], None),
            (vec!["a", "b"], vec!["c", "d"], None),
        ];

        for (first, second, should_be) in inputs {
            let first: Vec<_> = first.iter().map(|s| number(s)).collect();
            let second: Vec<_> = second.iter().map(|s| number(s)).collect();

            let got = agreement(&first, &second).map(|eq| eq.to_string());

            assert_eq!(got.as_deref(), should_be);
        }
    }

    #[test]
    fn resolved_roots_are_not_forced_onto_other_candidates() {
        let mut session = session("r y");

        session.eq_str("r^2 = 4").unwrap();
        session.eq_str("r = y + 1").unwrap();
        let got = session.finalize("y").unwrap();

        assert_eq!(got, Answer::Unresolved);
        assert_eq!(candidates(&session, "r"), vec!["[-2, 2]", "[y + 1]"]);
        assert_eq!(candidates(&session, "y"), vec!["[r - 1]", "[-3, 1]"]);
    }

    #[test]
    fn an_underdetermined_answer_stays_unresolved() {
        let mut session = session("x1 x2 y");
        session.answer();

        session.eq_str("x1 - x2 = 6").unwrap();
        session.eq_str("y = 4").unwrap();
        session.eq_str("answer = x1^2 + y^2 + x2^2 + y^2").unwrap();

        assert_eq!(session.finalize_answer().unwrap(), Answer::Unresolved);
        assert_eq!(session.finalize("x1").unwrap(), Answer::Unresolved);
    }

    fn record(session: &mut Session, name: &str, value: &str) {
        let ix = session.index[&Parameter::named(name)];
        let record =
            CandidateRecord::classify(vec![number(value)], &Builtins).unwrap();
        session.variables[ix].add_candidate(record);
    }

    #[test]
    fn substitution_prefers_the_fewest_remaining_unknowns() {
        let mut session = session("t x y z");
        // x is known, but replacing z gets rid of two unknowns
        record(&mut session, "x", "7");
        record(&mut session, "z", "-y");

        let got = session
            .improve(&Parameter::named("t"), &number("x + y + z"))
            .map(|expr| expr.to_string());

        assert_eq!(got.as_deref(), Some("x"));
    }

    #[test]
    fn substitution_ties_go_to_the_first_unknown() {
        let mut session = session("t x y z");
        record(&mut session, "x", "7");
        record(&mut session, "z", "5");

        let got = session
            .improve(&Parameter::named("t"), &number("x + y + z"))
            .unwrap();

        assert_eq!(got.to_string(), "y + z + 7");
    }

    #[test]
    fn substitutions_never_reintroduce_the_target() {
        let mut session = session("t x");
        record(&mut session, "x", "t + 1");

        let got = session.improve(&Parameter::named("t"), &number("2*x"));

        assert_eq!(got, None);
    }

    #[test]
    fn larger_linear_systems_converge() {
        let systems = vec![
            (
                vec!["a + b + c = 6", "a - b = -1", "b - c = -1"],
                vec![("a", "1"), ("b", "2"), ("c", "3")],
            ),
            (
                vec![
                    "a + b + c + d = 10",
                    "a - b = -1",
                    "b - c = -1",
                    "c - d = -1",
                ],
                vec![("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")],
            ),
        ];

        for (equations, should_be) in systems {
            let names: Vec<_> = should_be.iter().map(|(name, _)| *name).collect();
            let limits = Limits::default().with_max_passes(8 * equations.len());
            let mut session = session(&names.join(" ")).with_limits(limits);

            for equation in &equations {
                session.eq_str(equation).unwrap();
            }

            for (name, value) in should_be {
                assert_eq!(
                    session.finalize(name).unwrap(),
                    Answer::Resolved(number(value)),
                    "{} in {:?}",
                    name,
                    equations
                );
            }
        }
    }

    /// The built-in algebra, except it can't solve for one variable.
    #[derive(Debug, Copy, Clone)]
    struct CantSolveFor(&'static str);

    impl Algebra for CantSolveFor {
        fn solve(
            &self,
            equation: &Equation,
            param: &Parameter,
        ) -> Result<Vec<Expression>, EvaluationError> {
            if param.name() == self.0 {
                Err(EvaluationError::DivisionByZero)
            } else {
                Builtins.solve(equation, param)
            }
        }

        fn simplify(
            &self,
            expr: &Expression,
        ) -> Result<Expression, EvaluationError> {
            Builtins.simplify(expr)
        }
    }

    #[test]
    fn failed_equations_leave_no_trace() {
        let mut session = Session::with_algebra(CantSolveFor("y"));
        session.declare_all("x y");

        let got = session.eq_str("x = y + 1").unwrap_err();

        assert_eq!(
            got,
            PropagationError::Algebra(EvaluationError::DivisionByZero)
        );
        assert!(session.variable("x").unwrap().candidates().is_empty());
        assert_eq!(session.equations().count(), 0);
    }
}

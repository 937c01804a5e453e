//! Incremental solver for linear equations.
//!
//! The solver keeps every variable in one of three states:
//!
//! - free: nothing is known about it;
//! - dependent: it equals a polynomial in free variables;
//! - known: it has a constant value.
//!
//! Each new equation is first rewritten in terms of free variables only.
//! A pivot variable (the one with the largest coefficient) is then isolated
//!     and substituted into every existing dependency.
//! Any dependency that collapses to a constant makes its variable known.

use crate::polynomial::{ArithmeticError, Polynomial, Tolerance, VarId};
use gallery_core::Decimal;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

/// Default soft cap on the number of live dependencies.
pub const DEFAULT_MAX_EQUATIONS: usize = 2000;

/// Owner of the variables that the solver works with.
///
/// The solver calls back into the resolver to print variable names
///     and to report variables that have become known.
pub trait VariableResolver {
    fn variable_name(&self, id: VarId) -> String {
        id.to_string()
    }

    /// Invoked once for each variable that becomes known.
    fn set_variable_solved(&mut self, _id: VarId, _value: Decimal) {}

    fn is_capsule(&self, _id: VarId) -> bool {
        false
    }
}

/// Resolver used when no other resolver has been registered.
#[derive(Default)]
pub struct Anonymous;

impl VariableResolver for Anonymous {}

impl<R: VariableResolver> VariableResolver for Rc<RefCell<R>> {
    fn variable_name(&self, id: VarId) -> String {
        self.borrow().variable_name(id)
    }
    fn set_variable_solved(&mut self, id: VarId, value: Decimal) {
        self.borrow_mut().set_variable_solved(id, value)
    }
    fn is_capsule(&self, id: VarId) -> bool {
        self.borrow().is_capsule(id)
    }
}

/// State of a variable as seen by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableState {
    Free,
    Dependent,
    Known(Decimal),
}

/// A polynomial asserted to be zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equation {
    pub polynomial: Polynomial,
    /// Human readable description of where the equation came from.
    pub provenance: Option<String>,
}

impl Equation {
    pub fn new(polynomial: Polynomial, provenance: impl Into<String>) -> Equation {
        Equation {
            polynomial,
            provenance: Some(provenance.into()),
        }
    }
}

impl From<Polynomial> for Equation {
    fn from(polynomial: Polynomial) -> Self {
        Equation {
            polynomial,
            provenance: None,
        }
    }
}

/// Non-fatal condition reported while adding an equation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A coefficient that was zapped was large enough that it may not have been round-off noise.
    PrecisionLoss { dropped: Decimal, threshold: Decimal },
    /// The number of live dependencies exceeds the configured cap.
    EquationsOverflow { live: usize, limit: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::PrecisionLoss { dropped, threshold } => write!(
                f,
                "a coefficient of magnitude {dropped} was treated as zero (threshold {threshold})"
            ),
            Warning::EquationsOverflow { live, limit } => {
                write!(f, "{live} equations are live, more than the limit of {limit}")
            }
        }
    }
}

/// Error returned when adding an equation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    /// The equation reduced to a non-zero constant.
    Inconsistent {
        off_by: Decimal,
        provenance: Option<String>,
    },
    /// A coefficient left the representable range; the system is unchanged.
    Overflow { provenance: Option<String> },
    /// An internal invariant was broken.
    Internal { message: String },
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::Inconsistent { off_by, .. } => {
                write!(f, "inconsistent equation (off by {off_by})")
            }
            SolveError::Overflow { .. } => write!(f, "coefficient out of range"),
            SolveError::Internal { message } => write!(f, "internal solver error: {message}"),
        }
    }
}

impl std::error::Error for SolveError {}

impl SolveError {
    fn internal(context: &str, err: ArithmeticError) -> SolveError {
        SolveError::Internal {
            message: format!("{context}: {err}"),
        }
    }
}

/// Result of successfully adding an equation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// The variable that was eliminated, or [None] if the equation was redundant.
    pub pivot: Option<VarId>,
    /// Variables that became known, in increasing ID order.
    pub solved: Vec<(VarId, Decimal)>,
    pub warnings: Vec<Warning>,
}

impl Outcome {
    pub fn is_redundant(&self) -> bool {
        self.pivot.is_none()
    }
}

/// Largest dropped magnitude seen while processing one equation.
#[derive(Default)]
struct ZapLedger {
    worst: Option<(Decimal, Decimal)>,
}

impl ZapLedger {
    fn zap(&mut self, p: &Polynomial, tolerance: &Tolerance, scale: Decimal) -> Polynomial {
        let (q, dropped) = p.zap_relative(tolerance.epsilon, scale);
        if let Some(dropped) = dropped {
            let threshold = tolerance.threshold(scale.max(p.largest_magnitude()));
            // measure dropped values relative to their threshold
            let worse = match self.worst {
                None => true,
                Some((d, t)) => dropped * t > d * threshold,
            };
            if worse {
                self.worst = Some((dropped, threshold));
            }
        }
        q
    }

    fn warning(&self) -> Option<Warning> {
        let (dropped, threshold) = self.worst?;
        if dropped + dropped >= threshold {
            Some(Warning::PrecisionLoss { dropped, threshold })
        } else {
            None
        }
    }
}

/// The linear equation solver.
pub struct Solver {
    tolerance: Tolerance,
    max_equations: usize,
    known: BTreeMap<VarId, Decimal>,
    dependents: BTreeMap<VarId, Polynomial>,
    resolver: Box<dyn VariableResolver>,
    trace: Option<Rc<RefCell<dyn Write>>>,
}

impl Default for Solver {
    fn default() -> Self {
        Solver::new(Tolerance::default(), DEFAULT_MAX_EQUATIONS)
    }
}

impl Solver {
    pub fn new(tolerance: Tolerance, max_equations: usize) -> Solver {
        Solver {
            tolerance,
            max_equations,
            known: Default::default(),
            dependents: Default::default(),
            resolver: Box::new(Anonymous),
            trace: None,
        }
    }

    /// Installs the resolver that is notified about solved variables.
    pub fn register_resolver(&mut self, resolver: Box<dyn VariableResolver>) {
        self.resolver = resolver;
    }

    /// Sets the sink for equation tracing. [None] disables tracing.
    pub fn set_trace_output(&mut self, out: Option<Rc<RefCell<dyn Write>>>) {
        self.trace = out;
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    pub fn resolver(&self) -> &dyn VariableResolver {
        self.resolver.as_ref()
    }

    fn trace(&self, args: fmt::Arguments) {
        if let Some(out) = &self.trace {
            // tracing is best effort
            let _ = writeln!(out.borrow_mut(), "{args}");
        }
    }

    pub fn state(&self, id: VarId) -> VariableState {
        if let Some(v) = self.known.get(&id) {
            VariableState::Known(*v)
        } else if self.dependents.contains_key(&id) {
            VariableState::Dependent
        } else {
            VariableState::Free
        }
    }

    pub fn value(&self, id: VarId) -> Option<Decimal> {
        self.known.get(&id).copied()
    }

    pub fn is_known(&self, id: VarId) -> bool {
        self.known.contains_key(&id)
    }

    pub fn dependency(&self, id: VarId) -> Option<&Polynomial> {
        self.dependents.get(&id)
    }

    /// Returns the current value of a variable as a polynomial in free variables.
    pub fn resolve(&self, id: VarId) -> Polynomial {
        if let Some(v) = self.known.get(&id) {
            Polynomial::constant(*v)
        } else if let Some(p) = self.dependents.get(&id) {
            p.clone()
        } else {
            Polynomial::variable(id)
        }
    }

    /// Rewrites a polynomial in terms of free variables only.
    ///
    /// Returns the rewritten polynomial and the magnitude of the largest summand,
    ///     which is the scale for zapping.
    fn substitute_all(&self, p: &Polynomial) -> (Polynomial, Decimal) {
        let mut result = Polynomial::constant(p.constant_term());
        let mut scale = p.constant_term().abs();
        for (id, c) in p.terms() {
            if let Some(v) = self.known.get(&id) {
                let summand = c * *v;
                scale = scale.max(summand.abs());
                result.set_constant(result.constant_term() + summand);
            } else if let Some(expr) = self.dependents.get(&id) {
                scale = scale.max(c.abs() * expr.largest_magnitude());
                result.add_scaled(expr, c);
            } else {
                scale = scale.max(c.abs());
                result.add_scaled(&Polynomial::variable(id), c);
            }
        }
        (result, scale)
    }

    /// Rewrites a polynomial in terms of free variables only, zapping round-off noise.
    pub fn normalize(&self, p: &Polynomial) -> Polynomial {
        let (result, scale) = self.substitute_all(p);
        result.zap_relative(self.tolerance.epsilon, scale).0
    }

    /// Adds an equation to the system.
    pub fn add_equation(&mut self, equation: impl Into<Equation>) -> Result<Outcome, SolveError> {
        let equation = equation.into();
        let mut ledger = ZapLedger::default();
        let mut outcome = Outcome::default();

        let (p, scale) = self.substitute_all(&equation.polynomial);
        let p = ledger.zap(&p, &self.tolerance, scale);
        if p.is_saturated() {
            return Err(SolveError::Overflow {
                provenance: equation.provenance,
            });
        }
        if let Some(c) = p.as_constant() {
            if c.is_zero() {
                outcome.warnings.extend(ledger.warning());
                return Ok(outcome);
            }
            return Err(SolveError::Inconsistent {
                off_by: c,
                provenance: equation.provenance,
            });
        }
        let (pivot, coefficient) = match p.max_coefficient(|_| false) {
            Some(pivot) => pivot,
            None => {
                return Err(SolveError::Internal {
                    message: format!("no pivot in non-constant polynomial {p}"),
                })
            }
        };
        let mut rest = p;
        rest.set_coefficient(pivot, Decimal::ZERO);
        let expr = rest
            .scale_div(-coefficient, self.tolerance.precision)
            .map_err(|err| SolveError::internal("isolating the pivot", err))?;
        let expr = ledger.zap(&expr, &self.tolerance, Decimal::ZERO);

        let mut updates = vec![];
        for (id, dependency) in &self.dependents {
            let a = dependency.coefficient(pivot);
            if a.is_zero() {
                continue;
            }
            let scale = dependency
                .largest_magnitude()
                .max(a.abs() * expr.largest_magnitude());
            let substituted = dependency
                .substitute(pivot, &expr)
                .map_err(|err| SolveError::internal("substituting the pivot", err))?;
            updates.push((*id, ledger.zap(&substituted, &self.tolerance, scale)));
        }
        // nothing is committed until every rewritten dependency is known to be in range
        if expr.is_saturated() || updates.iter().any(|(_, d)| d.is_saturated()) {
            return Err(SolveError::Overflow {
                provenance: equation.provenance,
            });
        }
        let mut solved = vec![];
        for (id, dependency) in updates {
            match dependency.as_constant() {
                Some(v) => {
                    self.dependents.remove(&id);
                    self.known.insert(id, v);
                    solved.push((id, v));
                }
                None => {
                    self.dependents.insert(id, dependency);
                }
            }
        }
        match expr.as_constant() {
            Some(v) => {
                self.known.insert(pivot, v);
                solved.push((pivot, v));
            }
            None => {
                self.trace(format_args!(
                    "## {}={}",
                    self.resolver.variable_name(pivot),
                    expr.display(self.resolver.as_ref())
                ));
                self.dependents.insert(pivot, expr);
            }
        }
        solved.sort_by_key(|(id, _)| *id);
        self.notify_solved(&solved);

        outcome.pivot = Some(pivot);
        outcome.solved = solved;
        outcome.warnings.extend(ledger.warning());
        if self.dependents.len() > self.max_equations {
            outcome.warnings.push(Warning::EquationsOverflow {
                live: self.dependents.len(),
                limit: self.max_equations,
            });
        }
        Ok(outcome)
    }

    fn notify_solved(&mut self, solved: &[(VarId, Decimal)]) {
        for (id, v) in solved {
            self.trace(format_args!("#### {}={v}", self.resolver.variable_name(*id)));
            self.resolver.set_variable_solved(*id, *v);
        }
    }

    /// Number of places the variable appears: its own entry (if known or dependent)
    ///     plus every dependency that mentions it.
    pub fn occurrences(&self, id: VarId) -> usize {
        let own = usize::from(self.known.contains_key(&id) || self.dependents.contains_key(&id));
        own + self.dependents.values().filter(|p| p.contains(id)).count()
    }

    pub fn is_referenced(&self, id: VarId) -> bool {
        self.occurrences(id) > 0
    }

    /// Forgets a variable.
    ///
    /// Its own entry is removed and its term is dropped from every dependency.
    /// Dependencies that become constant as a result make their variables known.
    pub fn discard(&mut self, id: VarId) -> Vec<(VarId, Decimal)> {
        self.known.remove(&id);
        self.dependents.remove(&id);
        let mut solved = vec![];
        for (dependent, p) in self.dependents.iter_mut() {
            if p.contains(id) {
                p.set_coefficient(id, Decimal::ZERO);
                if let Some(v) = p.as_constant() {
                    solved.push((*dependent, v));
                }
            }
        }
        for (dependent, v) in &solved {
            self.dependents.remove(dependent);
            self.known.insert(*dependent, *v);
        }
        self.notify_solved(&solved);
        solved
    }

    /// Removes a variable together with every dependency that mentions it.
    ///
    /// The variables of those dependencies become free again; they are returned.
    pub fn retract(&mut self, id: VarId) -> Vec<VarId> {
        self.known.remove(&id);
        self.dependents.remove(&id);
        let freed: Vec<VarId> = self
            .dependents
            .iter()
            .filter(|(_, p)| p.contains(id))
            .map(|(dependent, _)| *dependent)
            .collect();
        for dependent in &freed {
            self.dependents.remove(dependent);
        }
        freed
    }

    pub fn num_equations(&self) -> usize {
        self.dependents.len()
    }

    pub fn dependents(&self) -> impl Iterator<Item = (VarId, &Polynomial)> {
        self.dependents.iter().map(|(id, p)| (*id, p))
    }

    pub fn known(&self) -> impl Iterator<Item = (VarId, Decimal)> + '_ {
        self.known.iter().map(|(id, v)| (*id, *v))
    }

    /// Lines of the form `name=expression`, one for each dependency.
    pub fn dependency_listing(&self, include_capsules: bool) -> Vec<String> {
        self.dependents
            .iter()
            .filter(|(id, _)| include_capsules || !self.resolver.is_capsule(**id))
            .map(|(id, p)| {
                format!(
                    "{}={}",
                    self.resolver.variable_name(*id),
                    p.display(self.resolver.as_ref())
                )
            })
            .collect()
    }

    /// Printable dump of the whole solver state.
    pub fn dump(&self) -> String {
        let mut s = String::from("dependencies:\n");
        for line in self.dependency_listing(true) {
            s.push_str("  ");
            s.push_str(&line);
            s.push('\n');
        }
        s.push_str("known:\n");
        for (id, v) in &self.known {
            s.push_str(&format!("  {}={v}\n", self.resolver.variable_name(*id)));
        }
        s
    }

    /// Verifies that no dependency mentions a known or dependent variable,
    ///     and that no variable is both known and dependent.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (id, p) in &self.dependents {
            if self.known.contains_key(id) {
                return Err(format!("{id} is both known and dependent"));
            }
            if p.is_constant() {
                return Err(format!("{id} depends on the constant {p}"));
            }
            for other in p.variables() {
                if self.known.contains_key(&other) || self.dependents.contains_key(&other) {
                    return Err(format!("the dependency of {id} mentions {other}: {id}={p}"));
                }
            }
        }
        Ok(())
    }
}

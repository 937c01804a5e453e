//! The equation engine.
//!
//! The [Engine] owns all of the state of a Gallery run: the solver, the variables,
//!     the scopes and the expression stack.
//! A parser drives it through a sequence of calls: push operands, apply operators,
//!     then commit the result as an equation or an assignment.
//!
//! ```
//! use gallery::{Engine, Resolved};
//! use gallery_core::Decimal;
//!
//! let mut engine = Engine::default();
//! let x = "x".parse().unwrap();
//! let y = "y".parse().unwrap();
//! // x + y = 3
//! engine.push_variable(&x).unwrap();
//! engine.push_variable(&y).unwrap();
//! engine.op_add().unwrap();
//! engine.push_numeric_literal(Decimal::from_integer(3)).unwrap();
//! engine.commit_equation().unwrap();
//! engine.end_statement();
//! // x - y = 1
//! engine.push_variable(&x).unwrap();
//! engine.push_variable(&y).unwrap();
//! engine.op_sub().unwrap();
//! engine.push_numeric_literal(Decimal::ONE).unwrap();
//! engine.commit_equation().unwrap();
//! engine.end_statement();
//! assert_eq!(engine.value(&x).unwrap(), Resolved::Numeric(Decimal::from_integer(2)));
//! assert_eq!(engine.show(&y).unwrap(), "y=1");
//! ```
//!
//! ## Errors
//!
//! Every operation returns `Result<_, Box<Error>>`.
//! The first user error in a statement is recorded in the diagnostics list
//!     and makes the remaining operations of the statement fail with the same error
//!     until [Engine::end_statement] is called.
//! Warnings are recorded but do not interrupt anything.
//! An engine bug halts the engine; every later operation fails.

use crate::error::{Class, Error, Kind, Span};
use crate::exprstack::{Cell, ExprStack};
use crate::options::Options;
use crate::scope::{FrameKind, FrameStack, MemoryFrame, ScopeId, ScopeTree, SymbolTable};
use crate::trace::Tracer;
use crate::variable::{Axis, NamePath, PathRef, Registry, Status, Value, VarType};
use gallery_core::{Decimal, Pair, Unit};
use leq::{Equation, Polynomial, SolveError, Solver, VarId, VariableState, Warning};
use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

/// A value handed to the back-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Numeric(Decimal),
    Pair(Pair),
    Path(PathRef),
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Numeric(v) => write!(f, "{v}"),
            Resolved::Pair(p) => write!(f, "{p}"),
            Resolved::Path(p) => write!(f, "{p}"),
        }
    }
}

const BUILTIN_PAIRS: [(&str, i64, i64); 5] = [
    ("origin", 0, 0),
    ("up", 0, 1),
    ("down", 0, -1),
    ("right", 1, 0),
    ("left", -1, 0),
];

pub struct Engine {
    options: Options,
    solver: Solver,
    registry: Rc<RefCell<Registry>>,
    scopes: ScopeTree,
    symbols: SymbolTable,
    frames: FrameStack,
    stack: ExprStack,
    tracer: Tracer,
    diagnostics: Vec<Error>,
    location: Option<Span>,
    failed: Option<Box<Error>>,
    halted: bool,
    equation_count: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(Options::default())
    }
}

fn user_error<T: Into<String>>(kind: Kind, title: T) -> Box<Error> {
    Box::new(Error::new(kind, title))
}

impl Engine {
    pub fn new(options: Options) -> Engine {
        let tolerance = options.tolerance();
        let registry: Rc<RefCell<Registry>> = Default::default();
        let mut solver = Solver::new(tolerance, options.max_equations);
        solver.register_resolver(Box::new(registry.clone()));
        let mut engine = Engine {
            solver,
            registry,
            scopes: Default::default(),
            symbols: Default::default(),
            frames: Default::default(),
            stack: ExprStack::new(tolerance),
            tracer: Default::default(),
            diagnostics: vec![],
            location: None,
            failed: None,
            halted: false,
            equation_count: 0,
            options,
        };
        if let Err(err) = engine.load_builtins() {
            engine.fail(err);
        }
        engine.install_tracer();
        engine
    }

    fn load_builtins(&mut self) -> Result<(), Box<Error>> {
        for (tag, x, y) in BUILTIN_PAIRS {
            self.scopes.declare_builtin(tag, VarType::Pair);
            let name = NamePath::new(tag);
            let id = self
                .registry
                .borrow_mut()
                .allocate(name.clone(), VarType::Pair, ScopeId::GLOBAL, 0);
            self.symbols.bind(ScopeId::GLOBAL, name, id);
            let parts = self.registry.borrow().numeric_ids(id);
            for (part, v) in parts.into_iter().zip([x, y]) {
                let mut p = Polynomial::variable(part);
                p.set_constant(Decimal::from_integer(-v));
                self.solver.add_equation(p).map_err(|err| {
                    user_error(Kind::EngineBug, format!("cannot load `{tag}`: {err}"))
                })?;
            }
        }
        Ok(())
    }

    fn install_tracer(&mut self) {
        self.tracer.set_online(self.options.tracing_online);
        let out: Option<Rc<RefCell<dyn Write>>> = if self.options.tracing_equations {
            Some(Rc::new(RefCell::new(self.tracer.clone())))
        } else {
            None
        };
        self.solver.set_trace_output(out);
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn registry(&self) -> std::cell::Ref<'_, Registry> {
        self.registry.borrow()
    }

    pub fn stack(&self) -> &ExprStack {
        &self.stack
    }

    /// Sets the terminal sink. Traces reach it only when `tracing_online` is set.
    pub fn set_terminal_out(&mut self, out: Rc<RefCell<dyn Write>>) {
        self.tracer.terminal_out = out;
        self.install_tracer();
    }

    pub fn set_log_file(&mut self, out: Rc<RefCell<dyn Write>>) {
        self.tracer.log_file = out;
        self.install_tracer();
    }

    /// Sets the source location attached to diagnostics raised by the following calls.
    pub fn set_location(&mut self, span: Option<Span>) {
        self.location = span;
    }

    pub fn diagnostics(&self) -> &[Error] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Whether any diagnostic other than a warning has been recorded.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| !d.kind.is_warning())
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Number of open groups, macros and figures.
    pub fn frame_depth(&self) -> usize {
        self.frames.depth()
    }

    pub fn innermost_frame(&self) -> &MemoryFrame {
        self.frames.top()
    }

    /// Records an error raised outside of the engine, e.g. by the parser.
    pub fn report(&mut self, err: Error) -> Box<Error> {
        self.fail(Box::new(err))
    }

    fn fail(&mut self, err: Box<Error>) -> Box<Error> {
        let mut err = Box::new(err.at(self.location.clone()));
        if err.class() == Class::Bug {
            self.halted = true;
            err = Box::new(err.with_note(format!("solver state:\n{}", self.solver.dump())));
        }
        self.tracer.diagnostic(&err);
        self.diagnostics.push((*err).clone());
        if err.class() == Class::User {
            self.failed = Some(err.clone());
        }
        err
    }

    fn warn(&mut self, warning: Warning) {
        let kind = match warning {
            Warning::PrecisionLoss { .. } => Kind::PrecisionLoss,
            Warning::EquationsOverflow { .. } => Kind::EquationsOverflow,
        };
        let err = Error::new(kind, warning.to_string()).at(self.location.clone());
        self.tracer.diagnostic(&err);
        self.diagnostics.push(err);
    }

    fn check_halted(&self) -> Result<(), Box<Error>> {
        if self.halted {
            return Err(user_error(Kind::EngineBug, "the engine has halted"));
        }
        Ok(())
    }

    /// Runs one statement-level operation.
    fn run<T, F>(&mut self, f: F) -> Result<T, Box<Error>>
    where
        F: FnOnce(&mut Engine) -> Result<T, Box<Error>>,
    {
        self.check_halted()?;
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        f(self).map_err(|err| self.fail(err))
    }

    fn trace_capsule(&self, id: VarId, event: &str) {
        if self.options.tracing_capsules {
            let name = self.registry.borrow().display_name(id);
            self.tracer.event("capsule", format_args!("{name} {event}"));
        }
    }

    // Names

    fn lookup_name(&self, name: &NamePath) -> Option<VarId> {
        let (scope, _) = self.scopes.lookup(name.tag())?;
        self.symbols.get(scope, name)
    }

    /// Finds or creates the variable with the given name.
    fn resolve_name(&mut self, name: &NamePath) -> Result<VarId, Box<Error>> {
        let tag = name.tag();
        let strict = self.options.strict_scopes && !self.scopes.is_global();
        let (scope, decl) = match self.scopes.lookup(tag) {
            Some((scope, decl)) => {
                if strict && scope != self.scopes.current() && !decl.builtin {
                    return Err(Box::new(
                        Error::new(
                            Kind::UndefinedVariable,
                            format!("`{tag}` belongs to an enclosing group"),
                        )
                        .with_note(format!("save `{tag}` or declare it inside the group")),
                    ));
                }
                (scope, decl)
            }
            None => {
                if strict {
                    return Err(Box::new(
                        Error::new(Kind::UndefinedVariable, format!("`{tag}` is not declared"))
                            .with_note(format!("save `{tag}` or declare it before using it")),
                    ));
                }
                let decl = self.scopes.declare(ScopeId::GLOBAL, tag, VarType::Numeric);
                (ScopeId::GLOBAL, decl)
            }
        };
        if let Some(id) = self.symbols.get(scope, name) {
            return Ok(id);
        }
        let id = self
            .registry
            .borrow_mut()
            .allocate(name.clone(), decl.kind, scope, decl.incarnation);
        self.symbols.bind(scope, name.clone(), id);
        Ok(id)
    }

    /// Lets go of the name of a variable.
    ///
    /// Numeric values still referenced by the solver or the stack become capsules.
    fn release_variable(&mut self, id: VarId) {
        let (kind, numeric_ids) = {
            let registry = self.registry.borrow();
            match registry.get(id) {
                None => return,
                Some(v) => (v.kind, registry.numeric_ids(id)),
            }
        };
        for n in numeric_ids {
            if self.solver.is_referenced(n) || self.stack.mentions(n) {
                self.registry.borrow_mut().encapsulate(n);
                self.trace_capsule(n, "created");
            } else {
                self.registry.borrow_mut().retire(n);
            }
        }
        if kind != VarType::Numeric {
            self.registry.borrow_mut().unname(id);
        }
    }

    /// Gives a name a fresh variable, releasing the old one.
    fn reincarnate(&mut self, old: VarId, name: &NamePath) -> Result<VarId, Box<Error>> {
        let (kind, scope, incarnation) = match self.registry.borrow().get(old) {
            Some(v) => (v.kind, v.scope, v.incarnation),
            None => {
                return Err(user_error(
                    Kind::EngineBug,
                    format!("the variable {old} bound to `{name}` does not exist"),
                ))
            }
        };
        let new = self
            .registry
            .borrow_mut()
            .allocate(name.clone(), kind, scope, incarnation + 1);
        self.symbols.bind(scope, name.clone(), new);
        self.release_variable(old);
        Ok(new)
    }

    /// Reclaims capsules that can no longer influence anything.
    fn harvest(&mut self) {
        loop {
            let capsules: Vec<VarId> = self.registry.borrow().capsules().collect();
            let mut changed = false;
            for id in capsules {
                if self.stack.mentions(id) {
                    continue;
                }
                match self.solver.state(id) {
                    VariableState::Known(_) | VariableState::Dependent => {
                        self.trace_capsule(id, "reclaimed");
                        self.solver.discard(id);
                    }
                    VariableState::Free => match self.solver.occurrences(id) {
                        0 => self.trace_capsule(id, "reclaimed"),
                        1 => {
                            self.trace_capsule(id, "reclaimed with its dependency");
                            self.solver.retract(id);
                        }
                        _ => continue,
                    },
                }
                self.registry.borrow_mut().retire(id);
                changed = true;
            }
            if !changed {
                break;
            }
        }
        self.refresh_stack();
    }

    fn refresh_stack(&mut self) {
        let solver = &self.solver;
        self.stack.refresh(|p| solver.normalize(p));
    }

    /// The expression cell holding the current value of a variable.
    fn variable_cell(&self, id: VarId) -> Result<Cell, Box<Error>> {
        let registry = self.registry.borrow();
        let Some(v) = registry.get(id) else {
            return Err(user_error(
                Kind::UndefinedVariable,
                format!("the variable {id} does not exist"),
            ));
        };
        if v.status == Status::Retired {
            return Err(user_error(
                Kind::UndefinedVariable,
                format!("the variable {id} no longer exists"),
            ));
        }
        let name = registry.display_name(id);
        match (v.kind, v.parts, v.value) {
            (VarType::Numeric, _, _) => Ok(Cell::numeric(self.solver.resolve(id))),
            (VarType::Pair, Some([x, y]), _) => {
                Ok(Cell::Pair(self.solver.resolve(x), self.solver.resolve(y)))
            }
            (VarType::Path, _, Value::Path(p)) => Ok(Cell::Path(p)),
            (VarType::Path, _, _) => Err(user_error(
                Kind::Unresolved,
                format!("the path `{name}` is unknown"),
            )),
            (kind, _, _) => Err(Box::new(
                Error::new(
                    Kind::TypeMismatch,
                    format!("`{name}` is a {kind} variable"),
                )
                .with_note("only numeric, pair and path variables can be used in expressions"),
            )),
        }
    }

    // Declarations

    /// Declares the type of a tag.
    ///
    /// If the tag is visible it is redeclared in the scope where it was found,
    ///     otherwise it is declared in the global scope.
    /// Variables previously bound under the tag lose their names.
    pub fn declare(&mut self, kind: VarType, tag: &str) -> Result<(), Box<Error>> {
        self.run(|e| {
            check_tag(tag)?;
            let scope = e.scopes.lookup(tag).map_or(ScopeId::GLOBAL, |(scope, _)| scope);
            e.scopes.declare(scope, tag, kind);
            for id in e.symbols.unbind_tag(scope, tag) {
                e.release_variable(id);
            }
            e.harvest();
            Ok(())
        })
    }

    /// Makes the tag local to the current group.
    pub fn save(&mut self, tag: &str) -> Result<(), Box<Error>> {
        self.run(|e| {
            check_tag(tag)?;
            if e.scopes.is_global() {
                e.tracer
                    .event("save", format_args!("`{tag}` is not saved at global scope"));
                return Ok(());
            }
            let current = e.scopes.current();
            e.scopes.declare(current, tag, VarType::Numeric);
            for id in e.symbols.unbind_tag(current, tag) {
                e.release_variable(id);
            }
            e.harvest();
            Ok(())
        })
    }

    // Frames

    fn begin_frame(&mut self, kind: FrameKind, name: String) -> Result<(), Box<Error>> {
        self.check_halted()?;
        let scope = self.scopes.push();
        self.frames.push(MemoryFrame {
            name,
            kind,
            scope,
            stack_base: self.stack.len(),
        });
        Ok(())
    }

    fn end_frame(&mut self, kind: FrameKind) -> Result<(), Box<Error>> {
        self.check_halted()?;
        let frame = match self.frames.pop(kind) {
            Ok(frame) => frame,
            Err(FrameKind::Global) => {
                let err = user_error(Kind::UnbalancedGroup, format!("there is no {kind} to end"));
                return Err(self.fail(err));
            }
            Err(found) => {
                let err = Box::new(
                    Error::new(
                        Kind::UnbalancedGroup,
                        format!("cannot end a {kind} while a {found} is open"),
                    )
                    .with_note(format!("the innermost open frame is a {found}")),
                );
                return Err(self.fail(err));
            }
        };
        self.scopes.pop();
        for id in self.symbols.drain_scope(frame.scope) {
            self.release_variable(id);
        }
        self.harvest();
        Ok(())
    }

    pub fn begin_group(&mut self) -> Result<(), Box<Error>> {
        self.begin_frame(FrameKind::Group, String::new())
    }

    pub fn end_group(&mut self) -> Result<(), Box<Error>> {
        self.end_frame(FrameKind::Group)
    }

    pub fn begin_macro(&mut self, name: &str) -> Result<(), Box<Error>> {
        self.begin_frame(FrameKind::Macro, name.to_string())
    }

    pub fn end_macro(&mut self) -> Result<(), Box<Error>> {
        self.end_frame(FrameKind::Macro)
    }

    pub fn begin_figure(&mut self, number: i64) -> Result<(), Box<Error>> {
        self.begin_frame(FrameKind::Figure, number.to_string())
    }

    pub fn end_figure(&mut self) -> Result<(), Box<Error>> {
        self.end_frame(FrameKind::Figure)
    }

    /// Finishes the current statement.
    ///
    /// Cells pushed since the innermost frame was entered are dropped
    ///     and the statement's error state is cleared.
    pub fn end_statement(&mut self) {
        self.stack.truncate(self.frames.top().stack_base);
        self.failed = None;
        if !self.halted {
            self.harvest();
        }
    }

    // Operands

    pub fn push_variable(&mut self, name: &NamePath) -> Result<(), Box<Error>> {
        self.run(|e| {
            let id = e.resolve_name(name)?;
            let cell = e.variable_cell(id)?;
            e.stack.push(cell);
            Ok(())
        })
    }

    pub fn push_numeric_literal(&mut self, value: Decimal) -> Result<(), Box<Error>> {
        self.run(|e| e.stack.push_constant(value))
    }

    /// Pushes a dimension, converted to big points.
    pub fn push_dimension(&mut self, value: Decimal, unit: Unit) -> Result<(), Box<Error>> {
        self.run(|e| {
            let precision = e.options.tolerance().precision;
            e.stack.push_constant(unit.to_big_points(value, precision))
        })
    }

    pub fn push_pair_literal(&mut self, x: Decimal, y: Decimal) -> Result<(), Box<Error>> {
        self.run(|e| {
            e.stack.push_pair(Polynomial::constant(x), Polynomial::constant(y))
        })
    }

    pub fn push_path(&mut self, path: PathRef) -> Result<(), Box<Error>> {
        self.run(|e| {
            e.stack.push(Cell::Path(path));
            Ok(())
        })
    }

    // Operators

    pub fn op_add(&mut self) -> Result<(), Box<Error>> {
        self.run(|e| e.stack.add())
    }

    pub fn op_sub(&mut self) -> Result<(), Box<Error>> {
        self.run(|e| e.stack.sub())
    }

    pub fn op_mul(&mut self) -> Result<(), Box<Error>> {
        self.run(|e| e.stack.mul())
    }

    pub fn op_div(&mut self) -> Result<(), Box<Error>> {
        self.run(|e| e.stack.div())
    }

    pub fn op_neg(&mut self) -> Result<(), Box<Error>> {
        self.run(|e| e.stack.neg())
    }

    pub fn op_interpolate(&mut self) -> Result<(), Box<Error>> {
        self.run(|e| e.stack.interpolate())
    }

    pub fn op_xpart(&mut self) -> Result<(), Box<Error>> {
        self.run(|e| e.stack.pair_part(Axis::X))
    }

    pub fn op_ypart(&mut self) -> Result<(), Box<Error>> {
        self.run(|e| e.stack.pair_part(Axis::Y))
    }

    pub fn op_make_pair(&mut self) -> Result<(), Box<Error>> {
        self.run(|e| e.stack.make_pair())
    }

    pub fn op_length(&mut self) -> Result<(), Box<Error>> {
        self.run(|e| e.stack.length())
    }

    pub fn op_rotated(&mut self) -> Result<(), Box<Error>> {
        self.run(|e| e.stack.rotated())
    }

    /// Pushes a fresh anonymous unknown.
    pub fn op_whatever(&mut self) -> Result<(), Box<Error>> {
        self.run(|e| {
            let id = e.registry.borrow_mut().allocate_capsule(e.scopes.current());
            e.trace_capsule(id, "created");
            e.stack.push_variable(id);
            Ok(())
        })
    }

    // Commits

    /// Pops two expressions and asserts that they are equal.
    pub fn commit_equation(&mut self) -> Result<(), Box<Error>> {
        self.run(|e| {
            let rhs = e.stack.pop()?;
            let lhs = e.stack.pop()?;
            let result = e.equate(lhs, rhs);
            e.harvest();
            result
        })
    }

    /// Pops an expression and assigns it to the named variable.
    pub fn commit_assignment(&mut self, name: &NamePath) -> Result<(), Box<Error>> {
        self.run(|e| {
            let id = e.resolve_name(name)?;
            let (kind, numeric_ids) = {
                let registry = e.registry.borrow();
                let kind = registry.get(id).map(|v| v.kind);
                (kind, registry.numeric_ids(id))
            };
            let value_type = match e.stack.peek() {
                Some(cell) => cell.type_name(),
                None => "",
            };
            match (kind, value_type) {
                (Some(VarType::Path), "path") => {
                    if let Cell::Path(path) = e.stack.pop()? {
                        let id = e.reincarnate(id, name)?;
                        e.registry.borrow_mut().set_value(id, Value::Path(path));
                    }
                    return Ok(());
                }
                (Some(VarType::Numeric), "numeric") | (Some(VarType::Pair), "pair") => {}
                (_, "") => {
                    return Err(user_error(
                        Kind::EngineBug,
                        "an assignment was committed with an empty expression stack",
                    ))
                }
                (kind, found) => {
                    let kind = kind.map_or("unknown", |k| k.name());
                    return Err(user_error(
                        Kind::TypeMismatch,
                        format!("cannot assign a {found} to the {kind} variable `{name}`"),
                    ));
                }
            }
            // the value stays on the stack so that released variables it mentions become capsules
            let reuse = numeric_ids.iter().all(|n| {
                e.solver.state(*n) == VariableState::Free
                    && !e.solver.is_referenced(*n)
                    && !e.stack.mentions(*n)
            });
            let id = if reuse { id } else { e.reincarnate(id, name)? };
            let value = e.stack.pop()?;
            let target = e.variable_cell(id)?;
            let result = e.equate(target, value);
            e.harvest();
            result
        })
    }

    fn equate(&mut self, lhs: Cell, rhs: Cell) -> Result<(), Box<Error>> {
        let polynomials = match (&lhs, &rhs) {
            (Cell::Known(_) | Cell::Numeric(_), Cell::Known(_) | Cell::Numeric(_)) => {
                vec![numeric_polynomial(&rhs) - numeric_polynomial(&lhs)]
            }
            (Cell::Pair(lx, ly), Cell::Pair(rx, ry)) => vec![rx - lx, ry - ly],
            (Cell::Path(_), Cell::Path(_)) => {
                return Err(user_error(
                    Kind::TypeMismatch,
                    "equations between paths are not supported",
                ))
            }
            _ => {
                return Err(Box::new(
                    Error::new(
                        Kind::TypeMismatch,
                        format!(
                            "cannot equate a {} with a {}",
                            lhs.type_name(),
                            rhs.type_name()
                        ),
                    )
                    .with_note(format!("the two sides were {lhs} and {rhs}")),
                ))
            }
        };
        self.equation_count += 1;
        let provenance = match &self.location {
            Some(span) => format!("equation {} (line {})", self.equation_count, span.line),
            None => format!("equation {}", self.equation_count),
        };
        for p in polynomials {
            self.post(p, &provenance)?;
        }
        Ok(())
    }

    fn post(&mut self, p: Polynomial, provenance: &str) -> Result<(), Box<Error>> {
        match self.solver.add_equation(Equation::new(p, provenance)) {
            Ok(outcome) => {
                let redundant = outcome.is_redundant();
                for warning in outcome.warnings {
                    self.warn(warning);
                }
                if !redundant {
                    self.refresh_stack();
                }
            }
            Err(SolveError::Inconsistent { off_by, provenance }) => {
                let culprit = provenance.unwrap_or_else(|| "the last equation".into());
                return Err(Box::new(
                    Error::new(
                        Kind::Inconsistent,
                        format!("inconsistent equation (off by {off_by})"),
                    )
                    .with_note(format!("the culprit is {culprit}"))
                    .with_note("the equation was ignored"),
                ));
            }
            Err(SolveError::Overflow { provenance }) => {
                let culprit = provenance.unwrap_or_else(|| "the last equation".into());
                return Err(Box::new(
                    Error::new(Kind::Overflow, "coefficient out of range")
                        .with_note(format!("the culprit is {culprit}"))
                        .with_note("the equation was ignored"),
                ));
            }
            Err(err @ SolveError::Internal { .. }) => {
                return Err(user_error(Kind::EngineBug, err.to_string()));
            }
        }
        if cfg!(debug_assertions) {
            if let Err(message) = self.solver.check_invariants() {
                return Err(user_error(Kind::EngineBug, message));
            }
        }
        Ok(())
    }

    // Queries

    fn describe_numeric(&self, id: VarId) -> String {
        let registry = self.registry.borrow();
        match self.solver.state(id) {
            VariableState::Known(v) => v.to_string(),
            VariableState::Dependent => match self.solver.dependency(id) {
                Some(p) => p.display(&*registry).to_string(),
                None => registry.display_name(id),
            },
            VariableState::Free => registry.display_name(id),
        }
    }

    fn describe(&self, id: VarId) -> String {
        let (kind, parts, value, name) = {
            let registry = self.registry.borrow();
            match registry.get(id) {
                Some(v) => (v.kind, v.parts, v.value, registry.display_name(id)),
                None => return id.to_string(),
            }
        };
        match (kind, parts, value) {
            (VarType::Numeric, _, _) => match self.solver.state(id) {
                VariableState::Free => format!("{name}=unknown numeric"),
                _ => format!("{name}={}", self.describe_numeric(id)),
            },
            (VarType::Pair, Some([x, y]), _) => format!(
                "{name}=({},{})",
                self.describe_numeric(x),
                self.describe_numeric(y)
            ),
            (VarType::Path, _, Value::Path(p)) => format!("{name}={p}"),
            (kind, _, _) => format!("{name}=unknown {kind}"),
        }
    }

    /// Describes the current value of a variable, e.g. `a=2b` or `C=(5,0)`.
    pub fn show(&mut self, name: &NamePath) -> Result<String, Box<Error>> {
        self.run(|e| {
            let id = e.resolve_name(name)?;
            let s = e.describe(id);
            e.tracer.line(format_args!(">> {s}"));
            Ok(s)
        })
    }

    /// Lists the dependencies of named variables, e.g. `a=2b`.
    pub fn show_dependencies(&mut self) -> Vec<String> {
        let lines = self.solver.dependency_listing(false);
        for line in &lines {
            self.tracer.line(format_args!("{line}"));
        }
        lines
    }

    /// Returns the value of a variable for the back-end.
    ///
    /// Fails with an [Kind::Unresolved] error if the value is not known.
    /// Such errors are not recorded in the diagnostics.
    pub fn value(&self, name: &NamePath) -> Result<Resolved, Box<Error>> {
        self.check_halted()?;
        let unresolved = |detail: String| {
            Box::new(
                Error::new(Kind::Unresolved, format!("`{name}` is not known"))
                    .with_note(detail)
                    .at(self.location.clone()),
            )
        };
        let Some(id) = self.lookup_name(name) else {
            return Err(unresolved(format!("`{name}` has never been used")));
        };
        let (kind, parts, value) = match self.registry.borrow().get(id) {
            Some(v) => (v.kind, v.parts, v.value),
            None => return Err(unresolved(format!("`{name}` does not exist"))),
        };
        let numeric = |id: VarId| -> Result<Decimal, Box<Error>> {
            match self.solver.state(id) {
                VariableState::Known(v) => Ok(v),
                VariableState::Dependent => Err(unresolved(format!(
                    "{}={}",
                    self.registry.borrow().display_name(id),
                    self.describe_numeric(id)
                ))),
                VariableState::Free => Err(unresolved(format!(
                    "{} is still free",
                    self.registry.borrow().display_name(id)
                ))),
            }
        };
        match (kind, parts, value) {
            (VarType::Numeric, _, _) => Ok(Resolved::Numeric(numeric(id)?)),
            (VarType::Pair, Some([x, y]), _) => Ok(Resolved::Pair(Pair::new(numeric(x)?, numeric(y)?))),
            (VarType::Path, _, Value::Path(p)) => Ok(Resolved::Path(p)),
            (kind, _, _) => Err(unresolved(format!("`{name}` is an unknown {kind}"))),
        }
    }

    /// Checks that no dependency mentions a known or dependent variable,
    ///     and that the variables agree with the solver about which values are known.
    pub fn check_invariants(&self) -> Result<(), String> {
        self.solver.check_invariants()?;
        let registry = self.registry.borrow();
        for v in registry.iter() {
            if v.status == Status::Retired {
                continue;
            }
            match (v.kind, v.parts) {
                (VarType::Numeric, _) => {
                    let known = self.solver.value(v.id);
                    let recorded = match v.value {
                        Value::Numeric(x) => Some(x),
                        _ => None,
                    };
                    if known != recorded {
                        return Err(format!(
                            "{} is {:?} in the solver but {:?} in the registry",
                            registry.display_name(v.id),
                            known,
                            recorded
                        ));
                    }
                }
                (VarType::Pair, Some([x, y])) => {
                    let both = self.solver.is_known(x) && self.solver.is_known(y);
                    let recorded = matches!(v.value, Value::Pair(_));
                    if both != recorded {
                        return Err(format!(
                            "the pair {} is inconsistently known",
                            registry.display_name(v.id)
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn numeric_polynomial(cell: &Cell) -> Polynomial {
    match cell {
        Cell::Known(c) => Polynomial::constant(*c),
        Cell::Numeric(p) => p.clone(),
        _ => Polynomial::default(),
    }
}

fn check_tag(tag: &str) -> Result<(), Box<Error>> {
    match tag.parse::<NamePath>() {
        Ok(path) if path.parts().len() == 1 => Ok(()),
        _ => Err(user_error(
            Kind::Syntax,
            format!("`{tag}` is not a tag"),
        )),
    }
}

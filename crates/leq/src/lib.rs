/*!
Linear equations over exact decimals.

This crate contains the two lowest layers of Gallery's equation engine:

- [Polynomial]: sparse linear polynomials keyed by [VarId].
- [Solver]: an incremental solver that accepts equations one at a time
    and maintains, for every variable, whether it is free, dependent on free variables, or known.

```
use gallery_core::Decimal;
use leq::{Polynomial, Solver, VarId};

let (x, y) = (VarId(1), VarId(2));
let mut solver = Solver::default();
// x + y = 3
let mut p = Polynomial::constant(Decimal::from_integer(-3));
p.set_coefficient(x, Decimal::ONE);
p.set_coefficient(y, Decimal::ONE);
solver.add_equation(p).unwrap();
// x - y = 1
let mut q = Polynomial::constant(Decimal::MINUS_ONE);
q.set_coefficient(x, Decimal::ONE);
q.set_coefficient(y, Decimal::MINUS_ONE);
solver.add_equation(q).unwrap();
assert_eq!(solver.value(x), Some(Decimal::from_integer(2)));
assert_eq!(solver.value(y), Some(Decimal::ONE));
```
*/

pub mod polynomial;
pub mod solver;

pub use polynomial::{ArithmeticError, Polynomial, Tolerance, VarId};
pub use solver::{
    Anonymous, Equation, Outcome, SolveError, Solver, VariableResolver, VariableState, Warning,
    DEFAULT_MAX_EQUATIONS,
};

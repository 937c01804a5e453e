//! The expression stack.
//!
//! Parse actions push operands and call operators; operators pop their operands,
//!     combine them as polynomials and push the result.
//! Pair expressions are two polynomials evaluated side by side.
//!
//! Every polynomial pushed by an operator has been zapped relative to the
//!     magnitude of the operands it was computed from.

use crate::error::{Error, Kind};
use crate::variable::{Axis, PathRef};
use gallery_core::{Decimal, Pair, MAX_EXPONENT};
use leq::{ArithmeticError, Polynomial, Tolerance, VarId};
use std::fmt;

/// One entry of the expression stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Known(Decimal),
    /// A numeric expression that is not constant.
    Numeric(Polynomial),
    Pair(Polynomial, Polynomial),
    Path(PathRef),
}

impl Cell {
    /// A numeric cell; constants are stored unboxed.
    pub fn numeric(p: Polynomial) -> Cell {
        match p.as_constant() {
            Some(c) => Cell::Known(c),
            None => Cell::Numeric(p),
        }
    }

    pub fn known_pair(pair: Pair) -> Cell {
        Cell::Pair(Polynomial::constant(pair.x), Polynomial::constant(pair.y))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Known(_) | Cell::Numeric(_) => "numeric",
            Cell::Pair(..) => "pair",
            Cell::Path(_) => "path",
        }
    }

    /// Returns the constant pair, if both components are constant.
    pub fn as_known_pair(&self) -> Option<Pair> {
        match self {
            Cell::Pair(x, y) => Some(Pair::new(x.as_constant()?, y.as_constant()?)),
            _ => None,
        }
    }

    pub fn mentions(&self, id: VarId) -> bool {
        match self {
            Cell::Numeric(p) => p.contains(id),
            Cell::Pair(x, y) => x.contains(id) || y.contains(id),
            Cell::Known(_) | Cell::Path(_) => false,
        }
    }

    fn map<F: Fn(&Polynomial) -> Polynomial>(&self, f: F) -> Cell {
        match self {
            Cell::Numeric(p) => Cell::numeric(f(p)),
            Cell::Pair(x, y) => Cell::Pair(f(x), f(y)),
            Cell::Known(_) | Cell::Path(_) => self.clone(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Known(c) => write!(f, "{c}"),
            Cell::Numeric(p) => write!(f, "{p}"),
            Cell::Pair(x, y) => write!(f, "({x},{y})"),
            Cell::Path(p) => write!(f, "{p}"),
        }
    }
}

fn type_mismatch(operation: &str, expected: &str, found: &Cell) -> Box<Error> {
    Box::new(
        Error::new(
            Kind::TypeMismatch,
            format!("{operation} needs a {expected} operand, found a {}", found.type_name()),
        )
        .with_note(format!("the operand was {found}")),
    )
}

fn nonlinear(operation: &str, a: &dyn fmt::Display, b: &dyn fmt::Display) -> Box<Error> {
    Box::new(
        Error::new(
            Kind::Nonlinear,
            format!("{operation} of two unknown quantities is not linear"),
        )
        .with_note(format!("the operands were {a} and {b}")),
    )
}

fn arithmetic(err: ArithmeticError, operation: &str) -> Box<Error> {
    match err {
        ArithmeticError::DivisionByZero => {
            Box::new(Error::new(Kind::DivByZero, format!("{operation} by zero")))
        }
        ArithmeticError::Nonlinear => Box::new(Error::new(
            Kind::Nonlinear,
            format!("{operation} by an unknown quantity is not linear"),
        )),
    }
}

fn in_range(operation: &str, p: Polynomial) -> Result<Polynomial, Box<Error>> {
    if p.is_saturated() {
        return Err(Box::new(
            Error::new(Kind::Overflow, format!("{operation} overflowed"))
                .with_note(format!("magnitudes must stay below 1e{}", MAX_EXPONENT + 1)),
        ));
    }
    Ok(p)
}

/// A numeric or pair operand, after popping.
enum Operand {
    Numeric(Polynomial),
    Pair(Polynomial, Polynomial),
}

#[derive(Debug, Default)]
pub struct ExprStack {
    cells: Vec<Cell>,
    tolerance: Tolerance,
}

impl ExprStack {
    pub fn new(tolerance: Tolerance) -> ExprStack {
        ExprStack {
            cells: vec![],
            tolerance,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn peek(&self) -> Option<&Cell> {
        self.cells.last()
    }

    pub fn truncate(&mut self, len: usize) {
        self.cells.truncate(len);
    }

    pub fn push(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    pub fn push_constant(&mut self, c: Decimal) -> Result<(), Box<Error>> {
        let p = in_range("the constant", Polynomial::constant(c))?;
        self.push(Cell::numeric(p));
        Ok(())
    }

    pub fn push_variable(&mut self, id: VarId) {
        self.push(Cell::Numeric(Polynomial::variable(id)));
    }

    pub fn push_pair(&mut self, x: Polynomial, y: Polynomial) -> Result<(), Box<Error>> {
        let x = in_range("the pair", x)?;
        let y = in_range("the pair", y)?;
        self.push(Cell::Pair(x, y));
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Cell, Box<Error>> {
        self.cells.pop().ok_or_else(|| {
            Box::new(Error::new(
                Kind::EngineBug,
                "an operator was applied to an empty expression stack",
            ))
        })
    }

    fn pop_operand(&mut self, operation: &str) -> Result<Operand, Box<Error>> {
        match self.pop()? {
            Cell::Known(c) => Ok(Operand::Numeric(Polynomial::constant(c))),
            Cell::Numeric(p) => Ok(Operand::Numeric(p)),
            Cell::Pair(x, y) => Ok(Operand::Pair(x, y)),
            cell @ Cell::Path(_) => Err(type_mismatch(operation, "numeric or pair", &cell)),
        }
    }

    pub fn pop_numeric(&mut self, operation: &str) -> Result<Polynomial, Box<Error>> {
        match self.pop()? {
            Cell::Known(c) => Ok(Polynomial::constant(c)),
            Cell::Numeric(p) => Ok(p),
            cell => Err(type_mismatch(operation, "numeric", &cell)),
        }
    }

    pub fn pop_pair(&mut self, operation: &str) -> Result<(Polynomial, Polynomial), Box<Error>> {
        match self.pop()? {
            Cell::Pair(x, y) => Ok((x, y)),
            cell => Err(type_mismatch(operation, "pair", &cell)),
        }
    }

    /// Zaps a result relative to the operands it was computed from.
    fn zap(&self, p: Polynomial, operands: &[&Polynomial]) -> Polynomial {
        let scale = operands
            .iter()
            .map(|q| q.largest_magnitude())
            .fold(Decimal::ZERO, Decimal::max);
        p.zap_relative(self.tolerance.epsilon, scale).0
    }

    fn push_numeric(
        &mut self,
        operation: &str,
        p: Polynomial,
        operands: &[&Polynomial],
    ) -> Result<(), Box<Error>> {
        let p = in_range(operation, self.zap(p, operands))?;
        self.push(Cell::numeric(p));
        Ok(())
    }

    fn push_pair_zapped(
        &mut self,
        operation: &str,
        x: Polynomial,
        y: Polynomial,
        operands: &[&Polynomial],
    ) -> Result<(), Box<Error>> {
        let x = in_range(operation, self.zap(x, operands))?;
        let y = in_range(operation, self.zap(y, operands))?;
        self.push(Cell::Pair(x, y));
        Ok(())
    }

    fn add_or_sub(&mut self, operation: &str, sign: Decimal) -> Result<(), Box<Error>> {
        let b = self.pop_operand(operation)?;
        let a = self.pop_operand(operation)?;
        match (a, b) {
            (Operand::Numeric(a), Operand::Numeric(b)) => {
                let mut sum = a.clone();
                sum.add_scaled(&b, sign);
                self.push_numeric(operation, sum, &[&a, &b])?;
            }
            (Operand::Pair(ax, ay), Operand::Pair(bx, by)) => {
                let mut x = ax.clone();
                x.add_scaled(&bx, sign);
                let mut y = ay.clone();
                y.add_scaled(&by, sign);
                self.push_pair_zapped(operation, x, y, &[&ax, &ay, &bx, &by])?;
            }
            (Operand::Pair(..), Operand::Numeric(b)) => {
                return Err(type_mismatch(operation, "pair", &Cell::numeric(b)));
            }
            (Operand::Numeric(a), Operand::Pair(..)) => {
                return Err(type_mismatch(operation, "pair", &Cell::numeric(a)));
            }
        }
        Ok(())
    }

    pub fn add(&mut self) -> Result<(), Box<Error>> {
        self.add_or_sub("addition", Decimal::ONE)
    }

    pub fn sub(&mut self) -> Result<(), Box<Error>> {
        self.add_or_sub("subtraction", Decimal::MINUS_ONE)
    }

    pub fn neg(&mut self) -> Result<(), Box<Error>> {
        match self.pop_operand("negation")? {
            Operand::Numeric(p) => self.push(Cell::numeric(-p)),
            Operand::Pair(x, y) => self.push(Cell::Pair(-x, -y)),
        }
        Ok(())
    }

    pub fn mul(&mut self) -> Result<(), Box<Error>> {
        let b = self.pop_operand("multiplication")?;
        let a = self.pop_operand("multiplication")?;
        match (a, b) {
            (Operand::Numeric(a), Operand::Numeric(b)) => {
                let product = a.mul(&b).map_err(|_| nonlinear("multiplication", &a, &b))?;
                self.push_numeric("multiplication", product, &[&a, &b])?;
            }
            (Operand::Pair(x, y), Operand::Numeric(s)) | (Operand::Numeric(s), Operand::Pair(x, y)) => {
                self.scale_pair(x, y, s)?;
            }
            (Operand::Pair(x, y), Operand::Pair(..)) => {
                return Err(type_mismatch("multiplication", "numeric", &Cell::Pair(x, y)));
            }
        }
        Ok(())
    }

    /// Multiplies a pair by a scalar.
    ///
    /// Either the scalar or both components of the pair must be constant.
    fn scale_pair(&mut self, x: Polynomial, y: Polynomial, s: Polynomial) -> Result<(), Box<Error>> {
        let (rx, ry) = if let Some(c) = s.as_constant() {
            (x.scale(c), y.scale(c))
        } else if let (Some(cx), Some(cy)) = (x.as_constant(), y.as_constant()) {
            (s.scale(cx), s.scale(cy))
        } else {
            return Err(nonlinear("multiplication", &Cell::Pair(x, y), &s));
        };
        self.push_pair_zapped("multiplication", rx, ry, &[&x, &y, &s])
    }

    pub fn div(&mut self) -> Result<(), Box<Error>> {
        let divisor = self.pop_numeric("division")?;
        let c = match divisor.as_constant() {
            Some(c) => c,
            None => return Err(arithmetic(ArithmeticError::Nonlinear, "division")),
        };
        if c.is_zero() {
            return Err(arithmetic(ArithmeticError::DivisionByZero, "division"));
        }
        let precision = self.tolerance.precision;
        match self.pop_operand("division")? {
            Operand::Numeric(p) => {
                let q = p
                    .scale_div(c, precision)
                    .map_err(|err| arithmetic(err, "division"))?;
                self.push_numeric("division", q, &[&p])?;
            }
            Operand::Pair(x, y) => {
                let qx = x
                    .scale_div(c, precision)
                    .map_err(|err| arithmetic(err, "division"))?;
                let qy = y
                    .scale_div(c, precision)
                    .map_err(|err| arithmetic(err, "division"))?;
                self.push_pair_zapped("division", qx, qy, &[&x, &y])?;
            }
        }
        Ok(())
    }

    /// Replaces `t`, `a`, `b` (with `b` on top) by `a + t(b-a)`.
    pub fn interpolate(&mut self) -> Result<(), Box<Error>> {
        let b = self.pop_operand("interpolation")?;
        let a = self.pop_operand("interpolation")?;
        let t = self.pop_numeric("interpolation")?;
        let lerp = |a: &Polynomial, b: &Polynomial| -> Option<Polynomial> {
            let diff = b - a;
            let mut result = a.clone();
            if let Some(c) = t.as_constant() {
                result.add_scaled(&diff, c);
            } else if let Some(c) = diff.as_constant() {
                result.add_scaled(&t, c);
            } else {
                return None;
            }
            Some(result)
        };
        match (a, b) {
            (Operand::Numeric(a), Operand::Numeric(b)) => {
                let result = lerp(&a, &b).ok_or_else(|| nonlinear("interpolation", &t, &(&b - &a)))?;
                self.push_numeric("interpolation", result, &[&a, &b, &t])?;
            }
            (Operand::Pair(ax, ay), Operand::Pair(bx, by)) => {
                let x = lerp(&ax, &bx);
                let y = lerp(&ay, &by);
                let (Some(x), Some(y)) = (x, y) else {
                    let diff = Cell::Pair(&bx - &ax, &by - &ay);
                    return Err(nonlinear("interpolation", &t, &diff));
                };
                self.push_pair_zapped("interpolation", x, y, &[&ax, &ay, &bx, &by, &t])?;
            }
            (Operand::Numeric(a), Operand::Pair(..)) | (Operand::Pair(..), Operand::Numeric(a)) => {
                return Err(type_mismatch("interpolation", "pair", &Cell::numeric(a)));
            }
        }
        Ok(())
    }

    pub fn pair_part(&mut self, axis: Axis) -> Result<(), Box<Error>> {
        let (x, y) = self.pop_pair(axis.name())?;
        self.push(Cell::numeric(match axis {
            Axis::X => x,
            Axis::Y => y,
        }));
        Ok(())
    }

    /// Replaces `x`, `y` (with `y` on top) by the pair `(x,y)`.
    pub fn make_pair(&mut self) -> Result<(), Box<Error>> {
        let y = self.pop_numeric("pair construction")?;
        let x = self.pop_numeric("pair construction")?;
        self.push(Cell::Pair(x, y));
        Ok(())
    }

    /// Replaces a known pair by its length, or a known numeric by its absolute value.
    pub fn length(&mut self) -> Result<(), Box<Error>> {
        let precision = self.tolerance.precision;
        let cell = self.pop()?;
        let length = match &cell {
            Cell::Known(c) => Some(c.abs()),
            Cell::Pair(..) => match cell.as_known_pair() {
                Some(pair) => pair.length(precision),
                None => return Err(not_known("length", &cell)),
            },
            Cell::Numeric(_) => return Err(not_known("length", &cell)),
            Cell::Path(_) => return Err(type_mismatch("length", "pair", &cell)),
        };
        let length = length.ok_or_else(|| {
            Box::new(Error::new(
                Kind::Nonlinear,
                format!("the length of {cell} cannot be represented"),
            ))
        })?;
        let length = in_range("length", Polynomial::constant(length))?;
        self.push(Cell::numeric(length));
        Ok(())
    }

    /// Replaces `z`, `angle` (with the angle on top) by `z` rotated by the angle in degrees.
    pub fn rotated(&mut self) -> Result<(), Box<Error>> {
        let precision = self.tolerance.precision;
        let angle = self.pop_numeric("rotation")?;
        let Some(degrees) = angle.as_constant() else {
            return Err(not_known("rotation", &Cell::Numeric(angle)));
        };
        let (x, y) = self.pop_pair("rotation")?;
        let unit = Pair::new(Decimal::ONE, Decimal::ZERO).rotated(degrees, precision);
        let Some(Pair { x: cos, y: sin }) = unit else {
            return Err(Box::new(Error::new(
                Kind::Nonlinear,
                format!("cannot rotate by {degrees} degrees"),
            )));
        };
        let cell = Cell::Pair(x.clone(), y.clone());
        if let Some(pair) = cell.as_known_pair() {
            // rotating the known pair directly is more accurate
            if let Some(r) = pair.rotated(degrees, precision) {
                self.push(Cell::known_pair(r));
                return Ok(());
            }
        }
        let mut rx = x.scale(cos);
        rx.add_scaled(&y, -sin);
        let mut ry = x.scale(sin);
        ry.add_scaled(&y, cos);
        self.push_pair_zapped("rotation", rx, ry, &[&x, &y])
    }

    /// Rewrites every cell, e.g. after the solver learned new values.
    pub fn refresh<F: Fn(&Polynomial) -> Polynomial>(&mut self, f: F) {
        for cell in self.cells.iter_mut() {
            *cell = cell.map(&f);
        }
    }

    /// Whether any cell mentions the variable.
    pub fn mentions(&self, id: VarId) -> bool {
        self.cells.iter().any(|cell| cell.mentions(id))
    }
}

fn not_known(operation: &str, cell: &Cell) -> Box<Error> {
    Box::new(
        Error::new(
            Kind::Nonlinear,
            format!("{operation} needs a known operand"),
        )
        .with_note(format!("the operand was {cell}")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn x(i: u32) -> Polynomial {
        Polynomial::variable(VarId(i))
    }

    fn c(s: &str) -> Polynomial {
        Polynomial::constant(d(s))
    }

    fn stack(cells: Vec<Cell>) -> ExprStack {
        let mut stack = ExprStack::default();
        for cell in cells {
            stack.push(cell);
        }
        stack
    }

    fn num(p: Polynomial) -> Cell {
        Cell::numeric(p)
    }

    #[test]
    fn add_numerics() {
        let mut s = stack(vec![num(x(1)), num(&x(2) + &c("3"))]);
        s.add().unwrap();
        assert_eq!(s.cells(), &[num(&(&x(1) + &x(2)) + &c("3"))]);
    }

    #[test]
    fn subtraction_to_constant() {
        let mut s = stack(vec![num(&x(1) + &c("3")), num(x(1))]);
        s.sub().unwrap();
        assert_eq!(s.cells(), &[Cell::Known(d("3"))]);
    }

    #[test]
    fn add_pair_and_numeric_is_type_mismatch() {
        let mut s = stack(vec![Cell::Pair(x(1), x(2)), num(x(3))]);
        assert_eq!(s.add().unwrap_err().kind, Kind::TypeMismatch);
    }

    #[test]
    fn multiply_unknowns_is_nonlinear() {
        let mut s = stack(vec![num(x(1)), num(x(2))]);
        assert_eq!(s.mul().unwrap_err().kind, Kind::Nonlinear);
    }

    #[test]
    fn multiply_by_constant() {
        let mut s = stack(vec![Cell::Known(d("2")), num(&x(1) + &c("1"))]);
        s.mul().unwrap();
        assert_eq!(s.cells(), &[num(&x(1).scale(d("2")) + &c("2"))]);
    }

    #[test]
    fn known_pair_times_unknown_scalar() {
        let mut s = stack(vec![Cell::known_pair(Pair::new(d("1"), d("-2"))), num(x(1))]);
        s.mul().unwrap();
        assert_eq!(s.cells(), &[Cell::Pair(x(1), x(1).scale(d("-2")))]);
    }

    #[test]
    fn unknown_pair_times_unknown_scalar_is_nonlinear() {
        let mut s = stack(vec![Cell::Pair(x(1), c("0")), num(x(2))]);
        assert_eq!(s.mul().unwrap_err().kind, Kind::Nonlinear);
    }

    #[test]
    fn pair_times_pair_is_type_mismatch() {
        let mut s = stack(vec![
            Cell::known_pair(Pair::ORIGIN),
            Cell::known_pair(Pair::ORIGIN),
        ]);
        assert_eq!(s.mul().unwrap_err().kind, Kind::TypeMismatch);
    }

    #[test]
    fn divide() {
        let mut s = stack(vec![num(&x(1).scale(d("3")) + &c("1")), Cell::Known(d("3"))]);
        s.div().unwrap();
        assert_eq!(s.cells(), &[num(&x(1) + &c("0.3333333333"))]);
    }

    #[test]
    fn divide_by_zero() {
        let mut s = stack(vec![num(x(1)), Cell::Known(Decimal::ZERO)]);
        assert_eq!(s.div().unwrap_err().kind, Kind::DivByZero);
    }

    #[test]
    fn divide_by_unknown() {
        let mut s = stack(vec![Cell::Known(d("1")), num(x(1))]);
        assert_eq!(s.div().unwrap_err().kind, Kind::Nonlinear);
    }

    #[test]
    fn divide_by_pair() {
        let mut s = stack(vec![Cell::Known(d("1")), Cell::known_pair(Pair::ORIGIN)]);
        assert_eq!(s.div().unwrap_err().kind, Kind::TypeMismatch);
    }

    #[test]
    fn interpolate_known_pairs() {
        let mut s = stack(vec![
            Cell::Known(d("0.5")),
            Cell::known_pair(Pair::ORIGIN),
            Cell::known_pair(Pair::new(d("10"), d("0"))),
        ]);
        s.interpolate().unwrap();
        assert_eq!(
            s.cells(),
            &[Cell::known_pair(Pair::new(d("5"), d("0")))]
        );
    }

    #[test]
    fn interpolate_with_unknown_parameter() {
        // t[2,6] = 2 + 4t
        let mut s = stack(vec![num(x(1)), Cell::Known(d("2")), Cell::Known(d("6"))]);
        s.interpolate().unwrap();
        assert_eq!(s.cells(), &[num(&x(1).scale(d("4")) + &c("2"))]);
    }

    #[test]
    fn interpolate_unknown_everything_is_nonlinear() {
        let mut s = stack(vec![num(x(1)), num(x(2)), Cell::Known(d("6"))]);
        assert_eq!(s.interpolate().unwrap_err().kind, Kind::Nonlinear);
    }

    #[test]
    fn pair_parts() {
        let mut s = stack(vec![Cell::Pair(x(1), c("4"))]);
        s.pair_part(Axis::Y).unwrap();
        assert_eq!(s.cells(), &[Cell::Known(d("4"))]);
        assert_eq!(s.pair_part(Axis::X).unwrap_err().kind, Kind::TypeMismatch);
    }

    #[test]
    fn make_pair() {
        let mut s = stack(vec![num(x(1)), Cell::Known(d("2"))]);
        s.make_pair().unwrap();
        assert_eq!(s.cells(), &[Cell::Pair(x(1), c("2"))]);
    }

    #[test]
    fn length() {
        let mut s = stack(vec![Cell::known_pair(Pair::new(d("3"), d("4")))]);
        s.length().unwrap();
        assert_eq!(s.cells(), &[Cell::Known(d("5"))]);
        let mut s = stack(vec![Cell::Pair(x(1), c("4"))]);
        assert_eq!(s.length().unwrap_err().kind, Kind::Nonlinear);
    }

    #[test]
    fn rotate_unknown_pair_by_right_angle() {
        let mut s = stack(vec![Cell::Pair(x(1), x(2)), Cell::Known(d("90"))]);
        s.rotated().unwrap();
        assert_eq!(s.cells(), &[Cell::Pair(-x(2), x(1))]);
    }

    #[test]
    fn rotate_known_pair() {
        let mut s = stack(vec![
            Cell::known_pair(Pair::new(d("2"), d("0"))),
            Cell::Known(d("180")),
        ]);
        s.rotated().unwrap();
        assert_eq!(s.cells(), &[Cell::known_pair(Pair::new(d("-2"), d("0")))]);
    }

    #[test]
    fn results_are_zapped() {
        let mut s = stack(vec![
            num(&x(1) + &x(2).scale(d("1000"))),
            num(x(2).scale(d("-1000.0000000001"))),
        ]);
        s.add().unwrap();
        assert_eq!(s.cells(), &[num(x(1))]);
    }

    #[test]
    fn refresh_and_mentions() {
        let mut s = stack(vec![num(&x(1) + &x(2))]);
        assert!(s.mentions(VarId(2)));
        s.refresh(|p| p.substitute(VarId(2), &c("3")).unwrap());
        assert!(!s.mentions(VarId(2)));
        assert_eq!(s.cells(), &[num(&x(1) + &c("3"))]);
    }

    #[test]
    fn overflow_is_reported() {
        let mut s = stack(vec![num(c("1e1000")), num(c("1e1000"))]);
        let err = s.mul().unwrap_err();
        assert_eq!(err.kind, Kind::Overflow);
        assert_eq!(err.title, "multiplication overflowed");
        assert!(s.is_empty());

        let mut s = stack(vec![num(x(1).scale(d("1e1000"))), num(c("1e-900"))]);
        assert_eq!(s.div().unwrap_err().kind, Kind::Overflow);

        let mut s = stack(vec![Cell::Pair(c("1e1000"), x(2)), num(c("20"))]);
        assert_eq!(s.mul().unwrap_err().kind, Kind::Overflow);

        let mut s = ExprStack::default();
        let err = s.push_pair(c("1"), Polynomial::constant(Decimal::MAX)).unwrap_err();
        assert_eq!(err.kind, Kind::Overflow);
        assert_eq!(s.push_constant(-Decimal::MAX).unwrap_err().kind, Kind::Overflow);
        s.push_pair(c("1"), x(3)).unwrap();
        assert_eq!(s.pop().unwrap(), Cell::Pair(c("1"), x(3)));

        let mut s = stack(vec![num(c("1e1000")), num(c("1e999"))]);
        s.add().unwrap();
        assert_eq!(s.pop().unwrap(), Cell::Known(d("1.1e1000")));
    }

    #[test]
    fn underflow_is_a_bug() {
        let mut s = ExprStack::default();
        assert_eq!(s.add().unwrap_err().kind, Kind::EngineBug);
    }
}

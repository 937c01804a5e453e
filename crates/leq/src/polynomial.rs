//! Linear polynomials over [Decimal] coefficients.

use crate::solver::VariableResolver;
use gallery_core::{Decimal, DivisionByZero, DEFAULT_PRECISION};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a numeric unknown.
///
/// Identifiers are allocated by the owner of the variables and are never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct VarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Rounding parameters shared by all polynomial arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tolerance {
    /// Number of significant digits kept by division.
    pub precision: u32,
    /// Relative magnitude below which coefficients are treated as zero.
    pub epsilon: Decimal,
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance {
            precision: DEFAULT_PRECISION,
            epsilon: Decimal::new(1, -9),
        }
    }
}

impl Tolerance {
    /// Absolute zap threshold for values computed from operands of the given magnitude.
    ///
    /// This is `epsilon * max(1, scale)`.
    pub fn threshold(&self, scale: Decimal) -> Decimal {
        let scale = scale.abs();
        if scale > Decimal::ONE {
            self.epsilon.abs() * scale
        } else {
            self.epsilon.abs()
        }
    }
}

/// Error returned by polynomial arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticError {
    DivisionByZero,
    /// The result would contain a product of unknowns.
    Nonlinear,
}

impl From<DivisionByZero> for ArithmeticError {
    fn from(_: DivisionByZero) -> Self {
        ArithmeticError::DivisionByZero
    }
}

impl fmt::Display for ArithmeticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithmeticError::DivisionByZero => write!(f, "division by zero"),
            ArithmeticError::Nonlinear => write!(f, "the result is not linear"),
        }
    }
}

impl std::error::Error for ArithmeticError {}

/// A polynomial `c + a_1*x_1 + ... + a_n*x_n`.
///
/// Terms with a zero coefficient are never stored.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Polynomial {
    terms: BTreeMap<VarId, Decimal>,
    constant: Decimal,
}

impl Polynomial {
    pub fn constant(c: Decimal) -> Polynomial {
        Polynomial {
            terms: BTreeMap::new(),
            constant: c,
        }
    }

    pub fn term(id: VarId, coefficient: Decimal) -> Polynomial {
        let mut p = Polynomial::default();
        p.set_coefficient(id, coefficient);
        p
    }

    /// The polynomial `1*id`.
    pub fn variable(id: VarId) -> Polynomial {
        Polynomial::term(id, Decimal::ONE)
    }

    pub fn coefficient(&self, id: VarId) -> Decimal {
        self.terms.get(&id).copied().unwrap_or_default()
    }

    pub fn set_coefficient(&mut self, id: VarId, coefficient: Decimal) {
        if coefficient.is_zero() {
            self.terms.remove(&id);
        } else {
            self.terms.insert(id, coefficient);
        }
    }

    pub fn constant_term(&self) -> Decimal {
        self.constant
    }

    pub fn set_constant(&mut self, c: Decimal) {
        self.constant = c;
    }

    /// Iterates over the terms in increasing variable order.
    pub fn terms(&self) -> impl Iterator<Item = (VarId, Decimal)> + '_ {
        self.terms.iter().map(|(id, c)| (*id, *c))
    }

    pub fn variables(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms.keys().copied()
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn contains(&self, id: VarId) -> bool {
        self.terms.contains_key(&id)
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty() && self.constant.is_zero()
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns the value of a polynomial with no terms.
    pub fn as_constant(&self) -> Option<Decimal> {
        if self.terms.is_empty() {
            Some(self.constant)
        } else {
            None
        }
    }

    /// Largest absolute value among the coefficients and the constant.
    pub fn largest_magnitude(&self) -> Decimal {
        self.terms
            .values()
            .map(|c| c.abs())
            .fold(self.constant.abs(), Decimal::max)
    }

    /// Whether a coefficient or the constant left the representable range.
    pub fn is_saturated(&self) -> bool {
        self.constant.is_saturated() || self.terms.values().any(Decimal::is_saturated)
    }

    /// Adds `c * other` to this polynomial.
    pub fn add_scaled(&mut self, other: &Polynomial, c: Decimal) {
        if c.is_zero() {
            return;
        }
        for (id, a) in other.terms() {
            let sum = self.coefficient(id) + a * c;
            self.set_coefficient(id, sum);
        }
        self.constant += other.constant * c;
    }

    pub fn scale(&self, c: Decimal) -> Polynomial {
        let mut p = Polynomial::default();
        p.add_scaled(self, c);
        p
    }

    /// Divides every coefficient and the constant by `c`.
    pub fn scale_div(&self, c: Decimal, precision: u32) -> Result<Polynomial, ArithmeticError> {
        let mut p = Polynomial::constant(self.constant.div(c, precision)?);
        for (id, a) in self.terms() {
            p.set_coefficient(id, a.div(c, precision)?);
        }
        Ok(p)
    }

    /// Multiplies two polynomials, at least one of which must be constant.
    pub fn mul(&self, other: &Polynomial) -> Result<Polynomial, ArithmeticError> {
        match (self.as_constant(), other.as_constant()) {
            (Some(c), _) => Ok(other.scale(c)),
            (_, Some(c)) => Ok(self.scale(c)),
            (None, None) => Err(ArithmeticError::Nonlinear),
        }
    }

    /// Divides by a constant polynomial.
    pub fn div(&self, other: &Polynomial, precision: u32) -> Result<Polynomial, ArithmeticError> {
        match other.as_constant() {
            Some(c) => self.scale_div(c, precision),
            None => Err(ArithmeticError::Nonlinear),
        }
    }

    /// Replaces every occurrence of `id` by `expr`.
    ///
    /// Fails if `expr` itself mentions `id`; the result of such a substitution would
    ///     still depend on the variable being eliminated.
    pub fn substitute(&self, id: VarId, expr: &Polynomial) -> Result<Polynomial, ArithmeticError> {
        let a = self.coefficient(id);
        if a.is_zero() {
            return Ok(self.clone());
        }
        if expr.contains(id) {
            return Err(ArithmeticError::Nonlinear);
        }
        let mut p = self.clone();
        p.terms.remove(&id);
        p.add_scaled(expr, a);
        Ok(p)
    }

    /// Drops every coefficient (and the constant) whose magnitude is at most
    ///     `epsilon * max(1, largest magnitude)`.
    pub fn zap(&self, epsilon: Decimal) -> Polynomial {
        self.zap_relative(epsilon, Decimal::ZERO).0
    }

    /// Like [Polynomial::zap], but the threshold also takes into account the magnitude `scale`
    ///     of the operands this polynomial was computed from.
    ///
    /// Returns the zapped polynomial and the largest magnitude that was dropped, if any.
    pub fn zap_relative(&self, epsilon: Decimal, scale: Decimal) -> (Polynomial, Option<Decimal>) {
        let tolerance = Tolerance {
            epsilon,
            ..Default::default()
        };
        let threshold = tolerance.threshold(scale.abs().max(self.largest_magnitude()));
        let mut dropped: Option<Decimal> = None;
        let mut record = |c: Decimal| {
            if !c.is_zero() {
                dropped = Some(dropped.map_or(c.abs(), |d| d.max(c.abs())));
            }
        };
        let mut p = Polynomial::default();
        for (id, c) in self.terms() {
            if c.is_near_zero(threshold) {
                record(c);
            } else {
                p.terms.insert(id, c);
            }
        }
        if self.constant.is_near_zero(threshold) {
            record(self.constant);
        } else {
            p.constant = self.constant;
        }
        (p, dropped)
    }

    /// Returns the term with the largest absolute coefficient among the variables not excluded.
    ///
    /// Ties are broken in favour of the smallest identifier.
    pub fn max_coefficient<F: Fn(VarId) -> bool>(&self, exclude: F) -> Option<(VarId, Decimal)> {
        let mut best: Option<(VarId, Decimal)> = None;
        for (id, c) in self.terms() {
            if exclude(id) {
                continue;
            }
            match best {
                Some((_, b)) if c.abs() <= b.abs() => {}
                _ => best = Some((id, c)),
            }
        }
        best
    }

    /// Evaluates the polynomial, given values for its variables.
    ///
    /// Returns [None] if some variable has no value.
    pub fn evaluate<F: Fn(VarId) -> Option<Decimal>>(&self, value: F) -> Option<Decimal> {
        let mut sum = self.constant;
        for (id, c) in self.terms() {
            sum += c * value(id)?;
        }
        Some(sum)
    }

    /// Returns a value that prints this polynomial using the resolver's variable names.
    pub fn display<'a>(&'a self, names: &'a dyn VariableResolver) -> Display<'a> {
        Display {
            polynomial: self,
            names: Some(names),
        }
    }
}

/// Printable form of a [Polynomial], in the style `0.5b-c+3`.
pub struct Display<'a> {
    polynomial: &'a Polynomial,
    names: Option<&'a dyn VariableResolver>,
}

impl<'a> fmt::Display for Display<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.polynomial;
        let mut first = true;
        for (id, c) in p.terms() {
            let name = match self.names {
                None => id.to_string(),
                Some(names) => names.variable_name(id),
            };
            if c == Decimal::ONE {
                write!(f, "{}{name}", if first { "" } else { "+" })?;
            } else if c == Decimal::MINUS_ONE {
                write!(f, "-{name}")?;
            } else if c.is_negative() || first {
                write!(f, "{c}{name}")?;
            } else {
                write!(f, "+{c}{name}")?;
            }
            first = false;
        }
        if first {
            write!(f, "{}", p.constant)
        } else if p.constant.is_zero() {
            Ok(())
        } else if p.constant.is_negative() {
            write!(f, "{}", p.constant)
        } else {
            write!(f, "+{}", p.constant)
        }
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let printed = Display {
            polynomial: self,
            names: None,
        };
        fmt::Display::fmt(&printed, f)
    }
}

impl std::ops::Add<&Polynomial> for &Polynomial {
    type Output = Polynomial;
    fn add(self, rhs: &Polynomial) -> Self::Output {
        let mut p = self.clone();
        p.add_scaled(rhs, Decimal::ONE);
        p
    }
}

impl std::ops::Sub<&Polynomial> for &Polynomial {
    type Output = Polynomial;
    fn sub(self, rhs: &Polynomial) -> Self::Output {
        let mut p = self.clone();
        p.add_scaled(rhs, Decimal::MINUS_ONE);
        p
    }
}

impl std::ops::Add<Polynomial> for Polynomial {
    type Output = Polynomial;
    fn add(self, rhs: Polynomial) -> Self::Output {
        &self + &rhs
    }
}

impl std::ops::Sub<Polynomial> for Polynomial {
    type Output = Polynomial;
    fn sub(self, rhs: Polynomial) -> Self::Output {
        &self - &rhs
    }
}

impl std::ops::Neg for &Polynomial {
    type Output = Polynomial;
    fn neg(self) -> Self::Output {
        self.scale(Decimal::MINUS_ONE)
    }
}

impl std::ops::Neg for Polynomial {
    type Output = Polynomial;
    fn neg(self) -> Self::Output {
        -&self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn p(constant: &str, terms: &[(u32, &str)]) -> Polynomial {
        let mut p = Polynomial::constant(d(constant));
        for (id, c) in terms {
            p.set_coefficient(VarId(*id), d(c));
        }
        p
    }

    #[test]
    fn add_and_sub_cancel_terms() {
        let a = p("1", &[(1, "2"), (2, "-3")]);
        let b = p("-1", &[(1, "-2"), (3, "1")]);
        assert_eq!(&a + &b, p("0", &[(2, "-3"), (3, "1")]));
        assert_eq!(&a - &a, Polynomial::default());
        assert!((&a - &a).is_zero());
    }

    #[test]
    fn neg_and_scale() {
        let a = p("1.5", &[(4, "2")]);
        assert_eq!(-&a, p("-1.5", &[(4, "-2")]));
        assert_eq!(a.scale(d("0")), Polynomial::default());
        assert_eq!(a.scale(d("0.5")), p("0.75", &[(4, "1")]));
    }

    #[test]
    fn scale_div() {
        let a = p("1", &[(1, "2")]);
        assert_eq!(a.scale_div(d("3"), 10).unwrap(), p("0.3333333333", &[(1, "0.6666666667")]));
        assert_eq!(a.scale_div(d("0"), 10), Err(ArithmeticError::DivisionByZero));
    }

    #[test]
    fn mul_requires_a_constant() {
        let x = Polynomial::variable(VarId(1));
        let two = Polynomial::constant(d("2"));
        assert_eq!(x.mul(&two).unwrap(), p("0", &[(1, "2")]));
        assert_eq!(two.mul(&x).unwrap(), p("0", &[(1, "2")]));
        assert_eq!(x.mul(&x), Err(ArithmeticError::Nonlinear));
        assert_eq!(two.div(&x, 10), Err(ArithmeticError::Nonlinear));
    }

    #[test]
    fn substitute() {
        // 2x1 + x2 + 1 with x1 = 3x3 - 1
        let a = p("1", &[(1, "2"), (2, "1")]);
        let x1 = p("-1", &[(3, "3")]);
        assert_eq!(a.substitute(VarId(1), &x1).unwrap(), p("-1", &[(2, "1"), (3, "6")]));
        assert_eq!(a.substitute(VarId(7), &x1).unwrap(), a);
        let cyclic = p("0", &[(1, "0.5")]);
        assert_eq!(a.substitute(VarId(1), &cyclic), Err(ArithmeticError::Nonlinear));
    }

    #[test]
    fn zap_is_relative() {
        let eps = d("1e-9");
        assert_eq!(p("1e-10", &[(1, "1")]).zap(eps), p("0", &[(1, "1")]));
        assert_eq!(p("1e-10", &[(1, "1e-10")]).zap(eps), Polynomial::default());
        // large coefficients raise the threshold
        assert_eq!(p("1e-7", &[(1, "1000")]).zap(eps), p("0", &[(1, "1000")]));
        assert_eq!(p("1e-5", &[(1, "1000")]).zap(eps), p("1e-5", &[(1, "1000")]));
    }

    #[test]
    fn zap_relative_reports_dropped() {
        let (q, dropped) = p("2e-7", &[(1, "1")]).zap_relative(d("1e-9"), d("1000"));
        assert_eq!(q, p("0", &[(1, "1")]));
        assert_eq!(dropped, Some(d("2e-7")));
        let (_, dropped) = p("5", &[(1, "1")]).zap_relative(d("1e-9"), d("1"));
        assert_eq!(dropped, None);
    }

    #[test]
    fn zap_threshold_is_inclusive() {
        let eps = d("1e-9");
        // threshold is eps * 1000
        let q = p("1e-6", &[(1, "1000"), (2, "-1e-6"), (3, "1.000001e-6")]);
        assert_eq!(q.zap(eps), p("0", &[(1, "1000"), (3, "1.000001e-6")]));
        // below one the threshold is eps itself
        let q = p("0", &[(1, "0.5"), (2, "1e-9"), (3, "-1.1e-9")]);
        assert_eq!(q.zap(eps), p("0", &[(1, "0.5"), (3, "-1.1e-9")]));
        // an explicit scale is taken by magnitude
        let (q, dropped) = p("2e-6", &[(1, "1"), (2, "2.1e-6")]).zap_relative(eps, d("-2000"));
        assert_eq!(q, p("0", &[(1, "1"), (2, "2.1e-6")]));
        assert_eq!(dropped, Some(d("2e-6")));
    }

    #[test]
    fn zap_is_idempotent() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(19);
        for _ in 0..500 {
            let mut q = Polynomial::constant(Decimal::new(
                rng.gen_range(-999..=999),
                rng.gen_range(-15..=5),
            ));
            for id in 0..rng.gen_range(0..8) {
                let c = Decimal::new(rng.gen_range(-999..=999), rng.gen_range(-15..=5));
                q.set_coefficient(VarId(id), c);
            }
            let eps = Decimal::new(1, -rng.gen_range(3..=9));
            let scale = Decimal::new(rng.gen_range(0..=999), rng.gen_range(-3..=3));
            let threshold = Tolerance {
                epsilon: eps,
                ..Default::default()
            }
            .threshold(scale.max(q.largest_magnitude()));

            let (once, _) = q.zap_relative(eps, scale);
            let (twice, dropped) = once.zap_relative(eps, scale);
            assert_eq!(twice, once, "{q} with epsilon {eps} and scale {scale}");
            assert_eq!(dropped, None);
            assert_eq!(once.zap(eps).zap(eps), once.zap(eps));

            for (id, c) in q.terms() {
                assert_eq!(once.coefficient(id).is_zero(), c.abs() <= threshold);
            }
            assert_eq!(
                once.constant_term().is_zero(),
                q.constant_term().abs() <= threshold
            );
        }
    }

    #[test]
    fn max_coefficient_breaks_ties_by_id() {
        let a = p("100", &[(5, "-3"), (2, "3"), (9, "1")]);
        assert_eq!(a.max_coefficient(|_| false), Some((VarId(2), d("3"))));
        assert_eq!(a.max_coefficient(|id| id == VarId(2)), Some((VarId(5), d("-3"))));
        assert_eq!(Polynomial::constant(d("1")).max_coefficient(|_| false), None);
    }

    #[test]
    fn evaluate() {
        let a = p("1", &[(1, "2"), (2, "-1")]);
        let values = |id: VarId| match id.0 {
            1 => Some(d("3")),
            2 => Some(d("0.5")),
            _ => None,
        };
        assert_eq!(a.evaluate(values), Some(d("6.5")));
        assert_eq!(p("0", &[(3, "1")]).evaluate(values), None);
    }

    #[test]
    fn display() {
        assert_eq!(p("0", &[]).to_string(), "0");
        assert_eq!(p("-2", &[]).to_string(), "-2");
        assert_eq!(p("3", &[(1, "0.5")]).to_string(), "0.5x1+3");
        assert_eq!(p("-3", &[(1, "-1"), (2, "1"), (3, "-2.5")]).to_string(), "-x1+x2-2.5x3-3");
        assert_eq!(p("0", &[(1, "1"), (2, "2")]).to_string(), "x1+2x2");
    }
}

/*!
Core numeric types used in Gallery.

The linear equation engine never works with floating point numbers.
Every coefficient is a [Decimal]: an `i128` coefficient together with a power-of-ten exponent.
Addition, subtraction and multiplication are exact
    (unless the result no longer fits in 38 digits, in which case the least significant digits are rounded away).
Division is exact when the divisor is a power of ten and otherwise
    rounds the result to a configurable number of significant digits.

This crate also contains the [Pair] value type and the dimension [Unit]s.
*/

use std::cmp::Ordering;
use std::fmt;
use std::num::NonZeroI64;
use std::str::FromStr;

/// Number of significant digits that division keeps by default.
pub const DEFAULT_PRECISION: u32 = 10;

/// Largest supported division precision.
///
/// Precisions larger than this are clamped.
pub const MAX_PRECISION: u32 = 15;

/// Number of decimal digits that always fit in an `i128`.
const MAX_DIGITS: u32 = 38;

/// Bound on the exponent of every [Decimal].
///
/// Results whose exponent would be larger saturate at [Decimal::MAX] (or its negative);
///     results whose exponent would be smaller are rounded to a multiple of `10^-MAX_EXPONENT`.
/// Literals outside of the range fail to parse.
pub const MAX_EXPONENT: i32 = 1000;

const MAX_COEFFICIENT: i128 = 99_999_999_999_999_999_999_999_999_999_999_999_999;

/// Error returned when dividing by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivisionByZero;

impl fmt::Display for DivisionByZero {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "division by zero")
    }
}

impl std::error::Error for DivisionByZero {}

/// Error returned when a string is not a valid decimal number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDecimalError {
    pub input: String,
}

impl fmt::Display for ParseDecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is not a decimal number", self.input)
    }
}

impl std::error::Error for ParseDecimalError {}

/// An exact decimal number.
///
/// The value is `coefficient * 10^exponent`.
/// Values are kept normalized (no trailing zeros in the coefficient, and zero has exponent zero)
///     so that the derived equality and hashing are semantic.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "String", try_from = "String"))]
pub struct Decimal {
    coefficient: i128,
    exponent: i32,
}

fn pow10(n: u32) -> Option<i128> {
    10_i128.checked_pow(n)
}

fn num_digits(c: i128) -> u32 {
    if c == 0 {
        1
    } else {
        c.unsigned_abs().ilog10() + 1
    }
}

/// Integer division rounding half away from zero. Requires `d > 0`.
fn div_round(n: i128, d: i128) -> i128 {
    let q = n / d;
    let r = (n % d).abs();
    if r >= d - r {
        q + n.signum()
    } else {
        q
    }
}

impl Decimal {
    pub const ZERO: Decimal = Decimal {
        coefficient: 0,
        exponent: 0,
    };
    pub const ONE: Decimal = Decimal {
        coefficient: 1,
        exponent: 0,
    };
    pub const MINUS_ONE: Decimal = Decimal {
        coefficient: -1,
        exponent: 0,
    };
    /// The largest value; overflowing results saturate here.
    pub const MAX: Decimal = Decimal {
        coefficient: MAX_COEFFICIENT,
        exponent: MAX_EXPONENT,
    };

    /// Creates the decimal `coefficient * 10^exponent`.
    pub fn new(coefficient: i128, exponent: i32) -> Decimal {
        Decimal::bounded(coefficient, exponent as i64)
    }

    /// Normalizes `coefficient * 10^exponent` and brings the exponent into range.
    fn bounded(mut coefficient: i128, mut exponent: i64) -> Decimal {
        if coefficient == 0 {
            return Decimal::ZERO;
        }
        if coefficient == i128::MIN {
            coefficient = div_round(coefficient, 10);
            exponent += 1;
        }
        while coefficient % 10 == 0 {
            coefficient /= 10;
            exponent += 1;
        }
        let min = -(MAX_EXPONENT as i64);
        if exponent < min {
            let shift = min - exponent;
            coefficient = match u32::try_from(shift).ok().and_then(pow10) {
                Some(p) => div_round(coefficient, p),
                None => 0,
            };
            return Decimal::bounded(coefficient, min);
        }
        if exponent > MAX_EXPONENT as i64 {
            return if coefficient < 0 {
                -Decimal::MAX
            } else {
                Decimal::MAX
            };
        }
        Decimal {
            coefficient,
            exponent: exponent as i32,
        }
    }

    /// Whether this value is the result of an overflow.
    pub fn is_saturated(&self) -> bool {
        self.exponent == MAX_EXPONENT && self.coefficient.abs() == MAX_COEFFICIENT
    }

    pub fn from_integer(i: i64) -> Decimal {
        Decimal::new(i as i128, 0)
    }

    pub fn coefficient(&self) -> i128 {
        self.coefficient
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    pub fn is_zero(&self) -> bool {
        self.coefficient == 0
    }

    pub fn is_negative(&self) -> bool {
        self.coefficient < 0
    }

    pub fn signum(&self) -> i32 {
        self.coefficient.signum() as i32
    }

    pub fn abs(self) -> Decimal {
        if self.coefficient < 0 {
            -self
        } else {
            self
        }
    }

    /// Number of significant digits in the coefficient.
    pub fn significant_digits(&self) -> u32 {
        num_digits(self.coefficient)
    }

    /// Position of the leading digit: `10^(magnitude-1) <= |self| < 10^magnitude`.
    fn magnitude(&self) -> i64 {
        self.exponent as i64 + num_digits(self.coefficient) as i64
    }

    /// The coefficient this number has when written with the given (smaller or equal) exponent.
    fn coefficient_at(&self, exponent: i32) -> Option<i128> {
        if self.is_zero() {
            return Some(0);
        }
        let shift = u32::try_from(self.exponent as i64 - exponent as i64).ok()?;
        self.coefficient.checked_mul(pow10(shift)?)
    }

    /// Rounds (half away from zero) to a multiple of `10^exponent`.
    pub fn round_to_exponent(self, exponent: i32) -> Decimal {
        if exponent <= self.exponent {
            return self;
        }
        let shift = (exponent as i64 - self.exponent as i64) as u64;
        if shift > MAX_DIGITS as u64 {
            return Decimal::ZERO;
        }
        match pow10(shift as u32) {
            Some(p) => Decimal::new(div_round(self.coefficient, p), exponent),
            None => Decimal::ZERO,
        }
    }

    /// Rounds to at most the given number of significant digits.
    pub fn round_to_significant(self, digits: u32) -> Decimal {
        let digits = digits.max(1);
        let n = num_digits(self.coefficient);
        if n <= digits {
            return self;
        }
        self.round_to_exponent(self.exponent + (n - digits) as i32)
    }

    /// Divides, rounding the quotient to `precision` significant digits.
    ///
    /// The result is exact when the divisor is a power of ten.
    pub fn div(self, rhs: Decimal, precision: u32) -> Result<Decimal, DivisionByZero> {
        if rhs.is_zero() {
            return Err(DivisionByZero);
        }
        Ok(self.div_nonzero(rhs, precision))
    }

    /// Divides by a non-zero integer, rounding the quotient to `precision` significant digits.
    pub fn div_integer(self, rhs: NonZeroI64, precision: u32) -> Decimal {
        self.div_nonzero(Decimal::from_integer(rhs.get()), precision)
    }

    /// Requires a non-zero divisor.
    fn div_nonzero(self, rhs: Decimal, precision: u32) -> Decimal {
        if self.is_zero() {
            return Decimal::ZERO;
        }
        if rhs.coefficient.abs() == 1 {
            return Decimal::bounded(
                self.coefficient * rhs.coefficient,
                self.exponent as i64 - rhs.exponent as i64,
            );
        }
        let precision = precision.clamp(1, MAX_PRECISION);
        let (a, ea) = self.significant_parts(precision + 3);
        let (b, eb) = rhs.significant_parts(precision + 3);
        let (da, db) = (num_digits(a), num_digits(b));
        // shift the dividend so that the integer quotient has at least precision+2 digits
        let k = (precision + 2 + db).saturating_sub(da);
        // at most 2*MAX_PRECISION+6 digits
        let n = a * 10_i128.pow(k);
        let (n, d) = if b < 0 { (-n, -b) } else { (n, b) };
        let q = div_round(n, d);
        Decimal::bounded(q, ea - eb - k as i64).round_to_significant(precision)
    }

    /// Whether `|self| <= |epsilon|`.
    pub fn is_near_zero(&self, epsilon: Decimal) -> bool {
        self.abs() <= epsilon.abs()
    }

    /// Returns zero if the number is within epsilon of zero, and the number otherwise.
    pub fn zap(self, epsilon: Decimal) -> Decimal {
        if self.is_near_zero(epsilon) {
            Decimal::ZERO
        } else {
            self
        }
    }

    pub fn to_f64(&self) -> f64 {
        if self.exponent < 0 {
            self.coefficient as f64 / 10_f64.powi(-self.exponent)
        } else {
            self.coefficient as f64 * 10_f64.powi(self.exponent)
        }
    }

    /// Converts a float, keeping `digits` significant digits.
    ///
    /// Returns [None] if the float is infinite or NaN.
    pub fn from_f64(x: f64, digits: u32) -> Option<Decimal> {
        if !x.is_finite() {
            return None;
        }
        let digits = digits.clamp(1, MAX_PRECISION) as usize;
        format!("{:.*e}", digits - 1, x).parse().ok()
    }

    fn add_impl(self, rhs: Decimal) -> Decimal {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }
        let finest = self.exponent.min(rhs.exponent) as i64;
        let largest = self.magnitude().max(rhs.magnitude());
        let mut target = finest.max(largest - MAX_DIGITS as i64) as i32;
        loop {
            if target > MAX_EXPONENT {
                // both operands have the same sign if the sum does not fit
                return if self.is_negative() {
                    -Decimal::MAX
                } else {
                    Decimal::MAX
                };
            }
            let a = self.round_to_exponent(target).coefficient_at(target);
            let b = rhs.round_to_exponent(target).coefficient_at(target);
            if let (Some(a), Some(b)) = (a, b) {
                if let Some(sum) = a.checked_add(b) {
                    return Decimal::new(sum, target);
                }
            }
            target += 1;
        }
    }

    fn mul_impl(self, rhs: Decimal) -> Decimal {
        match self.coefficient.checked_mul(rhs.coefficient) {
            Some(c) => Decimal::bounded(c, self.exponent as i64 + rhs.exponent as i64),
            None => {
                let (a, ea) = self.significant_parts(19);
                let (b, eb) = rhs.significant_parts(19);
                // at most 10^19 * 10^19
                Decimal::bounded(a * b, ea + eb)
            }
        }
    }

    /// Coefficient and exponent rounded to the given number of significant digits.
    ///
    /// Unlike [Decimal::round_to_significant] the result is not range checked,
    ///     so a saturated value still shrinks to the requested width.
    fn significant_parts(&self, digits: u32) -> (i128, i64) {
        let n = num_digits(self.coefficient);
        if n <= digits {
            return (self.coefficient, self.exponent as i64);
        }
        let shift = n - digits;
        match pow10(shift) {
            Some(p) => (div_round(self.coefficient, p), self.exponent as i64 + shift as i64),
            None => (0, 0),
        }
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal::from_integer(value)
    }
}

impl From<i32> for Decimal {
    fn from(value: i32) -> Self {
        Decimal::from_integer(value as i64)
    }
}

impl std::ops::Add<Decimal> for Decimal {
    type Output = Decimal;
    fn add(self, rhs: Decimal) -> Self::Output {
        self.add_impl(rhs)
    }
}

impl std::ops::AddAssign<Decimal> for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        *self = self.add_impl(rhs);
    }
}

impl std::ops::Sub<Decimal> for Decimal {
    type Output = Decimal;
    fn sub(self, rhs: Decimal) -> Self::Output {
        self.add_impl(-rhs)
    }
}

impl std::ops::SubAssign<Decimal> for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        *self = self.add_impl(-rhs);
    }
}

impl std::ops::Mul<Decimal> for Decimal {
    type Output = Decimal;
    fn mul(self, rhs: Decimal) -> Self::Output {
        self.mul_impl(rhs)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;
    fn neg(self) -> Self::Output {
        Decimal {
            coefficient: -self.coefficient,
            exponent: self.exponent,
        }
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let (sa, sb) = (self.coefficient.signum(), other.coefficient.signum());
        if sa != sb || sa == 0 {
            return sa.cmp(&sb);
        }
        let magnitude = match self.magnitude().cmp(&other.magnitude()) {
            Ordering::Equal => {
                let e = self.exponent.min(other.exponent);
                match (self.coefficient_at(e), other.coefficient_at(e)) {
                    (Some(a), Some(b)) => a.abs().cmp(&b.abs()),
                    _ => {
                        let a = self.round_to_significant(30);
                        let b = other.round_to_significant(30);
                        return a.cmp(&b);
                    }
                }
            }
            ordering => ordering,
        };
        if sa > 0 {
            magnitude
        } else {
            magnitude.reverse()
        }
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    /// Parses numbers like `12`, `-0.125`, `.5` and `3e-4`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDecimalError {
            input: s.to_string(),
        };
        let (mantissa, exponent) = match s.find(['e', 'E']) {
            Some(i) => (&s[..i], s[i + 1..].parse::<i32>().map_err(|_| err())?),
            None => (s, 0),
        };
        let (negative, digits) = match mantissa.as_bytes().first() {
            Some(b'-') => (true, &mantissa[1..]),
            Some(b'+') => (false, &mantissa[1..]),
            _ => (false, mantissa),
        };
        let mut coefficient: i128 = 0;
        let mut exponent = exponent as i64;
        let mut seen_point = false;
        let mut seen_digit = false;
        for c in digits.chars() {
            match c {
                '.' if !seen_point => seen_point = true,
                '0'..='9' => {
                    seen_digit = true;
                    let d = c as i128 - '0' as i128;
                    match coefficient.checked_mul(10).and_then(|c| c.checked_add(d)) {
                        Some(c) => {
                            coefficient = c;
                            if seen_point {
                                exponent -= 1;
                            }
                        }
                        // extra digits are truncated
                        None => {
                            if !seen_point {
                                exponent += 1;
                            }
                        }
                    }
                }
                _ => return Err(err()),
            }
        }
        if !seen_digit {
            return Err(err());
        }
        if negative {
            coefficient = -coefficient;
        }
        if coefficient == 0 {
            return Ok(Decimal::ZERO);
        }
        while coefficient % 10 == 0 {
            coefficient /= 10;
            exponent += 1;
        }
        let leading = exponent + num_digits(coefficient) as i64 - 1;
        if leading > MAX_EXPONENT as i64 || exponent < -(MAX_EXPONENT as i64) {
            return Err(err());
        }
        Ok(Decimal::bounded(coefficient, exponent))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exponent >= 0 {
            write!(f, "{}", self.coefficient)?;
            for _ in 0..self.exponent {
                write!(f, "0")?;
            }
            return Ok(());
        }
        if self.coefficient < 0 {
            write!(f, "-")?;
        }
        let digits = self.coefficient.unsigned_abs().to_string();
        let point = digits.len() as i64 + self.exponent as i64;
        if point <= 0 {
            write!(f, "0.")?;
            for _ in 0..-point {
                write!(f, "0")?;
            }
            write!(f, "{digits}")
        } else {
            let (integral, fractional) = digits.split_at(point as usize);
            write!(f, "{integral}.{fractional}")
        }
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl From<Decimal> for String {
    fn from(value: Decimal) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Decimal {
    type Error = ParseDecimalError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A known pair of decimals.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pair {
    pub x: Decimal,
    pub y: Decimal,
}

impl Pair {
    pub const ORIGIN: Pair = Pair {
        x: Decimal::ZERO,
        y: Decimal::ZERO,
    };

    pub fn new(x: Decimal, y: Decimal) -> Pair {
        Pair { x, y }
    }

    pub fn scale(self, c: Decimal) -> Pair {
        Pair {
            x: self.x * c,
            y: self.y * c,
        }
    }

    /// Euclidean length, rounded to the given number of significant digits.
    pub fn length(&self, precision: u32) -> Option<Decimal> {
        if self.x.is_zero() || self.y.is_zero() {
            return Some(self.x.abs() + self.y.abs());
        }
        Decimal::from_f64(self.x.to_f64().hypot(self.y.to_f64()), precision)
    }

    /// Rotates counter-clockwise by the given angle in degrees.
    ///
    /// Multiples of 90 degrees are exact.
    /// Otherwise the components are rounded to `precision` digits relative to the pair's length.
    pub fn rotated(&self, degrees: Decimal, precision: u32) -> Option<Pair> {
        let quarter = Decimal::from_integer(90);
        if let Ok(turns) = degrees.div(quarter, MAX_PRECISION) {
            if turns.exponent() >= 0 {
                let scale = 10_i128.pow(turns.exponent().min(2) as u32);
                let r = Pair::new(-self.y, self.x);
                return Some(match (turns.coefficient().rem_euclid(4) * scale) % 4 {
                    0 => *self,
                    1 => r,
                    2 => -*self,
                    _ => -r,
                });
            }
        }
        let (sin, cos) = degrees.to_f64().to_radians().sin_cos();
        let (x, y) = (self.x.to_f64(), self.y.to_f64());
        let length = self.length(precision)?;
        let unit = length.exponent() + length.significant_digits() as i32 - precision as i32 - 1;
        let round = |v: f64| Decimal::from_f64(v, MAX_PRECISION).map(|d| d.round_to_exponent(unit));
        Some(Pair::new(round(x * cos - y * sin)?, round(x * sin + y * cos)?))
    }
}

impl std::ops::Add<Pair> for Pair {
    type Output = Pair;
    fn add(self, rhs: Pair) -> Self::Output {
        Pair::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub<Pair> for Pair {
    type Output = Pair;
    fn sub(self, rhs: Pair) -> Self::Output {
        Pair::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Neg for Pair {
    type Output = Pair;
    fn neg(self) -> Self::Output {
        Pair::new(-self.x, -self.y)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Unit of a dimension literal.
///
/// Gallery works in big points, so `1in` is 72 and `1bp` is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Unit {
    BigPoint,
    Point,
    Pica,
    Inch,
    Centimeter,
    Millimeter,
    DidotPoint,
    Cicero,
}

impl Unit {
    /// Parses a unit from a two character abbreviation.
    ///
    /// E.g., `"cm"` is parsed to [`Unit::Centimeter`].
    pub fn parse(s: &str) -> Option<Self> {
        use Unit::*;
        Some(match s {
            "bp" => BigPoint,
            "pt" => Point,
            "pc" => Pica,
            "in" => Inch,
            "cm" => Centimeter,
            "mm" => Millimeter,
            "dd" => DidotPoint,
            "cc" => Cicero,
            _ => return None,
        })
    }

    pub fn abbreviation(&self) -> &'static str {
        use Unit::*;
        match self {
            BigPoint => "bp",
            Point => "pt",
            Pica => "pc",
            Inch => "in",
            Centimeter => "cm",
            Millimeter => "mm",
            DidotPoint => "dd",
            Cicero => "cc",
        }
    }

    /// Returns the fraction needed to convert from this unit to big points.
    ///
    /// The return value is of the form (_n_, _d_).
    /// A length of _x_ in this unit is _nx_/_d_ big points.
    pub fn conversion_fraction(&self) -> (i64, NonZeroI64) {
        use Unit::*;
        const ONE: NonZeroI64 = denominator(1);
        const PRINTERS: NonZeroI64 = denominator(7227);
        const CENTI: NonZeroI64 = denominator(254);
        const DIDOT: NonZeroI64 = denominator(7227 * 1157);
        match self {
            BigPoint => (1, ONE),
            Point => (7200, PRINTERS),
            Pica => (86400, PRINTERS),
            Inch => (72, ONE),
            Centimeter => (7200, CENTI),
            Millimeter => (720, CENTI),
            DidotPoint => (7200 * 1238, DIDOT),
            Cicero => (7200 * 14856, DIDOT),
        }
    }

    /// Converts a length in this unit to big points.
    pub fn to_big_points(&self, value: Decimal, precision: u32) -> Decimal {
        let (n, d) = self.conversion_fraction();
        let scaled = value * Decimal::from_integer(n);
        if scaled.is_saturated() {
            return scaled;
        }
        scaled.div_integer(d, precision)
    }
}

/// Evaluated in constant context, so a zero denominator fails the build.
const fn denominator(d: i64) -> NonZeroI64 {
    match NonZeroI64::new(d) {
        Some(d) => d,
        None => panic!("conversion denominators are non-zero"),
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    macro_rules! display_tests {
        ( $( ($name: ident, $input: expr, $want: expr), )+ ) => {
            $(
            #[test]
            fn $name() {
                assert_eq!(d($input).to_string(), $want);
            }
            )+
        };
    }

    display_tests!(
        (display_integer, "12", "12"),
        (display_trailing_zeros, "1200", "1200"),
        (display_fraction, "0.5", "0.5"),
        (display_small_fraction, "-0.0025", "-0.0025"),
        (display_mixed, "12.125", "12.125"),
        (display_strips_zeros, "2.500", "2.5"),
        (display_exponent, "3e-4", "0.0003"),
        (display_positive_exponent, "1.5E3", "1500"),
        (display_zero, "-0.000", "0"),
        (display_leading_point, ".25", "0.25"),
    );

    #[test]
    fn parse_errors() {
        for input in ["", "-", ".", "1.2.3", "12a", "e5", "1e"] {
            assert!(input.parse::<Decimal>().is_err(), "{input:?} parsed");
        }
    }

    #[test]
    fn equality_is_semantic() {
        assert_eq!(d("0.50"), d("0.5"));
        assert_eq!(Decimal::new(500, -3), Decimal::new(5, -1));
        assert_eq!(d("10"), Decimal::from_integer(10));
    }

    #[test]
    fn addition_is_exact() {
        assert_eq!(d("0.1") + d("0.2"), d("0.3"));
        assert_eq!(d("1e20") + d("1e-10"), d("100000000000000000000.0000000001"));
        assert_eq!(d("1.5") - d("1.5"), Decimal::ZERO);
    }

    #[test]
    fn addition_rounds_when_out_of_range() {
        let big = d("1e30");
        let tiny = d("1e-30");
        assert_eq!(big + tiny, big);
    }

    #[test]
    fn multiplication_is_exact() {
        assert_eq!(d("1.5") * d("-0.25"), d("-0.375"));
        assert_eq!(d("1e-5") * d("1e5"), Decimal::ONE);
    }

    #[test]
    fn division_by_power_of_ten_is_exact() {
        let n = d("1234567890123456789.123456789");
        assert_eq!(n.div(d("0.01"), 3).unwrap(), d("123456789012345678912.3456789"));
    }

    #[test]
    fn division_rounds_to_precision() {
        assert_eq!(Decimal::ONE.div(d("3"), 10).unwrap(), d("0.3333333333"));
        assert_eq!(d("2").div(d("3"), 10).unwrap(), d("0.6666666667"));
        assert_eq!(d("-2").div(d("3"), 4).unwrap(), d("-0.6667"));
        assert_eq!(d("10").div(d("4"), 10).unwrap(), d("2.5"));
        assert_eq!(d("1").div(d("-8"), 10).unwrap(), d("-0.125"));
    }

    #[test]
    fn literals_out_of_range() {
        for input in ["1e2000000000", "1e1001", "-12e1000", "1e-1001", "0.5e-1000"] {
            assert!(input.parse::<Decimal>().is_err(), "{input:?} parsed");
        }
        assert_eq!(d("1e1000").exponent(), MAX_EXPONENT);
        assert_eq!(d("1e-1000").exponent(), -MAX_EXPONENT);
        assert_eq!(d("0e2000000000"), Decimal::ZERO);
        assert_eq!(d("10e-1001"), d("1e-1000"));
    }

    #[test]
    fn multiplication_overflow_saturates() {
        let a = d("1e1000");
        assert_eq!(a * a, Decimal::MAX);
        assert!((a * a).is_saturated());
        assert_eq!(-a * a, -Decimal::MAX);
        assert!(!(a * d("0.001")).is_saturated());
        assert_eq!((a * a).to_string().len(), 1038);
    }

    #[test]
    fn saturated_products_do_not_overflow_the_coefficient() {
        assert_eq!(Decimal::MAX * Decimal::from_integer(72), Decimal::MAX);
        assert_eq!(Decimal::MAX * -Decimal::MAX, -Decimal::MAX);
        let shrunk = Decimal::MAX * d("2e-1000");
        assert!(!shrunk.is_saturated());
        assert_eq!(shrunk.round_to_significant(3), d("2e38"));
    }

    #[test]
    fn addition_overflow_saturates() {
        assert_eq!(Decimal::MAX + Decimal::MAX, Decimal::MAX);
        assert_eq!(-Decimal::MAX - Decimal::MAX, -Decimal::MAX);
        assert_eq!(Decimal::MAX - Decimal::MAX, Decimal::ZERO);
    }

    #[test]
    fn division_overflow_saturates() {
        let big = d("1e1000");
        let small = d("1e-1000");
        assert_eq!(big.div(small, 10).unwrap(), Decimal::MAX);
        assert_eq!(big.div(d("-3e-1000"), 10).unwrap(), -Decimal::MAX);
    }

    #[test]
    fn saturated_quotients() {
        assert_eq!(Decimal::MAX.div(Decimal::MAX, 10).unwrap(), Decimal::ONE);
        assert_eq!(d("7").div(Decimal::MAX, 10).unwrap(), Decimal::ZERO);
        assert_eq!(Decimal::MAX.div(d("-7"), 10).unwrap(), -Decimal::MAX);
        // powers of ten divide exactly
        assert_eq!(
            Decimal::MAX.div(d("1e1000"), 3).unwrap(),
            Decimal::new(MAX_COEFFICIENT, 0)
        );
    }

    #[test]
    fn underflow_rounds() {
        let small = d("1e-1000");
        assert_eq!(small * d("0.1"), Decimal::ZERO);
        assert_eq!(small * d("0.6"), small);
        assert_eq!(small.div(d("1e999"), 10).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(Decimal::ONE.div(Decimal::ZERO, 10), Err(DivisionByZero));
    }

    #[test]
    fn ordering() {
        let mut values = vec![d("3"), d("-1e5"), d("0.001"), d("-0.5"), d("0"), d("250"), d("-0.4999")];
        values.sort();
        assert_eq!(
            values,
            vec![d("-1e5"), d("-0.5"), d("-0.4999"), d("0"), d("0.001"), d("3"), d("250")]
        );
    }

    #[test]
    fn zap() {
        let eps = d("1e-9");
        assert_eq!(d("-1e-10").zap(eps), Decimal::ZERO);
        assert_eq!(d("1e-9").zap(eps), Decimal::ZERO);
        assert_eq!(d("2e-9").zap(eps), d("2e-9"));
        assert!(d("-5e-10").is_near_zero(eps));
    }

    #[test]
    fn round_to_significant() {
        assert_eq!(d("123.456").round_to_significant(4), d("123.5"));
        assert_eq!(d("-0.0012345").round_to_significant(2), d("-0.0012"));
        assert_eq!(d("99.96").round_to_significant(3), d("100"));
    }

    #[test]
    fn float_conversion() {
        assert_eq!(Decimal::from_f64(0.1, 10), Some(d("0.1")));
        assert_eq!(Decimal::from_f64(2.0_f64.sqrt(), 5), Some(d("1.4142")));
        assert_eq!(Decimal::from_f64(f64::NAN, 5), None);
        assert_eq!(d("-2.5").to_f64(), -2.5);
    }

    #[test]
    fn pair_length() {
        let p = Pair::new(d("3"), d("4"));
        assert_eq!(p.length(10), Some(d("5")));
        assert_eq!(Pair::new(d("0"), d("-2")).length(10), Some(d("2")));
    }

    #[test]
    fn pair_rotated() {
        let p = Pair::new(d("1"), d("0"));
        assert_eq!(p.rotated(d("90"), 10), Some(Pair::new(d("0"), d("1"))));
        assert_eq!(p.rotated(d("-90"), 10), Some(Pair::new(d("0"), d("-1"))));
        assert_eq!(p.rotated(d("180"), 10), Some(Pair::new(d("-1"), d("0"))));
        assert_eq!(p.rotated(d("450"), 10), Some(Pair::new(d("0"), d("1"))));
        assert_eq!(
            p.rotated(d("45"), 10),
            Some(Pair::new(d("0.7071067812"), d("0.7071067812")))
        );
    }

    #[test]
    fn pair_display() {
        assert_eq!(Pair::new(d("5"), d("-0.5")).to_string(), "(5,-0.5)");
    }

    #[test]
    fn units() {
        assert_eq!(Unit::parse("cm"), Some(Unit::Centimeter));
        assert_eq!(Unit::parse("sp"), None);
        assert_eq!(Unit::Inch.to_big_points(d("2"), 10), d("144"));
        assert_eq!(Unit::Centimeter.to_big_points(d("2.54"), 10), d("72"));
        assert_eq!(Unit::Millimeter.to_big_points(d("1"), 10), d("2.834645669"));
        assert_eq!(Unit::Point.to_big_points(d("72.27"), 10), d("72"));
    }

    #[test]
    fn every_unit_converts() {
        let one = Decimal::ONE;
        for name in ["bp", "pt", "pc", "in", "cm", "mm", "dd", "cc"] {
            let unit = Unit::parse(name).unwrap();
            let (n, den) = unit.conversion_fraction();
            assert!(n > 0 && den.get() > 0, "{name}");
            assert_eq!(
                unit.to_big_points(one, 10),
                Decimal::from_integer(n).div_integer(den, 10),
                "{name}"
            );
            assert!(unit.to_big_points(Decimal::MAX, 10).is_saturated(), "{name}");
        }
        let twelve = Decimal::from_integer(12);
        assert_eq!(
            Unit::Pica.to_big_points(one, 10),
            Unit::Point.to_big_points(twelve, 10)
        );
        assert_eq!(
            Unit::Cicero.to_big_points(one, 10),
            Unit::DidotPoint.to_big_points(twelve, 10)
        );
        assert_eq!(Unit::BigPoint.to_big_points(d("-3.5"), 2), d("-3.5"));
    }

    #[test]
    fn integer_division() {
        let three = NonZeroI64::new(3).unwrap();
        assert_eq!(d("1").div_integer(three, 5), d("0.33333"));
        assert_eq!(d("-2").div_integer(three, 3), d("-0.667"));
        assert_eq!(Decimal::MAX.div_integer(NonZeroI64::new(1).unwrap(), 5), Decimal::MAX);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_as_string() {
        let json = serde_json::to_string(&d("-1.25")).unwrap();
        assert_eq!(json, "\"-1.25\"");
        let back: Decimal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d("-1.25"));
    }
}

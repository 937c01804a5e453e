//! Variables and their names.
//!
//! Every variable the engine creates lives in the [Registry] for the rest of the run.
//! Its [VarId] is handed to the solver, which only ever sees identifiers and polynomials.
//!
//! A variable is referred to by a [NamePath]: a tag followed by any number of
//!     subscripts and suffixes, e.g. `a.b[1].c` or `x1r`.
//! A pair variable owns two further numeric variables for its `xpart` and `ypart`.

use gallery_core::{Decimal, Pair, DEFAULT_PRECISION};
use leq::{VarId, VariableResolver};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::scope::ScopeId;

/// Type of a variable, fixed by the declaration of its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VarType {
    Numeric,
    Pair,
    Path,
    Color,
    Transform,
    Pen,
}

impl VarType {
    pub fn parse(s: &str) -> Option<VarType> {
        use VarType::*;
        Some(match s {
            "numeric" => Numeric,
            "pair" => Pair,
            "path" => Path,
            "color" => Color,
            "transform" => Transform,
            "pen" => Pen,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        use VarType::*;
        match self {
            Numeric => "numeric",
            Pair => "pair",
            Path => "path",
            Color => "color",
            Transform => "transform",
            Pen => "pen",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One component of a [NamePath].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamePart {
    Tag(Rc<str>),
    Subscript(Decimal),
}

/// The full name of a variable, e.g. `a[1].b`.
///
/// The first part is always a tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamePath {
    parts: Vec<NamePart>,
}

/// Error returned when a string is not a valid variable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameError {
    pub input: String,
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is not a valid variable name", self.input)
    }
}

impl std::error::Error for NameError {}

impl NamePath {
    pub fn new(tag: &str) -> NamePath {
        NamePath {
            parts: vec![NamePart::Tag(tag.into())],
        }
    }

    pub fn tag(&self) -> &str {
        match self.parts.first() {
            Some(NamePart::Tag(tag)) => tag,
            _ => "",
        }
    }

    pub fn parts(&self) -> &[NamePart] {
        &self.parts
    }

    pub fn with_subscript(mut self, subscript: Decimal) -> NamePath {
        self.parts.push(NamePart::Subscript(subscript));
        self
    }
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '\''
}

fn parse_subscript(s: &str) -> Option<Decimal> {
    match s.split_once('/') {
        None => s.trim().parse().ok(),
        Some((n, d)) => {
            let n: Decimal = n.trim().parse().ok()?;
            let d: Decimal = d.trim().parse().ok()?;
            n.div(d, DEFAULT_PRECISION).ok()
        }
    }
}

impl FromStr for NamePath {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || NameError { input: s.into() };
        let bytes = s.as_bytes();
        let mut parts = vec![];
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i] as char;
            let next_is_digit = bytes.get(i + 1).map_or(false, u8::is_ascii_digit);
            if is_tag_char(c) {
                let start = i;
                while i < bytes.len() && is_tag_char(bytes[i] as char) {
                    i += 1;
                }
                parts.push(NamePart::Tag(s[start..i].into()));
            } else if c.is_ascii_digit() || (c == '.' && next_is_digit) {
                let start = i;
                let mut seen_dot = false;
                while i < bytes.len() {
                    let d = bytes[i];
                    let more = bytes.get(i + 1).map_or(false, u8::is_ascii_digit);
                    if d.is_ascii_digit() {
                        i += 1;
                    } else if d == b'.' && !seen_dot && more {
                        seen_dot = true;
                        i += 1;
                    } else {
                        break;
                    }
                }
                let value = s[start..i].parse().map_err(|_| err())?;
                parts.push(NamePart::Subscript(value));
            } else if c == '.' {
                // suffix separator
                if !bytes.get(i + 1).map_or(false, |b| is_tag_char(*b as char)) {
                    return Err(err());
                }
                i += 1;
            } else if c == '[' {
                let end = s[i..].find(']').ok_or_else(err)? + i;
                let value = parse_subscript(&s[i + 1..end]).ok_or_else(err)?;
                parts.push(NamePart::Subscript(value));
                i = end + 1;
            } else {
                return Err(err());
            }
        }
        match parts.first() {
            Some(NamePart::Tag(_)) => Ok(NamePath { parts }),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for NamePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            match part {
                NamePart::Tag(tag) if i == 0 => write!(f, "{tag}")?,
                NamePart::Tag(tag) => write!(f, ".{tag}")?,
                NamePart::Subscript(s) => write!(f, "[{s}]")?,
            }
        }
        Ok(())
    }
}

/// Handle to a path built outside of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathRef(pub u32);

impl fmt::Display for PathRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path{}", self.0)
    }
}

/// The value slot of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    Unknown,
    Numeric(Decimal),
    Pair(Pair),
    Path(PathRef),
}

/// Which half of a pair a numeric variable is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn name(&self) -> &'static str {
        match self {
            Axis::X => "xpart",
            Axis::Y => "ypart",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Reachable through its name.
    Named,
    /// Its name is gone but equations still mention it.
    Capsule,
    /// Nothing refers to it any more.
    Retired,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub id: VarId,
    /// [None] for anonymous variables like the result of `whatever`.
    pub name: Option<NamePath>,
    pub kind: VarType,
    /// The `xpart` and `ypart` of a pair variable.
    pub parts: Option<[VarId; 2]>,
    /// The pair this variable is a part of.
    pub part_of: Option<(VarId, Axis)>,
    pub scope: ScopeId,
    pub incarnation: u32,
    pub value: Value,
    pub status: Status,
}

/// Owner of every variable created during a run.
///
/// Identifiers are allocated consecutively starting at 1 and are never reused.
#[derive(Debug, Default)]
pub struct Registry {
    variables: Vec<Variable>,
    capsules: BTreeSet<VarId>,
}

impl Registry {
    fn push(&mut self, name: Option<NamePath>, kind: VarType, scope: ScopeId, incarnation: u32) -> VarId {
        let id = VarId(self.variables.len() as u32 + 1);
        self.variables.push(Variable {
            id,
            name,
            kind,
            parts: None,
            part_of: None,
            scope,
            incarnation,
            value: Value::Unknown,
            status: Status::Named,
        });
        id
    }

    /// Creates a variable. Pairs get their two parts with the next two identifiers.
    pub fn allocate(
        &mut self,
        name: NamePath,
        kind: VarType,
        scope: ScopeId,
        incarnation: u32,
    ) -> VarId {
        let id = self.push(Some(name), kind, scope, incarnation);
        if kind == VarType::Pair {
            let x = self.push(None, VarType::Numeric, scope, incarnation);
            let y = self.push(None, VarType::Numeric, scope, incarnation);
            self.get_mut(x).part_of = Some((id, Axis::X));
            self.get_mut(y).part_of = Some((id, Axis::Y));
            self.get_mut(id).parts = Some([x, y]);
        }
        id
    }

    /// Creates an anonymous numeric capsule.
    pub fn allocate_capsule(&mut self, scope: ScopeId) -> VarId {
        let id = self.push(None, VarType::Numeric, scope, 0);
        self.get_mut(id).status = Status::Capsule;
        self.capsules.insert(id);
        id
    }

    pub fn get(&self, id: VarId) -> Option<&Variable> {
        self.variables.get((id.0 as usize).checked_sub(1)?)
    }

    fn get_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.variables[id.0 as usize - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// The numeric identifiers that carry the value of a variable:
    ///     the variable itself for numerics, its parts for pairs, nothing otherwise.
    pub fn numeric_ids(&self, id: VarId) -> Vec<VarId> {
        match self.get(id) {
            Some(v) if v.kind == VarType::Numeric => vec![id],
            Some(Variable {
                parts: Some(parts), ..
            }) => parts.to_vec(),
            _ => vec![],
        }
    }

    pub fn set_value(&mut self, id: VarId, value: Value) {
        if self.get(id).is_some() {
            self.get_mut(id).value = value;
        }
    }

    /// Turns a numeric variable whose name has gone out of reach into a capsule.
    pub fn encapsulate(&mut self, id: VarId) {
        if self.get(id).is_none() {
            return;
        }
        self.get_mut(id).status = Status::Capsule;
        self.capsules.insert(id);
    }

    pub fn retire(&mut self, id: VarId) {
        if self.get(id).is_none() {
            return;
        }
        self.get_mut(id).status = Status::Retired;
        self.capsules.remove(&id);
        if let Some((pair, _)) = self.get_mut(id).part_of {
            let both_gone = self.get(pair).and_then(|p| p.parts).map_or(false, |parts| {
                parts
                    .iter()
                    .all(|part| self.get(*part).map_or(true, |v| v.status == Status::Retired))
            });
            if both_gone {
                self.get_mut(pair).status = Status::Retired;
            }
        }
    }

    /// Marks a non-numeric variable, or a pair record, as no longer named.
    pub fn unname(&mut self, id: VarId) {
        if self.get(id).is_some() && self.get(id).map(|v| v.status) == Some(Status::Named) {
            let retired = self.numeric_ids(id).is_empty();
            self.get_mut(id).status = if retired {
                Status::Retired
            } else {
                Status::Capsule
            };
        }
    }

    pub fn capsules(&self) -> impl Iterator<Item = VarId> + '_ {
        self.capsules.iter().copied()
    }

    pub fn num_capsules(&self) -> usize {
        self.capsules.len()
    }

    pub fn status(&self, id: VarId) -> Option<Status> {
        self.get(id).map(|v| v.status)
    }

    /// Name of a variable as shown to the user.
    ///
    /// Capsules print as `%CAPSULEnn` and pair parts as `xpart A`.
    pub fn display_name(&self, id: VarId) -> String {
        let Some(v) = self.get(id) else {
            return id.to_string();
        };
        if v.status == Status::Capsule && v.kind == VarType::Numeric {
            return format!("%CAPSULE{}", id.0);
        }
        if let Some((pair, axis)) = v.part_of {
            return format!("{} {}", axis.name(), self.display_name(pair));
        }
        match &v.name {
            Some(name) => name.to_string(),
            None => format!("%CAPSULE{}", id.0),
        }
    }
}

impl VariableResolver for Registry {
    fn variable_name(&self, id: VarId) -> String {
        self.display_name(id)
    }

    fn set_variable_solved(&mut self, id: VarId, value: Decimal) {
        if self.get(id).is_none() {
            return;
        }
        self.get_mut(id).value = Value::Numeric(value);
        let Some((pair, _)) = self.get_mut(id).part_of else {
            return;
        };
        let Some([x, y]) = self.get(pair).and_then(|p| p.parts) else {
            return;
        };
        let value_of = |id: VarId| match self.get(id).map(|v| v.value) {
            Some(Value::Numeric(v)) => Some(v),
            _ => None,
        };
        if let (Some(x), Some(y)) = (value_of(x), value_of(y)) {
            self.get_mut(pair).value = Value::Pair(Pair::new(x, y));
        }
    }

    fn is_capsule(&self, id: VarId) -> bool {
        self.capsules.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    macro_rules! name_tests {
        ($( ($name: ident, $input: expr, $want: expr), )+) => {
            $(
                #[test]
                fn $name() {
                    let path: NamePath = $input.parse().unwrap();
                    assert_eq!(path.to_string(), $want);
                }
            )+
        };
    }

    name_tests!(
        (name_tag, "a", "a"),
        (name_suffixes, "a.b.c", "a.b.c"),
        (name_bracket_subscript, "a.b[1].c", "a.b[1].c"),
        (name_implicit_subscript, "x1r", "x[1].r"),
        (name_fraction_subscript, "x[1/2]", "x[0.5]"),
        (name_decimal_subscript, "x1.5", "x[1.5]"),
        (name_negative_subscript, "z[-2]", "z[-2]"),
        (name_primes, "z'", "z'"),
    );

    #[test]
    fn equal_subscripts_give_equal_names() {
        let a: NamePath = "x[2]".parse().unwrap();
        let b: NamePath = "x2".parse().unwrap();
        let c: NamePath = "x[4/2]".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a, NamePath::new("x").with_subscript(d("2.0")));
    }

    #[test]
    fn invalid_names() {
        for input in ["", "1x", "a..b", "a[1", "a[z]", "a+b", "a."] {
            assert_eq!(
                input.parse::<NamePath>(),
                Err(NameError {
                    input: input.into()
                }),
                "{input}"
            );
        }
    }

    #[test]
    fn pair_allocates_consecutive_parts() {
        let mut registry = Registry::default();
        let a = registry.allocate(NamePath::new("A"), VarType::Pair, ScopeId::GLOBAL, 0);
        assert_eq!(a, VarId(1));
        assert_eq!(registry.numeric_ids(a), vec![VarId(2), VarId(3)]);
        assert_eq!(registry.display_name(VarId(3)), "ypart A");
        let b = registry.allocate(NamePath::new("b"), VarType::Numeric, ScopeId::GLOBAL, 0);
        assert_eq!(b, VarId(4));
    }

    #[test]
    fn pair_value_is_known_when_both_parts_are() {
        let mut registry = Registry::default();
        let a = registry.allocate(NamePath::new("A"), VarType::Pair, ScopeId::GLOBAL, 0);
        registry.set_variable_solved(VarId(2), d("3"));
        assert_eq!(registry.get(a).unwrap().value, Value::Unknown);
        registry.set_variable_solved(VarId(3), d("4"));
        assert_eq!(
            registry.get(a).unwrap().value,
            Value::Pair(Pair::new(d("3"), d("4")))
        );
    }

    #[test]
    fn capsules() {
        let mut registry = Registry::default();
        let k = registry.allocate(NamePath::new("k"), VarType::Numeric, ScopeId::GLOBAL, 0);
        let w = registry.allocate_capsule(ScopeId::GLOBAL);
        assert_eq!(registry.display_name(k), "k");
        assert_eq!(registry.display_name(w), "%CAPSULE2");
        registry.encapsulate(k);
        assert!(registry.is_capsule(k));
        assert_eq!(registry.display_name(k), "%CAPSULE1");
        assert_eq!(registry.capsules().collect::<Vec<_>>(), vec![k, w]);
        registry.retire(k);
        assert_eq!(registry.status(k), Some(Status::Retired));
        assert_eq!(registry.num_capsules(), 1);
    }

    #[test]
    fn retiring_both_parts_retires_the_pair() {
        let mut registry = Registry::default();
        let a = registry.allocate(NamePath::new("A"), VarType::Pair, ScopeId::GLOBAL, 0);
        registry.unname(a);
        registry.retire(VarId(2));
        assert_eq!(registry.status(a), Some(Status::Capsule));
        registry.retire(VarId(3));
        assert_eq!(registry.status(a), Some(Status::Retired));
    }
}

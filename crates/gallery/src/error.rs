//! Diagnostics reported by the engine.
//!
//! Every problem the engine detects is described by an [Error].
//! Errors are classified by their [Kind], and every kind belongs to one of three [Class]es:
//!
//! - user errors abort the current statement; the engine stays usable;
//! - limit conditions are warnings; the operation that raised them still completes;
//! - engine bugs mean an internal invariant was broken; the engine halts.
//!
//! Engine operations return `Result<T, Box<Error>>`.
//! In addition every error and warning is recorded in the engine's diagnostic list exactly once.

use std::fmt;
use std::ops::Range;

/// Location of the source that triggered an engine operation.
///
/// The engine does not know about source files; the caller supplies spans
///     and the engine attaches them to the diagnostics it produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Span {
    /// One-based line number.
    pub line: usize,
    /// Byte range within the source.
    pub range: Range<usize>,
}

/// Kind of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// An equation reduced to a non-zero constant.
    Inconsistent,
    /// An operation would have produced a product of unknowns.
    Nonlinear,
    /// An operand has the wrong type, e.g. a pair where a numeric is needed.
    TypeMismatch,
    /// A name cannot be resolved.
    UndefinedVariable,
    /// Division by a zero constant.
    DivByZero,
    /// A value or coefficient left the representable range.
    Overflow,
    /// An end-of-group that does not match the innermost open group.
    UnbalancedGroup,
    /// Malformed input handed to the statement driver.
    Syntax,
    /// A value was queried that is not known yet.
    Unresolved,
    /// A coefficient large enough to matter was rounded to zero.
    PrecisionLoss,
    /// More equations are live than the configured limit.
    EquationsOverflow,
    /// An internal invariant was broken.
    EngineBug,
}

/// Severity class of a [Kind].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    User,
    Limit,
    Bug,
}

impl Kind {
    pub fn class(&self) -> Class {
        use Kind::*;
        match self {
            Inconsistent | Nonlinear | TypeMismatch | UndefinedVariable | DivByZero
            | Overflow | UnbalancedGroup | Syntax | Unresolved => Class::User,
            PrecisionLoss | EquationsOverflow => Class::Limit,
            EngineBug => Class::Bug,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.class() == Class::Limit
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Kind::*;
        let s = match self {
            Inconsistent => "inconsistent equation",
            Nonlinear => "nonlinear expression",
            TypeMismatch => "type mismatch",
            UndefinedVariable => "undefined variable",
            DivByZero => "division by zero",
            Overflow => "arithmetic overflow",
            UnbalancedGroup => "unbalanced group",
            Syntax => "syntax error",
            Unresolved => "unresolved value",
            PrecisionLoss => "precision loss",
            EquationsOverflow => "too many equations",
            EngineBug => "engine bug",
        };
        write!(f, "{s}")
    }
}

/// A diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: Kind,
    pub title: String,
    pub notes: Vec<String>,
    pub span: Option<Span>,
}

impl Error {
    pub fn new<T: Into<String>>(kind: Kind, title: T) -> Error {
        Error {
            kind,
            title: title.into(),
            notes: vec![],
            span: None,
        }
    }

    pub fn with_note<T: Into<String>>(mut self, note: T) -> Error {
        self.notes.push(note.into());
        self
    }

    /// Sets the span, unless the error already has one.
    pub fn at(mut self, span: Option<Span>) -> Error {
        if self.span.is_none() {
            self.span = span;
        }
        self
    }

    pub fn class(&self) -> Class {
        self.kind.class()
    }

    #[cfg(feature = "ariadne")]
    pub fn ariadne_report<'a>(
        &self,
        file_name: &'a str,
    ) -> ariadne::Report<'static, (&'a str, Range<usize>)> {
        let range = self.span.as_ref().map(|s| s.range.clone()).unwrap_or(0..0);
        let report_kind = match self.class() {
            Class::Limit => ariadne::ReportKind::Warning,
            Class::User | Class::Bug => ariadne::ReportKind::Error,
        };
        let mut report = ariadne::Report::build(report_kind, (file_name, range.clone()))
            .with_message(&self.title);
        if self.span.is_some() {
            report = report.with_label(
                ariadne::Label::new((file_name, range))
                    .with_message(format!("{}", self.kind))
                    .with_color(ariadne::Color::BrightRed),
            );
        }
        for note in &self.notes {
            report = report.with_note(note);
        }
        report.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.class() {
            Class::User => "error",
            Class::Limit => "warning",
            Class::Bug => "internal error",
        };
        write!(f, "{severity}: {}", self.title)?;
        if let Some(span) = &self.span {
            write!(f, "\n  --> line {}", span.line)?;
        }
        for note in &self.notes {
            write!(f, "\n  = {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes() {
        assert_eq!(Kind::Inconsistent.class(), Class::User);
        assert_eq!(Kind::PrecisionLoss.class(), Class::Limit);
        assert!(Kind::EquationsOverflow.is_warning());
        assert_eq!(Kind::EngineBug.class(), Class::Bug);
        assert_eq!(Kind::Overflow.class(), Class::User);
        assert_eq!(Kind::Overflow.to_string(), "arithmetic overflow");
    }

    #[test]
    fn display() {
        let err = Error::new(Kind::Inconsistent, "inconsistent equation (off by 1)")
            .with_note("the culprit is equation 2")
            .at(Some(Span {
                line: 3,
                range: 10..12,
            }));
        assert_eq!(
            err.to_string(),
            "error: inconsistent equation (off by 1)\n  --> line 3\n  = the culprit is equation 2"
        );
    }

    #[test]
    fn at_keeps_existing_span() {
        let first = Some(Span {
            line: 1,
            range: 0..1,
        });
        let second = Some(Span {
            line: 2,
            range: 4..5,
        });
        let err = Error::new(Kind::Syntax, "x").at(first.clone()).at(second);
        assert_eq!(err.span, first);
    }
}

//! Tracing output.
//!
//! The engine writes traces to two sinks: the log file, which receives everything,
//!     and the terminal, which receives traces only when `tracing_online` is set.
//! Both sinks are shared `std::io::Write` trait objects so that callers
//!     (and tests) can capture the output.

use crate::error::{Class, Error};
use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

#[cfg(feature = "color")]
fn highlight(s: &str) -> String {
    use colored::Colorize;
    s.bold().to_string()
}

#[cfg(not(feature = "color"))]
fn highlight(s: &str) -> String {
    s.to_string()
}

#[cfg(feature = "color")]
fn alert(s: &str) -> String {
    use colored::Colorize;
    s.bright_red().bold().to_string()
}

#[cfg(not(feature = "color"))]
fn alert(s: &str) -> String {
    s.to_string()
}

#[derive(Clone)]
pub struct Tracer {
    pub terminal_out: Rc<RefCell<dyn Write>>,
    pub log_file: Rc<RefCell<dyn Write>>,
    online: bool,
}

impl Default for Tracer {
    fn default() -> Self {
        Tracer {
            terminal_out: Rc::new(RefCell::new(std::io::stderr())),
            log_file: Rc::new(RefCell::new(std::io::sink())),
            online: false,
        }
    }
}

impl Tracer {
    pub fn new(terminal_out: Rc<RefCell<dyn Write>>, log_file: Rc<RefCell<dyn Write>>) -> Tracer {
        Tracer {
            terminal_out,
            log_file,
            online: false,
        }
    }

    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    /// Writes one line of trace output.
    pub fn line(&self, args: fmt::Arguments) {
        let mut out = self.clone();
        // traces are best effort
        let _ = writeln!(out, "{args}");
    }

    /// Writes a line whose first word is highlighted, e.g. `{capsule} %CAPSULE12 reclaimed`.
    pub fn event(&self, tag: &str, args: fmt::Arguments) {
        self.line(format_args!("{{{}}} {args}", highlight(tag)));
    }

    /// Traces a diagnostic in the style `! Inconsistent equation (off by 1).`
    pub fn diagnostic(&self, err: &Error) {
        let marker = match err.class() {
            Class::User | Class::Bug => alert("!"),
            Class::Limit => highlight("warning:"),
        };
        let location = match &err.span {
            Some(span) => format!(" (line {})", span.line),
            None => String::new(),
        };
        self.line(format_args!("{marker} {}{location}.", err.title));
        for note in &err.notes {
            self.line(format_args!("  {note}"));
        }
    }
}

impl Write for Tracer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.log_file.borrow_mut().write_all(buf)?;
        if self.online {
            self.terminal_out.borrow_mut().write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.log_file.borrow_mut().flush()?;
        self.terminal_out.borrow_mut().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Kind, Span};

    fn capture() -> (Tracer, Rc<RefCell<Vec<u8>>>, Rc<RefCell<Vec<u8>>>) {
        let terminal: Rc<RefCell<Vec<u8>>> = Default::default();
        let log: Rc<RefCell<Vec<u8>>> = Default::default();
        (Tracer::new(terminal.clone(), log.clone()), terminal, log)
    }

    fn text(buf: &Rc<RefCell<Vec<u8>>>) -> String {
        String::from_utf8(buf.borrow().clone()).unwrap()
    }

    #[test]
    fn offline_traces_only_go_to_the_log() {
        let (tracer, terminal, log) = capture();
        tracer.line(format_args!("## x=2"));
        assert_eq!(text(&log), "## x=2\n");
        assert_eq!(text(&terminal), "");
    }

    #[test]
    fn online_traces_go_to_both() {
        let (mut tracer, terminal, log) = capture();
        tracer.set_online(true);
        tracer.line(format_args!("#### y=1"));
        assert_eq!(text(&log), "#### y=1\n");
        assert_eq!(text(&terminal), "#### y=1\n");
    }

    #[cfg(not(feature = "color"))]
    #[test]
    fn diagnostic_format() {
        let (tracer, _, log) = capture();
        let err = Error::new(Kind::Inconsistent, "inconsistent equation (off by 1)")
            .with_note("the culprit is equation 2")
            .at(Some(Span {
                line: 4,
                range: 0..1,
            }));
        tracer.diagnostic(&err);
        assert_eq!(
            text(&log),
            "! inconsistent equation (off by 1) (line 4).\n  the culprit is equation 2\n"
        );
    }
}

//! A small statement language that drives the engine.
//!
//! Statements are `;`-terminated sequences of whitespace-separated tokens in postfix order.
//! Each token maps onto one engine call:
//!
//! ```text
//! pair A B C;          % declarations
//! (0,0) := A;          % assignment
//! (10,0) := B;
//! 0.5 A B [] := C;     % C := 0.5[A,B]
//! x y + 3 =;           % x + y = 3
//! show C;
//! ```
//!
//! Besides the declarations, the statements `save`, `show`, `showdependencies`,
//!     `beginfig n` and `endfig` are recognized when they start a statement.
//! The tokens `begingroup` and `endgroup` may appear anywhere
//!     and are honoured even while the rest of a failed statement is being skipped.
//! A `%` starts a comment that runs to the end of the line.

use crate::engine::Engine;
use crate::error::{Error, Kind, Span};
use crate::variable::{NamePath, VarType};
use gallery_core::{Decimal, Unit};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token<'a> {
    text: &'a str,
    span: Span,
}

fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = vec![];
    let mut offset = 0;
    for (i, line) in source.split_inclusive('\n').enumerate() {
        let code = match line.find('%') {
            Some(j) => &line[..j],
            None => line,
        };
        let mut start: Option<usize> = None;
        let mut bounds = vec![];
        for (j, c) in code.char_indices() {
            if c.is_whitespace() || c == ';' {
                if let Some(s) = start.take() {
                    bounds.push(s..j);
                }
                if c == ';' {
                    bounds.push(j..j + 1);
                }
            } else if start.is_none() {
                start = Some(j);
            }
        }
        if let Some(s) = start {
            bounds.push(s..code.len());
        }
        for range in bounds {
            let range = offset + range.start..offset + range.end;
            tokens.push(Token {
                text: &source[range.clone()],
                span: Span { line: i + 1, range },
            });
        }
        offset += line.len();
    }
    tokens
}

fn syntax_error(title: String) -> Error {
    Error::new(Kind::Syntax, title)
}

fn is_number(text: &str) -> bool {
    let rest = text.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(text);
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => chars.next().map_or(false, |c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Parses a number with an optional unit suffix, e.g. `2.5cm`.
fn parse_number(text: &str) -> Result<(Decimal, Option<Unit>), Error> {
    let digits = text.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let suffix = &text[digits.len()..];
    let value: Decimal = digits
        .parse()
        .map_err(|_| syntax_error(format!("`{text}` is not a number")))?;
    if suffix.is_empty() {
        return Ok((value, None));
    }
    match Unit::parse(suffix) {
        Some(unit) => Ok((value, Some(unit))),
        None => Err(syntax_error(format!("`{suffix}` is not a unit"))
            .with_note("the units are bp, pt, pc, in, cm, mm, dd and cc")),
    }
}

fn parse_name(text: &str) -> Result<NamePath, Error> {
    text.parse()
        .map_err(|err: crate::variable::NameError| syntax_error(err.to_string()))
}

fn resolve_number(text: &str, precision: u32) -> Result<Decimal, Error> {
    let (value, unit) = parse_number(text)?;
    let value = match unit {
        None => value,
        Some(unit) => unit.to_big_points(value, precision),
    };
    if value.is_saturated() {
        return Err(Error::new(Kind::Overflow, format!("`{text}` is out of range")));
    }
    Ok(value)
}

/// Runs the source against the engine.
///
/// Returns the output of the `show` and `showdependencies` statements.
/// Diagnostics are recorded in the engine.
pub fn run(engine: &mut Engine, source: &str) -> Vec<String> {
    let tokens = tokenize(source);
    let mut output = vec![];
    let mut i = 0;
    let mut at_start = true;
    let mut skipping = false;
    while i < tokens.len() {
        let token = &tokens[i];
        engine.set_location(Some(token.span.clone()));
        i += 1;
        match token.text {
            ";" => {
                engine.end_statement();
                at_start = true;
                skipping = false;
                continue;
            }
            "begingroup" => {
                if engine.begin_group().is_err() {
                    skipping = true;
                }
                continue;
            }
            "endgroup" => {
                if engine.end_group().is_err() {
                    skipping = true;
                }
                continue;
            }
            _ if skipping => continue,
            _ => {}
        }
        if engine.is_halted() {
            break;
        }
        let result = if at_start {
            at_start = false;
            // the arguments of a statement keyword run up to the next `;`
            let end = tokens[i..]
                .iter()
                .position(|t| t.text == ";")
                .map_or(tokens.len(), |p| i + p);
            match statement(engine, token.text, &tokens[i..end], &mut output) {
                Some(result) => {
                    i = end;
                    result
                }
                None => expression(engine, &tokens, &mut i, token),
            }
        } else {
            expression(engine, &tokens, &mut i, token)
        };
        if result.is_err() {
            skipping = true;
        }
    }
    if !at_start {
        engine.end_statement();
    }
    if engine.frame_depth() > 0 && !engine.is_halted() {
        let kind = engine.innermost_frame().kind;
        engine.report(
            Error::new(Kind::UnbalancedGroup, format!("the input ended inside a {kind}"))
                .with_note("every group must be closed"),
        );
    }
    output
}

/// Runs a statement that starts with a keyword. Returns [None] if the word is not a keyword.
fn statement(
    engine: &mut Engine,
    keyword: &str,
    args: &[Token],
    output: &mut Vec<String>,
) -> Option<Result<(), Box<Error>>> {
    let names = || {
        args.iter()
            .flat_map(|t| t.text.split(','))
            .filter(|s| !s.is_empty())
    };
    let result = if let Some(kind) = VarType::parse(keyword) {
        names().try_for_each(|tag| engine.declare(kind, tag))
    } else {
        match keyword {
            "save" => names().try_for_each(|tag| engine.save(tag)),
            "show" => names().try_for_each(|name| {
                let name = parse_name(name).map_err(|err| engine.report(err))?;
                output.push(engine.show(&name)?);
                Ok(())
            }),
            "showdependencies" => {
                output.extend(engine.show_dependencies());
                Ok(())
            }
            "beginfig" => match args {
                [n] => match n.text.parse::<i64>() {
                    Ok(n) => engine.begin_figure(n),
                    Err(_) => Err(engine.report(syntax_error(format!(
                        "`{}` is not a figure number",
                        n.text
                    )))),
                },
                _ => Err(engine.report(syntax_error("beginfig needs a figure number".into()))),
            },
            "endfig" => engine.end_figure(),
            _ => return None,
        }
    };
    Some(result)
}

/// Runs one expression token; may consume the following token for `:=`.
fn expression(
    engine: &mut Engine,
    tokens: &[Token],
    i: &mut usize,
    token: &Token,
) -> Result<(), Box<Error>> {
    let text = token.text;
    match text {
        "+" => engine.op_add(),
        "-" => engine.op_sub(),
        "*" => engine.op_mul(),
        "/" => engine.op_div(),
        "neg" => engine.op_neg(),
        "[]" => engine.op_interpolate(),
        "xpart" => engine.op_xpart(),
        "ypart" => engine.op_ypart(),
        "mkpair" => engine.op_make_pair(),
        "length" => engine.op_length(),
        "rotated" => engine.op_rotated(),
        "whatever" => engine.op_whatever(),
        "=" => engine.commit_equation(),
        ":=" => match tokens.get(*i) {
            Some(next) if next.text != ";" => {
                *i += 1;
                engine.set_location(Some(next.span.clone()));
                let name = parse_name(next.text).map_err(|err| engine.report(err))?;
                engine.commit_assignment(&name)
            }
            _ => Err(engine.report(syntax_error("`:=` needs a variable name".into()))),
        },
        _ if text.starts_with(":=") => {
            let name = parse_name(&text[2..]).map_err(|err| engine.report(err))?;
            engine.commit_assignment(&name)
        }
        _ if is_number(text) => {
            let (value, unit) = parse_number(text).map_err(|err| engine.report(err))?;
            match unit {
                None => engine.push_numeric_literal(value),
                Some(unit) => engine.push_dimension(value, unit),
            }
        }
        _ if text.starts_with('(') => {
            let inner = text
                .strip_prefix('(')
                .and_then(|t| t.strip_suffix(')'))
                .and_then(|t| t.split_once(','));
            let Some((x, y)) = inner else {
                return Err(engine.report(syntax_error(format!(
                    "`{text}` is not a pair literal"
                ))));
            };
            let precision = engine.options().tolerance().precision;
            let x = resolve_number(x, precision).map_err(|err| engine.report(err))?;
            let y = resolve_number(y, precision).map_err(|err| engine.report(err))?;
            engine.push_pair_literal(x, y)
        }
        _ => {
            let name = parse_name(text).map_err(|err| engine.report(err))?;
            engine.push_variable(&name)
        }
    }
}

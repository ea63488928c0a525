//! S-expression reader
//!
//! Reads integers, strings, booleans, symbols, proper lists and `'` quotes.
//! `;` starts a comment running to the end of the line.

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace1, not_line_ending},
    combinator::value,
    error::{Error, ErrorKind},
    multi::many0,
    sequence::preceded,
    IResult, Parser,
};

use crate::runtime::value::Value;
use crate::runtime::Condition;

/// Maximum list nesting accepted by the reader
pub const MAX_READ_DEPTH: usize = 256;

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';' | '\'')
}

/// Whitespace and comments
fn skip_atmosphere(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), preceded(char(';'), not_line_ending)),
        ))),
    )
    .parse(input)
}

fn datum(
    input: &str,
    depth: usize,
) -> IResult<&str, Value> {
    if depth >= MAX_READ_DEPTH {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge)));
    }
    preceded(
        skip_atmosphere,
        alt((
            |i| quoted(i, depth),
            |i| list(i, depth),
            string_literal,
            atom,
        )),
    )
    .parse(input)
}

fn quoted(
    input: &str,
    depth: usize,
) -> IResult<&str, Value> {
    let (input, _) = char('\'').parse(input)?;
    let (input, inner) = datum(input, depth + 1)?;
    Ok((input, Value::list(vec![Value::symbol("quote"), inner])))
}

fn list(
    input: &str,
    depth: usize,
) -> IResult<&str, Value> {
    let (input, _) = char('(').parse(input)?;
    let (input, items) = many0(|i| datum(i, depth + 1)).parse(input)?;
    let (input, _) = skip_atmosphere(input)?;
    if input.is_empty() {
        // commit so `alt` does not backtrack to the open paren
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::Eof)));
    }
    let (input, _) = char(')').parse(input)?;
    Ok((input, Value::list(items)))
}

fn string_literal(input: &str) -> IResult<&str, Value> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut text = String::new();

    loop {
        let mut chars = remaining.chars();
        match chars.next() {
            Some('"') => return Ok((chars.as_str(), Value::string(&text))),
            Some('\\') => {
                match chars.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('0') => text.push('\0'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    _ => {
                        return Err(nom::Err::Error(Error::new(remaining, ErrorKind::Escaped)));
                    }
                }
                remaining = chars.as_str();
            }
            Some(ch) => {
                text.push(ch);
                remaining = chars.as_str();
            }
            None => return Err(nom::Err::Failure(Error::new(remaining, ErrorKind::Eof))),
        }
    }
}

fn atom(input: &str) -> IResult<&str, Value> {
    let (rest, token) = take_while1(|c: char| !is_delimiter(c)).parse(input)?;
    match classify_atom(token) {
        Some(v) => Ok((rest, v)),
        None => Err(nom::Err::Error(Error::new(input, ErrorKind::Verify))),
    }
}

fn classify_atom(token: &str) -> Option<Value> {
    match token {
        "#t" | "#true" => Some(Value::Bool(true)),
        "#f" | "#false" => Some(Value::Bool(false)),
        "." => None,
        _ if token.starts_with('#') => None,
        _ => {
            if let Ok(n) = token.parse::<i64>() {
                return Some(Value::Int(n));
            }
            let digits = token.trim_start_matches(['+', '-']);
            if (digits.len() < token.len() && digits.starts_with(|c: char| c.is_ascii_digit()))
                || token.starts_with(|c: char| c.is_ascii_digit())
            {
                // out of range, or a malformed number
                return None;
            }
            Some(Value::symbol(token))
        }
    }
}

fn to_condition(
    source: &str,
    err: nom::Err<Error<&str>>,
) -> Condition {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            if e.code == ErrorKind::TooLarge {
                return Condition::read_error(format!(
                    "list nesting too deep (max depth: {})",
                    MAX_READ_DEPTH
                ));
            }
            let position = source.len().saturating_sub(e.input.len());
            let rest = e.input.trim_start();
            if rest.is_empty() {
                Condition::read_error("unexpected end of input")
            } else if rest.starts_with(')') {
                Condition::read_error(format!("extra close parenthesis at position {}", position))
            } else {
                let near: String = rest.chars().take(10).collect();
                Condition::read_error(format!("invalid syntax near '{}'", near))
            }
        }
        nom::Err::Incomplete(_) => Condition::read_error("unexpected end of input"),
    }
}

/// Read every form in `source`
pub fn read_all(source: &str) -> Result<Vec<Value>, Condition> {
    let mut forms = Vec::new();
    let mut rest = source;
    loop {
        let (after, _) = skip_atmosphere(rest).map_err(|e| to_condition(source, e))?;
        if after.is_empty() {
            return Ok(forms);
        }
        let (after, form) = datum(after, 0).map_err(|e| to_condition(source, e))?;
        forms.push(form);
        rest = after;
    }
}

/// Lowercase every symbol in `value`
pub fn fold_case(value: Value) -> Value {
    match value {
        Value::Symbol(name) if name.chars().any(char::is_uppercase) => {
            Value::symbol(&name.to_lowercase())
        }
        Value::List(items) => Value::list(items.iter().cloned().map(fold_case).collect()),
        other => other,
    }
}

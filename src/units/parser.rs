//! Parser for unit strings
//!
//! Grammar:
//!
//! ```text
//! product := power (('*' | '/' | <juxtaposition>) power)*
//! power   := atom (('^' | '**') integer)?
//! atom    := '(' product ')' | symbol | number
//! ```
//!
//! Operators associate to the left, so `m/s/s` is `m/s^2`. The empty string and
//! `dimensionless` both denote the dimensionless unit.

use crate::units::unit::{Factor, UnitError, UnitExpr};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit0, digit1, multispace0, one_of},
    combinator::{opt, recognize},
    IResult, Parser,
};

type Res<'a, T> = IResult<&'a str, T>;

/// Syntax tree of a unit string
#[derive(Debug, Clone, PartialEq)]
enum UnitAst {
    Symbol(String),
    Number(f64),
    Mul(Box<UnitAst>, Box<UnitAst>),
    Div(Box<UnitAst>, Box<UnitAst>),
    Pow(Box<UnitAst>, i32),
}

impl UnitAst {
    fn evaluate(&self) -> Result<UnitExpr, UnitError> {
        match self {
            UnitAst::Symbol(s) => Ok(UnitExpr::symbol(Factor::resolve(s)?)),
            UnitAst::Number(x) => Ok(UnitExpr::number(*x)),
            UnitAst::Mul(a, b) => Ok(a.evaluate()?.mul(b.evaluate()?)),
            UnitAst::Div(a, b) => Ok(a.evaluate()?.div(b.evaluate()?)),
            UnitAst::Pow(a, n) => Ok(a.evaluate()?.powi(*n)),
        }
    }
}

fn ws(input: &str) -> Res<'_, &str> {
    multispace0(input)
}

fn open_paren(input: &str) -> Res<'_, char> {
    char('(').parse(input)
}

fn close_paren(input: &str) -> Res<'_, char> {
    char(')').parse(input)
}

fn star(input: &str) -> Res<'_, char> {
    char('*').parse(input)
}

fn slash(input: &str) -> Res<'_, char> {
    char('/').parse(input)
}

fn caret(input: &str) -> Res<'_, &str> {
    alt((tag("**"), tag("^"))).parse(input)
}

fn symbol(input: &str) -> Res<'_, UnitAst> {
    let parsed: Res<'_, &str> = take_while1(|c: char| c.is_alphabetic()).parse(input);
    let (rest, name) = parsed?;
    Ok((rest, UnitAst::Symbol(name.to_string())))
}

fn exponent(input: &str) -> Res<'_, &str> {
    recognize((one_of("eE"), opt(one_of("+-")), digit1)).parse(input)
}

/// Decimal literal; an `e` not followed by digits is left for a symbol (`2eV`)
fn number(input: &str) -> Res<'_, UnitAst> {
    let integral: Res<'_, &str> = digit1(input);
    let (rest, _) = integral?;
    let rest = match rest.strip_prefix('.') {
        Some(after) => {
            let fraction: Res<'_, &str> = digit0(after);
            fraction?.0
        }
        None => rest,
    };
    let rest = exponent(rest).map_or(rest, |(after, _)| after);

    let text = &input[..input.len() - rest.len()];
    let value = text.parse::<f64>().map_err(|_| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float))
    })?;
    Ok((rest, UnitAst::Number(value)))
}

fn integer(input: &str) -> Res<'_, i32> {
    let parsed: Res<'_, &str> = recognize((opt(one_of("+-")), digit1)).parse(input);
    let (rest, text) = parsed?;
    let value = text.parse::<i32>().map_err(|_| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
    })?;
    Ok((rest, value))
}

fn parenthesized_integer(input: &str) -> Res<'_, i32> {
    let (input, _) = open_paren(input)?;
    let (input, _) = ws(input)?;
    let (input, n) = integer(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = close_paren(input)?;
    Ok((input, n))
}

fn group(input: &str) -> Res<'_, UnitAst> {
    let (input, _) = open_paren(input)?;
    let (input, inner) = product(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = close_paren(input)?;
    Ok((input, inner))
}

fn atom(input: &str) -> Res<'_, UnitAst> {
    let (input, _) = ws(input)?;
    match input.chars().next() {
        Some('(') => group(input),
        Some(c) if c.is_alphabetic() => symbol(input),
        _ => number(input),
    }
}

fn power(input: &str) -> Res<'_, UnitAst> {
    let (input, base) = atom(input)?;
    let (after_ws, _) = ws(input)?;
    match caret(after_ws) {
        Ok((rest, _)) => {
            let (rest, _) = ws(rest)?;
            let (rest, n) = if rest.starts_with('(') {
                parenthesized_integer(rest)?
            } else {
                integer(rest)?
            };
            Ok((rest, UnitAst::Pow(Box::new(base), n)))
        }
        Err(_) => Ok((input, base)),
    }
}

fn product(input: &str) -> Res<'_, UnitAst> {
    let (mut input, mut acc) = power(input)?;
    loop {
        let (rest, _) = ws(input)?;
        if let Ok((rest, _)) = star(rest) {
            let (rest, rhs) = power(rest)?;
            acc = UnitAst::Mul(Box::new(acc), Box::new(rhs));
            input = rest;
        } else if let Ok((rest, _)) = slash(rest) {
            let (rest, rhs) = power(rest)?;
            acc = UnitAst::Div(Box::new(acc), Box::new(rhs));
            input = rest;
        } else if rest.starts_with(|c: char| c.is_alphabetic() || c == '(') {
            let (rest, rhs) = power(rest)?;
            acc = UnitAst::Mul(Box::new(acc), Box::new(rhs));
            input = rest;
        } else {
            return Ok((input, acc));
        }
    }
}

/// Parse a unit string into an uncanonicalized unit expression
pub(crate) fn parse_unit(input: &str) -> Result<UnitExpr, UnitError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "dimensionless" {
        return Ok(UnitExpr::one());
    }

    let parse_error = |message: String| UnitError::Parse {
        input: input.to_string(),
        message,
    };

    match product(trimmed) {
        Ok((rest, ast)) => {
            if !rest.trim().is_empty() {
                return Err(parse_error(format!("unexpected trailing input '{}'", rest)));
            }
            ast.evaluate()
        }
        Err(e) => Err(parse_error(e.to_string())),
    }
}

/// Check whether a string is a syntactically valid unit string
pub fn is_valid_unit(input: &str) -> bool {
    parse_unit(input).is_ok()
}

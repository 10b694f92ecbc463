//! Restricted arithmetic expressions for constraint relations
//!
//! Constraint operators such as `"2*"` or `"+ p0 - 2* p1"` are parsed once into
//! an [`Expression`] tree and evaluated against named numeric symbols. Only
//! numbers, symbols, `+ - * / ^ **`, unary signs, parentheses and a fixed set
//! of math functions are understood.

use ndarray::{ArrayD, IxDyn};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::recognize,
    multi::many0,
    number::complete::double,
    sequence::pair,
    IResult, Parser,
};
use thiserror::Error;

/// Error that can occur during expression parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression: {message}")]
    ParseError { message: String },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },
}

/// Result type for expression evaluation
pub type ExprResult<T> = Result<T, ExpressionError>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant number
    Number(f64),

    /// Variable reference
    Variable(String),

    /// Unary operations
    Unary(UnaryOp, Box<Expression>),

    /// Binary operations
    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    /// Function call
    Function(String, Vec<Expression>),
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,

    /// Identity (+)
    Plus,
}

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Power (`^` or `**`)
    Pow,
}

/// Context for expression evaluation, providing variable values
pub trait EvaluationContext {
    /// Get the value of a variable
    fn get_variable(&self, name: &str) -> ExprResult<f64>;

    /// Check if a variable exists
    fn has_variable(&self, name: &str) -> bool;
}

/// One element of a set of named arrays, used to evaluate an expression
/// element by element
struct ElementContext<'a> {
    symbols: &'a [(String, Vec<f64>)],
    index: usize,
}

impl EvaluationContext for ElementContext<'_> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        let (_, values) = self
            .symbols
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })?;
        // Single-element operands broadcast.
        if values.len() == 1 {
            Ok(values[0])
        } else {
            Ok(values[self.index])
        }
    }

    fn has_variable(&self, name: &str) -> bool {
        self.symbols.iter().any(|(n, _)| n == name)
    }
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        "inf" => Some(f64::INFINITY),
        _ => None,
    }
}

fn unary_function(name: &str, args: &[f64], f: fn(f64) -> f64) -> ExprResult<f64> {
    match args {
        [x] => Ok(f(*x)),
        _ => Err(ExpressionError::InvalidOperation {
            message: format!("{}() requires 1 argument, got {}", name, args.len()),
        }),
    }
}

impl Expression {
    /// Parse an expression from a string
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::arr1;
    /// use quantfit_rs::constraints::expression::Expression;
    ///
    /// let expr = Expression::parse("10 - 2 * x").unwrap();
    /// let x = arr1(&[1.0, 2.0]).into_dyn();
    /// let out = expr.evaluate_arrays(&[("x".to_string(), x)]).unwrap();
    /// assert_eq!(out, arr1(&[8.0, 6.0]).into_dyn());
    /// ```
    pub fn parse(input: &str) -> ExprResult<Self> {
        match expr_parser(input.trim()) {
            Ok((remainder, expr)) => {
                if remainder.trim().is_empty() {
                    Ok(expr)
                } else {
                    Err(ExpressionError::ParseError {
                        message: format!("Unexpected trailing characters: '{}'", remainder),
                    })
                }
            }
            Err(e) => Err(ExpressionError::ParseError {
                message: format!("{:?}", e),
            }),
        }
    }

    /// Evaluate the expression with the given context
    pub fn evaluate<C: EvaluationContext>(&self, context: &C) -> ExprResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),

            Self::Variable(name) => {
                if !context.has_variable(name) {
                    if let Some(c) = constant(name) {
                        return Ok(c);
                    }
                }
                context.get_variable(name)
            }

            Self::Unary(op, expr) => {
                let value = expr.evaluate(context)?;
                match op {
                    UnaryOp::Neg => Ok(-value),
                    UnaryOp::Plus => Ok(value),
                }
            }

            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;

                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div => {
                        if rhs == 0.0 {
                            Err(ExpressionError::DivisionByZero)
                        } else {
                            Ok(lhs / rhs)
                        }
                    }
                    BinaryOp::Pow => Ok(lhs.powf(rhs)),
                }
            }

            Self::Function(name, args) => {
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(context))
                    .collect::<ExprResult<Vec<f64>>>()?;

                match name.as_str() {
                    "sin" => unary_function(name, &args, f64::sin),
                    "cos" => unary_function(name, &args, f64::cos),
                    "tan" => unary_function(name, &args, f64::tan),
                    "exp" => unary_function(name, &args, f64::exp),
                    "log" | "ln" => unary_function(name, &args, f64::ln),
                    "log10" => unary_function(name, &args, f64::log10),
                    "sqrt" => unary_function(name, &args, f64::sqrt),
                    "abs" => unary_function(name, &args, f64::abs),
                    "max" | "min" if args.len() < 2 => Err(ExpressionError::InvalidOperation {
                        message: format!(
                            "{}() requires at least 2 arguments, got {}",
                            name,
                            args.len()
                        ),
                    }),
                    "max" => Ok(args.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b))),
                    "min" => Ok(args.iter().fold(f64::INFINITY, |a, &b| a.min(b))),
                    _ => Err(ExpressionError::UndefinedFunction {
                        name: name.to_string(),
                    }),
                }
            }
        }
    }

    /// Evaluate the expression element by element over named arrays
    ///
    /// All operands with more than one element must share a shape; single
    /// element operands are broadcast. The result takes the common shape, or
    /// is zero-dimensional when every operand is a scalar.
    pub fn evaluate_arrays(&self, symbols: &[(String, ArrayD<f64>)]) -> ExprResult<ArrayD<f64>> {
        let mut shape: Option<Vec<usize>> = None;
        for (name, values) in symbols {
            if values.len() == 1 {
                continue;
            }
            match &shape {
                None => shape = Some(values.shape().to_vec()),
                Some(s) if s.as_slice() != values.shape() => {
                    return Err(ExpressionError::InvalidOperation {
                        message: format!(
                            "operand '{}' has shape {:?}, expected {:?}",
                            name,
                            values.shape(),
                            s
                        ),
                    });
                }
                Some(_) => {}
            }
        }

        let flat: Vec<(String, Vec<f64>)> = symbols
            .iter()
            .map(|(name, values)| (name.clone(), values.iter().copied().collect()))
            .collect();
        let shape = shape.unwrap_or_default();
        let len = shape.iter().product::<usize>();

        let mut out = Vec::with_capacity(len);
        for index in 0..len {
            let context = ElementContext {
                symbols: &flat,
                index,
            };
            out.push(self.evaluate(&context)?);
        }

        ArrayD::from_shape_vec(IxDyn(&shape), out).map_err(|e| ExpressionError::InvalidOperation {
            message: e.to_string(),
        })
    }
}

// Parser functions using nom

type PResult<'a, T> = IResult<&'a str, T>;

fn ws(input: &str) -> PResult<'_, &str> {
    multispace0(input)
}

fn punct(input: &str, c: char) -> PResult<'_, char> {
    char(c).parse(input)
}

/// Parse an identifier (variable or function name)
fn identifier(input: &str) -> PResult<'_, String> {
    let mut parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));

    let (input, matched) = parser.parse(input)?;
    Ok((input, matched.to_string()))
}

/// Parse a comma-separated list of expressions (for function arguments)
fn args_list(input: &str) -> PResult<'_, Vec<Expression>> {
    let (mut input, first) = expr_parser(input)?;
    let mut args = vec![first];

    loop {
        let (rest, _) = ws(input)?;
        let Ok((rest, _)) = punct(rest, ',') else {
            return Ok((input, args));
        };
        let (rest, arg) = expr_parser(rest)?;
        args.push(arg);
        input = rest;
    }
}

/// Parse a function call
fn function_call(input: &str) -> PResult<'_, Expression> {
    let (input, name) = identifier(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = punct(input, '(')?;
    let (input, _) = ws(input)?;

    if let Ok((input, _)) = punct(input, ')') {
        return Ok((input, Expression::Function(name, vec![])));
    }

    let (input, args) = args_list(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = punct(input, ')')?;

    Ok((input, Expression::Function(name, args)))
}

/// Parse an unsigned number
fn number(input: &str) -> PResult<'_, Expression> {
    if !input.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        )));
    }
    let (input, num) = double(input)?;
    Ok((input, Expression::Number(num)))
}

/// Parse a variable reference
fn variable(input: &str) -> PResult<'_, Expression> {
    let (input, var_name) = identifier(input)?;
    Ok((input, Expression::Variable(var_name)))
}

/// Parse a parenthesized expression
fn parens(input: &str) -> PResult<'_, Expression> {
    let (input, _) = punct(input, '(')?;
    let (input, expr) = expr_parser(input)?;
    let (input, _) = ws(input)?;
    let (input, _) = punct(input, ')')?;
    Ok((input, expr))
}

/// Parse a primary expression (number, function call, variable or parenthesized expression)
fn primary(input: &str) -> PResult<'_, Expression> {
    let (input, _) = ws(input)?;

    if let Ok(result) = number(input) {
        return Ok(result);
    }
    if let Ok(result) = function_call(input) {
        return Ok(result);
    }
    if let Ok(result) = variable(input) {
        return Ok(result);
    }

    parens(input)
}

/// Parse a power expression; `^` and `**` associate to the right
fn power(input: &str) -> PResult<'_, Expression> {
    let (input, base) = primary(input)?;
    let (after_ws, _) = ws(input)?;

    let op: PResult<'_, &str> = alt((tag("**"), tag("^"))).parse(after_ws);
    match op {
        Ok((after_op, _)) => {
            let (rest, exponent) = unary(after_op)?;
            Ok((
                rest,
                Expression::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
            ))
        }
        Err(_) => Ok((input, base)),
    }
}

/// Parse a signed expression; signs bind looser than powers, so `-x^2` is `-(x^2)`
fn unary(input: &str) -> PResult<'_, Expression> {
    let (input, _) = ws(input)?;

    if let Ok((rest, _)) = punct(input, '-') {
        let (rest, expr) = unary(rest)?;
        return Ok((rest, Expression::Unary(UnaryOp::Neg, Box::new(expr))));
    }
    if let Ok((rest, _)) = punct(input, '+') {
        let (rest, expr) = unary(rest)?;
        return Ok((rest, Expression::Unary(UnaryOp::Plus, Box::new(expr))));
    }

    power(input)
}

/// Parse a multiplicative expression; operators associate to the left
fn term(input: &str) -> PResult<'_, Expression> {
    let (mut input, mut acc) = unary(input)?;

    loop {
        let (rest, _) = ws(input)?;
        let op = if let Ok((rest, _)) = punct(rest, '*') {
            Some((BinaryOp::Mul, rest))
        } else if let Ok((rest, _)) = punct(rest, '/') {
            Some((BinaryOp::Div, rest))
        } else {
            None
        };

        let Some((op, rest)) = op else {
            return Ok((input, acc));
        };
        let (rest, rhs) = unary(rest)?;
        acc = Expression::Binary(op, Box::new(acc), Box::new(rhs));
        input = rest;
    }
}

/// Parse an additive expression; operators associate to the left
fn expr_parser(input: &str) -> PResult<'_, Expression> {
    let (mut input, mut acc) = term(input)?;

    loop {
        let (rest, _) = ws(input)?;
        let op = if let Ok((rest, _)) = punct(rest, '+') {
            Some((BinaryOp::Add, rest))
        } else if let Ok((rest, _)) = punct(rest, '-') {
            Some((BinaryOp::Sub, rest))
        } else {
            None
        };

        let Some((op, rest)) = op else {
            return Ok((input, acc));
        };
        let (rest, rhs) = term(rest)?;
        acc = Expression::Binary(op, Box::new(acc), Box::new(rhs));
        input = rest;
    }
}

//! # Constraints
//!
//! A constraint ties one dependent quantity to a rule: a comparison against a
//! fixed limit or one of its own attributes, an expression over other
//! quantities, or an arbitrary function. Constraints refer to quantities only
//! by unique name and live in the registry next to them, so no quantity ever
//! owns another.
//!
//! Constraints are evaluated by the registry (see
//! [`Map`](crate::global_object::map::Map)): writing a Parameter's value runs
//! its constraint chain, and each constraint that writes a dependent may in
//! turn trigger that dependent's chain. Cascades are depth-first and bounded by
//! [`GlobalConfig::max_cascade_depth`](crate::global_object::GlobalConfig).

pub mod constraint;
pub mod expression;

pub use constraint::{Constraint, ConstraintFn, ConstraintKind, Independents};
pub use expression::{Expression, ExpressionError};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error that can occur when building or running constraints
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstraintError {
    #[error("Invalid constraint expression: {message}")]
    InvalidExpression { message: String },

    #[error("Unknown comparison operator: '{operator}'")]
    UnknownOperator { operator: String },

    #[error("{operators} operator(s) cannot be aligned with {independents} independent(s)")]
    OperatorCount { operators: usize, independents: usize },

    #[error("Dependent '{id}' must be enabled before it can be constrained")]
    DependentDisabled { id: String },

    #[error("Constraint cascade exceeded the maximum depth of {limit}")]
    CascadeDepth { limit: usize },
}

/// Handle of a constraint stored in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstraintId(pub(crate) u64);

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "constraint#{}", self.0)
    }
}

/// Comparison applied by numeric and self-referencing constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// Equal to (==)
    Equal,

    /// Less than (<)
    LessThan,

    /// Less than or equal to (<=)
    LessThanOrEqual,

    /// Greater than (>)
    GreaterThan,

    /// Greater than or equal to (>=)
    GreaterThanOrEqual,
}

impl ComparisonOp {
    /// Convert the comparison to its operator token
    pub fn as_operator(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
        }
    }

    /// Check whether `value <op> limit` holds
    pub fn holds(&self, value: f64, limit: f64) -> bool {
        match self {
            Self::Equal => value == limit,
            Self::LessThan => value < limit,
            Self::LessThanOrEqual => value <= limit,
            Self::GreaterThan => value > limit,
            Self::GreaterThanOrEqual => value >= limit,
        }
    }
}

impl FromStr for ComparisonOp {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "==" => Ok(Self::Equal),
            "<" => Ok(Self::LessThan),
            "<=" => Ok(Self::LessThanOrEqual),
            ">" => Ok(Self::GreaterThan),
            ">=" => Ok(Self::GreaterThanOrEqual),
            other => Err(ConstraintError::UnknownOperator {
                operator: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_operator())
    }
}

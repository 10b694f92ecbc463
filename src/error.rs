use thiserror::Error;

use crate::constraints::expression::ExpressionError;
use crate::constraints::ConstraintError;
use crate::global_object::undo_redo::UndoError;
use crate::units::UnitError;
use crate::variable::bounds::BoundsError;

/// Error types for the quantfit-rs library.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantError {
    /// A value or variance of the wrong type or shape was supplied.
    #[error("Type error: {0}")]
    Type(String),

    /// A value was of the right type but not acceptable.
    #[error("Value error: {0}")]
    Value(String),

    /// Unit parsing, conversion or algebra failed.
    #[error("Unit error: {0}")]
    Unit(#[from] UnitError),

    /// Division by an operand holding an exact zero.
    #[error("Division by zero: {0}")]
    ZeroDivision(String),

    /// Attempted mutation of a read-only property, or a malformed constraint.
    #[error("Attribute error: {0}")]
    Attribute(String),

    /// An array operation outside the supported set.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// No object is registered under the given unique name.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Error from the constraint expression interpreter.
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    /// Error from parameter bounds.
    #[error("Bounds error: {0}")]
    Bounds(#[from] BoundsError),

    /// Error from the constraint engine.
    #[error("Constraint error: {0}")]
    Constraint(#[from] ConstraintError),

    /// Error from the undo/redo stack.
    #[error("Undo error: {0}")]
    Undo(#[from] UndoError),
}

/// Result type alias for quantfit-rs operations.
pub type Result<T> = std::result::Result<T, QuantError>;

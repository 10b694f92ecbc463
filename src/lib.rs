//! # quantfit-rs
//!
//! `quantfit-rs` is a parameter and constraint engine for scientific model
//! fitting. It represents physical quantities with units and uncertainty,
//! ties quantities together with declarative constraints, and records every
//! mutation on an undo/redo stack so a fit can be rolled back as one unit.
//!
//! The library provides:
//! - Unit algebra with parsing, canonical forms and conversion ([`units`])
//! - Unit-aware scalars and arrays with variance propagation ([`UnitValue`])
//! - Named quantities: [`Descriptor`] and bounded, fixable [`Parameter`]s
//! - Numeric, self-referencing, expression and functional [`Constraint`]s
//! - A registry and command-pattern undo stack owned by a [`GlobalObject`]
//!
//! ## Basic Usage
//!
//! ```
//! use quantfit_rs::{Constraint, GlobalConfig, GlobalObject, Parameter};
//!
//! let mut global = GlobalObject::with_config(GlobalConfig::with_undo());
//! let a = global.add_parameter(Parameter::new("a", 1.0, "m").unwrap()).unwrap();
//! let b = global.add_parameter(Parameter::new("b", 1.0, "m").unwrap()).unwrap();
//!
//! // a = 2 * b, re-evaluated whenever b is written
//! let c = global.add_constraint(Constraint::obj(&a, "2*", &b).unwrap()).unwrap();
//! global.add_user_constraint(&b, "double", c).unwrap();
//!
//! global.set_value(&b, 5.0).unwrap();
//! assert_eq!(global.parameter(&a).unwrap().scalar(), Some(10.0));
//! assert!(!global.parameter(&a).unwrap().is_enabled());
//!
//! global.undo().unwrap();
//! assert_eq!(global.parameter(&a).unwrap().scalar(), Some(2.0));
//! ```

pub mod constraints;
pub mod error;
pub mod global_object;
pub mod units;
pub mod variable;

// Re-exports for convenience
pub use constraints::{Constraint, ConstraintId, Expression};
pub use error::{QuantError, Result};
pub use global_object::{GlobalConfig, GlobalObject, Map};
pub use units::{Unit, UnitError};
pub use variable::{Bounds, Descriptor, Parameter, UnitValue};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Variables
//!
//! The quantity model: unit-aware values with uncertainty and the named
//! quantities built on them.
//!
//! ## Core Components
//!
//! - [`UnitValue`]: magnitudes (scalar or array), a canonical unit, optional
//!   variances and named dimensions, with arithmetic that propagates units and
//!   first-order uncertainty
//! - [`Descriptor`]: a named `UnitValue` with metadata and a registry handle
//! - [`Parameter`]: a scalar descriptor with [`Bounds`], a fixed flag and
//!   attached constraints
//!
//! ## Example Usage
//!
//! ```rust
//! use quantfit_rs::variable::UnitValue;
//!
//! let a = UnitValue::with_variance(2.0, 0.1, "m").unwrap();
//! let b = UnitValue::with_variance(3.0, 0.2, "m").unwrap();
//!
//! let area = a.mul(&b).unwrap();
//! assert_eq!(area.unit().to_string(), "m^2");
//! assert_eq!(area.as_scalar(), Some(6.0));
//!
//! // 3² · 0.1 + 2² · 0.2
//! let var = area.variances().unwrap().sum();
//! assert!((var - 1.7).abs() < 1e-12);
//! ```

pub mod array_ops;
pub mod bounds;
pub mod descriptor;
pub mod parameter;
pub mod unit_value;


pub use array_ops::SUPPORTED_UFUNCS;
pub use bounds::{Bounds, BoundsError};
pub use descriptor::{Descriptor, DescriptorData, QuantityKind};
pub use parameter::Parameter;
pub use unit_value::{IntoMagnitude, UnitValue};

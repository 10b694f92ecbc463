//! # Unit algebra
//!
//! Physical units are products of named symbols raised to integer powers, e.g.
//! `m`, `km/s` or `m*kg/s^2`. Every symbol knows its SI scale and its dimension
//! vector, which is all that is needed for conversion and for checking that two
//! units are compatible.
//!
//! Unit strings are parsed with `nom` (see [`parser`]). Parsing yields a
//! [`ScaledUnit`]: a canonical [`Unit`] plus the numeric scale that was written
//! into the string (`"10dm^2"` has scale `0.1` relative to `m^2`). Quantities
//! fold that scale into their magnitude so that units never carry numbers.
//!
//! ```rust
//! use quantfit_rs::units::Unit;
//!
//! let speed: Unit = "km/s".parse().unwrap();
//! let si: Unit = "m/s".parse().unwrap();
//! assert_eq!(speed.conversion_factor(&si).unwrap(), 1000.0);
//! assert_eq!(speed.to_string(), "km/s");
//! ```

pub mod parser;
pub mod unit;

pub use unit::{Dimension, IntoUnit, ScaledUnit, Unit, UnitError};

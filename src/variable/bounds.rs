//! The `[min, max]` interval of a parameter
//!
//! Limits are inclusive and may be infinite. Enforcement happens in the
//! parameter's builtin constraints; [`Bounds`] only keeps a valid pair.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("lower limit {min} exceeds upper limit {max}")]
    Inverted { min: f64, max: f64 },

    #[error("a limit is NaN")]
    NotANumber,
}

/// Inclusive limits on a parameter's value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Bounds {
    /// Validated interval; `min == max` pins the value
    ///
    /// ```
    /// use quantfit_rs::Bounds;
    ///
    /// let pinned = Bounds::new(2.0, 2.0).unwrap();
    /// assert_eq!(pinned.clamp(5.0), 2.0);
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() {
            return Err(BoundsError::NotANumber);
        }
        if min > max {
            return Err(BoundsError::Inverted { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn unbounded() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    pub fn with_min(&self, min: f64) -> Result<Self, BoundsError> {
        Self::new(min, self.max)
    }

    pub fn with_max(&self, max: f64) -> Result<Self, BoundsError> {
        Self::new(self.min, max)
    }

    /// NaN is never contained
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    /// Limits multiplied by a unit conversion factor
    ///
    /// A negative factor swaps the limits so the interval stays ordered.
    pub fn scaled(&self, factor: f64) -> Result<Self, BoundsError> {
        let (a, b) = (self.min * factor, self.max * factor);
        if factor < 0.0 {
            Self::new(b, a)
        } else {
            Self::new(a, b)
        }
    }
}

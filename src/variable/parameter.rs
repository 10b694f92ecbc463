//! Parameters: scalar descriptors that a fit may vary

use crate::constraints::ConstraintId;
use crate::error::{QuantError, Result};
use crate::units::IntoUnit;
use crate::variable::bounds::Bounds;
use crate::variable::descriptor::Descriptor;
use crate::variable::unit_value::UnitValue;
use std::fmt;
use std::ops::Deref;

/// A scalar quantity with bounds, a fixed flag and attached constraints
///
/// A parameter dereferences to its [`Descriptor`]. Its constraints are stored
/// in the registry; the parameter keeps only their ids, in the order the
/// runner applies them.
///
/// # Examples
///
/// ```
/// use quantfit_rs::variable::Parameter;
///
/// let p = Parameter::new("amplitude", 2.0, "m").unwrap()
///     .with_bounds(0.0, 10.0)
///     .unwrap();
/// assert_eq!(p.min(), 0.0);
/// assert!(!p.is_fixed());
/// assert!(Parameter::new("x", 20.0, "m").unwrap().with_bounds(0.0, 10.0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    descriptor: Descriptor,
    bounds: Bounds,
    fixed: bool,
    builtin: Option<[ConstraintId; 2]>,
    user_constraints: Vec<(String, ConstraintId)>,
    fit_constraint: Option<ConstraintId>,
}

impl Parameter {
    pub fn new<U: IntoUnit>(name: impl Into<String>, value: f64, unit: U) -> Result<Self> {
        Self::from_unit_value(name, UnitValue::new(value, unit)?)
    }

    /// A parameter over an existing scalar value, variance included
    pub fn from_unit_value(name: impl Into<String>, value: UnitValue) -> Result<Self> {
        if !value.is_scalar() {
            return Err(QuantError::Type(format!(
                "a parameter holds a scalar, got shape {:?}",
                value.shape()
            )));
        }
        Ok(Self {
            descriptor: Descriptor::new(name, value),
            bounds: Bounds::default(),
            fixed: false,
            builtin: None,
            user_constraints: Vec::new(),
            fit_constraint: None,
        })
    }

    /// Set `[min, max]`; the current value must lie inside
    pub fn with_bounds(mut self, min: f64, max: f64) -> Result<Self> {
        let bounds = Bounds::new(min, max)?;
        let value = self.scalar().unwrap_or(f64::NAN);
        if !bounds.contains(value) {
            return Err(QuantError::Value(format!(
                "value {} is outside the bounds [{}, {}]",
                value, min, max
            )));
        }
        self.bounds = bounds;
        Ok(self)
    }

    pub fn with_fixed(mut self, fixed: bool) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.descriptor.set_enabled_raw(enabled);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.with_description(description);
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.with_display_name(display_name);
        self
    }

    pub fn with_unique_name(mut self, unique_name: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.with_unique_name(unique_name);
        self
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn min(&self) -> f64 {
        self.bounds.min
    }

    pub fn max(&self) -> f64 {
        self.bounds.max
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// True when a fit may vary this parameter
    pub fn is_free(&self) -> bool {
        self.is_enabled() && !self.fixed
    }

    /// User constraints by key, in insertion order
    pub fn user_constraints(&self) -> impl Iterator<Item = (&str, ConstraintId)> + '_ {
        self.user_constraints.iter().map(|(k, id)| (k.as_str(), *id))
    }

    pub fn user_constraint(&self, key: &str) -> Option<ConstraintId> {
        self.user_constraints
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, id)| *id)
    }

    /// The slot managed by a fitting engine
    pub fn fit_constraint(&self) -> Option<ConstraintId> {
        self.fit_constraint
    }

    /// The `>= min` and `<= max` constraints created at registration
    pub fn builtin_constraints(&self) -> Option<[ConstraintId; 2]> {
        self.builtin
    }

    /// Constraints run after a value write: builtin, user, then fit slot
    pub fn constraint_chain(&self) -> Vec<ConstraintId> {
        self.builtin
            .iter()
            .flatten()
            .copied()
            .chain(self.user_constraints.iter().map(|(_, id)| *id))
            .chain(self.fit_constraint)
            .collect()
    }

    pub(crate) fn descriptor_mut(&mut self) -> &mut Descriptor {
        &mut self.descriptor
    }

    pub(crate) fn set_bounds_raw(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    pub(crate) fn set_fixed_raw(&mut self, fixed: bool) {
        self.fixed = fixed;
    }

    pub(crate) fn set_builtin(&mut self, ids: [ConstraintId; 2]) {
        self.builtin = Some(ids);
    }

    /// Insert or replace; a replaced key keeps its position
    pub(crate) fn insert_user_constraint(&mut self, key: &str, id: ConstraintId) -> Option<ConstraintId> {
        match self.user_constraints.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => Some(std::mem::replace(&mut slot.1, id)),
            None => {
                self.user_constraints.push((key.to_string(), id));
                None
            }
        }
    }

    pub(crate) fn remove_user_constraint(&mut self, key: &str) -> Option<ConstraintId> {
        let index = self.user_constraints.iter().position(|(k, _)| k == key)?;
        Some(self.user_constraints.remove(index).1)
    }

    pub(crate) fn set_fit_constraint(&mut self, id: Option<ConstraintId>) -> Option<ConstraintId> {
        std::mem::replace(&mut self.fit_constraint, id)
    }

    /// Forget `id` wherever it is attached
    pub(crate) fn detach_constraint(&mut self, id: ConstraintId) {
        self.user_constraints.retain(|(_, c)| *c != id);
        if self.fit_constraint == Some(id) {
            self.fit_constraint = None;
        }
    }
}

impl Deref for Parameter {
    type Target = Descriptor;

    fn deref(&self) -> &Self::Target {
        &self.descriptor
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Parameter '{}': {}, bounds=[{}:{}]",
            self.display_name(),
            self.value(),
            self.bounds.min,
            self.bounds.max
        )?;
        if self.fixed {
            write!(f, " (fixed)")?;
        }
        write!(f, ">")
    }
}

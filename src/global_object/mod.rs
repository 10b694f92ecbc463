//! # Global object
//!
//! [`GlobalObject`] is the context every quantity lives in. It owns the
//! registry ([`Map`]), the undo history ([`UndoStack`]) and the
//! [`GlobalConfig`], and it is the only place quantities are mutated from.
//!
//! Each setter packages the raw mutation as a [`PropertyStack`] command and
//! pushes it on the stack. The push performs the mutation, so a disabled stack
//! still mutates but records nothing.
//!
//! ```
//! use quantfit_rs::{GlobalConfig, GlobalObject, Parameter};
//!
//! let mut global = GlobalObject::with_config(GlobalConfig::with_undo());
//! let p = global.add_parameter(Parameter::new("x", 1.0, "m").unwrap()).unwrap();
//!
//! global.set_value(&p, 2.0).unwrap();
//! assert_eq!(global.parameter(&p).unwrap().scalar(), Some(2.0));
//!
//! global.undo().unwrap();
//! assert_eq!(global.parameter(&p).unwrap().scalar(), Some(1.0));
//! ```

pub mod config;
pub mod map;
pub mod undo_redo;

pub use config::GlobalConfig;
pub use map::{BoundsState, Map, Quantity};
pub use undo_redo::{CommandHolder, PropertyStack, Setter, UndoCommand, UndoError, UndoStack};

use crate::constraints::{Constraint, ConstraintError, ConstraintId};
use crate::error::{QuantError, Result};
use crate::units::IntoUnit;
use crate::variable::bounds::Bounds;
use crate::variable::descriptor::Descriptor;
use crate::variable::parameter::Parameter;
use crate::variable::unit_value::{IntoMagnitude, UnitValue};
use ndarray::ArrayD;
use tracing::{debug, warn};

/// Registry, undo history and configuration of one modelling session
#[derive(Debug)]
pub struct GlobalObject {
    map: Map,
    stack: UndoStack<Map>,
    config: GlobalConfig,
}

impl Default for GlobalObject {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalObject {
    pub fn new() -> Self {
        Self::with_config(GlobalConfig::default())
    }

    pub fn with_config(config: GlobalConfig) -> Self {
        Self {
            map: Map::new(config.max_cascade_depth, config.debug),
            stack: UndoStack::new(config.undo_enabled, config.max_history),
            config,
        }
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn stack(&self) -> &UndoStack<Map> {
        &self.stack
    }

    /// Register a descriptor and return its unique name
    pub fn add_descriptor(&mut self, descriptor: Descriptor) -> Result<String> {
        self.map.register(descriptor)
    }

    /// Register a parameter and return its unique name
    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<String> {
        self.map.register(parameter)
    }

    pub fn descriptor(&self, key: &str) -> Result<&Descriptor> {
        self.map.get_descriptor(key)
    }

    pub fn parameter(&self, key: &str) -> Result<&Parameter> {
        self.map.get_parameter(key)
    }

    pub fn value(&self, key: &str) -> Result<&UnitValue> {
        Ok(self.map.get_descriptor(key)?.value())
    }

    /// Remove a quantity from the registry
    pub fn remove(&mut self, key: &str) -> Result<Quantity> {
        self.map.remove(key)
    }

    /// Unique names of the parameters a fit may vary
    pub fn free_parameters(&self) -> Vec<&str> {
        self.map.free_parameters()
    }

    fn record<V: Clone + 'static>(
        &mut self,
        key: &str,
        setter: Setter<Map, V>,
        old: V,
        new: V,
        text: String,
    ) -> Result<()> {
        let command = PropertyStack::new(key, setter, old, new, text);
        self.stack.push(Box::new(command), &mut self.map)
    }

    // Setters

    /// Set the magnitudes of a quantity, keeping its unit
    ///
    /// Writing a parameter runs its constraint chain.
    pub fn set_value<M: IntoMagnitude>(&mut self, key: &str, values: M) -> Result<()> {
        let descriptor = self.map.get_descriptor(key)?;
        let old = descriptor.value().clone();
        let new = old.with_values(values)?;
        descriptor.check_values(&new)?;
        self.record(key, Map::set_value_prop, old, new, format!("{}.value", key))
    }

    /// Always fails: the full value is read-only
    pub fn set_full_value(&mut self, key: &str, _value: UnitValue) -> Result<()> {
        Err(QuantError::Attribute(format!(
            "full_value of '{}' is read-only; set the value or convert the unit instead",
            key
        )))
    }

    /// Always fails: the unit changes only through [`convert_unit`](Self::convert_unit)
    pub fn set_unit(&mut self, key: &str, _unit: &str) -> Result<()> {
        Err(QuantError::Attribute(format!(
            "unit of '{}' is read-only; use convert_unit instead",
            key
        )))
    }

    pub fn set_variance<V: IntoMagnitude>(&mut self, key: &str, variance: V) -> Result<()> {
        let old = self.value(key)?.clone();
        let new = old.with_variances(Some(variance.into_magnitude()?))?;
        self.record(key, Map::replace_value_prop, old, new, format!("{}.variance", key))
    }

    /// Set the standard deviation; stored as its square
    pub fn set_error<E: IntoMagnitude>(&mut self, key: &str, error: E) -> Result<()> {
        let old = self.value(key)?.clone();
        let new = old.with_errors(Some(error.into_magnitude()?))?;
        self.record(key, Map::replace_value_prop, old, new, format!("{}.error", key))
    }

    pub fn clear_variance(&mut self, key: &str) -> Result<()> {
        let old = self.value(key)?.clone();
        let new = old.with_variances(None)?;
        self.record(key, Map::replace_value_prop, old, new, format!("{}.variance", key))
    }

    /// Convert a quantity to another unit of the same dimension, as one undo unit
    ///
    /// A parameter's bounds are converted along with its value. Constraints
    /// are not run.
    pub fn convert_unit<U: IntoUnit>(&mut self, key: &str, unit: U) -> Result<()> {
        let old = self.value(key)?.clone();
        let new = old.to_unit(unit)?;
        let factor = old.unit().conversion_factor(new.unit())?;
        let old_bounds = self.map.get_item_by_key(key)?.as_parameter().map(Parameter::bounds);
        let new_bounds = old_bounds
            .map(|b| b.scaled(factor))
            .transpose()?;

        let text = format!("{}.convert_unit({})", key, new.unit());
        self.record(
            key,
            Map::convert_unit_prop,
            (old_bounds, old),
            (new_bounds, new),
            text,
        )
    }

    pub fn set_display_name(&mut self, key: &str, display_name: impl Into<String>) -> Result<()> {
        let old = self
            .map
            .get_descriptor(key)?
            .display_name_override()
            .cloned();
        let new = Some(display_name.into());
        self.record(key, Map::set_display_name_prop, old, new, format!("{}.display_name", key))
    }

    pub fn set_enabled(&mut self, key: &str, enabled: bool) -> Result<()> {
        let old = self.map.get_descriptor(key)?.is_enabled();
        self.record(key, Map::set_enabled_prop, old, enabled, format!("{}.enabled", key))
    }

    pub fn set_fixed(&mut self, key: &str, fixed: bool) -> Result<()> {
        let old = self.map.get_parameter(key)?.is_fixed();
        self.record(key, Map::set_fixed_prop, old, fixed, format!("{}.fixed", key))
    }

    /// Set the lower bound; fails if the current value lies below it
    pub fn set_min(&mut self, key: &str, min: f64) -> Result<()> {
        let old = self.map.get_parameter(key)?.min();
        self.record(key, Map::set_min_prop, old, min, format!("{}.min", key))
    }

    /// Set the upper bound; fails if the current value lies above it
    pub fn set_max(&mut self, key: &str, max: f64) -> Result<()> {
        let old = self.map.get_parameter(key)?.max();
        self.record(key, Map::set_max_prop, old, max, format!("{}.max", key))
    }

    /// Replace both bounds at once
    ///
    /// The parameter is enabled and its value clamped into the new interval.
    /// Undo restores bounds, enabled flag and value together.
    pub fn set_bounds(&mut self, key: &str, min: f64, max: f64) -> Result<()> {
        let bounds = Bounds::new(min, max)?;
        let parameter = self.map.get_parameter(key)?;
        let current = parameter.value().clone();
        let clamped = parameter
            .scalar()
            .map(|v| bounds.clamp(v))
            .unwrap_or(f64::NAN);
        let old = BoundsState {
            bounds: parameter.bounds(),
            enabled: parameter.is_enabled(),
            value: current.clone(),
        };
        let new = BoundsState {
            bounds,
            enabled: true,
            value: current.with_values(clamped)?,
        };
        self.record(key, Map::set_bounds_prop, old, new, format!("{}.bounds", key))
    }

    // Constraints

    /// Register a constraint
    ///
    /// A constraint with independents takes ownership of a dependent
    /// parameter: the parameter is disabled until the constraint is removed.
    /// A parameter that is already disabled cannot be claimed.
    pub fn add_constraint(&mut self, mut constraint: Constraint) -> Result<ConstraintId> {
        let dependent = constraint.dependent_id().to_string();
        let item = self.map.get_item_by_key(&dependent)?;
        for id in constraint.independent_ids() {
            self.map.get_item_by_key(id)?;
        }

        let claims = constraint.has_independents() && item.as_parameter().is_some();
        if claims {
            if !item.descriptor().is_enabled() {
                return Err(ConstraintError::DependentDisabled { id: dependent }.into());
            }
            Map::set_enabled_prop(&mut self.map, &dependent, false)?;
            constraint.set_owns_dependent(true);
            debug!(dependent = %dependent, "dependent disabled by constraint");
        }

        let id = self.map.insert_constraint(constraint);
        debug!(constraint = %id, dependent = %dependent, "constraint added");
        Ok(id)
    }

    pub fn constraint(&self, id: ConstraintId) -> Result<&Constraint> {
        self.map.constraint(id)
    }

    /// Attach a registered constraint to a parameter under `name`
    ///
    /// The constraint runs whenever the parameter's value is written.
    pub fn add_user_constraint(&mut self, key: &str, name: &str, id: ConstraintId) -> Result<()> {
        self.map.constraint(id)?;
        self.map.parameter_mut(key)?.insert_user_constraint(name, id);
        Ok(())
    }

    pub fn remove_user_constraint(&mut self, key: &str, name: &str) -> Result<Option<ConstraintId>> {
        Ok(self.map.parameter_mut(key)?.remove_user_constraint(name))
    }

    /// Fill the fit-managed slot of a parameter, returning the previous occupant
    pub fn set_fit_constraint(
        &mut self,
        key: &str,
        id: Option<ConstraintId>,
    ) -> Result<Option<ConstraintId>> {
        if let Some(id) = id {
            self.map.constraint(id)?;
        }
        Ok(self.map.parameter_mut(key)?.set_fit_constraint(id))
    }

    /// Invoke a constraint and write its dependent
    pub fn call_constraint(&mut self, id: ConstraintId) -> Result<Option<ArrayD<f64>>> {
        self.map.call_constraint(id, false)
    }

    /// Compute a constraint's dependent value without writing it
    pub fn evaluate_constraint(&mut self, id: ConstraintId) -> Result<Option<ArrayD<f64>>> {
        self.map.call_constraint(id, true)
    }

    pub fn set_constraint_enabled(&mut self, id: ConstraintId, enabled: bool) -> Result<()> {
        self.map.set_constraint_enabled(id, enabled)
    }

    /// Tear a constraint down
    ///
    /// The constraint is detached from every parameter and an owned dependent
    /// is enabled again. A dependent that no longer exists is skipped.
    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<Constraint> {
        let constraint = self.map.take_constraint(id)?;
        self.map.detach_constraint(id);

        if constraint.owns_dependent() {
            let dependent = constraint.dependent_id();
            match Map::set_enabled_prop(&mut self.map, dependent, true) {
                Ok(()) => debug!(dependent = %dependent, "dependent re-enabled"),
                Err(e) if self.config.debug => {
                    warn!(dependent = %dependent, error = %e, "dependent already removed")
                }
                Err(e) => debug!(dependent = %dependent, error = %e, "dependent already removed"),
            }
        }
        Ok(constraint)
    }

    // Undo/redo

    pub fn set_undo_enabled(&mut self, enabled: bool) {
        self.config.undo_enabled = enabled;
        self.stack.set_enabled(enabled);
    }

    pub fn undo(&mut self) -> Result<bool> {
        self.stack.undo(&mut self.map)
    }

    pub fn redo(&mut self) -> Result<bool> {
        self.stack.redo(&mut self.map)
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    pub fn undo_text(&self) -> Option<&str> {
        self.stack.undo_text()
    }

    pub fn redo_text(&self) -> Option<&str> {
        self.stack.redo_text()
    }

    pub fn begin_macro(&mut self, label: impl Into<String>) {
        self.stack.begin_macro(label);
    }

    pub fn end_macro(&mut self) -> Result<()> {
        self.stack.end_macro()
    }

    pub fn clear_history(&mut self) {
        self.stack.clear();
    }

    /// Run `f` inside a macro labelled `label`
    ///
    /// The macro is closed whether or not `f` succeeds, so the whole run
    /// undoes as one unit.
    ///
    /// ```
    /// use quantfit_rs::{GlobalConfig, GlobalObject, Parameter};
    ///
    /// let mut global = GlobalObject::with_config(GlobalConfig::with_undo());
    /// let a = global.add_parameter(Parameter::new("a", 1.0, "").unwrap()).unwrap();
    /// let b = global.add_parameter(Parameter::new("b", 1.0, "").unwrap()).unwrap();
    ///
    /// global
    ///     .run_macro("Fitting routine", |g| {
    ///         g.set_value(&a, 3.0)?;
    ///         g.set_value(&b, 4.0)
    ///     })
    ///     .unwrap();
    /// assert_eq!(global.undo_text(), Some("Fitting routine"));
    ///
    /// global.undo().unwrap();
    /// assert_eq!(global.parameter(&a).unwrap().scalar(), Some(1.0));
    /// assert_eq!(global.parameter(&b).unwrap().scalar(), Some(1.0));
    /// ```
    pub fn run_macro<F, R>(&mut self, label: impl Into<String>, f: F) -> Result<R>
    where
        F: FnOnce(&mut Self) -> Result<R>,
    {
        self.begin_macro(label);
        let result = f(self);
        let closed = self.end_macro();
        let value = result?;
        closed?;
        Ok(value)
    }
}

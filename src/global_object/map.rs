//! The registry of live quantities and constraints
//!
//! Quantities are stored by unique name and constraints by [`ConstraintId`].
//! Constraints hold names, never references, so the [`Map`] is the only path
//! from a handle to the object it names.

use crate::constraints::{Constraint, ConstraintError, ConstraintId};
use crate::error::{QuantError, Result};
use crate::variable::bounds::Bounds;
use crate::variable::descriptor::{Descriptor, QuantityKind};
use crate::variable::parameter::Parameter;
use crate::variable::unit_value::{broadcast_owned, UnitValue};
use ndarray::{ArrayD, IxDyn};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// A registered quantity
#[derive(Debug, Clone, PartialEq)]
pub enum Quantity {
    Descriptor(Descriptor),
    Parameter(Parameter),
}

impl Quantity {
    pub fn descriptor(&self) -> &Descriptor {
        match self {
            Quantity::Descriptor(d) => d,
            Quantity::Parameter(p) => p.descriptor(),
        }
    }

    pub(crate) fn descriptor_mut(&mut self) -> &mut Descriptor {
        match self {
            Quantity::Descriptor(d) => d,
            Quantity::Parameter(p) => p.descriptor_mut(),
        }
    }

    pub fn as_parameter(&self) -> Option<&Parameter> {
        match self {
            Quantity::Parameter(p) => Some(p),
            Quantity::Descriptor(_) => None,
        }
    }

    pub(crate) fn as_parameter_mut(&mut self) -> Option<&mut Parameter> {
        match self {
            Quantity::Parameter(p) => Some(p),
            Quantity::Descriptor(_) => None,
        }
    }

    pub fn kind(&self) -> QuantityKind {
        match self {
            Quantity::Descriptor(d) => d.kind(),
            Quantity::Parameter(_) => QuantityKind::Parameter,
        }
    }
}

impl From<Descriptor> for Quantity {
    fn from(d: Descriptor) -> Self {
        Quantity::Descriptor(d)
    }
}

impl From<Parameter> for Quantity {
    fn from(p: Parameter) -> Self {
        Quantity::Parameter(p)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Descriptor(d) => fmt::Display::fmt(d, f),
            Quantity::Parameter(p) => fmt::Display::fmt(p, f),
        }
    }
}

/// Bounds, enabled flag and value of a parameter, restored together
#[derive(Debug, Clone, PartialEq)]
pub struct BoundsState {
    pub bounds: Bounds,
    pub enabled: bool,
    pub value: UnitValue,
}

/// Reshape a constraint result to the dependent's shape
fn fit_to_shape(result: ArrayD<f64>, shape: &[usize]) -> Result<ArrayD<f64>> {
    if result.shape() == shape {
        return Ok(result);
    }
    if result.len() == 1 {
        let v = result.iter().next().copied().unwrap_or(f64::NAN);
        return Ok(ArrayD::from_elem(IxDyn(shape), v));
    }
    broadcast_owned(&result, shape)
}

/// Registry of quantities and constraints
pub struct Map {
    items: HashMap<String, Quantity>,
    order: Vec<String>,
    counters: HashMap<QuantityKind, usize>,
    constraints: HashMap<ConstraintId, Constraint>,
    next_constraint: u64,
    cascade_depth: usize,
    max_cascade_depth: usize,
    debug: bool,
}

impl Default for Map {
    fn default() -> Self {
        Self::new(128, false)
    }
}

impl Map {
    pub fn new(max_cascade_depth: usize, debug: bool) -> Self {
        Self {
            items: HashMap::new(),
            order: Vec::new(),
            counters: HashMap::new(),
            constraints: HashMap::new(),
            next_constraint: 0,
            cascade_depth: 0,
            max_cascade_depth,
            debug,
        }
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Next free `<Kind>_<n>` name
    pub fn generate_unique_name(&mut self, kind: QuantityKind) -> String {
        let counter = self.counters.entry(kind).or_insert(0);
        loop {
            let candidate = format!("{}_{}", kind, counter);
            *counter += 1;
            if !self.items.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Register a quantity and return its unique name
    ///
    /// A parameter also gets its two builtin constraints, `value >= min` and
    /// `value <= max`.
    pub fn register(&mut self, quantity: impl Into<Quantity>) -> Result<String> {
        let mut quantity = quantity.into();
        let name = match quantity.descriptor().unique_name() {
            Some(name) => name.to_string(),
            None => self.generate_unique_name(quantity.kind()),
        };
        if self.items.contains_key(&name) {
            return Err(QuantError::Value(format!(
                "an object named '{}' is already registered",
                name
            )));
        }
        quantity.descriptor_mut().set_unique_name(name.clone());

        if let Some(parameter) = quantity.as_parameter_mut() {
            let lower = self.insert_constraint(Constraint::self_ref(&name, ">=", "min")?);
            let upper = self.insert_constraint(Constraint::self_ref(&name, "<=", "max")?);
            parameter.set_builtin([lower, upper]);
        }

        debug!(unique_name = %name, kind = %quantity.kind(), "registered");
        self.items.insert(name.clone(), quantity);
        self.order.push(name.clone());
        Ok(name)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Unique names in registration order
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    pub fn get_item_by_key(&self, key: &str) -> Result<&Quantity> {
        self.items
            .get(key)
            .ok_or_else(|| QuantError::NotFound(format!("no object named '{}'", key)))
    }

    pub(crate) fn get_item_mut(&mut self, key: &str) -> Result<&mut Quantity> {
        self.items
            .get_mut(key)
            .ok_or_else(|| QuantError::NotFound(format!("no object named '{}'", key)))
    }

    pub fn get_descriptor(&self, key: &str) -> Result<&Descriptor> {
        Ok(self.get_item_by_key(key)?.descriptor())
    }

    pub fn get_parameter(&self, key: &str) -> Result<&Parameter> {
        self.get_item_by_key(key)?
            .as_parameter()
            .ok_or_else(|| QuantError::Type(format!("'{}' is not a Parameter", key)))
    }

    pub(crate) fn parameter_mut(&mut self, key: &str) -> Result<&mut Parameter> {
        self.get_item_mut(key)?
            .as_parameter_mut()
            .ok_or_else(|| QuantError::Type(format!("'{}' is not a Parameter", key)))
    }

    /// Remove a quantity together with its builtin constraints
    ///
    /// Constraints that merely reference the quantity stay registered; they
    /// fail with `NotFound` when invoked.
    pub fn remove(&mut self, key: &str) -> Result<Quantity> {
        let quantity = self
            .items
            .remove(key)
            .ok_or_else(|| QuantError::NotFound(format!("no object named '{}'", key)))?;
        self.order.retain(|k| k != key);
        if let Some(ids) = quantity.as_parameter().and_then(Parameter::builtin_constraints) {
            for id in ids {
                self.constraints.remove(&id);
            }
        }
        debug!(unique_name = %key, "removed");
        Ok(quantity)
    }

    /// Drop every quantity and constraint; generated names are not reused
    pub fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
        self.constraints.clear();
    }

    /// Unique names of the enabled, unfixed parameters in registration order
    pub fn free_parameters(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|k| {
                self.items
                    .get(k.as_str())
                    .and_then(Quantity::as_parameter)
                    .is_some_and(Parameter::is_free)
            })
            .map(String::as_str)
            .collect()
    }

    /// Current magnitudes of a quantity, read without running constraints
    pub fn raw_value(&self, key: &str) -> Result<&ArrayD<f64>> {
        Ok(self.get_descriptor(key)?.value().values())
    }

    /// Attribute of a quantity as read by self-referencing constraints
    pub fn attribute(&self, key: &str, attribute: &str) -> Result<ArrayD<f64>> {
        let item = self.get_item_by_key(key)?;
        let value = item.descriptor().value();
        let missing = || QuantError::Attribute(format!("'{}' has no {}", key, attribute));
        let scalar = |x: f64| ArrayD::from_elem(IxDyn(&[]), x);

        match attribute {
            "min" => Ok(scalar(item.as_parameter().ok_or_else(missing)?.min())),
            "max" => Ok(scalar(item.as_parameter().ok_or_else(missing)?.max())),
            "value" => Ok(value.values().clone()),
            "variance" => value.variances().cloned().ok_or_else(missing),
            "error" => value.errors().ok_or_else(missing),
            _ => Err(missing()),
        }
    }

    pub(crate) fn insert_constraint(&mut self, constraint: Constraint) -> ConstraintId {
        let id = ConstraintId(self.next_constraint);
        self.next_constraint += 1;
        self.constraints.insert(id, constraint);
        id
    }

    pub fn constraint(&self, id: ConstraintId) -> Result<&Constraint> {
        self.constraints
            .get(&id)
            .ok_or_else(|| QuantError::NotFound(format!("no {}", id)))
    }

    pub(crate) fn constraint_mut(&mut self, id: ConstraintId) -> Result<&mut Constraint> {
        self.constraints
            .get_mut(&id)
            .ok_or_else(|| QuantError::NotFound(format!("no {}", id)))
    }

    pub(crate) fn take_constraint(&mut self, id: ConstraintId) -> Result<Constraint> {
        self.constraints
            .remove(&id)
            .ok_or_else(|| QuantError::NotFound(format!("no {}", id)))
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Detach a constraint id from every parameter
    pub(crate) fn detach_constraint(&mut self, id: ConstraintId) {
        for item in self.items.values_mut() {
            if let Some(p) = item.as_parameter_mut() {
                p.detach_constraint(id);
            }
        }
    }

    fn enter_cascade(&mut self) -> Result<()> {
        if self.cascade_depth >= self.max_cascade_depth {
            return Err(ConstraintError::CascadeDepth {
                limit: self.max_cascade_depth,
            }
            .into());
        }
        self.cascade_depth += 1;
        Ok(())
    }

    /// Store a value and run the constraint chain of a parameter
    pub fn write_value(&mut self, key: &str, value: UnitValue) -> Result<()> {
        self.enter_cascade()?;
        let result = self.write_and_run(key, value);
        self.cascade_depth -= 1;
        result
    }

    fn write_and_run(&mut self, key: &str, value: UnitValue) -> Result<()> {
        self.replace_value(key, value)?;
        let chain = match self.get_item_by_key(key)?.as_parameter() {
            Some(p) => p.constraint_chain(),
            None => return Ok(()),
        };

        for id in chain {
            let Some(constraint) = self.constraints.get(&id) else {
                continue;
            };
            if !constraint.is_enabled() {
                continue;
            }
            // A constraint on the value being written corrects it in place
            if constraint.dependent_id() == key {
                let corrected = constraint.evaluate(self)?;
                let current = self.get_descriptor(key)?.value();
                let corrected = fit_to_shape(corrected, current.shape())?;
                let updated = current.with_values(corrected)?;
                self.replace_value(key, updated)?;
            } else {
                self.call_constraint(id, false)?;
            }
        }
        Ok(())
    }

    /// Store a value without running any constraint
    pub fn replace_value(&mut self, key: &str, value: UnitValue) -> Result<()> {
        let descriptor = self.get_item_mut(key)?.descriptor_mut();
        descriptor.check_values(&value)?;
        descriptor.set_raw_value(value);
        Ok(())
    }

    /// Invoke a constraint
    ///
    /// A disabled constraint does nothing and returns `None`. With `no_set`
    /// the new dependent value is only computed and returned.
    pub fn call_constraint(&mut self, id: ConstraintId, no_set: bool) -> Result<Option<ArrayD<f64>>> {
        let constraint = self.constraint(id)?;
        if !constraint.is_enabled() {
            return Ok(None);
        }
        let dependent = constraint.dependent_id().to_string();
        let result = constraint.evaluate(self)?;
        let current = self.get_descriptor(&dependent)?.value();
        let result = fit_to_shape(result, current.shape())?;
        if no_set {
            return Ok(Some(result));
        }

        debug!(constraint = %id, dependent = %dependent, "applying constraint");
        let updated = current.with_values(result.clone())?;
        self.write_value(&dependent, updated)?;
        Ok(Some(result))
    }

    /// Enable or disable a constraint
    ///
    /// Enabling disables the dependent and pushes a fresh value into it;
    /// disabling hands the dependent back. If that first evaluation fails, the
    /// constraint and its dependent keep their previous flags.
    pub fn set_constraint_enabled(&mut self, id: ConstraintId, enabled: bool) -> Result<()> {
        let constraint = self.constraint(id)?;
        if constraint.is_enabled() == enabled {
            return Ok(());
        }
        let dependent = constraint.dependent_id().to_string();
        let was_enabled = self.get_descriptor(&dependent)?.is_enabled();

        debug!(dependent = %dependent, enabled = !enabled, "toggling dependent");
        self.get_item_mut(&dependent)?
            .descriptor_mut()
            .set_enabled_raw(!enabled);
        self.constraint_mut(id)?.set_enabled_flag(enabled);
        if !enabled {
            return Ok(());
        }

        if let Err(e) = self.call_constraint(id, false) {
            self.constraint_mut(id)?.set_enabled_flag(false);
            self.get_item_mut(&dependent)?
                .descriptor_mut()
                .set_enabled_raw(was_enabled);
            return Err(e);
        }
        Ok(())
    }

    // Raw setters replayed by the undo stack.

    pub(crate) fn set_value_prop(map: &mut Map, key: &str, value: UnitValue) -> Result<()> {
        map.write_value(key, value)
    }

    pub(crate) fn replace_value_prop(map: &mut Map, key: &str, value: UnitValue) -> Result<()> {
        map.replace_value(key, value)
    }

    /// Converted value plus, for a parameter, its converted bounds
    pub(crate) fn convert_unit_prop(
        map: &mut Map,
        key: &str,
        state: (Option<Bounds>, UnitValue),
    ) -> Result<()> {
        let (bounds, value) = state;
        map.replace_value(key, value)?;
        if let Some(bounds) = bounds {
            map.parameter_mut(key)?.set_bounds_raw(bounds);
        }
        Ok(())
    }

    pub(crate) fn set_display_name_prop(map: &mut Map, key: &str, name: Option<String>) -> Result<()> {
        map.get_item_mut(key)?
            .descriptor_mut()
            .set_display_name_raw(name);
        Ok(())
    }

    pub(crate) fn set_enabled_prop(map: &mut Map, key: &str, enabled: bool) -> Result<()> {
        map.get_item_mut(key)?.descriptor_mut().set_enabled_raw(enabled);
        Ok(())
    }

    pub(crate) fn set_fixed_prop(map: &mut Map, key: &str, fixed: bool) -> Result<()> {
        map.parameter_mut(key)?.set_fixed_raw(fixed);
        Ok(())
    }

    pub(crate) fn set_min_prop(map: &mut Map, key: &str, min: f64) -> Result<()> {
        let parameter = map.parameter_mut(key)?;
        let value = parameter.scalar().unwrap_or(f64::NAN);
        if value < min {
            return Err(QuantError::Value(format!(
                "the current value ({}) is smaller than the desired min ({})",
                value, min
            )));
        }
        let bounds = parameter.bounds().with_min(min)?;
        parameter.set_bounds_raw(bounds);
        Ok(())
    }

    pub(crate) fn set_max_prop(map: &mut Map, key: &str, max: f64) -> Result<()> {
        let parameter = map.parameter_mut(key)?;
        let value = parameter.scalar().unwrap_or(f64::NAN);
        if value > max {
            return Err(QuantError::Value(format!(
                "the current value ({}) is greater than the desired max ({})",
                value, max
            )));
        }
        let bounds = parameter.bounds().with_max(max)?;
        parameter.set_bounds_raw(bounds);
        Ok(())
    }

    pub(crate) fn set_bounds_prop(map: &mut Map, key: &str, state: BoundsState) -> Result<()> {
        let parameter = map.parameter_mut(key)?;
        parameter.set_bounds_raw(state.bounds);
        parameter.descriptor_mut().set_enabled_raw(state.enabled);
        map.write_value(key, state.value)
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("items", &self.order)
            .field("constraints", &self.constraints.len())
            .field("max_cascade_depth", &self.max_cascade_depth)
            .finish()
    }
}

//! Descriptors: named quantities with metadata

use crate::error::{QuantError, Result};
use crate::units::IntoUnit;
use crate::variable::unit_value::{IntoMagnitude, UnitValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registration kind of a quantity, used as the prefix of generated unique names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantityKind {
    DescriptorNumber,
    DescriptorArray,
    Parameter,
}

impl QuantityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantityKind::DescriptorNumber => "DescriptorNumber",
            QuantityKind::DescriptorArray => "DescriptorArray",
            QuantityKind::Parameter => "Parameter",
        }
    }
}

impl fmt::Display for QuantityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named [`UnitValue`] with identity and descriptive metadata
///
/// A descriptor gets its `unique_name` when it is registered; the name is
/// fixed from then on and is the only handle constraints use.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    name: String,
    unique_name: Option<String>,
    description: String,
    url: String,
    display_name: Option<String>,
    parent: Option<String>,
    value: UnitValue,
    enabled: bool,
}

impl Descriptor {
    pub fn new(name: impl Into<String>, value: UnitValue) -> Self {
        Self {
            name: name.into(),
            unique_name: None,
            description: String::new(),
            url: String::new(),
            display_name: None,
            parent: None,
            value,
            enabled: true,
        }
    }

    /// A scalar descriptor
    ///
    /// # Examples
    ///
    /// ```
    /// use quantfit_rs::variable::Descriptor;
    ///
    /// let d = Descriptor::number("length", 2.0, "cm").unwrap();
    /// assert_eq!(d.display_name(), "length");
    /// assert_eq!(d.value().unit().to_string(), "cm");
    /// ```
    pub fn number<U: IntoUnit>(name: impl Into<String>, value: f64, unit: U) -> Result<Self> {
        Ok(Self::new(name, UnitValue::new(value, unit)?))
    }

    /// An array descriptor
    pub fn array<M: IntoMagnitude, U: IntoUnit>(
        name: impl Into<String>,
        values: M,
        unit: U,
    ) -> Result<Self> {
        Ok(Self::new(name, UnitValue::new(values, unit)?))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Request a specific unique name instead of a generated one
    pub fn with_unique_name(mut self, unique_name: impl Into<String>) -> Self {
        self.unique_name = Some(unique_name.into());
        self
    }

    /// Unique name of the owning object; used for lookup only
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry handle, `None` until registered
    pub fn unique_name(&self) -> Option<&str> {
        self.unique_name.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The display name, falling back to `name`
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn value(&self) -> &UnitValue {
        &self.value
    }

    /// The complete value: magnitudes, unit and variances
    pub fn full_value(&self) -> &UnitValue {
        &self.value
    }

    /// The value of a scalar descriptor
    pub fn scalar(&self) -> Option<f64> {
        self.value.as_scalar()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn kind(&self) -> QuantityKind {
        if self.value.is_scalar() {
            QuantityKind::DescriptorNumber
        } else {
            QuantityKind::DescriptorArray
        }
    }

    /// Serde snapshot of the descriptor's state
    pub fn as_data(&self) -> DescriptorData {
        DescriptorData {
            name: self.name.clone(),
            unique_name: self.unique_name.clone(),
            values: self.value.values().iter().copied().collect(),
            shape: self.value.shape().to_vec(),
            unit: self.value.unit().to_string(),
            variance: self
                .value
                .variances()
                .map(|v| v.iter().copied().collect()),
            description: self.description.clone(),
            url: self.url.clone(),
            display_name: self.display_name.clone(),
        }
    }

    /// Check that `values` may replace the current magnitudes
    pub(crate) fn check_values(&self, values: &UnitValue) -> Result<()> {
        if self.value.is_scalar() && !values.is_scalar() {
            return Err(QuantError::Type(format!(
                "{} '{}' holds a scalar, got shape {:?}",
                self.kind(),
                self.name,
                values.shape()
            )));
        }
        if !self.value.is_scalar() && values.is_scalar() {
            return Err(QuantError::Type(format!(
                "{} '{}' holds an array, got a scalar",
                self.kind(),
                self.name
            )));
        }
        Ok(())
    }

    pub(crate) fn set_unique_name(&mut self, unique_name: String) {
        self.unique_name = Some(unique_name);
    }

    pub(crate) fn set_raw_value(&mut self, value: UnitValue) {
        self.value = value;
    }

    pub(crate) fn set_display_name_raw(&mut self, display_name: Option<String>) {
        self.display_name = display_name;
    }

    pub(crate) fn set_enabled_raw(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn display_name_override(&self) -> Option<&String> {
        self.display_name.as_ref()
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} '{}': {}>", self.kind(), self.display_name(), self.value)
    }
}

/// Serialisable view of a [`Descriptor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorData {
    pub name: String,
    pub unique_name: Option<String>,
    pub values: Vec<f64>,
    pub shape: Vec<usize>,
    pub unit: String,
    pub variance: Option<Vec<f64>>,
    pub description: String,
    pub url: String,
    pub display_name: Option<String>,
}

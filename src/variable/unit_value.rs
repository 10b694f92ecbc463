//! Unit-aware values with variance propagation
//!
//! A [`UnitValue`] couples a magnitude (a zero-dimensional array for scalars,
//! an n-dimensional array otherwise) with a canonical [`Unit`], optional
//! per-element variances and one name per array dimension. All arithmetic
//! returns a new value; nothing is mutated in place.

use crate::error::{QuantError, Result};
use crate::units::{IntoUnit, Unit};
use ndarray::{Array1, Array2, ArrayD, IxDyn};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use tracing::warn;

/// Anything that can become the magnitude of a [`UnitValue`]
pub trait IntoMagnitude {
    fn into_magnitude(self) -> Result<ArrayD<f64>>;
}

impl IntoMagnitude for f64 {
    fn into_magnitude(self) -> Result<ArrayD<f64>> {
        Ok(ArrayD::from_elem(IxDyn(&[]), self))
    }
}

impl IntoMagnitude for Vec<f64> {
    fn into_magnitude(self) -> Result<ArrayD<f64>> {
        Ok(Array1::from(self).into_dyn())
    }
}

impl IntoMagnitude for &[f64] {
    fn into_magnitude(self) -> Result<ArrayD<f64>> {
        self.to_vec().into_magnitude()
    }
}

impl IntoMagnitude for Vec<Vec<f64>> {
    fn into_magnitude(self) -> Result<ArrayD<f64>> {
        let rows = self.len();
        let cols = self.first().map_or(0, Vec::len);
        if self.iter().any(|row| row.len() != cols) {
            return Err(QuantError::Type(
                "rows must all have the same length".to_string(),
            ));
        }
        let flat: Vec<f64> = self.into_iter().flatten().collect();
        Array2::from_shape_vec((rows, cols), flat)
            .map(|a| a.into_dyn())
            .map_err(|e| QuantError::Type(e.to_string()))
    }
}

impl IntoMagnitude for Array1<f64> {
    fn into_magnitude(self) -> Result<ArrayD<f64>> {
        Ok(self.into_dyn())
    }
}

impl IntoMagnitude for Array2<f64> {
    fn into_magnitude(self) -> Result<ArrayD<f64>> {
        Ok(self.into_dyn())
    }
}

impl IntoMagnitude for ArrayD<f64> {
    fn into_magnitude(self) -> Result<ArrayD<f64>> {
        Ok(self)
    }
}

/// Default dimension names: `dim0`, `dim1`, ...
pub(crate) fn default_dims(ndim: usize) -> Vec<String> {
    (0..ndim).map(|i| format!("dim{}", i)).collect()
}

fn validate_variance(values: &ArrayD<f64>, variance: &ArrayD<f64>) -> Result<()> {
    if variance.shape() != values.shape() {
        return Err(QuantError::Value(format!(
            "variance shape {:?} does not match value shape {:?}",
            variance.shape(),
            values.shape()
        )));
    }
    if variance.iter().any(|&v| v < 0.0) {
        return Err(QuantError::Value(
            "variance must be non-negative".to_string(),
        ));
    }
    Ok(())
}

/// Broadcast `array` to `shape`, copying the data
pub(crate) fn broadcast_owned(array: &ArrayD<f64>, shape: &[usize]) -> Result<ArrayD<f64>> {
    array
        .broadcast(IxDyn(shape))
        .map(|view| view.to_owned())
        .ok_or_else(|| {
            QuantError::Value(format!(
                "cannot broadcast shape {:?} to {:?}",
                array.shape(),
                shape
            ))
        })
}

fn sum_variances(
    a: Option<ArrayD<f64>>,
    b: Option<ArrayD<f64>>,
    shape: &[usize],
) -> Result<Option<ArrayD<f64>>> {
    let out = match (a, b) {
        (None, None) => None,
        (Some(a), None) | (None, Some(a)) => Some(broadcast_owned(&a, shape)?),
        (Some(a), Some(b)) => Some(&a + &b),
    };
    Ok(out)
}

/// A numeric payload bound to a unit, with optional variance
#[derive(Debug, Clone, PartialEq)]
pub struct UnitValue {
    values: ArrayD<f64>,
    variances: Option<ArrayD<f64>>,
    unit: Unit,
    dims: Vec<String>,
}

impl UnitValue {
    /// Create a value without variance
    ///
    /// Any numeric scale carried by the unit string is folded into the values.
    ///
    /// # Examples
    ///
    /// ```
    /// use quantfit_rs::variable::UnitValue;
    ///
    /// let area = UnitValue::new(3.0, "10dm^2").unwrap();
    /// assert_eq!(area.unit().to_string(), "m^2");
    /// assert!((area.as_scalar().unwrap() - 0.3).abs() < 1e-12);
    /// ```
    pub fn new<M: IntoMagnitude, U: IntoUnit>(values: M, unit: U) -> Result<Self> {
        Self::from_parts(values.into_magnitude()?, None, unit)
    }

    /// Create a value with variance
    pub fn with_variance<M: IntoMagnitude, V: IntoMagnitude, U: IntoUnit>(
        values: M,
        variance: V,
        unit: U,
    ) -> Result<Self> {
        Self::from_parts(values.into_magnitude()?, Some(variance.into_magnitude()?), unit)
    }

    /// Create a two-dimensional value from rows
    pub fn from_rows<U: IntoUnit>(rows: Vec<Vec<f64>>, unit: U) -> Result<Self> {
        Self::new(rows, unit)
    }

    fn from_parts<U: IntoUnit>(
        values: ArrayD<f64>,
        variances: Option<ArrayD<f64>>,
        unit: U,
    ) -> Result<Self> {
        let scaled = unit.into_scaled_unit()?;
        if let Some(v) = &variances {
            validate_variance(&values, v)?;
        }
        let scale = scaled.scale;
        let dims = default_dims(values.ndim());
        let (values, variances) = if scale == 1.0 {
            (values, variances)
        } else {
            (values * scale, variances.map(|v| v * (scale * scale)))
        };
        Ok(Self {
            values,
            variances,
            unit: scaled.unit,
            dims,
        })
    }

    pub(crate) fn from_raw(
        values: ArrayD<f64>,
        variances: Option<ArrayD<f64>>,
        unit: Unit,
        dims: Vec<String>,
    ) -> Self {
        Self {
            values,
            variances,
            unit,
            dims,
        }
    }

    /// Magnitudes in the value's unit
    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    /// The magnitude of a zero-dimensional value
    pub fn as_scalar(&self) -> Option<f64> {
        if self.is_scalar() {
            self.values.iter().next().copied()
        } else {
            None
        }
    }

    /// Variances, if any
    pub fn variances(&self) -> Option<&ArrayD<f64>> {
        self.variances.as_ref()
    }

    /// Standard deviations, the square root of the variances
    pub fn errors(&self) -> Option<ArrayD<f64>> {
        self.variances.as_ref().map(|v| v.mapv(f64::sqrt))
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// Dimension names, one per axis
    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    pub fn is_scalar(&self) -> bool {
        self.values.ndim() == 0
    }

    /// Replace the magnitudes, keeping the unit
    ///
    /// Existing variances are kept when the shape is unchanged and dropped
    /// otherwise. Dimension names are reset when the number of axes changes.
    pub fn with_values<M: IntoMagnitude>(&self, values: M) -> Result<Self> {
        let values = values.into_magnitude()?;
        let same_shape = values.shape() == self.values.shape();
        let dims = if values.ndim() == self.values.ndim() {
            self.dims.clone()
        } else {
            default_dims(values.ndim())
        };
        Ok(Self {
            variances: if same_shape { self.variances.clone() } else { None },
            values,
            unit: self.unit.clone(),
            dims,
        })
    }

    /// Replace the variances
    pub fn with_variances(&self, variances: Option<ArrayD<f64>>) -> Result<Self> {
        if let Some(v) = &variances {
            validate_variance(&self.values, v)?;
        }
        Ok(Self {
            variances,
            ..self.clone()
        })
    }

    /// Replace the variances by the squares of `errors`
    pub fn with_errors(&self, errors: Option<ArrayD<f64>>) -> Result<Self> {
        if let Some(e) = &errors {
            if e.iter().any(|&x| x < 0.0) {
                return Err(QuantError::Value(
                    "standard deviation must be non-negative".to_string(),
                ));
            }
        }
        self.with_variances(errors.map(|e| e.mapv(|x| x * x)))
    }

    /// Convert to another unit of the same dimension
    ///
    /// # Examples
    ///
    /// ```
    /// use quantfit_rs::variable::UnitValue;
    ///
    /// let d = UnitValue::with_variance(1.0, 0.01, "m").unwrap();
    /// let cm = d.to_unit("cm").unwrap();
    /// assert_eq!(cm.as_scalar(), Some(100.0));
    /// assert_eq!(cm.unit().to_string(), "cm");
    /// ```
    pub fn to_unit<U: IntoUnit>(&self, target: U) -> Result<Self> {
        let target = target.into_scaled_unit()?;
        let factor = self.unit.conversion_factor(&target.unit)?;
        Ok(Self {
            values: &self.values * factor,
            variances: self.variances.as_ref().map(|v| v * (factor * factor)),
            unit: target.unit,
            dims: self.dims.clone(),
        })
    }

    /// Shape and dimension names of a binary operation's result
    fn broadcast_with(&self, rhs: &UnitValue) -> Result<(Vec<usize>, Vec<String>)> {
        match (self.is_scalar(), rhs.is_scalar()) {
            (true, true) => Ok((Vec::new(), Vec::new())),
            (true, false) => {
                self.warn_correlated_broadcast(rhs.shape());
                Ok((rhs.shape().to_vec(), rhs.dims.clone()))
            }
            (false, true) => {
                rhs.warn_correlated_broadcast(self.shape());
                Ok((self.shape().to_vec(), self.dims.clone()))
            }
            (false, false) => {
                if self.shape() != rhs.shape() {
                    return Err(QuantError::Value(format!(
                        "shapes {:?} and {:?} do not match",
                        self.shape(),
                        rhs.shape()
                    )));
                }
                if self.dims != rhs.dims {
                    return Err(QuantError::Value(format!(
                        "dimensions {:?} and {:?} do not match",
                        self.dims, rhs.dims
                    )));
                }
                Ok((self.shape().to_vec(), self.dims.clone()))
            }
        }
    }

    fn warn_correlated_broadcast(&self, shape: &[usize]) {
        if self.variances.is_some() {
            warn!(
                shape = ?shape,
                "broadcasting a scalar variance over an array; result elements are correlated"
            );
        }
    }

    /// Add two values; the result is expressed in the unit of `self`
    pub fn add(&self, rhs: &UnitValue) -> Result<Self> {
        self.additive(rhs, 1.0)
    }

    /// Subtract two values; the result is expressed in the unit of `self`
    pub fn sub(&self, rhs: &UnitValue) -> Result<Self> {
        self.additive(rhs, -1.0)
    }

    fn additive(&self, rhs: &UnitValue, sign: f64) -> Result<Self> {
        let factor = rhs.unit.conversion_factor(&self.unit)?;
        let (shape, dims) = self.broadcast_with(rhs)?;

        let values = &self.values + &(&rhs.values * (sign * factor));
        let variances = sum_variances(
            self.variances.clone(),
            rhs.variances.as_ref().map(|v| v * (factor * factor)),
            &shape,
        )?;

        Ok(Self {
            values,
            variances,
            unit: self.unit.clone(),
            dims,
        })
    }

    /// Multiply two values, combining their units
    pub fn mul(&self, rhs: &UnitValue) -> Result<Self> {
        let (shape, dims) = self.broadcast_with(rhs)?;
        let unit = self.unit.mul(&rhs.unit);
        let scale = unit.scale;

        let a = &self.values;
        let b = &rhs.values;
        let values = (a * b) * scale;

        // σ²_c = b²σ²_a + a²σ²_b
        let from_a = self.variances.as_ref().map(|va| va * &b.mapv(|x| x * x));
        let from_b = rhs.variances.as_ref().map(|vb| vb * &a.mapv(|x| x * x));
        let variances =
            sum_variances(from_a, from_b, &shape)?.map(|v| v * (scale * scale));

        Ok(Self {
            values,
            variances,
            unit: unit.unit,
            dims,
        })
    }

    /// Divide two values, combining their units
    ///
    /// Fails with [`QuantError::ZeroDivision`] if any element of `rhs` is zero.
    pub fn div(&self, rhs: &UnitValue) -> Result<Self> {
        if rhs.values.iter().any(|&x| x == 0.0) {
            return Err(QuantError::ZeroDivision(
                "divisor contains an exact zero".to_string(),
            ));
        }
        let (shape, dims) = self.broadcast_with(rhs)?;
        let unit = self.unit.div(&rhs.unit);
        let scale = unit.scale;

        let a = &self.values;
        let b = &rhs.values;
        let values = (a / b) * scale;

        // σ²_c = σ²_a/b² + a²σ²_b/b⁴
        let from_a = self.variances.as_ref().map(|va| va / &b.mapv(|x| x * x));
        let from_b = rhs
            .variances
            .as_ref()
            .map(|vb| vb * &(a.mapv(|x| x * x) / b.mapv(|x| x.powi(4))));
        let variances =
            sum_variances(from_a, from_b, &shape)?.map(|v| v * (scale * scale));

        Ok(Self {
            values,
            variances,
            unit: unit.unit,
            dims,
        })
    }

    /// Raise to a dimensionless, variance-free scalar power
    ///
    /// Non-integer powers are only allowed on dimensionless values. Named
    /// ratios such as `rad` or `deg` are first folded into a plain number, so
    /// `deg**0.5` is the square root of the angle in radians.
    pub fn pow(&self, exponent: &UnitValue) -> Result<Self> {
        if !exponent.unit.is_dimensionless() {
            return Err(crate::units::UnitError::InvalidOperation {
                message: format!("exponent must be dimensionless, got '{}'", exponent.unit),
            }
            .into());
        }
        if exponent.variances.is_some() {
            return Err(QuantError::Value(
                "exponent must not carry a variance".to_string(),
            ));
        }
        let n = exponent.as_scalar().ok_or_else(|| {
            QuantError::Value("exponent must be a scalar".to_string())
        })?;

        if n.fract() != 0.0
            && !self.unit.is_dimensionless()
            && self.unit.dimension().is_dimensionless()
        {
            let factor = self.unit.conversion_factor(&Unit::dimensionless())?;
            let plain = Self {
                values: &self.values * factor,
                variances: self.variances.as_ref().map(|v| v * (factor * factor)),
                unit: Unit::dimensionless(),
                dims: self.dims.clone(),
            };
            return plain.pow(exponent);
        }

        let unit = if self.unit.is_dimensionless() {
            Unit::dimensionless()
        } else {
            if n.fract() != 0.0 {
                return Err(crate::units::UnitError::InvalidOperation {
                    message: format!("cannot raise '{}' to the non-integer power {}", self.unit, n),
                }
                .into());
            }
            self.unit.powi(n as i32)
        };

        let values = self.values.mapv(|x| x.powf(n));
        if values.iter().any(|x| x.is_nan()) && !self.values.iter().any(|x| x.is_nan()) {
            return Err(QuantError::Value(format!(
                "raising to the power {} produced NaN",
                n
            )));
        }

        // σ²_c = (n·xⁿ⁻¹)² σ²
        let variances = self.variances.as_ref().map(|v| {
            let derivative = self.values.mapv(|x| {
                let d = n * x.powf(n - 1.0);
                d * d
            });
            v * &derivative
        });

        Ok(Self {
            values,
            variances,
            unit,
            dims: self.dims.clone(),
        })
    }

    /// Raise to an integer power
    pub fn powi(&self, n: i32) -> Result<Self> {
        self.pow(&UnitValue::from(f64::from(n)))
    }

    /// Negate the magnitudes; unit and variance are unchanged
    pub fn neg(&self) -> Self {
        Self {
            values: self.values.mapv(|x| -x),
            ..self.clone()
        }
    }

    /// Absolute magnitudes; unit and variance are unchanged
    pub fn abs(&self) -> Self {
        Self {
            values: self.values.mapv(f64::abs),
            ..self.clone()
        }
    }
}

impl From<f64> for UnitValue {
    fn from(value: f64) -> Self {
        Self {
            values: ArrayD::from_elem(IxDyn(&[]), value),
            variances: None,
            unit: Unit::dimensionless(),
            dims: Vec::new(),
        }
    }
}

impl Add for &UnitValue {
    type Output = Result<UnitValue>;
    fn add(self, rhs: Self) -> Self::Output {
        UnitValue::add(self, rhs)
    }
}

impl Sub for &UnitValue {
    type Output = Result<UnitValue>;
    fn sub(self, rhs: Self) -> Self::Output {
        UnitValue::sub(self, rhs)
    }
}

impl Mul for &UnitValue {
    type Output = Result<UnitValue>;
    fn mul(self, rhs: Self) -> Self::Output {
        UnitValue::mul(self, rhs)
    }
}

impl Div for &UnitValue {
    type Output = Result<UnitValue>;
    fn div(self, rhs: Self) -> Self::Output {
        UnitValue::div(self, rhs)
    }
}

impl Neg for &UnitValue {
    type Output = UnitValue;
    fn neg(self) -> Self::Output {
        UnitValue::neg(self)
    }
}

impl fmt::Display for UnitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.as_scalar(), &self.variances) {
            (Some(v), Some(var)) => {
                let sigma = var.iter().next().copied().unwrap_or(0.0).sqrt();
                write!(f, "{} ± {} {}", v, sigma, self.unit)
            }
            (Some(v), None) => write!(f, "{} {}", v, self.unit),
            (None, _) => write!(f, "{} {}", self.values, self.unit),
        }
    }
}

//! Array operations on [`UnitValue`]: reductions, slicing, named dimensions,
//! matrix products and the whitelist of array functions.

use crate::error::{QuantError, Result};
use crate::variable::unit_value::UnitValue;
use ndarray::{Array2, ArrayD, Axis, Ix2, Slice};
use std::collections::HashSet;
use std::ops::Range;

/// Array functions that [`UnitValue::apply_ufunc`] dispatches
pub const SUPPORTED_UFUNCS: &[&str] = &[
    "add", "subtract", "multiply", "divide", "power", "negative", "absolute", "sum",
];

fn sum_axis(array: &ArrayD<f64>, axis: usize) -> ArrayD<f64> {
    array.sum_axis(Axis(axis))
}

/// Sum of the diagonal over two axes, `i < j`
fn trace_axes(array: &ArrayD<f64>, i: usize, j: usize) -> ArrayD<f64> {
    let n = array.len_of(Axis(i)).min(array.len_of(Axis(j)));
    let mut shape = array.shape().to_vec();
    shape.remove(j);
    shape.remove(i);
    let mut out = ArrayD::zeros(shape);
    for k in 0..n {
        // Removing the later axis first keeps the index of the earlier one.
        let diagonal = array.index_axis(Axis(j), k);
        let diagonal = diagonal.index_axis(Axis(i), k);
        out += &diagonal;
    }
    out
}

fn as_matrix(array: &ArrayD<f64>, as_row: bool) -> Result<Array2<f64>> {
    match array.ndim() {
        1 => {
            let n = array.len();
            let shape = if as_row { (1, n) } else { (n, 1) };
            array
                .to_owned()
                .into_shape(shape)
                .map_err(|e| QuantError::Type(e.to_string()))
        }
        2 => array
            .to_owned()
            .into_dimensionality::<Ix2>()
            .map_err(|e| QuantError::Type(e.to_string())),
        n => Err(QuantError::Value(format!(
            "matmul supports 1-D and 2-D operands, got {}-D",
            n
        ))),
    }
}

impl UnitValue {
    fn axis_of(&self, dim: &str) -> Result<usize> {
        self.dims()
            .iter()
            .position(|d| d == dim)
            .ok_or_else(|| QuantError::Value(format!("unknown dimension '{}'", dim)))
    }

    /// Rename the dimensions
    ///
    /// The number of names must match the number of axes and names must be
    /// unique.
    pub fn rename_dims<S: Into<String>>(&self, names: Vec<S>) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.len() != self.values().ndim() {
            return Err(QuantError::Value(format!(
                "expected {} dimension names, got {}",
                self.values().ndim(),
                names.len()
            )));
        }
        let unique: HashSet<&String> = names.iter().collect();
        if unique.len() != names.len() {
            return Err(QuantError::Value(
                "dimension names must be unique".to_string(),
            ));
        }
        Ok(UnitValue::from_raw(
            self.values().clone(),
            self.variances().cloned(),
            self.unit().clone(),
            names,
        ))
    }

    /// Sum over one named dimension, or over every element
    ///
    /// Variances add under the independence assumption.
    ///
    /// # Examples
    ///
    /// ```
    /// use quantfit_rs::variable::UnitValue;
    ///
    /// let v = UnitValue::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]], "m").unwrap();
    /// assert_eq!(v.sum(None).unwrap().as_scalar(), Some(10.0));
    /// assert_eq!(v.sum(Some("dim0")).unwrap().shape(), &[2]);
    /// ```
    pub fn sum(&self, dim: Option<&str>) -> Result<Self> {
        match dim {
            None => {
                let total = UnitValue::from_raw(
                    ArrayD::from_elem(ndarray::IxDyn(&[]), self.values().sum()),
                    self.variances()
                        .map(|v| ArrayD::from_elem(ndarray::IxDyn(&[]), v.sum())),
                    self.unit().clone(),
                    Vec::new(),
                );
                Ok(total)
            }
            Some(name) => {
                let axis = self.axis_of(name)?;
                let mut dims = self.dims().to_vec();
                dims.remove(axis);
                Ok(UnitValue::from_raw(
                    sum_axis(self.values(), axis),
                    self.variances().map(|v| sum_axis(v, axis)),
                    self.unit().clone(),
                    dims,
                ))
            }
        }
    }

    /// Contract two named dimensions by summing their diagonal
    ///
    /// Either both names or neither must be given; with neither, the first two
    /// dimensions are used.
    pub fn trace(&self, dim1: Option<&str>, dim2: Option<&str>) -> Result<Self> {
        let (a, b) = match (dim1, dim2) {
            (Some(d1), Some(d2)) => {
                if d1 == d2 {
                    return Err(QuantError::Value(format!(
                        "trace needs two different dimensions, got '{}' twice",
                        d1
                    )));
                }
                (self.axis_of(d1)?, self.axis_of(d2)?)
            }
            (None, None) => {
                if self.values().ndim() < 2 {
                    return Err(QuantError::Value(
                        "trace needs at least two dimensions".to_string(),
                    ));
                }
                (0, 1)
            }
            _ => {
                return Err(QuantError::Value(
                    "either both or none of the trace dimensions must be given".to_string(),
                ))
            }
        };
        let (i, j) = if a < b { (a, b) } else { (b, a) };

        let mut dims = self.dims().to_vec();
        dims.remove(j);
        dims.remove(i);
        Ok(UnitValue::from_raw(
            trace_axes(self.values(), i, j),
            self.variances().map(|v| trace_axes(v, i, j)),
            self.unit().clone(),
            dims,
        ))
    }

    /// Take one index along a dimension, dropping that dimension
    ///
    /// The result owns its data.
    pub fn slice(&self, dim: &str, index: usize) -> Result<Self> {
        let axis = self.axis_of(dim)?;
        let len = self.shape()[axis];
        if index >= len {
            return Err(QuantError::Value(format!(
                "index {} out of range for dimension '{}' of length {}",
                index, dim, len
            )));
        }
        let mut dims = self.dims().to_vec();
        dims.remove(axis);
        Ok(UnitValue::from_raw(
            self.values().index_axis(Axis(axis), index).to_owned(),
            self.variances()
                .map(|v| v.index_axis(Axis(axis), index).to_owned()),
            self.unit().clone(),
            dims,
        ))
    }

    /// Take a range along a dimension, keeping that dimension
    pub fn slice_range(&self, dim: &str, range: Range<usize>) -> Result<Self> {
        let axis = self.axis_of(dim)?;
        let len = self.shape()[axis];
        if range.start > range.end || range.end > len {
            return Err(QuantError::Value(format!(
                "range {:?} out of bounds for dimension '{}' of length {}",
                range, dim, len
            )));
        }
        let slice = Slice::from(range);
        Ok(UnitValue::from_raw(
            self.values().slice_axis(Axis(axis), slice).to_owned(),
            self.variances()
                .map(|v| v.slice_axis(Axis(axis), slice).to_owned()),
            self.unit().clone(),
            self.dims().to_vec(),
        ))
    }

    /// Matrix product of 1-D and 2-D values
    ///
    /// Variance propagates as `σ²_A·B² + A²·σ²_B` under the product.
    pub fn matmul(&self, rhs: &UnitValue) -> Result<Self> {
        let (ln, rn) = (self.values().ndim(), rhs.values().ndim());
        let a = as_matrix(self.values(), true)?;
        let b = as_matrix(rhs.values(), false)?;
        if a.ncols() != b.nrows() {
            return Err(QuantError::Value(format!(
                "matmul inner dimensions differ: {} and {}",
                a.ncols(),
                b.nrows()
            )));
        }

        let unit = self.unit().mul(rhs.unit());
        let scale = unit.scale;

        let square = |m: &Array2<f64>| m.mapv(|x| x * x);
        let var_a = self.variances().map(|v| as_matrix(v, true)).transpose()?;
        let var_b = rhs.variances().map(|v| as_matrix(v, false)).transpose()?;
        let variance = match (var_a, var_b) {
            (None, None) => None,
            (Some(va), None) => Some(va.dot(&square(&b))),
            (None, Some(vb)) => Some(square(&a).dot(&vb)),
            (Some(va), Some(vb)) => Some(va.dot(&square(&b)) + square(&a).dot(&vb)),
        };
        let product = a.dot(&b);

        let (shape, dims): (Vec<usize>, Vec<String>) = match (ln, rn) {
            (1, 1) => (vec![], vec![]),
            (1, _) => (vec![product.ncols()], vec![rhs.dims()[1].clone()]),
            (_, 1) => (vec![product.nrows()], vec![self.dims()[0].clone()]),
            _ => (
                vec![product.nrows(), product.ncols()],
                vec![self.dims()[0].clone(), rhs.dims()[1].clone()],
            ),
        };
        let reshape = |m: Array2<f64>| -> Result<ArrayD<f64>> {
            m.into_dyn()
                .into_shape(shape.clone())
                .map_err(|e| QuantError::Type(e.to_string()))
        };

        Ok(UnitValue::from_raw(
            reshape(product * scale)?,
            variance.map(|v| reshape(v * (scale * scale))).transpose()?,
            unit.unit,
            dims,
        ))
    }

    /// Dispatch an array function by name
    ///
    /// Only the names in [`SUPPORTED_UFUNCS`] are handled; anything else is
    /// refused with [`QuantError::NotImplemented`] so that no operation can
    /// bypass unit and variance bookkeeping.
    pub fn apply_ufunc(name: &str, operands: &[&UnitValue]) -> Result<UnitValue> {
        let arity = |n: usize| -> Result<()> {
            if operands.len() == n {
                Ok(())
            } else {
                Err(QuantError::Type(format!(
                    "'{}' takes {} operand(s), got {}",
                    name,
                    n,
                    operands.len()
                )))
            }
        };

        match name {
            "add" | "subtract" | "multiply" | "divide" | "power" => {
                arity(2)?;
                let (a, b) = (operands[0], operands[1]);
                match name {
                    "add" => a.add(b),
                    "subtract" => a.sub(b),
                    "multiply" => a.mul(b),
                    "divide" => a.div(b),
                    _ => a.pow(b),
                }
            }
            "negative" => {
                arity(1)?;
                Ok(operands[0].neg())
            }
            "absolute" => {
                arity(1)?;
                Ok(operands[0].abs())
            }
            "sum" => {
                arity(1)?;
                operands[0].sum(None)
            }
            other => Err(QuantError::NotImplemented(format!(
                "array function '{}' is not supported",
                other
            ))),
        }
    }
}

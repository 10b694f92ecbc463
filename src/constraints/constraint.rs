//! Constraint variants and their evaluation rules

use crate::constraints::expression::Expression;
use crate::constraints::{ComparisonOp, ConstraintError};
use crate::error::{QuantError, Result};
use crate::global_object::map::Map;
use ndarray::{ArrayD, IxDyn};
use std::fmt;

/// User function applied by a functional constraint to the raw values of its
/// inputs
pub type ConstraintFn = Box<dyn Fn(&[ArrayD<f64>]) -> Result<ArrayD<f64>>>;

/// Attributes a self-referencing constraint may compare against
pub const SELF_ATTRIBUTES: &[&str] = &["min", "max", "value", "variance", "error"];

/// Unique names of the quantities a constraint reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Independents {
    One(String),
    Many(Vec<String>),
}

impl Independents {
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Independents::One(id) => vec![id.as_str()],
            Independents::Many(ids) => ids.iter().map(String::as_str).collect(),
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.ids().contains(&id)
    }
}

/// The evaluation rule of a constraint
pub enum ConstraintKind {
    /// Keep the dependent on the right side of a fixed limit
    Numeric { operator: ComparisonOp, value: f64 },

    /// Keep the dependent on the right side of one of its own attributes
    SelfRef {
        operator: ComparisonOp,
        attribute: String,
    },

    /// `dependent = <operator> independent`, e.g. `"2*"`
    Obj {
        operator: String,
        expression: Expression,
    },

    /// `dependent = value - (<operators and independents>)`
    MultiObj {
        operators: Vec<String>,
        value: f64,
        expression: Expression,
    },

    /// `dependent = f(independents...)`, or `f(dependent)` without independents
    Functional { function: ConstraintFn },
}

impl ConstraintKind {
    /// Name of the variant, as shown in messages
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::Numeric { .. } => "NumericConstraint",
            ConstraintKind::SelfRef { .. } => "SelfConstraint",
            ConstraintKind::Obj { .. } => "ObjConstraint",
            ConstraintKind::MultiObj { .. } => "MultiObjConstraint",
            ConstraintKind::Functional { .. } => "FunctionalConstraint",
        }
    }
}

impl fmt::Debug for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::Numeric { operator, value } => f
                .debug_struct("Numeric")
                .field("operator", operator)
                .field("value", value)
                .finish(),
            ConstraintKind::SelfRef {
                operator,
                attribute,
            } => f
                .debug_struct("SelfRef")
                .field("operator", operator)
                .field("attribute", attribute)
                .finish(),
            ConstraintKind::Obj { operator, .. } => {
                f.debug_struct("Obj").field("operator", operator).finish()
            }
            ConstraintKind::MultiObj {
                operators, value, ..
            } => f
                .debug_struct("MultiObj")
                .field("operators", operators)
                .field("value", value)
                .finish(),
            ConstraintKind::Functional { .. } => f.write_str("Functional"),
        }
    }
}

fn is_single_identifier(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(char::is_whitespace)
}

fn check_dependent(dependent: &str) -> Result<()> {
    if is_single_identifier(dependent) {
        Ok(())
    } else {
        Err(QuantError::Attribute(format!(
            "dependent id '{}' is not a single identifier",
            dependent
        )))
    }
}

fn check_not_self(dependent: &str, independents: &Independents) -> Result<()> {
    if independents.contains(dependent) {
        return Err(QuantError::Attribute(format!(
            "'{}' cannot be both the dependent and an independent object",
            dependent
        )));
    }
    Ok(())
}

/// Replace the elements of `current` for which `current <op> limit` fails
fn correct(current: &ArrayD<f64>, operator: ComparisonOp, limit: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    let limit = if limit.len() == 1 && current.len() != 1 {
        let l = limit.iter().next().copied().unwrap_or(f64::NAN);
        ArrayD::from_elem(current.raw_dim(), l)
    } else if limit.len() == current.len() {
        limit
            .clone()
            .into_shape(current.raw_dim())
            .map_err(|e| QuantError::Value(e.to_string()))?
    } else {
        return Err(QuantError::Value(format!(
            "limit of shape {:?} cannot be compared with value of shape {:?}",
            limit.shape(),
            current.shape()
        )));
    };

    let mut out = current.clone();
    out.zip_mut_with(&limit, |x, &l| {
        if !operator.holds(*x, l) {
            *x = l;
        }
    });
    Ok(out)
}

fn scalar(value: f64) -> ArrayD<f64> {
    ArrayD::from_elem(IxDyn(&[]), value)
}

/// A rule that computes the value of one dependent quantity
///
/// # Examples
///
/// ```
/// use quantfit_rs::constraints::Constraint;
///
/// let c = Constraint::obj("Parameter_0", "2*", "Parameter_1").unwrap();
/// assert!(c.is_external());
/// assert!(Constraint::obj("Parameter_0", "2*", "Parameter_0").is_err());
/// ```
pub struct Constraint {
    dependent_id: String,
    independent_ids: Option<Independents>,
    kind: ConstraintKind,
    enabled: bool,
    external: bool,
    owns_dependent: bool,
}

impl Constraint {
    fn build(
        dependent: &str,
        independent_ids: Option<Independents>,
        kind: ConstraintKind,
        external: bool,
    ) -> Result<Self> {
        check_dependent(dependent)?;
        if let Some(ids) = &independent_ids {
            check_not_self(dependent, ids)?;
        }
        Ok(Self {
            dependent_id: dependent.to_string(),
            independent_ids,
            kind,
            enabled: true,
            external,
            owns_dependent: false,
        })
    }

    /// Clamp the dependent to a fixed limit
    ///
    /// Where `dependent <operator> value` does not hold, the dependent becomes
    /// `value`; arrays are corrected element by element.
    pub fn numeric(dependent: &str, operator: &str, value: f64) -> Result<Self> {
        let operator: ComparisonOp = operator.parse()?;
        Self::build(
            dependent,
            None,
            ConstraintKind::Numeric { operator, value },
            false,
        )
    }

    /// Clamp the dependent to one of its own attributes, read at evaluation time
    pub fn self_ref(dependent: &str, operator: &str, attribute: &str) -> Result<Self> {
        let operator: ComparisonOp = operator.parse()?;
        if !SELF_ATTRIBUTES.contains(&attribute) {
            return Err(QuantError::Attribute(format!(
                "'{}' is not an attribute a constraint can read",
                attribute
            )));
        }
        Self::build(
            dependent,
            None,
            ConstraintKind::SelfRef {
                operator,
                attribute: attribute.to_string(),
            },
            false,
        )
    }

    /// Tie the dependent to `<operator> independent`
    pub fn obj(dependent: &str, operator: &str, independent: &str) -> Result<Self> {
        let expression = Expression::parse(&format!("{} value1", operator))?;
        Self::build(
            dependent,
            Some(Independents::One(independent.to_string())),
            ConstraintKind::Obj {
                operator: operator.to_string(),
                expression,
            },
            true,
        )
    }

    /// Tie the dependent to `value - (...)` over several independents
    ///
    /// With as many operators as independents each operator prefixes its
    /// operand (`["+", "-2*"]` over `[b, c]` gives `value - (+b -2*c)`); with one
    /// operator fewer they sit between operands (`["+"]` gives `value - (b + c)`).
    pub fn multi_obj(
        independents: &[&str],
        operators: &[&str],
        dependent: &str,
        value: f64,
    ) -> Result<Self> {
        let n = independents.len();
        let body: Vec<String> = if n > 0 && operators.len() == n {
            operators
                .iter()
                .enumerate()
                .map(|(i, op)| format!("{} p{}", op, i))
                .collect()
        } else if n > 0 && operators.len() + 1 == n {
            let mut parts = vec!["p0".to_string()];
            for (i, op) in operators.iter().enumerate() {
                parts.push(format!("{} p{}", op, i + 1));
            }
            parts
        } else {
            return Err(ConstraintError::OperatorCount {
                operators: operators.len(),
                independents: n,
            }
            .into());
        };
        let expression = Expression::parse(&format!("value - ({})", body.join(" ")))?;

        Self::build(
            dependent,
            Some(Independents::Many(
                independents.iter().map(|s| s.to_string()).collect(),
            )),
            ConstraintKind::MultiObj {
                operators: operators.iter().map(|s| s.to_string()).collect(),
                value,
                expression,
            },
            true,
        )
    }

    /// Set the dependent to `function(independents...)`
    ///
    /// Without independents the function receives the dependent's own value.
    pub fn functional<F>(dependent: &str, function: F, independents: Option<&[&str]>) -> Result<Self>
    where
        F: Fn(&[ArrayD<f64>]) -> Result<ArrayD<f64>> + 'static,
    {
        let independent_ids = independents
            .map(|ids| Independents::Many(ids.iter().map(|s| s.to_string()).collect()));
        let external = independent_ids.is_some();
        Self::build(
            dependent,
            independent_ids,
            ConstraintKind::Functional {
                function: Box::new(function),
            },
            external,
        )
    }

    /// Unique name of the quantity this constraint writes
    pub fn dependent_id(&self) -> &str {
        &self.dependent_id
    }

    /// Unique names of the quantities this constraint reads
    pub fn independent_ids(&self) -> Vec<&str> {
        self.independent_ids
            .as_ref()
            .map(Independents::ids)
            .unwrap_or_default()
    }

    pub fn has_independents(&self) -> bool {
        self.independent_ids.is_some()
    }

    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True when the dependent is driven by quantities other than itself
    pub fn is_external(&self) -> bool {
        self.external
    }

    /// True when registration disabled the dependent and teardown must re-enable it
    pub fn owns_dependent(&self) -> bool {
        self.owns_dependent
    }

    pub(crate) fn set_enabled_flag(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn set_owns_dependent(&mut self, owns: bool) {
        self.owns_dependent = owns;
    }

    /// Compute the dependent's new raw value from the current registry state
    ///
    /// Independent values are read raw: reading never triggers constraints.
    pub fn evaluate(&self, map: &Map) -> Result<ArrayD<f64>> {
        check_dependent(&self.dependent_id)?;
        let dependent = self.dependent_id.as_str();

        match &self.kind {
            ConstraintKind::Numeric { operator, value } => {
                correct(map.raw_value(dependent)?, *operator, &scalar(*value))
            }
            ConstraintKind::SelfRef {
                operator,
                attribute,
            } => {
                let limit = map.attribute(dependent, attribute)?;
                correct(map.raw_value(dependent)?, *operator, &limit)
            }
            ConstraintKind::Obj { expression, .. } => {
                let mut symbols = Vec::with_capacity(1);
                for id in self.independent_ids() {
                    symbols.push(("value1".to_string(), map.raw_value(id)?.clone()));
                }
                Ok(expression.evaluate_arrays(&symbols)?)
            }
            ConstraintKind::MultiObj {
                value, expression, ..
            } => {
                let mut symbols = vec![("value".to_string(), scalar(*value))];
                for (i, id) in self.independent_ids().into_iter().enumerate() {
                    symbols.push((format!("p{}", i), map.raw_value(id)?.clone()));
                }
                Ok(expression.evaluate_arrays(&symbols)?)
            }
            ConstraintKind::Functional { function } => {
                let ids = if self.has_independents() {
                    self.independent_ids()
                } else {
                    vec![dependent]
                };
                let args = ids
                    .into_iter()
                    .map(|id| map.raw_value(id).cloned())
                    .collect::<Result<Vec<_>>>()?;
                function(&args)
            }
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("dependent_id", &self.dependent_id)
            .field("independent_ids", &self.independent_ids)
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("external", &self.external)
            .field("owns_dependent", &self.owns_dependent)
            .finish()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dep = &self.dependent_id;
        match &self.kind {
            ConstraintKind::Numeric { operator, value } => {
                write!(f, "NumericConstraint with `{} {} {}`", dep, operator, value)
            }
            ConstraintKind::SelfRef {
                operator,
                attribute,
            } => write!(
                f,
                "SelfConstraint with `{} {} {}.{}`",
                dep, operator, dep, attribute
            ),
            ConstraintKind::Obj { operator, .. } => write!(
                f,
                "ObjConstraint with `{} = {} {}`",
                dep,
                operator,
                self.independent_ids().join(", ")
            ),
            ConstraintKind::MultiObj {
                operators, value, ..
            } => write!(
                f,
                "MultiObjConstraint with `{} = {} - ({:?} over {:?})`",
                dep,
                value,
                operators,
                self.independent_ids()
            ),
            ConstraintKind::Functional { .. } => write!(f, "FunctionalConstraint on `{}`", dep),
        }
    }
}

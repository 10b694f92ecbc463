//! Unit representation, canonical form and conversion.

use crate::units::parser;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Div, Mul};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing or combining units
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("Unknown unit symbol: '{symbol}'")]
    Unknown { symbol: String },

    #[error("Failed to parse unit '{input}': {message}")]
    Parse { input: String, message: String },

    #[error("Units '{from}' and '{to}' are not compatible")]
    Incompatible { from: String, to: String },

    #[error("Invalid unit operation: {message}")]
    InvalidOperation { message: String },
}

/// Exponents of the seven SI base dimensions
///
/// Order: length, mass, time, electric current, temperature, amount of
/// substance, luminous intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimension(pub [i32; 7]);

impl Dimension {
    /// The dimension of pure numbers
    pub const DIMENSIONLESS: Dimension = Dimension([0; 7]);

    const fn of(l: i32, m: i32, t: i32, i: i32, th: i32, n: i32, j: i32) -> Self {
        Dimension([l, m, t, i, th, n, j])
    }

    /// Check whether every exponent is zero
    pub fn is_dimensionless(&self) -> bool {
        self.0.iter().all(|&e| e == 0)
    }

    /// Raise the dimension to an integer power
    pub fn powi(self, n: i32) -> Self {
        let mut out = self.0;
        for e in out.iter_mut() {
            *e *= n;
        }
        Dimension(out)
    }
}

impl Mul for Dimension {
    type Output = Dimension;
    fn mul(self, rhs: Self) -> Self::Output {
        let mut out = self.0;
        for (e, r) in out.iter_mut().zip(rhs.0.iter()) {
            *e += r;
        }
        Dimension(out)
    }
}

impl Div for Dimension {
    type Output = Dimension;
    fn div(self, rhs: Self) -> Self::Output {
        self * rhs.powi(-1)
    }
}

struct BaseUnit {
    symbol: &'static str,
    scale: f64,
    dimension: Dimension,
    prefixable: bool,
}

const fn base(symbol: &'static str, scale: f64, dimension: Dimension, prefixable: bool) -> BaseUnit {
    BaseUnit {
        symbol,
        scale,
        dimension,
        prefixable,
    }
}

// Table order is the display order of factors.
static BASE_UNITS: &[BaseUnit] = &[
    base("m", 1.0, Dimension::of(1, 0, 0, 0, 0, 0, 0), true),
    base("g", 1e-3, Dimension::of(0, 1, 0, 0, 0, 0, 0), true),
    base("s", 1.0, Dimension::of(0, 0, 1, 0, 0, 0, 0), true),
    base("A", 1.0, Dimension::of(0, 0, 0, 1, 0, 0, 0), true),
    base("K", 1.0, Dimension::of(0, 0, 0, 0, 1, 0, 0), true),
    base("mol", 1.0, Dimension::of(0, 0, 0, 0, 0, 1, 0), true),
    base("cd", 1.0, Dimension::of(0, 0, 0, 0, 0, 0, 1), true),
    base("Hz", 1.0, Dimension::of(0, 0, -1, 0, 0, 0, 0), true),
    base("N", 1.0, Dimension::of(1, 1, -2, 0, 0, 0, 0), true),
    base("Pa", 1.0, Dimension::of(-1, 1, -2, 0, 0, 0, 0), true),
    base("J", 1.0, Dimension::of(2, 1, -2, 0, 0, 0, 0), true),
    base("W", 1.0, Dimension::of(2, 1, -3, 0, 0, 0, 0), true),
    base("C", 1.0, Dimension::of(0, 0, 1, 1, 0, 0, 0), true),
    base("V", 1.0, Dimension::of(2, 1, -3, -1, 0, 0, 0), true),
    base("ohm", 1.0, Dimension::of(2, 1, -3, -2, 0, 0, 0), true),
    base("T", 1.0, Dimension::of(0, 1, -2, -1, 0, 0, 0), true),
    base("eV", 1.602176634e-19, Dimension::of(2, 1, -2, 0, 0, 0, 0), true),
    base("Å", 1e-10, Dimension::of(1, 0, 0, 0, 0, 0, 0), false),
    base("barn", 1e-28, Dimension::of(2, 0, 0, 0, 0, 0, 0), false),
    base("rad", 1.0, Dimension::DIMENSIONLESS, true),
    base("deg", std::f64::consts::PI / 180.0, Dimension::DIMENSIONLESS, false),
    base("min", 60.0, Dimension::of(0, 0, 1, 0, 0, 0, 0), false),
    base("h", 3600.0, Dimension::of(0, 0, 1, 0, 0, 0, 0), false),
];

static BASE_ALIASES: &[(&str, &str)] = &[("Ω", "ohm"), ("angstrom", "Å"), ("Angstrom", "Å")];

// SI prefixes as powers of ten.
static PREFIXES: &[(&str, i32)] = &[
    ("Y", 24),
    ("Z", 21),
    ("E", 18),
    ("P", 15),
    ("T", 12),
    ("G", 9),
    ("M", 6),
    ("k", 3),
    ("h", 2),
    ("da", 1),
    ("d", -1),
    ("c", -2),
    ("m", -3),
    ("µ", -6),
    ("n", -9),
    ("p", -12),
    ("f", -15),
    ("a", -18),
    ("z", -21),
    ("y", -24),
];

const MICRO: usize = 13;

static PREFIX_ALIASES: &[(&str, usize)] = &[("u", MICRO), ("μ", MICRO)];

fn find_base(symbol: &str) -> Option<usize> {
    let symbol = BASE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == symbol)
        .map(|(_, target)| *target)
        .unwrap_or(symbol);
    BASE_UNITS.iter().position(|b| b.symbol == symbol)
}

fn prefixed(prefix: usize, rest: &str) -> Option<Factor> {
    if rest.is_empty() {
        return None;
    }
    let base = find_base(rest)?;
    BASE_UNITS[base].prefixable.then_some(Factor {
        base,
        prefix: Some(prefix),
        power: 1,
    })
}

/// One symbol of a unit product, e.g. the `km` in `km/s`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Factor {
    base: usize,
    prefix: Option<usize>,
    power: i32,
}

impl Factor {
    /// Resolve a bare symbol such as `km`, `mol` or `µs`
    pub(crate) fn resolve(symbol: &str) -> Result<Factor, UnitError> {
        if let Some(base) = find_base(symbol) {
            return Ok(Factor {
                base,
                prefix: None,
                power: 1,
            });
        }

        let candidates = PREFIXES
            .iter()
            .enumerate()
            .map(|(idx, (p, _))| (*p, idx))
            .chain(PREFIX_ALIASES.iter().copied());
        for (prefix, idx) in candidates {
            if let Some(rest) = symbol.strip_prefix(prefix) {
                if let Some(factor) = prefixed(idx, rest) {
                    return Ok(factor);
                }
            }
        }

        Err(UnitError::Unknown {
            symbol: symbol.to_string(),
        })
    }

    fn decimal_exponent(&self) -> i32 {
        self.prefix.map_or(0, |p| PREFIXES[p].1) * self.power
    }

    fn base_scale(&self) -> f64 {
        BASE_UNITS[self.base].scale.powi(self.power)
    }

    fn dimension(&self) -> Dimension {
        BASE_UNITS[self.base].dimension.powi(self.power)
    }

    /// Drop the prefix, returning the factor by which magnitudes must be scaled
    fn unprefixed(self) -> (f64, Factor) {
        let scale = 10f64.powi(self.decimal_exponent());
        (scale, Factor { prefix: None, ..self })
    }

    fn symbol(&self) -> String {
        let prefix = self.prefix.map_or("", |p| PREFIXES[p].0);
        format!("{}{}", prefix, BASE_UNITS[self.base].symbol)
    }

    fn render(&self, power: i32) -> String {
        if power == 1 {
            self.symbol()
        } else {
            format!("{}^{}", self.symbol(), power)
        }
    }
}

/// A unit expression before canonicalization
///
/// `literal` is the product of every number written into the unit string and
/// `factors` may still hold repeated symbols.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UnitExpr {
    pub(crate) literal: f64,
    pub(crate) factors: Vec<Factor>,
}

impl UnitExpr {
    pub(crate) fn one() -> Self {
        Self {
            literal: 1.0,
            factors: Vec::new(),
        }
    }

    pub(crate) fn number(value: f64) -> Self {
        Self {
            literal: value,
            factors: Vec::new(),
        }
    }

    pub(crate) fn symbol(factor: Factor) -> Self {
        Self {
            literal: 1.0,
            factors: vec![factor],
        }
    }

    pub(crate) fn mul(mut self, rhs: UnitExpr) -> Self {
        self.literal *= rhs.literal;
        self.factors.extend(rhs.factors);
        self
    }

    pub(crate) fn div(self, rhs: UnitExpr) -> Self {
        self.mul(rhs.powi(-1))
    }

    pub(crate) fn powi(mut self, n: i32) -> Self {
        self.literal = self.literal.powi(n);
        for f in self.factors.iter_mut() {
            f.power *= n;
        }
        self
    }

    /// Fold the expression into a canonical unit and a magnitude scale
    pub(crate) fn canonicalize(self) -> ScaledUnit {
        let mut scale = self.literal;
        let mut factors = self.factors;

        // A numeric literal means the string named a non-coherent unit:
        // express it in unprefixed symbols so no number survives in the unit.
        if self.literal != 1.0 {
            for f in factors.iter_mut() {
                let (s, plain) = f.unprefixed();
                scale *= s;
                *f = plain;
            }
        }

        let mut merged: Vec<Factor> = Vec::with_capacity(factors.len());
        for base in unique_bases(&factors) {
            let group: Vec<Factor> = factors.iter().copied().filter(|f| f.base == base).collect();
            let first_prefix = group[0].prefix;
            let mixed = group.iter().any(|f| f.prefix != first_prefix);
            let mut power = 0;
            for f in &group {
                power += f.power;
                if mixed {
                    scale *= f.unprefixed().0;
                }
            }
            if power != 0 {
                merged.push(Factor {
                    base,
                    prefix: if mixed { None } else { first_prefix },
                    power,
                });
            }
        }
        merged.sort();

        ScaledUnit {
            scale,
            unit: Unit { factors: merged },
        }
    }
}

fn unique_bases(factors: &[Factor]) -> Vec<usize> {
    let mut bases: Vec<usize> = factors.iter().map(|f| f.base).collect();
    bases.sort_unstable();
    bases.dedup();
    bases
}

/// A canonical physical unit
///
/// Units never carry numeric scale factors: two units that print the same are
/// the same unit, and [`Unit::conversion_factor`] relates any two units of
/// equal dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Unit {
    factors: Vec<Factor>,
}

/// A canonical unit together with the magnitude scale that was folded out of it
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledUnit {
    /// Factor by which a magnitude expressed in the original unit string must be
    /// multiplied to be expressed in `unit`
    pub scale: f64,
    /// The canonical unit
    pub unit: Unit,
}

impl ScaledUnit {
    /// Parse a unit string, keeping any numeric scale it carries
    ///
    /// # Examples
    ///
    /// ```
    /// use quantfit_rs::units::ScaledUnit;
    ///
    /// let parsed = ScaledUnit::parse("10dm^2").unwrap();
    /// assert_eq!(parsed.unit.to_string(), "m^2");
    /// assert!((parsed.scale - 0.1).abs() < 1e-12);
    /// ```
    pub fn parse(input: &str) -> Result<Self, UnitError> {
        Ok(parser::parse_unit(input)?.canonicalize())
    }
}

impl Unit {
    /// The unit of pure numbers
    pub fn dimensionless() -> Self {
        Self::default()
    }

    /// Check whether this is the plain `dimensionless` unit
    pub fn is_dimensionless(&self) -> bool {
        self.factors.is_empty()
    }

    /// Dimension vector of the unit
    pub fn dimension(&self) -> Dimension {
        self.factors
            .iter()
            .fold(Dimension::DIMENSIONLESS, |acc, f| acc * f.dimension())
    }

    /// Check whether a value in this unit can be converted to `other`
    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.dimension() == other.dimension()
    }

    /// Factor that converts a magnitude in `self` into a magnitude in `target`
    ///
    /// # Examples
    ///
    /// ```
    /// use quantfit_rs::units::Unit;
    ///
    /// let m: Unit = "m".parse().unwrap();
    /// let mm: Unit = "mm".parse().unwrap();
    /// assert_eq!(m.conversion_factor(&mm).unwrap(), 1000.0);
    /// assert!(m.conversion_factor(&"s".parse().unwrap()).is_err());
    /// ```
    pub fn conversion_factor(&self, target: &Unit) -> Result<f64, UnitError> {
        if !self.is_compatible(target) {
            return Err(UnitError::Incompatible {
                from: self.to_string(),
                to: target.to_string(),
            });
        }
        if self == target {
            return Ok(1.0);
        }
        // Prefix powers are combined first so that decimal conversions stay exact.
        let exponent = self.decimal_exponent() - target.decimal_exponent();
        Ok(10f64.powi(exponent) * (self.base_scale() / target.base_scale()))
    }

    /// Multiply two units, folding mixed prefixes into the returned scale
    pub fn mul(&self, rhs: &Unit) -> ScaledUnit {
        self.as_expr().mul(rhs.as_expr()).canonicalize()
    }

    /// Divide two units, folding mixed prefixes into the returned scale
    pub fn div(&self, rhs: &Unit) -> ScaledUnit {
        self.as_expr().div(rhs.as_expr()).canonicalize()
    }

    /// Raise the unit to an integer power
    pub fn powi(&self, n: i32) -> Unit {
        if n == 0 {
            return Unit::dimensionless();
        }
        Unit {
            factors: self
                .factors
                .iter()
                .map(|f| Factor {
                    power: f.power * n,
                    ..*f
                })
                .collect(),
        }
    }

    /// Express the unit in unprefixed symbols, e.g. `km/ms` becomes `m/s`
    pub fn base_unit(&self) -> ScaledUnit {
        let mut scale = 1.0;
        let mut expr = UnitExpr::one();
        for f in &self.factors {
            let (s, plain) = f.unprefixed();
            scale *= s;
            expr.factors.push(plain);
        }
        let mut out = expr.canonicalize();
        out.scale *= scale;
        out
    }

    fn as_expr(&self) -> UnitExpr {
        UnitExpr {
            literal: 1.0,
            factors: self.factors.clone(),
        }
    }

    fn decimal_exponent(&self) -> i32 {
        self.factors.iter().map(Factor::decimal_exponent).sum()
    }

    fn base_scale(&self) -> f64 {
        self.factors.iter().map(Factor::base_scale).product()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.factors.is_empty() {
            return write!(f, "dimensionless");
        }

        let numerator: Vec<String> = self
            .factors
            .iter()
            .filter(|x| x.power > 0)
            .map(|x| x.render(x.power))
            .collect();
        let denominator: Vec<String> = self
            .factors
            .iter()
            .filter(|x| x.power < 0)
            .map(|x| x.render(-x.power))
            .collect();

        let numerator = if numerator.is_empty() {
            "1".to_string()
        } else {
            numerator.join("*")
        };

        match denominator.len() {
            0 => write!(f, "{}", numerator),
            1 => write!(f, "{}/{}", numerator, denominator[0]),
            _ => write!(f, "{}/({})", numerator, denominator.join("*")),
        }
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    /// Parse a unit string that carries no numeric scale
    ///
    /// Strings such as `"10dm^2"` or `"dm*m"` imply a magnitude scale and are
    /// rejected here; use [`ScaledUnit::parse`] for those.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = ScaledUnit::parse(s)?;
        if parsed.scale != 1.0 {
            return Err(UnitError::InvalidOperation {
                message: format!("unit string '{}' carries a numeric scale of {}", s, parsed.scale),
            });
        }
        Ok(parsed.unit)
    }
}

impl Serialize for Unit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Anything that can name a unit: a unit string or an already-built [`Unit`]
pub trait IntoUnit {
    fn into_scaled_unit(self) -> Result<ScaledUnit, UnitError>;
}

impl IntoUnit for &str {
    fn into_scaled_unit(self) -> Result<ScaledUnit, UnitError> {
        ScaledUnit::parse(self)
    }
}

impl IntoUnit for String {
    fn into_scaled_unit(self) -> Result<ScaledUnit, UnitError> {
        ScaledUnit::parse(&self)
    }
}

impl IntoUnit for &String {
    fn into_scaled_unit(self) -> Result<ScaledUnit, UnitError> {
        ScaledUnit::parse(self)
    }
}

impl IntoUnit for Unit {
    fn into_scaled_unit(self) -> Result<ScaledUnit, UnitError> {
        Ok(ScaledUnit {
            scale: 1.0,
            unit: self,
        })
    }
}

impl IntoUnit for &Unit {
    fn into_scaled_unit(self) -> Result<ScaledUnit, UnitError> {
        self.clone().into_scaled_unit()
    }
}

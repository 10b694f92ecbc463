use crate::test_helpers::rng;
use approx::assert_relative_eq;
use quantfit_rs::units::{parser::is_valid_unit, ScaledUnit, Unit, UnitError};
use quantfit_rs::UnitValue;
use rand::seq::SliceRandom;
use rand::Rng;

const LENGTHS: &[&str] = &["m", "cm", "mm", "km", "um", "Å", "nm"];

#[test]
fn test_round_trip_conversion_is_lossless() {
    let mut rng = rng();
    for _ in 0..200 {
        let from = LENGTHS.choose(&mut rng).unwrap();
        let to = LENGTHS.choose(&mut rng).unwrap();
        let value: f64 = rng.gen_range(-1e3..1e3);
        let variance: f64 = rng.gen_range(0.0..10.0);

        let a = UnitValue::with_variance(value, variance, *from).unwrap();
        let back = a.to_unit(*to).unwrap().to_unit(a.unit()).unwrap();

        assert_relative_eq!(
            back.as_scalar().unwrap(),
            value,
            max_relative = 1e-9,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            back.variances().unwrap().sum(),
            variance,
            max_relative = 1e-9,
            epsilon = 1e-12
        );
    }
}

#[test]
fn test_addition_commutes_with_conversion() {
    let mut rng = rng();
    for _ in 0..200 {
        let ua = LENGTHS.choose(&mut rng).unwrap();
        let ub = LENGTHS.choose(&mut rng).unwrap();
        let target = LENGTHS.choose(&mut rng).unwrap();
        let a = UnitValue::new(rng.gen_range(-10.0..10.0), *ua).unwrap();
        let b = UnitValue::new(rng.gen_range(-10.0..10.0), *ub).unwrap();

        let lhs = a.add(&b).unwrap().to_unit(*target).unwrap();
        let rhs = a.to_unit(*target).unwrap().as_scalar().unwrap()
            + b.to_unit(*target).unwrap().as_scalar().unwrap();

        assert_relative_eq!(
            lhs.as_scalar().unwrap(),
            rhs,
            max_relative = 1e-9,
            epsilon = 1e-9
        );
    }
}

#[test]
fn test_incompatible_conversion() {
    let a = UnitValue::new(1.0, "m").unwrap();
    assert!(a.to_unit("s").is_err());
    let m: Unit = "m".parse().unwrap();
    let s: Unit = "s".parse().unwrap();
    assert!(matches!(
        m.conversion_factor(&s),
        Err(UnitError::Incompatible { .. })
    ));
}

#[test]
fn test_canonical_forms() {
    let cases = [
        ("1e+9", 1e9, "dimensionless"),
        ("10dm^2", 0.1, "m^2"),
        ("m*s/s", 1.0, "m"),
        ("kg*m/s**2", 1.0, "m*kg/s^2"),
        ("1/(m*s)", 1.0, "1/(m*s)"),
        ("", 1.0, "dimensionless"),
    ];
    for (input, scale, unit) in cases {
        let parsed = ScaledUnit::parse(input).unwrap();
        assert_relative_eq!(parsed.scale, scale, max_relative = 1e-12);
        assert_eq!(parsed.unit.to_string(), unit, "canonical form of {}", input);
    }
}

#[test]
fn test_equal_units_compare_equal() {
    let a = UnitValue::new(1.0, "m*m").unwrap();
    let b = UnitValue::new(1.0, "m^2").unwrap();
    assert_eq!(a.unit(), b.unit());

    let dm_m = UnitValue::new(1.0, "dm*m").unwrap();
    assert_eq!(dm_m.unit().to_string(), "m^2");
    assert_relative_eq!(dm_m.as_scalar().unwrap(), 0.1, max_relative = 1e-12);
}

#[test]
fn test_unit_validity() {
    assert!(is_valid_unit("km/s"));
    assert!(is_valid_unit("µm"));
    assert!(is_valid_unit("ohm*m"));
    assert!(!is_valid_unit("furlong"));
    assert!(!is_valid_unit("m^"));
    assert!(!is_valid_unit("(m"));
}

#[test]
fn test_decimal_literals_scale_the_magnitude() {
    let v = UnitValue::new(2.0, "m*2.5").unwrap();
    assert_eq!(v.unit().to_string(), "m");
    assert_relative_eq!(v.as_scalar().unwrap(), 5.0);

    let parsed = ScaledUnit::parse("2.5").unwrap();
    assert!(parsed.unit.is_dimensionless());
    assert_relative_eq!(parsed.scale, 2.5);

    // The `e` of `eV` is not an exponent
    let parsed = ScaledUnit::parse("2eV").unwrap();
    assert_eq!(parsed.unit.to_string(), "eV");
    assert_relative_eq!(parsed.scale, 2.0);
}

#[test]
fn test_bare_numbers_added_to_angles_are_radians() {
    let angle = UnitValue::new(30.0, "deg").unwrap();
    let sum = angle.add(&UnitValue::from(1.0)).unwrap();
    assert_eq!(sum.unit().to_string(), "deg");
    assert_relative_eq!(
        sum.as_scalar().unwrap(),
        30.0 + 180.0 / std::f64::consts::PI,
        max_relative = 1e-12
    );

    let rad = UnitValue::new(0.5, "rad").unwrap();
    let sum = UnitValue::from(1.0).add(&rad).unwrap();
    assert!(sum.unit().is_dimensionless());
    assert_relative_eq!(sum.as_scalar().unwrap(), 1.5);
}

#[test]
fn test_fractional_powers_of_angles() {
    let half = UnitValue::from(0.5);

    let root = UnitValue::new(4.0, "rad").unwrap().pow(&half).unwrap();
    assert!(root.unit().is_dimensionless());
    assert_relative_eq!(root.as_scalar().unwrap(), 2.0);

    let root = UnitValue::new(180.0, "deg").unwrap().pow(&half).unwrap();
    assert!(root.unit().is_dimensionless());
    assert_relative_eq!(
        root.as_scalar().unwrap(),
        std::f64::consts::PI.sqrt(),
        max_relative = 1e-12
    );

    // Integer powers keep the named unit
    let squared = UnitValue::new(3.0, "deg").unwrap().powi(2).unwrap();
    assert_eq!(squared.unit().to_string(), "deg^2");

    assert!(UnitValue::new(4.0, "m").unwrap().pow(&half).is_err());
}

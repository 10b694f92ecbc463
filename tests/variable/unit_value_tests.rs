use crate::test_helpers::rng;
use approx::assert_relative_eq;
use ndarray::{arr1, arr2};
use quantfit_rs::variable::SUPPORTED_UFUNCS;
use quantfit_rs::{QuantError, UnitValue};
use rand::Rng;

fn variance(v: &UnitValue) -> f64 {
    v.variances().unwrap().iter().next().copied().unwrap()
}

#[test]
fn test_reference_arithmetic() {
    let a = UnitValue::with_variance(2.0, 0.01, "cm").unwrap();
    let b = UnitValue::with_variance(1.0, 0.1, "m").unwrap();
    let sum = a.add(&b).unwrap();
    assert_eq!(sum.unit().to_string(), "cm");
    assert_relative_eq!(sum.as_scalar().unwrap(), 102.0, epsilon = 1e-9);
    assert_relative_eq!(variance(&sum), 1000.01, epsilon = 1e-9);

    let a = UnitValue::with_variance(2.0, 0.01, "dm").unwrap();
    let prod = a.mul(&b).unwrap();
    assert_eq!(prod.unit().to_string(), "m^2");
    assert_relative_eq!(prod.as_scalar().unwrap(), 0.2, epsilon = 1e-12);
    assert_relative_eq!(variance(&prod), 0.0041, epsilon = 1e-12);

    let c = UnitValue::with_variance(2.0, 0.01, "m^2").unwrap();
    let ratio = b.div(&c).unwrap();
    assert_eq!(ratio.unit().to_string(), "1/m");
    assert_relative_eq!(ratio.as_scalar().unwrap(), 0.5, epsilon = 1e-12);
    assert_relative_eq!(variance(&ratio), 0.025625, epsilon = 1e-12);

    let d = UnitValue::with_variance(2.0, 0.1, "m").unwrap();
    let squared = d.pow(&UnitValue::from(2.0)).unwrap();
    assert_eq!(squared.unit().to_string(), "m^2");
    assert_relative_eq!(squared.as_scalar().unwrap(), 4.0, epsilon = 1e-12);
    assert_relative_eq!(variance(&squared), 1.6, epsilon = 1e-12);
}

#[test]
fn test_scaling_multiplies_variance_by_square() {
    let mut rng = rng();
    for _ in 0..100 {
        let v: f64 = rng.gen_range(0.0..5.0);
        let k: f64 = rng.gen_range(-20.0..20.0);
        let a = UnitValue::with_variance(rng.gen_range(-5.0..5.0), v, "m").unwrap();
        let scaled = a.mul(&UnitValue::from(k)).unwrap();
        assert_relative_eq!(variance(&scaled), v * k * k, max_relative = 1e-12, epsilon = 1e-12);
    }
}

#[test]
fn test_division_by_zero_in_either_position() {
    let zero = UnitValue::new(0.0, "m").unwrap();
    let one = UnitValue::new(1.0, "m").unwrap();
    assert!(matches!(one.div(&zero), Err(QuantError::ZeroDivision(_))));

    let with_zero = UnitValue::new(vec![1.0, 0.0, 2.0], "s").unwrap();
    assert!(matches!(one.div(&with_zero), Err(QuantError::ZeroDivision(_))));

    // Zero numerator is fine
    assert_eq!(zero.div(&one).unwrap().as_scalar(), Some(0.0));
}

#[test]
fn test_pow_rejections() {
    let base = UnitValue::new(2.0, "m").unwrap();
    let dimensioned = UnitValue::new(2.0, "s").unwrap();
    assert!(matches!(base.pow(&dimensioned), Err(QuantError::Unit(_))));

    let uncertain = UnitValue::with_variance(2.0, 0.1, "").unwrap();
    assert!(matches!(base.pow(&uncertain), Err(QuantError::Value(_))));

    assert!(matches!(
        base.pow(&UnitValue::from(0.5)),
        Err(QuantError::Unit(_))
    ));

    let negative = UnitValue::new(-4.0, "").unwrap();
    assert!(matches!(
        negative.pow(&UnitValue::from(0.5)),
        Err(QuantError::Value(_))
    ));
    assert_eq!(
        UnitValue::new(4.0, "").unwrap().pow(&UnitValue::from(0.5)).unwrap().as_scalar(),
        Some(2.0)
    );
}

#[test]
fn test_dimensionless_number_mixes_with_dimensionless_only() {
    let ratio = UnitValue::new(0.5, "").unwrap();
    assert_eq!(ratio.add(&UnitValue::from(1.0)).unwrap().as_scalar(), Some(1.5));

    let length = UnitValue::new(0.5, "m").unwrap();
    assert!(matches!(
        length.add(&UnitValue::from(1.0)),
        Err(QuantError::Unit(_))
    ));
}

#[test]
fn test_array_shape_rules() {
    let a = UnitValue::new(arr1(&[1.0, 2.0]), "m").unwrap();
    let b = UnitValue::new(arr1(&[1.0, 2.0, 3.0]), "m").unwrap();
    assert!(matches!(a.add(&b), Err(QuantError::Value(_))));

    let renamed = a.rename_dims(vec!["x"]).unwrap();
    assert!(matches!(a.add(&renamed), Err(QuantError::Value(_))));

    let ragged = UnitValue::from_rows(vec![vec![1.0, 2.0], vec![3.0]], "m");
    assert!(matches!(ragged, Err(QuantError::Type(_))));
}

#[test]
fn test_array_reduction_and_trace() {
    let m = UnitValue::with_variance(
        arr2(&[[1.0, 2.0], [3.0, 4.0]]),
        arr2(&[[0.1, 0.2], [0.3, 0.4]]),
        "s",
    )
    .unwrap()
    .rename_dims(vec!["row", "col"])
    .unwrap();

    let cols = m.sum(Some("row")).unwrap();
    assert_eq!(cols.values(), &arr1(&[4.0, 6.0]).into_dyn());
    assert_eq!(cols.dims(), &["col".to_string()]);

    let trace = m.trace(Some("row"), Some("col")).unwrap();
    assert_eq!(trace.as_scalar(), Some(5.0));
    assert_relative_eq!(variance(&trace), 0.5, epsilon = 1e-12);
}

#[test]
fn test_ufunc_whitelist() {
    let a = UnitValue::new(arr1(&[-1.0, 2.0]), "m").unwrap();
    for name in SUPPORTED_UFUNCS {
        let operands: Vec<&UnitValue> = match *name {
            "add" | "subtract" | "multiply" => vec![&a, &a],
            "divide" => continue,
            "power" => continue,
            _ => vec![&a],
        };
        assert!(UnitValue::apply_ufunc(name, &operands).is_ok(), "{}", name);
    }

    for name in ["sin", "exp", "sqrt", "cumsum"] {
        assert!(matches!(
            UnitValue::apply_ufunc(name, &[&a]),
            Err(QuantError::NotImplemented(_))
        ));
    }
}

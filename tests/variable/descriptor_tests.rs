use crate::test_helpers::{add_param, scalar, undoable};
use approx::assert_relative_eq;
use quantfit_rs::variable::{Descriptor, Parameter, QuantityKind};
use quantfit_rs::{Bounds, QuantError, UnitValue};

#[test]
fn test_generated_unique_names() {
    let mut global = undoable();
    let p = add_param(&mut global, "p", 1.0);
    let n = global
        .add_descriptor(Descriptor::number("n", 1.0, "m").unwrap())
        .unwrap();
    let a = global
        .add_descriptor(Descriptor::array("a", vec![1.0, 2.0], "m").unwrap())
        .unwrap();
    assert_eq!(p, "Parameter_0");
    assert_eq!(n, "DescriptorNumber_0");
    assert_eq!(a, "DescriptorArray_0");
    assert_eq!(global.descriptor(&a).unwrap().kind(), QuantityKind::DescriptorArray);

    let custom = global
        .add_parameter(Parameter::new("q", 1.0, "").unwrap().with_unique_name("amp"))
        .unwrap();
    assert_eq!(custom, "amp");
    assert!(matches!(
        global.add_parameter(Parameter::new("q", 1.0, "").unwrap().with_unique_name("amp")),
        Err(QuantError::Value(_))
    ));
}

#[test]
fn test_variance_and_error_setters() {
    let mut global = undoable();
    let key = global
        .add_descriptor(Descriptor::number("d", 1.0, "m").unwrap())
        .unwrap();

    global.set_error(&key, 0.3).unwrap();
    let value = global.value(&key).unwrap();
    assert_relative_eq!(value.variances().unwrap().sum(), 0.09, epsilon = 1e-12);

    global.set_variance(&key, 0.04).unwrap();
    assert_relative_eq!(
        global.value(&key).unwrap().errors().unwrap().sum(),
        0.2,
        epsilon = 1e-12
    );

    assert!(matches!(
        global.set_variance(&key, -0.1),
        Err(QuantError::Value(_))
    ));
    assert!(matches!(
        global.set_variance(&key, vec![0.1, 0.2]),
        Err(QuantError::Value(_))
    ));

    global.clear_variance(&key).unwrap();
    assert!(global.value(&key).unwrap().variances().is_none());
}

#[test]
fn test_convert_unit_scales_variance() {
    let mut global = undoable();
    let key = global
        .add_descriptor(Descriptor::new(
            "d",
            UnitValue::with_variance(2.0, 0.5, "km").unwrap(),
        ))
        .unwrap();
    global.convert_unit(&key, "m").unwrap();
    let value = global.value(&key).unwrap();
    assert_eq!(value.unit().to_string(), "m");
    assert_relative_eq!(value.as_scalar().unwrap(), 2000.0);
    assert_relative_eq!(value.variances().unwrap().sum(), 500_000.0);

    assert!(matches!(
        global.convert_unit(&key, "s"),
        Err(QuantError::Unit(_))
    ));
}

#[test]
fn test_read_only_unit() {
    let mut global = undoable();
    let key = add_param(&mut global, "p", 1.0);
    assert!(matches!(
        global.set_unit(&key, "m"),
        Err(QuantError::Attribute(_))
    ));
}

#[test]
fn test_builtin_bounds_clamp_writes() {
    let mut global = undoable();
    let key = global
        .add_parameter(Parameter::new("p", 1.0, "").unwrap().with_bounds(0.0, 2.0).unwrap())
        .unwrap();

    global.set_value(&key, 10.0).unwrap();
    assert_eq!(scalar(&global, &key), 2.0);
    global.set_value(&key, -3.0).unwrap();
    assert_eq!(scalar(&global, &key), 0.0);
}

#[test]
fn test_min_max_setters() {
    let mut global = undoable();
    let key = add_param(&mut global, "p", 1.0);

    global.set_min(&key, 0.5).unwrap();
    global.set_max(&key, 3.0).unwrap();
    assert_eq!(
        global.parameter(&key).unwrap().bounds(),
        Bounds::new(0.5, 3.0).unwrap()
    );

    assert!(matches!(global.set_min(&key, 1.5), Err(QuantError::Value(_))));
    assert!(matches!(global.set_max(&key, 0.7), Err(QuantError::Value(_))));
    assert!(matches!(
        global.set_bounds(&key, 3.0, 1.0),
        Err(QuantError::Bounds(_))
    ));
}

#[test]
fn test_fixed_and_free_parameters() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    let b = add_param(&mut global, "b", 1.0);
    let c = add_param(&mut global, "c", 1.0);

    global.set_fixed(&b, true).unwrap();
    global.set_enabled(&c, false).unwrap();
    assert_eq!(global.free_parameters(), vec![a.as_str()]);

    global.undo().unwrap();
    global.undo().unwrap();
    assert_eq!(global.free_parameters(), vec![a.as_str(), b.as_str(), c.as_str()]);
}

#[test]
fn test_display_name_setter() {
    let mut global = undoable();
    let key = add_param(&mut global, "amplitude", 1.0);
    assert_eq!(global.parameter(&key).unwrap().display_name(), "amplitude");

    global.set_display_name(&key, "A").unwrap();
    assert_eq!(global.parameter(&key).unwrap().display_name(), "A");

    global.undo().unwrap();
    assert_eq!(global.parameter(&key).unwrap().display_name(), "amplitude");
}

#[test]
fn test_as_data_snapshot() {
    let mut global = undoable();
    let key = global
        .add_descriptor(
            Descriptor::array("spectrum", vec![1.0, 2.0, 3.0], "eV")
                .unwrap()
                .with_description("measured spectrum")
                .with_url("https://example.org/spectrum"),
        )
        .unwrap();

    let data = global.descriptor(&key).unwrap().as_data();
    let json = serde_json::to_value(&data).unwrap();
    assert_eq!(json["name"], "spectrum");
    assert_eq!(json["unique_name"], "DescriptorArray_0");
    assert_eq!(json["unit"], "eV");
    assert_eq!(json["shape"], serde_json::json!([3]));
    assert_eq!(json["values"], serde_json::json!([1.0, 2.0, 3.0]));
    assert!(json["variance"].is_null());
}

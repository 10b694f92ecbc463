use crate::test_helpers::{add_param, scalar, undoable};
use approx::assert_relative_eq;
use quantfit_rs::constraints::ConstraintError;
use quantfit_rs::global_object::GlobalConfig;
use quantfit_rs::{Constraint, Descriptor, GlobalObject, QuantError};

#[test]
fn test_obj_constraint_follows_independent() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    let b = add_param(&mut global, "b", 1.0);

    let c = global
        .add_constraint(Constraint::obj(&a, "2*", &b).unwrap())
        .unwrap();
    global.add_user_constraint(&b, "double", c).unwrap();

    global.set_value(&b, 5.0).unwrap();
    assert_eq!(scalar(&global, &a), 10.0);
    assert!(!global.parameter(&a).unwrap().is_enabled());
    assert!(global.parameter(&b).unwrap().is_enabled());
}

#[test]
fn test_numeric_constraint_clamps_dependent() {
    let mut global = undoable();
    let p = add_param(&mut global, "p", 4.0);
    let c = global
        .add_constraint(Constraint::numeric(&p, "<=", 3.0).unwrap())
        .unwrap();
    global.add_user_constraint(&p, "limit", c).unwrap();

    global.set_value(&p, 7.0).unwrap();
    assert_eq!(scalar(&global, &p), 3.0);

    global.set_value(&p, 2.0).unwrap();
    assert_eq!(scalar(&global, &p), 2.0);

    // Calling directly also clamps
    global.set_value(&p, 2.5).unwrap();
    assert_eq!(
        global.call_constraint(c).unwrap().unwrap().sum(),
        2.5
    );
}

#[test]
fn test_multi_obj_constraint() {
    // a + b - 2*c = 0
    let mut global = undoable();
    let a = add_param(&mut global, "a", 0.0);
    let b = add_param(&mut global, "b", 1.0);
    let c = add_param(&mut global, "c", 1.0);

    let id = global
        .add_constraint(Constraint::multi_obj(&[b.as_str(), c.as_str()], &["+", "-2*"], &a, 0.0).unwrap())
        .unwrap();
    global.add_user_constraint(&b, "sum", id).unwrap();
    global.add_user_constraint(&c, "sum", id).unwrap();

    global.set_value(&b, 3.0).unwrap();
    global.set_value(&c, 4.0).unwrap();
    assert_eq!(scalar(&global, &a), 5.0);
}

#[test]
fn test_functional_constraint_with_descriptor_input() {
    let mut global = undoable();
    let width = add_param(&mut global, "width", 2.0);
    let area = add_param(&mut global, "area", 0.0);
    let length = global
        .add_descriptor(Descriptor::number("length", 3.0, "").unwrap())
        .unwrap();

    let id = global
        .add_constraint(
            Constraint::functional(
                &area,
                |args| Ok(&args[0] * &args[1]),
                Some(&[width.as_str(), length.as_str()][..]),
            )
            .unwrap(),
        )
        .unwrap();
    global.add_user_constraint(&width, "area", id).unwrap();

    global.set_value(&width, 4.0).unwrap();
    assert_eq!(scalar(&global, &area), 12.0);
}

#[test]
fn test_cascade_is_depth_first() {
    // c = b + 1, b = 2 * a
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    let b = add_param(&mut global, "b", 0.0);
    let c = add_param(&mut global, "c", 0.0);

    let ab = global
        .add_constraint(Constraint::obj(&b, "2*", &a).unwrap())
        .unwrap();
    let bc = global
        .add_constraint(Constraint::obj(&c, "1+", &b).unwrap())
        .unwrap();
    global.add_user_constraint(&a, "b", ab).unwrap();
    global.add_user_constraint(&b, "c", bc).unwrap();

    global.set_value(&a, 3.0).unwrap();
    assert_eq!(scalar(&global, &b), 6.0);
    assert_eq!(scalar(&global, &c), 7.0);
}

#[test]
fn test_runner_order_within_a_write() {
    // Two constraints on one independent run in insertion order.
    let mut global = undoable();
    let x = add_param(&mut global, "x", 1.0);
    let y = add_param(&mut global, "y", 0.0);
    let z = add_param(&mut global, "z", 0.0);

    let first = global
        .add_constraint(Constraint::obj(&y, "10*", &x).unwrap())
        .unwrap();
    let second = global
        .add_constraint(
            Constraint::functional(&z, |args| Ok(&args[0] + &args[1]), Some(&[x.as_str(), y.as_str()][..]))
                .unwrap(),
        )
        .unwrap();
    global.add_user_constraint(&x, "first", first).unwrap();
    global.add_user_constraint(&x, "second", second).unwrap();

    global.set_value(&x, 2.0).unwrap();
    // z sees the y written by the first constraint
    assert_eq!(scalar(&global, &z), 22.0);
}

#[test]
fn test_cycle_hits_cascade_limit() {
    let mut global = GlobalObject::with_config(GlobalConfig {
        max_cascade_depth: 16,
        ..GlobalConfig::default()
    });
    let a = add_param(&mut global, "a", 1.0);
    let b = add_param(&mut global, "b", 1.0);

    let ab = global
        .add_constraint(Constraint::obj(&b, "1+", &a).unwrap())
        .unwrap();
    global.add_user_constraint(&a, "b", ab).unwrap();
    let ba = global
        .add_constraint(Constraint::obj(&a, "1+", &b).unwrap())
        .unwrap();
    global.add_user_constraint(&b, "a", ba).unwrap();

    let err = global.set_value(&a, 2.0).unwrap_err();
    assert!(matches!(
        err,
        QuantError::Constraint(ConstraintError::CascadeDepth { limit: 16 })
    ));

    // The depth counter unwinds, so acyclic writes still work afterwards
    global.remove_constraint(ba).unwrap();
    global.set_value(&a, 2.0).unwrap();
    assert_eq!(scalar(&global, &b), 3.0);
}

#[test]
fn test_evaluate_without_setting() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    let b = add_param(&mut global, "b", 4.0);
    let id = global
        .add_constraint(Constraint::obj(&a, "0.5*", &b).unwrap())
        .unwrap();

    let preview = global.evaluate_constraint(id).unwrap().unwrap();
    assert_relative_eq!(preview.sum(), 2.0);
    assert_eq!(scalar(&global, &a), 1.0);
    assert!(!global.can_undo());
}

#[test]
fn test_self_reference_always_rejected() {
    for result in [
        Constraint::obj("Parameter_0", "2*", "Parameter_0"),
        Constraint::multi_obj(&["Parameter_1", "Parameter_0"], &["+", "-"], "Parameter_0", 0.0),
        Constraint::functional("Parameter_0", |a| Ok(a[0].clone()), Some(&["Parameter_0"][..])),
    ] {
        assert!(matches!(result, Err(QuantError::Attribute(_))));
    }
}

#[test]
fn test_unknown_participants_rejected_at_registration() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    assert!(matches!(
        global.add_constraint(Constraint::obj(&a, "2*", "Parameter_42").unwrap()),
        Err(QuantError::NotFound(_))
    ));
    assert!(global.parameter(&a).unwrap().is_enabled());
}

#[test]
fn test_teardown_detaches_and_reenables() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    let b = add_param(&mut global, "b", 1.0);
    let id = global
        .add_constraint(Constraint::obj(&a, "3*", &b).unwrap())
        .unwrap();
    global.add_user_constraint(&b, "triple", id).unwrap();

    global.remove_constraint(id).unwrap();
    assert!(global.parameter(&a).unwrap().is_enabled());
    assert_eq!(global.parameter(&b).unwrap().user_constraints().count(), 0);

    global.set_value(&b, 9.0).unwrap();
    assert_eq!(scalar(&global, &a), 1.0);
    assert!(matches!(
        global.remove_constraint(id),
        Err(QuantError::NotFound(_))
    ));
}

#[test]
fn test_fit_slot_runs_last() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    let b = add_param(&mut global, "b", 0.0);
    let user = global
        .add_constraint(Constraint::numeric(&a, "<=", 5.0).unwrap())
        .unwrap();
    let fit = global
        .add_constraint(Constraint::obj(&b, "", &a).unwrap())
        .unwrap();
    global.add_user_constraint(&a, "cap", user).unwrap();
    assert_eq!(global.set_fit_constraint(&a, Some(fit)).unwrap(), None);

    global.set_value(&a, 8.0).unwrap();
    assert_eq!(scalar(&global, &a), 5.0);
    assert_eq!(scalar(&global, &b), 5.0);
}

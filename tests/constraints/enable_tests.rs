use crate::test_helpers::{add_param, scalar, undoable};
use quantfit_rs::constraints::ConstraintError;
use quantfit_rs::{Constraint, QuantError};

#[test]
fn test_disable_hands_dependent_back() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    let b = add_param(&mut global, "b", 1.0);
    let id = global
        .add_constraint(Constraint::obj(&a, "2*", &b).unwrap())
        .unwrap();
    global.add_user_constraint(&b, "double", id).unwrap();
    global.set_value(&b, 5.0).unwrap();
    assert!(!global.parameter(&a).unwrap().is_enabled());

    global.set_constraint_enabled(id, false).unwrap();
    assert!(global.parameter(&a).unwrap().is_enabled());
    assert_eq!(scalar(&global, &a), 10.0);

    // Disabled constraints are skipped by the runner and by direct calls
    global.set_value(&b, 7.0).unwrap();
    assert_eq!(scalar(&global, &a), 10.0);
    assert_eq!(global.call_constraint(id).unwrap(), None);
}

#[test]
fn test_enable_pushes_fresh_value() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    let b = add_param(&mut global, "b", 1.0);
    let id = global
        .add_constraint(Constraint::obj(&a, "2*", &b).unwrap())
        .unwrap();
    global.set_constraint_enabled(id, false).unwrap();
    global.set_value(&b, 4.0).unwrap();
    assert_eq!(scalar(&global, &a), 1.0);

    global.set_constraint_enabled(id, true).unwrap();
    assert!(!global.parameter(&a).unwrap().is_enabled());
    assert_eq!(scalar(&global, &a), 8.0);
}

#[test]
fn test_toggle_is_idempotent() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    let b = add_param(&mut global, "b", 3.0);
    let id = global
        .add_constraint(Constraint::obj(&a, "2*", &b).unwrap())
        .unwrap();

    // Already enabled: no evaluation happens
    global.set_constraint_enabled(id, true).unwrap();
    assert_eq!(scalar(&global, &a), 1.0);

    global.set_constraint_enabled(id, false).unwrap();
    global.set_constraint_enabled(id, false).unwrap();
    assert!(global.parameter(&a).unwrap().is_enabled());
    assert!(!global.constraint(id).unwrap().is_enabled());
}

#[test]
fn test_disabled_dependent_cannot_be_claimed() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    let b = add_param(&mut global, "b", 1.0);
    global.set_enabled(&a, false).unwrap();

    let err = global
        .add_constraint(Constraint::obj(&a, "2*", &b).unwrap())
        .unwrap_err();
    assert!(matches!(
        err,
        QuantError::Constraint(ConstraintError::DependentDisabled { .. })
    ));
}

#[test]
fn test_self_constraints_do_not_claim() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    let id = global
        .add_constraint(Constraint::numeric(&a, ">=", 0.0).unwrap())
        .unwrap();
    assert!(global.parameter(&a).unwrap().is_enabled());
    assert!(!global.constraint(id).unwrap().owns_dependent());
}

#[test]
fn test_numeric_toggle_drives_dependent_flag() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 5.0);
    let id = global
        .add_constraint(Constraint::numeric(&a, "<=", 1.0).unwrap())
        .unwrap();

    global.set_constraint_enabled(id, false).unwrap();
    assert!(global.parameter(&a).unwrap().is_enabled());
    assert_eq!(scalar(&global, &a), 5.0);

    global.set_constraint_enabled(id, true).unwrap();
    assert!(!global.parameter(&a).unwrap().is_enabled());
    assert_eq!(scalar(&global, &a), 1.0);

    global.set_constraint_enabled(id, false).unwrap();
    assert!(global.parameter(&a).unwrap().is_enabled());
    assert_eq!(scalar(&global, &a), 1.0);
}

#[test]
fn test_constraint_in_own_dependent_chain() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    let b = add_param(&mut global, "b", 2.0);
    let id = global
        .add_constraint(Constraint::obj(&a, "", &b).unwrap())
        .unwrap();
    global.add_user_constraint(&a, "num_1", id).unwrap();

    global.set_constraint_enabled(id, false).unwrap();
    assert!(global.parameter(&a).unwrap().is_enabled());

    global.set_constraint_enabled(id, true).unwrap();
    assert!(!global.parameter(&a).unwrap().is_enabled());
    assert_eq!(scalar(&global, &a), 2.0);

    // Writes to the dependent are corrected to the constrained value
    global.set_value(&a, 3.0).unwrap();
    assert_eq!(scalar(&global, &a), 2.0);

    global.set_value(&b, 5.0).unwrap();
    global.set_value(&a, 0.0).unwrap();
    assert_eq!(scalar(&global, &a), 5.0);

    global.set_constraint_enabled(id, false).unwrap();
    global.set_value(&a, 3.0).unwrap();
    assert_eq!(scalar(&global, &a), 3.0);
}

#[test]
fn test_failed_enable_restores_flags() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    let b = add_param(&mut global, "b", 1.0);
    let id = global
        .add_constraint(Constraint::obj(&a, "2*", &b).unwrap())
        .unwrap();
    global.set_constraint_enabled(id, false).unwrap();
    global.remove(&b).unwrap();

    assert!(matches!(
        global.set_constraint_enabled(id, true),
        Err(QuantError::NotFound(_))
    ));
    assert!(!global.constraint(id).unwrap().is_enabled());
    assert!(global.parameter(&a).unwrap().is_enabled());

    global.set_value(&a, 4.0).unwrap();
    assert_eq!(scalar(&global, &a), 4.0);
}

use crate::test_helpers::{add_param, rng, scalar, undoable};
use quantfit_rs::global_object::{Quantity, UndoError};
use quantfit_rs::{Constraint, GlobalObject, Parameter, QuantError};
use rand::Rng;

fn snapshot(global: &GlobalObject, keys: &[String]) -> Vec<Quantity> {
    keys.iter()
        .map(|k| global.map().get_item_by_key(k).unwrap().clone())
        .collect()
}

/// Apply one random, valid mutation; returns false if nothing was recorded
fn mutate(global: &mut GlobalObject, key: &str, rng: &mut impl Rng) -> bool {
    let value = scalar(global, key);
    let result = match rng.gen_range(0..7) {
        0 => global.set_value(key, rng.gen_range(-100.0..100.0)),
        1 => global.set_variance(key, rng.gen_range(0.0..2.0)),
        2 => global.set_fixed(key, rng.gen_bool(0.5)),
        3 => global.set_min(key, value - rng.gen_range(0.0..10.0)),
        4 => global.set_max(key, value + rng.gen_range(0.0..10.0)),
        5 => global.convert_unit(key, ["m", "cm", "mm", "km"][rng.gen_range(0..4)]),
        _ => global.set_display_name(key, format!("name{}", rng.gen_range(0..100))),
    };
    result.is_ok()
}

#[test]
fn test_undo_then_redo_restores_exact_states() {
    let mut rng = rng();
    for _ in 0..20 {
        let mut global = undoable();
        let keys: Vec<String> = (0..3)
            .map(|i| {
                global
                    .add_parameter(Parameter::new(format!("p{}", i), i as f64, "m").unwrap())
                    .unwrap()
            })
            .collect();

        let before = snapshot(&global, &keys);
        let mut recorded = 0;
        for _ in 0..rng.gen_range(1..25) {
            let key = &keys[rng.gen_range(0..keys.len())];
            if mutate(&mut global, key, &mut rng) {
                recorded += 1;
            }
        }
        let after = snapshot(&global, &keys);

        for _ in 0..recorded {
            assert!(global.undo().unwrap());
        }
        assert!(!global.can_undo());
        assert_eq!(snapshot(&global, &keys), before);

        for _ in 0..recorded {
            assert!(global.redo().unwrap());
        }
        assert!(!global.can_redo());
        assert_eq!(snapshot(&global, &keys), after);
    }
}

#[test]
fn test_macro_undoes_atomically() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    let b = add_param(&mut global, "b", 2.0);

    global.begin_macro("Fitting routine");
    for i in 0..5 {
        global.set_value(&a, 10.0 + i as f64).unwrap();
        global.set_value(&b, 20.0 + i as f64).unwrap();
    }
    global.set_fixed(&a, true).unwrap();
    global.end_macro().unwrap();

    assert_eq!(global.undo_text(), Some("Fitting routine"));
    assert!(global.undo().unwrap());
    assert_eq!(scalar(&global, &a), 1.0);
    assert_eq!(scalar(&global, &b), 2.0);
    assert!(!global.parameter(&a).unwrap().is_fixed());
    assert!(!global.can_undo());

    assert_eq!(global.redo_text(), Some("Fitting routine"));
    assert!(global.redo().unwrap());
    assert_eq!(scalar(&global, &a), 14.0);
    assert_eq!(scalar(&global, &b), 24.0);
    assert!(global.parameter(&a).unwrap().is_fixed());
}

#[test]
fn test_macro_balance_errors() {
    let mut global = undoable();
    assert!(matches!(
        global.end_macro(),
        Err(QuantError::Undo(UndoError::NoOpenMacro))
    ));

    global.begin_macro("open");
    assert!(matches!(
        global.redo(),
        Err(QuantError::Undo(UndoError::MacroOpen { .. }))
    ));
    global.end_macro().unwrap();
    // An empty macro leaves no entry
    assert!(!global.can_undo());
}

#[test]
fn test_disabled_stack_mutates_without_history() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    global.set_value(&a, 2.0).unwrap();

    global.set_undo_enabled(false);
    global.set_value(&a, 3.0).unwrap();
    assert_eq!(scalar(&global, &a), 3.0);
    assert_eq!(global.undo_text(), Some(format!("{}.value", a).as_str()));

    global.set_undo_enabled(true);
    global.undo().unwrap();
    assert_eq!(scalar(&global, &a), 1.0);
}

#[test]
fn test_new_action_clears_redo() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 1.0);
    global.set_value(&a, 2.0).unwrap();
    global.undo().unwrap();
    assert!(global.can_redo());
    global.set_value(&a, 5.0).unwrap();
    assert!(!global.can_redo());
    assert!(!global.redo().unwrap());
}

#[test]
fn test_undo_recomputes_dependents() {
    let mut global = undoable();
    let a = add_param(&mut global, "a", 0.0);
    let b = add_param(&mut global, "b", 1.0);
    let id = global
        .add_constraint(Constraint::obj(&a, "2*", &b).unwrap())
        .unwrap();
    global.add_user_constraint(&b, "double", id).unwrap();

    global.set_value(&b, 2.0).unwrap();
    global.set_value(&b, 3.0).unwrap();
    assert_eq!(scalar(&global, &a), 6.0);

    global.undo().unwrap();
    assert_eq!(scalar(&global, &a), 4.0);
    global.undo().unwrap();
    assert_eq!(scalar(&global, &a), 2.0);
    global.redo().unwrap();
    assert_eq!(scalar(&global, &a), 4.0);
}

#[test]
fn test_max_history() {
    let mut global = GlobalObject::with_config(quantfit_rs::GlobalConfig {
        undo_enabled: true,
        max_history: Some(3),
        ..Default::default()
    });
    let a = add_param(&mut global, "a", 0.0);
    for i in 1..=10 {
        global.set_value(&a, i as f64).unwrap();
    }
    let mut undone = 0;
    while global.undo().unwrap() {
        undone += 1;
    }
    assert_eq!(undone, 3);
    assert_eq!(scalar(&global, &a), 7.0);
}

//! Tests for #[derive(ModelAction)]

use modelx::{Action, ActionDecodeError, ActionKind, ModelAction};

#[derive(ModelAction, Clone, Debug, PartialEq)]
#[action(namespace = "counter")]
enum CounterAction {
    Increment,
    Set(i64),
    Jump { by: i64, wrap: bool },
    Pair(i64, String),
    #[action(rename = "zero")]
    Reset,
}

#[test]
fn test_kinds_are_namespaced_snake_case() {
    assert_eq!(
        ModelAction::kind(&CounterAction::Increment),
        ActionKind::new("counter", "increment")
    );
    assert_eq!(
        ModelAction::kind(&CounterAction::Set(1)).to_string(),
        "counter/set"
    );
    assert_eq!(
        ModelAction::kind(&CounterAction::Jump { by: 1, wrap: false }).to_string(),
        "counter/jump"
    );
}

#[test]
fn test_rename_overrides_variant_name() {
    assert_eq!(
        ModelAction::kind(&CounterAction::Reset).to_string(),
        "counter/zero"
    );
}

#[test]
fn test_unit_variant_has_no_payload() {
    let action: Action = CounterAction::Increment.into();
    assert!(action.payload().is_none());
}

#[test]
fn test_single_tuple_field_is_bare_payload() {
    let action: Action = CounterAction::Set(42).into();
    assert_eq!(action.payload(), Some(&serde_json::json!(42)));
}

#[test]
fn test_named_fields_become_object_payload() {
    let action: Action = CounterAction::Jump { by: 3, wrap: true }.into();
    assert_eq!(
        action.payload(),
        Some(&serde_json::json!({ "by": 3, "wrap": true }))
    );
}

#[test]
fn test_multiple_tuple_fields_become_array_payload() {
    let action: Action = CounterAction::Pair(7, "seven".to_string()).into();
    assert_eq!(action.payload(), Some(&serde_json::json!([7, "seven"])));
}

#[test]
fn test_decode_roundtrip() {
    for original in [
        CounterAction::Increment,
        CounterAction::Set(42),
        CounterAction::Jump { by: -2, wrap: false },
        CounterAction::Pair(1, "one".to_string()),
        CounterAction::Reset,
    ] {
        let action: Action = original.clone().into();
        let decoded = CounterAction::try_from(&action).unwrap();
        assert_eq!(decoded, original);
    }
}

#[test]
fn test_decode_rejects_foreign_namespace() {
    let action = Action::new(ActionKind::new("other", "increment"));
    let err = CounterAction::try_from(&action).unwrap_err();
    assert!(matches!(err, ActionDecodeError::UnknownKind(_)));
}

#[test]
fn test_decode_rejects_unknown_name() {
    let action = Action::new(ActionKind::new("counter", "explode"));
    let err = CounterAction::try_from(&action).unwrap_err();
    assert!(matches!(err, ActionDecodeError::UnknownKind(_)));
}

#[test]
fn test_decode_rejects_bad_payload() {
    let action = Action::with_payload(ActionKind::new("counter", "set"), "not a number").unwrap();
    let err = CounterAction::try_from(&action).unwrap_err();
    assert!(matches!(err, ActionDecodeError::Payload { .. }));
}

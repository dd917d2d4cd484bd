use super::*;
use futures::executor::block_on;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn registration_catalog() -> MessageCatalog {
    MessageCatalog::new()
        .message("firstName", ErrorKind::REQUIRED, "Please enter your first name.")
        .message(
            "firstName",
            ErrorKind::MIN_LENGTH,
            "The first name must be longer than 2 characters.",
        )
        .message("lastName", ErrorKind::REQUIRED, "Please enter your last name.")
        .message(
            "emailGroup.email",
            ErrorKind::REQUIRED,
            "Please enter your email address.",
        )
        .message(
            "emailGroup.email",
            ErrorKind::EMAIL,
            "Please enter a valid email address.",
        )
        .message(
            "emailGroup.confirmEmail",
            ErrorKind::REQUIRED,
            "Please confirm your email address.",
        )
        .message("emailGroup", ErrorKind::MATCH, "The emails don't match")
        .message("phone", ErrorKind::REQUIRED, "Please enter your phone number.")
        .message(
            "rating",
            ErrorKind::RANGE,
            "Please rate your experience from 1 to 5.",
        )
}

fn registration_tree(options: TreeOptions) -> FormTree {
    FormTree::build(
        GroupSpec::new()
            .field(
                "firstName",
                FieldSpec::new("").validator(required()).validator(min_length(3)),
            )
            .field(
                "lastName",
                FieldSpec::new("").validator(required()).validator(max_length(50)),
            )
            .group(
                "emailGroup",
                GroupSpec::new()
                    .field(
                        "email",
                        FieldSpec::new("").validator(required()).validator(email_format()),
                    )
                    .field("confirmEmail", FieldSpec::new("").validator(required()))
                    .validator(values_match(["email", "confirmEmail"])),
            )
            .field("phone", FieldSpec::new(""))
            .field("notification", FieldSpec::new("email"))
            .field(
                "rating",
                FieldSpec::new(Value::Null)
                    .validator(numeric_range(Decimal::from(1), Decimal::from(5))),
            )
            .field("sendCatalog", FieldSpec::new(true)),
        registration_catalog(),
        options,
    )
    .expect("registration tree builds")
}

#[test]
fn numeric_range_accepts_unset_and_in_range_values() {
    let validator = numeric_range(Decimal::from(1), Decimal::from(5));
    assert!(validator.validate(&Value::Null).is_none());
    assert!(validator.validate(&Value::from(3)).is_none());
    assert!(validator.validate(&Value::from("4")).is_none());

    let errors = validator.validate(&Value::from(9)).expect("out of range fails");
    assert_eq!(
        errors.get(&ErrorKind::RANGE),
        Some(&ErrorDetail::Range {
            min: Decimal::from(1),
            max: Decimal::from(5),
        })
    );
    assert!(validator.validate(&Value::from("not a number")).is_some());
    assert!(validator.validate(&Value::from(true)).is_some());
}

#[test]
fn required_rejects_null_and_empty_text() {
    let validator = required();
    assert!(validator.validate(&Value::Null).is_some());
    assert!(validator.validate(&Value::from("")).is_some());
    assert!(validator.validate(&Value::from("x")).is_none());
    assert!(validator.validate(&Value::from(false)).is_none());
}

#[test]
fn length_and_email_validators_ignore_empty_values() {
    assert!(min_length(3).validate(&Value::from("")).is_none());
    assert!(min_length(3).validate(&Value::from("ab")).is_some());
    assert!(min_length(3).validate(&Value::from("abc")).is_none());
    assert!(max_length(3).validate(&Value::from("abcd")).is_some());
    assert!(email_format().validate(&Value::from("")).is_none());
    assert!(email_format().validate(&Value::from("nope")).is_some());
    assert!(email_format().validate(&Value::from("a@b.com")).is_none());
}

#[test]
fn values_match_skips_while_any_participant_is_pristine() {
    let tree = registration_tree(TreeOptions::default());
    tree.set_value("emailGroup.email", "a@b.com")
        .expect("set email");
    assert!(tree.errors("emailGroup").expect("group errors").is_empty());
}

#[test]
fn values_match_fails_only_when_all_dirty_and_unequal() {
    let tree = registration_tree(TreeOptions::default());
    tree.set_value("emailGroup.email", "a@b.com")
        .expect("set email");
    tree.set_value("emailGroup.confirmEmail", "b@c.com")
        .expect("set confirm");
    assert!(
        tree.errors("emailGroup")
            .expect("group errors")
            .contains_key(&ErrorKind::MATCH)
    );

    tree.set_value("emailGroup.confirmEmail", "a@b.com")
        .expect("set matching confirm");
    assert!(tree.errors("emailGroup").expect("group errors").is_empty());
}

#[test]
fn leaf_edits_revalidate_ancestor_groups() {
    let tree = registration_tree(TreeOptions::default());
    tree.set_value("emailGroup.email", "a@b.com")
        .expect("set email");
    tree.set_value("emailGroup.confirmEmail", "a@b.com")
        .expect("set confirm");
    assert!(tree.errors("emailGroup").expect("group errors").is_empty());

    // Editing one leaf must re-run the group's cross-field validators.
    tree.set_value("emailGroup.email", "changed@b.com")
        .expect("edit email");
    assert!(
        tree.errors("emailGroup")
            .expect("group errors")
            .contains_key(&ErrorKind::MATCH)
    );
}

#[test]
fn notification_kind_toggles_phone_requirement() {
    let tree = registration_tree(TreeOptions::default());
    tree.on_change("notification", |form, value| {
        let result = if value.as_str() == Some("text") {
            let phone_validators: Vec<FieldValidatorRef> = vec![Arc::new(required())];
            form.set_validators("phone", phone_validators)
        } else {
            form.clear_validators("phone")
        };
        result.expect("phone validators update");
    })
    .expect("register notification handler");

    assert!(tree.errors("phone").expect("phone errors").is_empty());
    tree.set_value("notification", "text").expect("switch to text");
    assert!(
        tree.errors("phone")
            .expect("phone errors")
            .contains_key(&ErrorKind::REQUIRED)
    );

    tree.set_value("notification", "email")
        .expect("switch back to email");
    assert!(tree.errors("phone").expect("phone errors").is_empty());
}

#[test]
fn changed_path_locates_the_nested_edit() {
    let old = Value::composite([
        ("a", Value::from(1)),
        (
            "b",
            Value::composite([("c", Value::from(2)), ("d", Value::from(3))]),
        ),
    ]);
    let new = Value::composite([
        ("a", Value::from(1)),
        (
            "b",
            Value::composite([("c", Value::from(9)), ("d", Value::from(3))]),
        ),
    ]);
    assert_eq!(changed_path(&old, &new), Some("b.c".to_string()));
    assert_eq!(changed_path(&new, &new.clone()), None);
}

#[test]
fn changed_path_picks_the_first_differing_key() {
    let old = Value::composite([("a", Value::from(1)), ("b", Value::from(2))]);
    let new = Value::composite([("a", Value::from(7)), ("b", Value::from(8))]);
    assert_eq!(changed_path(&old, &new), Some("a".to_string()));
}

#[test]
fn flush_changes_resolves_message_for_the_edited_field() {
    let tree = registration_tree(TreeOptions::default());
    tree.set_value("emailGroup.email", "nope").expect("set email");
    let path = tree.flush_changes().expect("flush changes");
    assert_eq!(path.as_deref(), Some("emailGroup.email"));
    assert_eq!(
        tree.message("emailGroup.email").expect("message").as_deref(),
        Some("Please enter a valid email address.")
    );

    let again = tree.flush_changes().expect("flush without edits");
    assert_eq!(again, None);
}

#[test]
fn debounced_change_pass_keeps_only_the_latest_edit() {
    let tree = registration_tree(TreeOptions {
        change_debounce: Duration::from_millis(50),
    });

    let first = {
        let tree = tree.clone();
        thread::spawn(move || {
            block_on(tree.set_value_debounced("firstName", "Jo")).expect("first edit")
        })
    };
    thread::sleep(Duration::from_millis(10));
    let second = {
        let tree = tree.clone();
        thread::spawn(move || {
            block_on(tree.set_value_debounced("firstName", "Joan")).expect("second edit")
        })
    };

    let first = first.join().expect("first thread joins");
    let second = second.join().expect("second thread joins");

    assert_eq!(first, None);
    assert_eq!(second, Some("firstName".to_string()));
    assert_eq!(tree.value("firstName").expect("value"), Value::from("Joan"));
}

#[test]
fn set_message_records_field_and_parent_group_messages() {
    let tree = registration_tree(TreeOptions::default());
    tree.set_value("emailGroup.email", "a@b.com")
        .expect("set email");
    tree.set_value("emailGroup.confirmEmail", "b@c.com")
        .expect("set confirm");
    tree.set_message("emailGroup.confirmEmail")
        .expect("resolve message");

    let messages = tree.messages().expect("message store");
    assert_eq!(
        messages.get("emailGroup").map(String::as_str),
        Some("The emails don't match")
    );
    assert_eq!(
        messages.get("emailGroup.confirmEmail").map(String::as_str),
        Some("")
    );
}

#[test]
fn set_message_requires_touched_or_dirty() {
    let tree = registration_tree(TreeOptions::default());

    // firstName is errored (required) but pristine and untouched.
    tree.set_message("firstName").expect("resolve message");
    assert_eq!(
        tree.message("firstName").expect("message").as_deref(),
        Some("")
    );

    tree.mark_touched("firstName").expect("touch field");
    tree.set_message("firstName").expect("resolve again");
    assert_eq!(
        tree.message("firstName").expect("message").as_deref(),
        Some("Please enter your first name.")
    );
}

#[test]
fn process_messages_flattens_dirty_errored_leaves_by_name() {
    let tree = registration_tree(TreeOptions::default());
    tree.set_value("emailGroup.email", "not-an-email")
        .expect("set email");

    let messages = tree.process_messages().expect("aggregate messages");
    assert_eq!(
        messages.get("email").map(String::as_str),
        Some("Please enter a valid email address.")
    );
    // Errored but pristine leaves stay out of the aggregate.
    assert!(!messages.contains_key("confirmEmail"));
    assert!(!messages.contains_key("firstName"));
}

#[test]
fn process_messages_joins_all_active_messages() {
    let tree = registration_tree(TreeOptions::default());
    tree.set_value("firstName", "Jo").expect("set short name");
    tree.set_value("firstName", "").expect("clear name");

    let messages = tree.process_messages().expect("aggregate messages");
    assert_eq!(
        messages.get("firstName").map(String::as_str),
        Some("Please enter your first name.")
    );

    tree.set_value("firstName", "Jo").expect("set short name again");
    let messages = tree.process_messages().expect("aggregate messages");
    assert_eq!(
        messages.get("firstName").map(String::as_str),
        Some("The first name must be longer than 2 characters.")
    );
}

#[test]
fn missing_catalog_entries_yield_empty_messages() {
    let tree = FormTree::build(
        GroupSpec::new().field(
            "age",
            FieldSpec::new("").validator(numeric_range(Decimal::from(0), Decimal::from(130))),
        ),
        MessageCatalog::new(),
        TreeOptions::default(),
    )
    .expect("tree builds");

    tree.set_value("age", "oops").expect("set non-numeric age");
    tree.set_message("age").expect("resolve message");
    assert_eq!(tree.message("age").expect("message").as_deref(), Some(""));
    assert!(tree.process_messages().expect("aggregate").is_empty());
}

#[test]
fn duplicate_sibling_names_are_rejected() {
    let result = FormTree::build(
        GroupSpec::new()
            .field("name", FieldSpec::new(""))
            .field("name", FieldSpec::new("")),
        MessageCatalog::new(),
        TreeOptions::default(),
    );
    assert_eq!(
        result.err(),
        Some(FormError::DuplicateChild {
            parent: String::new(),
            name: "name".to_string(),
        })
    );
}

#[test]
fn unknown_paths_surface_as_errors() {
    let tree = registration_tree(TreeOptions::default());
    assert_eq!(
        tree.set_value("nope", 1).err(),
        Some(FormError::UnknownPath("nope".to_string()))
    );
    assert_eq!(
        tree.set_value("firstName.inner", 1).err(),
        Some(FormError::UnknownPath("firstName.inner".to_string()))
    );
    assert_eq!(
        tree.set_value("emailGroup", 1).err(),
        Some(FormError::NotAField("emailGroup".to_string()))
    );
}

#[test]
fn snapshot_reports_dirty_and_validity() {
    let tree = registration_tree(TreeOptions::default());
    let initial = tree.snapshot().expect("initial snapshot");
    assert!(!initial.is_dirty);
    assert!(!initial.is_valid);

    tree.set_value("firstName", "Joan").expect("set first name");
    tree.set_value("lastName", "Doe").expect("set last name");
    tree.set_value("emailGroup.email", "joan@doe.com")
        .expect("set email");
    tree.set_value("emailGroup.confirmEmail", "joan@doe.com")
        .expect("set confirm");

    let snapshot = tree.snapshot().expect("snapshot");
    assert!(snapshot.is_dirty);
    assert!(snapshot.is_valid);
}

#[test]
fn save_serializes_the_composite_value() {
    let tree = registration_tree(TreeOptions::default());
    tree.set_value("firstName", "Joan").expect("set first name");
    tree.set_value("rating", Decimal::from(4)).expect("set rating");

    let json = tree.save().expect("save");
    assert!(json.starts_with("{\"firstName\":\"Joan\""));
    assert!(json.contains("\"emailGroup\":{\"email\":\"\",\"confirmEmail\":\"\"}"));
    assert!(json.contains("\"sendCatalog\":true"));
    assert!(json.contains("\"rating\":\"4\""));
}

#[test]
fn group_value_is_composed_from_children() {
    let tree = registration_tree(TreeOptions::default());
    tree.set_value("emailGroup.email", "a@b.com")
        .expect("set email");
    assert_eq!(
        tree.value("emailGroup").expect("group value"),
        Value::composite([
            ("email", Value::from("a@b.com")),
            ("confirmEmail", Value::from("")),
        ])
    );
}

#[test]
fn set_value_marks_the_whole_ancestor_chain_dirty() {
    let tree = registration_tree(TreeOptions::default());
    tree.set_value("emailGroup.email", "a@b.com")
        .expect("set email");
    assert!(tree.is_dirty("emailGroup.email").expect("leaf dirty"));
    assert!(tree.is_dirty("emailGroup").expect("group dirty"));
    assert!(tree.is_dirty("").expect("root dirty"));
    assert!(!tree.is_dirty("firstName").expect("sibling stays pristine"));
}

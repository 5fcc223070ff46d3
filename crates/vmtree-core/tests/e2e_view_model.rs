//! End-to-end view-model scenarios.
//!
//! Each test drives public API only and checks the observable event stream:
//!
//! 1. Computed chains announce once per write.
//! 2. Child mutations reach the parent as `Children` changes.
//! 3. Dirty, read-only, validation and check behaviour across a tree.

#![forbid(unsafe_code)]

use std::cell::Cell;
use std::rc::Rc;

use vmtree_core::testing::EventRecorder;
use vmtree_core::{
    CheckState, Declare, Node, NodeEvent, SchemaBuilder, SourceDecl, Value, names, node_for, rules,
};

// ── Test Types ──────────────────────────────────────────────────────────

struct Calculator;

impl Declare for Calculator {
    fn schema_name() -> &'static str {
        "Calculator"
    }

    fn declare(builder: SchemaBuilder) -> SchemaBuilder {
        builder
            .property("FirstProperty", 0)
            .computed(
                "SecondProperty",
                [SourceDecl::property("FirstProperty")],
                |node| Value::Int(node.get_as::<i64>("FirstProperty").unwrap_or(0) + 1),
            )
            .computed(
                "ThirdProperty",
                [
                    SourceDecl::property("FirstProperty"),
                    SourceDecl::property("SecondProperty"),
                ],
                |node| {
                    let first = node.get_as::<i64>("FirstProperty").unwrap_or(0);
                    let second = node.get_as::<i64>("SecondProperty").unwrap_or(0);
                    Value::Int(first + second)
                },
            )
    }
}

struct Diamond;

impl Declare for Diamond {
    fn declare(builder: SchemaBuilder) -> SchemaBuilder {
        builder
            .property("A", 0)
            .computed("B", [SourceDecl::property("A")], |_| Value::Null)
            .computed("C", [SourceDecl::property("A")], |_| Value::Null)
            .computed(
                "D",
                [SourceDecl::property("B"), SourceDecl::property("C")],
                |_| Value::Null,
            )
    }
}

struct Contact;

impl Declare for Contact {
    fn schema_name() -> &'static str {
        "Contact"
    }

    fn declare(builder: SchemaBuilder) -> SchemaBuilder {
        builder
            .property("Name", "")
            .property("Email", "")
            .property_ignoring_dirty("IsSelected", false)
    }
}

struct Folder;

impl Declare for Folder {
    fn declare(builder: SchemaBuilder) -> SchemaBuilder {
        builder.property("Title", "").checkable()
    }
}

fn contact() -> Node {
    node_for::<Contact>().expect("contact schema")
}

fn folder() -> Node {
    node_for::<Folder>().expect("folder schema")
}

// ── Cascade ─────────────────────────────────────────────────────────────

#[test]
fn computed_chain_announces_each_dependent_once() {
    let node = node_for::<Calculator>().expect("calculator schema");
    let recorder = EventRecorder::attach(&node);

    assert_eq!(node.set("FirstProperty", 1), Ok(true));

    assert_eq!(node.get("SecondProperty"), Ok(Value::Int(2)));
    assert_eq!(node.get("ThirdProperty"), Ok(Value::Int(3)));
    assert_eq!(recorder.changed_count("FirstProperty"), 1);
    assert_eq!(recorder.changed_count("SecondProperty"), 1);
    assert_eq!(recorder.changed_count("ThirdProperty"), 1);
}

#[test]
fn diamond_notifies_the_sink_once() {
    let node = node_for::<Diamond>().expect("diamond schema");
    let recorder = EventRecorder::attach(&node);
    node.set("A", 1).expect("set");
    assert_eq!(recorder.changed_count("D"), 1);
    assert_eq!(recorder.changed_count("B"), 1);
    assert_eq!(recorder.changed_count("C"), 1);
}

#[test]
fn equal_writes_are_silent() {
    let node = contact();
    node.set("Name", "Ada").expect("set");
    let recorder = EventRecorder::attach(&node);
    assert_eq!(node.set("Name", "Ada"), Ok(false));
    assert_eq!(recorder.changing_count("Name"), 0);
    assert_eq!(recorder.changed_count("Name"), 0);
}

#[test]
fn watchers_see_computed_inputs() {
    let node = node_for::<Calculator>().expect("calculator schema");
    let rechecks = Rc::new(Cell::new(0u32));
    let sources: Vec<String> = node
        .schema()
        .sources_of("ThirdProperty")
        .iter()
        .map(|decl| decl.source().to_owned())
        .collect();
    let _watch = {
        let rechecks = Rc::clone(&rechecks);
        node.watch(&sources, move |_| rechecks.set(rechecks.get() + 1))
    };
    node.set("FirstProperty", 5).expect("set");
    assert_eq!(rechecks.get(), 2);
}

// ── Ownership Tree ──────────────────────────────────────────────────────

#[test]
fn child_write_reaches_parent_exactly_twice() {
    let parent = contact();
    let child = contact();
    parent.add_child(&child);

    let recorder = EventRecorder::attach(&parent);
    child.set("Name", "leaf").expect("set");

    assert_eq!(recorder.changed_count(names::CHILDREN), 2);
    assert_eq!(recorder.total_changed(), 2);
}

#[test]
fn dirty_bubbles_up_but_reset_stays_local() {
    let root = contact();
    let mid = contact();
    let leaf = contact();
    root.add_child(&mid);
    mid.add_child(&leaf);
    root.mark_clean();
    mid.mark_clean();

    leaf.set("Email", "a@b.c").expect("set");
    assert!(leaf.is_dirty());
    assert!(mid.is_dirty());
    assert!(root.is_dirty());

    root.mark_clean();
    assert!(!root.is_dirty());
    assert!(mid.is_dirty());
    assert!(leaf.is_dirty());
}

#[test]
fn removed_children_stop_reporting() {
    let parent = contact();
    let child = contact();
    parent.add_child(&child);
    parent.remove_child(&child);
    parent.mark_clean();

    let recorder = EventRecorder::attach(&parent);
    child.set("Name", "gone").expect("set");
    assert!(recorder.is_empty());
    assert!(!parent.is_dirty());
}

// ── Read-only ───────────────────────────────────────────────────────────

#[test]
fn read_only_freezes_everything_but_itself() {
    let node = contact();
    node.set_read_only(true);
    let recorder = EventRecorder::attach(&node);

    assert_eq!(node.set("Name", "blocked"), Ok(false));
    assert_eq!(node.get("Name"), Ok(Value::from("")));
    assert!(recorder.is_empty());

    assert_eq!(node.set(names::IS_READ_ONLY, false), Ok(true));
    assert_eq!(recorder.changed_count(names::IS_READ_ONLY), 1);
}

// ── Validation ──────────────────────────────────────────────────────────

#[test]
fn validity_flips_and_is_announced() {
    let node = contact();
    node.add_validation("Name", rules::required("Name is required"))
        .expect("rule");
    assert!(node.has_errors());
    assert_eq!(node.error_text("Name"), "Name is required");

    let recorder = EventRecorder::attach(&node);
    node.set("Name", "Grace").expect("set");
    assert!(!node.has_errors());
    assert!(node.is_valid());
    assert_eq!(recorder.changed_count(names::IS_VALID), 1);
    assert!(
        recorder
            .events()
            .contains(&NodeEvent::ErrorsChanged("Name".into()))
    );
}

#[test]
fn suspension_defers_errors_until_resume() {
    let node = contact();
    node.set("Email", "x@y.z").expect("set");
    node.add_validation(
        "Email",
        rules::predicate("Email needs an @", |v| {
            v.as_text().is_some_and(|t| t.contains('@'))
        }),
    )
    .expect("rule");
    assert!(node.is_valid());

    let guard = node.suspend_validation();
    node.set("Email", "broken").expect("set");
    assert!(node.is_valid());
    guard.release();

    assert!(!node.is_valid());
    assert_eq!(node.errors_for("Email"), vec!["Email needs an @"]);
}

#[test]
fn descendant_errors_make_ancestors_invalid() {
    let root = contact();
    let leaf = contact();
    root.add_child(&leaf);
    let recorder = EventRecorder::attach(&root);

    leaf.add_validation("Name", rules::min_length(3, "too short"))
        .expect("rule");
    leaf.set("Name", "Al").expect("set");
    assert!(!root.is_valid());
    assert!(!root.has_local_errors());

    leaf.set("Name", "Alan").expect("set");
    assert!(root.is_valid());
    assert_eq!(recorder.changed_count(names::IS_VALID), 2);
}

// ── Tri-state ───────────────────────────────────────────────────────────

#[test]
fn siblings_drive_parent_check_state() {
    let parent = folder();
    let kids: Vec<Node> = (0..3).map(|_| folder()).collect();
    for kid in &kids {
        parent.add_child(kid);
    }

    for kid in &kids {
        kid.set_checked(Some(true));
    }
    assert_eq!(parent.check_state(), CheckState::Checked);

    kids[2].set_checked(Some(false));
    assert_eq!(parent.check_state(), CheckState::Indeterminate);

    parent.set_checked(Some(true));
    assert!(kids.iter().all(|k| k.check_state() == CheckState::Checked));
    assert_eq!(parent.check_state(), CheckState::Checked);
}

#[test]
fn unresolved_public_check_becomes_unchecked() {
    let node = folder();
    node.set_checked(Some(true));
    node.set_checked(None);
    assert_eq!(node.is_checked(), Some(false));
}

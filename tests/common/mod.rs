//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

use std::cell::RefCell;
use std::rc::Rc;

use datahub_rs::{ChangeEvent, DataType, EntryId, ResourceTree};

/// An absolute epoch timestamp comfortably past the 30-year threshold,
/// so buffer queries with absolute windows are deterministic.
pub const T0: f64 = 1_700_000_000.0;

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// A tree with a change-event recorder attached.
pub fn recording_tree() -> (ResourceTree, Rc<RefCell<Vec<ChangeEvent>>>) {
    let mut tree = ResourceTree::new();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    tree.add_change_listener(move |event| sink.borrow_mut().push(event.clone()));
    (tree, events)
}

/// Build a numeric Input under the root.
pub fn numeric_input(tree: &mut ResourceTree, path: &str) -> EntryId {
    let root = tree.root();
    tree.create_input(root, path, DataType::Numeric, "")
        .expect("input creation")
}

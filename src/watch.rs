//! Resource tree change notification.
//!
//! Administrative listeners are told when typed resources appear in or
//! disappear from the tree. Events are immutable records delivered
//! synchronously on the hub actor; listeners must not mutate the tree
//! during dispatch.

use std::rc::Rc;

use crate::tree::EntryKind;

/// Whether a resource was added to or removed from the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Added,
    Removed,
}

/// Immutable record delivered to change listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Absolute path of the entry, with a leading `/`.
    pub path: String,
    /// The entry's (new) type.
    pub kind: EntryKind,
    pub op: ChangeOp,
}

/// Handle for removing a registered change listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u32);

pub(crate) type ChangeListener = Rc<dyn Fn(&ChangeEvent)>;

/// Registry of change listeners, owned by the tree.
pub(crate) struct ListenerRegistry {
    next_id: u32,
    listeners: Vec<(ListenerId, ChangeListener)>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, listener: ChangeListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener. Returns false if the id was not registered.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub(crate) fn dispatch(&self, event: &ChangeEvent) {
        for (_, listener) in &self.listeners {
            listener(event);
        }
    }
}

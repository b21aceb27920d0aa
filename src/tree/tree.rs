//! The resource tree: a path-addressable hierarchy of entries.
//!
//! Entries are stored in a flat slot arena indexed by [`EntryId`], with
//! parent/child/sibling links forming an intrusive tree; children are
//! observed in insertion order and looked up by linear scan on name.
//! The arena doubles as the entry pool: capacity is bounded by
//! [`TreeConfig::max_entries`] and freed slots are recycled.
//!
//! # Ownership
//!
//! Explicit reference counts reproduce the hub's ownership rule: every
//! child holds one reference on its parent, the root is anchored for the
//! life of the tree, the hub holds one reference on each live
//! materialized entry, and each tombstone record holds one. An entry is
//! freed when its last reference goes, which unlinks it and cascades to
//! its parent.
//!
//! # Lifecycle
//!
//! Entries materialize as Namespaces, become Placeholders the first time
//! a resource is requested at their path, and are refined in place to
//! Input/Output/Observation. Deletion demotes back to Placeholder (when
//! admin settings remain) or to a Namespace tombstone retained until the
//! next snapshot flush.

use std::rc::Rc;

use tracing::{debug, error, warn};

use crate::config::{TreeConfig, MAX_NAME_BYTES, MAX_PATH_BYTES};
use crate::error::{HubError, Result};
use crate::resource::Resource;
use crate::sample::{DataType, SampleRef};
use crate::tree::entry::{
    Entry, EntryKind, Payload, FLAG_CLEAR_NEW, FLAG_DELETED, FLAG_NEW, FLAG_RELEVANT,
};
use crate::tree::id::EntryId;
use crate::watch::{ChangeEvent, ChangeOp, ListenerId, ListenerRegistry};

/// Name of the observations namespace directly under the root.
pub const OBS_NAMESPACE_NAME: &str = "obs";

/// The resource tree.
pub struct ResourceTree {
    entries: Vec<Option<Entry>>,
    free: Vec<u32>,
    root: EntryId,
    max_entries: usize,
    listeners: ListenerRegistry,
    /// Zombies retained until the next snapshot flush; each holds one
    /// reference on its entry.
    tombstones: Vec<EntryId>,
    update_in_progress: bool,
}

impl Default for ResourceTree {
    fn default() -> Self {
        Self::new()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    // Runs of '/' collapse into a single separator during resolution.
    path.split('/').filter(|s| !s.is_empty())
}

/// Undo log entry for a single autoprovisioning call.
enum Provision {
    /// A freshly created Namespace; rollback releases it.
    Created(EntryId),
    /// A zombie resurrected along the path; rollback restores its
    /// pre-call flags and, if it was recorded, its tombstone record.
    Resurrected {
        id: EntryId,
        flags: u32,
        recorded: bool,
    },
}

impl ResourceTree {
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        let mut root = Entry::new_namespace(String::new(), EntryId::INVALID);
        root.ref_count = 1; // anchored for the life of the tree
        Self {
            entries: vec![Some(root)],
            free: Vec::new(),
            root: EntryId(0),
            max_entries: config.max_entries.max(1),
            listeners: ListenerRegistry::new(),
            tombstones: Vec::new(),
            update_in_progress: false,
        }
    }

    /// The root namespace. Its name is the empty string and it has no
    /// parent.
    pub fn root(&self) -> EntryId {
        self.root
    }

    pub(crate) fn entry(&self, id: EntryId) -> &Entry {
        self.entries
            .get(id.index())
            .and_then(|slot| slot.as_ref())
            .expect("invalid entry id")
    }

    pub(crate) fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        self.entries
            .get_mut(id.index())
            .and_then(|slot| slot.as_mut())
            .expect("invalid entry id")
    }

    /// Resource payload accessor; the payload of a non-Namespace entry
    /// is a structural invariant.
    pub(crate) fn expect_resource(&self, id: EntryId) -> &Resource {
        self.entry(id)
            .resource()
            .expect("entry payload is not a resource")
    }

    pub(crate) fn expect_resource_mut(&mut self, id: EntryId) -> &mut Resource {
        self.entry_mut(id)
            .resource_mut()
            .expect("entry payload is not a resource")
    }

    fn live_count(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    // ---------------------------------------------------------------
    // Names, kinds, predicates
    // ---------------------------------------------------------------

    pub fn entry_name(&self, id: EntryId) -> &str {
        &self.entry(id).name
    }

    pub fn entry_kind(&self, id: EntryId) -> EntryKind {
        self.entry(id).kind
    }

    pub fn parent(&self, id: EntryId) -> Option<EntryId> {
        let parent = self.entry(id).parent;
        parent.is_valid().then_some(parent)
    }

    /// Whether the entry carries a resource (anything but a Namespace).
    pub fn is_resource(&self, id: EntryId) -> bool {
        self.entry(id).kind != EntryKind::Namespace
    }

    /// A path is malformed if it is empty, too long, contains an empty
    /// segment other than a leading slash, an over-long segment, or
    /// characters outside the permitted identifier set.
    pub fn is_path_malformed(path: &str) -> bool {
        if path.is_empty() || path.len() > MAX_PATH_BYTES {
            return true;
        }
        let body = path.strip_prefix('/').unwrap_or(path);
        if body.is_empty() {
            return true;
        }
        body.split('/').any(|segment| {
            segment.is_empty()
                || segment.len() >= MAX_NAME_BYTES
                || !segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        })
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// Find a child by name, skipping tombstones.
    pub fn find_child(&self, ns: EntryId, name: &str) -> Option<EntryId> {
        self.find_child_ex(ns, name, false)
    }

    /// Find a child by name, optionally yielding tombstones that have
    /// not been flushed yet.
    pub fn find_child_ex(&self, ns: EntryId, name: &str, with_zombies: bool) -> Option<EntryId> {
        let mut child = self.entry(ns).first_child;
        while child.is_valid() {
            let entry = self.entry(child);
            if (with_zombies || !entry.is_deleted()) && entry.name == name {
                return Some(child);
            }
            child = entry.next_sibling;
        }
        None
    }

    fn resolve(&self, base: EntryId, path: &str) -> Option<EntryId> {
        let mut current = base;
        for name in segments(path) {
            // The scan consults tombstones so that a zombie name is not
            // mistaken for a missing one, but a zombie is not found.
            let child = self.find_child_ex(current, name, true)?;
            if self.entry(child).is_deleted() {
                return None;
            }
            current = child;
        }
        Some(current)
    }

    /// Find the entry at a path relative to `base`.
    pub fn find_entry(&self, base: EntryId, path: &str) -> Option<EntryId> {
        if Self::is_path_malformed(path) {
            return None;
        }
        self.resolve(base, path)
    }

    /// Find the entry at an absolute path (leading `/`).
    pub fn find_entry_at_absolute_path(&self, path: &str) -> Option<EntryId> {
        let Some(rest) = path.strip_prefix('/') else {
            error!("Path not absolute.");
            return None;
        };
        self.find_entry(self.root, rest)
    }

    // ---------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------

    fn alloc(&mut self, entry: Entry) -> Result<EntryId> {
        if self.live_count() >= self.max_entries {
            warn!("Entry pool exhausted ({} entries).", self.max_entries);
            return Err(HubError::NoMemory("entry pool exhausted".to_string()));
        }
        if let Some(slot) = self.free.pop() {
            self.entries[slot as usize] = Some(entry);
            Ok(EntryId(slot))
        } else {
            self.entries.push(Some(entry));
            Ok(EntryId((self.entries.len() - 1) as u32))
        }
    }

    /// Create a Namespace child of `parent`, or resurrect `zombie` in
    /// place. Resurrection preserves subtree identity: the payload is
    /// reset to a fresh flag set, children are retained.
    fn add_child(&mut self, parent: EntryId, name: &str, zombie: Option<EntryId>) -> Result<EntryId> {
        if let Some(id) = zombie {
            debug_assert_eq!(self.entry(id).kind, EntryKind::Namespace);
            debug_assert_eq!(self.entry(id).parent, parent);
            if let Some(pos) = self.tombstones.iter().position(|t| *t == id) {
                self.tombstones.swap_remove(pos);
                self.entry_mut(id).ref_count -= 1;
            }
            let entry = self.entry_mut(id);
            entry.payload = Payload::Namespace(FLAG_NEW);
            entry.ref_count += 1; // the hub's reference returns
            return Ok(id);
        }

        debug_assert!(self.find_child_ex(parent, name, true).is_none());
        let id = self.alloc(Entry::new_namespace(name.to_string(), parent))?;
        self.entry_mut(id).ref_count = 1; // the hub's reference

        // Link at the end of the sibling chain; children stay in
        // insertion order.
        let first = self.entry(parent).first_child;
        if !first.is_valid() {
            self.entry_mut(parent).first_child = id;
        } else {
            let mut cur = first;
            loop {
                let next = self.entry(cur).next_sibling;
                if !next.is_valid() {
                    break;
                }
                cur = next;
            }
            self.entry_mut(cur).next_sibling = id;
        }
        // The child holds a reference on its parent.
        self.entry_mut(parent).ref_count += 1;
        Ok(id)
    }

    /// Drop one reference. On the last one the entry is unlinked, its
    /// slot freed, and the parent released in turn.
    fn release(&mut self, id: EntryId) {
        {
            let entry = self.entry_mut(id);
            debug_assert!(entry.ref_count > 0);
            entry.ref_count -= 1;
            if entry.ref_count > 0 {
                return;
            }
            // Children each hold a reference, so none can remain here.
            debug_assert!(!entry.first_child.is_valid());
        }
        let parent = self.entry(id).parent;
        self.unlink(id);
        self.entries[id.index()] = None;
        self.free.push(id.0);
        if parent.is_valid() {
            self.release(parent);
        }
    }

    fn unlink(&mut self, id: EntryId) {
        let parent = self.entry(id).parent;
        if !parent.is_valid() {
            return;
        }
        let next = self.entry(id).next_sibling;
        let first = self.entry(parent).first_child;
        if first == id {
            self.entry_mut(parent).first_child = next;
        } else {
            let mut cur = first;
            while cur.is_valid() {
                let sibling = self.entry(cur).next_sibling;
                if sibling == id {
                    self.entry_mut(cur).next_sibling = next;
                    break;
                }
                cur = sibling;
            }
        }
    }

    fn create_missing(&mut self, base: EntryId, path: &str) -> Result<EntryId> {
        let mut current = base;
        let mut provisioned: Vec<Provision> = Vec::new();

        for name in segments(path) {
            let found = self.find_child_ex(current, name, true);
            let needs_create = match found {
                None => true,
                Some(id) => self.entry(id).is_deleted(),
            };
            if !needs_create {
                current = found.unwrap();
                continue;
            }
            // Capture the zombie's pre-resurrection state before
            // `add_child` rewrites it, so a failure further down the
            // path can put it back.
            let zombie_state = found.map(|zombie| {
                (
                    self.entry(zombie).namespace_flags().unwrap_or(0),
                    self.tombstones.contains(&zombie),
                )
            });
            match self.add_child(current, name, found) {
                Ok(id) => {
                    provisioned.push(match zombie_state {
                        Some((flags, recorded)) => Provision::Resurrected {
                            id,
                            flags,
                            recorded,
                        },
                        None => Provision::Created(id),
                    });
                    current = id;
                }
                Err(e) => {
                    warn!("Failed to add child, path: {path}");
                    // Undo this call's provisioning in reverse order:
                    // fresh entries are released, resurrected zombies
                    // return to their tombstone state. The rest of the
                    // tree is untouched.
                    for undo in provisioned.into_iter().rev() {
                        match undo {
                            Provision::Created(id) => self.release(id),
                            Provision::Resurrected {
                                id,
                                flags,
                                recorded,
                            } => self.restore_tombstone(id, flags, recorded),
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(current)
    }

    /// Undo an in-call resurrection, returning the entry to the
    /// tombstone state it had before the failed autoprovision touched
    /// it.
    fn restore_tombstone(&mut self, id: EntryId, flags: u32, recorded: bool) {
        self.entry_mut(id).payload = Payload::Namespace(flags);
        if recorded {
            // The hub reference taken at resurrection becomes the
            // deletion record's reference again.
            self.tombstones.push(id);
        } else {
            // Flushed zombies are only kept alive by their children;
            // drop the resurrection reference.
            self.release(id);
        }
    }

    /// Get the entry at a path, creating Namespaces (parents included)
    /// as needed.
    pub fn get_entry(&mut self, base: EntryId, path: &str) -> Result<EntryId> {
        if Self::is_path_malformed(path) {
            return Err(HubError::BadParameter(format!("malformed path '{path}'")));
        }
        match self.resolve(base, path) {
            Some(id) => Ok(id),
            None => self.create_missing(base, path),
        }
    }

    /// Get the resource entry at a path, creating a Placeholder (and any
    /// missing parent Namespaces) if nothing typed exists there.
    ///
    /// The Placeholder's flavor is selected by path: entries under the
    /// root's observations namespace become observation placeholders,
    /// everything else io placeholders.
    pub fn get_resource(&mut self, base: EntryId, path: &str) -> Result<EntryId> {
        let id = self.get_entry(base, path)?;
        if self.entry(id).kind == EntryKind::Namespace {
            let resource = if self.is_under_obs(id) {
                Resource::obs_placeholder()
            } else {
                Resource::io_placeholder()
            };
            let entry = self.entry_mut(id);
            entry.payload = Payload::Resource(Box::new(resource));
            entry.kind = EntryKind::Placeholder;
        }
        Ok(id)
    }

    fn is_under_obs(&self, id: EntryId) -> bool {
        // The ancestor directly under the root decides the flavor.
        let mut cur = id;
        loop {
            let parent = self.entry(cur).parent;
            if !parent.is_valid() {
                return false;
            }
            if parent == self.root {
                return self.entry(cur).name == OBS_NAMESPACE_NAME;
            }
            cur = parent;
        }
    }

    /// The observations namespace (`/obs`), auto-created on first
    /// reference.
    pub fn obs_namespace(&mut self) -> Result<EntryId> {
        let root = self.root;
        self.get_entry(root, OBS_NAMESPACE_NAME)
    }

    // ---------------------------------------------------------------
    // Typed creation
    // ---------------------------------------------------------------

    /// Create an Input at the given path, converting the Placeholder in
    /// place. Re-creating an identical Input returns the existing entry.
    pub fn create_input(
        &mut self,
        base: EntryId,
        path: &str,
        data_type: DataType,
        units: &str,
    ) -> Result<EntryId> {
        self.create_io(base, path, data_type, units, EntryKind::Input)
    }

    /// Create an Output at the given path. Same rules as
    /// [`ResourceTree::create_input`]; Outputs start mandatory.
    pub fn create_output(
        &mut self,
        base: EntryId,
        path: &str,
        data_type: DataType,
        units: &str,
    ) -> Result<EntryId> {
        self.create_io(base, path, data_type, units, EntryKind::Output)
    }

    fn create_io(
        &mut self,
        base: EntryId,
        path: &str,
        data_type: DataType,
        units: &str,
        kind: EntryKind,
    ) -> Result<EntryId> {
        let id = self.get_resource(base, path)?;
        let existing = self.entry(id).kind;
        match existing {
            EntryKind::Placeholder => {
                self.entry_mut(id).kind = kind;
                let res = self.expect_resource_mut(id);
                if kind == EntryKind::Input {
                    res.convert_to_input(data_type, units);
                } else {
                    res.convert_to_output(data_type, units);
                }
                self.dispatch_change(id, kind, ChangeOp::Added);
                Ok(id)
            }
            _ if existing == kind => {
                let res = self.expect_resource(id);
                if res.io_data_type() == Some(data_type) && res.units() == units {
                    Ok(id)
                } else {
                    error!("A {kind} with different type or units already exists at '{path}'.");
                    Err(HubError::BadParameter(format!(
                        "conflicting {kind} at '{path}'"
                    )))
                }
            }
            other => {
                error!("Attempt to replace a {other} with an {kind}.");
                Err(HubError::BadParameter(format!(
                    "'{path}' is already a {other}"
                )))
            }
        }
    }

    /// Get the Observation at the given path, creating it (and its
    /// ancestors) as needed. Replaying the call returns the same entry
    /// with no additional change event.
    pub fn get_observation(&mut self, base: EntryId, path: &str) -> Result<EntryId> {
        let id = self.get_resource(base, path)?;
        match self.entry(id).kind {
            EntryKind::Placeholder => {
                self.entry_mut(id).kind = EntryKind::Observation;
                self.expect_resource_mut(id).convert_to_observation();
                self.dispatch_change(id, EntryKind::Observation, ChangeOp::Added);
                Ok(id)
            }
            EntryKind::Observation => Ok(id),
            other => {
                error!("Attempt to replace a {other} with an Observation.");
                Err(HubError::BadParameter(format!(
                    "'{path}' is already a {other}"
                )))
            }
        }
    }

    // ---------------------------------------------------------------
    // Deletion
    // ---------------------------------------------------------------

    /// Delete an Input or Output. The entry demotes to a Placeholder if
    /// administrative settings remain, otherwise to a Namespace
    /// tombstone. A REMOVED event fires either way, before the resource
    /// is demoted or released, so listeners can still query it.
    pub fn delete_io(&mut self, id: EntryId) -> Result<()> {
        let kind = self.entry(id).kind;
        if !matches!(kind, EntryKind::Input | EntryKind::Output) {
            return Err(HubError::BadParameter(format!("DeleteIO on a {kind}")));
        }

        self.dispatch_change(id, kind, ChangeOp::Removed);

        if self.expect_resource(id).has_admin_settings() {
            self.entry_mut(id).kind = EntryKind::Placeholder;
            self.expect_resource_mut(id).convert_io_to_placeholder();
        } else {
            self.detach_resource_and_release(id);
        }
        Ok(())
    }

    /// Delete an Observation. Observations demote straight to a
    /// Namespace tombstone; their settings are dropped first.
    pub fn delete_observation(&mut self, id: EntryId) -> Result<()> {
        let kind = self.entry(id).kind;
        if kind != EntryKind::Observation {
            return Err(HubError::BadParameter(format!(
                "DeleteObservation on a {kind}"
            )));
        }

        self.dispatch_change(id, EntryKind::Observation, ChangeOp::Removed);
        self.detach_resource_and_release(id);
        Ok(())
    }

    fn detach_resource_and_release(&mut self, id: EntryId) {
        // A node never seen by a snapshot scan leaves no deletion record.
        let was_new = self.expect_resource(id).is_new();

        self.drop_resource_settings(id);

        let entry = self.entry_mut(id);
        entry.kind = EntryKind::Namespace;
        entry.payload = Payload::Namespace(0);
        if !was_new {
            entry.ref_count += 1;
            if let Some(flags) = self.entry_mut(id).namespace_flags_mut() {
                *flags |= FLAG_DELETED;
            }
            self.tombstones.push(id);
        }
        // The hub's own reference goes last.
        self.release(id);
    }

    fn drop_resource_settings(&mut self, id: EntryId) {
        let _ = self.set_source(id, None);
        let dests = self.expect_resource(id).destinations.clone();
        for dest in dests {
            let _ = self.set_source(dest, None);
        }
    }

    // ---------------------------------------------------------------
    // Routing
    // ---------------------------------------------------------------

    /// Route data from `source` into `dest` (or clear the route with
    /// `None`). Rejects routes that would close a cycle, leaving the
    /// routing graph unchanged.
    pub fn set_source(&mut self, dest: EntryId, source: Option<EntryId>) -> Result<()> {
        if self.entry(dest).kind == EntryKind::Namespace {
            return Err(HubError::BadParameter(
                "routing destination is a Namespace".to_string(),
            ));
        }
        if let Some(src) = source {
            if self.entry(src).kind == EntryKind::Namespace {
                return Err(HubError::BadParameter(
                    "routing source is a Namespace".to_string(),
                ));
            }
        }

        let old = self.expect_resource(dest).source;
        if old == source {
            return Ok(());
        }

        if let Some(src) = source {
            // Following existing routes out of the destination must not
            // lead back to the new source.
            if src == dest || self.can_reach(dest, src) {
                return Err(HubError::Duplicate);
            }
        }

        if let Some(old_src) = old {
            self.expect_resource_mut(old_src)
                .destinations
                .retain(|d| *d != dest);
            self.mark_touched(old_src);
        }
        self.expect_resource_mut(dest).source = source;
        if let Some(src) = source {
            self.expect_resource_mut(src).destinations.push(dest);
            self.mark_touched(src);
        }
        self.mark_touched(dest);
        Ok(())
    }

    /// The routing predecessor of `dest`, if one is configured.
    pub fn get_source(&self, dest: EntryId) -> Option<EntryId> {
        self.entry(dest).resource().and_then(|res| res.source)
    }

    fn can_reach(&self, from: EntryId, target: EntryId) -> bool {
        let Some(res) = self.entry(from).resource() else {
            return false;
        };
        res.destinations
            .iter()
            .any(|d| *d == target || self.can_reach(*d, target))
    }

    /// Inside an admin update window, a touched resource suspends and
    /// coalesces pushes until the window closes.
    pub(crate) fn mark_touched(&mut self, id: EntryId) {
        if self.update_in_progress {
            if let Some(res) = self.entry_mut(id).resource_mut() {
                res.suspended = true;
            }
        }
    }

    // ---------------------------------------------------------------
    // Push
    // ---------------------------------------------------------------

    /// Push a data sample to a resource. Takes ownership of the sample
    /// reference; a push to a Namespace drops it.
    pub fn push(&mut self, id: EntryId, data_type: DataType, sample: SampleRef) -> Result<()> {
        if self.entry(id).kind == EntryKind::Namespace {
            drop(sample);
            return Err(HubError::BadParameter("push to a Namespace".to_string()));
        }
        self.push_to_resource(id, data_type, None, sample)
    }

    fn push_to_resource(
        &mut self,
        id: EntryId,
        mut data_type: DataType,
        units: Option<String>,
        mut sample: SampleRef,
    ) -> Result<()> {
        let kind = self.entry(id).kind;

        {
            let res = self.expect_resource_mut(id);
            // The latest pushed value is recorded even if it is not
            // accepted as the new current value.
            res.pushed_type = data_type;
            res.pushed_value = Some(Rc::clone(&sample));
            if res.suspended {
                // Coalesce: only the newest sample survives the window.
                res.pending = Some((data_type, units, sample));
                return Err(HubError::InProgress);
            }
        }

        // An Observation with a JSON extraction configured only looks at
        // JSON samples, and only at those the extraction succeeds on.
        if kind == EntryKind::Observation {
            let spec = self
                .expect_resource(id)
                .obs
                .as_ref()
                .map(|obs| obs.json_extraction.clone())
                .unwrap_or_default();
            if !spec.is_empty() {
                if data_type != DataType::Json {
                    debug!("Dropping non-JSON sample: extraction is configured.");
                    return Ok(());
                }
                match sample.extract_json(&spec) {
                    Ok((extracted_type, extracted)) => {
                        data_type = extracted_type;
                        sample = extracted;
                    }
                    // Diagnostic already logged by the extraction.
                    Err(_) => return Ok(()),
                }
            }
        }

        let accepted = self
            .expect_resource_mut(id)
            .should_accept(kind, data_type, units.as_deref(), &sample);
        if !accepted {
            // A filtered-out Observation sample is normal operation; a
            // type or units mismatch on an io point is a caller error.
            if matches!(kind, EntryKind::Input | EntryKind::Output) {
                return Err(HubError::BadParameter(
                    "push type or units mismatch".to_string(),
                ));
            }
            return Ok(());
        }

        {
            let res = self.expect_resource_mut(id);
            // An override substitutes its value at the pushed timestamp.
            if let Some(override_value) = &res.override_value {
                sample = override_value.with_timestamp(sample.timestamp());
                data_type = res.override_type;
            }
            // Units-flexible kinds adopt the pushed units.
            if let Some(units) = &units {
                if matches!(kind, EntryKind::Observation | EntryKind::Placeholder) {
                    res.set_units(units);
                }
            }
        }

        self.update_current_value(id, data_type, sample);
        Ok(())
    }

    /// Install a new current value and take the follow-on actions:
    /// destination fan-out, push-handler delivery, and Observation
    /// buffering/transform.
    pub(crate) fn update_current_value(
        &mut self,
        id: EntryId,
        data_type: DataType,
        sample: SampleRef,
    ) {
        let kind = self.entry(id).kind;
        let (units, destinations, handlers) = {
            let res = self.expect_resource_mut(id);
            res.current_type = data_type;
            res.current_value = Some(Rc::clone(&sample));
            let handlers: Vec<_> = res
                .handlers
                .iter()
                .filter(|(_, handler_type, _)| *handler_type == data_type)
                .map(|(_, _, handler)| Rc::clone(handler))
                .collect();
            (res.units.clone(), res.destinations.clone(), handlers)
        };

        // Fan out along routes; recursion is bounded because the routing
        // graph is kept acyclic.
        for dest in destinations {
            let _ = self.push_to_resource(dest, data_type, Some(units.clone()), Rc::clone(&sample));
        }

        for handler in handlers {
            handler(data_type, &sample);
        }

        if kind == EntryKind::Observation {
            if let Some(reduced) = self
                .expect_resource_mut(id)
                .obs_process_accepted(data_type, &sample)
            {
                self.expect_resource_mut(id).current_value = Some(reduced);
            }
        }
    }

    // ---------------------------------------------------------------
    // Paths and traversal
    // ---------------------------------------------------------------

    /// Reconstruct the path of `entry` relative to `base`. A root base
    /// yields an absolute path with a leading `/`; `entry == base`
    /// yields the empty string.
    pub fn get_path(&self, base: EntryId, entry: EntryId) -> Result<String> {
        if entry == base {
            return Ok(String::new());
        }

        let mut names: Vec<&str> = Vec::new();
        let mut cur = entry;
        while cur != base {
            if !cur.is_valid() {
                return Err(HubError::NotFound(
                    "entry is not under the base namespace".to_string(),
                ));
            }
            let e = self.entry(cur);
            names.push(&e.name);
            cur = e.parent;
        }

        let mut out = String::new();
        if base == self.root {
            out.push('/');
        }
        for (i, name) in names.iter().rev().enumerate() {
            if i > 0 {
                out.push('/');
            }
            out.push_str(name);
        }
        if out.len() > MAX_PATH_BYTES {
            return Err(HubError::Overflow(format!("path is {} bytes", out.len())));
        }
        Ok(out)
    }

    /// First child in insertion order, skipping tombstones.
    pub fn first_child(&self, id: EntryId) -> Option<EntryId> {
        self.first_child_ex(id, false)
    }

    pub fn first_child_ex(&self, id: EntryId, with_zombies: bool) -> Option<EntryId> {
        let mut child = self.entry(id).first_child;
        while child.is_valid() {
            let entry = self.entry(child);
            if with_zombies || !entry.is_deleted() {
                return Some(child);
            }
            child = entry.next_sibling;
        }
        None
    }

    /// Next sibling in insertion order, skipping tombstones.
    pub fn next_sibling(&self, id: EntryId) -> Option<EntryId> {
        self.next_sibling_ex(id, false)
    }

    pub fn next_sibling_ex(&self, id: EntryId, with_zombies: bool) -> Option<EntryId> {
        let mut sibling = self.entry(id).next_sibling;
        while sibling.is_valid() {
            let entry = self.entry(sibling);
            if with_zombies || !entry.is_deleted() {
                return Some(sibling);
            }
            sibling = entry.next_sibling;
        }
        None
    }

    /// Depth-first pre-order visit of every entry that carries a
    /// resource.
    pub fn for_each_resource(&self, mut f: impl FnMut(EntryId, EntryKind)) {
        self.visit_resources(self.root, &mut f);
    }

    fn visit_resources(&self, id: EntryId, f: &mut impl FnMut(EntryId, EntryKind)) {
        let mut child = self.entry(id).first_child;
        while child.is_valid() {
            let entry = self.entry(child);
            if entry.kind != EntryKind::Namespace && entry.resource().is_some() {
                f(child, entry.kind);
            }
            self.visit_resources(child, f);
            child = self.entry(child).next_sibling;
        }
    }

    // ---------------------------------------------------------------
    // Snapshot phase bookkeeping
    // ---------------------------------------------------------------

    pub fn set_relevance(&mut self, id: EntryId, relevant: bool) {
        match &mut self.entry_mut(id).payload {
            Payload::Namespace(flags) => {
                if relevant {
                    *flags |= FLAG_RELEVANT;
                } else {
                    *flags &= !FLAG_RELEVANT;
                }
            }
            Payload::Resource(res) => res.set_relevance(relevant),
        }
    }

    pub fn is_relevant(&self, id: EntryId) -> bool {
        match &self.entry(id).payload {
            Payload::Namespace(flags) => flags & FLAG_RELEVANT != 0,
            Payload::Resource(res) => res.is_relevant(),
        }
    }

    pub fn set_clear_newness_flag(&mut self, id: EntryId) {
        match &mut self.entry_mut(id).payload {
            Payload::Namespace(flags) => *flags |= FLAG_CLEAR_NEW,
            Payload::Resource(res) => res.set_clear_newness_flag(),
        }
    }

    pub fn is_newness_clear_required(&self, id: EntryId) -> bool {
        match &self.entry(id).payload {
            Payload::Namespace(flags) => flags & FLAG_CLEAR_NEW != 0,
            Payload::Resource(res) => res.is_newness_clear_required(),
        }
    }

    /// Mark a node as no longer new, clearing the "clear newness"
    /// request along with it.
    pub fn clear_newness(&mut self, id: EntryId) {
        match &mut self.entry_mut(id).payload {
            Payload::Namespace(flags) => *flags &= !(FLAG_NEW | FLAG_CLEAR_NEW),
            Payload::Resource(res) => res.clear_newness(),
        }
    }

    pub fn is_new(&self, id: EntryId) -> bool {
        match &self.entry(id).payload {
            Payload::Namespace(flags) => flags & FLAG_NEW != 0,
            Payload::Resource(res) => res.is_new(),
        }
    }

    /// Mark a Namespace as deleted, retaining it as a tombstone until
    /// the next flush.
    ///
    /// # Panics
    ///
    /// Deletion records only exist on scanned Namespaces: panics if the
    /// entry carries a resource or still has its NEW flag set.
    pub fn set_deleted(&mut self, id: EntryId) {
        let entry = self.entry_mut(id);
        let flags = entry
            .namespace_flags_mut()
            .expect("deleted flag on a non-Namespace entry");
        assert_eq!(*flags & FLAG_NEW, 0, "deleted flag on an unscanned entry");
        if *flags & FLAG_DELETED == 0 {
            *flags |= FLAG_DELETED;
            entry.ref_count += 1;
            self.tombstones.push(id);
        }
    }

    pub fn is_deleted(&self, id: EntryId) -> bool {
        self.entry(id).is_deleted()
    }

    /// Release every tombstone recorded since the last flush. Zombies
    /// without remaining references disappear from the tree.
    pub fn flush_tombstones(&mut self) {
        let tombstones = std::mem::take(&mut self.tombstones);
        for id in tombstones {
            self.release(id);
        }
    }

    // ---------------------------------------------------------------
    // Admin update window
    // ---------------------------------------------------------------

    /// Open the administrative update window. Resources whose filter or
    /// routing settings change while it is open suspend and coalesce
    /// pushes to at most one pending sample each.
    pub fn start_update(&mut self) {
        self.update_in_progress = true;
    }

    /// Close the administrative update window and deliver the pending
    /// sample of every suspended resource.
    pub fn end_update(&mut self) {
        self.update_in_progress = false;
        let mut pending = Vec::new();
        for (index, slot) in self.entries.iter_mut().enumerate() {
            if let Some(entry) = slot {
                if let Some(res) = entry.resource_mut() {
                    res.suspended = false;
                    if let Some(p) = res.pending.take() {
                        pending.push((EntryId(index as u32), p));
                    }
                }
            }
        }
        for (id, (data_type, units, sample)) in pending {
            let _ = self.push_to_resource(id, data_type, units, sample);
        }
    }

    // ---------------------------------------------------------------
    // Change listeners
    // ---------------------------------------------------------------

    /// Register a listener invoked whenever a typed resource is added to
    /// or removed from the tree. Listeners must not mutate the tree
    /// during dispatch.
    pub fn add_change_listener(&mut self, listener: impl Fn(&ChangeEvent) + 'static) -> ListenerId {
        self.listeners.add(Rc::new(listener))
    }

    pub fn remove_change_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub(crate) fn dispatch_change(&mut self, id: EntryId, kind: EntryKind, op: ChangeOp) {
        match self.get_path(self.root, id) {
            Ok(path) => {
                let event = ChangeEvent { path, kind, op };
                self.listeners.dispatch(&event);
            }
            Err(e) => error!("Failed to compute the path for a change event: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Sample;
    use std::cell::RefCell;

    #[test]
    fn test_root_shape() {
        let tree = ResourceTree::new();
        let root = tree.root();
        assert_eq!(tree.entry_name(root), "");
        assert!(tree.parent(root).is_none());
        assert_eq!(tree.entry_kind(root), EntryKind::Namespace);
    }

    #[test]
    fn test_autoprovision_creates_namespaces() {
        let mut tree = ResourceTree::new();
        let root = tree.root();

        let c = tree.get_entry(root, "a/b/c").unwrap();
        let b = tree.find_entry(root, "a/b").unwrap();
        let a = tree.find_entry(root, "a").unwrap();

        assert_eq!(tree.entry_kind(b), EntryKind::Namespace);
        assert_eq!(tree.parent(b), Some(a));
        assert_eq!(tree.parent(c), Some(b));
        assert_eq!(tree.entry_name(a), "a");
    }

    #[test]
    fn test_find_is_idempotent_and_referentially_equal() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        let id = tree.get_entry(root, "x/y").unwrap();

        assert_eq!(tree.find_entry(root, "x/y"), Some(id));
        assert_eq!(tree.find_entry(root, "x//y"), Some(id));
        assert_eq!(tree.get_entry(root, "x/y").unwrap(), id);
    }

    #[test]
    fn test_malformed_paths() {
        assert!(ResourceTree::is_path_malformed(""));
        assert!(ResourceTree::is_path_malformed("/"));
        assert!(ResourceTree::is_path_malformed("a//b"));
        assert!(ResourceTree::is_path_malformed("a/b/"));
        assert!(ResourceTree::is_path_malformed("a/b c"));
        assert!(ResourceTree::is_path_malformed(&"x".repeat(MAX_NAME_BYTES)));
        assert!(!ResourceTree::is_path_malformed("/a/b"));
        assert!(!ResourceTree::is_path_malformed("sensor-1.temp_C"));
    }

    #[test]
    fn test_malformed_path_rejected_by_get_entry() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        assert!(matches!(
            tree.get_entry(root, "a//b"),
            Err(HubError::BadParameter(_))
        ));
    }

    #[test]
    fn test_pool_exhaustion_rolls_back() {
        let mut tree = ResourceTree::with_config(TreeConfig { max_entries: 3 });
        let root = tree.root();

        // Root occupies one slot; only two more fit.
        let err = tree.get_entry(root, "a/b/c").unwrap_err();
        assert!(matches!(err, HubError::NoMemory(_)));

        // The partial subtree was rolled back.
        assert!(tree.find_entry(root, "a").is_none());
        assert_eq!(tree.live_count(), 1);

        // The slots are usable again.
        assert!(tree.get_entry(root, "a/b").is_ok());
    }

    #[test]
    fn test_failed_autoprovision_restores_resurrected_zombie() {
        let mut tree = ResourceTree::with_config(TreeConfig { max_entries: 3 });
        let root = tree.root();
        let b = tree.create_input(root, "a/b", DataType::Numeric, "").unwrap();
        tree.clear_newness(b);
        tree.delete_io(b).unwrap();

        // Resolving through the recorded zombie resurrects it, then the
        // pool runs out one segment further down.
        let err = tree.get_entry(root, "a/b/c").unwrap_err();
        assert!(matches!(err, HubError::NoMemory(_)));

        // The zombie is back exactly as it was.
        let a = tree.find_entry(root, "a").unwrap();
        let zombie = tree.find_child_ex(a, "b", true).unwrap();
        assert_eq!(zombie, b);
        assert!(tree.is_deleted(zombie));
        assert!(tree.find_entry(root, "a/b").is_none());

        // Its deletion record survived the failed call too.
        tree.flush_tombstones();
        assert!(tree.find_child_ex(a, "b", true).is_none());
    }

    #[test]
    fn test_get_resource_promotes_namespace() {
        let mut tree = ResourceTree::new();
        let root = tree.root();

        let ns = tree.get_entry(root, "a/b").unwrap();
        assert_eq!(tree.entry_kind(ns), EntryKind::Namespace);

        let res = tree.get_resource(root, "a/b").unwrap();
        assert_eq!(res, ns);
        assert_eq!(tree.entry_kind(res), EntryKind::Placeholder);
        assert!(!tree.expect_resource(res).is_obs_flavored());
    }

    #[test]
    fn test_obs_placeholder_flavor() {
        let mut tree = ResourceTree::new();
        let root = tree.root();

        let id = tree.get_resource(root, "obs/filtered").unwrap();
        assert!(tree.expect_resource(id).is_obs_flavored());

        let obs_ns = tree.obs_namespace().unwrap();
        let nested = tree.get_resource(obs_ns, "deep/inside").unwrap();
        assert!(tree.expect_resource(nested).is_obs_flavored());
    }

    #[test]
    fn test_create_input_promotion_and_event() {
        let mut tree = ResourceTree::new();
        let root = tree.root();

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        tree.add_change_listener(move |event| sink.borrow_mut().push(event.clone()));

        tree.get_resource(root, "a/b").unwrap();
        let id = tree
            .create_input(root, "a/b", DataType::Numeric, "degC")
            .unwrap();

        assert_eq!(tree.entry_kind(id), EntryKind::Input);
        assert_eq!(tree.expect_resource(id).units(), "degC");

        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, "/a/b");
        assert_eq!(events[0].kind, EntryKind::Input);
        assert_eq!(events[0].op, ChangeOp::Added);
    }

    #[test]
    fn test_create_input_replay_and_conflicts() {
        let mut tree = ResourceTree::new();
        let root = tree.root();

        let id = tree
            .create_input(root, "x", DataType::Numeric, "V")
            .unwrap();
        // Identical re-creation returns the same entry.
        assert_eq!(
            tree.create_input(root, "x", DataType::Numeric, "V").unwrap(),
            id
        );
        // Different units conflict.
        assert!(tree.create_input(root, "x", DataType::Numeric, "A").is_err());
        // A different kind conflicts.
        assert!(tree.create_output(root, "x", DataType::Numeric, "V").is_err());
    }

    #[test]
    fn test_get_observation_idempotent() {
        let mut tree = ResourceTree::new();
        let root = tree.root();

        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        tree.add_change_listener(move |_| *sink.borrow_mut() += 1);

        let first = tree.get_observation(root, "obs/temp_avg").unwrap();
        let second = tree.get_observation(root, "obs/temp_avg").unwrap();
        assert_eq!(first, second);
        assert_eq!(*count.borrow(), 1);

        // The obs namespace was auto-created on the way.
        assert!(tree.find_entry(root, "obs").is_some());
    }

    #[test]
    fn test_get_observation_on_io_is_error() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        tree.create_input(root, "in", DataType::Numeric, "").unwrap();
        assert!(matches!(
            tree.get_observation(root, "in"),
            Err(HubError::BadParameter(_))
        ));
    }

    #[test]
    fn test_get_path() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        let c = tree.get_entry(root, "a/b/c").unwrap();
        let a = tree.find_entry(root, "a").unwrap();

        assert_eq!(tree.get_path(root, c).unwrap(), "/a/b/c");
        assert_eq!(tree.get_path(a, c).unwrap(), "b/c");
        assert_eq!(tree.get_path(a, a).unwrap(), "");

        let elsewhere = tree.get_entry(root, "elsewhere").unwrap();
        assert!(matches!(
            tree.get_path(a, elsewhere),
            Err(HubError::NotFound(_))
        ));
    }

    #[test]
    fn test_path_round_trips_through_find() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        let id = tree.get_entry(root, "plant/line1/flow").unwrap();

        let path = tree.get_path(root, id).unwrap();
        assert_eq!(tree.find_entry_at_absolute_path(&path), Some(id));
    }

    #[test]
    fn test_children_in_insertion_order() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        tree.get_entry(root, "parent/zeta").unwrap();
        tree.get_entry(root, "parent/alpha").unwrap();
        tree.get_entry(root, "parent/mid").unwrap();

        let parent = tree.find_entry(root, "parent").unwrap();
        let mut names = Vec::new();
        let mut child = tree.first_child(parent);
        while let Some(id) = child {
            names.push(tree.entry_name(id).to_string());
            child = tree.next_sibling(id);
        }
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_cycle_rejection() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        let x = tree.create_input(root, "x", DataType::Numeric, "").unwrap();
        let y = tree.create_input(root, "y", DataType::Numeric, "").unwrap();
        let z = tree.create_input(root, "z", DataType::Numeric, "").unwrap();

        tree.set_source(y, Some(x)).unwrap();
        tree.set_source(z, Some(y)).unwrap();

        assert!(matches!(tree.set_source(x, Some(z)), Err(HubError::Duplicate)));
        assert!(tree.get_source(x).is_none());
        // The existing routes are untouched.
        assert_eq!(tree.get_source(y), Some(x));
        assert_eq!(tree.get_source(z), Some(y));

        assert!(matches!(tree.set_source(x, Some(x)), Err(HubError::Duplicate)));
    }

    #[test]
    fn test_set_source_replace_and_clear() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        let a = tree.create_input(root, "a", DataType::Numeric, "").unwrap();
        let b = tree.create_input(root, "b", DataType::Numeric, "").unwrap();
        let c = tree.create_output(root, "c", DataType::Numeric, "").unwrap();

        tree.set_source(c, Some(a)).unwrap();
        tree.set_source(c, Some(b)).unwrap();
        assert_eq!(tree.get_source(c), Some(b));
        assert!(tree.expect_resource(a).destinations.is_empty());

        tree.set_source(c, None).unwrap();
        assert!(tree.get_source(c).is_none());
        assert!(tree.expect_resource(b).destinations.is_empty());
    }

    #[test]
    fn test_push_to_namespace_is_rejected() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        let ns = tree.get_entry(root, "ns").unwrap();
        let result = tree.push(ns, DataType::Numeric, Sample::numeric(1.0, 5.0));
        assert!(matches!(result, Err(HubError::BadParameter(_))));
    }

    #[test]
    fn test_push_routes_to_destinations() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        let input = tree.create_input(root, "in", DataType::Numeric, "").unwrap();
        let output = tree
            .create_output(root, "out", DataType::Numeric, "")
            .unwrap();
        tree.set_source(output, Some(input)).unwrap();

        tree.push(input, DataType::Numeric, Sample::numeric(1.0, 42.0))
            .unwrap();

        let delivered = tree.expect_resource(output).current_value.clone().unwrap();
        assert_eq!(delivered.as_numeric(), Some(42.0));
    }

    #[test]
    fn test_delete_io_without_settings_leaves_tombstone() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        let id = tree.create_input(root, "gone", DataType::Numeric, "").unwrap();

        // Simulate a completed snapshot scan.
        tree.clear_newness(id);
        tree.delete_io(id).unwrap();

        // Invisible to plain lookup, visible to zombie-aware lookup.
        assert!(tree.find_entry(root, "gone").is_none());
        let zombie = tree.find_child_ex(root, "gone", true).unwrap();
        assert!(tree.is_deleted(zombie));
        assert_eq!(tree.entry_kind(zombie), EntryKind::Namespace);

        tree.flush_tombstones();
        assert!(tree.find_child_ex(root, "gone", true).is_none());
    }

    #[test]
    fn test_delete_new_io_leaves_nothing() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        let id = tree.create_input(root, "brief", DataType::Numeric, "").unwrap();
        tree.delete_io(id).unwrap();
        assert!(tree.find_child_ex(root, "brief", true).is_none());
    }

    #[test]
    fn test_tombstone_resurrection_preserves_identity() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        let id = tree.create_input(root, "phoenix", DataType::Numeric, "").unwrap();
        tree.clear_newness(id);
        tree.delete_io(id).unwrap();

        let reborn = tree.get_entry(root, "phoenix").unwrap();
        assert_eq!(reborn, id);
        assert!(!tree.is_deleted(reborn));
        assert!(tree.is_new(reborn));

        // Resurrected entries survive the flush.
        tree.flush_tombstones();
        assert_eq!(tree.find_entry(root, "phoenix"), Some(reborn));
    }

    #[test]
    fn test_traversal_skips_zombies_ex_yields_them() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        let dead = tree.create_input(root, "dead", DataType::Numeric, "").unwrap();
        tree.create_input(root, "alive", DataType::Numeric, "").unwrap();
        tree.clear_newness(dead);
        tree.delete_io(dead).unwrap();

        let first = tree.first_child(root).unwrap();
        assert_eq!(tree.entry_name(first), "alive");

        let first_ex = tree.first_child_ex(root, true).unwrap();
        assert_eq!(tree.entry_name(first_ex), "dead");
        let next = tree.next_sibling_ex(first_ex, true).unwrap();
        assert_eq!(tree.entry_name(next), "alive");
    }

    #[test]
    fn test_for_each_resource_visits_typed_entries_only() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        tree.get_entry(root, "plain/ns").unwrap();
        tree.create_input(root, "plant/temp", DataType::Numeric, "").unwrap();
        tree.get_observation(root, "obs/avg").unwrap();

        let mut seen = Vec::new();
        tree.for_each_resource(|id, kind| seen.push((tree.entry_name(id).to_string(), kind)));

        assert_eq!(
            seen,
            vec![
                ("temp".to_string(), EntryKind::Input),
                ("avg".to_string(), EntryKind::Observation),
            ]
        );
    }

    #[test]
    fn test_update_window_coalesces_pushes() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        let obs = tree.get_observation(root, "obs/gated").unwrap();

        tree.start_update();
        tree.set_min_period(obs, 0.0); // touch a filter setting

        assert!(matches!(
            tree.push(obs, DataType::Numeric, Sample::numeric(1.0, 1.0)),
            Err(HubError::InProgress)
        ));
        assert!(matches!(
            tree.push(obs, DataType::Numeric, Sample::numeric(2.0, 2.0)),
            Err(HubError::InProgress)
        ));
        assert!(tree.expect_resource(obs).current_value.is_none());

        tree.end_update();
        // Only the newest pending sample was delivered.
        let current = tree.expect_resource(obs).current_value.clone().unwrap();
        assert_eq!(current.as_numeric(), Some(2.0));

        // Normal operation resumed.
        tree.push(obs, DataType::Numeric, Sample::numeric(3.0, 3.0))
            .unwrap();
        let current = tree.expect_resource(obs).current_value.clone().unwrap();
        assert_eq!(current.as_numeric(), Some(3.0));
    }

    #[test]
    fn test_snapshot_flags() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        let ns = tree.get_entry(root, "flagged").unwrap();
        let input = tree.create_input(root, "io", DataType::Boolean, "").unwrap();

        for id in [ns, input] {
            assert!(tree.is_new(id));
            assert!(!tree.is_relevant(id));
            tree.set_relevance(id, true);
            assert!(tree.is_relevant(id));
            tree.set_clear_newness_flag(id);
            assert!(tree.is_newness_clear_required(id));
            tree.clear_newness(id);
            assert!(!tree.is_new(id));
            assert!(!tree.is_newness_clear_required(id));
        }
    }

    #[test]
    fn test_set_deleted_marks_tombstone() {
        let mut tree = ResourceTree::new();
        let root = tree.root();
        let ns = tree.get_entry(root, "doomed").unwrap();
        tree.clear_newness(ns);
        tree.set_deleted(ns);
        assert!(tree.is_deleted(ns));
        assert!(tree.find_entry(root, "doomed").is_none());
    }
}

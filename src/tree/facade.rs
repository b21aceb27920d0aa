//! Administrative facade over the resource tree.
//!
//! Pass-through accessors that validate the entry's kind before
//! forwarding to the underlying resource. Invalid-kind calls are
//! programmer errors: they are logged at error level and answered with
//! neutral defaults (`NaN`, `0`, `""`, `false`) instead of crashing.
//!
//! The Observation-only guard admits Observations and
//! observation-flavored Placeholders: obs placeholders exist precisely
//! so these settings can be staged before the Observation itself is
//! created.

use std::io::Write;
use std::rc::Rc;

use tracing::{error, warn};

use crate::error::{HubError, Result};
use crate::resource::{HandlerId, ObsState, ObsTransform, Resource};
use crate::sample::{DataType, SampleRef};
use crate::tree::entry::EntryKind;
use crate::tree::id::EntryId;
use crate::tree::tree::ResourceTree;

impl ResourceTree {
    // ---------------------------------------------------------------
    // Guards
    // ---------------------------------------------------------------

    fn observation_resource(&self, id: EntryId, op: &str) -> Option<&Resource> {
        let entry = self.entry(id);
        let res = match entry.kind {
            EntryKind::Observation => entry.resource(),
            EntryKind::Placeholder => entry.resource().filter(|res| res.is_obs_flavored()),
            _ => None,
        };
        if res.is_none() {
            error!("{op}: not an Observation (actually a {}).", entry.kind);
        }
        res
    }

    fn observation_state_mut(&mut self, id: EntryId, op: &str) -> Option<&mut ObsState> {
        let kind = self.entry(id).kind;
        let flavored = match kind {
            EntryKind::Observation => true,
            EntryKind::Placeholder => self
                .entry(id)
                .resource()
                .is_some_and(|res| res.is_obs_flavored()),
            _ => false,
        };
        if !flavored {
            error!("{op}: not an Observation (actually a {kind}).");
            return None;
        }
        self.entry_mut(id)
            .resource_mut()
            .and_then(|res| res.obs.as_mut())
    }

    fn resource_or_log(&self, id: EntryId, op: &str) -> Option<&Resource> {
        let entry = self.entry(id);
        let res = entry.resource();
        if res.is_none() {
            error!("{op}: entry is a {}, not a resource.", entry.kind);
        }
        res
    }

    fn resource_or_log_mut(&mut self, id: EntryId, op: &str) -> Option<&mut Resource> {
        if self.entry(id).resource().is_none() {
            error!("{op}: entry is a {}, not a resource.", self.entry(id).kind);
            return None;
        }
        self.entry_mut(id).resource_mut()
    }

    // ---------------------------------------------------------------
    // General resource accessors
    // ---------------------------------------------------------------

    /// The units string of a resource. `""` for unitless resources and
    /// non-resource entries.
    pub fn units(&self, id: EntryId) -> &str {
        self.resource_or_log(id, "GetUnits")
            .map(|res| res.units())
            .unwrap_or("")
    }

    /// The current data type of a resource. Fixed for Inputs/Outputs,
    /// follows pushed data everywhere else.
    pub fn data_type(&self, id: EntryId) -> DataType {
        self.resource_or_log(id, "GetDataType")
            .map(|res| res.data_type())
            .unwrap_or_default()
    }

    /// The current value, or `None` if nothing has been accepted yet.
    pub fn current_value(&self, id: EntryId) -> Option<SampleRef> {
        self.entry(id)
            .resource()
            .and_then(|res| res.current_value.clone())
    }

    /// Timestamp of the current value, or `-1.0` if there is none.
    pub fn last_modified(&self, id: EntryId) -> f64 {
        self.current_value(id)
            .map(|sample| sample.timestamp())
            .unwrap_or(-1.0)
    }

    /// Register a handler invoked whenever this resource accepts a new
    /// current value of the given data type.
    pub fn add_push_handler(
        &mut self,
        id: EntryId,
        data_type: DataType,
        handler: impl Fn(DataType, &SampleRef) + 'static,
    ) -> Result<HandlerId> {
        let Some(res) = self.entry_mut(id).resource_mut() else {
            return Err(HubError::BadParameter(
                "push handler on a Namespace".to_string(),
            ));
        };
        let handler_id = HandlerId(res.next_handler);
        res.next_handler += 1;
        res.handlers.push((handler_id, data_type, Rc::new(handler)));
        Ok(handler_id)
    }

    pub fn remove_push_handler(&mut self, id: EntryId, handler: HandlerId) {
        if let Some(res) = self.entry_mut(id).resource_mut() {
            res.handlers.retain(|(h, _, _)| *h != handler);
        }
    }

    // ---------------------------------------------------------------
    // Default value
    // ---------------------------------------------------------------

    /// Set the default value of a resource. Inputs and Outputs discard
    /// defaults whose type does not match their own.
    pub fn set_default(&mut self, id: EntryId, data_type: DataType, value: SampleRef) -> Result<()> {
        let kind = self.entry(id).kind;
        let should_update = {
            let Some(res) = self.resource_or_log_mut(id, "SetDefault") else {
                return Err(HubError::BadParameter("default on a Namespace".to_string()));
            };
            if matches!(kind, EntryKind::Input | EntryKind::Output)
                && res.io_data_type() != Some(data_type)
            {
                warn!("Discarding default: type mismatch.");
                return Err(HubError::BadParameter("default type mismatch".to_string()));
            }
            res.default_type = data_type;
            res.default_value = Some(Rc::clone(&value));
            // A resource operating on its default follows it.
            res.override_value.is_none()
                && (res.pushed_value.is_none() || res.source.is_none())
        };
        if should_update {
            self.update_current_value(id, data_type, value);
        }
        Ok(())
    }

    pub fn has_default(&self, id: EntryId) -> bool {
        self.entry(id)
            .resource()
            .is_some_and(|res| res.default_value.is_some())
    }

    /// The data type of the default value; Trigger when none is set.
    pub fn default_data_type(&self, id: EntryId) -> DataType {
        self.entry(id)
            .resource()
            .filter(|res| res.default_value.is_some())
            .map(|res| res.default_type)
            .unwrap_or_default()
    }

    pub fn default_value(&self, id: EntryId) -> Option<SampleRef> {
        self.entry(id)
            .resource()
            .and_then(|res| res.default_value.clone())
    }

    pub fn remove_default(&mut self, id: EntryId) {
        if let Some(res) = self.entry_mut(id).resource_mut() {
            res.default_value = None;
        }
    }

    // ---------------------------------------------------------------
    // Override
    // ---------------------------------------------------------------

    /// Set an override on a resource: until removed, every accepted push
    /// is substituted with the override's value. Inputs and Outputs
    /// reject overrides of a different type.
    pub fn set_override(&mut self, id: EntryId, data_type: DataType, value: SampleRef) -> Result<()> {
        let kind = self.entry(id).kind;
        {
            let Some(res) = self.resource_or_log_mut(id, "SetOverride") else {
                return Err(HubError::BadParameter("override on a Namespace".to_string()));
            };
            if matches!(kind, EntryKind::Input | EntryKind::Output)
                && res.io_data_type() != Some(data_type)
            {
                warn!("Ignoring override: data type mismatch.");
                return Err(HubError::BadParameter("override type mismatch".to_string()));
            }
            res.override_type = data_type;
            res.override_value = Some(Rc::clone(&value));
        }
        // The override becomes the current value immediately.
        self.update_current_value(id, data_type, value);
        Ok(())
    }

    pub fn has_override(&self, id: EntryId) -> bool {
        self.entry(id)
            .resource()
            .is_some_and(|res| res.override_value.is_some())
    }

    /// The data type of the override value; Trigger when none is set.
    pub fn override_data_type(&self, id: EntryId) -> DataType {
        self.entry(id)
            .resource()
            .filter(|res| res.override_value.is_some())
            .map(|res| res.override_type)
            .unwrap_or_default()
    }

    pub fn override_value(&self, id: EntryId) -> Option<SampleRef> {
        self.entry(id)
            .resource()
            .and_then(|res| res.override_value.clone())
    }

    /// Remove an override. The current value falls back to the last
    /// pushed value, or failing that to the default.
    pub fn remove_override(&mut self, id: EntryId) {
        let next = {
            let Some(res) = self.entry_mut(id).resource_mut() else {
                return;
            };
            if res.override_value.take().is_none() {
                return;
            }
            if let Some(pushed) = res.pushed_value.clone() {
                Some((res.pushed_type, pushed))
            } else {
                res.default_value.clone().map(|d| (res.default_type, d))
            }
        };
        if let Some((data_type, value)) = next {
            self.update_current_value(id, data_type, value);
        }
    }

    // ---------------------------------------------------------------
    // Output flags, JSON example
    // ---------------------------------------------------------------

    /// Mark an Output optional. Outputs are created mandatory.
    pub fn mark_optional(&mut self, id: EntryId) {
        if self.entry(id).kind != EntryKind::Output {
            warn!("MarkOptional: entry is a {}, not an Output.", self.entry(id).kind);
            return;
        }
        if let Some(io) = self
            .entry_mut(id)
            .resource_mut()
            .and_then(|res| res.io.as_mut())
        {
            io.mandatory = false;
        }
    }

    /// Whether this is a mandatory Output. False for optional Outputs
    /// and for anything that is not an Output at all.
    pub fn is_mandatory(&self, id: EntryId) -> bool {
        self.entry(id).kind == EntryKind::Output
            && self
                .entry(id)
                .resource()
                .and_then(|res| res.io)
                .is_some_and(|io| io.mandatory)
    }

    /// Attach an example JSON value to a resource and flag the change.
    pub fn set_json_example(&mut self, id: EntryId, example: SampleRef) {
        if let Some(res) = self.resource_or_log_mut(id, "SetJsonExample") {
            res.json_example = Some(example);
            res.json_example_changed = true;
        }
    }

    pub fn json_example(&self, id: EntryId) -> Option<SampleRef> {
        self.entry(id)
            .resource()
            .and_then(|res| res.json_example.clone())
    }

    /// Whether the JSON example changed after the last snapshot scan.
    pub fn is_json_example_changed(&self, id: EntryId) -> bool {
        self.resource_or_log(id, "IsJsonExampleChanged")
            .is_some_and(|res| res.json_example_changed)
    }

    pub fn clear_json_example_changed(&mut self, id: EntryId) {
        if let Some(res) = self.resource_or_log_mut(id, "ClearJsonExampleChanged") {
            res.json_example_changed = false;
        }
    }

    // ---------------------------------------------------------------
    // Observation filter settings
    // ---------------------------------------------------------------

    /// Set the minimum period between samples accepted by an
    /// Observation.
    pub fn set_min_period(&mut self, id: EntryId, min_period: f64) {
        if let Some(obs) = self.observation_state_mut(id, "SetMinPeriod") {
            obs.min_period = min_period;
            self.mark_touched(id);
        }
    }

    /// The minimum period, or 0 if not set.
    pub fn min_period(&self, id: EntryId) -> f64 {
        self.observation_resource(id, "GetMinPeriod")
            .and_then(|res| res.obs.as_ref())
            .map(|obs| obs.min_period)
            .unwrap_or(0.0)
    }

    /// Set the highest value accepted by an Observation. Ignored for
    /// non-numeric samples.
    pub fn set_high_limit(&mut self, id: EntryId, high_limit: f64) {
        if let Some(obs) = self.observation_state_mut(id, "SetHighLimit") {
            obs.high_limit = high_limit;
            self.mark_touched(id);
        }
    }

    /// The high limit, or NaN if not set.
    pub fn high_limit(&self, id: EntryId) -> f64 {
        self.observation_resource(id, "GetHighLimit")
            .and_then(|res| res.obs.as_ref())
            .map(|obs| obs.high_limit)
            .unwrap_or(f64::NAN)
    }

    /// Set the lowest value accepted by an Observation. Ignored for
    /// non-numeric samples.
    pub fn set_low_limit(&mut self, id: EntryId, low_limit: f64) {
        if let Some(obs) = self.observation_state_mut(id, "SetLowLimit") {
            obs.low_limit = low_limit;
            self.mark_touched(id);
        }
    }

    /// The low limit, or NaN if not set.
    pub fn low_limit(&self, id: EntryId) -> f64 {
        self.observation_resource(id, "GetLowLimit")
            .and_then(|res| res.obs.as_ref())
            .map(|obs| obs.low_limit)
            .unwrap_or(f64::NAN)
    }

    /// Set the magnitude a value must differ from the current one to be
    /// accepted. For non-numeric types any non-zero setting means "drop
    /// if unchanged".
    pub fn set_change_by(&mut self, id: EntryId, change: f64) {
        if let Some(obs) = self.observation_state_mut(id, "SetChangeBy") {
            obs.change_by = change;
            self.mark_touched(id);
        }
    }

    /// The change-by threshold, or 0 if not set.
    pub fn change_by(&self, id: EntryId) -> f64 {
        self.observation_resource(id, "GetChangeBy")
            .and_then(|res| res.obs.as_ref())
            .map(|obs| obs.change_by)
            .unwrap_or(0.0)
    }

    /// Set the statistical transform applied to the Observation's
    /// buffer to produce its current value.
    pub fn set_transform(&mut self, id: EntryId, transform: ObsTransform) {
        if let Some(obs) = self.observation_state_mut(id, "SetTransform") {
            obs.transform = transform;
            self.mark_touched(id);
        }
    }

    pub fn transform(&self, id: EntryId) -> ObsTransform {
        self.observation_resource(id, "GetTransform")
            .and_then(|res| res.obs.as_ref())
            .map(|obs| obs.transform)
            .unwrap_or_default()
    }

    /// Set the maximum number of samples the Observation buffers. The
    /// buffer is FIFO: when full, the oldest sample is dropped.
    pub fn set_buffer_max_count(&mut self, id: EntryId, count: u32) {
        if let Some(obs) = self.observation_state_mut(id, "SetBufferMaxCount") {
            obs.max_count = count;
        }
    }

    /// The buffer size setting, or 0 if not set.
    pub fn buffer_max_count(&self, id: EntryId) -> u32 {
        self.observation_resource(id, "GetBufferMaxCount")
            .and_then(|res| res.obs.as_ref())
            .map(|obs| obs.max_count)
            .unwrap_or(0)
    }

    /// Set the minimum seconds between buffer backups. The setting is
    /// stored and reported; backup file I/O lives outside the core.
    pub fn set_buffer_backup_period(&mut self, id: EntryId, seconds: u32) {
        if let Some(obs) = self.observation_state_mut(id, "SetBufferBackupPeriod") {
            obs.backup_period = seconds;
        }
    }

    /// The backup period in seconds, or 0 if backups are disabled.
    pub fn buffer_backup_period(&self, id: EntryId) -> u32 {
        self.observation_resource(id, "GetBufferBackupPeriod")
            .and_then(|res| res.obs.as_ref())
            .map(|obs| obs.backup_period)
            .unwrap_or(0)
    }

    /// Set the JSON member/element specifier extracted from every JSON
    /// sample received by the Observation. While set, non-JSON samples
    /// and samples missing the member are ignored.
    pub fn set_json_extraction(&mut self, id: EntryId, spec: &str) {
        if let Some(obs) = self.observation_state_mut(id, "SetJsonExtraction") {
            obs.json_extraction = spec.to_string();
            self.mark_touched(id);
        }
    }

    /// The JSON extraction specifier, or `""` if not set.
    pub fn json_extraction(&self, id: EntryId) -> &str {
        match self.observation_resource(id, "GetJsonExtraction") {
            Some(res) => res
                .obs
                .as_ref()
                .map(|obs| obs.json_extraction.as_str())
                .unwrap_or(""),
            None => "",
        }
    }

    /// Set the delivery destination string for an Observation.
    pub fn set_destination(&mut self, id: EntryId, destination: &str) {
        if let Some(obs) = self.observation_state_mut(id, "SetDestination") {
            obs.destination = destination.to_string();
        }
    }

    /// The destination string, or `""` if not set.
    pub fn destination(&self, id: EntryId) -> &str {
        match self.observation_resource(id, "GetDestination") {
            Some(res) => res
                .obs
                .as_ref()
                .map(|obs| obs.destination.as_str())
                .unwrap_or(""),
            None => "",
        }
    }

    // ---------------------------------------------------------------
    // Observation buffer queries
    // ---------------------------------------------------------------

    /// Minimum of the numeric samples buffered after `start`, or NaN.
    pub fn query_min(&self, id: EntryId, start: f64) -> f64 {
        self.observation_resource(id, "QueryMin")
            .map(|res| res.query_min(start))
            .unwrap_or(f64::NAN)
    }

    /// Maximum of the numeric samples buffered after `start`, or NaN.
    pub fn query_max(&self, id: EntryId, start: f64) -> f64 {
        self.observation_resource(id, "QueryMax")
            .map(|res| res.query_max(start))
            .unwrap_or(f64::NAN)
    }

    /// Mean of the numeric samples buffered after `start`, or NaN.
    pub fn query_mean(&self, id: EntryId, start: f64) -> f64 {
        self.observation_resource(id, "QueryMean")
            .map(|res| res.query_mean(start))
            .unwrap_or(f64::NAN)
    }

    /// Standard deviation of the numeric samples buffered after
    /// `start`, or NaN.
    pub fn query_std_dev(&self, id: EntryId, start: f64) -> f64 {
        self.observation_resource(id, "QueryStdDev")
            .map(|res| res.query_std_dev(start))
            .unwrap_or(f64::NAN)
    }

    /// The oldest buffered sample newer than `start` (NaN = the oldest
    /// retained sample).
    pub fn find_buffered_sample_after(&self, id: EntryId, start: f64) -> Option<SampleRef> {
        self.observation_resource(id, "FindBufferedSampleAfter")
            .and_then(|res| res.find_buffered_sample_after(start))
    }

    /// Write the Observation's buffered samples newer than `start` to
    /// `out` as a JSON array of `{"t":…,"v":…}` objects. `start` honors
    /// the 30-year heuristic (relative vs. absolute) and NaN dumps the
    /// whole buffer.
    pub fn read_buffer_json(&self, id: EntryId, start: f64, out: &mut dyn Write) -> Result<()> {
        let Some(res) = self.observation_resource(id, "ReadBufferJson") else {
            return Err(HubError::BadParameter(format!(
                "ReadBufferJson on a {}",
                self.entry(id).kind
            )));
        };
        res.read_buffer_json(start, out)
    }
}

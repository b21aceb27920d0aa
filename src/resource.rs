//! Resource objects attached to non-Namespace tree entries.
//!
//! A [`Resource`] is a single capability-set object standing behind
//! every Placeholder, Input, Output and Observation entry. The variants
//! differ in which operations are meaningful: the common administrative
//! state (units, current value, default, override, routing) is always
//! present, Input/Output add a fixed data type, and Observations add the
//! filter chain and the sample buffer. The entry's kind selects the
//! behavior; the tree-side facade enforces kind preconditions before
//! delegating here.
//!
//! # Push pipeline
//!
//! A pushed sample is recorded as the latest pushed value, then runs the
//! kind-specific acceptance check (type/units gate for io points, the
//! extraction/limit/change-by/min-period chain for Observations), then
//! override substitution, and finally becomes the current value — at
//! which point it fans out to routed destinations and push handlers, and
//! is buffered by Observations.

use std::collections::VecDeque;
use std::io::Write;
use std::rc::Rc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::MAX_UNITS_BYTES;
use crate::error::Result;
use crate::sample::{wall_clock, DataType, Sample, SampleRef};
use crate::tree::entry::{EntryKind, FLAG_CLEAR_NEW, FLAG_NEW, FLAG_RELEVANT};
use crate::tree::id::EntryId;

/// Query start times at or below thirty years are interpreted as seconds
/// before now; anything larger is absolute seconds since the epoch.
pub const THIRTY_YEARS_SECS: f64 = 30.0 * 365.0 * 24.0 * 3600.0;

/// Statistical reduction applied to an Observation's buffered samples to
/// produce its current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObsTransform {
    #[default]
    None,
    Mean,
    StdDev,
    Max,
    Min,
}

/// Handle for removing a registered push handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u32);

pub(crate) type PushHandler = Rc<dyn Fn(DataType, &SampleRef)>;

/// State specific to Input and Output resources.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IoState {
    /// Fixed data type declared by the creating app.
    pub data_type: DataType,
    /// Outputs are created mandatory; `mark_optional` clears this.
    pub mandatory: bool,
}

/// State specific to Observations (and observation-flavored
/// Placeholders, which stage these settings).
pub(crate) struct ObsState {
    /// Minimum seconds between accepted samples; 0 or NaN = disabled.
    pub min_period: f64,
    /// Liveband/deadband high limit; NaN = disabled.
    pub high_limit: f64,
    /// Liveband/deadband low limit; NaN = disabled.
    pub low_limit: f64,
    /// Minimum change from the current value; 0 or NaN = disabled.
    pub change_by: f64,
    pub transform: ObsTransform,
    /// Maximum buffered samples; 0 = buffering disabled.
    pub max_count: u32,
    /// Minimum seconds between buffer backups; 0 = backups disabled.
    /// Stored and reported only — backup file I/O is outside the core.
    pub backup_period: u32,
    /// JSON member/element specifier; "" = extraction disabled.
    pub json_extraction: String,
    /// Downstream delivery address for the external transport layer.
    pub destination: String,
    /// When the last sample was accepted, for the min-period gate.
    pub last_accept: Option<Instant>,
    /// FIFO buffer of accepted samples with their types.
    pub buffer: VecDeque<(DataType, SampleRef)>,
}

impl Default for ObsState {
    fn default() -> Self {
        Self {
            min_period: 0.0,
            high_limit: f64::NAN,
            low_limit: f64::NAN,
            change_by: 0.0,
            transform: ObsTransform::None,
            max_count: 0,
            backup_period: 0,
            json_extraction: String::new(),
            destination: String::new(),
            last_accept: None,
            buffer: VecDeque::new(),
        }
    }
}

/// A resource: the payload of every non-Namespace entry.
pub struct Resource {
    pub(crate) units: String,
    pub(crate) current_type: DataType,
    pub(crate) current_value: Option<SampleRef>,
    pub(crate) pushed_type: DataType,
    pub(crate) pushed_value: Option<SampleRef>,
    pub(crate) default_type: DataType,
    pub(crate) default_value: Option<SampleRef>,
    pub(crate) override_type: DataType,
    pub(crate) override_value: Option<SampleRef>,
    /// Routing predecessor, if configured.
    pub(crate) source: Option<EntryId>,
    /// Resources this one fans out to on every accepted sample.
    pub(crate) destinations: Vec<EntryId>,
    pub(crate) handlers: Vec<(HandlerId, DataType, PushHandler)>,
    pub(crate) next_handler: u32,
    /// Snapshot flags; same bit layout as Namespace entry flags.
    pub(crate) flags: u32,
    pub(crate) json_example: Option<SampleRef>,
    pub(crate) json_example_changed: bool,
    /// Set when filter/routing settings change inside an admin update
    /// window; pushes coalesce into `pending` until the window closes.
    pub(crate) suspended: bool,
    pub(crate) pending: Option<(DataType, Option<String>, SampleRef)>,
    pub(crate) io: Option<IoState>,
    pub(crate) obs: Option<ObsState>,
}

impl Resource {
    fn base() -> Self {
        Self {
            units: String::new(),
            current_type: DataType::Trigger,
            current_value: None,
            pushed_type: DataType::Trigger,
            pushed_value: None,
            default_type: DataType::Trigger,
            default_value: None,
            override_type: DataType::Trigger,
            override_value: None,
            source: None,
            destinations: Vec::new(),
            handlers: Vec::new(),
            next_handler: 0,
            flags: FLAG_NEW,
            json_example: None,
            json_example_changed: false,
            suspended: false,
            pending: None,
            io: None,
            obs: None,
        }
    }

    /// Placeholder for a future Input or Output.
    pub(crate) fn io_placeholder() -> Self {
        Self::base()
    }

    /// Placeholder for a future Observation. Carries observation state
    /// from the start so obs-only admin settings can be staged on it.
    pub(crate) fn obs_placeholder() -> Self {
        Self {
            obs: Some(ObsState::default()),
            ..Self::base()
        }
    }

    /// Observation-flavored resources differ from io-flavored ones in
    /// their admin-setting schema.
    pub(crate) fn is_obs_flavored(&self) -> bool {
        self.obs.is_some()
    }

    /// In-place refinement of a Placeholder into an Input.
    pub(crate) fn convert_to_input(&mut self, data_type: DataType, units: &str) {
        self.io = Some(IoState {
            data_type,
            mandatory: false,
        });
        self.current_type = data_type;
        self.set_units(units);
    }

    /// In-place refinement of a Placeholder into an Output. Outputs are
    /// created mandatory.
    pub(crate) fn convert_to_output(&mut self, data_type: DataType, units: &str) {
        self.io = Some(IoState {
            data_type,
            mandatory: true,
        });
        self.current_type = data_type;
        self.set_units(units);
    }

    /// In-place refinement of a Placeholder into an Observation.
    pub(crate) fn convert_to_observation(&mut self) {
        if self.obs.is_none() {
            self.obs = Some(ObsState::default());
        }
    }

    /// Inverse refinement: drop the typed identity but keep every admin
    /// setting, so an Input/Output can be re-created later unchanged.
    pub(crate) fn convert_io_to_placeholder(&mut self) {
        self.io = None;
    }

    /// True if at least one administrative setting exists (source,
    /// destinations, override or default).
    pub(crate) fn has_admin_settings(&self) -> bool {
        self.source.is_some()
            || !self.destinations.is_empty()
            || self.override_value.is_some()
            || self.default_value.is_some()
    }

    pub(crate) fn units(&self) -> &str {
        &self.units
    }

    pub(crate) fn set_units(&mut self, units: &str) {
        if units.len() >= MAX_UNITS_BYTES {
            warn!("Units string too long ({} bytes); truncated.", units.len());
            let mut end = MAX_UNITS_BYTES - 1;
            while !units.is_char_boundary(end) {
                end -= 1;
            }
            self.units = units[..end].to_string();
        } else {
            self.units = units.to_string();
        }
    }

    /// The resource's current data type. Fixed for Inputs and Outputs;
    /// everything else takes on the type of whatever is pushed to it.
    pub(crate) fn data_type(&self) -> DataType {
        self.current_type
    }

    /// The declared type of an Input or Output.
    pub(crate) fn io_data_type(&self) -> Option<DataType> {
        self.io.map(|io| io.data_type)
    }

    // ---------------------------------------------------------------
    // Acceptance
    // ---------------------------------------------------------------

    /// Decide whether a pushed sample becomes the new current value.
    pub(crate) fn should_accept(
        &mut self,
        kind: EntryKind,
        data_type: DataType,
        units: Option<&str>,
        sample: &SampleRef,
    ) -> bool {
        match kind {
            EntryKind::Input | EntryKind::Output => self.should_accept_io(data_type, units),
            EntryKind::Observation => self.should_accept_obs(data_type, sample),
            // Placeholders accept everything.
            EntryKind::Placeholder => true,
            EntryKind::Namespace | EntryKind::None => false,
        }
    }

    fn should_accept_io(&self, data_type: DataType, units: Option<&str>) -> bool {
        let Some(io) = self.io else {
            return false;
        };

        // String and JSON io points accept any type of sample.
        if data_type != io.data_type
            && io.data_type != DataType::String
            && io.data_type != DataType::Json
        {
            warn!(
                "Rejecting push: data type mismatch (pushing {} to {}).",
                data_type, io.data_type
            );
            return false;
        }

        // Units only matter when both sides declare some.
        if let Some(units) = units {
            if !self.units.is_empty() && units != self.units {
                warn!(
                    "Rejecting push: units mismatch (pushing '{}' to '{}').",
                    units, self.units
                );
                return false;
            }
        }

        true
    }

    fn should_accept_obs(&mut self, data_type: DataType, sample: &SampleRef) -> bool {
        let overridden = self.override_value.is_some();
        let current_type = self.current_type;
        let current = self.current_value.clone();
        let Some(obs) = self.obs.as_mut() else {
            return false;
        };

        if data_type == DataType::Numeric {
            if let Some(value) = sample.as_numeric() {
                let high = obs.high_limit;
                let low = obs.low_limit;
                if !high.is_nan() && !low.is_nan() && low > high {
                    // Band case: only values between the limits pass.
                    if value > low || value < high {
                        return false;
                    }
                } else {
                    if !low.is_nan() && value < low {
                        return false;
                    }
                    if !high.is_nan() && value > high {
                        return false;
                    }
                }
            }
        }

        // Change-by and min-period need a previous value to compare with.
        if let Some(previous) = current {
            if obs.change_by != 0.0 && !obs.change_by.is_nan() {
                // Overridden resources never change value.
                if overridden {
                    return false;
                }
                // Types must match for a comparison to mean anything.
                if data_type == current_type {
                    match data_type {
                        DataType::Numeric => {
                            if let (Some(new), Some(old)) =
                                (sample.as_numeric(), previous.as_numeric())
                            {
                                if (new - old).abs() < obs.change_by {
                                    return false;
                                }
                            }
                        }
                        DataType::Boolean => {
                            if sample.as_boolean() == previous.as_boolean() {
                                return false;
                            }
                        }
                        DataType::String | DataType::Json => {
                            if sample.as_text() == previous.as_text() {
                                return false;
                            }
                        }
                        DataType::Trigger => {}
                    }
                }
            }

            if obs.min_period > 0.0 {
                if let Some(last) = obs.last_accept {
                    if last.elapsed().as_secs_f64() < obs.min_period {
                        return false;
                    }
                }
            }
        }

        obs.last_accept = Some(Instant::now());
        true
    }

    /// Post-acceptance Observation processing: buffer the sample and, if
    /// a transform is configured, return the reduced sample that should
    /// replace the current value.
    pub(crate) fn obs_process_accepted(
        &mut self,
        data_type: DataType,
        sample: &SampleRef,
    ) -> Option<SampleRef> {
        let obs = self.obs.as_mut()?;

        if obs.max_count > 0 {
            if obs.buffer.len() >= obs.max_count as usize {
                obs.buffer.pop_front();
            }
            obs.buffer.push_back((data_type, Rc::clone(sample)));
        }

        if obs.transform != ObsTransform::None && data_type == DataType::Numeric {
            let values: Vec<f64> = if obs.max_count > 0 {
                obs.buffer
                    .iter()
                    .filter(|(dt, _)| *dt == DataType::Numeric)
                    .filter_map(|(_, s)| s.as_numeric())
                    .collect()
            } else {
                sample.as_numeric().into_iter().collect()
            };
            let reduced = aggregate(obs.transform, &values);
            return Some(Sample::numeric(sample.timestamp(), reduced));
        }

        None
    }

    // ---------------------------------------------------------------
    // Snapshot flags (same bit layout as Namespace entries)
    // ---------------------------------------------------------------

    pub(crate) fn set_relevance(&mut self, relevant: bool) {
        if relevant {
            self.flags |= FLAG_RELEVANT;
        } else {
            self.flags &= !FLAG_RELEVANT;
        }
    }

    pub(crate) fn is_relevant(&self) -> bool {
        self.flags & FLAG_RELEVANT != 0
    }

    pub(crate) fn set_clear_newness_flag(&mut self) {
        self.flags |= FLAG_CLEAR_NEW;
    }

    pub(crate) fn is_newness_clear_required(&self) -> bool {
        self.flags & FLAG_CLEAR_NEW != 0
    }

    pub(crate) fn clear_newness(&mut self) {
        self.flags &= !(FLAG_NEW | FLAG_CLEAR_NEW);
    }

    pub(crate) fn is_new(&self) -> bool {
        self.flags & FLAG_NEW != 0
    }

    // ---------------------------------------------------------------
    // Buffer queries
    // ---------------------------------------------------------------

    fn buffered_numerics_after(&self, start: f64) -> impl Iterator<Item = f64> + '_ {
        let cutoff = window_start(start);
        self.obs
            .iter()
            .flat_map(|obs| obs.buffer.iter())
            .filter(move |(dt, s)| *dt == DataType::Numeric && s.timestamp() > cutoff)
            .filter_map(|(_, s)| s.as_numeric())
    }

    pub(crate) fn query_min(&self, start: f64) -> f64 {
        self.buffered_numerics_after(start)
            .fold(f64::NAN, |acc, v| if acc.is_nan() { v } else { acc.min(v) })
    }

    pub(crate) fn query_max(&self, start: f64) -> f64 {
        self.buffered_numerics_after(start)
            .fold(f64::NAN, |acc, v| if acc.is_nan() { v } else { acc.max(v) })
    }

    pub(crate) fn query_mean(&self, start: f64) -> f64 {
        let (count, sum) = self
            .buffered_numerics_after(start)
            .fold((0u32, 0.0), |(n, sum), v| (n + 1, sum + v));
        if count == 0 {
            f64::NAN
        } else {
            sum / count as f64
        }
    }

    pub(crate) fn query_std_dev(&self, start: f64) -> f64 {
        let mean = self.query_mean(start);
        if mean.is_nan() {
            return f64::NAN;
        }
        let (count, sum_sq) = self
            .buffered_numerics_after(start)
            .fold((0u32, 0.0), |(n, sum), v| (n + 1, sum + (v - mean) * (v - mean)));
        (sum_sq / count as f64).sqrt()
    }

    /// The oldest buffered sample newer than the given start time.
    pub(crate) fn find_buffered_sample_after(&self, start: f64) -> Option<SampleRef> {
        let cutoff = window_start(start);
        self.obs
            .as_ref()?
            .buffer
            .iter()
            .find(|(_, s)| s.timestamp() > cutoff)
            .map(|(_, s)| Rc::clone(s))
    }

    /// Dump buffered samples newer than `start` as a JSON array of
    /// `{"t":…,"v":…}` objects (triggers carry only `"t"`).
    pub(crate) fn read_buffer_json(&self, start: f64, out: &mut dyn Write) -> Result<()> {
        let cutoff = window_start(start);
        out.write_all(b"[")?;
        let mut first = true;
        if let Some(obs) = &self.obs {
            for (data_type, sample) in &obs.buffer {
                if sample.timestamp() <= cutoff {
                    continue;
                }
                if !first {
                    out.write_all(b",")?;
                }
                first = false;
                if *data_type == DataType::Trigger {
                    write!(out, "{{\"t\":{:.3}}}", sample.timestamp())?;
                } else {
                    let value = sample.to_json(*data_type)?;
                    write!(out, "{{\"t\":{:.3},\"v\":{}}}", sample.timestamp(), value)?;
                }
            }
        }
        out.write_all(b"]")?;
        Ok(())
    }
}

/// Resolve a query start time: NaN means the whole buffer, values up to
/// thirty years are relative (seconds ago), larger values are absolute
/// epoch seconds.
pub(crate) fn window_start(start: f64) -> f64 {
    if start.is_nan() {
        f64::NEG_INFINITY
    } else if start <= THIRTY_YEARS_SECS {
        wall_clock() - start
    } else {
        start
    }
}

fn aggregate(transform: ObsTransform, values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let n = values.len() as f64;
    match transform {
        ObsTransform::None => f64::NAN,
        ObsTransform::Mean => values.iter().sum::<f64>() / n,
        ObsTransform::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        ObsTransform::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        ObsTransform::StdDev => {
            let mean = values.iter().sum::<f64>() / n;
            (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt()
        }
    }
}

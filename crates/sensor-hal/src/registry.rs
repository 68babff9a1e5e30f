//! In-memory table of per-sensor runtime state.

use crate::catalog::{self, SensorKind, SensorSpec};
use iio_transport::{ChannelRef, Context};
use serde::Serialize;

/// Runtime state for one logical sensor.
pub struct DeviceEntry {
    pub spec: &'static SensorSpec,
    /// Channels carrying a `raw` attribute, index-aligned with `latest`.
    pub raw_channels: Vec<ChannelRef>,
    /// Every non-output channel of the device, toggled on activation.
    pub input_channels: Vec<ChannelRef>,
    /// Rate control, when the device exposes `sampling_frequency`.
    pub frequency_channel: Option<ChannelRef>,
    /// Multiplier applied to raw integer readings; 1.0 when the device
    /// exposes no scale attribute.
    pub scale: f64,
    /// Requested sampling period, always within the spec's delay window.
    pub sampling_period_us: u64,
    pub initialized: bool,
    pub enabled: bool,
    /// Activation requested before discovery finished; `Some(state)` is
    /// replayed once and consumed when the device is mapped.
    pub pending_activation: Option<bool>,
    /// Batch request waiting for discovery or a usable period.
    pub pending_batch: bool,
    /// Most recent scaled readings, one slot per raw channel.
    pub latest: Vec<f32>,
}

impl DeviceEntry {
    fn idle(spec: &'static SensorSpec) -> Self {
        Self {
            spec,
            raw_channels: Vec::new(),
            input_channels: Vec::new(),
            frequency_channel: None,
            scale: 1.0,
            // Sample gently until the caller batches a faster rate.
            sampling_period_us: spec.max_delay_us,
            initialized: false,
            enabled: false,
            pending_activation: None,
            pending_batch: false,
            latest: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            handle: self.spec.handle,
            kind: self.spec.kind,
            initialized: self.initialized,
            enabled: self.enabled,
            pending_activation: self.pending_activation,
            pending_batch: self.pending_batch,
            scale: self.scale,
            sampling_period_us: self.sampling_period_us,
            latest: self.latest.clone(),
        }
    }
}

/// Caller-visible view of one entry, for status output and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySnapshot {
    pub handle: usize,
    pub kind: SensorKind,
    pub initialized: bool,
    pub enabled: bool,
    pub pending_activation: Option<bool>,
    pub pending_batch: bool,
    pub scale: f64,
    pub sampling_period_us: u64,
    pub latest: Vec<f32>,
}

/// One entry per catalog handle, plus the live context that owns every
/// channel reference the entries hold.
///
/// Entries exist from construction so control calls can record state before
/// discovery has mapped anything.
pub struct Registry {
    entries: Vec<DeviceEntry>,
    context: Option<Box<dyn Context>>,
}

impl Registry {
    /// A registry with no live context and every entry at its defaults.
    pub fn idle() -> Self {
        Self {
            entries: catalog::descriptors().iter().map(DeviceEntry::idle).collect(),
            context: None,
        }
    }

    pub fn by_handle(&self, handle: usize) -> Option<&DeviceEntry> {
        self.entries.get(handle)
    }

    pub fn by_handle_mut(&mut self, handle: usize) -> Option<&mut DeviceEntry> {
        self.entries.get_mut(handle)
    }

    pub fn entries(&self) -> &[DeviceEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [DeviceEntry] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sensors mapped by the last discovery run.
    pub fn mapped_count(&self) -> usize {
        self.entries.iter().filter(|e| e.initialized).count()
    }

    /// Sensors that are both enabled and initialized, derived by scanning
    /// under the caller's lock rather than kept in a freestanding counter.
    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.enabled && e.initialized).count()
    }

    pub fn is_discovered(&self) -> bool {
        self.context.is_some()
    }

    pub(crate) fn install_context(&mut self, context: Box<dyn Context>) {
        self.context = Some(context);
    }

    /// Drop the context and reset every entry. All channel references held
    /// by the old entries are invalid once this returns.
    pub(crate) fn teardown(&mut self) {
        *self = Registry::idle();
    }

    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.entries.iter().map(DeviceEntry::snapshot).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SENSOR_COUNT;

    #[test]
    fn idle_registry_has_one_entry_per_handle() {
        let registry = Registry::idle();
        assert_eq!(registry.len(), SENSOR_COUNT);
        assert!(!registry.is_discovered());
        assert_eq!(registry.mapped_count(), 0);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn idle_entries_default_to_slowest_rate() {
        let registry = Registry::idle();
        for entry in registry.entries() {
            assert_eq!(entry.sampling_period_us, entry.spec.max_delay_us);
            assert_eq!(entry.scale, 1.0);
            assert!(entry.latest.is_empty());
        }
    }

    #[test]
    fn enabled_but_uninitialized_is_not_active() {
        let mut registry = Registry::idle();
        if let Some(entry) = registry.by_handle_mut(0) {
            entry.enabled = true;
        }
        assert_eq!(registry.active_count(), 0);
        if let Some(entry) = registry.by_handle_mut(0) {
            entry.initialized = true;
        }
        assert_eq!(registry.active_count(), 1);
    }
}

//! The background sampling loop and the state it shares with the facade.

use crate::discovery::RAW_ATTRIBUTE;
use crate::metrics::HalMetrics;
use crate::registry::Registry;
use iio_transport::{Channel, ChannelRef};
use std::sync::{
    Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Duration;
use tracing::debug;

/// Pacing fallback when no active sensor advertises a period.
const IDLE_TICK: Duration = Duration::from_millis(10);

/// Floor on the inter-pass pause; keeps a zero period from spinning.
const MIN_PASS_PAUSE_US: u64 = 1_000;

/// What the sampler blocks on; paired with [`Shared::wake`].
pub(crate) struct Gate {
    /// Count of enabled+initialized sensors. Whoever mutates the registry
    /// recomputes this under the registry lock and republishes it here.
    pub active: usize,
    pub shutdown: bool,
}

/// State shared between the facade, control calls and the sampling loop.
pub(crate) struct Shared {
    pub registry: RwLock<Registry>,
    gate: Mutex<Gate>,
    wake: Condvar,
}

impl Shared {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: RwLock::new(registry),
            gate: Mutex::new(Gate {
                active: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
        }
    }

    pub fn read_registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write_registry(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a fresh active count; wakes the sampler if it was idle.
    pub fn refresh_active(&self, active: usize) {
        let mut gate = self.lock_gate();
        gate.active = active;
        drop(gate);
        self.wake.notify_all();
    }

    pub fn request_shutdown(&self) {
        let mut gate = self.lock_gate();
        gate.shutdown = true;
        drop(gate);
        self.wake.notify_all();
    }
}

/// One sensor's worth of work for a sampling pass, snapshotted so no lock
/// is held while hardware is read.
struct SampleTarget {
    handle: usize,
    channels: Vec<ChannelRef>,
    scale: f64,
    period_us: u64,
}

/// Body of the sampling thread. Blocks while nothing is active, otherwise
/// reads every active sensor's raw channels and stores scaled values,
/// pacing itself by the fastest active period. Returns when shutdown is
/// requested.
pub(crate) fn run(shared: Arc<Shared>, metrics: HalMetrics) {
    debug!("sampling loop started");
    loop {
        {
            let mut gate = shared.lock_gate();
            while gate.active == 0 && !gate.shutdown {
                gate = match shared.wake.wait(gate) {
                    Ok(gate) => gate,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
            if gate.shutdown {
                break;
            }
        }

        let pause = sample_pass(&shared, &metrics);

        // Nap until the next pass; shutdown interrupts the wait.
        let gate = shared.lock_gate();
        let (gate, _timed_out) =
            match shared.wake.wait_timeout_while(gate, pause, |gate| !gate.shutdown) {
                Ok(pair) => pair,
                Err(poisoned) => poisoned.into_inner(),
            };
        if gate.shutdown {
            break;
        }
    }
    debug!("sampling loop stopped");
}

/// Read every active sensor once. Returns how long to pause before the
/// next pass.
fn sample_pass(shared: &Shared, metrics: &HalMetrics) -> Duration {
    let targets: Vec<SampleTarget> = {
        let registry = shared.read_registry();
        registry
            .entries()
            .iter()
            .filter(|entry| entry.initialized && entry.enabled)
            .map(|entry| SampleTarget {
                handle: entry.spec.handle,
                channels: entry.raw_channels.clone(),
                scale: entry.scale,
                period_us: entry.sampling_period_us,
            })
            .collect()
    };

    if targets.is_empty() {
        return IDLE_TICK;
    }

    let mut pause_us = u64::MAX;
    for target in &targets {
        pause_us = pause_us.min(target.period_us);

        // Hardware reads happen with no lock held; the write lock is taken
        // only for the in-place buffer update.
        let values: Vec<f32> = target
            .channels
            .iter()
            .map(|channel| read_scaled(channel, target.scale))
            .collect();

        let mut registry = shared.write_registry();
        if let Some(entry) = registry.by_handle_mut(target.handle) {
            let slots = values.len().min(entry.latest.len());
            entry.latest[..slots].copy_from_slice(&values[..slots]);
        }
        metrics.samples_read.inc_by(values.len() as u64);
    }

    Duration::from_micros(pause_us.max(MIN_PASS_PAUSE_US))
}

/// A raw reading that fails to arrive or parse yields 0.0, not an error.
fn read_scaled(channel: &ChannelRef, scale: f64) -> f32 {
    let raw = match channel.read_attribute(RAW_ATTRIBUTE) {
        Ok(text) => text.trim().parse::<f64>().unwrap_or(0.0),
        Err(_) => 0.0,
    };
    (raw * scale) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsHub;
    use iio_transport::{MockBackend, MockChannel, MockDevice};

    fn discovered_shared(backend: &MockBackend) -> Shared {
        let registry = crate::discovery::discover(backend, "ip:test").unwrap();
        Shared::new(registry)
    }

    #[test]
    fn pass_scales_raw_values_into_latest() {
        let x = MockChannel::input(&[("raw", "100"), ("scale", "0.01")]);
        let y = MockChannel::input(&[("raw", "200")]);
        let z = MockChannel::input(&[("raw", "300")]);
        let backend = MockBackend::with_devices(vec![MockDevice::new(
            "accel_3d",
            vec![x, y, z],
        )]);
        let shared = discovered_shared(&backend);
        shared.write_registry().by_handle_mut(0).unwrap().enabled = true;

        let metrics = MetricsHub::new().unwrap();
        sample_pass(&shared, &metrics.hal);

        let registry = shared.read_registry();
        assert_eq!(registry.by_handle(0).unwrap().latest, vec![1.0, 2.0, 3.0]);
        assert_eq!(metrics.hal.samples_read.get(), 3);
    }

    #[test]
    fn unparsable_raw_reads_as_zero() {
        let bad = MockChannel::input(&[("raw", "garbage")]);
        let backend =
            MockBackend::with_devices(vec![MockDevice::new("gyro_3d", vec![bad])]);
        let shared = discovered_shared(&backend);
        shared.write_registry().by_handle_mut(7).unwrap().enabled = true;

        let metrics = MetricsHub::new().unwrap();
        sample_pass(&shared, &metrics.hal);

        let registry = shared.read_registry();
        assert_eq!(registry.by_handle(7).unwrap().latest, vec![0.0]);
    }

    #[test]
    fn idle_pass_reads_nothing() {
        let backend = MockBackend::with_devices(vec![MockDevice::new(
            "gravity",
            vec![MockChannel::input(&[("raw", "1")])],
        )]);
        let shared = discovered_shared(&backend);

        let metrics = MetricsHub::new().unwrap();
        let pause = sample_pass(&shared, &metrics.hal);
        assert_eq!(pause, IDLE_TICK);
        assert_eq!(metrics.hal.samples_read.get(), 0);
    }
}

//! The HAL facade: owns the shared registry and the sampling thread, and
//! exposes the poll/activate/batch/flush surface the host glue drives.

use crate::catalog::{self, SensorKind, SensorSpec, SENSOR_COUNT};
use crate::control;
use crate::discovery;
use crate::error::{DiscoveryError, HalError};
use crate::events::{monotonic_ns, Event, SampleEvent};
use crate::metrics::MetricsHub;
use crate::registry::{EntrySnapshot, Registry};
use crate::sampler::{self, Shared};
use iio_transport::{Backend, ChannelRef};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable naming the remote context endpoint.
pub const ENDPOINT_ENV: &str = "IIO_ENDPOINT";

/// Correction subtracted from each per-sensor delivery wait, so pacing
/// does not drift past the requested period.
const POLL_PACING_SLACK: Duration = Duration::from_micros(200);

/// Nap before answering a poll that found nothing enabled.
const IDLE_POLL_PAUSE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HalConfig {
    /// Address of the remote context, e.g. "ip:192.168.2.1".
    pub endpoint: String,
    /// Nap after a failed discovery attempt, milliseconds. The caller's
    /// next poll retries, so discovery self-heals indefinitely.
    pub retry_pause_ms: u64,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            endpoint: "ip:127.0.0.1".to_string(),
            retry_pause_ms: 1000,
        }
    }
}

impl HalConfig {
    /// Read the endpoint from the process environment, keeping defaults
    /// for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = env::var(ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                config.endpoint = endpoint;
            }
        }
        config
    }
}

pub struct SensorHal {
    shared: Arc<Shared>,
    backend: Arc<dyn Backend>,
    config: HalConfig,
    flush_pending: AtomicBool,
    metrics: MetricsHub,
    sampler: Option<JoinHandle<()>>,
}

impl SensorHal {
    /// Build the HAL and start its sampling thread. Discovery is lazy: it
    /// runs on the first poll, not here, so construction never blocks on
    /// the network.
    pub fn new(config: HalConfig, backend: Arc<dyn Backend>) -> Result<Self, HalError> {
        let metrics = MetricsHub::new().map_err(HalError::Metrics)?;
        let shared = Arc::new(Shared::new(Registry::idle()));
        let worker = {
            let shared = shared.clone();
            let hal_metrics = metrics.hal.clone();
            thread::Builder::new()
                .name("iio-sampler".to_string())
                .spawn(move || sampler::run(shared, hal_metrics))
                .map_err(|e| HalError::Sampler(e.to_string()))?
        };
        Ok(Self {
            shared,
            backend,
            config,
            flush_pending: AtomicBool::new(false),
            metrics,
            sampler: Some(worker),
        })
    }

    /// Static metadata for the registration layer.
    pub fn descriptors(&self) -> &'static [SensorSpec] {
        catalog::descriptors()
    }

    pub fn metrics(&self) -> &MetricsHub {
        &self.metrics
    }

    /// Caller-visible registry state, in handle order.
    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.shared.read_registry().snapshot()
    }

    fn resolve_handle(handle: i32) -> Result<usize, HalError> {
        usize::try_from(handle)
            .ok()
            .filter(|h| *h < SENSOR_COUNT)
            .ok_or(HalError::OutOfRangeHandle(handle))
    }

    /// Enable or disable one logical sensor.
    ///
    /// The request is always recorded; if discovery has not mapped the
    /// device yet it is deferred rather than blocking the caller, and
    /// replayed once the device appears.
    pub fn activate(&self, handle: i32, enable: bool) -> Result<(), HalError> {
        let handle = Self::resolve_handle(handle)?;
        let mut push: Option<(&'static str, Vec<ChannelRef>)> = None;
        let active;
        {
            let mut registry = self.shared.write_registry();
            let Some(entry) = registry.by_handle_mut(handle) else {
                return Err(HalError::OutOfRangeHandle(handle as i32));
            };
            entry.enabled = enable;
            if entry.initialized {
                push = Some((entry.spec.device_name, entry.input_channels.clone()));
            } else {
                entry.pending_activation = Some(enable);
                debug!("sensor {handle}: activation({enable}) deferred until discovery");
            }
            active = registry.active_count();
        }
        self.shared.refresh_active(active);
        self.metrics.hal.active_sensors.set(active as i64);
        if let Some((device, channels)) = push {
            info!(
                "sensor {handle} ({device}) {}, {active} active",
                if enable { "enabled" } else { "disabled" },
            );
            control::push_activation(device, &channels, enable);
        }
        Ok(())
    }

    /// Set a sensor's sampling period.
    ///
    /// The period is clamped into the sensor's supported window and stored
    /// optimistically; a later hardware failure keeps the stored value.
    /// The report-latency budget is accepted and logged but not enforced.
    pub fn batch(
        &self,
        handle: i32,
        sampling_period_ns: i64,
        max_report_latency_ns: i64,
    ) -> Result<(), HalError> {
        let handle = Self::resolve_handle(handle)?;
        debug!(
            "sensor {handle}: batch period {sampling_period_ns}ns, \
             report latency {max_report_latency_ns}ns (latency unsupported)"
        );
        let mut push: Option<(&'static str, ChannelRef, u64)> = None;
        {
            let mut registry = self.shared.write_registry();
            let Some(entry) = registry.by_handle_mut(handle) else {
                return Err(HalError::OutOfRangeHandle(handle as i32));
            };
            let clamped_ns = control::clamp_period_ns(entry.spec, sampling_period_ns);
            entry.sampling_period_us = (clamped_ns / 1000) as u64;
            if clamped_ns == 0 || !entry.initialized {
                entry.pending_batch = true;
                debug!("sensor {handle}: batch deferred");
            } else if let Some(channel) = entry.frequency_channel.clone() {
                push = Some((entry.spec.device_name, channel, entry.sampling_period_us));
            } else {
                debug!("sensor {handle}: device has no rate control");
            }
        }
        if let Some((device, channel, period_us)) = push {
            control::push_sampling_rate(device, &channel, period_us);
        }
        Ok(())
    }

    /// Ask the next poll to answer with flush-complete meta events instead
    /// of samples, whichever sensor requested it.
    pub fn flush(&self, handle: i32) -> Result<(), HalError> {
        let _ = Self::resolve_handle(handle)?;
        self.flush_pending.store(true, Ordering::Release);
        Ok(())
    }

    /// Drain events at the caller's cadence. Never returns more than
    /// `capacity` events.
    ///
    /// Delivery is paced by waiting roughly one sampling period per active
    /// sensor, so poll latency grows with the number of active sensors.
    pub fn poll(&self, capacity: usize) -> Vec<Event> {
        if capacity == 0 {
            return Vec::new();
        }

        if self.flush_pending.swap(false, Ordering::AcqRel) {
            let events: Vec<Event> = (0..SENSOR_COUNT)
                .take(capacity)
                .map(|sensor| Event::FlushComplete { sensor })
                .collect();
            self.metrics.hal.events_emitted.inc_by(events.len() as u64);
            return events;
        }

        if !self.shared.read_registry().is_discovered() {
            if let Err(err) = self.try_discover() {
                debug!("discovery not ready: {err}");
                thread::sleep(Duration::from_millis(self.config.retry_pause_ms));
                return Vec::new();
            }
        }

        let targets: Vec<(usize, SensorKind, u64)> = {
            let registry = self.shared.read_registry();
            registry
                .entries()
                .iter()
                .filter(|entry| entry.enabled && entry.initialized)
                .map(|entry| (entry.spec.handle, entry.spec.kind, entry.sampling_period_us))
                .collect()
        };

        if targets.is_empty() {
            thread::sleep(IDLE_POLL_PAUSE);
            self.metrics.hal.events_emitted.inc();
            return vec![Event::FlushComplete { sensor: 0 }];
        }

        let mut events = Vec::with_capacity(targets.len().min(capacity));
        for (handle, kind, period_us) in targets {
            if events.len() == capacity {
                break;
            }
            let pace = Duration::from_micros(period_us).saturating_sub(POLL_PACING_SLACK);
            thread::sleep(pace);
            let registry = self.shared.read_registry();
            if let Some(entry) = registry.by_handle(handle) {
                events.push(Event::Sample(SampleEvent {
                    sensor: handle,
                    kind,
                    values: entry.latest.clone(),
                    timestamp_ns: monotonic_ns(),
                }));
            }
        }
        self.metrics.hal.events_emitted.inc_by(events.len() as u64);
        events
    }

    /// Run discovery and swap in the fresh registry, carrying the
    /// caller-visible request state across the replacement and replaying
    /// deferred operations in ascending handle order.
    fn try_discover(&self) -> Result<(), DiscoveryError> {
        let mut fresh = discovery::discover(self.backend.as_ref(), &self.config.endpoint)?;
        self.metrics.hal.discovery_runs.inc();

        let mut replay_activation: Vec<(usize, &'static str, Vec<ChannelRef>, bool)> = Vec::new();
        let mut replay_batch: Vec<(usize, &'static str, ChannelRef, u64)> = Vec::new();
        let mapped;
        let active;
        {
            let mut registry = self.shared.write_registry();
            for (old, new) in registry.entries().iter().zip(fresh.entries_mut()) {
                new.enabled = old.enabled;
                new.sampling_period_us = old.sampling_period_us;
                new.pending_activation = old.pending_activation;
                new.pending_batch = old.pending_batch;
            }
            for entry in fresh.entries_mut() {
                if !entry.initialized {
                    // The device did not appear this run; its deferred
                    // requests stay recorded for a later rediscovery.
                    continue;
                }
                if let Some(state) = entry.pending_activation.take() {
                    replay_activation.push((
                        entry.spec.handle,
                        entry.spec.device_name,
                        entry.input_channels.clone(),
                        state,
                    ));
                }
                if entry.pending_batch {
                    entry.pending_batch = false;
                    if entry.sampling_period_us == 0 {
                        debug!(
                            "sensor {}: deferred batch has zero period, nothing to write",
                            entry.spec.handle,
                        );
                    } else if let Some(channel) = entry.frequency_channel.clone() {
                        replay_batch.push((
                            entry.spec.handle,
                            entry.spec.device_name,
                            channel,
                            entry.sampling_period_us,
                        ));
                    }
                }
            }
            mapped = fresh.mapped_count();
            active = fresh.active_count();
            *registry = fresh;
        }
        self.shared.refresh_active(active);
        self.metrics.hal.sensors_mapped.set(mapped as i64);
        self.metrics.hal.active_sensors.set(active as i64);

        for (handle, device, channels, enable) in replay_activation {
            debug!("sensor {handle}: replaying deferred activation({enable})");
            control::push_activation(device, &channels, enable);
        }
        for (handle, device, channel, period_us) in replay_batch {
            debug!("sensor {handle}: replaying deferred batch ({period_us}us)");
            control::push_sampling_rate(device, &channel, period_us);
        }
        Ok(())
    }

    /// Stop the sampling loop and tear down the registry. Every channel
    /// reference is invalid once the context drops.
    pub fn shutdown(&mut self) {
        self.shared.request_shutdown();
        if let Some(worker) = self.sampler.take() {
            if worker.join().is_err() {
                warn!("sampling loop panicked during shutdown");
            }
        }
        self.shared.write_registry().teardown();
    }
}

impl Drop for SensorHal {
    fn drop(&mut self) {
        self.shutdown();
    }
}

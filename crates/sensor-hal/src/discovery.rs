//! Discovery: connect to the remote context and map cataloged devices onto
//! registry entries.

use crate::catalog;
use crate::error::DiscoveryError;
use crate::registry::{DeviceEntry, Registry};
use iio_transport::{Backend, Channel, ChannelRef, Context, Device};
use tracing::{debug, info, warn};

pub(crate) const RAW_ATTRIBUTE: &str = "raw";
pub(crate) const SCALE_ATTRIBUTE: &str = "scale";
pub(crate) const FREQUENCY_ATTRIBUTE: &str = "sampling_frequency";

/// Connect to `endpoint` and map every cataloged device found there.
///
/// Builds a completely fresh registry each run; nothing from a previous
/// registry is merged. The caller decides what request state to carry
/// across the swap. On any error nothing is committed and the connection,
/// if one was opened, is released before returning.
pub fn discover(backend: &dyn Backend, endpoint: &str) -> Result<Registry, DiscoveryError> {
    let context = match backend.connect(endpoint) {
        Ok(context) => context,
        Err(err) => {
            warn!("failed to open context to {endpoint}: {err}");
            return Err(DiscoveryError::ConnectionFailed(err.to_string()));
        }
    };

    let mut registry = Registry::idle();
    let mut mapped = 0usize;
    for (index, device) in context.devices().into_iter().enumerate() {
        let Some(name) = device.name() else {
            warn!("skipping unreadable device reference at index {index}");
            continue;
        };
        let Some(spec) = catalog::by_device_name(&name) else {
            debug!("{name} is not a modeled sensor");
            continue;
        };
        let channels = device.channels();
        if channels.is_empty() {
            warn!("{name} exposes no channels");
            continue;
        }
        // Catalog handles are dense, so the entry always exists.
        let Some(entry) = registry.by_handle_mut(spec.handle) else {
            continue;
        };
        map_channels(entry, &channels);
        entry.initialized = true;
        mapped += 1;
        debug!(
            "mapped {name} -> handle {}: {} raw channels, scale {}, rate control {}",
            spec.handle,
            entry.raw_channels.len(),
            entry.scale,
            if entry.frequency_channel.is_some() { "yes" } else { "no" },
        );
    }

    if mapped == 0 {
        // The context drops here, releasing the connection before we report.
        warn!("found zero modeled sensors at {endpoint}");
        return Err(DiscoveryError::NoSensorsFound);
    }

    registry.install_context(context);
    info!("discovery mapped {mapped} sensors at {endpoint}");
    Ok(registry)
}

/// Scan a device's non-output channels for raw, scale and rate-control
/// attributes. The first scale and the first sampling_frequency hit win,
/// even if later channels carry them too.
fn map_channels(entry: &mut DeviceEntry, channels: &[ChannelRef]) {
    let mut scale_seen = false;
    for channel in channels {
        if channel.is_output() {
            continue;
        }
        entry.input_channels.push(channel.clone());
        for attribute in channel.attributes() {
            match attribute.as_str() {
                RAW_ATTRIBUTE => entry.raw_channels.push(channel.clone()),
                SCALE_ATTRIBUTE if !scale_seen => {
                    scale_seen = true;
                    entry.scale = read_scale(entry.spec.device_name, channel);
                }
                FREQUENCY_ATTRIBUTE if entry.frequency_channel.is_none() => {
                    entry.frequency_channel = Some(channel.clone());
                }
                _ => {}
            }
        }
    }
    entry.latest = vec![0.0; entry.raw_channels.len()];
}

/// An unreadable or unparsable scale degrades to 1.0; the device keeps its
/// data, just unscaled.
fn read_scale(device: &str, channel: &ChannelRef) -> f64 {
    match channel.read_attribute(SCALE_ATTRIBUTE) {
        Ok(text) => match text.trim().parse::<f64>() {
            Ok(value) => value,
            Err(_) => {
                warn!("{device}: unparsable scale attribute {text:?}, keeping 1.0");
                1.0
            }
        },
        Err(err) => {
            warn!("{device}: unreadable scale attribute ({err}), keeping 1.0");
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iio_transport::{MockBackend, MockChannel, MockDevice};

    #[test]
    fn connection_failure_commits_nothing() {
        let backend = MockBackend::new();
        backend.refuse_connections(true);
        assert!(matches!(
            discover(&backend, "ip:10.0.0.1"),
            Err(DiscoveryError::ConnectionFailed(_))
        ));
    }

    #[test]
    fn zero_mapped_devices_is_no_sensors_found() {
        let backend = MockBackend::with_devices(vec![
            MockDevice::new("unmodeled_widget", vec![MockChannel::input(&[("raw", "1")])]),
            MockDevice::unreadable(),
        ]);
        assert!(matches!(
            discover(&backend, "ip:local"),
            Err(DiscoveryError::NoSensorsFound)
        ));
    }

    #[test]
    fn first_scale_wins_across_channels() {
        let backend = MockBackend::with_devices(vec![MockDevice::new(
            "accel_3d",
            vec![
                MockChannel::input(&[("raw", "1"), ("scale", "0.5")]),
                MockChannel::input(&[("raw", "2"), ("scale", "99.0")]),
            ],
        )]);
        let registry = discover(&backend, "ip:local").unwrap();
        let entry = registry.by_handle(0).unwrap();
        assert_eq!(entry.scale, 0.5);
        assert_eq!(entry.raw_channels.len(), 2);
        assert_eq!(entry.latest.len(), 2);
    }

    #[test]
    fn output_channels_are_ignored() {
        let backend = MockBackend::with_devices(vec![MockDevice::new(
            "gyro_3d",
            vec![
                MockChannel::input(&[("raw", "7")]),
                MockChannel::output(&[("raw", "8"), ("scale", "2.0")]),
            ],
        )]);
        let registry = discover(&backend, "ip:local").unwrap();
        let entry = registry.by_handle(7).unwrap();
        assert_eq!(entry.raw_channels.len(), 1);
        assert_eq!(entry.input_channels.len(), 1);
        assert_eq!(entry.scale, 1.0);
    }

    #[test]
    fn bad_scale_degrades_to_unity() {
        let backend = MockBackend::with_devices(vec![MockDevice::new(
            "gravity",
            vec![MockChannel::input(&[("raw", "10"), ("scale", "not-a-number")])],
        )]);
        let registry = discover(&backend, "ip:local").unwrap();
        assert_eq!(registry.by_handle(2).unwrap().scale, 1.0);
    }

    #[test]
    fn frequency_channel_is_recorded_once() {
        let backend = MockBackend::with_devices(vec![MockDevice::new(
            "magn_3d",
            vec![
                MockChannel::input(&[("raw", "0")]),
                MockChannel::input(&[("sampling_frequency", "50")]),
                MockChannel::input(&[("sampling_frequency", "100")]),
            ],
        )]);
        let registry = discover(&backend, "ip:local").unwrap();
        let entry = registry.by_handle(4).unwrap();
        let freq = entry.frequency_channel.as_ref().unwrap();
        assert_eq!(freq.read_attribute("sampling_frequency").unwrap(), "50");
    }

    #[test]
    fn rediscovery_yields_fresh_handles() {
        let shared_channel = MockChannel::input(&[("raw", "5")]);
        let backend = MockBackend::with_devices(vec![MockDevice::new(
            "accel_3d",
            vec![shared_channel.clone()],
        )]);
        let first = discover(&backend, "ip:local").unwrap();

        backend.set_devices(vec![MockDevice::new(
            "accel_3d",
            vec![MockChannel::input(&[("raw", "6"), ("scale", "0.25")])],
        )]);
        let second = discover(&backend, "ip:local").unwrap();

        let a = &first.by_handle(0).unwrap().raw_channels[0];
        let b = &second.by_handle(0).unwrap().raw_channels[0];
        assert!(!std::sync::Arc::ptr_eq(a, b));
        assert_eq!(second.by_handle(0).unwrap().scale, 0.25);
    }
}

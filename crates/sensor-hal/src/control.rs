//! Hardware-facing halves of the activate/batch operations.
//!
//! These run outside the registry lock: callers snapshot the channel
//! handles they need, release the lock, then push. Every failure here is
//! contained and logged; registry state was already updated optimistically.

use crate::catalog::SensorSpec;
use crate::discovery::FREQUENCY_ATTRIBUTE;
use iio_transport::{Channel, ChannelRef};
use tracing::{debug, warn};

/// Tolerance when confirming a frequency readback against what we wrote.
const READBACK_TOLERANCE_HZ: f64 = 1e-6;

/// Clamp a requested sampling period into the sensor's supported window.
pub(crate) fn clamp_period_ns(spec: &SensorSpec, period_ns: i64) -> i64 {
    let min = spec.min_delay_us as i64 * 1000;
    let max = spec.max_delay_us as i64 * 1000;
    period_ns.clamp(min, max)
}

/// Toggle every input channel of a device to match `enable`.
///
/// Channels are toggled independently; a failure on one does not roll back
/// the others.
pub(crate) fn push_activation(device: &str, channels: &[ChannelRef], enable: bool) {
    for (index, channel) in channels.iter().enumerate() {
        let result = if enable {
            channel.enable()
        } else {
            channel.disable()
        };
        if let Err(err) = result {
            warn!(
                "{device}: failed to {} channel {index}: {err}",
                if enable { "enable" } else { "disable" },
            );
        }
    }
}

/// Convert the stored period to a frequency, write it to the rate-control
/// channel, and read it back for confirmation.
pub(crate) fn push_sampling_rate(device: &str, channel: &ChannelRef, period_us: u64) {
    if period_us == 0 {
        debug!("{device}: zero period, skipping rate write");
        return;
    }
    let frequency_hz = 1e9 / (period_us as f64 * 1000.0);
    let value = format!("{frequency_hz}");
    if let Err(err) = channel.write_attribute(FREQUENCY_ATTRIBUTE, &value) {
        warn!("{device}: sampling_frequency write failed: {err}");
        return;
    }
    match channel.read_attribute(FREQUENCY_ATTRIBUTE) {
        Ok(echoed) => {
            let confirmed = echoed
                .trim()
                .parse::<f64>()
                .map(|v| (v - frequency_hz).abs() <= READBACK_TOLERANCE_HZ)
                .unwrap_or(false);
            if !confirmed {
                warn!("{device}: sampling_frequency readback mismatch: wrote {value}, read {echoed}");
            }
        }
        Err(err) => warn!("{device}: sampling_frequency readback failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use iio_transport::MockChannel;

    #[test]
    fn clamp_covers_the_whole_input_range() {
        let spec = catalog::by_handle(0).unwrap();
        let min = spec.min_delay_us as i64 * 1000;
        let max = spec.max_delay_us as i64 * 1000;
        assert_eq!(clamp_period_ns(spec, 0), min);
        assert_eq!(clamp_period_ns(spec, -5), min);
        assert_eq!(clamp_period_ns(spec, i64::MAX), max);
        assert_eq!(clamp_period_ns(spec, max + 1), max);
        let mid = max / 2;
        assert_eq!(clamp_period_ns(spec, mid), mid);
    }

    #[test]
    fn activation_push_is_best_effort() {
        let good = MockChannel::input(&[("raw", "1")]);
        let also_good = MockChannel::input(&[("raw", "2")]);
        let channels = vec![
            good.clone() as iio_transport::ChannelRef,
            also_good.clone() as iio_transport::ChannelRef,
        ];
        push_activation("accel_3d", &channels, true);
        assert!(good.is_enabled());
        assert!(also_good.is_enabled());
        push_activation("accel_3d", &channels, false);
        assert!(!good.is_enabled());
        assert!(!also_good.is_enabled());
    }

    #[test]
    fn rate_push_writes_frequency_in_hz() {
        let channel = MockChannel::input(&[("sampling_frequency", "0")]);
        let channel_ref = channel.clone() as iio_transport::ChannelRef;
        // 20 ms period -> 50 Hz
        push_sampling_rate("accel_3d", &channel_ref, 20_000);
        assert_eq!(channel.read_attribute("sampling_frequency").unwrap(), "50");
    }
}

//! Caller-facing event types and the poll-time clock.

use crate::catalog::SensorKind;
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Instant;

/// One event drained from the registry by a poll call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A scaled sample snapshot for one sensor.
    Sample(SampleEvent),
    /// Synthetic marker: all buffered samples for `sensor` were delivered.
    FlushComplete { sensor: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleEvent {
    pub sensor: usize,
    pub kind: SensorKind,
    /// One scaled value per raw channel, possibly slightly stale relative
    /// to the poll moment.
    pub values: Vec<f32>,
    /// Monotonic nanoseconds, stamped at poll time rather than sample time.
    pub timestamp_ns: i64,
}

/// Nanoseconds on a process-wide monotonic clock.
pub(crate) fn monotonic_ns() -> i64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = *EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_never_runs_backwards() {
        let a = monotonic_ns();
        let b = monotonic_ns();
        assert!(b >= a);
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let event = Event::FlushComplete { sensor: 0 };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"flush_complete","sensor":0}"#);

        let event = Event::Sample(SampleEvent {
            sensor: 7,
            kind: SensorKind::Gyroscope,
            values: vec![1.0],
            timestamp_ns: 5,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"sample""#));
        assert!(json.contains(r#""kind":"gyroscope""#));
    }
}

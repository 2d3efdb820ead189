//! Tests for `linkbroker` metrics helpers.
//!
//! These tests verify that counters and gauges update as expected using
//! `metrics_util::debugging::DebuggingRecorder`.
#![cfg(feature = "metrics")]

use linkbroker::metrics::{self, Direction, ErrorKind};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use rstest::rstest;

/// Creates a debugging recorder and snapshotter for metrics testing.
fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn counter_with_label(snapshotter: &Snapshotter, name: &str, label: (&str, &str)) -> Option<u64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(key, _, _, value)| {
            let matches = key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label.0 && l.value() == label.1);
            match value {
                DebugValue::Counter(count) if matches => Some(count),
                _ => None,
            }
        })
}

#[rstest]
#[case(Direction::Inbound, "inbound")]
#[case(Direction::Outbound, "outbound")]
fn message_metric_is_labelled_by_direction(#[case] direction: Direction, #[case] label: &str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    ::metrics::with_local_recorder(&recorder, || {
        metrics::inc_messages(direction);
        metrics::inc_messages(direction);
    });

    assert_eq!(
        counter_with_label(&snapshotter, metrics::MESSAGES_TOTAL, ("direction", label)),
        Some(2)
    );
}

#[rstest]
#[case(ErrorKind::Io, "io")]
#[case(ErrorKind::Engine, "engine")]
#[case(ErrorKind::Storage, "storage")]
fn error_metric_is_labelled_by_kind(#[case] kind: ErrorKind, #[case] label: &str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    ::metrics::with_local_recorder(&recorder, || metrics::inc_errors(kind));

    assert_eq!(
        counter_with_label(&snapshotter, metrics::ERRORS_TOTAL, ("kind", label)),
        Some(1)
    );
}

#[test]
fn connection_gauge_tracks_open_and_close() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    ::metrics::with_local_recorder(&recorder, || {
        metrics::inc_connections();
        metrics::inc_connections();
        metrics::dec_connections();
    });

    let metrics = snapshotter.snapshot().into_vec();
    assert!(
        metrics.iter().any(|(key, _, _, value)| {
            key.key().name() == metrics::CONNECTIONS_ACTIVE
                && matches!(value, DebugValue::Gauge(g) if g.into_inner() == 1.0)
        }),
        "expected {} == 1, got {metrics:#?}",
        metrics::CONNECTIONS_ACTIVE
    );
}

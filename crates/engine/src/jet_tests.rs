// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use vg_adapters::{FakeTailer, RawJobRecord};
use vg_core::{FakeClock, JobType, Rlal};

use super::*;

const PREFIX: &str = "libvirt-guest";

fn record(fields: &[(&str, &str)]) -> RawJobRecord {
    RawJobRecord::new(
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
    )
}

fn rlal() -> Rlal<FakeClock> {
    Rlal::new(FakeClock::new(), Duration::from_secs(3), Duration::from_secs(60))
}

#[test]
fn accepts_a_queued_start_job() {
    let rlal = rlal();
    let rec = record(&[
        ("UNIT", "libvirt_2dguest_40alpha_2eservice"),
        ("JOB_TYPE", "start"),
    ]);

    let event = accept(&rec, PREFIX, &rlal).unwrap();
    assert_eq!(event.domain.as_ref(), "alpha");
    assert_eq!(event.job_type, JobType::Start);
}

#[test]
fn drops_a_start_job_that_already_carries_a_result() {
    let rlal = rlal();
    let rec = record(&[
        ("UNIT", "libvirt_2dguest_40alpha_2eservice"),
        ("JOB_TYPE", "start"),
        ("JOB_RESULT", "done"),
    ]);

    assert!(accept(&rec, PREFIX, &rlal).is_none());
}

#[test]
fn requires_a_done_result_for_stop() {
    let rlal = rlal();
    let pending = record(&[
        ("UNIT", "libvirt_2dguest_40alpha_2eservice"),
        ("JOB_TYPE", "stop"),
    ]);
    assert!(accept(&pending, PREFIX, &rlal).is_none());

    let failed = record(&[
        ("UNIT", "libvirt_2dguest_40alpha_2eservice"),
        ("JOB_TYPE", "stop"),
        ("JOB_RESULT", "failed"),
    ]);
    assert!(accept(&failed, PREFIX, &rlal).is_none());

    let done = record(&[
        ("UNIT", "libvirt_2dguest_40alpha_2eservice"),
        ("JOB_TYPE", "stop"),
        ("JOB_RESULT", "done"),
    ]);
    assert!(accept(&done, PREFIX, &rlal).is_some());
}

#[test]
fn drops_units_outside_the_template_prefix() {
    let rlal = rlal();
    let rec = record(&[("UNIT", "sshd.service"), ("JOB_TYPE", "start")]);
    assert!(accept(&rec, PREFIX, &rlal).is_none());
}

#[test]
fn drops_unrecognized_job_types() {
    let rlal = rlal();
    let rec = record(&[
        ("UNIT", "libvirt_2dguest_40alpha_2eservice"),
        ("JOB_TYPE", "verify-active"),
        ("JOB_RESULT", "done"),
    ]);
    assert!(accept(&rec, PREFIX, &rlal).is_none());
}

#[test]
fn drops_completions_that_echo_a_reconciler_driven_action() {
    let rlal = rlal();
    // Simulate HDM having just recorded a start for alpha.
    rlal.record("alpha");

    let rec = record(&[
        ("UNIT", "libvirt_2dguest_40alpha_2eservice"),
        ("JOB_TYPE", "start"),
    ]);
    assert!(accept(&rec, PREFIX, &rlal).is_none());
}

#[tokio::test]
async fn reopens_with_the_restart_delay_as_the_since_hint_after_the_stream_closes() {
    let tailer = Arc::new(FakeTailer::new());
    let rlal = Arc::new(rlal());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();
    let restart_delay = Duration::from_millis(20);

    let jet = Jet::spawn(
        Arc::clone(&tailer),
        PREFIX.to_string(),
        rlal,
        restart_delay,
        tx,
        shutdown.clone(),
    );

    for _ in 0..50 {
        if tailer.open_count() >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(tailer.last_since(), None);

    tailer.close();

    for _ in 0..50 {
        if tailer.open_count() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(tailer.open_count(), 2);
    assert_eq!(tailer.last_since(), Some(restart_delay));

    tailer.push(record(&[
        ("UNIT", "libvirt_2dguest_40alpha_2eservice"),
        ("JOB_TYPE", "start"),
    ]));
    let event = rx.recv().await.unwrap();
    assert_eq!(event.domain.as_ref(), "alpha");

    shutdown.cancel();
    assert!(jet.handle.await.is_ok());
}

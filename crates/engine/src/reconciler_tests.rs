// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;

use vg_adapters::{FakeHypervisor, FakeTailer, FakeUnitManager, HypervisorCall, HypervisorEvent,
    LifecycleCode, RawJobRecord, UnitCall};
use vg_core::{compose_unit_name, DomainName, DomainStatus, FakeClock, UnitActiveState};

use super::*;
use crate::hdm::HdmTiming;

const PREFIX: &str = "libvirt-guest";

fn config() -> ReconcilerConfig {
    ReconcilerConfig {
        prefix: PREFIX.to_string(),
        hdm_timing: HdmTiming {
            check_delay: Duration::from_millis(5),
            action_timeout: Duration::from_millis(200),
            rlal_threshold: Duration::from_secs(3),
            rlal_max_length: Duration::from_secs(60),
        },
        jet_restart_delay: Duration::from_millis(20),
        jet_rlal_threshold: Duration::from_secs(3),
        jet_rlal_max_length: Duration::from_secs(60),
    }
}

fn job_record(unit: &str, job_type: &str, result: Option<&str>) -> RawJobRecord {
    let mut fields = HashMap::new();
    fields.insert("UNIT".to_string(), unit.to_string());
    fields.insert("JOB_TYPE".to_string(), job_type.to_string());
    if let Some(result) = result {
        fields.insert("JOB_RESULT".to_string(), result.to_string());
    }
    RawJobRecord::new(fields)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(condition(), "condition did not become true in time");
}

struct Harness {
    hypervisor: Arc<FakeHypervisor>,
    units: FakeUnitManager,
    tailer: Arc<FakeTailer>,
    hypervisor_tx: mpsc::UnboundedSender<HypervisorEvent>,
    reconciler: Reconciler<FakeHypervisor>,
}

async fn start(domains: &[(&str, DomainStatus)]) -> Harness {
    let hypervisor = Arc::new(FakeHypervisor::new());
    let units = FakeUnitManager::new();
    for (domain, status) in domains {
        hypervisor.set_status(domain, *status);
        let unit = compose_unit_name(PREFIX, domain);
        let state = if status.is_active() {
            UnitActiveState::Active
        } else {
            UnitActiveState::Inactive
        };
        units.set_state(&unit, state);
    }

    let tailer = Arc::new(FakeTailer::new());
    let (hypervisor_tx, hypervisor_rx) = mpsc::unbounded_channel();

    let reconciler = Reconciler::bootstrap(
        Arc::clone(&hypervisor),
        hypervisor_rx,
        units.clone(),
        Arc::clone(&tailer),
        FakeClock::new(),
        config(),
    )
    .await
    .unwrap();

    Harness {
        hypervisor,
        units,
        tailer,
        hypervisor_tx,
        reconciler,
    }
}

#[tokio::test]
async fn hypervisor_start_fans_out_to_the_unit() {
    let h = start(&[("alpha", DomainStatus::Inactive)]).await;

    h.hypervisor_tx
        .send(HypervisorEvent::Lifecycle {
            domain: DomainName::new("alpha"),
            code: LifecycleCode::Started,
        })
        .unwrap();

    let unit = compose_unit_name(PREFIX, "alpha");
    wait_until(|| h.units.calls().contains(&UnitCall::Start(unit.clone()))).await;

    let starts = h
        .units
        .calls()
        .into_iter()
        .filter(|c| matches!(c, UnitCall::Start(_)))
        .count();
    assert_eq!(starts, 1);
}

#[tokio::test]
async fn hypervisor_stop_fans_out_to_the_unit() {
    let h = start(&[("bravo", DomainStatus::Active)]).await;

    h.hypervisor_tx
        .send(HypervisorEvent::Lifecycle {
            domain: DomainName::new("bravo"),
            code: LifecycleCode::Stopped,
        })
        .unwrap();

    let unit = compose_unit_name(PREFIX, "bravo");
    wait_until(|| h.units.calls().contains(&UnitCall::Stop(unit.clone()))).await;
}

#[tokio::test]
async fn hypervisor_reboot_restarts_the_unit_once() {
    let h = start(&[("charlie", DomainStatus::Active)]).await;

    h.hypervisor_tx
        .send(HypervisorEvent::Reboot {
            domain: DomainName::new("charlie"),
        })
        .unwrap();

    let unit = compose_unit_name(PREFIX, "charlie");
    wait_until(|| h.units.calls().contains(&UnitCall::Restart(unit.clone()))).await;

    let restarts = h
        .units
        .calls()
        .into_iter()
        .filter(|c| matches!(c, UnitCall::Restart(_)))
        .count();
    assert_eq!(restarts, 1);
}

#[tokio::test]
async fn hypervisor_reboot_refreshes_the_cache_even_when_restart_is_suppressed() {
    let h = start(&[("charlie", DomainStatus::Active)]).await;

    // Pre-record so the reboot looks like an echo of a restart the
    // user already issued through systemd: restart must be suppressed,
    // but the cache refresh must still happen.
    h.hypervisor_tx
        .send(HypervisorEvent::Lifecycle {
            domain: DomainName::new("charlie"),
            code: LifecycleCode::Started,
        })
        .unwrap();
    wait_until(|| {
        h.hypervisor
            .calls()
            .iter()
            .any(|c| matches!(c, HypervisorCall::DomainStatus(d) if d == "charlie"))
    })
    .await;

    h.hypervisor_tx
        .send(HypervisorEvent::Reboot {
            domain: DomainName::new("charlie"),
        })
        .unwrap();

    wait_until(|| {
        h.hypervisor
            .calls()
            .iter()
            .filter(|c| matches!(c, HypervisorCall::DomainStatus(d) if d == "charlie"))
            .count()
            >= 2
    })
    .await;

    let restarts = h
        .units
        .calls()
        .into_iter()
        .filter(|c| matches!(c, UnitCall::Restart(_)))
        .count();
    assert_eq!(restarts, 0, "restart should be suppressed as an echo");
}

#[tokio::test]
async fn unit_start_fans_out_to_the_hypervisor() {
    let h = start(&[("alpha", DomainStatus::Inactive)]).await;
    let unit = compose_unit_name(PREFIX, "alpha");

    h.tailer.push(job_record(&unit, "start", None));

    wait_until(|| {
        h.hypervisor
            .calls()
            .contains(&HypervisorCall::StartDomain("alpha".to_string()))
    })
    .await;
}

#[tokio::test]
async fn unit_stop_fans_out_to_the_hypervisor() {
    let h = start(&[("bravo", DomainStatus::Active)]).await;
    let unit = compose_unit_name(PREFIX, "bravo");

    h.tailer.push(job_record(&unit, "stop", Some("done")));

    wait_until(|| {
        h.hypervisor
            .calls()
            .contains(&HypervisorCall::ShutdownDomain("bravo".to_string()))
    })
    .await;
}

#[tokio::test]
async fn unit_restart_stops_then_starts_the_domain_once() {
    let h = start(&[("charlie", DomainStatus::Active)]).await;
    let unit = compose_unit_name(PREFIX, "charlie");

    h.tailer.push(job_record(&unit, "restart", Some("done")));

    wait_until(|| {
        h.hypervisor
            .calls()
            .contains(&HypervisorCall::StartDomain("charlie".to_string()))
    })
    .await;

    let calls = h.hypervisor.calls();
    let shutdowns = calls
        .iter()
        .filter(|c| matches!(c, HypervisorCall::ShutdownDomain(d) if d == "charlie"))
        .count();
    let starts = calls
        .iter()
        .filter(|c| matches!(c, HypervisorCall::StartDomain(d) if d == "charlie"))
        .count();
    assert_eq!(shutdowns, 1);
    assert_eq!(starts, 1);
}

#[tokio::test]
async fn a_job_completion_echoing_a_hypervisor_driven_start_does_not_reach_hdm() {
    let h = start(&[("alpha", DomainStatus::Active)]).await;
    let unit = compose_unit_name(PREFIX, "alpha");

    h.hypervisor_tx
        .send(HypervisorEvent::Lifecycle {
            domain: DomainName::new("alpha"),
            code: LifecycleCode::Started,
        })
        .unwrap();
    wait_until(|| h.units.calls().contains(&UnitCall::Start(unit.clone()))).await;

    // The unit start SUM just issued completes and shows up on the
    // journal tail; it should be recognized as an echo and dropped
    // rather than bouncing back into HDM as a hypervisor start.
    h.tailer.push(job_record(&unit, "start", None));
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(!h
        .hypervisor
        .calls()
        .iter()
        .any(|c| matches!(c, HypervisorCall::StartDomain(d) if d == "alpha")));
}

#[tokio::test]
async fn set_initial_state_stops_orphaned_units_on_bootstrap() {
    let hypervisor = Arc::new(FakeHypervisor::new());
    let units = FakeUnitManager::new();
    let orphan_unit = compose_unit_name(PREFIX, "ghost");
    units.set_state(&orphan_unit, UnitActiveState::Active);

    let tailer = Arc::new(FakeTailer::new());
    let (_hypervisor_tx, hypervisor_rx) = mpsc::unbounded_channel();

    let reconciler = Reconciler::bootstrap(
        Arc::clone(&hypervisor),
        hypervisor_rx,
        units.clone(),
        tailer,
        FakeClock::new(),
        config(),
    )
    .await
    .unwrap();

    assert!(units.calls().contains(&UnitCall::Stop(orphan_unit)));
    assert!(reconciler.healthy());
    reconciler.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_the_supervised_loops() {
    let h = start(&[("alpha", DomainStatus::Inactive)]).await;
    assert!(h.reconciler.healthy());
    h.reconciler.shutdown().await;
}

#[tokio::test]
async fn bootstrap_rejects_a_prefix_that_would_break_the_unit_name_codec() {
    let hypervisor = Arc::new(FakeHypervisor::new());
    let units = FakeUnitManager::new();
    let tailer = Arc::new(FakeTailer::new());
    let (_hypervisor_tx, hypervisor_rx) = mpsc::unbounded_channel();

    let mut bad_config = config();
    bad_config.prefix = "libvirt@guest".to_string();

    let err = Reconciler::bootstrap(
        hypervisor,
        hypervisor_rx,
        units,
        tailer,
        FakeClock::new(),
        bad_config,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ReconcileError::Config(_)));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use vg_adapters::{FakeUnitManager, UnitCall};
use vg_core::{compose_unit_name, DomainName, DomainStatus, UnitActiveState};

use super::*;

const PREFIX: &str = "libvirt-guest";

#[tokio::test]
async fn start_starts_an_inactive_unit() {
    let units = FakeUnitManager::new();
    let unit = compose_unit_name(PREFIX, "alpha");
    units.set_state(&unit, UnitActiveState::Inactive);
    let sum = Sum::new(units.clone(), PREFIX);

    sum.start(&DomainName::new("alpha")).await.unwrap();

    assert_eq!(units.calls(), vec![UnitCall::Start(unit)]);
}

#[tokio::test]
async fn start_is_a_noop_for_an_already_active_unit() {
    let units = FakeUnitManager::new();
    let unit = compose_unit_name(PREFIX, "alpha");
    units.set_state(&unit, UnitActiveState::Active);
    let sum = Sum::new(units.clone(), PREFIX);

    sum.start(&DomainName::new("alpha")).await.unwrap();

    assert!(units.calls().is_empty());
}

#[tokio::test]
async fn stop_is_a_noop_for_an_already_inactive_unit() {
    let units = FakeUnitManager::new();
    let unit = compose_unit_name(PREFIX, "alpha");
    units.set_state(&unit, UnitActiveState::Inactive);
    let sum = Sum::new(units.clone(), PREFIX);

    sum.stop(&DomainName::new("alpha")).await.unwrap();

    assert!(units.calls().is_empty());
}

#[tokio::test]
async fn stop_stops_an_active_unit() {
    let units = FakeUnitManager::new();
    let unit = compose_unit_name(PREFIX, "alpha");
    units.set_state(&unit, UnitActiveState::Active);
    let sum = Sum::new(units.clone(), PREFIX);

    sum.stop(&DomainName::new("alpha")).await.unwrap();

    assert_eq!(units.calls(), vec![UnitCall::Stop(unit)]);
}

#[tokio::test]
async fn restart_is_unconditional_even_when_already_active() {
    let units = FakeUnitManager::new();
    let unit = compose_unit_name(PREFIX, "alpha");
    units.set_state(&unit, UnitActiveState::Active);
    let sum = Sum::new(units.clone(), PREFIX);

    sum.restart(&DomainName::new("alpha")).await.unwrap();

    assert_eq!(units.calls(), vec![UnitCall::Restart(unit)]);
}

#[tokio::test]
async fn set_initial_state_starts_and_stops_to_match_desired() {
    let units = FakeUnitManager::new();
    let alpha_unit = compose_unit_name(PREFIX, "alpha");
    let bravo_unit = compose_unit_name(PREFIX, "bravo");
    units.set_state(&alpha_unit, UnitActiveState::Inactive);
    units.set_state(&bravo_unit, UnitActiveState::Active);
    let sum = Sum::new(units.clone(), PREFIX);

    let mut desired = HashMap::new();
    desired.insert(DomainName::new("alpha"), DomainStatus::Active);
    desired.insert(DomainName::new("bravo"), DomainStatus::Inactive);

    sum.set_initial_state(&desired).await.unwrap();

    let calls = units.calls();
    assert!(calls.contains(&UnitCall::Start(alpha_unit)));
    assert!(calls.contains(&UnitCall::Stop(bravo_unit)));
}

#[tokio::test]
async fn set_initial_state_stops_orphaned_units_with_no_matching_domain() {
    let units = FakeUnitManager::new();
    let charlie_unit = compose_unit_name(PREFIX, "charlie");
    units.set_state(&charlie_unit, UnitActiveState::Active);
    let sum = Sum::new(units.clone(), PREFIX);

    // No hypervisor domain named charlie: desired is empty.
    let desired = HashMap::new();
    sum.set_initial_state(&desired).await.unwrap();

    assert!(units.calls().contains(&UnitCall::Stop(charlie_unit)));
}

#[tokio::test]
async fn set_initial_state_leaves_units_with_a_matching_domain_alone() {
    let units = FakeUnitManager::new();
    let alpha_unit = compose_unit_name(PREFIX, "alpha");
    units.set_state(&alpha_unit, UnitActiveState::Active);
    let sum = Sum::new(units.clone(), PREFIX);

    let mut desired = HashMap::new();
    desired.insert(DomainName::new("alpha"), DomainStatus::Active);

    sum.set_initial_state(&desired).await.unwrap();

    assert!(units.calls().is_empty());
}

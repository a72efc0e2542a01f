// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake unit adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{UnitAdapter, UnitError};
use vg_core::UnitActiveState;

/// Recorded unit call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitCall {
    Start(String),
    Stop(String),
    Restart(String),
}

struct FakeState {
    units: HashMap<String, UnitActiveState>,
    calls: Vec<UnitCall>,
    missing: Vec<String>,
}

/// In-memory init-system double.
#[derive(Clone)]
pub struct FakeUnitManager {
    inner: Arc<Mutex<FakeState>>,
}

impl Default for FakeUnitManager {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                units: HashMap::new(),
                calls: Vec::new(),
                missing: Vec::new(),
            })),
        }
    }
}

impl FakeUnitManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, unit: &str, state: UnitActiveState) {
        self.inner.lock().units.insert(unit.to_string(), state);
    }

    /// Make operations against `unit` fail with `NotFound`.
    pub fn remove_unit(&self, unit: &str) {
        let mut inner = self.inner.lock();
        inner.units.remove(unit);
        inner.missing.push(unit.to_string());
    }

    pub fn calls(&self) -> Vec<UnitCall> {
        self.inner.lock().calls.clone()
    }

    pub fn state_of(&self, unit: &str) -> Option<UnitActiveState> {
        self.inner.lock().units.get(unit).copied()
    }
}

#[async_trait]
impl UnitAdapter for FakeUnitManager {
    async fn start_unit(&self, unit: &str) -> Result<(), UnitError> {
        let mut inner = self.inner.lock();
        inner.calls.push(UnitCall::Start(unit.to_string()));
        if inner.missing.contains(&unit.to_string()) {
            return Err(UnitError::NotFound(unit.to_string()));
        }
        inner
            .units
            .insert(unit.to_string(), UnitActiveState::Active);
        Ok(())
    }

    async fn stop_unit(&self, unit: &str) -> Result<(), UnitError> {
        let mut inner = self.inner.lock();
        inner.calls.push(UnitCall::Stop(unit.to_string()));
        if inner.missing.contains(&unit.to_string()) {
            return Err(UnitError::NotFound(unit.to_string()));
        }
        inner
            .units
            .insert(unit.to_string(), UnitActiveState::Inactive);
        Ok(())
    }

    async fn restart_unit(&self, unit: &str) -> Result<(), UnitError> {
        let mut inner = self.inner.lock();
        inner.calls.push(UnitCall::Restart(unit.to_string()));
        if inner.missing.contains(&unit.to_string()) {
            return Err(UnitError::NotFound(unit.to_string()));
        }
        inner
            .units
            .insert(unit.to_string(), UnitActiveState::Active);
        Ok(())
    }

    async fn active_state(&self, unit: &str) -> Result<Option<UnitActiveState>, UnitError> {
        let inner = self.inner.lock();
        if inner.missing.contains(&unit.to_string()) {
            return Ok(None);
        }
        Ok(inner.units.get(unit).copied())
    }

    async fn list_template_units(&self, prefix: &str) -> Result<Vec<String>, UnitError> {
        let inner = self.inner.lock();
        let wanted = format!("{prefix}@");
        Ok(inner
            .units
            .keys()
            .filter(|name| name.starts_with(&wanted) && name.ends_with(".service"))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake hypervisor adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{HypervisorAdapter, HypervisorError};
use vg_core::{DomainName, DomainStatus};

/// Recorded hypervisor call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HypervisorCall {
    ListDomains,
    DomainStatus(String),
    StartDomain(String),
    ShutdownDomain(String),
}

struct FakeState {
    domains: HashMap<String, DomainStatus>,
    calls: Vec<HypervisorCall>,
    alive: bool,
    event_loop_alive: bool,
    missing: Vec<String>,
}

/// In-memory hypervisor double. Tests seed domain state with
/// [`FakeHypervisor::set_status`] and drive start/shutdown through the
/// trait the same way the reconciler does.
#[derive(Clone)]
pub struct FakeHypervisor {
    inner: Arc<Mutex<FakeState>>,
}

impl Default for FakeHypervisor {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                domains: HashMap::new(),
                calls: Vec::new(),
                alive: true,
                event_loop_alive: true,
                missing: Vec::new(),
            })),
        }
    }
}

impl FakeHypervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, domain: &str, status: DomainStatus) {
        self.inner
            .lock()
            .domains
            .insert(domain.to_string(), status);
    }

    pub fn set_alive(&self, alive: bool) {
        self.inner.lock().alive = alive;
    }

    /// Simulate the event-loop thread going stale/panicking without
    /// taking down the connection itself.
    pub fn set_event_loop_alive(&self, alive: bool) {
        self.inner.lock().event_loop_alive = alive;
    }

    /// Make `domain_status` (and lookups made by start/shutdown) fail
    /// with `NotFound` for `domain`, to exercise the missing-domain path.
    pub fn remove_domain(&self, domain: &str) {
        let mut inner = self.inner.lock();
        inner.domains.remove(domain);
        inner.missing.push(domain.to_string());
    }

    pub fn calls(&self) -> Vec<HypervisorCall> {
        self.inner.lock().calls.clone()
    }

    pub fn status_of(&self, domain: &str) -> Option<DomainStatus> {
        self.inner.lock().domains.get(domain).copied()
    }
}

#[async_trait]
impl HypervisorAdapter for FakeHypervisor {
    async fn list_domains(&self) -> Result<Vec<DomainName>, HypervisorError> {
        let mut inner = self.inner.lock();
        inner.calls.push(HypervisorCall::ListDomains);
        Ok(inner.domains.keys().cloned().map(DomainName::new).collect())
    }

    async fn domain_status(&self, domain: &DomainName) -> Result<DomainStatus, HypervisorError> {
        let mut inner = self.inner.lock();
        let key = domain.to_string();
        inner.calls.push(HypervisorCall::DomainStatus(key.clone()));
        if inner.missing.contains(&key) {
            return Err(HypervisorError::NotFound(key));
        }
        Ok(inner
            .domains
            .get(&key)
            .copied()
            .unwrap_or(DomainStatus::Inactive))
    }

    async fn start_domain(&self, domain: &DomainName) -> Result<(), HypervisorError> {
        let mut inner = self.inner.lock();
        let key = domain.to_string();
        inner.calls.push(HypervisorCall::StartDomain(key.clone()));
        if inner.missing.contains(&key) {
            return Err(HypervisorError::NotFound(key));
        }
        inner.domains.insert(key, DomainStatus::Active);
        Ok(())
    }

    async fn shutdown_domain(&self, domain: &DomainName) -> Result<(), HypervisorError> {
        let mut inner = self.inner.lock();
        let key = domain.to_string();
        inner
            .calls
            .push(HypervisorCall::ShutdownDomain(key.clone()));
        if inner.missing.contains(&key) {
            return Err(HypervisorError::NotFound(key));
        }
        inner.domains.insert(key, DomainStatus::Inactive);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.inner.lock().alive
    }

    fn event_loop_alive(&self) -> bool {
        self.inner.lock().event_loop_alive
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;

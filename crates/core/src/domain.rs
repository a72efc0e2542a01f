// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain identity and the active/inactive status projection.

use std::fmt;

/// Opaque hypervisor-chosen domain identifier (e.g. `alpha`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainName(String);

impl DomainName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DomainName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DomainName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// The two-valued projection of libvirt's richer domain state.
///
/// Collapses `VIR_DOMAIN_RUNNING` to `Active`; everything else
/// (`BLOCKED`, `PAUSED`, `SHUTDOWN`, `SHUTOFF`, `CRASHED`,
/// `PMSUSPENDED`, `NOSTATE`) to `Inactive`. This is the "is-active"
/// discriminator the reconciler cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainStatus {
    Active,
    Inactive,
}

impl DomainStatus {
    pub fn is_active(self) -> bool {
        matches!(self, DomainStatus::Active)
    }

    /// Collapse a raw libvirt `virDomainState` value (as exposed by the
    /// `virt` crate's `sys` module) onto the two-valued view.
    pub fn from_libvirt_state(state: u32) -> Self {
        // VIR_DOMAIN_RUNNING = 1 in libvirt's virDomainState enum.
        const VIR_DOMAIN_RUNNING: u32 = 1;
        if state == VIR_DOMAIN_RUNNING {
            DomainStatus::Active
        } else {
            DomainStatus::Inactive
        }
    }
}

/// The vocabulary shared between HDM's action queue and SUM's dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Restart,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
#[path = "domain_tests.rs"]
mod tests;

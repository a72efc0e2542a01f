// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hypervisor adapter: the only layer that talks to libvirt.

mod libvirt;

pub use libvirt::LibvirtAdapter;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeHypervisor, HypervisorCall};

use async_trait::async_trait;
use thiserror::Error;
use vg_core::{DomainName, DomainStatus};

/// Errors from hypervisor operations.
#[derive(Debug, Error)]
pub enum HypervisorError {
    #[error("failed to connect to hypervisor at {uri}: {message}")]
    ConnectionFailed { uri: String, message: String },
    #[error("domain not found: {0}")]
    NotFound(String),
    #[error("failed to create/start domain: {0}")]
    StartFailed(String),
    #[error("failed to shut down domain: {0}")]
    ShutdownFailed(String),
    #[error("failed to query domain state: {0}")]
    QueryFailed(String),
}

/// Lifecycle codes the hypervisor reports. Only `Started`/`Stopped` fan
/// out to the init system; everything else just updates the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCode {
    Started,
    Stopped,
    Other,
}

/// Events delivered from the hypervisor's event loop into the async
/// world, one per registered callback kind.
#[derive(Debug, Clone)]
pub enum HypervisorEvent {
    Lifecycle {
        domain: DomainName,
        code: LifecycleCode,
    },
    Reboot {
        domain: DomainName,
    },
}

/// The only component that talks to the hypervisor.
///
/// Event delivery (lifecycle/reboot callbacks) is not part of this
/// trait — it is wired up once at construction time, since it is tied
/// to how the concrete backend registers callbacks on its connection.
/// Implementations hand back a receiver from their constructor.
#[async_trait]
pub trait HypervisorAdapter: Send + Sync + 'static {
    /// Enumerate every domain the hypervisor knows about, including
    /// inactive ones.
    async fn list_domains(&self) -> Result<Vec<DomainName>, HypervisorError>;

    /// Query a single domain's collapsed active/inactive status.
    async fn domain_status(&self, domain: &DomainName) -> Result<DomainStatus, HypervisorError>;

    /// Issue a create/boot command. Does not wait for the domain to
    /// reach `active` — the caller polls via `domain_status`.
    async fn start_domain(&self, domain: &DomainName) -> Result<(), HypervisorError>;

    /// Issue a graceful (ACPI) shutdown request. May be called again on
    /// a later poll tick if the guest was not ready to accept it.
    async fn shutdown_domain(&self, domain: &DomainName) -> Result<(), HypervisorError>;

    /// Whether the hypervisor connection is still alive.
    fn is_alive(&self) -> bool;

    /// Whether the backend's event-loop thread is still servicing
    /// callbacks. Backends with no real event loop of their own (test
    /// doubles) report alive unconditionally; a real backend tracks
    /// this via a heartbeat rather than thread liveness, since a thread
    /// blocked forever in the event loop is still "alive" by
    /// `JoinHandle::is_finished()` even if it stopped servicing events.
    fn event_loop_alive(&self) -> bool {
        true
    }
}

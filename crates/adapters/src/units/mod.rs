// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service unit adapter: the only layer that talks to the init system.

mod systemd;

pub use systemd::SystemdAdapter;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeUnitManager, UnitCall};

use async_trait::async_trait;
use thiserror::Error;
use vg_core::UnitActiveState;

/// Errors from service-unit operations.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("failed to connect to the init system bus: {0}")]
    ConnectionFailed(String),
    #[error("unit not found: {0}")]
    NotFound(String),
    #[error("failed to start unit {unit}: {message}")]
    StartFailed { unit: String, message: String },
    #[error("failed to stop unit {unit}: {message}")]
    StopFailed { unit: String, message: String },
    #[error("failed to restart unit {unit}: {message}")]
    RestartFailed { unit: String, message: String },
    #[error("failed to query unit {unit}: {message}")]
    QueryFailed { unit: String, message: String },
}

/// The only component that talks to the init system's service manager.
///
/// Callers pass fully composed unit names (`libvirt-guest@<escaped>.service`);
/// this trait has no opinion on naming, that is `vg_core::unit`'s job.
#[async_trait]
pub trait UnitAdapter: Send + Sync + 'static {
    /// Start `unit` in `"fail"` mode (do not pull in or displace other
    /// jobs; fail outright rather than queue behind a conflicting job).
    async fn start_unit(&self, unit: &str) -> Result<(), UnitError>;

    /// Stop `unit` in `"fail"` mode.
    async fn stop_unit(&self, unit: &str) -> Result<(), UnitError>;

    /// Restart `unit` in `"fail"` mode. Starts it if not already running.
    async fn restart_unit(&self, unit: &str) -> Result<(), UnitError>;

    /// Current `ActiveState` of `unit`, or `Ok(None)` if systemd has no
    /// record of ever loading it.
    async fn active_state(&self, unit: &str) -> Result<Option<UnitActiveState>, UnitError>;

    /// Every unit matching `libvirt-guest@*.service`, for bootstrap
    /// reconciliation of units with no corresponding domain.
    async fn list_template_units(&self, prefix: &str) -> Result<Vec<String>, UnitError>;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors that can keep the daemon from starting or running.

use thiserror::Error;

use vg_adapters::{HypervisorError, UnitError};
use vg_engine::ReconcileError;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine a log directory")]
    NoLogDir,

    #[error("failed to connect to hypervisor: {0}")]
    Hypervisor(#[from] HypervisorError),

    #[error("failed to connect to the init system bus: {0}")]
    Unit(#[from] UnitError),

    #[error("reconciler bootstrap failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

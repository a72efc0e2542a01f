// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the reconciliation engine

use thiserror::Error;
use vg_adapters::{HypervisorError, TailError, UnitError};
use vg_core::{Action, CoreError};

/// Errors that can occur while reconciling domain/unit state
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("hypervisor error: {0}")]
    Hypervisor(#[from] HypervisorError),
    #[error("unit error: {0}")]
    Unit(#[from] UnitError),
    #[error("job tail error: {0}")]
    Tail(#[from] TailError),
    #[error("timed out waiting for {domain} to reach the target state after {action}")]
    ActionTimeout { domain: String, action: Action },
    #[error("invalid reconciler configuration: {0}")]
    Config(#[from] CoreError),
    #[error("failed to bootstrap reconciler: {0}")]
    Bootstrap(String),
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors shared at the core boundary.

use thiserror::Error;

/// Errors that have no business propagating past pure domain-type code.
/// Kept small on purpose — most failure belongs to the adapter/engine
/// crates that actually talk to libvirt and systemd.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid template prefix {0:?}: must be non-empty and must not contain '@' or '.'")]
    InvalidPrefix(String),
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The bidirectional reconciliation engine: RLAL-backed echo
//! suppression wired between the Hypervisor Domain Manager, the
//! Service Unit Manager, and the Job-Event Tailer.

mod error;
mod hdm;
mod jet;
mod reconciler;
mod sum;

pub use error::ReconcileError;
pub use hdm::{Hdm, HdmTiming};
pub use jet::{Jet, DEFAULT_RESTART_DELAY_SEC};
pub use reconciler::{Reconciler, ReconcilerConfig};
pub use sum::Sum;

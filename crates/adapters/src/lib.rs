// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the two external control planes: the hypervisor and
//! the init system's service bus, plus the job-log tail.

pub mod hypervisor;
pub mod tailer;
pub mod units;

pub use hypervisor::{HypervisorAdapter, HypervisorError, HypervisorEvent, LibvirtAdapter};
pub use tailer::{JobTailer, JournalTailer, RawJobRecord, RecordStream, TailError};
pub use units::{SystemdAdapter, UnitAdapter, UnitError};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use hypervisor::{FakeHypervisor, HypervisorCall};
#[cfg(any(test, feature = "test-support"))]
pub use tailer::FakeTailer;
#[cfg(any(test, feature = "test-support"))]
pub use units::{FakeUnitManager, UnitCall};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access, mirroring the reference
//! daemon's `env.rs` knob-reading pattern.

use std::path::PathBuf;
use std::time::Duration;

use vg_engine::{HdmTiming, ReconcilerConfig};

const DEFAULT_UNIT_PREFIX: &str = "libvirt-guest";
const DEFAULT_LOG_PATH: &str = "/var/log/libvirt-guest-syncd/daemon.log";

/// Process-wide configuration, all of it read once at startup from the
/// environment. There is no persisted state beyond the log file.
#[derive(Debug, Clone)]
pub struct Config {
    /// `LIBVIRT_DEFAULT_URI` passed straight to `virConnectOpen`; `None`
    /// lets libvirt pick its own default (`qemu:///system`, usually).
    pub libvirt_uri: Option<String>,
    pub log_path: PathBuf,
    pub reconciler: ReconcilerConfig,
}

impl Config {
    pub fn load() -> Self {
        Self {
            libvirt_uri: std::env::var("LIBVIRT_DEFAULT_URI").ok(),
            log_path: log_path(),
            reconciler: ReconcilerConfig {
                prefix: unit_prefix(),
                hdm_timing: HdmTiming {
                    check_delay: check_delay(),
                    action_timeout: action_timeout(),
                    rlal_threshold: rlal_threshold(),
                    rlal_max_length: rlal_max_length(),
                },
                jet_restart_delay: journal_restart_delay(),
                jet_rlal_threshold: rlal_threshold(),
                jet_rlal_max_length: rlal_max_length(),
            },
        }
    }
}

fn unit_prefix() -> String {
    std::env::var("VG_UNIT_PREFIX").unwrap_or_else(|_| DEFAULT_UNIT_PREFIX.to_string())
}

fn log_path() -> PathBuf {
    std::env::var("VG_LOG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_PATH))
}

fn check_delay() -> Duration {
    env_secs("VG_CHECK_DELAY_MS")
        .map(Duration::from_millis)
        .unwrap_or_else(|| HdmTiming::default().check_delay)
}

fn action_timeout() -> Duration {
    env_secs("VG_ACTION_TIMEOUT_SEC")
        .map(Duration::from_secs)
        .unwrap_or_else(|| HdmTiming::default().action_timeout)
}

fn rlal_threshold() -> Duration {
    env_secs("VG_RLAL_THRESHOLD_SEC")
        .map(Duration::from_secs)
        .unwrap_or_else(|| HdmTiming::default().rlal_threshold)
}

fn rlal_max_length() -> Duration {
    env_secs("VG_RLAL_MAX_LENGTH_SEC")
        .map(Duration::from_secs)
        .unwrap_or_else(|| HdmTiming::default().rlal_max_length)
}

fn journal_restart_delay() -> Duration {
    env_secs("VG_JOURNAL_RESTART_DELAY_SEC")
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(vg_engine::DEFAULT_RESTART_DELAY_SEC))
}

fn env_secs(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

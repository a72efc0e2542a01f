// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unit active-state and the template-unit-name codec.
//!
//! systemd escapes bytes it reserves for unit-name syntax (`/`, `-`,
//! `.`, `@`, and anything outside `[A-Za-z0-9:_.\\]`) as `_XX`, the
//! two-hex-digit byte value, so `libvirt-guest@three.service` composes
//! from domain `three` under prefix `libvirt-guest` and would read back
//! (pre-unescape) as `libvirt_2dguest_40three_2eservice`.

use std::fmt;

use crate::error::CoreError;

/// Unit active-state as reported by the bus. Only `Active`/`Inactive`
/// drive reconciliation directly; `Activating`/`Deactivating` are
/// transient values the reconciler observes but never acts on — only
/// terminal job completions (via JET) trigger a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitActiveState {
    Active,
    Inactive,
    Activating,
    Deactivating,
}

impl UnitActiveState {
    pub fn is_active(self) -> bool {
        matches!(self, UnitActiveState::Active)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "inactive" | "failed" => Some(Self::Inactive),
            "activating" => Some(Self::Activating),
            "deactivating" => Some(Self::Deactivating),
            _ => None,
        }
    }
}

impl fmt::Display for UnitActiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitActiveState::Active => "active",
            UnitActiveState::Inactive => "inactive",
            UnitActiveState::Activating => "activating",
            UnitActiveState::Deactivating => "deactivating",
        };
        f.write_str(s)
    }
}

/// A byte survives unescaped in a systemd unit instance/template name.
/// Everything else — including the `-`, `@`, `.` that are structural
/// separators in a composed unit name — becomes `_XX`.
fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Escape a domain name for embedding as a unit instance, mirroring
/// systemd's `_`-hex encoding.
pub fn escape(domain: &str) -> String {
    let mut out = String::with_capacity(domain.len());
    for &b in domain.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("_{:02x}", b));
        }
    }
    out
}

/// Reverse of [`escape`]. Malformed `_XX` sequences are passed through
/// verbatim rather than rejected — unit names read back off the bus are
/// assumed well-formed since we composed them ourselves.
pub fn unescape(escaped: &str) -> String {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Compose the template unit name `<prefix>@<escape(domain)>.service`.
pub fn compose_unit_name(prefix: &str, domain: &str) -> String {
    format!("{prefix}@{}.service", escape(domain))
}

/// Reject a template prefix that would break `compose_unit_name`'s and
/// `parse_unit_name`'s assumption that `@` and the final `.` are the
/// only structural separators in a composed unit name: the prefix
/// itself is never escaped, so a prefix containing either byte would
/// make `parse_unit_name` split at the wrong position. Called once at
/// startup against whatever `VG_UNIT_PREFIX` resolves to.
pub fn validate_prefix(prefix: &str) -> Result<(), CoreError> {
    if prefix.is_empty() || prefix.contains('@') || prefix.contains('.') {
        return Err(CoreError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

/// Parse an arbitrary unit name into `(prefix, domain, suffix)`.
///
/// Splits off the suffix after the final `.`; if the stem contains `@`,
/// splits on the last `@` into `(prefix, instance)` and unescapes the
/// instance. Returns `None` for unit names with no `@` (templates with
/// no instance, or non-template units).
pub fn parse_unit_name(unit: &str) -> Option<(String, String, String)> {
    let (stem, suffix) = unit.rsplit_once('.')?;
    let (prefix, instance) = stem.rsplit_once('@')?;
    Some((prefix.to_string(), unescape(instance), suffix.to_string()))
}

#[cfg(test)]
#[path = "unit_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service Unit Manager: the only component that talks to the init
//! system's service bus on the reconciler's behalf.

use std::collections::HashMap;

use tracing::{debug, warn};

use vg_adapters::UnitAdapter;
use vg_core::{compose_unit_name, parse_unit_name, DomainName, DomainStatus};

use crate::error::ReconcileError;

/// The Service Unit Manager. Stateless beyond the bus handle and the
/// template prefix it composes unit names under.
pub struct Sum<U: UnitAdapter> {
    units: U,
    prefix: String,
}

impl<U: UnitAdapter> Sum<U> {
    pub fn new(units: U, prefix: impl Into<String>) -> Self {
        Self {
            units,
            prefix: prefix.into(),
        }
    }

    fn unit_for(&self, domain: &DomainName) -> String {
        compose_unit_name(&self.prefix, domain.as_ref())
    }

    /// Start the unit for `domain` unless it is already active.
    pub async fn start(&self, domain: &DomainName) -> Result<(), ReconcileError> {
        let unit = self.unit_for(domain);
        if self.is_active(&unit).await? {
            return Ok(());
        }
        self.units.start_unit(&unit).await?;
        Ok(())
    }

    /// Stop the unit for `domain` unless it is already inactive.
    pub async fn stop(&self, domain: &DomainName) -> Result<(), ReconcileError> {
        let unit = self.unit_for(domain);
        if !self.is_active(&unit).await? {
            return Ok(());
        }
        self.units.stop_unit(&unit).await?;
        Ok(())
    }

    /// Unconditionally restart the unit for `domain`.
    pub async fn restart(&self, domain: &DomainName) -> Result<(), ReconcileError> {
        let unit = self.unit_for(domain);
        self.units.restart_unit(&unit).await?;
        Ok(())
    }

    /// Reconcile every template unit to `desired`: start/stop each
    /// domain's unit to match, then stop any template unit whose domain
    /// is absent from `desired` (no corresponding hypervisor domain).
    pub async fn set_initial_state(
        &self,
        desired: &HashMap<DomainName, DomainStatus>,
    ) -> Result<(), ReconcileError> {
        for (domain, status) in desired {
            match status {
                DomainStatus::Active => self.start(domain).await?,
                DomainStatus::Inactive => self.stop(domain).await?,
            }
        }

        let existing = self.units.list_template_units(&self.prefix).await?;
        for unit in existing {
            let Some((_, instance, _)) = parse_unit_name(&unit) else {
                continue;
            };
            let domain = DomainName::new(instance);
            if !desired.contains_key(&domain) {
                debug!(%domain, %unit, "stopping orphaned template unit");
                if let Err(err) = self.units.stop_unit(&unit).await {
                    warn!(%unit, error = %err, "failed to stop orphaned template unit");
                }
            }
        }

        Ok(())
    }

    async fn is_active(&self, unit: &str) -> Result<bool, ReconcileError> {
        Ok(self
            .units
            .active_state(unit)
            .await?
            .map(|state| state.is_active())
            .unwrap_or(false))
    }
}

#[cfg(test)]
#[path = "sum_tests.rs"]
mod tests;

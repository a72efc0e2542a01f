// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! systemd-backed unit adapter, talking to `org.freedesktop.systemd1`
//! over the system D-Bus.

use async_trait::async_trait;
use zbus::zvariant::OwnedObjectPath;
use zbus::{proxy, Connection};

use super::{UnitAdapter, UnitError};
use vg_core::UnitActiveState;

const JOB_MODE: &str = "fail";

#[proxy(
    interface = "org.freedesktop.systemd1.Manager",
    default_service = "org.freedesktop.systemd1",
    default_path = "/org/freedesktop/systemd1",
    gen_blocking = false
)]
trait Manager {
    fn start_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
    fn stop_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
    fn restart_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
    fn get_unit(&self, name: &str) -> zbus::Result<OwnedObjectPath>;
}

#[proxy(
    interface = "org.freedesktop.systemd1.Unit",
    default_service = "org.freedesktop.systemd1",
    gen_blocking = false
)]
trait Unit {
    #[zbus(property)]
    fn active_state(&self) -> zbus::Result<String>;
}

/// One tuple entry from `Manager.ListUnits`: name, description, load
/// state, active state, sub state, follow unit, object path, job id,
/// job type, job object path.
type ListUnitsEntry = (
    String,
    String,
    String,
    String,
    String,
    String,
    OwnedObjectPath,
    u32,
    String,
    OwnedObjectPath,
);

/// systemd Manager bus connection plus the proxy built on it.
pub struct SystemdAdapter {
    connection: Connection,
}

impl SystemdAdapter {
    /// Connect to the system bus.
    pub async fn connect() -> Result<Self, UnitError> {
        let connection = Connection::system()
            .await
            .map_err(|e| UnitError::ConnectionFailed(e.to_string()))?;
        Ok(Self { connection })
    }

    async fn manager(&self) -> Result<ManagerProxy<'_>, UnitError> {
        ManagerProxy::new(&self.connection)
            .await
            .map_err(|e| UnitError::ConnectionFailed(e.to_string()))
    }
}

#[async_trait]
impl UnitAdapter for SystemdAdapter {
    async fn start_unit(&self, unit: &str) -> Result<(), UnitError> {
        let manager = self.manager().await?;
        manager
            .start_unit(unit, JOB_MODE)
            .await
            .map_err(|e| UnitError::StartFailed {
                unit: unit.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn stop_unit(&self, unit: &str) -> Result<(), UnitError> {
        let manager = self.manager().await?;
        manager
            .stop_unit(unit, JOB_MODE)
            .await
            .map_err(|e| UnitError::StopFailed {
                unit: unit.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn restart_unit(&self, unit: &str) -> Result<(), UnitError> {
        let manager = self.manager().await?;
        manager
            .restart_unit(unit, JOB_MODE)
            .await
            .map_err(|e| UnitError::RestartFailed {
                unit: unit.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn active_state(&self, unit: &str) -> Result<Option<UnitActiveState>, UnitError> {
        let manager = self.manager().await?;
        let path = match manager.get_unit(unit).await {
            Ok(path) => path,
            // systemd returns NoSuchUnit for units it has never loaded.
            Err(_) => return Ok(None),
        };

        let unit_proxy = UnitProxy::builder(&self.connection)
            .path(path)
            .map_err(|e| UnitError::QueryFailed {
                unit: unit.to_string(),
                message: e.to_string(),
            })?
            .build()
            .await
            .map_err(|e| UnitError::QueryFailed {
                unit: unit.to_string(),
                message: e.to_string(),
            })?;

        let state = unit_proxy
            .active_state()
            .await
            .map_err(|e| UnitError::QueryFailed {
                unit: unit.to_string(),
                message: e.to_string(),
            })?;

        Ok(UnitActiveState::parse(&state))
    }

    async fn list_template_units(&self, prefix: &str) -> Result<Vec<String>, UnitError> {
        let manager = self.manager().await?;
        let units: Vec<ListUnitsEntry> =
            manager
                .call_method("ListUnits", &())
                .await
                .and_then(|reply| reply.body().deserialize())
                .map_err(|e| UnitError::QueryFailed {
                    unit: prefix.to_string(),
                    message: e.to_string(),
                })?;

        let wanted = format!("{prefix}@");
        Ok(units
            .into_iter()
            .map(|(name, ..)| name)
            .filter(|name| name.starts_with(&wanted) && name.ends_with(".service"))
            .collect())
    }
}

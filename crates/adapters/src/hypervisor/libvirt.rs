// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Libvirt-backed hypervisor adapter.
//!
//! libvirt's event loop (`virEventRunDefaultImpl`) is a blocking C loop
//! with no async entry point, so it runs on one dedicated OS thread.
//! Lifecycle and reboot callbacks registered against it fire on that
//! same thread; they hop into the async world over an unbounded
//! channel, matching the reference daemon's own pattern of bridging a
//! blocking producer into a `tokio::sync::mpsc` receiver (see
//! `EventBus`/`EventReader` in the daemon crate this was derived from).

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use virt::connect::Connect;
use virt::domain::Domain;
use virt::sys;

use super::{HypervisorAdapter, HypervisorError, HypervisorEvent, LifecycleCode};
use vg_core::{DomainName, DomainStatus};

/// How stale the event-loop heartbeat may get before `event_loop_alive`
/// reports the thread dead. Generously above a single
/// `virEventRunDefaultImpl` iteration, which normally returns well
/// under a second even with no pending callbacks.
const EVENT_LOOP_HEARTBEAT_STALE: Duration = Duration::from_secs(30);

/// Libvirt/QEMU hypervisor backend.
pub struct LibvirtAdapter {
    connection: Arc<Mutex<Connect>>,
    heartbeat: watch::Receiver<Instant>,
}

impl LibvirtAdapter {
    /// Open a connection to `uri` (falling back to the system default
    /// when `None`, matching `LIBVIRT_DEFAULT_URI`'s own fallback rule),
    /// register the default event implementation, start its event loop
    /// on a dedicated thread, and register lifecycle/reboot callbacks
    /// against every domain.
    ///
    /// Returns the adapter and the receiving half of the event channel;
    /// the caller (the reconciler) owns forwarding those events.
    pub fn connect(
        uri: Option<&str>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<HypervisorEvent>), HypervisorError> {
        virt::event::register_default_impl().map_err(|e| HypervisorError::ConnectionFailed {
            uri: uri.unwrap_or("default").to_string(),
            message: e.to_string(),
        })?;

        let connection = Connect::open(uri).map_err(|e| HypervisorError::ConnectionFailed {
            uri: uri.unwrap_or("default").to_string(),
            message: e.to_string(),
        })?;

        let (tx, rx) = mpsc::unbounded_channel();

        register_callbacks(&connection, tx);

        let (heartbeat_tx, heartbeat_rx) = watch::channel(Instant::now());

        // Event loop thread: services virEventRunDefaultImpl forever,
        // which is what actually invokes the callbacks registered above.
        // The `JoinHandle` is intentionally not kept: this loop blocks
        // inside libvirt's own poll and is not reliably joinable, so
        // liveness is observed through the heartbeat instead of
        // `JoinHandle::is_finished()`.
        thread::Builder::new()
            .name("libvirt-event-loop".into())
            .spawn(move || loop {
                if let Err(e) = virt::event::run_default_impl() {
                    error!(error = %e, "libvirt event loop iteration failed");
                }
                let _ = heartbeat_tx.send(Instant::now());
            })
            .map_err(|e| HypervisorError::ConnectionFailed {
                uri: uri.unwrap_or("default").to_string(),
                message: e.to_string(),
            })?;

        info!("connected to libvirt");

        Ok((
            Self {
                connection: Arc::new(Mutex::new(connection)),
                heartbeat: heartbeat_rx,
            },
            rx,
        ))
    }

    fn lookup(&self, domain: &DomainName) -> Result<Domain, HypervisorError> {
        let connection = self.connection.lock();
        Domain::lookup_by_name(&connection, domain.as_ref())
            .map_err(|e| HypervisorError::NotFound(format!("{domain}: {e}")))
    }
}

fn register_callbacks(connection: &Connect, tx: mpsc::UnboundedSender<HypervisorEvent>) {
    let lifecycle_tx = tx.clone();
    let lifecycle_result = connection.domain_event_register_any(
        None,
        sys::VIR_DOMAIN_EVENT_ID_LIFECYCLE,
        Box::new(move |_conn, domain, event, _detail| {
            let name = domain.get_name().unwrap_or_default();
            let code = match event {
                sys::VIR_DOMAIN_EVENT_STARTED => LifecycleCode::Started,
                sys::VIR_DOMAIN_EVENT_STOPPED => LifecycleCode::Stopped,
                _ => LifecycleCode::Other,
            };
            let _ = lifecycle_tx.send(HypervisorEvent::Lifecycle {
                domain: DomainName::new(name),
                code,
            });
        }),
    );
    if let Err(e) = lifecycle_result {
        warn!(error = %e, "failed to register lifecycle event callback");
    }

    let reboot_tx = tx;
    let reboot_result = connection.domain_event_register_any(
        None,
        sys::VIR_DOMAIN_EVENT_ID_REBOOT,
        Box::new(move |_conn, domain, ()| {
            let name = domain.get_name().unwrap_or_default();
            debug!(domain = %name, "reboot event");
            let _ = reboot_tx.send(HypervisorEvent::Reboot {
                domain: DomainName::new(name),
            });
        }),
    );
    if let Err(e) = reboot_result {
        warn!(error = %e, "failed to register reboot event callback");
    }
}

#[async_trait]
impl HypervisorAdapter for LibvirtAdapter {
    async fn list_domains(&self) -> Result<Vec<DomainName>, HypervisorError> {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let connection = connection.lock();
            let domains = connection
                .list_all_domains(0)
                .map_err(|e| HypervisorError::QueryFailed(e.to_string()))?;
            Ok(domains
                .iter()
                .filter_map(|d| d.get_name().ok())
                .map(DomainName::new)
                .collect())
        })
        .await
        .map_err(|e| HypervisorError::QueryFailed(e.to_string()))?
    }

    async fn domain_status(&self, domain: &DomainName) -> Result<DomainStatus, HypervisorError> {
        let dom = self.lookup(domain)?;
        tokio::task::spawn_blocking(move || {
            let (state, _reason) = dom
                .get_state()
                .map_err(|e| HypervisorError::QueryFailed(e.to_string()))?;
            Ok(DomainStatus::from_libvirt_state(state))
        })
        .await
        .map_err(|e| HypervisorError::QueryFailed(e.to_string()))?
    }

    async fn start_domain(&self, domain: &DomainName) -> Result<(), HypervisorError> {
        let dom = self.lookup(domain)?;
        let name = domain.to_string();
        tokio::task::spawn_blocking(move || {
            dom.create()
                .map_err(|e| HypervisorError::StartFailed(format!("{name}: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| HypervisorError::StartFailed(e.to_string()))?
    }

    async fn shutdown_domain(&self, domain: &DomainName) -> Result<(), HypervisorError> {
        let dom = self.lookup(domain)?;
        let name = domain.to_string();
        tokio::task::spawn_blocking(move || {
            dom.shutdown()
                .map_err(|e| HypervisorError::ShutdownFailed(format!("{name}: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| HypervisorError::ShutdownFailed(e.to_string()))?
    }

    fn is_alive(&self) -> bool {
        self.connection.lock().is_alive().unwrap_or(false)
    }

    fn event_loop_alive(&self) -> bool {
        self.heartbeat.borrow().elapsed() < EVENT_LOOP_HEARTBEAT_STALE
    }
}

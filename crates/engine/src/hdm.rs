// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hypervisor Domain Manager: the only component that talks to the
//! hypervisor on the reconciler's behalf.
//!
//! Owns the domain-status cache, the action queue, and an internal RLAL
//! used to drop JET-sourced actions that would just echo an action HDM
//! itself is already in the middle of executing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use vg_adapters::HypervisorAdapter;
use vg_core::{Action, Clock, DomainName, DomainStatus, Rlal};

use crate::error::ReconcileError;

/// Up to 5 concurrent per-domain waits, matching the source worker pool
/// size.
const WORKER_PERMITS: usize = 5;

/// Tunable timing knobs, overridable from `vg-daemon`'s config for
/// tests and for operators who need looser polling.
#[derive(Debug, Clone, Copy)]
pub struct HdmTiming {
    pub check_delay: Duration,
    pub action_timeout: Duration,
    pub rlal_threshold: Duration,
    pub rlal_max_length: Duration,
}

impl Default for HdmTiming {
    fn default() -> Self {
        Self {
            check_delay: Duration::from_secs(1),
            action_timeout: Duration::from_secs(120),
            rlal_threshold: Duration::from_secs(vg_core::rlal::DEFAULT_THRESHOLD_SEC),
            rlal_max_length: Duration::from_secs(vg_core::rlal::DEFAULT_MAX_LENGTH_SEC),
        }
    }
}

type Cache = Arc<Mutex<HashMap<DomainName, DomainStatus>>>;

/// The Hypervisor Domain Manager.
pub struct Hdm<H: HypervisorAdapter> {
    hypervisor: Arc<H>,
    cache: Cache,
    queue_tx: mpsc::UnboundedSender<(Action, DomainName)>,
    dispatcher: JoinHandle<()>,
    timing: HdmTiming,
}

impl<H: HypervisorAdapter> Hdm<H> {
    /// Construct the manager: reload the full domain view from the
    /// hypervisor, then spawn the action dispatcher.
    pub async fn new<C: Clock>(
        hypervisor: Arc<H>,
        clock: C,
        timing: HdmTiming,
    ) -> Result<Self, ReconcileError> {
        let cache: Cache = Arc::new(Mutex::new(HashMap::new()));
        reload_state(&hypervisor, &cache).await?;

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let rlal = Arc::new(Rlal::new(
            clock,
            timing.rlal_threshold,
            timing.rlal_max_length,
        ));
        let semaphore = Arc::new(Semaphore::new(WORKER_PERMITS));

        let dispatcher = tokio::spawn(run_dispatcher(
            queue_rx,
            Arc::clone(&hypervisor),
            Arc::clone(&cache),
            rlal,
            semaphore,
            timing,
        ));

        Ok(Self {
            hypervisor,
            cache,
            queue_tx,
            dispatcher,
            timing,
        })
    }

    /// Read-only snapshot of the domain→status map.
    pub fn state(&self) -> HashMap<DomainName, DomainStatus> {
        self.cache.lock().clone()
    }

    /// Clear and refill the cache from a fresh hypervisor enumeration.
    pub async fn reload_state(&self) -> Result<(), ReconcileError> {
        reload_state(&self.hypervisor, &self.cache).await
    }

    /// Re-query a single domain's status and update the cache. Used by
    /// the reconciler's lifecycle callback handler, which observes a
    /// transition the hypervisor itself drove rather than one HDM's own
    /// dispatcher executed.
    pub async fn refresh(&self, domain: &DomainName) -> Result<DomainStatus, ReconcileError> {
        refresh(&*self.hypervisor, &self.cache, domain).await
    }

    /// Enqueue a start action. Non-blocking.
    pub fn start(&self, domain: DomainName) {
        self.enqueue(Action::Start, domain);
    }

    /// Enqueue a stop action. Non-blocking.
    pub fn stop(&self, domain: DomainName) {
        self.enqueue(Action::Stop, domain);
    }

    /// Enqueue a restart action. Non-blocking.
    pub fn restart(&self, domain: DomainName) {
        self.enqueue(Action::Restart, domain);
    }

    fn enqueue(&self, action: Action, domain: DomainName) {
        if self.queue_tx.send((action, domain.clone())).is_err() {
            error!(%domain, %action, "HDM dispatcher has shut down, dropping action");
        }
    }

    /// Whether the hypervisor connection is alive, its event-loop
    /// thread is still servicing callbacks, and the dispatcher task is
    /// still running.
    pub fn healthy(&self) -> bool {
        self.hypervisor.is_alive()
            && self.hypervisor.event_loop_alive()
            && !self.dispatcher.is_finished()
    }

    pub fn check_delay(&self) -> Duration {
        self.timing.check_delay
    }

    pub fn action_timeout(&self) -> Duration {
        self.timing.action_timeout
    }
}

async fn reload_state<H: HypervisorAdapter>(
    hypervisor: &Arc<H>,
    cache: &Cache,
) -> Result<(), ReconcileError> {
    let domains = hypervisor.list_domains().await?;
    let mut fresh = HashMap::with_capacity(domains.len());
    for domain in domains {
        let status = hypervisor.domain_status(&domain).await?;
        fresh.insert(domain, status);
    }
    *cache.lock() = fresh;
    Ok(())
}

async fn run_dispatcher<H: HypervisorAdapter, C: Clock>(
    mut queue_rx: mpsc::UnboundedReceiver<(Action, DomainName)>,
    hypervisor: Arc<H>,
    cache: Cache,
    rlal: Arc<Rlal<C>>,
    semaphore: Arc<Semaphore>,
    timing: HdmTiming,
) {
    while let Some((action, domain)) = queue_rx.recv().await {
        if rlal.violated(domain.as_ref()) {
            debug!(%domain, %action, "dropping echoed action");
            continue;
        }

        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let hypervisor = Arc::clone(&hypervisor);
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(err) = execute(&hypervisor, &cache, action, &domain, timing).await {
                error!(%domain, %action, error = %err, "action failed");
            }
        });
    }
    warn!("HDM action queue closed, dispatcher exiting");
}

async fn execute<H: HypervisorAdapter>(
    hypervisor: &H,
    cache: &Cache,
    action: Action,
    domain: &DomainName,
    timing: HdmTiming,
) -> Result<(), ReconcileError> {
    match action {
        Action::Start => do_start(hypervisor, cache, domain, timing).await,
        Action::Stop => do_stop(hypervisor, cache, domain, timing).await,
        Action::Restart => {
            do_stop(hypervisor, cache, domain, timing).await?;
            do_start(hypervisor, cache, domain, timing).await
        }
    }
}

async fn refresh(
    hypervisor: &impl HypervisorAdapter,
    cache: &Cache,
    domain: &DomainName,
) -> Result<DomainStatus, ReconcileError> {
    let status = hypervisor.domain_status(domain).await?;
    cache.lock().insert(domain.clone(), status);
    Ok(status)
}

async fn do_start(
    hypervisor: &impl HypervisorAdapter,
    cache: &Cache,
    domain: &DomainName,
    timing: HdmTiming,
) -> Result<(), ReconcileError> {
    if refresh(hypervisor, cache, domain).await?.is_active() {
        return Ok(());
    }

    hypervisor.start_domain(domain).await?;

    poll_until_active(hypervisor, cache, domain, timing).await
}

async fn do_stop(
    hypervisor: &impl HypervisorAdapter,
    cache: &Cache,
    domain: &DomainName,
    timing: HdmTiming,
) -> Result<(), ReconcileError> {
    if !refresh(hypervisor, cache, domain).await?.is_active() {
        return Ok(());
    }

    hypervisor.shutdown_domain(domain).await?;

    // Re-send the shutdown on every poll tick: the guest may not have
    // been ready to accept ACPI the first time.
    poll_until_inactive(hypervisor, cache, domain, timing).await
}

async fn poll_until_active(
    hypervisor: &impl HypervisorAdapter,
    cache: &Cache,
    domain: &DomainName,
    timing: HdmTiming,
) -> Result<(), ReconcileError> {
    let wait = async {
        loop {
            tokio::time::sleep(timing.check_delay).await;
            if refresh(hypervisor, cache, domain).await?.is_active() {
                return Ok(());
            }
        }
    };

    tokio::time::timeout(timing.action_timeout, wait)
        .await
        .map_err(|_| ReconcileError::ActionTimeout {
            domain: domain.to_string(),
            action: Action::Start,
        })?
}

async fn poll_until_inactive(
    hypervisor: &impl HypervisorAdapter,
    cache: &Cache,
    domain: &DomainName,
    timing: HdmTiming,
) -> Result<(), ReconcileError> {
    let wait = async {
        loop {
            tokio::time::sleep(timing.check_delay).await;
            if !refresh(hypervisor, cache, domain).await?.is_active() {
                return Ok(());
            }
            hypervisor.shutdown_domain(domain).await?;
        }
    };

    tokio::time::timeout(timing.action_timeout, wait)
        .await
        .map_err(|_| ReconcileError::ActionTimeout {
            domain: domain.to_string(),
            action: Action::Stop,
        })?
}

#[cfg(test)]
#[path = "hdm_tests.rs"]
mod tests;

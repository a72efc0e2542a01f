// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Reconciler: the top-level object owning one HDM, one SUM, one
//! JET, and the JET-side echo-suppression RLAL.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use vg_adapters::{HypervisorAdapter, HypervisorEvent, JobTailer, LifecycleCode, UnitAdapter};
use vg_core::{Clock, JobType, Rlal};

use crate::error::ReconcileError;
use crate::hdm::{Hdm, HdmTiming};
use crate::jet::Jet;
use crate::sum::Sum;

/// Tunable knobs for the whole reconciler, gathered in one place so
/// `vg-daemon`'s config layer has a single struct to populate.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub prefix: String,
    pub hdm_timing: HdmTiming,
    pub jet_restart_delay: Duration,
    pub jet_rlal_threshold: Duration,
    pub jet_rlal_max_length: Duration,
}

/// The top-level reconciliation object.
pub struct Reconciler<H: HypervisorAdapter> {
    hdm: Arc<Hdm<H>>,
    jet: Jet,
    hypervisor_events: JoinHandle<()>,
    job_events: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl<H: HypervisorAdapter> Reconciler<H> {
    /// Bootstrap: build HDM (which reloads the full domain view), push
    /// that view into SUM as the authoritative initial state, then wire
    /// up the two cross-control-plane event loops and JET's tail.
    pub async fn bootstrap<U, T, C>(
        hypervisor: Arc<H>,
        hypervisor_events: mpsc::UnboundedReceiver<HypervisorEvent>,
        units: U,
        tailer: Arc<T>,
        clock: C,
        config: ReconcilerConfig,
    ) -> Result<Self, ReconcileError>
    where
        U: UnitAdapter,
        T: JobTailer,
        C: Clock,
    {
        vg_core::validate_prefix(&config.prefix)?;

        let hdm = Arc::new(Hdm::new(Arc::clone(&hypervisor), clock.clone(), config.hdm_timing).await?);

        let sum = Arc::new(Sum::new(units, config.prefix.clone()));
        sum.set_initial_state(&hdm.state()).await?;

        let rlal = Arc::new(Rlal::new(
            clock,
            config.jet_rlal_threshold,
            config.jet_rlal_max_length,
        ));

        let shutdown = CancellationToken::new();

        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let jet = Jet::spawn(
            tailer,
            config.prefix.clone(),
            Arc::clone(&rlal),
            config.jet_restart_delay,
            job_tx,
            shutdown.clone(),
        );

        let job_events = tokio::spawn(run_job_events(Arc::clone(&hdm), job_rx, shutdown.clone()));
        let hypervisor_events = tokio::spawn(run_hypervisor_events(
            Arc::clone(&hdm),
            Arc::clone(&sum),
            rlal,
            hypervisor_events,
            shutdown.clone(),
        ));

        Ok(Self {
            hdm,
            jet,
            hypervisor_events,
            job_events,
            shutdown,
        })
    }

    /// True iff every supervised task is alive and the hypervisor
    /// connection reports alive.
    pub fn healthy(&self) -> bool {
        self.hdm.healthy()
            && self.jet.healthy()
            && !self.hypervisor_events.is_finished()
            && !self.job_events.is_finished()
    }

    /// Stop accepting new work and wait for the in-flight event loops to
    /// drain. Worker-pool tasks already dispatched by HDM run to
    /// completion on their own; this only stops new work from entering
    /// the pipeline.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.hypervisor_events.await;
        let _ = self.job_events.await;
    }
}

async fn run_job_events<H: HypervisorAdapter>(
    hdm: Arc<Hdm<H>>,
    mut job_rx: mpsc::UnboundedReceiver<vg_core::JobEvent>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            event = job_rx.recv() => event,
        };
        let Some(event) = event else { return };
        match event.job_type {
            JobType::Start => hdm.start(event.domain),
            JobType::Stop => hdm.stop(event.domain),
            JobType::Restart => hdm.restart(event.domain),
        }
    }
}

async fn run_hypervisor_events<H, U, C>(
    hdm: Arc<Hdm<H>>,
    sum: Arc<Sum<U>>,
    rlal: Arc<Rlal<C>>,
    mut events: mpsc::UnboundedReceiver<HypervisorEvent>,
    shutdown: CancellationToken,
) where
    H: HypervisorAdapter,
    U: UnitAdapter,
    C: Clock,
{
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            event = events.recv() => event,
        };
        let Some(event) = event else { return };

        match event {
            HypervisorEvent::Lifecycle { domain, code } => match code {
                LifecycleCode::Started => {
                    rlal.record(domain.as_ref());
                    if let Err(err) = sum.start(&domain).await {
                        error!(%domain, error = %err, "failed to start unit for started domain");
                    }
                }
                LifecycleCode::Stopped => {
                    rlal.record(domain.as_ref());
                    if let Err(err) = sum.stop(&domain).await {
                        error!(%domain, error = %err, "failed to stop unit for stopped domain");
                    }
                }
                LifecycleCode::Other => {
                    if let Err(err) = hdm.refresh(&domain).await {
                        error!(%domain, error = %err, "failed to refresh domain status");
                    }
                }
            },
            HypervisorEvent::Reboot { domain } => {
                if let Err(err) = hdm.refresh(&domain).await {
                    error!(%domain, error = %err, "failed to refresh domain status");
                }
                if !rlal.violated(domain.as_ref()) {
                    if let Err(err) = sum.restart(&domain).await {
                        error!(%domain, error = %err, "failed to restart unit for rebooted domain");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;

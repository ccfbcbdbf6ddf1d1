// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::{runtime::controller::Action, Resource};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::*;

use crate::common::*;
use crate::config_types::*;
use crate::error::Error;
use crate::onboarding::Onboarding;
use crate::resources::make_pod;
use crate::settings::Settings;
use crate::store::WorkloadStore;

// Data we want access to in error/reconcile calls
pub struct Data<S, O> {
    pub store: S,
    pub onboarding: O,
    pub settings: Settings,
}

/// What a phase handler wants done once it has looked at the world.
enum Step {
    /// Stop here without touching the status.
    Return(Action),
    /// Persist the status if it changed.
    Persist,
}

/// Controller triggers this whenever a Config or one of its pods changed.
///
/// Each invocation reads the Config fresh from the store, runs the handler of
/// its current phase and writes the status back only if it changed. Status
/// writes requeue immediately; waiting on a pod requeues after the configured
/// interval. The whole invocation is bounded by the reconcile timeout.
pub async fn reconcile<S, O>(config_from_cache: Arc<Config>, ctx: Arc<Data<S, O>>) -> Result<Action, Error>
where
    S: WorkloadStore,
    O: Onboarding,
{
    let deadline = ctx.settings.reconcile_timeout();
    tokio::time::timeout(deadline, reconcile_config(&config_from_cache, &ctx))
        .await
        .map_err(|_| Error::ReconcileTimedOut(deadline))?
}

async fn reconcile_config<S, O>(config_from_cache: &Config, ctx: &Data<S, O>) -> Result<Action, Error>
where
    S: WorkloadStore,
    O: Onboarding,
{
    let config_name = config_from_cache
        .metadata
        .name
        .as_ref()
        .ok_or_else(|| Error::MissingObjectKey(".metadata.name"))?;
    let config_ns = config_from_cache
        .metadata
        .namespace
        .as_ref()
        .ok_or_else(|| Error::MissingObjectKey(".metadata.namespace"))?;

    // Get the Config from the store before taking any reconciliation actions.
    let config = match ctx.store.get_config(config_ns, config_name).await? {
        Some(config) => config,
        None => {
            info!("{} not found, end reconcile", config_name);
            return Ok(Action::await_change());
        }
    };

    let old_status = config.status.clone().unwrap_or_default();
    let mut status = old_status.clone();
    let phase = status.phase();
    status.phase = Some(phase);

    let step = match phase {
        InstallerPhase::Pending => reconcile_pending(&mut status)?,
        InstallerPhase::Running => reconcile_running(&config, config_ns, &mut status, ctx).await?,
        InstallerPhase::Cleaning => reconcile_cleaning(&config, config_ns, &mut status, ctx).await?,
    };
    if let Step::Return(action) = step {
        return Ok(action);
    }

    if status != old_status {
        ctx.store.update_status(&config, &status).await?;
        info!(
            config = %config_name,
            "updated status {} -> {}",
            phase,
            status.phase()
        );
        return Ok(Action::requeue(Duration::ZERO));
    }
    Ok(Action::await_change())
}

fn transition(status: &mut ConfigStatus, event: PhaseEvent) -> Result<(), Error> {
    let from = status.phase();
    let to = from
        .on(event)
        .ok_or(Error::InvalidTransition { from, event })?;
    status.phase = Some(to);
    Ok(())
}

fn reconcile_pending(status: &mut ConfigStatus) -> Result<Step, Error> {
    transition(status, PhaseEvent::Initialized)?;
    Ok(Step::Persist)
}

async fn reconcile_running<S, O>(
    config: &Config,
    config_ns: &str,
    status: &mut ConfigStatus,
    ctx: &Data<S, O>,
) -> Result<Step, Error>
where
    S: WorkloadStore,
    O: Onboarding,
{
    let wait = Step::Return(Action::requeue(ctx.settings.requeue_interval()));
    let name = pod_name(config);

    let pod = match ctx.store.get_pod(config_ns, &name).await? {
        None if !status.has_tracked_workload() => {
            create_workload(config, config_ns, status, ctx).await?;
            // The pod's own events trigger the next invocation.
            return Ok(Step::Return(Action::await_change()));
        }
        None => {
            info!("Tracked pod {} vanished", status.last_workload_name);
            transition(status, PhaseEvent::WorkloadVanished)?;
            return Ok(Step::Persist);
        }
        Some(pod) => pod,
    };

    if !is_controlled_by(&pod, config) {
        return Err(Error::WorkloadCollision { name });
    }

    match WorkloadPhase::of(&pod) {
        WorkloadPhase::Failed | WorkloadPhase::Succeeded => {
            let pod_status = pod.status.clone().unwrap_or_default();
            info!(
                reason = %pod_status.reason.unwrap_or_default(),
                message = %pod_status.message.unwrap_or_default(),
                "container terminated"
            );
            transition(status, PhaseEvent::WorkloadTerminated)?;
        }
        WorkloadPhase::Running => {
            // TODO: confirm with the onboarding owners whether a bind on a stale
            // identity should really recycle the pod, or only mark the new target as deployed.
            if status.last_workload_name != desired_workload_identity(config) {
                let address = match ready_address(&pod) {
                    Some(address) => address,
                    None => {
                        info!("Container not ready, reschedule bind");
                        return Ok(wait);
                    }
                };
                if !onboard_client(config, &name, address, ctx).await {
                    info!("Client not added");
                    return Ok(wait);
                }
                transition(status, PhaseEvent::ClientOnboarded)?;
            }
        }
        WorkloadPhase::Pending | WorkloadPhase::Unknown => return Ok(wait),
    }
    Ok(Step::Persist)
}

async fn create_workload<S, O>(
    config: &Config,
    config_ns: &str,
    status: &mut ConfigStatus,
    ctx: &Data<S, O>,
) -> Result<(), Error>
where
    S: WorkloadStore,
    O: Onboarding,
{
    let oref = config
        .controller_owner_ref(&())
        .ok_or_else(|| Error::MissingObjectKey(".metadata.uid"))?;
    let mut pod = make_pod(config);
    pod.metadata.owner_references = Some(vec![oref]);

    ctx.store.create_pod(config_ns, &pod).await?;
    info!(name = pod.metadata.name.as_deref().unwrap_or_default(), "pod created successfully");

    status.active = Some(vec![pod.object_ref(&())]);
    status.last_schedule_time = Some(metav1::Time(Utc::now()));
    ctx.store.update_status(config, status).await
}

/// True if the Config's client is registered with the pod, binding it first if needed.
async fn onboard_client<S, O>(config: &Config, pod_name: &str, address: &str, ctx: &Data<S, O>) -> bool
where
    S: WorkloadStore,
    O: Onboarding,
{
    let client_id = &config.spec.client_id;
    info!("Trying to bind to: {}", address);
    if ctx.onboarding.get_client(address, client_id).await {
        info!("Client {} bound already", client_id);
        return true;
    }
    if ctx.onboarding.bind_client(address, client_id).await {
        info!("Client {} is bound to pod {}", client_id, pod_name);
        return true;
    }
    false
}

async fn reconcile_cleaning<S, O>(
    config: &Config,
    config_ns: &str,
    status: &mut ConfigStatus,
    ctx: &Data<S, O>,
) -> Result<Step, Error>
where
    S: WorkloadStore,
    O: Onboarding,
{
    if status.has_tracked_workload() {
        let tracked = status.last_workload_name.clone();
        if let Some(pod) = ctx.store.get_pod(config_ns, &tracked).await? {
            if !is_controlled_by(&pod, config) {
                warn!("Pod {} is not controlled by this Config, not removing it", tracked);
            } else if !is_being_deleted(&pod) {
                let has_clients = match pod_address(&pod) {
                    Some(address) => ctx.onboarding.has_clients(address).await,
                    None => false,
                };
                if !has_clients {
                    ctx.store.delete_pod(config_ns, &tracked).await?;
                    info!("Old pod {} removed", tracked);
                    return Ok(Step::Return(Action::requeue(ctx.settings.requeue_interval())));
                }
                info!("Pod {} still has onboarded clients", tracked);
            }
        }
    }

    let desired = desired_workload_identity(config);
    if status.last_workload_name != desired {
        transition(status, PhaseEvent::Retargeted)?;
        status.last_workload_name = desired;
    } else {
        transition(status, PhaseEvent::CycleCompleted)?;
        status.last_workload_name.clear();
        if status.active.as_ref().map_or(false, |active| !active.is_empty()) {
            status.active = Some(Vec::new());
        }
    }
    Ok(Step::Persist)
}

/// The controller triggers this on reconcile errors
pub fn error_policy<S, O>(_object: Arc<Config>, error: &Error, ctx: Arc<Data<S, O>>) -> Action {
    if error.is_transient() {
        warn!("Reconcile failed due to error: {}", error);
    } else {
        error!("Reconcile failed due to error: {}", error);
    }
    Action::requeue(ctx.settings.error_backoff())
}

// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::Api,
    runtime::{
        controller::{self, Action, Controller},
        reflector::ObjectRef,
        watcher,
    },
    Client, Resource,
};
use std::sync::Arc;
use tracing::*;

use crate::config_types::Config;
use crate::error::Error;
use crate::onboarding::OnboardingClient;
use crate::reconciler::{error_policy, reconcile, Data};
use crate::settings::Settings;
use crate::store::KubeStore;

pub const CONTROLLER_NAME: &str = "installer-config-reconciler";

/// Logs the outcome of one Config reconcile as it comes off the controller stream.
pub fn report_controller_reconciled<K, QueueErr>(
    controller_name: &str,
    result: &Result<(ObjectRef<K>, Action), controller::Error<Error, QueueErr>>,
) where
    K: Resource,
    QueueErr: std::error::Error + 'static,
{
    match result {
        Ok((obj, _)) => {
            tracing::info!(
                controller.name = controller_name,
                config = %obj,
                "Reconciled Config"
            );
        }
        Err(err) => {
            tracing::error!(
                controller.name = controller_name,
                error = err as &dyn std::error::Error,
                "Failed to reconcile Config",
            );
        }
    }
}

/// Watches Configs and the pods they own until SIGINT/SIGTERM.
pub async fn run(settings: Settings) -> Result<()> {
    let client = Client::try_default().await?;
    let configs = Api::<Config>::all(client.clone());
    let pods = Api::<Pod>::all(client.clone());

    let onboarding = OnboardingClient::new(settings.onboarding_port, settings.onboarding_timeout())?;
    let data = Arc::new(Data {
        store: KubeStore::new(client),
        onboarding,
        settings,
    });

    info!("starting {}", CONTROLLER_NAME);
    Controller::new(configs, watcher::Config::default())
        .owns(pods, watcher::Config::default())
        .shutdown_on_signal()
        .run(
            reconcile::<KubeStore, OnboardingClient>,
            error_policy::<KubeStore, OnboardingClient>,
            data,
        )
        .for_each(|res| async move { report_controller_reconciled(CONTROLLER_NAME, &res) })
        .await;
    info!("controller terminated");
    Ok(())
}

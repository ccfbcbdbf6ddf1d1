// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::config_types::{InstallerPhase, PhaseEvent};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to get Config: {0}")]
    ConfigGetFailed(#[source] kube::Error),
    #[error("Failed to get Pod: {0}")]
    PodGetFailed(#[source] kube::Error),
    #[error("Failed to create Pod: {0}")]
    PodCreationFailed(#[source] kube::Error),
    #[error("Failed to delete Pod: {0}")]
    PodDeletionFailed(#[source] kube::Error),
    #[error("Failed to update Config status: {0}")]
    StatusUpdateFailed(#[source] kube::Error),
    #[error("Failed to build onboarding client: {0}")]
    OnboardingClientBuildFailed(#[source] reqwest::Error),
    #[error("MissingObjectKey: {0}")]
    MissingObjectKey(&'static str),
    #[error("Pod {name} exists but is not controlled by this Config")]
    WorkloadCollision { name: String },
    #[error("No transition from {from} on {event:?}")]
    InvalidTransition {
        from: InstallerPhase,
        event: PhaseEvent,
    },
    #[error("Reconcile did not finish within {0:?}")]
    ReconcileTimedOut(Duration),
}

impl Error {
    /// Errors that are expected to clear up on a later attempt without any change to the Config.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            Error::MissingObjectKey(_)
                | Error::WorkloadCollision { .. }
                | Error::InvalidTransition { .. }
                | Error::OnboardingClientBuildFailed(_)
        )
    }
}

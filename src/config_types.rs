// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Desired state of one installer deployment.
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(group = "installer.gitpod.io", version = "v1alpha1", kind = "Config")]
#[kube(namespaced, status = "ConfigStatus")]
#[serde(rename_all = "camelCase")]
pub struct ConfigSpec {
    /// Domain name the installed instance is served on.
    pub domain: String,
    /// Full path to the installer image, typically `eu.gcr.io/gitpod-core-dev/build/installer:<tag>`.
    pub installer_image: String,
    #[serde(default)]
    pub container_tag: String,
    #[serde(default)]
    pub container_entrypoint: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_experimental_config: Option<bool>,
}

impl ConfigSpec {
    /// `installerImage` followed by `containerTag`.
    /// Names the pod, labels it and is what `lastWorkloadName` tracks.
    /// The container itself runs `installerImage` as given.
    pub fn image_reference(&self) -> String {
        format!("{}{}", self.installer_image, self.container_tag)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStatus {
    /// References to the pods currently run for this Config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<Vec<corev1::ObjectReference>>,
    /// When the current pod was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_schedule_time: Option<metav1::Time>,
    #[serde(rename = "status", default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<InstallerPhase>,
    /// Empty iff no pod is tracked for recycling. Always serialized so a merge patch can clear it.
    #[serde(default)]
    pub last_workload_name: String,
}

impl ConfigStatus {
    pub fn phase(&self) -> InstallerPhase {
        self.phase.unwrap_or_default()
    }

    pub fn has_tracked_workload(&self) -> bool {
        !self.last_workload_name.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallerPhase {
    #[default]
    Pending,
    Running,
    Cleaning,
}

/// Observations that move a Config from one phase to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// The Config has been picked up.
    Initialized,
    /// The tracked pod is gone.
    WorkloadVanished,
    /// The pod reported Failed or Succeeded.
    WorkloadTerminated,
    /// The client is bound to the pod's onboarding service.
    ClientOnboarded,
    /// The Config now names a different image than the tracked one.
    Retargeted,
    /// The tracked pod has been recycled and a fresh cycle starts.
    CycleCompleted,
}

impl InstallerPhase {
    /// Transition table. `None` means the event is not legal in this phase.
    pub fn on(self, event: PhaseEvent) -> Option<InstallerPhase> {
        use InstallerPhase::*;
        use PhaseEvent::*;
        match (self, event) {
            (Pending, Initialized) => Some(Running),
            (Running, WorkloadVanished) | (Running, WorkloadTerminated) | (Running, ClientOnboarded) => {
                Some(Cleaning)
            }
            (Cleaning, Retargeted) => Some(Running),
            (Cleaning, CycleCompleted) => Some(Pending),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstallerPhase::Pending => "PENDING",
            InstallerPhase::Running => "RUNNING",
            InstallerPhase::Cleaning => "CLEANING",
        }
    }
}

impl fmt::Display for InstallerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

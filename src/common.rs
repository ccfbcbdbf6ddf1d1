// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::config_types::*;
use k8s_openapi::api::core::v1 as corev1;
use kube::ResourceExt;

pub const ONBOARDING_PORT: i32 = 8080;
pub const ONBOARDING_PORT_NAME: &str = "http";
pub const INSTALLER_CONTAINER_NAME: &str = "gitpod-installer";
pub const INSTALLER_LABEL_KEY: &str = "installer";

pub fn pod_name(config: &Config) -> String {
    config.spec.image_reference()
}

/// The identity the Config currently asks for, compared against `lastWorkloadName`.
pub fn desired_workload_identity(config: &Config) -> String {
    config.spec.image_reference()
}

/// Pod phase as reported in `.status.phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl WorkloadPhase {
    pub fn of(pod: &corev1::Pod) -> WorkloadPhase {
        match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
            Some("Pending") => WorkloadPhase::Pending,
            Some("Running") => WorkloadPhase::Running,
            Some("Succeeded") => WorkloadPhase::Succeeded,
            Some("Failed") => WorkloadPhase::Failed,
            _ => WorkloadPhase::Unknown,
        }
    }
}

/// Address of a ready pod. A pod whose first container is not ready, or that has no IP yet, has none.
pub fn ready_address(pod: &corev1::Pod) -> Option<&str> {
    let status = pod.status.as_ref()?;
    let ready = status
        .container_statuses
        .as_ref()
        .and_then(|statuses| statuses.first())
        .map_or(false, |c| c.ready);
    if !ready {
        return None;
    }
    status.pod_ip.as_deref().filter(|ip| !ip.is_empty())
}

pub fn pod_address(pod: &corev1::Pod) -> Option<&str> {
    pod.status
        .as_ref()
        .and_then(|s| s.pod_ip.as_deref())
        .filter(|ip| !ip.is_empty())
}

pub fn is_being_deleted(pod: &corev1::Pod) -> bool {
    pod.metadata.deletion_timestamp.is_some()
}

/// Whether the Config is the controlling owner of the pod.
pub fn is_controlled_by(pod: &corev1::Pod, config: &Config) -> bool {
    let uid = match config.uid() {
        Some(uid) => uid,
        None => return false,
    };
    pod.owner_references()
        .iter()
        .any(|oref| oref.controller == Some(true) && oref.uid == uid)
}

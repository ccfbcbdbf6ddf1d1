// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use k8s_openapi::api::core::v1 as corev1;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

use crate::common::*;
use crate::config_types::*;

fn make_labels(config: &Config) -> BTreeMap<String, String> {
    BTreeMap::from([(
        INSTALLER_LABEL_KEY.to_string(),
        config.spec.image_reference(),
    )])
}

/// Builds the installer pod the Config asks for. Ownership is attached by the reconciler.
pub fn make_pod(config: &Config) -> corev1::Pod {
    corev1::Pod {
        metadata: ObjectMeta {
            name: Some(pod_name(config)),
            namespace: config.metadata.namespace.clone(),
            labels: Some(make_labels(config)),
            ..ObjectMeta::default()
        },
        spec: Some(corev1::PodSpec {
            containers: vec![make_installer_container(config)],
            restart_policy: Some("OnFailure".to_string()),
            ..corev1::PodSpec::default()
        }),
        ..corev1::Pod::default()
    }
}

fn make_installer_container(config: &Config) -> corev1::Container {
    let entrypoint = &config.spec.container_entrypoint;
    corev1::Container {
        name: INSTALLER_CONTAINER_NAME.to_string(),
        image: Some(config.spec.installer_image.clone()),
        command: if entrypoint.is_empty() {
            None
        } else {
            Some(vec![entrypoint.clone()])
        },
        ports: Some(vec![corev1::ContainerPort {
            name: Some(ONBOARDING_PORT_NAME.to_string()),
            container_port: ONBOARDING_PORT,
            protocol: Some("TCP".to_string()),
            ..corev1::ContainerPort::default()
        }]),
        ..corev1::Container::default()
    }
}

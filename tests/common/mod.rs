// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
#![allow(dead_code)]

use async_trait::async_trait;
use installer_controller::{
    config_types::*,
    onboarding::Onboarding,
    reconciler::{reconcile, Data},
    settings::Settings,
    store::WorkloadStore,
    Error,
};
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::{api::ObjectMeta, core::ErrorResponse, runtime::controller::Action};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NAMESPACE: &str = "default";
pub const CONFIG_NAME: &str = "installer";
pub const CONFIG_UID: &str = "6f0b7e3c-1d2a-4c55-9a0e-5b8f3f1b2c01";
pub const CLIENT_ID: &str = "client-a";
pub const POD_IP: &str = "10.0.0.7";

#[derive(Default)]
pub struct World {
    pub configs: BTreeMap<String, Config>,
    pub pods: BTreeMap<String, corev1::Pod>,
    pub pods_created: usize,
    pub pods_deleted: Vec<String>,
    pub status_writes: usize,
    pub fail_pod_reads: bool,
}

/// In-memory object store; clones share the same world.
#[derive(Clone, Default)]
pub struct FakeStore {
    pub world: Arc<Mutex<World>>,
}

fn store_failure() -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: "etcdserver: request timed out".to_string(),
        reason: "InternalError".to_string(),
        code: 500,
    })
}

#[async_trait]
impl WorkloadStore for FakeStore {
    async fn get_config(&self, _namespace: &str, name: &str) -> Result<Option<Config>, Error> {
        Ok(self.world.lock().unwrap().configs.get(name).cloned())
    }

    async fn get_pod(&self, _namespace: &str, name: &str) -> Result<Option<corev1::Pod>, Error> {
        let world = self.world.lock().unwrap();
        if world.fail_pod_reads {
            return Err(Error::PodGetFailed(store_failure()));
        }
        Ok(world.pods.get(name).cloned())
    }

    async fn create_pod(&self, _namespace: &str, pod: &corev1::Pod) -> Result<(), Error> {
        let mut world = self.world.lock().unwrap();
        let name = pod.metadata.name.clone().unwrap();
        if !world.pods.contains_key(&name) {
            world.pods.insert(name, pod.clone());
            world.pods_created += 1;
        }
        Ok(())
    }

    async fn delete_pod(&self, _namespace: &str, name: &str) -> Result<(), Error> {
        let mut world = self.world.lock().unwrap();
        if world.pods.remove(name).is_some() {
            world.pods_deleted.push(name.to_string());
        }
        Ok(())
    }

    async fn update_status(&self, config: &Config, status: &ConfigStatus) -> Result<(), Error> {
        let mut world = self.world.lock().unwrap();
        let name = config.metadata.name.clone().unwrap();
        if let Some(stored) = world.configs.get_mut(&name) {
            stored.status = Some(status.clone());
        }
        world.status_writes += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct OnboardingState {
    pub client_known: bool,
    pub bind_accepted: bool,
    pub has_clients: bool,
    pub delay: Option<Duration>,
    pub get_calls: usize,
    pub bind_calls: usize,
    pub has_clients_calls: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeOnboarding {
    pub state: Arc<Mutex<OnboardingState>>,
}

impl FakeOnboarding {
    async fn maybe_stall(&self) {
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Onboarding for FakeOnboarding {
    async fn get_client(&self, _address: &str, _client_id: &str) -> bool {
        self.maybe_stall().await;
        let mut state = self.state.lock().unwrap();
        state.get_calls += 1;
        state.client_known
    }

    async fn bind_client(&self, _address: &str, client_id: &str) -> bool {
        self.maybe_stall().await;
        let mut state = self.state.lock().unwrap();
        state.bind_calls += 1;
        if state.bind_accepted && client_id == CLIENT_ID {
            state.client_known = true;
            return true;
        }
        false
    }

    async fn has_clients(&self, address: &str) -> bool {
        self.maybe_stall().await;
        let mut state = self.state.lock().unwrap();
        state.has_clients_calls.push(address.to_string());
        state.has_clients
    }
}

pub struct Harness {
    pub store: FakeStore,
    pub onboarding: FakeOnboarding,
    pub data: Arc<Data<FakeStore, FakeOnboarding>>,
}

pub fn settings() -> Settings {
    Settings {
        requeue_interval_secs: 5,
        reconcile_timeout_secs: 30,
        ..Settings::default()
    }
}

pub fn make_config(installer_image: &str, container_tag: &str) -> Config {
    let mut config = Config::new(
        CONFIG_NAME,
        ConfigSpec {
            domain: "gitpod.example.com".to_string(),
            installer_image: installer_image.to_string(),
            container_tag: container_tag.to_string(),
            client_id: CLIENT_ID.to_string(),
            ..ConfigSpec::default()
        },
    );
    config.metadata.namespace = Some(NAMESPACE.to_string());
    config.metadata.uid = Some(CONFIG_UID.to_string());
    config
}

impl Harness {
    pub fn new(config: Config) -> Harness {
        let store = FakeStore::default();
        store
            .world
            .lock()
            .unwrap()
            .configs
            .insert(config.metadata.name.clone().unwrap(), config);
        let onboarding = FakeOnboarding::default();
        let data = Arc::new(Data {
            store: store.clone(),
            onboarding: onboarding.clone(),
            settings: settings(),
        });
        Harness {
            store,
            onboarding,
            data,
        }
    }

    pub fn wait(&self) -> Action {
        Action::requeue(self.data.settings.requeue_interval())
    }

    /// One invocation, as the controller would trigger it from its cache.
    pub async fn reconcile(&self) -> Result<Action, Error> {
        let cached = self
            .config()
            .unwrap_or_else(|| make_config("registry/installer:v1", ""));
        reconcile(Arc::new(cached), self.data.clone()).await
    }

    pub fn config(&self) -> Option<Config> {
        self.store
            .world
            .lock()
            .unwrap()
            .configs
            .get(CONFIG_NAME)
            .cloned()
    }

    pub fn status(&self) -> ConfigStatus {
        self.config()
            .and_then(|c| c.status)
            .unwrap_or_default()
    }

    pub fn set_status(&self, phase: InstallerPhase, last_workload_name: &str) {
        let mut world = self.store.world.lock().unwrap();
        let config = world.configs.get_mut(CONFIG_NAME).unwrap();
        config.status = Some(ConfigStatus {
            phase: Some(phase),
            last_workload_name: last_workload_name.to_string(),
            ..ConfigStatus::default()
        });
    }

    pub fn update_spec(&self, f: impl FnOnce(&mut ConfigSpec)) {
        let mut world = self.store.world.lock().unwrap();
        f(&mut world.configs.get_mut(CONFIG_NAME).unwrap().spec);
    }

    pub fn delete_config(&self) {
        self.store.world.lock().unwrap().configs.remove(CONFIG_NAME);
    }

    pub fn pod(&self, name: &str) -> Option<corev1::Pod> {
        self.store.world.lock().unwrap().pods.get(name).cloned()
    }

    pub fn pod_names(&self) -> Vec<String> {
        self.store.world.lock().unwrap().pods.keys().cloned().collect()
    }

    /// Puts a pod owned by `owner_uid` into the store, as if an earlier invocation created it.
    pub fn put_pod(&self, name: &str, owner_uid: &str) {
        let pod = corev1::Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(NAMESPACE.to_string()),
                owner_references: Some(vec![metav1::OwnerReference {
                    api_version: "installer.gitpod.io/v1alpha1".to_string(),
                    kind: "Config".to_string(),
                    name: CONFIG_NAME.to_string(),
                    uid: owner_uid.to_string(),
                    controller: Some(true),
                    ..metav1::OwnerReference::default()
                }]),
                ..ObjectMeta::default()
            },
            ..corev1::Pod::default()
        };
        self.store.world.lock().unwrap().pods.insert(name.to_string(), pod);
    }

    /// What the kubelet would report for the pod.
    pub fn set_pod_status(&self, name: &str, phase: &str, ready: bool) {
        let mut world = self.store.world.lock().unwrap();
        let pod = world.pods.get_mut(name).unwrap();
        pod.status = Some(corev1::PodStatus {
            phase: Some(phase.to_string()),
            pod_ip: Some(POD_IP.to_string()),
            reason: Some("Completed".to_string()),
            container_statuses: Some(vec![corev1::ContainerStatus {
                name: "gitpod-installer".to_string(),
                ready,
                ..corev1::ContainerStatus::default()
            }]),
            ..corev1::PodStatus::default()
        });
    }

    pub fn mark_pod_deleting(&self, name: &str) {
        let mut world = self.store.world.lock().unwrap();
        let pod = world.pods.get_mut(name).unwrap();
        pod.metadata.deletion_timestamp = Some(metav1::Time(chrono::Utc::now()));
    }

    pub fn onboarding(&self) -> std::sync::MutexGuard<'_, OnboardingState> {
        self.onboarding.state.lock().unwrap()
    }

    pub fn world(&self) -> std::sync::MutexGuard<'_, World> {
        self.store.world.lock().unwrap()
    }
}

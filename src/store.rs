// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{Api, DeleteParams, Patch, PatchParams, PostParams},
    core::ErrorResponse,
    Client, ResourceExt,
};
use serde_json::json;
use tracing::*;

use crate::config_types::*;
use crate::error::Error;

/// The slice of the object store the reconciler reads and writes.
#[async_trait]
pub trait WorkloadStore: Send + Sync {
    /// `None` if the Config no longer exists.
    async fn get_config(&self, namespace: &str, name: &str) -> Result<Option<Config>, Error>;
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, Error>;
    /// Creating a pod that already exists is not an error.
    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<(), Error>;
    /// Deleting a pod that is already gone is not an error.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), Error>;
    async fn update_status(&self, config: &Config, status: &ConfigStatus) -> Result<(), Error>;
}

fn has_reason(err: &kube::Error, wanted: &str) -> bool {
    matches!(err, kube::Error::Api(ErrorResponse { reason, .. }) if reason == wanted)
}

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        KubeStore { client }
    }
}

#[async_trait]
impl WorkloadStore for KubeStore {
    async fn get_config(&self, namespace: &str, name: &str) -> Result<Option<Config>, Error> {
        let config_api = Api::<Config>::namespaced(self.client.clone(), namespace);
        match config_api.get(name).await {
            Err(e) if has_reason(&e, "NotFound") => Ok(None),
            Err(e) => Err(Error::ConfigGetFailed(e)),
            Ok(config) => Ok(Some(config)),
        }
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, Error> {
        let pod_api = Api::<Pod>::namespaced(self.client.clone(), namespace);
        pod_api.get_opt(name).await.map_err(Error::PodGetFailed)
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<(), Error> {
        let pod_api = Api::<Pod>::namespaced(self.client.clone(), namespace);
        match pod_api.create(&PostParams::default(), pod).await {
            Err(e) if has_reason(&e, "AlreadyExists") => {
                info!("Pod {} already exists", pod.name_any());
                Ok(())
            }
            Err(e) => Err(Error::PodCreationFailed(e)),
            Ok(_) => Ok(()),
        }
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let pod_api = Api::<Pod>::namespaced(self.client.clone(), namespace);
        match pod_api.delete(name, &DeleteParams::default()).await {
            Err(e) if has_reason(&e, "NotFound") => Ok(()),
            Err(e) => Err(Error::PodDeletionFailed(e)),
            Ok(_) => Ok(()),
        }
    }

    async fn update_status(&self, config: &Config, status: &ConfigStatus) -> Result<(), Error> {
        let name = config
            .metadata
            .name
            .as_ref()
            .ok_or_else(|| Error::MissingObjectKey(".metadata.name"))?;
        let namespace = config
            .metadata
            .namespace
            .as_ref()
            .ok_or_else(|| Error::MissingObjectKey(".metadata.namespace"))?;
        let config_api = Api::<Config>::namespaced(self.client.clone(), namespace);
        // Merge patch without resourceVersion: the last writer wins.
        let patch = json!({ "status": status });
        config_api
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(Error::StatusUpdateFailed)?;
        Ok(())
    }
}

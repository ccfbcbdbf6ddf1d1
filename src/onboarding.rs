// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT

//! Client for the onboarding service every installer pod serves on port 8080.
//!
//! All calls are fail-soft: transport errors, non-200 answers and undecodable
//! bodies all read as `false`. Retrying is left to the reconciler's requeue.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::*;

use crate::error::Error;

/// Onboarding queries issued by the reconciler against a pod address.
#[async_trait]
pub trait Onboarding: Send + Sync {
    /// Whether `client_id` is already registered with the pod.
    async fn get_client(&self, address: &str, client_id: &str) -> bool;
    /// Registers `client_id` with the pod. True iff the pod accepted it.
    async fn bind_client(&self, address: &str, client_id: &str) -> bool;
    /// Whether at least one client is onboarded to the pod.
    async fn has_clients(&self, address: &str) -> bool;
}

#[derive(Debug, Serialize)]
struct BindRequest<'a> {
    #[serde(rename = "clientId")]
    client_id: &'a str,
    #[serde(rename = "IP")]
    address: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClientsOnboard {
    #[serde(rename = "clientsOnboard", default)]
    clients_onboard: i64,
}

#[derive(Debug, Clone)]
pub struct OnboardingClient {
    http: reqwest::Client,
    port: u16,
}

impl OnboardingClient {
    pub fn new(port: u16, timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::OnboardingClientBuildFailed)?;
        Ok(OnboardingClient { http, port })
    }

    fn url(&self, address: &str, path: &str) -> String {
        format!("http://{}:{}{}", address, self.port, path)
    }

    async fn is_ok(&self, request: reqwest::RequestBuilder, url: &str) -> bool {
        match request.send().await {
            Ok(resp) => {
                debug!(url = %url, status = %resp.status(), "onboarding response");
                resp.status() == StatusCode::OK
            }
            Err(e) => {
                debug!(url = %url, error = %e, "onboarding request failed");
                false
            }
        }
    }
}

#[async_trait]
impl Onboarding for OnboardingClient {
    async fn get_client(&self, address: &str, client_id: &str) -> bool {
        let url = self.url(address, &format!("/client/{}", client_id));
        self.is_ok(self.http.get(&url), &url).await
    }

    async fn bind_client(&self, address: &str, client_id: &str) -> bool {
        let url = self.url(address, "/addClient");
        let body = BindRequest { client_id, address };
        self.is_ok(self.http.post(&url).json(&body), &url).await
    }

    async fn has_clients(&self, address: &str) -> bool {
        let url = self.url(address, "/hasClients");
        let resp = match self.http.get(&url).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => resp,
            Ok(resp) => {
                debug!(url = %url, status = %resp.status(), "onboarding response");
                return false;
            }
            Err(e) => {
                debug!(url = %url, error = %e, "onboarding request failed");
                return false;
            }
        };
        match resp.json::<ClientsOnboard>().await {
            Ok(co) => co.clients_onboard > 0,
            Err(e) => {
                debug!(url = %url, error = %e, "cannot decode hasClients response");
                false
            }
        }
    }
}

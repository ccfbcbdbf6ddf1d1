// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use clap::Args;
use std::time::Duration;

/// Runtime knobs of the controller.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Delay before looking at a pod again while waiting for it to come up, get ready or go away.
    #[arg(long, env = "INSTALLER_REQUEUE_INTERVAL_SECS", default_value_t = 5)]
    pub requeue_interval_secs: u64,
    /// Delay before retrying a failed reconcile.
    #[arg(long, env = "INSTALLER_ERROR_BACKOFF_SECS", default_value_t = 10)]
    pub error_backoff_secs: u64,
    /// Deadline for a single reconcile.
    #[arg(long, env = "INSTALLER_RECONCILE_TIMEOUT_SECS", default_value_t = 60)]
    pub reconcile_timeout_secs: u64,
    #[arg(long, env = "INSTALLER_ONBOARDING_PORT", default_value_t = 8080)]
    pub onboarding_port: u16,
    #[arg(long, env = "INSTALLER_ONBOARDING_TIMEOUT_SECS", default_value_t = 10)]
    pub onboarding_timeout_secs: u64,
}

impl Settings {
    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn onboarding_timeout(&self) -> Duration {
        Duration::from_secs(self.onboarding_timeout_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            requeue_interval_secs: 5,
            error_backoff_secs: 10,
            reconcile_timeout_secs: 60,
            onboarding_port: 8080,
            onboarding_timeout_secs: 10,
        }
    }
}

// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT

//! Controller for `installer.gitpod.io/v1alpha1` `Config` resources.
//!
//! A Config names an installer image. The controller keeps one installer pod
//! running for it, binds the Config's client to the pod's onboarding service
//! and recycles the pod once onboarding is done or the pod has terminated.
//! Progress is tracked in the Config's status as one of `PENDING`, `RUNNING`
//! or `CLEANING`.

pub mod common;
pub mod config_types;
pub mod controller;
pub mod error;
pub mod onboarding;
pub mod reconciler;
pub mod resources;
pub mod settings;
pub mod store;

pub use error::Error;

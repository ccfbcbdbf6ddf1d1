// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use anyhow::Result;
use clap::{Parser, Subcommand};
use installer_controller::{config_types::Config, controller, settings::Settings};
use kube::CustomResourceExt;
use tracing::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "installer-controller", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the Config custom resource definition as YAML
    Export,
    /// Run the controller against the current cluster
    Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    #[command(flatten)]
    settings: Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Export => {
            info!("exporting custom resource definition");
            println!("{}", serde_yaml::to_string(&Config::crd())?);
        }
        Command::Run(args) => {
            info!("running installer-controller");
            controller::run(args.settings).await?;
        }
    }
    Ok(())
}

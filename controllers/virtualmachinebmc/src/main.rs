//! VirtualMachineBMC Controller
//!
//! For every VirtualMachineBMC, keeps one virtbmc agent pod and one service
//! running, restarts the pod when its credential secret changes, and reports
//! readiness in the resource status.

mod backoff;
mod cluster;
mod config;
mod constants;
mod controller;
mod error;
mod reconciler;
mod watcher;
mod workload;

#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::error::ControllerError;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    // rustls 0.23 needs a process-wide crypto provider before the kube client starts
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| {
            ControllerError::InvalidConfig("failed to install rustls crypto provider".to_string())
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting VirtualMachineBMC Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  Agent image: {}", config.agent_image());
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Reconcile concurrency: {}", config.reconcile_concurrency);

    let controller = Controller::new(&config).await?;
    controller.run().await?;

    info!("VirtualMachineBMC Controller stopped");
    Ok(())
}

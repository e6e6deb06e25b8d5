//! Main controller implementation.
//!
//! `Controller` wires the Kubernetes client, the reconciler and the
//! VirtualMachineBMC watcher together and runs the watcher to completion.

use crate::cluster::KubeCluster;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::watch_virtual_machine_bmcs;
use kube::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Main controller for VirtualMachineBMC resources.
#[derive(Debug)]
pub struct Controller {
    bmc_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its watcher.
    pub async fn new(config: &ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing VirtualMachineBMC Controller");

        let client = Client::try_default().await?;
        let cluster = Arc::new(KubeCluster::new(client.clone()));
        let reconciler = Arc::new(Reconciler::new(cluster, config.agent_image()));

        let bmc_watcher = tokio::spawn(watch_virtual_machine_bmcs(
            client,
            reconciler,
            config.watch_namespace.clone(),
            config.reconcile_concurrency,
        ));

        Ok(Self { bmc_watcher })
    }

    /// Runs until the watcher stops (termination signal or fatal error).
    pub async fn run(self) -> Result<(), ControllerError> {
        match self.bmc_watcher.await {
            Ok(result) => result,
            Err(e) => {
                error!("VirtualMachineBMC watcher task failed: {}", e);
                Err(ControllerError::Watch(e.to_string()))
            }
        }
    }
}

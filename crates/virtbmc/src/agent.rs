//! Agent runtime: options and startup sequence.
//!
//! Startup order:
//! 1. build the Kubernetes client;
//! 2. parse the secret reference and load credentials once;
//! 3. start the secret watch and wait for its cache to sync;
//! 4. serve Redfish until shutdown.

use crate::error::AgentError;
use crate::redfish;
use crate::secret::SecretSync;
use crate::session::{Authenticator, BasicAuthValidator, TokenStore};
use clap::Parser;
use kube::Client;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Emulated BMC for one KubeVirt virtual machine
#[derive(Debug, Clone, Parser)]
#[command(name = "virtbmc", version, about)]
pub struct AgentOptions {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub address: IpAddr,

    /// IPMI (UDP) port
    #[arg(long, default_value_t = 623)]
    pub ipmi_port: u16,

    /// Redfish (HTTP) port
    #[arg(long, default_value_t = 80)]
    pub redfish_port: u16,

    /// Credentials secret as namespace/name; empty disables secret-backed auth
    #[arg(long, default_value = "")]
    pub secret_ref: String,

    /// Seconds to wait for the secret cache to sync before giving up
    #[arg(long, default_value_t = 30)]
    pub sync_timeout_secs: u64,

    /// Namespace of the virtual machine
    pub vm_namespace: String,

    /// Name of the virtual machine
    pub vm_name: String,
}

impl AgentOptions {
    pub fn redfish_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.redfish_port)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }
}

/// Runs the agent until `shutdown` is cancelled.
pub async fn run(options: AgentOptions, shutdown: CancellationToken) -> Result<(), AgentError> {
    info!(
        vm = %format!("{}/{}", options.vm_namespace, options.vm_name),
        "Starting virtbmc agent"
    );

    let client = Client::try_default().await?;

    let mut sync = SecretSync::new(&options.secret_ref, client)?;
    sync.initialize().await;
    let watch = sync.start(shutdown.child_token());
    if let Err(e) = sync.wait_for_sync(options.sync_timeout()).await {
        shutdown.cancel();
        return Err(e);
    }

    let authenticator = Arc::new(Authenticator::new(
        Arc::new(TokenStore::new()),
        BasicAuthValidator::new(sync.credentials()),
    ));

    info!(
        port = options.ipmi_port,
        "IPMI simulator is not part of this agent, port is not served"
    );

    let addr = options.redfish_addr();
    let listener = TcpListener::bind(addr).await?;
    info!("Redfish server listening on {}", addr);
    axum::serve(listener, redfish::router(authenticator))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    shutdown.cancel();
    if let Some(watch) = watch
        && let Err(e) = watch.await
    {
        warn!("Secret watch task failed: {}", e);
    }
    info!("virtbmc agent stopped");
    Ok(())
}

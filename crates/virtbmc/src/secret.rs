//! Credential synchronizer.
//!
//! Keeps a `CredentialStore` in step with one Kubernetes secret:
//! - `initialize` fetches the secret once, so credentials are available
//!   before the watch connects;
//! - `start` spawns a watch scoped to the secret's namespace and name;
//! - `wait_for_sync` blocks until the watch cache has completed its initial
//!   listing, bounded by a timeout.
//!
//! An update that lacks `username` or `password` keeps the previous pair.
//! Only deletion of the secret blanks the credentials.

use crate::credentials::{CredentialProvider, CredentialStore, Credentials};
use crate::error::AgentError;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client, ResourceExt};
use kube_runtime::reflector::{self, Store};
use kube_runtime::{WatchStreamExt, watcher};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default bound on the startup cache sync
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// A `namespace/name` secret reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub namespace: String,
    pub name: String,
}

impl SecretRef {
    /// Parses `namespace/name`. An empty string means "no secret" and yields `None`.
    pub fn parse(raw: &str) -> Result<Option<Self>, AgentError> {
        if raw.is_empty() {
            return Ok(None);
        }
        match raw.split('/').collect::<Vec<_>>().as_slice() {
            [namespace, name] if !namespace.is_empty() && !name.is_empty() => Ok(Some(Self {
                namespace: (*namespace).to_string(),
                name: (*name).to_string(),
            })),
            _ => Err(AgentError::InvalidSecretRef(raw.to_string())),
        }
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

struct WatchTarget {
    secret_ref: SecretRef,
    api: Api<Secret>,
}

/// Synchronizes credentials from a secret into a `CredentialStore`.
///
/// Built from an empty reference, every operation is a no-op and the
/// credentials stay empty, so secret-backed authentication never succeeds.
pub struct SecretSync {
    target: Option<WatchTarget>,
    credentials: Arc<CredentialStore>,
    cache: Option<Store<Secret>>,
}

impl fmt::Debug for SecretSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretSync")
            .field("secret_ref", &self.target.as_ref().map(|t| t.secret_ref.to_string()))
            .finish_non_exhaustive()
    }
}

impl SecretSync {
    /// Parses `secret_ref` and prepares the secret API. Fails on a malformed reference.
    pub fn new(secret_ref: &str, client: Client) -> Result<Self, AgentError> {
        let target = SecretRef::parse(secret_ref)?.map(|secret_ref| WatchTarget {
            api: Api::namespaced(client, &secret_ref.namespace),
            secret_ref,
        });
        if target.is_none() {
            info!("No secret reference given, secret-backed authentication is disabled");
        }
        Ok(Self {
            target,
            credentials: Arc::new(CredentialStore::new()),
            cache: None,
        })
    }

    /// Shared handle to the synchronized credentials
    pub fn credentials(&self) -> Arc<CredentialStore> {
        self.credentials.clone()
    }

    /// Best-effort initial fetch. Failures are logged; the watch fills in later.
    pub async fn initialize(&self) {
        let Some(target) = &self.target else {
            return;
        };
        match target.api.get_opt(&target.secret_ref.name).await {
            Ok(Some(secret)) => match Credentials::from_secret(&secret) {
                Some(credentials) => {
                    self.credentials.replace(credentials);
                    info!(secret = %target.secret_ref, "Loaded initial credentials");
                }
                None => {
                    warn!(secret = %target.secret_ref, "Secret is missing username or password")
                }
            },
            Ok(None) => {
                warn!(secret = %target.secret_ref, "Secret not found, credentials stay empty")
            }
            Err(e) => error!(secret = %target.secret_ref, "Failed to fetch secret: {}", e),
        }
    }

    /// Spawns the secret watch. It runs until `shutdown` is cancelled.
    pub fn start(&mut self, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        let target = self.target.as_ref()?;
        let (reader, writer) = reflector::store::<Secret>();
        self.cache = Some(reader);

        let secret_ref = target.secret_ref.clone();
        let config =
            watcher::Config::default().fields(&format!("metadata.name={}", secret_ref.name));
        let stream = watcher(target.api.clone(), config).default_backoff().reflect(writer);
        let mut handler = SecretEventHandler::new(secret_ref.clone(), self.credentials.clone());

        Some(tokio::spawn(async move {
            info!(secret = %secret_ref, "Starting secret watch");
            futures::pin_mut!(stream);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    next = stream.next() => match next {
                        Some(Ok(event)) => handler.handle(event),
                        // The stream retries with backoff
                        Some(Err(e)) => warn!(secret = %secret_ref, "Error watching secret: {}", e),
                        None => {
                            warn!(secret = %secret_ref, "Secret watch stream ended");
                            break;
                        }
                    },
                }
            }
            info!(secret = %secret_ref, "Secret watch stopped");
        }))
    }

    /// Blocks until the watch cache has synced, or fails after `timeout`.
    pub async fn wait_for_sync(&self, timeout: Duration) -> Result<(), AgentError> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        match tokio::time::timeout(timeout, cache.wait_until_ready()).await {
            Ok(Ok(())) => {
                info!("Secret cache synced");
                Ok(())
            }
            Ok(Err(e)) => Err(AgentError::Watch(e.to_string())),
            Err(_) => Err(AgentError::CacheSyncTimeout(timeout)),
        }
    }
}

/// Applies watch events for one secret to the credential store
struct SecretEventHandler {
    secret_ref: SecretRef,
    credentials: Arc<CredentialStore>,
    /// Whether the secret showed up in the current (re)listing
    listed: bool,
}

impl SecretEventHandler {
    fn new(secret_ref: SecretRef, credentials: Arc<CredentialStore>) -> Self {
        Self {
            secret_ref,
            credentials,
            listed: false,
        }
    }

    fn handle(&mut self, event: watcher::Event<Secret>) {
        match event {
            watcher::Event::Init => self.listed = false,
            watcher::Event::InitApply(secret) => {
                self.listed = true;
                self.apply(&secret);
            }
            watcher::Event::Apply(secret) => self.apply(&secret),
            watcher::Event::Delete(_) => self.clear(),
            // Deleted while the watch was disconnected
            watcher::Event::InitDone if !self.listed => self.clear(),
            watcher::Event::InitDone => {}
        }
    }

    fn apply(&self, secret: &Secret) {
        match Credentials::from_secret(secret) {
            Some(credentials) => {
                self.credentials.replace(credentials);
                info!(
                    secret = %self.secret_ref,
                    version = %secret.resource_version().unwrap_or_default(),
                    "Credentials updated"
                );
            }
            None => warn!(
                secret = %self.secret_ref,
                "Secret is missing username or password, keeping previous credentials"
            ),
        }
    }

    fn clear(&self) {
        if self.credentials.credentials().is_empty() {
            debug!(secret = %self.secret_ref, "Secret absent, credentials already empty");
            return;
        }
        self.credentials.clear();
        info!(secret = %self.secret_ref, "Secret deleted, credentials cleared");
    }
}

//! Node bootstrap: ordered startup and shutdown of the grid instance.
//!
//! The ordering is explicit and strict: snapshot, then identity, security
//! and discovery resolution, then assembly, then runtime start, then cluster
//! activation. Dependent services are wired strictly afterwards by
//! [`ServiceRegistry::register_all`](crate::services::ServiceRegistry::register_all),
//! so nothing ever touches an uninitialized grid instance.

use tracing::{error, info, warn};

use crate::bootstrap::BootstrapConfiguration;
use crate::config::ConfigurationSnapshot;
use crate::discovery::DiscoveryBinding;
use crate::error::{BootstrapError, GriddResult};
use crate::grid_runtime::{GridHandle, GridInstance, GridRuntime};
use crate::identity::NodeIdentity;
use crate::security::SecurityContext;

/// Context supplied by the hosting application.
#[derive(Debug, Clone)]
pub struct HostContext {
    /// Label of the hosting application; runtimes use it to tag their
    /// resources.
    pub app_name: String,
}

impl HostContext {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

/// A started, activated grid node.
///
/// Exclusive owner of the grid handle. Dependent services borrow the
/// instance through [`grid`](Self::grid) and cannot outlive it; only this
/// type may close the handle.
pub struct GridNode {
    identity: NodeIdentity,
    grid: Option<GridHandle>,
}

impl std::fmt::Debug for GridNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridNode")
            .field("identity", &self.identity)
            .field("grid", &self.grid.is_some())
            .finish()
    }
}

impl GridNode {
    /// Bootstrap this node: resolve configuration, start the grid runtime
    /// and activate the cluster.
    ///
    /// All-or-nothing. A configuration error surfaces before any network
    /// action; if activation is rejected after the instance was created, the
    /// instance is shut down before the error propagates, so no resource
    /// outlives a failed bootstrap.
    pub async fn bootstrap(
        snapshot: &ConfigurationSnapshot,
        runtime: &dyn GridRuntime,
        ctx: &HostContext,
    ) -> GriddResult<Self> {
        let identity = NodeIdentity::resolve(snapshot.instance_name_hint.as_deref());
        let security = SecurityContext::from_snapshot(snapshot)?;
        let discovery = DiscoveryBinding::select(snapshot)?;
        let configuration =
            BootstrapConfiguration::assemble(snapshot, &identity, security, discovery);

        let grid = runtime
            .start(&configuration, ctx)
            .await
            .map_err(|source| BootstrapError::StartFailure { source })?;

        if let Err(source) = grid.activate().await {
            error!(identity = %identity, "cluster activation rejected, shutting the instance down");
            grid.shutdown().await;
            return Err(BootstrapError::ActivationFailure { source }.into());
        }

        info!(identity = %identity, active = grid.is_active(), "grid node started");

        Ok(Self {
            identity,
            grid: Some(grid),
        })
    }

    /// Identity resolved at bootstrap. The service registrar needs the same
    /// value to bind the cache manager to the correct instance.
    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Borrow the running grid instance. `None` once the node was stopped.
    pub fn grid(&self) -> Option<&dyn GridInstance> {
        self.grid.as_deref()
    }

    /// Stop the grid instance and release its resources.
    ///
    /// Idempotent: the second and later calls are no-ops. Never fails, so it
    /// is safe on abnormal shutdown paths.
    pub async fn stop(&mut self) {
        if let Some(grid) = self.grid.take() {
            info!(identity = %self.identity, "stopping grid node");
            grid.shutdown().await;
        }
    }
}

impl Drop for GridNode {
    fn drop(&mut self) {
        if self.grid.is_some() {
            // The async stop path was skipped; the handle's own drop still
            // releases the runtime's resources.
            warn!(identity = %self.identity, "grid node dropped without stop()");
        }
    }
}

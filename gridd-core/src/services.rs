//! Dependent cluster services.
//!
//! Eventing, messaging, scheduling and the cache manager all require a
//! running, activated grid instance. They are constructed strictly after
//! bootstrap succeeds and hold only a borrow of the instance, so they can
//! never outlive it. Registration is one-shot per process.

use std::collections::HashMap;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{BootstrapError, GriddError, GriddResult};
use crate::grid_runtime::{GridEvent, GridInstance};
use crate::identity::NodeIdentity;
use crate::node::HostContext;

/// Names under which the services are published to the host application.
pub const SERVICE_EVENTS: &str = "events";
pub const SERVICE_MESSAGING: &str = "messaging";
pub const SERVICE_SCHEDULER: &str = "scheduler";
pub const SERVICE_CACHE_MANAGER: &str = "cacheManager";

/// Grid event subscription facade.
pub struct Events<'g> {
    grid: &'g dyn GridInstance,
}

impl<'g> Events<'g> {
    pub fn subscribe(&self) -> broadcast::Receiver<GridEvent> {
        self.grid.subscribe_events()
    }
}

/// Topic messaging facade.
pub struct Messaging<'g> {
    grid: &'g dyn GridInstance,
}

impl<'g> Messaging<'g> {
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> GriddResult<()> {
        self.grid
            .publish(topic, payload)
            .await
            .map_err(|source| GriddError::Runtime { source })
    }
}

/// Local scheduling facade.
pub struct Scheduler<'g> {
    grid: &'g dyn GridInstance,
}

impl std::fmt::Debug for Scheduler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

impl<'g> Scheduler<'g> {
    pub fn run_local(&self, task: impl FnOnce() + Send + 'static) -> GriddResult<()> {
        self.grid
            .run_local(Box::new(task))
            .map_err(|source| GriddError::Runtime { source })
    }
}

/// Cache manager facade, bound to this node's instance name so cache
/// operations reach the correct grid instance.
pub struct CacheManager<'g> {
    grid: &'g dyn GridInstance,
    instance_name: NodeIdentity,
    app_name: String,
}

impl<'g> CacheManager<'g> {
    pub async fn ensure(&self, name: &str) -> GriddResult<()> {
        self.grid
            .ensure_cache(name)
            .await
            .map_err(|source| GriddError::Runtime { source })?;
        debug!(app = %self.app_name, cache = name, "cache ensured");
        Ok(())
    }

    pub fn cache_names(&self) -> Vec<String> {
        self.grid.cache_names()
    }

    pub fn instance_name(&self) -> &NodeIdentity {
        &self.instance_name
    }
}

/// Build the eventing facade.
pub fn events(grid: &dyn GridInstance) -> Events<'_> {
    Events { grid }
}

/// Build the messaging facade.
///
/// An absent handle means the bootstrap ordering was not respected; this is
/// a programming-contract violation and fatal.
pub fn messaging(grid: Option<&dyn GridInstance>) -> GriddResult<Messaging<'_>> {
    let grid = grid.ok_or(BootstrapError::DependencyNotReady {
        service: SERVICE_MESSAGING,
    })?;
    Ok(Messaging { grid })
}

/// Build the scheduling facade. Same null-handle contract as [`messaging`].
pub fn scheduler(grid: Option<&dyn GridInstance>) -> GriddResult<Scheduler<'_>> {
    let grid = grid.ok_or(BootstrapError::DependencyNotReady {
        service: SERVICE_SCHEDULER,
    })?;
    Ok(Scheduler { grid })
}

/// Build the cache manager facade for the named grid instance.
pub fn cache_manager<'g>(
    grid: &'g dyn GridInstance,
    identity: &NodeIdentity,
    ctx: &HostContext,
) -> CacheManager<'g> {
    CacheManager {
        grid,
        instance_name: identity.clone(),
        app_name: ctx.app_name.clone(),
    }
}

/// A service registered with the host application.
pub enum RegisteredService<'g> {
    Events(Events<'g>),
    Messaging(Messaging<'g>),
    Scheduler(Scheduler<'g>),
    CacheManager(CacheManager<'g>),
}

/// Host-application service registry.
///
/// The four services are built together once the grid handle exists and are
/// looked up by their fixed names afterwards.
pub struct ServiceRegistry<'g> {
    entries: HashMap<&'static str, RegisteredService<'g>>,
}

impl<'g> ServiceRegistry<'g> {
    pub fn register_all(
        grid: &'g dyn GridInstance,
        identity: &NodeIdentity,
        ctx: &HostContext,
    ) -> GriddResult<Self> {
        let mut entries = HashMap::new();
        entries.insert(SERVICE_EVENTS, RegisteredService::Events(events(grid)));
        entries.insert(
            SERVICE_MESSAGING,
            RegisteredService::Messaging(messaging(Some(grid))?),
        );
        entries.insert(
            SERVICE_SCHEDULER,
            RegisteredService::Scheduler(scheduler(Some(grid))?),
        );
        entries.insert(
            SERVICE_CACHE_MANAGER,
            RegisteredService::CacheManager(cache_manager(grid, identity, ctx)),
        );

        info!(services = entries.len(), "dependent services registered");
        Ok(Self { entries })
    }

    pub fn lookup(&self, name: &str) -> Option<&RegisteredService<'g>> {
        self.entries.get(name)
    }

    pub fn events(&self) -> Option<&Events<'g>> {
        match self.entries.get(SERVICE_EVENTS) {
            Some(RegisteredService::Events(service)) => Some(service),
            _ => None,
        }
    }

    pub fn messaging(&self) -> Option<&Messaging<'g>> {
        match self.entries.get(SERVICE_MESSAGING) {
            Some(RegisteredService::Messaging(service)) => Some(service),
            _ => None,
        }
    }

    pub fn scheduler(&self) -> Option<&Scheduler<'g>> {
        match self.entries.get(SERVICE_SCHEDULER) {
            Some(RegisteredService::Scheduler(service)) => Some(service),
            _ => None,
        }
    }

    pub fn cache_manager(&self) -> Option<&CacheManager<'g>> {
        match self.entries.get(SERVICE_CACHE_MANAGER) {
            Some(RegisteredService::CacheManager(service)) => Some(service),
            _ => None,
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

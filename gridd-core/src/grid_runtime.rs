//! Interface to the external grid runtime.
//!
//! The grid runtime itself (cluster membership, data partitioning, cache
//! storage, message bus internals) is an external collaborator; this crate
//! only configures and starts it. The trait seam keeps the bootstrap logic
//! decoupled from any concrete runtime. An embedded mock runtime ships with
//! the crate for tests and demos; real runtimes are registered by the
//! hosting binary.

use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::bootstrap::BootstrapConfiguration;
use crate::error::{ConfigurationError, GriddResult};
use crate::node::HostContext;

/// Error type surfaced by runtime implementations.
pub type RuntimeError = Box<dyn std::error::Error + Send + Sync>;
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// Event observed on the grid's event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridEvent {
    /// The local node finished joining or forming the cluster.
    NodeStarted { consistent_id: String },
    /// The cluster accepted activation and now serves read/write operations.
    ClusterActivated,
    /// A cache was created or confirmed on the cluster.
    CacheEnsured { name: String },
}

/// Message published on the grid's message bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// A running grid instance.
///
/// Exclusively owned by the node starter. Every other component works
/// through a borrowed reference and must not outlive the handle.
#[async_trait]
pub trait GridInstance: Send + Sync {
    /// Request cluster activation. Required once after start; the cluster
    /// rejects read/write cache operations until it has been activated.
    async fn activate(&self) -> RuntimeResult<()>;

    fn is_active(&self) -> bool;

    fn consistent_id(&self) -> &str;

    /// Subscribe to the grid event bus. Only events emitted after the call
    /// are observed.
    fn subscribe_events(&self) -> broadcast::Receiver<GridEvent>;

    /// Publish a message on a topic of the grid's message bus.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> RuntimeResult<()>;

    /// Run a closure on this node's scheduler.
    fn run_local(&self, task: Box<dyn FnOnce() + Send + 'static>) -> RuntimeResult<()>;

    /// Create the named cache on the cluster if it does not exist yet.
    async fn ensure_cache(&self, name: &str) -> RuntimeResult<()>;

    /// Names of the caches known to this instance.
    fn cache_names(&self) -> Vec<String>;

    /// Release every resource held by the instance.
    ///
    /// Safe to call on any shutdown path, never fails, and subsequent calls
    /// are no-ops.
    async fn shutdown(&self);
}

/// Handle to a started grid instance.
pub type GridHandle = Box<dyn GridInstance>;

/// Entry point of a grid runtime implementation.
#[async_trait]
pub trait GridRuntime: Send + Sync {
    /// Start the runtime with the assembled configuration.
    ///
    /// May block while the process joins or forms a cluster. The returned
    /// instance is started but not yet activated.
    async fn start(
        &self,
        configuration: &BootstrapConfiguration,
        ctx: &HostContext,
    ) -> RuntimeResult<GridHandle>;
}

/// Factory for creating grid runtime instances.
pub trait GridRuntimeFactory: Send + Sync {
    fn create(&self) -> Arc<dyn GridRuntime>;

    /// Name under which the runtime is selected, e.g. "mock".
    fn runtime_type(&self) -> &'static str;
}

/// Registry of available grid runtime implementations.
pub struct GridRuntimeRegistry {
    factories: HashMap<String, Arc<dyn GridRuntimeFactory>>,
}

impl GridRuntimeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, factory: Arc<dyn GridRuntimeFactory>) {
        self.factories
            .insert(factory.runtime_type().to_string(), factory);
    }

    pub fn create(&self, runtime_type: &str) -> GriddResult<Arc<dyn GridRuntime>> {
        let factory = self.factories.get(runtime_type).ok_or_else(|| {
            ConfigurationError::InvalidSetting {
                key: "runtime",
                message: format!(
                    "unknown grid runtime '{}', available: {:?}",
                    runtime_type,
                    self.available_types()
                ),
            }
        })?;
        Ok(factory.create())
    }

    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for GridRuntimeRegistry {
    /// Registry with the embedded mock runtime. Real runtimes are registered
    /// on top by the hosting binary.
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MockGridRuntimeFactory));
        registry
    }
}

/// In-process mock grid runtime.
///
/// Binds real TCP listeners for the discovery and communication transports
/// within their configured port ranges, so start behaves like a real runtime
/// with respect to port conflicts. Cluster semantics are simulated locally:
/// a single-node cluster that joins instantly.
pub struct MockGridRuntime;

#[async_trait]
impl GridRuntime for MockGridRuntime {
    async fn start(
        &self,
        configuration: &BootstrapConfiguration,
        ctx: &HostContext,
    ) -> RuntimeResult<GridHandle> {
        let instance = MockGridInstance::start(configuration, ctx).await?;
        Ok(Box::new(instance))
    }
}

pub struct MockGridRuntimeFactory;

impl GridRuntimeFactory for MockGridRuntimeFactory {
    fn create(&self) -> Arc<dyn GridRuntime> {
        Arc::new(MockGridRuntime)
    }

    fn runtime_type(&self) -> &'static str {
        "mock"
    }
}

/// Single-node in-process grid instance backing [`MockGridRuntime`].
pub struct MockGridInstance {
    consistent_id: String,
    active: AtomicBool,
    stopped: AtomicBool,
    events_tx: broadcast::Sender<GridEvent>,
    published: Mutex<Vec<TopicMessage>>,
    caches: Mutex<BTreeSet<String>>,
    listeners: Mutex<Vec<TcpListener>>,
}

impl MockGridInstance {
    async fn start(
        configuration: &BootstrapConfiguration,
        ctx: &HostContext,
    ) -> RuntimeResult<Self> {
        let discovery_listener = bind_within_range(
            configuration.discovery.local_port,
            configuration.discovery.local_port_range,
        )
        .await?;
        let communication_listener = bind_within_range(
            configuration.communication.local_port,
            configuration.communication.local_port_range,
        )
        .await?;

        info!(
            app = %ctx.app_name,
            instance = %configuration.instance_name,
            discovery_addr = %discovery_listener.local_addr()?,
            communication_addr = %communication_listener.local_addr()?,
            "mock grid runtime started"
        );

        let (events_tx, _) = broadcast::channel(64);
        let instance = Self {
            consistent_id: configuration.consistent_id.as_str().to_string(),
            active: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            events_tx,
            published: Mutex::new(Vec::new()),
            caches: Mutex::new(BTreeSet::new()),
            listeners: Mutex::new(vec![discovery_listener, communication_listener]),
        };
        let _ = instance.events_tx.send(GridEvent::NodeStarted {
            consistent_id: instance.consistent_id.clone(),
        });
        Ok(instance)
    }

    /// Messages recorded by [`publish`](GridInstance::publish), in order.
    pub fn published_messages(&self) -> Vec<TopicMessage> {
        self.published.lock().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GridInstance for MockGridInstance {
    async fn activate(&self) -> RuntimeResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err("instance already stopped".into());
        }
        self.active.store(true, Ordering::SeqCst);
        let _ = self.events_tx.send(GridEvent::ClusterActivated);
        debug!(consistent_id = %self.consistent_id, "cluster activated");
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn consistent_id(&self) -> &str {
        &self.consistent_id
    }

    fn subscribe_events(&self) -> broadcast::Receiver<GridEvent> {
        self.events_tx.subscribe()
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> RuntimeResult<()> {
        if !self.is_active() {
            return Err("cluster is not active".into());
        }
        self.published.lock().push(TopicMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    fn run_local(&self, task: Box<dyn FnOnce() + Send + 'static>) -> RuntimeResult<()> {
        if !self.is_active() {
            return Err("cluster is not active".into());
        }
        tokio::spawn(async move { task() });
        Ok(())
    }

    async fn ensure_cache(&self, name: &str) -> RuntimeResult<()> {
        if !self.is_active() {
            return Err("cluster is not active".into());
        }
        if self.caches.lock().insert(name.to_string()) {
            let _ = self.events_tx.send(GridEvent::CacheEnsured {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn cache_names(&self) -> Vec<String> {
        self.caches.lock().iter().cloned().collect()
    }

    async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.active.store(false, Ordering::SeqCst);
        // Dropping the listeners releases the transport ports.
        self.listeners.lock().clear();
        info!(consistent_id = %self.consistent_id, "mock grid instance stopped");
    }
}

/// Bind the first free port in `[port, port + range]`, the same probing the
/// real transports perform. Port 0 delegates the choice to the OS.
async fn bind_within_range(port: u16, range: u16) -> RuntimeResult<TcpListener> {
    let last = port.saturating_add(range);
    for candidate in port..=last {
        match TcpListener::bind((Ipv4Addr::LOCALHOST, candidate)).await {
            Ok(listener) => {
                debug!(port = candidate, "bound transport listener");
                return Ok(listener);
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Err(format!("no free port in {}..={}", port, last).into())
}

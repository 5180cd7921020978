//! End-to-end bootstrap tests over the embedded mock runtime.
//!
//! These cover the full ordering: snapshot, identity/security/discovery
//! resolution, assembly, runtime start, activation, service registration,
//! and shutdown.

use std::net::Ipv4Addr;

use tokio::net::TcpListener;

use gridd_core::error::{BootstrapError, GriddError};
use gridd_core::grid_runtime::{GridEvent, MockGridRuntime};
use gridd_core::services;
use gridd_core::{
    ConfigurationSnapshot, GridNode, HostContext, PeerFinder, ServiceRegistry,
};

fn snapshot(discovery_port: u16, comm_port: u16) -> ConfigurationSnapshot {
    ConfigurationSnapshot {
        security_enabled: false,
        security_key_store: None,
        security_key_store_password: None,
        security_trust_store: None,
        security_trust_store_password: None,
        platform_mode: false,
        platform_namespace: None,
        platform_service: None,
        static_addresses: Some("10.0.0.5:47500".to_string()),
        discovery_local_port: discovery_port,
        discovery_port_range: 0,
        communication_local_port: comm_port,
        communication_port_range: 0,
        instance_name_hint: Some("it-node".to_string()),
        peer_class_loading_enabled: false,
        compact_footer: true,
    }
}

#[tokio::test]
async fn full_bootstrap_registers_all_services() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("gridd=debug")
        .try_init();

    let ctx = HostContext::new("it");
    let mut node = GridNode::bootstrap(&snapshot(0, 0), &MockGridRuntime, &ctx)
        .await
        .unwrap();

    let grid = node.grid().expect("bootstrap returned a started node");
    assert!(grid.is_active());

    let registry = ServiceRegistry::register_all(grid, node.identity(), &ctx).unwrap();
    assert_eq!(
        registry.names(),
        vec![
            services::SERVICE_CACHE_MANAGER,
            services::SERVICE_EVENTS,
            services::SERVICE_MESSAGING,
            services::SERVICE_SCHEDULER,
        ]
    );

    // The cache manager is bound to the identity resolved at bootstrap.
    let cache_manager = registry.cache_manager().unwrap();
    assert_eq!(cache_manager.instance_name().as_str(), "it-node");

    let mut events = registry.events().unwrap().subscribe();
    cache_manager.ensure("device-connection").await.unwrap();
    assert_eq!(
        cache_manager.cache_names(),
        vec!["device-connection".to_string()]
    );
    assert_eq!(
        events.try_recv().unwrap(),
        GridEvent::CacheEnsured {
            name: "device-connection".to_string(),
        }
    );

    registry
        .messaging()
        .unwrap()
        .publish("commands", b"reset".to_vec())
        .await
        .unwrap();

    drop(registry);
    node.stop().await;
    assert!(node.grid().is_none());
}

#[tokio::test]
async fn occupied_discovery_port_fails_start_and_registers_nothing() {
    // Hold the only port the discovery transport is allowed to use.
    let blocker = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let taken = blocker.local_addr().unwrap().port();

    let ctx = HostContext::new("it");
    let err = GridNode::bootstrap(&snapshot(taken, 0), &MockGridRuntime, &ctx)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GriddError::Bootstrap(BootstrapError::StartFailure { .. })
    ));
}

#[tokio::test]
async fn scheduler_failure_leaves_the_other_registrations_intact() {
    let ctx = HostContext::new("it");
    let mut node = GridNode::bootstrap(&snapshot(0, 0), &MockGridRuntime, &ctx)
        .await
        .unwrap();
    let grid = node.grid().unwrap();

    let err = services::scheduler(None).unwrap_err();
    assert!(matches!(
        err,
        GriddError::Bootstrap(BootstrapError::DependencyNotReady {
            service: services::SERVICE_SCHEDULER,
        })
    ));

    let events = services::events(grid);
    let messaging = services::messaging(Some(grid)).unwrap();
    let cache_manager = services::cache_manager(grid, node.identity(), &ctx);

    let mut receiver = events.subscribe();
    messaging.publish("alerts", b"ok".to_vec()).await.unwrap();
    cache_manager.ensure("device-commands").await.unwrap();
    assert_eq!(
        receiver.try_recv().unwrap(),
        GridEvent::CacheEnsured {
            name: "device-commands".to_string(),
        }
    );

    node.stop().await;
}

#[tokio::test]
async fn stop_releases_the_transport_ports_and_is_idempotent() {
    let probe = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let discovery_port = probe.local_addr().unwrap().port();
    drop(probe);

    let ctx = HostContext::new("it");
    let mut node = GridNode::bootstrap(&snapshot(discovery_port, 0), &MockGridRuntime, &ctx)
        .await
        .unwrap();

    node.stop().await;
    node.stop().await;

    // The discovery port is free again once the node stopped.
    TcpListener::bind((Ipv4Addr::LOCALHOST, discovery_port))
        .await
        .unwrap();
}

#[tokio::test]
async fn identity_selects_the_static_discovery_scenario() {
    let ctx = HostContext::new("it");
    let mut node = GridNode::bootstrap(&snapshot(0, 0), &MockGridRuntime, &ctx)
        .await
        .unwrap();

    assert_eq!(node.identity().as_str(), "it-node");
    assert_eq!(node.grid().unwrap().consistent_id(), "it-node");

    let binding = gridd_core::DiscoveryBinding::select(&snapshot(0, 0)).unwrap();
    assert_eq!(
        binding.peer_finder,
        PeerFinder::StaticList {
            address_pattern: "10.0.0.5:47500".to_string(),
        }
    );

    node.stop().await;
}

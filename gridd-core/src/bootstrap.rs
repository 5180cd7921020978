//! Assembly of the complete bootstrap configuration.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ConfigurationSnapshot;
use crate::discovery::DiscoveryBinding;
use crate::identity::NodeIdentity;
use crate::security::SecurityContext;

/// Communication transport binding, for data exchange between members that
/// have already joined. Its socket is distinct from the discovery
/// transport's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationBinding {
    pub local_port: u16,
    pub local_port_range: u16,
}

/// The fully assembled configuration handed to the grid runtime.
///
/// Immutable once assembled; owns all of its parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfiguration {
    /// Cluster-wide identity, stable across restarts in the same deployment
    /// slot.
    pub consistent_id: NodeIdentity,
    /// Local process label. Always the same value as `consistent_id`.
    pub instance_name: NodeIdentity,
    /// This process always acts as a full, server-capable node.
    pub client_mode: bool,
    /// The node activates the cluster on join instead of waiting for a
    /// manual activation step.
    pub active_on_start: bool,
    pub peer_class_loading_enabled: bool,
    /// Binary serialization footer mode.
    pub compact_footer: bool,
    pub communication: CommunicationBinding,
    pub discovery: DiscoveryBinding,
    pub security: SecurityContext,
}

impl BootstrapConfiguration {
    /// Compose the individually validated parts into one configuration.
    ///
    /// Structural composition only; inputs are already valid and there is no
    /// failure path. Emits a single summary record of the resolved ports,
    /// discovery mode and identity for operational diagnosis.
    pub fn assemble(
        snapshot: &ConfigurationSnapshot,
        identity: &NodeIdentity,
        security: SecurityContext,
        discovery: DiscoveryBinding,
    ) -> Self {
        let configuration = Self {
            consistent_id: identity.clone(),
            instance_name: identity.clone(),
            client_mode: false,
            active_on_start: true,
            peer_class_loading_enabled: snapshot.peer_class_loading_enabled,
            compact_footer: snapshot.compact_footer,
            communication: CommunicationBinding {
                local_port: snapshot.communication_local_port,
                local_port_range: snapshot.communication_port_range,
            },
            discovery,
            security,
        };

        info!(
            comm_port = configuration.communication.local_port,
            comm_port_range = configuration.communication.local_port_range,
            discovery_port = configuration.discovery.local_port,
            discovery_port_range = configuration.discovery.local_port_range,
            discovery_mode = configuration.discovery.peer_finder.mode(),
            security_enabled = configuration.security.is_enabled(),
            identity = %configuration.instance_name,
            "assembled bootstrap configuration"
        );

        configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::PeerFinder;

    fn snapshot() -> ConfigurationSnapshot {
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
            discovery_local_port: 47500,
            discovery_port_range: 5,
            communication_local_port: 47100,
            communication_port_range: 5,
            instance_name_hint: Some("node-7".to_string()),
            peer_class_loading_enabled: true,
            compact_footer: false,
        }
    }

    fn assemble(snapshot: &ConfigurationSnapshot) -> BootstrapConfiguration {
        let identity = NodeIdentity::resolve(snapshot.instance_name_hint.as_deref());
        let security = SecurityContext::from_snapshot(snapshot).unwrap();
        let discovery = DiscoveryBinding::select(snapshot).unwrap();
        BootstrapConfiguration::assemble(snapshot, &identity, security, discovery)
    }

    #[test]
    fn always_a_server_node_that_activates_on_start() {
        let static_mode = snapshot();

        let mut platform_mode = snapshot();
        platform_mode.platform_mode = true;
        platform_mode.platform_namespace = Some("grid".to_string());
        platform_mode.platform_service = Some("gridd-nodes".to_string());

        for snapshot in [static_mode, platform_mode] {
            let configuration = assemble(&snapshot);
            assert!(!configuration.client_mode);
            assert!(configuration.active_on_start);
        }
    }

    #[test]
    fn identity_is_bound_to_both_roles() {
        let configuration = assemble(&snapshot());
        assert_eq!(configuration.consistent_id, configuration.instance_name);
        assert_eq!(configuration.instance_name.as_str(), "node-7");
    }

    #[test]
    fn grid_flags_are_taken_verbatim_from_the_snapshot() {
        let configuration = assemble(&snapshot());
        assert!(configuration.peer_class_loading_enabled);
        assert!(!configuration.compact_footer);
    }

    #[test]
    fn communication_and_discovery_sockets_are_distinct() {
        let configuration = assemble(&snapshot());
        assert_eq!(configuration.communication.local_port, 47100);
        assert_eq!(configuration.discovery.local_port, 47500);
    }

    #[test]
    fn static_insecure_scenario() {
        let configuration = assemble(&snapshot());
        assert_eq!(
            configuration.discovery.peer_finder,
            PeerFinder::StaticList {
                address_pattern: "10.0.0.5:47500".to_string(),
            }
        );
        assert!(!configuration.security.is_enabled());
        assert!(!configuration.client_mode);
    }
}

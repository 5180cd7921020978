//! Discovery strategy selection.
//!
//! The peer finder is decided exactly once at startup, as a tagged union:
//! either peers are enumerated by querying the orchestration platform, or
//! they come from a static address list. The two variants are mutually
//! exclusive by construction. This module is a pure decision over the
//! snapshot; actual network discovery happens later, inside the grid
//! runtime.

use serde::{Deserialize, Serialize};

use crate::config::{self, ConfigurationSnapshot};
use crate::error::ConfigurationError;

/// Strategy for enumerating candidate peer addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerFinder {
    /// Ask the orchestration platform for the endpoints of a named service.
    PlatformQueried { namespace: String, service: String },

    /// Fixed address pattern from configuration.
    StaticList { address_pattern: String },
}

impl PeerFinder {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::PlatformQueried { .. } => "platform",
            Self::StaticList { .. } => "static",
        }
    }
}

/// Discovery transport binding: the local listening socket settings plus the
/// selected peer finder.
///
/// The port and range configure the discovery transport's own socket, not
/// the peer finder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryBinding {
    pub local_port: u16,
    pub local_port_range: u16,
    pub peer_finder: PeerFinder,
}

impl DiscoveryBinding {
    /// Select the discovery strategy for this deployment.
    pub fn select(snapshot: &ConfigurationSnapshot) -> Result<Self, ConfigurationError> {
        let peer_finder = if snapshot.platform_mode {
            PeerFinder::PlatformQueried {
                namespace: require(
                    &snapshot.platform_namespace,
                    config::ENV_DISCOVERY_PLATFORM_NAMESPACE,
                )?,
                service: require(
                    &snapshot.platform_service,
                    config::ENV_DISCOVERY_PLATFORM_SERVICE,
                )?,
            }
        } else {
            PeerFinder::StaticList {
                address_pattern: require(
                    &snapshot.static_addresses,
                    config::ENV_DISCOVERY_STATIC_ADDRESSES,
                )?,
            }
        };

        Ok(Self {
            local_port: snapshot.discovery_local_port,
            local_port_range: snapshot.discovery_port_range,
            peer_finder,
        })
    }
}

fn require(value: &Option<String>, field: &'static str) -> Result<String, ConfigurationError> {
    match value.as_deref() {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ConfigurationError::MissingDiscoveryTarget { field }),
    }
}

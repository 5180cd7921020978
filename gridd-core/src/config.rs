//! Typed configuration snapshot for a grid node.
//!
//! Settings come from a flat `GRIDD_*` environment namespace and are read
//! exactly once at startup. Downstream components never touch the
//! environment themselves; they consume this immutable snapshot. A required
//! setting that is absent or unparseable is a startup failure, not a silent
//! default.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, GriddResult};
use crate::security::Secret;

pub const ENV_SECURITY_ENABLED: &str = "GRIDD_SECURITY_ENABLED";
pub const ENV_SECURITY_KEYSTORE: &str = "GRIDD_SECURITY_KEYSTORE";
pub const ENV_SECURITY_KEYSTORE_PASSWORD: &str = "GRIDD_SECURITY_KEYSTORE_PASSWORD";
pub const ENV_SECURITY_TRUSTSTORE: &str = "GRIDD_SECURITY_TRUSTSTORE";
pub const ENV_SECURITY_TRUSTSTORE_PASSWORD: &str = "GRIDD_SECURITY_TRUSTSTORE_PASSWORD";
pub const ENV_DISCOVERY_PLATFORM_MODE: &str = "GRIDD_DISCOVERY_PLATFORM_MODE";
pub const ENV_DISCOVERY_PLATFORM_NAMESPACE: &str = "GRIDD_DISCOVERY_PLATFORM_NAMESPACE";
pub const ENV_DISCOVERY_PLATFORM_SERVICE: &str = "GRIDD_DISCOVERY_PLATFORM_SERVICE";
pub const ENV_DISCOVERY_STATIC_ADDRESSES: &str = "GRIDD_DISCOVERY_STATIC_ADDRESSES";
pub const ENV_DISCOVERY_LOCAL_PORT: &str = "GRIDD_DISCOVERY_LOCAL_PORT";
pub const ENV_DISCOVERY_PORT_RANGE: &str = "GRIDD_DISCOVERY_PORT_RANGE";
pub const ENV_COMM_LOCAL_PORT: &str = "GRIDD_COMM_LOCAL_PORT";
pub const ENV_COMM_PORT_RANGE: &str = "GRIDD_COMM_PORT_RANGE";
pub const ENV_INSTANCE_NAME: &str = "GRIDD_INSTANCE_NAME";
pub const ENV_PEER_CLASS_LOADING: &str = "GRIDD_PEER_CLASS_LOADING";
pub const ENV_COMPACT_FOOTER: &str = "GRIDD_COMPACT_FOOTER";

/// Orchestration platforms set HOSTNAME to the pod/slot name, which is the
/// stable per-slot identity we want when no explicit hint is given.
const ENV_HOSTNAME: &str = "HOSTNAME";

/// Conventional ports of the grid runtime's transports.
pub const DEFAULT_DISCOVERY_PORT: u16 = 47500;
pub const DEFAULT_DISCOVERY_PORT_RANGE: u16 = 100;
pub const DEFAULT_COMM_PORT: u16 = 47100;
pub const DEFAULT_COMM_PORT_RANGE: u16 = 100;

/// Immutable view of every setting the bootstrap reads.
///
/// TLS fields are optional here because they are only required when security
/// is enabled; that conditional validation belongs to
/// [`SecurityContext::from_snapshot`](crate::security::SecurityContext::from_snapshot).
/// The same applies to the discovery target fields and
/// [`DiscoveryBinding::select`](crate::discovery::DiscoveryBinding::select).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationSnapshot {
    pub security_enabled: bool,
    pub security_key_store: Option<String>,
    pub security_key_store_password: Option<Secret>,
    pub security_trust_store: Option<String>,
    pub security_trust_store_password: Option<Secret>,

    /// True when peers are found by querying the orchestration platform,
    /// false when a static address list is used.
    pub platform_mode: bool,
    pub platform_namespace: Option<String>,
    pub platform_service: Option<String>,
    pub static_addresses: Option<String>,

    pub discovery_local_port: u16,
    pub discovery_port_range: u16,
    pub communication_local_port: u16,
    pub communication_port_range: u16,

    /// Externally supplied instance label, if any.
    pub instance_name_hint: Option<String>,

    pub peer_class_loading_enabled: bool,
    pub compact_footer: bool,
}

impl ConfigurationSnapshot {
    /// Load the snapshot from the process environment.
    ///
    /// The discovery mode flag has no default: a deployment must say
    /// explicitly how this node finds its peers.
    pub fn from_env() -> GriddResult<Self> {
        let snapshot = Self {
            security_enabled: env_bool(ENV_SECURITY_ENABLED)?.unwrap_or(false),
            security_key_store: env_string(ENV_SECURITY_KEYSTORE),
            security_key_store_password: env_string(ENV_SECURITY_KEYSTORE_PASSWORD)
                .map(Secret::new),
            security_trust_store: env_string(ENV_SECURITY_TRUSTSTORE),
            security_trust_store_password: env_string(ENV_SECURITY_TRUSTSTORE_PASSWORD)
                .map(Secret::new),

            platform_mode: env_bool(ENV_DISCOVERY_PLATFORM_MODE)?.ok_or(
                ConfigurationError::MissingRequiredSetting {
                    key: ENV_DISCOVERY_PLATFORM_MODE,
                },
            )?,
            platform_namespace: env_string(ENV_DISCOVERY_PLATFORM_NAMESPACE),
            platform_service: env_string(ENV_DISCOVERY_PLATFORM_SERVICE),
            static_addresses: env_string(ENV_DISCOVERY_STATIC_ADDRESSES),

            discovery_local_port: env_u16(ENV_DISCOVERY_LOCAL_PORT)?
                .unwrap_or(DEFAULT_DISCOVERY_PORT),
            discovery_port_range: env_u16(ENV_DISCOVERY_PORT_RANGE)?
                .unwrap_or(DEFAULT_DISCOVERY_PORT_RANGE),
            communication_local_port: env_u16(ENV_COMM_LOCAL_PORT)?.unwrap_or(DEFAULT_COMM_PORT),
            communication_port_range: env_u16(ENV_COMM_PORT_RANGE)?
                .unwrap_or(DEFAULT_COMM_PORT_RANGE),

            instance_name_hint: env_string(ENV_INSTANCE_NAME).or_else(|| env_string(ENV_HOSTNAME)),

            peer_class_loading_enabled: env_bool(ENV_PEER_CLASS_LOADING)?.unwrap_or(false),
            compact_footer: env_bool(ENV_COMPACT_FOOTER)?.unwrap_or(true),
        };

        Ok(snapshot)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_bool(key: &'static str) -> Result<Option<bool>, ConfigurationError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<bool>()
            .map(Some)
            .map_err(|_| ConfigurationError::InvalidSetting {
                key,
                message: format!("expected true or false, got '{}'", raw),
            }),
        Err(_) => Ok(None),
    }
}

fn env_u16(key: &'static str) -> Result<Option<u16>, ConfigurationError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u16>()
            .map(Some)
            .map_err(|_| ConfigurationError::InvalidSetting {
                key,
                message: format!("expected a port number, got '{}'", raw),
            }),
        Err(_) => Ok(None),
    }
}

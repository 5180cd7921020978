//! Transport security for inter-node links.
//!
//! Security is all-or-nothing per process: either a complete set of TLS
//! material is configured, or the communication layer runs without transport
//! encryption. A partially specified set is a startup failure.

use std::fmt;
use std::path::PathBuf;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::config::{self, ConfigurationSnapshot};
use crate::error::ConfigurationError;

/// Wrapper for sensitive configuration values.
///
/// `Debug` and `Serialize` redact the contained string so that passwords can
/// never reach logs or serialized output. Use [`expose`](Self::expose) at
/// the point the value is actually handed to the runtime.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("<redacted>")
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Secret)
    }
}

/// TLS key material for securing inter-node links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsMaterial {
    pub key_store: PathBuf,
    pub key_store_password: Secret,
    pub trust_store: PathBuf,
    pub trust_store_password: Secret,
}

/// Security configuration attached to the communication transport.
///
/// `Disabled` is a pass-through marker: links run in the clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SecurityContext {
    Disabled,
    Enabled(TlsMaterial),
}

impl SecurityContext {
    /// Build the security context from the snapshot.
    ///
    /// When security is disabled the TLS fields are ignored entirely,
    /// malformed or not. When enabled, all four fields must be present and
    /// non-empty; the first missing one is named in the error, in the order
    /// key store, key-store password, trust store, trust-store password.
    pub fn from_snapshot(snapshot: &ConfigurationSnapshot) -> Result<Self, ConfigurationError> {
        if !snapshot.security_enabled {
            return Ok(Self::Disabled);
        }

        let key_store = require_path(&snapshot.security_key_store, config::ENV_SECURITY_KEYSTORE)?;
        let key_store_password = require_secret(
            &snapshot.security_key_store_password,
            config::ENV_SECURITY_KEYSTORE_PASSWORD,
        )?;
        let trust_store = require_path(
            &snapshot.security_trust_store,
            config::ENV_SECURITY_TRUSTSTORE,
        )?;
        let trust_store_password = require_secret(
            &snapshot.security_trust_store_password,
            config::ENV_SECURITY_TRUSTSTORE_PASSWORD,
        )?;

        Ok(Self::Enabled(TlsMaterial {
            key_store,
            key_store_password,
            trust_store,
            trust_store_password,
        }))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }
}

fn require_path(
    value: &Option<String>,
    field: &'static str,
) -> Result<PathBuf, ConfigurationError> {
    match value.as_deref() {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Err(ConfigurationError::MissingSecurityMaterial { field }),
    }
}

fn require_secret(
    value: &Option<Secret>,
    field: &'static str,
) -> Result<Secret, ConfigurationError> {
    match value {
        Some(secret) if !secret.is_empty() => Ok(secret.clone()),
        _ => Err(ConfigurationError::MissingSecurityMaterial { field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn secured_snapshot() -> ConfigurationSnapshot {
        ConfigurationSnapshot {
            security_enabled: true,
            security_key_store: Some("/etc/gridd/node.p12".to_string()),
            security_key_store_password: Some(Secret::new("key-pass")),
            security_trust_store: Some("/etc/gridd/trust.p12".to_string()),
            security_trust_store_password: Some(Secret::new("trust-pass")),
            platform_mode: false,
            platform_namespace: None,
            platform_service: None,
            static_addresses: Some("10.0.0.5:47500".to_string()),
            discovery_local_port: 47500,
            discovery_port_range: 0,
            communication_local_port: 47100,
            communication_port_range: 0,
            instance_name_hint: None,
            peer_class_loading_enabled: false,
            compact_footer: true,
        }
    }

    #[test]
    fn disabled_security_skips_validation_of_tls_fields() {
        let mut snapshot = secured_snapshot();
        snapshot.security_enabled = false;
        snapshot.security_key_store = Some(String::new());
        snapshot.security_trust_store = None;
        snapshot.security_trust_store_password = None;

        let context = SecurityContext::from_snapshot(&snapshot).unwrap();
        assert!(!context.is_enabled());
    }

    #[test]
    fn complete_material_builds_an_enabled_context() {
        let context = SecurityContext::from_snapshot(&secured_snapshot()).unwrap();
        match context {
            SecurityContext::Enabled(material) => {
                assert_eq!(material.key_store, PathBuf::from("/etc/gridd/node.p12"));
                assert_eq!(material.trust_store_password.expose(), "trust-pass");
            }
            SecurityContext::Disabled => panic!("expected an enabled context"),
        }
    }

    #[test_case(0, config::ENV_SECURITY_KEYSTORE)]
    #[test_case(1, config::ENV_SECURITY_KEYSTORE_PASSWORD)]
    #[test_case(2, config::ENV_SECURITY_TRUSTSTORE)]
    #[test_case(3, config::ENV_SECURITY_TRUSTSTORE_PASSWORD)]
    fn missing_material_names_the_field(index: usize, expected: &str) {
        let mut snapshot = secured_snapshot();
        match index {
            0 => snapshot.security_key_store = None,
            1 => snapshot.security_key_store_password = None,
            2 => snapshot.security_trust_store = None,
            _ => snapshot.security_trust_store_password = None,
        }

        let err = SecurityContext::from_snapshot(&snapshot).unwrap_err();
        assert!(
            matches!(err, ConfigurationError::MissingSecurityMaterial { field } if field == expected)
        );
    }

    #[test_case(0, config::ENV_SECURITY_KEYSTORE)]
    #[test_case(1, config::ENV_SECURITY_KEYSTORE_PASSWORD)]
    fn empty_material_counts_as_missing(index: usize, expected: &str) {
        let mut snapshot = secured_snapshot();
        match index {
            0 => snapshot.security_key_store = Some(String::new()),
            _ => snapshot.security_key_store_password = Some(Secret::new("")),
        }

        let err = SecurityContext::from_snapshot(&snapshot).unwrap_err();
        assert!(
            matches!(err, ConfigurationError::MissingSecurityMaterial { field } if field == expected)
        );
    }

    #[test]
    fn secrets_are_redacted_in_debug_and_serialized_output() {
        let material = TlsMaterial {
            key_store: PathBuf::from("/etc/gridd/node.p12"),
            key_store_password: Secret::new("key-pass"),
            trust_store: PathBuf::from("/etc/gridd/trust.p12"),
            trust_store_password: Secret::new("trust-pass"),
        };

        let debug = format!("{:?}", material);
        assert!(!debug.contains("key-pass"));
        assert!(!debug.contains("trust-pass"));

        let json = serde_json::to_string(&material).unwrap();
        assert!(!json.contains("key-pass"));
        assert!(json.contains("<redacted>"));
    }
}

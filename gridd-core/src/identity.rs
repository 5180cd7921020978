//! Stable node identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of this node, used both as the cluster-wide consistent id and as
/// the local instance name. Computed once at bootstrap, immutable for the
/// process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIdentity(String);

impl NodeIdentity {
    /// Resolve the node identity from an externally supplied hint.
    ///
    /// A present hint is used verbatim. Without one, a random identifier is
    /// generated; it will differ on every process start.
    pub fn resolve(hint: Option<&str>) -> Self {
        match hint {
            Some(hint) if !hint.is_empty() => Self(hint.to_string()),
            _ => Self(Uuid::new_v4().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

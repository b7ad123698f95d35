//! Live resource lookups for deep checks.
//!
//! Detectors never talk to a provider SDK directly. They ask a [`CloudApi`]
//! for the names of the live resources of one [`LiveResourceKind`] and
//! compare those against the names the configuration declares. Any client
//! that can answer that question can back a deep check: a local
//! [`InventoryFile`], an [`HttpInventory`] service, or a test double.

mod http;
mod inventory;

pub use http::{HttpInventory, DEFAULT_TIMEOUT_SECS};
pub use inventory::InventoryFile;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A kind of live resource that can be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveResourceKind {
    /// RDS DB parameter groups
    DbParameterGroups,
    /// RDS DB subnet groups
    DbSubnetGroups,
    /// EC2 key pairs
    KeyPairs,
}

impl LiveResourceKind {
    /// All kinds, in a stable order.
    pub const ALL: [Self; 3] = [Self::DbParameterGroups, Self::DbSubnetGroups, Self::KeyPairs];

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DbParameterGroups => "db_parameter_groups",
            Self::DbSubnetGroups => "db_subnet_groups",
            Self::KeyPairs => "key_pairs",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for LiveResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only query interface used by deep checks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Names of every live resource of `kind`.
    ///
    /// # Errors
    ///
    /// Returns a `CloudApi` error if the lookup could not be performed.
    async fn list_names(&self, kind: LiveResourceKind) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in LiveResourceKind::ALL {
            assert_eq!(LiveResourceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(LiveResourceKind::parse("buckets"), None);
        assert_eq!(
            serde_json::to_string(&LiveResourceKind::DbSubnetGroups).unwrap(),
            "\"db_subnet_groups\""
        );
    }
}

//! Identifier newtypes for the verification workflow
//!
//! The platform addresses everything by opaque strings: node ids are
//! operator-assigned (`"rp1"`, `"idp2"`), request ids are platform-assigned
//! per workflow instance, and reference ids are caller-chosen correlation
//! tokens minted before an operation is issued. Wrapping them keeps the two
//! correlation spaces (caller-chosen vs platform-assigned) from being mixed
//! up at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The three roles of the data-sharing protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    /// Relying Party: requests verified data about a subject.
    RelyingParty,
    /// Identity Provider: asserts the subject's identity.
    IdentityProvider,
    /// Attribute/Authentication Server: supplies the requested data.
    AttributeService,
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleKind::RelyingParty => write!(f, "rp"),
            RoleKind::IdentityProvider => write!(f, "idp"),
            RoleKind::AttributeService => write!(f, "as"),
        }
    }
}

/// Identifier of one platform node instance (e.g. `"rp1"`, `"idp1"`, `"as2"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a node id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Caller-chosen correlation token for one initiated platform operation.
///
/// Distinct from [`RequestId`]: a reference id exists before the platform
/// has assigned anything, and is the only handle the caller holds while the
/// initiating call is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ReferenceId(pub String);

impl ReferenceId {
    /// Create a reference id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random reference id for a new operation.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ReferenceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Platform-assigned identifier of one multi-party workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct RequestId(pub String);

impl RequestId {
    /// Create a request id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifier of a data service offered by an AS (e.g. `"bank_statement"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ServiceId(pub String);

impl ServiceId {
    /// Create a service id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

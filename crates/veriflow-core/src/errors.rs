//! Error taxonomy for the callback core
//!
//! Correlation failures and business failures are deliberately separate: a
//! resolved event carrying `success: false` is a platform-level outcome the
//! caller inspects, while [`VeriflowError::CorrelationTimeout`] means no
//! matching event arrived at all.

use crate::events::EventKind;

/// Unified error type for callback ingestion, correlation and aggregation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VeriflowError {
    /// Inbound payload was not syntactically valid JSON, or was missing the
    /// fields its declared type requires. Dropped before reaching the bus.
    #[error("malformed callback: {reason}")]
    MalformedCallback {
        /// What the parser rejected.
        reason: String,
    },

    /// Signing challenge named a reference id that was never stored. The
    /// reference must be stored before the identity-creation call that can
    /// trigger the challenge, so this is a caller bookkeeping bug and must
    /// not be retried.
    #[error("unknown reference id: {reference_id}")]
    UnknownReference {
        /// The unregistered reference id.
        reference_id: String,
    },

    /// A reference id was stored twice. References are single-use per
    /// identity-creation attempt.
    #[error("duplicate reference id: {reference_id}")]
    DuplicateReference {
        /// The reused reference id.
        reference_id: String,
    },

    /// No matching event arrived within the caller-supplied deadline. The
    /// waiter has been removed; a late event will not resolve it.
    #[error("no {kind} event matched key {key:?} before the deadline")]
    CorrelationTimeout {
        /// The awaited event kind.
        kind: EventKind,
        /// The correlation key that never matched.
        key: String,
    },

    /// A second waiter was registered for a key that already has an
    /// unresolved waiter, under the `Reject` duplicate policy.
    #[error("waiter already registered for {kind} key {key:?}")]
    DuplicateWaiter {
        /// The contested event kind.
        kind: EventKind,
        /// The contested correlation key.
        key: String,
    },

    /// A status snapshot arrived with a block height at or below the stored
    /// one, indicating reordering at the transport layer. Logged and
    /// ignored; later snapshots are expected to correct state.
    #[error("stale snapshot for request {request_id}: block height {received} <= stored {stored}")]
    StaleSnapshot {
        /// The affected request id.
        request_id: String,
        /// Block height already stored.
        stored: u64,
        /// Block height of the rejected snapshot.
        received: u64,
    },

    /// The injected signer could not honor the declared signing scheme or
    /// could not use the stored key material.
    #[error("signing failed: {reason}")]
    Signing {
        /// Why the signature could not be produced.
        reason: String,
    },
}

impl VeriflowError {
    /// Create a malformed-callback error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCallback {
            reason: reason.into(),
        }
    }

    /// Create an unknown-reference error.
    pub fn unknown_reference(reference_id: impl Into<String>) -> Self {
        Self::UnknownReference {
            reference_id: reference_id.into(),
        }
    }

    /// Create a duplicate-reference error.
    pub fn duplicate_reference(reference_id: impl Into<String>) -> Self {
        Self::DuplicateReference {
            reference_id: reference_id.into(),
        }
    }

    /// Create a signing error.
    pub fn signing(reason: impl Into<String>) -> Self {
        Self::Signing {
            reason: reason.into(),
        }
    }
}

/// Result alias for Veriflow operations.
pub type VeriflowResult<T> = std::result::Result<T, VeriflowError>;

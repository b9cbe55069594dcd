//! Identity reference registry
//!
//! Before issuing an identity-creation call, the workflow driver stores the
//! accessor private key under the call's reference id. When the platform
//! later pushes the signing challenge for that reference, the ingress reads
//! the key back to answer it. Reads do not consume the entry: the same
//! reference can face more than one challenge across platform retries.
//!
//! The store is process-scoped state owned by the driver and passed by
//! `Arc` to each node's ingress. Entries are never expired here; the
//! registry is bounded by session scope and cleanup belongs to the owner.

use std::collections::HashMap;

use parking_lot::Mutex;
use veriflow_core::{AccessorKey, ReferenceId, VeriflowError, VeriflowResult};

/// Registry of reference ids to accessor signing keys.
#[derive(Default)]
pub struct IdentityReferenceStore {
    entries: Mutex<HashMap<ReferenceId, AccessorKey>>,
}

impl IdentityReferenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the signing key for a new reference id.
    ///
    /// References are single-use per identity-creation attempt; storing the
    /// same id twice fails with [`VeriflowError::DuplicateReference`].
    pub fn put(&self, reference_id: ReferenceId, key: AccessorKey) -> VeriflowResult<()> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&reference_id) {
            return Err(VeriflowError::duplicate_reference(reference_id.as_str()));
        }
        entries.insert(reference_id, key);
        Ok(())
    }

    /// Fetch the signing key for an incoming challenge.
    ///
    /// Does not remove the entry. A challenge for an id that was never
    /// stored is a caller bookkeeping bug and fails with
    /// [`VeriflowError::UnknownReference`]; the operation that triggered it
    /// must be treated as failed, not retried.
    pub fn key_for_challenge(&self, reference_id: &ReferenceId) -> VeriflowResult<AccessorKey> {
        self.entries
            .lock()
            .get(reference_id)
            .cloned()
            .ok_or_else(|| VeriflowError::unknown_reference(reference_id.as_str()))
    }

    /// Whether a reference id has been stored.
    pub fn contains(&self, reference_id: &ReferenceId) -> bool {
        self.entries.lock().contains_key(reference_id)
    }

    /// Number of stored references.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

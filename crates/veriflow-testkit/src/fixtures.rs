//! Callback payload fixtures
//!
//! Raw JSON payloads shaped exactly like the platform pushes them, for
//! feeding through an ingress in tests, plus a builder for status
//! snapshots. Defaults mirror a 1-IdP / 1-AS bank-statement request so a
//! test only overrides what it is actually about.

use serde_json::{json, Value};
use veriflow_core::status::{ResponseValidity, ServiceStatus};
use veriflow_core::{NodeId, RequestId, RequestState, RequestStatusSnapshot, ServiceId};

/// Builder for [`RequestStatusSnapshot`] values and payloads.
#[derive(Debug, Clone)]
pub struct StatusSnapshotBuilder {
    snapshot: RequestStatusSnapshot,
}

impl StatusSnapshotBuilder {
    /// Start from a pending snapshot for `request_id` with one
    /// `bank_statement` service and no progress.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            snapshot: RequestStatusSnapshot {
                request_id: RequestId::new(request_id),
                status: RequestState::Pending,
                mode: 1,
                min_idp: 1,
                answered_idp_count: 0,
                closed: false,
                timed_out: false,
                service_list: vec![ServiceStatus {
                    service_id: ServiceId::from("bank_statement"),
                    min_as: 1,
                    signed_data_count: 0,
                    received_data_count: 0,
                }],
                response_valid_list: Vec::new(),
                block_height: 1,
            },
        }
    }

    /// Set the top-level status.
    pub fn status(mut self, status: RequestState) -> Self {
        self.snapshot.status = status;
        self
    }

    /// Set the block height.
    pub fn block_height(mut self, block_height: u64) -> Self {
        self.snapshot.block_height = block_height;
        self
    }

    /// Record `idp_id` as answered (bumps the count and the valid list
    /// together, keeping the snapshot internally consistent).
    pub fn answered_by(mut self, idp_id: impl Into<String>) -> Self {
        self.snapshot.answered_idp_count += 1;
        self.snapshot.response_valid_list.push(ResponseValidity {
            idp_id: NodeId::new(idp_id),
            valid_proof: None,
            valid_ial: None,
        });
        self
    }

    /// Set the data counts of the first service.
    pub fn service_counts(mut self, signed: u32, received: u32) -> Self {
        if let Some(service) = self.snapshot.service_list.first_mut() {
            service.signed_data_count = signed;
            service.received_data_count = received;
        }
        self
    }

    /// Mark the request closed.
    pub fn closed(mut self) -> Self {
        self.snapshot.closed = true;
        self
    }

    /// Mark the request timed out.
    pub fn timed_out(mut self) -> Self {
        self.snapshot.timed_out = true;
        self
    }

    /// The built snapshot.
    pub fn build(self) -> RequestStatusSnapshot {
        self.snapshot
    }

    /// The built snapshot as a raw `request_status` payload.
    pub fn payload(self) -> Vec<u8> {
        let mut value = serde_json::to_value(&self.snapshot).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.insert("type".to_string(), Value::String("request_status".to_string()));
        }
        serde_json::to_vec(&value).unwrap_or_default()
    }
}

/// Raw `create_request_result` payload.
pub fn create_request_result_payload(reference_id: &str, request_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "create_request_result",
        "reference_id": reference_id,
        "request_id": request_id,
        "success": true,
    }))
    .unwrap_or_default()
}

/// Raw `incoming_request` payload for a 1-service request.
pub fn incoming_request_payload(request_id: &str, requester_node_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "incoming_request",
        "request_id": request_id,
        "mode": 1,
        "namespace": "cid",
        "identifier": "1234567890123",
        "request_message": "Test request message (data request)",
        "request_message_hash": "aGFzaA==",
        "request_message_salt": "c2FsdA==",
        "requester_node_id": requester_node_id,
        "min_ial": 1.1,
        "min_aal": 1.0,
        "data_request_list": [{
            "service_id": "bank_statement",
            "as_id_list": ["as1"],
            "min_as": 1,
            "request_params": "{\"format\":\"pdf\"}",
        }],
    }))
    .unwrap_or_default()
}

/// Raw `response_result` payload.
pub fn response_result_payload(reference_id: &str, request_id: &str, success: bool) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "response_result",
        "reference_id": reference_id,
        "request_id": request_id,
        "success": success,
    }))
    .unwrap_or_default()
}

/// Raw `data_request` payload.
pub fn data_request_payload(request_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "data_request",
        "request_id": request_id,
        "mode": 1,
        "namespace": "cid",
        "identifier": "1234567890123",
        "service_id": "bank_statement",
        "request_params": "{\"format\":\"pdf\"}",
        "max_ial": 2.3,
        "max_aal": 3.0,
        "response_signature_list": ["c2lnbmF0dXJl"],
    }))
    .unwrap_or_default()
}

/// Raw `send_data_result` payload.
pub fn send_data_result_payload(reference_id: &str, request_id: &str, success: bool) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "send_data_result",
        "reference_id": reference_id,
        "request_id": request_id,
        "success": success,
    }))
    .unwrap_or_default()
}

/// Raw `accessor_sign` challenge payload declaring the mock-friendly
/// Ed25519 scheme.
pub fn signing_challenge_payload(reference_id: &str, sid: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "accessor_sign",
        "reference_id": reference_id,
        "accessor_id": "accessor-1",
        "sid": sid,
        "hash_method": "SHA256",
        "key_type": "Ed25519",
        "sign_method": "Ed25519",
    }))
    .unwrap_or_default()
}

/// Raw `create_identity_request_result` payload.
pub fn create_identity_request_result_payload(reference_id: &str, request_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "create_identity_request_result",
        "reference_id": reference_id,
        "request_id": request_id,
        "exist": false,
        "accessor_id": "accessor-1",
        "success": true,
    }))
    .unwrap_or_default()
}

/// Raw `create_identity_result` payload.
pub fn create_identity_result_payload(reference_id: &str, request_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "create_identity_result",
        "reference_id": reference_id,
        "request_id": request_id,
        "success": true,
        "secret": "c2VjcmV0",
    }))
    .unwrap_or_default()
}

/// Raw `add_or_update_service_result` payload.
pub fn add_or_update_service_result_payload(reference_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "add_or_update_service_result",
        "reference_id": reference_id,
        "success": true,
    }))
    .unwrap_or_default()
}

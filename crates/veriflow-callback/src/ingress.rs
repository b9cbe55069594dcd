//! Callback ingress
//!
//! Entry point for raw callback payloads pushed by the platform to one
//! role instance. The transport listener itself (ports, body limits) lives
//! outside this crate; whatever receives the bytes hands them here and
//! maps the returned ack onto its responses: [`CallbackAck::Received`] is
//! an empty 204-style acknowledgment, [`CallbackAck::Signature`] carries
//! the JSON body the platform blocks on.
//!
//! Almost every callback is fire-and-forget: decode, publish, acknowledge.
//! The signing challenge is the one RPC-like exception and is handled as an
//! explicit request/response side path rather than being forced through
//! pub/sub: the challenge is published (so waiters can observe it) and
//! *also* answered synchronously with a signature over the subject
//! identifier, using the key stored for the challenge's reference id and
//! the scheme declared in the payload.

use std::sync::Arc;

use serde_json::Value;
use veriflow_core::{
    AccessorSigner, CallbackEvent, ChallengeSignature, NodeId, VeriflowError, VeriflowResult,
};

use crate::bus::EventBus;
use crate::reference_store::IdentityReferenceStore;

/// Acknowledgment for one received payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackAck {
    /// Payload accepted; no response body (HTTP 204 analogue).
    Received,
    /// Signing challenge answered; respond with the signature body
    /// (HTTP 200 analogue).
    Signature(ChallengeSignature),
}

impl CallbackAck {
    /// The JSON response body for this ack, if one is required.
    pub fn body(&self) -> Option<Value> {
        match self {
            CallbackAck::Received => None,
            CallbackAck::Signature(signature) => Some(serde_json::json!({
                "signature": signature.as_str(),
            })),
        }
    }
}

/// Inbound endpoint for one role instance.
pub struct CallbackIngress {
    node_id: NodeId,
    bus: EventBus,
    references: Arc<IdentityReferenceStore>,
    signer: Arc<dyn AccessorSigner>,
}

impl CallbackIngress {
    /// Create an ingress publishing onto `bus`.
    pub fn new(
        node_id: NodeId,
        bus: EventBus,
        references: Arc<IdentityReferenceStore>,
        signer: Arc<dyn AccessorSigner>,
    ) -> Self {
        Self {
            node_id,
            bus,
            references,
            signer,
        }
    }

    /// Accept one raw callback payload.
    ///
    /// Malformed payloads fail with [`VeriflowError::MalformedCallback`]
    /// and never reach the bus. A signing challenge for an unregistered
    /// reference fails with [`VeriflowError::UnknownReference`] after the
    /// challenge event has been published; that failure is fatal for the
    /// operation which triggered the challenge, not retryable. Failures
    /// are isolated per payload: the next `receive` starts clean.
    pub fn receive(&self, raw: &[u8]) -> VeriflowResult<CallbackAck> {
        let value: Value = serde_json::from_slice(raw).map_err(|e| {
            tracing::warn!(node_id = %self.node_id, error = %e, "dropping unparseable callback");
            VeriflowError::malformed(format!("payload is not JSON: {e}"))
        })?;

        let event = match CallbackEvent::from_json(value) {
            Ok(event) => Arc::new(event),
            Err(error) => {
                tracing::warn!(node_id = %self.node_id, %error, "dropping malformed callback");
                return Err(error);
            }
        };

        tracing::debug!(node_id = %self.node_id, kind = %event.kind(), "callback received");

        match event.as_ref() {
            CallbackEvent::SigningChallenge(challenge) => {
                // Publish before answering so a waiter observes the
                // challenge even when signing fails.
                let challenge = challenge.clone();
                self.bus.publish(event);
                let key = self.references.key_for_challenge(&challenge.reference_id)?;
                let signature =
                    self.signer
                        .sign(&challenge.scheme, &key, challenge.sid.as_bytes())?;
                Ok(CallbackAck::Signature(signature))
            }
            _ => {
                self.bus.publish(event);
                Ok(CallbackAck::Received)
            }
        }
    }

    /// The node this ingress belongs to.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use veriflow_core::{AccessorKey, Ed25519AccessorSigner, EventKind, ReferenceId};

    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    fn ingress_with_bus() -> (CallbackIngress, EventBus, Arc<IdentityReferenceStore>) {
        let bus = EventBus::new();
        let references = Arc::new(IdentityReferenceStore::new());
        let ingress = CallbackIngress::new(
            NodeId::from("idp1"),
            bus.clone(),
            references.clone(),
            Arc::new(Ed25519AccessorSigner),
        );
        (ingress, bus, references)
    }

    fn challenge_payload(reference_id: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "type": "accessor_sign",
            "reference_id": reference_id,
            "sid": "cid:1234567890123",
            "hash_method": "SHA256",
            "key_type": "Ed25519",
            "sign_method": "Ed25519",
        }))
        .expect("serialize payload")
    }

    #[tokio::test]
    async fn acknowledges_and_publishes_fire_and_forget_payloads() {
        let (ingress, bus, _) = ingress_with_bus();
        let mut subscription = bus.subscribe();

        let ack = ingress
            .receive(
                &serde_json::to_vec(&json!({
                    "type": "create_request_result",
                    "reference_id": "ref-1",
                    "request_id": "req-1",
                    "success": true,
                }))
                .expect("serialize payload"),
            )
            .expect("receive");

        assert_eq!(ack, CallbackAck::Received);
        assert!(ack.body().is_none());

        let event = subscription.recv().await.expect("published");
        assert_eq!(event.kind(), EventKind::CreateRequestResult);
    }

    #[tokio::test]
    async fn malformed_payload_never_reaches_the_bus() {
        let (ingress, bus, _) = ingress_with_bus();
        let mut subscription = bus.subscribe();

        let err = ingress.receive(b"{not json").expect_err("must reject");
        assert_matches!(err, VeriflowError::MalformedCallback { .. });
        assert!(subscription.try_recv().is_none());

        // The next payload is unaffected
        ingress
            .receive(&challenge_payload("ref-x"))
            .expect_err("unknown reference, but parsed and published");
        assert!(subscription.try_recv().is_some());
    }

    #[tokio::test]
    async fn signing_challenge_returns_signature_body() {
        let (ingress, bus, references) = ingress_with_bus();
        let mut subscription = bus.subscribe();

        references
            .put(
                ReferenceId::from("ref-1"),
                AccessorKey::new(BASE64.encode([9u8; 32])),
            )
            .expect("store reference");

        let ack = ingress
            .receive(&challenge_payload("ref-1"))
            .expect("challenge answered");

        let body = ack.body().expect("signature body");
        assert!(body["signature"].as_str().is_some_and(|s| !s.is_empty()));

        // The challenge is also observable on the bus
        let event = subscription.recv().await.expect("published");
        assert_eq!(event.kind(), EventKind::SigningChallenge);
    }

    #[tokio::test]
    async fn unknown_event_types_are_acknowledged_and_forwarded() {
        let (ingress, bus, _) = ingress_with_bus();
        let mut subscription = bus.subscribe();

        let ack = ingress
            .receive(
                &serde_json::to_vec(&json!({
                    "type": "message_queue_send_success",
                    "node_id": "idp1",
                }))
                .expect("serialize payload"),
            )
            .expect("receive");

        assert_eq!(ack, CallbackAck::Received);
        let event = subscription.recv().await.expect("published");
        assert_eq!(event.kind(), EventKind::Other);
    }

    #[tokio::test]
    async fn unknown_reference_is_fatal_for_the_challenge() {
        let (ingress, _, _) = ingress_with_bus();

        let err = ingress
            .receive(&challenge_payload("never-stored"))
            .expect_err("must fail");
        assert_matches!(err, VeriflowError::UnknownReference { .. });
    }
}

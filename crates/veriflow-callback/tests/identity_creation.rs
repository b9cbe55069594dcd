//! Identity creation at an IdP: the reference id stored before the call
//! correlates the request result, the synchronous signing challenge, and
//! the final result.

use std::sync::Arc;
use std::time::Duration;

use veriflow_callback::{CallbackAck, CallbackNode, IdentityReferenceStore, NodeConfig};
use veriflow_core::{
    AccessorKey, CallbackEvent, CorrelationKey, EventKind, ReferenceId, RoleKind, VeriflowError,
};
use veriflow_testkit::{
    create_identity_request_result_payload, create_identity_result_payload, mock_signature,
    signing_challenge_payload, MockAccessorSigner,
};

fn idp_node() -> (Arc<CallbackNode>, Arc<IdentityReferenceStore>) {
    veriflow_testkit::init_tracing();
    let references = Arc::new(IdentityReferenceStore::new());
    let node = Arc::new(CallbackNode::spawn(
        NodeConfig::new("idp1", RoleKind::IdentityProvider),
        references.clone(),
        Arc::new(MockAccessorSigner),
    ));
    (node, references)
}

#[tokio::test]
async fn full_identity_creation_flow_correlates_by_one_reference() {
    let (idp, references) = idp_node();
    let reference_id = ReferenceId::from("idp-create-ref-1");
    let key = AccessorKey::new("accessor-key-material");
    let sid = "cid:1234567890123";

    // The driver stores the key before issuing the create-identity call
    references
        .put(reference_id.clone(), key.clone())
        .expect("store reference");

    // Phase 1: the platform opened the identity-creation request
    let requested = {
        let idp = idp.clone();
        let key = CorrelationKey::Reference(reference_id.clone());
        tokio::spawn(async move {
            idp.await_event(
                EventKind::CreateIdentityRequestResult,
                key,
                Duration::from_secs(1),
            )
            .await
        })
    };
    tokio::task::yield_now().await;
    idp.receive(&create_identity_request_result_payload(
        reference_id.as_str(),
        "req-10",
    ))
    .expect("ack");
    let event = requested.await.expect("join").expect("resolved");
    let CallbackEvent::CreateIdentityRequestResult(result) = event.as_ref() else {
        panic!("expected create_identity_request_result, got {event:?}");
    };
    assert!(result.success);
    assert!(!result.exist);
    assert_eq!(result.accessor_id.as_deref(), Some("accessor-1"));

    // Phase 2: the synchronous challenge; the ack carries the signature
    let challenged = {
        let idp = idp.clone();
        let key = CorrelationKey::Reference(reference_id.clone());
        tokio::spawn(async move {
            idp.await_event(EventKind::SigningChallenge, key, Duration::from_secs(1))
                .await
        })
    };
    tokio::task::yield_now().await;

    let ack = idp
        .receive(&signing_challenge_payload(reference_id.as_str(), sid))
        .expect("challenge answered");
    let CallbackAck::Signature(signature) = ack else {
        panic!("expected signature ack, got {ack:?}");
    };
    assert_eq!(signature.as_str(), mock_signature(&key, sid.as_bytes()));

    let event = challenged.await.expect("join").expect("resolved");
    let CallbackEvent::SigningChallenge(challenge) = event.as_ref() else {
        panic!("expected accessor_sign, got {event:?}");
    };
    assert_eq!(challenge.sid, sid);

    // A retried challenge can still read the key: reads do not consume
    idp.receive(&signing_challenge_payload(reference_id.as_str(), sid))
        .expect("retried challenge answered");

    // Phase 3: the identity exists
    let finished = {
        let idp = idp.clone();
        let key = CorrelationKey::Reference(reference_id.clone());
        tokio::spawn(async move {
            idp.await_event(EventKind::CreateIdentityResult, key, Duration::from_secs(1))
                .await
        })
    };
    tokio::task::yield_now().await;
    idp.receive(&create_identity_result_payload(reference_id.as_str(), "req-10"))
        .expect("ack");
    let event = finished.await.expect("join").expect("resolved");
    let CallbackEvent::CreateIdentityResult(result) = event.as_ref() else {
        panic!("expected create_identity_result, got {event:?}");
    };
    assert!(result.success);
    assert!(result.secret.is_some());
}

#[tokio::test]
async fn challenge_for_unstored_reference_fails_fast() {
    let (idp, _references) = idp_node();

    let err = idp
        .receive(&signing_challenge_payload("never-stored", "cid:1"))
        .expect_err("must fail");
    assert!(matches!(err, VeriflowError::UnknownReference { .. }));
}

#[tokio::test]
async fn reference_ids_are_single_use() {
    let (_idp, references) = idp_node();
    let reference_id = ReferenceId::from("ref-reuse");

    references
        .put(reference_id.clone(), AccessorKey::new("first"))
        .expect("first put");
    let err = references
        .put(reference_id, AccessorKey::new("second"))
        .expect_err("reuse must fail");
    assert!(matches!(err, VeriflowError::DuplicateReference { .. }));
}

//! End-to-end lifecycle of a 1-IdP, 1-AS data request, driven purely
//! through raw callback payloads: RP creates a request, the IdP accepts,
//! the AS signs and sends data, the request completes and closes.

use std::sync::Arc;
use std::time::Duration;

use veriflow_callback::{CallbackNode, IdentityReferenceStore, NodeConfig, StatusTransition};
use veriflow_core::{
    CallbackEvent, CorrelationKey, EventKind, ReferenceId, RequestId, RequestState, RoleKind,
    VeriflowResult,
};
use veriflow_testkit::{
    create_request_result_payload, data_request_payload, incoming_request_payload,
    response_result_payload, send_data_result_payload, MockAccessorSigner, StatusSnapshotBuilder,
};

fn test_nodes() -> (Arc<CallbackNode>, Arc<CallbackNode>, Arc<CallbackNode>) {
    veriflow_testkit::init_tracing();
    let references = Arc::new(IdentityReferenceStore::new());
    let signer = Arc::new(MockAccessorSigner);
    let rp = Arc::new(CallbackNode::spawn(
        NodeConfig::new("rp1", RoleKind::RelyingParty),
        references.clone(),
        signer.clone(),
    ));
    let idp = Arc::new(CallbackNode::spawn(
        NodeConfig::new("idp1", RoleKind::IdentityProvider),
        references.clone(),
        signer.clone(),
    ));
    let asn = Arc::new(CallbackNode::spawn(
        NodeConfig::new("as1", RoleKind::AttributeService),
        references,
        signer,
    ));
    (rp, idp, asn)
}

/// Register a waiter on `node` and make sure it is installed before the
/// caller feeds the payload that resolves it.
async fn expect_event(
    node: &Arc<CallbackNode>,
    kind: EventKind,
    key: CorrelationKey,
) -> tokio::task::JoinHandle<VeriflowResult<Arc<CallbackEvent>>> {
    let node = node.clone();
    let handle =
        tokio::spawn(async move { node.await_event(kind, key, Duration::from_secs(1)).await });
    tokio::task::yield_now().await;
    handle
}

fn reference(id: &str) -> CorrelationKey {
    CorrelationKey::Reference(ReferenceId::from(id))
}

fn request(id: &str) -> CorrelationKey {
    CorrelationKey::Request(RequestId::from(id))
}

#[tokio::test]
async fn one_idp_one_as_request_runs_to_closure() {
    let (rp, idp, asn) = test_nodes();
    let request_id = "req-1";

    let mut rp_transitions = rp.aggregator().take_transitions().expect("transition feed");
    let mut rp_events = rp.subscribe();

    // RP creates the request; the platform acknowledges asynchronously
    let created = expect_event(&rp, EventKind::CreateRequestResult, reference("rp-ref-1")).await;
    rp.receive(&create_request_result_payload("rp-ref-1", request_id))
        .expect("ack");
    let event = created.await.expect("join").expect("resolved");
    let CallbackEvent::CreateRequestResult(result) = event.as_ref() else {
        panic!("expected create_request_result, got {event:?}");
    };
    assert!(result.success);
    assert_eq!(result.request_id.as_ref().map(|r| r.as_str()), Some(request_id));

    // Pending status lands on the RP
    let pending = expect_event(&rp, EventKind::RequestStatus, request(request_id)).await;
    rp.receive(&StatusSnapshotBuilder::new(request_id).block_height(10).payload())
        .expect("ack");
    pending.await.expect("join").expect("resolved");

    let stored = rp.status_of(&RequestId::from(request_id)).expect("tracked");
    assert_eq!(stored.status, RequestState::Pending);
    assert_eq!(stored.answered_idp_count, 0);
    assert!(!stored.closed);

    // IdP is asked for consent
    let incoming = expect_event(&idp, EventKind::IncomingRequest, request(request_id)).await;
    idp.receive(&incoming_request_payload(request_id, "rp1"))
        .expect("ack");
    let event = incoming.await.expect("join").expect("resolved");
    let CallbackEvent::IncomingRequest(incoming) = event.as_ref() else {
        panic!("expected incoming_request, got {event:?}");
    };
    assert_eq!(incoming.requester_node_id.as_str(), "rp1");
    assert_eq!(incoming.namespace, "cid");
    assert!(!incoming.request_message_salt.is_empty());

    // IdP accepts; its own submission result arrives by reference id
    let responded = expect_event(&idp, EventKind::ResponseResult, reference("idp-ref-1")).await;
    idp.receive(&response_result_payload("idp-ref-1", request_id, true))
        .expect("ack");
    responded.await.expect("join").expect("resolved");

    // RP sees the request confirmed with one answer
    let confirmed = expect_event(&rp, EventKind::RequestStatus, request(request_id)).await;
    rp.receive(
        &StatusSnapshotBuilder::new(request_id)
            .status(RequestState::Confirmed)
            .answered_by("idp1")
            .block_height(11)
            .payload(),
    )
    .expect("ack");
    confirmed.await.expect("join").expect("resolved");

    let stored = rp.status_of(&RequestId::from(request_id)).expect("tracked");
    assert_eq!(stored.status, RequestState::Confirmed);
    assert_eq!(stored.answered_idp_count, 1);
    assert_eq!(stored.response_valid_list.len(), 1);

    // AS receives the data request and submits data
    let data_requested = expect_event(&asn, EventKind::DataRequest, request(request_id)).await;
    asn.receive(&data_request_payload(request_id)).expect("ack");
    let event = data_requested.await.expect("join").expect("resolved");
    let CallbackEvent::DataRequest(data_request) = event.as_ref() else {
        panic!("expected data_request, got {event:?}");
    };
    assert_eq!(data_request.service_id.as_str(), "bank_statement");
    assert_eq!(data_request.response_signature_list.len(), 1);

    let sent = expect_event(&asn, EventKind::SendDataResult, reference("as-ref-1")).await;
    asn.receive(&send_data_result_payload("as-ref-1", request_id, true))
        .expect("ack");
    sent.await.expect("join").expect("resolved");

    // Same status, new signed count: the distinguishable signed-data step
    let signed = expect_event(&rp, EventKind::RequestStatus, request(request_id)).await;
    rp.receive(
        &StatusSnapshotBuilder::new(request_id)
            .status(RequestState::Confirmed)
            .answered_by("idp1")
            .service_counts(1, 0)
            .block_height(12)
            .payload(),
    )
    .expect("ack");
    signed.await.expect("join").expect("resolved");

    // Data received: completed, then closed
    let completed = expect_event(&rp, EventKind::RequestStatus, request(request_id)).await;
    rp.receive(
        &StatusSnapshotBuilder::new(request_id)
            .status(RequestState::Completed)
            .answered_by("idp1")
            .service_counts(1, 1)
            .block_height(13)
            .payload(),
    )
    .expect("ack");
    completed.await.expect("join").expect("resolved");

    let closed = expect_event(&rp, EventKind::RequestStatus, request(request_id)).await;
    rp.receive(
        &StatusSnapshotBuilder::new(request_id)
            .status(RequestState::Completed)
            .answered_by("idp1")
            .service_counts(1, 1)
            .closed()
            .block_height(14)
            .payload(),
    )
    .expect("ack");
    closed.await.expect("join").expect("resolved");

    let stored = rp.status_of(&RequestId::from(request_id)).expect("tracked");
    assert_eq!(stored.status, RequestState::Completed);
    assert!(stored.closed);
    assert_eq!(stored.service_list[0].signed_data_count, 1);
    assert_eq!(stored.service_list[0].received_data_count, 1);
    assert_eq!(stored.block_height, 14);

    // The RP observed exactly five status updates on its bus
    let mut status_updates = 0;
    while let Some(event) = rp_events.try_recv() {
        if event.kind() == EventKind::RequestStatus {
            status_updates += 1;
        }
    }
    assert_eq!(status_updates, 5);

    // And the aggregator narrated the full lifecycle
    let mut observed = Vec::new();
    while let Ok((_, transition)) = rp_transitions.try_recv() {
        observed.push(transition);
    }
    assert_eq!(
        observed,
        vec![
            StatusTransition::Status(RequestState::Pending),
            StatusTransition::Status(RequestState::Confirmed),
            StatusTransition::DataSigned {
                service_id: "bank_statement".into()
            },
            StatusTransition::Status(RequestState::Completed),
            StatusTransition::Closed,
        ]
    );
}

#[tokio::test]
async fn closed_request_ignores_late_snapshots() {
    let (rp, _idp, _asn) = test_nodes();
    let request_id = "req-2";

    let closed = expect_event(&rp, EventKind::RequestStatus, request(request_id)).await;
    rp.receive(
        &StatusSnapshotBuilder::new(request_id)
            .status(RequestState::Completed)
            .answered_by("idp1")
            .service_counts(1, 1)
            .closed()
            .block_height(20)
            .payload(),
    )
    .expect("ack");
    closed.await.expect("join").expect("resolved");

    // A later snapshot for the closed request changes nothing
    let late = expect_event(&rp, EventKind::RequestStatus, request(request_id)).await;
    rp.receive(
        &StatusSnapshotBuilder::new(request_id)
            .status(RequestState::Completed)
            .answered_by("idp1")
            .answered_by("idp2")
            .service_counts(2, 2)
            .closed()
            .block_height(21)
            .payload(),
    )
    .expect("ack");
    // The event still reaches waiters; only the aggregate is frozen
    late.await.expect("join").expect("resolved");

    let stored = rp.status_of(&RequestId::from(request_id)).expect("tracked");
    assert_eq!(stored.block_height, 20);
    assert_eq!(stored.answered_idp_count, 1);
}

#[tokio::test]
async fn reordered_snapshot_is_dropped_without_disturbing_state() {
    let (rp, _idp, _asn) = test_nodes();
    let request_id = "req-3";

    let first = expect_event(&rp, EventKind::RequestStatus, request(request_id)).await;
    rp.receive(
        &StatusSnapshotBuilder::new(request_id)
            .status(RequestState::Confirmed)
            .answered_by("idp1")
            .block_height(11)
            .payload(),
    )
    .expect("ack");
    first.await.expect("join").expect("resolved");

    // The pending snapshot from block 10 arrives late
    let stale = expect_event(&rp, EventKind::RequestStatus, request(request_id)).await;
    rp.receive(&StatusSnapshotBuilder::new(request_id).block_height(10).payload())
        .expect("ack");
    stale.await.expect("join").expect("resolved");

    let stored = rp.status_of(&RequestId::from(request_id)).expect("tracked");
    assert_eq!(stored.status, RequestState::Confirmed);
    assert_eq!(stored.block_height, 11);
}

#[tokio::test]
async fn rejection_on_timeout_is_terminal() {
    let (rp, _idp, _asn) = test_nodes();
    let request_id = "req-4";

    rp.receive(&StatusSnapshotBuilder::new(request_id).block_height(30).payload())
        .expect("ack");

    let rejected = expect_event(&rp, EventKind::RequestStatus, request(request_id)).await;
    rp.receive(
        &StatusSnapshotBuilder::new(request_id)
            .status(RequestState::Rejected)
            .timed_out()
            .block_height(31)
            .payload(),
    )
    .expect("ack");
    rejected.await.expect("join").expect("resolved");

    let stored = rp.status_of(&RequestId::from(request_id)).expect("tracked");
    assert_eq!(stored.status, RequestState::Rejected);
    assert!(stored.timed_out);

    // Nothing can move a rejected request
    rp.receive(
        &StatusSnapshotBuilder::new(request_id)
            .status(RequestState::Confirmed)
            .answered_by("idp1")
            .block_height(32)
            .payload(),
    )
    .expect("ack");
    tokio::task::yield_now().await;

    let stored = rp.status_of(&RequestId::from(request_id)).expect("tracked");
    assert_eq!(stored.status, RequestState::Rejected);
}

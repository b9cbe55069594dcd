//! Request lifecycle aggregation
//!
//! Folds the stream of `request_status` snapshots into authoritative
//! per-request state. The platform always sends complete snapshots, so the
//! aggregator stores the latest accepted one rather than reconstructing
//! counts from deltas; its real work is ordering and invariant enforcement:
//!
//! - `block_height` must not go backwards (transport reordering is logged
//!   as a stale snapshot and dropped),
//! - the counting fields are cumulative and must never decrease,
//! - `closed=true` and `status=rejected` are absorbing,
//! - same-status snapshots that differ only in counts still produce
//!   distinguishable sub-transitions (`DataSigned`, `Closed`) for
//!   observers.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use veriflow_core::{
    RequestId, RequestState, RequestStatusSnapshot, ServiceId, VeriflowError,
};

/// One observable lifecycle transition, derived by comparing consecutive
/// accepted snapshots for a request.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusTransition {
    /// The top-level status changed to (or was created at) this state.
    Status(RequestState),
    /// Still `confirmed`, but an AS signed data for this service since the
    /// previous snapshot.
    DataSigned {
        /// The service whose signed count grew.
        service_id: ServiceId,
    },
    /// The completed request was closed. Terminal.
    Closed,
    /// The request timed out before its thresholds were met.
    TimedOut,
}

/// Why a snapshot was not applied.
#[derive(Debug, Clone, PartialEq)]
pub enum IgnoreReason {
    /// Block height at or below the stored snapshot: transport reordering.
    StaleBlockHeight(VeriflowError),
    /// The stored state is terminal; nothing further is meaningful.
    Terminal,
    /// The snapshot violates a counting or state-machine invariant.
    Inconsistent {
        /// The violated invariant.
        violation: String,
    },
}

/// Result of applying one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// First snapshot seen for this request id; state created from it.
    Created {
        /// Transitions observable from the initial snapshot.
        transitions: Vec<StatusTransition>,
    },
    /// Snapshot accepted and stored, replacing the previous one.
    Applied {
        /// Transitions detected against the previous snapshot.
        transitions: Vec<StatusTransition>,
    },
    /// Snapshot dropped.
    Ignored(IgnoreReason),
}

impl ApplyOutcome {
    /// The detected transitions, empty when the snapshot was ignored.
    pub fn transitions(&self) -> &[StatusTransition] {
        match self {
            ApplyOutcome::Created { transitions } | ApplyOutcome::Applied { transitions } => {
                transitions
            }
            ApplyOutcome::Ignored(_) => &[],
        }
    }
}

/// Folds status snapshots into per-request authoritative state.
pub struct RequestLifecycleAggregator {
    requests: Mutex<HashMap<RequestId, RequestStatusSnapshot>>,
    transitions_tx: mpsc::UnboundedSender<(RequestId, StatusTransition)>,
    transitions_rx: Mutex<Option<mpsc::UnboundedReceiver<(RequestId, StatusTransition)>>>,
}

impl RequestLifecycleAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        let (transitions_tx, transitions_rx) = mpsc::unbounded_channel();
        Self {
            requests: Mutex::new(HashMap::new()),
            transitions_tx,
            transitions_rx: Mutex::new(Some(transitions_rx)),
        }
    }

    /// Take the transition feed.
    ///
    /// Every transition from every `apply` call is forwarded here, so an
    /// observer can react to sub-transitions without polling snapshots.
    /// There is one feed; the second call returns `None`.
    pub fn take_transitions(
        &self,
    ) -> Option<mpsc::UnboundedReceiver<(RequestId, StatusTransition)>> {
        self.transitions_rx.lock().take()
    }

    /// Apply one status snapshot.
    pub fn apply(&self, snapshot: &RequestStatusSnapshot) -> ApplyOutcome {
        let mut requests = self.requests.lock();

        let outcome = match requests.get(&snapshot.request_id) {
            None => {
                if let Some(violation) = internal_violation(snapshot) {
                    ApplyOutcome::Ignored(IgnoreReason::Inconsistent { violation })
                } else {
                    let transitions = initial_transitions(snapshot);
                    requests.insert(snapshot.request_id.clone(), snapshot.clone());
                    ApplyOutcome::Created { transitions }
                }
            }
            Some(stored) => {
                if stored.is_terminal() {
                    ApplyOutcome::Ignored(IgnoreReason::Terminal)
                } else if snapshot.block_height < stored.block_height {
                    ApplyOutcome::Ignored(IgnoreReason::StaleBlockHeight(
                        VeriflowError::StaleSnapshot {
                            request_id: snapshot.request_id.to_string(),
                            stored: stored.block_height,
                            received: snapshot.block_height,
                        },
                    ))
                } else if let Some(violation) =
                    internal_violation(snapshot).or_else(|| regression(stored, snapshot))
                {
                    ApplyOutcome::Ignored(IgnoreReason::Inconsistent { violation })
                } else {
                    let transitions = detect_transitions(stored, snapshot);
                    requests.insert(snapshot.request_id.clone(), snapshot.clone());
                    ApplyOutcome::Applied { transitions }
                }
            }
        };
        drop(requests);

        match &outcome {
            ApplyOutcome::Ignored(IgnoreReason::Terminal) => {
                tracing::debug!(
                    request_id = %snapshot.request_id,
                    "dropping snapshot for terminal request"
                );
            }
            ApplyOutcome::Ignored(IgnoreReason::StaleBlockHeight(error)) => {
                tracing::warn!(%error, "dropping reordered status snapshot");
            }
            ApplyOutcome::Ignored(IgnoreReason::Inconsistent { violation }) => {
                tracing::warn!(
                    request_id = %snapshot.request_id,
                    violation,
                    "dropping inconsistent status snapshot"
                );
            }
            ApplyOutcome::Created { transitions } | ApplyOutcome::Applied { transitions } => {
                for transition in transitions {
                    tracing::debug!(
                        request_id = %snapshot.request_id,
                        ?transition,
                        "request lifecycle transition"
                    );
                    // Ignore send errors: no one took the feed, or the
                    // receiver is gone
                    let _ = self
                        .transitions_tx
                        .send((snapshot.request_id.clone(), transition.clone()));
                }
            }
        }

        outcome
    }

    /// Latest accepted snapshot for `request_id`, if any.
    pub fn status_of(&self, request_id: &RequestId) -> Option<RequestStatusSnapshot> {
        self.requests.lock().get(request_id).cloned()
    }

    /// Number of requests currently tracked.
    pub fn tracked_requests(&self) -> usize {
        self.requests.lock().len()
    }

    /// Drop the tracked state for a request the driver no longer cares
    /// about.
    pub fn forget(&self, request_id: &RequestId) -> Option<RequestStatusSnapshot> {
        self.requests.lock().remove(request_id)
    }
}

impl Default for RequestLifecycleAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Invariants a snapshot must satisfy on its own.
fn internal_violation(snapshot: &RequestStatusSnapshot) -> Option<String> {
    if (snapshot.answered_idp_count as usize) > snapshot.response_valid_list.len() {
        return Some(format!(
            "answered_idp_count {} exceeds {} recorded IdP responses",
            snapshot.answered_idp_count,
            snapshot.response_valid_list.len()
        ));
    }
    None
}

/// Monotonicity checks of a new snapshot against the stored one.
fn regression(stored: &RequestStatusSnapshot, snapshot: &RequestStatusSnapshot) -> Option<String> {
    if let (Some(old_rank), Some(new_rank)) = (stored.status.rank(), snapshot.status.rank()) {
        if new_rank < old_rank {
            return Some(format!(
                "status regressed from {} to {}",
                stored.status, snapshot.status
            ));
        }
    }
    if snapshot.status == RequestState::Rejected && stored.status == RequestState::Completed {
        return Some("completed request cannot become rejected".to_string());
    }
    if snapshot.answered_idp_count < stored.answered_idp_count {
        return Some(format!(
            "answered_idp_count regressed from {} to {}",
            stored.answered_idp_count, snapshot.answered_idp_count
        ));
    }
    if stored.timed_out && !snapshot.timed_out {
        return Some("timed_out flag cannot clear".to_string());
    }
    for old in &stored.service_list {
        let Some(new) = snapshot.service(&old.service_id) else {
            return Some(format!("service {} disappeared", old.service_id));
        };
        if new.signed_data_count < old.signed_data_count {
            return Some(format!(
                "signed_data_count for {} regressed from {} to {}",
                old.service_id, old.signed_data_count, new.signed_data_count
            ));
        }
        if new.received_data_count < old.received_data_count {
            return Some(format!(
                "received_data_count for {} regressed from {} to {}",
                old.service_id, old.received_data_count, new.received_data_count
            ));
        }
    }
    None
}

/// Transitions observable from the very first snapshot of a request.
fn initial_transitions(snapshot: &RequestStatusSnapshot) -> Vec<StatusTransition> {
    let mut transitions = vec![StatusTransition::Status(snapshot.status)];
    if snapshot.timed_out {
        transitions.push(StatusTransition::TimedOut);
    }
    if snapshot.status == RequestState::Completed && snapshot.closed {
        transitions.push(StatusTransition::Closed);
    }
    transitions
}

/// Transitions between two accepted snapshots.
fn detect_transitions(
    stored: &RequestStatusSnapshot,
    snapshot: &RequestStatusSnapshot,
) -> Vec<StatusTransition> {
    let mut transitions = Vec::new();

    if snapshot.status != stored.status {
        transitions.push(StatusTransition::Status(snapshot.status));
    }

    if snapshot.status == RequestState::Confirmed {
        for new in &snapshot.service_list {
            let previously_signed = stored
                .service(&new.service_id)
                .map(|old| old.signed_data_count)
                .unwrap_or(0);
            if new.signed_data_count > previously_signed {
                transitions.push(StatusTransition::DataSigned {
                    service_id: new.service_id.clone(),
                });
            }
        }
    }

    if snapshot.status == RequestState::Completed && snapshot.closed && !stored.closed {
        transitions.push(StatusTransition::Closed);
    }

    if snapshot.timed_out && !stored.timed_out {
        transitions.push(StatusTransition::TimedOut);
    }

    transitions
}

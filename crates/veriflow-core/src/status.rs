//! Request lifecycle status model
//!
//! The platform reports request progress as complete snapshots, not deltas.
//! [`RequestStatusSnapshot`] is the wire shape of one `request_status`
//! callback; the aggregator stores the latest accepted snapshot per request
//! and detects transitions by comparing consecutive ones.

use crate::identifiers::{NodeId, RequestId, ServiceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level lifecycle state of a request.
///
/// `pending → confirmed → completed` is the happy path; `rejected` is an
/// alternate terminal reachable while the IdP/AS thresholds are unmet.
/// Within `confirmed` and `completed` the snapshots are further
/// distinguished by service counts and the `closed` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    /// Created, no qualifying IdP response yet.
    Pending,
    /// Enough IdP responses accrued; data collection may proceed.
    Confirmed,
    /// All requested data received.
    Completed,
    /// Thresholds were not met before timeout.
    Rejected,
}

impl RequestState {
    /// Progress rank along the happy path. `Rejected` has no rank: it is
    /// terminal from anywhere before completion.
    pub fn rank(self) -> Option<u8> {
        match self {
            RequestState::Pending => Some(0),
            RequestState::Confirmed => Some(1),
            RequestState::Completed => Some(2),
            RequestState::Rejected => None,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Pending => write!(f, "pending"),
            RequestState::Confirmed => write!(f, "confirmed"),
            RequestState::Completed => write!(f, "completed"),
            RequestState::Rejected => write!(f, "rejected"),
        }
    }
}

/// Per-service progress inside a status snapshot.
///
/// `signed_data_count` counts AS nodes whose data signature is on the
/// ledger; `received_data_count` counts data payloads actually delivered.
/// Both are cumulative and must never decrease within one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// The service this entry tracks.
    pub service_id: ServiceId,
    /// Minimum number of AS responses required for this service.
    pub min_as: u32,
    /// AS nodes that have signed data for this service so far.
    pub signed_data_count: u32,
    /// AS data payloads received so far.
    pub received_data_count: u32,
}

/// Validation verdict for one IdP's response.
///
/// `None` means the platform has not validated that dimension yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseValidity {
    /// The IdP that responded.
    pub idp_id: NodeId,
    /// Whether the identity proof checked out, once validated.
    pub valid_proof: Option<bool>,
    /// Whether the declared IAL checked out, once validated.
    pub valid_ial: Option<bool>,
}

/// Complete status snapshot for one request, as pushed by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStatusSnapshot {
    /// The workflow instance this snapshot describes.
    pub request_id: RequestId,
    /// Top-level lifecycle state.
    pub status: RequestState,
    /// Protocol mode the request was created with.
    pub mode: u8,
    /// Minimum number of IdP responses required.
    pub min_idp: u32,
    /// IdPs that have produced an accept/reject so far.
    pub answered_idp_count: u32,
    /// Whether the request has been closed. Monotonic false→true; `true`
    /// is terminal.
    pub closed: bool,
    /// Whether the request timed out before its thresholds were met.
    pub timed_out: bool,
    /// Per-service progress, in the order services were requested.
    #[serde(default)]
    pub service_list: Vec<ServiceStatus>,
    /// Per-IdP response validation verdicts.
    #[serde(default)]
    pub response_valid_list: Vec<ResponseValidity>,
    /// Platform-supplied ordering token. Snapshots for one request arrive
    /// in non-decreasing block height; anything lower than the stored
    /// height is transport reordering.
    pub block_height: u64,
}

impl RequestStatusSnapshot {
    /// Whether this snapshot is in a terminal state: closed, or rejected.
    pub fn is_terminal(&self) -> bool {
        self.closed || self.status == RequestState::Rejected
    }

    /// Look up the service entry for `service_id`, if present.
    pub fn service(&self, service_id: &ServiceId) -> Option<&ServiceStatus> {
        self.service_list.iter().find(|s| &s.service_id == service_id)
    }
}

//! Callback event model
//!
//! Every platform callback is a JSON object discriminated by a `type`
//! string. Events are decoded once at the ingress and are immutable from
//! then on; the bus hands subscribers shared references, never copies they
//! could mutate.
//!
//! Two correlation spaces exist side by side. Operation results
//! (`*_result`) and the signing challenge carry the caller-chosen
//! `reference_id` of the call that caused them; workflow notifications
//! (`request_status`, `incoming_request`, `data_request`) carry the
//! platform-assigned `request_id`. [`CallbackEvent::correlation_key`]
//! selects the right field per event kind so the registry never matches on
//! the wrong space.

use crate::errors::{VeriflowError, VeriflowResult};
use crate::identifiers::{NodeId, ReferenceId, RequestId, ServiceId};
use crate::signing::SigningScheme;
use crate::status::RequestStatusSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Structured platform error carried by failed `*_result` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformError {
    /// Platform error code.
    pub code: Option<i64>,
    /// Human-readable message.
    pub message: Option<String>,
}

/// Result of a create-request call, correlated by reference id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequestResult {
    /// Reference id of the initiating call.
    pub reference_id: ReferenceId,
    /// Request id the platform assigned, when creation got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    /// Whether the request was accepted onto the platform.
    pub success: bool,
    /// Platform error when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PlatformError>,
}

/// Result of an IdP create-response call, correlated by reference id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseResult {
    /// Reference id of the initiating call.
    pub reference_id: ReferenceId,
    /// The request the response belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    /// Whether the response was accepted.
    pub success: bool,
    /// Platform error when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PlatformError>,
}

/// Result of the request phase of identity creation, correlated by
/// reference id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIdentityRequestResult {
    /// Reference id of the initiating call.
    pub reference_id: ReferenceId,
    /// Request id of the consent request the platform opened, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    /// Whether an identity already existed for the subject.
    #[serde(default)]
    pub exist: bool,
    /// Accessor id the platform assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessor_id: Option<String>,
    /// Whether the identity-creation request was accepted.
    pub success: bool,
    /// Platform error when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PlatformError>,
}

/// Final result of identity creation, correlated by reference id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIdentityResult {
    /// Reference id of the initiating call.
    pub reference_id: ReferenceId,
    /// Request id of the consent request, if one was opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    /// Whether the identity now exists.
    pub success: bool,
    /// Accessor secret returned on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Platform error when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PlatformError>,
}

/// The one RPC-like callback: a signing challenge the platform blocks on.
///
/// Correlates by reference id; the ingress must answer it synchronously
/// with a signature over `sid` under the declared scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningChallenge {
    /// Reference id of the identity-creation call that triggered the
    /// challenge.
    pub reference_id: ReferenceId,
    /// Accessor id the challenge is for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessor_id: Option<String>,
    /// Subject identifier to sign (`namespace:identifier`).
    pub sid: String,
    /// Platform-computed hash of `sid`, for cross-checking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid_hash: Option<String>,
    /// The declared signing scheme, honored verbatim.
    #[serde(flatten)]
    pub scheme: SigningScheme,
}

/// One service entry inside an incoming request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRequestEntry {
    /// Requested service.
    pub service_id: ServiceId,
    /// AS nodes the RP addressed, empty meaning any.
    #[serde(default)]
    pub as_id_list: Vec<NodeId>,
    /// Minimum AS responses required.
    pub min_as: u32,
    /// Opaque service parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_params: Option<String>,
}

/// Consent request delivered to an IdP, correlated by request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingRequest {
    /// The workflow instance.
    pub request_id: RequestId,
    /// Protocol mode.
    pub mode: u8,
    /// Subject namespace.
    pub namespace: String,
    /// Subject identifier within the namespace.
    pub identifier: String,
    /// Message shown to the subject.
    pub request_message: String,
    /// Salted hash of the request message.
    pub request_message_hash: String,
    /// Salt the platform applied to the message hash.
    pub request_message_salt: String,
    /// The RP node that created the request.
    pub requester_node_id: NodeId,
    /// Minimum identity assurance level.
    pub min_ial: f64,
    /// Minimum authentication assurance level.
    pub min_aal: f64,
    /// Services the RP is asking for.
    #[serde(default)]
    pub data_request_list: Vec<DataRequestEntry>,
}

/// Data request delivered to an AS, correlated by request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRequest {
    /// The workflow instance.
    pub request_id: RequestId,
    /// Protocol mode.
    pub mode: u8,
    /// Subject namespace.
    pub namespace: String,
    /// Subject identifier within the namespace.
    pub identifier: String,
    /// The service being requested from this AS.
    pub service_id: ServiceId,
    /// Opaque service parameters from the RP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_params: Option<String>,
    /// Highest IAL among the qualifying IdP responses.
    pub max_ial: f64,
    /// Highest AAL among the qualifying IdP responses.
    pub max_aal: f64,
    /// Signatures of the qualifying IdP responses.
    #[serde(default)]
    pub response_signature_list: Vec<String>,
}

/// Result of an AS send-data call, correlated by reference id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendDataResult {
    /// Reference id of the initiating call.
    pub reference_id: ReferenceId,
    /// The request the data belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    /// Whether the data was accepted.
    pub success: bool,
    /// Platform error when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PlatformError>,
}

/// Result of an AS add-or-update-service call, correlated by reference id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOrUpdateServiceResult {
    /// Reference id of the initiating call.
    pub reference_id: ReferenceId,
    /// Whether the service registration was accepted.
    pub success: bool,
    /// Platform error when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PlatformError>,
}

/// Discriminator for callback events, mirroring the wire `type` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `create_request_result`
    CreateRequestResult,
    /// `request_status`
    RequestStatus,
    /// `incoming_request`
    IncomingRequest,
    /// `response_result`
    ResponseResult,
    /// `accessor_sign`
    SigningChallenge,
    /// `create_identity_request_result`
    CreateIdentityRequestResult,
    /// `create_identity_result`
    CreateIdentityResult,
    /// `data_request`
    DataRequest,
    /// `send_data_result`
    SendDataResult,
    /// `add_or_update_service_result`
    AddOrUpdateServiceResult,
    /// Any `type` tag this crate does not model.
    Other,
}

impl EventKind {
    /// The wire `type` tag for this kind, where one exists.
    pub fn wire_tag(self) -> &'static str {
        match self {
            EventKind::CreateRequestResult => "create_request_result",
            EventKind::RequestStatus => "request_status",
            EventKind::IncomingRequest => "incoming_request",
            EventKind::ResponseResult => "response_result",
            EventKind::SigningChallenge => "accessor_sign",
            EventKind::CreateIdentityRequestResult => "create_identity_request_result",
            EventKind::CreateIdentityResult => "create_identity_result",
            EventKind::DataRequest => "data_request",
            EventKind::SendDataResult => "send_data_result",
            EventKind::AddOrUpdateServiceResult => "add_or_update_service_result",
            EventKind::Other => "other",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_tag())
    }
}

/// The field an event kind correlates on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    /// Caller-chosen reference id of the initiating operation.
    Reference(ReferenceId),
    /// Platform-assigned request id of the workflow instance.
    Request(RequestId),
}

impl CorrelationKey {
    /// The raw key string.
    pub fn as_str(&self) -> &str {
        match self {
            CorrelationKey::Reference(id) => id.as_str(),
            CorrelationKey::Request(id) => id.as_str(),
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One decoded platform callback.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackEvent {
    /// Result of a create-request call.
    CreateRequestResult(CreateRequestResult),
    /// Status snapshot for a request.
    RequestStatus(RequestStatusSnapshot),
    /// Consent request pushed to an IdP.
    IncomingRequest(IncomingRequest),
    /// Result of an IdP create-response call.
    ResponseResult(ResponseResult),
    /// Synchronous signing challenge.
    SigningChallenge(SigningChallenge),
    /// Result of the identity-creation request phase.
    CreateIdentityRequestResult(CreateIdentityRequestResult),
    /// Final identity-creation result.
    CreateIdentityResult(CreateIdentityResult),
    /// Data request pushed to an AS.
    DataRequest(DataRequest),
    /// Result of an AS send-data call.
    SendDataResult(SendDataResult),
    /// Result of an AS service registration call.
    AddOrUpdateServiceResult(AddOrUpdateServiceResult),
    /// Callback with a `type` tag this crate does not model, forwarded
    /// as-is.
    Other {
        /// The unrecognized `type` tag.
        event_type: String,
        /// The full raw payload.
        payload: Value,
    },
}

impl CallbackEvent {
    /// Decode a callback payload that has already passed JSON parsing.
    ///
    /// Known `type` tags decode into their typed variant; a payload whose
    /// declared shape does not hold is a [`VeriflowError::MalformedCallback`].
    /// Unknown tags become [`CallbackEvent::Other`] so they still reach the
    /// bus.
    pub fn from_json(value: Value) -> VeriflowResult<Self> {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| VeriflowError::malformed("missing `type` discriminator"))?
            .to_string();

        fn decode<T: serde::de::DeserializeOwned>(tag: &str, value: Value) -> VeriflowResult<T> {
            serde_json::from_value(value)
                .map_err(|e| VeriflowError::malformed(format!("invalid `{tag}` payload: {e}")))
        }

        Ok(match tag.as_str() {
            "create_request_result" => Self::CreateRequestResult(decode(&tag, value)?),
            "request_status" => Self::RequestStatus(decode(&tag, value)?),
            "incoming_request" => Self::IncomingRequest(decode(&tag, value)?),
            "response_result" => Self::ResponseResult(decode(&tag, value)?),
            "accessor_sign" => Self::SigningChallenge(decode(&tag, value)?),
            "create_identity_request_result" => {
                Self::CreateIdentityRequestResult(decode(&tag, value)?)
            }
            "create_identity_result" => Self::CreateIdentityResult(decode(&tag, value)?),
            "data_request" => Self::DataRequest(decode(&tag, value)?),
            "send_data_result" => Self::SendDataResult(decode(&tag, value)?),
            "add_or_update_service_result" => {
                Self::AddOrUpdateServiceResult(decode(&tag, value)?)
            }
            _ => Self::Other {
                event_type: tag,
                payload: value,
            },
        })
    }

    /// Encode back to the tagged wire shape.
    pub fn to_json(&self) -> Value {
        fn encode<T: Serialize>(tag: &str, payload: &T) -> Value {
            let mut value = serde_json::to_value(payload).unwrap_or(Value::Null);
            if let Value::Object(map) = &mut value {
                map.insert("type".to_string(), Value::String(tag.to_string()));
            }
            value
        }

        match self {
            Self::CreateRequestResult(p) => encode(self.kind().wire_tag(), p),
            Self::RequestStatus(p) => encode(self.kind().wire_tag(), p),
            Self::IncomingRequest(p) => encode(self.kind().wire_tag(), p),
            Self::ResponseResult(p) => encode(self.kind().wire_tag(), p),
            Self::SigningChallenge(p) => encode(self.kind().wire_tag(), p),
            Self::CreateIdentityRequestResult(p) => encode(self.kind().wire_tag(), p),
            Self::CreateIdentityResult(p) => encode(self.kind().wire_tag(), p),
            Self::DataRequest(p) => encode(self.kind().wire_tag(), p),
            Self::SendDataResult(p) => encode(self.kind().wire_tag(), p),
            Self::AddOrUpdateServiceResult(p) => encode(self.kind().wire_tag(), p),
            Self::Other { payload, .. } => payload.clone(),
        }
    }

    /// This event's discriminator.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::CreateRequestResult(_) => EventKind::CreateRequestResult,
            Self::RequestStatus(_) => EventKind::RequestStatus,
            Self::IncomingRequest(_) => EventKind::IncomingRequest,
            Self::ResponseResult(_) => EventKind::ResponseResult,
            Self::SigningChallenge(_) => EventKind::SigningChallenge,
            Self::CreateIdentityRequestResult(_) => EventKind::CreateIdentityRequestResult,
            Self::CreateIdentityResult(_) => EventKind::CreateIdentityResult,
            Self::DataRequest(_) => EventKind::DataRequest,
            Self::SendDataResult(_) => EventKind::SendDataResult,
            Self::AddOrUpdateServiceResult(_) => EventKind::AddOrUpdateServiceResult,
            Self::Other { .. } => EventKind::Other,
        }
    }

    /// The key this event correlates on, per its kind.
    ///
    /// Operation results and the signing challenge correlate on the
    /// caller-chosen reference id; workflow notifications correlate on the
    /// platform-assigned request id. `Other` events carry no correlation
    /// contract.
    pub fn correlation_key(&self) -> Option<CorrelationKey> {
        match self {
            Self::CreateRequestResult(p) => {
                Some(CorrelationKey::Reference(p.reference_id.clone()))
            }
            Self::ResponseResult(p) => Some(CorrelationKey::Reference(p.reference_id.clone())),
            Self::SigningChallenge(p) => Some(CorrelationKey::Reference(p.reference_id.clone())),
            Self::CreateIdentityRequestResult(p) => {
                Some(CorrelationKey::Reference(p.reference_id.clone()))
            }
            Self::CreateIdentityResult(p) => {
                Some(CorrelationKey::Reference(p.reference_id.clone()))
            }
            Self::SendDataResult(p) => Some(CorrelationKey::Reference(p.reference_id.clone())),
            Self::AddOrUpdateServiceResult(p) => {
                Some(CorrelationKey::Reference(p.reference_id.clone()))
            }
            Self::RequestStatus(p) => Some(CorrelationKey::Request(p.request_id.clone())),
            Self::IncomingRequest(p) => Some(CorrelationKey::Request(p.request_id.clone())),
            Self::DataRequest(p) => Some(CorrelationKey::Request(p.request_id.clone())),
            Self::Other { .. } => None,
        }
    }

    /// The status snapshot, when this is a `request_status` event.
    pub fn as_status(&self) -> Option<&RequestStatusSnapshot> {
        match self {
            Self::RequestStatus(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

//! # Veriflow Core
//!
//! Shared types for the Veriflow client of a decentralized
//! identity-verification platform: the callback event model pushed by the
//! platform to each role (RP, IdP, AS), the request lifecycle status
//! model, identifier newtypes for the two correlation spaces, the error
//! taxonomy, and the signing seam used to answer accessor challenges.
//!
//! The components that consume these types (event bus, ingress,
//! correlation registry, lifecycle aggregator) live in
//! `veriflow-callback`.

pub mod errors;
pub mod events;
pub mod identifiers;
pub mod signing;
pub mod status;

pub use errors::{VeriflowError, VeriflowResult};
pub use events::{CallbackEvent, CorrelationKey, EventKind};
pub use identifiers::{NodeId, ReferenceId, RequestId, RoleKind, ServiceId};
pub use signing::{AccessorKey, AccessorSigner, ChallengeSignature, Ed25519AccessorSigner, SigningScheme};
pub use status::{RequestState, RequestStatusSnapshot, ResponseValidity, ServiceStatus};

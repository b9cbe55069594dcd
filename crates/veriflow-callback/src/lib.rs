//! # Veriflow Callback
//!
//! Client-side callback machinery for a decentralized
//! identity-verification platform. A workflow spans three roles — a
//! Relying Party, one or more Identity Providers, and one or more
//! Attribute Servers — each of which receives its own stream of
//! asynchronous JSON callbacks. This crate turns those streams back into
//! something a driver can reason about:
//!
//! - [`bus::EventBus`] fans each role's decoded events out to every
//!   subscriber, in arrival order, without ever blocking the publisher.
//! - [`ingress::CallbackIngress`] accepts raw payloads, rejects malformed
//!   ones, answers the platform's synchronous signing challenges, and
//!   publishes everything else.
//! - [`correlation::CorrelationRegistry`] resolves a waiter registered for
//!   an expected `(event kind, correlation key)` pair, exactly once, with
//!   deadline and cancellation handling.
//! - [`aggregator::RequestLifecycleAggregator`] folds status snapshots
//!   into authoritative per-request state, enforcing the protocol's
//!   ordering, counting and terminal-state invariants.
//! - [`reference_store::IdentityReferenceStore`] holds the signing keys
//!   used to answer accessor challenges.
//!
//! [`node::CallbackNode`] assembles the pieces for one role instance.

pub mod aggregator;
pub mod bus;
pub mod correlation;
pub mod ingress;
pub mod node;
pub mod reference_store;

pub use aggregator::{ApplyOutcome, IgnoreReason, RequestLifecycleAggregator, StatusTransition};
pub use bus::{EventBus, Subscription};
pub use correlation::{CorrelationConfig, CorrelationRegistry, DuplicateWaiterPolicy};
pub use ingress::{CallbackAck, CallbackIngress};
pub use node::{CallbackNode, NodeConfig};
pub use reference_store::IdentityReferenceStore;

//! Per-role node assembly
//!
//! One [`CallbackNode`] bundles everything a single role instance (an RP,
//! one IdP, one AS) needs to reason about its callback stream: the event
//! bus, the correlation registry, the lifecycle aggregator and the
//! ingress. Nodes share nothing with each other — the three roles, and
//! multiple IdP/AS instances within a role, run fully in parallel with no
//! cross-node locks. The identity reference store is the one deliberately
//! shared piece of state and is owned by the workflow driver.
//!
//! The node's dispatcher task subscribes to the bus before any payload can
//! be received, then feeds each event to the registry (resolving waiters)
//! and, for status snapshots, to the aggregator. Additional subscribers
//! attached by the driver see the same stream; resolving a waiter never
//! removes an event from the bus.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use veriflow_core::{
    AccessorSigner, CallbackEvent, CorrelationKey, EventKind, NodeId, RequestId,
    RequestStatusSnapshot, RoleKind, VeriflowResult,
};

use crate::aggregator::RequestLifecycleAggregator;
use crate::bus::{EventBus, Subscription};
use crate::correlation::{CorrelationConfig, CorrelationRegistry};
use crate::ingress::{CallbackAck, CallbackIngress};
use crate::reference_store::IdentityReferenceStore;

/// Configuration for one node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// The node's platform identifier (e.g. `"idp1"`).
    pub node_id: NodeId,
    /// The role this node plays.
    pub role: RoleKind,
    /// Correlation registry configuration.
    pub correlation: CorrelationConfig,
}

impl NodeConfig {
    /// Configuration with default correlation behavior.
    pub fn new(node_id: impl Into<NodeId>, role: RoleKind) -> Self {
        Self {
            node_id: node_id.into(),
            role,
            correlation: CorrelationConfig::default(),
        }
    }
}

/// One role instance's callback machinery.
pub struct CallbackNode {
    node_id: NodeId,
    role: RoleKind,
    bus: EventBus,
    registry: Arc<CorrelationRegistry>,
    aggregator: Arc<RequestLifecycleAggregator>,
    ingress: CallbackIngress,
    dispatcher: JoinHandle<()>,
}

impl CallbackNode {
    /// Assemble a node and start its dispatcher task.
    ///
    /// Must run inside a tokio runtime. The dispatcher subscription is
    /// created here, before the caller can feed any payload, so no event
    /// can be missed.
    pub fn spawn(
        config: NodeConfig,
        references: Arc<IdentityReferenceStore>,
        signer: Arc<dyn AccessorSigner>,
    ) -> Self {
        let bus = EventBus::new();
        let registry = Arc::new(CorrelationRegistry::new(config.correlation));
        let aggregator = Arc::new(RequestLifecycleAggregator::new());

        let mut events = bus.subscribe();
        let dispatcher = {
            let registry = registry.clone();
            let aggregator = aggregator.clone();
            let node_id = config.node_id.clone();
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    // Aggregate first so a waiter woken by this event reads
                    // the already-updated snapshot.
                    if let Some(snapshot) = event.as_status() {
                        aggregator.apply(snapshot);
                    }
                    registry.offer(&event);
                }
                tracing::debug!(%node_id, "node dispatcher stopped");
            })
        };

        let ingress = CallbackIngress::new(config.node_id.clone(), bus.clone(), references, signer);

        Self {
            node_id: config.node_id,
            role: config.role,
            bus,
            registry,
            aggregator,
            ingress,
            dispatcher,
        }
    }

    /// Feed one raw callback payload through this node's ingress.
    pub fn receive(&self, raw: &[u8]) -> VeriflowResult<CallbackAck> {
        self.ingress.receive(raw)
    }

    /// Wait for the next event matching `(kind, key)` on this node.
    pub async fn await_event(
        &self,
        kind: EventKind,
        key: CorrelationKey,
        deadline: Duration,
    ) -> VeriflowResult<Arc<CallbackEvent>> {
        self.registry.await_event(kind, key, deadline).await
    }

    /// Attach an additional observer to this node's event stream.
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Latest accepted status snapshot for a request, if any.
    pub fn status_of(&self, request_id: &RequestId) -> Option<RequestStatusSnapshot> {
        self.aggregator.status_of(request_id)
    }

    /// The node's lifecycle aggregator.
    pub fn aggregator(&self) -> &Arc<RequestLifecycleAggregator> {
        &self.aggregator
    }

    /// The node's correlation registry.
    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    /// The node's ingress.
    pub fn ingress(&self) -> &CallbackIngress {
        &self.ingress
    }

    /// This node's platform identifier.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// This node's role.
    pub fn role(&self) -> RoleKind {
        self.role
    }

    /// Stop the dispatcher and detach all subscribers.
    pub fn shutdown(&self) {
        self.dispatcher.abort();
        self.bus.unsubscribe_all();
    }
}

impl Drop for CallbackNode {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

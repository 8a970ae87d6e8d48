//! Application layer: the orchestration core.
//!
//! `PaymentOrchestrator` is the entry point for caller operations and
//! `EventBridge` the entry point for platform signals. Both share one
//! `RequestRegistry`, which holds the only mutable state that is touched from
//! several threads at once.

pub mod bridge;
pub mod confirmation;
pub mod key_session;
pub mod orchestrator;
pub mod registry;
pub mod resolution;

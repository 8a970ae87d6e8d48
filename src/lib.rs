//! Payment confirmation orchestration.
//!
//! Sits between an application layer and a vendor payment SDK: validates caller
//! requests, keeps at most one operation of each kind in flight, routes the
//! SDK's asynchronous platform signals back to the operation waiting for them
//! and classifies the reported intent status into an outcome.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod telemetry;

//! Adapters for the domain ports.

pub mod http_key_provider;
pub mod in_memory;

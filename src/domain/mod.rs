//! Value types and ports shared by every layer.

pub mod intent;
pub mod method;
pub mod operation;
pub mod platform;
pub mod ports;
pub mod session;
pub mod sheet;
pub mod wallet;

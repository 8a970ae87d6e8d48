pub mod platform;
pub mod script;

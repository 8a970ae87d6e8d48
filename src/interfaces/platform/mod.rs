//! Thin translators from native signal shapes to `PlatformEvent`.

pub mod android;
pub mod ios;

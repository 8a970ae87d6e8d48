use crate::error::{PaymentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl FromStr for Platform {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "android" => Ok(Self::Android),
            "ios" => Ok(Self::Ios),
            other => Err(PaymentError::validation(format!(
                "Unknown platform: {other}"
            ))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Android => f.write_str("android"),
            Self::Ios => f.write_str("ios"),
        }
    }
}

/// Platform handles for one caller operation.
///
/// Owned by the adapter layer and passed into every call that needs to present
/// something; the core never looks up a current activity or root view controller
/// on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformContext {
    pub platform: Platform,
    host: Option<String>,
}

impl PlatformContext {
    pub fn new(platform: Platform, host: impl Into<String>) -> Self {
        Self {
            platform,
            host: Some(host.into()),
        }
    }

    /// A context with nothing to present from, e.g. while the app is backgrounded.
    pub fn detached(platform: Platform) -> Self {
        Self {
            platform,
            host: None,
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn require_host(&self) -> Result<&str> {
        self.host()
            .ok_or_else(|| PaymentError::validation("No presenting host is attached"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parsing() {
        assert_eq!("iOS".parse::<Platform>(), Ok(Platform::Ios));
        assert_eq!("android".parse::<Platform>(), Ok(Platform::Android));
        assert!("web".parse::<Platform>().is_err());
    }

    #[test]
    fn test_detached_context_has_no_host() {
        let ctx = PlatformContext::detached(Platform::Android);
        assert!(ctx.require_host().is_err());
        let ctx = PlatformContext::new(Platform::Ios, "root");
        assert_eq!(ctx.require_host(), Ok("root"));
    }
}

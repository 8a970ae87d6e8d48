//! Process-wide session configuration.

use super::platform::Platform;
use crate::error::{PaymentError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

const RETURN_URL_HOST: &str = "safepay";
const MIN_3DS_TIMEOUT_MINUTES: u32 = 5;
const MAX_3DS_TIMEOUT_MINUTES: u32 = 99;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub partner_id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletEnvironment {
    Test,
    #[default]
    Production,
}

/// 3-D Secure challenge settings forwarded to the provider once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreeDSecureConfig {
    /// Challenge timeout in minutes, enforced by the provider.
    pub timeout: Option<u32>,
    /// UI customization passed through untouched.
    #[serde(default, flatten)]
    pub ui: Map<String, Value>,
}

/// Configuration supplied by the caller to `initialise`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default)]
    pub publishable_key: String,
    pub account_id: Option<String>,
    #[serde(default)]
    pub app_info: AppInfo,
    pub url_scheme: Option<String>,
    #[serde(default)]
    pub set_url_scheme_on_android: bool,
    pub merchant_identifier: Option<String>,
    #[serde(default)]
    pub wallet_environment: WalletEnvironment,
    pub three_d_secure: Option<ThreeDSecureConfig>,
    pub partner_api_key: Option<String>,
    pub partner_api_version: Option<String>,
    pub session_id: Option<String>,
    pub key_endpoint: Option<Url>,
    #[serde(default)]
    pub show_wallet_in_options: bool,
}

impl SessionConfig {
    pub fn is_test_mode(&self) -> bool {
        self.publishable_key.starts_with("pk_test_")
    }

    pub fn validate(&self) -> Result<()> {
        if self.publishable_key.is_empty() {
            return Err(PaymentError::missing("publishableKey"));
        }
        if !self.publishable_key.starts_with("pk_") {
            return Err(PaymentError::validation("Invalid publishable key format"));
        }
        if let Some(scheme) = &self.url_scheme {
            return_url_for(scheme)?;
        }
        if let Some(timeout) = self.three_d_secure.as_ref().and_then(|c| c.timeout)
            && !(MIN_3DS_TIMEOUT_MINUTES..=MAX_3DS_TIMEOUT_MINUTES).contains(&timeout)
        {
            return Err(PaymentError::validation(format!(
                "3-D Secure timeout must be between {MIN_3DS_TIMEOUT_MINUTES} and {MAX_3DS_TIMEOUT_MINUTES} minutes"
            )));
        }
        Ok(())
    }
}

fn return_url_for(scheme: &str) -> Result<Url> {
    Url::parse(&format!("{scheme}://{RETURN_URL_HOST}"))
        .map_err(|_| PaymentError::validation(format!("Invalid urlScheme: {scheme}")))
}

/// What the key adapter needs to request an ephemeral key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRequest {
    pub api_version: String,
    pub partner_api_key: Option<String>,
    pub partner_api_version: Option<String>,
    pub session_id: Option<String>,
}

/// Validated configuration plus the mutable session identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    config: SessionConfig,
    session_id: Option<String>,
}

impl SessionContext {
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let session_id = config.session_id.clone();
        Ok(Self { config, session_id })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn merchant_identifier(&self) -> Option<&str> {
        self.config.merchant_identifier.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn with_session_id(&self, session_id: impl Into<String>) -> Self {
        Self {
            config: self.config.clone(),
            session_id: Some(session_id.into()),
        }
    }

    /// Redirect target for authentication flows.
    ///
    /// Android only uses the url scheme when the caller opted in.
    pub fn return_url(&self, platform: Platform) -> Option<Url> {
        if platform == Platform::Android && !self.config.set_url_scheme_on_android {
            return None;
        }
        self.config
            .url_scheme
            .as_deref()
            .and_then(|scheme| return_url_for(scheme).ok())
    }

    pub fn key_request(&self, api_version: &str) -> KeyRequest {
        KeyRequest {
            api_version: api_version.to_string(),
            partner_api_key: self.config.partner_api_key.clone(),
            partner_api_version: self.config.partner_api_version.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

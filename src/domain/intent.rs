use serde::{Deserialize, Serialize};
use std::fmt;

/// Status reported by the provider for a payment or setup intent.
///
/// Unrecognized statuses are kept verbatim in `Other` so that the raw name can be
/// surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    Other(String),
}

impl IntentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Succeeded => "succeeded",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for IntentStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "requires_payment_method" => Self::RequiresPaymentMethod,
            "requires_confirmation" => Self::RequiresConfirmation,
            "requires_action" => Self::RequiresAction,
            "processing" => Self::Processing,
            "requires_capture" => Self::RequiresCapture,
            "canceled" => Self::Canceled,
            "succeeded" => Self::Succeeded,
            _ => Self::Other(raw),
        }
    }
}

impl From<IntentStatus> for String {
    fn from(status: IntentStatus) -> Self {
        match status {
            IntentStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Follow-up step the provider requires before an intent can complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NextActionType {
    RedirectToUrl,
    UseSdk,
    DisplayOxxoDetails,
    DisplayBoletoDetails,
    DisplayKonbiniDetails,
    AlipayRedirect,
    WeChatPayRedirect,
    VerifyWithMicrodeposits,
    Other(String),
}

impl NextActionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::RedirectToUrl => "redirect_to_url",
            Self::UseSdk => "use_sdk",
            Self::DisplayOxxoDetails => "display_oxxo_details",
            Self::DisplayBoletoDetails => "display_boleto_details",
            Self::DisplayKonbiniDetails => "display_konbini_details",
            Self::AlipayRedirect => "alipay_redirect",
            Self::WeChatPayRedirect => "wechat_pay_redirect",
            Self::VerifyWithMicrodeposits => "verify_with_microdeposits",
            Self::Other(raw) => raw,
        }
    }

    /// Voucher payments stay in `requires_action` until the voucher is paid or
    /// expires out of band.
    pub fn is_voucher(&self) -> bool {
        matches!(
            self,
            Self::DisplayOxxoDetails | Self::DisplayBoletoDetails | Self::DisplayKonbiniDetails
        )
    }
}

impl From<String> for NextActionType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "redirect_to_url" => Self::RedirectToUrl,
            "use_sdk" => Self::UseSdk,
            "display_oxxo_details" => Self::DisplayOxxoDetails,
            "display_boleto_details" => Self::DisplayBoletoDetails,
            "display_konbini_details" => Self::DisplayKonbiniDetails,
            "alipay_redirect" => Self::AlipayRedirect,
            "wechat_pay_redirect" => Self::WeChatPayRedirect,
            "verify_with_microdeposits" => Self::VerifyWithMicrodeposits,
            _ => Self::Other(raw),
        }
    }
}

impl From<NextActionType> for String {
    fn from(action: NextActionType) -> Self {
        match action {
            NextActionType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

/// Which kind of intent a provider report refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Payment,
    Setup,
}

/// Immutable result of a provider status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentSnapshot {
    pub id: String,
    pub status: IntentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action_type: Option<NextActionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
}

impl IntentSnapshot {
    pub fn new(id: impl Into<String>, status: IntentStatus) -> Self {
        Self {
            id: id.into(),
            status,
            next_action_type: None,
            last_error_message: None,
        }
    }

    pub fn with_next_action(mut self, action: NextActionType) -> Self {
        self.next_action_type = Some(action);
        self
    }

    pub fn with_last_error(mut self, message: impl Into<String>) -> Self {
        self.last_error_message = Some(message.into());
        self
    }
}

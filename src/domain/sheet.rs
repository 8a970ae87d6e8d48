use serde::{Deserialize, Serialize};

/// Configuration handed to the provider's payment sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSheetConfig {
    pub payment_intent_client_secret: Option<String>,
    pub merchant_display_name: Option<String>,
    pub customer_id: Option<String>,
    pub customer_ephemeral_key_secret: Option<String>,
    #[serde(default)]
    pub custom_flow: bool,
    /// Offer the device wallet inside the sheet.
    #[serde(default)]
    pub wallet: bool,
    pub merchant_country_code: Option<String>,
    pub style: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentSheetOptions {
    /// When false, only the payment option chooser of a custom flow is shown.
    #[serde(default = "default_confirm_payment")]
    pub confirm_payment: bool,
}

fn default_confirm_payment() -> bool {
    true
}

impl Default for PresentSheetOptions {
    fn default() -> Self {
        Self {
            confirm_payment: true,
        }
    }
}

/// Payment method picked in the provider's payment options screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSelection {
    pub method_id: Option<String>,
    pub label: Option<String>,
    #[serde(default)]
    pub use_wallet: bool,
}

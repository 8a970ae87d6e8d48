use crate::error::{PaymentError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Payment method types a caller may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethodType {
    Card,
    Ideal,
    Alipay,
    Sofort,
    Bancontact,
    Giropay,
    Eps,
    P24,
    SepaDebit,
    Oxxo,
    Fpx,
    AuBecsDebit,
    GrabPay,
    AfterpayClearpay,
    Upi,
    WeChatPay,
    ApplePay,
    GooglePay,
}

impl PaymentMethodType {
    pub const ALL: [PaymentMethodType; 18] = [
        Self::Card,
        Self::Ideal,
        Self::Alipay,
        Self::Sofort,
        Self::Bancontact,
        Self::Giropay,
        Self::Eps,
        Self::P24,
        Self::SepaDebit,
        Self::Oxxo,
        Self::Fpx,
        Self::AuBecsDebit,
        Self::GrabPay,
        Self::AfterpayClearpay,
        Self::Upi,
        Self::WeChatPay,
        Self::ApplePay,
        Self::GooglePay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "Card",
            Self::Ideal => "Ideal",
            Self::Alipay => "Alipay",
            Self::Sofort => "Sofort",
            Self::Bancontact => "Bancontact",
            Self::Giropay => "Giropay",
            Self::Eps => "Eps",
            Self::P24 => "P24",
            Self::SepaDebit => "SepaDebit",
            Self::Oxxo => "Oxxo",
            Self::Fpx => "Fpx",
            Self::AuBecsDebit => "AuBecsDebit",
            Self::GrabPay => "GrabPay",
            Self::AfterpayClearpay => "AfterpayClearpay",
            Self::Upi => "Upi",
            Self::WeChatPay => "WeChatPay",
            Self::ApplePay => "ApplePay",
            Self::GooglePay => "GooglePay",
        }
    }

    pub fn is_wallet(&self) -> bool {
        matches!(self, Self::ApplePay | Self::GooglePay)
    }
}

impl FromStr for PaymentMethodType {
    type Err = PaymentError;

    fn from_str(tag: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| PaymentError::validation(format!("{tag} type is not supported yet")))
    }
}

impl fmt::Display for PaymentMethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to card details captured by the card-input widget.
///
/// The widget owns the raw card data; only an opaque handle and display hints
/// cross into this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardCapture {
    pub handle: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub last4: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub city: Option<String>,
    pub country: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub postal_code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    pub name: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupFutureUsage {
    OnSession,
    OffSession,
}

/// Caller intent for a single payment-method operation.
///
/// The card capture is borrowed from the card-input collaborator for the duration
/// of the call.
#[derive(Debug, Clone, Default)]
pub struct PaymentMethodRequest<'a> {
    pub method_type: Option<String>,
    pub fields: Map<String, Value>,
    pub card: Option<&'a CardCapture>,
}

impl<'a> PaymentMethodRequest<'a> {
    pub fn new(method_type: impl Into<String>) -> Self {
        Self {
            method_type: Some(method_type.into()),
            fields: Map::new(),
            card: None,
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn with_card(mut self, card: &'a CardCapture) -> Self {
        self.card = Some(card);
        self
    }

    /// Parses the declared type tag.
    pub fn declared_type(&self) -> Result<PaymentMethodType> {
        match self.method_type.as_deref() {
            Some(tag) if !tag.is_empty() => tag.parse(),
            _ => Err(PaymentError::missing("paymentMethodType")),
        }
    }

    /// Non-empty string field, if present.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn flag(&self, key: &str) -> bool {
        self.fields.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Structured field, if present.
    pub fn object<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| PaymentError::validation(format!("Invalid {key}: {e}"))),
        }
    }
}

/// Provider-ready description of a new payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodParams {
    pub method_type: PaymentMethodType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<CardCapture>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_details: Option<BillingDetails>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl PaymentMethodParams {
    pub fn new(method_type: PaymentMethodType) -> Self {
        Self {
            method_type,
            card: None,
            billing_details: None,
            fields: BTreeMap::new(),
        }
    }
}

/// Card details to turn into a single-use token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardTokenParams {
    pub card: CardCapture,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// Either freshly built params or an already-created payment method id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodSource {
    Params(PaymentMethodParams),
    Id(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodOptions {
    pub card_cvc: Option<String>,
    pub wechat_app_id: Option<String>,
}

impl PaymentMethodOptions {
    pub fn is_empty(&self) -> bool {
        self.card_cvc.is_none() && self.wechat_app_id.is_none()
    }
}

/// Parameters submitted to the provider for one confirmation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmParams {
    pub client_secret: String,
    pub payment_method: PaymentMethodSource,
    pub options: Option<PaymentMethodOptions>,
    pub shipping: Option<ShippingDetails>,
    pub return_url: Option<Url>,
    pub setup_future_usage: Option<SetupFutureUsage>,
}

/// Payment method created by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: String,
    pub method_type: PaymentMethodType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_details: Option<BillingDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last4: Option<String>,
}

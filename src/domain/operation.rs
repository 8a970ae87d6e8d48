use super::intent::IntentSnapshot;
use super::method::PaymentMethod;
use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical kind of an in-flight request. At most one operation per kind may be pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    ConfirmPayment,
    ConfirmSetupIntent,
    HandleNextAction,
    CreatePaymentMethod,
    WalletAuthorization,
    PresentPaymentSheet,
    ConfirmPaymentSheet,
    GetSelectedPaymentMethod,
    InitPaymentSheet,
    InitCustomerSession,
    CreateCvcUpdateToken,
    CreateToken,
    RetrievePaymentIntent,
    RetrieveSetupIntent,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfirmPayment => "confirm_payment",
            Self::ConfirmSetupIntent => "confirm_setup_intent",
            Self::HandleNextAction => "handle_next_action",
            Self::CreatePaymentMethod => "create_payment_method",
            Self::WalletAuthorization => "wallet_authorization",
            Self::PresentPaymentSheet => "present_payment_sheet",
            Self::ConfirmPaymentSheet => "confirm_payment_sheet",
            Self::GetSelectedPaymentMethod => "get_selected_payment_method",
            Self::InitPaymentSheet => "init_payment_sheet",
            Self::InitCustomerSession => "init_customer_session",
            Self::CreateCvcUpdateToken => "create_cvc_update_token",
            Self::CreateToken => "create_token",
            Self::RetrievePaymentIntent => "retrieve_payment_intent",
            Self::RetrieveSetupIntent => "retrieve_setup_intent",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label and image of the payment option chosen in a payment sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOption {
    pub label: String,
    pub image: String,
}

/// Successful result carried by a resolved operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OperationOutput {
    Intent(IntentSnapshot),
    PaymentMethod(PaymentMethod),
    PaymentMethodId(String),
    SelectedMethod(Option<String>),
    PaymentOption(Option<PaymentOption>),
    Token(String),
    /// Answer to a yes/no query such as wallet support.
    Flag(bool),
    Completed,
}

pub type Outcome = std::result::Result<OperationOutput, PaymentError>;

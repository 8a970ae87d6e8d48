use crate::application::bridge::PlatformEvent;
use crate::domain::method::{CardCapture, PaymentMethodRequest};
use crate::domain::session::SessionConfig;
use crate::domain::sheet::{PaymentSheetConfig, PresentSheetOptions};
use crate::domain::wallet::WalletRequest;
use crate::error::ScriptError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::BufRead;

/// Payment method part of a scripted step.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScriptedMethod {
    #[serde(default, rename = "type")]
    pub method_type: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub card: Option<CardCapture>,
}

impl ScriptedMethod {
    pub fn request(&self) -> PaymentMethodRequest<'_> {
        PaymentMethodRequest {
            method_type: self.method_type.clone(),
            fields: self.fields.clone(),
            card: self.card.as_ref(),
        }
    }
}

/// One line of an operation script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptStep {
    Initialise {
        config: SessionConfig,
    },
    SetSessionId {
        session_id: String,
    },
    InitCustomerSession,
    ConfirmPayment {
        client_secret: String,
        #[serde(default)]
        method: ScriptedMethod,
    },
    ConfirmSetupIntent {
        client_secret: String,
        #[serde(default)]
        method: ScriptedMethod,
    },
    HandleNextAction {
        client_secret: String,
    },
    CreatePaymentMethod {
        #[serde(default)]
        method: ScriptedMethod,
    },
    PresentWalletAuthorization {
        #[serde(default)]
        wallet: WalletRequest,
    },
    ShowPaymentOptions,
    GetSelectedPaymentMethodId {
        #[serde(default)]
        wallet: Option<WalletRequest>,
    },
    InitPaymentSheet {
        #[serde(default)]
        config: PaymentSheetConfig,
    },
    PresentPaymentSheet {
        #[serde(default)]
        options: PresentSheetOptions,
    },
    ConfirmPaymentSheetPayment,
    CreateTokenForCvcUpdate {
        cvc: String,
    },
    CreateToken {
        #[serde(default)]
        method: ScriptedMethod,
    },
    RetrievePaymentIntent {
        client_secret: String,
    },
    RetrieveSetupIntent {
        client_secret: String,
    },
    IsWalletSupported,
    HandleUrlCallback {
        #[serde(default)]
        url: Option<String>,
    },
    /// Injects a platform signal.
    Event {
        event: PlatformEvent,
    },
    /// Drops the presenting host, as if the app went to the background.
    Detach,
    Attach,
}

impl ScriptStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialise { .. } => "initialise",
            Self::SetSessionId { .. } => "set_session_id",
            Self::InitCustomerSession => "init_customer_session",
            Self::ConfirmPayment { .. } => "confirm_payment",
            Self::ConfirmSetupIntent { .. } => "confirm_setup_intent",
            Self::HandleNextAction { .. } => "handle_next_action",
            Self::CreatePaymentMethod { .. } => "create_payment_method",
            Self::PresentWalletAuthorization { .. } => "present_wallet_authorization",
            Self::ShowPaymentOptions => "show_payment_options",
            Self::GetSelectedPaymentMethodId { .. } => "get_selected_payment_method_id",
            Self::InitPaymentSheet { .. } => "init_payment_sheet",
            Self::PresentPaymentSheet { .. } => "present_payment_sheet",
            Self::ConfirmPaymentSheetPayment => "confirm_payment_sheet_payment",
            Self::CreateTokenForCvcUpdate { .. } => "create_token_for_cvc_update",
            Self::CreateToken { .. } => "create_token",
            Self::RetrievePaymentIntent { .. } => "retrieve_payment_intent",
            Self::RetrieveSetupIntent { .. } => "retrieve_setup_intent",
            Self::IsWalletSupported => "is_wallet_supported",
            Self::HandleUrlCallback { .. } => "handle_url_callback",
            Self::Event { .. } => "event",
            Self::Detach => "detach",
            Self::Attach => "attach",
        }
    }
}

/// Reads an operation script, one JSON object per line.
///
/// Blank lines and lines starting with `#` are skipped. Every step carries its
/// 1-based line number.
pub struct CommandReader<R: BufRead> {
    source: R,
}

impl<R: BufRead> CommandReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Returns an iterator that lazily parses steps.
    pub fn steps(self) -> impl Iterator<Item = Result<(usize, ScriptStep), ScriptError>> {
        self.source
            .lines()
            .enumerate()
            .filter_map(|(index, line)| {
                let line_no = index + 1;
                let line = match line {
                    Ok(line) => line,
                    Err(e) => return Some(Err(ScriptError::Io(e))),
                };
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    return None;
                }
                Some(
                    serde_json::from_str(trimmed)
                        .map(|step| (line_no, step))
                        .map_err(|source| ScriptError::Parse {
                            line: line_no,
                            source,
                        }),
                )
            })
    }
}

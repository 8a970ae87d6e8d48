use crate::application::bridge::{
    EventBridge, FragmentResult, IntentReport, PlatformEvent, SheetResult, SubFlowResult,
    WalletResult,
};
use crate::domain::intent::{IntentKind, IntentSnapshot};
use crate::domain::method::PaymentMethod;
use crate::domain::operation::PaymentOption;
use crate::domain::sheet::MethodSelection;
use crate::domain::wallet::WalletToken;
use serde_json::{Map, Value};
use tracing::debug;

/// Request code of the wallet activity.
pub const WALLET_REQUEST_CODE: i32 = 53;
/// Request code of the bank selection activity.
pub const BANK_SELECTION_REQUEST_CODE: i32 = 6000;

pub const RESULT_OK: i32 = -1;
pub const RESULT_CANCELED: i32 = 0;
/// Result code the wallet activity uses when it failed.
pub const RESULT_ERROR: i32 = 1;

const WALLET_ERROR_MESSAGE: &str = "Cannot get payment method id";

/// Broadcast actions sent by the payment sheet fragment.
pub mod actions {
    pub const PAYMENT_RESULT: &str = "PAYMENT_RESULT";
    pub const PAYMENT_OPTION: &str = "PAYMENT_OPTION";
    pub const INIT_PAYMENT_SHEET: &str = "INIT_PAYMENT_SHEET";
    pub const CONFIGURE_FLOW_CONTROLLER: &str = "CONFIGURE_FLOW_CONTROLLER";
    pub const FRAGMENT_CREATED: &str = "FRAGMENT_CREATED";
}

/// Translates activity results, SDK callbacks and local broadcasts into
/// platform events.
#[derive(Clone)]
pub struct AndroidAdapter {
    bridge: EventBridge,
}

impl AndroidAdapter {
    pub fn new(bridge: EventBridge) -> Self {
        Self { bridge }
    }

    /// Callback of a payment or setup confirmation.
    pub fn on_intent_result(
        &self,
        intent: IntentKind,
        result: Result<IntentSnapshot, String>,
    ) -> usize {
        let report = match result {
            Ok(snapshot) => IntentReport::Snapshot(snapshot),
            Err(message) => IntentReport::Error(message),
        };
        self.bridge
            .dispatch(PlatformEvent::IntentResult { intent, report })
    }

    /// Activity result. Returns `None` when the request code is not ours.
    pub fn on_activity_result(
        &self,
        request_code: i32,
        result_code: i32,
        data: Option<Value>,
    ) -> Option<usize> {
        let event = match request_code {
            WALLET_REQUEST_CODE => PlatformEvent::WalletResult {
                result: match (result_code, data) {
                    (RESULT_OK, Some(token)) => WalletResult::Authorized(WalletToken(token)),
                    (RESULT_CANCELED, _) => WalletResult::Canceled,
                    _ => WalletResult::Failed(WALLET_ERROR_MESSAGE.to_string()),
                },
            },
            BANK_SELECTION_REQUEST_CODE => {
                let payment_method = data.and_then(|d| serde_json::from_value::<PaymentMethod>(d).ok());
                PlatformEvent::SubFlowResult {
                    result: match (result_code, payment_method) {
                        (RESULT_OK, Some(pm)) => SubFlowResult::Completed(pm),
                        (RESULT_CANCELED, _) => SubFlowResult::Canceled,
                        _ => SubFlowResult::Failed("Bank selection failed".to_string()),
                    },
                }
            }
            other => {
                debug!(request_code = other, "Ignoring activity result");
                return None;
            }
        };
        Some(self.bridge.dispatch(event))
    }

    /// Local broadcast from the payment sheet fragment.
    pub fn on_broadcast(&self, action: &str, extras: &Map<String, Value>) -> Option<usize> {
        let text = |key: &str| extras.get(key).and_then(Value::as_str).map(str::to_string);

        let event = match action {
            actions::PAYMENT_RESULT => PlatformEvent::SheetResult {
                result: match text("status").as_deref() {
                    Some("completed") => SheetResult::Completed,
                    Some("canceled") => SheetResult::Canceled,
                    _ => SheetResult::Failed(
                        text("message").unwrap_or_else(|| "Payment sheet failed".to_string()),
                    ),
                },
            },
            actions::PAYMENT_OPTION => PlatformEvent::SheetOptionSelected {
                option: payment_option(extras),
            },
            actions::INIT_PAYMENT_SHEET => PlatformEvent::FragmentReady {
                result: match text("error") {
                    Some(message) => FragmentResult::Failed(message),
                    None => FragmentResult::Ready(None),
                },
            },
            actions::CONFIGURE_FLOW_CONTROLLER => PlatformEvent::FragmentReady {
                result: FragmentResult::Ready(payment_option(extras)),
            },
            actions::FRAGMENT_CREATED => {
                // Presentation continues through INIT_PAYMENT_SHEET.
                debug!("Payment sheet fragment created");
                return Some(0);
            }
            other => {
                debug!(action = other, "Ignoring broadcast");
                return None;
            }
        };
        Some(self.bridge.dispatch(event))
    }

    /// Result of the payment methods activity.
    pub fn on_payment_method_selected(
        &self,
        method_id: Option<String>,
        label: Option<String>,
        use_wallet: bool,
    ) -> usize {
        self.bridge.dispatch(PlatformEvent::MethodSelected {
            selection: MethodSelection {
                method_id,
                label,
                use_wallet,
            },
        })
    }
}

fn payment_option(extras: &Map<String, Value>) -> Option<PaymentOption> {
    let label = extras.get("label").and_then(Value::as_str)?;
    Some(PaymentOption {
        label: label.to_string(),
        image: extras
            .get("image")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

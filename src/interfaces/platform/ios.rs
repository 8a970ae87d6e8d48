use crate::application::bridge::{
    EventBridge, FragmentResult, IntentReport, PlatformEvent, SheetResult, SubFlowResult,
    WalletResult,
};
use crate::domain::intent::{IntentKind, IntentSnapshot};
use crate::domain::method::PaymentMethod;
use crate::domain::operation::PaymentOption;
use crate::domain::sheet::MethodSelection;
use crate::domain::wallet::WalletToken;
use serde_json::Value;

const WALLET_ERROR_MESSAGE: &str = "Apple pay completion failed";

/// Status passed to a payment handler completion block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStatus {
    Succeeded,
    Canceled,
    Failed,
}

/// Outcome of the Apple Pay authorization controller.
#[derive(Debug, Clone, PartialEq)]
pub enum WalletCompletion {
    Success(Value),
    Error(Option<String>),
    UserCancellation,
}

/// Translates delegate callbacks and completion blocks into platform events.
#[derive(Clone)]
pub struct IosAdapter {
    bridge: EventBridge,
}

impl IosAdapter {
    pub fn new(bridge: EventBridge) -> Self {
        Self { bridge }
    }

    /// Payment handler completion. The intent is reported whenever the handler
    /// provides one, so the status table decides the outcome.
    pub fn on_handler_completion(
        &self,
        intent: IntentKind,
        status: HandlerStatus,
        snapshot: Option<IntentSnapshot>,
        error: Option<String>,
    ) -> usize {
        let report = match (status, snapshot) {
            (HandlerStatus::Failed, _) => {
                IntentReport::Error(error.unwrap_or_else(|| "Unknown error".to_string()))
            }
            (_, Some(snapshot)) => IntentReport::Snapshot(snapshot),
            (_, None) => IntentReport::Error(
                error.unwrap_or_else(|| "The provider returned no intent".to_string()),
            ),
        };
        self.bridge
            .dispatch(PlatformEvent::IntentResult { intent, report })
    }

    pub fn on_wallet_completion(&self, completion: WalletCompletion) -> usize {
        let result = match completion {
            WalletCompletion::Success(token) => WalletResult::Authorized(WalletToken(token)),
            WalletCompletion::Error(message) => {
                WalletResult::Failed(message.unwrap_or_else(|| WALLET_ERROR_MESSAGE.to_string()))
            }
            WalletCompletion::UserCancellation => WalletResult::Canceled,
        };
        self.bridge.dispatch(PlatformEvent::WalletResult { result })
    }

    pub fn on_payment_sheet_result(&self, result: SheetResult) -> usize {
        self.bridge.dispatch(PlatformEvent::SheetResult { result })
    }

    pub fn on_payment_option(&self, option: Option<PaymentOption>) -> usize {
        self.bridge
            .dispatch(PlatformEvent::SheetOptionSelected { option })
    }

    /// Payment sheet configuration finished.
    pub fn on_payment_sheet_configured(
        &self,
        error: Option<String>,
        option: Option<PaymentOption>,
    ) -> usize {
        let result = match error {
            Some(message) => FragmentResult::Failed(message),
            None => FragmentResult::Ready(option),
        };
        self.bridge.dispatch(PlatformEvent::FragmentReady { result })
    }

    /// Bank selection view controller finished.
    pub fn on_bank_selection(
        &self,
        payment_method: Option<PaymentMethod>,
        error: Option<String>,
    ) -> usize {
        let result = match (payment_method, error) {
            (Some(pm), _) => SubFlowResult::Completed(pm),
            (None, Some(message)) => SubFlowResult::Failed(message),
            (None, None) => SubFlowResult::Canceled,
        };
        self.bridge.dispatch(PlatformEvent::SubFlowResult { result })
    }

    pub fn on_payment_context_changed(&self, selection: MethodSelection) -> usize {
        self.bridge
            .dispatch(PlatformEvent::MethodSelected { selection })
    }
}

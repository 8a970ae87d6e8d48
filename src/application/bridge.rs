//! Single ingress for asynchronous platform signals.

use super::confirmation::{CANCELED_MESSAGE, SubFlow, settle};
use super::orchestrator::{Core, provider_error, submission_failed};
use crate::domain::intent::{IntentKind, IntentSnapshot};
use crate::domain::method::{PaymentMethod, PaymentMethodSource};
use crate::domain::operation::{OperationKind, OperationOutput, Outcome, PaymentOption};
use crate::domain::sheet::MethodSelection;
use crate::domain::wallet::WalletToken;
use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const WALLET_CANCELED_MESSAGE: &str = "The wallet authorization was canceled";

/// Provider status report, or the error the provider raised instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentReport {
    Snapshot(IntentSnapshot),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletResult {
    Authorized(WalletToken),
    Canceled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetResult {
    Completed,
    Canceled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubFlowResult {
    Completed(PaymentMethod),
    Canceled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentResult {
    Ready(Option<PaymentOption>),
    Failed(String),
}

/// Every asynchronous signal the platform can deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlatformEvent {
    IntentResult {
        intent: IntentKind,
        report: IntentReport,
    },
    WalletResult {
        result: WalletResult,
    },
    SheetResult {
        result: SheetResult,
    },
    SheetOptionSelected {
        #[serde(default)]
        option: Option<PaymentOption>,
    },
    SubFlowResult {
        result: SubFlowResult,
    },
    FragmentReady {
        result: FragmentResult,
    },
    MethodSelected {
        selection: MethodSelection,
    },
}

impl PlatformEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::IntentResult { .. } => "intent_result",
            Self::WalletResult { .. } => "wallet_result",
            Self::SheetResult { .. } => "sheet_result",
            Self::SheetOptionSelected { .. } => "sheet_option_selected",
            Self::SubFlowResult { .. } => "sub_flow_result",
            Self::FragmentReady { .. } => "fragment_ready",
            Self::MethodSelected { .. } => "method_selected",
        }
    }
}

/// Routes platform signals to the operations waiting for them.
///
/// Cheap to clone; every platform adapter holds its own copy. Signals may arrive
/// on any thread and in any order. A signal nobody waits for is dropped.
#[derive(Clone)]
pub struct EventBridge {
    core: Arc<Core>,
}

impl EventBridge {
    pub(crate) fn new(core: Arc<Core>) -> Self {
        Self { core }
    }

    /// Handles one signal. Returns how many operations it settled right away;
    /// wallet tokens settle later, once the provider has turned them into a
    /// payment method.
    pub fn dispatch(&self, event: PlatformEvent) -> usize {
        let name = event.name();
        let settled = match event {
            PlatformEvent::IntentResult { intent, report } => {
                let report = match report {
                    IntentReport::Snapshot(snapshot) => Ok(snapshot),
                    IntentReport::Error(message) => Err(message),
                };
                settle(&self.core.registry, &self.core.tracker, intent, report)
            }
            PlatformEvent::WalletResult { result } => self.on_wallet(result),
            PlatformEvent::SheetResult { result } => {
                let outcome = match result {
                    SheetResult::Completed => Ok(OperationOutput::Completed),
                    SheetResult::Canceled => {
                        Err(PaymentError::Canceled(CANCELED_MESSAGE.to_string()))
                    }
                    SheetResult::Failed(message) => Err(PaymentError::Failed(message)),
                };
                self.core.registry.resolve_all(
                    &[
                        OperationKind::ConfirmPaymentSheet,
                        OperationKind::PresentPaymentSheet,
                    ],
                    &outcome,
                )
            }
            PlatformEvent::SheetOptionSelected { option } => usize::from(self.core.registry.resolve(
                OperationKind::PresentPaymentSheet,
                Ok(OperationOutput::PaymentOption(option)),
            )),
            PlatformEvent::SubFlowResult { result } => self.on_sub_flow(result),
            PlatformEvent::FragmentReady { result } => {
                let outcome = match result {
                    FragmentResult::Ready(option) => Ok(OperationOutput::PaymentOption(option)),
                    FragmentResult::Failed(message) => Err(PaymentError::Failed(message)),
                };
                usize::from(
                    self.core
                        .registry
                        .resolve(OperationKind::InitPaymentSheet, outcome),
                )
            }
            PlatformEvent::MethodSelected { selection } => {
                info!(
                    use_wallet = selection.use_wallet,
                    label = selection.label.as_deref().unwrap_or_default(),
                    "Payment method selected"
                );
                self.core.remember_selection(selection);
                0
            }
        };

        debug!(event = name, settled, "Platform signal dispatched");
        settled
    }

    fn on_wallet(&self, result: WalletResult) -> usize {
        let failure = match result {
            WalletResult::Authorized(token) => {
                let listeners: Vec<(OperationKind, u64)> = [
                    OperationKind::WalletAuthorization,
                    OperationKind::GetSelectedPaymentMethod,
                ]
                .into_iter()
                .filter_map(|kind| self.core.registry.generation(kind).map(|g| (kind, g)))
                .collect();
                let attempt = self
                    .core
                    .tracker
                    .current()
                    .filter(|ctx| ctx.awaiting == Some(SubFlow::Wallet))
                    .map(|ctx| ctx.attempt)
                    .filter(|attempt| {
                        self.core.registry.generation(OperationKind::ConfirmPayment)
                            == Some(*attempt)
                    });
                if listeners.is_empty() && attempt.is_none() {
                    debug!("Wallet token arrived with no listener");
                    return 0;
                }
                self.exchange_wallet_token(token, listeners, attempt);
                return 0;
            }
            WalletResult::Canceled => PaymentError::Canceled(WALLET_CANCELED_MESSAGE.to_string()),
            WalletResult::Failed(message) => PaymentError::Failed(message),
        };

        let outcome: Outcome = Err(failure);
        let mut settled = self.core.registry.resolve_all(
            &[
                OperationKind::WalletAuthorization,
                OperationKind::GetSelectedPaymentMethod,
                OperationKind::PresentPaymentSheet,
            ],
            &outcome,
        );
        if let Some(ctx) = self.core.tracker.abandon(SubFlow::Wallet) {
            settled += usize::from(self.core.registry.resolve_if(
                OperationKind::ConfirmPayment,
                ctx.attempt,
                outcome,
            ));
        }
        settled
    }

    /// Turns a wallet token into a payment method and hands it to the attempts
    /// that were waiting when the token arrived.
    fn exchange_wallet_token(
        &self,
        token: WalletToken,
        listeners: Vec<(OperationKind, u64)>,
        attempt: Option<u64>,
    ) {
        let core = Arc::clone(&self.core);
        self.core.spawn(async move {
            let created = core.provider.create_wallet_payment_method(token).await;
            let payment_method = match created {
                Ok(payment_method) => payment_method,
                Err(err) => {
                    let err = provider_error(err);
                    warn!(error = %err, "Wallet payment method creation failed");
                    let outcome: Outcome = Err(err);
                    for (kind, generation) in &listeners {
                        core.registry.resolve_if(*kind, *generation, outcome.clone());
                    }
                    if let Some(attempt) = attempt
                        && core.tracker.abandon_attempt(SubFlow::Wallet, attempt).is_some()
                    {
                        core.registry
                            .resolve_if(OperationKind::ConfirmPayment, attempt, outcome);
                    }
                    return;
                }
            };

            let id = payment_method.id;
            for (kind, generation) in &listeners {
                let output = match kind {
                    OperationKind::WalletAuthorization => {
                        OperationOutput::PaymentMethodId(id.clone())
                    }
                    _ => OperationOutput::SelectedMethod(Some(id.clone())),
                };
                core.registry.resolve_if(*kind, *generation, Ok(output));
            }

            let resumed =
                attempt.and_then(|attempt| core.tracker.resume_attempt(SubFlow::Wallet, attempt));
            if let Some(ctx) = resumed {
                let params = ctx.params_for(PaymentMethodSource::Id(id));
                if let Err(err) = core.provider.confirm_payment(&ctx.platform, params).await {
                    core.registry.resolve_if(
                        OperationKind::ConfirmPayment,
                        ctx.attempt,
                        Err(submission_failed(err)),
                    );
                    core.tracker.clear_attempt(ctx.attempt);
                }
            }
        });
    }

    fn on_sub_flow(&self, result: SubFlowResult) -> usize {
        match result {
            SubFlowResult::Completed(payment_method) => {
                let Some(ctx) = self.core.tracker.resume(SubFlow::BankSelection) else {
                    debug!("Bank selection finished with no confirmation waiting");
                    return 0;
                };
                info!(payment_method = %payment_method.id, "Bank selected, resuming confirmation");
                let params = ctx.params_for(PaymentMethodSource::Id(payment_method.id));
                let core = Arc::clone(&self.core);
                self.core.spawn(async move {
                    if let Err(err) = core.provider.confirm_payment(&ctx.platform, params).await {
                        core.registry.resolve_if(
                            OperationKind::ConfirmPayment,
                            ctx.attempt,
                            Err(submission_failed(err)),
                        );
                        core.tracker.clear_attempt(ctx.attempt);
                    }
                });
                0
            }
            SubFlowResult::Canceled | SubFlowResult::Failed(_) => {
                let Some(ctx) = self.core.tracker.abandon(SubFlow::BankSelection) else {
                    debug!("Bank selection ended with no confirmation waiting");
                    return 0;
                };
                let err = match result {
                    SubFlowResult::Failed(message) => PaymentError::Failed(message),
                    _ => PaymentError::Canceled(CANCELED_MESSAGE.to_string()),
                };
                usize::from(self.core.registry.resolve_if(
                    OperationKind::ConfirmPayment,
                    ctx.attempt,
                    Err(err),
                ))
            }
        }
    }
}

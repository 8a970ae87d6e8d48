//! Classification of provider intent reports and the state of the current
//! confirmation attempt.

use super::registry::RequestRegistry;
use crate::domain::intent::{IntentKind, IntentSnapshot, IntentStatus};
use crate::domain::method::{
    ConfirmParams, PaymentMethodOptions, PaymentMethodSource, SetupFutureUsage, ShippingDetails,
};
use crate::domain::operation::{OperationKind, OperationOutput, Outcome};
use crate::domain::platform::PlatformContext;
use crate::error::PaymentError;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use url::Url;

pub const CANCELED_MESSAGE: &str = "The payment has been canceled";
const FAILED_MESSAGE: &str = "The payment failed";

/// Maps a provider status report to the outcome of the operation that asked for it.
pub fn classify(snapshot: &IntentSnapshot, purpose: OperationKind) -> Outcome {
    let success = || Ok(OperationOutput::Intent(snapshot.clone()));
    let last_error = |fallback: &str| {
        snapshot
            .last_error_message
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    };

    match &snapshot.status {
        IntentStatus::Succeeded | IntentStatus::Processing | IntentStatus::RequiresCapture => {
            success()
        }
        IntentStatus::RequiresAction => match &snapshot.next_action_type {
            Some(action) if action.is_voucher() => success(),
            _ => Err(PaymentError::Canceled(last_error(CANCELED_MESSAGE))),
        },
        IntentStatus::RequiresPaymentMethod => Err(PaymentError::Failed(last_error(FAILED_MESSAGE))),
        IntentStatus::RequiresConfirmation if purpose == OperationKind::HandleNextAction => success(),
        IntentStatus::Canceled => Err(PaymentError::Canceled(last_error(CANCELED_MESSAGE))),
        other => Err(PaymentError::Unknown(format!("unhandled error: {other}"))),
    }
}

/// Maps a setup intent report to the outcome of `confirm_setup_intent`.
///
/// Only a succeeded setup resolves; there is no voucher or processing leniency.
pub fn classify_setup(snapshot: &IntentSnapshot) -> Outcome {
    match &snapshot.status {
        IntentStatus::Succeeded => Ok(OperationOutput::Intent(snapshot.clone())),
        IntentStatus::Canceled => Err(PaymentError::Canceled(
            snapshot
                .last_error_message
                .clone()
                .unwrap_or_else(|| CANCELED_MESSAGE.to_string()),
        )),
        other => Err(PaymentError::Unknown(format!("unhandled error: {other}"))),
    }
}

/// Interactive step a confirmation attempt is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubFlow {
    BankSelection,
    Wallet,
}

/// Everything needed to resume a confirmation after an interactive step.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationContext {
    pub client_secret: String,
    pub return_url: Option<Url>,
    pub shipping: Option<ShippingDetails>,
    pub options: Option<PaymentMethodOptions>,
    pub setup_future_usage: Option<SetupFutureUsage>,
    pub platform: PlatformContext,
    pub awaiting: Option<SubFlow>,
    /// Registry generation of the operation that owns this attempt.
    pub attempt: u64,
}

impl ConfirmationContext {
    pub fn new(
        client_secret: impl Into<String>,
        return_url: Option<Url>,
        platform: PlatformContext,
    ) -> Self {
        Self {
            client_secret: client_secret.into(),
            return_url,
            shipping: None,
            options: None,
            setup_future_usage: None,
            platform,
            awaiting: None,
            attempt: 0,
        }
    }

    pub fn from_params(params: &ConfirmParams, platform: PlatformContext) -> Self {
        Self {
            client_secret: params.client_secret.clone(),
            return_url: params.return_url.clone(),
            shipping: params.shipping.clone(),
            options: params.options.clone(),
            setup_future_usage: params.setup_future_usage,
            platform,
            awaiting: None,
            attempt: 0,
        }
    }

    pub fn awaiting(mut self, sub_flow: SubFlow) -> Self {
        self.awaiting = Some(sub_flow);
        self
    }

    pub fn for_attempt(mut self, attempt: u64) -> Self {
        self.attempt = attempt;
        self
    }

    /// Parameters for the re-entry after a sub-flow produced a payment method.
    pub fn params_for(&self, payment_method: PaymentMethodSource) -> ConfirmParams {
        ConfirmParams {
            client_secret: self.client_secret.clone(),
            payment_method,
            options: self.options.clone(),
            shipping: self.shipping.clone(),
            return_url: self.return_url.clone(),
            setup_future_usage: self.setup_future_usage,
        }
    }
}

/// Holder of the single confirmation attempt in flight.
#[derive(Debug, Default)]
pub struct ConfirmationTracker {
    current: Mutex<Option<ConfirmationContext>>,
}

impl ConfirmationTracker {
    fn lock(&self) -> MutexGuard<'_, Option<ConfirmationContext>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, context: ConfirmationContext) {
        *self.lock() = Some(context);
    }

    /// Sets the context unless an attempt is already tracked.
    pub fn set_if_empty(&self, context: ConfirmationContext) {
        self.lock().get_or_insert(context);
    }

    pub fn current(&self) -> Option<ConfirmationContext> {
        self.lock().clone()
    }

    pub fn is_awaiting(&self, sub_flow: SubFlow) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|ctx| ctx.awaiting == Some(sub_flow))
    }

    /// Claims the context if it is waiting on `sub_flow`.
    ///
    /// The context stays tracked with the sub-flow marked done so the provider's
    /// intent report for the re-entry can still clear it.
    pub fn resume(&self, sub_flow: SubFlow) -> Option<ConfirmationContext> {
        let mut guard = self.lock();
        let ctx = guard.as_mut().filter(|ctx| ctx.awaiting == Some(sub_flow))?;
        ctx.awaiting = None;
        Some(ctx.clone())
    }

    /// Like [`Self::resume`], but only for the attempt stamped `attempt`.
    pub fn resume_attempt(&self, sub_flow: SubFlow, attempt: u64) -> Option<ConfirmationContext> {
        let mut guard = self.lock();
        let ctx = guard
            .as_mut()
            .filter(|ctx| ctx.awaiting == Some(sub_flow) && ctx.attempt == attempt)?;
        ctx.awaiting = None;
        Some(ctx.clone())
    }

    /// Drops the context if it is waiting on `sub_flow`.
    pub fn abandon(&self, sub_flow: SubFlow) -> Option<ConfirmationContext> {
        self.take_if(|ctx| ctx.awaiting == Some(sub_flow))
    }

    /// Like [`Self::abandon`], but only for the attempt stamped `attempt`.
    pub fn abandon_attempt(&self, sub_flow: SubFlow, attempt: u64) -> Option<ConfirmationContext> {
        self.take_if(|ctx| ctx.awaiting == Some(sub_flow) && ctx.attempt == attempt)
    }

    pub fn clear(&self) {
        self.lock().take();
    }

    /// Drops the context only if it still belongs to `attempt`.
    pub fn clear_attempt(&self, attempt: u64) -> bool {
        self.take_if(|ctx| ctx.attempt == attempt).is_some()
    }

    fn take_if(
        &self,
        predicate: impl FnOnce(&ConfirmationContext) -> bool,
    ) -> Option<ConfirmationContext> {
        let mut guard = self.lock();
        if guard.as_ref().is_some_and(predicate) {
            return guard.take();
        }
        None
    }
}

/// Routes a provider intent report to every operation listening for it.
///
/// Returns how many operations were resolved.
pub fn settle(
    registry: &RequestRegistry,
    tracker: &ConfirmationTracker,
    intent: IntentKind,
    report: Result<IntentSnapshot, String>,
) -> usize {
    let resolved = match (intent, report) {
        (IntentKind::Setup, Ok(snapshot)) => {
            let outcome = classify_setup(&snapshot);
            usize::from(registry.resolve(OperationKind::ConfirmSetupIntent, outcome))
        }
        (IntentKind::Setup, Err(message)) => usize::from(registry.resolve(
            OperationKind::ConfirmSetupIntent,
            Err(PaymentError::Provider(message)),
        )),
        (IntentKind::Payment, Ok(snapshot))
            if snapshot.status == IntentStatus::RequiresConfirmation =>
        {
            // The one row whose outcome depends on who is listening.
            [OperationKind::ConfirmPayment, OperationKind::HandleNextAction]
                .into_iter()
                .filter(|kind| registry.resolve(*kind, classify(&snapshot, *kind)))
                .count()
        }
        (IntentKind::Payment, Ok(snapshot)) => {
            registry.resolve_both(classify(&snapshot, OperationKind::ConfirmPayment))
        }
        (IntentKind::Payment, Err(message)) => {
            registry.resolve_both(Err(PaymentError::Provider(message)))
        }
    };

    if intent == IntentKind::Payment
        && !registry.is_pending(OperationKind::ConfirmPayment)
        && !registry.is_pending(OperationKind::HandleNextAction)
    {
        tracker.clear();
    }

    if resolved == 0 {
        debug!(?intent, "Intent report arrived with no listener");
    } else {
        info!(?intent, resolved, "Intent report settled");
    }
    resolved
}

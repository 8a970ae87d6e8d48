use crate::domain::intent::{IntentSnapshot, IntentStatus};
use crate::domain::method::{
    CardTokenParams, ConfirmParams, PaymentMethod, PaymentMethodParams, PaymentMethodType,
};
use crate::domain::platform::{Platform, PlatformContext};
use crate::domain::ports::{EphemeralKeyProvider, KeySource, KeyUpdateListener, PaymentProvider};
use crate::domain::session::{KeyRequest, SessionContext};
use crate::domain::sheet::{PaymentSheetConfig, PresentSheetOptions};
use crate::domain::wallet::{AuthorizedWallet, WalletToken};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{RwLock, oneshot};
use url::Url;

/// API version the in-memory provider asks ephemeral keys for.
pub const KEY_API_VERSION: &str = "2020-08-27";

/// A call the in-memory provider received.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Configure { publishable_key: String },
    ConfirmPayment { platform: Platform, params: ConfirmParams },
    ConfirmSetupIntent { platform: Platform, params: ConfirmParams },
    HandleNextAction { client_secret: String },
    CreatePaymentMethod { method_type: PaymentMethodType },
    CreateWalletPaymentMethod,
    CreateCvcUpdateToken,
    CreateCardToken { name: Option<String> },
    RetrievePaymentIntent { client_secret: String },
    RetrieveSetupIntent { client_secret: String },
    PresentBankSelection { method_type: PaymentMethodType },
    PresentWallet { currency: String, total: Decimal },
    PresentPaymentOptions { include_wallet: bool },
    InitPaymentSheet { custom_flow: bool },
    PresentPaymentSheet { confirm_payment: bool },
    ConfirmPaymentSheet,
    InitCustomerSession,
    IsWalletSupported { platform: Platform },
    HandleUrlCallback { url: String },
}

/// Key deliveries observed by the in-memory customer session.
#[derive(Debug, Default)]
pub struct RecordedKeys {
    updates: Mutex<Vec<std::result::Result<Value, String>>>,
}

impl RecordedKeys {
    pub fn updates(&self) -> Vec<std::result::Result<Value, String>> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl KeyUpdateListener for RecordedKeys {
    fn on_key_update(&self, key: Value) {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Ok(key));
    }

    fn on_key_update_failure(&self, _code: i32, message: &str) {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Err(message.to_string()));
    }
}

struct Gate {
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<Option<String>>,
}

/// A provider call parked by [`ScriptedProvider::hold_next`].
pub struct Hold {
    reached: Option<oneshot::Receiver<()>>,
    release: oneshot::Sender<Option<String>>,
}

impl Hold {
    /// Waits until a call is parked on this hold.
    pub async fn reached(&mut self) {
        if let Some(reached) = self.reached.take() {
            let _ = reached.await;
        }
    }

    /// Lets the parked call go through.
    pub fn release(self) {
        let _ = self.release.send(None);
    }

    /// Lets the parked call fail with `message`.
    pub fn fail(self, message: impl Into<String>) {
        let _ = self.release.send(Some(message.into()));
    }
}

/// A thread-safe in-memory stand-in for the vendor SDK.
///
/// Records every call, accepts every submission unless a failure was queued
/// with [`ScriptedProvider::fail_next`], and mints deterministic ids
/// (`pm_1`, `pm_2`, ..., `cvctok_3`). Retrieved intents always report `succeeded`.
#[derive(Default, Clone)]
pub struct ScriptedProvider {
    calls: Arc<RwLock<Vec<ProviderCall>>>,
    failures: Arc<RwLock<VecDeque<String>>>,
    gates: Arc<RwLock<VecDeque<Gate>>>,
    next_id: Arc<AtomicU64>,
    keys: Arc<RecordedKeys>,
    return_url: Arc<RwLock<Option<Url>>>,
    wallet_unavailable: Arc<AtomicBool>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next provider call fail with `message`.
    pub async fn fail_next(&self, message: impl Into<String>) {
        self.failures.write().await.push_back(message.into());
    }

    /// Parks the next submission until the returned hold is released or failed.
    pub async fn hold_next(&self) -> Hold {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.gates.write().await.push_back(Gate {
            reached: reached_tx,
            release: release_rx,
        });
        Hold {
            reached: Some(reached_rx),
            release: release_tx,
        }
    }

    pub async fn calls(&self) -> Vec<ProviderCall> {
        self.calls.read().await.clone()
    }

    pub fn key_updates(&self) -> Vec<std::result::Result<Value, String>> {
        self.keys.updates()
    }

    pub fn set_wallet_supported(&self, supported: bool) {
        self.wallet_unavailable.store(!supported, Ordering::SeqCst);
    }

    async fn record(&self, call: ProviderCall) -> Result<()> {
        let gate = self.gates.write().await.pop_front();
        if let Some(gate) = gate {
            let _ = gate.reached.send(());
            if let Ok(Some(message)) = gate.release.await {
                return Err(PaymentError::Provider(message));
            }
        }
        if let Some(message) = self.failures.write().await.pop_front() {
            return Err(PaymentError::Provider(message));
        }
        self.calls.write().await.push(call);
        Ok(())
    }

    /// Records a query, which cannot fail.
    async fn observe(&self, call: ProviderCall) {
        self.calls.write().await.push(call);
    }

    fn mint(&self, prefix: &str) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}_{id}")
    }
}

/// `pi_123_secret_abc` belongs to `pi_123`.
fn intent_id(client_secret: &str) -> &str {
    client_secret
        .split_once("_secret")
        .map_or(client_secret, |(id, _)| id)
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
    async fn configure(&self, session: &SessionContext) -> Result<()> {
        self.record(ProviderCall::Configure {
            publishable_key: session.config().publishable_key.clone(),
        })
        .await?;
        *self.return_url.write().await = session.return_url(Platform::Ios);
        Ok(())
    }

    async fn confirm_payment(&self, ctx: &PlatformContext, params: ConfirmParams) -> Result<()> {
        self.record(ProviderCall::ConfirmPayment {
            platform: ctx.platform,
            params,
        })
        .await
    }

    async fn confirm_setup_intent(
        &self,
        ctx: &PlatformContext,
        params: ConfirmParams,
    ) -> Result<()> {
        self.record(ProviderCall::ConfirmSetupIntent {
            platform: ctx.platform,
            params,
        })
        .await
    }

    async fn handle_next_action(&self, _ctx: &PlatformContext, client_secret: &str) -> Result<()> {
        self.record(ProviderCall::HandleNextAction {
            client_secret: client_secret.to_string(),
        })
        .await
    }

    async fn create_payment_method(&self, params: PaymentMethodParams) -> Result<PaymentMethod> {
        self.record(ProviderCall::CreatePaymentMethod {
            method_type: params.method_type,
        })
        .await?;
        Ok(PaymentMethod {
            id: self.mint("pm"),
            method_type: params.method_type,
            card_last4: params.card.and_then(|card| card.last4),
            billing_details: params.billing_details,
        })
    }

    async fn create_wallet_payment_method(&self, _token: WalletToken) -> Result<PaymentMethod> {
        self.record(ProviderCall::CreateWalletPaymentMethod).await?;
        Ok(PaymentMethod {
            id: self.mint("pm"),
            method_type: PaymentMethodType::Card,
            billing_details: None,
            card_last4: None,
        })
    }

    async fn create_cvc_update_token(&self, _cvc: &str) -> Result<String> {
        self.record(ProviderCall::CreateCvcUpdateToken).await?;
        Ok(self.mint("cvctok"))
    }

    async fn create_card_token(&self, params: CardTokenParams) -> Result<String> {
        self.record(ProviderCall::CreateCardToken { name: params.name })
            .await?;
        Ok(self.mint("tok"))
    }

    async fn retrieve_payment_intent(&self, client_secret: &str) -> Result<IntentSnapshot> {
        self.record(ProviderCall::RetrievePaymentIntent {
            client_secret: client_secret.to_string(),
        })
        .await?;
        Ok(IntentSnapshot::new(intent_id(client_secret), IntentStatus::Succeeded))
    }

    async fn retrieve_setup_intent(&self, client_secret: &str) -> Result<IntentSnapshot> {
        self.record(ProviderCall::RetrieveSetupIntent {
            client_secret: client_secret.to_string(),
        })
        .await?;
        Ok(IntentSnapshot::new(intent_id(client_secret), IntentStatus::Succeeded))
    }

    async fn present_bank_selection(
        &self,
        _ctx: &PlatformContext,
        method_type: PaymentMethodType,
    ) -> Result<()> {
        self.record(ProviderCall::PresentBankSelection { method_type })
            .await
    }

    async fn present_wallet(
        &self,
        _ctx: &PlatformContext,
        wallet: &AuthorizedWallet,
    ) -> Result<()> {
        self.record(ProviderCall::PresentWallet {
            currency: wallet.currency.clone(),
            total: wallet.total,
        })
        .await
    }

    async fn present_payment_options(
        &self,
        _ctx: &PlatformContext,
        include_wallet: bool,
    ) -> Result<()> {
        self.record(ProviderCall::PresentPaymentOptions { include_wallet })
            .await
    }

    async fn init_payment_sheet(
        &self,
        _ctx: &PlatformContext,
        config: PaymentSheetConfig,
    ) -> Result<()> {
        self.record(ProviderCall::InitPaymentSheet {
            custom_flow: config.custom_flow,
        })
        .await
    }

    async fn present_payment_sheet(
        &self,
        _ctx: &PlatformContext,
        options: PresentSheetOptions,
    ) -> Result<()> {
        self.record(ProviderCall::PresentPaymentSheet {
            confirm_payment: options.confirm_payment,
        })
        .await
    }

    async fn confirm_payment_sheet(&self, _ctx: &PlatformContext) -> Result<()> {
        self.record(ProviderCall::ConfirmPaymentSheet).await
    }

    async fn init_customer_session(&self, keys: Arc<dyn KeySource>) -> Result<()> {
        self.record(ProviderCall::InitCustomerSession).await?;
        let listener: Arc<dyn KeyUpdateListener> = self.keys.clone();
        keys.create_ephemeral_key(KEY_API_VERSION, listener).await;
        Ok(())
    }

    async fn is_wallet_supported(&self, platform: Platform) -> bool {
        self.observe(ProviderCall::IsWalletSupported { platform }).await;
        !self.wallet_unavailable.load(Ordering::SeqCst)
    }

    async fn handle_url_callback(&self, url: &Url) -> bool {
        self.observe(ProviderCall::HandleUrlCallback {
            url: url.to_string(),
        })
        .await;
        self.return_url.read().await.as_ref().is_some_and(|expected| {
            expected.scheme() == url.scheme() && expected.host_str() == url.host_str()
        })
    }
}

/// Issues locally minted ephemeral keys, for running without a merchant backend.
#[derive(Debug, Default)]
pub struct StaticKeyProvider {
    issued: AtomicU64,
}

impl StaticKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EphemeralKeyProvider for StaticKeyProvider {
    async fn fetch_ephemeral_key(&self, request: KeyRequest) -> Result<Value> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({
            "id": format!("ephkey_{n}"),
            "secret": format!("ek_test_{n}"),
            "apiVersion": request.api_version,
            "sessionId": request.session_id,
        }))
    }
}

use super::bridge::EventBridge;
use super::confirmation::{ConfirmationContext, ConfirmationTracker, SubFlow};
use super::key_session::{CustomerKeySource, SessionHandle};
use super::registry::{Pending, RequestRegistry};
use super::resolution::{PaymentMethodResolver, Resolution};
use crate::domain::intent::IntentSnapshot;
use crate::domain::method::PaymentMethodRequest;
use crate::domain::operation::{OperationKind, OperationOutput};
use crate::domain::platform::{Platform, PlatformContext};
use crate::domain::ports::{EphemeralKeyProviderRef, PaymentProviderRef};
use crate::domain::session::{SessionConfig, SessionContext};
use crate::domain::sheet::{MethodSelection, PaymentSheetConfig, PresentSheetOptions};
use crate::domain::wallet::WalletRequest;
use crate::error::{PaymentError, Result};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use url::Url;

const RETRIEVE_PAYMENT_FAILED: &str = "Failed to retrieve the PaymentIntent";
const RETRIEVE_SETUP_FAILED: &str = "Failed to retrieve the SetupIntent";

/// State shared by the orchestrator and the event bridge.
pub(crate) struct Core {
    pub(crate) registry: Arc<RequestRegistry>,
    pub(crate) tracker: ConfirmationTracker,
    pub(crate) provider: PaymentProviderRef,
    pub(crate) keys: Option<EphemeralKeyProviderRef>,
    pub(crate) session: Arc<SessionHandle>,
    selection: Mutex<Option<MethodSelection>>,
    tasks: TaskTracker,
    idle: tokio::sync::Mutex<()>,
    runtime: Handle,
}

impl Core {
    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn_on(task, &self.runtime);
    }

    /// Runs a provider submission in the background. A rejected submission
    /// resolves the attempt with `Failed`, since no platform signal will follow.
    pub(crate) fn submit<F>(self: &Arc<Self>, pending: &Pending, call: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let kind = pending.kind();
        let generation = pending.generation();
        let core = Arc::clone(self);
        self.spawn(async move {
            if let Err(err) = call.await {
                warn!(operation = %kind, generation, error = %err, "Provider rejected submission");
                core.registry
                    .resolve_if(kind, generation, Err(submission_failed(err)));
                if kind == OperationKind::ConfirmPayment {
                    core.tracker.clear_attempt(generation);
                }
            }
        });
    }

    /// Runs a provider call whose value resolves the attempt directly.
    pub(crate) fn deliver<F, T>(
        self: &Arc<Self>,
        pending: &Pending,
        call: F,
        output: fn(T) -> OperationOutput,
    ) where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let kind = pending.kind();
        let generation = pending.generation();
        let core = Arc::clone(self);
        self.spawn(async move {
            let outcome = call.await.map(output).map_err(provider_error);
            core.registry.resolve_if(kind, generation, outcome);
        });
    }

    fn selection(&self) -> MutexGuard<'_, Option<MethodSelection>> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn remember_selection(&self, selection: MethodSelection) {
        *self.selection() = Some(selection);
    }
}

pub(crate) fn submission_failed(err: PaymentError) -> PaymentError {
    match err {
        PaymentError::Provider(message) | PaymentError::Failed(message) => {
            PaymentError::Failed(message)
        }
        other => PaymentError::Failed(other.to_string()),
    }
}

/// Errors already classified (`Provider`, `Unknown`) pass through unchanged.
pub(crate) fn provider_error(err: PaymentError) -> PaymentError {
    match err {
        PaymentError::Provider(_) | PaymentError::Unknown(_) => err,
        other => PaymentError::Provider(other.to_string()),
    }
}

/// Entry point for every caller operation.
///
/// Each operation either fails synchronously (validation, `Busy`, not
/// initialised) or returns a [`Pending`] that resolves once the provider or the
/// platform reports back. Provider calls run on the runtime handed to `new`.
#[derive(Clone)]
pub struct PaymentOrchestrator {
    core: Arc<Core>,
}

impl PaymentOrchestrator {
    pub fn new(
        provider: PaymentProviderRef,
        keys: Option<EphemeralKeyProviderRef>,
        runtime: Handle,
    ) -> Self {
        Self {
            core: Arc::new(Core {
                registry: Arc::new(RequestRegistry::new()),
                tracker: ConfirmationTracker::default(),
                provider,
                keys,
                session: Arc::new(SessionHandle::default()),
                selection: Mutex::new(None),
                tasks: TaskTracker::new(),
                idle: tokio::sync::Mutex::new(()),
                runtime,
            }),
        }
    }

    /// Ingress for platform signals.
    pub fn bridge(&self) -> EventBridge {
        EventBridge::new(Arc::clone(&self.core))
    }

    pub fn session(&self) -> Option<Arc<SessionContext>> {
        self.core.session.get()
    }

    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.core.registry.is_pending(kind)
    }

    pub fn pending_kinds(&self) -> Vec<OperationKind> {
        self.core.registry.pending_kinds()
    }

    /// Waits until every background provider call has finished.
    ///
    /// Concurrent callers take turns, so one caller reopening the tracker can
    /// never cut another caller's wait short.
    pub async fn idle(&self) {
        let _turn = self.core.idle.lock().await;
        self.core.tasks.close();
        self.core.tasks.wait().await;
        self.core.tasks.reopen();
    }

    fn require_session(&self) -> Result<Arc<SessionContext>> {
        self.core.session.get().ok_or(PaymentError::NotInitialized)
    }

    fn ensure_idle(&self, kind: OperationKind) -> Result<()> {
        if self.core.registry.is_pending(kind) {
            return Err(PaymentError::Busy(kind));
        }
        Ok(())
    }

    /// Applies a new configuration and resets all in-flight state.
    ///
    /// A configuration the provider refuses leaves the current session and its
    /// pending operations untouched.
    pub async fn initialise(&self, config: SessionConfig) -> Result<()> {
        let session = SessionContext::new(config)?;
        self.core.provider.configure(&session).await?;

        let dropped = self.core.registry.clear(Err(PaymentError::Canceled(
            "The payment session was re-initialised".to_string(),
        )));
        self.core.tracker.clear();
        self.core.selection().take();
        info!(
            test_mode = session.config().is_test_mode(),
            dropped, "Payment layer initialised"
        );
        self.core.session.set(session);
        Ok(())
    }

    pub fn set_session_id(&self, session_id: &str) -> Result<()> {
        if session_id.trim().is_empty() {
            return Err(PaymentError::missing("sessionId"));
        }
        if !self.core.session.update(|s| s.with_session_id(session_id)) {
            return Err(PaymentError::NotInitialized);
        }
        Ok(())
    }

    pub fn init_customer_session(&self) -> Result<Pending> {
        self.require_session()?;
        self.ensure_idle(OperationKind::InitCustomerSession)?;
        let keys = self
            .core
            .keys
            .clone()
            .ok_or_else(|| PaymentError::validation("No ephemeral key provider is configured"))?;

        let pending = self.core.registry.begin(OperationKind::InitCustomerSession)?;
        let source = Arc::new(CustomerKeySource::new(
            Arc::clone(&self.core.registry),
            Arc::clone(&self.core.session),
            keys,
            pending.generation(),
        ));
        let provider = Arc::clone(&self.core.provider);
        self.core.submit(&pending, async move {
            provider.init_customer_session(source).await
        });
        Ok(pending)
    }

    pub fn confirm_payment(
        &self,
        ctx: &PlatformContext,
        client_secret: &str,
        request: &PaymentMethodRequest<'_>,
    ) -> Result<Pending> {
        let session = self.require_session()?;
        self.ensure_idle(OperationKind::ConfirmPayment)?;
        require_secret(client_secret, "paymentIntentClientSecret")?;
        let resolver = PaymentMethodResolver::new(&session, ctx.platform);
        let resolution = resolver.for_confirmation(client_secret, request)?;
        ctx.require_host()?;

        let pending = self.core.registry.begin(OperationKind::ConfirmPayment)?;
        let attempt = pending.generation();
        let provider = Arc::clone(&self.core.provider);
        let platform = ctx.clone();
        match resolution {
            Resolution::Ready(params) => {
                self.core.tracker.set(
                    ConfirmationContext::from_params(&params, ctx.clone()).for_attempt(attempt),
                );
                self.core.submit(&pending, async move {
                    provider.confirm_payment(&platform, params).await
                });
            }
            Resolution::BankSelection(method_type) => {
                self.core.tracker.set(
                    ConfirmationContext::new(client_secret, resolver.return_url(), ctx.clone())
                        .awaiting(SubFlow::BankSelection)
                        .for_attempt(attempt),
                );
                self.core.submit(&pending, async move {
                    provider.present_bank_selection(&platform, method_type).await
                });
            }
            Resolution::Wallet(wallet) => {
                self.core.tracker.set(
                    ConfirmationContext::new(client_secret, resolver.return_url(), ctx.clone())
                        .awaiting(SubFlow::Wallet)
                        .for_attempt(attempt),
                );
                self.core.submit(&pending, async move {
                    provider.present_wallet(&platform, &wallet).await
                });
            }
        }
        Ok(pending)
    }

    pub fn confirm_setup_intent(
        &self,
        ctx: &PlatformContext,
        client_secret: &str,
        request: &PaymentMethodRequest<'_>,
    ) -> Result<Pending> {
        let session = self.require_session()?;
        self.ensure_idle(OperationKind::ConfirmSetupIntent)?;
        require_secret(client_secret, "setupIntentClientSecret")?;
        let params =
            PaymentMethodResolver::new(&session, ctx.platform).for_setup(client_secret, request)?;
        ctx.require_host()?;

        let pending = self.core.registry.begin(OperationKind::ConfirmSetupIntent)?;
        let provider = Arc::clone(&self.core.provider);
        let platform = ctx.clone();
        self.core.submit(&pending, async move {
            provider.confirm_setup_intent(&platform, params).await
        });
        Ok(pending)
    }

    pub fn handle_next_action(&self, ctx: &PlatformContext, client_secret: &str) -> Result<Pending> {
        let session = self.require_session()?;
        self.ensure_idle(OperationKind::HandleNextAction)?;
        require_secret(client_secret, "paymentIntentClientSecret")?;
        ctx.require_host()?;

        let pending = self.core.registry.begin(OperationKind::HandleNextAction)?;
        self.core.tracker.set_if_empty(
            ConfirmationContext::new(client_secret, session.return_url(ctx.platform), ctx.clone())
                .for_attempt(pending.generation()),
        );
        let provider = Arc::clone(&self.core.provider);
        let platform = ctx.clone();
        let secret = client_secret.to_string();
        self.core.submit(&pending, async move {
            provider.handle_next_action(&platform, &secret).await
        });
        Ok(pending)
    }

    pub fn create_payment_method(&self, request: &PaymentMethodRequest<'_>) -> Result<Pending> {
        let session = self.require_session()?;
        self.ensure_idle(OperationKind::CreatePaymentMethod)?;
        // Platform only matters for wallets, which are rejected here anyway.
        let params = PaymentMethodResolver::new(&session, Platform::Android).params(request)?;

        let pending = self.core.registry.begin(OperationKind::CreatePaymentMethod)?;
        let provider = Arc::clone(&self.core.provider);
        self.core.deliver(
            &pending,
            async move { provider.create_payment_method(params).await },
            OperationOutput::PaymentMethod,
        );
        Ok(pending)
    }

    pub fn present_wallet_authorization(
        &self,
        ctx: &PlatformContext,
        request: &WalletRequest,
    ) -> Result<Pending> {
        let session = self.require_session()?;
        self.ensure_idle(OperationKind::WalletAuthorization)?;
        let wallet = PaymentMethodResolver::new(&session, ctx.platform).wallet(request)?;
        ctx.require_host()?;

        let pending = self.core.registry.begin(OperationKind::WalletAuthorization)?;
        let provider = Arc::clone(&self.core.provider);
        let platform = ctx.clone();
        self.core.submit(&pending, async move {
            provider.present_wallet(&platform, &wallet).await
        });
        Ok(pending)
    }

    /// Presents the provider's payment method chooser. The choice arrives later
    /// as a method-selected signal.
    pub async fn show_payment_options(&self, ctx: &PlatformContext) -> Result<()> {
        let session = self.require_session()?;
        ctx.require_host()?;
        self.core
            .provider
            .present_payment_options(ctx, session.config().show_wallet_in_options)
            .await
    }

    /// Resolves with the last chosen payment method, running the wallet first
    /// when the wallet was chosen.
    pub fn get_selected_payment_method_id(
        &self,
        ctx: &PlatformContext,
        wallet: Option<&WalletRequest>,
    ) -> Result<Pending> {
        let session = self.require_session()?;
        self.ensure_idle(OperationKind::GetSelectedPaymentMethod)?;
        let selection = self.core.selection().clone().unwrap_or_default();

        if !selection.use_wallet {
            let pending = self.core.registry.begin(OperationKind::GetSelectedPaymentMethod)?;
            self.core.registry.resolve_if(
                OperationKind::GetSelectedPaymentMethod,
                pending.generation(),
                Ok(OperationOutput::SelectedMethod(selection.method_id)),
            );
            return Ok(pending);
        }

        let empty = WalletRequest::default();
        let wallet = PaymentMethodResolver::new(&session, ctx.platform)
            .wallet(wallet.unwrap_or(&empty))?;
        ctx.require_host()?;

        let pending = self.core.registry.begin(OperationKind::GetSelectedPaymentMethod)?;
        let provider = Arc::clone(&self.core.provider);
        let platform = ctx.clone();
        self.core.submit(&pending, async move {
            provider.present_wallet(&platform, &wallet).await
        });
        Ok(pending)
    }

    pub fn init_payment_sheet(
        &self,
        ctx: &PlatformContext,
        config: PaymentSheetConfig,
    ) -> Result<Pending> {
        let session = self.require_session()?;
        self.ensure_idle(OperationKind::InitPaymentSheet)?;
        require_secret(
            config.payment_intent_client_secret.as_deref().unwrap_or_default(),
            "the paymentIntentClientSecret",
        )?;
        if config.wallet {
            let merchant_missing =
                ctx.platform == Platform::Ios && session.merchant_identifier().is_none();
            if config.merchant_country_code.is_none() || merchant_missing {
                return Err(PaymentError::validation(
                    "merchantIdentifier or merchantCountryCode is not provided",
                ));
            }
        }
        ctx.require_host()?;

        let pending = self.core.registry.begin(OperationKind::InitPaymentSheet)?;
        let provider = Arc::clone(&self.core.provider);
        let platform = ctx.clone();
        self.core.submit(&pending, async move {
            provider.init_payment_sheet(&platform, config).await
        });
        Ok(pending)
    }

    pub fn present_payment_sheet(
        &self,
        ctx: &PlatformContext,
        options: PresentSheetOptions,
    ) -> Result<Pending> {
        self.require_session()?;
        self.ensure_idle(OperationKind::PresentPaymentSheet)?;
        ctx.require_host()?;

        let pending = self.core.registry.begin(OperationKind::PresentPaymentSheet)?;
        let provider = Arc::clone(&self.core.provider);
        let platform = ctx.clone();
        self.core.submit(&pending, async move {
            provider.present_payment_sheet(&platform, options).await
        });
        Ok(pending)
    }

    pub fn confirm_payment_sheet_payment(&self, ctx: &PlatformContext) -> Result<Pending> {
        self.require_session()?;
        self.ensure_idle(OperationKind::ConfirmPaymentSheet)?;
        ctx.require_host()?;

        let pending = self.core.registry.begin(OperationKind::ConfirmPaymentSheet)?;
        let provider = Arc::clone(&self.core.provider);
        let platform = ctx.clone();
        self.core.submit(&pending, async move {
            provider.confirm_payment_sheet(&platform).await
        });
        Ok(pending)
    }

    pub fn create_token_for_cvc_update(&self, cvc: &str) -> Result<Pending> {
        self.require_session()?;
        self.ensure_idle(OperationKind::CreateCvcUpdateToken)?;
        if cvc.trim().is_empty() {
            return Err(PaymentError::missing("CVC"));
        }

        let pending = self.core.registry.begin(OperationKind::CreateCvcUpdateToken)?;
        let provider = Arc::clone(&self.core.provider);
        let cvc = cvc.to_string();
        self.core.deliver(
            &pending,
            async move { provider.create_cvc_update_token(&cvc).await },
            OperationOutput::Token,
        );
        Ok(pending)
    }

    /// Turns the captured card into a single-use token.
    pub fn create_token(&self, request: &PaymentMethodRequest<'_>) -> Result<Pending> {
        let session = self.require_session()?;
        self.ensure_idle(OperationKind::CreateToken)?;
        let params = PaymentMethodResolver::new(&session, Platform::Android).card_token(request)?;

        let pending = self.core.registry.begin(OperationKind::CreateToken)?;
        let provider = Arc::clone(&self.core.provider);
        self.core.deliver(
            &pending,
            async move { provider.create_card_token(params).await },
            OperationOutput::Token,
        );
        Ok(pending)
    }

    pub fn retrieve_payment_intent(&self, client_secret: &str) -> Result<Pending> {
        self.retrieve(
            OperationKind::RetrievePaymentIntent,
            client_secret,
            RETRIEVE_PAYMENT_FAILED,
        )
    }

    pub fn retrieve_setup_intent(&self, client_secret: &str) -> Result<Pending> {
        self.retrieve(
            OperationKind::RetrieveSetupIntent,
            client_secret,
            RETRIEVE_SETUP_FAILED,
        )
    }

    fn retrieve(
        &self,
        kind: OperationKind,
        client_secret: &str,
        failure: &'static str,
    ) -> Result<Pending> {
        self.require_session()?;
        self.ensure_idle(kind)?;
        require_secret(client_secret, "clientSecret")?;

        let pending = self.core.registry.begin(kind)?;
        let provider = Arc::clone(&self.core.provider);
        let secret = client_secret.to_string();
        self.core.deliver(
            &pending,
            async move {
                let retrieved: Result<IntentSnapshot> = match kind {
                    OperationKind::RetrieveSetupIntent => {
                        provider.retrieve_setup_intent(&secret).await
                    }
                    _ => provider.retrieve_payment_intent(&secret).await,
                };
                retrieved.map_err(|err| {
                    warn!(operation = %kind, error = %err, "Intent retrieval failed");
                    PaymentError::Unknown(failure.to_string())
                })
            },
            OperationOutput::Intent,
        );
        Ok(pending)
    }

    /// Whether the device wallet of `platform` can take payments. Needs no session.
    pub async fn is_wallet_supported(&self, platform: Platform) -> bool {
        self.core.provider.is_wallet_supported(platform).await
    }

    /// Offers a deep link to the provider. A missing or unparseable url is not handled.
    pub async fn handle_url_callback(&self, url: Option<&str>) -> bool {
        let Some(url) = url.and_then(|raw| Url::parse(raw).ok()) else {
            debug!("Ignoring url callback without a valid url");
            return false;
        };
        self.core.provider.handle_url_callback(&url).await
    }
}

fn require_secret(secret: &str, field: &str) -> Result<()> {
    if secret.trim().is_empty() {
        return Err(PaymentError::missing(field));
    }
    Ok(())
}

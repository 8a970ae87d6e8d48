use super::intent::IntentSnapshot;
use super::method::{
    CardTokenParams, ConfirmParams, PaymentMethod, PaymentMethodParams, PaymentMethodType,
};
use super::platform::{Platform, PlatformContext};
use super::session::{KeyRequest, SessionContext};
use super::sheet::{PaymentSheetConfig, PresentSheetOptions};
use super::wallet::{AuthorizedWallet, WalletToken};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// The vendor payment SDK as seen by the orchestration layer.
///
/// Submissions (`confirm_*`, `handle_next_action`, `present_*`, `init_payment_sheet`)
/// only report whether the provider accepted the request. Their results come back
/// later as platform signals through the event bridge.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Applies the session configuration. Called once per `initialise`.
    async fn configure(&self, session: &SessionContext) -> Result<()>;

    async fn confirm_payment(&self, ctx: &PlatformContext, params: ConfirmParams) -> Result<()>;
    async fn confirm_setup_intent(&self, ctx: &PlatformContext, params: ConfirmParams)
    -> Result<()>;
    async fn handle_next_action(&self, ctx: &PlatformContext, client_secret: &str) -> Result<()>;

    async fn create_payment_method(&self, params: PaymentMethodParams) -> Result<PaymentMethod>;
    async fn create_wallet_payment_method(&self, token: WalletToken) -> Result<PaymentMethod>;
    async fn create_cvc_update_token(&self, cvc: &str) -> Result<String>;
    async fn create_card_token(&self, params: CardTokenParams) -> Result<String>;

    async fn retrieve_payment_intent(&self, client_secret: &str) -> Result<IntentSnapshot>;
    async fn retrieve_setup_intent(&self, client_secret: &str) -> Result<IntentSnapshot>;

    async fn present_bank_selection(
        &self,
        ctx: &PlatformContext,
        method_type: PaymentMethodType,
    ) -> Result<()>;
    async fn present_wallet(&self, ctx: &PlatformContext, wallet: &AuthorizedWallet)
    -> Result<()>;
    async fn present_payment_options(&self, ctx: &PlatformContext, include_wallet: bool)
    -> Result<()>;

    async fn init_payment_sheet(
        &self,
        ctx: &PlatformContext,
        config: PaymentSheetConfig,
    ) -> Result<()>;
    async fn present_payment_sheet(
        &self,
        ctx: &PlatformContext,
        options: PresentSheetOptions,
    ) -> Result<()>;
    async fn confirm_payment_sheet(&self, ctx: &PlatformContext) -> Result<()>;

    /// Starts a customer session. The provider asks `keys` for ephemeral keys
    /// whenever it needs one.
    async fn init_customer_session(&self, keys: Arc<dyn KeySource>) -> Result<()>;

    /// Whether the device wallet of `platform` can take payments.
    async fn is_wallet_supported(&self, platform: Platform) -> bool;

    /// Offers a deep link back to the provider. Returns true when it was the
    /// provider's own redirect return.
    async fn handle_url_callback(&self, url: &Url) -> bool;
}

/// Backend that issues customer ephemeral keys.
#[async_trait]
pub trait EphemeralKeyProvider: Send + Sync {
    async fn fetch_ephemeral_key(&self, request: KeyRequest) -> Result<Value>;
}

/// Provider-side receiver of ephemeral keys.
pub trait KeyUpdateListener: Send + Sync {
    fn on_key_update(&self, key: Value);
    fn on_key_update_failure(&self, code: i32, message: &str);
}

/// Handle the provider's customer session uses to request keys.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn create_ephemeral_key(&self, api_version: &str, listener: Arc<dyn KeyUpdateListener>);
}

pub type PaymentProviderRef = Arc<dyn PaymentProvider>;
pub type EphemeralKeyProviderRef = Arc<dyn EphemeralKeyProvider>;

#![allow(dead_code)]

use paybridge::application::bridge::{IntentReport, PlatformEvent, WalletResult};
use paybridge::application::orchestrator::PaymentOrchestrator;
use paybridge::domain::intent::{IntentKind, IntentSnapshot};
use paybridge::domain::method::{CardCapture, PaymentMethodRequest};
use paybridge::domain::platform::{Platform, PlatformContext};
use paybridge::domain::ports::EphemeralKeyProviderRef;
use paybridge::domain::session::SessionConfig;
use paybridge::domain::wallet::{CartSummaryItem, SummaryItemType, WalletRequest, WalletToken};
use paybridge::infrastructure::in_memory::{ProviderCall, ScriptedProvider};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Handle;

pub const RETURN_URL: &str = "shop://safepay";

pub struct Harness {
    pub provider: ScriptedProvider,
    pub orchestrator: PaymentOrchestrator,
}

impl Harness {
    /// Provider calls made after initialisation.
    pub async fn submissions(&self) -> Vec<ProviderCall> {
        self.provider
            .calls()
            .await
            .into_iter()
            .filter(|call| !matches!(call, ProviderCall::Configure { .. }))
            .collect()
    }

    pub fn dispatch(&self, event: PlatformEvent) -> usize {
        self.orchestrator.bridge().dispatch(event)
    }
}

pub fn config() -> SessionConfig {
    SessionConfig {
        publishable_key: "pk_test_123".into(),
        url_scheme: Some("shop".into()),
        set_url_scheme_on_android: true,
        merchant_identifier: Some("merchant.com.shop".into()),
        ..Default::default()
    }
}

pub async fn harness() -> Harness {
    harness_with(config(), None).await
}

pub async fn harness_with(config: SessionConfig, keys: Option<EphemeralKeyProviderRef>) -> Harness {
    let provider = ScriptedProvider::new();
    let orchestrator =
        PaymentOrchestrator::new(Arc::new(provider.clone()), keys, Handle::current());
    orchestrator.initialise(config).await.unwrap();
    Harness {
        provider,
        orchestrator,
    }
}

pub fn ios() -> PlatformContext {
    PlatformContext::new(Platform::Ios, "root")
}

pub fn android() -> PlatformContext {
    PlatformContext::new(Platform::Android, "main_activity")
}

pub fn card() -> CardCapture {
    CardCapture {
        handle: "card_field_1".into(),
        brand: Some("visa".into()),
        last4: Some("4242".into()),
        postal_code: None,
    }
}

pub fn snapshot(status: &str) -> IntentSnapshot {
    IntentSnapshot::new("pi_1", status.to_string().into())
}

pub fn payment_report(snapshot: IntentSnapshot) -> PlatformEvent {
    PlatformEvent::IntentResult {
        intent: IntentKind::Payment,
        report: IntentReport::Snapshot(snapshot),
    }
}

pub fn setup_report(snapshot: IntentSnapshot) -> PlatformEvent {
    PlatformEvent::IntentResult {
        intent: IntentKind::Setup,
        report: IntentReport::Snapshot(snapshot),
    }
}

pub fn cart() -> WalletRequest {
    WalletRequest {
        currency: Some("USD".into()),
        country: Some("US".into()),
        cart_items: vec![
            CartSummaryItem {
                label: "Ticket".into(),
                amount: dec!(10.00),
                item_type: SummaryItemType::Final,
            },
            CartSummaryItem {
                label: "Fee".into(),
                amount: dec!(2.50),
                item_type: SummaryItemType::Pending,
            },
        ],
    }
}

pub fn apple_pay() -> PaymentMethodRequest<'static> {
    PaymentMethodRequest::new("ApplePay")
        .with_field("currency", "USD")
        .with_field("country", "US")
        .with_field(
            "cartItems",
            json!([{"label": "Ticket", "amount": "10.00"}, {"label": "Fee", "amount": "2.50"}]),
        )
}

pub fn authorized() -> PlatformEvent {
    PlatformEvent::WalletResult {
        result: WalletResult::Authorized(WalletToken(json!({"token": "tok_wallet"}))),
    }
}

mod common;

use common::*;
use paybridge::application::bridge::{FragmentResult, PlatformEvent, SheetResult};
use paybridge::application::confirmation::CANCELED_MESSAGE;
use paybridge::domain::method::{PaymentMethodRequest, PaymentMethodType};
use paybridge::domain::operation::{OperationKind, OperationOutput, PaymentOption};
use paybridge::domain::sheet::{PaymentSheetConfig, PresentSheetOptions};
use paybridge::error::PaymentError;
use paybridge::infrastructure::in_memory::ProviderCall;
use serde_json::json;

fn sheet_config() -> PaymentSheetConfig {
    PaymentSheetConfig {
        payment_intent_client_secret: Some("pi_sheet_secret".into()),
        merchant_display_name: Some("Shop".into()),
        custom_flow: true,
        ..Default::default()
    }
}

fn visa() -> PaymentOption {
    PaymentOption {
        label: "Visa 4242".into(),
        image: "data:image/png;base64,AAAA".into(),
    }
}

#[tokio::test]
async fn test_init_payment_sheet_validation() {
    let h = harness().await;
    assert_eq!(
        h.orchestrator
            .init_payment_sheet(&ios(), PaymentSheetConfig::default())
            .unwrap_err(),
        PaymentError::missing("the paymentIntentClientSecret")
    );

    let wallet_without_country = PaymentSheetConfig {
        wallet: true,
        ..sheet_config()
    };
    assert_eq!(
        h.orchestrator
            .init_payment_sheet(&ios(), wallet_without_country)
            .unwrap_err(),
        PaymentError::validation("merchantIdentifier or merchantCountryCode is not provided")
    );
    assert!(h.submissions().await.is_empty());
}

#[tokio::test]
async fn test_init_payment_sheet_reports_initial_option() {
    let h = harness().await;
    let pending = h
        .orchestrator
        .init_payment_sheet(
            &ios(),
            PaymentSheetConfig {
                wallet: true,
                merchant_country_code: Some("US".into()),
                ..sheet_config()
            },
        )
        .unwrap();
    h.orchestrator.idle().await;
    assert_eq!(
        h.submissions().await,
        vec![ProviderCall::InitPaymentSheet { custom_flow: true }]
    );

    let settled = h.dispatch(PlatformEvent::FragmentReady {
        result: FragmentResult::Ready(Some(visa())),
    });
    assert_eq!(settled, 1);
    assert_eq!(
        pending.await,
        Ok(OperationOutput::PaymentOption(Some(visa())))
    );
}

#[tokio::test]
async fn test_init_payment_sheet_failure() {
    let h = harness().await;
    let pending = h.orchestrator.init_payment_sheet(&android(), sheet_config()).unwrap();
    h.orchestrator.idle().await;

    h.dispatch(PlatformEvent::FragmentReady {
        result: FragmentResult::Failed("Invalid client secret".into()),
    });
    assert_eq!(
        pending.await,
        Err(PaymentError::Failed("Invalid client secret".into()))
    );
}

#[tokio::test]
async fn test_present_sheet_completes_payment() {
    let h = harness().await;
    let pending = h
        .orchestrator
        .present_payment_sheet(&ios(), PresentSheetOptions::default())
        .unwrap();
    h.orchestrator.idle().await;
    assert_eq!(
        h.submissions().await,
        vec![ProviderCall::PresentPaymentSheet {
            confirm_payment: true
        }]
    );

    assert_eq!(
        h.dispatch(PlatformEvent::SheetResult {
            result: SheetResult::Completed
        }),
        1
    );
    assert_eq!(pending.await, Ok(OperationOutput::Completed));
}

#[tokio::test]
async fn test_custom_flow_present_then_confirm() {
    let h = harness().await;
    let present = h
        .orchestrator
        .present_payment_sheet(
            &ios(),
            PresentSheetOptions {
                confirm_payment: false,
            },
        )
        .unwrap();
    h.orchestrator.idle().await;

    h.dispatch(PlatformEvent::SheetOptionSelected {
        option: Some(visa()),
    });
    assert_eq!(
        present.await,
        Ok(OperationOutput::PaymentOption(Some(visa())))
    );

    let confirm = h.orchestrator.confirm_payment_sheet_payment(&ios()).unwrap();
    h.orchestrator.idle().await;
    assert_eq!(
        h.dispatch(PlatformEvent::SheetResult {
            result: SheetResult::Canceled
        }),
        1
    );
    assert_eq!(
        confirm.await,
        Err(PaymentError::Canceled(CANCELED_MESSAGE.into()))
    );
}

#[tokio::test]
async fn test_sheet_result_settles_present_and_confirm() {
    let h = harness().await;
    let present = h
        .orchestrator
        .present_payment_sheet(&ios(), PresentSheetOptions::default())
        .unwrap();
    let confirm = h.orchestrator.confirm_payment_sheet_payment(&ios()).unwrap();
    h.orchestrator.idle().await;

    let settled = h.dispatch(PlatformEvent::SheetResult {
        result: SheetResult::Failed("Your card has insufficient funds.".into()),
    });
    assert_eq!(settled, 2);

    let expected = Err(PaymentError::Failed("Your card has insufficient funds.".into()));
    assert_eq!(present.await, expected);
    assert_eq!(confirm.await, expected);
}

#[tokio::test]
async fn test_cvc_update_token() {
    let h = harness().await;
    assert_eq!(
        h.orchestrator.create_token_for_cvc_update("  ").unwrap_err(),
        PaymentError::missing("CVC")
    );

    let pending = h.orchestrator.create_token_for_cvc_update("123").unwrap();
    h.orchestrator.idle().await;
    assert_eq!(pending.await, Ok(OperationOutput::Token("cvctok_1".into())));
    assert!(!h.orchestrator.is_pending(OperationKind::CreateCvcUpdateToken));
}

#[tokio::test]
async fn test_create_payment_method() {
    let h = harness().await;
    let card = card();
    let pending = h
        .orchestrator
        .create_payment_method(
            &PaymentMethodRequest::new("Card")
                .with_card(&card)
                .with_field("billingDetails", json!({"name": "Ana"})),
        )
        .unwrap();
    h.orchestrator.idle().await;

    let Ok(OperationOutput::PaymentMethod(method)) = pending.await else {
        panic!("expected a payment method");
    };
    assert_eq!(method.id, "pm_1");
    assert_eq!(method.method_type, PaymentMethodType::Card);
    assert_eq!(method.card_last4.as_deref(), Some("4242"));
    assert_eq!(
        method.billing_details.and_then(|b| b.name).as_deref(),
        Some("Ana")
    );
}

#[tokio::test]
async fn test_create_payment_method_provider_failure() {
    let h = harness().await;
    h.provider.fail_next("api unavailable").await;

    let pending = h
        .orchestrator
        .create_payment_method(&PaymentMethodRequest::new("Upi").with_field("vpa", "ana@upi"))
        .unwrap();
    h.orchestrator.idle().await;
    assert_eq!(
        pending.await,
        Err(PaymentError::Provider("api unavailable".into()))
    );

    assert_eq!(
        h.orchestrator
            .create_payment_method(&PaymentMethodRequest::new("Upi"))
            .unwrap_err(),
        PaymentError::missing("vpa")
    );
    assert_eq!(
        h.orchestrator
            .create_payment_method(&PaymentMethodRequest::new("ApplePay"))
            .unwrap_err(),
        PaymentError::validation("ApplePay type is not supported yet")
    );
}

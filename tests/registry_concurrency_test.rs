mod common;

use common::*;
use paybridge::application::bridge::{PlatformEvent, SheetResult};
use paybridge::domain::method::PaymentMethodRequest;
use paybridge::domain::operation::{OperationKind, OperationOutput};
use paybridge::error::PaymentError;
use paybridge::infrastructure::in_memory::ProviderCall;
use rand::Rng;
use rand::seq::SliceRandom;
use std::time::Duration;

const ROUNDS: usize = 25;
const SIGNALLERS: usize = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_reports_settle_once() {
    let h = harness().await;

    for _ in 0..ROUNDS {
        let pending = h
            .orchestrator
            .confirm_payment(&ios(), "pi_1_secret", &PaymentMethodRequest::new("Alipay"))
            .unwrap();
        h.orchestrator.idle().await;

        let handles: Vec<_> = (0..SIGNALLERS)
            .map(|_| {
                let bridge = h.orchestrator.bridge();
                tokio::spawn(async move {
                    let status = if rand::thread_rng().gen_bool(0.5) {
                        "succeeded"
                    } else {
                        "canceled"
                    };
                    bridge.dispatch(payment_report(snapshot(status)))
                })
            })
            .collect();

        let mut settled = 0;
        for handle in handles {
            settled += handle.await.unwrap();
        }
        assert_eq!(settled, 1);
        assert!(matches!(
            pending.await,
            Ok(OperationOutput::Intent(_)) | Err(PaymentError::Canceled(_))
        ));
        assert!(!h.orchestrator.is_pending(OperationKind::ConfirmPayment));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_begins_admit_one() {
    let h = harness().await;

    let handles: Vec<_> = (0..SIGNALLERS)
        .map(|i| {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .confirm_payment(
                        &ios(),
                        &format!("pi_{i}_secret"),
                        &PaymentMethodRequest::new("Alipay"),
                    )
                    .map(|_pending| ())
            })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => admitted += 1,
            Err(err) => assert_eq!(err, PaymentError::Busy(OperationKind::ConfirmPayment)),
        }
    }
    assert_eq!(admitted, 1);

    h.orchestrator.idle().await;
    let confirmations = h
        .submissions()
        .await
        .into_iter()
        .filter(|call| matches!(call, ProviderCall::ConfirmPayment { .. }))
        .count();
    assert_eq!(confirmations, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_signals_for_other_kinds_leave_slot_alone() {
    let h = harness().await;
    let mut pending = h
        .orchestrator
        .confirm_payment(&ios(), "pi_1_secret", &PaymentMethodRequest::new("Alipay"))
        .unwrap();
    h.orchestrator.idle().await;

    let mut noise = vec![
        PlatformEvent::SheetResult {
            result: SheetResult::Completed,
        },
        PlatformEvent::SheetOptionSelected { option: None },
        setup_report(snapshot("succeeded")),
    ];
    noise.shuffle(&mut rand::thread_rng());

    let handles: Vec<_> = noise
        .into_iter()
        .map(|event| {
            let bridge = h.orchestrator.bridge();
            tokio::spawn(async move { bridge.dispatch(event) })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 0);
    }

    assert!(pending.try_outcome().is_none());
    assert_eq!(h.dispatch(payment_report(snapshot("succeeded"))), 1);
    assert!(matches!(pending.await, Ok(OperationOutput::Intent(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_idle_callers_all_wait_for_parked_work() {
    let h = harness().await;
    let mut hold = h.provider.hold_next().await;
    let pending = h.orchestrator.create_token_for_cvc_update("123").unwrap();
    hold.reached().await;

    let waiters: Vec<_> = (0..SIGNALLERS)
        .map(|_| {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.idle().await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(waiters.iter().all(|waiter| !waiter.is_finished()));

    hold.release();
    for waiter in waiters {
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("idle caller never returned")
            .unwrap();
    }
    assert_eq!(pending.await, Ok(OperationOutput::Token("cvctok_1".into())));
}

use crate::domain::operation::{OperationKind, Outcome};
use crate::error::{PaymentError, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, warn};

/// Sending half of an operation's single completion.
#[derive(Debug)]
pub struct Completion(oneshot::Sender<Outcome>);

impl Completion {
    fn complete(self, outcome: Outcome) {
        // The caller may have stopped listening; the slot is gone either way.
        let _ = self.0.send(outcome);
    }
}

/// Caller-side handle of a pending operation.
///
/// Await it (or call [`Pending::outcome`]) to receive the eventual resolution.
#[derive(Debug)]
pub struct Pending {
    kind: OperationKind,
    generation: u64,
    receiver: oneshot::Receiver<Outcome>,
}

impl Pending {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Identifies this attempt among all attempts of the same kind.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn outcome(self) -> Outcome {
        let kind = self.kind;
        self.receiver.await.unwrap_or_else(|_| Err(dropped(kind)))
    }

    /// Returns the outcome if the operation already resolved.
    pub fn try_outcome(&mut self) -> Option<Outcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(dropped(self.kind))),
        }
    }
}

impl IntoFuture for Pending {
    type Output = Outcome;
    type IntoFuture = Pin<Box<dyn Future<Output = Outcome> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.outcome())
    }
}

fn dropped(kind: OperationKind) -> PaymentError {
    PaymentError::Unknown(format!("{kind} was dropped without a result"))
}

/// Creates a linked completion/pending pair.
pub fn completion(kind: OperationKind, generation: u64) -> (Completion, Pending) {
    let (sender, receiver) = oneshot::channel();
    (
        Completion(sender),
        Pending {
            kind,
            generation,
            receiver,
        },
    )
}

#[derive(Debug)]
struct PendingSlot {
    completion: Completion,
    generation: u64,
    started_at: Instant,
}

/// Table of in-flight operations, at most one per kind.
///
/// Backed by a sharded map so `begin` and `resolve` for the same kind go through
/// the same shard lock and cannot interleave. Every slot is stamped with a
/// generation so background work can only settle the attempt it was started for.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    slots: DashMap<OperationKind, PendingSlot>,
    generations: AtomicU64,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new pending operation, or fails with `Busy`.
    pub fn begin(&self, kind: OperationKind) -> Result<Pending> {
        match self.slots.entry(kind) {
            Entry::Occupied(_) => {
                warn!(operation = %kind, "Rejecting operation, one is already pending");
                Err(PaymentError::Busy(kind))
            }
            Entry::Vacant(vacant) => {
                let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
                let (completion, pending) = completion(kind, generation);
                vacant.insert(PendingSlot {
                    completion,
                    generation,
                    started_at: Instant::now(),
                });
                debug!(operation = %kind, generation, "Operation pending");
                Ok(pending)
            }
        }
    }

    /// Resolves and removes the pending operation of `kind`.
    ///
    /// Returns false when nothing was pending; late and duplicate signals end up here.
    pub fn resolve(&self, kind: OperationKind, outcome: Outcome) -> bool {
        Self::complete(kind, self.slots.remove(&kind), outcome)
    }

    /// Resolves `kind` only while the pending attempt is still `generation`.
    ///
    /// Used by background work, which may finish after its attempt was replaced.
    pub fn resolve_if(&self, kind: OperationKind, generation: u64, outcome: Outcome) -> bool {
        let removed = self
            .slots
            .remove_if(&kind, |_, slot| slot.generation == generation);
        if removed.is_none() && self.slots.contains_key(&kind) {
            debug!(operation = %kind, generation, "Outcome belongs to an earlier attempt");
        }
        Self::complete(kind, removed, outcome)
    }

    /// Generation of the attempt of `kind` currently pending.
    pub fn generation(&self, kind: OperationKind) -> Option<u64> {
        self.slots.get(&kind).map(|slot| slot.generation)
    }

    fn complete(
        kind: OperationKind,
        removed: Option<(OperationKind, PendingSlot)>,
        outcome: Outcome,
    ) -> bool {
        match removed {
            Some((_, slot)) => {
                debug!(
                    operation = %kind,
                    generation = slot.generation,
                    success = outcome.is_ok(),
                    elapsed_ms = slot.started_at.elapsed().as_millis() as u64,
                    "Operation resolved"
                );
                slot.completion.complete(outcome);
                true
            }
            None => {
                debug!(operation = %kind, "No pending operation, dropping outcome");
                false
            }
        }
    }

    /// Resolves every listed kind that is pending with the same outcome.
    pub fn resolve_all(&self, kinds: &[OperationKind], outcome: &Outcome) -> usize {
        kinds
            .iter()
            .filter(|kind| self.resolve(**kind, outcome.clone()))
            .count()
    }

    /// Resolves whichever of confirm-payment and handle-next-action is pending.
    pub fn resolve_both(&self, outcome: Outcome) -> usize {
        self.resolve_all(
            &[
                OperationKind::ConfirmPayment,
                OperationKind::HandleNextAction,
            ],
            &outcome,
        )
    }

    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.slots.contains_key(&kind)
    }

    pub fn pending_kinds(&self) -> Vec<OperationKind> {
        self.slots.iter().map(|entry| *entry.key()).collect()
    }

    /// Resolves everything still pending. Used when the session is reset.
    pub fn clear(&self, outcome: Outcome) -> usize {
        let kinds = self.pending_kinds();
        self.resolve_all(&kinds, &outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::operation::OperationOutput;

    #[tokio::test]
    async fn test_begin_twice_is_busy() {
        let registry = RequestRegistry::new();
        let _pending = registry.begin(OperationKind::ConfirmPayment).unwrap();

        let second = registry.begin(OperationKind::ConfirmPayment);
        assert_eq!(
            second.err(),
            Some(PaymentError::Busy(OperationKind::ConfirmPayment))
        );
        // Other kinds are independent
        assert!(registry.begin(OperationKind::HandleNextAction).is_ok());
    }

    #[tokio::test]
    async fn test_resolve_clears_slot() {
        let registry = RequestRegistry::new();
        let pending = registry.begin(OperationKind::CreatePaymentMethod).unwrap();

        assert!(registry.resolve(OperationKind::CreatePaymentMethod, Ok(OperationOutput::Completed)));
        assert!(!registry.is_pending(OperationKind::CreatePaymentMethod));
        assert_eq!(pending.await, Ok(OperationOutput::Completed));

        // Second signal for the same kind is a no-op
        assert!(!registry.resolve(OperationKind::CreatePaymentMethod, Ok(OperationOutput::Completed)));
        assert!(registry.begin(OperationKind::CreatePaymentMethod).is_ok());
    }

    #[tokio::test]
    async fn test_resolve_both_shares_outcome() {
        let registry = RequestRegistry::new();
        let confirm = registry.begin(OperationKind::ConfirmPayment).unwrap();
        let next_action = registry.begin(OperationKind::HandleNextAction).unwrap();

        let resolved = registry.resolve_both(Ok(OperationOutput::Token("tok".into())));
        assert_eq!(resolved, 2);
        assert_eq!(confirm.await, Ok(OperationOutput::Token("tok".into())));
        assert_eq!(next_action.await, Ok(OperationOutput::Token("tok".into())));
    }

    #[tokio::test]
    async fn test_clear_rejects_everything() {
        let registry = RequestRegistry::new();
        let a = registry.begin(OperationKind::PresentPaymentSheet).unwrap();
        let b = registry.begin(OperationKind::InitCustomerSession).unwrap();

        assert_eq!(registry.clear(Err(PaymentError::Canceled("reset".into()))), 2);
        assert!(registry.pending_kinds().is_empty());
        assert!(matches!(a.await, Err(PaymentError::Canceled(_))));
        assert!(matches!(b.await, Err(PaymentError::Canceled(_))));
    }

    #[test]
    fn test_try_outcome_before_and_after() {
        let registry = RequestRegistry::new();
        let mut pending = registry.begin(OperationKind::CreateCvcUpdateToken).unwrap();
        assert_eq!(pending.try_outcome(), None);

        registry.resolve(
            OperationKind::CreateCvcUpdateToken,
            Err(PaymentError::Failed("nope".into())),
        );
        assert_eq!(
            pending.try_outcome(),
            Some(Err(PaymentError::Failed("nope".into())))
        );
    }

    #[tokio::test]
    async fn test_dropped_completion_is_unknown() {
        let (completion, pending) = completion(OperationKind::WalletAuthorization, 1);
        drop(completion);
        assert!(matches!(pending.await, Err(PaymentError::Unknown(_))));
    }

    #[tokio::test]
    async fn test_stale_generation_leaves_new_attempt() {
        let registry = RequestRegistry::new();
        let first = registry.begin(OperationKind::ConfirmPayment).unwrap();
        let stale = first.generation();
        registry.clear(Err(PaymentError::Canceled("reset".into())));

        let mut second = registry.begin(OperationKind::ConfirmPayment).unwrap();
        assert_ne!(second.generation(), stale);
        assert_eq!(
            registry.generation(OperationKind::ConfirmPayment),
            Some(second.generation())
        );

        assert!(!registry.resolve_if(
            OperationKind::ConfirmPayment,
            stale,
            Err(PaymentError::Failed("late".into()))
        ));
        assert!(registry.is_pending(OperationKind::ConfirmPayment));
        assert_eq!(second.try_outcome(), None);

        assert!(registry.resolve_if(
            OperationKind::ConfirmPayment,
            second.generation(),
            Ok(OperationOutput::Completed)
        ));
        assert_eq!(second.await, Ok(OperationOutput::Completed));
    }
}

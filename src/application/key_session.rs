use super::registry::RequestRegistry;
use crate::domain::operation::{OperationKind, OperationOutput, Outcome};
use crate::domain::ports::{EphemeralKeyProviderRef, KeySource, KeyUpdateListener};
use crate::domain::session::SessionContext;
use crate::error::PaymentError;
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Current session, replaced on every `initialise`.
#[derive(Debug, Default)]
pub struct SessionHandle {
    current: RwLock<Option<Arc<SessionContext>>>,
}

impl SessionHandle {
    pub fn get(&self) -> Option<Arc<SessionContext>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, session: SessionContext) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(session));
    }

    /// Applies `update` to the current session, if any. Returns false when uninitialised.
    pub fn update(&self, update: impl FnOnce(&SessionContext) -> SessionContext) -> bool {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let Some(next) = guard.as_deref().map(update) else {
            return false;
        };
        *guard = Some(Arc::new(next));
        true
    }
}

/// Key source handed to the provider's customer session.
///
/// Every key request is answered through the listener. The first answer also
/// settles the session initialisation it was created for.
pub struct CustomerKeySource {
    registry: Arc<RequestRegistry>,
    session: Arc<SessionHandle>,
    keys: EphemeralKeyProviderRef,
    generation: u64,
}

impl CustomerKeySource {
    pub fn new(
        registry: Arc<RequestRegistry>,
        session: Arc<SessionHandle>,
        keys: EphemeralKeyProviderRef,
        generation: u64,
    ) -> Self {
        Self {
            registry,
            session,
            keys,
            generation,
        }
    }

    fn settle(&self, outcome: Outcome) {
        self.registry
            .resolve_if(OperationKind::InitCustomerSession, self.generation, outcome);
    }
}

#[async_trait]
impl KeySource for CustomerKeySource {
    async fn create_ephemeral_key(&self, api_version: &str, listener: Arc<dyn KeyUpdateListener>) {
        let Some(session) = self.session.get() else {
            let err = PaymentError::NotInitialized;
            listener.on_key_update_failure(0, &err.to_string());
            self.settle(Err(err));
            return;
        };

        match self.keys.fetch_ephemeral_key(session.key_request(api_version)).await {
            Ok(key) => {
                info!(api_version, "Ephemeral key issued");
                listener.on_key_update(key);
                self.settle(Ok(OperationOutput::Completed));
            }
            Err(err) => {
                let message = match err {
                    PaymentError::Provider(message) => message,
                    other => other.to_string(),
                };
                warn!(api_version, error = %message, "Ephemeral key request failed");
                listener.on_key_update_failure(0, &message);
                self.settle(Err(PaymentError::Provider(message)));
            }
        }
    }
}

use super::command_reader::ScriptStep;
use super::outcome_writer::OutcomeRecord;
use crate::application::orchestrator::PaymentOrchestrator;
use crate::application::registry::Pending;
use crate::domain::operation::OperationOutput;
use crate::domain::platform::{Platform, PlatformContext};
use crate::error::Result;
use tracing::debug;

const SCRIPT_HOST: &str = "script";

/// What a step left behind.
enum Started {
    Nothing,
    Pending(Pending),
    /// Queries that answer on the spot.
    Answered(OperationOutput),
}

/// Drives a [`PaymentOrchestrator`] from script steps.
///
/// After every step the runner waits for background provider calls to finish
/// and reports whatever resolved in the meantime.
pub struct ScriptRunner {
    orchestrator: PaymentOrchestrator,
    platform: Platform,
    attached: bool,
    pending: Vec<(usize, Pending)>,
}

impl ScriptRunner {
    pub fn new(orchestrator: PaymentOrchestrator, platform: Platform) -> Self {
        Self {
            orchestrator,
            platform,
            attached: true,
            pending: Vec::new(),
        }
    }

    pub fn orchestrator(&self) -> &PaymentOrchestrator {
        &self.orchestrator
    }

    fn context(&self) -> PlatformContext {
        if self.attached {
            PlatformContext::new(self.platform, SCRIPT_HOST)
        } else {
            PlatformContext::detached(self.platform)
        }
    }

    pub async fn run_step(&mut self, step_no: usize, step: ScriptStep) -> Vec<OutcomeRecord> {
        let name = step.name();
        debug!(step = step_no, op = name, "Running script step");

        let mut records = Vec::new();
        match self.start(step).await {
            Ok(Started::Nothing) => {}
            Ok(Started::Pending(pending)) => self.pending.push((step_no, pending)),
            Ok(Started::Answered(output)) => {
                records.push(OutcomeRecord::settled(step_no, name, Ok(output)))
            }
            Err(err) => return vec![OutcomeRecord::rejected(step_no, name, &err)],
        }

        self.orchestrator.idle().await;
        records.extend(self.collect_settled());
        records
    }

    /// Reports every operation still outstanding.
    pub fn finish(self) -> Vec<OutcomeRecord> {
        self.pending
            .into_iter()
            .map(|(step, pending)| OutcomeRecord::Pending {
                step,
                operation: pending.kind().to_string(),
            })
            .collect()
    }

    async fn start(&mut self, step: ScriptStep) -> Result<Started> {
        let ctx = self.context();
        let pending = match step {
            ScriptStep::Initialise { config } => {
                self.orchestrator.initialise(config).await?;
                return Ok(Started::Nothing);
            }
            ScriptStep::SetSessionId { session_id } => {
                self.orchestrator.set_session_id(&session_id)?;
                return Ok(Started::Nothing);
            }
            ScriptStep::ShowPaymentOptions => {
                self.orchestrator.show_payment_options(&ctx).await?;
                return Ok(Started::Nothing);
            }
            ScriptStep::Event { event } => {
                self.orchestrator.bridge().dispatch(event);
                return Ok(Started::Nothing);
            }
            ScriptStep::Detach => {
                self.attached = false;
                return Ok(Started::Nothing);
            }
            ScriptStep::Attach => {
                self.attached = true;
                return Ok(Started::Nothing);
            }
            ScriptStep::IsWalletSupported => {
                let supported = self.orchestrator.is_wallet_supported(self.platform).await;
                return Ok(Started::Answered(OperationOutput::Flag(supported)));
            }
            ScriptStep::HandleUrlCallback { url } => {
                let handled = self.orchestrator.handle_url_callback(url.as_deref()).await;
                return Ok(Started::Answered(OperationOutput::Flag(handled)));
            }
            ScriptStep::InitCustomerSession => self.orchestrator.init_customer_session()?,
            ScriptStep::ConfirmPayment {
                client_secret,
                method,
            } => self.orchestrator.confirm_payment(&ctx, &client_secret, &method.request())?,
            ScriptStep::ConfirmSetupIntent {
                client_secret,
                method,
            } => self.orchestrator.confirm_setup_intent(&ctx, &client_secret, &method.request())?,
            ScriptStep::HandleNextAction { client_secret } => {
                self.orchestrator.handle_next_action(&ctx, &client_secret)?
            }
            ScriptStep::CreatePaymentMethod { method } => {
                self.orchestrator.create_payment_method(&method.request())?
            }
            ScriptStep::PresentWalletAuthorization { wallet } => {
                self.orchestrator.present_wallet_authorization(&ctx, &wallet)?
            }
            ScriptStep::GetSelectedPaymentMethodId { wallet } => {
                self.orchestrator.get_selected_payment_method_id(&ctx, wallet.as_ref())?
            }
            ScriptStep::InitPaymentSheet { config } => self.orchestrator.init_payment_sheet(&ctx, config)?,
            ScriptStep::PresentPaymentSheet { options } => {
                self.orchestrator.present_payment_sheet(&ctx, options)?
            }
            ScriptStep::ConfirmPaymentSheetPayment => {
                self.orchestrator.confirm_payment_sheet_payment(&ctx)?
            }
            ScriptStep::CreateTokenForCvcUpdate { cvc } => {
                self.orchestrator.create_token_for_cvc_update(&cvc)?
            }
            ScriptStep::CreateToken { method } => self.orchestrator.create_token(&method.request())?,
            ScriptStep::RetrievePaymentIntent { client_secret } => {
                self.orchestrator.retrieve_payment_intent(&client_secret)?
            }
            ScriptStep::RetrieveSetupIntent { client_secret } => {
                self.orchestrator.retrieve_setup_intent(&client_secret)?
            }
        };
        Ok(Started::Pending(pending))
    }

    fn collect_settled(&mut self) -> Vec<OutcomeRecord> {
        let mut records = Vec::new();
        self.pending.retain_mut(|(step, pending)| match pending.try_outcome() {
            Some(outcome) => {
                records.push(OutcomeRecord::settled(*step, pending.kind().as_str(), outcome));
                false
            }
            None => true,
        });
        records
    }
}

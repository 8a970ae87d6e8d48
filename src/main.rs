use clap::Parser;
use miette::{IntoDiagnostic, Result};
use paybridge::application::orchestrator::PaymentOrchestrator;
use paybridge::domain::platform::Platform;
use paybridge::domain::ports::EphemeralKeyProviderRef;
use paybridge::domain::session::SessionConfig;
use paybridge::infrastructure::http_key_provider::HttpKeyProvider;
use paybridge::infrastructure::in_memory::{ScriptedProvider, StaticKeyProvider};
use paybridge::interfaces::script::command_reader::{CommandReader, ScriptStep};
use paybridge::interfaces::script::outcome_writer::OutcomeWriter;
use paybridge::interfaces::script::runner::ScriptRunner;
use paybridge::telemetry;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use url::Url;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Operation script, one JSON step per line
    script: PathBuf,

    /// Session configuration (JSON) applied before the first step
    #[arg(long, env = "PAYBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Platform whose signals the script simulates
    #[arg(long, default_value = "ios")]
    platform: Platform,

    /// Merchant endpoint issuing ephemeral keys. Keys are minted locally when unset.
    #[arg(long, env = "PAYBRIDGE_KEY_ENDPOINT")]
    key_endpoint: Option<Url>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();
    let cli = Cli::parse();

    let config: Option<SessionConfig> = match &cli.config {
        Some(path) => {
            let file = File::open(path).into_diagnostic()?;
            Some(serde_json::from_reader(BufReader::new(file)).into_diagnostic()?)
        }
        None => None,
    };

    let key_endpoint = cli
        .key_endpoint
        .or_else(|| config.as_ref().and_then(|c| c.key_endpoint.clone()));
    let keys: EphemeralKeyProviderRef = match key_endpoint {
        Some(endpoint) => Arc::new(HttpKeyProvider::new(endpoint)),
        None => Arc::new(StaticKeyProvider::new()),
    };

    let orchestrator =
        PaymentOrchestrator::new(Arc::new(ScriptedProvider::new()), Some(keys), Handle::current());
    let mut runner = ScriptRunner::new(orchestrator, cli.platform);

    let stdout = io::stdout();
    let mut writer = OutcomeWriter::new(stdout.lock());

    if let Some(config) = config {
        let records = runner.run_step(0, ScriptStep::Initialise { config }).await;
        writer.write_all(&records).into_diagnostic()?;
    }

    let file = File::open(&cli.script).into_diagnostic()?;
    for step in CommandReader::new(BufReader::new(file)).steps() {
        match step {
            Ok((line, step)) => {
                let records = runner.run_step(line, step).await;
                writer.write_all(&records).into_diagnostic()?;
            }
            Err(e) => {
                tracing::error!(error = %e, "Skipping script line");
            }
        }
    }

    writer.write_all(&runner.finish()).into_diagnostic()?;
    Ok(())
}

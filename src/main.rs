use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

mod controller;
mod models;
mod presenter;
mod repl;
mod server;
mod session;
mod settings;
mod voice;
mod widget;

use models::HttpAssessmentService;
use settings::{EffectiveSettings, SettingsLayer};

#[derive(Debug, Parser)]
#[command(name = "careway_intake")]
#[command(about = "Symptom-intake chat client for the Careway assessment service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct ClientArgs {
    /// Assessment service endpoint (overrides CAREWAY_ENDPOINT and the config file)
    #[arg(long)]
    endpoint: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// JSON config file with endpoint, timeout_secs and patient_history
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ClientArgs {
    fn resolve(&self) -> anyhow::Result<EffectiveSettings> {
        let cli = SettingsLayer {
            endpoint: self.endpoint.clone(),
            timeout_secs: self.timeout_secs,
            patient_history: None,
        };
        Ok(settings::load(self.config.as_deref(), &cli)?)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Chat in the terminal
    Chat {
        #[command(flatten)]
        client: ClientArgs,
    },
    /// Serve the widget API for browser front ends
    Serve {
        #[arg(long, default_value = "127.0.0.1:7272")]
        listen: String,
        #[command(flatten)]
        client: ClientArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Chat { client } => {
            let settings = client.resolve()?;
            tracing::info!(endpoint = %settings.endpoint, timeout = ?settings.timeout, "starting chat");
            let service = Arc::new(HttpAssessmentService::new(&settings)?);
            let widget = widget::ChatWidget::new(service, settings.patient_history);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = tokio::io::stdout();
            tokio::select! {
                res = repl::run(&widget, stdin, &mut stdout) => res?,
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Commands::Serve { listen, client } => {
            let addr: SocketAddr = listen.parse()?;
            let settings = client.resolve()?;
            tracing::info!(endpoint = %settings.endpoint, timeout = ?settings.timeout, "starting widget server");
            let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
            let service = Arc::new(HttpAssessmentService::new(&settings)?);
            let state = server::AppState::new(service, settings.patient_history).with_metrics(handle);
            server::serve(addr, state).await?;
        }
    }
    Ok(())
}

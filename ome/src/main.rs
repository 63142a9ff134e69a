use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use ome::server::{ServerConfig, serve};
use ome::webhook::{WebhookService, WebhookState, manifests};

/// OME admission webhook for ome.io resources
#[derive(Parser, Debug)]
#[command(name = "ome", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the validating webhook server
    Serve(ServeArgs),

    /// Print CRDs and the ValidatingWebhookConfiguration as multi-document YAML
    Manifests(ManifestArgs),
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Listen address
    #[arg(long, env = "OME_WEBHOOK_ADDR", default_value = "0.0.0.0:9443")]
    addr: SocketAddr,

    /// PEM certificate chain; serves plain HTTP when omitted
    #[arg(long, env = "OME_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, env = "OME_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[derive(Parser, Debug)]
struct ManifestArgs {
    /// Service fronting the webhook server
    #[arg(long, default_value = "ome-webhook-server-service")]
    service_name: String,

    #[arg(long, default_value = "ome")]
    service_namespace: String,

    /// PEM file embedded as the webhook caBundle
    #[arg(long)]
    ca_bundle: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => run_server(args).await,
        Commands::Manifests(args) => print_manifests(args),
    }
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install aws-lc-rs crypto provider");
    }

    init_tracing(args.log_json);

    let state = Arc::new(WebhookState::new()?);
    info!(version = env!("CARGO_PKG_VERSION"), "OME webhook starting");

    serve(
        ServerConfig {
            addr: args.addr,
            tls_cert: args.tls_cert,
            tls_key: args.tls_key,
        },
        state,
    )
    .await?;

    info!("OME webhook stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn print_manifests(args: ManifestArgs) -> anyhow::Result<()> {
    let ca_bundle = args.ca_bundle.map(std::fs::read).transpose()?;
    let service = WebhookService {
        name: args.service_name,
        namespace: args.service_namespace,
        ca_bundle,
        ..Default::default()
    };

    print!("{}", manifests(&service)?);
    Ok(())
}

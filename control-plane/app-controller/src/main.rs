use std::process::ExitCode;

use app_controller::{
    cli::Cli, config::ControllerConfig, init_tracing, registry::KindRegistry,
    runtime,
};
use clap::Parser;
use envconfig::Envconfig;
use kube::Client;
use tracing::{error, info};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    init_tracing("info");

    // Ensure rustls uses the aws-lc-rs provider explicitly.
    // This avoids runtime errors when no default provider is set.
    if let Err(e) = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::aws_lc_rs::default_provider(),
    ) {
        // It's fine if a compatible provider was already installed.
        tracing::debug!(
            ?e,
            "CryptoProvider already installed or incompatible; proceeding"
        );
    }

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "app controller failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let opts = cli.runtime_options()?;
    let cfg = ControllerConfig::init_from_env()?;
    cfg.validate()?;
    info!(?cfg, ?opts, "Starting app controller");

    let kinds = KindRegistry::for_features(&cfg.features);
    let client = Client::try_default().await?;
    runtime::run_all(client, cfg, opts, kinds).await
}

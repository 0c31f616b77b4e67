use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vapub_common::Settings;

use crate::commands::{PublishCertParams, PublishCrlParams};

mod commands;

#[derive(Parser)]
#[command(version, about = "Operate a validation authority publisher")]
pub struct Args {
    #[clap(subcommand)]
    command: Command,

    /// TOML settings file. `VAPUB_*` environment variables override it.
    #[clap(short, long, env = "VAPUB_CONFIG", default_value = "vapub.toml")]
    config: PathBuf,
}

#[derive(Clone, Subcommand)]
pub enum Command {
    /// Check that the configured data source answers.
    #[command(name = "test-connection")]
    TestConnection,

    /// Create or upgrade the responder tables.
    #[command(name = "migrate")]
    Migrate,

    #[command(name = "publish-cert")]
    PublishCert(PublishCertParams),

    #[command(name = "publish-crl")]
    PublishCrl(PublishCrlParams),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or("vapubctl=info,vapub_publisher=info,vapub_db=info".into()),
        )
        .init();

    let settings = Settings::load(Some(&args.config))?;

    match args.command {
        Command::TestConnection => commands::test_connection(&settings).await,
        Command::Migrate => commands::migrate(&settings).await,
        Command::PublishCert(params) => commands::publish_cert(&settings, params).await,
        Command::PublishCrl(params) => commands::publish_crl(&settings, params).await,
    }
}

use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::info;
use vapub_common::Settings;
use vapub_db::storage::postgres::{self, PostgresStorage};
use vapub_publisher::{HealthProbe, VaPublisher, health::STATUS_OK};

mod publish_cert;
mod publish_crl;

pub use publish_cert::{PublishCertParams, publish_cert};
pub use publish_crl::{PublishCrlParams, publish_crl};

async fn connect(settings: &Settings) -> anyhow::Result<Arc<PostgresStorage>> {
    let name = &settings.publisher.data_source;
    let data_source = settings.resolve_data_source()?;

    let storage = PostgresStorage::new(name, data_source)
        .await
        .with_context(|| format!("Failed to set up data source {name}"))?;

    Ok(Arc::new(storage))
}

async fn publisher(settings: &Settings) -> anyhow::Result<VaPublisher> {
    let storage = connect(settings).await?;
    Ok(VaPublisher::new(settings.publisher.clone(), storage)?)
}

pub async fn test_connection(settings: &Settings) -> anyhow::Result<()> {
    let probe = HealthProbe::new(connect(settings).await?);

    let status = probe.status().await;
    println!("{status}");

    if status != STATUS_OK {
        bail!("Data source {} is unavailable", settings.publisher.data_source);
    }
    Ok(())
}

pub async fn migrate(settings: &Settings) -> anyhow::Result<()> {
    let data_source = settings.resolve_data_source()?;

    postgres::run_migrations(&data_source.url)
        .await
        .context("Failed to migrate the validation authority tables")?;

    info!(data_source = %settings.publisher.data_source, "Tables are up to date");
    Ok(())
}

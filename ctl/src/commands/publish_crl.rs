use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::warn;
use vapub_common::Settings;
use vapub_publisher::codec;

#[derive(Clone, Parser)]
pub struct PublishCrlParams {
    /// CRL file, PEM or DER.
    pub file: PathBuf,

    /// Fingerprint of the issuing CA certificate.
    #[clap(long)]
    pub ca_fingerprint: String,

    #[clap(short, long)]
    pub number: i32,

    /// DN the CRL issuer is known by. Read from the CRL when omitted.
    #[clap(long, default_value = "")]
    pub issuer_dn: String,
}

pub async fn publish_crl(
    settings: &Settings,
    PublishCrlParams {
        file,
        ca_fingerprint,
        number,
        issuer_dn,
    }: PublishCrlParams,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let der = codec::der_from_pem_or_der(&bytes)?;

    let publisher = super::publisher(settings).await?;
    if !publisher.config().store_crl {
        warn!("CRL publishing is disabled, set publisher.store_crl to enable it");
    }

    publisher
        .store_crl(&der, &ca_fingerprint, number, &issuer_dn)
        .await?;

    println!("Published {}", codec::fingerprint(&der));
    Ok(())
}

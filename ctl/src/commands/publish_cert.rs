use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use vapub_common::{CertificateStatus, CertificateType, RevocationReason, Settings};
use vapub_publisher::{CertificatePublication, codec};

#[derive(Clone, Copy, ValueEnum)]
pub enum Reason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegesWithdrawn,
    AaCompromise,
}

impl From<Reason> for RevocationReason {
    fn from(reason: Reason) -> Self {
        match reason {
            Reason::Unspecified => Self::Unspecified,
            Reason::KeyCompromise => Self::KeyCompromise,
            Reason::CaCompromise => Self::CaCompromise,
            Reason::AffiliationChanged => Self::AffiliationChanged,
            Reason::Superseded => Self::Superseded,
            Reason::CessationOfOperation => Self::CessationOfOperation,
            Reason::CertificateHold => Self::CertificateHold,
            Reason::RemoveFromCrl => Self::RemoveFromCrl,
            Reason::PrivilegesWithdrawn => Self::PrivilegesWithdrawn,
            Reason::AaCompromise => Self::AaCompromise,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Kind {
    EndEntity,
    SubCa,
    RootCa,
}

impl From<Kind> for CertificateType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::EndEntity => Self::EndEntity,
            Kind::SubCa => Self::SubCa,
            Kind::RootCa => Self::RootCa,
        }
    }
}

#[derive(Clone, Parser)]
pub struct PublishCertParams {
    /// Certificate file, PEM or DER.
    pub file: PathBuf,

    #[clap(short, long)]
    pub username: String,

    /// Fingerprint of the issuing CA certificate.
    #[clap(long)]
    pub ca_fingerprint: String,

    #[clap(long, value_enum, default_value = "end-entity")]
    pub kind: Kind,

    #[clap(long, default_value_t = 0)]
    pub profile_id: i32,

    #[clap(long)]
    pub tag: Option<String>,

    /// Publish the certificate as revoked at this time (RFC 3339).
    #[clap(long)]
    pub revoked_at: Option<DateTime<Utc>>,

    #[clap(long, value_enum, requires = "revoked_at")]
    pub reason: Option<Reason>,
}

pub async fn publish_cert(
    settings: &Settings,
    PublishCertParams {
        file,
        username,
        ca_fingerprint,
        kind,
        profile_id,
        tag,
        revoked_at,
        reason,
    }: PublishCertParams,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let der = codec::der_from_pem_or_der(&bytes)?;

    let mut publication =
        CertificatePublication::new(der, username, ca_fingerprint, CertificateStatus::Active);
    publication.cert_type = kind.into();
    publication.certificate_profile_id = profile_id;
    publication.tag = tag;
    if let Some(at) = revoked_at {
        let reason = reason.map_or(RevocationReason::Unspecified, Into::into);
        publication = publication.revoked(at, reason);
    }

    let publisher = super::publisher(settings).await?;
    if !publisher.store_certificate(&publication).await? {
        bail!("The store reported a duplicate but no row was updated");
    }

    println!("Published {}", codec::fingerprint(&publication.certificate));
    Ok(())
}

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{Span, debug, error, field, info, instrument, warn};
use vapub_common::{
    CertificateStatus, CertificateType, ConfigError, PublisherConfig, RevocationReason,
};
use vapub_db::{
    models::{CertificateRow, CrlRow, NOT_REVOKED_DATE},
    storage::{ReplicationTarget, StoreError},
};

use crate::{
    codec::{self, DecodeError, EncodedCertificate, EncodedCrl},
    error::{ConnectionError, ReplicationError},
    health::HealthProbe,
    resolver::{self, Resolution},
};

/// Everything the authority knows about a certificate it wants mirrored.
#[derive(Debug, Clone)]
pub struct CertificatePublication {
    /// DER encoded certificate.
    pub certificate: Vec<u8>,
    pub username: String,

    /// Fingerprint of the issuing CA's certificate.
    pub ca_fingerprint: String,
    pub status: CertificateStatus,
    pub cert_type: CertificateType,
    pub revocation_date: Option<DateTime<Utc>>,
    pub revocation_reason: RevocationReason,
    pub tag: Option<String>,
    pub certificate_profile_id: i32,
    pub last_update: DateTime<Utc>,
}

impl CertificatePublication {
    pub fn new(
        certificate: impl Into<Vec<u8>>,
        username: impl Into<String>,
        ca_fingerprint: impl Into<String>,
        status: CertificateStatus,
    ) -> Self {
        Self {
            certificate: certificate.into(),
            username: username.into(),
            ca_fingerprint: ca_fingerprint.into(),
            status,
            cert_type: CertificateType::EndEntity,
            revocation_date: None,
            revocation_reason: RevocationReason::NotRevoked,
            tag: None,
            certificate_profile_id: 0,
            last_update: Utc::now(),
        }
    }

    /// The same publication, marked revoked at `date` for `reason`.
    pub fn revoked(mut self, date: DateTime<Utc>, reason: RevocationReason) -> Self {
        self.status = CertificateStatus::Revoked;
        self.revocation_date = Some(date);
        self.revocation_reason = reason;
        self.last_update = date;
        self
    }

    fn to_row(&self, encoded: EncodedCertificate) -> CertificateRow {
        CertificateRow {
            fingerprint: encoded.fingerprint,
            base64_cert: encoded.body,
            subject_dn: encoded.subject_dn,
            issuer_dn: encoded.issuer_dn,
            ca_fingerprint: self.ca_fingerprint.clone(),
            serial_number: encoded.serial_number,
            status: self.status.code(),
            cert_type: self.cert_type.code(),
            username: self.username.clone(),
            expire_date: encoded.not_after.timestamp_millis(),
            revocation_date: self
                .revocation_date
                .map(|d| d.timestamp_millis())
                .unwrap_or(NOT_REVOKED_DATE),
            revocation_reason: self.revocation_reason.code(),
            tag: self.tag.clone(),
            certificate_profile_id: self.certificate_profile_id,
            update_time: self.last_update.timestamp_millis(),
        }
    }
}

fn crl_row(encoded: EncodedCrl, ca_fingerprint: &str, number: i32) -> CrlRow {
    CrlRow {
        fingerprint: encoded.fingerprint,
        base64_crl: encoded.body,
        ca_fingerprint: ca_fingerprint.to_string(),
        crl_number: number,
        delta_crl_indicator: encoded.delta.column_value(),
        issuer_dn: encoded.issuer_dn,
        this_update: encoded.this_update.timestamp_millis(),
        next_update: encoded.next_update.timestamp_millis(),
    }
}

/// Publishes certificate and CRL state to a validation authority store.
///
/// Calls are awaited inline by the issuance and revocation workflow. Each
/// call builds its own row, so one publisher can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct VaPublisher {
    config: PublisherConfig,
    target: Arc<dyn ReplicationTarget>,
}

impl VaPublisher {
    pub fn new(config: PublisherConfig, target: Arc<dyn ReplicationTarget>) -> Result<Self, ConfigError> {
        config.validate()?;

        if config.data_source != target.data_source() {
            debug!(
                configured = %config.data_source,
                target = target.data_source(),
                "Publisher target name differs from configured data source"
            );
        }
        if config.protect {
            debug!("Row protection is reserved and not applied to published rows");
        }

        Ok(Self { config, target })
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Mirror a certificate's current state.
    ///
    /// Returns `Ok(false)` when the store reported a duplicate key but the
    /// follow-up update matched no row. Any other failure is an error.
    #[instrument(
        skip_all,
        fields(
            data_source = %self.config.data_source,
            status = ?publication.status,
            fingerprint = field::Empty
        )
    )]
    pub async fn store_certificate(
        &self,
        publication: &CertificatePublication,
    ) -> Result<bool, ReplicationError> {
        let encoded = codec::encode_certificate(&publication.certificate, self.config.store_cert)
            .map_err(|e| decode_failure("certificate", e))?;
        Span::current().record("fingerprint", encoded.fingerprint.as_str());

        debug!(
            status = publication.status.code(),
            cert_type = publication.cert_type.code(),
            "Publishing certificate to validation authority"
        );

        let row = publication.to_row(encoded);
        match resolver::resolve_certificate(
            self.target.as_ref(),
            &row,
            publication.status.is_revoked(),
        )
        .await
        {
            Ok(Resolution::Written(path)) => {
                debug!(?path, "Certificate published");
                Ok(true)
            }
            Ok(Resolution::NotWritten) => {
                warn!("Certificate was not published");
                Ok(false)
            }
            Err(source) => Err(write_failure(format!("Store: {row}"), source)),
        }
    }

    /// Mirror a CRL. A no-op when CRL publishing is disabled.
    ///
    /// `issuer_dn` is the DN the authority knows the CRL's issuer by; when
    /// blank, the issuer is read from the CRL itself.
    #[instrument(
        skip(self, crl),
        fields(data_source = %self.config.data_source, fingerprint = field::Empty)
    )]
    pub async fn store_crl(
        &self,
        crl: &[u8],
        ca_fingerprint: &str,
        number: i32,
        issuer_dn: &str,
    ) -> Result<(), ReplicationError> {
        if !self.config.store_crl {
            debug!("No CRL published, the publisher is not configured to store CRLs");
            return Ok(());
        }

        let encoded = codec::encode_crl(crl, issuer_dn).map_err(|e| decode_failure("CRL", e))?;
        Span::current().record("fingerprint", encoded.fingerprint.as_str());

        debug!(
            number,
            issuer = %encoded.issuer_dn,
            delta = encoded.delta.is_delta(),
            revoked = encoded.revoked_count,
            "Publishing CRL to validation authority"
        );
        if let Some(embedded) = &encoded.crl_number {
            if *embedded != number.to_string() {
                warn!(number, %embedded, "CRL number differs from the CRL's own extension");
            }
        }

        let row = crl_row(encoded, ca_fingerprint, number);
        match resolver::resolve_crl(self.target.as_ref(), &row).await {
            Ok(path) => {
                debug!(?path, "CRL published");
                Ok(())
            }
            Err(source) => Err(write_failure(format!("Store CRL: {row}"), source)),
        }
    }

    /// Check that the store is reachable without writing anything.
    pub async fn test_connection(&self) -> Result<(), ConnectionError> {
        HealthProbe::new(self.target.clone()).test_connection().await?;
        info!(data_source = %self.config.data_source, "Connection test succeeded");
        Ok(())
    }
}

fn decode_failure(what: &'static str, source: DecodeError) -> ReplicationError {
    error!(error = %source, "Error decoding {what}, nothing was published");
    ReplicationError::Decode { what, source }
}

fn write_failure(operation: String, source: StoreError) -> ReplicationError {
    error!(error = %source, %operation, "Error publishing to validation authority");
    ReplicationError::Write { operation, source }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use vapub_db::storage::memory::{Fault, MemoryStorage};

    use super::*;

    fn publisher(config: PublisherConfig, store: Arc<MemoryStorage>) -> VaPublisher {
        VaPublisher::new(config, store).unwrap()
    }

    #[test]
    fn revoked_sets_status_date_and_reason() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let publication = CertificatePublication::new(vec![], "u", "ca", CertificateStatus::Active)
            .revoked(at, RevocationReason::Superseded);

        assert_eq!(publication.status, CertificateStatus::Revoked);
        assert_eq!(publication.revocation_date, Some(at));
        assert_eq!(publication.revocation_reason, RevocationReason::Superseded);
        assert_eq!(publication.last_update, at);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PublisherConfig {
            data_source: String::new(),
            ..Default::default()
        };

        assert!(VaPublisher::new(config, Arc::new(MemoryStorage::default())).is_err());
    }

    #[tokio::test]
    async fn malformed_certificate_never_reaches_the_store() {
        let store = Arc::new(MemoryStorage::default());
        let publisher = publisher(PublisherConfig::default(), store.clone());

        let err = publisher
            .store_certificate(&CertificatePublication::new(
                b"junk".to_vec(),
                "u",
                "ca",
                CertificateStatus::Active,
            ))
            .await
            .unwrap_err();

        assert!(err.is_decode());
        assert!(err.to_string().contains("decoding certificate"));
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn malformed_crl_is_a_decode_failure() {
        let store = Arc::new(MemoryStorage::default());
        let config = PublisherConfig {
            store_crl: true,
            ..Default::default()
        };
        let publisher = publisher(config, store.clone());

        let err = publisher.store_crl(b"junk", "ca", 1, "CN=CA").await.unwrap_err();

        assert!(err.is_decode());
        assert!(err.to_string().contains("decoding CRL"));
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn connection_test_failure_is_a_connection_error() {
        let store = Arc::new(MemoryStorage::new("OcspDS").with_fault(Fault::Unreachable));
        let publisher = publisher(PublisherConfig::default(), store);

        let err = publisher.test_connection().await.unwrap_err();
        assert!(err.source.is_connection());
    }
}

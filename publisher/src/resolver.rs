//! Insert/update ordering for validation authority writes.
//!
//! The store may be written by several authority nodes at once and there is
//! no lock to take. Each write therefore starts with the statement most
//! likely to succeed for the record's state and falls back to the opposite
//! statement when the outcome shows the guess was wrong. Both orders leave
//! exactly one row per fingerprint.

use tracing::{debug, warn};
use vapub_db::{
    models::{CertificateRow, CrlRow},
    storage::{CertificateStore, CrlStore, ReplicationTarget, StoreError, WriteOutcome},
};

/// Which statement ended up writing the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePath {
    /// Insert succeeded on the first attempt.
    Inserted,

    /// Update matched the existing row on the first attempt.
    Updated,

    /// A revocation found no row to update and inserted one instead.
    InsertedAfterMiss,

    /// Insert hit an existing row and the follow-up update replaced it.
    UpdatedAfterConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Written(WritePath),

    /// The insert conflicted but the follow-up update matched no row.
    NotWritten,
}

/// Write a certificate row.
///
/// Revocations normally follow an earlier issuance write, so they try the
/// update first and insert only when no row matched. Everything else tries
/// the insert first and updates on a duplicate key.
pub async fn resolve_certificate(
    target: &dyn ReplicationTarget,
    row: &CertificateRow,
    revoked: bool,
) -> Result<Resolution, StoreError> {
    if revoked {
        match CertificateStore::update(target, row).await {
            WriteOutcome::Updated(1) => return Ok(Resolution::Written(WritePath::Updated)),
            WriteOutcome::Failed(e) => return Err(e),
            outcome => {
                warn!(
                    fingerprint = %row.fingerprint,
                    ?outcome,
                    "Revocation found no issued row, inserting it instead"
                );
            }
        }

        return match CertificateStore::insert(target, row).await {
            WriteOutcome::Inserted => Ok(Resolution::Written(WritePath::InsertedAfterMiss)),
            other => Err(insert_failure(other, &row.fingerprint)),
        };
    }

    match CertificateStore::insert(target, row).await {
        WriteOutcome::Inserted => Ok(Resolution::Written(WritePath::Inserted)),
        WriteOutcome::Conflict => {
            debug!(fingerprint = %row.fingerprint, "Entry exists, updating instead");

            match CertificateStore::update(target, row).await {
                WriteOutcome::Updated(1) => {
                    Ok(Resolution::Written(WritePath::UpdatedAfterConflict))
                }
                WriteOutcome::Failed(e) => Err(e),
                outcome => {
                    warn!(
                        fingerprint = %row.fingerprint,
                        ?outcome,
                        "Update after duplicate key did not match exactly one row"
                    );
                    Ok(Resolution::NotWritten)
                }
            }
        }
        other => Err(insert_failure(other, &row.fingerprint)),
    }
}

/// Write a CRL row: insert, and update on a duplicate key.
///
/// Every CRL body is an immutable object, so there is no prior state to
/// favour the update path for.
pub async fn resolve_crl(target: &dyn ReplicationTarget, row: &CrlRow) -> Result<WritePath, StoreError> {
    match CrlStore::insert(target, row).await {
        WriteOutcome::Inserted => Ok(WritePath::Inserted),
        WriteOutcome::Conflict => {
            debug!(fingerprint = %row.fingerprint, "Entry exists, updating instead");

            match CrlStore::update(target, row).await {
                WriteOutcome::Failed(e) => Err(e),
                _ => Ok(WritePath::UpdatedAfterConflict),
            }
        }
        other => Err(insert_failure(other, &row.fingerprint)),
    }
}

fn insert_failure(outcome: WriteOutcome, fingerprint: &str) -> StoreError {
    match outcome {
        WriteOutcome::Failed(e) => e,
        WriteOutcome::Conflict => {
            StoreError::ConstraintViolation(format!("fingerprint {fingerprint} already exists"))
        }
        other => StoreError::Internal(format!("unexpected insert outcome {other:?}").into()),
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex};

    use async_trait::async_trait;

    use super::*;

    /// Replays canned outcomes and records the statements issued.
    #[derive(Debug, Default)]
    struct Scripted {
        outcomes: Mutex<VecDeque<WriteOutcome>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<WriteOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::default(),
            }
        }

        fn next(&self, call: &'static str) -> WriteOutcome {
            self.calls.lock().unwrap().push(call);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("no outcome scripted")
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CertificateStore for Scripted {
        async fn insert(&self, _row: &CertificateRow) -> WriteOutcome {
            self.next("insert")
        }

        async fn update(&self, _row: &CertificateRow) -> WriteOutcome {
            self.next("update")
        }
    }

    #[async_trait]
    impl CrlStore for Scripted {
        async fn insert(&self, _row: &CrlRow) -> WriteOutcome {
            self.next("insert")
        }

        async fn update(&self, _row: &CrlRow) -> WriteOutcome {
            self.next("update")
        }
    }

    #[async_trait]
    impl ReplicationTarget for Scripted {
        fn data_source(&self) -> &str {
            "scripted"
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn cert_row() -> CertificateRow {
        CertificateRow {
            fingerprint: "f1".into(),
            base64_cert: None,
            subject_dn: "CN=host".into(),
            issuer_dn: "CN=CA".into(),
            ca_fingerprint: "ca".into(),
            serial_number: "123".into(),
            status: 20,
            cert_type: 1,
            username: "user".into(),
            expire_date: 0,
            revocation_date: -1,
            revocation_reason: -1,
            tag: None,
            certificate_profile_id: 0,
            update_time: 0,
        }
    }

    fn crl_row() -> CrlRow {
        CrlRow {
            fingerprint: "c1".into(),
            base64_crl: "MAA=".into(),
            ca_fingerprint: "ca".into(),
            crl_number: 1,
            delta_crl_indicator: -1,
            issuer_dn: "CN=CA".into(),
            this_update: 0,
            next_update: 1,
        }
    }

    fn timeout() -> StoreError {
        StoreError::Connection("timed out waiting for connection".into())
    }

    #[tokio::test]
    async fn new_certificate_inserts_first() {
        let target = Scripted::new(vec![WriteOutcome::Inserted]);

        let res = resolve_certificate(&target, &cert_row(), false).await.unwrap();

        assert_eq!(res, Resolution::Written(WritePath::Inserted));
        assert_eq!(target.calls(), ["insert"]);
    }

    #[tokio::test]
    async fn duplicate_key_falls_back_to_update() {
        let target = Scripted::new(vec![WriteOutcome::Conflict, WriteOutcome::Updated(1)]);

        let res = resolve_certificate(&target, &cert_row(), false).await.unwrap();

        assert_eq!(res, Resolution::Written(WritePath::UpdatedAfterConflict));
        assert_eq!(target.calls(), ["insert", "update"]);
    }

    #[tokio::test]
    async fn fallback_update_matching_nothing_is_not_written() {
        let target = Scripted::new(vec![WriteOutcome::Conflict, WriteOutcome::Updated(0)]);

        let res = resolve_certificate(&target, &cert_row(), false).await.unwrap();

        assert_eq!(res, Resolution::NotWritten);
    }

    #[tokio::test]
    async fn non_conflict_insert_failure_is_fatal_without_update() {
        let target = Scripted::new(vec![WriteOutcome::Failed(timeout())]);

        let err = resolve_certificate(&target, &cert_row(), false).await.unwrap_err();

        assert!(err.is_connection());
        assert_eq!(target.calls(), ["insert"]);
    }

    #[tokio::test]
    async fn revocation_updates_first() {
        let target = Scripted::new(vec![WriteOutcome::Updated(1)]);

        let res = resolve_certificate(&target, &cert_row(), true).await.unwrap();

        assert_eq!(res, Resolution::Written(WritePath::Updated));
        assert_eq!(target.calls(), ["update"]);
    }

    #[tokio::test]
    async fn revocation_of_unseen_certificate_inserts() {
        let target = Scripted::new(vec![WriteOutcome::Updated(0), WriteOutcome::Inserted]);

        let res = resolve_certificate(&target, &cert_row(), true).await.unwrap();

        assert_eq!(res, Resolution::Written(WritePath::InsertedAfterMiss));
        assert_eq!(target.calls(), ["update", "insert"]);
    }

    #[tokio::test]
    async fn revocation_insert_conflict_is_fatal() {
        let target = Scripted::new(vec![WriteOutcome::Updated(0), WriteOutcome::Conflict]);

        let err = resolve_certificate(&target, &cert_row(), true).await.unwrap_err();

        assert!(matches!(err, StoreError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn revocation_update_failure_is_fatal_without_insert() {
        let target = Scripted::new(vec![WriteOutcome::Failed(timeout())]);

        assert!(resolve_certificate(&target, &cert_row(), true).await.is_err());
        assert_eq!(target.calls(), ["update"]);
    }

    #[tokio::test]
    async fn crl_duplicate_updates_regardless_of_row_count() {
        let target = Scripted::new(vec![WriteOutcome::Conflict, WriteOutcome::Updated(0)]);

        let path = resolve_crl(&target, &crl_row()).await.unwrap();

        assert_eq!(path, WritePath::UpdatedAfterConflict);
        assert_eq!(target.calls(), ["insert", "update"]);
    }

    #[tokio::test]
    async fn crl_update_failure_is_fatal() {
        let target = Scripted::new(vec![WriteOutcome::Conflict, WriteOutcome::Failed(timeout())]);

        assert!(resolve_crl(&target, &crl_row()).await.is_err());
    }
}

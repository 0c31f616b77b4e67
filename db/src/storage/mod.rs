use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CertificateRow, CrlRow};

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Query Error: {0}")]
    Query(#[source] diesel::result::Error),

    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Result of a single write statement against the target.
///
/// A duplicate key on insert is reported as [`WriteOutcome::Conflict`] rather
/// than as a failure so callers can branch on it and retry as an update.
#[derive(Debug)]
pub enum WriteOutcome {
    /// The row was inserted.
    Inserted,

    /// An update ran and matched this many rows.
    Updated(usize),

    /// The insert hit the unique key: the row already exists.
    Conflict,

    /// The statement failed for any other reason.
    Failed(StoreError),
}

impl WriteOutcome {
    pub fn rows_updated(&self) -> Option<usize> {
        match self {
            Self::Updated(n) => Some(*n),
            _ => None,
        }
    }
}

/// The validation authority datastore as seen by the publisher.
#[async_trait]
pub trait ReplicationTarget: CertificateStore + CrlStore + Debug + Send + Sync + 'static {
    /// Logical name of the data source this target writes to.
    fn data_source(&self) -> &str;

    /// Run a trivial read to prove the store is reachable and has the
    /// expected schema.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CertificateStore {
    async fn insert(&self, row: &CertificateRow) -> WriteOutcome;

    /// Overwrite the row with `row.fingerprint`, bumping its row version.
    async fn update(&self, row: &CertificateRow) -> WriteOutcome;
}

#[async_trait]
pub trait CrlStore {
    async fn insert(&self, row: &CrlRow) -> WriteOutcome;

    async fn update(&self, row: &CrlRow) -> WriteOutcome;
}

use thiserror::Error;
use vapub_db::storage::StoreError;

use crate::codec::DecodeError;

/// A publication that could not be completed.
///
/// Retrying the whole call is safe: writes converge on one row per
/// fingerprint.
#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("Error decoding {what} for publishing: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: DecodeError,
    },

    #[error("Error publishing to validation authority ({operation}): {source}")]
    Write {
        operation: String,
        #[source]
        source: StoreError,
    },
}

impl ReplicationError {
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// The validation authority store could not be reached.
#[derive(Debug, Error)]
#[error("Connection test of data source {data_source} failed: {source}")]
pub struct ConnectionError {
    pub data_source: String,
    #[source]
    pub source: StoreError,
}

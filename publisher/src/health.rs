use std::sync::Arc;

use tracing::{error, instrument};
use vapub_db::storage::ReplicationTarget;

use crate::error::ConnectionError;

/// Status line reported when the store answers.
pub const STATUS_OK: &str = "ALLOK";

/// Read-only reachability check for the validation authority store.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    target: Arc<dyn ReplicationTarget>,
}

impl HealthProbe {
    pub fn new(target: Arc<dyn ReplicationTarget>) -> Self {
        Self { target }
    }

    #[instrument(skip(self), fields(data_source = self.target.data_source()))]
    pub async fn test_connection(&self) -> Result<(), ConnectionError> {
        self.target.ping().await.map_err(|source| {
            error!(error = %source, "Connection test failed");
            ConnectionError {
                data_source: self.target.data_source().to_string(),
                source,
            }
        })
    }

    /// `ALLOK`, or the reason the store is unhealthy.
    pub async fn status(&self) -> String {
        match self.test_connection().await {
            Ok(()) => STATUS_OK.to_string(),
            Err(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use vapub_db::storage::memory::{Fault, MemoryStorage};

    use super::*;

    #[tokio::test]
    async fn reachable_store_reports_allok() {
        let probe = HealthProbe::new(Arc::new(MemoryStorage::new("OcspDS")));

        assert!(probe.test_connection().await.is_ok());
        assert_eq!(probe.status().await, STATUS_OK);
    }

    #[tokio::test]
    async fn unreachable_store_reports_connection_error() {
        let probe = HealthProbe::new(Arc::new(
            MemoryStorage::new("OcspDS").with_fault(Fault::Unreachable),
        ));

        let err = probe.test_connection().await.unwrap_err();
        assert_eq!(err.data_source, "OcspDS");
        assert!(err.source.is_connection());
        assert!(probe.status().await.contains("OcspDS"));
    }
}

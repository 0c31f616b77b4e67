//! Validation authority publisher.
//!
//! Mirrors issued certificates and CRLs into the datastore read by OCSP and
//! CRL responders. The store may be shared by several authority nodes, so
//! writes use an insert/update fallback (see [`resolver`]) instead of locks;
//! repeating a call for the same record is always safe.
//!
//! # Example
//!
//! ```rust,ignore
//! let target = Arc::new(PostgresStorage::new("OcspDS", &data_source).await?);
//! let publisher = VaPublisher::new(PublisherConfig::default(), target)?;
//!
//! publisher
//!     .store_certificate(&CertificatePublication::new(der, "alice", ca_fp, CertificateStatus::Active))
//!     .await?;
//! ```

pub mod codec;
pub mod error;
pub mod health;
pub mod publisher;
pub mod resolver;

pub use error::{ConnectionError, ReplicationError};
pub use health::HealthProbe;
pub use publisher::{CertificatePublication, VaPublisher};

//! Shared types for the validation authority publisher.
//!
//! Holds the publisher configuration, the settings loader used by the
//! binaries, and the status/reason enumerations whose numeric values are part
//! of the responder's column contract.

pub mod config;
pub mod settings;
pub mod status;

pub use config::{ConfigError, PublisherConfig};
pub use settings::{DataSourceConfig, Settings};
pub use status::{CertificateStatus, CertificateType, RevocationReason};

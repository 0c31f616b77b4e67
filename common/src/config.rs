use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const PROPERTY_DATA_SOURCE: &str = "dataSource";
pub const PROPERTY_PROTECT: &str = "protect";
pub const PROPERTY_STORE_CERT: &str = "storeCert";
pub const PROPERTY_STORE_CRL: &str = "storeCRL";

pub const DEFAULT_DATA_SOURCE: &str = "OcspDS";
pub const DEFAULT_PROTECT: bool = false;
pub const DEFAULT_STORE_CERT: bool = true;
pub const DEFAULT_STORE_CRL: bool = false;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for `{key}`: expected `true` or `false`, got `{value}`")]
    InvalidBool { key: &'static str, value: String },

    #[error("Data source name must not be empty")]
    EmptyDataSource,

    #[error("Unknown data source `{0}`")]
    UnknownDataSource(String),

    #[error(transparent)]
    Load(#[from] ::config::ConfigError),
}

/// Options controlling how a publisher mirrors records into the validation
/// authority store.
///
/// Instances are plain values: cloning a template yields an independent
/// configuration, so publishers derived from the same template never share
/// mutable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PublisherConfig {
    /// Logical name of the data source rows are written to. Resolved against
    /// the `data_sources` table of [`crate::Settings`].
    pub data_source: String,

    /// Reserved for row protection. Carried and logged, never acted on.
    pub protect: bool,

    /// Whether the base64 certificate body is written. When disabled the row
    /// is still written, with a NULL body.
    pub store_cert: bool,

    /// Whether CRLs are published at all.
    pub store_crl: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            data_source: DEFAULT_DATA_SOURCE.into(),
            protect: DEFAULT_PROTECT,
            store_cert: DEFAULT_STORE_CERT,
            store_crl: DEFAULT_STORE_CRL,
        }
    }
}

impl PublisherConfig {
    /// Build a configuration from a flat property set as handed over by the
    /// authority (`dataSource`, `protect`, `storeCert`, `storeCRL`).
    ///
    /// Missing keys take their defaults. Booleans are matched
    /// case-insensitively; anything other than `true`/`false` is rejected.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            data_source: properties
                .get(PROPERTY_DATA_SOURCE)
                .map(|s| s.trim().to_string())
                .unwrap_or(defaults.data_source),
            protect: bool_property(properties, PROPERTY_PROTECT, defaults.protect)?,
            store_cert: bool_property(properties, PROPERTY_STORE_CERT, defaults.store_cert)?,
            store_crl: bool_property(properties, PROPERTY_STORE_CRL, defaults.store_crl)?,
        };
        config.validate()?;

        debug!(
            data_source = %config.data_source,
            protect = config.protect,
            store_cert = config.store_cert,
            store_crl = config.store_crl,
            "Loaded publisher properties"
        );

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_source.trim().is_empty() {
            return Err(ConfigError::EmptyDataSource);
        }
        Ok(())
    }
}

fn bool_property(
    properties: &HashMap<String, String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match properties.get(key).map(|v| v.trim()) {
        None => Ok(default),
        Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
        Some(v) => Err(ConfigError::InvalidBool {
            key,
            value: v.to_string(),
        }),
    }
}

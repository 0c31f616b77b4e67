//! Certificate state codes as stored in the validation authority tables.
//!
//! The numeric values are read by external responders and must not change.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Unassigned,
    Inactive,
    Active,
    NotifiedAboutExpiration,
    Revoked,
    Archived,
}

impl CertificateStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Unassigned => 0,
            Self::Inactive => 10,
            Self::Active => 20,
            Self::NotifiedAboutExpiration => 21,
            Self::Revoked => 40,
            Self::Archived => 60,
        }
    }

    pub fn is_revoked(self) -> bool {
        matches!(self, Self::Revoked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateType {
    Unknown,
    EndEntity,
    SubCa,
    RootCa,
}

impl CertificateType {
    pub fn code(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::EndEntity => 1,
            Self::SubCa => 2,
            Self::RootCa => 8,
        }
    }
}

/// RFC 5280 CRL reason codes, plus the `NotRevoked` marker (`-1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    NotRevoked,
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

impl RevocationReason {
    pub fn code(self) -> i32 {
        match self {
            Self::NotRevoked => -1,
            Self::Unspecified => 0,
            Self::KeyCompromise => 1,
            Self::CaCompromise => 2,
            Self::AffiliationChanged => 3,
            Self::Superseded => 4,
            Self::CessationOfOperation => 5,
            Self::CertificateHold => 6,
            // 7 is unused in RFC 5280
            Self::RemoveFromCrl => 8,
            Self::PrivilegesWithdrawn => 9,
            Self::AaCompromise => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(CertificateStatus::Active.code(), 20);
        assert_eq!(CertificateStatus::Revoked.code(), 40);
        assert!(CertificateStatus::Revoked.is_revoked());
        assert!(!CertificateStatus::NotifiedAboutExpiration.is_revoked());
    }

    #[test]
    fn reason_codes_skip_seven() {
        assert_eq!(RevocationReason::NotRevoked.code(), -1);
        assert_eq!(RevocationReason::CertificateHold.code(), 6);
        assert_eq!(RevocationReason::RemoveFromCrl.code(), 8);
    }
}

use std::fmt::Display;

use diesel::prelude::*;

use crate::schema::{certificatedata, crldata};

/// Column value written when a certificate has no revocation date.
pub const NOT_REVOKED_DATE: i64 = -1;

/// One row of `CertificateData`, as written by the publisher.
///
/// `row_version` is not part of the struct: inserts write `0` and updates
/// increment the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Insertable, AsChangeset)]
#[diesel(table_name = certificatedata)]
#[diesel(primary_key(fingerprint))]
#[diesel(treat_none_as_null = true)]
pub struct CertificateRow {
    pub fingerprint: String,

    /// Base64 DER body. `None` when the publisher is configured not to store
    /// certificate bodies.
    pub base64_cert: Option<String>,

    pub subject_dn: String,
    pub issuer_dn: String,
    pub ca_fingerprint: String,

    /// Decimal serial number.
    pub serial_number: String,

    pub status: i32,
    pub cert_type: i32,
    pub username: String,

    /// notAfter, milliseconds since the epoch.
    pub expire_date: i64,

    /// Milliseconds since the epoch, or [`NOT_REVOKED_DATE`].
    pub revocation_date: i64,

    pub revocation_reason: i32,
    pub tag: Option<String>,
    pub certificate_profile_id: i32,

    /// Milliseconds since the epoch.
    pub update_time: i64,
}

impl Display for CertificateRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Fingerprint: {}, Username: {}, Issuer: {}, Serno: {}, Subject: {}",
            self.fingerprint, self.username, self.issuer_dn, self.serial_number, self.subject_dn
        )
    }
}

/// One row of `CRLData`.
#[derive(Debug, Clone, PartialEq, Eq, Insertable, AsChangeset)]
#[diesel(table_name = crldata)]
#[diesel(primary_key(fingerprint))]
pub struct CrlRow {
    pub fingerprint: String,
    pub base64_crl: String,
    pub ca_fingerprint: String,
    pub crl_number: i32,

    /// `1` for a delta CRL, `-1` otherwise.
    pub delta_crl_indicator: i32,

    pub issuer_dn: String,

    /// Milliseconds since the epoch.
    pub this_update: i64,
    pub next_update: i64,
}

impl CrlRow {
    pub fn is_delta(&self) -> bool {
        self.delta_crl_indicator > 0
    }
}

impl Display for CrlRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Fingerprint: {}, Issuer: {}, Number: {}, Is delta: {}",
            self.fingerprint,
            self.issuer_dn,
            self.crl_number,
            self.is_delta()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_lead_with_the_fingerprint() {
        let crl = CrlRow {
            fingerprint: "c1".into(),
            base64_crl: "MAA=".into(),
            ca_fingerprint: "ca".into(),
            crl_number: 7,
            delta_crl_indicator: 1,
            issuer_dn: "CN=CA".into(),
            this_update: 0,
            next_update: 1,
        };

        assert_eq!(
            crl.to_string(),
            "Fingerprint: c1, Issuer: CN=CA, Number: 7, Is delta: true"
        );
    }
}

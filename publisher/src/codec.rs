//! Conversion of DER certificates and CRLs into validation authority rows.
//!
//! Everything here is pure: decoding happens before any datastore access, so
//! malformed input never results in a partial write.

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use x509_parser::{
    objects::{oid2abbrev, oid_registry},
    prelude::*,
};

/// id-ce-deltaCRLIndicator
pub const DELTA_CRL_INDICATOR_OID: &str = "2.5.29.27";

const PEM_PREAMBLE: &[u8] = b"-----BEGIN";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed certificate: {0}")]
    Certificate(String),

    #[error("Malformed CRL: {0}")]
    Crl(String),

    #[error("{what} has {len} trailing bytes after the DER structure")]
    TrailingData { what: &'static str, len: usize },

    #[error("CRL has no nextUpdate")]
    MissingNextUpdate,

    #[error("{0} is out of range")]
    InvalidTime(&'static str),

    #[error("Invalid PEM: {0}")]
    Pem(String),
}

/// Whether a CRL is a delta CRL.
///
/// The column stores `1` or `-1`; `0` is left to mean "unknown" for
/// responders reading rows this publisher did not write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaCrlIndicator {
    Delta,
    Absent,
}

impl DeltaCrlIndicator {
    pub fn column_value(self) -> i32 {
        match self {
            Self::Delta => 1,
            Self::Absent => -1,
        }
    }

    pub fn is_delta(self) -> bool {
        matches!(self, Self::Delta)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCertificate {
    pub fingerprint: String,
    pub subject_dn: String,
    pub issuer_dn: String,

    /// Decimal serial number.
    pub serial_number: String,
    pub not_after: DateTime<Utc>,

    /// Base64 DER, when requested.
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCrl {
    pub fingerprint: String,
    pub issuer_dn: String,

    /// The CRL number extension, if present. Informational only: the caller's
    /// number is what gets stored.
    pub crl_number: Option<String>,
    pub this_update: DateTime<Utc>,
    pub next_update: DateTime<Utc>,
    pub delta: DeltaCrlIndicator,
    pub revoked_count: usize,
    pub body: String,
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn encode_certificate(der: &[u8], include_body: bool) -> Result<EncodedCertificate, DecodeError> {
    let (rest, cert) =
        X509Certificate::from_der(der).map_err(|e| DecodeError::Certificate(e.to_string()))?;
    if !rest.is_empty() {
        return Err(DecodeError::TrailingData {
            what: "certificate",
            len: rest.len(),
        });
    }

    Ok(EncodedCertificate {
        fingerprint: fingerprint(der),
        subject_dn: dn_string(cert.subject()),
        issuer_dn: dn_string(cert.issuer()),
        serial_number: cert.tbs_certificate.serial.to_string(),
        not_after: to_utc(cert.validity().not_after, "notAfter")?,
        body: include_body.then(|| STANDARD.encode(der)),
    })
}

/// Decode a CRL.
///
/// `issuer_hint` is the DN the authority knows the CRL by; when blank the
/// CRL's own issuer is used instead.
pub fn encode_crl(der: &[u8], issuer_hint: &str) -> Result<EncodedCrl, DecodeError> {
    let (rest, crl) =
        CertificateRevocationList::from_der(der).map_err(|e| DecodeError::Crl(e.to_string()))?;
    if !rest.is_empty() {
        return Err(DecodeError::TrailingData {
            what: "CRL",
            len: rest.len(),
        });
    }

    let delta = if crl
        .extensions()
        .iter()
        .any(|ext| ext.oid.to_id_string() == DELTA_CRL_INDICATOR_OID)
    {
        DeltaCrlIndicator::Delta
    } else {
        DeltaCrlIndicator::Absent
    };

    let next_update = crl.next_update().ok_or(DecodeError::MissingNextUpdate)?;

    let issuer_dn = match issuer_hint.trim() {
        "" => dn_string(crl.issuer()),
        hint => hint.to_string(),
    };

    Ok(EncodedCrl {
        fingerprint: fingerprint(der),
        issuer_dn,
        crl_number: crl.crl_number().map(|n| n.to_string()),
        this_update: to_utc(crl.last_update(), "thisUpdate")?,
        next_update: to_utc(next_update, "nextUpdate")?,
        delta,
        revoked_count: crl.iter_revoked_certificates().count(),
        body: STANDARD.encode(der),
    })
}

/// Accept PEM or raw DER and return DER.
pub fn der_from_pem_or_der(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let trimmed = bytes.trim_ascii_start();
    if !trimmed.starts_with(PEM_PREAMBLE) {
        return Ok(bytes.to_vec());
    }

    pem_rfc7468::decode_vec(trimmed)
        .map(|(_label, der)| der)
        .map_err(|e| DecodeError::Pem(e.to_string()))
}

/// Render a DN most-specific RDN first, comma separated, with short
/// attribute names: `CN=host.example.com,O=Example,C=SE`. Attributes of a
/// multi-valued RDN are joined with `+`.
pub fn dn_string(name: &X509Name<'_>) -> String {
    let registry = oid_registry();

    let mut rdns: Vec<String> = name
        .iter()
        .map(|rdn| {
            rdn.iter()
                .map(|attr| {
                    let key = oid2abbrev(attr.attr_type(), registry)
                        .map(str::to_string)
                        .unwrap_or_else(|_| attr.attr_type().to_id_string());
                    let value = match attr.as_str() {
                        Ok(s) => escape_dn_value(s),
                        Err(_) => format!("#{}", hex::encode(attr.attr_value().as_bytes())),
                    };
                    format!("{key}={value}")
                })
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect();

    rdns.reverse();
    rdns.join(",")
}

fn escape_dn_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '#' if i == 0 => out.push_str("\\#"),
            _ => out.push(c),
        }
    }
    out
}

fn to_utc(time: ASN1Time, field: &'static str) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::from_timestamp(time.timestamp(), 0).ok_or(DecodeError::InvalidTime(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_lowercase_sha256_hex() {
        assert_eq!(
            fingerprint(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn delta_indicator_column_values() {
        assert_eq!(DeltaCrlIndicator::Delta.column_value(), 1);
        assert_eq!(DeltaCrlIndicator::Absent.column_value(), -1);
        assert!(!DeltaCrlIndicator::Absent.is_delta());
    }

    #[test]
    fn garbage_is_not_a_certificate() {
        assert!(matches!(
            encode_certificate(b"definitely not DER", true),
            Err(DecodeError::Certificate(_))
        ));
    }

    #[test]
    fn garbage_is_not_a_crl() {
        assert!(matches!(
            encode_crl(&[0x30, 0x03, 0x02, 0x01, 0x01], ""),
            Err(DecodeError::Crl(_))
        ));
    }

    #[test]
    fn multi_valued_rdn_keeps_its_attributes_together() {
        // C=SE, then one RDN holding CN=a and O=b.
        let der = [
            0x30, 0x23, 0x31, 0x0b, 0x30, 0x09, 0x06, 0x03, 0x55, 0x04, 0x06, 0x13, 0x02, 0x53,
            0x45, 0x31, 0x14, 0x30, 0x08, 0x06, 0x03, 0x55, 0x04, 0x03, 0x0c, 0x01, 0x61, 0x30,
            0x08, 0x06, 0x03, 0x55, 0x04, 0x0a, 0x0c, 0x01, 0x62,
        ];
        let (_, name) = X509Name::from_der(&der).unwrap();

        assert_eq!(dn_string(&name), "CN=a+O=b,C=SE");
    }

    #[test]
    fn dn_values_are_escaped() {
        assert_eq!(escape_dn_value("Example, Inc."), "Example\\, Inc.");
        assert_eq!(escape_dn_value("#1"), "\\#1");
        assert_eq!(escape_dn_value("a#b"), "a#b");
    }

    #[test]
    fn raw_der_passes_through() {
        let der = [0x30, 0x00];
        assert_eq!(der_from_pem_or_der(&der).unwrap(), der.to_vec());
    }

    #[test]
    fn broken_pem_is_rejected() {
        assert!(matches!(
            der_from_pem_or_der(b"-----BEGIN CERTIFICATE-----\n!!!\n"),
            Err(DecodeError::Pem(_))
        ));
    }
}

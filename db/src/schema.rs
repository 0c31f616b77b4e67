// Identifiers are unquoted in the responder's DDL, so PostgreSQL folds them
// to lowercase.

diesel::table! {
    certificatedata (fingerprint) {
        fingerprint -> Text,
        #[sql_name = "base64cert"]
        base64_cert -> Nullable<Text>,
        #[sql_name = "subjectdn"]
        subject_dn -> Text,
        #[sql_name = "issuerdn"]
        issuer_dn -> Text,
        #[sql_name = "cafingerprint"]
        ca_fingerprint -> Text,
        #[sql_name = "serialnumber"]
        serial_number -> Text,
        status -> Integer,
        #[sql_name = "type"]
        cert_type -> Integer,
        username -> Text,
        #[sql_name = "expiredate"]
        expire_date -> BigInt,
        #[sql_name = "revocationdate"]
        revocation_date -> BigInt,
        #[sql_name = "revocationreason"]
        revocation_reason -> Integer,
        tag -> Nullable<Text>,
        #[sql_name = "certificateprofileid"]
        certificate_profile_id -> Integer,
        #[sql_name = "updatetime"]
        update_time -> BigInt,
        #[sql_name = "rowversion"]
        row_version -> Integer,
    }
}

diesel::table! {
    crldata (fingerprint) {
        fingerprint -> Text,
        #[sql_name = "base64crl"]
        base64_crl -> Text,
        #[sql_name = "cafingerprint"]
        ca_fingerprint -> Text,
        #[sql_name = "crlnumber"]
        crl_number -> Integer,
        #[sql_name = "deltacrlindicator"]
        delta_crl_indicator -> Integer,
        #[sql_name = "issuerdn"]
        issuer_dn -> Text,
        #[sql_name = "thisupdate"]
        this_update -> BigInt,
        #[sql_name = "nextupdate"]
        next_update -> BigInt,
        #[sql_name = "rowversion"]
        row_version -> Integer,
    }
}

//! AWS Signature Version 4.
//!
//! Used in two shapes: header signing for store requests
//! ([`authorization_header`]) and query-string presigning for asset URLs
//! ([`presign_query`]).

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hex::ToHex;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Region, service and instant a signature is bound to.
#[derive(Debug, Clone, Copy)]
pub struct SigningScope<'a> {
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

impl<'a> SigningScope<'a> {
    pub fn new(region: &'a str, service: &'a str, time: DateTime<Utc>) -> Self {
        Self {
            region,
            service,
            time,
        }
    }

    pub fn date(&self) -> String {
        self.time.format("%Y%m%d").to_string()
    }

    pub fn amz_date(&self) -> String {
        self.time.format("%Y%m%dT%H%M%SZ").to_string()
    }

    pub fn credential_scope(&self) -> String {
        format!(
            "{}/{}/{}/aws4_request",
            self.date(),
            self.region,
            self.service
        )
    }
}

/// Request parts covered by a signature. `path` and `query` must already be
/// in canonical (encoded) form; header names must be lowercase.
pub struct CanonicalRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    pub headers: &'a BTreeMap<String, String>,
    pub payload_hash: &'a str,
}

impl CanonicalRequest<'_> {
    pub fn signed_headers(&self) -> String {
        self.headers
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(self.method);
        out.push('\n');
        out.push_str(self.path);
        out.push('\n');
        out.push_str(self.query);
        out.push('\n');
        for (name, value) in self.headers {
            out.push_str(name);
            out.push(':');
            out.push_str(value.trim());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.signed_headers());
        out.push('\n');
        out.push_str(self.payload_hash);
        out
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().encode_hex::<String>()
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Percent-encode per the SigV4 rules: everything but `A-Za-z0-9-_.~` is
/// encoded with uppercase hex. `/` is kept when `encode_slash` is false.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => {
                let _ = write!(out, "%{:02X}", byte);
            }
        }
    }
    out
}

/// Encode and sort query parameters into their canonical form.
pub fn canonical_query(params: &[(&str, &str)]) -> String {
    let mut encoded = params
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect::<Vec<_>>();
    encoded.sort();
    encoded
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn signing_key(secret_access_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_access_key).as_bytes(),
        date.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

pub fn string_to_sign(scope: &SigningScope<'_>, canonical_request: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        scope.amz_date(),
        scope.credential_scope(),
        sha256_hex(canonical_request.as_bytes())
    )
}

pub fn signature(
    credentials: &Credentials,
    scope: &SigningScope<'_>,
    request: &CanonicalRequest<'_>,
) -> String {
    let key = signing_key(
        &credentials.secret_access_key,
        &scope.date(),
        scope.region,
        scope.service,
    );
    let to_sign = string_to_sign(scope, &request.render());
    hmac_sha256(&key, to_sign.as_bytes()).encode_hex::<String>()
}

/// Value for the `Authorization` header of a header-signed request.
pub fn authorization_header(
    credentials: &Credentials,
    scope: &SigningScope<'_>,
    request: &CanonicalRequest<'_>,
) -> String {
    format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM,
        credentials.access_key_id,
        scope.credential_scope(),
        request.signed_headers(),
        signature(credentials, scope, request)
    )
}

/// Canonical query string, signature included, for a presigned `GET` of
/// `path` on `host`. Only the `host` header is signed.
pub fn presign_query(
    credentials: &Credentials,
    scope: &SigningScope<'_>,
    host: &str,
    path: &str,
    expires_in: Duration,
) -> String {
    let credential = format!("{}/{}", credentials.access_key_id, scope.credential_scope());
    let amz_date = scope.amz_date();
    let expires = expires_in.as_secs().to_string();

    let mut params = vec![
        ("X-Amz-Algorithm", ALGORITHM),
        ("X-Amz-Credential", credential.as_str()),
        ("X-Amz-Date", amz_date.as_str()),
        ("X-Amz-Expires", expires.as_str()),
        ("X-Amz-SignedHeaders", "host"),
    ];
    if let Some(token) = credentials.session_token.as_deref() {
        params.push(("X-Amz-Security-Token", token));
    }
    let query = canonical_query(&params);

    let headers = BTreeMap::from([("host".to_string(), host.to_string())]);
    let request = CanonicalRequest {
        method: "GET",
        path,
        query: &query,
        headers: &headers,
        payload_hash: UNSIGNED_PAYLOAD,
    };
    let signature = signature(credentials, scope, &request);

    format!("{}&X-Amz-Signature={}", query, signature)
}

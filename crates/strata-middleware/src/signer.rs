//! Request signing.
//!
//! A [`Signer`] is a pure function of the request, the credentials, the
//! signing name, the region and the current time. The signing step calls it
//! once per attempt, after the retry step has stamped the attempt header, so
//! every attempt carries a fresh signature.
//!
//! [`HmacSha256Signer`] signs a canonical form of the request:
//!
//! 1. Build the canonical request from the method, path, sorted query,
//!    signed headers and payload hash.
//! 2. Derive a signing key by chaining `HMAC-SHA256` over the date, region,
//!    signing name and a fixed terminator.
//! 3. Sign `ALGORITHM \n timestamp \n scope \n sha256(canonical request)`.

use crate::headers;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http::{HeaderName, HeaderValue};
use sha2::{Digest, Sha256};
use strata_core::{Credentials, HttpRequest, SdkError, SdkResult};

type HmacSha256 = Hmac<Sha256>;

/// Algorithm label carried in the authorization header.
pub const ALGORITHM: &str = "STRATA-HMAC-SHA256";

const SCOPE_TERMINATOR: &str = "strata_request";

/// Inputs to a signature besides the request itself.
#[derive(Debug, Clone, Copy)]
pub struct SigningParams<'a> {
    /// Credentials to sign with.
    pub credentials: &'a Credentials,
    /// Service signing name.
    pub signing_name: &'a str,
    /// Target region.
    pub region: &'a str,
    /// Signing time.
    pub time: DateTime<Utc>,
}

/// Signs a finalized request in place.
pub trait Signer: Send + Sync + 'static {
    /// Adds authentication headers to `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be canonicalized.
    fn sign(&self, request: &mut HttpRequest, params: &SigningParams<'_>) -> SdkResult<()>;
}

/// HMAC-SHA256 request signer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSha256Signer;

impl HmacSha256Signer {
    /// Creates the signer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn canonical_request(request: &HttpRequest, signed: &[(String, String)]) -> String {
        let path = match request.uri().path() {
            "" => "/",
            p => p,
        };

        let mut query: Vec<(&str, &str)> = request
            .uri()
            .query()
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .collect();
        query.sort_unstable();
        let query = query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_headers: String = signed
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_names = signed_header_names(signed);

        let payload_hash = request
            .header(headers::CONTENT_SHA256)
            .map_or_else(|| payload_hash(request), str::to_string);

        format!(
            "{method}\n{path}\n{query}\n{canonical_headers}\n{signed_names}\n{payload_hash}",
            method = request.method()
        )
    }
}

impl Signer for HmacSha256Signer {
    fn sign(&self, request: &mut HttpRequest, params: &SigningParams<'_>) -> SdkResult<()> {
        let timestamp = params.time.format("%Y%m%dT%H%M%SZ").to_string();
        let date = params.time.format("%Y%m%d").to_string();

        // Signatures from a previous attempt must not leak into this one.
        request.headers_mut().remove(http::header::AUTHORIZATION);

        if let Some(authority) = request.uri().authority().cloned() {
            request.set_header(http::header::HOST, header_value(authority.as_str())?);
        }
        request.set_header(HeaderName::from_static(headers::DATE), header_value(&timestamp)?);
        if let Some(token) = params.credentials.session_token() {
            request.set_header(
                HeaderName::from_static(headers::SECURITY_TOKEN),
                header_value(token)?,
            );
        }

        let signed = signed_headers(request);
        let canonical = Self::canonical_request(request, &signed);
        let scope = format!(
            "{date}/{region}/{service}/{SCOPE_TERMINATOR}",
            region = params.region,
            service = params.signing_name
        );
        let string_to_sign = format!(
            "{ALGORITHM}\n{timestamp}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical.as_bytes()))
        );

        let key = signing_key(params, &date)?;
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{ALGORITHM} Credential={akid}/{scope}, SignedHeaders={names}, Signature={signature}",
            akid = params.credentials.access_key_id(),
            names = signed_header_names(&signed),
        );
        request.set_header(http::header::AUTHORIZATION, header_value(&authorization)?);
        Ok(())
    }
}

/// Hex SHA-256 of the body, or the unsigned marker if the body is one-shot.
#[must_use]
pub fn payload_hash(request: &HttpRequest) -> String {
    request.body().bytes().map_or_else(
        || headers::UNSIGNED_PAYLOAD.to_string(),
        |bytes| hex::encode(Sha256::digest(bytes)),
    )
}

/// Headers covered by the signature: host, content-type and every
/// `x-strata-*` header, lowercased and sorted.
fn signed_headers(request: &HttpRequest) -> Vec<(String, String)> {
    let mut signed: Vec<(String, String)> = request
        .headers()
        .iter()
        .filter(|(name, _)| {
            let name = name.as_str();
            name == "host" || name == "content-type" || name.starts_with("x-strata-")
        })
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.trim().to_string()))
        })
        .collect();
    signed.sort();
    signed
}

fn signed_header_names(signed: &[(String, String)]) -> String {
    signed
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

fn signing_key(params: &SigningParams<'_>, date: &str) -> SdkResult<Vec<u8>> {
    let secret = format!("STRATA{}", params.credentials.secret_access_key());
    let k_date = hmac(secret.as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, params.region.as_bytes())?;
    let k_service = hmac(&k_region, params.signing_name.as_bytes())?;
    hmac(&k_service, SCOPE_TERMINATOR.as_bytes())
}

fn hmac(key: &[u8], data: &[u8]) -> SdkResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| SdkError::assembly(format!("invalid signing key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn header_value(value: &str) -> SdkResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| SdkError::assembly(format!("value is not a valid header: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use strata_core::SdkBody;

    fn params(creds: &Credentials) -> SigningParams<'_> {
        SigningParams {
            credentials: creds,
            signing_name: "iam",
            region: "us-east-1",
            time: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        }
    }

    fn request() -> HttpRequest {
        let mut request = HttpRequest::new();
        request.set_uri("https://iam.example.com/?b=2&a=1".parse().unwrap());
        request.set_body(SdkBody::from_bytes("Action=DetachUserPolicy"));
        request
    }

    #[test]
    fn test_sign_adds_headers() {
        let creds = Credentials::new("AKIDEXAMPLE", "secret");
        let mut req = request();
        HmacSha256Signer::new().sign(&mut req, &params(&creds)).unwrap();

        assert_eq!(req.header("host"), Some("iam.example.com"));
        assert_eq!(req.header(headers::DATE), Some("20240301T123000Z"));
        let auth = req.header("authorization").unwrap();
        assert!(auth.starts_with(
            "STRATA-HMAC-SHA256 Credential=AKIDEXAMPLE/20240301/us-east-1/iam/strata_request"
        ));
        assert!(auth.contains("SignedHeaders=host;x-strata-date"));
        assert!(!auth.contains("secret"));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let creds = Credentials::new("AKID", "secret");
        let mut a = request();
        let mut b = request();
        HmacSha256Signer.sign(&mut a, &params(&creds)).unwrap();
        HmacSha256Signer.sign(&mut b, &params(&creds)).unwrap();
        assert_eq!(a.header("authorization"), b.header("authorization"));
    }

    #[test]
    fn test_signature_covers_body_and_secret() {
        let creds = Credentials::new("AKID", "secret");
        let mut base = request();
        HmacSha256Signer.sign(&mut base, &params(&creds)).unwrap();

        let mut other_body = request();
        other_body.set_body(SdkBody::from_bytes("Action=Other"));
        HmacSha256Signer.sign(&mut other_body, &params(&creds)).unwrap();
        assert_ne!(base.header("authorization"), other_body.header("authorization"));

        let other_creds = Credentials::new("AKID", "different");
        let mut other_key = request();
        HmacSha256Signer.sign(&mut other_key, &params(&other_creds)).unwrap();
        assert_ne!(base.header("authorization"), other_key.header("authorization"));
    }

    #[test]
    fn test_resigning_replaces_authorization() {
        let creds = Credentials::new("AKID", "secret");
        let mut req = request();
        HmacSha256Signer.sign(&mut req, &params(&creds)).unwrap();
        HmacSha256Signer.sign(&mut req, &params(&creds)).unwrap();
        assert_eq!(req.headers().get_all("authorization").iter().count(), 1);
    }

    #[test]
    fn test_session_token_is_signed() {
        let creds = Credentials::new("AKID", "secret").with_session_token("tok");
        let mut req = request();
        HmacSha256Signer.sign(&mut req, &params(&creds)).unwrap();
        assert_eq!(req.header(headers::SECURITY_TOKEN), Some("tok"));
        assert!(req
            .header("authorization")
            .unwrap()
            .contains("x-strata-security-token"));
    }

    #[test]
    fn test_payload_hash() {
        let req = request();
        assert_eq!(
            payload_hash(&req),
            hex::encode(Sha256::digest(b"Action=DetachUserPolicy"))
        );

        let mut once = HttpRequest::new();
        once.set_body(SdkBody::once("stream"));
        assert_eq!(payload_hash(&once), headers::UNSIGNED_PAYLOAD);
    }
}

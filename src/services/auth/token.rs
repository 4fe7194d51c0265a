//! Compact signed token codec (JWS, RS256).
//!
//! `decode` trusts nothing from the token before these checks pass, in order:
//! 1. header `alg` is on the allow-list
//! 2. header `kid` resolves to a public key
//! 3. signature verifies against that key
//! 4. `exp` is not in the past

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;

use crate::services::auth::claims::Claims;
use crate::services::auth::error::AuthError;
use crate::services::auth::keystore::KeyStoreError;

/// The only signing algorithm issued or accepted.
pub const ALGORITHM: Algorithm = Algorithm::RS256;
const ALLOWED_ALGORITHMS: &[&str] = &["RS256"];

/// Verification knobs. `leeway_seconds` tolerates clock skew on `exp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    pub leeway_seconds: u64,
}

pub fn encode(claims: &Claims, key: &EncodingKey, kid: &str) -> Result<String, AuthError> {
    if claims.sub.trim().is_empty() {
        return Err(AuthError::Encoding("missing subject".into()));
    }
    if claims.exp <= claims.iat {
        return Err(AuthError::Encoding("exp must be after iat".into()));
    }
    if kid.is_empty() {
        return Err(AuthError::Encoding("missing key id".into()));
    }

    let mut header = Header::new(ALGORITHM);
    header.typ = Some("JWT".to_string());
    header.kid = Some(kid.to_string());

    jsonwebtoken::encode(&header, claims, key).map_err(|e| AuthError::Encoding(e.to_string()))
}

// Raw view of the JOSE header. Parsed by hand so an unknown `alg` (e.g. "none")
// is reported as unsupported instead of failing header deserialization.
#[derive(Debug, Deserialize)]
struct RawHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

fn raw_header(token: &str) -> Result<RawHeader, AuthError> {
    let mut segments = token.split('.');
    let (Some(header), Some(_), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::MalformedToken("expected three segments".into()));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|e| AuthError::MalformedToken(format!("header: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::MalformedToken(format!("header: {e}")))
}

pub fn decode<F>(token: &str, options: DecodeOptions, key_lookup: F) -> Result<Claims, AuthError>
where
    F: FnOnce(&str) -> Result<DecodingKey, KeyStoreError>,
{
    let header = raw_header(token)?;

    if !ALLOWED_ALGORITHMS.contains(&header.alg.as_str()) {
        return Err(AuthError::UnsupportedAlgorithm(header.alg));
    }

    let kid = header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or(AuthError::MissingKeyId)?;

    let key = key_lookup(&kid).map_err(|e| match e {
        KeyStoreError::KeyNotFound(kid) => AuthError::UnknownKey(kid),
        other => AuthError::Key(other),
    })?;

    let mut validation = Validation::new(ALGORITHM);
    validation.leeway = options.leeway_seconds;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = jsonwebtoken::decode::<Claims>(token, &key, &validation).map_err(|e| {
        match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidRsaKey(_) => {
                AuthError::SignatureVerification
            }
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            ErrorKind::InvalidAlgorithm => AuthError::UnsupportedAlgorithm(header.alg.clone()),
            _ => AuthError::MalformedToken(e.to_string()),
        }
    })?;

    Ok(data.claims)
}

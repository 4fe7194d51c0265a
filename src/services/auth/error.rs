use std::collections::BTreeSet;

use thiserror::Error;

use crate::services::auth::keystore::KeyStoreError;

// Errors from token issuance, verification and role checks.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("expected authorization header format: Bearer <token>")]
    MalformedHeader,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("missing key id (kid) in token header")]
    MissingKeyId,

    #[error("unknown signing key: {0}")]
    UnknownKey(String),

    #[error("signature verification failed")]
    SignatureVerification,

    #[error("token is expired")]
    ExpiredToken,

    #[error("token encoding failed: {0}")]
    Encoding(String),

    #[error("you are not authorized for that action, claims[{claims:?}] roles[{required:?}]")]
    InsufficientRole {
        claims: BTreeSet<String>,
        required: Vec<String>,
    },

    #[error(transparent)]
    Key(#[from] KeyStoreError),
}

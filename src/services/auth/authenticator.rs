use std::fmt;
use std::sync::Arc;

use crate::services::auth::claims::Claims;
use crate::services::auth::error::AuthError;
use crate::services::auth::keystore::KeyLookup;
use crate::services::auth::token::{self, DecodeOptions};

/// Signs tokens with the active key and verifies tokens signed by any key
/// the store still knows about.
#[derive(Clone)]
pub struct Authenticator {
    active_kid: String,
    keys: Arc<dyn KeyLookup>,
    options: DecodeOptions,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("active_kid", &self.active_kid)
            .field("options", &self.options)
            .finish()
    }
}

impl Authenticator {
    /// Fails when the active kid cannot be resolved to a signing key; that is
    /// a misconfiguration and must stop startup.
    pub fn new(active_kid: impl Into<String>, keys: Arc<dyn KeyLookup>) -> Result<Self, AuthError> {
        let active_kid = active_kid.into();
        keys.private_key(&active_kid)?;

        Ok(Self {
            active_kid,
            keys,
            options: DecodeOptions::default(),
        })
    }

    pub fn with_leeway(mut self, leeway_seconds: u64) -> Self {
        self.options.leeway_seconds = leeway_seconds;
        self
    }

    pub fn active_kid(&self) -> &str {
        &self.active_kid
    }

    pub fn generate_token(&self, claims: &Claims) -> Result<String, AuthError> {
        let key = self.keys.private_key(&self.active_kid)?;
        token::encode(claims, &key, &self.active_kid)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        token::decode(token, self.options, |kid| self.keys.public_key(kid))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::services::auth::keystore::{FsKeyStore, MapKeyStore};
    use crate::testutil::{self, LEGACY_KID, LEGACY_PEM, LEGACY_PUB_PEM, PRIMARY_KID, PRIMARY_PEM};

    #[test]
    fn new_fails_for_unresolvable_active_kid() {
        let err = Authenticator::new("nope", Arc::new(testutil::key_store())).unwrap_err();
        assert!(matches!(err, AuthError::Key(_)));
    }

    #[test]
    fn new_fails_when_active_key_is_public_only() {
        let store = MapKeyStore::new().with_pem("old", LEGACY_PUB_PEM).unwrap();
        assert!(Authenticator::new("old", Arc::new(store)).is_err());
    }

    #[test]
    fn generated_token_validates() {
        let auth = testutil::authenticator();
        let claims = testutil::claims(&["USER"], 600);

        let token = auth.generate_token(&claims).unwrap();

        assert_eq!(auth.validate_token(&token).unwrap(), claims);
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some(PRIMARY_KID));
    }

    #[test]
    fn tokens_from_retired_kid_still_validate_after_rotation() {
        let old = Authenticator::new(LEGACY_KID, Arc::new(testutil::key_store())).unwrap();
        let claims = testutil::claims(&["ADMIN"], 600);
        let old_token = old.generate_token(&claims).unwrap();

        // Rotated: primary is active, legacy only kept for verification.
        let store = MapKeyStore::new()
            .with_pem(PRIMARY_KID, PRIMARY_PEM)
            .unwrap()
            .with_pem(LEGACY_KID, LEGACY_PUB_PEM)
            .unwrap();
        let rotated = Authenticator::new(PRIMARY_KID, Arc::new(store)).unwrap();

        assert_eq!(rotated.validate_token(&old_token).unwrap(), claims);
        let new_token = rotated.generate_token(&claims).unwrap();
        assert_eq!(
            jsonwebtoken::decode_header(&new_token).unwrap().kid.as_deref(),
            Some(PRIMARY_KID)
        );
    }

    #[test]
    fn fs_backed_authenticator_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(format!("{PRIMARY_KID}.pem")), PRIMARY_PEM).unwrap();
        fs::write(dir.path().join(format!("{LEGACY_KID}.pem")), LEGACY_PEM).unwrap();

        let store = FsKeyStore::new(dir.path()).unwrap();
        let auth = Authenticator::new(PRIMARY_KID, Arc::new(store)).unwrap();
        let claims = testutil::claims(&["ADMIN", "USER"], 600);

        let token = auth.generate_token(&claims).unwrap();
        assert_eq!(auth.validate_token(&token).unwrap(), claims);
    }

    #[test]
    fn validate_propagates_codec_errors() {
        let auth = testutil::authenticator();
        let now = chrono::Utc::now().timestamp();
        let expired = Claims::new("u", "sales-api", now - 100, now - 10, ["USER"]);
        let token = auth.generate_token(&expired).unwrap();

        assert!(matches!(auth.validate_token(&token), Err(AuthError::ExpiredToken)));
        assert!(matches!(auth.validate_token("x.y"), Err(AuthError::MalformedToken(_))));
    }

    #[test]
    fn debug_does_not_print_keys() {
        let auth = testutil::authenticator();
        let out = format!("{auth:?}");
        assert!(out.contains(PRIMARY_KID));
        assert!(!out.contains("BEGIN"));
    }
}

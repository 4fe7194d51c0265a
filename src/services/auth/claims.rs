/*
 * Responsibility
 * - 検証済みトークンが表す identity (Claims) の型
 * - role membership のチェック (authorized)
 */
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_USER: &str = "USER";

/// Identity asserted by a token.
///
/// A `Claims` value only means "authenticated" when it came out of
/// `Authenticator::validate_token`. Values built any other way (e.g. right
/// before signing) are plain data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Claims {
    pub fn new<I, R>(
        sub: impl Into<String>,
        iss: impl Into<String>,
        iat: i64,
        exp: i64,
        roles: I,
    ) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            sub: sub.into(),
            iss: iss.into(),
            iat,
            exp,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// True when at least one of `roles` is held by these claims.
    ///
    /// Callers must pass at least one role. An empty requirement (or claims
    /// without any role) never authorizes.
    pub fn authorized<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|role| self.roles.contains(role.as_ref()))
    }
}

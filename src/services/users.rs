/*
 * Responsibility
 * - user の業務ロジック (validation, password hash, CRUD)
 * - email + password から Claims を作る (authenticate)
 * - 永続化は UserStore trait に委譲
 */
use std::sync::Arc;

use anyhow::{Context, anyhow};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use axum::http::StatusCode;

use crate::{
    error::{AppError, FieldErrors},
    repos::{RepoError, User, UserStore},
    services::auth::{Claims, ROLE_ADMIN, ROLE_USER},
};

const KNOWN_ROLES: [&str; 2] = [ROLE_ADMIN, ROLE_USER];

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errs = FieldErrors::new();

        if self.name.trim().is_empty() {
            errs.push("name", "is required");
        }
        validate_email(&mut errs, &self.email);
        if self.roles.is_empty() {
            errs.push("roles", "at least one role is required");
        }
        validate_roles(&mut errs, &self.roles);
        if self.password.is_empty() {
            errs.push("password", "is required");
        } else if self.password != self.password_confirm {
            errs.push("password_confirm", "must match password");
        }

        errs.into_result()
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Option<Vec<String>>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

impl UpdateUser {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errs = FieldErrors::new();

        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            errs.push("name", "cannot be empty");
        }
        if let Some(email) = &self.email {
            validate_email(&mut errs, email);
        }
        if let Some(roles) = &self.roles {
            if roles.is_empty() {
                errs.push("roles", "at least one role is required");
            }
            validate_roles(&mut errs, roles);
        }
        if let Some(password) = &self.password {
            if password.is_empty() {
                errs.push("password", "cannot be empty");
            } else if self.password_confirm.as_deref() != Some(password.as_str()) {
                errs.push("password_confirm", "must match password");
            }
        }

        errs.into_result()
    }
}

fn validate_email(errs: &mut FieldErrors, email: &str) {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        errs.push("email", "must be a valid email address");
    }
}

fn validate_roles(errs: &mut FieldErrors, roles: &[String]) {
    for role in roles {
        if !KNOWN_ROLES.contains(&role.as_str()) {
            errs.push("roles", format!("unknown role {role:?}"));
        }
    }
}

pub struct UserService {
    store: Arc<dyn UserStore>,
    issuer: String,
    token_ttl: Duration,
    hasher: Argon2<'static>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, issuer: impl Into<String>, token_ttl: Duration) -> Self {
        Self {
            store,
            issuer: issuer.into(),
            token_ttl,
            hasher: Argon2::default(),
        }
    }

    /// Override the Argon2id cost parameters used for new hashes. Stored
    /// hashes are always verified with the parameters they were made with.
    pub fn with_password_params(mut self, params: Params) -> Self {
        self.hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        self
    }

    pub async fn create(&self, now: DateTime<Utc>, nu: NewUser) -> Result<User, AppError> {
        nu.validate()?;

        let user = User {
            id: Uuid::new_v4(),
            name: nu.name.trim().to_string(),
            email: nu.email,
            roles: nu.roles,
            password_hash: self.hash_password(nu.password).await?,
            date_created: now,
            date_updated: now,
        };
        self.store.create(&user).await?;

        Ok(user)
    }

    pub async fn update(
        &self,
        now: DateTime<Utc>,
        id: Uuid,
        uu: UpdateUser,
    ) -> Result<User, AppError> {
        uu.validate()?;

        let mut user = self.store.query_by_id(id).await?;
        if let Some(name) = uu.name {
            user.name = name.trim().to_string();
        }
        if let Some(email) = uu.email {
            user.email = email;
        }
        if let Some(roles) = uu.roles {
            user.roles = roles;
        }
        if let Some(password) = uu.password {
            user.password_hash = self.hash_password(password).await?;
        }
        user.date_updated = now;

        self.store.update(&user).await?;
        Ok(user)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.store.delete(id).await?;
        Ok(())
    }

    pub async fn query(&self, page: u32, rows_per_page: u32) -> Result<Vec<User>, AppError> {
        Ok(self.store.query(page, rows_per_page).await?)
    }

    pub async fn query_by_id(&self, id: Uuid) -> Result<User, AppError> {
        Ok(self.store.query_by_id(id).await?)
    }

    /// Claims for the user owning `email` when `password` matches. Unknown
    /// email and wrong password are indistinguishable to the caller.
    pub async fn authenticate(
        &self,
        now: DateTime<Utc>,
        email: &str,
        password: &str,
    ) -> Result<Claims, AppError> {
        let user = match self.store.query_by_email(email).await {
            Ok(user) => user,
            Err(RepoError::NotFound) => return Err(auth_failed()),
            Err(e) => return Err(e.into()),
        };

        let hasher = self.hasher.clone();
        let stored = user.password_hash.clone();
        let password = password.to_string();
        let id = user.id;
        let matched = tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&stored)
                .map_err(|e| anyhow!("stored password hash for {id} is unreadable: {e}"))?;
            Ok::<_, anyhow::Error>(hasher.verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await
        .context("password verification task")??;
        if !matched {
            return Err(auth_failed());
        }

        let iat = now.timestamp();
        let exp = (now + self.token_ttl).timestamp();
        Ok(Claims::new(user.id.to_string(), self.issuer.clone(), iat, exp, user.roles))
    }

    pub async fn check(&self) -> Result<(), AppError> {
        Ok(self.store.check().await?)
    }

    /// Create the first administrator. Answers `None` when a user with
    /// `email` already exists, so running it twice is harmless.
    pub async fn seed_admin(
        &self,
        now: DateTime<Utc>,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, AppError> {
        let nu = NewUser {
            name: name.to_string(),
            email: email.to_string(),
            roles: vec![ROLE_ADMIN.to_string(), ROLE_USER.to_string()],
            password: password.to_string(),
            password_confirm: password.to_string(),
        };

        match self.create(now, nu).await {
            Ok(user) => Ok(Some(user)),
            Err(err) if err.status() == StatusCode::CONFLICT => Ok(None),
            Err(err) => Err(err),
        }
    }

    // Argon2 is CPU-bound; it runs on the blocking pool.
    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        let hash = tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            hasher
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| anyhow!("hashing password: {e}"))
        })
        .await
        .context("password hashing task")??;
        Ok(hash)
    }
}

fn auth_failed() -> AppError {
    AppError::unauthorized("authentication failed")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::repos::MemoryUserStore;

    fn service() -> UserService {
        // minimum cost keeps the suite fast
        let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap();
        UserService::new(Arc::new(MemoryUserStore::new()), "sales-api", Duration::hours(1))
            .with_password_params(params)
    }

    fn new_user(email: &str, roles: &[&str]) -> NewUser {
        NewUser {
            name: "Ann Admin".into(),
            email: email.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            password: "gophers".into(),
            password_confirm: "gophers".into(),
        }
    }

    fn fields(err: AppError) -> Vec<String> {
        match err {
            AppError::Validation(f) => f.fields().iter().map(|e| e.field.clone()).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn new_user_reports_every_bad_field() {
        let nu = NewUser {
            name: " ".into(),
            email: "not-an-email".into(),
            roles: vec!["ROOT".into()],
            password: "a".into(),
            password_confirm: "b".into(),
        };

        assert_eq!(
            fields(nu.validate().unwrap_err()),
            ["name", "email", "roles", "password_confirm"]
        );
    }

    #[test]
    fn update_user_validates_only_present_fields() {
        assert!(UpdateUser::default().validate().is_ok());

        let uu = UpdateUser {
            email: Some("x@".into()),
            password: Some("secret".into()),
            ..Default::default()
        };
        assert_eq!(fields(uu.validate().unwrap_err()), ["email", "password_confirm"]);
    }

    #[tokio::test]
    async fn create_hashes_the_password() {
        let svc = service();
        let user = svc.create(Utc::now(), new_user("ann@example.com", &["ADMIN"])).await.unwrap();

        assert!(user.password_hash.starts_with("$argon2id$"));
        assert!(!user.password_hash.contains("gophers"));
    }

    #[tokio::test]
    async fn authenticate_issues_claims_for_the_user() {
        let svc = service();
        let now = Utc::now();
        let user = svc.create(now, new_user("ann@example.com", &["ADMIN", "USER"])).await.unwrap();

        let claims = svc.authenticate(now, "ann@example.com", "gophers").await.unwrap();

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.iss, "sales-api");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert!(claims.authorized(&[ROLE_ADMIN]));
    }

    #[tokio::test]
    async fn authenticate_rejects_wrong_password_and_unknown_email() {
        let svc = service();
        let now = Utc::now();
        svc.create(now, new_user("ann@example.com", &["USER"])).await.unwrap();

        let wrong = svc.authenticate(now, "ann@example.com", "nope").await.unwrap_err();
        let unknown = svc.authenticate(now, "bob@example.com", "gophers").await.unwrap_err();

        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn update_changes_password_and_timestamp() {
        let svc = service();
        let created = Utc::now();
        let user = svc.create(created, new_user("ann@example.com", &["USER"])).await.unwrap();

        let later = created + Duration::minutes(1);
        let uu = UpdateUser {
            password: Some("rustaceans".into()),
            password_confirm: Some("rustaceans".into()),
            ..Default::default()
        };
        let updated = svc.update(later, user.id, uu).await.unwrap();

        assert_eq!(updated.date_updated, later);
        assert_eq!(updated.date_created, created);
        assert!(svc.authenticate(later, "ann@example.com", "rustaceans").await.is_ok());
        assert!(svc.authenticate(later, "ann@example.com", "gophers").await.is_err());
    }

    #[tokio::test]
    async fn unknown_and_duplicate_map_to_client_errors() {
        let svc = service();
        svc.create(Utc::now(), new_user("ann@example.com", &["USER"])).await.unwrap();

        let dup = svc.create(Utc::now(), new_user("ann@example.com", &["USER"])).await.unwrap_err();
        let missing = svc.delete(Uuid::new_v4()).await.unwrap_err();

        assert_eq!(dup.status(), StatusCode::CONFLICT);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn seed_admin_creates_an_admin_once() {
        let svc = service();
        let now = Utc::now();

        let user = svc
            .seed_admin(now, "Admin Gopher", "admin@example.com", "gophers")
            .await
            .unwrap()
            .expect("first seed creates the user");
        assert_eq!(user.roles, [ROLE_ADMIN, ROLE_USER]);

        let claims = svc.authenticate(now, "admin@example.com", "gophers").await.unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert!(claims.authorized(&[ROLE_ADMIN]));

        let again = svc
            .seed_admin(now, "Admin Gopher", "admin@example.com", "other")
            .await
            .unwrap();
        assert!(again.is_none());
        assert!(svc.authenticate(now, "admin@example.com", "gophers").await.is_ok());
    }

    #[tokio::test]
    async fn seed_admin_still_validates_input() {
        let err = service().seed_admin(Utc::now(), "Admin", "nope", "").await.unwrap_err();

        assert_eq!(fields(err), ["email", "password"]);
    }

    #[tokio::test]
    async fn hashing_does_not_block_the_runtime() {
        // default cost, so the hash takes long enough to be observed
        let svc = UserService::new(
            Arc::new(MemoryUserStore::new()),
            "sales-api",
            Duration::hours(1),
        );
        let ticked = AtomicBool::new(false);

        let ((user, ticked_before_done), ()) = tokio::join!(
            async {
                let user = svc.create(Utc::now(), new_user("ann@example.com", &["USER"])).await;
                (user, ticked.load(Ordering::SeqCst))
            },
            async { ticked.store(true, Ordering::SeqCst) },
        );

        assert!(user.is_ok());
        assert!(ticked_before_done);
    }
}

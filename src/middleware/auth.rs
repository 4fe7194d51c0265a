//! Bearer token authentication and role authorization.
//!
//! - `authenticate`: `Authorization: Bearer <jwt>` を検証し、Claims を Ctx に入れる
//! - `authorize`: Ctx の Claims が必要 role を1つ以上持つか確認する
//!
//! Both are route-level middleware: they are registered per route, inside the
//! app-wide chain, so only routes that declare them are protected.

use std::sync::Arc;

use axum::http::header;

use crate::error::AppError;
use crate::services::auth::{AuthError, Authenticator};
use crate::web::{Ctx, Handler, Middleware, handler, middleware};

pub fn authenticate(auth: Arc<Authenticator>) -> Middleware {
    middleware(move |next: Handler| {
        let auth = auth.clone();
        handler(move |ctx: Ctx, req| {
            let next = next.clone();
            let auth = auth.clone();
            async move {
                let token = bearer_token(
                    req.headers()
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok()),
                )
                .map_err(|err| {
                    tracing::warn!(error = %err, "malformed authorization header");
                    unauthorized(err)
                })?;

                let claims = auth.validate_token(token).map_err(|err| {
                    tracing::warn!(error = %err, "access token verification failed");
                    unauthorized(err)
                })?;

                next(ctx.with_claims(claims), req).await
            }
        })
    })
}

/// `roles` is fixed at route registration and must not be empty.
pub fn authorize(roles: &[&str]) -> Middleware {
    let roles: Arc<[String]> = roles.iter().map(|r| r.to_string()).collect();

    middleware(move |next: Handler| {
        let roles = roles.clone();
        handler(move |ctx: Ctx, req| {
            let next = next.clone();
            let roles = roles.clone();
            async move {
                let Some(claims) = ctx.claims() else {
                    return Err(AppError::forbidden(
                        "you are not authorized for that action, no claims",
                    ));
                };

                if !claims.authorized(&roles) {
                    let err = AuthError::InsufficientRole {
                        claims: claims.roles.clone(),
                        required: roles.to_vec(),
                    };
                    tracing::debug!(sub = %claims.sub, error = %err, "role check failed");
                    return Err(AppError::forbidden(err.to_string()));
                }

                next(ctx, req).await
            }
        })
    })
}

// Scheme is case-insensitive; exactly one space-separated token must follow.
fn bearer_token(value: Option<&str>) -> Result<&str, AuthError> {
    let value = value.ok_or(AuthError::MalformedHeader)?;
    let mut parts = value.split(' ');

    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(AuthError::MalformedHeader),
    }
}

fn unauthorized(err: AuthError) -> AppError {
    match err {
        // Key store failures are server-side detail.
        AuthError::Key(_) => AppError::unauthorized("authentication failed"),
        other => AppError::unauthorized(other.to_string()),
    }
}

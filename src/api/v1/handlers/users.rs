/*
 * Responsibility
 * - /users 系 handler (token, CRUD)
 * - params / decode で受け、UserService 呼び出し → respond
 * - 認証・認可は route 側の middleware (authenticate / authorize) が済ませている前提
 */
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use axum::extract::Request;
use axum::http::{StatusCode, header};
use base64::{Engine, engine::general_purpose::STANDARD};
use uuid::Uuid;

use crate::{
    api::v1::dto::users::{TokenResponse, UserResponse},
    error::AppError,
    services::{
        auth::{Authenticator, ROLE_ADMIN},
        users::{NewUser, UpdateUser, UserService},
    },
    web::{Ctx, Handler, HandlerResult, decode, handler, params, respond},
};

pub const MAX_ROWS_PER_PAGE: u32 = 100;

#[derive(Clone)]
pub struct Handlers {
    users: Arc<UserService>,
    auth: Arc<Authenticator>,
}

impl Handlers {
    pub fn new(users: Arc<UserService>, auth: Arc<Authenticator>) -> Self {
        Self { users, auth }
    }

    pub fn token(&self) -> Handler {
        self.bind(token)
    }

    pub fn query(&self) -> Handler {
        self.bind(query)
    }

    pub fn query_by_id(&self) -> Handler {
        self.bind(query_by_id)
    }

    pub fn create(&self) -> Handler {
        self.bind(create)
    }

    pub fn update(&self) -> Handler {
        self.bind(update)
    }

    pub fn delete(&self) -> Handler {
        self.bind(delete)
    }

    fn bind<F, Fut>(&self, f: F) -> Handler
    where
        F: Fn(Handlers, Ctx, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let h = self.clone();
        handler(move |ctx, req| f(h.clone(), ctx, req))
    }
}

/// GET /users/token: Basic auth `email:password`, answers a signed token.
async fn token(h: Handlers, ctx: Ctx, req: Request) -> HandlerResult {
    let now = ctx.values()?.now;

    let (email, password) = basic_credentials(&req)
        .ok_or_else(|| AppError::unauthorized("must provide email and password in Basic auth"))?;

    let claims = h.users.authenticate(now, &email, &password).await?;
    let token = h
        .auth
        .generate_token(&claims)
        .context("generating token")?;

    respond(StatusCode::OK, TokenResponse { token })
}

async fn query(h: Handlers, _ctx: Ctx, mut req: Request) -> HandlerResult {
    let (page, rows) = params::<(String, String)>(&mut req).await?;

    let page: u32 = page
        .parse()
        .ok()
        .filter(|p| *p >= 1)
        .ok_or_else(|| AppError::bad_request(format!("invalid page format: {page}")))?;
    let rows: u32 = rows
        .parse()
        .ok()
        .filter(|r| (1..=MAX_ROWS_PER_PAGE).contains(r))
        .ok_or_else(|| AppError::bad_request(format!("invalid rows format: {rows}")))?;

    let users: Vec<UserResponse> = h
        .users
        .query(page, rows)
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    respond(StatusCode::OK, users)
}

async fn query_by_id(h: Handlers, ctx: Ctx, mut req: Request) -> HandlerResult {
    let id: Uuid = params(&mut req).await?;

    // authenticate runs before this handler on every route that reaches it
    let claims = ctx
        .claims()
        .ok_or_else(|| anyhow!("claims missing from context"))?;

    // non-admins may only look at themselves
    if !claims.authorized(&[ROLE_ADMIN]) && claims.sub != id.to_string() {
        return Err(AppError::forbidden("you are not authorized for that action"));
    }

    let user = h.users.query_by_id(id).await?;
    respond(StatusCode::OK, UserResponse::from(user))
}

async fn create(h: Handlers, ctx: Ctx, req: Request) -> HandlerResult {
    let now = ctx.values()?.now;
    let nu: NewUser = decode(req).await?;

    let user = h.users.create(now, nu).await?;
    respond(StatusCode::CREATED, UserResponse::from(user))
}

async fn update(h: Handlers, ctx: Ctx, mut req: Request) -> HandlerResult {
    let now = ctx.values()?.now;
    let id: Uuid = params(&mut req).await?;
    let uu: UpdateUser = decode(req).await?;

    h.users.update(now, id, uu).await?;
    respond(StatusCode::NO_CONTENT, ())
}

async fn delete(h: Handlers, _ctx: Ctx, mut req: Request) -> HandlerResult {
    let id: Uuid = params(&mut req).await?;

    h.users.delete(id).await?;
    respond(StatusCode::NO_CONTENT, ())
}

// `Authorization: Basic base64(email:password)`
fn basic_credentials(req: &Request) -> Option<(String, String)> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (email, password) = decoded.split_once(':')?;
    if email.is_empty() {
        return None;
    }
    Some((email.to_string(), password.to_string()))
}

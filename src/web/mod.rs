//! Minimal handler/middleware foundation on top of axum.
//!
//! Responsibility:
//! - `Handler`: request handler that returns `Result<Response, AppError>` so
//!   errors travel back out through every middleware
//! - `Middleware`: `Handler -> Handler` transformation
//! - `wrap_middleware`: compose a list so the first entry is the outermost layer
//! - `App`: register composed handlers on an axum `Router`
//!
//! Composition happens once, at route registration. Per-request work is only
//! the call through the already composed chain.

mod app;
mod context;
mod request;
mod shutdown;

use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::response::Response;
use futures::future::BoxFuture;

use crate::error::AppError;

pub use app::App;
pub use context::{Ctx, Values};
pub use request::{decode, params, respond};
pub use shutdown::Shutdown;

pub type HandlerResult = Result<Response, AppError>;
pub type Handler = Arc<dyn Fn(Ctx, Request) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Box an async fn or closure as a `Handler`.
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Ctx, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx: Ctx, req: Request| -> BoxFuture<'static, HandlerResult> {
        Box::pin(f(ctx, req))
    })
}

pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// `[m1, m2, .., mn]` around `h` gives `m1(m2(..mn(h)))`.
pub fn wrap_middleware(mw: &[Middleware], handler: Handler) -> Handler {
    mw.iter().rev().fold(handler, |next, m| m(next))
}

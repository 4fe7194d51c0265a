use axum::Router;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, on};
use tower_http::request_id::RequestId;

use crate::web::{Ctx, Handler, Middleware, Shutdown, Values, wrap_middleware};

/// Route table plus the application-wide middleware every route gets.
pub struct App {
    router: Router,
    mw: Vec<Middleware>,
    shutdown: Shutdown,
}

impl App {
    /// `mw` is applied outermost-first to every route.
    pub fn new(shutdown: Shutdown, mw: Vec<Middleware>) -> Self {
        Self {
            router: Router::new(),
            mw,
            shutdown,
        }
    }

    /// Route-level `mw` wraps the handler first, inside the app-wide chain.
    pub fn handle(
        mut self,
        method: MethodFilter,
        group: &str,
        path: &str,
        handler: Handler,
        mw: &[Middleware],
    ) -> Self {
        let handler = wrap_middleware(mw, handler);
        let handler = wrap_middleware(&self.mw, handler);

        let full_path = if group.is_empty() {
            path.to_string()
        } else {
            format!("/{group}{path}")
        };

        let shutdown = self.shutdown.clone();
        self.router = self.router.route(
            &full_path,
            on(method, move |req: Request| serve(handler, shutdown, req)),
        );
        self
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

async fn serve(handler: Handler, shutdown: Shutdown, req: Request) -> Response {
    let ctx = request_values(&req).map(Ctx::new).unwrap_or_default();

    match handler(ctx, req).await {
        Ok(res) => res,
        Err(err) => {
            // Either a shutdown error (already answered by the error
            // middleware) or an error the chain failed to handle.
            tracing::error!(error = %err, "error reached the route adapter; signalling shutdown");
            shutdown.signal(err.to_string());
            err.into_response()
        }
    }
}

// The trace id is the request id set by the router-wide http layers.
fn request_values(req: &Request) -> Option<Values> {
    req.extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .map(Values::new)
}

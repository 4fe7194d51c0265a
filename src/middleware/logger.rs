//! Access log for every request handled through `web::App`.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;

use crate::web::{Ctx, Handler, Middleware, handler, middleware};

pub fn logger() -> Middleware {
    middleware(|next: Handler| {
        handler(move |ctx: Ctx, req| {
            let next = next.clone();
            async move {
                let values = ctx.values()?.clone();
                let method = req.method().clone();
                let path = req.uri().path().to_string();
                let remote_addr = req
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.to_string())
                    .unwrap_or_default();

                tracing::info!(
                    trace_id = %values.trace_id,
                    %method,
                    %path,
                    %remote_addr,
                    "request started"
                );

                let res = next(ctx, req).await;
                let status = match &res {
                    Ok(r) => r.status(),
                    Err(e) => e.status(),
                };

                tracing::info!(
                    trace_id = %values.trace_id,
                    %method,
                    %path,
                    %remote_addr,
                    status_code = status.as_u16(),
                    since = ?values.elapsed(),
                    "request completed"
                );

                res
            }
        })
    })
}

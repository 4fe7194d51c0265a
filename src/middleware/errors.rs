//! Error translation for the whole chain.
//!
//! Responsibility:
//! - inner handler の error を1か所で受け、分類して統一 JSON で返す
//!   - `Validation` -> 400 + fields
//!   - `Request`    -> 指定 status + message
//!   - それ以外     -> 500 (message はログのみ、client には出さない)
//! - shutdown error は response を書いた後、外側へ返す (route adapter が shutdown を開始)

use axum::Json;
use axum::response::IntoResponse;

use crate::web::{Ctx, Handler, Middleware, handler, middleware};

pub fn errors() -> Middleware {
    middleware(|next: Handler| {
        handler(move |ctx: Ctx, req| {
            let next = next.clone();
            async move {
                // Without values the request cannot be traced.
                let trace_id = ctx.values()?.trace_id.clone();

                let err = match next(ctx, req).await {
                    Ok(res) => return Ok(res),
                    Err(err) => err,
                };

                tracing::error!(trace_id = %trace_id, error = ?err, "ERROR");

                let (status, body) = err.error_response();
                let response = (status, Json(body)).into_response();

                if err.is_shutdown() {
                    return Err(err.with_written(response));
                }
                Ok(response)
            }
        })
    })
}

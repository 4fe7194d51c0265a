//! Panic recovery: a panic inside the chain becomes an unclassified error.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::error::AppError;
use crate::middleware::metrics::Metrics;
use crate::web::{Ctx, Handler, Middleware, handler, middleware};

pub fn panics(metrics: Arc<Metrics>) -> Middleware {
    middleware(move |next: Handler| {
        let metrics = metrics.clone();
        handler(move |ctx: Ctx, req| {
            let next = next.clone();
            let metrics = metrics.clone();
            async move {
                match AssertUnwindSafe(next(ctx, req)).catch_unwind().await {
                    Ok(res) => res,
                    Err(panic) => {
                        metrics.record_panic();
                        Err(AppError::Internal(anyhow::anyhow!(
                            "PANIC [{}]",
                            panic_message(panic.as_ref())
                        )))
                    }
                }
            }
        })
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! Request counters exposed on the debug listener.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::web::{Ctx, Handler, Middleware, handler, middleware};

#[derive(Debug, Default)]
pub struct Metrics {
    requests: AtomicU64,
    errors: AtomicU64,
    panics: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub panics: u64,
}

impl Metrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn metrics(metrics: Arc<Metrics>) -> Middleware {
    middleware(move |next: Handler| {
        let metrics = metrics.clone();
        handler(move |ctx: Ctx, req| {
            let next = next.clone();
            let metrics = metrics.clone();
            async move {
                metrics.requests.fetch_add(1, Ordering::Relaxed);

                let res = next(ctx, req).await;
                if res.is_err() {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                }
                res
            }
        })
    })
}

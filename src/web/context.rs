/*
 * Responsibility
 * - リクエスト単位のコンテキスト (Values / Claims) を明示的な引数として chain に流す
 * - 共有状態は持たない (1 request = 1 Ctx)
 */
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::services::auth::Claims;

/// Values set by the route adapter before any middleware runs.
#[derive(Debug, Clone)]
pub struct Values {
    pub trace_id: String,
    pub now: DateTime<Utc>,
    started: Instant,
}

impl Values {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            now: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ctx {
    values: Option<Arc<Values>>,
    claims: Option<Arc<Claims>>,
}

impl Ctx {
    pub fn new(values: Values) -> Self {
        Self {
            values: Some(Arc::new(values)),
            claims: None,
        }
    }

    /// Missing values mean the transport never initialised this request,
    /// which is reported as a shutdown error.
    pub fn values(&self) -> Result<&Values, AppError> {
        self.values
            .as_deref()
            .ok_or_else(|| AppError::shutdown("web value missing from context"))
    }

    /// Claims verified by the authenticate middleware, if it ran.
    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_deref()
    }

    // Only the authenticate middleware may attach claims.
    pub(crate) fn with_claims(mut self, claims: Claims) -> Self {
        self.claims = Some(Arc::new(claims));
        self
    }
}

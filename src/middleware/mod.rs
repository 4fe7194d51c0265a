/*
 * Responsibility
 * - middleware の公開インターフェース (re-export)
 * - app 全体: logger → errors → metrics → panics (外側 → 内側)
 * - route 単位: authenticate → authorize (handler の直前)
 */
pub mod auth;
pub mod errors;
pub mod http;
pub mod logger;
pub mod metrics;
pub mod panics;

pub use auth::{authenticate, authorize};
pub use errors::errors;
pub use logger::logger;
pub use metrics::{Metrics, MetricsSnapshot, metrics};
pub use panics::panics;

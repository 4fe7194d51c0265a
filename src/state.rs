/*
 * Responsibility
 * - handler / middleware に渡す共有サービス (AppState)
 *   - auth: Authenticator, users: UserService, metrics: Metrics
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::{
    middleware::Metrics,
    services::{auth::Authenticator, users::UserService},
};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Authenticator>,
    pub users: Arc<UserService>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(auth: Arc<Authenticator>, users: Arc<UserService>, metrics: Arc<Metrics>) -> Self {
        Self {
            auth,
            users,
            metrics,
        }
    }
}

//! In-memory `UserStore` for local runs without Postgres and for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::repos::{error::RepoError, user_repo::{User, UserStore}};

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn email_taken(users: &HashMap<Uuid, User>, email: &str, except: Uuid) -> bool {
        users.values().any(|u| u.id != except && u.email == email)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: &User) -> Result<(), RepoError> {
        let mut users = self.users.write().await;
        if Self::email_taken(&users, &user.email, user.id) {
            return Err(RepoError::DuplicateEmail);
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), RepoError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(RepoError::NotFound);
        }
        if Self::email_taken(&users, &user.email, user.id) {
            return Err(RepoError::DuplicateEmail);
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }

    async fn query(&self, page: u32, rows_per_page: u32) -> Result<Vec<User>, RepoError> {
        let users = self.users.read().await;
        let mut all: Vec<&User> = users.values().collect();
        all.sort_by(|a, b| (a.date_created, a.id).cmp(&(b.date_created, b.id)));

        let skip = page.saturating_sub(1) as usize * rows_per_page as usize;
        Ok(all
            .into_iter()
            .skip(skip)
            .take(rows_per_page as usize)
            .cloned()
            .collect())
    }

    async fn query_by_id(&self, id: Uuid) -> Result<User, RepoError> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn query_by_email(&self, email: &str) -> Result<User, RepoError> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/*
 * Responsibility
 * - user 永続化の境界 (UserStore trait)
 * - Postgres 実装と in-memory 実装
 */
pub mod error;
pub mod memory;
pub mod user_repo;

pub use error::RepoError;
pub use memory::MemoryUserStore;
pub use user_repo::{PgUserStore, User, UserStore};

/**
 * Responsibility
 * - repo が上位に伝える意味の定義
 * - NotFound / DuplicateEmail は handler で 404 / 409 に変換される
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("email is already in use")]
    DuplicateEmail,
    #[error("db error")]
    Db(#[from] sqlx::Error),
}

impl RepoError {
    pub fn from_sqlx(e: sqlx::Error) -> Self {
        if matches!(e, sqlx::Error::RowNotFound) {
            return RepoError::NotFound;
        }
        // unique_violation: the only unique column besides the key is email
        if let sqlx::Error::Database(dbe) = &e
            && dbe.code().as_deref() == Some("23505")
        {
            return RepoError::DuplicateEmail;
        }
        RepoError::Db(e)
    }
}

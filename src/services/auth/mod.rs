pub mod authenticator;
pub mod claims;
pub mod error;
pub mod keystore;
pub mod token;

pub use authenticator::Authenticator;
pub use claims::{Claims, ROLE_ADMIN, ROLE_USER};
pub use error::AuthError;
pub use keystore::{FsKeyStore, KeyLookup, KeyPair, KeyStoreError, MapKeyStore};

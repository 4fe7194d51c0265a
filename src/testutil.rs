//! Shared fixtures for unit tests.

use std::io;
use std::sync::{Arc, Mutex};

use crate::services::auth::{Authenticator, Claims, MapKeyStore};

pub const PRIMARY_KID: &str = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1";
pub const LEGACY_KID: &str = "2d4f0a7e-93c1-4b8e-a1f6-3c5e7d9b1a20";

// PKCS#8 private key.
pub const PRIMARY_PEM: &str = include_str!("../testdata/keys/primary.pem");
// PKCS#1 private key, and its public half.
pub const LEGACY_PEM: &str = include_str!("../testdata/keys/legacy.pem");
pub const LEGACY_PUB_PEM: &str = include_str!("../testdata/keys/legacy.pub.pem");
pub const MALFORMED_PEM: &str = include_str!("../testdata/keys/malformed.pem");

pub fn key_store() -> MapKeyStore {
    MapKeyStore::new()
        .with_pem(PRIMARY_KID, PRIMARY_PEM)
        .unwrap()
        .with_pem(LEGACY_KID, LEGACY_PEM)
        .unwrap()
}

pub fn authenticator() -> Authenticator {
    Authenticator::new(PRIMARY_KID, Arc::new(key_store())).unwrap()
}

/// Claims issued now, valid for `ttl` seconds.
pub fn claims(roles: &[&str], ttl: i64) -> Claims {
    let now = chrono::Utc::now().timestamp();
    Claims::new("user-123", "sales-api", now, now + ttl, roles.iter().copied())
}

pub fn token(roles: &[&str]) -> String {
    authenticator().generate_token(&claims(roles, 3600)).unwrap()
}

/// In-memory log sink for asserting on emitted events.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// A plain-text fmt subscriber writing into this buffer. Install it with
    /// `tracing::subscriber::set_default` on a current-thread runtime.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        let buf = self.clone();
        tracing_subscriber::fmt()
            .with_writer(move || buf.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

//! Key resolution by key-ID (`kid`).
//!
//! Responsibility:
//! - Map a `kid` to signing (private) or verification (public) key material
//! - Backends: in-memory map (tests, tooling) and a directory of `<kid>.pem` files
//!
//! Lookups take `&self` only; key state is never mutated after construction,
//! so one store can be shared across requests behind an `Arc`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::{fmt, fs, io};

use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("failed to parse key {kid}: {reason}")]
    KeyParse { kid: String, reason: String },

    #[error("failed to read key {kid}: {source}")]
    Io {
        kid: String,
        #[source]
        source: io::Error,
    },
}

impl KeyStoreError {
    fn parse(kid: &str, reason: impl fmt::Display) -> Self {
        Self::KeyParse {
            kid: kid.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Capability consumed by the token codec and the authenticator.
pub trait KeyLookup: Send + Sync {
    fn private_key(&self, kid: &str) -> Result<EncodingKey, KeyStoreError>;
    fn public_key(&self, kid: &str) -> Result<DecodingKey, KeyStoreError>;
}

/// RSA key material for one `kid`.
///
/// A pair built from a public-only PEM can verify but not sign, which is how
/// retired keys stay usable for tokens issued before a rotation.
#[derive(Clone)]
pub struct KeyPair {
    encoding: Option<EncodingKey>,
    decoding: DecodingKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("KeyPair")
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

impl KeyPair {
    /// Accepts PKCS#8 / PKCS#1 private keys and SPKI / PKCS#1 public keys.
    /// The public half is derived from a private key.
    pub fn from_pem(kid: &str, pem: &str) -> Result<Self, KeyStoreError> {
        let pem = pem.trim();

        if pem.contains("PRIVATE KEY") {
            let private = RsaPrivateKey::from_pkcs8_pem(pem)
                .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
                .map_err(|e| KeyStoreError::parse(kid, e))?;
            let public = RsaPublicKey::from(&private);

            let private_der = private
                .to_pkcs1_der()
                .map_err(|e| KeyStoreError::parse(kid, e))?;

            Ok(Self {
                encoding: Some(EncodingKey::from_rsa_der(private_der.as_bytes())),
                decoding: decoding_key(kid, &public)?,
            })
        } else {
            let public = RsaPublicKey::from_public_key_pem(pem)
                .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
                .map_err(|e| KeyStoreError::parse(kid, e))?;

            Ok(Self {
                encoding: None,
                decoding: decoding_key(kid, &public)?,
            })
        }
    }

    pub fn can_sign(&self) -> bool {
        self.encoding.is_some()
    }

    fn encoding_key(&self, kid: &str) -> Result<EncodingKey, KeyStoreError> {
        self.encoding
            .clone()
            .ok_or_else(|| KeyStoreError::parse(kid, "no private key material"))
    }
}

fn decoding_key(kid: &str, public: &RsaPublicKey) -> Result<DecodingKey, KeyStoreError> {
    let der = public
        .to_pkcs1_der()
        .map_err(|e| KeyStoreError::parse(kid, e))?;
    Ok(DecodingKey::from_rsa_der(der.as_bytes()))
}

/// Static `kid -> key` table fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct MapKeyStore {
    keys: HashMap<String, KeyPair>,
}

impl MapKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, kid: impl Into<String>, pair: KeyPair) -> Self {
        self.keys.insert(kid.into(), pair);
        self
    }

    pub fn with_pem(self, kid: &str, pem: &str) -> Result<Self, KeyStoreError> {
        let pair = KeyPair::from_pem(kid, pem)?;
        Ok(self.with_key(kid, pair))
    }

    fn get(&self, kid: &str) -> Result<&KeyPair, KeyStoreError> {
        self.keys
            .get(kid)
            .ok_or_else(|| KeyStoreError::KeyNotFound(kid.to_string()))
    }
}

impl KeyLookup for MapKeyStore {
    fn private_key(&self, kid: &str) -> Result<EncodingKey, KeyStoreError> {
        self.get(kid)?.encoding_key(kid)
    }

    fn public_key(&self, kid: &str) -> Result<DecodingKey, KeyStoreError> {
        Ok(self.get(kid)?.decoding.clone())
    }
}

/// Directory of `<kid>.pem` files, read and parsed on every lookup.
#[derive(Debug, Clone)]
pub struct FsKeyStore {
    dir: PathBuf,
}

impl FsKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        if !fs::metadata(&dir)?.is_dir() {
            return Err(io::Error::other(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    fn load(&self, kid: &str) -> Result<KeyPair, KeyStoreError> {
        // kid comes from an untrusted token header; never let it leave `dir`.
        if !is_safe_kid(kid) {
            return Err(KeyStoreError::KeyNotFound(kid.to_string()));
        }

        let path = self.dir.join(format!("{kid}.pem"));
        let pem = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => KeyStoreError::KeyNotFound(kid.to_string()),
            _ => KeyStoreError::Io {
                kid: kid.to_string(),
                source: e,
            },
        })?;

        KeyPair::from_pem(kid, &pem)
    }
}

fn is_safe_kid(kid: &str) -> bool {
    !kid.is_empty()
        && !kid.starts_with('.')
        && kid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl KeyLookup for FsKeyStore {
    fn private_key(&self, kid: &str) -> Result<EncodingKey, KeyStoreError> {
        self.load(kid)?.encoding_key(kid)
    }

    fn public_key(&self, kid: &str) -> Result<DecodingKey, KeyStoreError> {
        Ok(self.load(kid)?.decoding)
    }
}

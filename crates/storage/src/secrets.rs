// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master-keyed encrypted secret store.
//!
//! A single JSON envelope `{version, salt, nonce, ciphertext}` holds an
//! AES-256-GCM encryption of a key→value map. The AEAD key is derived
//! from the user's master key with Argon2id; the derivation salt is
//! generated when the store file is first written and persisted in the
//! envelope so the same master key keeps decrypting across restarts.
//! Check environment values reference entries as `secret://<key>`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix marking an environment value as a secret reference
pub const SECRET_REF_PREFIX: &str = "secret://";

/// Environment variable carrying the master key
pub const MASTER_KEY_ENV: &str = "FOGHORN_SECRET_MASTER_KEY";

const MAX_SECRET_SIZE: usize = 64 * 1024;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const ENVELOPE_VERSION: u32 = 1;

/// Errors from secret store operations
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret store path is required")]
    EmptyPath,
    #[error("master key is required")]
    MissingMasterKey,
    #[error("{MASTER_KEY_ENV} is required")]
    MasterKeyEnvMissing,
    #[error("master key must be at least 32 bytes long")]
    MasterKeyTooShort,
    #[error("invalid secret reference: {0:?}")]
    InvalidRef(String),
    #[error("secret not found: {0}")]
    NotFound(String),
    #[error("secret key is required")]
    EmptyKey,
    #[error("secret key cannot contain '..'")]
    KeyTraversal,
    #[error("secret key must be relative")]
    KeyAbsolute,
    #[error("secret value exceeds maximum size of {MAX_SECRET_SIZE} bytes")]
    ValueTooLarge,
    #[error("failed to parse secret store: {0}")]
    Parse(String),
    #[error("unsupported secret store version: {0}")]
    UnsupportedVersion(u32),
    #[error("failed to decrypt secret store: invalid master key or corrupted data")]
    DecryptFailed,
    #[error("key derivation failed: {0}")]
    Kdf(String),
    #[error("encryption failed")]
    EncryptFailed,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// On-disk envelope
#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    salt: String,
    nonce: String,
    ciphertext: String,
}

/// Parse a `secret://<key>` reference, returning the key.
pub fn parse_secret_ref(value: &str) -> Option<&str> {
    let key = value.strip_prefix(SECRET_REF_PREFIX)?.trim();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Read the master key from `FOGHORN_SECRET_MASTER_KEY`.
///
/// A value that base64-decodes cleanly is used decoded; anything else
/// is taken as raw bytes. Either way at least 32 bytes are required.
pub fn master_key_from_env() -> Result<Vec<u8>, SecretError> {
    let raw = std::env::var(MASTER_KEY_ENV).unwrap_or_default();
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SecretError::MasterKeyEnvMissing);
    }

    let input = match BASE64.decode(raw) {
        Ok(decoded) if !decoded.is_empty() => decoded,
        _ => raw.as_bytes().to_vec(),
    };

    if input.len() < 32 {
        return Err(SecretError::MasterKeyTooShort);
    }
    Ok(input)
}

/// Derived-key cache: one derivation per salt per store handle.
struct DerivedKey {
    salt: [u8; SALT_LEN],
    key: [u8; 32],
}

/// Encrypted key→value store bound to one file.
pub struct SecretStore {
    path: PathBuf,
    master_key: Vec<u8>,
    derived: Mutex<Option<DerivedKey>>,
}

impl SecretStore {
    /// Bind a store to a path with the given master key. The file is
    /// created lazily on the first write.
    pub fn new(path: impl Into<PathBuf>, master_key: Vec<u8>) -> Result<Self, SecretError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(SecretError::EmptyPath);
        }
        if master_key.is_empty() {
            return Err(SecretError::MissingMasterKey);
        }
        Ok(Self {
            path,
            master_key,
            derived: Mutex::new(None),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a `secret://<key>` reference to its plaintext value.
    pub fn resolve(&self, reference: &str) -> Result<String, SecretError> {
        let key =
            parse_secret_ref(reference).ok_or_else(|| SecretError::InvalidRef(reference.into()))?;
        let secrets = self.load_all()?;
        secrets
            .get(key)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(key.to_string()))
    }

    /// Store a value under a key, creating or replacing it.
    pub fn set(&self, key: &str, value: &str) -> Result<(), SecretError> {
        let key = validate_key(key)?;
        if value.len() > MAX_SECRET_SIZE {
            return Err(SecretError::ValueTooLarge);
        }
        let mut secrets = self.load_all()?;
        secrets.insert(key.to_string(), value.to_string());
        self.save_all(&secrets)
    }

    /// Delete a key, reporting whether it existed.
    pub fn delete(&self, key: &str) -> Result<bool, SecretError> {
        let key = validate_key(key)?;
        let mut secrets = self.load_all()?;
        if secrets.remove(key).is_none() {
            return Ok(false);
        }
        self.save_all(&secrets)?;
        Ok(true)
    }

    /// All keys in lexicographic order.
    pub fn list_keys(&self) -> Result<Vec<String>, SecretError> {
        Ok(self.load_all()?.into_keys().collect())
    }

    fn load_all(&self) -> Result<BTreeMap<String, String>, SecretError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(SecretError::Io(e)),
        };
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(BTreeMap::new());
        }

        let envelope: Envelope =
            serde_json::from_slice(&data).map_err(|e| SecretError::Parse(e.to_string()))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(SecretError::UnsupportedVersion(envelope.version));
        }

        let salt = decode_field(&envelope.salt, "salt")?;
        let salt: [u8; SALT_LEN] = salt
            .try_into()
            .map_err(|_| SecretError::Parse("salt has wrong length".to_string()))?;
        let nonce = decode_field(&envelope.nonce, "nonce")?;
        let ciphertext = decode_field(&envelope.ciphertext, "ciphertext")?;

        let key = self.derive_key(salt)?;
        let cipher =
            Aes256Gcm::new_from_slice(&key).map_err(|_| SecretError::DecryptFailed)?;
        if nonce.len() != NONCE_LEN {
            return Err(SecretError::Parse("nonce has wrong length".to_string()));
        }
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| SecretError::DecryptFailed)?;

        if plaintext.is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&plaintext).map_err(|e| SecretError::Parse(e.to_string()))
    }

    fn save_all(&self, secrets: &BTreeMap<String, String>) -> Result<(), SecretError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                create_private_dir(parent)?;
            }
        }

        let plaintext =
            serde_json::to_vec(secrets).map_err(|e| SecretError::Parse(e.to_string()))?;

        let salt = self.current_salt()?;
        let key = self.derive_key(salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| SecretError::EncryptFailed)?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| SecretError::EncryptFailed)?;

        let envelope = Envelope {
            version: ENVELOPE_VERSION,
            salt: BASE64.encode(salt),
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
        };
        let encoded =
            serde_json::to_vec(&envelope).map_err(|e| SecretError::Parse(e.to_string()))?;

        write_private_atomic(&self.path, &encoded)
    }

    /// Salt for the next write: the one already on disk if the store
    /// exists, otherwise a fresh random salt.
    fn current_salt(&self) -> Result<[u8; SALT_LEN], SecretError> {
        if let Some(derived) = &*self.derived.lock() {
            return Ok(derived.salt);
        }
        if self.path.exists() {
            // Populate the cache from the envelope on disk.
            self.load_all()?;
            if let Some(derived) = &*self.derived.lock() {
                return Ok(derived.salt);
            }
        }
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        Ok(salt)
    }

    /// Argon2id (1 pass, 64 MiB, 4 lanes, 32-byte output), cached per
    /// salt so repeated loads don't redo the memory-hard work.
    fn derive_key(&self, salt: [u8; SALT_LEN]) -> Result<[u8; 32], SecretError> {
        {
            let cached = self.derived.lock();
            if let Some(derived) = &*cached {
                if derived.salt == salt {
                    return Ok(derived.key);
                }
            }
        }

        let params = argon2::Params::new(64 * 1024, 1, 4, Some(32))
            .map_err(|e| SecretError::Kdf(e.to_string()))?;
        let argon = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
        let mut key = [0u8; 32];
        argon
            .hash_password_into(&self.master_key, &salt, &mut key)
            .map_err(|e| SecretError::Kdf(e.to_string()))?;

        *self.derived.lock() = Some(DerivedKey { salt, key });
        Ok(key)
    }
}

fn decode_field(value: &str, name: &str) -> Result<Vec<u8>, SecretError> {
    BASE64
        .decode(value)
        .map_err(|e| SecretError::Parse(format!("failed to decode {name}: {e}")))
}

fn validate_key(key: &str) -> Result<&str, SecretError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(SecretError::EmptyKey);
    }
    if key.contains("..") {
        return Err(SecretError::KeyTraversal);
    }
    if key.starts_with('/') {
        return Err(SecretError::KeyAbsolute);
    }
    Ok(key)
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<(), SecretError> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<(), SecretError> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Write via temp file + rename so readers never observe a torn store.
fn write_private_atomic(path: &Path, data: &[u8]) -> Result<(), SecretError> {
    let tmp = path.with_extension("tmp");
    {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp)?;
        io::Write::write_all(&mut file, data)?;
        file.sync_all()?;
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(SecretError::Io(e));
    }
    Ok(())
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;

//! Durable credential storage with legacy-key compatibility
//!
//! Every value is written under one primary key and mirrored to a fixed list
//! of legacy keys. Reads try the primary key first, then the legacy keys in
//! order. Storage failures are logged and swallowed: a failed write leaves the
//! previous state, a failed read reports the value as absent.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use papaya::HashMap;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::StorageError;
use crate::types::{expires_at, AuthTokens, Credentials};

/// String key/value persistence medium
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Thread-safe in-memory storage using Papaya HashMap
///
/// Clones share the same map.
#[derive(Clone)]
pub struct MemoryStorage {
    items: Arc<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            items: Arc::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.pin().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.pin().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.pin().remove(key);
        Ok(())
    }
}

/// Storage persisted as a single JSON object file
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(items)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut items = self.load()?;
        items.insert(key.to_string(), value.to_string());
        self.save(&items)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut items = self.load()?;
        if items.remove(key).is_some() {
            self.save(&items)?;
        }
        Ok(())
    }
}

/// Credential slots managed by the token store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    AccessToken,
    RefreshToken,
    Expiry,
}

impl TokenKind {
    pub const ALL: [TokenKind; 3] = [Self::AccessToken, Self::RefreshToken, Self::Expiry];

    pub fn primary_key(self) -> &'static str {
        match self {
            Self::AccessToken => "accessToken",
            Self::RefreshToken => "refreshToken",
            Self::Expiry => "tokenExpiry",
        }
    }

    pub fn legacy_keys(self) -> &'static [&'static str] {
        match self {
            Self::AccessToken => &["auth_token", "access_token"],
            Self::RefreshToken => &["refresh_token"],
            Self::Expiry => &["token_expiry"],
        }
    }

    fn keys(self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.primary_key()).chain(self.legacy_keys().iter().copied())
    }
}

/// Credential store over a [`KeyValueStorage`]
///
/// Cheap to clone; clones share the same medium.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
    clock: Arc<dyn Clock>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// In-memory store on the system clock
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), Arc::new(SystemClock))
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Write `value` under the primary key and every legacy key
    pub fn set(&self, kind: TokenKind, value: &str) {
        for key in kind.keys() {
            if let Err(e) = self.storage.set_item(key, value) {
                error!(key = %key, error = %e, "Failed to write credential");
            }
        }
        debug!(kind = ?kind, "Credential stored");
    }

    /// First non-empty value from the primary key, then legacy keys in order
    pub fn get(&self, kind: TokenKind) -> Option<String> {
        for key in kind.keys() {
            match self.storage.get_item(key) {
                Ok(Some(value)) if !value.is_empty() => return Some(value),
                Ok(_) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to read credential");
                    return None;
                }
            }
        }
        None
    }

    /// Remove the value from the primary key and every legacy key
    pub fn clear(&self, kind: TokenKind) {
        for key in kind.keys() {
            if let Err(e) = self.storage.remove_item(key) {
                error!(key = %key, error = %e, "Failed to remove credential");
            }
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.get(TokenKind::AccessToken)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get(TokenKind::RefreshToken)
    }

    /// Recorded expiry in epoch ms; unparseable values count as absent
    pub fn expires_at_ms(&self) -> Option<i64> {
        let raw = self.get(TokenKind::Expiry)?;
        match raw.trim().parse::<i64>() {
            Ok(ms) => Some(ms),
            Err(_) => {
                warn!(value = %raw, "Ignoring unparseable token expiry");
                None
            }
        }
    }

    pub fn set_expires_at_ms(&self, expires_at_ms: i64) {
        self.set(TokenKind::Expiry, &expires_at_ms.to_string());
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
            expires_at_ms: self.expires_at_ms(),
        }
    }

    /// True iff an access token is present and not past its expiry
    pub fn is_valid(&self) -> bool {
        self.credentials().is_valid_at(self.clock.now_millis())
    }

    /// Replace stored credentials; absent fields are cleared
    pub fn store_credentials(&self, credentials: &Credentials) {
        match &credentials.access_token {
            Some(token) => self.set(TokenKind::AccessToken, token),
            None => self.clear(TokenKind::AccessToken),
        }
        match &credentials.refresh_token {
            Some(token) => self.set(TokenKind::RefreshToken, token),
            None => self.clear(TokenKind::RefreshToken),
        }
        match credentials.expires_at_ms {
            Some(ms) => self.set_expires_at_ms(ms),
            None => self.clear(TokenKind::Expiry),
        }
    }

    /// Persist tokens from a refresh. Only fields the server returned are
    /// overwritten; a refresh without `expiresIn` drops the old expiry.
    pub fn store_refreshed(&self, tokens: &AuthTokens) {
        self.set(TokenKind::AccessToken, &tokens.access_token);
        if let Some(refresh) = &tokens.refresh_token {
            self.set(TokenKind::RefreshToken, refresh);
        }
        match tokens.expires_in {
            Some(secs) => self.set_expires_at_ms(expires_at(self.clock.now_millis(), secs)),
            None => self.clear(TokenKind::Expiry),
        }
        info!("Access token refreshed");
    }

    /// Remove every credential (logout or terminal refresh failure)
    pub fn clear_all(&self) {
        for kind in TokenKind::ALL {
            self.clear(kind);
        }
        info!("Credentials cleared");
    }

    /// Copy values that exist only under legacy keys into the primary key.
    /// Returns how many kinds were migrated.
    pub fn migrate_legacy(&self) -> usize {
        let mut migrated = 0;
        for kind in TokenKind::ALL {
            let primary = match self.storage.get_item(kind.primary_key()) {
                Ok(value) => value.filter(|v| !v.is_empty()),
                Err(e) => {
                    warn!(key = %kind.primary_key(), error = %e, "Skipping legacy migration");
                    continue;
                }
            };
            if primary.is_some() {
                continue;
            }
            if let Some(value) = self.get(kind) {
                self.set(kind, &value);
                migrated += 1;
            }
        }
        if migrated > 0 {
            info!(migrated, "Migrated legacy credential keys");
        }
        migrated
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

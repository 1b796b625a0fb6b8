/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Credential caching
//!
//! Temporary credentials are persisted between invocations so that an MFA code is only needed
//! once per session. Each cache entry is keyed by a file name derived from the profile name and
//! holds a [`CachedCredentials`] serialized as JSON.
//!
//! [`CredentialCache`] implements the lifecycle shared by every caching provider: load the
//! persisted entry, check its expiration, refresh and persist when needed, and hand back the
//! current value. Store failures never fail a retrieval; an unreadable entry is a cache miss and
//! an unwritable one is skipped.

use crate::profile::config_file_path;
use crate::provider::CredentialsError;
use aws_runas_types::os_shim_internal::{Env, Fs};
use aws_runas_types::Credentials;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fmt::Debug;
use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::Level;

pub(crate) const SESSION_TOKEN_CACHE_PREFIX: &str = ".aws_session_token_";
pub(crate) const ASSUME_ROLE_CACHE_PREFIX: &str = ".aws_assume_role_";

/// Cache key for `profile`: `prefix` followed by the profile name, or just `prefix` for the
/// default profile
pub(crate) fn cache_key(prefix: &str, profile: &str) -> String {
    if profile.is_empty() || profile == crate::profile::DEFAULT_PROFILE {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, profile)
    }
}

/// Cached files live next to the config file
pub fn cache_dir(env: &Env) -> PathBuf {
    config_file_path(env)
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default()
}

/// A credential together with the instant it expires, as persisted in the cache
///
/// The default value has an expiration of the unix epoch and therefore is always expired; it
/// stands in for "nothing loaded yet".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredentials {
    /// Expiration in seconds since the unix epoch
    #[serde(rename = "Expiration", default)]
    pub expiration: i64,
    #[serde(rename = "Value")]
    pub value: CredentialValue,
}

/// The value fields of a cached credential
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialValue {
    #[serde(rename = "AccessKeyID")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "SessionToken", default)]
    pub session_token: String,
    #[serde(rename = "ProviderName", default)]
    pub provider_name: String,
}

impl Debug for CredentialValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialValue")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("provider_name", &self.provider_name)
            .finish()
    }
}

impl CachedCredentials {
    pub fn new(credentials: &Credentials, expiration: SystemTime) -> Self {
        let expiration = expiration
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        CachedCredentials {
            expiration,
            value: CredentialValue {
                access_key_id: credentials.access_key_id().to_string(),
                secret_access_key: credentials.secret_access_key().to_string(),
                session_token: credentials.session_token().unwrap_or_default().to_string(),
                provider_name: credentials.provider_name().to_string(),
            },
        }
    }

    pub fn expiration_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.expiration.max(0) as u64)
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expiration_time()
    }

    pub fn credentials(&self) -> Credentials {
        let session_token = Some(self.value.session_token.clone()).filter(|t| !t.is_empty());
        Credentials::new(
            self.value.access_key_id.clone(),
            self.value.secret_access_key.clone(),
            session_token,
            Some(self.expiration_time()),
            self.value.provider_name.clone(),
        )
    }
}

/// Durable key-value persistence for [`CachedCredentials`]
pub trait CredentialStore: Send + Sync + Debug {
    /// Load the entry for `key`; `Ok(None)` when there is no entry
    fn load(&self, key: &str) -> Result<Option<CachedCredentials>, CacheError>;

    /// Replace the entry for `key`
    fn store(&self, key: &str, credentials: &CachedCredentials) -> Result<(), CacheError>;
}

/// Stores each entry as a JSON file named after its key
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    fs: Fs,
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(fs: Fs, dir: impl Into<PathBuf>) -> Self {
        FileCredentialStore {
            fs,
            dir: dir.into(),
        }
    }

    /// Path of the file backing `key`
    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, key: &str) -> Result<Option<CachedCredentials>, CacheError> {
        let path = self.path(key);
        let data = match self.fs.read_to_end(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CacheError::Io { path, source: err }),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|err| CacheError::Decode { path, source: err })
    }

    fn store(&self, key: &str, credentials: &CachedCredentials) -> Result<(), CacheError> {
        let path = self.path(key);
        let data = serde_json::to_vec(credentials).map_err(|err| CacheError::Encode {
            path: path.clone(),
            source: err,
        })?;
        self.fs
            .write(&path, data)
            .map_err(|err| CacheError::Io { path, source: err })
    }
}

/// A credential store could not be read or written
#[derive(Debug)]
#[non_exhaustive]
pub enum CacheError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
    Other(aws_runas_types::BoxError),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io { path, .. } => write!(f, "could not access {}", path.display()),
            CacheError::Decode { path, .. } => {
                write!(f, "{} does not hold cached credentials", path.display())
            }
            CacheError::Encode { path, .. } => {
                write!(f, "could not encode credentials for {}", path.display())
            }
            CacheError::Other(err) => write!(f, "credential store failure: {}", err),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CacheError::Io { source, .. } => Some(source),
            CacheError::Decode { source, .. } | CacheError::Encode { source, .. } => Some(source),
            CacheError::Other(err) => Some(err.as_ref() as _),
        }
    }
}

fn format_expiration(expiration: SystemTime) -> String {
    OffsetDateTime::from(expiration)
        .format(&Rfc3339)
        .unwrap_or_else(|_| format!("{:?}", expiration))
}

type RefreshLock = Arc<tokio::sync::Mutex<()>>;

/// One refresh lock per cache key, shared by every cache in the process
static REFRESH_LOCKS: Lazy<Mutex<HashMap<String, RefreshLock>>> = Lazy::new(Default::default);

fn refresh_lock(key: &str) -> RefreshLock {
    let mut locks = REFRESH_LOCKS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    locks.entry(key.to_string()).or_default().clone()
}

/// Load-check-refresh-persist lifecycle for one cache entry
///
/// Retrievals are serialized per cache key across the whole process, so providers built
/// separately for the same profile still have at most one refresh in flight between them.
#[derive(Debug)]
pub(crate) struct CredentialCache {
    store: Arc<dyn CredentialStore>,
    key: String,
    current: RwLock<CachedCredentials>,
    refresh: RefreshLock,
    log_level: Level,
}

impl CredentialCache {
    pub(crate) fn new(store: Arc<dyn CredentialStore>, key: String, log_level: Level) -> Self {
        CredentialCache {
            store,
            refresh: refresh_lock(&key),
            key,
            current: RwLock::new(CachedCredentials::default()),
            log_level,
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn expiration_time(&self) -> SystemTime {
        self.read().expiration_time()
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.read().is_expired()
    }

    #[cfg(test)]
    pub(crate) fn set_expiration(&self, expiration: SystemTime) {
        self.write().expiration = expiration
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
    }

    fn verbose(&self) -> bool {
        self.log_level >= Level::DEBUG
    }

    /// Return the current credentials, calling `refresh` when they are expired or missing
    ///
    /// Refreshed credentials expire `duration` from now and replace the stored entry.
    pub(crate) async fn retrieve<F, Fut>(
        &self,
        duration: Duration,
        refresh: F,
    ) -> Result<Credentials, CredentialsError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Credentials, CredentialsError>> + Send,
    {
        let _guard = self.refresh.lock().await;

        match self.store.load(&self.key) {
            Ok(Some(cached)) => {
                if self.verbose() {
                    tracing::debug!(key = %self.key, expiration = %format_expiration(cached.expiration_time()), "loaded cached credentials");
                }
                *self.write() = cached;
            }
            Ok(None) => {
                if self.verbose() {
                    tracing::debug!(key = %self.key, "no cached credentials");
                }
            }
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "ignoring unreadable cached credentials")
            }
        }

        if self.is_expired() {
            if self.verbose() {
                tracing::debug!(key = %self.key, "detected expired or unset credentials, refreshing");
            }
            let fresh = refresh().await?;
            let cached = CachedCredentials::new(&fresh, SystemTime::now() + duration);
            if let Err(err) = self.store.store(&self.key, &cached) {
                tracing::warn!(key = %self.key, error = %err, "failed to persist refreshed credentials");
            } else if self.verbose() {
                tracing::debug!(key = %self.key, expiration = %format_expiration(cached.expiration_time()), "persisted refreshed credentials");
            }
            *self.write() = cached;
        }

        let credentials = self.read().credentials();
        Ok(credentials)
    }

    fn read(&self) -> RwLockReadGuard<'_, CachedCredentials> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CachedCredentials> {
        self.current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

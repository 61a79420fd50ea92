// src/credentials.rs ----------------------------------------------------------
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::AuthError;

/// Tokens that lapse within this window are refreshed early.
const EXPIRY_SKEW_SECS: i64 = 60;

// -----------------------------------------------------------------------------
// record
/// The persisted authorization record.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct Credential {
    pub token:         String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_uri:     String,
    #[serde(default)]
    pub client_id:     String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub scopes:        Vec<String>,
    #[serde(default)]
    pub expiry:        Option<DateTime<Utc>>,
}

impl Credential {
    /// No expiry on record counts as unexpired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= now + Duration::seconds(EXPIRY_SKEW_SECS),
            None         => false,
        }
    }

    pub fn covers(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }
}

// -----------------------------------------------------------------------------
// state machine
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialState {
    Missing,
    Expired(Credential),
    Valid(Credential),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Reuse,
    Refresh,
    Consent,
}

impl CredentialState {
    /// A record lacking required scopes is `Missing`: refreshing cannot widen it.
    pub fn classify(
        stored: Option<Credential>,
        required: &[String],
        now: DateTime<Utc>,
    ) -> Self {
        match stored {
            None                            => Self::Missing,
            Some(c) if c.token.is_empty()   => Self::Missing,
            Some(c) if !c.covers(required)  => Self::Missing,
            Some(c) if c.is_expired(now)    => Self::Expired(c),
            Some(c)                         => Self::Valid(c),
        }
    }

    pub fn transition(&self) -> Transition {
        match self {
            Self::Valid(_) => Transition::Reuse,
            Self::Expired(c) if c.refresh_token.is_some() => Transition::Refresh,
            Self::Expired(_) | Self::Missing => Transition::Consent,
        }
    }
}

// -----------------------------------------------------------------------------
// persistence
/// Single JSON record on disk, overwritten wholesale.
#[derive(Debug, Clone)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A corrupt record is reported and treated as absent.
    pub async fn load(&self) -> Result<Option<Credential>, AuthError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::Storage(e)),
        };
        match serde_json::from_str(&raw) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable credential record");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(AuthError::Storage)?;
        }
        let json = serde_json::to_vec_pretty(credential)?;
        tokio::fs::write(&self.path, json).await.map_err(AuthError::Storage)
    }
}

// -----------------------------------------------------------------------------
// store
/// The network half of the lifecycle: silent refresh and interactive consent.
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError>;
    async fn consent(&self, scopes: &[String]) -> Result<Credential, AuthError>;
}

pub struct CredentialStore {
    file:   CredentialFile,
    flow:   Arc<dyn OAuthFlow>,
    scopes: Vec<String>,
    // one refresh/rewrite at a time
    lock:   Mutex<()>,
}

impl CredentialStore {
    pub fn new(file: CredentialFile, flow: Arc<dyn OAuthFlow>, scopes: Vec<String>) -> Self {
        Self {
            file,
            flow,
            scopes,
            lock: Mutex::new(()),
        }
    }

    pub async fn obtain(&self) -> Result<Credential, AuthError> {
        let _guard = self.lock.lock().await;

        let stored = self.file.load().await?;
        let state  = CredentialState::classify(stored, &self.scopes, Utc::now());

        let fresh = match (state.transition(), state) {
            (Transition::Reuse, CredentialState::Valid(c)) => return Ok(c),
            (Transition::Refresh, CredentialState::Expired(c)) => {
                match self.flow.refresh(&c).await {
                    Ok(refreshed) => {
                        tracing::info!("refreshed expired credential");
                        refreshed
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "refresh failed, falling back to consent");
                        self.flow.consent(&self.scopes).await?
                    }
                }
            }
            _ => self.flow.consent(&self.scopes).await?,
        };

        self.file.save(&fresh).await?;
        tracing::info!(path = %self.file.path().display(), "credential persisted");
        Ok(fresh)
    }
}

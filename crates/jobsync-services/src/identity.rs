//! Identity provider seam.
//!
//! The engine only needs the signed-in user's id; sign-in and sign-out live
//! here so the CLI can drive a complete shift.

use async_trait::async_trait;
use jobsync_core::{SyncError, SyncResult};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    pub uid: String,
    pub email: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserIdentity>;

    async fn sign_in(&self, email: &str, password: &str) -> SyncResult<UserIdentity>;

    async fn sign_out(&self) -> SyncResult<()>;

    /// Observe sign-in state changes.
    fn watch(&self) -> watch::Receiver<Option<UserIdentity>>;
}

struct Credential {
    uid: String,
    digest: String,
}

fn password_digest(email: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// In-process credential table. Passwords are kept as salted SHA-256 digests.
pub struct LocalIdentityProvider {
    credentials: Mutex<HashMap<String, Credential>>,
    current: watch::Sender<Option<UserIdentity>>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            credentials: Mutex::new(HashMap::new()),
            current,
        }
    }

    /// Register an account and return its generated uid.
    pub fn register(&self, email: &str, password: &str) -> SyncResult<String> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(SyncError::AuthFailed(
                "email and password are required".to_string(),
            ));
        }
        let mut credentials = self
            .credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if credentials.contains_key(&email) {
            return Err(SyncError::AuthFailed(format!(
                "an account already exists for {}",
                email
            )));
        }
        let uid = Uuid::new_v4().simple().to_string();
        credentials.insert(
            email.clone(),
            Credential {
                uid: uid.clone(),
                digest: password_digest(&email, password),
            },
        );
        Ok(uid)
    }
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    fn current_user(&self) -> Option<UserIdentity> {
        self.current.borrow().clone()
    }

    async fn sign_in(&self, email: &str, password: &str) -> SyncResult<UserIdentity> {
        let email = normalize_email(email);
        let uid = {
            let credentials = self
                .credentials
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match credentials.get(&email) {
                Some(c) if c.digest == password_digest(&email, password) => c.uid.clone(),
                _ => {
                    tracing::warn!(email = %email, "Sign in rejected");
                    return Err(SyncError::AuthFailed("Sign in failed.".to_string()));
                }
            }
        };

        let identity = UserIdentity { uid, email };
        self.current.send_replace(Some(identity.clone()));
        tracing::info!(uid = %identity.uid, "Signed in");
        Ok(identity)
    }

    async fn sign_out(&self) -> SyncResult<()> {
        if let Some(previous) = self.current.send_replace(None) {
            tracing::info!(uid = %previous.uid, "Signed out");
        }
        Ok(())
    }

    fn watch(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.current.subscribe()
    }
}

//! Observable sign-in state.
//!
//! One store per app. Subscribers are notified on the calling thread after
//! the state change is visible, so a listener may read the store again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::roles::Role;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Auth state lock poisoned")]
    LockPoisoned,
}

/// A signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    /// Bearer token for the backend
    #[serde(skip_serializing)]
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    Initialized { signed_in: bool },
    SignedIn { user_id: String, role: Role },
    SignedOut,
}

/// Handle returned by [`AuthStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

#[derive(Default)]
pub struct AuthStore {
    session: RwLock<Option<AuthSession>>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
    initialized: AtomicBool,
}

impl AuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a persisted session. Only the first call has an effect.
    pub fn init(&self, restored: Option<AuthSession>) -> Result<bool, AuthError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        let signed_in = restored.is_some();
        *self.session.write().map_err(|_| AuthError::LockPoisoned)? = restored;
        debug!(signed_in, "Auth store initialized");
        self.notify(&AuthEvent::Initialized { signed_in })?;
        Ok(true)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn subscribe<F>(&self, listener: F) -> Result<SubscriptionId, AuthError>
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .map_err(|_| AuthError::LockPoisoned)?
            .push((id, Arc::new(listener)));
        Ok(id)
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, AuthError> {
        let mut listeners = self.listeners.lock().map_err(|_| AuthError::LockPoisoned)?;
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        Ok(listeners.len() != before)
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn sign_in(&self, session: AuthSession) -> Result<(), AuthError> {
        if session.user_id.trim().is_empty() {
            return Err(AuthError::InvalidSession("user_id is empty".into()));
        }
        if session.access_token.is_empty() {
            return Err(AuthError::InvalidSession("access token is empty".into()));
        }

        let event = AuthEvent::SignedIn {
            user_id: session.user_id.clone(),
            role: session.role,
        };
        info!(user_id = %session.user_id, role = %session.role, "Signed in");
        *self.session.write().map_err(|_| AuthError::LockPoisoned)? = Some(session);
        self.initialized.store(true, Ordering::SeqCst);
        self.notify(&event)
    }

    /// Clear the session, tell subscribers, then drop every subscription.
    pub fn sign_out(&self) -> Result<(), AuthError> {
        *self.session.write().map_err(|_| AuthError::LockPoisoned)? = None;
        self.notify(&AuthEvent::SignedOut)?;
        self.listeners
            .lock()
            .map_err(|_| AuthError::LockPoisoned)?
            .clear();
        info!("Signed out");
        Ok(())
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.session.read().ok().and_then(|s| s.clone())
    }

    /// Landing route for the signed-in user.
    pub fn dashboard_route(&self) -> Option<&'static str> {
        self.current().map(|s| s.role.dashboard_route())
    }

    fn notify(&self, event: &AuthEvent) -> Result<(), AuthError> {
        // Snapshot so listeners can subscribe or read without deadlocking
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .map_err(|_| AuthError::LockPoisoned)?
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
        Ok(())
    }
}

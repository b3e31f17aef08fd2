//! Identity provider abstraction.
//!
//! An [`IdentityProvider`] creates [`IdentityApp`] handles. An app tracks one
//! signed-in user at a time, mints bearer id tokens for that user, and tells
//! registered listeners whenever the user changes.

use crate::error::IdentityResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tonio_core::IdentityConfig;

/// The user currently signed in to an [`IdentityApp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityUser {
    pub uid: String,
    pub email: Option<String>,
}

/// Callback for auth state transitions. Receives the new current user.
pub type AuthStateListener = Arc<dyn Fn(Option<&IdentityUser>) + Send + Sync>;

/// Handle for removing a registered [`AuthStateListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Factory for identity app instances.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn initialize_app(&self, config: &IdentityConfig) -> IdentityResult<Arc<dyn IdentityApp>>;
}

/// A live identity app bound to one project configuration.
#[async_trait]
pub trait IdentityApp: Send + Sync {
    fn current_user(&self) -> Option<IdentityUser>;

    async fn sign_in_with_credentials(&self, email: &str, password: &str) -> IdentityResult<()>;

    async fn sign_out(&self) -> IdentityResult<()>;

    /// Bearer token for the current user. A cached token is returned unless
    /// it is close to expiry or `force_refresh` is set.
    async fn get_id_token(&self, force_refresh: bool) -> IdentityResult<String>;

    /// Register a listener. It is invoked once right away with the current
    /// user, then on every sign-in and sign-out. Fails once the app is
    /// deleted.
    fn on_auth_state_changed(&self, listener: AuthStateListener) -> IdentityResult<ListenerId>;

    /// Returns false when the id was not registered.
    fn remove_auth_state_listener(&self, id: ListenerId) -> bool;

    /// Tear the app down. Listeners are dropped and the session is cleared.
    async fn delete(&self) -> IdentityResult<()>;
}

/// Listener bookkeeping shared by [`IdentityApp`] implementations.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, AuthStateListener)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: AuthStateListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener with `user`. Listeners run outside the lock,
    /// so they may register or remove listeners themselves.
    pub fn notify(&self, user: Option<&IdentityUser>) {
        let snapshot: Vec<AuthStateListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in snapshot {
            listener(user);
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

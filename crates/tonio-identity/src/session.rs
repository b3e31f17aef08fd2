//! Session State: whether the client is initialized, and the identity app
//! handle that exists only while it is.

use crate::provider::{IdentityApp, IdentityProvider, IdentityUser, ListenerId};
use crate::session_fsm::{SessionInput, SessionMachine, SessionPhase};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tonio_core::{ClientError, ErrorKind, Failure, IdentityConfig};
use tracing::debug;

/// Derived view of the signed-in user. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub signed_in: bool,
    pub current_user_email: Option<String>,
}

struct SessionInner {
    machine: SessionMachine,
    app: Option<Arc<dyn IdentityApp>>,
    subscriptions: Vec<ListenerId>,
}

/// Owns the identity app handle and the lifecycle state machine.
///
/// The handle is `Some` exactly while the machine is `Initialized`.
pub struct SessionState {
    inner: Arc<Mutex<SessionInner>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                machine: SessionMachine::new(),
                app: None,
                subscriptions: Vec::new(),
            })),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().machine.state().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.phase() == SessionPhase::Initialized
    }

    pub fn app(&self) -> Option<Arc<dyn IdentityApp>> {
        self.inner.lock().app.clone()
    }

    /// The app handle, or the "not initialized" error.
    pub fn require_app(&self) -> Result<Arc<dyn IdentityApp>, ClientError> {
        self.app().ok_or_else(ClientError::not_initialized)
    }

    pub fn current_user(&self) -> Option<IdentityUser> {
        self.app().and_then(|app| app.current_user())
    }

    pub fn is_signed_in(&self) -> bool {
        self.current_user().is_some()
    }

    pub fn current_user_email(&self) -> Option<String> {
        self.current_user().and_then(|user| user.email)
    }

    pub fn auth_state(&self) -> AuthState {
        let user = self.current_user();
        AuthState {
            signed_in: user.is_some(),
            current_user_email: user.and_then(|user| user.email),
        }
    }

    /// Create the identity app and move to `Initialized`.
    pub async fn initialize(
        &self,
        provider: &dyn IdentityProvider,
        config: &IdentityConfig,
    ) -> Result<(), Failure> {
        if self.is_initialized() {
            return Err(ClientError::already_initialized().into());
        }

        let app = provider.initialize_app(config).await?;

        let mut inner = self.inner.lock();
        inner
            .machine
            .consume(&SessionInput::Initialize)
            .map_err(|_| ClientError::already_initialized())?;
        inner.app = Some(app);
        debug!("Session initialized");
        Ok(())
    }

    /// Delete the identity app, drop subscriptions and move back to
    /// `Uninitialized`. When deletion fails the session stays initialized.
    pub async fn destroy(&self) -> Result<(), Failure> {
        let app = self.app().ok_or_else(|| {
            ClientError::new(
                ErrorKind::NotInitialized,
                "Can't destroy not initialized Tonio client.",
            )
            .with_supplementary("You haven't initialized Tonio.")
        })?;

        app.delete().await?;

        let subscriptions = {
            let mut inner = self.inner.lock();
            inner.app = None;
            // Only fails if a concurrent destroy already won.
            let _ = inner.machine.consume(&SessionInput::Destroy);
            std::mem::take(&mut inner.subscriptions)
        };
        for id in subscriptions {
            app.remove_auth_state_listener(id);
        }
        debug!("Session destroyed");
        Ok(())
    }

    /// Register `callback` for auth state changes. It runs once right away
    /// with the current state.
    pub fn subscribe_auth_changes<F>(&self, callback: F) -> Result<AuthSubscription, Failure>
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let app = self.require_app()?;
        let id = app.on_auth_state_changed(Arc::new(move |user: Option<&IdentityUser>| {
            callback(user.is_some())
        }))?;

        self.inner.lock().subscriptions.push(id);
        Ok(AuthSubscription {
            id,
            app: Arc::downgrade(&app),
            session: Arc::downgrade(&self.inner),
        })
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SessionState")
            .field("phase", inner.machine.state())
            .field("subscriptions", &inner.subscriptions.len())
            .finish()
    }
}

/// Handle to an auth state subscription. Dropping it keeps the
/// subscription alive; call [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Clone)]
pub struct AuthSubscription {
    id: ListenerId,
    app: Weak<dyn IdentityApp>,
    session: Weak<Mutex<SessionInner>>,
}

impl AuthSubscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Returns false when the subscription was already gone, for example
    /// after the client was destroyed.
    pub fn unsubscribe(self) -> bool {
        let Some(app) = self.app.upgrade() else {
            return false;
        };

        if let Some(session) = self.session.upgrade() {
            let mut inner = session.lock();
            // Ids are per app; leave a newer app's bookkeeping alone.
            if inner.app.as_ref().is_some_and(|current| Arc::ptr_eq(current, &app)) {
                inner.subscriptions.retain(|id| *id != self.id);
            }
        }
        app.remove_auth_state_listener(self.id)
    }
}

impl std::fmt::Debug for AuthSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSubscription").field("id", &self.id).finish()
    }
}

//! Identity provider backed by the Firebase Identity Toolkit REST API.
//!
//! Password sign-in goes through `accounts:signInWithPassword`; id tokens
//! are refreshed through the Secure Token `token` endpoint.

use crate::error::{IdentityError, IdentityResult};
use crate::provider::{
    AuthStateListener, IdentityApp, IdentityProvider, IdentityUser, ListenerId, ListenerRegistry,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tonio_core::IdentityConfig;
use tracing::{debug, info, warn};

/// Cached tokens are refreshed once they are this close to expiry.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// Lifetime assumed when the provider omits `expiresIn`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Creates [`FirebaseApp`]s sharing one HTTP connection pool.
#[derive(Clone, Default)]
pub struct FirebaseIdentityProvider {
    http_client: reqwest::Client,
}

impl FirebaseIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn initialize_app(&self, config: &IdentityConfig) -> IdentityResult<Arc<dyn IdentityApp>> {
        if config.api_key.trim().is_empty() {
            return Err(IdentityError::Config("api_key is not set".to_string()));
        }

        debug!(auth_url = %config.auth_url, "Initializing identity app");
        Ok(Arc::new(FirebaseApp::new(
            self.http_client.clone(),
            config.clone(),
        )))
    }
}

#[derive(Debug, Clone)]
struct UserSession {
    user: IdentityUser,
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl UserSession {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now > Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<Value>,
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    user_id: Option<String>,
}

/// `expiresIn` arrives as a decimal string; accept plain numbers too.
fn lifetime_secs(expires_in: Option<&Value>) -> i64 {
    match expires_in {
        Some(Value::String(raw)) => raw.trim().parse().unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
        Some(Value::Number(n)) => n.as_i64().unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
        _ => DEFAULT_TOKEN_LIFETIME_SECS,
    }
}

/// A signed-in (or not) Firebase project handle.
pub struct FirebaseApp {
    http_client: reqwest::Client,
    config: IdentityConfig,
    session: RwLock<Option<UserSession>>,
    listeners: ListenerRegistry,
    deleted: AtomicBool,
}

impl FirebaseApp {
    fn new(http_client: reqwest::Client, config: IdentityConfig) -> Self {
        Self {
            http_client,
            config,
            session: RwLock::new(None),
            listeners: ListenerRegistry::new(),
            deleted: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> IdentityResult<()> {
        if self.deleted.load(Ordering::SeqCst) {
            return Err(IdentityError::AppDeleted);
        }
        Ok(())
    }

    fn sign_in_url(&self) -> String {
        format!(
            "{}/accounts:signInWithPassword",
            self.config.auth_url.trim_end_matches('/')
        )
    }

    fn token_url(&self) -> String {
        format!("{}/token", self.config.token_url.trim_end_matches('/'))
    }

    async fn refresh(&self, current: &UserSession) -> IdentityResult<String> {
        debug!(uid = %current.user.uid, "Refreshing id token");

        let response = self
            .http_client
            .post(self.token_url())
            .query(&[("key", self.config.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error = rejected(response).await;
            warn!(status = ?error.status(), "Id token refresh rejected");
            return Err(error);
        }

        let refreshed: RefreshResponse = response.json().await?;
        if let Some(user_id) = refreshed.user_id.as_deref() {
            if user_id != current.user.uid {
                warn!(expected = %current.user.uid, got = %user_id, "Refresh returned a different user");
            }
        }

        let expires_at = Utc::now() + Duration::seconds(lifetime_secs(refreshed.expires_in.as_ref()));

        // A sign-out may have raced the refresh; never resurrect the session.
        let mut session = self.session.write();
        if let Some(stored) = session.as_mut() {
            if stored.user.uid == current.user.uid {
                stored.id_token = refreshed.id_token.clone();
                stored.refresh_token = refreshed.refresh_token;
                stored.expires_at = expires_at;
            }
        }

        Ok(refreshed.id_token)
    }
}

/// Turn a non-success response into [`IdentityError::Rejected`], keeping the
/// JSON body when there is one.
async fn rejected(response: reqwest::Response) -> IdentityError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .ok()
        .and_then(|text| serde_json::from_str::<Value>(&text).ok());
    IdentityError::Rejected { status, body }
}

#[async_trait]
impl IdentityApp for FirebaseApp {
    fn current_user(&self) -> Option<IdentityUser> {
        if self.deleted.load(Ordering::SeqCst) {
            return None;
        }
        self.session.read().as_ref().map(|s| s.user.clone())
    }

    async fn sign_in_with_credentials(&self, email: &str, password: &str) -> IdentityResult<()> {
        self.ensure_live()?;

        let response = self
            .http_client
            .post(self.sign_in_url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&SignInRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(match rejected(response).await {
                IdentityError::Rejected { status: 400, body } => {
                    let message = body
                        .as_ref()
                        .and_then(|b| b.pointer("/error/message"))
                        .and_then(Value::as_str)
                        .unwrap_or("HTTP 400")
                        .to_string();
                    IdentityError::InvalidCredentials { message, body }
                }
                other => other,
            });
        }

        let signed_in: SignInResponse = response.json().await?;
        let user = IdentityUser {
            uid: signed_in.local_id,
            email: signed_in.email.or_else(|| Some(email.to_string())),
        };

        *self.session.write() = Some(UserSession {
            user: user.clone(),
            id_token: signed_in.id_token,
            refresh_token: signed_in.refresh_token,
            expires_at: Utc::now() + Duration::seconds(lifetime_secs(signed_in.expires_in.as_ref())),
        });

        info!(uid = %user.uid, "Signed in");
        self.listeners.notify(Some(&user));
        Ok(())
    }

    async fn sign_out(&self) -> IdentityResult<()> {
        self.ensure_live()?;

        let previous = self.session.write().take();
        if let Some(previous) = previous {
            info!(uid = %previous.user.uid, "Signed out");
            self.listeners.notify(None);
        }
        Ok(())
    }

    async fn get_id_token(&self, force_refresh: bool) -> IdentityResult<String> {
        self.ensure_live()?;

        let current = self
            .session
            .read()
            .clone()
            .ok_or(IdentityError::NoCurrentUser)?;

        if !force_refresh && current.is_fresh(Utc::now()) {
            return Ok(current.id_token);
        }

        self.refresh(&current).await
    }

    fn on_auth_state_changed(&self, listener: AuthStateListener) -> IdentityResult<ListenerId> {
        self.ensure_live()?;

        let id = self.listeners.add(listener.clone());
        // `delete` may have cleared the registry between the check and the add.
        if self.deleted.load(Ordering::SeqCst) {
            self.listeners.remove(id);
            return Err(IdentityError::AppDeleted);
        }

        let user = self.current_user();
        listener(user.as_ref());
        Ok(id)
    }

    fn remove_auth_state_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    async fn delete(&self) -> IdentityResult<()> {
        self.ensure_live()?;

        self.deleted.store(true, Ordering::SeqCst);
        self.session.write().take();
        self.listeners.clear();
        debug!("Identity app deleted");
        Ok(())
    }
}

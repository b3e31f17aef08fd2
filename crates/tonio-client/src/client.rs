//! Client Facade: the public Tonio API.
//!
//! Each operation logs its intent, checks the session preconditions, runs
//! its side effect and logs the outcome. Failures leave as [`ClientError`]:
//! errors that already carry a final message pass through unchanged, and
//! everything else is wrapped with the operation's own message.

use crate::models::{
    CaptionDelivery, CaptionPatch, Event, EventType, Interval, IntervalEnvelope,
    PerformanceEnd, PerformanceEnvelope, PerformanceStart,
};
use crate::pipeline::RequestPipeline;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tonio_core::{
    parse_level, ClientLogger, ClientResult, Config, Failure, IdentityConfig, LogSink, TracingSink,
};
use tonio_identity::{AuthState, AuthSubscription, IdentityProvider, SessionState};
use tracing::Level;

const INITIALIZE_FAILED: &str = "An error happened while initializing Tonio client.";
const DESTROY_FAILED: &str = "An error happened while destroying Tonio client.";
const SUBSCRIBE_FAILED: &str = "An error happened while adding on auth state callback.";
const SIGN_IN_FAILED: &str = "An error happened while trying signing you in.";
const SIGN_OUT_FAILED: &str = "An error happened while signing you out.";
const START_PERFORMANCE_FAILED: &str = "An error happened while starting performance.";
const END_PERFORMANCE_FAILED: &str = "An error happened while ending performance.";
const START_INTERVAL_FAILED: &str = "An error happened while starting interval.";
const END_INTERVAL_FAILED: &str = "An error happened while ending interval.";
const SEND_CAPTION_FAILED: &str = "An error happened while sending caption.";

/// Construction-time settings for [`TonioClient`].
#[derive(Clone)]
pub struct ClientOptions {
    /// Captioning service base URL. Requests fail while it is unset.
    pub service_url: Option<String>,
    pub identity: IdentityConfig,
    pub log_level: Level,
    /// `None` disables client logging.
    pub log_sink: Option<Arc<dyn LogSink>>,
}

impl ClientOptions {
    pub fn new(service_url: impl Into<String>, identity: IdentityConfig) -> Self {
        Self {
            service_url: Some(service_url.into()),
            identity,
            ..Default::default()
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            service_url: config.service_url.clone(),
            identity: config.identity.clone(),
            log_level: parse_level(&config.log_level),
            ..Default::default()
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            service_url: None,
            identity: IdentityConfig::default(),
            log_level: Level::INFO,
            log_sink: Some(Arc::new(TracingSink)),
        }
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("service_url", &self.service_url)
            .field("log_level", &self.log_level)
            .field("has_log_sink", &self.log_sink.is_some())
            .finish()
    }
}

/// Tonio captioning client.
pub struct TonioClient {
    identity_config: IdentityConfig,
    provider: Arc<dyn IdentityProvider>,
    session: SessionState,
    pipeline: RequestPipeline,
    logger: ClientLogger,
    /// Serializes initialize, destroy, sign-in and sign-out.
    lifecycle: tokio::sync::Mutex<()>,
}

impl TonioClient {
    pub fn new(options: ClientOptions, provider: Arc<dyn IdentityProvider>) -> Self {
        Self::with_pipeline(
            options.clone(),
            provider,
            RequestPipeline::new(options.service_url),
        )
    }

    /// Use a preconfigured pipeline, e.g. one sharing an HTTP client.
    pub fn with_pipeline(
        options: ClientOptions,
        provider: Arc<dyn IdentityProvider>,
        pipeline: RequestPipeline,
    ) -> Self {
        Self {
            identity_config: options.identity,
            provider,
            session: SessionState::new(),
            pipeline,
            logger: ClientLogger::new(options.log_sink, options.log_level),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn logger(&self) -> &ClientLogger {
        &self.logger
    }

    pub fn set_log_level(&self, level: Level) {
        self.logger.set_level(level);
    }

    pub fn set_log_sink(&self, sink: Option<Arc<dyn LogSink>>) {
        self.logger.set_sink(sink);
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_initialized()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_signed_in()
    }

    pub fn current_user_email(&self) -> Option<String> {
        self.session.current_user_email()
    }

    pub fn auth_state(&self) -> AuthState {
        self.session.auth_state()
    }

    /// Acquire the identity app. Must be called once before anything else.
    pub async fn initialize(&self) -> ClientResult<()> {
        let _guard = self.lifecycle.lock().await;
        self.logger.info("Initializing Tonio client.", None);

        let result = self
            .session
            .initialize(self.provider.as_ref(), &self.identity_config)
            .await;

        let outcome = self.conclude(
            result,
            "An error occurred while initializing Tonio client.",
            INITIALIZE_FAILED,
        );
        if outcome.is_ok() {
            self.logger
                .info("Successfully finished initialization of Tonio client.", None);
        }
        outcome
    }

    /// Release the identity app and every auth subscription.
    pub async fn destroy(&self) -> ClientResult<()> {
        let _guard = self.lifecycle.lock().await;
        self.logger.info("Destroying Tonio client.", None);

        let result = self.session.destroy().await;

        let outcome = self.conclude(
            result,
            "An error occurred while destroying Tonio client.",
            DESTROY_FAILED,
        );
        if outcome.is_ok() {
            self.logger.info("Successfully destroyed Tonio client.", None);
        }
        outcome
    }

    /// Call `callback` with the signed-in flag now and on every change.
    pub fn subscribe_auth_changes<F>(&self, callback: F) -> ClientResult<AuthSubscription>
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.logger.info("Setting authentication state callback.", None);

        let result = self.session.subscribe_auth_changes(callback);

        let outcome = self.conclude(
            result,
            "An error occurred while setting authentication state callback.",
            SUBSCRIBE_FAILED,
        );
        if outcome.is_ok() {
            self.logger
                .info("Authentication state callback has been set successfully.", None);
        }
        outcome
    }

    /// Sign in with email and password. Does nothing when a user is
    /// already signed in, whoever it is.
    pub async fn sign_in(&self, email: &str, password: &str) -> ClientResult<()> {
        let _guard = self.lifecycle.lock().await;
        self.logger
            .info(&format!("Signing in user {} in to Tonio service.", email), None);

        let result: Result<bool, Failure> = async {
            let app = self.session.require_app()?;

            if let Some(user) = app.current_user() {
                self.logger.info(
                    &format!(
                        "User {} is already signed in to Tonio service.",
                        user.email.as_deref().unwrap_or(&user.uid)
                    ),
                    None,
                );
                return Ok(false);
            }

            app.sign_in_with_credentials(email, password).await?;
            Ok(true)
        }
        .await;

        let outcome = self.conclude(
            result,
            &format!("An error occurred while signing user {} in to Tonio service.", email),
            SIGN_IN_FAILED,
        );
        if let Ok(true) = outcome {
            self.logger.info(
                &format!("User {} is successfully signed in to Tonio service.", email),
                None,
            );
        }
        outcome.map(|_| ())
    }

    /// Sign the current user out. Does nothing when nobody is signed in.
    pub async fn sign_out(&self) -> ClientResult<()> {
        let _guard = self.lifecycle.lock().await;
        self.logger.info("Signing out user from Tonio service.", None);

        let result: Result<(), Failure> = async {
            let app = self.session.require_app()?;

            match app.current_user() {
                Some(user) => {
                    self.logger.info(
                        &format!(
                            "Signing out user {} from Tonio service.",
                            user.email.as_deref().unwrap_or(&user.uid)
                        ),
                        None,
                    );
                    app.sign_out().await?;
                }
                None => self.logger.info(
                    "Can't sign out user. No one is signed in to Tonio right now.",
                    None,
                ),
            }
            Ok(())
        }
        .await;

        self.conclude(
            result,
            "An error occurred while signing user out.",
            SIGN_OUT_FAILED,
        )
    }

    /// Report the actual start of a performance.
    pub async fn start_performance(&self, performance_id: &str) -> ClientResult<PerformanceStart> {
        let event = Event::now(performance_id, EventType::Start);
        self.logger.info(
            &format!(
                "Starting performance {} at {}.",
                event.performance_id,
                event.active_time.to_rfc3339()
            ),
            None,
        );

        let result: Result<PerformanceStart, Failure> = async {
            let envelope: PerformanceEnvelope = self.post_event(&event).await?;
            let performance = envelope.performance;
            Ok(PerformanceStart {
                performance_id: performance.performance_id,
                actual_start_time: performance.actual_start_time,
            })
        }
        .await;

        self.conclude_with(
            result,
            "Successfully received response with started performance.",
            &format!("An error occurred while starting performance {}.", performance_id),
            START_PERFORMANCE_FAILED,
        )
    }

    /// Report the actual end of a performance.
    pub async fn end_performance(&self, performance_id: &str) -> ClientResult<PerformanceEnd> {
        let event = Event::now(performance_id, EventType::End);
        self.logger.info(
            &format!(
                "Ending performance {} at {}.",
                event.performance_id,
                event.active_time.to_rfc3339()
            ),
            None,
        );

        let result: Result<PerformanceEnd, Failure> = async {
            let envelope: PerformanceEnvelope = self.post_event(&event).await?;
            let performance = envelope.performance;
            Ok(PerformanceEnd {
                performance_id: performance.performance_id,
                actual_end_time: performance.actual_end_time,
            })
        }
        .await;

        self.conclude_with(
            result,
            "Successfully received response with ended performance.",
            &format!("An error occurred while ending performance {}.", performance_id),
            END_PERFORMANCE_FAILED,
        )
    }

    /// Open an interval in a running performance.
    pub async fn start_interval(&self, performance_id: &str) -> ClientResult<Interval> {
        let event = Event::now(performance_id, EventType::IntervalStart);
        self.logger.info(
            &format!(
                "Starting interval for performance {} at {}.",
                event.performance_id,
                event.active_time.to_rfc3339()
            ),
            None,
        );

        let result: Result<Interval, Failure> = async {
            let envelope: IntervalEnvelope = self.post_event(&event).await?;
            Ok(envelope.interval)
        }
        .await;

        self.conclude_with(
            result,
            "Successfully received response with started interval.",
            &format!(
                "An error occurred while starting interval for performance {}.",
                performance_id
            ),
            START_INTERVAL_FAILED,
        )
    }

    /// Close the open interval of a performance.
    pub async fn end_interval(&self, performance_id: &str) -> ClientResult<Interval> {
        let event = Event::now(performance_id, EventType::IntervalEnd);
        self.logger.info(
            &format!(
                "Ending interval for performance {} at {}.",
                event.performance_id,
                event.active_time.to_rfc3339()
            ),
            None,
        );

        let result: Result<Interval, Failure> = async {
            let envelope: IntervalEnvelope = self.post_event(&event).await?;
            Ok(envelope.interval)
        }
        .await;

        self.conclude_with(
            result,
            "Successfully received response with ended interval.",
            &format!(
                "An error occurred while ending interval for performance {}.",
                performance_id
            ),
            END_INTERVAL_FAILED,
        )
    }

    /// Report that a caption is being shown.
    pub async fn send_caption(
        &self,
        performance_id: &str,
        caption_id: &str,
    ) -> ClientResult<CaptionDelivery> {
        let patch = CaptionPatch::now(performance_id, caption_id);
        self.logger.info(
            &format!(
                "Sending caption {} for performance {} at {}.",
                patch.caption_id,
                patch.performance_id,
                patch.active_time.to_rfc3339()
            ),
            None,
        );

        let result: Result<CaptionDelivery, Failure> = async {
            let token = self.pipeline.current_credential(&self.session).await?;
            let config = self.pipeline.build_config(&token)?;
            self.logger.info("Sending request to Tonio service.", None);
            let envelope = self.pipeline.submit_caption_patch(&config, &patch).await?;
            Ok(envelope.caption)
        }
        .await;

        self.conclude_with(
            result,
            "Successfully received response with sent caption.",
            &format!(
                "An error occurred while sending caption {} for performance {}.",
                caption_id, performance_id
            ),
            SEND_CAPTION_FAILED,
        )
    }

    async fn post_event<T>(&self, event: &Event) -> Result<T, Failure>
    where
        T: DeserializeOwned,
    {
        let token = self.pipeline.current_credential(&self.session).await?;
        let config = self.pipeline.build_config(&token)?;
        self.logger.info("Sending request to Tonio service.", None);
        Ok(self.pipeline.submit_event(&config, event).await?)
    }

    /// Log the success detail, or resolve and log the failure.
    fn conclude_with<T>(
        &self,
        result: Result<T, Failure>,
        success_message: &str,
        failure_message: &str,
        case_message: &str,
    ) -> ClientResult<T>
    where
        T: Serialize,
    {
        let outcome = self.conclude(result, failure_message, case_message);
        if let Ok(value) = &outcome {
            let detail = serde_json::to_value(value).ok();
            self.logger.info(success_message, detail.as_ref());
        }
        outcome
    }

    fn conclude<T>(
        &self,
        result: Result<T, Failure>,
        failure_message: &str,
        case_message: &str,
    ) -> ClientResult<T> {
        result.map_err(|failure| {
            let error = failure.into_client_error(case_message);
            let detail: Option<Value> = serde_json::to_value(error.to_transport_object()).ok();
            self.logger.error(failure_message, detail.as_ref());
            error
        })
    }
}

impl std::fmt::Debug for TonioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TonioClient")
            .field("session", &self.session)
            .field("pipeline", &self.pipeline)
            .field("logger", &self.logger)
            .finish()
    }
}

//! End-to-end client behavior against mocked identity and captioning
//! endpoints.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tonio_client::{ClientOptions, ErrorKind, TonioClient};
use tonio_core::{ErrorCause, IdentityConfig, LogSink};
use tonio_identity::{
    AuthStateListener, FirebaseIdentityProvider, IdentityApp, IdentityProvider, IdentityResult,
    IdentityUser, ListenerId,
};
use tracing::Level;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const EMAIL: &str = "stage@tonio.com";
const PASSWORD: &str = "secret";

#[derive(Default)]
struct RecordingSink {
    entries: Mutex<Vec<(Level, String)>>,
}

impl RecordingSink {
    fn messages(&self, level: Level) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl LogSink for RecordingSink {
    fn log(&self, level: Level, message: &str, _detail: Option<&Value>) {
        self.entries.lock().push((level, message.to_string()));
    }
}

/// Counts identity calls made through the Firebase app it wraps.
#[derive(Default)]
struct Counters {
    sign_ins: AtomicUsize,
    sign_outs: AtomicUsize,
}

struct CountingProvider {
    inner: FirebaseIdentityProvider,
    counters: Arc<Counters>,
}

struct CountingApp {
    inner: Arc<dyn IdentityApp>,
    counters: Arc<Counters>,
}

#[async_trait]
impl IdentityProvider for CountingProvider {
    async fn initialize_app(&self, config: &IdentityConfig) -> IdentityResult<Arc<dyn IdentityApp>> {
        let inner = self.inner.initialize_app(config).await?;
        Ok(Arc::new(CountingApp {
            inner,
            counters: self.counters.clone(),
        }))
    }
}

#[async_trait]
impl IdentityApp for CountingApp {
    fn current_user(&self) -> Option<IdentityUser> {
        self.inner.current_user()
    }

    async fn sign_in_with_credentials(&self, email: &str, password: &str) -> IdentityResult<()> {
        self.counters.sign_ins.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_in_with_credentials(email, password).await
    }

    async fn sign_out(&self) -> IdentityResult<()> {
        self.counters.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_out().await
    }

    async fn get_id_token(&self, force_refresh: bool) -> IdentityResult<String> {
        self.inner.get_id_token(force_refresh).await
    }

    fn on_auth_state_changed(&self, listener: AuthStateListener) -> IdentityResult<ListenerId> {
        self.inner.on_auth_state_changed(listener)
    }

    fn remove_auth_state_listener(&self, id: ListenerId) -> bool {
        self.inner.remove_auth_state_listener(id)
    }

    async fn delete(&self) -> IdentityResult<()> {
        self.inner.delete().await
    }
}

struct Harness {
    server: MockServer,
    client: TonioClient,
    sink: Arc<RecordingSink>,
    counters: Arc<Counters>,
}

fn identity_config(server: &MockServer) -> IdentityConfig {
    IdentityConfig {
        api_key: "test-key".to_string(),
        auth_url: format!("{}/identity/v1", server.uri()),
        token_url: format!("{}/securetoken/v1", server.uri()),
        project_id: None,
    }
}

async fn harness_with_url(service_url: Option<String>) -> Harness {
    let server = MockServer::start().await;
    let sink = Arc::new(RecordingSink::default());
    let counters = Arc::new(Counters::default());

    let options = ClientOptions {
        service_url: service_url.map(|url| url.replace("{uri}", &server.uri())),
        identity: identity_config(&server),
        log_level: Level::INFO,
        log_sink: Some(sink.clone()),
    };
    let provider = CountingProvider {
        inner: FirebaseIdentityProvider::new(),
        counters: counters.clone(),
    };

    Harness {
        client: TonioClient::new(options, Arc::new(provider)),
        server,
        sink,
        counters,
    }
}

async fn harness() -> Harness {
    harness_with_url(Some("{uri}/api/".to_string())).await
}

async fn mount_sign_in(server: &MockServer) {
    mount_sign_in_expiring(server, "3600").await;
}

async fn mount_sign_in_expiring(server: &MockServer, expires_in: &str) {
    Mock::given(method("POST"))
        .and(path("/identity/v1/accounts:signInWithPassword"))
        .and(body_partial_json(json!({ "email": EMAIL, "password": PASSWORD })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "idToken": "id-token-1",
            "refreshToken": "refresh-1",
            "expiresIn": expires_in,
            "localId": "uid-42",
            "email": EMAIL
        })))
        .mount(server)
        .await;
}

async fn signed_in() -> Harness {
    let h = harness().await;
    mount_sign_in(&h.server).await;
    h.client.initialize().await.unwrap();
    h.client.sign_in(EMAIL, PASSWORD).await.unwrap();
    h
}

#[tokio::test]
async fn initialize_twice_is_rejected() {
    let h = harness().await;
    h.client.initialize().await.unwrap();
    assert!(h.client.is_initialized());

    let error = h.client.initialize().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AlreadyInitialized);
    assert_eq!(error.message(), "Tonio is already initialized.");
    assert_eq!(error.supplementary(), ["Tonio should be initialized only once."]);
    assert!(h.client.is_initialized());
}

#[tokio::test]
async fn destroy_before_initialize_is_rejected() {
    let h = harness().await;
    let error = h.client.destroy().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotInitialized);
    assert_eq!(error.message(), "Can't destroy not initialized Tonio client.");
    assert_eq!(error.supplementary(), ["You haven't initialized Tonio."]);
}

#[tokio::test]
async fn initialize_without_api_key_is_wrapped() {
    let server = MockServer::start().await;
    let client = TonioClient::new(
        ClientOptions {
            service_url: Some(server.uri()),
            log_sink: None,
            ..Default::default()
        },
        Arc::new(FirebaseIdentityProvider::new()),
    );

    let error = client.initialize().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Remote);
    assert_eq!(error.message(), "An error happened while initializing Tonio client.");
    assert!(matches!(error.cause(), Some(ErrorCause::Native(_))));
    assert!(!client.is_initialized());
}

#[tokio::test]
async fn operations_require_initialize() {
    let h = harness().await;
    h.client.initialize().await.unwrap();
    h.client.destroy().await.unwrap();

    let errors = vec![
        h.client.sign_in(EMAIL, PASSWORD).await.unwrap_err(),
        h.client.sign_out().await.unwrap_err(),
        h.client.start_performance("perf-1").await.unwrap_err(),
        h.client.end_performance("perf-1").await.unwrap_err(),
        h.client.start_interval("perf-1").await.unwrap_err(),
        h.client.end_interval("perf-1").await.unwrap_err(),
        h.client.send_caption("perf-1", "cap-1").await.unwrap_err(),
        h.client.subscribe_auth_changes(|_| {}).unwrap_err(),
    ];

    for error in errors {
        assert_eq!(error.kind(), ErrorKind::NotInitialized);
        assert_eq!(error.message(), "Please, initialize for using Tonio first.");
        assert_eq!(error.supplementary(), ["You haven't initialized Tonio."]);
    }
    assert_eq!(h.counters.sign_ins.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn business_operations_require_sign_in() {
    let h = harness().await;
    h.client.initialize().await.unwrap();
    assert!(!h.client.is_signed_in());

    let errors = vec![
        h.client.start_performance("perf-1").await.unwrap_err(),
        h.client.end_performance("perf-1").await.unwrap_err(),
        h.client.start_interval("perf-1").await.unwrap_err(),
        h.client.end_interval("perf-1").await.unwrap_err(),
        h.client.send_caption("perf-1", "cap-1").await.unwrap_err(),
    ];

    for error in errors {
        assert_eq!(error.kind(), ErrorKind::NotAuthenticated);
        assert_eq!(error.message(), "Please, sign in before using Tonio.");
        assert_eq!(error.supplementary(), ["You are not authenticated."]);
    }
}

#[tokio::test]
async fn sign_in_is_idempotent() {
    let h = signed_in().await;
    assert!(h.client.is_signed_in());
    assert_eq!(h.client.current_user_email().as_deref(), Some(EMAIL));

    h.client.sign_in("someone-else@tonio.com", "other").await.unwrap();
    assert_eq!(h.counters.sign_ins.load(Ordering::SeqCst), 1);
    assert_eq!(h.client.current_user_email().as_deref(), Some(EMAIL));
    assert!(h
        .sink
        .messages(Level::INFO)
        .contains(&format!("User {} is already signed in to Tonio service.", EMAIL)));
}

#[tokio::test]
async fn sign_out_without_user_makes_no_identity_call() {
    let h = harness().await;
    h.client.initialize().await.unwrap();

    h.client.sign_out().await.unwrap();
    assert_eq!(h.counters.sign_outs.load(Ordering::SeqCst), 0);
    assert!(h
        .sink
        .messages(Level::INFO)
        .contains(&"Can't sign out user. No one is signed in to Tonio right now.".to_string()));
}

#[tokio::test]
async fn sign_out_signs_user_out() {
    let h = signed_in().await;
    h.client.sign_out().await.unwrap();

    assert!(!h.client.is_signed_in());
    assert_eq!(h.counters.sign_outs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn subscription_reports_sign_in_state() {
    let h = harness().await;
    mount_sign_in(&h.server).await;
    h.client.initialize().await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let subscription = h
        .client
        .subscribe_auth_changes(move |signed_in| recorder.lock().push(signed_in))
        .unwrap();
    assert_eq!(*seen.lock(), vec![false]);

    h.client.sign_in(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(*seen.lock(), vec![false, true]);

    let late = Arc::new(Mutex::new(Vec::new()));
    let late_recorder = late.clone();
    h.client
        .subscribe_auth_changes(move |signed_in| late_recorder.lock().push(signed_in))
        .unwrap();
    assert_eq!(*late.lock(), vec![true]);

    assert!(subscription.unsubscribe());
    h.client.sign_out().await.unwrap();
    assert_eq!(*seen.lock(), vec![false, true]);
    assert_eq!(*late.lock(), vec![true, false]);
}

#[tokio::test]
async fn bad_credentials_are_wrapped_with_provider_payload() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/identity/v1/accounts:signInWithPassword"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "INVALID_LOGIN_CREDENTIALS",
                "errors": [{ "reason": "invalid" }]
            }
        })))
        .mount(&h.server)
        .await;
    h.client.initialize().await.unwrap();

    let error = h
        .client
        .sign_in("wrongemail@gmail.com", "wrongpassword")
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Remote);
    assert_eq!(error.message(), "An error happened while trying signing you in.");
    match error.cause() {
        Some(ErrorCause::Remote(payload)) => {
            assert_eq!(payload["message"], "INVALID_LOGIN_CREDENTIALS");
        }
        other => panic!("expected provider payload, got {:?}", other),
    }
    assert!(!h.client.is_signed_in());

    let errors = h.sink.messages(Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("wrongemail@gmail.com"));
}

#[tokio::test]
async fn start_and_end_performance() {
    let h = signed_in().await;
    Mock::given(method("POST"))
        .and(path("/api/events"))
        .and(header("Authorization", "Bearer id-token-1"))
        .and(body_partial_json(json!({ "performanceId": "perf-1", "type": "start" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "performance": {
                "performanceId": "perf-1",
                "actualStartTime": "2024-03-01T19:30:00.000Z"
            }
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/events"))
        .and(body_partial_json(json!({ "performanceId": "perf-1", "type": "end" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "performance": {
                "performanceId": "perf-1",
                "actualEndTime": "2024-03-01T21:45:00.000Z"
            }
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let start = h.client.start_performance("perf-1").await.unwrap();
    assert_eq!(start.performance_id, "perf-1");
    assert_eq!(start.actual_start_time.as_deref(), Some("2024-03-01T19:30:00.000Z"));

    let end = h.client.end_performance("perf-1").await.unwrap();
    assert_eq!(end.performance_id, "perf-1");
    assert_eq!(end.actual_end_time.as_deref(), Some("2024-03-01T21:45:00.000Z"));

    assert!(h
        .sink
        .messages(Level::INFO)
        .contains(&"Successfully received response with started performance.".to_string()));
}

#[tokio::test]
async fn interval_round_trip_preserves_start_fields() {
    let h = signed_in().await;
    Mock::given(method("POST"))
        .and(path("/api/events"))
        .and(body_partial_json(json!({ "type": "intervalStart" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "interval": {
                "startTime": "2024-03-01T20:15:00.000Z",
                "startTimeInTrack": 2700.5
            }
        })))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/events"))
        .and(body_partial_json(json!({ "type": "intervalEnd" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "interval": {
                "intervalId": 3,
                "startTime": "2024-03-01T20:15:00.000Z",
                "startTimeInTrack": 2700.5,
                "endTime": "2024-03-01T20:35:00.000Z",
                "endTimeInTrack": 2700.5
            }
        })))
        .mount(&h.server)
        .await;

    let started = h.client.start_interval("perf-1").await.unwrap();
    let ended = h.client.end_interval("perf-1").await.unwrap();

    assert_eq!(ended.interval_id.as_deref(), Some("3"));
    assert_eq!(ended.start_time, started.start_time);
    assert_eq!(ended.start_time_in_track, started.start_time_in_track);
    assert!(ended.end_time.is_some());
    assert!(ended.end_time_in_track.is_some());
}

#[tokio::test]
async fn send_caption_echoes_caption_id() {
    let h = signed_in().await;
    Mock::given(method("PATCH"))
        .and(path("/api/captions"))
        .and(header("Authorization", "Bearer id-token-1"))
        .respond_with(|request: &Request| {
            let patch: Value = request.body_json().unwrap();
            ResponseTemplate::new(200).set_body_json(json!({
                "caption": {
                    "captionId": patch["captionId"],
                    "activeTime": patch["activeTime"],
                    "timeInTrack": 12.25
                }
            }))
        })
        .expect(1)
        .mount(&h.server)
        .await;

    let caption = h.client.send_caption("perf-1", "cap-9").await.unwrap();
    assert_eq!(caption.caption_id, "cap-9");
    assert!(caption.active_time.as_deref().is_some_and(|t| t.ends_with('Z')));
    assert_eq!(caption.time_in_track, Some(json!(12.25)));
}

#[tokio::test]
async fn sparse_responses_keep_what_the_backend_sent() {
    let h = signed_in().await;
    Mock::given(method("POST"))
        .and(path("/api/events"))
        .and(body_partial_json(json!({ "type": "start" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "performance": { "performanceId": "perf-1" }
        })))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/events"))
        .and(body_partial_json(json!({ "type": "intervalStart" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "interval": {
                "intervalId": 1,
                "performanceId": "perf-1",
                "startTime": "2024-03-01T20:15:00.000Z"
            }
        })))
        .mount(&h.server)
        .await;

    let start = h.client.start_performance("perf-1").await.unwrap();
    assert_eq!(start.performance_id, "perf-1");
    assert!(start.actual_start_time.is_none());

    let interval = h.client.start_interval("perf-1").await.unwrap();
    assert_eq!(interval.interval_id.as_deref(), Some("1"));
    assert_eq!(interval.start_time.as_deref(), Some("2024-03-01T20:15:00.000Z"));
    assert!(interval.start_time_in_track.is_none());
    assert_eq!(interval.extra["performanceId"], "perf-1");
}

#[tokio::test]
async fn response_without_identifier_is_wrapped() {
    let h = signed_in().await;
    Mock::given(method("POST"))
        .and(path("/api/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "performance": { "actualEndTime": "2024-03-01T21:45:00.000Z" }
        })))
        .mount(&h.server)
        .await;

    let error = h.client.end_performance("perf-1").await.unwrap_err();
    assert_eq!(error.message(), "An error happened while ending performance.");
    assert!(error.cause().is_some());
}

fn posted_active_times(requests: &[Request], api_path: &str) -> Vec<DateTime<Utc>> {
    requests
        .iter()
        .filter(|request| request.url.path() == api_path)
        .map(|request| {
            let body: Value = request.body_json().unwrap();
            let raw = body["activeTime"].as_str().unwrap();
            DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
        })
        .collect()
}

#[tokio::test]
async fn active_time_is_taken_when_the_call_is_made() {
    let token_delay = std::time::Duration::from_millis(500);
    let h = harness().await;
    // Short-lived tokens force a delayed refresh before every request.
    mount_sign_in_expiring(&h.server, "60").await;
    Mock::given(method("POST"))
        .and(path("/securetoken/v1/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "id_token": "id-token-2",
                    "refresh_token": "refresh-2",
                    "expires_in": "60"
                }))
                .set_delay(token_delay),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "performance": { "performanceId": "perf-1" }
        })))
        .mount(&h.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/captions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "caption": { "captionId": "cap-1" }
        })))
        .mount(&h.server)
        .await;
    h.client.initialize().await.unwrap();
    h.client.sign_in(EMAIL, PASSWORD).await.unwrap();

    let limit = chrono::Duration::from_std(token_delay).unwrap();

    let called_at = Utc::now().trunc_subsecs(3);
    h.client.start_performance("perf-1").await.unwrap();
    let requests = h.server.received_requests().await.unwrap();
    let stamped = posted_active_times(&requests, "/api/events");
    assert_eq!(stamped.len(), 1);
    assert!(stamped[0] >= called_at);
    assert!(stamped[0] < called_at + limit);

    let called_at = Utc::now().trunc_subsecs(3);
    h.client.send_caption("perf-1", "cap-1").await.unwrap();
    let requests = h.server.received_requests().await.unwrap();
    let stamped = posted_active_times(&requests, "/api/captions");
    assert_eq!(stamped.len(), 1);
    assert!(stamped[0] >= called_at);
    assert!(stamped[0] < called_at + limit);
}

#[tokio::test]
async fn backend_rejection_is_wrapped_per_operation() {
    let h = signed_in().await;
    Mock::given(method("POST"))
        .and(path("/api/events"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": { "code": "PERFORMANCE_ALREADY_STARTED" }
        })))
        .mount(&h.server)
        .await;

    let error = h.client.start_performance("perf-1").await.unwrap_err();
    assert_eq!(error.message(), "An error happened while starting performance.");
    match error.cause() {
        Some(ErrorCause::Remote(payload)) => {
            assert_eq!(payload["code"], "PERFORMANCE_ALREADY_STARTED")
        }
        other => panic!("expected backend payload, got {:?}", other),
    }

    let error = h.client.end_interval("perf-1").await.unwrap_err();
    assert_eq!(error.message(), "An error happened while ending interval.");

    let transport = error.to_transport_object();
    assert!(!transport.message.is_empty());
    assert!(!transport.stack_trace.is_empty());
    assert_eq!(transport.inner_error["code"], "PERFORMANCE_ALREADY_STARTED");
}

#[tokio::test]
async fn missing_service_url_passes_through() {
    let h = harness_with_url(None).await;
    mount_sign_in(&h.server).await;
    h.client.initialize().await.unwrap();
    h.client.sign_in(EMAIL, PASSWORD).await.unwrap();

    let error = h.client.send_caption("perf-1", "cap-1").await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MissingServiceUrl);
    assert_eq!(error.message(), "Incorrect Tonio service configuration.");
    assert_eq!(error.supplementary(), ["Tonio service url is not defined."]);
}

#[tokio::test]
async fn destroy_then_initialize_again() {
    let h = signed_in().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    h.client
        .subscribe_auth_changes(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    h.client.destroy().await.unwrap();
    assert!(!h.client.is_initialized());
    assert!(!h.client.is_signed_in());

    h.client.initialize().await.unwrap();
    assert!(h.client.is_initialized());
    assert!(!h.client.is_signed_in());
    h.client.sign_in(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn log_sink_and_level_are_adjustable() {
    let h = harness().await;
    h.client.set_log_level(Level::ERROR);
    h.client.initialize().await.unwrap();
    assert!(h.sink.messages(Level::INFO).is_empty());

    h.client.set_log_sink(None);
    let _ = h.client.initialize().await;
    assert!(h.sink.messages(Level::ERROR).is_empty());

    let replacement = Arc::new(RecordingSink::default());
    h.client.set_log_sink(Some(replacement.clone()));
    h.client.set_log_level(Level::INFO);
    h.client.destroy().await.unwrap();
    assert_eq!(
        replacement.messages(Level::INFO),
        vec!["Destroying Tonio client.", "Successfully destroyed Tonio client."]
    );
}

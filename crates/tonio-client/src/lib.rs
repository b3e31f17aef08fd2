//! # tonio-client
//!
//! Client library for the Tonio live-captioning service.
//!
//! A [`TonioClient`] is initialized once, signed in through an identity
//! provider, and then reports performance, interval and caption events to
//! the captioning backend.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tonio_client::{ClientOptions, TonioClient};
//! use tonio_core::IdentityConfig;
//! use tonio_identity::FirebaseIdentityProvider;
//!
//! # async fn run() -> tonio_core::ClientResult<()> {
//! let identity = IdentityConfig {
//!     api_key: "web-api-key".to_string(),
//!     ..Default::default()
//! };
//! let client = TonioClient::new(
//!     ClientOptions::new("https://services.tonio.com/api/v1/", identity),
//!     Arc::new(FirebaseIdentityProvider::new()),
//! );
//!
//! client.initialize().await?;
//! client.sign_in("stage@tonio.com", "secret").await?;
//! let start = client.start_performance("perf-1").await?;
//! println!("started at {:?}", start.actual_start_time);
//! client.destroy().await?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod models;
pub mod pipeline;

pub use client::{ClientOptions, TonioClient};
pub use models::{
    CaptionDelivery, CaptionPatch, Event, EventType, Interval, PerformanceEnd, PerformanceStart,
};
pub use pipeline::{RequestConfig, RequestError, RequestPipeline};
pub use tonio_core::{ClientError, ClientResult, ErrorKind, TransportObject};
pub use tonio_identity::{AuthState, AuthSubscription};

//! Command implementations.

use crate::output::{self, OutputFormat};
use anyhow::{bail, Result};
use serde::Serialize;
use std::io::{self, Write};
use tonio_client::TonioClient;
use tonio_core::Config;
use tracing::{debug, info};

/// Auth state as printed by the CLI.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthStatus {
    signed_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

impl AuthStatus {
    fn of(client: &TonioClient) -> Self {
        let state = client.auth_state();
        Self {
            signed_in: state.signed_in,
            email: state.current_user_email,
        }
    }
}

/// Sign in with configured credentials, prompting for a missing password.
pub async fn sign_in(client: &TonioClient, config: &Config) -> Result<()> {
    let Some(email) = config.email.as_deref() else {
        bail!("No account configured. Set TONIO_EMAIL or add \"email\" to config.json");
    };

    let password = match config.password.as_deref() {
        Some(password) => password.to_string(),
        None => {
            print!("Password for {}: ", email);
            io::stdout().flush()?;
            rpassword::read_password()?
        }
    };

    if password.is_empty() {
        bail!("Password is required");
    }

    debug!(email = %email, "Signing in");
    client.sign_in(email, &password).await?;
    Ok(())
}

pub async fn show_sign_in(client: &TonioClient, format: OutputFormat) -> Result<()> {
    output::print(&AuthStatus::of(client), format);
    Ok(())
}

pub async fn sign_out(client: &TonioClient, format: OutputFormat) -> Result<()> {
    client.sign_out().await?;
    output::print(&AuthStatus::of(client), format);
    Ok(())
}

pub async fn start_performance(
    client: &TonioClient,
    performance_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let started = client.start_performance(performance_id).await?;
    output::print(&started, format);
    Ok(())
}

pub async fn end_performance(
    client: &TonioClient,
    performance_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let ended = client.end_performance(performance_id).await?;
    output::print(&ended, format);
    Ok(())
}

pub async fn start_interval(
    client: &TonioClient,
    performance_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let interval = client.start_interval(performance_id).await?;
    output::print(&interval, format);
    Ok(())
}

pub async fn end_interval(
    client: &TonioClient,
    performance_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let interval = client.end_interval(performance_id).await?;
    output::print(&interval, format);
    Ok(())
}

pub async fn send_caption(
    client: &TonioClient,
    performance_id: &str,
    caption_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let caption = client.send_caption(performance_id, caption_id).await?;
    output::print(&caption, format);
    Ok(())
}

/// Print auth state changes as JSON lines until Ctrl+C.
///
/// Signs in afterwards when credentials are configured, so the stream
/// shows the `false` to `true` transition.
pub async fn watch_auth(client: &TonioClient, config: &Config) -> Result<()> {
    let subscription = client.subscribe_auth_changes(|signed_in| {
        output::print_line(&serde_json::json!({ "signedIn": signed_in }));
    })?;

    if config.credentials().is_some() {
        sign_in(client, config).await?;
    }

    info!("Watching auth state, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    subscription.unsubscribe();
    Ok(())
}

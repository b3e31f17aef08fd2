//! Output formatting for the CLI.

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use tonio_client::ClientError;

/// Output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    Text,
    #[default]
    Json,
}

/// Print a command result.
pub fn print<T: Serialize>(value: &T, format: OutputFormat) {
    let value = match serde_json::to_value(value) {
        Ok(value) => value,
        Err(e) => {
            print_error(&format!("Failed to serialize result: {}", e), format);
            return;
        }
    };

    match format {
        OutputFormat::Json => println!("{}", to_json(&value, true)),
        OutputFormat::Text => match &value {
            Value::Object(fields) => {
                for (key, field) in fields {
                    print_row(key, &plain(field));
                }
            }
            other => println!("{}", plain(other)),
        },
    }
}

/// Print one compact JSON line, for streaming output.
pub fn print_line<T: Serialize>(value: &T) {
    match serde_json::to_value(value) {
        Ok(value) => println!("{}", to_json(&value, false)),
        Err(e) => eprintln!("Error: {}", e),
    }
}

/// Print a client failure as its transport object.
pub fn print_client_error(error: &ClientError, format: OutputFormat) {
    let transport = error.to_transport_object();
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(&transport) {
            Ok(json) => eprintln!("{}", json),
            Err(_) => eprintln!("Error: {}", transport.message),
        },
        OutputFormat::Text => {
            eprintln!("Error: {}", transport.message);
            for note in &transport.errors {
                eprintln!("  - {}", note);
            }
            if !transport.inner_error.is_null() {
                eprintln!("  Caused by: {}", transport.inner_error);
            }
        }
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => {
            eprintln!(
                "{}",
                serde_json::json!({ "status": "error", "message": message })
            );
        }
    }
}

/// Print a table row.
pub fn print_row(label: &str, value: &str) {
    println!("  {:<20} {}", format!("{}:", label), value);
}

fn to_json(value: &Value, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.unwrap_or_else(|_| value.to_string())
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

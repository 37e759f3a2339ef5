//! # Structured Logging
//!
//! Environment-aware console logging on the tracing ecosystem. Batch output
//! goes to stdout so the host scheduler captures it with the run.
//!
//! - Log level chosen by environment, overridable with `RUST_LOG`
//! - JSON lines when `LOG_FORMAT=json`, human-readable otherwise
//! - ANSI colors only when stdout is a terminal
//! - Domain macros (`log_batch!`, `log_mutation!`, `log_notification!`,
//!   `log_config!`) that always carry an `operation` field and a timestamp
//!
//! Every batch run carries a `run_id` (uuid) that the coordinator attaches to
//! its span, so all records from one run can be correlated.

use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console logging. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let use_ansi = IsTerminal::is_terminal(&std::io::stdout());
        let json = use_json_format();

        let console_layer = if json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                ansi_colors = use_ansi,
                json = json,
                "Console logging initialized"
            );
        }
    });
}

/// Current environment name
pub fn get_environment() -> String {
    std::env::var("ASSEMBLY_NOTIFIER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        "staging" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn use_json_format() -> bool {
    std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log batch coordination events
#[macro_export]
macro_rules! log_batch {
    ($level:ident, $operation:expr $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "{}", $operation
        );
    };
    ($level:ident, $operation:expr, run_id: $run_id:expr, $($key:ident: $value:expr),* $(,)?) => {
        tracing::$level!(
            run_id = %$run_id,
            operation = %$operation,
            $($key = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "{}", $operation
        );
    };
}

/// Log entity marker mutations
#[macro_export]
macro_rules! log_mutation {
    ($level:ident, $operation:expr, business_key: $key:expr, entity_id: $entity_id:expr, $($field:ident: $value:expr),* $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            business_key = %$key,
            entity_id = %$entity_id,
            $($field = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "{} ({})", $operation, $key
        );
    };
}

/// Log alert rendering and delivery
#[macro_export]
macro_rules! log_notification {
    ($level:ident, $operation:expr $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "{}", $operation
        );
    };
    ($level:ident, $operation:expr, $($key:ident: $value:expr),+ $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            $($key = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "{}", $operation
        );
    };
}

/// Log configuration operations
#[macro_export]
macro_rules! log_config {
    ($level:ident, $operation:expr $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "{}", $operation
        );
    };
    ($level:ident, $operation:expr, $($key:ident: $value:expr),+ $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            $($key = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "{}", $operation
        );
    };
}

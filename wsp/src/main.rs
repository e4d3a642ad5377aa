// Standard library
use std::sync::OnceLock;
use uuid::Uuid;

// External crates
use clap::Parser;
use tracing::{info, info_span};

// Internal imports
use wsp_core::{wsp_error, wsp_error_hint};
use wsp_logging::{LogOutput, LogSettings};
use wsp_messages::{msg, MESSAGES};

// Local modules
mod cli;
mod commands;
mod error;

use cli::Args;
use commands::execute_command;

/// Request ID for this execution - used for tracing logs across the entire request
static REQUEST_ID: OnceLock<String> = OnceLock::new();

fn get_request_id() -> &'static str {
    REQUEST_ID.get_or_init(|| Uuid::new_v4().to_string())
}

/// Logging is silent unless asked for through `WSP_LOG_OUTPUT` or `--debug`.
fn log_settings(debug: bool) -> LogSettings {
    let mut settings = LogSettings::from_env();
    if std::env::var(wsp_logging::LOG_OUTPUT_ENV).is_err() {
        settings.output = if debug {
            LogOutput::Console
        } else {
            LogOutput::None
        };
    }
    if debug && std::env::var(wsp_logging::LOG_LEVEL_ENV).is_err() {
        settings.level = "debug".to_string();
    }
    settings
}

fn main() {
    let args = Args::parse();
    let _log_guard = wsp_logging::init_with(log_settings(args.debug));

    // Request-level span inherited by every log line of this run
    let span = info_span!(
        "request",
        request_id = get_request_id(),
        command = ?args.command
    );
    let _enter = span.enter();

    if args.debug {
        info!("Starting wsp command");
    }

    if let Err(e) = execute_command(args) {
        wsp_error!("{}", msg!(MESSAGES.common.error_generic, error = e.to_string()));
        if e.is_unreachable() {
            wsp_error_hint!("{}", MESSAGES.ingress.admin_unreachable_hint);
        }
        std::process::exit(1);
    }
}

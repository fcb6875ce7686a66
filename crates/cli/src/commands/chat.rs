use std::io::{self, BufRead, Write};

use serde_json::json;

use orderdesk_core::{RequestError, TransactionCoordinator, TransactionId};
use orderdesk_db::open_order_store;

use crate::commands::{
    build_runtime, load_config, CommandResult, EXIT_STORE_OPEN, EXIT_STORE_OPERATION, EXIT_USAGE,
};
use crate::GlobalArgs;

/// Control lines recognised by [`run_session`]; everything else is a chat turn.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Turn(&'a str),
    Approve(Option<&'a str>),
    Reject(Option<&'a str>),
    Active,
    Quit,
    Unknown(&'a str),
}

fn parse_line(line: &str) -> Line<'_> {
    let Some(control) = line.strip_prefix('/') else {
        return Line::Turn(line);
    };
    let mut parts = control.split_whitespace();
    match parts.next() {
        Some("approve") => Line::Approve(parts.next()),
        Some("reject") => Line::Reject(parts.next()),
        Some("active") => Line::Active,
        Some("quit") | Some("exit") => Line::Quit,
        _ => Line::Unknown(line),
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub turns: usize,
}

pub fn run(global: &GlobalArgs, user_id: &str, intent: &str) -> CommandResult {
    let user_id = match RequestError::require("user", user_id) {
        Ok(user_id) => user_id,
        Err(error) => {
            return CommandResult::failure("chat", error.error_class(), error.to_string(), EXIT_USAGE)
        }
    };
    let config = match load_config("chat", global) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let store = open_order_store(&config.store)
            .await
            .map_err(|error| ("store_open", error.to_string(), EXIT_STORE_OPEN))?;
        let coordinator = TransactionCoordinator::new(store, config.coordinator.clone());

        let stdin = io::stdin();
        let stdout = io::stdout();
        run_session(&coordinator, user_id, intent, stdin.lock(), stdout.lock())
            .await
            .map_err(|error| ("session_io", error.to_string(), EXIT_STORE_OPERATION))
    });

    match result {
        Ok(summary) => CommandResult::success(
            "chat",
            format!("session for {user_id} ended after {} turn(s)", summary.turns),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

/// Drives one user's conversation, writing one JSON document per input line.
pub async fn run_session<R, W>(
    coordinator: &TransactionCoordinator,
    user_id: &str,
    intent: &str,
    input: R,
    mut output: W,
) -> io::Result<SessionSummary>
where
    R: BufRead,
    W: Write,
{
    let mut summary = SessionSummary::default();

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let rendered = match parse_line(line) {
            Line::Quit => break,
            Line::Turn(text) => {
                summary.turns += 1;
                to_json(&coordinator.process(intent, text, user_id).await)
            }
            Line::Approve(explicit) => match resolve_target(coordinator, user_id, explicit).await {
                Some(id) => {
                    summary.turns += 1;
                    to_json(&coordinator.execute(&id).await)
                }
                None => nothing_pending(),
            },
            Line::Reject(explicit) => match resolve_target(coordinator, user_id, explicit).await {
                Some(id) => {
                    summary.turns += 1;
                    to_json(&coordinator.reject(&id).await)
                }
                None => nothing_pending(),
            },
            Line::Active => json!({
                "user_id": user_id,
                "active": coordinator.has_active_context(user_id).await,
            })
            .to_string(),
            Line::Unknown(raw) => {
                json!({ "status": "error", "message": format!("unknown control line `{raw}`") })
                    .to_string()
            }
        };
        writeln!(output, "{rendered}")?;
        output.flush()?;
    }

    Ok(summary)
}

/// Without an explicit id, targets the approval currently open for the user.
async fn resolve_target(
    coordinator: &TransactionCoordinator,
    user_id: &str,
    explicit: Option<&str>,
) -> Option<TransactionId> {
    match explicit {
        Some(id) => Some(TransactionId(id.to_string())),
        None => coordinator.session(user_id).await.pending_transaction_id,
    }
}

fn nothing_pending() -> String {
    json!({ "status": "error", "message": "no approval is waiting for this user" }).to_string()
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|error| {
        json!({ "status": "error", "message": format!("could not render result: {error}") })
            .to_string()
    })
}

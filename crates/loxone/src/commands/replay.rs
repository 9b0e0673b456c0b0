//! `replay`: drive a real supervisor from a recorded event script.
//!
//! The script is split into sessions at every `connection_lost` event. Each
//! `connect()` of the scripted transport enqueues the next session; once
//! the script is exhausted the transport acknowledges a close, which ends
//! the supervisor.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::{debug, info};

use loxone_core::{
    CommandResult, ConnectionTimings, ControlCommand, EventSender, Identity, Miniserver,
    MiniserverConfig, Notification, ServerEvent, Timing, Transport, TransportError,
};

use crate::cli::{GlobalOpts, OutputFormat, ReplayArgs};
use crate::error::CliError;
use crate::output::{self, ControlRow};

// ── Script parsing ───────────────────────────────────────────────────

/// Parse JSON lines. Blank lines and lines starting with `#` are skipped.
fn parse_script(text: &str) -> Result<Vec<ServerEvent>, CliError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| CliError::Script {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

/// Split at every `ConnectionLost` (inclusive). A trailing session that
/// does not end in a loss is closed explicitly so the replay terminates.
fn split_sessions(events: Vec<ServerEvent>) -> VecDeque<Vec<ServerEvent>> {
    let mut sessions = VecDeque::new();
    let mut current = Vec::new();
    for event in events {
        let ends_session = matches!(event, ServerEvent::ConnectionLost { .. });
        current.push(event);
        if ends_session {
            sessions.push_back(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        current.push(ServerEvent::CloseAcknowledged);
        sessions.push_back(current);
    }
    sessions
}

// ── Scripted transport ───────────────────────────────────────────────

/// In-process transport that plays back one scripted session per
/// connection attempt. Commands are recorded, not delivered.
struct ScriptedTransport {
    sender: EventSender,
    sessions: Mutex<VecDeque<Vec<ServerEvent>>>,
}

impl ScriptedTransport {
    fn new(sender: EventSender, sessions: VecDeque<Vec<ServerEvent>>) -> Self {
        Self {
            sender,
            sessions: Mutex::new(sessions),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let next = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let events = next.unwrap_or_else(|| vec![ServerEvent::CloseAcknowledged]);
        debug!(events = events.len(), "replaying session");
        for event in events {
            self.sender
                .send(event)
                .map_err(|e| TransportError::Rejected(e.to_string()))?;
        }
        Ok(())
    }

    async fn disconnect(&self) {}

    async fn send_command(&self, control: &Identity, command: &str) -> Result<(), TransportError> {
        info!(%control, command, "command recorded");
        Ok(())
    }

    fn update_keep_alive_period(&self, _period: Duration) {}
}

// ── Handler ──────────────────────────────────────────────────────────

fn replay_config(retry_delay: u64) -> Result<MiniserverConfig, CliError> {
    if !Timing::ConnectErrorDelay.contains(retry_delay) {
        let (lo, hi) = Timing::ConnectErrorDelay.bounds();
        return Err(CliError::Validation {
            field: "retry-delay".into(),
            reason: format!("{retry_delay}s is outside {lo}..={hi}s"),
        });
    }
    let retry = Duration::from_secs(retry_delay);
    let mut config = MiniserverConfig::new("replay", 0, "replay", SecretString::from(String::new()));
    config.timings = ConnectionTimings {
        first_connect_delay: Duration::ZERO,
        connect_error_delay: retry,
        user_error_delay: retry,
        com_error_delay: retry,
        ..ConnectionTimings::default()
    };
    Ok(config)
}

fn parse_exec(raw: &str) -> Result<(String, ControlCommand), CliError> {
    let (name, command) = raw.split_once('=').ok_or_else(|| CliError::Validation {
        field: "exec".into(),
        reason: format!("expected NAME=COMMAND, got '{raw}'"),
    })?;
    let command = command.trim().parse().map_err(|_| CliError::Validation {
        field: "exec".into(),
        reason: format!("unknown command '{command}' (on, off, fullup, fulldown, stop)"),
    })?;
    Ok((name.trim().to_owned(), command))
}

pub async fn handle(args: ReplayArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let execs = args
        .exec
        .iter()
        .map(String::as_str)
        .map(parse_exec)
        .collect::<Result<Vec<_>, _>>()?;
    let config = replay_config(args.retry_delay)?;
    let text = tokio::fs::read_to_string(&args.script).await?;
    let sessions = split_sessions(parse_script(&text)?);
    info!(sessions = sessions.len(), script = %args.script.display(), "replay loaded");

    let miniserver = Miniserver::new(config, |_, sender| {
        Arc::new(ScriptedTransport::new(sender, sessions))
    });

    // Keep stdout clean for machine-readable formats.
    let to_stdout = matches!(global.output, OutputFormat::Table);
    let color = output::should_color(global.color);
    let quiet = global.quiet;
    miniserver.subscribe(move |notification: &Notification| {
        let line = output::notification_line(notification, color && to_stdout);
        if to_stdout {
            output::print_output(&line, quiet);
        } else if !quiet {
            eprintln!("{line}");
        }
    });

    let mut state = miniserver.connection_state();
    miniserver.start();
    if state.wait_for(|s| s.is_terminated()).await.is_err() {
        return Err(CliError::Session {
            message: "supervisor vanished before terminating".into(),
        });
    }
    miniserver.shutdown().await;

    for (name, command) in execs {
        let control = miniserver
            .find_control_by_name(&name)
            .or_else(|| miniserver.find_control(&Identity::new(&name)))
            .ok_or_else(|| CliError::ControlNotFound {
                identifier: name.clone(),
            })?;
        let outcome = match control.execute(command).await? {
            CommandResult::Sent => "sent",
            CommandResult::Ignored => "ignored",
        };
        output::print_output(
            &format!("{command} -> {} ({outcome})", control.name()),
            global.quiet || !to_stdout,
        );
    }

    let rows: Vec<ControlRow> = miniserver
        .snapshot()
        .controls()
        .iter()
        .map(ControlRow::from)
        .collect();
    let rendered = output::render_list(global.output, &rows, |row| row.name.clone());
    output::print_output(&rendered, global.quiet);
    Ok(())
}

//! Output formatting: table, JSON, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! JSON uses serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use loxone_core::{Control, Notification};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Control rows ─────────────────────────────────────────────────────

#[derive(Debug, Serialize, Tabled)]
pub struct ControlRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Room")]
    pub room: String,
    #[tabled(rename = "Category")]
    pub category: String,
    #[tabled(rename = "Reading")]
    pub reading: String,
}

impl From<&Arc<Control>> for ControlRow {
    fn from(control: &Arc<Control>) -> Self {
        Self {
            id: control.id().to_string(),
            name: control.name(),
            kind: control.kind().to_string(),
            room: control.room().map(|r| r.name()).unwrap_or_default(),
            category: control.category().map(|c| c.name()).unwrap_or_default(),
            reading: control.reading().to_string(),
        }
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled rows in the chosen format.
pub fn render_list<R>(format: OutputFormat, rows: &[R], id_fn: impl Fn(&R) -> String) -> String
where
    R: Serialize + Tabled,
{
    match format {
        OutputFormat::Table => Table::new(rows).with(Style::rounded()).to_string(),
        OutputFormat::Json => render_json(rows),
        OutputFormat::Plain => rows.iter().map(id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Pretty-printed JSON.
pub fn render_json<T: Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Notifications ────────────────────────────────────────────────────

/// One line per notification, as printed while a session runs.
pub fn notification_line(notification: &Notification, color: bool) -> String {
    let (label, detail) = match notification {
        Notification::ConfigurationApplied { snapshot, report } => (
            "config",
            format!(
                "{} ({} rooms, {} categories, {} controls, {} states) created={} removed={} updated={} skipped={}",
                snapshot.info().miniserver_name,
                snapshot.rooms().len(),
                snapshot.categories().len(),
                snapshot.control_count(),
                snapshot.state_count(),
                report.created.len(),
                report.removed.len(),
                report.updated,
                report.skipped.len(),
            ),
        ),
        Notification::StateChanged(control) => (
            "state",
            format!("{} = {}", control.name(), control.reading()),
        ),
        Notification::Online => ("online", String::new()),
        Notification::Offline(reason) => ("offline", reason.description().to_owned()),
    };

    let label = format!("{label:>7}");
    let label = match (color, notification) {
        (false, _) => label,
        (true, Notification::Online) => label.green().bold().to_string(),
        (true, Notification::Offline(_)) => label.red().bold().to_string(),
        (true, Notification::ConfigurationApplied { .. }) => label.cyan().bold().to_string(),
        (true, Notification::StateChanged(_)) => label.yellow().to_string(),
    };
    if detail.is_empty() {
        label
    } else {
        format!("{label} {detail}")
    }
}

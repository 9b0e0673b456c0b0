// ── Command API ──
//
// Generic commands accepted by every control. Each control kind translates
// the subset it understands into the Miniserver's textual command; the rest
// are acknowledged as ignored.

use serde::{Deserialize, Serialize};

/// A device command addressed to one control.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum ControlCommand {
    On,
    Off,
    FullUp,
    FullDown,
    Stop,
}

/// Outcome of [`Control::execute`](crate::Control::execute).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    /// Translated and handed to the transport.
    Sent,
    /// The control's kind has no meaning for this command.
    Ignored,
}

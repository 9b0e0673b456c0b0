use super::Control;
use crate::command::ControlCommand;
use crate::error::CoreError;

const STATE_POSITION: &str = "position";

/// Blind / shutter view of a [`Control`] of kind `Jalousie`.
///
/// The Miniserver also reports `up` and `down` movement states; they are
/// tracked like any other state but not interpreted here.
#[derive(Debug, Clone, Copy)]
pub struct Jalousie<'a> {
    control: &'a Control,
}

impl<'a> Jalousie<'a> {
    pub(super) fn new(control: &'a Control) -> Self {
        Self { control }
    }

    pub fn control(&self) -> &'a Control {
        self.control
    }

    pub async fn move_up(&self) -> Result<(), CoreError> {
        self.control.send(ControlCommand::FullUp).await
    }

    pub async fn move_down(&self) -> Result<(), CoreError> {
        self.control.send(ControlCommand::FullDown).await
    }

    pub async fn stop(&self) -> Result<(), CoreError> {
        self.control.send(ControlCommand::Stop).await
    }

    /// Position as a whole percentage, 0 = fully up, 100 = fully down.
    pub fn position_percent(&self) -> Option<u8> {
        let value = self.control.state_value(STATE_POSITION)?;
        if !value.is_finite() {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
        let pct = (value * 100.0).round().clamp(0.0, 100.0) as u8;
        Some(pct)
    }
}

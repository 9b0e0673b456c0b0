use super::Control;
use crate::command::ControlCommand;
use crate::error::CoreError;

const STATE_ACTIVE: &str = "active";

/// On/off view of a [`Control`] of kind `Switch`.
#[derive(Debug, Clone, Copy)]
pub struct Switch<'a> {
    control: &'a Control,
}

impl<'a> Switch<'a> {
    pub(super) fn new(control: &'a Control) -> Self {
        Self { control }
    }

    pub fn control(&self) -> &'a Control {
        self.control
    }

    pub async fn turn_on(&self) -> Result<(), CoreError> {
        self.control.send(ControlCommand::On).await
    }

    pub async fn turn_off(&self) -> Result<(), CoreError> {
        self.control.send(ControlCommand::Off).await
    }

    /// `Some(true)` at 1.0, `Some(false)` at 0.0, `None` for anything else
    /// or when the control has no `active` state.
    pub fn is_on(&self) -> Option<bool> {
        let value = self.control.state_value(STATE_ACTIVE)?;
        if (value - 1.0).abs() < f64::EPSILON {
            Some(true)
        } else if value.abs() < f64::EPSILON {
            Some(false)
        } else {
            None
        }
    }
}

//! What the onboard status screen shows. Drawing pixels is left to the
//! [`StatusDisplay`] implementation.

use tracing::warn;

use crate::hal::StatusDisplay;
use crate::types::State;

/// A full screen of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Booting,
    Homing,
    Status(StatusFrame),
    /// An ambient light mode is active. `off` when the strip is dark.
    Ambient { off: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFrame {
    /// The loaded operation, e.g. `ADD 3 + 2`.
    pub operation: String,
    pub state: State,
    pub running: bool,
    pub head: usize,
}

impl StatusFrame {
    /// The large line of the status screen.
    pub fn headline(&self) -> String {
        match self.state {
            State::READY => "q0 Ready".to_string(),
            State::HALT => "qHalt".to_string(),
            State::UNDERFLOW => "qUnderflow".to_string(),
            State(id) => format!("q{} {}", id, if self.running { "RUN" } else { "PAUSE" }),
        }
    }
}

/// The status screen, or nothing when the display failed to start.
pub struct StatusPanel {
    device: Option<Box<dyn StatusDisplay>>,
}

impl StatusPanel {
    pub fn begin(mut device: Box<dyn StatusDisplay>) -> Self {
        let device = match device.begin() {
            Ok(()) => Some(device),
            Err(e) => {
                warn!(error = %e, "status display unavailable");
                None
            }
        };

        Self { device }
    }

    pub fn show(&mut self, screen: &Screen) {
        if let Some(device) = self.device.as_mut() {
            device.draw(screen);
        }
    }

    pub fn is_available(&self) -> bool {
        self.device.is_some()
    }
}

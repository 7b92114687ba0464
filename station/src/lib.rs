#![cfg_attr(not(test), no_std)]

// must stay first so the logging macros are visible in the other modules
mod fmt;

pub mod buttons;
pub mod config;
pub mod control;
pub mod display;
pub mod smoothing;
pub mod store;
pub mod tasks;

use buttons::ButtonState;
use config::Config;
use display::DisplayControl;
use store::TelemetryStore;

/// Everything the tasks share. Lives in a `static` on the device.
pub struct Station {
    pub config: Config,
    telemetry: TelemetryStore,
    display: DisplayControl,
    mode_button: ButtonState,
    backlight_button: ButtonState,
}

impl Station {
    pub const fn new(config: Config) -> Self {
        Self {
            telemetry: TelemetryStore::new(),
            display: DisplayControl::new(config.line_width),
            mode_button: ButtonState::new(),
            backlight_button: ButtonState::new(),
            config,
        }
    }

    pub fn telemetry(&self) -> &TelemetryStore {
        &self.telemetry
    }

    pub fn display(&self) -> &DisplayControl {
        &self.display
    }

    pub fn mode_button(&self) -> &ButtonState {
        &self.mode_button
    }

    pub fn backlight_button(&self) -> &ButtonState {
        &self.backlight_button
    }
}

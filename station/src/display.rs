use core::cell::RefCell;
use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::CriticalSectionMutex;
use embassy_sync::signal::Signal;
use heapless::String;
use shared::{DisplayMode, TelemetrySnapshot};

/// Bytes reserved for one custom text line, enough for 16 characters of any script.
pub const LINE_CAPACITY: usize = 64;

/// Custom text line addressed by the control interface, numbered from 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Line {
    First,
    Second,
}

impl Line {
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::First),
            2 => Some(Self::Second),
            _ => None,
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayState {
    pub mode: DisplayMode,
    pub lines: [String<LINE_CAPACITY>; 2],
    pub backlight: bool,
}

impl DisplayState {
    pub const fn new() -> Self {
        Self {
            mode: DisplayMode::Sensors,
            lines: [String::new(), String::new()],
            backlight: true,
        }
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::new()
    }
}

/// Display state shared between the input task, the control interface and presentation.
///
/// Fields are logically unrelated and are updated one at a time. Page and text changes show
/// up on the next presentation tick, backlight changes wake presentation right away.
pub struct DisplayControl {
    state: CriticalSectionMutex<RefCell<DisplayState>>,
    refresh: Signal<CriticalSectionRawMutex, ()>,
    line_width: usize,
}

impl DisplayControl {
    pub const fn new(line_width: usize) -> Self {
        Self {
            state: CriticalSectionMutex::new(RefCell::new(DisplayState::new())),
            refresh: Signal::new(),
            line_width,
        }
    }

    pub fn state(&self) -> DisplayState {
        self.state.lock(|c| c.borrow().clone())
    }

    pub fn mode(&self) -> DisplayMode {
        self.state.lock(|c| c.borrow().mode)
    }

    pub fn set_mode(&self, mode: DisplayMode) {
        self.state.lock(|c| c.borrow_mut().mode = mode);
        info!("display mode: {:?}", mode);
    }

    /// Moves to the next page and returns it.
    pub fn advance_mode(&self) -> DisplayMode {
        let mode = self.state.lock(|c| {
            let mut state = c.borrow_mut();
            state.mode = state.mode.next();
            state.mode
        });
        info!("display mode: {:?}", mode);
        mode
    }

    /// Stores the first `line_width` characters of `text`.
    pub fn set_line(&self, line: Line, text: &str) {
        let mut truncated = String::new();
        for c in text.chars().take(self.line_width) {
            if truncated.push(c).is_err() {
                break;
            }
        }
        self.state
            .lock(|c| c.borrow_mut().lines[line.index()] = truncated);
        debug!("custom text line {:?} updated", line);
    }

    pub fn backlight(&self) -> bool {
        self.state.lock(|c| c.borrow().backlight)
    }

    pub fn set_backlight(&self, on: bool) {
        self.state.lock(|c| c.borrow_mut().backlight = on);
        info!("backlight: {}", on);
        self.refresh.signal(());
    }

    /// Flips the backlight and returns the new state.
    pub fn toggle_backlight(&self) -> bool {
        let on = self.state.lock(|c| {
            let mut state = c.borrow_mut();
            state.backlight = !state.backlight;
            state.backlight
        });
        info!("backlight: {}", on);
        self.refresh.signal(());
        on
    }

    /// Resolves once the backlight was switched since the last call.
    pub async fn changed(&self) {
        self.refresh.wait().await
    }
}

/// Two rows of text and the backlight state, ready for a display driver.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub lines: [String<LINE_CAPACITY>; 2],
    pub backlight: bool,
}

impl Frame {
    pub fn banner() -> Self {
        Self::from_lines("Hydra-L v2.0", "Starting...", true)
    }

    pub fn render(state: &DisplayState, snapshot: &TelemetrySnapshot) -> Self {
        match state.mode {
            DisplayMode::Sensors => {
                let measurement = snapshot.measurement.unwrap_or_default();
                let mut frame = Self {
                    backlight: state.backlight,
                    ..Default::default()
                };
                // both rows are far below the line capacity
                let _ = write!(
                    frame.lines[0],
                    "T={:.1}C H={:.1}%",
                    measurement.temperature, measurement.humidity
                );
                let _ = write!(frame.lines[1], "P={:.1}hPa", measurement.pressure);
                frame
            }
            DisplayMode::CustomText => Self {
                lines: state.lines.clone(),
                backlight: state.backlight,
            },
            DisplayMode::NetworkInfo => Self::from_lines(
                "IP Address:",
                snapshot.network.ip_text().as_str(),
                state.backlight,
            ),
        }
    }

    fn from_lines(first: &str, second: &str, backlight: bool) -> Self {
        let mut frame = Self {
            backlight,
            ..Default::default()
        };
        let _ = frame.lines[0].push_str(first);
        let _ = frame.lines[1].push_str(second);
        frame
    }
}

//! Requests of the remote control interface. Routing and transport belong to the caller,
//! this module only understands the request bodies.

use heapless::String;
use shared::{DisplayMode, TelemetryRecord};

use crate::display::{Line, LINE_CAPACITY};
use crate::Station;

/// Which control request a body was sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Endpoint {
    /// Body is a page index `0`..`2` or a page name.
    Mode,
    /// Body is `<line>=<text>`.
    Text,
    /// Body `1` switches the backlight on, anything else off.
    Backlight,
    /// Read-only fetch of the current record, the body is ignored.
    Snapshot,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    SetMode(DisplayMode),
    SetText {
        line: Line,
        text: String<LINE_CAPACITY>,
    },
    SetBacklight(bool),
    Snapshot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    Empty,
    UnknownMode,
    UnknownLine,
    MissingSeparator,
}

impl Command {
    pub fn parse(endpoint: Endpoint, body: &str) -> Result<Self, CommandError> {
        if endpoint == Endpoint::Snapshot {
            return Ok(Command::Snapshot);
        }

        let body = body.trim_end_matches(['\r', '\n', '\0']);
        if body.is_empty() {
            return Err(CommandError::Empty);
        }

        match endpoint {
            Endpoint::Mode => DisplayMode::from_name(body.trim())
                .map(Command::SetMode)
                .ok_or(CommandError::UnknownMode),
            Endpoint::Text => {
                let (line, text) = body
                    .split_once('=')
                    .ok_or(CommandError::MissingSeparator)?;
                let line = line
                    .trim()
                    .parse::<u8>()
                    .ok()
                    .and_then(Line::from_number)
                    .ok_or(CommandError::UnknownLine)?;

                // the display truncates further to its line width
                let mut truncated = String::new();
                for c in text.chars() {
                    if truncated.push(c).is_err() {
                        break;
                    }
                }
                Ok(Command::SetText {
                    line,
                    text: truncated,
                })
            }
            Endpoint::Backlight => Ok(Command::SetBacklight(body.trim() == "1")),
            Endpoint::Snapshot => Ok(Command::Snapshot),
        }
    }

    /// Returns the record to send back for a snapshot fetch, `None` for the setters.
    pub fn apply(&self, station: &Station) -> Option<TelemetryRecord> {
        match self {
            Command::SetMode(mode) => station.display().set_mode(*mode),
            Command::SetText { line, text } => station.display().set_line(*line, text),
            Command::SetBacklight(on) => station.display().set_backlight(*on),
            Command::Snapshot => return Some(station.telemetry().record()),
        }
        None
    }
}

/// Parses and applies one request, returning the reply record of a snapshot fetch.
///
/// Only an empty body is refused. Unknown pages or lines are acknowledged and ignored,
/// leaving the display untouched.
pub fn handle(
    station: &Station,
    endpoint: Endpoint,
    body: &str,
) -> Result<Option<TelemetryRecord>, CommandError> {
    match Command::parse(endpoint, body) {
        Ok(command) => Ok(command.apply(station)),
        Err(CommandError::Empty) => Err(CommandError::Empty),
        Err(e) => {
            warn!("ignoring {:?} request: {:?}", endpoint, e);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use shared::{Measurement, NetworkStatus};

    #[test]
    fn mode_by_index_or_name() {
        assert_eq!(
            Command::parse(Endpoint::Mode, "1"),
            Ok(Command::SetMode(DisplayMode::CustomText))
        );
        assert_eq!(
            Command::parse(Endpoint::Mode, "network\n"),
            Ok(Command::SetMode(DisplayMode::NetworkInfo))
        );
        assert_eq!(
            Command::parse(Endpoint::Mode, "7"),
            Err(CommandError::UnknownMode)
        );
    }

    #[test]
    fn text_with_line_number() {
        let command = Command::parse(Endpoint::Text, "2=Hello=World").unwrap();
        match command {
            Command::SetText { line, text } => {
                assert_eq!(line, Line::Second);
                assert_eq!(text.as_str(), "Hello=World");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            Command::parse(Endpoint::Text, "3=x"),
            Err(CommandError::UnknownLine)
        );
        assert_eq!(
            Command::parse(Endpoint::Text, "hello"),
            Err(CommandError::MissingSeparator)
        );
    }

    #[test]
    fn backlight_only_on_for_one() {
        assert_eq!(
            Command::parse(Endpoint::Backlight, "1"),
            Ok(Command::SetBacklight(true))
        );
        assert_eq!(
            Command::parse(Endpoint::Backlight, "0"),
            Ok(Command::SetBacklight(false))
        );
        assert_eq!(
            Command::parse(Endpoint::Backlight, "on"),
            Ok(Command::SetBacklight(false))
        );
    }

    #[test]
    fn empty_bodies_are_refused() {
        for endpoint in [Endpoint::Mode, Endpoint::Text, Endpoint::Backlight] {
            assert_eq!(Command::parse(endpoint, ""), Err(CommandError::Empty));
            assert_eq!(Command::parse(endpoint, "\r\n"), Err(CommandError::Empty));
        }
    }

    #[test]
    fn handle_applies_commands() {
        let station = Station::new(Config::DEFAULT);

        assert_eq!(handle(&station, Endpoint::Mode, "2"), Ok(None));
        assert_eq!(station.display().mode(), DisplayMode::NetworkInfo);

        assert_eq!(
            handle(&station, Endpoint::Text, "1=A very long greeting text"),
            Ok(None)
        );
        assert_eq!(
            station.display().state().lines[0].as_str(),
            "A very long gree"
        );

        assert_eq!(handle(&station, Endpoint::Backlight, "0"), Ok(None));
        assert!(!station.display().backlight());
    }

    #[test]
    fn unknown_requests_are_acknowledged_without_effect() {
        let station = Station::new(Config::DEFAULT);
        let before = station.display().state();

        assert_eq!(handle(&station, Endpoint::Mode, "clock"), Ok(None));
        assert_eq!(handle(&station, Endpoint::Text, "9=nine"), Ok(None));
        assert_eq!(station.display().state(), before);

        assert_eq!(
            handle(&station, Endpoint::Mode, ""),
            Err(CommandError::Empty)
        );
    }

    #[test]
    fn snapshot_ignores_the_body() {
        assert_eq!(Command::parse(Endpoint::Snapshot, ""), Ok(Command::Snapshot));
        assert_eq!(
            Command::parse(Endpoint::Snapshot, "anything"),
            Ok(Command::Snapshot)
        );
    }

    #[test]
    fn snapshot_replies_with_the_current_record() {
        let station = Station::new(Config::DEFAULT);
        station.telemetry().set_network(NetworkStatus {
            connected: true,
            ip: [172, 16, 0, 9],
            mac: [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01],
            rssi: -58,
        });
        station.telemetry().publish(Measurement {
            temperature: 24.04,
            pressure: 1009.96,
            humidity: 38.75,
        });
        let before = station.display().state();

        let record = handle(&station, Endpoint::Snapshot, "")
            .unwrap()
            .unwrap();
        assert_eq!(record, station.telemetry().record());
        assert_eq!(record.temperature, 24.0);
        assert_eq!(record.pressure, 1010.0);
        assert_eq!(record.ip.as_str(), "172.16.0.9");
        assert_eq!(station.display().state(), before);
    }
}

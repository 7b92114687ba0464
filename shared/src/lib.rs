#![cfg_attr(not(test), no_std)]

use core::fmt::Write;

use heapless::String;
use serde::{Deserialize, Serialize};

/// Textual length of `aa:bb:cc:dd:ee:ff`.
pub const MAC_TEXT_LEN: usize = 17;
/// Textual length of `255.255.255.255`.
pub const IP_TEXT_LEN: usize = 15;

/// One compensated reading of the environment sensor.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Deserialize, PartialEq, Default, Clone, Copy, Debug)]
pub struct Measurement {
    /// Temperature [°C]
    pub temperature: f32,
    /// Barometric pressure [hPa]
    pub pressure: f32,
    /// Relative humidity [%RH], always within 0..=100
    pub humidity: f32,
}

/// Station link state as reported by the network event handler.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Deserialize, PartialEq, Eq, Default, Clone, Copy, Debug)]
pub struct NetworkStatus {
    pub connected: bool,
    pub ip: [u8; 4],
    pub mac: [u8; 6],
    /// Signal strength of the associated access point [dBm]
    pub rssi: i8,
}

impl NetworkStatus {
    pub fn ip_text(&self) -> String<IP_TEXT_LEN> {
        let mut text = String::new();
        let [a, b, c, d] = self.ip;
        // 15 characters always fit
        let _ = write!(text, "{}.{}.{}.{}", a, b, c, d);
        text
    }

    pub fn mac_text(&self) -> String<MAC_TEXT_LEN> {
        let mut text = String::new();
        let [a, b, c, d, e, f] = self.mac;
        let _ = write!(
            text,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, f
        );
        text
    }
}

/// Self-consistent copy of everything the station currently knows.
///
/// `measurement` stays `None` until the first successful acquisition cycle.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(PartialEq, Default, Clone, Copy, Debug)]
pub struct TelemetrySnapshot {
    pub measurement: Option<Measurement>,
    pub network: NetworkStatus,
}

impl TelemetrySnapshot {
    /// Structured record handed to the upload and query collaborators.
    pub fn record(&self) -> TelemetryRecord {
        let measurement = self.measurement.unwrap_or_default();
        TelemetryRecord {
            temperature: round_to_tenth(measurement.temperature),
            humidity: round_to_tenth(measurement.humidity),
            pressure: round_to_tenth(measurement.pressure),
            rssi: self.network.rssi as i32,
            mac: self.network.mac_text(),
            ip: self.network.ip_text(),
        }
    }
}

/// Published telemetry, values rounded to one decimal place.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct TelemetryRecord {
    /// [°C]
    pub temperature: f32,
    /// [%RH]
    pub humidity: f32,
    /// [hPa]
    pub pressure: f32,
    /// [dBm]
    pub rssi: i32,
    pub mac: String<MAC_TEXT_LEN>,
    pub ip: String<IP_TEXT_LEN>,
}

/// Page shown on the character display.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Serialize, Deserialize, PartialEq, Eq, Default, Clone, Copy, Debug)]
pub enum DisplayMode {
    #[default]
    Sensors,
    CustomText,
    NetworkInfo,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 3] = [Self::Sensors, Self::CustomText, Self::NetworkInfo];

    pub fn next(&self) -> Self {
        match self {
            Self::Sensors => Self::CustomText,
            Self::CustomText => Self::NetworkInfo,
            Self::NetworkInfo => Self::Sensors,
        }
    }


    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sensors => "sensors",
            Self::CustomText => "text",
            Self::NetworkInfo => "network",
        }
    }

    /// Accepts either the page name or its single-digit index.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.as_bytes() {
            [digit @ b'0'..=b'9'] => Self::from_index(digit - b'0'),
            _ => Self::ALL
                .iter()
                .copied()
                .find(|mode| mode.name().eq_ignore_ascii_case(name)),
        }
    }
}

/// Half-away-from-zero rounding, `core` has no `f32::round`.
fn round_to_tenth(value: f32) -> f32 {
    let scaled = value * 10.0;
    let rounded = if scaled >= 0.0 {
        (scaled + 0.5) as i32
    } else {
        (scaled - 0.5) as i32
    };
    rounded as f32 / 10.0
}

use embassy_time::Duration;

/// Reported as `Version` in every upload.
pub const FIRMWARE_VERSION: &str = "2024-03-20";

/// Schedules and policies of the station tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub acquisition_period: Duration,
    pub presentation_period: Duration,
    pub upload_period: Duration,
    pub input_period: Duration,
    /// Edges closer than this to the last accepted press of the same button are dropped.
    pub debounce: Duration,
    /// Upper bound of one sensor read, the cycle is skipped when it elapses.
    pub bus_timeout: Duration,
    /// Characters kept from a custom text line.
    pub line_width: usize,
    /// Reported to the upload collaborator with every record.
    pub device_name: &'static str,
}

impl Config {
    pub const DEFAULT: Config = Config {
        acquisition_period: Duration::from_secs(5),
        presentation_period: Duration::from_secs(2),
        upload_period: Duration::from_secs(60),
        input_period: Duration::from_millis(50),
        debounce: Duration::from_millis(50),
        bus_timeout: Duration::from_secs(1),
        line_width: 16,
        device_name: "Hydra-L-001",
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

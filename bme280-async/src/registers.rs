//! Register map and control register encoding.

pub const PRIMARY_ADDRESS: u8 = 0x76;
pub const SECONDARY_ADDRESS: u8 = 0x77;

pub const CHIP_ID: u8 = 0x60;
pub const SOFT_RESET_COMMAND: u8 = 0xb6;

#[allow(unused)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// First byte of the temperature/pressure calibration block, `dig_H1` at its end
    CalibrationA = 0x88,
    ChipId = 0xd0,
    Reset = 0xe0,
    /// First byte of the humidity calibration block
    CalibrationB = 0xe1,
    CtrlHum = 0xf2,
    Status = 0xf3,
    CtrlMeas = 0xf4,
    Config = 0xf5,
    /// press_msb, press_lsb, press_xlsb, temp_msb, temp_lsb, temp_xlsb, hum_msb, hum_lsb
    Data = 0xf7,
}

impl From<Register> for u8 {
    fn from(value: Register) -> Self {
        value as u8
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oversampling {
    Skipped = 0,
    X1 = 1,
    X2 = 2,
    X4 = 3,
    X8 = 4,
    X16 = 5,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Sleep = 0,
    Forced = 1,
    Normal = 3,
}

/// Inactive period between two measurements in normal mode.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Standby {
    Ms0_5 = 0,
    Ms62_5 = 1,
    Ms125 = 2,
    Ms250 = 3,
    Ms500 = 4,
    Ms1000 = 5,
    Ms10 = 6,
    Ms20 = 7,
}

/// IIR filter coefficient.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Filter {
    Off = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    pub temperature_oversampling: Oversampling,
    pub pressure_oversampling: Oversampling,
    pub humidity_oversampling: Oversampling,
    pub mode: Mode,
    pub standby: Standby,
    pub filter: Filter,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temperature_oversampling: Oversampling::X1,
            pressure_oversampling: Oversampling::X1,
            humidity_oversampling: Oversampling::X1,
            mode: Mode::Normal,
            standby: Standby::Ms0_5,
            filter: Filter::Off,
        }
    }
}

impl Settings {
    pub fn ctrl_hum(&self) -> u8 {
        self.humidity_oversampling as u8
    }

    pub fn config(&self) -> u8 {
        (self.standby as u8) << 5 | (self.filter as u8) << 2
    }

    pub fn ctrl_meas(&self) -> u8 {
        (self.temperature_oversampling as u8) << 5
            | (self.pressure_oversampling as u8) << 2
            | self.mode as u8
    }
}

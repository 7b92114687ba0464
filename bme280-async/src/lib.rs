#![cfg_attr(not(test), no_std)]

// must stay first so the logging macros are visible in the other modules
mod fmt;

pub mod calibration;
pub mod compensation;
pub mod registers;

use embedded_hal_async::{
    delay::DelayNs,
    i2c::{self, I2c},
};

pub use calibration::{CalibrationSet, InvalidBlockLength, RawSample};
pub use compensation::{compensate, DegenerateCompensation, Measurement};
pub use registers::{Settings, PRIMARY_ADDRESS, SECONDARY_ADDRESS};

use calibration::{CALIBRATION_A_LEN, CALIBRATION_B_LEN, MEASUREMENT_LEN};
use registers::{Register, CHIP_ID, SOFT_RESET_COMMAND};

/// Datasheet start-up time is 2 ms, the vendor driver waits far longer after a reset.
const RESET_DELAY_MS: u32 = 100;

#[derive(Debug)]
pub enum Error<E> {
    Bus(E),
    /// The device did not acknowledge its address or a data byte.
    Nack(E),
    /// Set by callers that bound bus transactions in time.
    Timeout,
    UnexpectedDeviceId(u8),
    InvalidBlockLength { expected: usize, actual: usize },
}

/// Payload-free classification of [`Error`], usable in log statements for any bus error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    Bus,
    Nack,
    Timeout,
    UnexpectedDeviceId,
    InvalidBlockLength,
}

impl<E> Error<E> {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Bus(_) => ErrorKind::Bus,
            Error::Nack(_) => ErrorKind::Nack,
            Error::Timeout => ErrorKind::Timeout,
            Error::UnexpectedDeviceId(_) => ErrorKind::UnexpectedDeviceId,
            Error::InvalidBlockLength { .. } => ErrorKind::InvalidBlockLength,
        }
    }
}

impl<E: i2c::Error> From<E> for Error<E> {
    fn from(e: E) -> Self {
        match e.kind() {
            i2c::ErrorKind::NoAcknowledge(_) => Self::Nack(e),
            _ => Self::Bus(e),
        }
    }
}

impl<E> From<InvalidBlockLength> for Error<E> {
    fn from(e: InvalidBlockLength) -> Self {
        Error::InvalidBlockLength {
            expected: e.expected,
            actual: e.actual,
        }
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "bus error: {:?}", e),
            Error::Nack(e) => write!(f, "not acknowledged: {:?}", e),
            Error::Timeout => write!(f, "bus transaction timed out"),
            Error::UnexpectedDeviceId(id) => {
                write!(f, "unexpected chip id 0x{:02x}, expected 0x{:02x}", id, CHIP_ID)
            }
            Error::InvalidBlockLength { expected, actual } => {
                write!(f, "register block of {} bytes, expected {}", actual, expected)
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl<E: defmt::Format> defmt::Format for Error<E> {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::Bus(e) => defmt::write!(fmt, "Bus({})", e),
            Error::Nack(e) => defmt::write!(fmt, "Nack({})", e),
            Error::Timeout => defmt::write!(fmt, "Timeout"),
            Error::UnexpectedDeviceId(id) => {
                defmt::write!(fmt, "UnexpectedDeviceId({=u8:#x})", id)
            }
            Error::InvalidBlockLength { expected, actual } => defmt::write!(
                fmt,
                "InvalidBlockLength(expected {}, actual {})",
                expected,
                actual
            ),
        }
    }
}

pub struct Bme280<T>
where
    T: I2c,
{
    bus: T,
    address: u8,
    calibration: CalibrationSet,
}

impl<T> Bme280<T>
where
    T: I2c,
{
    /// Probes, resets and configures the sensor with [`Settings::default`].
    pub async fn init(
        bus: T,
        address: u8,
        delay: &mut impl DelayNs,
    ) -> Result<Self, Error<T::Error>> {
        Self::with_settings(bus, address, Settings::default(), delay).await
    }

    pub async fn with_settings(
        bus: T,
        address: u8,
        settings: Settings,
        delay: &mut impl DelayNs,
    ) -> Result<Self, Error<T::Error>> {
        let mut sensor = Self {
            bus,
            address,
            calibration: CalibrationSet::default(),
        };

        let mut id = [0u8; 1];
        sensor.read_block(Register::ChipId, &mut id).await?;
        if id[0] != CHIP_ID {
            error!("unexpected chip id {} at address {}", id[0], address);
            return Err(Error::UnexpectedDeviceId(id[0]));
        }
        debug!("BME280 found at address {}", address);

        sensor
            .write_register(Register::Reset, SOFT_RESET_COMMAND)
            .await?;
        delay.delay_ms(RESET_DELAY_MS).await;

        let mut block_a = [0u8; CALIBRATION_A_LEN];
        let mut block_b = [0u8; CALIBRATION_B_LEN];
        sensor
            .read_block(Register::CalibrationA, &mut block_a)
            .await?;
        sensor
            .read_block(Register::CalibrationB, &mut block_b)
            .await?;
        sensor.calibration = CalibrationSet::decode(&block_a, &block_b)?;

        // ctrl_hum only takes effect after the following ctrl_meas write
        sensor
            .write_register(Register::CtrlHum, settings.ctrl_hum())
            .await?;
        sensor
            .write_register(Register::Config, settings.config())
            .await?;
        sensor
            .write_register(Register::CtrlMeas, settings.ctrl_meas())
            .await?;

        info!("BME280 initialized");
        Ok(sensor)
    }

    pub async fn read_raw(&mut self) -> Result<RawSample, Error<T::Error>> {
        let mut block = [0u8; MEASUREMENT_LEN];
        self.read_block(Register::Data, &mut block).await?;
        Ok(RawSample::decode(&block)?)
    }

    pub async fn measure(&mut self) -> Result<Measurement, Error<T::Error>> {
        let raw = self.read_raw().await?;
        Ok(compensate(&self.calibration, &raw))
    }

    pub fn release(self) -> T {
        self.bus
    }

    async fn read_block(
        &mut self,
        register: Register,
        buffer: &mut [u8],
    ) -> Result<(), Error<T::Error>> {
        self.bus
            .write_read(self.address, &[register.into()], buffer)
            .await?;
        Ok(())
    }

    async fn write_register(
        &mut self,
        register: Register,
        value: u8,
    ) -> Result<(), Error<T::Error>> {
        self.bus
            .write(self.address, &[register.into(), value])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embedded_hal_async::i2c::{ErrorKind as BusErrorKind, NoAcknowledgeSource, Operation};

    /// Register file of a sensor at one address, with the auto-incrementing register pointer.
    struct FakeBus {
        address: u8,
        registers: [u8; 256],
        pointer: u8,
        writes: Vec<(u8, u8)>,
    }

    impl FakeBus {
        fn new(address: u8) -> Self {
            let mut registers = [0u8; 256];
            registers[0xd0] = CHIP_ID;
            // dig_T1 = 27504, dig_T2 = 26435, dig_T3 = -1000
            registers[0x88..0x8e].copy_from_slice(&[0x70, 0x6b, 0x43, 0x67, 0x18, 0xfc]);
            // dig_P1..dig_P9
            registers[0x8e..0xa0].copy_from_slice(&[
                0x7d, 0x8e, 0x43, 0xd6, 0xd0, 0x0b, 0x27, 0x0b, 0x8c, 0x00, 0xf9, 0xff, 0x8c,
                0x3c, 0xf8, 0xc6, 0x70, 0x17,
            ]);
            registers[0xa1] = 75;
            // dig_H2 = 362, dig_H3 = 0, dig_H4 = 313, dig_H5 = 50, dig_H6 = 30
            registers[0xe1..0xe8].copy_from_slice(&[0x6a, 0x01, 0x00, 0x13, 0x29, 0x03, 0x1e]);
            registers[0xf7..0xff]
                .copy_from_slice(&[0x65, 0x5a, 0xc0, 0x7e, 0xed, 0x00, 0x7d, 0x00]);

            Self {
                address,
                registers,
                pointer: 0,
                writes: Vec::new(),
            }
        }
    }

    impl i2c::ErrorType for FakeBus {
        type Error = BusErrorKind;
    }

    impl I2c for FakeBus {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if address != self.address {
                return Err(BusErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            for operation in operations {
                match operation {
                    Operation::Write(bytes) => {
                        if let Some((pointer, data)) = bytes.split_first() {
                            self.pointer = *pointer;
                            for value in data {
                                self.writes.push((self.pointer, *value));
                                self.registers[self.pointer as usize] = *value;
                                self.pointer = self.pointer.wrapping_add(1);
                            }
                        }
                    }
                    Operation::Read(buffer) => {
                        for byte in buffer.iter_mut() {
                            *byte = self.registers[self.pointer as usize];
                            self.pointer = self.pointer.wrapping_add(1);
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDelay {
        elapsed_ns: u64,
    }

    impl DelayNs for FakeDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.elapsed_ns += u64::from(ns);
        }
    }

    #[test]
    fn init_configures_in_order() {
        let mut delay = FakeDelay::default();
        let sensor = block_on(Bme280::init(
            FakeBus::new(PRIMARY_ADDRESS),
            PRIMARY_ADDRESS,
            &mut delay,
        ))
        .unwrap();

        assert!(delay.elapsed_ns >= 100_000_000);
        assert_eq!(sensor.calibration.dig_t1, 27504);
        assert_eq!(sensor.calibration.dig_p9, 6000);
        assert_eq!(sensor.calibration.dig_h4, 313);
        assert_eq!(sensor.calibration.dig_h5, 50);

        let bus = sensor.release();
        assert_eq!(
            bus.writes,
            vec![(0xe0, 0xb6), (0xf2, 0x01), (0xf5, 0x00), (0xf4, 0x27)]
        );
    }

    #[test]
    fn init_applies_custom_settings() {
        let settings = Settings {
            filter: registers::Filter::X16,
            standby: registers::Standby::Ms1000,
            ..Settings::default()
        };
        let sensor = block_on(Bme280::with_settings(
            FakeBus::new(SECONDARY_ADDRESS),
            SECONDARY_ADDRESS,
            settings,
            &mut FakeDelay::default(),
        ))
        .unwrap();

        let bus = sensor.release();
        assert_eq!(bus.registers[0xf5], 0b101_100_00);
    }

    #[test]
    fn init_rejects_other_parts() {
        let mut bus = FakeBus::new(PRIMARY_ADDRESS);
        // BMP280
        bus.registers[0xd0] = 0x58;
        let result = block_on(Bme280::init(bus, PRIMARY_ADDRESS, &mut FakeDelay::default()));
        assert!(matches!(result, Err(Error::UnexpectedDeviceId(0x58))));
    }

    #[test]
    fn missing_device_is_a_nack() {
        let result = block_on(Bme280::init(
            FakeBus::new(SECONDARY_ADDRESS),
            PRIMARY_ADDRESS,
            &mut FakeDelay::default(),
        ));
        let error = result.err().unwrap();
        assert_eq!(error.kind(), ErrorKind::Nack);
    }

    #[test]
    fn measure_compensates_the_data_block() {
        let mut sensor = block_on(Bme280::init(
            FakeBus::new(PRIMARY_ADDRESS),
            PRIMARY_ADDRESS,
            &mut FakeDelay::default(),
        ))
        .unwrap();

        let raw = block_on(sensor.read_raw()).unwrap();
        assert_eq!(raw.temperature, 519888);
        assert_eq!(raw.pressure, 415148);

        let measurement = block_on(sensor.measure()).unwrap();
        assert_eq!(measurement.temperature, 25.08);
        assert_eq!(measurement.pressure, 1006.56);
        assert_eq!(measurement.humidity, 67689.0 / 1024.0);
    }

    #[test]
    fn errors_describe_themselves() {
        let error: Error<BusErrorKind> = InvalidBlockLength {
            expected: 8,
            actual: 3,
        }
        .into();
        assert_eq!(error.kind(), ErrorKind::InvalidBlockLength);
        assert_eq!(
            error.to_string(),
            "register block of 3 bytes, expected 8"
        );
        assert_eq!(
            Error::<BusErrorKind>::UnexpectedDeviceId(0x58).to_string(),
            "unexpected chip id 0x58, expected 0x60"
        );

        let bus: Error<BusErrorKind> = BusErrorKind::ArbitrationLoss.into();
        assert_eq!(bus.kind(), ErrorKind::Bus);
    }
}

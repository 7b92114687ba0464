use bme280_async::{Bme280, Error};
use embassy_time::{with_timeout, Duration, Ticker};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use shared::Measurement;

use crate::smoothing::Smoother;
use crate::Station;

const RESET_ALLOWANCE_MS: u64 = 100;

/// Source of compensated measurements.
#[allow(async_fn_in_trait)]
pub trait Sensor {
    type BusError;

    async fn measure(&mut self) -> Result<Measurement, Error<Self::BusError>>;
}

impl<T: I2c> Sensor for Bme280<T> {
    type BusError = T::Error;

    async fn measure(&mut self) -> Result<Measurement, Error<T::Error>> {
        let measurement = Bme280::measure(self).await?;
        Ok(Measurement {
            temperature: measurement.temperature,
            pressure: measurement.pressure,
            humidity: measurement.humidity,
        })
    }
}

impl<S: Sensor> Sensor for &mut S {
    type BusError = S::BusError;

    async fn measure(&mut self) -> Result<Measurement, Error<S::BusError>> {
        (**self).measure().await
    }
}

/// Brings up the sensor at `address`, giving up after the configured bus timeout.
pub async fn init_sensor<T: I2c, D: DelayNs>(
    station: &Station,
    bus: T,
    address: u8,
    delay: &mut D,
) -> Result<Bme280<T>, Error<T::Error>> {
    // the reset delay is part of the sequence, bound it together with the bus transactions
    let timeout = station.config.bus_timeout + Duration::from_millis(RESET_ALLOWANCE_MS);
    match with_timeout(timeout, Bme280::init(bus, address, delay)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout),
    }
}

/// Reads the sensor once, smooths the result and publishes it.
///
/// On failure nothing is published and the smoothing history is left untouched.
pub async fn cycle<S: Sensor>(
    station: &Station,
    sensor: &mut S,
    smoother: &mut Smoother,
) -> Result<Measurement, Error<S::BusError>> {
    let measurement = match with_timeout(station.config.bus_timeout, sensor.measure()).await {
        Ok(result) => result?,
        Err(_) => return Err(Error::Timeout),
    };

    let smoothed = smoother.push(measurement);
    station.telemetry().publish(smoothed);
    info!(
        "T={}C H={}% P={}hPa",
        smoothed.temperature,
        smoothed.humidity,
        smoothed.pressure
    );
    Ok(smoothed)
}

pub async fn run<S: Sensor>(station: &Station, mut sensor: S) {
    let mut smoother = Smoother::new();
    let mut ticker = Ticker::every(station.config.acquisition_period);

    loop {
        if let Err(e) = cycle(station, &mut sensor, &mut smoother).await {
            error!("failed to read sensor: {:?}", e.kind());
        }
        ticker.next().await;
    }
}

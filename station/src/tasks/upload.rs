use core::fmt::Write;

use embassy_time::Ticker;
use heapless::String;
use shared::TelemetryRecord;

use crate::config::FIRMWARE_VERSION;
use crate::Station;

pub const PAYLOAD_CAPACITY: usize = 352;

/// JSON document sent to the collector, `Serial` is the device name.
pub fn json_payload(
    device: &str,
    record: &TelemetryRecord,
) -> Result<String<PAYLOAD_CAPACITY>, core::fmt::Error> {
    let mut payload = String::new();
    write!(
        &mut payload,
        r#"{{"system":{{"Serial":"{}","Version":"{}","RSSI":{},"MAC":"{}","IP":"{}"}},"BME280":{{"temp":{:.1},"humidity":{:.1},"pressure":{:.1}}}}}"#,
        device,
        FIRMWARE_VERSION,
        record.rssi,
        record.mac,
        record.ip,
        record.temperature,
        record.humidity,
        record.pressure
    )?;
    Ok(payload)
}

/// Remote sink of telemetry records, e.g. an MQTT or HTTP client.
#[allow(async_fn_in_trait)]
pub trait Uploader {
    type Error;

    async fn upload(&mut self, device: &str, record: &TelemetryRecord) -> Result<(), Self::Error>;
}

impl<U: Uploader> Uploader for &mut U {
    type Error = U::Error;

    async fn upload(&mut self, device: &str, record: &TelemetryRecord) -> Result<(), U::Error> {
        (**self).upload(device, record).await
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    Sent,
    /// No link, nothing was attempted.
    Offline,
}

/// Sends the current record if the station is connected.
pub async fn cycle<U: Uploader>(station: &Station, uploader: &mut U) -> Result<Outcome, U::Error> {
    let snapshot = station.telemetry().snapshot();
    if !snapshot.network.connected {
        debug!("not connected, skipping upload");
        return Ok(Outcome::Offline);
    }

    uploader
        .upload(station.config.device_name, &snapshot.record())
        .await?;
    Ok(Outcome::Sent)
}

pub async fn run<U: Uploader>(station: &Station, mut uploader: U) {
    let mut ticker = Ticker::every(station.config.upload_period);

    loop {
        match cycle(station, &mut uploader).await {
            Ok(Outcome::Sent) => info!("telemetry uploaded"),
            Ok(Outcome::Offline) => {}
            Err(_) => error!("failed to upload telemetry"),
        }
        ticker.next().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use embassy_futures::block_on;
    use shared::{Measurement, NetworkStatus};

    #[derive(Default)]
    struct RecordingUploader {
        sent: Vec<(std::string::String, TelemetryRecord)>,
        fail: bool,
    }

    impl Uploader for RecordingUploader {
        type Error = ();

        async fn upload(&mut self, device: &str, record: &TelemetryRecord) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.sent.push((device.into(), record.clone()));
            Ok(())
        }
    }

    fn connected() -> NetworkStatus {
        NetworkStatus {
            connected: true,
            ip: [192, 168, 0, 17],
            mac: [0xa4, 0xcf, 0x12, 0x00, 0x00, 0x01],
            rssi: -61,
        }
    }

    #[test]
    fn offline_station_does_not_upload() {
        let station = Station::new(Config::DEFAULT);
        let mut uploader = RecordingUploader::default();

        assert_eq!(block_on(cycle(&station, &mut uploader)), Ok(Outcome::Offline));
        assert!(uploader.sent.is_empty());
    }

    #[test]
    fn connected_station_uploads_rounded_record() {
        let station = Station::new(Config {
            device_name: "Hydra-L-042",
            ..Config::DEFAULT
        });
        station.telemetry().set_network(connected());
        station.telemetry().publish(Measurement {
            temperature: 18.27,
            pressure: 1001.94,
            humidity: 71.05,
        });
        let mut uploader = RecordingUploader::default();

        assert_eq!(block_on(cycle(&station, &mut uploader)), Ok(Outcome::Sent));

        let (device, record) = &uploader.sent[0];
        assert_eq!(device, "Hydra-L-042");
        assert_eq!(record.temperature, 18.3);
        assert_eq!(record.pressure, 1001.9);
        assert_eq!(record.rssi, -61);
        assert_eq!(record.mac.as_str(), "a4:cf:12:00:00:01");
    }

    #[test]
    fn lost_link_stops_uploads() {
        let station = Station::new(Config::DEFAULT);
        station.telemetry().set_network(connected());
        let mut uploader = RecordingUploader::default();
        block_on(cycle(&station, &mut uploader)).unwrap();

        station.telemetry().set_network(NetworkStatus {
            connected: false,
            ..connected()
        });
        assert_eq!(block_on(cycle(&station, &mut uploader)), Ok(Outcome::Offline));
        assert_eq!(uploader.sent.len(), 1);
    }

    #[test]
    fn transport_errors_are_returned() {
        let station = Station::new(Config::DEFAULT);
        station.telemetry().set_network(connected());
        let mut uploader = RecordingUploader {
            fail: true,
            ..Default::default()
        };
        assert_eq!(block_on(cycle(&station, &mut uploader)), Err(()));
    }

    #[test]
    fn payload_layout() {
        let station = Station::new(Config::DEFAULT);
        station.telemetry().set_network(connected());
        station.telemetry().publish(Measurement {
            temperature: 20.44,
            pressure: 879.74,
            humidity: 60.44,
        });

        let payload = json_payload("Hydra-L-001", &station.telemetry().record()).unwrap();
        assert_eq!(
            payload.as_str(),
            concat!(
                r#"{"system":{"Serial":"Hydra-L-001","Version":"2024-03-20","RSSI":-61,"#,
                r#""MAC":"a4:cf:12:00:00:01","IP":"192.168.0.17"},"#,
                r#""BME280":{"temp":20.4,"humidity":60.4,"pressure":879.7}}"#
            )
        );
    }

    #[test]
    fn longest_record_fits_the_payload() {
        let record = TelemetryRecord {
            temperature: -40.0,
            humidity: 100.0,
            pressure: 1100.0,
            rssi: -128,
            mac: "ff:ff:ff:ff:ff:ff".try_into().unwrap(),
            ip: "255.255.255.255".try_into().unwrap(),
        };
        assert!(json_payload("Hydra-L-001-greenhouse-north", &record).is_ok());
    }
}

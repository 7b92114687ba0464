use core::fmt::Write;

use embassy_net::tcp::TcpSocket;
use embassy_net::Ipv4Address;
use embassy_time::{with_timeout, Duration, Timer};
use esp_wifi::wifi::{
    ClientConfiguration, Configuration, WifiController, WifiDevice, WifiEvent, WifiStaDevice,
    WifiState,
};
use heapless::String;
use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::utils::rng_generator::CountingRng;
use shared::{NetworkStatus, TelemetryRecord};
use static_cell::make_static;
use station::control::{self, Endpoint};
use station::tasks::upload::{json_payload, Uploader};
use station::Station;

pub type WifiStack = embassy_net::Stack<WifiDevice<'static, WifiStaDevice>>;

const SSID: &str = env!("SSID");
const PASSWORD: &str = env!("PASSWORD");
const SERVER_IP: &str = env!("SERVER_IP");
const MQTT_PORT: u16 = 1883;

const PACKET_SIZE: usize = 512;
fn broker_address() -> Ipv4Address {
    let mut octets = [0u8; 4];
    let mut parts = SERVER_IP.splitn(4, '.');
    for octet in octets.iter_mut() {
        match parts.next().map(str::parse::<u8>) {
            Some(Ok(value)) => *octet = value,
            _ => defmt::panic!("SERVER_IP is not an IPv4 address: {}", SERVER_IP),
        }
    }
    Ipv4Address(octets)
}

fn client_config(client_id: &str) -> ClientConfig<'_, 5, CountingRng> {
    let mut config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(20000));
    config.add_max_subscribe_qos(QualityOfService::QoS0);
    config.add_client_id(client_id);
    config.max_packet_size = PACKET_SIZE as u32;
    config
}

/// Keeps the station associated and mirrors the link state into the telemetry store.
pub async fn connection(
    mut controller: WifiController<'static>,
    stack: &'static WifiStack,
    station: &Station,
) {
    loop {
        if esp_wifi::wifi::get_wifi_state() == WifiState::StaConnected {
            // wait until we're no longer connected
            controller
                .wait_for_event(WifiEvent::StaDisconnected)
                .await;
            defmt::warn!("wifi disconnected");
            station.telemetry().set_network(NetworkStatus {
                connected: false,
                ..station.telemetry().network()
            });
            Timer::after(Duration::from_millis(5000)).await
        }
        if !matches!(controller.is_started(), Ok(true)) {
            let (Ok(ssid), Ok(password)) = (SSID.try_into(), PASSWORD.try_into()) else {
                defmt::panic!("SSID or PASSWORD too long");
            };
            let client_config = Configuration::Client(ClientConfiguration {
                ssid,
                password,
                ..Default::default()
            });
            if let Err(e) = controller.set_configuration(&client_config) {
                defmt::panic!("invalid wifi configuration: {:?}", e);
            }
            if let Err(e) = controller.start().await {
                defmt::error!("failed to start wifi: {:?}", e);
                Timer::after(Duration::from_millis(5000)).await;
                continue;
            }
        }

        match controller.connect().await {
            Ok(_) => {
                defmt::info!("wifi connected");
                let status = network_status(&mut controller, stack).await;
                defmt::info!(
                    "got IP {}, RSSI {} dBm",
                    status.ip_text().as_str(),
                    status.rssi
                );
                station.telemetry().set_network(status);
            }
            Err(e) => {
                defmt::error!("failed to connect to wifi: {:?}", e);
                Timer::after(Duration::from_millis(5000)).await
            }
        }
    }
}

async fn network_status(
    controller: &mut WifiController<'static>,
    stack: &'static WifiStack,
) -> NetworkStatus {
    let ip = loop {
        if let Some(config) = stack.config_v4() {
            break config.address.address().0;
        }
        Timer::after(Duration::from_millis(500)).await;
    };

    let rssi = match controller.scan_n::<8>().await {
        Ok((access_points, _)) => access_points
            .iter()
            .find(|ap| ap.ssid.as_str() == SSID)
            .map(|ap| ap.signal_strength)
            .unwrap_or(0),
        Err(_) => {
            defmt::warn!("scan failed, RSSI unknown");
            0
        }
    };

    let mut mac = [0u8; 6];
    esp_wifi::wifi::get_sta_mac(&mut mac);

    NetworkStatus {
        connected: true,
        ip,
        mac,
        rssi,
    }
}

#[derive(Clone, Copy, Debug, defmt::Format)]
pub enum UploadError {
    Payload,
    Connect,
    Broker,
    Publish,
}

/// Publishes every record on `<device>/telemetry`, one short MQTT session per upload.
pub struct MqttUploader {
    stack: &'static WifiStack,
    broker: Ipv4Address,
    rx_buffer: &'static mut [u8; 1024],
    tx_buffer: &'static mut [u8; 1024],
}

impl MqttUploader {
    pub fn new(stack: &'static WifiStack) -> Self {
        Self {
            stack,
            broker: broker_address(),
            rx_buffer: make_static!([0; 1024]),
            tx_buffer: make_static!([0; 1024]),
        }
    }
}

impl Uploader for MqttUploader {
    type Error = UploadError;

    async fn upload(&mut self, device: &str, record: &TelemetryRecord) -> Result<(), UploadError> {
        let payload = json_payload(device, record).map_err(|_| UploadError::Payload)?;

        let mut topic = String::<64>::new();
        write!(&mut topic, "{}/telemetry", device).map_err(|_| UploadError::Payload)?;

        let mut socket =
            TcpSocket::new(self.stack, &mut self.rx_buffer[..], &mut self.tx_buffer[..]);
        socket
            .connect((self.broker, MQTT_PORT))
            .await
            .map_err(|_| UploadError::Connect)?;

        let mut recv_buffer = [0; 128];
        let mut write_buffer = [0; PACKET_SIZE];
        let mut client = MqttClient::<_, 5, _>::new(
            socket,
            &mut write_buffer,
            PACKET_SIZE,
            &mut recv_buffer,
            128,
            client_config(device),
        );

        client
            .connect_to_broker()
            .await
            .map_err(|_| UploadError::Broker)?;
        client
            .send_message(&topic, payload.as_bytes(), QualityOfService::QoS0, false)
            .await
            .map_err(|_| UploadError::Publish)?;

        // do not remove as the mqtt message will not be sent.
        // rust mqtt doesn't support flushing at the moment
        Timer::after_secs(2).await;
        if client.disconnect().await.is_err() {
            defmt::debug!("MQTT disconnect was not acknowledged");
        }
        Ok(())
    }
}

/// Applies control requests published on `<device>/mode`, `<device>/text` and
/// `<device>/backlight`. A message on `<device>/get` is answered with the current record on
/// `<device>/snapshot`.
pub async fn control(stack: &'static WifiStack, station: &Station) {
    let broker = broker_address();
    let device = station.config.device_name;
    let rx_buffer = make_static!([0; 1024]);
    let tx_buffer = make_static!([0; 1024]);

    let mut topics: [String<64>; 5] = Default::default();
    for (topic, suffix) in topics
        .iter_mut()
        .zip(["mode", "text", "backlight", "get", "snapshot"])
    {
        if write!(topic, "{}/{}", device, suffix).is_err() {
            defmt::error!("device name too long for control topics");
            return;
        }
    }

    let mut client_id = String::<40>::new();
    let _ = write!(&mut client_id, "{}-control", device);

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buffer[..], &mut tx_buffer[..]);
        if socket.connect((broker, MQTT_PORT)).await.is_err() {
            defmt::error!("failed to connect to MQTT broker");
            Timer::after_secs(5).await;
            continue;
        }

        let mut recv_buffer = [0; PACKET_SIZE];
        let mut write_buffer = [0; PACKET_SIZE];
        let mut client = MqttClient::<_, 5, _>::new(
            socket,
            &mut write_buffer,
            PACKET_SIZE,
            &mut recv_buffer,
            PACKET_SIZE,
            client_config(&client_id),
        );

        if client.connect_to_broker().await.is_err() {
            defmt::error!("failed to connect to MQTT broker");
            Timer::after_secs(5).await;
            continue;
        }

        let mut subscribed = true;
        let (requests, reply_topic) = topics.split_at(4);
        for topic in requests {
            if client.subscribe_to_topic(topic).await.is_err() {
                subscribed = false;
                break;
            }
        }
        if !subscribed {
            defmt::error!("failed to subscribe to control topics");
            Timer::after_secs(5).await;
            continue;
        }

        loop {
            let mut idle = false;
            let mut reply = None;
            match with_timeout(Duration::from_secs(30), client.receive_message()).await {
                Ok(Ok((topic, body))) => {
                    let endpoint = match topic.rsplit('/').next() {
                        Some("mode") => Some(Endpoint::Mode),
                        Some("text") => Some(Endpoint::Text),
                        Some("backlight") => Some(Endpoint::Backlight),
                        Some("get") => Some(Endpoint::Snapshot),
                        _ => None,
                    };
                    match (endpoint, core::str::from_utf8(body)) {
                        (Some(endpoint), Ok(body)) => {
                            match control::handle(station, endpoint, body) {
                                Ok(record) => reply = record,
                                Err(_) => defmt::warn!("empty {:?} request", endpoint),
                            }
                        }
                        _ => defmt::warn!("unexpected control message on {}", topic),
                    }
                }
                Ok(Err(_)) => {
                    defmt::error!("MQTT control session lost");
                    break;
                }
                Err(_) => idle = true,
            }

            if let Some(record) = reply {
                let Ok(payload) = json_payload(device, &record) else {
                    defmt::error!("snapshot does not fit the payload buffer");
                    continue;
                };
                if client
                    .send_message(
                        &reply_topic[0],
                        payload.as_bytes(),
                        QualityOfService::QoS0,
                        false,
                    )
                    .await
                    .is_err()
                {
                    defmt::error!("MQTT control session lost");
                    break;
                }
            }

            if idle && client.send_ping().await.is_err() {
                defmt::error!("MQTT control session lost");
                break;
            }
        }
        Timer::after_secs(5).await;
    }
}

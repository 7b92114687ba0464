#![no_std]
#![no_main]
#![feature(type_alias_impl_trait)]

mod net;
mod oled;

use bme280_async::Bme280;
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, StackResources};
use embassy_time::Delay;
use esp_backtrace as _;
use esp_println as _;
use hal::embassy;
use hal::gpio::{GpioPin, Input, PullUp};
use hal::i2c::I2C;
use hal::spi::{master::Spi, SpiMode};
use hal::Rng;
use hal::{clock::ClockControl, peripherals::Peripherals, prelude::*, IO};
use static_cell::make_static;
use station::config::Config;
use station::display::Frame;
use station::tasks::{self, presentation::TextDisplay};
use station::Station;

use crate::net::{MqttUploader, WifiStack};
use crate::oled::Oled;

const DEVICE_NAME: &str = env!("DEVICE_NAME");

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    defmt::error!("panic: {:?}", defmt::Debug2Format(info));
    hal::reset::software_reset();
    loop {}
}

static STATION: Station = Station::new(Config {
    device_name: DEVICE_NAME,
    ..Config::DEFAULT
});

type SensorBus = I2C<'static, hal::peripherals::I2C0>;

#[main]
async fn main(spawner: Spawner) {
    defmt::info!("starting {}", DEVICE_NAME);
    let peripherals = Peripherals::take();
    let system = peripherals.SYSTEM.split();
    let clocks = ClockControl::max(system.clock_control).freeze();

    embassy::init(
        &clocks,
        hal::timer::TimerGroup::new(peripherals.TIMG0, &clocks),
    );
    let io = IO::new(peripherals.GPIO, peripherals.IO_MUX);

    let spi = Spi::new(peripherals.SPI2, 8u32.MHz(), SpiMode::Mode0, &clocks)
        .with_sck(io.pins.gpio6)
        .with_mosi(io.pins.gpio7);
    let mut oled = Oled::new(
        spi,
        io.pins.gpio4.into_push_pull_output(),
        io.pins.gpio5.into_push_pull_output(),
    );
    if oled.show(&Frame::banner()).await.is_err() {
        defmt::warn!("failed to draw the banner");
    }

    let i2c0 = I2C::new(
        peripherals.I2C0,
        io.pins.gpio8,
        io.pins.gpio10,
        100u32.kHz(),
        &clocks,
    );
    let sensor = match tasks::acquisition::init_sensor(
        &STATION,
        i2c0,
        bme280_async::PRIMARY_ADDRESS,
        &mut Delay,
    )
    .await
    {
        Ok(sensor) => sensor,
        Err(e) => defmt::panic!("BME280 initialization failed: {:?}", e.kind()),
    };

    spawner.must_spawn(acquisition(sensor));
    spawner.must_spawn(presentation(oled));
    spawner.must_spawn(input());
    spawner.must_spawn(mode_button(io.pins.gpio2.into_pull_up_input()));
    spawner.must_spawn(backlight_button(io.pins.gpio3.into_pull_up_input()));

    let mut rng = Rng::new(peripherals.RNG);
    let stack_seed = rng.random() as u64;

    let init = defmt::unwrap!(esp_wifi::initialize(
        esp_wifi::EspWifiInitFor::Wifi,
        hal::systimer::SystemTimer::new(peripherals.SYSTIMER).alarm0,
        rng,
        system.radio_clock_control,
        &clocks,
    ));

    let (wifi_interface, controller) = defmt::unwrap!(esp_wifi::wifi::new_with_mode(
        &init,
        peripherals.WIFI,
        esp_wifi::wifi::WifiStaDevice
    ));

    let stack = &*make_static!(embassy_net::Stack::new(
        wifi_interface,
        NetConfig::dhcpv4(Default::default()),
        make_static!(StackResources::<4>::new()),
        stack_seed
    ));

    spawner.must_spawn(connection(controller, stack));
    spawner.must_spawn(net_task(stack));
    spawner.must_spawn(upload(MqttUploader::new(stack)));
    spawner.must_spawn(control(stack));
}

#[embassy_executor::task]
async fn acquisition(sensor: Bme280<SensorBus>) {
    tasks::acquisition::run(&STATION, sensor).await
}

#[embassy_executor::task]
async fn presentation(oled: Oled) {
    tasks::presentation::run(&STATION, oled).await
}

#[embassy_executor::task]
async fn input() {
    tasks::input::run(&STATION).await
}

#[embassy_executor::task]
async fn mode_button(pin: GpioPin<Input<PullUp>, 2>) {
    tasks::input::capture_edges(&STATION, STATION.mode_button(), pin).await
}

#[embassy_executor::task]
async fn backlight_button(pin: GpioPin<Input<PullUp>, 3>) {
    tasks::input::capture_edges(&STATION, STATION.backlight_button(), pin).await
}

#[embassy_executor::task]
async fn upload(uploader: MqttUploader) {
    tasks::upload::run(&STATION, uploader).await
}

#[embassy_executor::task]
async fn connection(
    controller: esp_wifi::wifi::WifiController<'static>,
    stack: &'static WifiStack,
) {
    net::connection(controller, stack, &STATION).await
}

#[embassy_executor::task]
async fn control(stack: &'static WifiStack) {
    net::control(stack, &STATION).await
}

#[embassy_executor::task]
async fn net_task(stack: &'static WifiStack) {
    stack.run().await
}

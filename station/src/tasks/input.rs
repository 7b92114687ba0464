use embassy_time::{Instant, Ticker};
use embedded_hal_async::digital::Wait;

use crate::buttons::ButtonState;
use crate::Station;

/// Marks presses of one button, meant to run in its own task next to the input task.
pub async fn capture_edges<P: Wait>(station: &Station, button: &ButtonState, mut pin: P) {
    loop {
        match pin.wait_for_falling_edge().await {
            Ok(()) => {
                button.edge(Instant::now(), station.config.debounce);
            }
            Err(_) => {
                error!("failed to wait for button edge");
                return;
            }
        }
    }
}

/// Handles the pending presses: the mode button advances the page, the backlight button
/// toggles the backlight. Returns whether anything changed.
pub fn poll(station: &Station) -> bool {
    let mut changed = false;
    if station.mode_button().take_press() {
        station.display().advance_mode();
        changed = true;
    }
    if station.backlight_button().take_press() {
        station.display().toggle_backlight();
        changed = true;
    }
    changed
}

pub async fn run(station: &Station) {
    let mut ticker = Ticker::every(station.config.input_period);
    loop {
        poll(station);
        ticker.next().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use embassy_time::Duration;
    use shared::DisplayMode;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn nothing_pending() {
        let station = Station::new(Config::DEFAULT);
        assert!(!poll(&station));
        assert_eq!(station.display().mode(), DisplayMode::Sensors);
        assert!(station.display().backlight());
    }

    #[test]
    fn mode_button_advances_once_per_press() {
        let station = Station::new(Config::DEFAULT);
        let debounce = station.config.debounce;
        station.mode_button().edge(at(100), debounce);
        station.mode_button().edge(at(120), debounce);

        assert!(poll(&station));
        assert_eq!(station.display().mode(), DisplayMode::CustomText);
        assert!(!poll(&station));

        station.mode_button().edge(at(400), debounce);
        assert!(poll(&station));
        assert_eq!(station.display().mode(), DisplayMode::NetworkInfo);
    }

    #[test]
    fn backlight_button_toggles() {
        let station = Station::new(Config::DEFAULT);
        station
            .backlight_button()
            .edge(at(100), Duration::from_millis(50));

        assert!(poll(&station));
        assert!(!station.display().backlight());
        assert_eq!(station.display().mode(), DisplayMode::Sensors);
    }

    struct ScriptedPin {
        edges: usize,
    }

    impl embedded_hal::digital::ErrorType for ScriptedPin {
        type Error = core::convert::Infallible;
    }

    impl Wait for ScriptedPin {
        async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
            if self.edges == 0 {
                core::future::pending::<()>().await;
            }
            self.edges -= 1;
            Ok(())
        }

        async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
            self.wait_for_falling_edge().await
        }
    }

    #[test]
    fn bouncing_pin_yields_one_press() {
        use embassy_futures::{block_on, select::select};
        use embassy_time::Timer;

        let station = Station::new(Config::DEFAULT);
        block_on(select(
            capture_edges(&station, station.mode_button(), ScriptedPin { edges: 5 }),
            Timer::after(Duration::from_millis(10)),
        ));

        assert!(poll(&station));
        assert_eq!(station.display().mode(), DisplayMode::CustomText);
        assert!(!poll(&station));
    }
}

use embassy_futures::select::select;
use embassy_time::Ticker;

use crate::display::Frame;
use crate::Station;

/// Two-row text output, e.g. a character LCD or a small OLED.
#[allow(async_fn_in_trait)]
pub trait TextDisplay {
    type Error;

    async fn show(&mut self, frame: &Frame) -> Result<(), Self::Error>;
}

impl<D: TextDisplay> TextDisplay for &mut D {
    type Error = D::Error;

    async fn show(&mut self, frame: &Frame) -> Result<(), D::Error> {
        (**self).show(frame).await
    }
}

/// Renders the current page and draws it when it differs from the last drawn frame.
///
/// Returns whether the display was written.
pub async fn refresh<D: TextDisplay>(
    station: &Station,
    display: &mut D,
    last: &mut Option<Frame>,
) -> Result<bool, D::Error> {
    let frame = Frame::render(&station.display().state(), &station.telemetry().snapshot());
    if last.as_ref() == Some(&frame) {
        return Ok(false);
    }

    display.show(&frame).await?;
    *last = Some(frame);
    Ok(true)
}

/// Redraws on every tick and as soon as the display state changes.
pub async fn run<D: TextDisplay>(station: &Station, mut display: D) {
    let mut ticker = Ticker::every(station.config.presentation_period);
    let mut last = None;

    loop {
        if refresh(station, &mut display, &mut last).await.is_err() {
            error!("failed to update display");
            // draw again on the next wake-up even if nothing changed
            last = None;
        }
        select(ticker.next(), station.display().changed()).await;
    }
}

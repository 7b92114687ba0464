use display_interface::DisplayError;
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyleBuilder},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use hal::gpio::{GpioPin, Output, PushPull};
use hal::peripherals::SPI2;
use hal::spi::{master::Spi, FullDuplexMode};
use ssd1306::{mode::BufferedGraphicsMode, prelude::*, Ssd1306};
use station::display::Frame;
use station::tasks::presentation::TextDisplay;

type Interface = SPIInterface<
    Spi<'static, SPI2, FullDuplexMode>,
    GpioPin<Output<PushPull>, 4>,
    GpioPin<Output<PushPull>, 5>,
>;

const ROW_HEIGHT: i32 = 16;

/// 128x64 SSD1306 showing the two station rows. The panel has no backlight, switching the
/// backlight off blanks it instead.
pub struct Oled {
    display: Ssd1306<Interface, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>,
    initialized: bool,
    on: bool,
}

impl Oled {
    pub fn new(
        spi: Spi<'static, SPI2, FullDuplexMode>,
        dc: GpioPin<Output<PushPull>, 4>,
        cs: GpioPin<Output<PushPull>, 5>,
    ) -> Self {
        let interface = SPIInterface::new(spi, dc, cs);
        let display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();

        Self {
            display,
            initialized: false,
            on: true,
        }
    }
}

impl TextDisplay for Oled {
    type Error = DisplayError;

    async fn show(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        if !self.initialized {
            self.display.init()?;
            self.initialized = true;
        }

        if frame.backlight != self.on {
            self.display.set_display_on(frame.backlight)?;
            self.on = frame.backlight;
        }

        let style = MonoTextStyleBuilder::new()
            .font(&FONT_6X10)
            .text_color(BinaryColor::On)
            .build();

        self.display.clear(BinaryColor::Off)?;
        for (row, line) in frame.lines.iter().enumerate() {
            Text::with_baseline(
                line.as_str(),
                Point::new(0, row as i32 * ROW_HEIGHT),
                style,
                Baseline::Top,
            )
            .draw(&mut self.display)?;
        }
        self.display.flush()
    }
}

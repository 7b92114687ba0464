//! Running mean over the most recent samples of each quantity.

use shared::Measurement;

pub const WINDOW: usize = 5;

#[derive(Clone, Debug)]
pub struct SmoothedSeries {
    values: [f32; WINDOW],
    cursor: usize,
    count: usize,
}

impl SmoothedSeries {
    pub const fn new() -> Self {
        Self {
            values: [0.0; WINDOW],
            cursor: 0,
            count: 0,
        }
    }

    /// Stores `value` over the oldest sample and returns the mean of the valid ones.
    pub fn push(&mut self, value: f32) -> f32 {
        self.values[self.cursor] = value;
        self.cursor = (self.cursor + 1) % WINDOW;
        if self.count < WINDOW {
            self.count += 1;
        }

        // slots fill from index 0, so the first `count` are always the valid ones
        let sum: f32 = self.values[..self.count].iter().sum();
        sum / self.count as f32
    }

}

impl Default for SmoothedSeries {
    fn default() -> Self {
        Self::new()
    }
}

/// One series per measured quantity, owned by the acquisition task.
#[derive(Clone, Debug, Default)]
pub struct Smoother {
    temperature: SmoothedSeries,
    pressure: SmoothedSeries,
    humidity: SmoothedSeries,
}

impl Smoother {
    pub const fn new() -> Self {
        Self {
            temperature: SmoothedSeries::new(),
            pressure: SmoothedSeries::new(),
            humidity: SmoothedSeries::new(),
        }
    }

    pub fn push(&mut self, measurement: Measurement) -> Measurement {
        Measurement {
            temperature: self.temperature.push(measurement.temperature),
            pressure: self.pressure.push(measurement.pressure),
            humidity: self.humidity.push(measurement.humidity),
        }
    }
}

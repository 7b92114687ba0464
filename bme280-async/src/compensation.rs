//! Fixed point compensation as published in the BME280 datasheet (section 4.2.3).
//!
//! All intermediates are `i32` and use wrapping arithmetic so that the results match the
//! reference C implementation bit for bit, including at the edges of the ADC range.

use crate::calibration::{CalibrationSet, RawSample};

/// Upper bound of the humidity accumulator, 100 %RH in Q22.10 shifted by 12.
const HUMIDITY_LIMIT: i32 = 419_430_400;

/// The pressure divisor evaluated to zero, which only happens for invalid calibration data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DegenerateCompensation;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// [°C], resolution 0.01
    pub temperature: f32,
    /// [hPa]
    pub pressure: f32,
    /// [%RH]
    pub humidity: f32,
}

pub fn compensate(calibration: &CalibrationSet, raw: &RawSample) -> Measurement {
    let t_fine = fine_temperature(calibration, raw.temperature);

    let pressure = match pressure_pa(calibration, t_fine, raw.pressure) {
        Ok(pa) => pa as f32 / 100.0,
        Err(DegenerateCompensation) => {
            warn!("pressure compensation divisor is zero, reporting 0");
            0.0
        }
    };

    Measurement {
        temperature: temperature_centi(t_fine) as f32 / 100.0,
        pressure,
        humidity: humidity_q22_10(calibration, t_fine, raw.humidity) as f32 / 1024.0,
    }
}

/// `t_fine`, shared by the pressure and humidity stages.
pub fn fine_temperature(calibration: &CalibrationSet, adc_t: u32) -> i32 {
    let adc_t = adc_t as i32;
    let t1 = i32::from(calibration.dig_t1);
    let t2 = i32::from(calibration.dig_t2);
    let t3 = i32::from(calibration.dig_t3);

    let var1 = ((adc_t >> 3).wrapping_sub(t1 << 1)).wrapping_mul(t2) >> 11;
    let delta = (adc_t >> 4).wrapping_sub(t1);
    let var2 = ((delta.wrapping_mul(delta) >> 12).wrapping_mul(t3)) >> 14;

    var1.wrapping_add(var2)
}

/// Temperature in hundredths of a degree.
pub fn temperature_centi(t_fine: i32) -> i32 {
    t_fine.wrapping_mul(5).wrapping_add(128) >> 8
}

/// Pressure in Pa.
pub fn pressure_pa(
    calibration: &CalibrationSet,
    t_fine: i32,
    adc_p: u32,
) -> Result<u32, DegenerateCompensation> {
    let p1 = i32::from(calibration.dig_p1);
    let p2 = i32::from(calibration.dig_p2);
    let p3 = i32::from(calibration.dig_p3);
    let p4 = i32::from(calibration.dig_p4);
    let p5 = i32::from(calibration.dig_p5);
    let p6 = i32::from(calibration.dig_p6);
    let p7 = i32::from(calibration.dig_p7);
    let p8 = i32::from(calibration.dig_p8);
    let p9 = i32::from(calibration.dig_p9);

    let mut var1 = (t_fine >> 1).wrapping_sub(64000);
    let square = (var1 >> 2).wrapping_mul(var1 >> 2);
    let mut var2 = (square >> 11).wrapping_mul(p6);
    var2 = var2.wrapping_add(var1.wrapping_mul(p5) << 1);
    var2 = (var2 >> 2).wrapping_add(p4 << 16);
    var1 = ((p3.wrapping_mul(square >> 13) >> 3).wrapping_add(p2.wrapping_mul(var1) >> 1)) >> 18;
    var1 = 32768i32.wrapping_add(var1).wrapping_mul(p1) >> 15;

    if var1 == 0 {
        return Err(DegenerateCompensation);
    }

    let p = 1_048_576u32
        .wrapping_sub(adc_p)
        .wrapping_sub((var2 >> 12) as u32)
        .wrapping_mul(3125);

    let p = i64::from(p);
    let divisor = i64::from(var1);
    let p = if p < 0x8000_0000 {
        (p << 1) / divisor
    } else {
        (p / divisor) * 2
    };

    let var1 = p9.wrapping_mul(((p >> 3).wrapping_mul(p >> 3) >> 13) as i32) >> 12;
    let var2 = ((p >> 2) as i32).wrapping_mul(p8) >> 13;
    let p = (p as i32).wrapping_add(var1.wrapping_add(var2).wrapping_add(p7) >> 4);

    Ok(p as u32)
}

/// Relative humidity in Q22.10 format, 1024 is 1 %RH.
pub fn humidity_q22_10(calibration: &CalibrationSet, t_fine: i32, adc_h: u16) -> u32 {
    humidity_accumulator(calibration, t_fine, adc_h).clamp(0, HUMIDITY_LIMIT) as u32 >> 12
}

fn humidity_accumulator(calibration: &CalibrationSet, t_fine: i32, adc_h: u16) -> i32 {
    let adc_h = i32::from(adc_h);
    let h1 = i32::from(calibration.dig_h1);
    let h2 = i32::from(calibration.dig_h2);
    let h3 = i32::from(calibration.dig_h3);
    let h4 = i32::from(calibration.dig_h4);
    let h5 = i32::from(calibration.dig_h5);
    let h6 = i32::from(calibration.dig_h6);

    let v = t_fine.wrapping_sub(76800);

    let offset = (adc_h << 14)
        .wrapping_sub(h4 << 20)
        .wrapping_sub(h5.wrapping_mul(v))
        .wrapping_add(16384)
        >> 15;
    let scale = (((v.wrapping_mul(h6) >> 10)
        .wrapping_mul((v.wrapping_mul(h3) >> 11).wrapping_add(32768))
        >> 10)
        .wrapping_add(2_097_152)
        .wrapping_mul(h2)
        .wrapping_add(8192))
        >> 14;

    let v = offset.wrapping_mul(scale);
    let v_sq = (v >> 15).wrapping_mul(v >> 15) >> 7;
    v.wrapping_sub(v_sq.wrapping_mul(h1) >> 4)
}

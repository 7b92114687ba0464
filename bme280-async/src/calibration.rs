//! Decoding of the calibration and measurement register blocks.

/// Bytes read from 0x88..=0xA1.
pub const CALIBRATION_A_LEN: usize = 26;
/// Bytes read from 0xE1..=0xE7.
pub const CALIBRATION_B_LEN: usize = 7;
/// Bytes read from 0xF7..=0xFE.
pub const MEASUREMENT_LEN: usize = 8;

/// A register block was shorter than its fixed layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidBlockLength {
    pub expected: usize,
    pub actual: usize,
}

fn check_len(block: &[u8], expected: usize) -> Result<(), InvalidBlockLength> {
    if block.len() < expected {
        return Err(InvalidBlockLength {
            expected,
            actual: block.len(),
        });
    }
    Ok(())
}

/// Factory trimming constants, read once after reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationSet {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    /// 12 bits, 0xE4 as [11:4] and 0xE5[3:0] as [3:0]
    pub dig_h4: i16,
    /// 12 bits, 0xE6 as [11:4] and 0xE5[7:4] as [3:0]
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl CalibrationSet {
    pub fn decode(block_a: &[u8], block_b: &[u8]) -> Result<Self, InvalidBlockLength> {
        check_len(block_a, CALIBRATION_A_LEN)?;
        check_len(block_b, CALIBRATION_B_LEN)?;

        let unsigned = |i: usize| u16::from_le_bytes([block_a[i], block_a[i + 1]]);
        let signed = |i: usize| i16::from_le_bytes([block_a[i], block_a[i + 1]]);

        Ok(Self {
            dig_t1: unsigned(0),
            dig_t2: signed(2),
            dig_t3: signed(4),
            dig_p1: unsigned(6),
            dig_p2: signed(8),
            dig_p3: signed(10),
            dig_p4: signed(12),
            dig_p5: signed(14),
            dig_p6: signed(16),
            dig_p7: signed(18),
            dig_p8: signed(20),
            dig_p9: signed(22),
            // block_a[24] is reserved
            dig_h1: block_a[25],
            dig_h2: i16::from_le_bytes([block_b[0], block_b[1]]),
            dig_h3: block_b[2],
            dig_h4: (i16::from(block_b[3]) << 4) | i16::from(block_b[4] & 0x0f),
            dig_h5: (i16::from(block_b[5]) << 4) | i16::from(block_b[4] >> 4),
            dig_h6: block_b[6] as i8,
        })
    }
}

/// Uncompensated ADC outputs of one measurement cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    /// 20 bits
    pub pressure: u32,
    /// 20 bits
    pub temperature: u32,
    pub humidity: u16,
}

impl RawSample {
    pub fn decode(block: &[u8]) -> Result<Self, InvalidBlockLength> {
        check_len(block, MEASUREMENT_LEN)?;

        let twenty_bits = |msb: u8, lsb: u8, xlsb: u8| {
            u32::from(msb) << 12 | u32::from(lsb) << 4 | u32::from(xlsb) >> 4
        };

        Ok(Self {
            pressure: twenty_bits(block[0], block[1], block[2]),
            temperature: twenty_bits(block[3], block[4], block[5]),
            humidity: u16::from_be_bytes([block[6], block[7]]),
        })
    }
}

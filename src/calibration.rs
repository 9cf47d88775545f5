//! Factory calibration coefficients and their register layout.
//!
//! The BME280 stores 18 trimming coefficients in two non-contiguous register
//! blocks: 26 bytes starting at `0x88` and 7 bytes starting at `0xE1`. Most of
//! them are plain little-endian words, but `dig_H4` and `dig_H5` are 12-bit
//! signed values sharing the nibbles of register `0xE5`.
//!
//! Instead of decoding every field by hand, `LAYOUT` lists each coefficient
//! together with its `Encoding` inside the concatenated 33-byte image, so the
//! layout can be audited against the datasheet table 16 line by line.

use super::Error;

/// Length of the temperature/pressure calibration block at `0x88`.
pub const BME280_P_T_CALIB_DATA_LEN: usize = 26;
/// Length of the humidity calibration block at `0xE1`.
pub const BME280_H_CALIB_DATA_LEN: usize = 7;
/// Length of both calibration blocks back to back.
pub const BME280_CALIB_IMAGE_LEN: usize = BME280_P_T_CALIB_DATA_LEN + BME280_H_CALIB_DATA_LEN;

/// Offset of the humidity block inside the calibration image.
const H: usize = BME280_P_T_CALIB_DATA_LEN;

/// Names of the calibration coefficients as used by the datasheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Coefficient {
    T1,
    T2,
    T3,
    P1,
    P2,
    P3,
    P4,
    P5,
    P6,
    P7,
    P8,
    P9,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
}

/// How a single coefficient is stored in the calibration image.
///
/// Offsets index the 33-byte image formed by the `0x88` block followed by the
/// `0xE1` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Encoding {
    U8 { offset: usize },
    I8 { offset: usize },
    /// Little-endian unsigned word.
    U16 { offset: usize },
    /// Little-endian signed word.
    I16 { offset: usize },
    /// Signed 12-bit value: bits 11..4 come from the signed byte at `msb`, bits
    /// 3..0 from either nibble of the byte at `nibble`.
    I12 {
        msb: usize,
        nibble: usize,
        high_nibble: bool,
    },
}

impl Encoding {
    /// Decodes the field from a full calibration image.
    pub(crate) fn decode(self, image: &[u8; BME280_CALIB_IMAGE_LEN]) -> i32 {
        match self {
            Encoding::U8 { offset } => image[offset] as i32,
            Encoding::I8 { offset } => image[offset] as i8 as i32,
            Encoding::U16 { offset } => {
                u16::from_le_bytes([image[offset], image[offset + 1]]) as i32
            }
            Encoding::I16 { offset } => {
                i16::from_le_bytes([image[offset], image[offset + 1]]) as i32
            }
            Encoding::I12 {
                msb,
                nibble,
                high_nibble,
            } => {
                let low = if high_nibble {
                    image[nibble] >> 4
                } else {
                    image[nibble] & 0x0F
                };
                // the signed msb carries the sign extension from bit 11
                ((image[msb] as i8 as i32) << 4) | low as i32
            }
        }
    }

    /// Inclusive range of values the encoding can produce.
    #[cfg(test)]
    pub(crate) fn range(self) -> (i32, i32) {
        match self {
            Encoding::U8 { .. } => (0, u8::MAX as i32),
            Encoding::I8 { .. } => (i8::MIN as i32, i8::MAX as i32),
            Encoding::U16 { .. } => (0, u16::MAX as i32),
            Encoding::I16 { .. } => (i16::MIN as i32, i16::MAX as i32),
            Encoding::I12 { .. } => (-2048, 2047),
        }
    }
}

/// Register layout of every calibration coefficient (datasheet table 16).
pub(crate) const LAYOUT: [(Coefficient, Encoding); 18] = [
    (Coefficient::T1, Encoding::U16 { offset: 0 }),
    (Coefficient::T2, Encoding::I16 { offset: 2 }),
    (Coefficient::T3, Encoding::I16 { offset: 4 }),
    (Coefficient::P1, Encoding::U16 { offset: 6 }),
    (Coefficient::P2, Encoding::I16 { offset: 8 }),
    (Coefficient::P3, Encoding::I16 { offset: 10 }),
    (Coefficient::P4, Encoding::I16 { offset: 12 }),
    (Coefficient::P5, Encoding::I16 { offset: 14 }),
    (Coefficient::P6, Encoding::I16 { offset: 16 }),
    (Coefficient::P7, Encoding::I16 { offset: 18 }),
    (Coefficient::P8, Encoding::I16 { offset: 20 }),
    (Coefficient::P9, Encoding::I16 { offset: 22 }),
    // 0xA0 (offset 24) is reserved
    (Coefficient::H1, Encoding::U8 { offset: 25 }),
    (Coefficient::H2, Encoding::I16 { offset: H }),
    (Coefficient::H3, Encoding::U8 { offset: H + 2 }),
    (
        Coefficient::H4,
        Encoding::I12 {
            msb: H + 3,
            nibble: H + 4,
            high_nibble: false,
        },
    ),
    (
        Coefficient::H5,
        Encoding::I12 {
            msb: H + 5,
            nibble: H + 4,
            high_nibble: true,
        },
    ),
    (Coefficient::H6, Encoding::I8 { offset: H + 6 }),
];

/// Per-device compensation coefficients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt-impl", derive(ufmt::derive::uDebug))]
pub struct CalibrationData {
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
    pub dig_h4: i16,
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl CalibrationData {
    /// Decodes both calibration blocks as read from `0x88` and `0xE1`.
    pub fn parse(
        pt: &[u8; BME280_P_T_CALIB_DATA_LEN],
        h: &[u8; BME280_H_CALIB_DATA_LEN],
    ) -> Self {
        let mut image = [0u8; BME280_CALIB_IMAGE_LEN];
        image[..BME280_P_T_CALIB_DATA_LEN].copy_from_slice(pt);
        image[BME280_P_T_CALIB_DATA_LEN..].copy_from_slice(h);

        let mut calibration = CalibrationData::default();
        for (coefficient, encoding) in LAYOUT.iter() {
            calibration.set(*coefficient, encoding.decode(&image));
        }
        calibration
    }

    /// Like [`CalibrationData::parse`], but for buffers of unchecked length.
    pub fn from_slices<E>(pt: &[u8], h: &[u8]) -> Result<Self, Error<E>> {
        if pt.len() != BME280_P_T_CALIB_DATA_LEN {
            return Err(Error::InvalidBufferLength {
                expected: BME280_P_T_CALIB_DATA_LEN,
                actual: pt.len(),
            });
        }
        if h.len() != BME280_H_CALIB_DATA_LEN {
            return Err(Error::InvalidBufferLength {
                expected: BME280_H_CALIB_DATA_LEN,
                actual: h.len(),
            });
        }
        let mut pt_block = [0u8; BME280_P_T_CALIB_DATA_LEN];
        let mut h_block = [0u8; BME280_H_CALIB_DATA_LEN];
        pt_block.copy_from_slice(pt);
        h_block.copy_from_slice(h);
        Ok(Self::parse(&pt_block, &h_block))
    }

    /// Returns a coefficient widened to `i32`.
    pub fn get(&self, coefficient: Coefficient) -> i32 {
        match coefficient {
            Coefficient::T1 => self.dig_t1 as i32,
            Coefficient::T2 => self.dig_t2 as i32,
            Coefficient::T3 => self.dig_t3 as i32,
            Coefficient::P1 => self.dig_p1 as i32,
            Coefficient::P2 => self.dig_p2 as i32,
            Coefficient::P3 => self.dig_p3 as i32,
            Coefficient::P4 => self.dig_p4 as i32,
            Coefficient::P5 => self.dig_p5 as i32,
            Coefficient::P6 => self.dig_p6 as i32,
            Coefficient::P7 => self.dig_p7 as i32,
            Coefficient::P8 => self.dig_p8 as i32,
            Coefficient::P9 => self.dig_p9 as i32,
            Coefficient::H1 => self.dig_h1 as i32,
            Coefficient::H2 => self.dig_h2 as i32,
            Coefficient::H3 => self.dig_h3 as i32,
            Coefficient::H4 => self.dig_h4 as i32,
            Coefficient::H5 => self.dig_h5 as i32,
            Coefficient::H6 => self.dig_h6 as i32,
        }
    }

    // `value` always comes from the matching `Encoding`, so the narrowing casts are lossless
    fn set(&mut self, coefficient: Coefficient, value: i32) {
        match coefficient {
            Coefficient::T1 => self.dig_t1 = value as u16,
            Coefficient::T2 => self.dig_t2 = value as i16,
            Coefficient::T3 => self.dig_t3 = value as i16,
            Coefficient::P1 => self.dig_p1 = value as u16,
            Coefficient::P2 => self.dig_p2 = value as i16,
            Coefficient::P3 => self.dig_p3 = value as i16,
            Coefficient::P4 => self.dig_p4 = value as i16,
            Coefficient::P5 => self.dig_p5 = value as i16,
            Coefficient::P6 => self.dig_p6 = value as i16,
            Coefficient::P7 => self.dig_p7 = value as i16,
            Coefficient::P8 => self.dig_p8 = value as i16,
            Coefficient::P9 => self.dig_p9 = value as i16,
            Coefficient::H1 => self.dig_h1 = value as u8,
            Coefficient::H2 => self.dig_h2 = value as i16,
            Coefficient::H3 => self.dig_h3 = value as u8,
            Coefficient::H4 => self.dig_h4 = value as i16,
            Coefficient::H5 => self.dig_h5 = value as i16,
            Coefficient::H6 => self.dig_h6 = value as i8,
        }
    }
}

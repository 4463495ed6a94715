use crate::crc::check_crc8;
use byteorder::{ByteOrder, LittleEndian};

/// Worst case conversion time at 12 bits, in microseconds
pub const MAX_CONVERSION_TIME_US: u32 = 750_000;

/// Conversion resolution, stored as the configuration register pattern
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Resolution {
    Bits9 = 0b0001_1111,
    Bits10 = 0b0011_1111,
    Bits11 = 0b0101_1111,
    #[default]
    Bits12 = 0b0111_1111,
}

impl Resolution {
    /// Reads bits 5 and 6 of a configuration register
    pub fn from_config(config: u8) -> Self {
        match (config >> 5) & 0b11 {
            0 => Resolution::Bits9,
            1 => Resolution::Bits10,
            2 => Resolution::Bits11,
            _ => Resolution::Bits12,
        }
    }

    pub fn config(&self) -> u8 {
        *self as u8
    }

    pub fn bits(&self) -> u8 {
        9 + self.index()
    }

    /// Clears the low LSB bits that are undefined at this resolution
    pub fn mask(&self) -> u8 {
        0xFF << (3 - self.index())
    }

    pub fn conversion_time_us(&self) -> u32 {
        MAX_CONVERSION_TIME_US >> (3 - self.index())
    }

    fn index(&self) -> u8 {
        (self.config() >> 5) & 0b11
    }
}

/// The sensor's 9 byte register file.
///
/// | byte | content                         |
/// |------|---------------------------------|
/// | 0, 1 | temperature, LSB first          |
/// | 2    | TH alarm trigger                |
/// | 3    | TL alarm trigger                |
/// | 4    | configuration (resolution)      |
/// | 5..8 | reserved                        |
/// | 8    | CRC of bytes 0 to 7             |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Scratchpad {
    raw: [u8; Self::BYTES],
}

impl From<[u8; Scratchpad::BYTES]> for Scratchpad {
    fn from(raw: [u8; Scratchpad::BYTES]) -> Self {
        Scratchpad { raw }
    }
}

impl AsRef<[u8]> for Scratchpad {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl Scratchpad {
    pub const BYTES: usize = 9;

    pub fn temperature_raw(&self) -> i16 {
        let mask = self.resolution().mask();
        LittleEndian::read_i16(&[self.raw[0] & mask, self.raw[1]])
    }

    /// Temperature in degrees Celsius, 1/16 °C per LSB
    pub fn temperature(&self) -> f32 {
        f32::from(self.temperature_raw()) / 16_f32
    }

    pub fn trigger_high(&self) -> i8 {
        self.raw[2] as i8
    }

    pub fn trigger_low(&self) -> i8 {
        self.raw[3] as i8
    }

    pub fn config(&self) -> u8 {
        self.raw[4]
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::from_config(self.config())
    }

    pub fn crc(&self) -> u8 {
        self.raw[8]
    }

    pub fn is_crc_valid(&self) -> bool {
        check_crc8(&self.raw)
    }

    /// TH, TL and configuration, the writable registers
    pub fn settings(&self) -> [u8; 3] {
        [self.raw[2], self.raw[3], self.raw[4]]
    }

    pub fn as_bytes(&self) -> &[u8; Self::BYTES] {
        &self.raw
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8; Self::BYTES] {
        &mut self.raw
    }
}

use crate::crc::check_crc8;
use byteorder::{ByteOrder, LittleEndian};
use core::{
    fmt::{Display, Formatter, Result as FmtResult},
    ops::Deref,
    str::FromStr,
};

/// Factory-programmed 64-bit identifier: family code, 48-bit serial number
/// and the CRC of the first seven bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct RomCode {
    raw: [u8; Self::BYTES],
}

impl From<[u8; RomCode::BYTES]> for RomCode {
    fn from(raw: [u8; RomCode::BYTES]) -> Self {
        RomCode { raw }
    }
}

impl From<RomCode> for [u8; RomCode::BYTES] {
    fn from(rom: RomCode) -> [u8; RomCode::BYTES] {
        rom.raw
    }
}

impl Deref for RomCode {
    type Target = [u8; Self::BYTES];

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl AsRef<[u8]> for RomCode {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl RomCode {
    /// The length of a ROM code in bytes
    pub const BYTES: usize = 8;

    pub fn family_code(&self) -> u8 {
        self.raw[0]
    }

    /// Serial number, bytes 1 to 6 in transmission order
    pub fn serial_number(&self) -> u64 {
        LittleEndian::read_u48(&self.raw[1..7])
    }

    pub fn crc(&self) -> u8 {
        self.raw[7]
    }

    pub fn is_crc_valid(&self) -> bool {
        check_crc8(&self.raw)
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8; Self::BYTES] {
        &mut self.raw
    }
}

/// Error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomCodeError {
    NotEnough,
    TooMany,
    Invalid,
}

impl FromStr for RomCode {
    type Err = RomCodeError;

    /// Accepts 16 hex digits, optionally separated by whitespace or colons
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut digits = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .map(|c| c.to_digit(16).map(|d| d as u8));
        let mut raw = [0u8; Self::BYTES];

        for byte in raw.iter_mut() {
            let (Some(high), Some(low)) = (digits.next(), digits.next()) else {
                return Err(RomCodeError::NotEnough);
            };
            *byte = (high.ok_or(RomCodeError::Invalid)? << 4) | low.ok_or(RomCodeError::Invalid)?;
        }
        if digits.next().is_some() {
            return Err(RomCodeError::TooMany);
        }

        Ok(RomCode { raw })
    }
}

impl Display for RomCode {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        for (i, byte) in self.raw.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

use core::fmt::{Debug, Display, Formatter, Result as FmtResult};

/// Error type
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E: Sized + Debug> {
    /// Handle used before a successful `init`
    NotInitialized,
    /// Byte is not one of the known command codes, nothing was sent
    InvalidCommand(u8),
    /// Scratchpad read length out of range, or partial read with CRC enabled
    InvalidLength(usize),
    /// Wire not high
    WireFault,
    /// No presence on wire
    NoPresence,
    /// Checksum residual over data and stored CRC is not zero
    CrcMismatch { computed: u8, stored: u8 },
    /// Device did not accept the written TH, TL and configuration bytes
    ConfigMismatch { expected: [u8; 3], actual: [u8; 3] },
    PortError(E),
}

impl<E: Sized + Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::PortError(e)
    }
}

impl<E: Sized + Debug> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Error::NotInitialized => f.write_str("device handle is not initialized"),
            Error::InvalidCommand(code) => write!(f, "invalid command code {code:#04x}"),
            Error::InvalidLength(len) => write!(f, "invalid scratchpad read length {len}"),
            Error::WireFault => f.write_str("wire did not return high"),
            Error::NoPresence => f.write_str("no presence pulse"),
            Error::CrcMismatch { computed, stored } => {
                write!(f, "crc mismatch: computed {computed:#04x}, stored {stored:#04x}")
            }
            Error::ConfigMismatch { expected, actual } => {
                write!(f, "configuration mismatch: wrote {expected:02x?}, read {actual:02x?}")
            }
            Error::PortError(e) => write!(f, "port error: {e:?}"),
        }
    }
}

impl<E: Sized + Debug> core::error::Error for Error<E> {}

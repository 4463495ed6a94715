use crate::{Command, Error, IoWire, OpCode};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;
use log::{debug, trace};

/// Slot timings in microseconds
const WRITE_0_LOW_US: u32 = 60;
const WRITE_0_RELEASE_US: u32 = 2;
const WRITE_1_LOW_US: u32 = 2;
const WRITE_1_RELEASE_US: u32 = 60;

const READ_LOW_US: u32 = 2;
const READ_SAMPLE_US: u32 = 8;
const READ_RECOVERY_US: u32 = 52;

const RESET_PULSE_US: u32 = 480;
const PRESENCE_SAMPLE_US: u32 = 70;
const RESET_RECOVERY_US: u32 = 410;

/// Bit-banging master for a single-wire bus.
///
/// Every slot is driven to completion before returning. The drive and sample
/// half of each slot runs inside a critical section so interrupt latency
/// cannot stretch it.
pub struct Driver<W: IoWire> {
    io_wire: W,
}

impl<E: Debug, W: IoWire<Error = E>> Driver<W> {
    pub fn new(io_wire: W) -> Self {
        Driver { io_wire }
    }

    /// Gives the wire back
    pub fn release(self) -> W {
        self.io_wire
    }

    pub fn reset_write_read(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.write_bytes(delay, write)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_skip_write_read(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.skip(delay)?;
        self.write_bytes(delay, write)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_skip_write_only(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
    ) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.skip(delay)?;
        self.write_bytes(delay, write)?;
        Ok(())
    }

    /// Addresses every device on the bus, which is the single sensor here
    pub fn skip(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.write_command(delay, Command::SkipRom)?;
        Ok(())
    }

    /// Sends a reset pulse and listens for a presence pulse.
    ///
    /// Returns `Err(NoPresence)` if nothing pulled the line low during the
    /// presence window and `Err(WireFault)` if the line is still low at the
    /// end of the recovery window.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        let (presence, recovered) = critical_section::with(|_| -> Result<(bool, bool), E> {
            self.set_low()?;
            delay.delay_us(RESET_PULSE_US);
            self.set_high()?;
            delay.delay_us(PRESENCE_SAMPLE_US);
            let presence = self.is_low()?;
            delay.delay_us(RESET_RECOVERY_US);
            let recovered = self.is_high()?;
            Ok((presence, recovered))
        })?;
        debug!("reset: presence {}, recovered {}", presence, recovered);

        if !presence {
            Err(Error::NoPresence)
        } else if !recovered {
            Err(Error::WireFault)
        } else {
            Ok(())
        }
    }

    pub fn reset_presence(&mut self, delay: &mut impl DelayNs) -> Result<bool, Error<E>> {
        self.reset(delay).map(|_| true).or_else(|error| {
            if matches!(error, Error::NoPresence) {
                Ok(false)
            } else {
                Err(error)
            }
        })
    }

    pub fn read_bytes(&mut self, delay: &mut impl DelayNs, dst: &mut [u8]) -> Result<(), E> {
        for d in dst {
            *d = self.read_byte(delay)?;
        }
        Ok(())
    }

    /// Least significant bit first
    pub fn read_byte(&mut self, delay: &mut impl DelayNs) -> Result<u8, E> {
        let mut byte = 0_u8;
        for i in 0..8 {
            if self.read_bit(delay)? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    pub fn read_bit(&mut self, delay: &mut impl DelayNs) -> Result<bool, E> {
        let bit = critical_section::with(|_| -> Result<bool, E> {
            self.set_low()?;
            delay.delay_us(READ_LOW_US);
            self.set_high()?;
            delay.delay_us(READ_SAMPLE_US);
            self.is_high()
        })?;
        delay.delay_us(READ_RECOVERY_US);
        Ok(bit)
    }

    pub fn write_command(&mut self, delay: &mut impl DelayNs, cmd: impl OpCode) -> Result<(), E> {
        let code = cmd.op_code();
        trace!("command {:#04x}", code);
        self.write_byte(delay, code)
    }

    pub fn write_bytes(&mut self, delay: &mut impl DelayNs, bytes: &[u8]) -> Result<(), E> {
        for b in bytes {
            self.write_byte(delay, *b)?;
        }
        Ok(())
    }

    /// Least significant bit first
    pub fn write_byte(&mut self, delay: &mut impl DelayNs, byte: u8) -> Result<(), E> {
        let mut byte = byte;
        for _ in 0..8 {
            self.write_bit(delay, (byte & 0x01) == 0x01)?;
            byte >>= 1;
        }
        Ok(())
    }

    /// The time the line is held low encodes the bit, both slots last 62µs
    pub fn write_bit(&mut self, delay: &mut impl DelayNs, high: bool) -> Result<(), E> {
        let (low_us, release_us) = if high {
            (WRITE_1_LOW_US, WRITE_1_RELEASE_US)
        } else {
            (WRITE_0_LOW_US, WRITE_0_RELEASE_US)
        };
        critical_section::with(|_| -> Result<(), E> {
            self.set_low()?;
            delay.delay_us(low_us);
            self.set_high()
        })?;
        delay.delay_us(release_us);
        Ok(())
    }

    #[inline(always)]
    pub(crate) fn set_high(&mut self) -> Result<(), E> {
        self.io_wire.set_high()
    }

    #[inline(always)]
    pub(crate) fn set_low(&mut self) -> Result<(), E> {
        self.io_wire.set_low()
    }

    #[inline(always)]
    pub(crate) fn is_high(&mut self) -> Result<bool, E> {
        self.io_wire.is_high()
    }

    #[inline(always)]
    pub(crate) fn is_low(&mut self) -> Result<bool, E> {
        self.io_wire.is_low()
    }
}

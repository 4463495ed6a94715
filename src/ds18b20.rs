use crate::crc::compute_partial_crc8;
use crate::{Driver, Error, IoWire, OpCode, Resolution, RomCode, Scratchpad};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;
use log::{debug, warn};

pub const FAMILY_CODE: u8 = 0x28;

/// Function commands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    Convert = 0x44,
    WriteScratchpad = 0x4e,
    ReadScratchpad = 0xBE,
    CopyScratchpad = 0x48,
    RecallE2 = 0xB8,
    ReadPowerSupply = 0xB4,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0x44 => Command::Convert,
            0x4e => Command::WriteScratchpad,
            0xBE => Command::ReadScratchpad,
            0x48 => Command::CopyScratchpad,
            0xB8 => Command::RecallE2,
            0xB4 => Command::ReadPowerSupply,
            other => return Err(other),
        })
    }
}

/// Checks a raw byte against the ROM and function command sets
pub fn is_valid_command(code: u8) -> bool {
    crate::Command::try_from(code).is_ok() || Command::try_from(code).is_ok()
}

/// Settings applied by [`Ds18b20::init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Verify the CRC of every ROM and scratchpad read
    pub enable_crc: bool,
    /// TH alarm trigger, °C
    pub trigger_high: i8,
    /// TL alarm trigger, °C
    pub trigger_low: i8,
    pub resolution: Resolution,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_crc: false,
            trigger_high: 0x7D,
            trigger_low: 0xC9_u8 as i8,
            resolution: Resolution::default(),
        }
    }
}

impl Config {
    pub fn with_crc(mut self, enable_crc: bool) -> Self {
        self.enable_crc = enable_crc;
        self
    }

    pub fn with_trigger_high(mut self, temp: i8) -> Self {
        self.trigger_high = temp;
        self
    }

    pub fn with_trigger_low(mut self, temp: i8) -> Self {
        self.trigger_low = temp;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }
}

/// A DS18B20 alone on its bus.
///
/// A handle starts out uninitialized and refuses every bus operation and
/// cached value with [`Error::NotInitialized`] until [`init`](Self::init) or
/// [`init_default`](Self::init_default) succeeds. A failed initialization
/// leaves it uninitialized again.
///
/// Reads land in the cached [`RomCode`] and [`Scratchpad`] as they arrive, so
/// after a [`Error::CrcMismatch`] the cache holds the rejected bytes until the
/// next successful read.
pub struct Ds18b20<W: IoWire> {
    driver: Driver<W>,
    crc_enabled: bool,
    initialized: bool,
    rom: RomCode,
    scratchpad: Scratchpad,
}

impl<E: Debug, W: IoWire<Error = E>> Ds18b20<W> {
    pub fn new(driver: Driver<W>) -> Self {
        Self {
            driver,
            crc_enabled: false,
            initialized: false,
            rom: RomCode::default(),
            scratchpad: Scratchpad::default(),
        }
    }

    /// Writes and verifies the configuration, then reads the ROM code
    pub fn init(&mut self, delay: &mut impl DelayNs, config: &Config) -> Result<(), Error<E>> {
        self.initialized = false;
        self.crc_enabled = config.enable_crc;

        self.apply_configuration(
            delay,
            config.trigger_high,
            config.trigger_low,
            config.resolution,
        )?;
        self.fetch_rom(delay)?;

        self.initialized = true;
        debug!("initialized {}", self.rom);
        Ok(())
    }

    /// Adopts whatever configuration the sensor currently holds
    pub fn init_default(
        &mut self,
        delay: &mut impl DelayNs,
        enable_crc: bool,
    ) -> Result<(), Error<E>> {
        self.initialized = false;
        self.crc_enabled = enable_crc;

        self.fetch_scratchpad(delay, Scratchpad::BYTES)?;
        self.fetch_rom(delay)?;

        self.initialized = true;
        debug!("initialized {} with stored configuration", self.rom);
        Ok(())
    }

    /// Drops the cached state and hands the bus back
    pub fn deinit(self) -> Driver<W> {
        self.driver
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn crc_enabled(&self) -> bool {
        self.crc_enabled
    }

    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.ensure_initialized()?;
        self.driver.reset(delay)
    }

    /// Sends a raw command byte.
    ///
    /// Bytes outside the command set are refused before anything is driven
    /// on the wire.
    pub fn send_command(&mut self, delay: &mut impl DelayNs, code: u8) -> Result<(), Error<E>> {
        if !is_valid_command(code) {
            return Err(Error::InvalidCommand(code));
        }
        self.ensure_initialized()?;
        self.driver.write_byte(delay, code)?;
        Ok(())
    }

    /// Reads the ROM code, only valid with a single device on the bus
    pub fn read_rom(&mut self, delay: &mut impl DelayNs) -> Result<&RomCode, Error<E>> {
        self.ensure_initialized()?;
        self.fetch_rom(delay)?;
        Ok(&self.rom)
    }

    /// Writes TH, TL and the configuration register
    pub fn write_scratchpad(
        &mut self,
        delay: &mut impl DelayNs,
        trigger_high: i8,
        trigger_low: i8,
        resolution: Resolution,
    ) -> Result<(), Error<E>> {
        self.ensure_initialized()?;
        self.store_scratchpad(delay, trigger_high, trigger_low, resolution)
    }

    /// Reads the first `len` scratchpad bytes, a bus reset ends a shorter
    /// read. With CRC enabled only complete reads are accepted.
    pub fn read_scratchpad(
        &mut self,
        delay: &mut impl DelayNs,
        len: usize,
    ) -> Result<&Scratchpad, Error<E>> {
        self.ensure_initialized()?;
        self.fetch_scratchpad(delay, len)?;
        Ok(&self.scratchpad)
    }

    /// Writes TH, TL and resolution and reads them back
    pub fn configure(
        &mut self,
        delay: &mut impl DelayNs,
        trigger_high: i8,
        trigger_low: i8,
        resolution: Resolution,
    ) -> Result<(), Error<E>> {
        self.ensure_initialized()?;
        self.apply_configuration(delay, trigger_high, trigger_low, resolution)
    }

    /// Starts a conversion, waits the worst case time for the configured
    /// resolution and reads the result back. Blocks for up to 750ms.
    pub fn read_temperature(&mut self, delay: &mut impl DelayNs) -> Result<f32, Error<E>> {
        self.ensure_initialized()?;
        self.driver
            .reset_skip_write_only(delay, &[Command::Convert.op_code()])?;
        delay.delay_us(self.scratchpad.resolution().conversion_time_us());

        let len = if self.crc_enabled { Scratchpad::BYTES } else { 2 };
        self.fetch_scratchpad(delay, len)?;
        Ok(self.scratchpad.temperature())
    }

    pub fn rom_code(&self) -> Result<&RomCode, Error<E>> {
        self.ensure_initialized()?;
        Ok(&self.rom)
    }

    pub fn scratchpad(&self) -> Result<&Scratchpad, Error<E>> {
        self.ensure_initialized()?;
        Ok(&self.scratchpad)
    }

    /// Last read temperature, no bus traffic
    pub fn temperature(&self) -> Result<f32, Error<E>> {
        self.ensure_initialized()?;
        Ok(self.scratchpad.temperature())
    }

    /// Settings as last read from the scratchpad
    pub fn configuration(&self) -> Result<Config, Error<E>> {
        self.ensure_initialized()?;
        Ok(Config {
            enable_crc: self.crc_enabled,
            trigger_high: self.scratchpad.trigger_high(),
            trigger_low: self.scratchpad.trigger_low(),
            resolution: self.scratchpad.resolution(),
        })
    }

    fn ensure_initialized(&self) -> Result<(), Error<E>> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn fetch_rom(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.driver.reset_write_read(
            delay,
            &[crate::Command::ReadRom.op_code()],
            self.rom.as_mut_bytes(),
        )?;
        if self.crc_enabled {
            ensure_correct_crc8(self.rom.as_ref())?;
        }
        Ok(())
    }

    fn store_scratchpad(
        &mut self,
        delay: &mut impl DelayNs,
        trigger_high: i8,
        trigger_low: i8,
        resolution: Resolution,
    ) -> Result<(), Error<E>> {
        self.driver.reset_skip_write_only(
            delay,
            &[
                Command::WriteScratchpad.op_code(),
                trigger_high as u8,
                trigger_low as u8,
                resolution.config(),
            ],
        )
    }

    fn fetch_scratchpad(&mut self, delay: &mut impl DelayNs, len: usize) -> Result<(), Error<E>> {
        if !(1..=Scratchpad::BYTES).contains(&len) || (self.crc_enabled && len != Scratchpad::BYTES)
        {
            return Err(Error::InvalidLength(len));
        }

        self.driver.reset_skip_write_read(
            delay,
            &[Command::ReadScratchpad.op_code()],
            &mut self.scratchpad.as_mut_bytes()[..len],
        )?;
        if len < Scratchpad::BYTES {
            self.driver.reset(delay)?;
        }
        if self.crc_enabled {
            ensure_correct_crc8(self.scratchpad.as_ref())?;
        }
        Ok(())
    }

    fn apply_configuration(
        &mut self,
        delay: &mut impl DelayNs,
        trigger_high: i8,
        trigger_low: i8,
        resolution: Resolution,
    ) -> Result<(), Error<E>> {
        self.store_scratchpad(delay, trigger_high, trigger_low, resolution)?;
        self.fetch_scratchpad(delay, Scratchpad::BYTES)?;

        let expected = [trigger_high as u8, trigger_low as u8, resolution.config()];
        let actual = self.scratchpad.settings();
        if expected != actual {
            warn!("configuration not accepted: wrote {:02x?}, read {:02x?}", expected, actual);
            return Err(Error::ConfigMismatch { expected, actual });
        }
        Ok(())
    }
}

/// `block` ends in the CRC of the bytes before it
fn ensure_correct_crc8<E: Debug>(block: &[u8]) -> Result<(), Error<E>> {
    let (stored, data) = match block.split_last() {
        Some((stored, data)) => (*stored, data),
        None => return Err(Error::InvalidLength(0)),
    };
    let computed = compute_partial_crc8(0, data);
    if computed != stored {
        warn!("crc mismatch: computed {:#04x}, stored {:#04x}", computed, stored);
        Err(Error::CrcMismatch { computed, stored })
    } else {
        Ok(())
    }
}

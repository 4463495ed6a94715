//! Simulated DS18B20 on an open-drain line.
//!
//! The sensor only sees what a real one sees: the master pulling and
//! releasing the line, and time passing through the delays the master issues.
//! Slots are decoded from how long the line stays low. A slot that breaks the
//! timing the sensor relies on is counted in `timing_faults` and drops the
//! sensor out of sync, the way a real one misreads it.

use crate::crc::compute_partial_crc8;
use core::convert::Infallible;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use std::{cell::RefCell, collections::VecDeque, rc::Rc, vec::Vec};

const US: u64 = 1_000;
const RESET_MIN: u64 = 480 * US;
const SLOT_MIN: u64 = 60 * US;
const WRITE_1_MAX: u64 = 15 * US;
const WRITE_0_MIN: u64 = 60 * US;
/// A transmitted 0 is only guaranteed valid this long after the falling edge
const TX_0_HOLD: u64 = 15 * US;
/// Latest start and shortest length of the presence pulse
const PRESENCE_START: u64 = 60 * US;
const PRESENCE_END: u64 = 120 * US;

pub const ROM: [u8; 8] = [0x28, 0xff, 0x4b, 0x3a, 0x61, 0x16, 0x04, 0xab];

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Idle,
    RomCommand,
    FunctionCommand,
    WriteScratchpad(usize),
    Transmit,
}

#[derive(Debug)]
pub struct Device {
    pub present: bool,
    pub stuck_low: bool,
    /// Flips the lowest bit of the first byte of every ROM and scratchpad read
    pub corrupt_reads: bool,
    /// Acknowledges write-scratchpad but keeps the old registers
    pub ignore_writes: bool,
    /// Value loaded into the temperature registers by a conversion
    pub temperature: i16,
    pub rom: [u8; 8],
    registers: [u8; 5],

    pub resets: usize,
    pub bits_sent: usize,
    pub received: Vec<u8>,
    pub conversions: usize,
    pub timing_faults: usize,
    pub now_ns: u64,

    state: State,
    rx_byte: u8,
    rx_bits: u8,
    tx: VecDeque<bool>,
    pending: Option<bool>,
    master_low: bool,
    fall_ns: u64,
    slot_start: Option<u64>,
    low_window: (u64, u64),
}

impl Default for Device {
    fn default() -> Self {
        Self::new()
    }
}

impl Device {
    pub fn new() -> Self {
        Device {
            present: true,
            stuck_low: false,
            corrupt_reads: false,
            ignore_writes: false,
            temperature: 0x0550,
            rom: ROM,
            // power-on: 85 °C, TH 75, TL 70, 12 bit
            registers: [0x50, 0x05, 0x4B, 0x46, 0x7F],
            resets: 0,
            bits_sent: 0,
            received: Vec::new(),
            conversions: 0,
            timing_faults: 0,
            now_ns: 0,
            state: State::Idle,
            rx_byte: 0,
            rx_bits: 0,
            tx: VecDeque::new(),
            pending: None,
            master_low: false,
            fall_ns: 0,
            slot_start: None,
            low_window: (0, 0),
        }
    }

    /// Scratchpad as the sensor would send it
    pub fn scratchpad(&self) -> [u8; 9] {
        let mut pad = [0u8; 9];
        pad[..5].copy_from_slice(&self.registers);
        pad[5..8].copy_from_slice(&[0xFF, 0x0C, 0x10]);
        pad[8] = compute_partial_crc8(0, &pad[..8]);
        pad
    }

    fn line_low(&self) -> bool {
        self.master_low
            || self.stuck_low
            || (self.low_window.0..self.low_window.1).contains(&self.now_ns)
    }

    fn falling_edge(&mut self) {
        if let Some(start) = self.slot_start {
            if self.now_ns - start < SLOT_MIN {
                self.timing_fault();
            }
        }
        self.fall_ns = self.now_ns;
        self.pending = None;
        if self.state == State::Transmit {
            match self.tx.pop_front() {
                Some(bit) => {
                    if !bit {
                        self.low_window = (self.now_ns, self.now_ns + TX_0_HOLD);
                    }
                    self.pending = Some(bit);
                }
                None => self.state = State::Idle,
            }
        }
    }

    fn rising_edge(&mut self) {
        let width = self.now_ns - self.fall_ns;
        if width >= RESET_MIN {
            self.bus_reset();
            return;
        }
        self.slot_start = Some(self.fall_ns);
        if self.pending.take().is_some() {
            self.bits_sent += 1;
            return;
        }
        match self.state {
            State::RomCommand | State::FunctionCommand | State::WriteScratchpad(_) => {
                if width < WRITE_1_MAX {
                    self.rx_byte |= 1 << self.rx_bits;
                } else if width < WRITE_0_MIN {
                    self.timing_fault();
                    return;
                }
                self.rx_bits += 1;
                if self.rx_bits == 8 {
                    let byte = self.rx_byte;
                    self.rx_byte = 0;
                    self.rx_bits = 0;
                    self.received.push(byte);
                    self.byte_received(byte);
                }
            }
            State::Idle | State::Transmit => {}
        }
    }

    fn timing_fault(&mut self) {
        self.timing_faults += 1;
        self.state = State::Idle;
        self.tx.clear();
        self.rx_byte = 0;
        self.rx_bits = 0;
    }

    fn bus_reset(&mut self) {
        self.resets += 1;
        self.slot_start = None;
        self.tx.clear();
        self.rx_byte = 0;
        self.rx_bits = 0;
        if self.present {
            self.state = State::RomCommand;
            self.low_window = (self.now_ns + PRESENCE_START, self.now_ns + PRESENCE_END);
        } else {
            self.state = State::Idle;
        }
    }

    fn byte_received(&mut self, byte: u8) {
        self.state = match (self.state, byte) {
            (State::RomCommand, 0x33) => {
                let rom = self.rom;
                self.transmit(&rom)
            }
            (State::RomCommand, 0xCC) => State::FunctionCommand,
            (State::FunctionCommand, 0x4E) => State::WriteScratchpad(0),
            (State::FunctionCommand, 0xBE) => {
                let pad = self.scratchpad();
                self.transmit(&pad)
            }
            (State::FunctionCommand, 0x44) => {
                self.conversions += 1;
                let [lsb, msb] = self.temperature.to_le_bytes();
                self.registers[0] = lsb;
                self.registers[1] = msb;
                State::Idle
            }
            (State::WriteScratchpad(n), value) => {
                if !self.ignore_writes {
                    self.registers[2 + n] = if n == 2 { (value & 0x60) | 0x1F } else { value };
                }
                if n == 2 {
                    State::Idle
                } else {
                    State::WriteScratchpad(n + 1)
                }
            }
            _ => State::Idle,
        };
    }

    fn transmit(&mut self, bytes: &[u8]) -> State {
        for (i, byte) in bytes.iter().enumerate() {
            let byte = if i == 0 && self.corrupt_reads { byte ^ 0x01 } else { *byte };
            self.tx.extend((0..8).map(|bit| (byte >> bit) & 1 == 1));
        }
        State::Transmit
    }
}

/// Line and clock of the simulated bus, cloned into the pin and the delay
#[derive(Clone)]
pub struct SimBus(Rc<RefCell<Device>>);

impl SimBus {
    pub fn new(device: Device) -> Self {
        SimBus(Rc::new(RefCell::new(device)))
    }

    pub fn device(&self) -> std::cell::RefMut<'_, Device> {
        self.0.borrow_mut()
    }
}

impl ErrorType for SimBus {
    type Error = Infallible;
}

impl OutputPin for SimBus {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut device = self.device();
        if !device.master_low {
            device.master_low = true;
            device.falling_edge();
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut device = self.device();
        if device.master_low {
            device.master_low = false;
            device.rising_edge();
        }
        Ok(())
    }
}

impl InputPin for SimBus {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.device().line_low())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.device().line_low())
    }
}

impl DelayNs for SimBus {
    fn delay_ns(&mut self, ns: u32) {
        self.device().now_ns += u64::from(ns);
    }
}

#[cfg(test)]
mod tests {
    use super::{Device, SimBus};
    use crate::Driver;
    use embedded_hal::delay::DelayNs;
    use embedded_hal::digital::OutputPin;

    fn pulse(bus: &mut SimBus, low_us: u32, release_us: u32) {
        bus.set_low().unwrap();
        bus.delay_us(low_us);
        bus.set_high().unwrap();
        bus.delay_us(release_us);
    }

    fn reset(bus: &mut SimBus) {
        pulse(bus, 480, 480);
    }

    #[test]
    fn driver_slots_keep_the_sensor_in_sync() {
        let mut bus = SimBus::new(Device::new());
        let mut delay = bus.clone();
        let mut driver = Driver::new((bus.clone(),));
        let mut rom = [0u8; 8];

        driver.reset_write_read(&mut delay, &[0x33], &mut rom).unwrap();

        assert_eq!(rom, super::ROM);
        assert_eq!(bus.device().timing_faults, 0);
        reset(&mut bus);
        assert_eq!(bus.device().timing_faults, 0);
    }

    #[test]
    fn short_write_zero_is_rejected() {
        let mut bus = SimBus::new(Device::new());
        reset(&mut bus);

        pulse(&mut bus, 20, 45);

        assert_eq!(bus.device().timing_faults, 1);
    }

    #[test]
    fn short_slot_is_rejected() {
        let mut bus = SimBus::new(Device::new());
        reset(&mut bus);

        pulse(&mut bus, 2, 10);
        pulse(&mut bus, 2, 60);

        assert_eq!(bus.device().timing_faults, 1);
    }

    #[test]
    fn late_presence_sample_misses_the_pulse() {
        let mut bus = SimBus::new(Device::new());
        let mut delay = bus.clone();
        bus.set_low().unwrap();
        delay.delay_us(480);
        bus.set_high().unwrap();

        delay.delay_us(70);
        assert!(bus.device().line_low());
        delay.delay_us(50);
        assert!(!bus.device().line_low());
    }

    #[test]
    fn late_read_sample_misses_a_zero() {
        let mut bus = SimBus::new(Device::new());
        reset(&mut bus);
        // read rom, LSB first
        for bit in 0..8 {
            let low_us = if (0x33 >> bit) & 1 == 1 { 2 } else { 60 };
            pulse(&mut bus, low_us, 62 - low_us);
        }
        // ROM[0] = 0x28, first bit is a 0
        bus.set_low().unwrap();
        bus.delay_us(2);
        bus.set_high().unwrap();
        bus.delay_us(8);
        assert!(bus.device().line_low());
        bus.delay_us(10);
        assert!(!bus.device().line_low());
    }
}

#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]

mod command;
pub mod crc;
mod driver;
pub mod ds18b20;
mod iowire;
mod result;
mod rom;
mod scratchpad;
#[cfg(test)]
mod sim;

pub use command::{Command, OpCode};
pub use crc::{check_crc8, compute_partial_crc8, crc8};
pub use driver::Driver;
pub use ds18b20::{Config, Ds18b20};
pub use iowire::IoWire;
pub use result::Error;
pub use rom::{RomCode, RomCodeError};
pub use scratchpad::{Resolution, Scratchpad, MAX_CONVERSION_TIME_US};

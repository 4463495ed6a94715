pub trait OpCode {
    fn op_code(&self) -> u8;
}

/// ROM (addressing) commands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    MatchRom = 0x55,
    SearchRom = 0xF0,
    SearchRomAlarmed = 0xEC,
    SkipRom = 0xCC,
    ReadRom = 0x33,
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
            0x55 => Command::MatchRom,
            0xF0 => Command::SearchRom,
            0xEC => Command::SearchRomAlarmed,
            0xCC => Command::SkipRom,
            0x33 => Command::ReadRom,
            other => return Err(other),
        })
    }
}

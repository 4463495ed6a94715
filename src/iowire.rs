use embedded_hal::digital::{Error, ErrorType, InputPin, OutputPin};

/// Open-drain bus line.
///
/// Driving the line high must release it to high impedance so the external
/// pull-up (or the sensor) decides the level, e.g. an open-drain GPIO or a pin
/// switched to input mode.
pub trait IoWire {
    type Error: Error;

    /// Samples the line, true when the pull-up holds it high
    fn is_high(&mut self) -> Result<bool, Self::Error>;

    /// Samples the line, true when anyone pulls it low
    fn is_low(&mut self) -> Result<bool, Self::Error>;

    /// Pulls the line low
    fn set_low(&mut self) -> Result<(), Self::Error>;

    /// Releases the line
    ///
    /// *NOTE* the line only reads high once every party on the bus has
    /// released it
    fn set_high(&mut self) -> Result<(), Self::Error>;
}

/// Single open-drain pin
impl<IO> IoWire for (IO,)
where
    IO: ErrorType + OutputPin + InputPin,
{
    type Error = IO::Error;

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_high()
    }
}

/// Separate sense and drive pins wired to the same line
impl<E, I, O> IoWire for (I, O)
where
    E: Error,
    I: ErrorType<Error = E> + InputPin,
    O: ErrorType<Error = E> + OutputPin,
{
    type Error = E;

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.1.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.1.set_high()
    }
}

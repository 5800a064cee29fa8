use core::fmt;

/// Errors reported by the GPIO and clock drivers.
///
/// All of them are caller mistakes detected before any register is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioError {
    /// The port code or base address does not name one of ports A-I.
    UnknownPort,
    /// Pin number outside 0-15.
    InvalidPinNumber,
    /// Interrupt-edge modes need EXTI/SYSCFG routing, which this driver does
    /// not configure.
    UnsupportedMode,
    /// Alternate function selector outside 0-15.
    InvalidAlternateFunction,
    /// The LCKR key sequence did not latch the lock bit.
    LockFailed,
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpioError::UnknownPort => f.write_str("unknown GPIO port"),
            GpioError::InvalidPinNumber => f.write_str("pin number out of range 0-15"),
            GpioError::UnsupportedMode => {
                f.write_str("interrupt-edge modes are not configured by the GPIO driver")
            }
            GpioError::InvalidAlternateFunction => {
                f.write_str("alternate function out of range 0-15")
            }
            GpioError::LockFailed => f.write_str("GPIO configuration lock did not latch"),
        }
    }
}

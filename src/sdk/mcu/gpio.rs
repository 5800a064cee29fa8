use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin, PinState, StatefulOutputPin};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::GpioError;
use crate::sdk::common::bit::{read_field, replace_field};
use crate::sdk::mcu::register::{Bus, GpioRegs, Lckr, GPIO_BASE_ADDRS};
use crate::{BIT, BIT_RNG};

pub const PINS_PER_PORT: u8 = 16;

/// GPIO port identity.
///
/// The discriminant is the port code used by SYSCFG_EXTICR and the bit index
/// of the port in RCC_AHB1ENR/AHB1RSTR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Port {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
    G = 6,
    H = 7,
    I = 8,
}

pub const PORTS: [Port; 9] = [
    Port::A,
    Port::B,
    Port::C,
    Port::D,
    Port::E,
    Port::F,
    Port::G,
    Port::H,
    Port::I,
];

impl Port {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<Self, GpioError> {
        Port::from_u8(code).ok_or(GpioError::UnknownPort)
    }

    pub const fn base_address(self) -> u32 {
        GPIO_BASE_ADDRS[self as usize]
    }

    /// Maps a GPIO block base address back to its port.
    pub fn from_base_address(addr: u32) -> Result<Self, GpioError> {
        PORTS
            .iter()
            .copied()
            .find(|port| port.base_address() == addr)
            .ok_or(GpioError::UnknownPort)
    }

    pub fn regs<B: Bus>(self, bus: &B) -> GpioRegs<'_, B> {
        GpioRegs::new(bus, self.base_address())
    }
}

/// Pin mode. Values 0-3 are the MODER encoding; the interrupt-edge modes
/// exist so a configuration can name them, but this driver rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PinMode {
    #[default]
    Input = 0,
    Output = 1,
    Alternate = 2,
    Analog = 3,
    InterruptFalling = 4,
    InterruptRising = 5,
    InterruptBoth = 6,
}

impl PinMode {
    pub const fn is_interrupt(self) -> bool {
        matches!(
            self,
            PinMode::InterruptFalling | PinMode::InterruptRising | PinMode::InterruptBoth
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PinSpeed {
    #[default]
    Low = 0,
    Medium = 1,
    High = 2,
    VeryHigh = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Pull {
    #[default]
    None = 0,
    Up = 1,
    Down = 2,
    Reserved = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OutputType {
    #[default]
    PushPull = 0,
    OpenDrain = 1,
}

/// Settings for one pin, consumed by [`gpio_configure_pin`].
///
/// `alt_function` is only applied when `mode` is [`PinMode::Alternate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinConfig {
    pub pin: u8,
    pub mode: PinMode,
    pub speed: PinSpeed,
    pub pull: Pull,
    pub output_type: OutputType,
    pub alt_function: u8,
}

impl PinConfig {
    pub const fn new(pin: u8, mode: PinMode) -> Self {
        Self {
            pin,
            mode,
            speed: PinSpeed::Low,
            pull: Pull::None,
            output_type: OutputType::PushPull,
            alt_function: 0,
        }
    }

    pub const fn input(pin: u8) -> Self {
        Self::new(pin, PinMode::Input)
    }

    /// Push-pull output, low speed, no pull resistor.
    pub const fn output(pin: u8) -> Self {
        Self::new(pin, PinMode::Output)
    }

    pub const fn alternate(pin: u8, alt_function: u8) -> Self {
        let mut config = Self::new(pin, PinMode::Alternate);
        config.alt_function = alt_function;
        config
    }

    pub const fn analog(pin: u8) -> Self {
        Self::new(pin, PinMode::Analog)
    }

    pub const fn speed(mut self, speed: PinSpeed) -> Self {
        self.speed = speed;
        self
    }

    pub const fn pull(mut self, pull: Pull) -> Self {
        self.pull = pull;
        self
    }

    pub const fn output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = output_type;
        self
    }
}

#[inline(always)]
pub(crate) fn check_pin(pin: u8) -> Result<u8, GpioError> {
    if pin < PINS_PER_PORT {
        Ok(pin)
    } else {
        warn!("pin {} out of range", pin);
        Err(GpioError::InvalidPinNumber)
    }
}

// AFR[pin / 8], 4 bits per pin
#[inline(always)]
const fn afr_slot(pin: u8) -> (usize, u32) {
    ((pin / 8) as usize, 4 * (pin % 8) as u32)
}

#[inline(always)]
const fn bsrr_word(pin: u8, state: PinState) -> u32 {
    match state {
        PinState::High => BIT!(pin),
        PinState::Low => BIT!(pin + 16),
    }
}

/// Configures one pin of a port.
///
/// # Parameters
///
/// * `bus` - Register bus
/// * `port` - The port the pin belongs to
/// * `config` - Pin number, mode, speed, pull, output type and alternate function
///
/// # Algorithm
///
/// 1. Validate the pin number and, for alternate mode, the function selector
/// 2. Reject interrupt-edge modes without touching any register
/// 3. Inside a critical section, for each of AFR (alternate mode only),
///    OTYPER, OSPEEDR, PUPDR and finally MODER: clear the pin's field, then
///    merge the new value into it
///
/// # Notes
///
/// * 2-bit fields sit at `2 * pin`, OTYPER at bit `pin`, the AFR field at
///   `4 * (pin % 8)` of `AFR[pin / 8]`
/// * Fields belonging to the other 15 pins are written back unchanged
/// * MODER goes last so the pin only starts driving once output type, speed
///   and pull are in place
/// * The port clock must already be enabled
pub fn gpio_configure_pin<B: Bus>(
    bus: &B,
    port: Port,
    config: &PinConfig,
) -> Result<(), GpioError> {
    let pin = check_pin(config.pin)?;

    if config.mode.is_interrupt() {
        warn!("P{}{}: interrupt-edge mode not supported", port, pin);
        return Err(GpioError::UnsupportedMode);
    }

    let alternate = config.mode == PinMode::Alternate;
    if alternate && config.alt_function > 0x0f {
        warn!("P{}{}: alternate function {} out of range", port, pin, config.alt_function);
        return Err(GpioError::InvalidAlternateFunction);
    }

    let regs = port.regs(bus);
    let shift = 2 * pin as u32;

    critical_section::with(|_| {
        if alternate {
            let (index, af_shift) = afr_slot(pin);
            regs.modify_afr(index, |v| {
                replace_field(v, af_shift, 4, config.alt_function as u32)
            });
        }
        regs.modify_otyper(|v| replace_field(v, pin as u32, 1, config.output_type as u32));
        regs.modify_ospeedr(|v| replace_field(v, shift, 2, config.speed as u32));
        regs.modify_pupdr(|v| replace_field(v, shift, 2, config.pull as u32));
        regs.modify_moder(|v| replace_field(v, shift, 2, config.mode as u32));
    });

    trace!("P{}{}: configured as {}", port, pin, config.mode);
    Ok(())
}

/// Reads a pin's current configuration back from the port registers.
///
/// `alt_function` reports whatever the AFR field holds, also for pins that
/// are not in alternate mode.
pub fn gpio_pin_config<B: Bus>(bus: &B, port: Port, pin: u8) -> Result<PinConfig, GpioError> {
    let pin = check_pin(pin)?;
    let regs = port.regs(bus);
    let shift = 2 * pin as u32;
    let (index, af_shift) = afr_slot(pin);

    Ok(PinConfig {
        pin,
        mode: PinMode::from_u32(read_field(regs.read_moder(), shift, 2)).unwrap_or_default(),
        speed: PinSpeed::from_u32(read_field(regs.read_ospeedr(), shift, 2)).unwrap_or_default(),
        pull: Pull::from_u32(read_field(regs.read_pupdr(), shift, 2)).unwrap_or_default(),
        output_type: OutputType::from_u32(read_field(regs.read_otyper(), pin as u32, 1))
            .unwrap_or_default(),
        alt_function: read_field(regs.read_afr(index), af_shift, 4) as u8,
    })
}

pub fn gpio_read_pin<B: Bus>(bus: &B, port: Port, pin: u8) -> Result<PinState, GpioError> {
    let pin = check_pin(pin)?;
    Ok(PinState::from(port.regs(bus).read_idr() & BIT!(pin) != 0))
}

pub fn gpio_read_port<B: Bus>(bus: &B, port: Port) -> u16 {
    (port.regs(bus).read_idr() & BIT_RNG!(0, 15)) as u16
}

/// State the output data register is driving on a pin.
pub fn gpio_read_output_pin<B: Bus>(bus: &B, port: Port, pin: u8) -> Result<PinState, GpioError> {
    let pin = check_pin(pin)?;
    Ok(PinState::from(port.regs(bus).read_odr() & BIT!(pin) != 0))
}

/// Drives a pin high or low.
///
/// Uses a single BSRR write (low half sets, high half resets), so there is no
/// read-modify-write that an interrupt handler writing the same port could
/// race with.
pub fn gpio_write_pin<B: Bus>(
    bus: &B,
    port: Port,
    pin: u8,
    state: PinState,
) -> Result<(), GpioError> {
    let pin = check_pin(pin)?;
    port.regs(bus).write_bsrr(bsrr_word(pin, state));
    Ok(())
}

/// Overwrites the whole output data register.
pub fn gpio_write_port<B: Bus>(bus: &B, port: Port, value: u16) {
    port.regs(bus).write_odr(value as u32);
}

/// Flips a pin's output.
///
/// # Algorithm
///
/// 1. Read ODR to learn the pin's current output
/// 2. Write the opposite state through BSRR
///
/// # Notes
///
/// * Only the target pin is written; other pins of the port are never
///   rewritten from a stale ODR snapshot
/// * The read and the write run in one critical section, so an interrupt
///   handler driving the same pin cannot slip in between them
pub fn gpio_toggle_pin<B: Bus>(bus: &B, port: Port, pin: u8) -> Result<(), GpioError> {
    let pin = check_pin(pin)?;
    toggle(&port.regs(bus), pin);
    Ok(())
}

fn toggle<B: Bus>(regs: &GpioRegs<'_, B>, pin: u8) {
    critical_section::with(|_| {
        let state = PinState::from(regs.read_odr() & BIT!(pin) == 0);
        regs.write_bsrr(bsrr_word(pin, state));
    });
}

/// Freezes the configuration of the pins in `mask` until the next reset.
///
/// Runs the LCKR key sequence: write LCKK|mask, mask, LCKK|mask, then read
/// twice. The sequence must not be interrupted, so it runs in a critical
/// section. Fails with [`GpioError::LockFailed`] when LCKK does not read back
/// set.
pub fn gpio_lock_pins<B: Bus>(bus: &B, port: Port, mask: u16) -> Result<(), GpioError> {
    let regs = port.regs(bus);
    let pins = mask as u32;
    let key = Lckr::LCKK.bits() | pins;

    let locked = critical_section::with(|_| {
        regs.write_lckr(key);
        regs.write_lckr(pins);
        regs.write_lckr(key);
        let _ = regs.read_lckr();
        Lckr::from_bits_truncate(regs.read_lckr()).contains(Lckr::LCKK)
    });

    if locked {
        debug!("P{}: locked pins {:#x}", port, mask);
        Ok(())
    } else {
        warn!("P{}: lock sequence failed", port);
        Err(GpioError::LockFailed)
    }
}

/// One pin bound to its port, usable through the `embedded-hal` digital traits.
pub struct Pin<'a, B: Bus> {
    bus: &'a B,
    port: Port,
    pin: u8,
}

impl<'a, B: Bus> Pin<'a, B> {
    pub fn new(bus: &'a B, port: Port, pin: u8) -> Result<Self, GpioError> {
        Ok(Self {
            bus,
            port,
            pin: check_pin(pin)?,
        })
    }

    pub fn port(&self) -> Port {
        self.port
    }

    pub fn number(&self) -> u8 {
        self.pin
    }

    /// Applies `config` to this pin; `config.pin` is ignored.
    pub fn configure(&self, config: PinConfig) -> Result<(), GpioError> {
        gpio_configure_pin(
            self.bus,
            self.port,
            &PinConfig {
                pin: self.pin,
                ..config
            },
        )
    }

    fn regs(&self) -> GpioRegs<'a, B> {
        self.port.regs(self.bus)
    }
}

impl<B: Bus> ErrorType for Pin<'_, B> {
    type Error = Infallible;
}

impl<B: Bus> OutputPin for Pin<'_, B> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.regs().write_bsrr(bsrr_word(self.pin, PinState::Low));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.regs().write_bsrr(bsrr_word(self.pin, PinState::High));
        Ok(())
    }
}

impl<B: Bus> StatefulOutputPin for Pin<'_, B> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.regs().read_odr() & BIT!(self.pin) != 0)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.regs().read_odr() & BIT!(self.pin) == 0)
    }

    fn toggle(&mut self) -> Result<(), Self::Error> {
        toggle(&self.regs(), self.pin);
        Ok(())
    }
}

impl<B: Bus> InputPin for Pin<'_, B> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.regs().read_idr() & BIT!(self.pin) != 0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.regs().read_idr() & BIT!(self.pin) == 0)
    }
}

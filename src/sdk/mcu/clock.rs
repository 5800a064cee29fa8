use bitflags::bitflags;

use crate::error::GpioError;
use crate::sdk::mcu::gpio::Port;
use crate::sdk::mcu::register::{Bus, RccRegs};

bitflags! {
    /// GPIO clock enable bits of RCC_AHB1ENR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ahb1Enr: u32 {
        const GPIOA_EN = 1 << 0;
        const GPIOB_EN = 1 << 1;
        const GPIOC_EN = 1 << 2;
        const GPIOD_EN = 1 << 3;
        const GPIOE_EN = 1 << 4;
        const GPIOF_EN = 1 << 5;
        const GPIOG_EN = 1 << 6;
        const GPIOH_EN = 1 << 7;
        const GPIOI_EN = 1 << 8;
    }
}

bitflags! {
    /// GPIO reset bits of RCC_AHB1RSTR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ahb1Rstr: u32 {
        const GPIOA_RST = 1 << 0;
        const GPIOB_RST = 1 << 1;
        const GPIOC_RST = 1 << 2;
        const GPIOD_RST = 1 << 3;
        const GPIOE_RST = 1 << 4;
        const GPIOF_RST = 1 << 5;
        const GPIOG_RST = 1 << 6;
        const GPIOH_RST = 1 << 7;
        const GPIOI_RST = 1 << 8;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClockGate {
    pub port: Port,
    pub enable: Ahb1Enr,
    pub reset: Ahb1Rstr,
}

pub static CLOCK_GATES: [ClockGate; 9] = [
    ClockGate { port: Port::A, enable: Ahb1Enr::GPIOA_EN, reset: Ahb1Rstr::GPIOA_RST },
    ClockGate { port: Port::B, enable: Ahb1Enr::GPIOB_EN, reset: Ahb1Rstr::GPIOB_RST },
    ClockGate { port: Port::C, enable: Ahb1Enr::GPIOC_EN, reset: Ahb1Rstr::GPIOC_RST },
    ClockGate { port: Port::D, enable: Ahb1Enr::GPIOD_EN, reset: Ahb1Rstr::GPIOD_RST },
    ClockGate { port: Port::E, enable: Ahb1Enr::GPIOE_EN, reset: Ahb1Rstr::GPIOE_RST },
    ClockGate { port: Port::F, enable: Ahb1Enr::GPIOF_EN, reset: Ahb1Rstr::GPIOF_RST },
    ClockGate { port: Port::G, enable: Ahb1Enr::GPIOG_EN, reset: Ahb1Rstr::GPIOG_RST },
    ClockGate { port: Port::H, enable: Ahb1Enr::GPIOH_EN, reset: Ahb1Rstr::GPIOH_RST },
    ClockGate { port: Port::I, enable: Ahb1Enr::GPIOI_EN, reset: Ahb1Rstr::GPIOI_RST },
];

pub fn clock_gate(port: Port) -> Result<&'static ClockGate, GpioError> {
    CLOCK_GATES
        .iter()
        .find(|gate| gate.port == port)
        .ok_or(GpioError::UnknownPort)
}

/// Turns a port's AHB1 clock on or off.
///
/// Only the port's own AHB1ENR bit changes. Calling it twice with the same
/// `enable` leaves the register as after the first call.
pub fn clock_set_port<B: Bus>(bus: &B, port: Port, enable: bool) -> Result<(), GpioError> {
    let gate = clock_gate(port)?;
    let rcc = RccRegs::new(bus);

    critical_section::with(|_| {
        rcc.modify_ahb1enr(|v| {
            let mut enr = Ahb1Enr::from_bits_retain(v);
            enr.set(gate.enable, enable);
            enr.bits()
        });
    });

    debug!("P{}: clock {}", port, if enable { "on" } else { "off" });
    Ok(())
}

pub fn clock_port_enabled<B: Bus>(bus: &B, port: Port) -> Result<bool, GpioError> {
    let gate = clock_gate(port)?;
    Ok(Ahb1Enr::from_bits_retain(RccRegs::new(bus).read_ahb1enr()).contains(gate.enable))
}

/// Returns every register of a port to its power-on value.
///
/// # Algorithm
///
/// 1. Set the port's AHB1RSTR bit, holding the block in reset
/// 2. Clear the bit again, releasing it
///
/// # Notes
///
/// * Other ports' reset bits are preserved across both writes
/// * The clock enable bit is not touched
pub fn clock_reset_port<B: Bus>(bus: &B, port: Port) -> Result<(), GpioError> {
    let gate = clock_gate(port)?;
    let rcc = RccRegs::new(bus);

    critical_section::with(|_| {
        rcc.modify_ahb1rstr(|v| v | gate.reset.bits());
        rcc.modify_ahb1rstr(|v| v & !gate.reset.bits());
    });

    debug!("P{}: reset", port);
    Ok(())
}

//! Register access layer for the GPIO ports of STM32F4 parts.
//!
//! Every operation takes a [`Bus`](sdk::mcu::register::Bus): [`Mmio`] on the
//! chip, [`RegisterFile`] on the host.

#![cfg_attr(not(test), no_std)]

// must stay first so the logging macros are visible in every module
#[macro_use]
mod fmt;

pub mod app;
pub mod config;
pub mod error;
pub mod sdk;

pub use error::GpioError;
pub use sdk::mcu::clock::{clock_port_enabled, clock_reset_port, clock_set_port};
pub use sdk::mcu::gpio::{
    gpio_configure_pin, gpio_lock_pins, gpio_pin_config, gpio_read_output_pin, gpio_read_pin,
    gpio_read_port, gpio_toggle_pin, gpio_write_pin, gpio_write_port, OutputType, Pin, PinConfig,
    PinMode, PinSpeed, Port, Pull,
};
pub use sdk::mcu::register::{Bus, Mmio};
pub use sdk::mcu::register_file::RegisterFile;

use crate::sdk::mcu::gpio::{Port, Pull};

// Board pin assignments

// STM32F407G-DISC1: green LED LD4, blue user button B1 (external pull-down)
#[cfg(not(feature = "board-nucleo-f411"))]
pub const LED_PORT: Port = Port::D;
#[cfg(not(feature = "board-nucleo-f411"))]
pub const LED_PIN: u8 = 12;
#[cfg(not(feature = "board-nucleo-f411"))]
pub const BUTTON_PORT: Port = Port::A;
#[cfg(not(feature = "board-nucleo-f411"))]
pub const BUTTON_PIN: u8 = 0;

// NUCLEO-F411RE: LD2, blue user button B1 (external pull-up, active low)
#[cfg(feature = "board-nucleo-f411")]
pub const LED_PORT: Port = Port::A;
#[cfg(feature = "board-nucleo-f411")]
pub const LED_PIN: u8 = 5;
#[cfg(feature = "board-nucleo-f411")]
pub const BUTTON_PORT: Port = Port::C;
#[cfg(feature = "board-nucleo-f411")]
pub const BUTTON_PIN: u8 = 13;

// Both boards pull the button line externally
pub const BUTTON_PULL: Pull = Pull::None;

// HSI, the clock every F4 starts on
pub const CORE_CLOCK_HZ: u32 = 16_000_000;

// Time between two LED toggles
pub const BLINK_PERIOD_MS: u32 = 433;

// 5e5 empty iterations measured at 433 ms on the discovery board
pub const LEGACY_BLINK_ITERATIONS: u32 = 500_000;
pub const LEGACY_ITERATIONS_PER_MS: u32 = LEGACY_BLINK_ITERATIONS / BLINK_PERIOD_MS;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::PinState;

use crate::config::{
    BLINK_PERIOD_MS, BUTTON_PIN, BUTTON_PORT, BUTTON_PULL, LED_PIN, LED_PORT,
};
use crate::error::GpioError;
use crate::sdk::mcu::clock::clock_set_port;
use crate::sdk::mcu::gpio::{
    gpio_configure_pin, gpio_read_pin, gpio_toggle_pin, gpio_write_pin, PinConfig,
};
use crate::sdk::mcu::register::Bus;

/// Clocks the LED and button ports and configures both pins.
pub fn user_init<B: Bus>(bus: &B) -> Result<(), GpioError> {
    clock_set_port(bus, LED_PORT, true)?;
    clock_set_port(bus, BUTTON_PORT, true)?;

    gpio_configure_pin(bus, LED_PORT, &PinConfig::output(LED_PIN))?;
    gpio_configure_pin(bus, BUTTON_PORT, &PinConfig::input(BUTTON_PIN).pull(BUTTON_PULL))?;

    debug!("board ready: LED P{}{}, button P{}{}", LED_PORT, LED_PIN, BUTTON_PORT, BUTTON_PIN);
    Ok(())
}

/// One blink step: flip the LED, then wait [`BLINK_PERIOD_MS`] before the
/// next flip.
pub fn main_loop<B: Bus, D: DelayNs>(bus: &B, delay: &mut D) -> Result<(), GpioError> {
    gpio_toggle_pin(bus, LED_PORT, LED_PIN)?;
    delay.delay_ms(BLINK_PERIOD_MS);
    Ok(())
}

/// Copies the button level onto the LED and returns it.
pub fn follow_button<B: Bus>(bus: &B) -> Result<PinState, GpioError> {
    let state = gpio_read_pin(bus, BUTTON_PORT, BUTTON_PIN)?;
    gpio_write_pin(bus, LED_PORT, LED_PIN, state)?;
    Ok(state)
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
fn halt() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
fn take_board() -> (crate::sdk::mcu::register::Mmio, cortex_m::peripheral::SYST) {
    use crate::sdk::mcu::register::Mmio;

    let (Some(bus), Some(cp)) = (Mmio::take(), cortex_m::Peripherals::take()) else {
        warn!("peripherals already taken");
        halt()
    };
    if user_init(&bus).is_err() {
        halt()
    }
    (bus, cp.SYST)
}

/// Blinks the board LED forever.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn main_entrypoint() -> ! {
    use crate::config::CORE_CLOCK_HZ;
    use crate::sdk::mcu::delay::SysTickDelay;

    let (bus, syst) = take_board();
    let mut delay = SysTickDelay::new(syst, CORE_CLOCK_HZ);

    loop {
        if main_loop(&bus, &mut delay).is_err() {
            halt()
        }
    }
}

/// Drives the board LED from the user button forever.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn button_entrypoint() -> ! {
    let (bus, _syst) = take_board();

    loop {
        if follow_button(&bus).is_err() {
            halt()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::sdk::mcu::clock::clock_port_enabled;
    use crate::sdk::mcu::gpio::{gpio_pin_config, gpio_read_output_pin, PinMode};
    use crate::sdk::mcu::register::GPIO_IDR;
    use crate::sdk::mcu::register_file::RegisterFile;

    use super::*;

    #[derive(Default)]
    struct RecordingDelay {
        ms: Vec<u32>,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, _ns: u32) {}

        fn delay_ms(&mut self, ms: u32) {
            self.ms.push(ms);
        }
    }

    #[test]
    fn test_user_init_clocks_and_configures_pins() {
        let file = RegisterFile::new();
        user_init(&file).unwrap();

        assert!(clock_port_enabled(&file, LED_PORT).unwrap());
        assert!(clock_port_enabled(&file, BUTTON_PORT).unwrap());
        assert_eq!(gpio_pin_config(&file, LED_PORT, LED_PIN).unwrap().mode, PinMode::Output);
        assert_eq!(gpio_pin_config(&file, BUTTON_PORT, BUTTON_PIN).unwrap().mode, PinMode::Input);
    }

    #[test]
    fn test_main_loop_blinks() {
        let file = RegisterFile::new();
        let mut delay = RecordingDelay::default();
        user_init(&file).unwrap();

        let mut expected = PinState::High;
        for _ in 0..4 {
            main_loop(&file, &mut delay).unwrap();
            assert_eq!(gpio_read_output_pin(&file, LED_PORT, LED_PIN), Ok(expected));
            expected = !expected;
        }
        assert_eq!(delay.ms, [BLINK_PERIOD_MS; 4]);
    }

    #[test]
    fn test_follow_button_copies_level() {
        let file = RegisterFile::new();
        user_init(&file).unwrap();
        let idr = BUTTON_PORT.base_address() + GPIO_IDR;

        file.poke(idr, 1 << BUTTON_PIN);
        assert_eq!(follow_button(&file), Ok(PinState::High));
        assert_eq!(gpio_read_output_pin(&file, LED_PORT, LED_PIN), Ok(PinState::High));

        file.poke(idr, 0);
        assert_eq!(follow_button(&file), Ok(PinState::Low));
        assert_eq!(gpio_read_output_pin(&file, LED_PORT, LED_PIN), Ok(PinState::Low));
    }
}

use embedded_hal::delay::DelayNs;

use crate::config::LEGACY_ITERATIONS_PER_MS;

/// Spins for a fixed number of loop iterations.
///
/// The wall-clock length depends on the core clock and the optimisation
/// level; there is no accuracy guarantee.
#[cfg_attr(test, mry::mry)]
#[inline(never)]
pub fn busy_wait(iterations: u32) {
    for _ in 0..iterations {
        core::hint::spin_loop();
    }
}

/// Busy-wait delay calibrated by a loop count per millisecond.
///
/// Fallback for when SysTick is owned by something else.
#[derive(Debug, Clone, Copy)]
pub struct BusyWait {
    iterations_per_ms: u32,
}

impl BusyWait {
    pub const fn new(iterations_per_ms: u32) -> Self {
        Self { iterations_per_ms }
    }
}

impl Default for BusyWait {
    /// Calibrated for the boot clock.
    fn default() -> Self {
        Self::new(LEGACY_ITERATIONS_PER_MS)
    }
}

impl DelayNs for BusyWait {
    fn delay_ns(&mut self, ns: u32) {
        let iterations = (self.iterations_per_ms as u64 * ns as u64).div_ceil(1_000_000);
        busy_wait(iterations.min(u32::MAX as u64) as u32);
    }

    fn delay_us(&mut self, us: u32) {
        let iterations = (self.iterations_per_ms as u64 * us as u64).div_ceil(1_000);
        busy_wait(iterations.min(u32::MAX as u64) as u32);
    }

    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            busy_wait(self.iterations_per_ms);
        }
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use self::systick::SysTickDelay;

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod systick {
    use cortex_m::peripheral::syst::SystClkSource;
    use cortex_m::peripheral::SYST;
    use embedded_hal::delay::DelayNs;

    // SysTick is a 24-bit down counter
    const MAX_RELOAD: u32 = 0x00FF_FFFF;

    /// Delay counted in core clock cycles by SysTick.
    pub struct SysTickDelay {
        syst: SYST,
        cycles_per_us: u32,
    }

    impl SysTickDelay {
        pub fn new(mut syst: SYST, core_clock_hz: u32) -> Self {
            syst.set_clock_source(SystClkSource::Core);
            Self {
                syst,
                cycles_per_us: (core_clock_hz / 1_000_000).max(1),
            }
        }

        pub fn free(self) -> SYST {
            self.syst
        }

        fn wait_cycles(&mut self, mut cycles: u64) {
            while cycles > 0 {
                let chunk = cycles.min(MAX_RELOAD as u64) as u32;
                self.syst.set_reload(chunk.max(1));
                self.syst.clear_current();
                self.syst.enable_counter();
                while !self.syst.has_wrapped() {}
                self.syst.disable_counter();
                cycles -= chunk as u64;
            }
        }
    }

    impl DelayNs for SysTickDelay {
        fn delay_ns(&mut self, ns: u32) {
            let cycles = (ns as u64 * self.cycles_per_us as u64).div_ceil(1_000);
            self.wait_cycles(cycles);
        }

        fn delay_us(&mut self, us: u32) {
            self.wait_cycles(us as u64 * self.cycles_per_us as u64);
        }

        fn delay_ms(&mut self, ms: u32) {
            self.wait_cycles(ms as u64 * 1_000 * self.cycles_per_us as u64);
        }
    }
}

#[cfg(test)]
mod tests {
    use mry::Any;

    use crate::config::{BLINK_PERIOD_MS, LEGACY_BLINK_ITERATIONS};

    use super::*;

    #[test]
    #[mry::lock(busy_wait)]
    fn test_busy_wait_delay_ms_spins_once_per_millisecond() {
        mock_busy_wait(Any).returns(());

        BusyWait::default().delay_ms(BLINK_PERIOD_MS);

        mock_busy_wait(LEGACY_ITERATIONS_PER_MS).assert_called(BLINK_PERIOD_MS as usize);
    }

    #[test]
    fn test_legacy_calibration_matches_blink_loop() {
        // one blink period of whole milliseconds stays within a millisecond
        // of the measured loop count
        let spun = LEGACY_ITERATIONS_PER_MS * BLINK_PERIOD_MS;
        assert!(spun <= LEGACY_BLINK_ITERATIONS);
        assert!(LEGACY_BLINK_ITERATIONS - spun < LEGACY_ITERATIONS_PER_MS);
    }

    #[test]
    #[mry::lock(busy_wait)]
    fn test_busy_wait_sub_millisecond_rounds_up() {
        mock_busy_wait(Any).returns(());

        let mut delay = BusyWait::new(1000);
        delay.delay_us(1);
        delay.delay_ns(1);

        mock_busy_wait(1).assert_called(2);
    }
}

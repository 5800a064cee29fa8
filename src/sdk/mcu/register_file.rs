//! In-memory stand-in for the peripheral address space.
//!
//! Registers read back their power-on value until written. The parts of the
//! GPIO and RCC behaviour the driver relies on are modelled:
//!
//! * BSRR is write-only (reads as zero); the low half sets ODR bits, the high
//!   half clears them, set wins when both are given for one pin.
//! * ODR keeps only 16 bits; with loop-back enabled every ODR change is
//!   mirrored into IDR, as if each output pin were wired to its input.
//! * A GPIO reset bit in AHB1RSTR returns that port to its power-on values.
//!
//! Only aligned words inside the GPIO port blocks and the RCC block are
//! stored. Writes anywhere else are dropped and reads there return zero, so
//! the backing map can never fill up.

use core::cell::{Cell, RefCell};

use heapless::FnvIndexMap;

use crate::sdk::mcu::register::{
    gpio_reset_value, rcc_reset_value, Bus, RccRegisterBlock, GPIOA_BASE_ADDR, GPIO_AFR,
    GPIO_BLOCK_SIZE, GPIO_BSRR, GPIO_IDR, GPIO_LCKR, GPIO_MODER, GPIO_ODR, GPIO_OSPEEDR,
    GPIO_OTYPER, GPIO_PORT_COUNT, GPIO_PORT_STRIDE, GPIO_PUPDR, RCC_AHB1RSTR, RCC_BASE_ADDR,
};

const RCC_BLOCK_SIZE: u32 = core::mem::size_of::<RccRegisterBlock>() as u32;

// 9 ports x 10 registers plus the 34 RCC words, rounded up to a power of two
const CAPACITY: usize = 128;

const _: () = assert!(
    (GPIO_PORT_COUNT * GPIO_BLOCK_SIZE + RCC_BLOCK_SIZE) / 4 <= CAPACITY as u32
);

const GPIO_OFFSETS: [u32; 10] = [
    GPIO_MODER,
    GPIO_OTYPER,
    GPIO_OSPEEDR,
    GPIO_PUPDR,
    GPIO_IDR,
    GPIO_ODR,
    GPIO_BSRR,
    GPIO_LCKR,
    GPIO_AFR,
    GPIO_AFR + 4,
];

#[derive(Default)]
pub struct RegisterFile {
    regs: RefCell<FnvIndexMap<u32, u32, CAPACITY>>,
    loopback: Cell<bool>,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// A register file whose GPIO inputs follow their outputs.
    pub fn with_loopback() -> Self {
        let file = Self::new();
        file.set_loopback(true);
        file
    }

    pub fn set_loopback(&self, enabled: bool) {
        self.loopback.set(enabled);
    }

    /// Stored value of a register, without the write-only read rule.
    pub fn peek(&self, addr: u32) -> u32 {
        self.regs
            .borrow()
            .get(&addr)
            .copied()
            .unwrap_or_else(|| reset_value(addr))
    }

    /// Stores a raw value, bypassing BSRR/ODR/reset behaviour. Use it to
    /// drive input pins or to seed arbitrary register content. Addresses
    /// outside the modelled blocks are ignored.
    pub fn poke(&self, addr: u32, value: u32) {
        if is_modelled(addr) {
            // capacity covers every modelled word
            let _ = self.regs.borrow_mut().insert(addr, value);
        }
    }

    fn write_odr(&self, base: u32, value: u32) {
        let value = value & 0xffff;
        self.poke(base + GPIO_ODR, value);
        if self.loopback.get() {
            let idr = self.peek(base + GPIO_IDR);
            self.poke(base + GPIO_IDR, (idr & !0xffff) | value);
        }
    }

    fn reset_gpio_ports(&self, mask: u32) {
        let mut regs = self.regs.borrow_mut();
        for index in (0..GPIO_PORT_COUNT).filter(|i| mask & (1 << i) != 0) {
            let base = GPIOA_BASE_ADDR + GPIO_PORT_STRIDE * index;
            for offset in GPIO_OFFSETS {
                regs.remove(&(base + offset));
            }
        }
    }
}

fn gpio_slot(addr: u32) -> Option<(u32, u32, u32)> {
    let rel = addr.checked_sub(GPIOA_BASE_ADDR)?;
    let index = rel / GPIO_PORT_STRIDE;
    let offset = rel % GPIO_PORT_STRIDE;
    (index < GPIO_PORT_COUNT && offset < GPIO_BLOCK_SIZE).then_some((
        index,
        addr - offset,
        offset,
    ))
}

fn rcc_slot(addr: u32) -> Option<u32> {
    addr.checked_sub(RCC_BASE_ADDR)
        .filter(|offset| *offset < RCC_BLOCK_SIZE)
}

fn is_modelled(addr: u32) -> bool {
    addr % 4 == 0 && (gpio_slot(addr).is_some() || rcc_slot(addr).is_some())
}

fn reset_value(addr: u32) -> u32 {
    if !is_modelled(addr) {
        return 0;
    }
    match gpio_slot(addr) {
        Some((index, _, offset)) => gpio_reset_value(index, offset),
        None => rcc_slot(addr).map_or(0, rcc_reset_value),
    }
}

impl Bus for RegisterFile {
    fn read(&self, addr: u32) -> u32 {
        match gpio_slot(addr) {
            Some((_, _, GPIO_BSRR)) => 0,
            _ => self.peek(addr),
        }
    }

    fn write(&self, addr: u32, value: u32) {
        match gpio_slot(addr) {
            Some((_, base, GPIO_BSRR)) => {
                let set = value & 0xffff;
                let reset = value >> 16;
                let odr = self.peek(base + GPIO_ODR);
                self.write_odr(base, (odr & !reset) | set);
            }
            Some((_, base, GPIO_ODR)) => self.write_odr(base, value),
            _ => {
                self.poke(addr, value);
                if addr == RCC_BASE_ADDR + RCC_AHB1RSTR {
                    self.reset_gpio_ports(value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::mcu::register::{
        GPIOA_BASE_ADDR, GPIOC_BASE_ADDR, GPIOD_BASE_ADDR, GPIOI_BASE_ADDR, RCC_AHB1ENR,
    };

    #[test]
    fn test_unwritten_registers_read_reset_values() {
        let file = RegisterFile::new();
        assert_eq!(file.read(GPIOA_BASE_ADDR + GPIO_MODER), 0xA800_0000);
        assert_eq!(file.read(GPIOD_BASE_ADDR + GPIO_MODER), 0);
        assert_eq!(file.read(RCC_BASE_ADDR + RCC_AHB1ENR), 0x0010_0000);
    }

    #[test]
    fn test_bsrr_sets_and_resets_odr() {
        let file = RegisterFile::new();
        file.write(GPIOD_BASE_ADDR + GPIO_ODR, 0x00F0);

        // set pin 0, reset pin 4
        file.write(GPIOD_BASE_ADDR + GPIO_BSRR, (1 << 0) | (1 << (4 + 16)));
        assert_eq!(file.read(GPIOD_BASE_ADDR + GPIO_ODR), 0x00E1);
    }

    #[test]
    fn test_bsrr_set_wins_over_reset() {
        let file = RegisterFile::new();
        file.write(GPIOD_BASE_ADDR + GPIO_BSRR, (1 << 7) | (1 << (7 + 16)));
        assert_eq!(file.read(GPIOD_BASE_ADDR + GPIO_ODR), 1 << 7);
    }

    #[test]
    fn test_bsrr_reads_zero() {
        let file = RegisterFile::new();
        file.write(GPIOC_BASE_ADDR + GPIO_BSRR, 0xFFFF);
        assert_eq!(file.read(GPIOC_BASE_ADDR + GPIO_BSRR), 0);
        assert_eq!(file.read(GPIOC_BASE_ADDR + GPIO_ODR), 0xFFFF);
    }

    #[test]
    fn test_loopback_mirrors_odr_into_idr() {
        let file = RegisterFile::with_loopback();
        file.poke(GPIOC_BASE_ADDR + GPIO_IDR, 0xDEAD_0000);
        file.write(GPIOC_BASE_ADDR + GPIO_ODR, 0x1_2345);

        assert_eq!(file.read(GPIOC_BASE_ADDR + GPIO_ODR), 0x2345);
        assert_eq!(file.read(GPIOC_BASE_ADDR + GPIO_IDR), 0xDEAD_2345);
    }

    #[test]
    fn test_without_loopback_idr_is_untouched() {
        let file = RegisterFile::new();
        file.write(GPIOC_BASE_ADDR + GPIO_ODR, 0x0001);
        assert_eq!(file.read(GPIOC_BASE_ADDR + GPIO_IDR), 0);
    }

    #[test]
    fn test_writes_outside_modelled_blocks_are_dropped() {
        let file = RegisterFile::new();
        for i in 0..200 {
            file.write(0x4000_0000 + 4 * i, i);
        }
        // unaligned words inside a port block are not stored either
        for i in 0..64 {
            file.write(GPIOC_BASE_ADDR + 4 * i + 1, i);
        }
        assert_eq!(file.read(0x4000_0000 + 4 * 10), 0);
        assert_eq!(file.read(GPIOC_BASE_ADDR + 1), 0);

        // every modelled word still fits
        for port in 0..GPIO_PORT_COUNT {
            for offset in GPIO_OFFSETS {
                file.poke(GPIOA_BASE_ADDR + GPIO_PORT_STRIDE * port + offset, 0x5A5A);
            }
        }
        for offset in (0..RCC_BLOCK_SIZE).step_by(4) {
            file.poke(RCC_BASE_ADDR + offset, 0xA5A5);
        }
        assert_eq!(file.peek(GPIOI_BASE_ADDR + GPIO_AFR + 4), 0x5A5A);
        assert_eq!(file.peek(RCC_BASE_ADDR + RCC_BLOCK_SIZE - 4), 0xA5A5);
    }

    #[test]
    fn test_ahb1rstr_restores_port_defaults() {
        let file = RegisterFile::new();
        file.write(GPIOA_BASE_ADDR + GPIO_MODER, 0x0000_0400);
        file.write(GPIOD_BASE_ADDR + GPIO_MODER, 0x0100_0000);

        // reset port A only
        file.write(RCC_BASE_ADDR + RCC_AHB1RSTR, 1 << 0);

        assert_eq!(file.read(GPIOA_BASE_ADDR + GPIO_MODER), 0xA800_0000);
        assert_eq!(file.read(GPIOD_BASE_ADDR + GPIO_MODER), 0x0100_0000);
    }
}

//! STM32F407 register map and the bus every register access goes through.
//!
//! Addresses and layouts follow RM0090. The register blocks are `#[repr(C)]`
//! overlays whose field order is the hardware order; the offsets used by the
//! accessors are derived from them and pinned against the manual at compile
//! time.

use core::cell::Cell;
use core::mem::{offset_of, size_of};

use bitflags::bitflags;
use critical_section::Mutex;

pub const PERIPH_BASE_ADDR: u32 = 0x4000_0000;
pub const APB1_BASE_ADDR: u32 = PERIPH_BASE_ADDR;
pub const APB2_BASE_ADDR: u32 = 0x4001_0000;
pub const AHB1_BASE_ADDR: u32 = 0x4002_0000;
pub const AHB2_BASE_ADDR: u32 = 0x5000_0000;

/****************************************************
 GPIO ports: AHB1, one block every 0x400
 *****************************************************/
pub const GPIO_PORT_STRIDE: u32 = 0x400;
pub const GPIO_PORT_COUNT: u32 = 9;

pub const GPIOA_BASE_ADDR: u32 = AHB1_BASE_ADDR + 0x0000;
pub const GPIOB_BASE_ADDR: u32 = AHB1_BASE_ADDR + 0x0400;
pub const GPIOC_BASE_ADDR: u32 = AHB1_BASE_ADDR + 0x0800;
pub const GPIOD_BASE_ADDR: u32 = AHB1_BASE_ADDR + 0x0C00;
pub const GPIOE_BASE_ADDR: u32 = AHB1_BASE_ADDR + 0x1000;
pub const GPIOF_BASE_ADDR: u32 = AHB1_BASE_ADDR + 0x1400;
pub const GPIOG_BASE_ADDR: u32 = AHB1_BASE_ADDR + 0x1800;
pub const GPIOH_BASE_ADDR: u32 = AHB1_BASE_ADDR + 0x1C00;
pub const GPIOI_BASE_ADDR: u32 = AHB1_BASE_ADDR + 0x2000;

pub const GPIO_BASE_ADDRS: [u32; GPIO_PORT_COUNT as usize] = [
    GPIOA_BASE_ADDR,
    GPIOB_BASE_ADDR,
    GPIOC_BASE_ADDR,
    GPIOD_BASE_ADDR,
    GPIOE_BASE_ADDR,
    GPIOF_BASE_ADDR,
    GPIOG_BASE_ADDR,
    GPIOH_BASE_ADDR,
    GPIOI_BASE_ADDR,
];

pub const RCC_BASE_ADDR: u32 = AHB1_BASE_ADDR + 0x3800;

#[repr(C)]
pub struct GpioRegisterBlock {
    pub moder: u32,
    pub otyper: u32,
    pub ospeedr: u32,
    pub pupdr: u32,
    pub idr: u32,
    pub odr: u32,
    pub bsrr: u32,
    pub lckr: u32,
    pub afr: [u32; 2],
}

pub const GPIO_MODER: u32 = offset_of!(GpioRegisterBlock, moder) as u32;
pub const GPIO_OTYPER: u32 = offset_of!(GpioRegisterBlock, otyper) as u32;
pub const GPIO_OSPEEDR: u32 = offset_of!(GpioRegisterBlock, ospeedr) as u32;
pub const GPIO_PUPDR: u32 = offset_of!(GpioRegisterBlock, pupdr) as u32;
pub const GPIO_IDR: u32 = offset_of!(GpioRegisterBlock, idr) as u32;
pub const GPIO_ODR: u32 = offset_of!(GpioRegisterBlock, odr) as u32;
pub const GPIO_BSRR: u32 = offset_of!(GpioRegisterBlock, bsrr) as u32;
pub const GPIO_LCKR: u32 = offset_of!(GpioRegisterBlock, lckr) as u32;
pub const GPIO_AFR: u32 = offset_of!(GpioRegisterBlock, afr) as u32;
pub const GPIO_BLOCK_SIZE: u32 = size_of::<GpioRegisterBlock>() as u32;

const _: () = assert!(GPIO_OTYPER == 0x04);
const _: () = assert!(GPIO_OSPEEDR == 0x08);
const _: () = assert!(GPIO_PUPDR == 0x0C);
const _: () = assert!(GPIO_IDR == 0x10);
const _: () = assert!(GPIO_ODR == 0x14);
const _: () = assert!(GPIO_BSRR == 0x18);
const _: () = assert!(GPIO_LCKR == 0x1C);
const _: () = assert!(GPIO_AFR == 0x20);
const _: () = assert!(GPIO_BLOCK_SIZE == 0x28);
const _: () = assert!(GPIO_BLOCK_SIZE <= GPIO_PORT_STRIDE);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lckr: u32 {
        const LCKK = 1 << 16;
    }
}

/// Power-on value of a GPIO register. Port A and B come out of reset with
/// the debug pins (JTAG/SWD) already in alternate mode.
pub const fn gpio_reset_value(port_index: u32, offset: u32) -> u32 {
    match (port_index, offset) {
        (0, GPIO_MODER) => 0xA800_0000,
        (0, GPIO_OSPEEDR) => 0x0C00_0000,
        (0, GPIO_PUPDR) => 0x6400_0000,
        (1, GPIO_MODER) => 0x0000_0280,
        (1, GPIO_OSPEEDR) => 0x0000_00C0,
        (1, GPIO_PUPDR) => 0x0000_0100,
        _ => 0,
    }
}

/****************************************************
 RCC: begin  0x4002_3800
 *****************************************************/
#[repr(C)]
pub struct RccRegisterBlock {
    pub cr: u32,
    pub pllcfgr: u32,
    pub cfgr: u32,
    pub cir: u32,
    pub ahb1rstr: u32,
    pub ahb2rstr: u32,
    pub ahb3rstr: u32,
    _reserved0: u32,
    pub apb1rstr: u32,
    pub apb2rstr: u32,
    _reserved1: [u32; 2],
    pub ahb1enr: u32,
    pub ahb2enr: u32,
    pub ahb3enr: u32,
    _reserved2: u32,
    pub apb1enr: u32,
    pub apb2enr: u32,
    _reserved3: [u32; 2],
    pub ahb1lpenr: u32,
    pub ahb2lpenr: u32,
    pub ahb3lpenr: u32,
    _reserved4: u32,
    pub apb1lpenr: u32,
    pub apb2lpenr: u32,
    _reserved5: [u32; 2],
    pub bdcr: u32,
    pub csr: u32,
    _reserved6: [u32; 2],
    pub sscgr: u32,
    pub plli2scfgr: u32,
}

pub const RCC_AHB1RSTR: u32 = offset_of!(RccRegisterBlock, ahb1rstr) as u32;
pub const RCC_AHB1ENR: u32 = offset_of!(RccRegisterBlock, ahb1enr) as u32;

const _: () = assert!(RCC_AHB1RSTR == 0x10);
const _: () = assert!(offset_of!(RccRegisterBlock, apb1rstr) == 0x20);
const _: () = assert!(RCC_AHB1ENR == 0x30);
const _: () = assert!(offset_of!(RccRegisterBlock, apb1enr) == 0x40);
const _: () = assert!(offset_of!(RccRegisterBlock, ahb1lpenr) == 0x50);
const _: () = assert!(offset_of!(RccRegisterBlock, bdcr) == 0x70);
const _: () = assert!(offset_of!(RccRegisterBlock, sscgr) == 0x80);
const _: () = assert!(size_of::<RccRegisterBlock>() == 0x88);

pub const fn rcc_reset_value(offset: u32) -> u32 {
    match offset {
        // CCMDATARAMEN
        RCC_AHB1ENR => 0x0010_0000,
        _ => 0,
    }
}

/****************************************************
 raw volatile access
 *****************************************************/
#[inline(always)]
#[cfg_attr(test, mry::mry)]
pub(crate) fn read_reg32(addr: u32) -> u32 {
    unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
}

#[inline(always)]
#[cfg_attr(test, mry::mry)]
pub(crate) fn write_reg32(addr: u32, value: u32) {
    unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
}

/// Access to 32-bit memory-mapped registers.
///
/// Every driver function takes the bus explicitly. On hardware this is
/// [`Mmio`]; host tests hand in a
/// [`RegisterFile`](crate::sdk::mcu::register_file::RegisterFile) instead.
pub trait Bus {
    fn read(&self, addr: u32) -> u32;

    fn write(&self, addr: u32, value: u32);

    /// Read-modify-write. Not atomic: callers sharing the register with an
    /// interrupt handler wrap this in a critical section.
    #[inline(always)]
    fn modify<F>(&self, addr: u32, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(addr);
        self.write(addr, f(value));
    }
}

impl<B: Bus + ?Sized> Bus for &B {
    #[inline(always)]
    fn read(&self, addr: u32) -> u32 {
        (**self).read(addr)
    }

    #[inline(always)]
    fn write(&self, addr: u32, value: u32) {
        (**self).write(addr, value)
    }
}

static MMIO_TAKEN: Mutex<Cell<bool>> = Mutex::new(Cell::new(false));

/// The physical peripheral address space.
///
/// There is one per program: [`Mmio::take`] hands it out once.
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// Returns the bus on the first call and `None` afterwards.
    pub fn take() -> Option<Self> {
        critical_section::with(|cs| {
            if MMIO_TAKEN.borrow(cs).replace(true) {
                None
            } else {
                Some(Self { _private: () })
            }
        })
    }

    /// # Safety
    ///
    /// The caller must be running on an STM32F4 and must make sure no other
    /// code performs conflicting read-modify-write sequences through a second
    /// handle.
    pub const unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl Bus for Mmio {
    #[inline(always)]
    fn read(&self, addr: u32) -> u32 {
        read_reg32(addr)
    }

    #[inline(always)]
    fn write(&self, addr: u32, value: u32) {
        write_reg32(addr, value)
    }
}

macro_rules! regrw {
    ( $x:ident, $a:expr ) => {
        paste::paste! {
            #[inline(always)]
            pub fn [<read_ $x>](&self) -> u32 {
                self.bus.read(self.base + $a)
            }

            #[inline(always)]
            pub fn [<write_ $x>](&self, value: u32) {
                self.bus.write(self.base + $a, value)
            }

            #[inline(always)]
            pub fn [<modify_ $x>]<F: FnOnce(u32) -> u32>(&self, f: F) {
                self.bus.modify(self.base + $a, f)
            }
        }
    };
}

macro_rules! regrw_idx {
    ( $x:ident, $a:expr ) => {
        paste::paste! {
            #[inline(always)]
            pub fn [<read_ $x>](&self, i: usize) -> u32 {
                self.bus.read(self.base + $a + ((i as u32) << 2))
            }

            #[inline(always)]
            pub fn [<write_ $x>](&self, value: u32, i: usize) {
                self.bus.write(self.base + $a + ((i as u32) << 2), value)
            }

            #[inline(always)]
            pub fn [<modify_ $x>]<F: FnOnce(u32) -> u32>(&self, i: usize, f: F) {
                self.bus.modify(self.base + $a + ((i as u32) << 2), f)
            }
        }
    };
}

/// Typed view of one GPIO port's registers.
pub struct GpioRegs<'a, B: Bus> {
    bus: &'a B,
    base: u32,
}

impl<'a, B: Bus> GpioRegs<'a, B> {
    pub const fn new(bus: &'a B, base: u32) -> Self {
        Self { bus, base }
    }

    pub const fn base(&self) -> u32 {
        self.base
    }

    regrw!(moder, GPIO_MODER);
    regrw!(otyper, GPIO_OTYPER);
    regrw!(ospeedr, GPIO_OSPEEDR);
    regrw!(pupdr, GPIO_PUPDR);
    regrw!(idr, GPIO_IDR);
    regrw!(odr, GPIO_ODR);
    regrw!(bsrr, GPIO_BSRR);
    regrw!(lckr, GPIO_LCKR);
    regrw_idx!(afr, GPIO_AFR);
}

/// Typed view of the RCC registers this driver touches.
pub struct RccRegs<'a, B: Bus> {
    bus: &'a B,
    base: u32,
}

impl<'a, B: Bus> RccRegs<'a, B> {
    pub const fn new(bus: &'a B) -> Self {
        Self { bus, base: RCC_BASE_ADDR }
    }

    regrw!(ahb1rstr, RCC_AHB1RSTR);
    regrw!(ahb1enr, RCC_AHB1ENR);
}

#[cfg(test)]
mod tests {
    use mry::Any;

    use super::*;
    use crate::BIT;

    #[test]
    fn test_gpio_base_addresses_are_distinct_blocks() {
        for (i, base) in GPIO_BASE_ADDRS.iter().enumerate() {
            assert_eq!(*base, AHB1_BASE_ADDR + GPIO_PORT_STRIDE * i as u32);
        }
        assert_eq!(GPIOD_BASE_ADDR, 0x4002_0C00);
        assert_eq!(RCC_BASE_ADDR, 0x4002_3800);
        // RCC sits past the last port
        assert!(GPIOI_BASE_ADDR + GPIO_BLOCK_SIZE <= RCC_BASE_ADDR);
    }

    #[test]
    fn test_gpio_reset_values() {
        assert_eq!(gpio_reset_value(0, GPIO_MODER), 0xA800_0000);
        assert_eq!(gpio_reset_value(1, GPIO_PUPDR), 0x0000_0100);
        assert_eq!(gpio_reset_value(3, GPIO_MODER), 0);
        assert_eq!(rcc_reset_value(RCC_AHB1ENR), 0x0010_0000);
    }

    #[test]
    #[mry::lock(read_reg32, write_reg32)]
    fn test_gpio_regs_address_each_register() {
        mock_read_reg32(Any).returns(0);
        mock_write_reg32(Any, Any).returns(());

        let bus = unsafe { Mmio::steal() };
        let regs = GpioRegs::new(&bus, GPIOD_BASE_ADDR);

        regs.write_moder(1);
        regs.write_bsrr(2);
        regs.write_afr(3, 1);
        regs.read_idr();

        mock_write_reg32(0x4002_0C00, 1).assert_called(1);
        mock_write_reg32(0x4002_0C18, 2).assert_called(1);
        mock_write_reg32(0x4002_0C24, 3).assert_called(1);
        mock_read_reg32(0x4002_0C10).assert_called(1);
    }

    #[test]
    #[mry::lock(read_reg32, write_reg32)]
    fn test_modify_reads_then_writes_same_address() {
        mock_read_reg32(0x4002_3830).returns(0x0010_0000);
        mock_write_reg32(Any, Any).returns(());

        let bus = unsafe { Mmio::steal() };
        RccRegs::new(&bus).modify_ahb1enr(|v| v | BIT!(3));

        mock_read_reg32(0x4002_3830).assert_called(1);
        mock_write_reg32(0x4002_3830, 0x0010_0008).assert_called(1);
    }

    #[test]
    fn test_mmio_take_once() {
        assert!(Mmio::take().is_some());
        assert!(Mmio::take().is_none());
    }
}

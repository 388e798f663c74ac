//! Raw register access for the RTL83xx memory-mapped blocks.
//!
//! Every driver in this crate talks to hardware through the [`Mmio`] trait,
//! which is a plain 8/32-bit read/write primitive at an offset from a block
//! base. [`MmioBlock`] is the volatile implementation used on the SoC.
//!
//! Memory map (KSEG1, uncached):
//! - 0xB800_1200: SPI flash controller
//! - 0xB800_2000: UART0 (16550, regshift 2)
//! - 0xB800_2100: UART1
//! - 0xB800_3000: interrupt controller (GIMR/GISR/IRR0-3)
//! - 0xBB00_0000: switch core (model id, straps, reset, SMI)

/// SPI flash controller register block
pub const SPI_FLASH_BASE: usize = 0xB800_1200;
/// UART0 register block
pub const UART0_BASE: usize = 0xB800_2000;
/// UART1 register block
pub const UART1_BASE: usize = 0xB800_2100;
/// Interrupt controller register block
pub const ICTL_BASE: usize = 0xB800_3000;
/// Switch core register block
pub const SWITCH_BASE: usize = 0xBB00_0000;

const IO_BLOCK: core::ops::Range<usize> = 0xB800_0000..0xB900_0000;
const SWITCH_BLOCK: core::ops::Range<usize> = 0xBB00_0000..0xBC00_0000;

/// Register-level access to one block of device registers.
///
/// Offsets are in bytes from the start of the block.
pub trait Mmio {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);
    fn read8(&self, offset: usize) -> u8;
    fn write8(&self, offset: usize, value: u8);

    /// Read-modify-write: clears `clear`, then sets `set`.
    #[inline]
    fn mask32(&self, offset: usize, clear: u32, set: u32) {
        let value = self.read32(offset);
        self.write32(offset, (value & !clear) | set);
    }
}

impl<T: Mmio + ?Sized> Mmio for &T {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value)
    }

    #[inline]
    fn read8(&self, offset: usize) -> u8 {
        (**self).read8(offset)
    }

    #[inline]
    fn write8(&self, offset: usize, value: u8) {
        (**self).write8(offset, value)
    }
}

/// A block of memory-mapped registers accessed with volatile loads/stores.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MmioBlock {
    base: usize,
}

impl MmioBlock {
    /// Wrap a register block at `base`.
    ///
    /// # Safety
    /// `base` must be the mapped address of a device register block that
    /// stays valid for as long as the returned value (and its copies) is used.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// Wrap `base` only if it lies inside one of the SoC's internal register
    /// windows (I/O block or switch core). Those windows are permanently
    /// mapped through KSEG1, so no further mapping is required.
    pub fn internal(base: usize) -> Option<Self> {
        if IO_BLOCK.contains(&base) || SWITCH_BLOCK.contains(&base) {
            Some(Self { base })
        } else {
            None
        }
    }

    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }
}

impl Mmio for MmioBlock {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }

    #[inline]
    fn read8(&self, offset: usize) -> u8 {
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u8) }
    }

    #[inline]
    fn write8(&self, offset: usize, value: u8) {
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u8, value) }
    }
}

//! SPI-NOR flash controller for RTL83xx
//!
//! The controller is not a general purpose SPI master. Software drives the
//! chip selects and the transfer length through SFCSR and moves 1 to 4 bytes
//! per SFDR access:
//! - 0x00: SFCR, read/write byte order
//! - 0x04: SFCR2, address mode strap on RTL839x
//! - 0x08: SFCSR, chip selects, transfer length, ready flag
//! - 0x0c: SFDR, data, most significant byte on the wire first
//!
//! With RBO/WBO set, a 4-byte SFDR access carries flash bytes in big-endian
//! order, so a word read maps directly onto `to_be_bytes`.

use embedded_hal::delay::DelayNs;

use crate::regs::Mmio;
use crate::soc::Family;

const SFCR: usize = 0x00;
const SFCSR: usize = 0x08;
const SFDR: usize = 0x0c;

const SFCR_RBO: u32 = 1 << 28;
const SFCR_WBO: u32 = 1 << 27;

const SFCSR_CSB0: u32 = 1 << 31;
const SFCSR_CSB1: u32 = 1 << 30;
const SFCSR_LEN_MASK: u32 = 0x3 << 28;
const SFCSR_RDY: u32 = 1 << 27;
const SFCSR_CS: u32 = 1 << 24;

/// Largest burst moved in one chip-select window.
pub const MAX_TRANSFER: usize = 256;

pub const OP_WRDI: u8 = 0x04;
pub const OP_RDSR: u8 = 0x05;
pub const OP_WREN: u8 = 0x06;
pub const OP_RDID: u8 = 0x9f;
pub const OP_READ_FAST: u8 = 0x0b;
pub const OP_READ_FAST_4B: u8 = 0x0c;
pub const OP_PP: u8 = 0x02;
pub const OP_PP_4B: u8 = 0x12;
pub const OP_BE_4K: u8 = 0x20;
pub const OP_BE_4K_4B: u8 = 0x21;
pub const OP_SE: u8 = 0xd8;
pub const OP_SE_4B: u8 = 0xdc;

/// Write in progress
pub const SR_WIP: u8 = 1 << 0;
/// Write enable latch
pub const SR_WEL: u8 = 1 << 1;

/// SFCSR LEN field for a transfer of `bytes` (1..=4).
#[inline]
const fn sfcsr_len(bytes: usize) -> u32 {
    (((bytes as u32).wrapping_sub(1)) << 28) & SFCSR_LEN_MASK
}

/// SPI flash error
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    InvalidArgument,
    Timeout,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipSelect {
    Cs0,
    Cs1,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Erase {
    /// 4 KiB sector erase
    Sector4K,
    /// 64 KiB block erase
    Block64K,
}

impl Erase {
    pub fn size(self) -> u32 {
        match self {
            Erase::Sector4K => 0x1000,
            Erase::Block64K => 0x1_0000,
        }
    }
}

/// Flash address width, fixed at attach time from the boot straps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressMode {
    ThreeByte,
    FourByte,
}

impl AddressMode {
    pub fn width(self) -> usize {
        match self {
            AddressMode::ThreeByte => 3,
            AddressMode::FourByte => 4,
        }
    }

    /// One past the highest addressable byte.
    pub fn limit(self) -> u64 {
        1u64 << (8 * self.width())
    }
}

#[non_exhaustive]
#[derive(Copy, Clone, Debug)]
pub struct Config {
    pub cs: ChipSelect,
    /// SFCSR reads before giving up on RDY.
    pub ready_spins: u32,
    /// Status register polls before giving up on WIP/WEL.
    pub status_polls: u32,
    pub poll_interval_us: u32,
    pub erase: Erase,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cs: ChipSelect::Cs0,
            ready_spins: 100_000,
            status_polls: 400_000,
            poll_interval_us: 10,
            erase: Erase::Block64K,
        }
    }
}

/// The five primitives a generic SPI-NOR layer needs from a controller.
pub trait NorController {
    type Error;

    /// Send `opcode` and clock `buf.len()` response bytes into `buf`.
    fn read_reg(&mut self, opcode: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Send `opcode` followed by `buf`.
    fn write_reg(&mut self, opcode: u8, buf: &[u8]) -> Result<(), Self::Error>;

    /// Fast-read `buf.len()` bytes starting at `from`. Returns the byte count.
    fn read(&mut self, from: u64, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Page-program `buf` at `to`. Returns the byte count.
    ///
    /// The range must already be erased, and the caller splits writes so
    /// that no 256-byte chunk crosses a flash page boundary.
    fn write(&mut self, to: u64, buf: &[u8]) -> Result<usize, Self::Error>;

    /// Erase the sector or block containing `offset`.
    fn erase(&mut self, offset: u64) -> Result<(), Self::Error>;
}

/// SPI flash controller driver (blocking).
pub struct FlashController<R: Mmio, D: DelayNs> {
    regs: R,
    delay: D,
    config: Config,
    mode: AddressMode,
}

impl<R: Mmio, D: DelayNs> FlashController<R, D> {
    /// Take over the controller: switch both directions to big-endian byte
    /// order and pick the address width from the family's straps.
    pub fn attach(
        regs: R,
        delay: D,
        family: Family,
        switch: &impl Mmio,
        config: Config,
    ) -> Result<Self, Error> {
        let mut this = Self {
            regs,
            delay,
            config,
            mode: AddressMode::ThreeByte,
        };

        let sfcr = this.reg_read(SFCR)?;
        this.reg_write(SFCR, sfcr | SFCR_RBO | SFCR_WBO)?;

        this.mode = family.address_mode(&this.regs, switch);
        log::info!("spiflash: address width is {} bytes", this.mode.width());
        Ok(this)
    }

    pub fn address_mode(&self) -> AddressMode {
        self.mode
    }

    pub fn read_status(&mut self) -> Result<u8, Error> {
        let mut sr = [0u8; 1];
        self.read_reg(OP_RDSR, &mut sr)?;
        Ok(sr[0])
    }

    /// JEDEC manufacturer and device id.
    pub fn read_id(&mut self) -> Result<[u8; 3], Error> {
        let mut id = [0u8; 3];
        self.read_reg(OP_RDID, &mut id)?;
        Ok(id)
    }

    fn wait_ready(&self) -> Result<(), Error> {
        for _ in 0..self.config.ready_spins {
            if self.regs.read32(SFCSR) & SFCSR_RDY != 0 {
                return Ok(());
            }
        }
        Err(Error::Timeout)
    }

    #[inline]
    fn reg_read(&self, reg: usize) -> Result<u32, Error> {
        self.wait_ready()?;
        Ok(self.regs.read32(reg))
    }

    #[inline]
    fn reg_write(&self, reg: usize, value: u32) -> Result<(), Error> {
        self.wait_ready()?;
        self.regs.write32(reg, value);
        Ok(())
    }

    /// Deactivate both chip selects and return the SFCSR base for the
    /// configured chip: its CS asserted, LEN 1. The CS bits are active low.
    fn spi_prep(&self) -> Result<u32, Error> {
        self.deselect()?;
        Ok(match self.config.cs {
            ChipSelect::Cs0 => SFCSR_CSB1 | sfcsr_len(1),
            ChipSelect::Cs1 => SFCSR_CSB0 | SFCSR_CS | sfcsr_len(1),
        })
    }

    fn deselect(&self) -> Result<(), Error> {
        self.reg_write(SFCSR, SFCSR_CSB0 | SFCSR_CSB1)
    }

    /// Run `f` with the chip selected, always deselecting afterwards.
    fn transaction<T>(&self, f: impl FnOnce(&Self, u32) -> Result<T, Error>) -> Result<T, Error> {
        let sel = self.spi_prep()? & !SFCSR_LEN_MASK;
        let result = f(self, sel);
        let end = self.deselect();
        let value = result?;
        end?;
        Ok(value)
    }

    /// One SFDR write of `bytes` bytes taken from the top of `word`.
    fn send(&self, sel: u32, bytes: usize, word: u32) -> Result<(), Error> {
        self.reg_write(SFCSR, sel | sfcsr_len(bytes))?;
        self.reg_write(SFDR, word)
    }

    fn send_address(&self, sel: u32, addr: u32) -> Result<(), Error> {
        match self.mode {
            AddressMode::ThreeByte => self.send(sel, 3, addr << 8),
            AddressMode::FourByte => self.send(sel, 4, addr),
        }
    }

    fn send_bytes(&self, sel: u32, bytes: &[u8]) -> Result<(), Error> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.reg_write(SFCSR, sel | sfcsr_len(1))?;
        for b in bytes {
            self.reg_write(SFDR, (*b as u32) << 24)?;
        }
        Ok(())
    }

    /// Hardware address for a `len`-byte access at `offset`.
    fn hw_address(&self, offset: u64, len: usize) -> Result<u32, Error> {
        let end = offset.checked_add(len as u64).ok_or(Error::InvalidArgument)?;
        if end > self.mode.limit() {
            return Err(Error::InvalidArgument);
        }
        Ok(offset as u32)
    }

    fn wait_status(&mut self, mask: u8, set: bool) -> Result<(), Error> {
        for _ in 0..self.config.status_polls {
            if (self.read_status()? & mask != 0) == set {
                return Ok(());
            }
            self.delay.delay_us(self.config.poll_interval_us);
        }
        log::warn!("spiflash: status {:#04x} stuck", mask);
        Err(Error::Timeout)
    }

    fn write_enable(&mut self) -> Result<(), Error> {
        self.write_reg(OP_WREN, &[])
    }

    fn read_opcode(&self) -> u8 {
        match self.mode {
            AddressMode::ThreeByte => OP_READ_FAST,
            AddressMode::FourByte => OP_READ_FAST_4B,
        }
    }

    fn program_opcode(&self) -> u8 {
        match self.mode {
            AddressMode::ThreeByte => OP_PP,
            AddressMode::FourByte => OP_PP_4B,
        }
    }

    fn erase_opcode(&self) -> u8 {
        match (self.config.erase, self.mode) {
            (Erase::Sector4K, AddressMode::ThreeByte) => OP_BE_4K,
            (Erase::Sector4K, AddressMode::FourByte) => OP_BE_4K_4B,
            (Erase::Block64K, AddressMode::ThreeByte) => OP_SE,
            (Erase::Block64K, AddressMode::FourByte) => OP_SE_4B,
        }
    }
}

impl<R: Mmio, D: DelayNs> NorController for FlashController<R, D> {
    type Error = Error;

    fn read_reg(&mut self, opcode: u8, buf: &mut [u8]) -> Result<(), Error> {
        if buf.len() > 4 {
            return Err(Error::InvalidArgument);
        }
        self.transaction(|this, sel| {
            this.send(sel, 1, (opcode as u32) << 24)?;
            for b in buf.iter_mut() {
                *b = (this.reg_read(SFDR)? >> 24) as u8;
            }
            Ok(())
        })
    }

    fn write_reg(&mut self, opcode: u8, buf: &[u8]) -> Result<(), Error> {
        let word = match *buf {
            [] => (opcode as u32) << 24,
            [b0] => (opcode as u32) << 24 | (b0 as u32) << 16,
            [b0, b1] => (opcode as u32) << 24 | (b0 as u32) << 16 | (b1 as u32) << 8,
            _ => return Err(Error::InvalidArgument),
        };
        self.transaction(|this, sel| this.send(sel, 1 + buf.len(), word))
    }

    fn read(&mut self, from: u64, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut addr = self.hw_address(from, buf.len())?;

        self.wait_status(SR_WIP, false)?;
        self.write_enable()?;
        self.wait_status(SR_WEL, true)?;

        let opcode = self.read_opcode();
        let mut done = 0;
        for chunk in buf.chunks_mut(MAX_TRANSFER) {
            self.transaction(|this, sel| {
                this.send(sel, 1, (opcode as u32) << 24)?;
                this.send_address(sel, addr)?;
                // One dummy byte for fast read.
                this.send(sel, 1, 0)?;

                let mut words = chunk.chunks_exact_mut(4);
                if words.len() > 0 {
                    this.reg_write(SFCSR, sel | sfcsr_len(4))?;
                    for word in &mut words {
                        word.copy_from_slice(&this.reg_read(SFDR)?.to_be_bytes());
                    }
                }
                let tail = words.into_remainder();
                if !tail.is_empty() {
                    this.reg_write(SFCSR, sel | sfcsr_len(1))?;
                    for b in tail {
                        *b = (this.reg_read(SFDR)? >> 24) as u8;
                    }
                }
                Ok(())
            })?;
            addr = addr.wrapping_add(chunk.len() as u32);
            done += chunk.len();
        }
        Ok(done)
    }

    fn write(&mut self, to: u64, buf: &[u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut addr = self.hw_address(to, buf.len())?;

        let opcode = self.program_opcode();
        let mut done = 0;
        for chunk in buf.chunks(MAX_TRANSFER) {
            self.wait_status(SR_WIP, false)?;
            self.write_enable()?;

            self.transaction(|this, sel| {
                this.send(sel, 1, (opcode as u32) << 24)?;
                this.send_address(sel, addr)?;

                // Bytes up to the next word-aligned flash address.
                let lead = ((4 - (addr % 4) as usize) % 4).min(chunk.len());
                let (head, rest) = chunk.split_at(lead);
                this.send_bytes(sel, head)?;

                let words = rest.chunks_exact(4);
                let tail = words.remainder();
                if words.len() > 0 {
                    this.reg_write(SFCSR, sel | sfcsr_len(4))?;
                    for w in words {
                        this.reg_write(SFDR, u32::from_be_bytes([w[0], w[1], w[2], w[3]]))?;
                    }
                }
                this.send_bytes(sel, tail)
            })?;
            addr = addr.wrapping_add(chunk.len() as u32);
            done += chunk.len();
        }
        Ok(done)
    }

    fn erase(&mut self, offset: u64) -> Result<(), Error> {
        let addr = self.hw_address(offset, 1)?;
        let opcode = self.erase_opcode();
        log::debug!("spiflash: erase {:#x} bytes at {:#x}", self.config.erase.size(), addr);

        self.wait_status(SR_WIP, false)?;
        self.write_enable()?;
        self.transaction(|this, sel| {
            this.send(sel, 1, (opcode as u32) << 24)?;
            this.send_address(sel, addr)
        })
    }
}

impl<R: Mmio, D: DelayNs> Drop for FlashController<R, D> {
    fn drop(&mut self) {
        let _ = self.deselect();
    }
}

//! PHY register access through the switch core's SMI (MDIO) master.
//!
//! Each family has its own register layout. [`Smi`] picks the right one from
//! the detected [`SocInfo`](crate::soc::SocInfo).

use embedded_hal::delay::DelayNs;

use crate::regs::Mmio;
use crate::soc::{Family, SocInfo};

mod rtl838x;
mod rtl839x;

pub use rtl838x::Rtl838xSmi;
pub use rtl839x::Rtl839xSmi;

/// Busy polls before an SMI operation is abandoned.
const SMI_POLLS: u32 = 10_000;
const SMI_POLL_US: u32 = 10;

/// Highest PHY register number on the MDIO bus.
const MAX_REG: u8 = 31;
/// Highest regular page number.
const MAX_PAGE: u16 = 4095;

/// SMI error
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Port, page or register out of range
    InvalidArgument,
    /// The SMI master stayed busy
    Timeout,
    /// The PHY did not accept the write
    Io,
    /// No SMI support for this SoC
    Unsupported,
}

pub trait PhyAccess {
    fn read_phy(&mut self, port: u8, page: u16, reg: u8) -> Result<u16, Error>;

    fn write_phy(&mut self, port: u8, page: u16, reg: u8, value: u16) -> Result<(), Error>;

    /// Clause 22 read on page 0.
    fn mdio_read(&mut self, port: u8, reg: u8) -> Result<u16, Error> {
        self.read_phy(port, 0, reg)
    }

    /// Clause 22 write on page 0.
    fn mdio_write(&mut self, port: u8, reg: u8, value: u16) -> Result<(), Error> {
        self.write_phy(port, 0, reg, value)
    }

    /// Stop the MAC from polling the PHYs and hand the bus to software.
    fn reset(&mut self);
}

/// Poll `busy` until it returns false, `SMI_POLLS` times at most.
fn wait_idle(delay: &mut impl DelayNs, mut busy: impl FnMut() -> bool) -> Result<(), Error> {
    for _ in 0..SMI_POLLS {
        delay.delay_us(SMI_POLL_US);
        if !busy() {
            return Ok(());
        }
    }
    log::warn!("smi: operation timed out");
    Err(Error::Timeout)
}

/// SMI master of whichever family is running.
pub enum Smi<R: Mmio, D: DelayNs> {
    Rtl838x(Rtl838xSmi<R, D>),
    Rtl839x(Rtl839xSmi<R, D>),
}

impl<R: Mmio, D: DelayNs> Smi<R, D> {
    /// `regs` is the switch core block.
    pub fn new(info: &SocInfo, regs: R, delay: D) -> Result<Self, Error> {
        match info.family {
            Some(Family::Rtl838x) => Ok(Smi::Rtl838x(Rtl838xSmi::new(regs, delay, info.id))),
            Some(Family::Rtl839x) => Ok(Smi::Rtl839x(Rtl839xSmi::new(regs, delay))),
            Some(Family::Rtl8328) | None => Err(Error::Unsupported),
        }
    }
}

impl<R: Mmio, D: DelayNs> PhyAccess for Smi<R, D> {
    fn read_phy(&mut self, port: u8, page: u16, reg: u8) -> Result<u16, Error> {
        match self {
            Smi::Rtl838x(smi) => smi.read_phy(port, page, reg),
            Smi::Rtl839x(smi) => smi.read_phy(port, page, reg),
        }
    }

    fn write_phy(&mut self, port: u8, page: u16, reg: u8, value: u16) -> Result<(), Error> {
        match self {
            Smi::Rtl838x(smi) => smi.write_phy(port, page, reg, value),
            Smi::Rtl839x(smi) => smi.write_phy(port, page, reg, value),
        }
    }

    fn mdio_read(&mut self, port: u8, reg: u8) -> Result<u16, Error> {
        match self {
            Smi::Rtl838x(smi) => smi.mdio_read(port, reg),
            Smi::Rtl839x(smi) => smi.mdio_read(port, reg),
        }
    }

    fn mdio_write(&mut self, port: u8, reg: u8, value: u16) -> Result<(), Error> {
        match self {
            Smi::Rtl838x(smi) => smi.mdio_write(port, reg, value),
            Smi::Rtl839x(smi) => smi.mdio_write(port, reg, value),
        }
    }

    fn reset(&mut self) {
        match self {
            Smi::Rtl838x(smi) => smi.reset(),
            Smi::Rtl839x(smi) => smi.reset(),
        }
    }
}

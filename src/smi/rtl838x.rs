use embedded_hal::delay::DelayNs;

use super::{wait_idle, Error, PhyAccess, MAX_PAGE, MAX_REG};
use crate::regs::Mmio;

const SMI_GLB_CTRL: usize = 0xA100;
const SMI_POLL_CTRL: usize = 0xA17C;
const SMI_ACCESS_PHY_CTRL_0: usize = 0xA1B8;
const SMI_ACCESS_PHY_CTRL_1: usize = 0xA1BC;
const SMI_ACCESS_PHY_CTRL_2: usize = 0xA1C0;
/// Fibre registers of the SerDes behind ports 24/25 (27/26 at +0x100).
const SDS4_FIB_REG0: usize = 0xF800;

const CTRL_1_CMD: u32 = 1 << 0;
const CTRL_1_WRITE: u32 = 1 << 2;
/// Bits of CTRL_1 preserved across commands (park page, fail flag).
const CTRL_1_PARK: u32 = (0x1f << 15) | 0x2;
const GLB_CTRL_SOC_PHY: u32 = 1 << 15;

const MAX_PORT: u8 = 31;

pub struct Rtl838xSmi<R: Mmio, D: DelayNs> {
    regs: R,
    delay: D,
    soc_id: u32,
}

impl<R: Mmio, D: DelayNs> Rtl838xSmi<R, D> {
    pub fn new(regs: R, delay: D, soc_id: u32) -> Self {
        Self { regs, delay, soc_id }
    }

    fn wait_op(&mut self) -> Result<(), Error> {
        let regs = &self.regs;
        wait_idle(&mut self.delay, || regs.read32(SMI_ACCESS_PHY_CTRL_1) & CTRL_1_CMD != 0)
    }

    /// RTL8380 wires its SerDes ports straight into the switch register space.
    fn serdes_reg(&self, port: u8, reg: u8) -> Option<usize> {
        if self.soc_id != 0x8380 || !(24..=27).contains(&port) {
            return None;
        }
        let bank = if port == 26 { 0x100 } else { 0 };
        Some(SDS4_FIB_REG0 + bank + ((reg as usize) << 2))
    }

    fn command(&mut self, page: u16, reg: u8, write: bool) -> Result<(), Error> {
        let park = self.regs.read32(SMI_ACCESS_PHY_CTRL_1) & CTRL_1_PARK;
        let mut v = (reg as u32) << 20 | (page as u32) << 3;
        if write {
            v |= CTRL_1_WRITE;
        }
        self.regs.write32(SMI_ACCESS_PHY_CTRL_1, v | park);
        self.regs.mask32(SMI_ACCESS_PHY_CTRL_1, 0, CTRL_1_CMD);
        self.wait_op()
    }
}

fn check(port: u8, page: u16, reg: u8) -> Result<(), Error> {
    if port > MAX_PORT || page > MAX_PAGE || reg > MAX_REG {
        Err(Error::InvalidArgument)
    } else {
        Ok(())
    }
}

impl<R: Mmio, D: DelayNs> PhyAccess for Rtl838xSmi<R, D> {
    fn read_phy(&mut self, port: u8, page: u16, reg: u8) -> Result<u16, Error> {
        check(port, page, reg)?;
        self.wait_op()?;

        self.regs.mask32(SMI_ACCESS_PHY_CTRL_2, 0xffff_0000, (port as u32) << 16);
        self.command(page, reg, false)?;

        Ok(self.regs.read32(SMI_ACCESS_PHY_CTRL_2) as u16)
    }

    fn write_phy(&mut self, port: u8, page: u16, reg: u8, value: u16) -> Result<(), Error> {
        check(port, page, reg)?;
        self.wait_op()?;

        self.regs.write32(SMI_ACCESS_PHY_CTRL_0, 1 << port);
        self.delay.delay_ms(10);

        self.regs.mask32(SMI_ACCESS_PHY_CTRL_2, 0xffff_0000, (value as u32) << 16);
        self.command(page, reg, true)
    }

    fn mdio_read(&mut self, port: u8, reg: u8) -> Result<u16, Error> {
        if let Some(offset) = self.serdes_reg(port, reg) {
            return Ok(self.regs.read32(offset) as u16);
        }
        let value = self.read_phy(port, 0, reg)?;
        log::debug!("smi: read port {} reg {}: {:#06x}", port, reg, value);
        Ok(value)
    }

    fn mdio_write(&mut self, port: u8, reg: u8, value: u16) -> Result<(), Error> {
        if let Some(offset) = self.serdes_reg(port, reg) {
            self.regs.write32(offset, value as u32);
            return Ok(());
        }
        self.write_phy(port, 0, reg, value)
    }

    fn reset(&mut self) {
        log::debug!("smi: taking over PHY bus");
        self.regs.write32(SMI_POLL_CTRL, 0);
        self.regs.mask32(SMI_GLB_CTRL, 0, GLB_CTRL_SOC_PHY);
    }
}

use embedded_hal::delay::DelayNs;

use super::{wait_idle, Error, PhyAccess, MAX_PAGE, MAX_REG};
use crate::regs::Mmio;

const PHYREG_ACCESS_CTRL: usize = 0x03DC;
const PHYREG_CTRL: usize = 0x03E0;
const PHYREG_PORT_CTRL: usize = 0x03E4;
const PHYREG_DATA_CTRL: usize = 0x03F0;
const SMI_GLB_CTRL: usize = 0x03F8;
const SMI_PORT_POLLING_CTRL: usize = 0x03FC;

const ACCESS_CMD: u32 = 1 << 0;
const ACCESS_FAIL: u32 = 1 << 1;
const ACCESS_WRITE: u32 = 1 << 3;
const GLB_CTRL_POLL_EN: u32 = 1 << 7;

/// Page that addresses the PHY's raw register space.
const RAW_PAGE: u16 = 0x1fff;
const MAX_PORT: u8 = 63;

pub struct Rtl839xSmi<R: Mmio, D: DelayNs> {
    regs: R,
    delay: D,
}

/// PORT_CTRL register holding `port`'s bit (two registers, 32 ports each).
fn port_ctrl(port: u8) -> usize {
    PHYREG_PORT_CTRL + (((port >> 5) as usize) << 2)
}

fn check(port: u8, page: u16, reg: u8) -> Result<(), Error> {
    if port > MAX_PORT || (page > MAX_PAGE && page != RAW_PAGE) || reg > MAX_REG {
        Err(Error::InvalidArgument)
    } else {
        Ok(())
    }
}

fn access_word(page: u16, reg: u8) -> u32 {
    let raw = if page == RAW_PAGE { 0x1f } else { 0 };
    (reg as u32) << 5 | (page as u32) << 10 | raw << 23
}

impl<R: Mmio, D: DelayNs> Rtl839xSmi<R, D> {
    pub fn new(regs: R, delay: D) -> Self {
        Self { regs, delay }
    }

    fn execute(&mut self, v: u32) -> Result<(), Error> {
        self.regs.write32(PHYREG_ACCESS_CTRL, v);
        self.regs.write32(PHYREG_CTRL, 0x1ff);
        self.regs.write32(PHYREG_ACCESS_CTRL, v | ACCESS_CMD);

        let regs = &self.regs;
        wait_idle(&mut self.delay, || regs.read32(PHYREG_ACCESS_CTRL) & ACCESS_CMD != 0)
    }
}

impl<R: Mmio, D: DelayNs> PhyAccess for Rtl839xSmi<R, D> {
    fn read_phy(&mut self, port: u8, page: u16, reg: u8) -> Result<u16, Error> {
        check(port, page, reg)?;

        self.regs.mask32(PHYREG_DATA_CTRL, 0xffff_0000, (port as u32) << 16);
        self.execute(access_word(page, reg))?;

        Ok(self.regs.read32(PHYREG_DATA_CTRL) as u16)
    }

    fn write_phy(&mut self, port: u8, page: u16, reg: u8, value: u16) -> Result<(), Error> {
        check(port, page, reg)?;

        self.regs.write32(PHYREG_PORT_CTRL, 0);
        self.regs.write32(PHYREG_PORT_CTRL + 4, 0);
        self.regs.mask32(port_ctrl(port), 0, 1 << (port % 32));

        self.regs.mask32(PHYREG_DATA_CTRL, 0xffff_0000, (value as u32) << 16);
        self.execute(access_word(page, reg) | ACCESS_WRITE)?;

        if self.regs.read32(PHYREG_ACCESS_CTRL) & ACCESS_FAIL != 0 {
            log::warn!("smi: write to port {} reg {} failed", port, reg);
            return Err(Error::Io);
        }
        Ok(())
    }

    fn reset(&mut self) {
        log::debug!("smi: taking over PHY bus");
        self.regs.write32(SMI_PORT_POLLING_CTRL, 0);
        self.regs.write32(SMI_PORT_POLLING_CTRL + 4, 0);
        self.regs.mask32(SMI_GLB_CTRL, GLB_CTRL_POLL_EN, 0);
    }
}

use crate::regs::Mmio;
use crate::spiflash::AddressMode;

const MAC_IF_CTRL: usize = 0x0004;
const RST_GLB_CTRL: usize = 0x0014;

const MAC_IF_CTRL_UART: u32 = 1 << 0;
const MAC_IF_CTRL_JTAG: u32 = 1 << 1;

/// SFCR2 in the flash controller block.
const SFCR2: usize = 0x04;
const SFCR2_ADDRMODE: u32 = 1 << 9;

/// RTL839x (and RTL8328) latch the strap into SFCR2 at reset.
pub(super) fn address_mode(spi: &impl Mmio) -> AddressMode {
    if spi.read32(SFCR2) & SFCR2_ADDRMODE != 0 {
        AddressMode::FourByte
    } else {
        AddressMode::ThreeByte
    }
}

pub(super) fn restart(switch: &impl Mmio) {
    switch.write32(RST_GLB_CTRL, 0xFFFF_FFFF);
}

pub(super) fn enable_uart1(switch: &impl Mmio) {
    switch.mask32(MAC_IF_CTRL, MAC_IF_CTRL_JTAG, MAC_IF_CTRL_UART);
}

use crate::regs::Mmio;
use crate::spiflash::AddressMode;

const RST_GLB_CTRL_1: usize = 0x0040;
const INT_RW_CTRL: usize = 0x0058;
const EXT_VERSION: usize = 0x00D0;
const PLL_CML_CTRL: usize = 0x0FF8;
const GMII_INTF_SEL: usize = 0x1000;
const STRAP_DBG: usize = 0x100C;

const STRAP_FLASH_4B: u32 = 1 << 29;
const PLL_STRAP_OVERRIDE: u32 = 1 << 30;
const PLL_STRAP_4B: u32 = 1 << 31;
const UART1_SEL: u32 = 1 << 4;

/// Flash address width from the boot straps.
///
/// The strap registers are behind the internal read/write gate, which is
/// opened for the duration of the probe.
pub(super) fn address_mode(switch: &impl Mmio) -> AddressMode {
    switch.write32(INT_RW_CTRL, 0x3);

    let strap = switch.read32(STRAP_DBG) & STRAP_FLASH_4B != 0;
    let four_byte = if switch.read32(EXT_VERSION) == 0 {
        strap
    } else {
        let pll = switch.read32(PLL_CML_CTRL);
        if pll & PLL_STRAP_OVERRIDE != 0 {
            pll & PLL_STRAP_4B != 0
        } else {
            strap
        }
    };

    switch.write32(INT_RW_CTRL, 0x0);

    if four_byte {
        AddressMode::FourByte
    } else {
        AddressMode::ThreeByte
    }
}

pub(super) fn restart(switch: &impl Mmio) {
    switch.write32(RST_GLB_CTRL_1, 1);
}

pub(super) fn enable_uart1(switch: &impl Mmio) {
    switch.write32(GMII_INTF_SEL, UART1_SEL);
}

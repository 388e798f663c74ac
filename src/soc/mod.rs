//! SoC identification and per-family hooks.
//!
//! The model id sits in the top half of MODEL_NAME_INFO. RTL838x parts
//! expose it at switch offset 0xD4, RTL839x parts at 0xFF0.

use crate::interrupt::RoutingTable;
use crate::regs::Mmio;
use crate::spiflash::AddressMode;

mod rtl838x;
mod rtl839x;

const RTL838X_MODEL_NAME_INFO: usize = 0x00D4;
const RTL839X_MODEL_NAME_INFO: usize = 0x0FF0;

/// SoC generation. All family-dependent behaviour branches on this.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Family {
    Rtl8328,
    Rtl838x,
    Rtl839x,
}

impl Family {
    pub fn irq_routing(self) -> RoutingTable {
        RoutingTable::rtl83xx()
    }

    /// Decide the flash address width from the boot straps.
    pub fn address_mode(self, spi: &impl Mmio, switch: &impl Mmio) -> AddressMode {
        match self {
            Family::Rtl838x => rtl838x::address_mode(switch),
            Family::Rtl839x | Family::Rtl8328 => rtl839x::address_mode(spi),
        }
    }

    /// Trigger a global chip reset. RTL8328 has no reset hook and returns.
    pub fn restart(self, switch: &impl Mmio) {
        match self {
            Family::Rtl838x => rtl838x::restart(switch),
            Family::Rtl839x => rtl839x::restart(switch),
            Family::Rtl8328 => log::warn!("soc: no restart hook for RTL8328"),
        }
    }

    /// Route UART1 to its pins.
    pub fn enable_uart1(self, switch: &impl Mmio) {
        match self {
            Family::Rtl838x => rtl838x::enable_uart1(switch),
            Family::Rtl839x => rtl839x::enable_uart1(switch),
            Family::Rtl8328 => {}
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocInfo {
    pub name: &'static str,
    pub id: u32,
    pub family: Option<Family>,
}

impl SocInfo {
    pub fn detect(switch: &impl Mmio) -> Self {
        let mut id = switch.read32(RTL838X_MODEL_NAME_INFO) >> 16;
        if !matches!(id, 0x8330 | 0x8332 | 0x8380 | 0x8382) {
            id = switch.read32(RTL839X_MODEL_NAME_INFO) >> 16;
        }
        Self::from_id(id)
    }

    pub fn from_id(id: u32) -> Self {
        let (name, family) = match id {
            0x8328 => ("RTL8328", Some(Family::Rtl8328)),
            0x8330 => ("RTL8330", Some(Family::Rtl838x)),
            0x8332 => ("RTL8332", Some(Family::Rtl838x)),
            0x8380 => ("RTL8380", Some(Family::Rtl838x)),
            0x8382 => ("RTL8382", Some(Family::Rtl838x)),
            0x8390 => ("RTL8390", Some(Family::Rtl839x)),
            0x8391 => ("RTL8391", Some(Family::Rtl839x)),
            0x8392 => ("RTL8392", Some(Family::Rtl839x)),
            0x8393 => ("RTL8393", Some(Family::Rtl839x)),
            _ => ("unknown", None),
        };
        Self { name, id, family }
    }
}

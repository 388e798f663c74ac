#![cfg_attr(not(test), no_std)]

//! Hardware support for the Realtek RTL838x/RTL839x MIPS switch SoCs.
//!
//! [`init`] identifies the SoC, routes the internal interrupt sources onto
//! the CPU lines and attaches the SPI-NOR controller. Everything it builds
//! is owned by the returned [`Platform`].
//!
//! The application provides the `critical-section` implementation.

use embedded_hal::delay::DelayNs;

pub mod time;

pub mod regs;

pub mod debug;

pub mod soc;

pub mod interrupt;

pub mod intc;

pub mod spiflash;

pub mod smi;

#[cfg(test)]
mod testutil;

use crate::intc::InterruptController;
use crate::regs::Mmio;
use crate::soc::{Family, SocInfo};
use crate::spiflash::FlashController;
use crate::time::Hertz;

const DEFAULT_CPU_FREQUENCY: Hertz = Hertz::mhz(500);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// MODEL_NAME_INFO held a model this crate does not know.
    UnknownSoc(u32),
    Flash(spiflash::Error),
}

impl From<spiflash::Error> for Error {
    fn from(e: spiflash::Error) -> Self {
        Error::Flash(e)
    }
}

#[non_exhaustive]
pub struct Config {
    /// Core clock. Not discoverable at runtime; the board must know it.
    pub cpu_frequency: Hertz,
    pub flash: spiflash::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cpu_frequency: DEFAULT_CPU_FREQUENCY,
            flash: spiflash::Config::default(),
        }
    }
}

/// Initialized SoC: identification plus the interrupt and flash engines.
pub struct Platform<R: Mmio, D: DelayNs> {
    pub info: SocInfo,
    pub family: Family,
    pub intc: InterruptController<R>,
    pub flash: FlashController<R, D>,
    switch: R,
    cpu_frequency: Hertz,
}

impl<R: Mmio, D: DelayNs> Platform<R, D> {
    pub fn cpu_frequency(&self) -> Hertz {
        self.cpu_frequency
    }

    /// Rate of the MIPS count/compare timer (IP7).
    pub fn timer_frequency(&self) -> Hertz {
        self.cpu_frequency / 2
    }

    pub fn restart(&self) {
        log::info!("{}: restarting", self.info.name);
        self.family.restart(&self.switch);
    }

    pub fn enable_uart1(&self) {
        self.family.enable_uart1(&self.switch);
    }

    /// PHY access through the switch core's SMI master.
    pub fn smi<D2: DelayNs>(&self, delay: D2) -> Result<smi::Smi<&R, D2>, smi::Error> {
        smi::Smi::new(&self.info, &self.switch, delay)
    }
}

/// Initialize the HAL with the provided configuration.
///
/// `switch`, `ictl` and `spi` are the switch core, interrupt controller and
/// flash controller register blocks. Interrupts stay masked at the CPU; only
/// the ICTL bootstrap sources are enabled on return.
pub fn init<R: Mmio, D: DelayNs>(
    config: Config,
    switch: R,
    ictl: R,
    spi: R,
    delay: D,
) -> Result<Platform<R, D>, Error> {
    let info = SocInfo::detect(&switch);
    let Some(family) = info.family else {
        log::warn!("unknown SoC model {:#06x}", info.id);
        return Err(Error::UnknownSoc(info.id));
    };
    log::info!("SoC Type: {}", info.name);

    let intc = InterruptController::new(ictl, family.irq_routing());
    intc.init();

    let flash = FlashController::attach(spi, delay, family, &switch, config.flash)?;

    Ok(Platform {
        info,
        family,
        intc,
        flash,
        switch,
        cpu_frequency: config.cpu_frequency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intc::{Dispatch, BOOTSTRAP_MASK};
    use crate::interrupt::{CpuLine, Interrupt};
    use crate::spiflash::{AddressMode, NorController};
    use crate::testutil::{FakeRegs, NoopDelay, SimFlash};

    fn uart0_irq(_irq: u8) {}

    #[test]
    fn init_rtl839x() {
        let switch = FakeRegs::new();
        switch.set(0x0FF0, 0x8392_0000);
        let ictl = FakeRegs::new();
        let spi = SimFlash::new(true);
        spi.set_sfcr2(1 << 9);

        let mut p = init(
            Config::default(),
            &switch as &dyn Mmio,
            &ictl as &dyn Mmio,
            &spi as &dyn Mmio,
            NoopDelay,
        )
        .unwrap();

        assert_eq!(p.info.name, "RTL8392");
        assert_eq!(p.family, Family::Rtl839x);
        assert_eq!(ictl.get(0x00), BOOTSTRAP_MASK);
        assert_eq!(ictl.get(0x08), 0x2151_1114);
        assert_eq!(p.flash.address_mode(), AddressMode::FourByte);
        assert_eq!(p.timer_frequency(), Hertz::mhz(250));

        spi.load(0x40, b"boot");
        let mut buf = [0u8; 4];
        assert_eq!(p.flash.read(0x40, &mut buf), Ok(4));
        assert_eq!(&buf, b"boot");

        p.intc.set_irq_handler(Interrupt::UART0.number(), uart0_irq).unwrap();
        ictl.set(0x04, Interrupt::UART0.mask());
        assert_eq!(p.intc.handle_cpu_interrupt(CpuLine::Ip3.cause_bit()), Dispatch::Handled(31));
    }

    #[test]
    fn init_rtl838x_reads_straps() {
        let switch = FakeRegs::new();
        switch.set(0x00D4, 0x8380_0000);
        switch.set(0x100C, 1 << 29);
        let ictl = FakeRegs::new();
        let spi = SimFlash::new(true);

        let p = init(
            Config::default(),
            &switch as &dyn Mmio,
            &ictl as &dyn Mmio,
            &spi as &dyn Mmio,
            NoopDelay,
        )
        .unwrap();
        assert_eq!(p.flash.address_mode(), AddressMode::FourByte);
        assert!(p.smi(NoopDelay).is_ok());

        p.enable_uart1();
        p.restart();
        assert_eq!(switch.get(0x1000), 1 << 4);
        assert_eq!(switch.get(0x0040), 1);
    }

    #[test]
    fn unknown_soc_is_rejected() {
        let switch = FakeRegs::new();
        let ictl = FakeRegs::new();
        let spi = SimFlash::new(false);
        let result = init(
            Config::default(),
            &switch as &dyn Mmio,
            &ictl as &dyn Mmio,
            &spi as &dyn Mmio,
            NoopDelay,
        );
        assert!(matches!(result, Err(Error::UnknownSoc(0))));
        assert!(ictl.writes().is_empty());
    }

    #[test]
    fn wedged_flash_fails_init() {
        let switch = FakeRegs::new();
        switch.set(0x0FF0, 0x8390_0000);
        let ictl = FakeRegs::new();
        let spi = SimFlash::new(false);
        spi.wedge();
        let result = init(
            Config::default(),
            &switch as &dyn Mmio,
            &ictl as &dyn Mmio,
            &spi as &dyn Mmio,
            NoopDelay,
        );
        assert!(matches!(result, Err(Error::Flash(spiflash::Error::Timeout))));
    }
}

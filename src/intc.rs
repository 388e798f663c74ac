//! Interrupt controller (ICTL) driver for RTL83xx
//!
//! Register block at 0xB800_3000:
//! - 0x00: GIMR, global interrupt mask (1 = enabled)
//! - 0x04: GISR, global interrupt status (1 = pending)
//! - 0x08..0x14: IRR0..IRR3, source to cascade routing
//!
//! The controller has no acknowledge register. Masking a source is how it is
//! acknowledged; sources are level triggered and re-fire until serviced.

use core::cell::Cell;

use embassy_sync::blocking_mutex::CriticalSectionMutex;
use portable_atomic::{AtomicU32, Ordering};

use crate::interrupt::{CpuLine, Interrupt, RoutingTable, IRQ_COUNT, IRR_COUNT};
use crate::regs::Mmio;

const GIMR: usize = 0x00;
const GISR: usize = 0x04;
const IRR0: usize = 0x08;

/// Sources enabled by `init`, before any driver registers a handler.
pub const BOOTSTRAP_MASK: u32 = (1 << Interrupt::TC0 as u32) | (1 << Interrupt::UART0 as u32);

/// IRQ handler function type, called with the source number.
pub type IrqHandler = fn(u8);

/// INTC Error
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    InvalidIrq(u8),
}

/// Result of routing one interrupt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dispatch {
    /// Source selected and its handler ran.
    Handled(u8),
    /// Source selected but nobody registered a handler.
    Unhandled(u8),
    /// Nothing both pending and enabled.
    Spurious,
    /// IP7, the CPU count/compare timer. Serviced by the caller.
    CpuTimer,
}

pub struct InterruptController<R: Mmio> {
    regs: R,
    routing: RoutingTable,
    handlers: CriticalSectionMutex<Cell<[Option<IrqHandler>; IRQ_COUNT]>>,
    spurious: AtomicU32,
}

#[inline]
fn check(irq: u8) -> Result<u32, Error> {
    if (irq as usize) < IRQ_COUNT {
        Ok(1 << irq)
    } else {
        Err(Error::InvalidIrq(irq))
    }
}

impl<R: Mmio> InterruptController<R> {
    pub fn new(regs: R, routing: RoutingTable) -> Self {
        Self {
            regs,
            routing,
            handlers: CriticalSectionMutex::new(Cell::new([None; IRQ_COUNT])),
            spurious: AtomicU32::new(0),
        }
    }

    /// Program the routing registers and enable the bootstrap sources.
    ///
    /// Everything is masked while IRR0..IRR3 are rewritten.
    pub fn init(&self) {
        critical_section::with(|_| {
            self.regs.write32(GIMR, 0);
            for (i, value) in self.routing.pack().iter().enumerate() {
                self.regs.write32(IRR0 + i * 4, *value);
            }
            self.regs.write32(GIMR, BOOTSTRAP_MASK);
        });
        log::debug!("intc: routing {:08x?}, mask {:08x}", self.routing.pack(), BOOTSTRAP_MASK);
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Enable an IRQ source in GIMR.
    pub fn enable_irq(&self, irq: u8) -> Result<(), Error> {
        let bit = check(irq)?;
        critical_section::with(|_| self.regs.mask32(GIMR, 0, bit));
        Ok(())
    }

    /// Disable an IRQ source in GIMR.
    pub fn disable_irq(&self, irq: u8) -> Result<(), Error> {
        let bit = check(irq)?;
        critical_section::with(|_| self.regs.mask32(GIMR, bit, 0));
        Ok(())
    }

    pub fn ack_irq(&self, irq: u8) -> Result<(), Error> {
        self.disable_irq(irq)
    }

    pub fn mask_irq(&self, irq: u8) -> Result<(), Error> {
        self.disable_irq(irq)
    }

    pub fn unmask_irq(&self, irq: u8) -> Result<(), Error> {
        self.enable_irq(irq)
    }

    pub fn eoi_irq(&self, irq: u8) -> Result<(), Error> {
        self.enable_irq(irq)
    }

    pub fn is_irq_enabled(&self, irq: u8) -> Result<bool, Error> {
        let bit = check(irq)?;
        Ok(self.regs.read32(GIMR) & bit != 0)
    }

    /// Sources both pending and enabled.
    #[inline]
    pub fn pending(&self) -> u32 {
        self.regs.read32(GIMR) & self.regs.read32(GISR)
    }

    /// Register an IRQ handler for the given IRQ number.
    pub fn set_irq_handler(&self, irq: u8, handler: IrqHandler) -> Result<(), Error> {
        check(irq)?;
        self.handlers.lock(|table| {
            let mut t = table.get();
            t[irq as usize] = Some(handler);
            table.set(t);
        });
        Ok(())
    }

    pub fn clear_irq_handler(&self, irq: u8) -> Result<(), Error> {
        check(irq)?;
        self.handlers.lock(|table| {
            let mut t = table.get();
            t[irq as usize] = None;
            table.set(t);
        });
        Ok(())
    }

    /// Number of spurious interrupts seen since creation.
    pub fn spurious_count(&self) -> u32 {
        self.spurious.load(Ordering::Relaxed)
    }

    /// Route an interrupt that arrived on `line` to its source.
    ///
    /// The lowest numbered source that is both pending and enabled wins.
    /// Routing is not consulted, so only routed sources may be enabled: an
    /// enabled source that is unrouted or on another line would shadow the
    /// sources of `line`.
    pub fn dispatch(&self, line: CpuLine) -> Dispatch {
        let pending = self.pending();
        if pending == 0 {
            self.spurious.fetch_add(1, Ordering::Relaxed);
            log::warn!("intc: spurious interrupt on IP{}", line as u8);
            return Dispatch::Spurious;
        }
        self.invoke(pending.trailing_zeros() as u8)
    }

    /// Top-level entry for the MIPS exception vector.
    ///
    /// `pending_ip` is Cause & Status & IM. Lines are serviced from IP7
    /// down to IP2, one per call.
    pub fn handle_cpu_interrupt(&self, pending_ip: u32) -> Dispatch {
        let Some(line) = CpuLine::highest_pending(pending_ip) else {
            self.spurious.fetch_add(1, Ordering::Relaxed);
            log::warn!("intc: spurious CPU interrupt, cause {:#x}", pending_ip);
            return Dispatch::Spurious;
        };
        if line == CpuLine::Ip7 {
            return Dispatch::CpuTimer;
        }

        let sources = self.routing.sources_on(line);
        match sources.count_ones() {
            0 => {
                self.spurious.fetch_add(1, Ordering::Relaxed);
                log::warn!("intc: IP{} has no routed source", line as u8);
                Dispatch::Spurious
            }
            1 => self.invoke(sources.trailing_zeros() as u8),
            _ => self.dispatch(line),
        }
    }

    /// Mask-ack `irq`, run its handler, then unmask it. A source nobody
    /// handles stays masked so it cannot keep the line asserted.
    fn invoke(&self, irq: u8) -> Dispatch {
        let bit = 1 << irq;
        critical_section::with(|_| self.regs.mask32(GIMR, bit, 0));

        // Copy the entry out so the handler runs without holding the lock.
        let handler = self.handlers.lock(|table| table.get()[irq as usize]);
        match handler {
            Some(h) => {
                h(irq);
                critical_section::with(|_| self.regs.mask32(GIMR, 0, bit));
                Dispatch::Handled(irq)
            }
            None => {
                log::warn!("intc: no handler for irq {}, left masked", irq);
                Dispatch::Unhandled(irq)
            }
        }
    }
}

// IRR0..IRR3 hold 8 sources each.
const _: () = assert!(IRR_COUNT * 8 == IRQ_COUNT);

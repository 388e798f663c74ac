//! Early console on UART0.
//!
//! The bootloader leaves UART0 (16550, registers 4 bytes apart) configured,
//! so output only needs the transmit holding register. A wedged transmitter
//! must not hang early boot: after 30000 polls of THRE the TX FIFO is reset
//! and the character dropped.
//!
//! # Features
//! - `early-printk` - drive the UART (default)
//!
//! Without `early-printk` all output is discarded.

use core::fmt::{self, Write};

use crate::regs::{Mmio, MmioBlock, UART0_BASE};

const UART_THR: usize = 0x00;
const UART_FCR: usize = 0x08;
const UART_LSR: usize = 0x14;

const LSR_THRE: u8 = 0x20;
const FCR_TXRST: u8 = 0x04;
const FCR_RTRG: u8 = 0xC0;

const THRE_RETRIES: u32 = 30_000;

/// Debug print output using the boot UART
pub struct EarlyConsole<R: Mmio> {
    uart: R,
}

impl EarlyConsole<MmioBlock> {
    /// Console on the SoC's UART0.
    pub const fn uart0() -> Self {
        // SAFETY: UART0 is an internal, permanently mapped register block.
        Self {
            uart: unsafe { MmioBlock::new(UART0_BASE) },
        }
    }
}

impl<R: Mmio> EarlyConsole<R> {
    pub const fn new(uart: R) -> Self {
        Self { uart }
    }

    /// Write a single byte
    #[cfg(feature = "early-printk")]
    pub fn putc(&self, byte: u8) {
        let mut retry = 0;
        while self.uart.read8(UART_LSR) & LSR_THRE == 0 {
            retry += 1;
            if retry >= THRE_RETRIES {
                self.uart.write8(UART_FCR, FCR_TXRST | FCR_RTRG);
                return;
            }
        }
        self.uart.write8(UART_THR, byte);
    }

    #[cfg(not(feature = "early-printk"))]
    #[inline]
    pub fn putc(&self, _byte: u8) {}

    pub fn puts(&self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.putc(b'\r');
            }
            self.putc(byte);
        }
    }
}

impl<R: Mmio> Write for EarlyConsole<R> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.puts(s);
        Ok(())
    }
}

/// `fmt::Write` over a shared console, for use from `log`.
struct Shared<'a, R: Mmio>(&'a EarlyConsole<R>);

impl<R: Mmio> Write for Shared<'_, R> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.puts(s);
        Ok(())
    }
}

impl<R: Mmio + Send + Sync> log::Log for EarlyConsole<R> {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(Shared(self), "[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Install `console` as the `log` backend.
///
/// Only the first call takes effect.
pub fn init_logger<R>(console: &'static EarlyConsole<R>, level: log::LevelFilter)
where
    R: Mmio + Send + Sync,
{
    if log::set_logger(console).is_ok() {
        log::set_max_level(level);
    }
}

/// Print to the early console
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        {
            use core::fmt::Write;
            let _ = write!(&mut $crate::debug::EarlyConsole::uart0(), $($arg)*);
        }
    }
}

/// Print with newline to the early console
#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {
        {
            use core::fmt::Write;
            let _ = writeln!(&mut $crate::debug::EarlyConsole::uart0(), $($arg)*);
        }
    }
}

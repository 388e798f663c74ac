//! Interrupt sources and routing for the RTL83xx interrupt controller.
//!
//! The ICTL collects 32 internal sources. Each source is routed to one of
//! five cascades through the IRR0-IRR3 registers (4 bits per source, 8
//! sources per register, IRR0 holding sources 31..24). Cascade `n` raises
//! MIPS CPU interrupt line IP(n+1):
//!
//! | Cascade | CPU line | Default sources                       |
//! |---------|----------|---------------------------------------|
//! | 1       | IP2      | UART1, TC1, OCPTO, HLXTO, SLXTO       |
//! | 2       | IP3      | UART0                                 |
//! | 3       | IP4      | SWCORE                                |
//! | 4       | IP5      | NIC, GPIO_ABCD, GPIO_EFGH, RTC        |
//! | 5       | IP6      | TC0                                   |
//!
//! IP7 belongs to the CPU count/compare timer and never carries ICTL sources.

/// Total number of ICTL sources
pub const IRQ_COUNT: usize = 32;

/// Number of routing registers
pub const IRR_COUNT: usize = 4;

/// RTL83xx interrupt sources (bit positions in GIMR/GISR)
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum Interrupt {
    WDT_IP2 = 18,
    WDT_IP1 = 19,
    SWCORE = 20,
    RTC = 21,
    GPIO_EFGH = 22,
    GPIO_ABCD = 23,
    NIC = 24,
    SLXTO = 25,
    HLXTO = 26,
    OCPTO = 27,
    TC1 = 28,
    TC0 = 29,
    UART1 = 30,
    UART0 = 31,
}

impl Interrupt {
    /// Get the IRQ number
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(irq: u8) -> Option<Self> {
        Some(match irq {
            18 => Self::WDT_IP2,
            19 => Self::WDT_IP1,
            20 => Self::SWCORE,
            21 => Self::RTC,
            22 => Self::GPIO_EFGH,
            23 => Self::GPIO_ABCD,
            24 => Self::NIC,
            25 => Self::SLXTO,
            26 => Self::HLXTO,
            27 => Self::OCPTO,
            28 => Self::TC1,
            29 => Self::TC0,
            30 => Self::UART1,
            31 => Self::UART0,
            _ => return None,
        })
    }

    /// Bit of this source in GIMR/GISR.
    pub fn mask(self) -> u32 {
        1 << self.number()
    }
}

impl From<Interrupt> for u8 {
    fn from(irq: Interrupt) -> u8 {
        irq.number()
    }
}

/// Interrupt priority cascade (value written to the IRR nibble)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Cascade {
    Ictl1 = 1,
    Ictl2 = 2,
    Ictl3 = 3,
    Ictl4 = 4,
    Ictl5 = 5,
}

impl Cascade {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Ictl1),
            2 => Some(Self::Ictl2),
            3 => Some(Self::Ictl3),
            4 => Some(Self::Ictl4),
            5 => Some(Self::Ictl5),
            _ => None,
        }
    }

    /// CPU interrupt line raised by this cascade.
    pub fn cpu_line(self) -> CpuLine {
        match self {
            Self::Ictl1 => CpuLine::Ip2,
            Self::Ictl2 => CpuLine::Ip3,
            Self::Ictl3 => CpuLine::Ip4,
            Self::Ictl4 => CpuLine::Ip5,
            Self::Ictl5 => CpuLine::Ip6,
        }
    }
}

/// MIPS hardware interrupt lines (Cause/Status IP2..IP7)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CpuLine {
    Ip2 = 2,
    Ip3 = 3,
    Ip4 = 4,
    Ip5 = 5,
    Ip6 = 6,
    Ip7 = 7,
}

impl CpuLine {
    /// Lines in service order, highest first.
    pub const PRIORITY: [CpuLine; 6] = [
        CpuLine::Ip7,
        CpuLine::Ip6,
        CpuLine::Ip5,
        CpuLine::Ip4,
        CpuLine::Ip3,
        CpuLine::Ip2,
    ];

    /// Cause/Status register bit (IM/IP field starts at bit 8).
    pub fn cause_bit(self) -> u32 {
        1 << (8 + self as u32)
    }

    /// Highest-priority line pending in `cause`, which the caller has already
    /// masked with the Status IM bits.
    pub fn highest_pending(cause: u32) -> Option<Self> {
        Self::PRIORITY.into_iter().find(|line| cause & line.cause_bit() != 0)
    }

    pub fn cascade(self) -> Option<Cascade> {
        match self {
            Self::Ip2 => Some(Cascade::Ictl1),
            Self::Ip3 => Some(Cascade::Ictl2),
            Self::Ip4 => Some(Cascade::Ictl3),
            Self::Ip5 => Some(Cascade::Ictl4),
            Self::Ip6 => Some(Cascade::Ictl5),
            Self::Ip7 => None,
        }
    }
}

/// Source to cascade assignment, packed the way the IRR registers hold it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RoutingTable {
    levels: [u8; IRQ_COUNT],
}

impl RoutingTable {
    /// Table with every source unrouted.
    pub const fn empty() -> Self {
        Self { levels: [0; IRQ_COUNT] }
    }

    /// Routing used by every RTL83xx family.
    ///
    /// The watchdog stages stay unrouted; they are serviced by the reset
    /// logic rather than the CPU.
    pub fn rtl83xx() -> Self {
        use Cascade::*;
        use Interrupt::*;

        Self::empty()
            .route(UART0, Ictl2)
            .route(UART1, Ictl1)
            .route(TC0, Ictl5)
            .route(TC1, Ictl1)
            .route(OCPTO, Ictl1)
            .route(HLXTO, Ictl1)
            .route(SLXTO, Ictl1)
            .route(NIC, Ictl4)
            .route(GPIO_ABCD, Ictl4)
            .route(GPIO_EFGH, Ictl4)
            .route(RTC, Ictl4)
            .route(SWCORE, Ictl3)
    }

    /// Builder: assign `irq` to `cascade`.
    pub fn route(mut self, irq: Interrupt, cascade: Cascade) -> Self {
        self.levels[irq.number() as usize] = cascade as u8;
        self
    }

    pub fn cascade(&self, irq: u8) -> Option<Cascade> {
        self.levels.get(irq as usize).copied().and_then(Cascade::from_level)
    }

    /// Bitmask of sources that raise `line`.
    pub fn sources_on(&self, line: CpuLine) -> u32 {
        let Some(cascade) = line.cascade() else {
            return 0;
        };
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, level)| **level == cascade as u8)
            .fold(0, |mask, (irq, _)| mask | (1 << irq))
    }

    /// IRR0..IRR3 register values.
    pub fn pack(&self) -> [u32; IRR_COUNT] {
        let mut irr = [0u32; IRR_COUNT];
        for (irq, level) in self.levels.iter().enumerate() {
            let reg = IRR_COUNT - 1 - irq / 8;
            let shift = (irq % 8) * 4;
            irr[reg] |= ((*level & 0xF) as u32) << shift;
        }
        irr
    }

    /// Rebuild a table from IRR register values.
    pub fn unpack(irr: [u32; IRR_COUNT]) -> Self {
        let mut levels = [0u8; IRQ_COUNT];
        for (irq, level) in levels.iter_mut().enumerate() {
            let reg = IRR_COUNT - 1 - irq / 8;
            let shift = (irq % 8) * 4;
            *level = ((irr[reg] >> shift) & 0xF) as u8;
        }
        Self { levels }
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::rtl83xx()
    }
}

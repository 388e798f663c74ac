//! Register models shared by the unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use embedded_hal::delay::DelayNs;

use crate::regs::Mmio;

/// Plain register file with a write log.
///
/// Bits registered with [`FakeRegs::self_clearing`] read back as zero right
/// after they are written, which is how "busy until done" hardware bits look
/// when the operation completes instantly.
#[derive(Default)]
pub(crate) struct FakeRegs {
    values: RefCell<HashMap<usize, u32>>,
    writes: RefCell<Vec<(usize, u32)>>,
    self_clearing: RefCell<HashMap<usize, u32>>,
    forced: RefCell<HashMap<usize, u32>>,
    scripted: RefCell<HashMap<usize, VecDeque<u32>>>,
}

impl FakeRegs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, offset: usize, value: u32) {
        self.values.borrow_mut().insert(offset, value);
    }

    pub fn get(&self, offset: usize) -> u32 {
        self.values.borrow().get(&offset).copied().unwrap_or(0)
    }

    pub fn self_clearing(&self, offset: usize, mask: u32) {
        self.self_clearing.borrow_mut().insert(offset, mask);
    }

    /// Bits that are always set when `offset` is read.
    pub fn force_bits(&self, offset: usize, bits: u32) {
        self.forced.borrow_mut().insert(offset, bits);
    }

    /// Values returned by the next reads of `offset`, before falling back to
    /// the stored value.
    pub fn script(&self, offset: usize, values: &[u32]) {
        self.scripted
            .borrow_mut()
            .entry(offset)
            .or_default()
            .extend(values.iter().copied());
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.writes.borrow().clone()
    }

    pub fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.writes
            .borrow()
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }
}

impl Mmio for FakeRegs {
    fn read32(&self, offset: usize) -> u32 {
        if let Some(v) = self.scripted.borrow_mut().get_mut(&offset).and_then(|q| q.pop_front()) {
            return v;
        }
        let forced = self.forced.borrow().get(&offset).copied().unwrap_or(0);
        self.get(offset) | forced
    }

    fn write32(&self, offset: usize, value: u32) {
        self.writes.borrow_mut().push((offset, value));
        let clear = self.self_clearing.borrow().get(&offset).copied().unwrap_or(0);
        self.set(offset, value & !clear);
    }

    fn read8(&self, offset: usize) -> u8 {
        self.read32(offset) as u8
    }

    fn write8(&self, offset: usize, value: u8) {
        self.write32(offset, value as u32);
    }
}

pub(crate) struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

const SFCR: usize = 0x00;
const SFCR2: usize = 0x04;
const SFCSR: usize = 0x08;
const SFDR: usize = 0x0c;

const CSB0: u32 = 1 << 31;
const CSB1: u32 = 1 << 30;
const RDY: u32 = 1 << 27;

/// One chip-select window as seen by the flash chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Transaction {
    pub opcode: u8,
    pub addr: Option<u32>,
    /// Bytes clocked in after the opcode and address.
    pub written: Vec<u8>,
    /// Bytes clocked out of the flash.
    pub read: Vec<u8>,
}

#[derive(Default)]
struct SimState {
    sfcr: u32,
    sfcr2: u32,
    sfcsr: u32,
    selected: bool,
    mosi: Vec<u8>,
    miso: Vec<u8>,
    wel: bool,
    busy_reads: u32,
    busy_forever: bool,
    deaf_to_wren: bool,
    stuck: bool,
    memory: HashMap<u32, u8>,
    regfile: HashMap<u8, Vec<u8>>,
    log: Vec<Transaction>,
    raw: Vec<(usize, u32)>,
}

/// Behavioural model of the SFCR/SFCSR/SFDR controller with a SPI-NOR chip
/// behind it. Unwritten flash reads as 0xFF.
pub(crate) struct SimFlash {
    four_byte: bool,
    state: RefCell<SimState>,
}

impl SimFlash {
    pub fn new(four_byte: bool) -> Self {
        Self {
            four_byte,
            state: RefCell::new(SimState::default()),
        }
    }

    pub fn set_sfcr2(&self, value: u32) {
        self.state.borrow_mut().sfcr2 = value;
    }

    pub fn sfcr(&self) -> u32 {
        self.state.borrow().sfcr
    }

    /// RDY never asserts.
    pub fn wedge(&self) {
        self.state.borrow_mut().stuck = true;
    }

    /// WIP stays set forever.
    pub fn hold_busy(&self) {
        self.state.borrow_mut().busy_forever = true;
    }

    /// WREN is ignored, so WEL never latches.
    pub fn ignore_wren(&self) {
        self.state.borrow_mut().deaf_to_wren = true;
    }

    pub fn load(&self, addr: u32, data: &[u8]) {
        let mut st = self.state.borrow_mut();
        for (i, b) in data.iter().enumerate() {
            st.memory.insert(addr + i as u32, *b);
        }
    }

    pub fn peek(&self, addr: u32, len: usize) -> Vec<u8> {
        let st = self.state.borrow();
        (0..len as u32)
            .map(|i| st.memory.get(&(addr + i)).copied().unwrap_or(0xFF))
            .collect()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.state.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        let mut st = self.state.borrow_mut();
        st.log.clear();
        st.raw.clear();
    }

    pub fn raw_writes(&self) -> Vec<(usize, u32)> {
        self.state.borrow().raw.clone()
    }

    fn addr_width(&self) -> usize {
        if self.four_byte {
            4
        } else {
            3
        }
    }

    fn takes_address(opcode: u8) -> bool {
        matches!(opcode, 0x0b | 0x0c | 0x02 | 0x12 | 0xd8 | 0xdc | 0x20 | 0x21)
    }

    fn respond(&self, st: &mut SimState) -> u8 {
        let opcode = st.mosi.first().copied().unwrap_or(0);
        let index = st.miso.len();
        match opcode {
            0x05 => {
                let mut sr = 0u8;
                if st.busy_forever || st.busy_reads > 0 {
                    sr |= 0x01;
                    st.busy_reads = st.busy_reads.saturating_sub(1);
                }
                if st.wel {
                    sr |= 0x02;
                }
                sr
            }
            0x9f => [0xEF, 0x40, 0x18].get(index).copied().unwrap_or(0),
            0x0b | 0x0c => {
                let aw = self.addr_width();
                let addr = Self::address(&st.mosi[1..1 + aw]);
                st.memory.get(&(addr + index as u32)).copied().unwrap_or(0xFF)
            }
            op => st
                .regfile
                .get(&op)
                .and_then(|r| r.get(index))
                .copied()
                .unwrap_or(0),
        }
    }

    fn address(bytes: &[u8]) -> u32 {
        bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)
    }

    fn finish(&self, st: &mut SimState) {
        let mosi = core::mem::take(&mut st.mosi);
        let miso = core::mem::take(&mut st.miso);
        let Some(&opcode) = mosi.first() else {
            return;
        };
        let aw = self.addr_width();
        let (addr, written) = if Self::takes_address(opcode) && mosi.len() > aw {
            (Some(Self::address(&mosi[1..1 + aw])), mosi[1 + aw..].to_vec())
        } else {
            (None, mosi[1..].to_vec())
        };

        match opcode {
            0x06 => st.wel = !st.deaf_to_wren,
            0x04 => st.wel = false,
            0x02 | 0x12 if st.wel => {
                let base = addr.unwrap_or(0);
                for (i, b) in written.iter().enumerate() {
                    let cell = st.memory.entry(base + i as u32).or_insert(0xFF);
                    *cell &= *b;
                }
                st.wel = false;
                st.busy_reads = 1;
            }
            0xd8 | 0xdc | 0x20 | 0x21 if st.wel => {
                let size = if matches!(opcode, 0x20 | 0x21) { 0x1000 } else { 0x1_0000 };
                let start = addr.unwrap_or(0) & !(size - 1);
                st.memory.retain(|a, _| *a < start || *a >= start + size);
                st.wel = false;
                st.busy_reads = 1;
            }
            0x0b | 0x0c | 0x05 | 0x9f => {}
            op if !written.is_empty() => {
                st.regfile.insert(op, written.clone());
            }
            _ => {}
        }

        // Dummy cycles are not part of the read payload.
        let written = if matches!(opcode, 0x0b | 0x0c) { Vec::new() } else { written };
        st.log.push(Transaction {
            opcode,
            addr,
            written,
            read: miso,
        });
    }

    fn len_bytes(sfcsr: u32) -> usize {
        (((sfcsr >> 28) & 0x3) + 1) as usize
    }
}

impl Mmio for SimFlash {
    fn read32(&self, offset: usize) -> u32 {
        let mut st = self.state.borrow_mut();
        match offset {
            SFCR => st.sfcr,
            SFCR2 => st.sfcr2,
            SFCSR => {
                if st.stuck {
                    st.sfcsr & !RDY
                } else {
                    st.sfcsr | RDY
                }
            }
            SFDR => {
                if !st.selected {
                    return 0;
                }
                let len = Self::len_bytes(st.sfcsr);
                let mut bytes = [0u8; 4];
                for b in bytes.iter_mut().take(len) {
                    *b = self.respond(&mut st);
                    st.miso.push(*b);
                }
                u32::from_be_bytes(bytes)
            }
            _ => 0,
        }
    }

    fn write32(&self, offset: usize, value: u32) {
        let mut st = self.state.borrow_mut();
        st.raw.push((offset, value));
        match offset {
            SFCR => st.sfcr = value,
            SFCR2 => st.sfcr2 = value,
            SFCSR => {
                st.sfcsr = value & !RDY;
                let selected = !(value & CSB0 != 0 && value & CSB1 != 0);
                if st.selected && !selected {
                    self.finish(&mut st);
                }
                st.selected = selected;
            }
            SFDR => {
                if st.selected {
                    let len = Self::len_bytes(st.sfcsr);
                    let bytes = value.to_be_bytes();
                    st.mosi.extend_from_slice(&bytes[..len]);
                }
            }
            _ => {}
        }
    }

    fn read8(&self, offset: usize) -> u8 {
        self.read32(offset) as u8
    }

    fn write8(&self, offset: usize, value: u8) {
        self.write32(offset, value as u32)
    }
}

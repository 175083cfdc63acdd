//! Decoding of recorded bus traces into annotated transactions.

pub mod memory;
pub mod pio;

use serde::{Deserialize, Serialize};
use wirebus_core::commands::{
    MATCH_ROM, PIO_ACCESS_READ, PIO_ACCESS_WRITE, READ_MEMORY, READ_ROM, SKIP_ROM, WRITE_MEMORY, WRITE_READ_MEMORY,
};
use wirebus_core::{BusOp, RomCode};

pub use memory::{MemoryRead, MemoryWrite};
pub use pio::{PioRead, PioWrite};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Addressing {
    /// Nothing was written after the reset.
    None,
    Skip,
    Match(RomCode),
    /// READ ROM and the code read back; `None` when the reply was cut short.
    ReadRom(Option<RomCode>),
    Unknown(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Function {
    PioWrite(PioWrite),
    PioRead(PioRead),
    MemoryRead(MemoryRead),
    MemoryWrite(MemoryWrite),
    MemoryWriteRead { write: MemoryWrite, read: Option<MemoryRead> },
    Unknown(u8),
}

/// Everything between two reset pulses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub presence: bool,
    pub addressing: Addressing,
    pub function: Option<Function>,
    /// Operations left over after the recognised frames.
    pub trailing: usize,
}

/// Cursor over the operations of one transaction.
pub(crate) struct Ops<'a> {
    ops: &'a [BusOp],
    pos: usize,
}

impl<'a> Ops<'a> {
    fn new(ops: &'a [BusOp]) -> Self {
        Self { ops, pos: 0 }
    }

    pub(crate) fn write(&mut self) -> Option<u8> {
        match self.ops.get(self.pos) {
            Some(BusOp::Write(b)) => {
                self.pos += 1;
                Some(*b)
            }
            _ => None,
        }
    }

    pub(crate) fn read(&mut self) -> Option<u8> {
        match self.ops.get(self.pos) {
            Some(BusOp::Read(b)) => {
                self.pos += 1;
                Some(*b)
            }
            _ => None,
        }
    }

    pub(crate) fn writes(&mut self, count: usize) -> Vec<u8> {
        (0..count).map_while(|_| self.write()).collect()
    }

    pub(crate) fn reads(&mut self, count: usize) -> Vec<u8> {
        (0..count).map_while(|_| self.read()).collect()
    }

    fn remaining(&self) -> usize {
        self.ops.len() - self.pos
    }
}

fn rom_from(bytes: &[u8]) -> Option<RomCode> {
    let bytes: [u8; 8] = bytes.try_into().ok()?;
    Some(RomCode::from(bytes))
}

/// Splits `ops` at each reset and decodes every transaction.
///
/// Operations recorded before the first reset are ignored.
pub fn decode(ops: &[BusOp]) -> Vec<Transaction> {
    let starts: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| matches!(op, BusOp::Reset { .. }))
        .map(|(i, _)| i)
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(ops.len());
            let presence = matches!(ops[start], BusOp::Reset { presence: true });
            decode_transaction(presence, &ops[start + 1..end])
        })
        .collect()
}

fn decode_transaction(presence: bool, ops: &[BusOp]) -> Transaction {
    let mut cur = Ops::new(ops);
    let addressing = match cur.write() {
        None => Addressing::None,
        Some(SKIP_ROM) => Addressing::Skip,
        Some(MATCH_ROM) => match rom_from(&cur.writes(RomCode::LEN)) {
            Some(rom) => Addressing::Match(rom),
            None => Addressing::Unknown(MATCH_ROM),
        },
        Some(READ_ROM) => Addressing::ReadRom(rom_from(&cur.reads(RomCode::LEN))),
        Some(other) => Addressing::Unknown(other),
    };

    let function = match addressing {
        Addressing::Skip | Addressing::Match(_) => cur.write().map(|code| match code {
            PIO_ACCESS_WRITE => Function::PioWrite(PioWrite::decode(&mut cur)),
            PIO_ACCESS_READ => Function::PioRead(PioRead::decode(&mut cur)),
            READ_MEMORY => Function::MemoryRead(MemoryRead::decode(&mut cur)),
            WRITE_MEMORY => Function::MemoryWrite(MemoryWrite::decode(&mut cur)),
            WRITE_READ_MEMORY => {
                let write = MemoryWrite::decode(&mut cur);
                let read = write.acknowledged().then(|| MemoryRead::decode(&mut cur));
                Function::MemoryWriteRead { write, read }
            }
            other => Function::Unknown(other),
        }),
        _ => None,
    };

    Transaction {
        presence,
        addressing,
        function,
        trailing: cur.remaining(),
    }
}

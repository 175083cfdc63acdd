use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::BusError;
use crate::transport::BusTransport;

/// One master-side bus operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusOp {
    Reset { presence: bool },
    Write(u8),
    Read(u8),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: u64,
    pub op: BusOp,
}

/// Bounded log of bus operations, oldest dropped first.
pub struct TraceStore {
    entries: VecDeque<TraceEntry>,
    max_entries: usize,
}

impl TraceStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
        }
    }

    pub fn push(&mut self, op: BusOp) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        self.entries.push_back(TraceEntry { timestamp, op });

        if self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> &VecDeque<TraceEntry> {
        &self.entries
    }

    pub fn ops(&self) -> Vec<BusOp> {
        self.entries.iter().map(|e| e.op).collect()
    }

    /// Bytes written by the master, in order.
    pub fn written(&self) -> Vec<u8> {
        self.entries
            .iter()
            .filter_map(|e| match e.op {
                BusOp::Write(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Renders one line per transaction: `RST+ TX: 55 3A .. RX: AA`.
    pub fn to_text(&self, show_timestamp: bool) -> String {
        let mut result = String::new();
        let mut last_dir = None;
        for entry in &self.entries {
            match entry.op {
                BusOp::Reset { presence } => {
                    if !result.is_empty() {
                        result.push('\n');
                    }
                    if show_timestamp {
                        let secs = entry.timestamp / 1000;
                        let millis = entry.timestamp % 1000;
                        let hours = (secs / 3600) % 24;
                        let minutes = (secs / 60) % 60;
                        let seconds = secs % 60;
                        result.push_str(&format!("[{hours:02}:{minutes:02}:{seconds:02}.{millis:03}] "));
                    }
                    result.push_str(if presence { "RST+" } else { "RST-" });
                    last_dir = None;
                }
                BusOp::Write(b) | BusOp::Read(b) => {
                    let dir = matches!(entry.op, BusOp::Write(_));
                    if last_dir != Some(dir) {
                        result.push_str(if dir { " TX:" } else { " RX:" });
                        last_dir = Some(dir);
                    }
                    result.push_str(&format!(" {b:02X}"));
                }
            }
        }
        if !result.is_empty() {
            result.push('\n');
        }
        result
    }
}

/// Transport wrapper recording every operation into a [`TraceStore`].
pub struct Traced<B> {
    inner: B,
    store: TraceStore,
}

impl<B: BusTransport> Traced<B> {
    pub fn new(inner: B, max_entries: usize) -> Self {
        Self {
            inner,
            store: TraceStore::new(max_entries),
        }
    }

    pub fn store(&self) -> &TraceStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TraceStore {
        &mut self.store
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.inner
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: BusTransport> BusTransport for Traced<B> {
    fn reset(&mut self) -> Result<bool, BusError> {
        let presence = self.inner.reset()?;
        self.store.push(BusOp::Reset { presence });
        Ok(presence)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        self.inner.write_byte(byte)?;
        self.store.push(BusOp::Write(byte));
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, BusError> {
        let byte = self.inner.read_byte()?;
        self.store.push(BusOp::Read(byte));
        Ok(byte)
    }
}

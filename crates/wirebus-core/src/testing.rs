//! Scripted transports for unit tests.

use std::collections::VecDeque;

use crate::error::BusError;
use crate::transport::{BusTransport, SlaveBus};

/// What a [`ScriptBus`] saw the master do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterOp {
    Reset,
    Write(u8),
    Read,
}

/// Master transport answering from queues. An exhausted read queue fails.
#[derive(Debug, Default)]
pub struct ScriptBus {
    pub presence: VecDeque<bool>,
    pub reads: VecDeque<u8>,
    pub ops: Vec<MasterOp>,
}

impl ScriptBus {
    pub fn new(presence: &[bool], reads: &[u8]) -> Self {
        Self {
            presence: presence.iter().copied().collect(),
            reads: reads.iter().copied().collect(),
            ops: Vec::new(),
        }
    }

    pub fn written(&self) -> Vec<u8> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                MasterOp::Write(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    pub fn resets(&self) -> usize {
        self.ops.iter().filter(|op| **op == MasterOp::Reset).count()
    }
}

impl BusTransport for ScriptBus {
    fn reset(&mut self) -> Result<bool, BusError> {
        self.ops.push(MasterOp::Reset);
        Ok(self.presence.pop_front().unwrap_or(true))
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        self.ops.push(MasterOp::Write(byte));
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, BusError> {
        self.ops.push(MasterOp::Read);
        self.reads.pop_front().ok_or(BusError::Timeout)
    }
}

/// Slave transport fed from a queue; running dry looks like a bus reset.
#[derive(Debug, Default)]
pub struct ScriptSlave {
    pub incoming: VecDeque<u8>,
    pub sent: Vec<u8>,
    pub violations: Vec<u8>,
}

impl ScriptSlave {
    pub fn new(incoming: &[u8]) -> Self {
        Self {
            incoming: incoming.iter().copied().collect(),
            ..Default::default()
        }
    }
}

impl SlaveBus for ScriptSlave {
    fn recv(&mut self) -> Result<u8, BusError> {
        self.incoming.pop_front().ok_or(BusError::Interrupted)
    }

    fn send(&mut self, byte: u8) -> Result<(), BusError> {
        self.sent.push(byte);
        Ok(())
    }

    fn raise_protocol_violation(&mut self, command: u8) {
        self.violations.push(command);
    }
}

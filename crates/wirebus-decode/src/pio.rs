use serde::{Deserialize, Serialize};
use wirebus_core::commands::PIO_ACK;
use wirebus_core::PioStatus;

use crate::Ops;

/// PIO ACCESS WRITE as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PioWrite {
    pub data: Option<u8>,
    pub complement: Option<u8>,
    pub ack: Option<u8>,
    pub terminator: Option<u8>,
}

impl PioWrite {
    pub(crate) fn decode(cur: &mut Ops<'_>) -> Self {
        let data = cur.write();
        let complement = cur.write();
        let ack = cur.read();
        let terminator = cur.write();
        Self {
            data,
            complement,
            ack,
            terminator,
        }
    }

    pub fn complement_ok(&self) -> bool {
        matches!((self.data, self.complement), (Some(d), Some(c)) if d == !c)
    }

    pub fn committed(&self) -> bool {
        self.complement_ok() && self.ack == Some(PIO_ACK)
    }
}

/// PIO ACCESS READ as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PioRead {
    pub status: Option<u8>,
}

impl PioRead {
    pub(crate) fn decode(cur: &mut Ops<'_>) -> Self {
        Self { status: cur.read() }
    }

    pub fn status(&self) -> Option<PioStatus> {
        self.status.map(PioStatus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wirebus_core::BusOp;

    #[test]
    fn rejected_write() {
        let ops = [BusOp::Write(0x01), BusOp::Write(0x01), BusOp::Read(0xFF)];
        let mut cur = Ops::new(&ops);
        let w = PioWrite::decode(&mut cur);
        assert!(!w.complement_ok());
        assert!(!w.committed());
        assert_eq!(w.terminator, None);
    }

    #[test]
    fn read_status() {
        let ops = [BusOp::Read(0xB4)];
        let mut cur = Ops::new(&ops);
        let r = PioRead::decode(&mut cur);
        let status = r.status().unwrap();
        assert!(status.is_consistent());
        assert!(status.state_b());
    }
}

use serde::{Deserialize, Serialize};
use wirebus_core::crc8;

use crate::Ops;

/// `[length]` written, then `[data...][crc8]` read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRead {
    pub length: Option<u8>,
    pub data: Vec<u8>,
    pub crc: Option<u8>,
}

impl MemoryRead {
    pub(crate) fn decode(cur: &mut Ops<'_>) -> Self {
        let length = cur.write();
        let data = cur.reads(length.unwrap_or(0) as usize);
        let crc = cur.read();
        Self { length, data, crc }
    }

    pub fn crc_ok(&self) -> bool {
        self.length.map(usize::from) == Some(self.data.len()) && self.crc == Some(crc8(&self.data))
    }
}

/// `[length][data...][crc8]` written, the CRC echoed back as acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryWrite {
    pub length: Option<u8>,
    pub data: Vec<u8>,
    pub crc: Option<u8>,
    pub ack: Option<u8>,
}

impl MemoryWrite {
    pub(crate) fn decode(cur: &mut Ops<'_>) -> Self {
        let length = cur.write();
        let data = cur.writes(length.unwrap_or(0) as usize);
        let crc = cur.write();
        let ack = cur.read();
        Self { length, data, crc, ack }
    }

    pub fn crc_ok(&self) -> bool {
        self.length.map(usize::from) == Some(self.data.len()) && self.crc == Some(crc8(&self.data))
    }

    pub fn acknowledged(&self) -> bool {
        self.crc_ok() && self.ack == self.crc
    }
}

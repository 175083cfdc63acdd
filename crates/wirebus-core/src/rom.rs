use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crc::crc8;

/// Family code of the two-channel PIO device.
pub const PIO_FAMILY_CODE: u8 = 0x3A;
/// Family code of the 8-byte memory device.
pub const MEMORY_FAMILY_CODE: u8 = 0x09;

/// 64-bit bus address: family code, six serial bytes, CRC8 of the first seven.
///
/// Bytes are kept in wire order, family code first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RomCode([u8; 8]);

impl RomCode {
    pub const LEN: usize = 8;

    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Builds a code from its family and serial, computing the CRC byte.
    pub fn with_crc(family: u8, serial: [u8; 6]) -> Self {
        let mut bytes = [0u8; 8];
        bytes[0] = family;
        bytes[1..7].copy_from_slice(&serial);
        bytes[7] = crc8(&bytes[..7]);
        Self(bytes)
    }

    pub fn family(&self) -> u8 {
        self.0[0]
    }

    pub fn serial(&self) -> &[u8] {
        &self.0[1..7]
    }

    pub fn crc(&self) -> u8 {
        self.0[7]
    }

    pub fn is_valid(&self) -> bool {
        crc8(&self.0[..7]) == self.0[7]
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl From<[u8; 8]> for RomCode {
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for RomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_crc_is_valid() {
        let rom = RomCode::with_crc(PIO_FAMILY_CODE, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert!(rom.is_valid());
        assert_eq!(rom.family(), 0x3A);
        assert_eq!(rom.serial(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn corrupted_crc_is_invalid() {
        let mut bytes = *RomCode::with_crc(MEMORY_FAMILY_CODE, [9, 0x10, 0x11, 0x12, 0x13, 0x14]).as_bytes();
        bytes[7] ^= 0x01;
        assert!(!RomCode::from(bytes).is_valid());
    }

    #[test]
    fn display_is_hex_in_wire_order() {
        let rom = RomCode::from_bytes([0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00, 0xA2]);
        assert_eq!(rom.to_string(), "021cb801000000a2");
        assert!(rom.is_valid());
    }
}

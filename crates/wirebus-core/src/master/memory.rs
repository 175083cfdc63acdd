//! Memory commands for the 8-byte scratch memory device (family 0x09).
//!
//! Every transfer is framed as `[length][data...][crc8]`, the CRC covering
//! exactly the transferred bytes.

use log::{debug, error, warn};

use super::DeviceHandle;
use crate::commands::{MAX_FRAME_LEN, READ_MEMORY, WRITE_MEMORY, WRITE_READ_MEMORY};
use crate::crc::crc8;
use crate::error::{Error, Result};
use crate::transport::BusTransport;

fn frame_len(len: usize) -> Result<u8> {
    u8::try_from(len).map_err(|_| Error::LengthOutOfRange {
        length: len,
        max: MAX_FRAME_LEN,
    })
}

impl DeviceHandle {
    /// Reads `buf.len()` bytes from offset 0. `buf` is only written on success.
    pub fn read_memory<B: BusTransport + ?Sized>(&self, bus: &mut B, buf: &mut [u8]) -> Result<()> {
        self.ensure_init()?;
        let len = frame_len(buf.len())?;
        self.select(bus)?;
        bus.write_byte(READ_MEMORY)?;
        self.read_frame(bus, len, buf)
    }

    /// Writes `data` at offset 0; the device acknowledges with the frame CRC.
    pub fn write_memory<B: BusTransport + ?Sized>(&self, bus: &mut B, data: &[u8]) -> Result<()> {
        self.ensure_init()?;
        let len = frame_len(data.len())?;
        self.select(bus)?;
        bus.write_byte(WRITE_MEMORY)?;
        self.write_frame(bus, len, data)
    }

    /// Writes `data`, then reads `buf.len()` bytes back in the same transaction.
    ///
    /// A failed write acknowledgement aborts before the read.
    pub fn write_read_memory<B: BusTransport + ?Sized>(
        &self,
        bus: &mut B,
        data: &[u8],
        buf: &mut [u8],
    ) -> Result<()> {
        self.ensure_init()?;
        let write_len = frame_len(data.len())?;
        let read_len = frame_len(buf.len())?;
        self.select(bus)?;
        bus.write_byte(WRITE_READ_MEMORY)?;
        self.write_frame(bus, write_len, data).map_err(|e| {
            error!("write-read on {}: write failed: {}", self.rom_code(), e);
            e
        })?;
        self.read_frame(bus, read_len, buf).map_err(|e| {
            error!("write-read on {}: read failed: {}", self.rom_code(), e);
            e
        })
    }

    fn write_frame<B: BusTransport + ?Sized>(&self, bus: &mut B, len: u8, data: &[u8]) -> Result<()> {
        let crc = crc8(data);
        bus.write_byte(len)?;
        bus.write_bytes(data)?;
        bus.write_byte(crc)?;
        let ack = bus.read_byte()?;
        if ack != crc {
            error!("write of {} bytes to {} not acknowledged (crc {:02x}, got {:02x})", len, self.rom_code(), crc, ack);
            return Err(Error::Integrity {
                expected: crc,
                received: ack,
            });
        }
        debug!("wrote {} bytes to {}", len, self.rom_code());
        Ok(())
    }

    fn read_frame<B: BusTransport + ?Sized>(&self, bus: &mut B, len: u8, buf: &mut [u8]) -> Result<()> {
        bus.write_byte(len)?;
        let mut data = vec![0u8; len as usize];
        bus.read_bytes(&mut data)?;
        let received = bus.read_byte()?;
        let expected = crc8(&data);
        if expected != received {
            warn!("crc mismatch reading {}: computed {:02x}, received {:02x}", self.rom_code(), expected, received);
            return Err(Error::Integrity { expected, received });
        }
        buf.copy_from_slice(&data);
        debug!("read {} bytes from {}", len, self.rom_code());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rom::{RomCode, MEMORY_FAMILY_CODE};
    use crate::testing::{MasterOp, ScriptBus};

    fn handle() -> DeviceHandle {
        let mut handle = DeviceHandle::new(RomCode::with_crc(MEMORY_FAMILY_CODE, [0x09, 0x10, 0x11, 0x12, 0x13, 0x14]));
        handle.set_solo(true).unwrap();
        handle.set_use_crc(true).unwrap();
        handle
    }

    #[test]
    fn read_memory_frame() {
        let data = [0x11, 0x22, 0x33];
        let mut reads = data.to_vec();
        reads.push(crc8(&data));
        let mut bus = ScriptBus::new(&[true], &reads);

        let mut buf = [0u8; 3];
        handle().read_memory(&mut bus, &mut buf).unwrap();
        assert_eq!(buf, data);
        assert_eq!(bus.written(), vec![0xCC, READ_MEMORY, 3]);
    }

    #[test]
    fn read_memory_crc_mismatch_leaves_buffer() {
        let mut bus = ScriptBus::new(&[true], &[0x11, 0x22, 0x00]);
        let mut buf = [0xEE; 2];
        assert!(matches!(handle().read_memory(&mut bus, &mut buf), Err(Error::Integrity { .. })));
        assert_eq!(buf, [0xEE; 2]);
    }

    #[test]
    fn read_memory_crc_is_checked_by_default() {
        let handle = DeviceHandle::new(RomCode::with_crc(MEMORY_FAMILY_CODE, [0x09, 0x10, 0x11, 0x12, 0x13, 0x14]));
        assert!(!handle.use_crc());
        let mut bus = ScriptBus::new(&[true], &[0x11, 0x22, 0x00]);
        let mut buf = [0u8; 2];
        assert!(matches!(
            handle.read_memory(&mut bus, &mut buf),
            Err(Error::Integrity { expected, received: 0x00 }) if expected == crc8(&[0x11, 0x22])
        ));
        assert_eq!(buf, [0u8; 2]);
    }

    #[test]
    fn write_memory_checks_ack() {
        let data = [0x5A];
        let crc = crc8(&data);
        let mut bus = ScriptBus::new(&[true], &[crc]);
        handle().write_memory(&mut bus, &data).unwrap();
        assert_eq!(bus.written(), vec![0xCC, WRITE_MEMORY, 1, 0x5A, crc]);

        let mut bus = ScriptBus::new(&[true], &[0xFF]);
        assert!(matches!(
            handle().write_memory(&mut bus, &data),
            Err(Error::Integrity { expected, received: 0xFF }) if expected == crc
        ));
    }

    #[test]
    fn write_read_aborts_on_bad_ack() {
        let mut bus = ScriptBus::new(&[true], &[0xFF, 0x01, 0x02]);
        let mut buf = [0u8; 2];
        assert!(handle().write_read_memory(&mut bus, &[0x5A], &mut buf).is_err());
        assert_eq!(bus.ops.iter().filter(|op| **op == MasterOp::Read).count(), 1);
        assert_eq!(bus.reads.len(), 2);
    }

    #[test]
    fn write_read_round() {
        let written = [0x5A];
        let read = [0x01, 0x02, 0x03];
        let mut reads = vec![crc8(&written)];
        reads.extend_from_slice(&read);
        reads.push(crc8(&read));
        let mut bus = ScriptBus::new(&[true], &reads);

        let mut buf = [0u8; 3];
        handle().write_read_memory(&mut bus, &written, &mut buf).unwrap();
        assert_eq!(buf, read);
        assert_eq!(bus.written(), vec![0xCC, WRITE_READ_MEMORY, 1, 0x5A, crc8(&written), 3]);
    }

    #[test]
    fn oversized_frame_is_refused_before_traffic() {
        let mut bus = ScriptBus::new(&[true], &[]);
        let data = vec![0u8; 256];
        assert!(matches!(
            handle().write_memory(&mut bus, &data),
            Err(Error::LengthOutOfRange { length: 256, .. })
        ));
        assert!(bus.ops.is_empty());
    }
}

use log::{debug, warn};

use super::SlaveDevice;
use crate::commands::{IDLE_BYTE, READ_MEMORY, WRITE_MEMORY, WRITE_READ_MEMORY};
use crate::crc::crc8;
use crate::error::{Error, Result};
use crate::rom::{RomCode, MEMORY_FAMILY_CODE};
use crate::transport::SlaveBus;

/// Scratch memory read and written in CRC-checked frames.
#[derive(Debug, Clone)]
pub struct MemorySlave {
    rom_code: RomCode,
    memory: Box<[u8]>,
}

impl MemorySlave {
    pub const DEFAULT_SIZE: usize = 8;

    pub fn new(rom_code: RomCode) -> Self {
        Self::with_size(rom_code, Self::DEFAULT_SIZE)
    }

    pub fn with_size(rom_code: RomCode, size: usize) -> Self {
        Self {
            rom_code,
            memory: vec![IDLE_BYTE; size].into_boxed_slice(),
        }
    }

    /// Device with the memory family code and the given serial.
    pub fn with_serial(serial: [u8; 6]) -> Self {
        Self::new(RomCode::with_crc(MEMORY_FAMILY_CODE, serial))
    }

    pub fn size(&self) -> usize {
        self.memory.len()
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn clear_memory(&mut self) {
        self.memory.fill(IDLE_BYTE);
    }

    /// CRC8 over the first `len` bytes (clamped to the memory size).
    pub fn crc(&self, len: usize) -> u8 {
        crc8(&self.memory[..len.min(self.memory.len())])
    }

    /// Copies `source` into memory at `offset`.
    pub fn write_memory(&mut self, source: &[u8], offset: usize) -> Result<()> {
        let range = self.range(offset, source.len())?;
        self.memory[range].copy_from_slice(source);
        Ok(())
    }

    /// Copies memory at `offset` into `destination`.
    pub fn read_memory(&self, destination: &mut [u8], offset: usize) -> Result<()> {
        let range = self.range(offset, destination.len())?;
        destination.copy_from_slice(&self.memory[range]);
        Ok(())
    }

    fn range(&self, offset: usize, length: usize) -> Result<std::ops::Range<usize>> {
        let size = self.memory.len();
        match offset.checked_add(length) {
            Some(end) if offset < size && end <= size => Ok(offset..end),
            _ => Err(Error::OutOfBounds { offset, length, size }),
        }
    }

    fn recv_length(&self, bus: &mut dyn SlaveBus) -> Result<usize> {
        let len = bus.recv()? as usize;
        if len > self.memory.len() {
            warn!("frame length {} exceeds memory of {} bytes", len, self.memory.len());
            return Err(Error::LengthOutOfRange {
                length: len,
                max: self.memory.len(),
            });
        }
        Ok(len)
    }

    fn serve_read(&mut self, bus: &mut dyn SlaveBus) -> Result<()> {
        let len = self.recv_length(bus)?;
        bus.send_all(&self.memory[..len])?;
        bus.send(crc8(&self.memory[..len]))?;
        debug!("memory read of {} bytes", len);
        Ok(())
    }

    fn serve_write(&mut self, bus: &mut dyn SlaveBus) -> Result<()> {
        let len = self.recv_length(bus)?;
        let mut staged = vec![0u8; len];
        bus.recv_into(&mut staged)?;
        let received = bus.recv()?;
        let crc = crc8(&staged);
        if crc != received {
            warn!("memory write dropped: crc {:02x}, received {:02x}", crc, received);
            return Err(Error::Integrity { expected: crc, received });
        }
        self.memory[..len].copy_from_slice(&staged);
        debug!("memory write of {} bytes", len);
        bus.send(crc)?;
        Ok(())
    }
}

impl SlaveDevice for MemorySlave {
    fn rom_code(&self) -> &RomCode {
        &self.rom_code
    }

    fn duty(&mut self, bus: &mut dyn SlaveBus) -> Result<()> {
        let cmd = bus.recv()?;
        match cmd {
            READ_MEMORY => self.serve_read(bus),
            WRITE_MEMORY => self.serve_write(bus),
            WRITE_READ_MEMORY => {
                self.serve_write(bus)?;
                self.serve_read(bus)
            }
            other => {
                bus.raise_protocol_violation(other);
                Err(Error::UnknownCommand(other))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptSlave;

    fn device() -> MemorySlave {
        MemorySlave::with_serial([0x09, 0x10, 0x11, 0x12, 0x13, 0x14])
    }

    fn write_frame(cmd: u8, data: &[u8], crc: u8) -> Vec<u8> {
        let mut frame = vec![cmd, data.len() as u8];
        frame.extend_from_slice(data);
        frame.push(crc);
        frame
    }

    #[test]
    fn starts_erased() {
        assert_eq!(device().memory(), &[0xFF; 8]);
    }

    #[test]
    fn write_then_read_four_bytes() {
        let data = [0x11, 0x22, 0x33, 0x44];
        let mut dev = device();
        let mut bus = ScriptSlave::new(&write_frame(WRITE_MEMORY, &data, crc8(&data)));
        dev.duty(&mut bus).unwrap();
        assert_eq!(bus.sent, vec![crc8(&data)]);
        assert_eq!(dev.memory(), &[0x11, 0x22, 0x33, 0x44, 0xFF, 0xFF, 0xFF, 0xFF]);

        let mut bus = ScriptSlave::new(&[READ_MEMORY, 4]);
        dev.duty(&mut bus).unwrap();
        let mut expected = data.to_vec();
        expected.push(crc8(&data));
        assert_eq!(bus.sent, expected);
    }

    #[test]
    fn every_length_round_trips() {
        for len in 0..=MemorySlave::DEFAULT_SIZE {
            let data: Vec<u8> = (0..len as u8).map(|i| i.wrapping_mul(37) ^ 0x5C).collect();
            let mut dev = device();
            let mut bus = ScriptSlave::new(&write_frame(WRITE_MEMORY, &data, crc8(&data)));
            dev.duty(&mut bus).unwrap();

            let mut bus = ScriptSlave::new(&[READ_MEMORY, len as u8]);
            dev.duty(&mut bus).unwrap();
            assert_eq!(&bus.sent[..len], &data[..]);
            assert_eq!(bus.sent[len], crc8(&data));
        }
    }

    #[test]
    fn read_crc_covers_only_sent_bytes() {
        let mut dev = device();
        dev.write_memory(&[1, 2, 3, 4, 5, 6, 7, 8], 0).unwrap();
        let mut bus = ScriptSlave::new(&[READ_MEMORY, 2]);
        dev.duty(&mut bus).unwrap();
        assert_eq!(bus.sent, vec![1, 2, crc8(&[1, 2])]);
        assert_ne!(crc8(&[1, 2]), dev.crc(8));
    }

    #[test]
    fn corrupted_crc_leaves_memory() {
        let data = [0x11, 0x22, 0x33, 0x44];
        let mut dev = device();
        dev.write_memory(&[0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7], 0).unwrap();
        let before = dev.memory().to_vec();
        let mut bus = ScriptSlave::new(&write_frame(WRITE_MEMORY, &data, crc8(&data) ^ 0x01));
        assert!(matches!(dev.duty(&mut bus), Err(Error::Integrity { .. })));
        assert!(bus.sent.is_empty());
        assert_eq!(dev.memory(), &before[..]);
    }

    #[test]
    fn interrupted_write_leaves_memory() {
        let mut dev = device();
        let mut bus = ScriptSlave::new(&[WRITE_MEMORY, 4, 0x11, 0x22]);
        assert!(matches!(dev.duty(&mut bus), Err(Error::Transport(_))));
        assert_eq!(dev.memory(), &[0xFF; 8]);
    }

    #[test]
    fn write_read_skips_read_on_bad_crc() {
        let data = [0x5A];
        let mut dev = device();
        let mut frame = write_frame(WRITE_READ_MEMORY, &data, 0x00);
        frame.push(4);
        let mut bus = ScriptSlave::new(&frame);
        assert!(dev.duty(&mut bus).is_err());
        assert!(bus.sent.is_empty());
        assert_eq!(bus.incoming.len(), 1);
    }

    #[test]
    fn write_read_in_one_transaction() {
        let data = [0x5A];
        let mut dev = device();
        let mut frame = write_frame(WRITE_READ_MEMORY, &data, crc8(&data));
        frame.push(3);
        let mut bus = ScriptSlave::new(&frame);
        dev.duty(&mut bus).unwrap();
        assert_eq!(bus.sent, vec![crc8(&data), 0x5A, 0xFF, 0xFF, crc8(&[0x5A, 0xFF, 0xFF])]);
    }

    #[test]
    fn oversized_lengths_abort() {
        let mut dev = device();
        let mut bus = ScriptSlave::new(&[READ_MEMORY, 9]);
        assert!(matches!(dev.duty(&mut bus), Err(Error::LengthOutOfRange { length: 9, max: 8 })));
        assert!(bus.sent.is_empty());
    }

    #[test]
    fn unknown_command_is_reported() {
        let mut dev = device();
        let mut bus = ScriptSlave::new(&[0x12]);
        assert!(matches!(dev.duty(&mut bus), Err(Error::UnknownCommand(0x12))));
        assert_eq!(bus.violations, vec![0x12]);
    }

    #[test]
    fn bulk_copies_are_bounds_checked() {
        let mut dev = device();
        dev.write_memory(&[1, 2], 6).unwrap();
        assert!(matches!(dev.write_memory(&[1, 2, 3], 6), Err(Error::OutOfBounds { offset: 6, length: 3, size: 8 })));
        assert!(dev.write_memory(&[], 8).is_err());
        assert_eq!(&dev.memory()[6..], &[1, 2]);

        let mut out = [0u8; 2];
        dev.read_memory(&mut out, 6).unwrap();
        assert_eq!(out, [1, 2]);
        let mut out = [0u8; 4];
        assert!(dev.read_memory(&mut out, 7).is_err());
        assert_eq!(out, [0; 4]);

        dev.clear_memory();
        assert_eq!(dev.memory(), &[0xFF; 8]);
    }

    #[test]
    fn custom_size() {
        let dev = MemorySlave::with_size(RomCode::with_crc(MEMORY_FAMILY_CODE, [0; 6]), 32);
        assert_eq!(dev.size(), 32);
    }
}

//! Byte-level contracts between the protocol layer and the wire.
//!
//! Both sides are synchronous and blocking. A master may reset the bus at
//! any point; slave handlers see that as a failed `recv`/`send` and must
//! return without side effects.

use crate::error::BusError;
use crate::rom::RomCode;

/// Master side of the bus.
pub trait BusTransport {
    /// Issues a reset pulse. Returns whether any device answered with presence.
    fn reset(&mut self) -> Result<bool, BusError>;

    fn write_byte(&mut self, byte: u8) -> Result<(), BusError>;

    fn read_byte(&mut self) -> Result<u8, BusError>;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        for &b in bytes {
            self.write_byte(b)?;
        }
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), BusError> {
        for slot in buf.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(())
    }

    fn write_rom_code(&mut self, rom: &RomCode) -> Result<(), BusError> {
        self.write_bytes(rom.as_bytes())
    }
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    fn reset(&mut self) -> Result<bool, BusError> {
        (**self).reset()
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        (**self).write_byte(byte)
    }

    fn read_byte(&mut self) -> Result<u8, BusError> {
        (**self).read_byte()
    }
}

/// Slave side of the bus, as seen by a peripheral serving one transaction.
pub trait SlaveBus {
    /// Receives the next byte written by the master.
    fn recv(&mut self) -> Result<u8, BusError>;

    /// Transmits one byte during the master's next read slot.
    fn send(&mut self, byte: u8) -> Result<(), BusError>;

    fn recv_into(&mut self, buf: &mut [u8]) -> Result<(), BusError> {
        for slot in buf.iter_mut() {
            *slot = self.recv()?;
        }
        Ok(())
    }

    fn send_all(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        for &b in bytes {
            self.send(b)?;
        }
        Ok(())
    }

    /// Reports a command the addressed peripheral does not understand.
    fn raise_protocol_violation(&mut self, command: u8);
}

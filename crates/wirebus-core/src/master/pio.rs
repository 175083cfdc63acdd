//! PIO access commands for the two-channel switch (family 0x3A).

use log::{debug, error, warn};

use super::DeviceHandle;
use crate::commands::{PIO_ACCESS_READ, PIO_ACCESS_WRITE, PIO_ACK, PIO_TERMINATOR};
use crate::error::{Error, Result};
use crate::transport::BusTransport;

/// Decoded PIO ACCESS READ response.
///
/// Low nibble: A state, inverted A latch, B state, inverted B latch.
/// High nibble: complement of the low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PioStatus(pub u8);

impl PioStatus {
    /// Builds the response a device with the given pin levels would send.
    pub fn compose(state_a: bool, latch_a: bool, state_b: bool, latch_b: bool) -> Self {
        let mut low = 0u8;
        if state_a {
            low |= 0x01;
        }
        if !latch_a {
            low |= 0x02;
        }
        if state_b {
            low |= 0x04;
        }
        if !latch_b {
            low |= 0x08;
        }
        Self(low | (!low << 4))
    }

    pub fn state_a(&self) -> bool {
        self.0 & 0x01 != 0
    }

    pub fn latch_a(&self) -> bool {
        self.0 & 0x02 == 0
    }

    pub fn state_b(&self) -> bool {
        self.0 & 0x04 != 0
    }

    pub fn latch_b(&self) -> bool {
        self.0 & 0x08 == 0
    }

    pub fn is_consistent(&self) -> bool {
        (self.0 >> 4) == (!self.0 & 0x0F)
    }
}

impl DeviceHandle {
    /// Samples both PIO channels, returning the raw status byte.
    pub fn read_pio<B: BusTransport + ?Sized>(&self, bus: &mut B) -> Result<u8> {
        self.ensure_init()?;
        self.select(bus)?;
        bus.write_byte(PIO_ACCESS_READ)?;
        let value = bus.read_byte().map_err(|e| {
            error!("pio read from {} failed: {}", self.rom_code(), e);
            e
        })?;
        // terminate early
        bus.reset()?;

        let status = PioStatus(value);
        if self.use_crc() && !status.is_consistent() {
            warn!("pio status 0x{:02X} fails its self-check", value);
            return Err(Error::Integrity {
                expected: (!value & 0x0F) << 4 | (value & 0x0F),
                received: value,
            });
        }
        debug!("pio read {:02x} from {}", value, self.rom_code());
        Ok(value)
    }

    /// Drives the output latches: bit 0 requests latch A, bit 1 latch B.
    ///
    /// Data and its complement are both sent before the acknowledgement is
    /// read; only an exact `0xAA` counts as committed.
    pub fn write_pio<B: BusTransport + ?Sized>(&self, bus: &mut B, value: u8) -> Result<()> {
        self.ensure_init()?;
        self.select(bus)?;
        bus.write_byte(PIO_ACCESS_WRITE)?;
        bus.write_byte(value)?;
        bus.write_byte(!value)?;

        let ack = bus.read_byte().map_err(|e| {
            error!("pio write acknowledgement from {} unreadable: {}", self.rom_code(), e);
            e
        })?;
        if ack != PIO_ACK {
            error!("pio write to {} rejected: ack 0x{:02X}", self.rom_code(), ack);
            bus.reset()?;
            return Err(Error::Rejected { ack });
        }
        bus.write_byte(PIO_TERMINATOR)?;
        bus.reset()?;
        debug!("pio write {:02x} to {}", value, self.rom_code());
        Ok(())
    }
}

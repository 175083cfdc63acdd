use log::{debug, warn};

use super::SlaveDevice;
use crate::commands::{PIO_ACCESS_READ, PIO_ACCESS_WRITE, PIO_ACK};
use crate::error::{Error, Result};
use crate::master::pio::PioStatus;
use crate::rom::{RomCode, PIO_FAMILY_CODE};
use crate::transport::SlaveBus;

pub const CHANNEL_A: usize = 0;
pub const CHANNEL_B: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PioChannel {
    /// Sensed pin level, driven from outside.
    pub state: bool,
    /// Output latch, driven by PIO ACCESS WRITE.
    pub latch: bool,
}

/// Two-channel addressable switch.
#[derive(Debug, Clone)]
pub struct PioSlave {
    rom_code: RomCode,
    channels: [PioChannel; 2],
}

impl PioSlave {
    pub fn new(rom_code: RomCode) -> Self {
        Self {
            rom_code,
            channels: [PioChannel::default(); 2],
        }
    }

    /// Device with the PIO family code and the given serial.
    pub fn with_serial(serial: [u8; 6]) -> Self {
        Self::new(RomCode::with_crc(PIO_FAMILY_CODE, serial))
    }

    /// Sets the sensed level of a channel. Out-of-range channels are ignored.
    pub fn set_pin_state(&mut self, channel: usize, level: bool) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.state = level;
        }
    }

    pub fn pin_state(&self, channel: usize) -> bool {
        self.channels.get(channel).map_or(false, |ch| ch.state)
    }

    pub fn pin_latch(&self, channel: usize) -> bool {
        self.channels.get(channel).map_or(false, |ch| ch.latch)
    }

    pub fn channels(&self) -> &[PioChannel; 2] {
        &self.channels
    }

    pub fn status(&self) -> PioStatus {
        let [a, b] = self.channels;
        PioStatus::compose(a.state, a.latch, b.state, b.latch)
    }
}

impl SlaveDevice for PioSlave {
    fn rom_code(&self) -> &RomCode {
        &self.rom_code
    }

    fn duty(&mut self, bus: &mut dyn SlaveBus) -> Result<()> {
        let cmd = bus.recv()?;
        match cmd {
            PIO_ACCESS_WRITE => {
                let data = bus.recv()?;
                let complement = bus.recv()?;
                if data != !complement {
                    warn!("pio write: data {:02x} does not match complement {:02x}", data, complement);
                    return Err(Error::Integrity {
                        expected: !data,
                        received: complement,
                    });
                }
                self.channels[CHANNEL_A].latch = data & 0x01 != 0;
                self.channels[CHANNEL_B].latch = data & 0x02 != 0;
                debug!("pio latches set from {:02x}", data);
                bus.send(PIO_ACK)?;
            }
            PIO_ACCESS_READ => {
                let status = self.status();
                debug!("pio read = {:02x}", status.0);
                bus.send(status.0)?;
            }
            other => {
                bus.raise_protocol_violation(other);
                return Err(Error::UnknownCommand(other));
            }
        }
        Ok(())
    }
}

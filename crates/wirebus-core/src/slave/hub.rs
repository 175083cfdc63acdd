//! ROM layer shared by all emulated peripherals on one bus.

use log::{debug, trace, warn};

use super::{Peripheral, SlaveDevice};
use crate::commands::{MATCH_ROM, READ_ROM, SKIP_ROM};
use crate::error::{Error, Result};
use crate::rom::RomCode;
use crate::transport::SlaveBus;

#[derive(Debug, Default)]
pub struct Hub {
    devices: Vec<Peripheral>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a peripheral, returning its index.
    pub fn attach(&mut self, device: impl Into<Peripheral>) -> usize {
        self.devices.push(device.into());
        self.devices.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn devices(&self) -> &[Peripheral] {
        &self.devices
    }

    pub fn device(&self, index: usize) -> Option<&Peripheral> {
        self.devices.get(index)
    }

    pub fn device_mut(&mut self, index: usize) -> Option<&mut Peripheral> {
        self.devices.get_mut(index)
    }

    pub fn find(&self, rom: &RomCode) -> Option<usize> {
        self.devices.iter().position(|d| d.rom_code() == rom)
    }

    /// Serves one transaction, starting right after the presence pulse.
    ///
    /// Returns the index of the peripheral whose duty ran, if any. Errors
    /// from the duty are returned after the ROM layer selected the device.
    pub fn serve(&mut self, bus: &mut dyn SlaveBus) -> Result<Option<usize>> {
        let cmd = bus.recv()?;
        let selected = match cmd {
            SKIP_ROM => {
                if self.devices.len() == 1 {
                    Some(0)
                } else {
                    warn!("skip rom with {} devices attached", self.devices.len());
                    None
                }
            }
            MATCH_ROM => {
                let mut bytes = [0u8; RomCode::LEN];
                bus.recv_into(&mut bytes)?;
                let rom = RomCode::from(bytes);
                let found = self.find(&rom);
                if found.is_none() {
                    trace!("match rom {} is not ours", rom);
                }
                found
            }
            READ_ROM => {
                if let [only] = self.devices.as_slice() {
                    bus.send_all(only.rom_code().as_bytes())?;
                } else {
                    warn!("read rom with {} devices attached", self.devices.len());
                }
                return Ok(None);
            }
            other => {
                bus.raise_protocol_violation(other);
                return Err(Error::UnknownCommand(other));
            }
        };

        let Some(index) = selected else {
            return Ok(None);
        };
        debug!("device {} selected", self.devices[index].rom_code());
        self.devices[index].duty(bus)?;
        Ok(Some(index))
    }
}

//! Master-side drivers.
//!
//! A [`DeviceHandle`] carries everything needed to reach one peripheral;
//! the bus itself is borrowed for the duration of each call, so any number
//! of handles can share one transport.

pub mod memory;
pub mod pio;

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::commands::{MATCH_ROM, READ_ROM, SKIP_ROM};
use crate::crc::crc8;
use crate::error::{Error, Result};
use crate::rom::RomCode;
use crate::transport::BusTransport;

/// Caller-supplied addressing options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleConfig {
    /// The device is alone on the bus; address it with SKIP ROM.
    pub solo: bool,
    /// Also verify the PIO status self-check and the CRC of a ROM code read back.
    pub use_crc: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceHandle {
    rom_code: RomCode,
    use_crc: bool,
    solo: bool,
    initialized: bool,
}

impl DeviceHandle {
    /// Shorthand for `DeviceHandle::default()` followed by `init`.
    pub fn new(rom_code: RomCode) -> Self {
        Self {
            rom_code,
            initialized: true,
            ..Default::default()
        }
    }

    /// Binds the handle to a device. Must be called exactly once.
    pub fn init(&mut self, rom_code: RomCode) -> Result<()> {
        if self.initialized {
            error!("device handle for {} is already initialised", self.rom_code);
            return Err(Error::AlreadyInitialized);
        }
        self.rom_code = rom_code;
        self.use_crc = false;
        self.solo = false;
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn rom_code(&self) -> &RomCode {
        &self.rom_code
    }

    pub fn use_crc(&self) -> bool {
        self.use_crc
    }

    pub fn solo(&self) -> bool {
        self.solo
    }

    pub fn set_use_crc(&mut self, use_crc: bool) -> Result<()> {
        self.ensure_init()?;
        self.use_crc = use_crc;
        debug!("use_crc {}", use_crc);
        Ok(())
    }

    pub fn set_solo(&mut self, solo: bool) -> Result<()> {
        self.ensure_init()?;
        self.solo = solo;
        debug!("solo {}", solo);
        Ok(())
    }

    pub fn configure(&mut self, config: HandleConfig) -> Result<()> {
        self.set_solo(config.solo)?;
        self.set_use_crc(config.use_crc)
    }

    pub(crate) fn ensure_init(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            error!("device handle is not initialised");
            Err(Error::Uninitialized)
        }
    }

    /// Resets the bus and selects this device.
    ///
    /// Returns `Ok(false)` when nothing answered the reset; no further bytes
    /// are sent in that case.
    pub fn address_device<B: BusTransport + ?Sized>(&self, bus: &mut B) -> Result<bool> {
        self.ensure_init()?;
        if !bus.reset()? {
            error!("device {} not responding", self.rom_code);
            return Ok(false);
        }
        if self.solo {
            bus.write_byte(SKIP_ROM)?;
        } else {
            bus.write_byte(MATCH_ROM)?;
            bus.write_rom_code(&self.rom_code)?;
        }
        Ok(true)
    }

    /// Like [`address_device`](Self::address_device), but absence is an error.
    pub(crate) fn select<B: BusTransport + ?Sized>(&self, bus: &mut B) -> Result<()> {
        if self.address_device(bus)? {
            Ok(())
        } else {
            Err(Error::NotPresent)
        }
    }

    /// Reads the ROM code of the only device on the bus.
    pub fn read_rom<B: BusTransport + ?Sized>(&self, bus: &mut B) -> Result<RomCode> {
        self.ensure_init()?;
        if !bus.reset()? {
            error!("no device present for READ ROM");
            return Err(Error::NotPresent);
        }
        bus.write_byte(READ_ROM)?;
        let mut bytes = [0u8; RomCode::LEN];
        bus.read_bytes(&mut bytes)?;
        let rom = RomCode::from(bytes);
        if self.use_crc && !rom.is_valid() {
            return Err(Error::Integrity {
                expected: crc8(&bytes[..7]),
                received: rom.crc(),
            });
        }
        Ok(rom)
    }
}

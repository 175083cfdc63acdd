//! Slave-side peripheral emulations.
//!
//! A peripheral sits idle until the ROM layer selects it, then its `duty`
//! serves exactly one function command and returns. Any failure of the bus
//! mid-command ends the duty with the peripheral untouched.

pub mod hub;
pub mod memory;
pub mod pio;

pub use hub::Hub;
pub use memory::MemorySlave;
pub use pio::PioSlave;

use crate::error::Result;
use crate::rom::RomCode;
use crate::transport::SlaveBus;

/// Something that answers addressed transactions on the bus.
pub trait SlaveDevice {
    fn rom_code(&self) -> &RomCode;

    /// Serves one function command. Called right after the device was selected.
    fn duty(&mut self, bus: &mut dyn SlaveBus) -> Result<()>;
}

/// The peripheral kinds a [`Hub`] can host.
#[derive(Debug, Clone)]
pub enum Peripheral {
    Pio(PioSlave),
    Memory(MemorySlave),
}

impl Peripheral {
    pub fn as_pio(&self) -> Option<&PioSlave> {
        match self {
            Peripheral::Pio(dev) => Some(dev),
            _ => None,
        }
    }

    pub fn as_pio_mut(&mut self) -> Option<&mut PioSlave> {
        match self {
            Peripheral::Pio(dev) => Some(dev),
            _ => None,
        }
    }

    pub fn as_memory(&self) -> Option<&MemorySlave> {
        match self {
            Peripheral::Memory(dev) => Some(dev),
            _ => None,
        }
    }

    pub fn as_memory_mut(&mut self) -> Option<&mut MemorySlave> {
        match self {
            Peripheral::Memory(dev) => Some(dev),
            _ => None,
        }
    }
}

impl SlaveDevice for Peripheral {
    fn rom_code(&self) -> &RomCode {
        match self {
            Peripheral::Pio(dev) => dev.rom_code(),
            Peripheral::Memory(dev) => dev.rom_code(),
        }
    }

    fn duty(&mut self, bus: &mut dyn SlaveBus) -> Result<()> {
        match self {
            Peripheral::Pio(dev) => dev.duty(bus),
            Peripheral::Memory(dev) => dev.duty(bus),
        }
    }
}

impl From<PioSlave> for Peripheral {
    fn from(dev: PioSlave) -> Self {
        Peripheral::Pio(dev)
    }
}

impl From<MemorySlave> for Peripheral {
    fn from(dev: MemorySlave) -> Self {
        Peripheral::Memory(dev)
    }
}

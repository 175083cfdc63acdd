//! Core functionalities: command protocol, master drivers, slave emulations, bus transports.

pub mod commands;
pub mod crc;
pub mod error;
pub mod master;
pub mod rom;
pub mod slave;
pub mod trace;
pub mod transport;
pub mod uart_bus;
pub mod virtual_bus;

#[cfg(test)]
pub(crate) mod testing;

pub use crc::crc8;
pub use error::{BusError, Error, Result};
pub use master::{pio::PioStatus, DeviceHandle, HandleConfig};
pub use rom::{RomCode, MEMORY_FAMILY_CODE, PIO_FAMILY_CODE};
pub use slave::{Hub, MemorySlave, Peripheral, PioSlave, SlaveDevice};
pub use trace::{BusOp, TraceEntry, TraceStore, Traced};
pub use transport::{BusTransport, SlaveBus};
pub use uart_bus::{UartBus, UartConfig, UartLink};
pub use virtual_bus::{BusEvent, VirtualBus};

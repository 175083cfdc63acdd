use thiserror::Error;

/// Failures of the byte transport underneath the protocol.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus disconnected")]
    Disconnected,
    /// A reset pulse arrived while a transaction was still in flight.
    #[error("transaction interrupted by bus reset")]
    Interrupted,
    /// Master and slave were both driving the bus, or both listening.
    #[error("bus slot collision")]
    Collision,
    #[error("bus operation timed out")]
    Timeout,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("device handle is not initialised")]
    Uninitialized,
    #[error("device handle is already initialised")]
    AlreadyInitialized,
    #[error("no device answered the reset pulse")]
    NotPresent,
    #[error("transport failure: {0}")]
    Transport(#[from] BusError),
    /// A complement or CRC check did not hold.
    #[error("integrity check failed: expected 0x{expected:02X}, received 0x{received:02X}")]
    Integrity { expected: u8, received: u8 },
    #[error("peripheral rejected the command (acknowledgement 0x{ack:02X})")]
    Rejected { ack: u8 },
    #[error("unknown function command 0x{0:02X}")]
    UnknownCommand(u8),
    #[error("frame length {length} exceeds the maximum of {max}")]
    LengthOutOfRange { length: usize, max: usize },
    #[error("{length} bytes at offset {offset} do not fit a {size}-byte memory")]
    OutOfBounds {
        offset: usize,
        length: usize,
        size: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

//! Command codes shared by the master drivers and the slave emulations.

// ROM layer
pub const READ_ROM: u8 = 0x33;
pub const MATCH_ROM: u8 = 0x55;
pub const SKIP_ROM: u8 = 0xCC;

// PIO device functions
pub const PIO_ACCESS_WRITE: u8 = 0x5A;
pub const PIO_ACCESS_READ: u8 = 0xF5;

/// Reply of the PIO device once a write has been committed.
pub const PIO_ACK: u8 = 0xAA;
/// Sent by the master after a committed PIO write.
pub const PIO_TERMINATOR: u8 = 0xFF;

// Memory device functions
pub const READ_MEMORY: u8 = 0xF0;
pub const WRITE_MEMORY: u8 = 0x0F;
pub const WRITE_READ_MEMORY: u8 = 0xFF;

/// Value of a released bus during a read slot, and of an erased memory cell.
pub const IDLE_BYTE: u8 = 0xFF;

/// Largest frame length the one-byte length prefix can carry.
pub const MAX_FRAME_LEN: usize = u8::MAX as usize;

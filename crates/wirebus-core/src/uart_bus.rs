//! Master transport bit-banging the bus through a UART.
//!
//! TX and RX are joined through an open-drain buffer onto the data line, so
//! everything sent is read back as the line actually looked. A reset is one
//! 0xF0 byte at 9600 baud: a device pulling the line low during the upper
//! bits corrupts the echo, which is the presence pulse. At 115200 baud each
//! UART byte is one time slot: 0xFF writes a 1 (and samples the line for a
//! read), 0x00 writes a 0.

use log::{debug, trace};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;

use crate::error::BusError;
use crate::transport::BusTransport;

const RESET_BAUD: u32 = 9_600;
const DATA_BAUD: u32 = 115_200;
const RESET_PULSE: u8 = 0xF0;
const SLOT_ONE: u8 = 0xFF;
const SLOT_ZERO: u8 = 0x00;

/// A serial link whose speed can be switched between reset and data slots.
pub trait UartLink: Read + Write {
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), BusError>;

    /// Discards anything still waiting in the receive buffer.
    fn discard_input(&mut self) -> Result<(), BusError> {
        Ok(())
    }
}

impl UartLink for Box<dyn SerialPort> {
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), BusError> {
        SerialPort::set_baud_rate(self.as_mut(), baud_rate)?;
        Ok(())
    }

    fn discard_input(&mut self) -> Result<(), BusError> {
        self.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct UartConfig {
    pub port_name: String,
    pub timeout: Duration,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            timeout: Duration::from_millis(50),
        }
    }
}

pub struct UartBus<L> {
    link: L,
}

impl UartBus<Box<dyn SerialPort>> {
    pub fn open(cfg: &UartConfig) -> Result<Self, BusError> {
        let port = serialport::new(&cfg.port_name, DATA_BAUD)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(cfg.timeout)
            .open()?;
        debug!("uart bus opened on {}", cfg.port_name);
        Ok(Self::new(port))
    }
}

impl<L: UartLink> UartBus<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    pub fn into_inner(self) -> L {
        self.link
    }

    /// Sends the slots and returns what the line read back.
    fn exchange(&mut self, slots: &[u8; 8]) -> Result<[u8; 8], BusError> {
        self.link.write_all(slots)?;
        self.link.flush()?;
        let mut echo = [0u8; 8];
        self.link.read_exact(&mut echo).map_err(timeout_or_io)?;
        Ok(echo)
    }
}

fn timeout_or_io(e: std::io::Error) -> BusError {
    match e.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::UnexpectedEof => BusError::Timeout,
        _ => BusError::Io(e),
    }
}

impl<L: UartLink> BusTransport for UartBus<L> {
    fn reset(&mut self) -> Result<bool, BusError> {
        self.link.discard_input()?;
        self.link.set_baud_rate(RESET_BAUD)?;
        self.link.write_all(&[RESET_PULSE])?;
        self.link.flush()?;
        let mut echo = [0u8; 1];
        let read = self.link.read_exact(&mut echo).map_err(timeout_or_io);
        self.link.set_baud_rate(DATA_BAUD)?;
        read?;
        let presence = echo[0] != RESET_PULSE;
        trace!("reset echo {:02x}, presence {}", echo[0], presence);
        Ok(presence)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        let mut slots = [SLOT_ZERO; 8];
        for (bit, slot) in slots.iter_mut().enumerate() {
            if byte & (1 << bit) != 0 {
                *slot = SLOT_ONE;
            }
        }
        let echo = self.exchange(&slots)?;
        // a 1 slot that echoes low means someone else is driving the line
        if slots.iter().zip(echo.iter()).any(|(&s, &e)| s == SLOT_ONE && e != SLOT_ONE) {
            return Err(BusError::Collision);
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, BusError> {
        let echo = self.exchange(&[SLOT_ONE; 8])?;
        let byte = echo
            .iter()
            .enumerate()
            .fold(0u8, |acc, (bit, &e)| if e == SLOT_ONE { acc | (1 << bit) } else { acc });
        Ok(byte)
    }
}

//! In-process bus joining a master transport to a [`Hub`] of emulated peripherals.
//!
//! The hub runs on a worker thread. Master operations travel to it as
//! signals on one channel and the slave side answers on another, one reply
//! per reset, read slot or sync, so the master stays fully synchronous.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, trace};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::commands::IDLE_BYTE;
use crate::error::{BusError, Error};
use crate::rom::RomCode;
use crate::slave::{Hub, SlaveDevice};
use crate::transport::{BusTransport, SlaveBus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// A peripheral served a function command.
    Processed { device: usize, rom: RomCode },
    ProtocolViolation(u8),
    Error(String),
    Closed,
}

#[derive(Debug)]
enum Signal {
    Reset,
    Write(u8),
    ReadSlot,
    /// Host wants the hub; ends any transaction still in progress.
    Sync,
    Close,
}

#[derive(Debug)]
enum Reply {
    Presence(bool),
    Byte(u8),
    Synced,
}

pub struct VirtualBus {
    hub: Arc<Mutex<Hub>>,
    tx_signal: Sender<Signal>,
    rx_reply: Receiver<Reply>,
    rx_evt: Receiver<BusEvent>,
    worker: Option<JoinHandle<()>>,
}

impl VirtualBus {
    pub fn spawn(hub: Hub) -> Result<Self, BusError> {
        let (tx_signal, rx_signal) = unbounded::<Signal>();
        let (tx_reply, rx_reply) = unbounded::<Reply>();
        let (tx_evt, rx_evt) = unbounded::<BusEvent>();
        let hub = Arc::new(Mutex::new(hub));
        let worker_hub = Arc::clone(&hub);

        let worker = std::thread::Builder::new()
            .name("wirebus-slave".into())
            .spawn(move || {
                let mut link = SlaveLink {
                    rx: rx_signal,
                    tx: tx_reply,
                    events: tx_evt,
                    pending: None,
                    closed: false,
                };
                run(&worker_hub, &mut link);
                let _ = link.events.send(BusEvent::Closed);
            })?;

        Ok(Self {
            hub,
            tx_signal,
            rx_reply,
            rx_evt,
            worker: Some(worker),
        })
    }

    /// Waits until the worker has consumed everything sent so far.
    ///
    /// A transaction the master left unfinished is abandoned. Events of all
    /// completed transactions are queued once this returns.
    pub fn sync(&self) -> Result<(), BusError> {
        self.signal(Signal::Sync)?;
        match self.reply()? {
            Reply::Synced => Ok(()),
            _ => Err(BusError::Collision),
        }
    }

    /// Runs `f` on the hub between transactions.
    pub fn with_hub<R>(&self, f: impl FnOnce(&mut Hub) -> R) -> R {
        if let Err(e) = self.sync() {
            debug!("hub accessed without sync: {}", e);
        }
        f(&mut self.hub.lock())
    }

    pub fn hub(&self) -> Arc<Mutex<Hub>> {
        Arc::clone(&self.hub)
    }

    pub fn events(&self) -> &Receiver<BusEvent> {
        &self.rx_evt
    }

    /// Stops the worker and waits for it to exit.
    pub fn close(&mut self) {
        let _ = self.tx_signal.send(Signal::Close);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    /// Stops the worker and hands back the hub.
    pub fn into_hub(mut self) -> Option<Hub> {
        self.close();
        let hub = Arc::clone(&self.hub);
        drop(self);
        Arc::try_unwrap(hub).ok().map(Mutex::into_inner)
    }

    fn signal(&self, signal: Signal) -> Result<(), BusError> {
        self.tx_signal.send(signal).map_err(|_| BusError::Disconnected)
    }

    fn reply(&self) -> Result<Reply, BusError> {
        self.rx_reply.recv().map_err(|_| BusError::Disconnected)
    }
}

impl Drop for VirtualBus {
    fn drop(&mut self) {
        self.close();
    }
}

impl BusTransport for VirtualBus {
    fn reset(&mut self) -> Result<bool, BusError> {
        self.signal(Signal::Reset)?;
        match self.reply()? {
            Reply::Presence(present) => Ok(present),
            _ => Err(BusError::Collision),
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        self.signal(Signal::Write(byte))
    }

    fn read_byte(&mut self) -> Result<u8, BusError> {
        self.signal(Signal::ReadSlot)?;
        match self.reply()? {
            Reply::Byte(b) => Ok(b),
            _ => Err(BusError::Collision),
        }
    }
}

fn run(hub: &Mutex<Hub>, link: &mut SlaveLink) {
    while let Some(signal) = link.next_signal() {
        match signal {
            Signal::Reset => {
                let present = !hub.lock().is_empty();
                if link.reply(Reply::Presence(present)).is_err() {
                    break;
                }
                if !present {
                    continue;
                }
                // the hub stays free until the master starts talking
                let Some(first) = link.next_signal() else {
                    break;
                };
                if matches!(first, Signal::Sync) {
                    if link.reply(Reply::Synced).is_err() {
                        break;
                    }
                    continue;
                }
                link.pending = Some(first);

                let mut guard = hub.lock();
                let outcome = guard
                    .serve(link)
                    .map(|served| served.map(|i| (i, *guard.devices()[i].rom_code())));
                drop(guard);

                match outcome {
                    Ok(Some((device, rom))) => {
                        let _ = link.events.send(BusEvent::Processed { device, rom });
                    }
                    Ok(None) => {}
                    Err(Error::Transport(BusError::Interrupted)) => trace!("transaction cut short by reset"),
                    Err(Error::Transport(BusError::Disconnected)) => break,
                    Err(e) => {
                        debug!("transaction aborted: {}", e);
                        let _ = link.events.send(BusEvent::Error(e.to_string()));
                    }
                }
            }
            // nobody is driving the bus, the pull-up reads as ones
            Signal::ReadSlot => {
                if link.reply(Reply::Byte(IDLE_BYTE)).is_err() {
                    break;
                }
            }
            Signal::Sync => {
                if link.reply(Reply::Synced).is_err() {
                    break;
                }
            }
            Signal::Write(b) => trace!("idle bus ignored {:02x}", b),
            Signal::Close => break,
        }
        if link.closed {
            break;
        }
    }
}

/// Worker-side end of the bus handed to the hub and its peripherals.
struct SlaveLink {
    rx: Receiver<Signal>,
    tx: Sender<Reply>,
    events: Sender<BusEvent>,
    pending: Option<Signal>,
    closed: bool,
}

impl SlaveLink {
    fn next_signal(&mut self) -> Option<Signal> {
        if let Some(signal) = self.pending.take() {
            return Some(signal);
        }
        match self.rx.recv() {
            Ok(Signal::Close) | Err(_) => {
                self.closed = true;
                None
            }
            Ok(signal) => Some(signal),
        }
    }

    fn reply(&self, reply: Reply) -> Result<(), BusError> {
        self.tx.send(reply).map_err(|_| BusError::Disconnected)
    }

    /// Turns a signal that arrived at the wrong moment into the matching error.
    fn unexpected(&mut self, signal: Option<Signal>) -> BusError {
        match signal {
            Some(signal @ (Signal::Reset | Signal::Sync)) => {
                self.pending = Some(signal);
                BusError::Interrupted
            }
            Some(Signal::ReadSlot) => match self.reply(Reply::Byte(IDLE_BYTE)) {
                Ok(()) => BusError::Collision,
                Err(e) => e,
            },
            Some(Signal::Write(_)) => BusError::Collision,
            Some(Signal::Close) | None => BusError::Disconnected,
        }
    }
}

impl SlaveBus for SlaveLink {
    fn recv(&mut self) -> Result<u8, BusError> {
        match self.next_signal() {
            Some(Signal::Write(b)) => Ok(b),
            other => Err(self.unexpected(other)),
        }
    }

    fn send(&mut self, byte: u8) -> Result<(), BusError> {
        match self.next_signal() {
            Some(Signal::ReadSlot) => self.reply(Reply::Byte(byte)),
            other => Err(self.unexpected(other)),
        }
    }

    fn raise_protocol_violation(&mut self, command: u8) {
        debug!("protocol violation: command {:02x}", command);
        let _ = self.events.send(BusEvent::ProtocolViolation(command));
    }
}

mod config;

use anyhow::{bail, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;
use wirebus_core::{
    BusEvent, BusTransport, DeviceHandle, Hub, PioStatus, RomCode, SlaveDevice, TraceStore, Traced, UartBus, UartConfig,
    VirtualBus, MEMORY_FAMILY_CODE, PIO_FAMILY_CODE,
};

/// Runs a master polling loop against emulated peripherals, or real ones behind a UART.
#[derive(Parser)]
#[command(name = "wirebus-sim", version, about)]
struct Cli {
    /// JSON configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of polling rounds
    #[arg(short = 'n', long)]
    iterations: Option<u32>,

    /// Drive real devices through a UART adapter on this serial port
    /// instead of the simulated bus
    #[arg(short, long)]
    port: Option<String>,

    /// Address the only device with SKIP ROM
    #[arg(long)]
    solo: bool,

    /// Print the raw bus trace
    #[arg(long)]
    trace: bool,

    /// Print the decoded transactions as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Bytes the master reads back from each memory device per round.
const READ_LEN: usize = 7;

const TRACE_DEPTH: usize = 1 << 20;

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if cli.verbose {
        "debug"
    } else {
        "info"
    }))
    .init();

    let mut cfg = config::load(cli.config.as_deref())?;
    if let Some(n) = cli.iterations {
        cfg.iterations = n;
    }
    if cli.solo {
        cfg.handle.solo = true;
    }

    let mut hub = Hub::new();
    for device in &cfg.devices {
        hub.attach(device.build()?);
    }
    if cfg.handle.solo && hub.len() != 1 {
        bail!("solo addressing needs exactly one device, {} configured", hub.len());
    }

    let roms: Vec<RomCode> = hub.devices().iter().map(|d| *d.rom_code()).collect();
    let mut handles = Vec::with_capacity(roms.len());
    for rom in roms {
        let mut handle = DeviceHandle::new(rom);
        handle.configure(cfg.handle)?;
        info!("device {rom}");
        handles.push(handle);
    }

    let errors = match &cli.port {
        Some(port_name) => {
            let cfg_uart = UartConfig {
                port_name: port_name.clone(),
                ..UartConfig::default()
            };
            let mut bus = Traced::new(UartBus::open(&cfg_uart)?, TRACE_DEPTH);
            let errors = poll_loop(&mut bus, &handles, cfg.iterations, cfg.sample_period_ms, |_, _| {});
            report(&cli, bus.store())?;
            errors
        }
        None => {
            let mut bus = Traced::new(VirtualBus::spawn(hub)?, TRACE_DEPTH);
            let errors = poll_loop(&mut bus, &handles, cfg.iterations, cfg.sample_period_ms, |bus, round| {
                service_peripherals(bus.inner(), round)
            });
            report(&cli, bus.store())?;
            errors
        }
    };

    for (handle, count) in handles.iter().zip(&errors) {
        info!("{}: {} errors in {} rounds", handle.rom_code(), count, cfg.iterations);
    }
    Ok(())
}

/// Polls every handle once per round and returns the error count per handle.
fn poll_loop<B: BusTransport>(
    bus: &mut Traced<B>,
    handles: &[DeviceHandle],
    iterations: u32,
    sample_period_ms: u64,
    mut after_round: impl FnMut(&mut Traced<B>, u32),
) -> Vec<u32> {
    let mut errors = vec![0u32; handles.len()];
    for round in 0..iterations {
        for (i, handle) in handles.iter().enumerate() {
            if let Err(e) = poll_device(bus, handle, round) {
                errors[i] += 1;
                warn!("device {}: {} ({} errors)", handle.rom_code(), e, errors[i]);
            }
        }
        after_round(bus, round);
        if sample_period_ms > 0 {
            std::thread::sleep(Duration::from_millis(sample_period_ms));
        }
    }
    errors
}

fn report(cli: &Cli, store: &TraceStore) -> Result<()> {
    if cli.trace {
        print!("{}", store.to_text(false));
    }
    if cli.json {
        let transactions = wirebus_decode::decode(&store.ops());
        println!("{}", serde_json::to_string_pretty(&transactions)?);
    }
    Ok(())
}

/// One round of master traffic for a device, retried once like the firmware does.
fn poll_device<B: BusTransport>(bus: &mut B, handle: &DeviceHandle, round: u32) -> wirebus_core::Result<()> {
    match handle.rom_code().family() {
        PIO_FAMILY_CODE => {
            let value = (round & 0x03) as u8;
            handle.write_pio(bus, value).or_else(|_| handle.write_pio(bus, value))?;
            let status = PioStatus(handle.read_pio(bus)?);
            info!(
                "pio {}: A state {} latch {}, B state {} latch {}",
                handle.rom_code(),
                status.state_a(),
                status.latch_a(),
                status.state_b(),
                status.latch_b()
            );
        }
        MEMORY_FAMILY_CODE => {
            let command = [(round & 0x01) as u8];
            let mut readings = [0u8; READ_LEN];
            handle
                .write_read_memory(bus, &command, &mut readings)
                .or_else(|_| handle.write_read_memory(bus, &command, &mut readings))?;
            info!("memory {}: {}", handle.rom_code(), hex::encode(readings));
        }
        other => warn!("no driver for family {other:02x}"),
    }
    Ok(())
}

/// Application side of the emulated peripherals, run after each round.
///
/// PIO outputs are wired back to their inputs; memory devices expose the
/// received command on byte 0 and publish a round counter after it.
fn service_peripherals(bus: &VirtualBus, round: u32) {
    if let Err(e) = bus.sync() {
        warn!("bus worker unreachable: {e}");
        return;
    }
    let processed: Vec<usize> = bus
        .events()
        .try_iter()
        .filter_map(|event| match event {
            BusEvent::Processed { device, .. } => Some(device),
            BusEvent::ProtocolViolation(cmd) => {
                warn!("protocol violation {cmd:02x}");
                None
            }
            BusEvent::Error(e) => {
                warn!("slave error: {e}");
                None
            }
            BusEvent::Closed => None,
        })
        .collect();

    bus.with_hub(|hub| {
        for index in processed {
            let Some(device) = hub.device_mut(index) else {
                continue;
            };
            if let Some(pio) = device.as_pio_mut() {
                for channel in 0..2 {
                    let latch = pio.pin_latch(channel);
                    pio.set_pin_state(channel, latch);
                }
            } else if let Some(memory) = device.as_memory_mut() {
                let mut command = [0u8; 1];
                if memory.read_memory(&mut command, 0).is_ok() {
                    info!("output {} = {}", memory.rom_code(), command[0]);
                }
                let counter = [(round % 255) as u8];
                if let Err(e) = memory.write_memory(&counter, 1) {
                    warn!("publishing counter: {e}");
                }
            }
        }
    });
}

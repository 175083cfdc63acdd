use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use wirebus_core::{HandleConfig, MemorySlave, Peripheral, PioSlave, RomCode, MEMORY_FAMILY_CODE, PIO_FAMILY_CODE};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceConfig {
    Pio {
        /// Six serial bytes as hex, e.g. "010203040506".
        serial: String,
    },
    Memory {
        serial: String,
        #[serde(default = "default_memory_size")]
        size: usize,
    },
}

fn default_memory_size() -> usize {
    MemorySlave::DEFAULT_SIZE
}

fn parse_serial(serial: &str) -> Result<[u8; 6]> {
    let bytes = hex::decode(serial.trim()).with_context(|| format!("invalid serial {serial:?}"))?;
    match <[u8; 6]>::try_from(bytes.as_slice()) {
        Ok(serial) => Ok(serial),
        Err(_) => bail!("serial {serial:?} must be 6 bytes, got {}", bytes.len()),
    }
}

impl DeviceConfig {
    pub fn build(&self) -> Result<Peripheral> {
        Ok(match self {
            DeviceConfig::Pio { serial } => {
                PioSlave::new(RomCode::with_crc(PIO_FAMILY_CODE, parse_serial(serial)?)).into()
            }
            DeviceConfig::Memory { serial, size } => {
                if *size == 0 {
                    bail!("memory device {serial} needs a non-zero size");
                }
                MemorySlave::with_size(RomCode::with_crc(MEMORY_FAMILY_CODE, parse_serial(serial)?), *size).into()
            }
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub handle: HandleConfig,
    pub iterations: u32,
    pub sample_period_ms: u64,
    pub devices: Vec<DeviceConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            handle: HandleConfig {
                solo: false,
                use_crc: true,
            },
            iterations: 16,
            sample_period_ms: 0,
            devices: vec![
                DeviceConfig::Pio {
                    serial: "010203040506".into(),
                },
                DeviceConfig::Memory {
                    serial: "091011121314".into(),
                    size: MemorySlave::DEFAULT_SIZE,
                },
            ],
        }
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("wirebus").join("sim.json"))
}

/// Loads `path`, or the default location if it exists, or built-in defaults.
pub fn load(path: Option<&Path>) -> Result<SimConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(SimConfig::default()),
        },
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let cfg = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    log::debug!("loaded config from {}", path.display());
    Ok(cfg)
}

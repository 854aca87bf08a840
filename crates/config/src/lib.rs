// LabWired Harness - Armv8-M Device Bus Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default RAM window: 1 MiB at address zero, so the image's vector table
/// lands where the core expects it after reset.
pub const DEFAULT_RAM_BASE: u64 = 0x0000_0000;
pub const DEFAULT_RAM_SIZE: u64 = 0x0010_0000;
pub const DEFAULT_CONSOLE_BASE: u64 = 0x4000_0000;

/// Upper bound on configurable RAM; the whole region is allocated up front.
pub const MAX_RAM_SIZE: u64 = 512 * 1024 * 1024;

/// Size of the address window reserved for the console device.
pub const CONSOLE_SPAN: u64 = 0x1000;

/// VTOR ignores bits [6:0].
pub const VECTOR_TABLE_ALIGN: u32 = 0x80;

/// Initial SP and reset vector, read at reset.
pub const VECTOR_TABLE_MIN_SIZE: u64 = 8;

/// The core addresses 32 bits.
pub const ADDRESS_SPACE_END: u64 = 1 << 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("RAM size must be greater than zero")]
    EmptyRam,
    #[error("RAM size {0:#x} exceeds the supported maximum of 512 MiB")]
    RamTooLarge(u64),
    #[error("console window {console:#x} overlaps RAM {ram_base:#x}..{ram_end:#x}")]
    Overlap {
        console: u64,
        ram_base: u64,
        ram_end: u64,
    },
    #[error("vector table {0:#x} is not aligned to 128 bytes")]
    MisalignedVectorTable(u32),
    #[error("RAM {base:#x}..{end:#x} lies outside the 32-bit address space")]
    RamOutsideAddressSpace { base: u64, end: u64 },
    #[error("vector table {0:#x} does not fit inside RAM")]
    VectorTableOutsideRam(u32),
}

/// A size given either as a plain byte count or a human string such as "64 KiB".
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum SizeSpec {
    Bytes(u64),
    Text(String),
}

impl SizeSpec {
    pub fn bytes(&self) -> Result<u64> {
        match self {
            SizeSpec::Bytes(n) => Ok(*n),
            SizeSpec::Text(s) => parse_size(s),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MemoryRange {
    pub base: u64,
    pub size: SizeSpec,
}

impl Default for MemoryRange {
    fn default() -> Self {
        Self {
            base: DEFAULT_RAM_BASE,
            size: SizeSpec::Bytes(DEFAULT_RAM_SIZE),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConsoleRange {
    pub base: u64,
}

impl Default for ConsoleRange {
    fn default() -> Self {
        Self {
            base: DEFAULT_CONSOLE_BASE,
        }
    }
}

/// Memory map and reset parameters for one harness run.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    #[serde(default)]
    pub ram: MemoryRange,
    #[serde(default)]
    pub console: ConsoleRange,
    /// Initial secure vector table address. Defaults to the RAM base.
    #[serde(default)]
    pub vector_table: Option<u32>,
}

/// The resolved, validated form of [`HarnessConfig`] consumed by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMap {
    pub ram_base: u64,
    pub ram_size: u64,
    pub console_base: u64,
    pub vector_table: u32,
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self {
            ram_base: DEFAULT_RAM_BASE,
            ram_size: DEFAULT_RAM_SIZE,
            console_base: DEFAULT_CONSOLE_BASE,
            vector_table: DEFAULT_RAM_BASE as u32,
        }
    }
}

impl HarnessConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open harness config at {:?}", path.as_ref()))?;
        serde_yaml::from_reader(f).context("Failed to parse harness config YAML")
    }

    pub fn ram_size(&self) -> Result<u64> {
        self.ram.size.bytes()
    }

    /// Validates the configuration and resolves it into a [`MemoryMap`].
    pub fn memory_map(&self) -> Result<MemoryMap> {
        let ram_base = self.ram.base;
        let ram_size = self.ram_size()?;

        if ram_size == 0 {
            return Err(ConfigError::EmptyRam.into());
        }
        if ram_size > MAX_RAM_SIZE {
            return Err(ConfigError::RamTooLarge(ram_size).into());
        }

        let ram_end = ram_base.saturating_add(ram_size);
        if ram_end > ADDRESS_SPACE_END {
            return Err(ConfigError::RamOutsideAddressSpace {
                base: ram_base,
                end: ram_end,
            }
            .into());
        }
        let console = self.console.base;
        let console_end = console.saturating_add(CONSOLE_SPAN);
        if console < ram_end && ram_base < console_end {
            return Err(ConfigError::Overlap {
                console,
                ram_base,
                ram_end,
            }
            .into());
        }

        let vector_table = self.vector_table.unwrap_or(ram_base as u32);
        if vector_table % VECTOR_TABLE_ALIGN != 0 {
            return Err(ConfigError::MisalignedVectorTable(vector_table).into());
        }
        let vt = vector_table as u64;
        if vt < ram_base || vt + VECTOR_TABLE_MIN_SIZE > ram_end {
            return Err(ConfigError::VectorTableOutsideRam(vector_table).into());
        }

        Ok(MemoryMap {
            ram_base,
            ram_size,
            console_base: console,
            vector_table,
        })
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}

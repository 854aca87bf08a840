// LabWired Harness - Armv8-M Device Bus Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod control;
pub mod cpu;
pub mod inspect;
pub mod interrupt;
pub mod memory;
pub mod monitor;
pub mod peripherals;
pub mod signals;
pub mod snapshot;

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use bitflags::bitflags;
use harness_config::{MemoryMap, CONSOLE_SPAN};

use crate::bus::{AddressRange, DeviceId, DeviceTable, SystemBus};
use crate::memory::MemoryDevice;
use crate::monitor::GlobalMonitor;
use crate::peripherals::console::ConsoleOutputDevice;
use crate::snapshot::{CpuSnapshot, ProtectionSnapshot};


#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SimulationError {
    #[error("Bus fault: {direction} of {width} at {addr:#010x}")]
    BusFault {
        addr: u64,
        width: Width,
        direction: Direction,
    },
    #[error("Access of {width} at {addr:#010x} outside device range {range}")]
    OutOfRange {
        addr: u64,
        width: Width,
        range: AddressRange,
    },
    #[error("Image of {len} bytes exceeds RAM capacity of {capacity} bytes")]
    ImageTooLarge { len: usize, capacity: usize },
    #[error("Range {new} for {name} overlaps {existing}")]
    OverlappingRange {
        name: &'static str,
        new: AddressRange,
        existing: AddressRange,
    },
    #[error("Address range must not be empty (base {0:#x})")]
    InvalidRange(u64),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Access width of a single load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Half,
    Word,
}

impl Width {
    /// Converts a raw byte count coming from the engine.
    ///
    /// Anything other than 1, 2 or 4 means the caller is broken; this panics
    /// and the workspace profile turns that into an abort.
    pub fn from_bytes(bytes: usize) -> Self {
        match bytes {
            1 => Width::Byte,
            2 => Width::Half,
            4 => Width::Word,
            other => panic!("invalid bus access width: {} bytes", other),
        }
    }

    pub const fn bytes(self) -> usize {
        match self {
            Width::Byte => 1,
            Width::Half => 2,
            Width::Word => 4,
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-byte", self.bytes())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Load,
    Store,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Load => f.write_str("load"),
            Direction::Store => f.write_str("store"),
        }
    }
}

/// Trait representing a memory-mapped device.
///
/// Devices receive absolute bus addresses; the bus has already decided the
/// address belongs to them.
pub trait Device: fmt::Debug + Send {
    fn load(&mut self, addr: u64, width: Width) -> SimResult<u32>;
    fn store(&mut self, addr: u64, width: Width, value: u32) -> SimResult<()>;
}

/// Trait representing the address space the engine issues accesses against.
pub trait Bus {
    fn load(&mut self, addr: u64, width: Width) -> SimResult<u32>;
    fn store(&mut self, addr: u64, width: Width, value: u32) -> SimResult<()>;

    fn read_u8(&mut self, addr: u64) -> SimResult<u8> {
        Ok(self.load(addr, Width::Byte)? as u8)
    }

    fn read_u16(&mut self, addr: u64) -> SimResult<u16> {
        Ok(self.load(addr, Width::Half)? as u16)
    }

    fn read_u32(&mut self, addr: u64) -> SimResult<u32> {
        self.load(addr, Width::Word)
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        self.store(addr, Width::Byte, value as u32)
    }

    fn write_u16(&mut self, addr: u64, value: u16) -> SimResult<()> {
        self.store(addr, Width::Half, value as u32)
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        self.store(addr, Width::Word, value)
    }
}

bitflags! {
    /// Reasons the engine handed control back after a step.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExitCause: u32 {
        const WAIT_FOR_INTERRUPT = 1 << 0;
        const SLEEP_ON_EXIT = 1 << 1;
        const LOCKUP = 1 << 2;
        const BREAKPOINT = 1 << 3;
    }
}

impl ExitCause {
    /// True when the core has nothing to do until an interrupt arrives.
    pub fn is_sleeping(self) -> bool {
        self.intersects(ExitCause::WAIT_FOR_INTERRUPT | ExitCause::SLEEP_ON_EXIT)
    }
}

/// Construction record for an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Initial secure VTOR.
    pub vector_table: u32,
}

/// The CPU simulation engine driven by the control loop.
///
/// Instruction execution, exception handling and protection checks all live
/// behind this trait. The bus is lent to the engine for the duration of each
/// call because the control loop owns the [`Machine`].
pub trait Engine {
    fn create(config: EngineConfig, monitor: Arc<GlobalMonitor>) -> Self
    where
        Self: Sized;
    fn reset(&mut self, bus: &mut dyn Bus) -> SimResult<()>;
    /// Executes one top-level step.
    fn step(&mut self, bus: &mut dyn Bus);
    /// Exit causes recorded by the most recent step.
    fn exit_cause(&self) -> ExitCause;
    /// Blocks until an external interrupt arrives.
    fn wait_for_interrupt(&mut self);
    fn cpu_snapshot(&self) -> CpuSnapshot;
    fn protection_snapshot(&self) -> ProtectionSnapshot;
}

/// The devices owned by a [`Machine`], addressed by [`DeviceId`].
#[derive(Debug)]
pub struct Devices {
    pub ram: MemoryDevice,
    pub console: ConsoleOutputDevice,
}

impl DeviceTable for Devices {
    fn device_mut(&mut self, id: DeviceId) -> &mut dyn Device {
        match id {
            DeviceId::Ram => &mut self.ram,
            DeviceId::Console => &mut self.console,
        }
    }
}

/// One fixed memory map: RAM, the console window, and nothing else.
#[derive(Debug)]
pub struct Machine {
    pub bus: SystemBus,
    pub devices: Devices,
}

impl Machine {
    pub fn new(map: &MemoryMap, console_out: Box<dyn Write + Send>) -> SimResult<Self> {
        let ram_range = AddressRange::new(map.ram_base, map.ram_size)?;
        let console_range = AddressRange::new(map.console_base, CONSOLE_SPAN)?;

        let mut bus = SystemBus::new();
        bus.attach("ram", ram_range, DeviceId::Ram)?;
        bus.attach("console", console_range, DeviceId::Console)?;

        Ok(Self {
            bus,
            devices: Devices {
                ram: MemoryDevice::new(ram_range),
                console: ConsoleOutputDevice::new(console_out),
            },
        })
    }

    /// Machine with the default memory map and console output on stdout.
    pub fn with_stdout(map: &MemoryMap) -> SimResult<Self> {
        Self::new(map, Box::new(std::io::stdout()))
    }

    pub fn resolve(&self, addr: u64) -> Option<DeviceId> {
        self.bus.decode(addr)
    }

    pub fn ram(&self) -> &MemoryDevice {
        &self.devices.ram
    }

    /// Privileged access for loading the program image before the first step.
    pub fn ram_mut(&mut self) -> &mut MemoryDevice {
        &mut self.devices.ram
    }

    pub fn console(&self) -> &ConsoleOutputDevice {
        &self.devices.console
    }
}

impl Bus for Machine {
    fn load(&mut self, addr: u64, width: Width) -> SimResult<u32> {
        self.bus.load(&mut self.devices, addr, width)
    }

    fn store(&mut self, addr: u64, width: Width, value: u32) -> SimResult<()> {
        self.bus.store(&mut self.devices, addr, width, value)
    }
}

// LabWired Harness - Armv8-M Device Bus Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::fmt;

use crate::{Device, Direction, SimResult, SimulationError, Width};

/// A non-empty `[base, base + length)` window of the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    base: u64,
    length: u64,
}

impl AddressRange {
    pub fn new(base: u64, length: u64) -> SimResult<Self> {
        if length == 0 {
            return Err(SimulationError::InvalidRange(base));
        }
        Ok(Self { base, length })
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr - self.base < self.length
    }

    /// True if every byte of a `width` access starting at `addr` is inside.
    pub fn contains_span(&self, addr: u64, width: Width) -> bool {
        self.contains(addr) && (addr - self.base) + width.bytes() as u64 <= self.length
    }

    pub fn overlaps(&self, other: &AddressRange) -> bool {
        self.contains(other.base) || other.contains(self.base)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:#010x}, {:#010x})",
            self.base,
            self.base as u128 + self.length as u128
        )
    }
}

/// Handle to one of the machine's devices. The device set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceId {
    Ram,
    Console,
}

/// Gives the bus access to devices it routes to but does not own.
pub trait DeviceTable {
    fn device_mut(&mut self, id: DeviceId) -> &mut dyn Device;
}

#[derive(Debug, Clone)]
pub struct Mapping {
    pub name: &'static str,
    pub range: AddressRange,
    pub device: DeviceId,
}

/// Routes each access to the first mapping whose range contains the address.
#[derive(Debug, Default)]
pub struct SystemBus {
    mappings: Vec<Mapping>,
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device window. Ranges must be disjoint.
    pub fn attach(
        &mut self,
        name: &'static str,
        range: AddressRange,
        device: DeviceId,
    ) -> SimResult<()> {
        if let Some(existing) = self.mappings.iter().find(|m| m.range.overlaps(&range)) {
            return Err(SimulationError::OverlappingRange {
                name,
                new: range,
                existing: existing.range,
            });
        }
        tracing::debug!("Bus: mapped {} at {}", name, range);
        self.mappings.push(Mapping {
            name,
            range,
            device,
        });
        Ok(())
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn decode(&self, addr: u64) -> Option<DeviceId> {
        self.mappings
            .iter()
            .find(|m| m.range.contains(addr))
            .map(|m| m.device)
    }

    pub fn load(
        &self,
        devices: &mut dyn DeviceTable,
        addr: u64,
        width: Width,
    ) -> SimResult<u32> {
        let Some(id) = self.decode(addr) else {
            tracing::warn!("Bus fault: {} load at {:#010x}", width, addr);
            return Err(SimulationError::BusFault {
                addr,
                width,
                direction: Direction::Load,
            });
        };
        let value = devices.device_mut(id).load(addr, width)?;
        tracing::trace!("{:?} load {} [{:#010x}] -> {:#x}", id, width, addr, value);
        Ok(value)
    }

    pub fn store(
        &self,
        devices: &mut dyn DeviceTable,
        addr: u64,
        width: Width,
        value: u32,
    ) -> SimResult<()> {
        let Some(id) = self.decode(addr) else {
            tracing::warn!(
                "Bus fault: {} store at {:#010x}, value {:#x}",
                width,
                addr,
                value
            );
            return Err(SimulationError::BusFault {
                addr,
                width,
                direction: Direction::Store,
            });
        };
        devices.device_mut(id).store(addr, width, value)?;
        tracing::trace!("{:?} store {} [{:#010x}] <- {:#x}", id, width, addr, value);
        Ok(())
    }
}

// LabWired Harness - Armv8-M Device Bus Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::AddressRange;
use crate::{Device, Direction, SimResult, SimulationError, Width};

/// Flat little-endian RAM covering exactly one address range.
#[derive(Debug)]
pub struct MemoryDevice {
    range: AddressRange,
    data: Vec<u8>,
}

impl MemoryDevice {
    pub fn new(range: AddressRange) -> Self {
        Self {
            range,
            data: vec![0; range.length() as usize],
        }
    }

    pub fn range(&self) -> AddressRange {
        self.range
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Copies `image` verbatim to offset 0, skipping all access checks.
    /// Only used once, before the first step.
    pub fn load_image(&mut self, image: &[u8]) -> SimResult<()> {
        if image.len() > self.data.len() {
            return Err(SimulationError::ImageTooLarge {
                len: image.len(),
                capacity: self.data.len(),
            });
        }
        self.data[..image.len()].copy_from_slice(image);
        Ok(())
    }

    fn offset_of(&self, addr: u64, width: Width) -> Option<usize> {
        self.range
            .contains_span(addr, width)
            .then(|| (addr - self.range.base()) as usize)
    }

    fn out_of_range(
        &self,
        addr: u64,
        width: Width,
        direction: Direction,
        value: Option<u32>,
    ) -> SimulationError {
        match value {
            Some(value) => tracing::warn!(
                "RAM fault: {} {} at {:#010x}, value {:#x}, outside {}",
                width,
                direction,
                addr,
                value,
                self.range
            ),
            None => tracing::warn!(
                "RAM fault: {} {} at {:#010x} outside {}",
                width,
                direction,
                addr,
                self.range
            ),
        }
        SimulationError::OutOfRange {
            addr,
            width,
            range: self.range,
        }
    }
}

impl Device for MemoryDevice {
    fn load(&mut self, addr: u64, width: Width) -> SimResult<u32> {
        let offset = self
            .offset_of(addr, width)
            .ok_or_else(|| self.out_of_range(addr, width, Direction::Load, None))?;
        let n = width.bytes();
        let mut bytes = [0u8; 4];
        bytes[..n].copy_from_slice(&self.data[offset..offset + n]);
        Ok(u32::from_le_bytes(bytes))
    }

    fn store(&mut self, addr: u64, width: Width, value: u32) -> SimResult<()> {
        let offset = self
            .offset_of(addr, width)
            .ok_or_else(|| self.out_of_range(addr, width, Direction::Store, Some(value)))?;
        let n = width.bytes();
        self.data[offset..offset + n].copy_from_slice(&value.to_le_bytes()[..n]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ram(base: u64, len: u64) -> MemoryDevice {
        MemoryDevice::new(AddressRange::new(base, len).unwrap())
    }

    #[test]
    fn test_zero_initialized() {
        let mem = ram(0x2000_0000, 64);
        assert_eq!(mem.capacity(), 64);
        assert!(mem.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_little_endian_layout() {
        let mut mem = ram(0x2000_0000, 16);
        mem.store(0x2000_0000, Width::Word, 0xDEAD_BEEF).unwrap();
        assert_eq!(&mem.as_slice()[..4], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(mem.load(0x2000_0000, Width::Byte).unwrap(), 0xEF);
        assert_eq!(mem.load(0x2000_0002, Width::Half).unwrap(), 0xDEAD);
    }

    #[test]
    fn test_unaligned_access() {
        let mut mem = ram(0, 16);
        mem.store(3, Width::Word, 0x1122_3344).unwrap();
        assert_eq!(mem.load(3, Width::Word).unwrap(), 0x1122_3344);
        assert_eq!(mem.load(5, Width::Half).unwrap(), 0x1122);
    }

    #[test]
    fn test_narrow_store_truncates_value() {
        let mut mem = ram(0, 8);
        mem.store(0, Width::Byte, 0xABCD).unwrap();
        assert_eq!(mem.load(0, Width::Half).unwrap(), 0x00CD);
    }

    #[test]
    fn test_below_base_faults() {
        let mut mem = ram(0x100, 16);
        assert!(matches!(
            mem.load(0xFF, Width::Byte),
            Err(SimulationError::OutOfRange { addr: 0xFF, .. })
        ));
    }

    #[test]
    fn test_straddling_end_faults_without_mutation() {
        let mut mem = ram(0x100, 16);
        assert!(mem.store(0x10E, Width::Word, 0xFFFF_FFFF).is_err());
        assert!(mem.load(0x10F, Width::Half).is_err());
        assert!(mem.as_slice().iter().all(|&b| b == 0));
        // last byte is still reachable
        mem.store(0x10F, Width::Byte, 0x5A).unwrap();
        assert_eq!(mem.load(0x10C, Width::Word).unwrap(), 0x5A00_0000);
    }

    #[test]
    fn test_load_image() {
        let mut mem = ram(0, 8);
        mem.load_image(&[1, 2, 3]).unwrap();
        assert_eq!(mem.as_slice(), &[1, 2, 3, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_load_image_exact_capacity() {
        let mut mem = ram(0, 4);
        mem.load_image(&[9; 4]).unwrap();
        assert_eq!(mem.load(0, Width::Word).unwrap(), 0x0909_0909);
    }

    #[test]
    fn test_load_image_too_large() {
        let mut mem = ram(0, 4);
        let err = mem.load_image(&[1; 5]).unwrap_err();
        assert_eq!(
            err,
            SimulationError::ImageTooLarge {
                len: 5,
                capacity: 4
            }
        );
        assert!(mem.as_slice().iter().all(|&b| b == 0));
    }
}

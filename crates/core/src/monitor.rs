// LabWired Harness - Armv8-M Device Bus Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::{Mutex, PoisonError};

use crate::Width;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Reservation {
    addr: u64,
    len: u64,
}

/// Global exclusive-access monitor shared with the engine.
///
/// Tracks at most one reservation, which is enough for a single core.
#[derive(Debug, Default)]
pub struct GlobalMonitor {
    reservation: Mutex<Option<Reservation>>,
}

impl GlobalMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Option<Reservation>) -> R) -> R {
        let mut guard = self.reservation.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Load-exclusive: reserve `[addr, addr + width)`.
    pub fn mark_exclusive(&self, addr: u64, width: Width) {
        self.with(|r| {
            *r = Some(Reservation {
                addr,
                len: width.bytes() as u64,
            })
        });
    }

    pub fn is_exclusive(&self, addr: u64, width: Width) -> bool {
        self.with(|r| match r {
            Some(res) => res.addr == addr && res.len == width.bytes() as u64,
            None => false,
        })
    }

    /// Store-exclusive: succeeds only against a matching reservation, which is
    /// consumed either way.
    pub fn store_exclusive(&self, addr: u64, width: Width) -> bool {
        self.with(|r| {
            let ok = matches!(r, Some(res) if res.addr == addr && res.len == width.bytes() as u64);
            *r = None;
            ok
        })
    }

    /// A plain store clears a reservation it overlaps.
    pub fn observe_store(&self, addr: u64, width: Width) {
        self.with(|r| {
            if let Some(res) = r {
                let end = addr + width.bytes() as u64;
                if addr < res.addr + res.len && res.addr < end {
                    *r = None;
                }
            }
        });
    }

    /// CLREX, exception entry/return, reset.
    pub fn clear(&self) {
        self.with(|r| *r = None);
    }
}

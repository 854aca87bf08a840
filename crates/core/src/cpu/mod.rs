// LabWired Harness - Armv8-M Device Bus Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::Arc;

use crate::interrupt::InterruptLine;
use crate::monitor::GlobalMonitor;
use crate::snapshot::{
    BankedRegisters, CpuSnapshot, MpuSnapshot, ProtectionSnapshot, RegionDescriptor,
    SauSnapshot, SecurityState,
};
use crate::{Bus, Engine, EngineConfig, ExitCause, SimResult};

const WFI: u16 = 0xBF30;
const WFE: u16 = 0xBF20;
const HARDFAULT: u16 = 3;
const MPU_REGIONS: usize = 8;
const SAU_REGIONS: usize = 8;
/// xPSR.T
const THUMB_BIT: u32 = 1 << 24;

/// Placeholder core used when no simulation engine is linked in.
///
/// It performs the reset sequence against the vector table and walks the
/// image one halfword at a time, reporting `WFI`/`WFE` as wait-for-interrupt.
/// Nothing is executed. A failed fetch pends a HardFault and the core locks up.
#[derive(Debug)]
pub struct StubCore {
    config: EngineConfig,
    monitor: Arc<GlobalMonitor>,
    irq: Arc<InterruptLine>,
    registers: [u32; 16],
    secure: BankedRegisters,
    xpsr: u32,
    pending: Vec<u16>,
    exit: ExitCause,
}

impl StubCore {
    /// The line `wait_for_interrupt` blocks on.
    pub fn interrupt_line(&self) -> Arc<InterruptLine> {
        self.irq.clone()
    }

    pub fn pc(&self) -> u32 {
        self.registers[15]
    }
}

impl Engine for StubCore {
    fn create(config: EngineConfig, monitor: Arc<GlobalMonitor>) -> Self {
        Self {
            config,
            monitor,
            irq: Arc::new(InterruptLine::new()),
            registers: [0; 16],
            secure: BankedRegisters::default(),
            xpsr: 0,
            pending: Vec::new(),
            exit: ExitCause::empty(),
        }
    }

    fn reset(&mut self, bus: &mut dyn Bus) -> SimResult<()> {
        let vtor = self.config.vector_table as u64;
        let sp = bus.read_u32(vtor)?;
        let pc = bus.read_u32(vtor + 4)?;

        self.registers = [0; 16];
        self.registers[13] = sp;
        self.registers[14] = 0xFFFF_FFFF;
        self.registers[15] = pc & !1;
        self.secure = BankedRegisters {
            msp: sp,
            ..Default::default()
        };
        self.xpsr = THUMB_BIT;
        self.pending.clear();
        self.exit = ExitCause::empty();
        self.monitor.clear();

        tracing::info!(
            "Reset: VTOR={:#010x} SP={:#010x} PC={:#010x}",
            vtor,
            sp,
            self.registers[15]
        );
        Ok(())
    }

    fn step(&mut self, bus: &mut dyn Bus) {
        self.exit = ExitCause::empty();
        if self.pending.contains(&HARDFAULT) {
            // locked up; nothing takes the fault
            return;
        }
        let pc = self.registers[15];
        match bus.read_u16(pc as u64) {
            Ok(opcode) => {
                tracing::debug!("PC={:#010x} Op={:#06x}", pc, opcode);
                if opcode == WFI || opcode == WFE {
                    self.exit |= ExitCause::WAIT_FOR_INTERRUPT;
                }
                self.registers[15] = pc.wrapping_add(2);
            }
            Err(e) => {
                tracing::debug!("Fetch failed at {:#010x}: {}", pc, e);
                self.pending.push(HARDFAULT);
                self.exit |= ExitCause::LOCKUP;
            }
        }
    }

    fn exit_cause(&self) -> ExitCause {
        self.exit
    }

    fn wait_for_interrupt(&mut self) {
        self.irq.wait();
        self.monitor.clear();
    }

    fn cpu_snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            registers: self.registers,
            security: SecurityState::Secure,
            pending_exceptions: self.pending.clone(),
            active_exceptions: Vec::new(),
            secure: self.secure,
            non_secure: BankedRegisters::default(),
            xpsr: self.xpsr,
            fpscr: 0,
        }
    }

    fn protection_snapshot(&self) -> ProtectionSnapshot {
        let mpu = MpuSnapshot {
            regions: vec![RegionDescriptor::default(); MPU_REGIONS],
            ..Default::default()
        };
        ProtectionSnapshot {
            mpu_secure: mpu.clone(),
            mpu_non_secure: mpu,
            sau: SauSnapshot {
                ctrl: 0,
                regions: vec![RegionDescriptor::default(); SAU_REGIONS],
            },
        }
    }
}

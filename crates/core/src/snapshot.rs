// LabWired Harness - Armv8-M Device Bus Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Read-only views of engine state, as printed by the inspection console and
//! written by `--snapshot`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityState {
    #[default]
    Secure,
    NonSecure,
}

impl fmt::Display for SecurityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityState::Secure => f.write_str("Secure"),
            SecurityState::NonSecure => f.write_str("Non-secure"),
        }
    }
}

/// Registers that exist once per security state.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BankedRegisters {
    pub primask: bool,
    pub faultmask: bool,
    pub basepri: u8,
    pub control: u32,
    pub msp: u32,
    pub psp: u32,
    pub msplim: u32,
    pub psplim: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct CpuSnapshot {
    /// r0-r12, sp (current), lr, pc.
    pub registers: [u32; 16],
    pub security: SecurityState,
    pub pending_exceptions: Vec<u16>,
    pub active_exceptions: Vec<u16>,
    pub secure: BankedRegisters,
    pub non_secure: BankedRegisters,
    pub xpsr: u32,
    pub fpscr: u32,
}

impl CpuSnapshot {
    pub fn pc(&self) -> u32 {
        self.registers[15]
    }

    pub fn lr(&self) -> u32 {
        self.registers[14]
    }
}

fn exception_list(f: &mut fmt::Formatter<'_>, label: &str, list: &[u16]) -> fmt::Result {
    write!(f, "{:<8}", label)?;
    if list.is_empty() {
        return writeln!(f, " none");
    }
    for exc in list {
        write!(f, " {}", exc)?;
    }
    writeln!(f)
}

fn banked(f: &mut fmt::Formatter<'_>, label: &str, bank: &BankedRegisters) -> fmt::Result {
    writeln!(
        f,
        "[{}] PRIMASK={} FAULTMASK={} BASEPRI={:#04x} CONTROL={:#010x}",
        label, bank.primask as u8, bank.faultmask as u8, bank.basepri, bank.control
    )?;
    writeln!(
        f,
        "[{}] MSP={:#010x} MSPLIM={:#010x} PSP={:#010x} PSPLIM={:#010x}",
        label, bank.msp, bank.msplim, bank.psp, bank.psplim
    )
}

impl fmt::Display for CpuSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chunk) in self.registers[..13].chunks(4).enumerate() {
            for (j, val) in chunk.iter().enumerate() {
                let name = format!("r{}", i * 4 + j);
                write!(f, "{:<4}= {:#010x}  ", name, val)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "lr  = {:#010x}  pc  = {:#010x}", self.lr(), self.pc())?;
        writeln!(f, "xPSR = {:#010x}  FPSCR = {:#010x}", self.xpsr, self.fpscr)?;
        writeln!(f, "Security state: {}", self.security)?;
        exception_list(f, "Pending", &self.pending_exceptions)?;
        exception_list(f, "Active", &self.active_exceptions)?;
        banked(f, "S", &self.secure)?;
        banked(f, "NS", &self.non_secure)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionDescriptor {
    pub rbar: u32,
    pub rlar: u32,
}

impl RegionDescriptor {
    /// RLAR.EN
    pub fn enabled(&self) -> bool {
        self.rlar & 1 != 0
    }

    pub fn base(&self) -> u32 {
        self.rbar & !0x1F
    }

    pub fn limit(&self) -> u32 {
        self.rlar | 0x1F
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct MpuSnapshot {
    pub ctrl: u32,
    pub rnr: u32,
    pub mair: [u32; 2],
    pub regions: Vec<RegionDescriptor>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SauSnapshot {
    pub ctrl: u32,
    pub regions: Vec<RegionDescriptor>,
}

impl SauSnapshot {
    pub fn enabled(&self) -> bool {
        self.ctrl & 0b01 != 0
    }

    pub fn all_non_secure(&self) -> bool {
        self.ctrl & 0b10 != 0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ProtectionSnapshot {
    pub mpu_secure: MpuSnapshot,
    pub mpu_non_secure: MpuSnapshot,
    pub sau: SauSnapshot,
}

fn region_table(f: &mut fmt::Formatter<'_>, regions: &[RegionDescriptor]) -> fmt::Result {
    for (i, r) in regions.iter().enumerate() {
        writeln!(
            f,
            "  {:>2}: RBAR={:#010x} RLAR={:#010x} {}",
            i,
            r.rbar,
            r.rlar,
            if r.enabled() {
                format!("{:#010x}-{:#010x}", r.base(), r.limit())
            } else {
                "disabled".to_string()
            }
        )?;
    }
    Ok(())
}

fn mpu(f: &mut fmt::Formatter<'_>, label: &str, mpu: &MpuSnapshot) -> fmt::Result {
    writeln!(
        f,
        "MPU ({}): CTRL={:#010x} RNR={} MAIR0={:#010x} MAIR1={:#010x}",
        label, mpu.ctrl, mpu.rnr, mpu.mair[0], mpu.mair[1]
    )?;
    region_table(f, &mpu.regions)
}

impl fmt::Display for ProtectionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        mpu(f, "Secure", &self.mpu_secure)?;
        mpu(f, "Non-secure", &self.mpu_non_secure)?;
        writeln!(
            f,
            "SAU: CTRL={:#010x} ENABLE={} ALLNS={}",
            self.sau.ctrl,
            self.sau.enabled() as u8,
            self.sau.all_non_secure() as u8
        )?;
        region_table(f, &self.sau.regions)
    }
}

/// Everything written by `--snapshot` when the run ends.
#[derive(Serialize, Deserialize, Debug)]
pub struct MachineSnapshot {
    pub cpu: CpuSnapshot,
    pub protection: ProtectionSnapshot,
    pub console_pending: String,
    pub steps: u64,
    pub wait_count: u64,
}

impl MachineSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

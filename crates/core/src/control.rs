// LabWired Harness - Armv8-M Device Bus Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::sync::Arc;

use crate::inspect::{InspectionConsole, Verdict};
use crate::monitor::GlobalMonitor;
use crate::signals::BreakState;
use crate::snapshot::MachineSnapshot;
use crate::{Engine, EngineConfig, ExitCause, Machine, SimResult};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_LOAD_FAILURE: u8 = 1;
pub const EXIT_USAGE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Operator quit, or the console reached end of input.
    Quit,
    StepLimit,
    LoadFailure,
}

impl Termination {
    pub fn exit_code(self) -> u8 {
        match self {
            Termination::Quit | Termination::StepLimit => EXIT_SUCCESS,
            Termination::LoadFailure => EXIT_LOAD_FAILURE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Loading,
    Stepping,
    Waiting,
    Inspecting,
    Terminated(Termination),
}

/// Drives the engine one step at a time and arbitrates between stepping,
/// sleeping, and the inspection console.
#[derive(Debug)]
pub struct ControlLoop<E: Engine> {
    machine: Machine,
    engine: E,
    console: InspectionConsole,
    breaks: Arc<BreakState>,
    state: LoopState,
    steps: u64,
    max_steps: Option<u64>,
    wait_count: u64,
    locked_up: bool,
}

impl<E: Engine> ControlLoop<E> {
    pub fn new(
        machine: Machine,
        config: EngineConfig,
        console: InspectionConsole,
        breaks: Arc<BreakState>,
    ) -> Self {
        let engine = E::create(config, Arc::new(GlobalMonitor::new()));
        Self {
            machine,
            engine,
            console,
            breaks,
            state: LoopState::Loading,
            steps: 0,
            max_steps: None,
            wait_count: 0,
            locked_up: false,
        }
    }

    /// Stop with success after this many engine steps.
    pub fn with_max_steps(mut self, max_steps: Option<u64>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn wait_count(&self) -> u64 {
        self.wait_count
    }

    /// Whether the last step reported lockup.
    pub fn locked_up(&self) -> bool {
        self.locked_up
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Loading -> Stepping. On failure the loop is terminated and nothing runs.
    pub fn load_image(&mut self, image: &[u8]) -> SimResult<()> {
        if let Err(e) = self.machine.ram_mut().load_image(image) {
            tracing::error!("{}", e);
            self.state = LoopState::Terminated(Termination::LoadFailure);
            return Err(e);
        }
        if let Err(e) = self.engine.reset(&mut self.machine) {
            tracing::error!("Reset failed: {}", e);
            self.state = LoopState::Terminated(Termination::LoadFailure);
            return Err(e);
        }
        tracing::info!(
            "Loaded {} byte image into {} byte RAM",
            image.len(),
            self.machine.ram().capacity()
        );
        self.state = LoopState::Stepping;
        Ok(())
    }

    /// Performs one state transition and returns the new state.
    pub fn advance(&mut self) -> LoopState {
        self.state = match self.state {
            LoopState::Loading => {
                tracing::error!("No image loaded");
                LoopState::Terminated(Termination::LoadFailure)
            }
            LoopState::Stepping => self.step_phase(),
            LoopState::Waiting => {
                self.engine.wait_for_interrupt();
                tracing::debug!("Interrupt arrived, resuming");
                LoopState::Stepping
            }
            LoopState::Inspecting => self.inspect_phase(),
            LoopState::Terminated(t) => LoopState::Terminated(t),
        };
        self.state
    }

    pub fn run(&mut self) -> Termination {
        loop {
            if let LoopState::Terminated(t) = self.advance() {
                tracing::info!("Simulation finished after {} steps: {:?}", self.steps, t);
                return t;
            }
        }
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            cpu: self.engine.cpu_snapshot(),
            protection: self.engine.protection_snapshot(),
            console_pending: String::from_utf8_lossy(self.machine.console().pending())
                .into_owned(),
            steps: self.steps,
            wait_count: self.wait_count,
        }
    }

    fn step_phase(&mut self) -> LoopState {
        if self.breaks.take_pending() {
            tracing::info!("Break requested at step {}", self.steps);
            return LoopState::Inspecting;
        }
        if self.max_steps.is_some_and(|max| self.steps >= max) {
            tracing::info!("Step limit of {} reached", self.steps);
            return LoopState::Terminated(Termination::StepLimit);
        }

        let cause = self.execute_step();
        if cause.is_sleeping() {
            self.wait_count += 1;
            tracing::info!(
                "Core asleep ({:?}), waiting for interrupt [{}]",
                cause,
                self.wait_count
            );
            return LoopState::Waiting;
        }
        LoopState::Stepping
    }

    fn inspect_phase(&mut self) -> LoopState {
        self.breaks.enter_console();
        let verdict = self.console.interact(&self.engine);
        self.breaks.leave_console();

        match verdict {
            Verdict::Continue => LoopState::Stepping,
            Verdict::Quit => LoopState::Terminated(Termination::Quit),
            Verdict::Step => {
                self.execute_step();
                LoopState::Inspecting
            }
        }
    }

    fn execute_step(&mut self) -> ExitCause {
        self.engine.step(&mut self.machine);
        self.steps += 1;
        let cause = self.engine.exit_cause();
        let locked_up = cause.contains(ExitCause::LOCKUP);
        if locked_up && !self.locked_up {
            tracing::warn!("Core reported lockup at step {}", self.steps);
        }
        self.locked_up = locked_up;
        if cause.contains(ExitCause::BREAKPOINT) {
            tracing::info!("Core hit a breakpoint at step {}", self.steps);
        }
        cause
    }
}

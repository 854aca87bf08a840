// LabWired Harness - Armv8-M Device Bus Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::Context;
use clap::Parser;
use harness_config::HarnessConfig;
use harness_core::control::{ControlLoop, Termination, EXIT_LOAD_FAILURE, EXIT_USAGE};
use harness_core::cpu::StubCore;
use harness_core::inspect::InspectionConsole;
use harness_core::signals::{install_break_handler, BreakState};
use harness_core::{EngineConfig, Machine};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "LabWired Harness: Armv8-M device bus harness", long_about = None)]
struct Args {
    /// Path to the raw binary image, loaded at RAM offset 0
    image: PathBuf,

    /// Path to the memory map configuration (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable per-step and per-access tracing
    #[arg(short, long)]
    trace: bool,

    /// Stop with success after this many engine steps
    #[arg(long)]
    max_steps: Option<u64>,

    /// Write a JSON state snapshot here when the run ends
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.trace {
        tracing::Level::TRACE
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting LabWired Harness");

    let config = match &args.config {
        Some(path) => {
            info!("Loading harness config: {:?}", path);
            HarnessConfig::from_file(path)
        }
        None => {
            info!("Using default memory map");
            Ok(HarnessConfig::default())
        }
    };
    let map = match config.and_then(|c| c.memory_map()) {
        Ok(map) => map,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };
    info!(
        "RAM {:#010x}+{:#x}, console {:#010x}, VTOR {:#010x}",
        map.ram_base, map.ram_size, map.console_base, map.vector_table
    );

    let machine = match Machine::with_stdout(&map) {
        Ok(machine) => machine,
        Err(e) => {
            error!("Invalid memory map: {}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    info!("Loading image: {:?}", args.image);
    let image = match harness_loader::load_raw(&args.image, machine.ram().capacity()) {
        Ok(image) => image,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_LOAD_FAILURE);
        }
    };

    let breaks = Arc::new(BreakState::new());
    if let Err(e) = install_break_handler(breaks.clone()) {
        error!("Failed to install break handler: {:#}", e);
    }

    let mut control: ControlLoop<StubCore> = ControlLoop::new(
        machine,
        EngineConfig {
            vector_table: map.vector_table,
        },
        InspectionConsole::stdio(),
        breaks,
    )
    .with_max_steps(args.max_steps);

    if control.load_image(&image.bytes).is_err() {
        return ExitCode::from(EXIT_LOAD_FAILURE);
    }

    info!("Starting simulation (Ctrl-C to inspect)");
    let termination = control.run();

    if let Some(path) = &args.snapshot {
        if let Err(e) = write_snapshot(&control, path) {
            error!("{:#}", e);
        }
    }

    exit_code(termination)
}

fn write_snapshot(control: &ControlLoop<StubCore>, path: &Path) -> anyhow::Result<()> {
    let json = control
        .snapshot()
        .to_json()
        .context("Failed to serialize snapshot")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write snapshot to {:?}", path))?;
    info!("Snapshot written to {:?}", path);
    Ok(())
}

fn exit_code(termination: Termination) -> ExitCode {
    ExitCode::from(termination.exit_code())
}

//! `mpu run` — assembles and executes a program, optionally under the
//! single-step TUI monitor.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use mpu_asm::machine::Machine;
use tracing::info;

use crate::assemble::assemble_with_assets;
use crate::error::{CliError, Result};
use crate::monitor;

fn seed() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(1)
}

pub fn run(input: &PathBuf, use_monitor: bool, asset_path: Option<&PathBuf>) -> Result<()> {
    let linked = assemble_with_assets(input, asset_path.cloned())?;
    let mut machine = Machine::new(&linked.code, seed());

    if use_monitor {
        monitor::run(&mut machine, &linked).map_err(|e| CliError::Monitor(e.to_string()))?;
        return Ok(());
    }

    machine.run().map_err(|e| CliError::Runtime(e.to_string()))?;
    info!(pc = format!("{:#06x}", machine.pc()), "halted");
    Ok(())
}

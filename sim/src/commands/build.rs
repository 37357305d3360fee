//! `mpu build` — assembles one or more files and writes the linked image.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::assemble::assemble_with_assets;
use crate::error::Result;
use crate::listing;
use crate::source::read_entry_point;

pub fn run(inputs: &[PathBuf], output: &Option<PathBuf>, listing_out: bool, asset_path: Option<&PathBuf>) -> Result<()> {
    for path in inputs {
        let linked = assemble_with_assets(path, asset_path.cloned())?;
        let out_path = output.clone().unwrap_or_else(|| default_output(path));
        fs::write(&out_path, &linked.code)?;
        info!(
            input = %path.display(),
            output = %out_path.display(),
            bytes = linked.code.len(),
            "assembled"
        );

        if listing_out {
            let (_, source) = read_entry_point(path)?;
            print!("{}", listing::render(&source, &linked));
        }
    }
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("bin")
}

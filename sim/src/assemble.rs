//! Shared front end: file path in, `LinkResult` out. Every subcommand goes
//! through this so error reporting (line/col, which stage failed) is uniform.

use std::path::{Path, PathBuf};

use mpu_asm::error::AsmError;
use mpu_asm::lexer::tokenize_with_includes;
use mpu_asm::linker::{link, LinkResult};
use mpu_asm::parser::parse;
use tracing::debug;

use crate::error::{CliError, Result};
use crate::source::{read_entry_point, FsSourceLoader};

/// Lexes (with `include` resolution), parses, and links `path`. Diagnostics
/// from every stage are printed to stderr before returning an error, so a
/// single invocation reports everything wrong with a program at once rather
/// than stopping at the first stage. `asset_root` is the `--asset-path` /
/// `MPU_ASSET_PATH` fallback directory for `include` resolution.
pub fn assemble(path: &Path) -> Result<LinkResult> {
    assemble_with_assets(path, None)
}

pub fn assemble_with_assets(path: &Path, asset_root: Option<PathBuf>) -> Result<LinkResult> {
    let (file, source) = read_entry_point(path)?;
    let mut loader = FsSourceLoader::new(asset_root);
    let lexed = tokenize_with_includes(&file, &source, &mut loader);
    report(&lexed.errors);

    let parsed = parse(&lexed.tokens);
    report(&parsed.errors);

    let linked = link(&parsed.statements);
    report(&linked.errors);

    let total = lexed.errors.len() + parsed.errors.len() + linked.errors.len();
    if total > 0 {
        return Err(CliError::assemble(path, total));
    }
    debug!(bytes = linked.code.len(), symbols = linked.symbols.len(), tests = linked.tests.len(), "assembled");
    Ok(linked)
}

fn report(errors: &[AsmError]) {
    for err in errors {
        eprintln!("{err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn assembles_a_valid_program() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.mpu");
        fs::write(&path, "org 0x100\nhlt\n").unwrap();

        let linked = assemble(&path).unwrap();
        assert!(!linked.code.is_empty());
    }

    #[test]
    fn reports_every_stage_error_via_an_assemble_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mpu");
        fs::write(&path, "jmp nowhere\n").unwrap();

        let err = assemble(&path).unwrap_err();
        match err {
            CliError::Assemble { count, .. } => assert!(count >= 1),
            other => panic!("expected Assemble, got {other:?}"),
        }
    }
}

//! CLI-boundary error type. The `mpu-asm` library keeps its own hand-rolled
//! `AsmError` (see its `error.rs` for why); this binary wraps that plus I/O
//! and monitor failures behind `thiserror`, matching `faxt`'s `FaxtError`.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{path}: {count} assembly error(s)")]
    Assemble { path: PathBuf, count: usize },

    #[error("runtime fault: {0}")]
    Runtime(String),

    #[error("{0} test(s) failed")]
    TestsFailed(usize),

    #[error("monitor error: {0}")]
    Monitor(String),
}

impl CliError {
    pub fn assemble(path: impl Into<PathBuf>, count: usize) -> Self {
        CliError::Assemble {
            path: path.into(),
            count,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

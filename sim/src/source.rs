//! Filesystem-backed `SourceLoader`: the host-side seam `mpu_asm::lexer`
//! leaves for `include` resolution.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mpu_asm::lexer::SourceLoader;

/// Resolves `include` targets relative to the including file first; if that
/// candidate doesn't exist and an asset root was given (`--asset-path` /
/// `MPU_ASSET_PATH`), falls back to resolving against it instead. This lets
/// a project keep shared includes outside any single source file's own
/// directory tree.
pub struct FsSourceLoader {
    pub asset_root: Option<PathBuf>,
}

impl FsSourceLoader {
    pub fn new(asset_root: Option<PathBuf>) -> Self {
        FsSourceLoader { asset_root }
    }
}

impl SourceLoader for FsSourceLoader {
    fn resolve(&self, including_file: &str, path: &str) -> String {
        let base = Path::new(including_file).parent().unwrap_or_else(|| Path::new(""));
        let candidate = base.join(path);
        if candidate.exists() {
            return candidate.canonicalize().unwrap_or(candidate).to_string_lossy().into_owned();
        }
        if let Some(root) = &self.asset_root {
            let from_root = root.join(path);
            if from_root.exists() {
                return from_root.canonicalize().unwrap_or(from_root).to_string_lossy().into_owned();
            }
        }
        candidate.to_string_lossy().into_owned()
    }

    fn load(&mut self, canonical_path: &str) -> io::Result<String> {
        fs::read_to_string(canonical_path)
    }
}

/// Reads `path` as the top-level source file, returning its contents and the
/// string used to identify it to the lexer (its canonical path where
/// possible, so `include "./foo.mpu"` resolves relative to it).
pub fn read_entry_point(path: &Path) -> io::Result<(String, String)> {
    let source = fs::read_to_string(path)?;
    let canonical: PathBuf = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    Ok((canonical.to_string_lossy().into_owned(), source))
}

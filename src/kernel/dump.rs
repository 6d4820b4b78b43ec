//! Debug dumps of compilation artifacts
//!
//! Purely diagnostic: a failed write is logged and the launch carries on.

use super::cache::KernelSignature;
use super::compile::Artifact;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Directory receiving `<signature>.ll` and `<signature>.ptx` files
#[derive(Debug, Clone)]
pub struct DumpSink {
    dir: PathBuf,
}

impl DumpSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File stem for a signature: everything outside `[A-Za-z0-9_]` becomes `_`
    pub fn file_stem(signature: &KernelSignature) -> String {
        signature
            .to_string()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect()
    }

    /// Write whatever text the artifact carries; returns the files written
    pub fn dump(&self, signature: &KernelSignature, artifact: &Artifact) -> Vec<PathBuf> {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            tracing::warn!("cannot create dump directory {}: {}", self.dir.display(), e);
            return Vec::new();
        }

        let stem = Self::file_stem(signature);
        let outputs = [("ll", artifact.ir.as_deref()), ("ptx", artifact.asm.as_deref())];

        let mut written = Vec::new();
        for (ext, contents) in outputs {
            let Some(contents) = contents else { continue };
            let path = self.dir.join(format!("{stem}.{ext}"));
            match write_new(&path, contents) {
                Ok(()) => {
                    tracing::debug!("dumped {}", path.display());
                    written.push(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::warn!("{} already exists, not overwriting", path.display());
                }
                Err(e) => tracing::warn!("cannot write {}: {}", path.display(), e),
            }
        }
        written
    }
}

fn write_new(path: &Path, contents: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents.as_bytes())
}

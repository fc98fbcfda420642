//! Deterministic `nx-cli` executable discovery.
//!
//! Candidates are derived from a fixed project root, never from the current
//! directory or `PATH`. The list covers single-config (Unix, Ninja) builds,
//! MSVC multi-config Release/Debug builds, and the alternate layout where
//! `nx-cli` is built as its own subproject.

use std::path::{Path, PathBuf};

use crate::error::{BindingError, Result};

const EXECUTABLE: &str = "nx-cli";
const EXECUTABLE_EXE: &str = "nx-cli.exe";

/// Locates the `nx-cli` executable relative to a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolver {
    project_root: PathBuf,
}

impl Resolver {
    /// Resolver anchored at this crate's own location.
    ///
    /// The crate sits one level below the `nx` source tree, so the project
    /// root is the parent of the manifest directory.
    pub fn from_anchor() -> Self {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        let project_root = manifest_dir
            .parent()
            .unwrap_or(manifest_dir)
            .to_path_buf();
        Self { project_root }
    }

    /// Resolver for an explicit project root.
    ///
    /// The root must be absolute: a relative root would make every candidate
    /// depend on the process's current directory.
    pub fn with_project_root(project_root: impl Into<PathBuf>) -> Result<Self> {
        let project_root = project_root.into();
        if !project_root.is_absolute() {
            return Err(BindingError::InvalidConfig(format!(
                "project root must be an absolute path, got '{}'",
                project_root.display()
            )));
        }
        Ok(Self { project_root })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// The ordered candidate list. Earlier entries are preferred.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let layouts = [
            self.project_root.join("build").join("nx-cli"),
            self.project_root.join("nx-cli").join("build"),
        ];

        layouts
            .iter()
            .flat_map(|dir| {
                [
                    dir.join(EXECUTABLE),
                    dir.join(EXECUTABLE_EXE),
                    dir.join("Release").join(EXECUTABLE_EXE),
                    dir.join("Debug").join(EXECUTABLE_EXE),
                ]
            })
            .collect()
    }

    /// Return the first candidate that exists, canonicalized.
    ///
    /// Fails with `BindingError::NotFound` listing every checked candidate.
    pub fn resolve(&self) -> Result<PathBuf> {
        let candidates = self.candidates();

        for candidate in &candidates {
            if !candidate.exists() {
                continue;
            }
            let resolved = candidate.canonicalize().map_err(|e| {
                BindingError::Io(format!("failed to canonicalize {}: {}", candidate.display(), e))
            })?;
            tracing::debug!(path = %resolved.display(), "resolved nx-cli executable");
            return Ok(resolved);
        }

        tracing::warn!(
            project_root = %self.project_root.display(),
            checked = %candidates.len(),
            "nx-cli executable not found"
        );
        Err(BindingError::NotFound { candidates })
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::from_anchor()
    }
}

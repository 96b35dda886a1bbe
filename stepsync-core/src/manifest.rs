//! Desired-state manifests and actual-state snapshots on disk.
//!
//! # Manifest layout
//!
//! ```yaml
//! assemblies:
//!   - name: Contoso.Plugins
//!     kind: NativeBinary
//!     plugin_types:
//!       - full_type_name: Contoso.Plugins.AccountHandler
//!         steps:
//!           - message: Create
//!             primary_entity: account
//!             stage: PreOperation
//!             images:
//!               - name: PostImage
//!                 image_type: PostImage
//! ```
//!
//! Snapshots are the YAML form of [`ActualState`]. Writes go through a
//! `.tmp` sibling followed by `rename`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::actual::ActualState;
use crate::error::ManifestError;
use crate::types::AssemblyRegistration;

/// Output of the metadata extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub assemblies: Vec<AssemblyRegistration>,
}

impl Manifest {
    /// Pick the assemblies to process: all of them, or only `name`.
    pub fn select(
        &self,
        name: Option<&str>,
        path: &Path,
    ) -> Result<Vec<&AssemblyRegistration>, ManifestError> {
        let Some(name) = name else {
            return Ok(self.assemblies.iter().collect());
        };
        self.assemblies
            .iter()
            .find(|a| a.name == name)
            .map(|a| vec![a])
            .ok_or_else(|| ManifestError::UnknownAssembly {
                name: name.to_owned(),
                path: path.to_path_buf(),
            })
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load and validate a manifest.
///
/// Returns `ManifestError::NotFound` if absent, `ManifestError::Parse` (with
/// path + line context) if malformed, `ManifestError::Invalid` if any
/// assembly breaks a model invariant.
pub fn load_at(path: &Path) -> Result<Manifest, ManifestError> {
    let contents = read(path)?;
    let manifest: Manifest = serde_yaml::from_str(&contents).map_err(|e| ManifestError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    for assembly in &manifest.assemblies {
        assembly.validate().map_err(|e| ManifestError::Invalid {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(manifest)
}

/// Load an actual-state snapshot written by [`save_snapshot_at`].
pub fn load_snapshot_at(path: &Path) -> Result<ActualState, ManifestError> {
    let contents = read(path)?;
    serde_yaml::from_str(&contents).map_err(|e| ManifestError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn read(path: &Path) -> Result<String, ManifestError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(ManifestError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(err) => Err(ManifestError::Io {
            path: path.to_path_buf(),
            source: err,
        }),
    }
}

// ---------------------------------------------------------------------------
// Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically write a snapshot: serialize → `<path>.tmp` → `rename`.
pub fn save_snapshot_at(path: &Path, state: &ActualState) -> Result<(), ManifestError> {
    let yaml = serde_yaml::to_string(state)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ManifestError {
    ManifestError::Io {
        path: path.into(),
        source,
    }
}

//! Materialization of vendored native helpers.
//!
//! Some producer deployments rely on helper executables and shared libraries that
//! have to exist on the local filesystem before the producer is constructed. Each
//! configured artifact is copied from its source to its destination once, with the
//! executable bit set for everyone. Destinations that already exist are left alone,
//! which makes the whole step safe to repeat on every start.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::error::ArtifactError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeArtifact {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl FromStr for NativeArtifact {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some((source, destination)) if !source.is_empty() && !destination.is_empty() => {
                Ok(NativeArtifact {
                    source: PathBuf::from(source),
                    destination: PathBuf::from(destination),
                })
            }
            _ => Err(ArtifactError::InvalidMapping(s.to_owned())),
        }
    }
}

/// Comma separated list of artifacts, as read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeArtifacts(pub Vec<NativeArtifact>);

impl NativeArtifacts {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NativeArtifact> {
        self.0.iter()
    }
}

impl FromStr for NativeArtifacts {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(NativeArtifact::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(NativeArtifacts)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    AlreadyPresent,
    Extracted { bytes: u64 },
}

/// Ensure every artifact is present at its destination.
pub fn materialize(artifacts: &NativeArtifacts) -> Result<(), ArtifactError> {
    if artifacts.is_empty() {
        debug!("no native artifacts configured");
        return Ok(());
    }

    if !cfg!(unix) {
        debug!("not running on Unix, skipping native artifacts");
        return Ok(());
    }

    debug!("extracting native artifacts, if needed");
    for artifact in artifacts.iter() {
        materialize_one(artifact)?;
    }

    Ok(())
}

pub fn materialize_one(artifact: &NativeArtifact) -> Result<Materialized, ArtifactError> {
    let destination = artifact.destination.as_path();
    let io_error = |source| ArtifactError::Io {
        destination: destination.to_path_buf(),
        source,
    };

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    if destination.exists() {
        warn!(path = %destination.display(), "artifact already exists");
        return Ok(Materialized::AlreadyPresent);
    }

    let bytes = fs::copy(&artifact.source, destination).map_err(io_error)?;
    set_executable(destination).map_err(io_error)?;

    info!(path = %destination.display(), "extracted executable");
    debug!(path = %destination.display(), bytes, "artifact size");

    Ok(Materialized::Extracted { bytes })
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

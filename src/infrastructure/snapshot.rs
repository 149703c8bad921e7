use crate::domain::Snapshot;
use crate::infrastructure::exposition::{self, ParseError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("reading metrics file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing metrics file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

/// Reads and parses a text exposition file in one go.
pub fn load_snapshot(path: &Path) -> Result<Snapshot, SnapshotError> {
    let content = std::fs::read(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let families = exposition::parse_bytes(&content).map_err(|source| SnapshotError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let snapshot = Snapshot::new(families);
    debug!(
        "Loaded {} metric families ({} series) from {:?}",
        snapshot.len(),
        snapshot.series_count(),
        path
    );
    Ok(snapshot)
}

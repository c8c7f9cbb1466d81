use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::Result;

/// One encoded output file. `name` is relative and `/`-separated, e.g.
/// `HKT-08031_EPSG-9377/points.shp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Destination for finished artifacts.
pub trait ArtifactSink {
    fn store(&self, file_name: &str, bytes: &[u8]) -> Result<()>;

    /// Stores every artifact, in order.
    fn store_all(&self, artifacts: &[Artifact]) -> Result<()> {
        for artifact in artifacts {
            self.store(&artifact.name, &artifact.bytes)?;
        }
        Ok(())
    }
}

/// Writes artifacts under a root directory, creating folders as needed.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

const STAGING_SUFFIX: &str = ".part";

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        file_name
            .split('/')
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    fn staging_path(path: &Path) -> PathBuf {
        let mut staged = path.as_os_str().to_owned();
        staged.push(STAGING_SUFFIX);
        PathBuf::from(staged)
    }

    fn write(path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }
}

impl ArtifactSink for DirectorySink {
    fn store(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(file_name);
        debug!("Writing {} bytes to {}", bytes.len(), path.display());
        Self::write(&path, bytes)
    }

    /// Writes every artifact to a staging name first and renames them into
    /// place only once all writes succeeded. On any failure the staging
    /// files and the files already moved into place are removed again.
    fn store_all(&self, artifacts: &[Artifact]) -> Result<()> {
        let mut staged = Vec::with_capacity(artifacts.len());
        let written: Result<()> = artifacts.iter().try_for_each(|artifact| {
            let path = self.path_of(&artifact.name);
            let staging = Self::staging_path(&path);
            // registered before writing so a half-written file is cleaned up too
            staged.push((staging.clone(), path));
            Self::write(&staging, &artifact.bytes)
        });
        if let Err(e) = written {
            remove_all(staged.iter().map(|(staging, _)| staging));
            return Err(e);
        }

        let mut placed = Vec::with_capacity(staged.len());
        for (index, (staging, path)) in staged.iter().enumerate() {
            debug!("Moving {} into place", path.display());
            if let Err(e) = fs::rename(staging, path) {
                warn!("Could not move {} into place, rolling back", path.display());
                remove_all(placed);
                remove_all(staged[index..].iter().map(|(staging, _)| staging));
                return Err(e.into());
            }
            placed.push(path);
        }
        Ok(())
    }
}

fn remove_all<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }
}

/// Keeps everything in memory. Useful for callers that ship artifacts
/// elsewhere (and for tests).
#[derive(Debug, Default)]
pub struct MemorySink {
    stored: Mutex<Vec<Artifact>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        match self.stored.lock() {
            Ok(stored) => stored.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ArtifactSink for MemorySink {
    fn store(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        let artifact = Artifact::new(file_name, bytes);
        match self.stored.lock() {
            Ok(mut stored) => stored.push(artifact),
            Err(poisoned) => poisoned.into_inner().push(artifact),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tenure-export-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn directory_sink_creates_folders() {
        let root = scratch("sink");
        let sink = DirectorySink::new(&root);
        sink.store_all(&[
            Artifact::new("A_EPSG-9377/A.shp", vec![1, 2, 3]),
            Artifact::new("A.kml", b"<kml/>".to_vec()),
        ])
        .unwrap();
        assert_eq!(fs::read(root.join("A_EPSG-9377").join("A.shp")).unwrap(), vec![1, 2, 3]);
        assert_eq!(fs::read(root.join("A.kml")).unwrap(), b"<kml/>");
        assert!(!root.join("A.kml.part").exists());
        fs::remove_dir_all(&root).unwrap();
    }

    fn leftovers(root: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    found.push(path);
                }
            }
        }
        found
    }

    #[test]
    fn failed_write_leaves_no_files() {
        let root = scratch("failed-write");
        // a plain file where a folder is needed makes the second write fail
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("B_EPSG-9377"), b"in the way").unwrap();
        let sink = DirectorySink::new(&root);
        let result = sink.store_all(&[
            Artifact::new("A.kml", b"<kml/>".to_vec()),
            Artifact::new("B_EPSG-9377/B.shp", vec![1, 2, 3]),
        ]);
        assert!(result.is_err());
        assert_eq!(leftovers(&root), vec![root.join("B_EPSG-9377")]);
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn failed_rename_rolls_back_placed_files() {
        let root = scratch("failed-rename");
        // a non-empty directory at a target path cannot be replaced by a rename
        fs::create_dir_all(root.join("C.prj").join("occupied")).unwrap();
        let sink = DirectorySink::new(&root);
        let result = sink.store_all(&[
            Artifact::new("C.shp", vec![1]),
            Artifact::new("C.shx", vec![2]),
            Artifact::new("C.prj", b"EPSG:9377".to_vec()),
        ]);
        assert!(result.is_err());
        assert!(leftovers(&root).is_empty(), "{:?}", leftovers(&root));
        assert!(root.join("C.prj").join("occupied").is_dir());
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn paths_stay_under_root() {
        let sink = DirectorySink::new("/out");
        assert_eq!(sink.path_of("../x/./y.shp"), PathBuf::from("/out/x/y.shp"));
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.store("a", b"1").unwrap();
        sink.store("b", b"2").unwrap();
        let names: Vec<_> = sink.artifacts().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}

//! Scoped on-disk storage for intermediate rasters.
//!
//! Every intermediate lives under one run-specific directory. Entries are
//! released explicitly once their consumer finishes; whatever is left is
//! removed when the [`ScratchSpace`] is dropped, on success and failure
//! paths alike.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::io::{read_geotiff, write_geotiff_f64};
use crate::raster::{Raster, RasterElement};

static NEXT_SPACE: AtomicUsize = AtomicUsize::new(0);

/// Directory of intermediates owned by a single run.
#[derive(Debug)]
pub struct ScratchSpace {
    root: PathBuf,
    entries: Vec<PathBuf>,
}

impl ScratchSpace {
    /// Create a fresh directory below `parent` (the system temp dir when
    /// `None`).
    pub fn new(parent: Option<&Path>) -> Result<Self> {
        let parent = parent.map_or_else(std::env::temp_dir, Path::to_path_buf);
        let root = parent.join(format!(
            "wildpath-{}-{}",
            std::process::id(),
            NEXT_SPACE.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "scratch space created");
        Ok(Self {
            root,
            entries: Vec::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths currently held
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Write `raster` as `<name>.tif` and track it.
    ///
    /// Cells are stored as 64-bit floats, so a load returns the same values.
    /// Names that sanitize to the same file overwrite each other; callers
    /// keep them distinct.
    pub fn store_raster<T: RasterElement>(&mut self, name: &str, raster: &Raster<T>) -> Result<PathBuf> {
        let path = self.root.join(format!("{}.tif", sanitize(name)));
        write_geotiff_f64(raster, &path)?;
        if !self.entries.contains(&path) {
            self.entries.push(path.clone());
        }
        Ok(path)
    }

    /// Read a raster previously stored here.
    pub fn load_raster<T: RasterElement>(&self, path: &Path) -> Result<Raster<T>> {
        read_geotiff(path)
    }

    /// Remove one intermediate.
    pub fn release(&mut self, path: &Path) -> Result<()> {
        self.entries.retain(|p| p != path);
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(Error::ResourceCleanup {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Remove every remaining intermediate and the directory itself,
    /// returning one error per path that could not be removed.
    pub fn release_all(&mut self) -> Vec<Error> {
        let mut failures: Vec<Error> = std::mem::take(&mut self.entries)
            .into_iter()
            .filter_map(|path| self.release(&path).err())
            .collect();
        if self.root.exists() {
            if let Err(source) = fs::remove_dir_all(&self.root) {
                failures.push(Error::ResourceCleanup {
                    path: self.root.clone(),
                    source,
                });
            }
        }
        failures
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        for failure in self.release_all() {
            tracing::warn!(error = %failure, "scratch cleanup failed");
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;

    fn raster() -> Raster<f64> {
        let mut r = Raster::filled(2, 2, 3.0);
        r.set_crs(Some(CRS::from_epsg(26911)));
        r
    }

    #[test]
    fn test_store_load_release() {
        let parent = tempfile::tempdir().unwrap();
        let mut scratch = ScratchSpace::new(Some(parent.path())).unwrap();

        let path = scratch.store_raster("score hydro", &raster()).unwrap();
        assert!(path.ends_with("score_hydro.tif"));
        assert_eq!(scratch.entries().len(), 1);

        let back: Raster<f64> = scratch.load_raster(&path).unwrap();
        assert_eq!(back.get(1, 1).unwrap(), 3.0);

        scratch.release(&path).unwrap();
        assert!(!path.exists());
        assert!(scratch.entries().is_empty());
    }

    #[test]
    fn test_stored_values_load_unchanged() {
        let parent = tempfile::tempdir().unwrap();
        let mut scratch = ScratchSpace::new(Some(parent.path())).unwrap();
        let mut r = raster();
        r.set(0, 1, 0.1 + 0.2).unwrap();
        r.set(1, 0, 1308.510026301807).unwrap();

        let path = scratch.store_raster("score_0_roads", &r).unwrap();
        let back: Raster<f64> = scratch.load_raster(&path).unwrap();
        for (a, b) in r.data().iter().zip(back.data().iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_drop_removes_directory() {
        let parent = tempfile::tempdir().unwrap();
        let root = {
            let mut scratch = ScratchSpace::new(Some(parent.path())).unwrap();
            scratch.store_raster("a", &raster()).unwrap();
            scratch.root().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[test]
    fn test_release_failure_is_typed() {
        let parent = tempfile::tempdir().unwrap();
        let mut scratch = ScratchSpace::new(Some(parent.path())).unwrap();
        // A directory in place of a file cannot be removed with remove_file.
        let blocker = scratch.root().join("blocker.tif");
        fs::create_dir(&blocker).unwrap();
        match scratch.release(&blocker) {
            Err(Error::ResourceCleanup { path, .. }) => assert_eq!(path, blocker),
            other => panic!("expected ResourceCleanup, got {other:?}"),
        }
    }
}

//! The `.replicate` initial-sync marker file (spec §4.5, §11 supplement).
//!
//! On first startup of a new replica, the master writes every series id
//! it currently knows about into this file as a flat concatenation of
//! `u32`s. The replicator, finding the file on its own boot, tags each
//! listed series `INIT_REPL` so the first streaming pass targets them
//! specifically rather than relying on the FIFO alone to have seen them.
//! The file is opened `r+` for consumption (so the read position and any
//! truncation share one handle) and `w+` only at creation time.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::error::Error;

pub struct InitFile {
    path: PathBuf,
}

impl InitFile {
    /// Create (or overwrite) the marker file with the given series ids,
    /// opened `w+` as only the writer needs a fresh file.
    pub fn create(path: impl AsRef<Path>, series_ids: &[u32]) -> Result<Self, Error> {
        let path = path.as_ref().to_owned();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::Io(path.clone(), e))?;

        for id in series_ids {
            file.write_all(&id.to_le_bytes())
                .map_err(|e| Error::Io(path.clone(), e))?;
        }

        Ok(Self { path })
    }

    pub fn exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    /// Consume the marker file on boot: read every listed series id, then
    /// remove the file so a subsequent restart does not replay the same
    /// initial-sync set. Opened `r+` per spec §11: reading and the
    /// eventual removal are done against the same handle.
    pub fn consume(path: impl AsRef<Path>) -> Result<Vec<u32>, Error> {
        let path = path.as_ref().to_owned();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Error::Io(path.clone(), e))?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| Error::Io(path.clone(), e))?;

        if bytes.len() % 4 != 0 {
            return Err(Error::CorruptRecord(path, bytes.len() as u64));
        }

        let ids = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        drop(file);
        std::fs::remove_file(&path).map_err(|e| Error::Io(path, e))?;

        Ok(ids)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_consume_round_trips_series_ids() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".replicate");
        InitFile::create(&path, &[1, 2, 3]).unwrap();

        assert!(InitFile::exists(&path));
        let ids = InitFile::consume(&path).unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn consume_removes_the_file_so_it_is_not_replayed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".replicate");
        InitFile::create(&path, &[7]).unwrap();
        InitFile::consume(&path).unwrap();

        assert!(!InitFile::exists(&path));
    }

    #[test]
    fn missing_file_is_reported_as_absent() {
        let dir = tempdir().unwrap();
        assert!(!InitFile::exists(dir.path().join(".replicate")));
    }
}

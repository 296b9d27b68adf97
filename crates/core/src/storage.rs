//! Durable key-value storage for the transcript.
//!
//! The transcript store never touches the file system (or any other global)
//! directly; a [`Storage`] is handed to it when the session is built.

use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A durable string store.
///
/// The transcript store is the only writer, so implementations don't need
/// to coordinate concurrent writers.
pub trait Storage: Send + 'static {
    /// Reads the value under `key`, `None` if it doesn't exist.
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    /// Writes `value` under `key`, replacing any existing value.
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;

    /// Removes the value under `key`. Removing a missing key succeeds.
    fn remove(&mut self, key: &str) -> io::Result<()>;
}

/// An in-memory storage.
///
/// Clones share the same underlying map, so a test can keep one clone to
/// inspect what the store has written.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| io::Error::other("memory storage is poisoned"))
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.lock()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// A storage keeping one `<key>.json` file per key in a directory.
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Creates a storage rooted at `dir`. The directory is created on the
    /// first write.
    #[inline]
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory the files live in.
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[inline]
    fn path_of(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_of(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        // Write-then-rename, so a crash never leaves half a snapshot.
        let path = self.path_of(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, value)?;
        fs::rename(&tmp_path, &path)
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_of(key)) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

//! Storage area: two flat buckets of files on local disk.
//!
//! Every operation goes straight to the filesystem; there is no cache, so
//! each enumeration sees the current state. The sweeper and any number of
//! request handlers share the buckets without locking. Writes are atomic
//! at the directory-entry level (temp file + rename) and a missing entry is
//! an ordinary, expected condition for every caller.

use crate::config::ServerConfig;
use crate::error::StorageError;
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use std::fmt;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::{Duration, SystemTime};
use tempfile::TempPath;
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, info};

/// One of the two storage namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Raw uploads.
    Incoming,
    /// Conversion results.
    Converted,
}

impl Bucket {
    pub const ALL: [Bucket; 2] = [Bucket::Incoming, Bucket::Converted];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Incoming => "incoming",
            Bucket::Converted => "converted",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a stored entry. Holding it does not keep the file alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRef {
    pub bucket: Bucket,
    pub name: String,
    pub path: PathBuf,
}

/// An entry as observed by [`Storage::list`].
#[derive(Debug, Clone)]
pub struct EntryInfo {
    /// Display name. Lossy if the on-disk name is not UTF-8.
    pub name: String,
    /// The entry's actual location, usable even when `name` is lossy.
    pub path: PathBuf,
    pub last_modified: SystemTime,
    pub len: u64,
}

impl EntryInfo {
    /// Time elapsed since the last write. Timestamps in the future count
    /// as age zero.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.last_modified)
            .unwrap_or(Duration::ZERO)
    }
}

/// A lazy enumeration of a bucket's entries.
pub type EntryStream = Pin<Box<dyn Stream<Item = Result<EntryInfo, StorageError>> + Send>>;

/// The storage area. Cheap to clone; clones address the same directories.
#[derive(Debug, Clone)]
pub struct Storage {
    incoming: PathBuf,
    converted: PathBuf,
}

impl Storage {
    /// Open the storage area, creating both bucket directories if needed.
    ///
    /// Failure here is fatal for the process.
    pub fn open(
        incoming: impl Into<PathBuf>,
        converted: impl Into<PathBuf>,
    ) -> Result<Self, StorageError> {
        let storage = Self {
            incoming: incoming.into(),
            converted: converted.into(),
        };
        for bucket in Bucket::ALL {
            let dir = storage.dir(bucket);
            std::fs::create_dir_all(dir).map_err(|e| StorageError::CreateDir {
                path: dir.to_path_buf(),
                source: e,
            })?;
            debug!("Bucket {} ready at {}", bucket, dir.display());
        }
        Ok(storage)
    }

    /// Open the storage area at the directories named by `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self, StorageError> {
        Self::open(config.uploads_dir(), config.converted_dir())
    }

    /// Directory backing `bucket`.
    pub fn dir(&self, bucket: Bucket) -> &Path {
        match bucket {
            Bucket::Incoming => &self.incoming,
            Bucket::Converted => &self.converted,
        }
    }

    /// Handle for `name` in `bucket`, whether or not it exists.
    pub fn entry(&self, bucket: Bucket, name: &str) -> EntryRef {
        EntryRef {
            bucket,
            name: name.to_string(),
            path: self.dir(bucket).join(name),
        }
    }

    /// Write `bytes` as `name`, replacing any existing entry.
    pub async fn put(
        &self,
        bucket: Bucket,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<EntryRef, StorageError> {
        let entry = self.entry(bucket, self.checked_name(bucket, name)?);
        let dir = self.dir(bucket).to_path_buf();
        let target = entry.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &bytes))
            .await
            .map_err(|e| StorageError::Internal(format!("Write task panicked: {e}")))??;

        debug!("Stored {}/{}", bucket, entry.name);
        Ok(entry)
    }

    /// `true` if `name` is currently a regular file in `bucket`.
    pub async fn exists(&self, bucket: Bucket, name: &str) -> bool {
        if self.checked_name(bucket, name).is_err() {
            return false;
        }
        tokio::fs::metadata(self.dir(bucket).join(name))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Enumerate the entries of `bucket`.
    ///
    /// The stream reads the directory lazily. Entries removed by a concurrent
    /// actor before their metadata is read are skipped; sub-directories and
    /// other non-files are ignored. Call again to restart.
    pub async fn list(&self, bucket: Bucket) -> Result<EntryStream, StorageError> {
        let dir = self.dir(bucket).to_path_buf();
        let read_dir = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| StorageError::List {
                path: dir.clone(),
                source: e,
            })?;

        let stream = ReadDirStream::new(read_dir).filter_map(move |item| {
            let dir = dir.clone();
            async move {
                let entry = match item {
                    Ok(entry) => entry,
                    Err(e) => {
                        return Some(Err(StorageError::List {
                            path: dir,
                            source: e,
                        }))
                    }
                };
                let meta = match entry.metadata().await {
                    Ok(meta) => meta,
                    Err(e) if e.kind() == ErrorKind::NotFound => return None,
                    Err(e) => {
                        return Some(Err(StorageError::Read {
                            path: entry.path(),
                            source: e,
                        }))
                    }
                };
                if !meta.is_file() {
                    return None;
                }
                let last_modified = match meta.modified() {
                    Ok(t) => t,
                    Err(e) => {
                        return Some(Err(StorageError::Read {
                            path: entry.path(),
                            source: e,
                        }))
                    }
                };
                Some(Ok(EntryInfo {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    path: entry.path(),
                    last_modified,
                    len: meta.len(),
                }))
            }
        });

        Ok(Box::pin(stream))
    }

    /// Remove `name` from `bucket`.
    ///
    /// Idempotent: an entry that is already gone is logged and treated as
    /// deleted.
    pub async fn delete(&self, bucket: Bucket, name: &str) -> Result<(), StorageError> {
        let path = self.dir(bucket).join(self.checked_name(bucket, name)?);
        remove(path).await
    }

    /// Remove an entry observed by [`Storage::list`], addressed by its
    /// on-disk path rather than its display name.
    pub async fn delete_entry(&self, info: &EntryInfo) -> Result<(), StorageError> {
        remove(info.path.clone()).await
    }

    /// Read the full content of an entry.
    pub async fn read(&self, entry: &EntryRef) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(&entry.path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound {
                    path: entry.path.clone(),
                }
            } else {
                StorageError::Read {
                    path: entry.path.clone(),
                    source: e,
                }
            }
        })
    }

    /// Reserve a hidden temp file in `bucket` for a converter to write to.
    ///
    /// `extension` is kept as the temp file's suffix because some engines
    /// pick their output format from it.
    pub fn stage(&self, bucket: Bucket, extension: &str) -> Result<StagedEntry, StorageError> {
        let dir = self.dir(bucket).to_path_buf();
        let file = tempfile::Builder::new()
            .prefix(".stage-")
            .suffix(&format!(".{extension}"))
            .tempfile_in(&dir)
            .map_err(|e| StorageError::Write {
                path: dir.clone(),
                source: e,
            })?;

        Ok(StagedEntry {
            path: file.into_temp_path(),
            bucket,
            dir,
        })
    }

    /// Buckets are flat: reject names that would address anything but a
    /// direct child of the bucket directory.
    fn checked_name<'a>(&self, bucket: Bucket, name: &'a str) -> Result<&'a str, StorageError> {
        let flat = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains('/')
            && !name.contains('\\')
            && !name.contains('\0');
        if flat {
            Ok(name)
        } else {
            Err(StorageError::Write {
                path: self.dir(bucket).join(name),
                source: std::io::Error::new(ErrorKind::InvalidInput, "entry names must be flat"),
            })
        }
    }
}

/// Output file being produced by a converter.
///
/// Dropping it without [`StagedEntry::commit`] removes the partial file.
#[derive(Debug)]
pub struct StagedEntry {
    path: TempPath,
    bucket: Bucket,
    dir: PathBuf,
}

impl StagedEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `true` if the converter left a non-empty regular file.
    pub fn is_populated(&self) -> bool {
        std::fs::metadata(self.path())
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Rename the staged file to `name`, replacing any existing entry.
    pub fn commit(self, name: &str) -> Result<EntryRef, StorageError> {
        let target = self.dir.join(name);
        self.path.persist(&target).map_err(|e| {
            if e.error.kind() == ErrorKind::NotFound {
                StorageError::NotFound {
                    path: target.clone(),
                }
            } else {
                StorageError::Write {
                    path: target.clone(),
                    source: e.error,
                }
            }
        })?;

        Ok(EntryRef {
            bucket: self.bucket,
            name: name.to_string(),
            path: target,
        })
    }
}

fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let write_err = |e: std::io::Error| StorageError::Write {
        path: target.to_path_buf(),
        source: e,
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".upload-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(target).map_err(|e| write_err(e.error))?;
    Ok(())
}

async fn remove(path: PathBuf) -> Result<(), StorageError> {
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            info!("[DELETED] {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} already removed", path.display());
            Ok(())
        }
        Err(e) => Err(StorageError::Delete { path, source: e }),
    }
}

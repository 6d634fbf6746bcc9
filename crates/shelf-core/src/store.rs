//! Record store
//!
//! A store is a directory holding:
//! - `records/<id>.json` - one file per bibliographic record
//! - `files/<id>.pdf` - optional attachment for a record
//!
//! ## Filename invariant
//!
//! Every record file is named after the key it contains. `load_all` enforces
//! this on every load:
//! - records without an `id` get a generated key
//! - records whose file name differs from their key are rewritten to
//!   `<id>.json` and the old file is removed afterwards
//!
//! The key is authoritative; the file name is what gets corrected.
//! Writes go through a temp file and a rename so an interrupted load never
//! leaves a half-written record, and the old file is only removed once the
//! new one is in place.
//!
//! Concurrent use of one store from several processes is not supported.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::key;
use crate::models::{Entry, Metadata, Record};

/// Directory holding record files
pub const RECORDS_DIR: &str = "records";
/// Directory holding attachments
pub const FILES_DIR: &str = "files";

const RECORD_EXTENSION: &str = "json";
const FILE_EXTENSION: &str = "pdf";

/// A record file that was moved to match its key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// A record that could not be loaded or reconciled
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: StoreError,
}

/// Outcome of a full store load
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Loaded entries, in file name order
    pub entries: Vec<Entry>,
    /// Per-record problems; these never abort the load
    pub failures: Vec<LoadFailure>,
    /// Files renamed to match their key
    pub renamed: Vec<Rename>,
    /// Keys generated for records that had none
    pub assigned: Vec<String>,
}

impl LoadReport {
    /// True when nothing failed and nothing had to be written
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.renamed.is_empty() && self.assigned.is_empty()
    }

    /// True when a duplicate key or occupied file name was found
    pub fn has_invariant_violations(&self) -> bool {
        self.failures.iter().any(|f| f.error.is_invariant_violation())
    }
}

/// Directory-backed record store
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
    records_dir: PathBuf,
    files_dir: PathBuf,
}

impl RecordStore {
    /// Open a store rooted at `root`, creating its directories if needed
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        let records_dir = root.join(RECORDS_DIR);
        let files_dir = root.join(FILES_DIR);

        for dir in [&records_dir, &files_dir] {
            if !dir.is_dir() {
                fs::create_dir_all(dir).map_err(|source| StoreError::CreateDirectory {
                    path: dir.clone(),
                    source,
                })?;
                debug!("Created {:?}", dir);
            }
        }

        Ok(Self {
            root,
            records_dir,
            files_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    /// Path of the record file for `id`
    pub fn record_path(&self, id: &str) -> PathBuf {
        self.records_dir
            .join(format!("{}.{}", id, RECORD_EXTENSION))
    }

    /// Path of the attachment for `id`
    pub fn file_path(&self, id: &str) -> PathBuf {
        self.files_dir.join(format!("{}.{}", id, FILE_EXTENSION))
    }

    /// Check whether a record file exists for `id`
    pub fn has_record(&self, id: &str) -> bool {
        key::is_valid_key(id) && self.record_path(id).is_file()
    }

    /// Load every record and bring file names in line with keys
    ///
    /// Only an unreadable records directory fails the whole call. Problems
    /// with individual files are collected in `LoadReport::failures`.
    pub fn load_all(&self) -> StoreResult<LoadReport> {
        let mut report = LoadReport::default();
        let mut loaded: Vec<(PathBuf, Record)> = Vec::new();
        let mut taken: HashSet<String> = HashSet::new();

        for path in self.record_files()? {
            match self.read_record(&path) {
                Ok(record) => {
                    debug!("Loaded {:?}", path);
                    loaded.push((path, record));
                }
                Err(error) => {
                    warn!("Skipping {:?}: {}", path, error);
                    // Keep generated keys from landing on an unreadable file
                    if let Some(stem) = file_stem(&path) {
                        taken.insert(stem);
                    }
                    report.failures.push(LoadFailure { path, error });
                }
            }
        }

        // Which file owns each stored key. A file already named after its
        // key wins over copies elsewhere.
        let mut owners: HashMap<String, PathBuf> = HashMap::new();
        for (path, record) in &loaded {
            if let Some(id) = record.id() {
                taken.insert(id.to_string());
                let named_after = *path == self.record_path(id);
                if named_after || !owners.contains_key(id) {
                    owners.insert(id.to_string(), path.clone());
                }
            }
        }

        let mut pending: Vec<PendingWrite> = Vec::new();
        for (path, record) in loaded {
            let (entry, fresh) = match record {
                Record::Assigned(entry) => (entry, false),
                Record::Unassigned(metadata) => {
                    let id = key::generate(&metadata, &taken);
                    taken.insert(id.clone());
                    info!("Assigned key '{}' to {:?}", id, path);
                    report.assigned.push(id.clone());
                    (Entry::new(id, metadata), true)
                }
            };

            if let Some(owner) = owners.get(entry.id()).filter(|owner| **owner != path) {
                let error = StoreError::DuplicateId {
                    id: entry.id().to_string(),
                    path: path.clone(),
                    existing: owner.clone(),
                };
                warn!("{}", error);
                report.failures.push(LoadFailure { path, error });
                report.entries.push(entry);
                continue;
            }

            let target = self.record_path(entry.id());
            if path != target || fresh {
                match codec::encode(&entry) {
                    Ok(content) => pending.push(PendingWrite::new(path, target, content)),
                    Err(e) => report.failures.push(LoadFailure {
                        path,
                        error: e.into(),
                    }),
                }
            }
            report.entries.push(entry);
        }

        self.reconcile(pending, &mut report);
        Ok(report)
    }

    /// Store a new record and return its key
    ///
    /// The key is unique against a fresh load of the whole store and
    /// against every existing record file name.
    pub fn create(&self, metadata: Metadata) -> StoreResult<String> {
        let report = self.load_all()?;

        let mut taken: HashSet<String> =
            report.entries.iter().map(|e| e.id().to_string()).collect();
        taken.extend(self.record_files()?.iter().filter_map(|p| file_stem(p)));

        let id = key::generate(&metadata, &taken);
        let entry = Entry::new(id, metadata);
        self.write_record(&self.record_path(entry.id()), &entry)?;

        info!("Created record '{}'", entry.id());
        Ok(entry.id().to_string())
    }

    /// Move `source` into the store as the attachment of `id`
    ///
    /// Refuses to touch anything when `id` has no record or `source` does
    /// not exist. An existing attachment for `id` is replaced.
    pub fn attach(&self, id: &str, source: &Path) -> StoreResult<PathBuf> {
        if !self.has_record(id) {
            return Err(StoreError::UnknownRecord { id: id.to_string() });
        }
        if !source.is_file() {
            return Err(StoreError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        let target = self.file_path(id);
        move_file(source, &target)?;

        info!("Attached {:?} to '{}'", source, id);
        Ok(target)
    }

    /// Keys that have an attachment, sorted
    pub fn attachments(&self) -> StoreResult<Vec<String>> {
        let mut ids: Vec<String> = list_files(&self.files_dir, FILE_EXTENSION)?
            .iter()
            .filter_map(|p| file_stem(p))
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Record files, sorted by name
    fn record_files(&self) -> StoreResult<Vec<PathBuf>> {
        let mut paths = list_files(&self.records_dir, RECORD_EXTENSION)?;
        paths.sort();
        Ok(paths)
    }

    fn read_record(&self, path: &Path) -> StoreResult<Record> {
        let content = fs::read(path).map_err(|source| StoreError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        codec::decode(&content).map_err(|e| StoreError::Malformed {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
    }

    fn write_record(&self, path: &Path, entry: &Entry) -> StoreResult<()> {
        let content = codec::encode(entry)?;
        atomic_write(path, content.as_bytes())
    }

    /// Write every pending record to `<id>.json`
    ///
    /// A target counts as free when nothing is there or when its current
    /// file is itself being moved in this pass, so swapped and chained
    /// names settle in one load. All targets are staged before any is put
    /// in place, and a source is only removed once its record sits at its
    /// target and no other record was written over it.
    fn reconcile(&self, mut pending: Vec<PendingWrite>, report: &mut LoadReport) {
        for write in take_blocked(&mut pending) {
            report_occupied(write, report);
        }

        let mut staged = Vec::with_capacity(pending.len());
        for write in pending {
            match write_synced(&write.temp, write.content.as_bytes()) {
                Ok(()) => staged.push(write),
                Err(error) => {
                    let _ = fs::remove_file(&write.temp);
                    warn!("Could not write {:?}: {}", write.to, error);
                    report.failures.push(LoadFailure {
                        path: write.from,
                        error,
                    });
                }
            }
        }

        // A source that failed to stage stays put and may block others
        for write in take_blocked(&mut staged) {
            let _ = fs::remove_file(&write.temp);
            report_occupied(write, report);
        }

        let mut committed = Vec::with_capacity(staged.len());
        for write in staged {
            match fs::rename(&write.temp, &write.to) {
                Ok(()) => committed.push(write),
                Err(source) => {
                    let _ = fs::remove_file(&write.temp);
                    let error = StoreError::AtomicWriteFailed {
                        from: write.temp.clone(),
                        to: write.to.clone(),
                        source,
                    };
                    warn!("Could not write {:?}: {}", write.to, error);
                    report.failures.push(LoadFailure {
                        path: write.from,
                        error,
                    });
                }
            }
        }

        let written: HashSet<PathBuf> = committed.iter().map(|w| w.to.clone()).collect();
        for write in committed.into_iter().filter(PendingWrite::is_move) {
            if !written.contains(&write.from) {
                if let Err(source) = fs::remove_file(&write.from) {
                    let error = StoreError::RemoveError {
                        path: write.from.clone(),
                        source,
                    };
                    warn!("{}", error);
                    report.failures.push(LoadFailure {
                        path: write.from,
                        error,
                    });
                    continue;
                }
            }

            info!("Renamed {:?} to {:?}", write.from, write.to);
            report.renamed.push(Rename {
                from: write.from,
                to: write.to,
            });
        }
    }
}

/// A record that has to be (re)written at its key's file name
#[derive(Debug)]
struct PendingWrite {
    from: PathBuf,
    to: PathBuf,
    temp: PathBuf,
    content: String,
}

impl PendingWrite {
    fn new(from: PathBuf, to: PathBuf, content: String) -> Self {
        let temp = to.with_extension("tmp");
        Self {
            from,
            to,
            temp,
            content,
        }
    }

    /// False for a freshly keyed record rewritten under its own name
    fn is_move(&self) -> bool {
        self.from != self.to
    }
}

/// Remove and return moves whose target holds a file that stays put
///
/// Repeats until stable, since a blocked move keeps its own source in place.
fn take_blocked(pending: &mut Vec<PendingWrite>) -> Vec<PendingWrite> {
    let mut blocked = Vec::new();
    loop {
        let vacated: HashSet<PathBuf> = pending
            .iter()
            .filter(|w| w.is_move())
            .map(|w| w.from.clone())
            .collect();

        let (free, stuck): (Vec<_>, Vec<_>) = pending
            .drain(..)
            .partition(|w| !w.is_move() || !w.to.exists() || vacated.contains(&w.to));
        *pending = free;

        if stuck.is_empty() {
            return blocked;
        }
        blocked.extend(stuck);
    }
}

fn report_occupied(write: PendingWrite, report: &mut LoadReport) {
    let error = StoreError::TargetOccupied {
        from: write.from.clone(),
        to: write.to,
    };
    warn!("{}", error);
    report.failures.push(LoadFailure {
        path: write.from,
        error,
    });
}

/// Regular files in `dir` with the given extension
fn list_files(dir: &Path, extension: &str) -> StoreResult<Vec<PathBuf>> {
    let read_dir = fs::read_dir(dir).map_err(|source| StoreError::ReadDirectory {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for item in read_dir {
        let item = item.map_err(|source| StoreError::ReadDirectory {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = item.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            paths.push(path);
        }
    }
    Ok(paths)
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> StoreResult<()> {
    let temp_path = path.with_extension("tmp");
    write_synced(&temp_path, data)?;

    fs::rename(&temp_path, path).map_err(|source| {
        let _ = fs::remove_file(&temp_path);
        StoreError::AtomicWriteFailed {
            from: temp_path.clone(),
            to: path.to_path_buf(),
            source,
        }
    })
}

/// Write and sync a file in place
fn write_synced(path: &Path, data: &[u8]) -> StoreResult<()> {
    let mut file = File::create(path).map_err(|e| StoreError::from_io(e, path.to_path_buf()))?;
    file.write_all(data)
        .map_err(|e| StoreError::from_io(e, path.to_path_buf()))?;
    file.sync_all()
        .map_err(|e| StoreError::from_io(e, path.to_path_buf()))
}

/// Rename, falling back to copy + delete across filesystems
fn move_file(source: &Path, target: &Path) -> StoreResult<()> {
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }

    fs::copy(source, target).map_err(|e| StoreError::from_io(e, target.to_path_buf()))?;
    if let Err(e) = fs::remove_file(source) {
        warn!("Copied {:?} but could not remove it: {}", source, e);
    }
    Ok(())
}

/// Save an export file atomically
pub(crate) fn write_export(path: &Path, content: &str) -> StoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    atomic_write(path, content.as_bytes())
}

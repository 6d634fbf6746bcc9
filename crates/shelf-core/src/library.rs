//! Library: the in-memory view of a record store
//!
//! The `Library` loads every record through the `RecordStore` and keeps the
//! entries in load order. Every mutation goes to disk first and is followed
//! by a full reload, so the in-memory index is always what the store holds.
//!
//! ## Usage
//!
//! ```ignore
//! let mut library = Library::open("/home/me/.pandoc")?;
//!
//! let id = library.new_entry(metadata)?;
//! library.attach(&id, Path::new("paper.pdf"))?;
//! library.write(None, None)?; // -> default.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use crate::codec;
use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::models::{Entry, Metadata};
use crate::sources::{MetadataSource, PdfSource};
use crate::store::{write_export, LoadReport, RecordStore};

/// File name of the export written when no destination is given
pub const DEFAULT_EXPORT: &str = "default.json";

/// Addressable collection of bibliographic entries
#[derive(Debug)]
pub struct Library {
    store: RecordStore,
    report: LoadReport,
}

impl Library {
    /// Open the library rooted at `root` and load it
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let store = RecordStore::open(root)?;
        let mut library = Self {
            store,
            report: LoadReport::default(),
        };
        library.read()?;
        Ok(library)
    }

    /// Open the library configured in `config`
    pub fn open_with_config(config: &Config) -> StoreResult<Self> {
        Self::open(config.library_dir.clone())
    }

    /// Root directory of the library
    pub fn path(&self) -> &Path {
        self.store.root()
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Reload every record from disk
    ///
    /// File names are reconciled with keys as part of the load.
    pub fn read(&mut self) -> StoreResult<&LoadReport> {
        self.report = self.store.load_all()?;
        Ok(&self.report)
    }

    /// Report of the most recent load
    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// All entries, in load order
    pub fn entries(&self) -> &[Entry] {
        &self.report.entries
    }

    /// All keys, in load order
    pub fn keys(&self) -> Vec<&str> {
        self.entries().iter().map(Entry::id).collect()
    }

    /// Look up an entry by key
    ///
    /// Returns `None` when no entry, or more than one entry, has this key.
    pub fn entry(&self, id: &str) -> Option<&Entry> {
        let mut matches = self.entries().iter().filter(|e| e.id() == id);
        match (matches.next(), matches.next()) {
            (Some(entry), None) => Some(entry),
            _ => None,
        }
    }

    /// Where `write` saves when no destination is given
    pub fn default_export_path(&self) -> PathBuf {
        self.path().join(DEFAULT_EXPORT)
    }

    /// Export entries as a single JSON array
    ///
    /// `ids` restricts the export to those keys; order always follows the
    /// library. Returns the number of entries written.
    pub fn write(&self, destination: Option<&Path>, ids: Option<&[String]>) -> StoreResult<usize> {
        let destination = destination
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_export_path());

        let selected: Vec<&Entry> = self
            .entries()
            .iter()
            .filter(|e| ids.map_or(true, |ids| ids.iter().any(|id| id == e.id())))
            .collect();

        let content = codec::encode_all(selected.iter().copied())?;
        write_export(&destination, &content)?;

        info!("Exported {} entries to {:?}", selected.len(), destination);
        Ok(selected.len())
    }

    /// Add a new entry and return its key
    ///
    /// The library is reloaded from disk afterwards.
    pub fn new_entry(&mut self, metadata: Metadata) -> StoreResult<String> {
        let id = self.store.create(metadata)?;
        self.read()?;
        Ok(id)
    }

    /// Attach a file to an existing entry as `files/<id>.pdf`
    pub fn attach(&self, id: &str, source: &Path) -> StoreResult<PathBuf> {
        if self.entry(id).is_none() {
            return Err(StoreError::UnknownRecord { id: id.to_string() });
        }
        self.store.attach(id, source)
    }

    /// Path of the attachment for `id`, if one exists
    pub fn attachment(&self, id: &str) -> Option<PathBuf> {
        self.entry(id)?;
        let path = self.store.file_path(id);
        path.is_file().then_some(path)
    }

    /// Attachments whose key matches no entry
    ///
    /// Changing a record's key leaves its old attachment behind.
    pub fn orphaned_files(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .store
            .attachments()?
            .into_iter()
            .filter(|id| self.entry(id).is_none())
            .collect())
    }

    /// Resolve a DOI and add the result as a new entry
    ///
    /// Returns `Ok(None)` when the source does not know the DOI.
    pub fn import_doi(&mut self, doi: &str, source: &dyn MetadataSource) -> Result<Option<String>> {
        let Some(metadata) = source
            .resolve(doi)
            .with_context(|| format!("Failed to resolve DOI {}", doi))?
        else {
            return Ok(None);
        };

        let id = self
            .new_entry(metadata)
            .with_context(|| format!("Failed to store metadata for DOI {}", doi))?;
        Ok(Some(id))
    }

    /// Download the PDF of an entry through its DOI and attach it
    pub fn fetch_pdf(&self, id: &str, source: &dyn PdfSource) -> Result<PathBuf> {
        let entry = self
            .entry(id)
            .ok_or_else(|| anyhow!("No record with key '{}'", id))?;
        let doi = entry
            .metadata()
            .doi()
            .ok_or_else(|| anyhow!("Record '{}' has no DOI", id))?;

        let downloaded = source
            .fetch(doi)
            .with_context(|| format!("Failed to fetch PDF for {}", doi))?;

        self.attach(id, &downloaded).map_err(|e| {
            if let Err(remove) = fs::remove_file(&downloaded) {
                warn!("Could not remove download {:?}: {}", downloaded, remove);
            }
            anyhow::Error::new(e).context(format!("Failed to attach PDF to '{}'", id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use tempfile::TempDir;

    fn metadata(value: Value) -> Metadata {
        Metadata::from_value(value).unwrap()
    }

    fn watson() -> Metadata {
        metadata(json!({
            "author": "Watson",
            "year": 1953,
            "title": "The Structure of DNA",
            "DOI": "10.1038/171737a0"
        }))
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    struct FakeResolver {
        known: HashMap<String, Metadata>,
    }

    impl MetadataSource for FakeResolver {
        fn resolve(&self, doi: &str) -> Result<Option<Metadata>> {
            Ok(self.known.get(doi).cloned())
        }
    }

    struct FakePdf {
        dir: PathBuf,
        requested: RefCell<Vec<String>>,
    }

    impl PdfSource for FakePdf {
        fn fetch(&self, doi: &str) -> Result<PathBuf> {
            self.requested.borrow_mut().push(doi.to_string());
            let path = self.dir.join("download.pdf");
            fs::write(&path, b"%PDF-1.7 fake")?;
            Ok(path)
        }
    }

    #[test]
    fn test_open_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let library = Library::open(temp_dir.path()).unwrap();

        assert_eq!(library.path(), temp_dir.path());
        assert!(temp_dir.path().join("records").is_dir());
        assert!(temp_dir.path().join("files").is_dir());
        assert!(library.keys().is_empty());
    }

    #[test]
    fn test_open_with_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            library_dir: temp_dir.path().join("lib"),
            ..Config::default()
        };

        let library = Library::open_with_config(&config).unwrap();

        assert_eq!(library.path(), temp_dir.path().join("lib"));
    }

    #[test]
    fn test_new_entry_watson_scenario() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::open(temp_dir.path()).unwrap();

        let first = library.new_entry(watson()).unwrap();
        let second = library.new_entry(watson()).unwrap();

        assert_eq!(first, "wats1953SD");
        assert_eq!(second, "wats1953SD2");
        assert_eq!(library.keys(), vec!["wats1953SD", "wats1953SD2"]);
        assert_eq!(
            library.entry("wats1953SD").unwrap().metadata().title(),
            Some("The Structure of DNA")
        );
    }

    #[test]
    fn test_ids_pairwise_distinct() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::open(temp_dir.path()).unwrap();

        let samples = [
            watson(),
            watson(),
            Metadata::new(),
            Metadata::new(),
            metadata(json!({"author": "WATSON", "year": "1953", "title": "Structure, DNA"})),
        ];
        for m in samples {
            library.new_entry(m).unwrap();
        }

        let keys = library.keys();
        let unique: HashSet<&str> = keys.iter().copied().collect();
        assert_eq!(keys.len(), 5);
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn test_entry_nonexistent_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let library = Library::open(temp_dir.path()).unwrap();

        assert!(library.entry("nonexistent").is_none());
    }

    #[test]
    fn test_entry_with_duplicate_key_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let records = temp_dir.path().join("records");
        fs::create_dir_all(&records).unwrap();
        fs::write(records.join("dup.json"), r#"{"id": "dup"}"#).unwrap();
        fs::write(records.join("other.json"), r#"{"id": "dup"}"#).unwrap();

        let library = Library::open(temp_dir.path()).unwrap();

        assert_eq!(library.keys(), vec!["dup", "dup"]);
        assert!(library.entry("dup").is_none());
        assert!(library.report().has_invariant_violations());
    }

    #[test]
    fn test_read_heals_renamed_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::open(temp_dir.path()).unwrap();
        let id = library.new_entry(watson()).unwrap();

        let records = temp_dir.path().join("records");
        fs::rename(records.join(format!("{}.json", id)), records.join("moved.json")).unwrap();

        let report = library.read().unwrap();
        assert_eq!(report.renamed.len(), 1);
        assert_eq!(file_names(&records), vec!["wats1953SD.json"]);
        assert!(library.entry("wats1953SD").is_some());
    }

    #[test]
    fn test_write_default_path() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::open(temp_dir.path()).unwrap();
        library.new_entry(watson()).unwrap();

        let count = library.write(None, None).unwrap();

        assert_eq!(count, 1);
        let exported: Vec<Value> = serde_json::from_str(
            &fs::read_to_string(temp_dir.path().join("default.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0]["id"], json!("wats1953SD"));
        assert_eq!(exported[0]["title"], json!("The Structure of DNA"));
    }

    #[test]
    fn test_write_filtered_keeps_library_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::open(temp_dir.path()).unwrap();
        library
            .new_entry(metadata(json!({"author": "Crick", "year": 1953})))
            .unwrap();
        library.new_entry(watson()).unwrap();
        library
            .new_entry(metadata(json!({"author": "Franklin", "year": 1953})))
            .unwrap();

        let destination = temp_dir.path().join("out").join("subset.json");
        let ids = vec!["wats1953SD".to_string(), "cric1953".to_string()];
        let count = library.write(Some(&destination), Some(&ids)).unwrap();

        assert_eq!(count, 2);
        let exported: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(&destination).unwrap()).unwrap();
        let exported_ids: Vec<&str> = exported.iter().map(|v| v["id"].as_str().unwrap()).collect();
        assert_eq!(exported_ids, vec!["cric1953", "wats1953SD"]);
    }

    #[test]
    fn test_attach_valid_and_missing() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::open(temp_dir.path()).unwrap();
        let id = library.new_entry(watson()).unwrap();
        let files = temp_dir.path().join("files");

        let pdf = temp_dir.path().join("paper.pdf");
        fs::write(&pdf, b"%PDF").unwrap();
        library.attach(&id, &pdf).unwrap();
        assert_eq!(file_names(&files), vec!["wats1953SD.pdf"]);
        assert_eq!(library.attachment(&id), Some(files.join("wats1953SD.pdf")));

        let other = temp_dir.path().join("other.pdf");
        fs::write(&other, b"%PDF").unwrap();
        let result = library.attach("missingId", &other);
        assert!(matches!(result, Err(StoreError::UnknownRecord { .. })));
        assert_eq!(file_names(&files), vec!["wats1953SD.pdf"]);
        assert!(other.exists());
    }

    #[test]
    fn test_orphaned_files() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::open(temp_dir.path()).unwrap();
        let id = library.new_entry(watson()).unwrap();

        let files = temp_dir.path().join("files");
        fs::write(files.join(format!("{}.pdf", id)), b"%PDF").unwrap();
        fs::write(files.join("gone1999.pdf"), b"%PDF").unwrap();

        assert_eq!(library.orphaned_files().unwrap(), vec!["gone1999".to_string()]);
    }

    #[test]
    fn test_import_doi() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::open(temp_dir.path()).unwrap();
        let resolver = FakeResolver {
            known: HashMap::from([("10.1038/171737a0".to_string(), watson())]),
        };

        let id = library.import_doi("10.1038/171737a0", &resolver).unwrap();
        assert_eq!(id.as_deref(), Some("wats1953SD"));

        let missing = library.import_doi("ThisIsNotADOI", &resolver).unwrap();
        assert!(missing.is_none());
        assert_eq!(library.keys().len(), 1);
    }

    #[test]
    fn test_fetch_pdf_attaches_download() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::open(temp_dir.path()).unwrap();
        let id = library.new_entry(watson()).unwrap();
        let fetcher = FakePdf {
            dir: temp_dir.path().to_path_buf(),
            requested: RefCell::new(Vec::new()),
        };

        let path = library.fetch_pdf(&id, &fetcher).unwrap();

        assert_eq!(*fetcher.requested.borrow(), vec!["10.1038/171737a0".to_string()]);
        assert_eq!(path, temp_dir.path().join("files").join("wats1953SD.pdf"));
        assert!(path.is_file());
    }

    #[test]
    fn test_fetch_pdf_removes_download_when_attach_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::open(temp_dir.path()).unwrap();
        let id = library.new_entry(watson()).unwrap();
        let fetcher = FakePdf {
            dir: temp_dir.path().to_path_buf(),
            requested: RefCell::new(Vec::new()),
        };

        // Record file disappears between load and attach
        fs::remove_file(library.store().record_path(&id)).unwrap();

        assert!(library.fetch_pdf(&id, &fetcher).is_err());
        assert_eq!(fetcher.requested.borrow().len(), 1);
        assert!(!temp_dir.path().join("download.pdf").exists());
        assert!(file_names(&temp_dir.path().join("files")).is_empty());
    }

    #[test]
    fn test_fetch_pdf_requires_doi() {
        let temp_dir = TempDir::new().unwrap();
        let mut library = Library::open(temp_dir.path()).unwrap();
        let id = library
            .new_entry(metadata(json!({"author": "Crick", "year": 1953})))
            .unwrap();
        let fetcher = FakePdf {
            dir: temp_dir.path().to_path_buf(),
            requested: RefCell::new(Vec::new()),
        };

        assert!(library.fetch_pdf(&id, &fetcher).is_err());
        assert!(library.fetch_pdf("nonexistent", &fetcher).is_err());
        assert!(fetcher.requested.borrow().is_empty());
    }
}

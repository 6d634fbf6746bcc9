//! shelf Core Library
//!
//! This crate provides the core functionality for shelf, a personal
//! bibliography kept as one JSON file per record.
//!
//! # Architecture
//!
//! - **Citation keys**: every record is identified by a short key built from
//!   its author, year and title (`wats1953SD`)
//! - **Files as storage**: `records/<key>.json` and `files/<key>.pdf`
//!
//! Loading the library reconciles file names with keys, so the directory
//! always converges back to one `<key>.json` per record.
//!
//! # Quick Start
//!
//! ```text
//! let mut library = Library::open("/home/me/.pandoc")?;
//!
//! // Add a record
//! let id = library.new_entry(metadata)?;
//!
//! // Query records
//! let entry = library.entry(&id);
//! ```
//!
//! # Modules
//!
//! - `library`: In-memory collection (main entry point)
//! - `store`: Record files and the file name invariant
//! - `key`: Citation key generation
//! - `codec`: Record file encoding
//! - `models`: Metadata, records and entries
//! - `sources`: DOI and PDF collaborators
//! - `config`: Application configuration

pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod library;
pub mod models;
pub mod sources;
pub mod store;

pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use library::Library;
pub use models::{Entry, Metadata, Record};
pub use sources::{MetadataSource, PdfSource};
pub use store::{LoadFailure, LoadReport, RecordStore, Rename};

//! Data models for shelf
//!
//! Defines the bibliographic data structures:
//! - `Metadata`: an open-ended JSON object describing one work
//! - `Record`: metadata that may or may not have been given a key yet
//! - `Entry`: a record with an assigned key, as held by a `Library`
//!
//! The `id` field is never stored inside `Metadata`. It lives on `Entry`
//! and is only written back into the JSON object by the codec.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Name of the field carrying the citation key in record files
pub const ID_FIELD: &str = "id";

/// Bibliographic metadata (CSL-JSON or hand-written fields)
///
/// No field is required. The accessors below understand the shapes
/// produced by DOI content negotiation as well as simple hand-authored
/// records such as `{"author": "Watson", "year": 1953, "title": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON object, dropping any `id` field it carries
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        map.remove(ID_FIELD);
        Self(map)
    }

    /// Convert a JSON value into metadata
    ///
    /// Returns `None` unless the value is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from_map(map)),
            _ => None,
        }
    }

    /// Set a field (the `id` field is ignored)
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        if field != ID_FIELD {
            self.0.insert(field, value.into());
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Surname of the primary author
    ///
    /// Accepts a CSL author array (`family`, `literal` or `name` keys),
    /// an array of name strings, or a single string such as
    /// `"Watson, J. D."`, `"James Watson"` or `"Watson and Crick"`.
    pub fn first_author_surname(&self) -> Option<String> {
        match self.0.get("author")? {
            Value::Array(authors) => authors.iter().find_map(author_surname),
            other => author_surname(other),
        }
    }

    /// Four-digit publication year
    ///
    /// Reads `year` first, then the CSL date fields.
    pub fn year(&self) -> Option<String> {
        if let Some(year) = self.0.get("year").and_then(year_from_value) {
            return Some(year);
        }

        ["issued", "published-print", "published-online", "created"]
            .iter()
            .filter_map(|field| self.0.get(*field))
            .find_map(year_from_date_parts)
    }

    /// Title, or the first entry of a title array
    pub fn title(&self) -> Option<&str> {
        let title = match self.0.get("title")? {
            Value::String(s) => s.as_str(),
            Value::Array(items) => items.iter().find_map(Value::as_str)?,
            _ => return None,
        };
        let title = title.trim();
        (!title.is_empty()).then_some(title)
    }

    /// DOI, from either `DOI` (CSL) or `doi`
    pub fn doi(&self) -> Option<&str> {
        ["DOI", "doi"]
            .iter()
            .find_map(|field| self.0.get(*field).and_then(Value::as_str))
            .map(str::trim)
            .filter(|doi| !doi.is_empty())
    }
}

/// Extract a surname from a single author value
fn author_surname(value: &Value) -> Option<String> {
    match value {
        Value::String(name) => surname_from_name(name),
        Value::Object(fields) => {
            if let Some(family) = fields.get("family").and_then(Value::as_str) {
                let family = family.trim();
                if !family.is_empty() {
                    return Some(family.to_string());
                }
            }
            ["literal", "name"]
                .iter()
                .find_map(|field| fields.get(*field).and_then(Value::as_str))
                .and_then(surname_from_name)
        }
        _ => None,
    }
}

/// Surname of the first person in a free-form name list
fn surname_from_name(names: &str) -> Option<String> {
    let first = names
        .split(';')
        .next()
        .and_then(|s| s.split(" and ").next())
        .unwrap_or(names)
        .trim();

    if first.is_empty() {
        return None;
    }

    // "Last, First"
    if let Some((last, _)) = first.split_once(',') {
        let last = last.trim();
        return (!last.is_empty()).then(|| last.to_string());
    }

    // "First Last"
    first.split_whitespace().last().map(str::to_string)
}

fn year_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .filter(|y| (1000..=9999).contains(y))
            .map(|y| y.to_string()),
        Value::String(s) => first_four_digit_run(s),
        _ => None,
    }
}

/// `{"date-parts": [[1953, 4, 25]]}` -> "1953"
fn year_from_date_parts(value: &Value) -> Option<String> {
    value
        .get("date-parts")?
        .get(0)?
        .get(0)
        .and_then(year_from_value)
}

/// First run of exactly four ASCII digits
fn first_four_digit_run(s: &str) -> Option<String> {
    s.split(|c: char| !c.is_ascii_digit())
        .find(|run| run.len() == 4)
        .map(str::to_string)
}

/// A record as read from disk or supplied by a caller
///
/// Records start out `Unassigned`; only the record store turns them into
/// `Assigned` entries.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// No citation key yet
    Unassigned(Metadata),
    /// Carries a citation key
    Assigned(Entry),
}

impl Record {
    pub fn metadata(&self) -> &Metadata {
        match self {
            Record::Unassigned(metadata) => metadata,
            Record::Assigned(entry) => &entry.metadata,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Record::Unassigned(_) => None,
            Record::Assigned(entry) => Some(&entry.id),
        }
    }
}

/// A record with its citation key
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    id: String,
    metadata: Metadata,
}

impl Entry {
    /// Only the codec (decoding a stored id) and the store (assigning a
    /// fresh id) create entries.
    pub(crate) fn new(id: String, metadata: Metadata) -> Self {
        Self { id, metadata }
    }

    /// The citation key
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Metadata without the `id` field
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Metadata with the `id` field embedded, as written to disk and exported
    pub fn content(&self) -> Map<String, Value> {
        let mut content = self.metadata.as_map().clone();
        content.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        content
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.content().serialize(serializer)
    }
}

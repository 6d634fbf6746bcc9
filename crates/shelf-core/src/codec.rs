//! Record file encoding
//!
//! Record files are pretty-printed JSON objects. Keys are written in sorted
//! order so that rewriting an unchanged record produces an identical file.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::key::is_valid_key;
use crate::models::{Entry, Metadata, Record, ID_FIELD};

/// Errors produced while decoding a record file
#[derive(Error, Debug)]
pub enum CodecError {
    /// Content is not a JSON object or carries an unusable id
    #[error("{0}")]
    Malformed(String),
}

/// Decode a record file
///
/// A missing, `null` or empty `id` yields `Record::Unassigned`.
pub fn decode(content: &[u8]) -> Result<Record, CodecError> {
    let value: Value =
        serde_json::from_slice(content).map_err(|e| CodecError::Malformed(e.to_string()))?;

    let Value::Object(mut map) = value else {
        return Err(CodecError::Malformed(
            "expected a JSON object at the top level".to_string(),
        ));
    };

    let id = map.remove(ID_FIELD);
    let metadata = Metadata::from_map(map);

    match id {
        None | Some(Value::Null) => Ok(Record::Unassigned(metadata)),
        Some(Value::String(id)) if id.trim().is_empty() => Ok(Record::Unassigned(metadata)),
        Some(Value::String(id)) if is_valid_key(&id) => {
            Ok(Record::Assigned(Entry::new(id, metadata)))
        }
        Some(Value::String(id)) => Err(CodecError::Malformed(format!(
            "id '{}' cannot be used as a file name",
            id.escape_debug()
        ))),
        Some(other) => Err(CodecError::Malformed(format!(
            "id must be a string, found {}",
            other
        ))),
    }
}

/// Encode an entry for writing to `<id>.json`
pub fn encode(entry: &Entry) -> Result<String, serde_json::Error> {
    let mut content = serde_json::to_string_pretty(&entry.content())?;
    content.push('\n');
    Ok(content)
}

/// Encode a list of entries as a JSON array of their contents
pub fn encode_all<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Result<String, serde_json::Error> {
    let contents: Vec<Map<String, Value>> = entries.into_iter().map(Entry::content).collect();
    let mut content = serde_json::to_string_pretty(&contents)?;
    content.push('\n');
    Ok(content)
}

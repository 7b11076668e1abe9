// Corpus reader — turns a JSON-lines file into ingest records, lazily.
//
// Two layouts are accepted, and may be mixed:
//   bulk-shaped:  {"index":{"_id":"7"}}  followed by the document source line
//   plain:        one document object per line, id from `_id`/`id` or the line number
//
// Bad lines become DocumentFailure records so the ingest report can count
// them; nothing here panics on input.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::store::models::{scalar_text, Document, DocumentFailure, IngestRecord};

const ACTIONS: [&str; 2] = ["index", "create"];

/// Open a corpus file for reading.
pub fn open(path: &Path) -> Result<CorpusReader<BufReader<File>>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open corpus file {}", path.display()))?;
    Ok(CorpusReader::new(BufReader::new(file)))
}

/// Iterator over the records of a JSON-lines corpus.
pub struct CorpusReader<R> {
    lines: io::Lines<R>,
    line_no: usize,
    /// Action line waiting for its source line: (line number, id it supplied).
    pending_action: Option<(usize, Option<String>)>,
    finished: bool,
}

impl<R: BufRead> CorpusReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            pending_action: None,
            finished: false,
        }
    }

    fn record(&mut self, line_no: usize, line: &str) -> Option<IngestRecord> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                // A broken source line also consumes any action waiting for it.
                self.pending_action = None;
                return Some(Err(malformed(line_no, format!("invalid JSON: {e}"))));
            }
        };
        let Value::Object(object) = value else {
            self.pending_action = None;
            return Some(Err(malformed(line_no, "expected a JSON object")));
        };

        if let Some(action_id) = bulk_action_id(&object) {
            // Two action lines in a row: the first never got its source.
            let dangling = self
                .pending_action
                .replace((line_no, action_id))
                .map(|(at, _)| Err(malformed(at, "bulk action line without a source line")));
            return dangling;
        }

        let action = self.pending_action.take();
        let id = action
            .and_then(|(_, id)| id)
            .or_else(|| object.get("_id").and_then(scalar_text))
            .or_else(|| object.get("id").and_then(scalar_text))
            .unwrap_or_else(|| line_no.to_string());

        Some(document_from(id, object).map_err(|reason| malformed(line_no, reason)))
    }
}

impl<R: BufRead> Iterator for CorpusReader<R> {
    type Item = IngestRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let Some(line) = self.lines.next() else {
                self.finished = true;
                break;
            };
            self.line_no += 1;
            let line_no = self.line_no;

            let line = match line {
                Ok(line) => line,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    return Some(Err(malformed(line_no, format!("unreadable line: {e}"))));
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(malformed(line_no, format!("read error: {e}"))));
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(record) = self.record(line_no, trimmed) {
                return Some(record);
            }
        }

        self.pending_action
            .take()
            .map(|(at, _)| Err(malformed(at, "bulk action line without a source line")))
    }
}

/// If `object` is a bulk action line, the `_id` it carries (if any).
fn bulk_action_id(object: &Map<String, Value>) -> Option<Option<String>> {
    if object.len() != 1 {
        return None;
    }
    let (action, meta) = object.iter().next()?;
    if !ACTIONS.contains(&action.as_str()) {
        return None;
    }
    let meta = meta.as_object()?;
    Some(meta.get("_id").and_then(scalar_text))
}

fn document_from(id: String, object: Map<String, Value>) -> Result<Document, String> {
    let mut document = Document::new(id);
    for (name, value) in object {
        if name == "_id" || value.is_null() {
            continue;
        }
        match scalar_text(&value) {
            Some(text) => {
                document.fields.insert(name, text);
            }
            None => return Err(format!("field `{name}` is not a scalar value")),
        }
    }
    Ok(document)
}

fn malformed(line_no: usize, reason: impl Into<String>) -> DocumentFailure {
    DocumentFailure {
        locator: format!("line {line_no}"),
        reason: reason.into(),
    }
}

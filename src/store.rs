//! ==============================================================================
//! store.rs - json record store
//! ==============================================================================
//!
//! purpose:
//!     the record store is a single json array file holding one record per zone.
//!     it is reloaded from disk and rewritten in full for every accepted packet,
//!     so nothing is kept in memory between packets.
//!
//! file format:
//!     - json array, pretty printed with 4-space indentation
//!     - ascii only: non-ascii text is written as \uXXXX escapes
//!     - numbers are written back exactly as they were received
//!     - no schema version, no checksum, no lock file
//!     - rewritten in place (truncate + write + fsync), no temp file / rename
//!
//! ==============================================================================

use crate::domain::{zone_ids_match, SensorRecord, ZONE_ID};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{Formatter, PrettyFormatter};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// result of an upsert: whether an existing zone was replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

impl Upsert {
    pub fn is_update(self) -> bool {
        self == Upsert::Updated
    }
}

/// ordered list of records, as found in the store file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    rows: Vec<Value>,
}

impl RecordStore {
    /// load the store from disk
    ///
    /// a missing, unreadable, or non-array file is an empty store.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %e,
                    "store not readable, starting empty"
                );
                return Self::default();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(rows)) => Self { rows },
            Ok(_) => {
                tracing::debug!(
                    path = %path.display(),
                    "store is not a json array, starting empty"
                );
                Self::default()
            }
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %e,
                    "store is not valid json, starting empty"
                );
                Self::default()
            }
        }
    }

    /// replace the record for this zone in place, or append it
    pub fn upsert(&mut self, record: SensorRecord) -> Upsert {
        let position = self.rows.iter().position(|row| {
            row.as_object()
                .and_then(|fields| fields.get(ZONE_ID))
                .is_some_and(|zone| zone_ids_match(zone, record.zone_id()))
        });

        match position {
            Some(index) => {
                self.rows[index] = record.into_value();
                Upsert::Updated
            }
            None => {
                self.rows.push(record.into_value());
                Upsert::Inserted
            }
        }
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// serialize as a 4-space indented, ascii-only json array
    pub fn to_pretty_json(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = AsciiPretty(PrettyFormatter::with_indent(b"    "));
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.rows.serialize(&mut serializer)?;
        Ok(out)
    }

    /// write the whole store back and force it to stable storage
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create store directory {}", parent.display())
            })?;
        }

        let bytes = self.to_pretty_json()?;
        let mut file = File::create(path)
            .with_context(|| format!("Failed to open store {}", path.display()))?;
        file.write_all(&bytes)
            .with_context(|| format!("Failed to write store {}", path.display()))?;
        file.flush()?;
        file.sync_all()
            .with_context(|| format!("Failed to sync store {}", path.display()))?;
        Ok(())
    }
}

/// pretty formatter that escapes every non-ascii char as `\uXXXX`
/// (utf-16 units, surrogate pairs above the bmp)
struct AsciiPretty<'a>(PrettyFormatter<'a>);

impl Formatter for AsciiPretty<'_> {
    fn write_string_fragment<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut rest = fragment;
        while let Some(pos) = rest.find(|c: char| !c.is_ascii()) {
            writer.write_all(rest[..pos].as_bytes())?;
            let c = rest[pos..].chars().next().unwrap_or_default();
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            rest = &rest[pos + c.len_utf8()..];
        }
        writer.write_all(rest.as_bytes())
    }

    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_array(writer)
    }

    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object(writer)
    }

    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.0.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_value(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> SensorRecord {
        SensorRecord::from_value(value).unwrap()
    }

    #[test]
    fn load_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.json");
        assert!(RecordStore::load(&missing).is_empty());

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "{not json").unwrap();
        assert!(RecordStore::load(&garbage).is_empty());

        let object = dir.path().join("object.json");
        fs::write(&object, r#"{"zone_id": "A"}"#).unwrap();
        assert!(RecordStore::load(&object).is_empty());
    }

    #[test]
    fn upsert_replaces_in_place_and_appends_new_zones() {
        let mut store = RecordStore::default();
        assert_eq!(store.upsert(record(json!({"zone_id": "A", "temp": 22}))), Upsert::Inserted);
        assert_eq!(store.upsert(record(json!({"zone_id": "B", "temp": 30}))), Upsert::Inserted);
        assert_eq!(store.upsert(record(json!({"zone_id": "A", "temp": 25}))), Upsert::Updated);

        assert_eq!(
            store.rows(),
            [json!({"zone_id": "A", "temp": 25}), json!({"zone_id": "B", "temp": 30})]
        );
    }

    #[test]
    fn replacement_drops_fields_from_the_previous_payload() {
        let mut store = RecordStore::default();
        store.upsert(record(json!({"zone_id": 4, "temp": 22, "humidity": 40})));
        store.upsert(record(json!({"zone_id": 4.0, "rainfall_mm": 3.5})));

        assert_eq!(store.len(), 1);
        assert_eq!(store.rows()[0], json!({"zone_id": 4.0, "rainfall_mm": 3.5}));
    }

    #[test]
    fn foreign_rows_are_kept_and_never_matched() {
        let mut store = RecordStore {
            rows: vec![json!("stray"), json!({"name": "no zone"}), json!({"zone_id": "A"})],
        };
        assert!(store.upsert(record(json!({"zone_id": "A", "v": 1}))).is_update());
        assert_eq!(store.len(), 3);
        assert_eq!(store.rows()[0], json!("stray"));
        assert_eq!(store.rows()[1], json!({"name": "no zone"}));
        assert_eq!(store.rows()[2], json!({"zone_id": "A", "v": 1}));
    }

    #[test]
    fn save_writes_four_space_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ui").join("sensor_data.json");

        let mut store = RecordStore::default();
        store.upsert(record(json!({"zone_id": "A", "temp": 22})));
        store.save(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "[\n    {\n        \"zone_id\": \"A\",\n        \"temp\": 22\n    }\n]"
        );
        assert_eq!(RecordStore::load(&path), store);
    }

    #[test]
    fn large_integer_zones_are_not_merged() {
        let mut store = RecordStore::default();
        let first = serde_json::from_str(r#"{"zone_id": 9007199254740992, "v": 1}"#).unwrap();
        let second = serde_json::from_str(r#"{"zone_id": 9007199254740993, "v": 2}"#).unwrap();

        assert_eq!(store.upsert(record(first)), Upsert::Inserted);
        assert_eq!(store.upsert(record(second)), Upsert::Inserted);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn big_numbers_survive_a_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensor_data.json");
        let packet = r#"{"zone_id": "A", "serial": 123456789012345678901234567890, "t": 21.50}"#;

        let mut store = RecordStore::default();
        store.upsert(record(serde_json::from_str(packet).unwrap()));
        store.save(&path).unwrap();

        // second pass reloads what the first wrote
        let mut store = RecordStore::load(&path);
        store.upsert(record(json!({"zone_id": "B"})));
        store.save(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains(r#""serial": 123456789012345678901234567890"#));
        assert!(written.contains(r#""t": 21.50"#));
    }

    #[test]
    fn non_ascii_text_is_escaped() {
        let mut store = RecordStore::default();
        store.upsert(record(json!({"zone_id": "caf\u{e9}", "note": "\u{1f327} \"rain\""})));

        let written = String::from_utf8(store.to_pretty_json().unwrap()).unwrap();
        assert!(written.is_ascii());
        assert!(written.contains(r#""zone_id": "caf\u00e9""#));
        assert!(written.contains(r#""note": "\ud83c\udf27 \"rain\"""#));

        let reparsed: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(reparsed[0]["zone_id"], json!("caf\u{e9}"));
    }

    #[test]
    fn save_shrinks_an_existing_longer_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensor_data.json");
        fs::write(&path, "x".repeat(4096)).unwrap();

        RecordStore::default().save(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }
}

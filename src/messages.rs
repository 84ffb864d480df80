//! Singer message output
//!
//! The tap talks to downstream targets over stdout, one JSON message per
//! line. Three message types exist: SCHEMA announces a stream's shape,
//! RECORD carries one extracted row, and STATE checkpoints bookmarks so an
//! interrupted run can resume.

use crate::error::Result;
use crate::state::RunState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, Write};

/// One line of tap output.
///
/// Serializes with a `type` discriminator, e.g.
/// `{"type": "RECORD", "stream": "clients", "record": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Stream schema, emitted before any of that stream's records
    Schema {
        stream: String,
        schema: Value,
        key_properties: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        bookmark_properties: Vec<String>,
    },
    /// A single extracted row
    Record {
        stream: String,
        record: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        time_extracted: Option<String>,
    },
    /// Bookmark checkpoint for resumable runs
    State { value: Value },
}

impl Message {
    /// Build a SCHEMA message
    pub fn schema(
        stream: impl Into<String>,
        schema: Value,
        key_properties: Vec<String>,
        bookmark_properties: Vec<String>,
    ) -> Self {
        Self::Schema {
            stream: stream.into(),
            schema,
            key_properties,
            bookmark_properties,
        }
    }

    /// Build a RECORD message
    pub fn record(stream: impl Into<String>, record: Value, time_extracted: Option<String>) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
            time_extracted,
        }
    }

    /// Build a STATE message from the current run state
    pub fn state(state: &RunState) -> Result<Self> {
        Ok(Self::State {
            value: serde_json::to_value(state)?,
        })
    }
}

/// Destination for tap output.
///
/// The sync engine only depends on this trait, so tests can capture
/// messages in memory instead of parsing stdout.
pub trait MessageSink: Send {
    fn write(&mut self, message: Message) -> Result<()>;
}

/// Writes messages as JSON lines, flushing after each one so a target
/// piping from the tap sees records as they are extracted.
pub struct SingerWriter<W: Write> {
    out: W,
    records_written: usize,
    states_written: usize,
}

impl SingerWriter<io::Stdout> {
    /// Writer over stdout, the normal tap destination
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> SingerWriter<W> {
    /// Create a writer over any output
    #[must_use]
    pub fn new(out: W) -> Self {
        Self {
            out,
            records_written: 0,
            states_written: 0,
        }
    }

    /// Number of RECORD messages written so far
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Number of STATE messages written so far
    #[must_use]
    pub fn states_written(&self) -> usize {
        self.states_written
    }

    /// Consume the writer and return the underlying output
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> MessageSink for SingerWriter<W> {
    fn write(&mut self, message: Message) -> Result<()> {
        let line = serde_json::to_string(&message)?;
        writeln!(self.out, "{line}")?;
        self.out.flush()?;

        match message {
            Message::Record { .. } => self.records_written += 1,
            Message::State { .. } => self.states_written += 1,
            Message::Schema { .. } => {}
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn written_lines(writer: SingerWriter<Vec<u8>>) -> Vec<Value> {
        let bytes = writer.into_inner();
        let text = String::from_utf8(bytes).unwrap();
        text.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_schema_message_shape() {
        let message = Message::schema(
            "clients",
            json!({"type": ["null", "object"]}),
            vec!["id".to_string()],
            vec!["updated_at".to_string()],
        );
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["type"], "SCHEMA");
        assert_eq!(value["stream"], "clients");
        assert_eq!(value["schema"]["type"][1], "object");
        assert_eq!(value["key_properties"], json!(["id"]));
        assert_eq!(value["bookmark_properties"], json!(["updated_at"]));
    }

    #[test]
    fn test_schema_message_omits_empty_bookmark_properties() {
        let message = Message::schema("user_roles", json!({}), vec!["user_id".to_string()], vec![]);
        let value = serde_json::to_value(&message).unwrap();

        assert!(value.get("bookmark_properties").is_none());
    }

    #[test]
    fn test_record_message_with_time_extracted() {
        let message = Message::record(
            "invoices",
            json!({"id": 1}),
            Some("2022-08-30T10:08:18.000000Z".to_string()),
        );
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["type"], "RECORD");
        assert_eq!(value["stream"], "invoices");
        assert_eq!(value["record"]["id"], 1);
        assert_eq!(value["time_extracted"], "2022-08-30T10:08:18.000000Z");
    }

    #[test]
    fn test_record_message_omits_null_time_extracted() {
        let message = Message::record("invoices", json!({"id": 1}), None);
        let value = serde_json::to_value(&message).unwrap();

        assert!(value.get("time_extracted").is_none());
    }

    #[test]
    fn test_state_message_flattens_bookmarks() {
        let mut state = RunState::default();
        state.set_bookmark("invoices", "2022-08-30T10:08:18Z");
        state.set_currently_syncing(Some("invoices"));

        let message = Message::state(&state).unwrap();
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["type"], "STATE");
        assert_eq!(value["value"]["currently_syncing"], "invoices");
        assert_eq!(value["value"]["invoices"], "2022-08-30T10:08:18Z");
    }

    #[test]
    fn test_writer_emits_one_line_per_message() {
        let mut writer = SingerWriter::new(Vec::new());
        writer
            .write(Message::schema("clients", json!({}), vec![], vec![]))
            .unwrap();
        writer
            .write(Message::record("clients", json!({"id": 7}), None))
            .unwrap();
        writer
            .write(Message::state(&RunState::default()).unwrap())
            .unwrap();

        assert_eq!(writer.records_written(), 1);
        assert_eq!(writer.states_written(), 1);

        let lines = written_lines(writer);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["type"], "SCHEMA");
        assert_eq!(lines[1]["type"], "RECORD");
        assert_eq!(lines[2]["type"], "STATE");
        assert!(lines[2]["value"]["currently_syncing"].is_null());
    }

    #[test]
    fn test_message_round_trip() {
        let message = Message::record("tasks", json!({"id": 3, "name": "Design"}), None);
        let line = serde_json::to_string(&message).unwrap();
        let parsed: Message = serde_json::from_str(&line).unwrap();

        assert_eq!(parsed, message);
    }
}

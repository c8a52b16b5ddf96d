//! The file tools exposed to agent callers, plus a JSON dispatcher.
//!
//! A call is one JSON object tagged by `"tool"`:
//!
//! ```json
//! {"tool": "append_file", "archive": "3f2c….sat", "path": "notes.md", "content": "more"}
//! ```
//!
//! and every response is an envelope, either `{"ok": true, "result": …}` or
//! `{"ok": false, "error": {"kind": …, "message": …}}`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::engine::ArchiveMutationEngine;
use crate::error::{Result, SatchelError};
use crate::query::QueryFacade;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCall {
    CreateFile {
        archive: String,
        path: String,
        #[serde(default)]
        content: String,
    },
    /// Replace the whole content of a file.
    EditFile {
        archive: String,
        path: String,
        content: String,
    },
    AppendFile {
        archive: String,
        path: String,
        content: String,
    },
    DeleteFile {
        archive: String,
        path: String,
    },
    ListFiles {
        archive: String,
        #[serde(default)]
        prefix: String,
    },
    ReadFile {
        archive: String,
        path: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Done(&'static str),
    Paths(Vec<String>),
    Content(String),
}

pub struct ToolBox {
    engine: ArchiveMutationEngine,
    query: QueryFacade,
}

impl ToolBox {
    pub fn new(engine: ArchiveMutationEngine) -> Self {
        let query = engine.query();
        Self { engine, query }
    }

    pub fn call(&self, call: ToolCall) -> Result<ToolOutput> {
        match call {
            ToolCall::CreateFile {
                archive,
                path,
                content,
            } => {
                self.engine.create_entry(&archive, &path, content)?;
                Ok(ToolOutput::Done("OK"))
            }
            ToolCall::EditFile {
                archive,
                path,
                content,
            } => {
                self.engine.replace_entry(&archive, &path, content)?;
                Ok(ToolOutput::Done("OK"))
            }
            ToolCall::AppendFile {
                archive,
                path,
                content,
            } => {
                self.engine.append_entry(&archive, &path, content)?;
                Ok(ToolOutput::Done("OK"))
            }
            ToolCall::DeleteFile { archive, path } => {
                self.engine.delete_entry(&archive, &path)?;
                Ok(ToolOutput::Done("OK"))
            }
            ToolCall::ListFiles { archive, prefix } => {
                Ok(ToolOutput::Paths(self.query.list_entries(&archive, &prefix)?))
            }
            ToolCall::ReadFile { archive, path } => {
                let bytes = self.query.read_entry(&archive, &path)?;
                let text = String::from_utf8(bytes).map_err(|_| SatchelError::NotText { path })?;
                Ok(ToolOutput::Content(text))
            }
        }
    }

    /// Dispatch one raw JSON call and wrap the outcome in the envelope.
    pub fn call_json(&self, raw: &str) -> Value {
        let call: ToolCall = match serde_json::from_str(raw) {
            Ok(call) => call,
            Err(e) => return failure("invalid_call", &e.to_string()),
        };
        match self.call(call) {
            Ok(out) => json!({ "ok": true, "result": out }),
            Err(e) => {
                tracing::debug!(kind = e.kind(), error = %e, "tool call failed");
                error_envelope(&e)
            }
        }
    }
}

pub fn error_envelope(e: &SatchelError) -> Value {
    failure(e.kind(), &e.to_string())
}

fn failure(kind: &str, message: &str) -> Value {
    json!({ "ok": false, "error": { "kind": kind, "message": message } })
}

fn schema(props: &[(&str, &str)], required: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = props
        .iter()
        .map(|(name, desc)| {
            (
                name.to_string(),
                json!({ "type": "string", "description": desc }),
            )
        })
        .collect();
    json!({ "type": "object", "properties": properties, "required": required })
}

/// Name, description and parameter schema of every tool.
pub fn describe() -> Value {
    const ARCHIVE: (&str, &str) = ("archive", "Key of the archive in the store");
    const PATH: (&str, &str) = ("path", "Path of the file inside the archive");
    json!([
        {
            "name": "create_file",
            "description": "Create a file. Leaves an existing file untouched.",
            "parameters": schema(&[ARCHIVE, PATH, ("content", "Initial content, empty if omitted")], &["archive", "path"])
        },
        {
            "name": "edit_file",
            "description": "Replace the whole content of a file, creating it if needed.",
            "parameters": schema(&[ARCHIVE, PATH, ("content", "New content")], &["archive", "path", "content"])
        },
        {
            "name": "append_file",
            "description": "Append text to a file, creating it if needed.",
            "parameters": schema(&[ARCHIVE, PATH, ("content", "Text to append")], &["archive", "path", "content"])
        },
        {
            "name": "delete_file",
            "description": "Delete a file. Deleting a missing file succeeds.",
            "parameters": schema(&[ARCHIVE, PATH], &["archive", "path"])
        },
        {
            "name": "list_files",
            "description": "List file paths in archive order.",
            "parameters": schema(&[ARCHIVE, ("prefix", "Only paths starting with this")], &["archive"])
        },
        {
            "name": "read_file",
            "description": "Read a file as UTF-8 text.",
            "parameters": schema(&[ARCHIVE, PATH], &["archive", "path"])
        }
    ])
}

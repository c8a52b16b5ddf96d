//! Mutation instructions and the JSON wire form they arrive in.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SatchelError};
use crate::util::sanitize::check_entry_path;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Replace,
    Append,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Replace => "replace",
            Action::Append => "append",
            Action::Delete => "delete",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "create" => Some(Action::Create),
            "replace" => Some(Action::Replace),
            "append" => Some(Action::Append),
            "delete" => Some(Action::Delete),
            _ => None,
        }
    }

    pub fn needs_payload(self) -> bool {
        !matches!(self, Action::Delete)
    }
}

/// A destination-state directive for one entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationInstruction {
    pub target_path: String,
    pub action: Action,
    pub payload: Vec<u8>,
}

impl MutationInstruction {
    pub fn create(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            target_path: path.into(),
            action: Action::Create,
            payload: content.into(),
        }
    }

    pub fn replace(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            target_path: path.into(),
            action: Action::Replace,
            payload: content.into(),
        }
    }

    pub fn append(path: impl Into<String>, extra: impl Into<Vec<u8>>) -> Self {
        Self {
            target_path: path.into(),
            action: Action::Append,
            payload: extra.into(),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            target_path: path.into(),
            action: Action::Delete,
            payload: Vec::new(),
        }
    }
}

/// Ordered instructions applied to one archive in one publish cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationBatch {
    instructions: Vec<MutationInstruction>,
}

impl MutationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(instruction: MutationInstruction) -> Self {
        Self {
            instructions: vec![instruction],
        }
    }

    pub fn push(mut self, instruction: MutationInstruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn instructions(&self) -> &[MutationInstruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Validate wire instructions and turn them into a batch.
    pub fn from_wire(wire: Vec<WireInstruction>) -> Result<Self> {
        let instructions = wire
            .into_iter()
            .enumerate()
            .map(|(index, w)| w.validate(index))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { instructions })
    }

    /// Parse a JSON array of `{file, action, content}` objects.
    pub fn from_json(json: &str) -> Result<Self> {
        let wire: Vec<WireInstruction> =
            serde_json::from_str(json).map_err(|e| SatchelError::InvalidInstruction {
                index: 0,
                reason: format!("malformed batch: {e}"),
            })?;
        Self::from_wire(wire)
    }

    /// Check target paths of instructions built in code; wire batches are
    /// already checked by [`MutationBatch::from_wire`].
    pub fn check_paths(&self) -> Result<()> {
        for (index, instr) in self.instructions.iter().enumerate() {
            check_entry_path(&instr.target_path)
                .map_err(|reason| SatchelError::InvalidInstruction { index, reason })?;
        }
        Ok(())
    }

    pub fn to_wire(&self) -> Vec<WireInstruction> {
        self.instructions
            .iter()
            .map(|i| WireInstruction {
                file: i.target_path.clone(),
                action: i.action.as_str().to_string(),
                content: i
                    .action
                    .needs_payload()
                    .then(|| String::from_utf8_lossy(&i.payload).into_owned()),
            })
            .collect()
    }
}

impl FromIterator<MutationInstruction> for MutationBatch {
    fn from_iter<T: IntoIterator<Item = MutationInstruction>>(iter: T) -> Self {
        Self {
            instructions: iter.into_iter().collect(),
        }
    }
}

/// `{ "file": ..., "action": ..., "content": ... }` as sent by API and agent callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireInstruction {
    pub file: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl WireInstruction {
    fn validate(self, index: usize) -> Result<MutationInstruction> {
        let invalid = |reason: String| SatchelError::InvalidInstruction { index, reason };

        let action = Action::parse(&self.action)
            .ok_or_else(|| invalid(format!("unknown action '{}'", self.action)))?;
        check_entry_path(&self.file).map_err(invalid)?;

        let payload = match (action.needs_payload(), self.content) {
            (true, Some(content)) => content.into_bytes(),
            (true, None) => {
                return Err(invalid(format!(
                    "'{}' on {} requires content",
                    action.as_str(),
                    self.file
                )));
            }
            // delete ignores any content it was sent
            (false, _) => Vec::new(),
        };

        Ok(MutationInstruction {
            target_path: self.file,
            action,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_batch_in_order() {
        let batch = MutationBatch::from_json(
            r#"[
                {"file": "main.py", "action": "replace", "content": "new"},
                {"file": "README.md", "action": "append", "content": "\nMore"},
                {"file": "old.txt", "action": "delete"}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            batch.instructions(),
            &[
                MutationInstruction::replace("main.py", "new"),
                MutationInstruction::append("README.md", "\nMore"),
                MutationInstruction::delete("old.txt"),
            ]
        );
    }

    #[test]
    fn delete_ignores_content() {
        let batch =
            MutationBatch::from_json(r#"[{"file": "a", "action": "delete", "content": "x"}]"#)
                .unwrap();
        assert!(batch.instructions()[0].payload.is_empty());
    }

    #[test]
    fn unknown_action_reports_index() {
        let err = MutationBatch::from_json(
            r#"[{"file": "a", "action": "create", "content": ""},
                {"file": "b", "action": "rename", "content": "c"}]"#,
        )
        .unwrap_err();
        match err {
            SatchelError::InvalidInstruction { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("rename"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_payload_is_invalid() {
        for action in ["create", "replace", "append"] {
            let json = format!(r#"[{{"file": "a.txt", "action": "{action}"}}]"#);
            assert!(matches!(
                MutationBatch::from_json(&json).unwrap_err(),
                SatchelError::InvalidInstruction { index: 0, .. }
            ));
        }
    }

    #[test]
    fn escaping_paths_are_invalid() {
        let err = MutationBatch::from_json(
            r#"[{"file": "../../etc/passwd", "action": "replace", "content": "x"}]"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_instruction");
    }

    #[test]
    fn built_batches_get_path_checks() {
        let batch = MutationBatch::new()
            .push(MutationInstruction::create("ok.txt", ""))
            .push(MutationInstruction::append("/abs", "x"));
        assert!(matches!(
            batch.check_paths().unwrap_err(),
            SatchelError::InvalidInstruction { index: 1, .. }
        ));
    }

    #[test]
    fn malformed_json_is_invalid() {
        assert_eq!(
            MutationBatch::from_json("{not json").unwrap_err().kind(),
            "invalid_instruction"
        );
    }

    #[test]
    fn wire_form_survives_serialization() {
        let batch: MutationBatch = [
            MutationInstruction::create("a", "1"),
            MutationInstruction::delete("b"),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&batch.to_wire()).unwrap();
        assert_eq!(MutationBatch::from_json(&json).unwrap(), batch);
    }
}

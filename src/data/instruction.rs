use serde::{Deserialize, Serialize};
use std::fmt;

use super::WriteMode;

/// The kind of work an operator asks the model to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    AddFeature,
    FixIssue,
    EnhanceInitial,
    Explain,
}

impl OperationKind {
    /// Write policy for operations that produce a file-write plan.
    ///
    /// `Explain` never produces a plan and therefore has no write mode.
    pub fn write_mode(self) -> Option<WriteMode> {
        match self {
            OperationKind::AddFeature | OperationKind::EnhanceInitial => {
                Some(WriteMode::CreateOrOverwrite)
            }
            OperationKind::FixIssue => Some(WriteMode::OverwriteExistingOnly),
            OperationKind::Explain => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OperationKind::AddFeature => "add_feature",
            OperationKind::FixIssue => "fix_issue",
            OperationKind::EnhanceInitial => "enhance_initial",
            OperationKind::Explain => "explain",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A natural-language request tagged with its operation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    kind: OperationKind,
    text: String,
}

impl Instruction {
    pub fn new(kind: OperationKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

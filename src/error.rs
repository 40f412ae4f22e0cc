use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unbalanced {
    CloserWithoutOpener,
    ElseWithoutIf,
    Unclosed { opened_at: usize, opcode: String },
}

impl Display for Unbalanced {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Unbalanced::CloserWithoutOpener => write!(f, "'end' without an open container"),
            Unbalanced::ElseWithoutIf => write!(f, "'else' without an open 'if'"),
            Unbalanced::Unclosed { opened_at, opcode } => write!(
                f,
                "'{}' opened at line {} is never closed with 'end'",
                opcode, opened_at
            ),
        }
    }
}

/// Every way a translation unit can fail. Any of these discards the whole
/// unit; no partial scripts are returned alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Unrecognized line '{text}' (line {line})")]
    UnrecognizedLine { line: usize, text: String },

    #[error("Unbalanced container: {reason} (line {line})")]
    UnbalancedContainer { line: usize, reason: Unbalanced },

    #[error("Malformed condition '{text}' (line {line})")]
    MalformedCondition { line: usize, text: String },

    #[error("Unrecognized trigger '{text}' (line {line})")]
    UnrecognizedTrigger { line: usize, text: String },

    #[error("Statement '{text}' appears before any 'when' trigger (line {line})")]
    StatementOutsideScript { line: usize, text: String },

    #[error("Expression nesting exceeds the limit of {limit} (line {line})")]
    NestingTooDeep { line: usize, limit: usize },

    #[error("Inconsistent script graph: {0}")]
    InconsistentGraph(String),
}

impl CompileError {
    pub fn line(&self) -> Option<usize> {
        match self {
            CompileError::UnrecognizedLine { line, .. }
            | CompileError::UnbalancedContainer { line, .. }
            | CompileError::MalformedCondition { line, .. }
            | CompileError::UnrecognizedTrigger { line, .. }
            | CompileError::StatementOutsideScript { line, .. }
            | CompileError::NestingTooDeep { line, .. } => Some(*line),
            CompileError::InconsistentGraph(_) => None,
        }
    }
}

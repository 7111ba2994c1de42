use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::vars::VarError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnknownOpcode,
    UnsupportedArgumentShape,
    Unimplemented,
    VariableOutOfRange,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::UnknownOpcode => "unknown_opcode",
            DiagnosticKind::UnsupportedArgumentShape => "unsupported_argument_shape",
            DiagnosticKind::Unimplemented => "unimplemented",
            DiagnosticKind::VariableOutOfRange => "variable_out_of_range",
        }
    }
}

/// Failure reported by an opcode handler. Never fatal to the script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("no shape accepts {argc} operands")]
    UnsupportedArgumentShape { argc: usize },
    #[error("operand {position} should be {expected}")]
    BadOperand {
        position: usize,
        expected: &'static str,
    },
    #[error("target variable required")]
    MissingTargetVar,
    #[error("stub: {0}")]
    Unimplemented(String),
    #[error(transparent)]
    Variable(#[from] VarError),
}

impl Fault {
    pub fn shape(argc: usize) -> Self {
        Fault::UnsupportedArgumentShape { argc }
    }

    pub fn stub(detail: impl Into<String>) -> Self {
        Fault::Unimplemented(detail.into())
    }

    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Fault::UnsupportedArgumentShape { .. }
            | Fault::BadOperand { .. }
            | Fault::MissingTargetVar => DiagnosticKind::UnsupportedArgumentShape,
            Fault::Unimplemented(_) => DiagnosticKind::Unimplemented,
            Fault::Variable(_) => DiagnosticKind::VariableOutOfRange,
        }
    }
}

/// One non-fatal observation made while running a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub opcode: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<&'static str>,
    pub detail: String,
}

impl Diagnostic {
    pub fn unknown_opcode(opcode: u16, argc: usize) -> Self {
        Diagnostic {
            kind: DiagnosticKind::UnknownOpcode,
            opcode,
            handler: None,
            detail: format!("no handler registered ({argc} operands)"),
        }
    }

    pub fn from_fault(opcode: u16, handler: &'static str, fault: &Fault) -> Self {
        Diagnostic {
            kind: fault.kind(),
            opcode,
            handler: Some(handler),
            detail: fault.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.handler {
            Some(handler) => write!(
                f,
                "opcode {} ({handler}): {}: {}",
                self.opcode,
                self.kind.as_str(),
                self.detail
            ),
            None => write!(
                f,
                "opcode {}: {}: {}",
                self.opcode,
                self.kind.as_str(),
                self.detail
            ),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|entry| entry.kind == kind).count()
    }

    pub fn counts(&self) -> BTreeMap<DiagnosticKind, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn extend(&mut self, other: DiagnosticLog) {
        self.entries.extend(other.entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faults_map_onto_diagnostic_kinds() {
        assert_eq!(
            Fault::shape(3).kind(),
            DiagnosticKind::UnsupportedArgumentShape
        );
        assert_eq!(
            Fault::BadOperand {
                position: 0,
                expected: "string"
            }
            .kind(),
            DiagnosticKind::UnsupportedArgumentShape
        );
        assert_eq!(Fault::stub("cursor").kind(), DiagnosticKind::Unimplemented);
        let range = Fault::from(VarError::OutOfRange {
            index: 9,
            width: 4,
            size: 8,
        });
        assert_eq!(range.kind(), DiagnosticKind::VariableOutOfRange);
    }

    #[test]
    fn log_counts_by_kind() {
        let mut log = DiagnosticLog::new();
        log.record(Diagnostic::unknown_opcode(99, 0));
        log.record(Diagnostic::unknown_opcode(98, 1));
        log.record(Diagnostic::from_fault(4, "o_stub", &Fault::stub("later")));

        assert_eq!(log.len(), 3);
        assert_eq!(log.count(DiagnosticKind::UnknownOpcode), 2);
        assert_eq!(log.counts().get(&DiagnosticKind::Unimplemented), Some(&1));
        assert_eq!(
            log.entries()[2].to_string(),
            "opcode 4 (o_stub): unimplemented: stub: later"
        );
    }
}

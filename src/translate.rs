//! Translation of engine-native findings into LSP diagnostics.
//!
//! Pure functions, no I/O. The engine reports only a start location, so the
//! synthesized range spans from the reported column to the start of the
//! following line.

use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range,
};

use crate::engine::NativeFinding;

/// Outcome of mapping an engine-native severity string.
///
/// `Unrecognized` is deliberately distinct from `Warning` so unknown future
/// severities stay visible instead of being silently downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappedSeverity {
    Error,
    Warning,
    Unrecognized,
}

impl MappedSeverity {
    /// LSP representation; unrecognized severities are left unset.
    pub fn to_lsp(self) -> Option<DiagnosticSeverity> {
        match self {
            MappedSeverity::Error => Some(DiagnosticSeverity::ERROR),
            MappedSeverity::Warning => Some(DiagnosticSeverity::WARNING),
            MappedSeverity::Unrecognized => None,
        }
    }
}

/// Convert a 1-based engine location into an LSP range.
///
/// Zero inputs violate the engine contract; they clamp to zero rather than
/// wrapping.
pub fn convert_range(line: u32, column: u32) -> Range {
    Range {
        start: Position {
            line: line.saturating_sub(1),
            character: column.saturating_sub(1),
        },
        end: Position {
            line,
            character: 0,
        },
    }
}

/// Map an engine-native severity string onto the closed severity set.
pub fn convert_severity(severity: &str) -> MappedSeverity {
    match severity {
        "error" => MappedSeverity::Error,
        "warning" => MappedSeverity::Warning,
        _ => MappedSeverity::Unrecognized,
    }
}

/// Convert one engine invocation's findings into LSP diagnostics.
///
/// Order and count are preserved; each diagnostic carries the rule id as its
/// `code` and `source` names the engine.
pub fn convert_diagnostics(findings: &[NativeFinding], source: &str) -> Vec<Diagnostic> {
    findings
        .iter()
        .map(|finding| Diagnostic {
            range: convert_range(finding.line, finding.column),
            severity: convert_severity(&finding.severity).to_lsp(),
            code: Some(NumberOrString::String(finding.linter.clone())),
            source: Some(source.to_string()),
            message: finding.message.clone(),
            ..Diagnostic::default()
        })
        .collect()
}

//! Diagnostics infrastructure for tracking issues during solves and imports.
//!
//! A solve or a metric import can complete while still having something to
//! say: a fallback engaged, a row skipped, a pricing row missing. Those
//! messages are collected here as machine-readable entries rather than log
//! lines, so collaborators can render them.
//!
//! # Example
//!
//! ```
//! use bng_core::diagnostics::{Diagnostics, Severity};
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning("solver", "MIP timed out, greedy fallback engaged");
//! diag.add_error_with_entity("pricing", "no price row at requested size", "Bank BK01");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.error_count(), 1);
//! ```

use serde::Serialize;

/// Severity level for diagnostic issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but the operation continued (e.g. fallback engaged).
    Warning,
    /// Could not complete an element or operation.
    Error,
}

/// A single diagnostic issue.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Category for grouping: "solver", "pricing", "geography", "metric", ...
    pub category: String,
    pub message: String,
    /// Optional row number for workbook-based operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    /// Optional entity reference (e.g. "Bank BK01", "demand 2").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl DiagnosticIssue {
    pub fn new(severity: Severity, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            row: None,
            entity: None,
        }
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }
        if let Some(row) = self.row {
            write!(f, " at row {}", row)?;
        }
        Ok(())
    }
}

/// Collection of diagnostic issues for one operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warning(&mut self, category: impl Into<String>, message: impl Into<String>) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message));
    }

    pub fn add_error(&mut self, category: impl Into<String>, message: impl Into<String>) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message));
    }

    pub fn add_warning_with_entity(
        &mut self,
        category: impl Into<String>,
        message: impl Into<String>,
        entity: impl Into<String>,
    ) {
        self.issues.push(
            DiagnosticIssue::new(Severity::Warning, category, message).with_entity(entity),
        );
    }

    pub fn add_error_with_entity(
        &mut self,
        category: impl Into<String>,
        message: impl Into<String>,
        entity: impl Into<String>,
    ) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message).with_entity(entity));
    }

    pub fn push(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    /// Fold another collection into this one, preserving order.
    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_severity() {
        let mut diag = Diagnostics::new();
        diag.add_warning("solver", "fallback engaged");
        diag.add_warning("geography", "watercourse tiering uses LPA/NCA");
        diag.add_error("metric", "header row not found");
        assert_eq!(diag.warning_count(), 2);
        assert_eq!(diag.error_count(), 1);
        assert!(diag.has_errors());
    }

    #[test]
    fn display_includes_entity_and_row() {
        let issue = DiagnosticIssue::new(Severity::Error, "metric", "unknown habitat")
            .with_entity("Wet woodland")
            .with_row(14);
        let text = issue.to_string();
        assert!(text.contains("[error:metric]"));
        assert!(text.contains("Wet woodland"));
        assert!(text.contains("row 14"));
    }

    #[test]
    fn merge_preserves_order() {
        let mut a = Diagnostics::new();
        a.add_warning("solver", "first");
        let mut b = Diagnostics::new();
        b.add_warning("solver", "second");
        a.merge(b);
        assert_eq!(a.issues[0].message, "first");
        assert_eq!(a.issues[1].message, "second");
    }
}

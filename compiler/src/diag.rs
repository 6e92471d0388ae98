// diag.rs — Unified diagnostics model
//
// Shared diagnostic types for every phase, plus rendering against the
// declaration source so spans show up as `file:line:col`.
//
// Preconditions: spans passed to `render` index into the given source.
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ast::Span;
use crate::scan::line_col;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0001`, `W0001`).
///
/// Once assigned, a code keeps its meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    /// Mapping token is not `<field><op><field>`.
    pub const E0001: DiagCode = DiagCode("E0001");
    /// Operator outside `= > @ %`.
    pub const E0002: DiagCode = DiagCode("E0002");
    /// Seed table literal not found.
    pub const E0003: DiagCode = DiagCode("E0003");
    /// A-tag registered twice.
    pub const E0004: DiagCode = DiagCode("E0004");
    /// Declaration arguments unreadable.
    pub const E0005: DiagCode = DiagCode("E0005");

    /// B constructor already registered; the later B→A function is shadowed.
    pub const W0001: DiagCode = DiagCode("W0001");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Related span ─────────────────────────────────────────────────────────

/// A secondary source location providing context for a diagnostic.
#[derive(Debug, Clone)]
pub struct RelatedSpan {
    pub span: Span,
    pub label: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
    pub related_spans: Vec<RelatedSpan>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, hint, or related spans.
    pub fn new(level: DiagLevel, span: Span, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span,
            message: message.into(),
            hint: None,
            related_spans: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_related(mut self, span: Span, label: impl Into<String>) -> Self {
        self.related_spans.push(RelatedSpan {
            span,
            label: label.into(),
        });
        self
    }

    /// Render with source positions:
    ///
    /// ```text
    /// error[E0004]: ...
    ///   --> decls.rs:4:1
    ///   note: decls.rs:3:1: first registered here
    ///   hint: ...
    /// ```
    pub fn render(&self, path: &str, source: &str) -> String {
        let (line, col) = line_col(source, self.span.start);
        let mut out = format!("{}\n  --> {}:{}:{}", self.headline(), path, line, col);
        for related in &self.related_spans {
            let (line, col) = line_col(source, related.span.start);
            out.push_str(&format!(
                "\n  note: {}:{}:{}: {}",
                path, line, col, related.label
            ));
        }
        if let Some(hint) = &self.hint {
            out.push_str(&format!("\n  hint: {}", hint));
        }
        out
    }

    fn headline(&self) -> String {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        match &self.code {
            Some(code) => format!("{}[{}]: {}", level, code, self.message),
            None => format!("{}: {}", level, self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.headline())?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

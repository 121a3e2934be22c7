//! Diagnostic values shared by analyzers, the engine and hosts.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity level for a diagnostic.
///
/// Ordered most-severe first so sorting by severity puts errors on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

#[derive(Debug, Error)]
#[error("unknown severity '{0}' (expected error, warning, info or hint)")]
pub struct SeverityParseError(String);

impl Severity {
    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Hint => "hint",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, SeverityParseError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warning),
            "info" | "information" => Ok(Self::Info),
            "hint" => Ok(Self::Hint),
            other => Err(SeverityParseError(other.to_string())),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 0-indexed line/column position.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

impl Position {
    #[must_use]
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// Half-open source range. Ordering is `(start, end)`, which is the order the
/// engine uses within a single analyzer's contribution.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Zero-width span at a position.
    #[must_use]
    pub const fn point(line: u32, col: u32) -> Self {
        let pos = Position::new(line, col);
        Self {
            start: pos,
            end: pos,
        }
    }

    /// Span covering `[start_col, end_col)` on a single line.
    #[must_use]
    pub const fn on_line(line: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            start: Position::new(line, start_col),
            end: Position::new(line, end_col),
        }
    }

    /// Whether the span is well-formed and starts within a source of
    /// `line_count` lines. An empty source still admits the origin point.
    #[must_use]
    pub fn fits_within(&self, line_count: usize) -> bool {
        if self.end < self.start {
            return false;
        }
        let limit = line_count.max(1);
        (self.start.line as usize) < limit && (self.end.line as usize) <= limit
    }
}

/// A single diagnostic. Immutable once constructed.
///
/// Fields are private; external consumers read via accessors. The only way
/// to derive a changed diagnostic is [`Diagnostic::with_severity`], which
/// returns a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    id: Arc<str>,
    severity: Severity,
    category: Arc<str>,
    span: Span,
    message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        id: impl AsRef<str>,
        severity: Severity,
        category: impl AsRef<str>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Arc::from(id.as_ref()),
            severity,
            category: Arc::from(category.as_ref()),
            span,
            message: message.into(),
        }
    }

    /// Diagnostic identifier (e.g. "LEN001").
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn span(&self) -> Span {
        self.span
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn with_severity(&self, severity: Severity) -> Self {
        Self {
            severity,
            ..self.clone()
        }
    }

    /// Format as `path:line:col: severity: [ID] message` (1-indexed for display).
    #[must_use]
    pub fn display_at(&self, path: &str) -> String {
        format!(
            "{path}:{}:{}: {}: [{}] {}",
            self.span.start.line + 1,
            self.span.start.col + 1,
            self.severity.label(),
            self.id,
            self.message,
        )
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Source language of a code entity.
///
/// Languages the host ships analyzers for are closed variants; anything else
/// (plugin languages, unknown extensions) lands in [`LanguageTag::Other`].
/// Parsing never fails, so an unknown language flows through resolution and
/// simply matches no analyzers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LanguageTag {
    Rust,
    Python,
    TypeScript,
    JavaScript,
    Go,
    CSharp,
    Other(String),
}

impl LanguageTag {
    /// Every closed variant, in declaration order.
    pub const KNOWN: [LanguageTag; 6] = [
        LanguageTag::Rust,
        LanguageTag::Python,
        LanguageTag::TypeScript,
        LanguageTag::JavaScript,
        LanguageTag::Go,
        LanguageTag::CSharp,
    ];

    /// Parse a language name. Case-insensitive, accepts common aliases.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "rust" | "rs" => Self::Rust,
            "python" | "py" => Self::Python,
            "typescript" | "ts" => Self::TypeScript,
            "javascript" | "js" => Self::JavaScript,
            "go" | "golang" => Self::Go,
            "csharp" | "c#" | "cs" => Self::CSharp,
            _ => Self::Other(normalized),
        }
    }

    /// Map a file extension to a language using the built-in table.
    ///
    /// Returns `None` for extensions the table does not know; callers decide
    /// whether that becomes `Other(ext)` or is skipped.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "rs" => Some(Self::Rust),
            "py" | "pyi" => Some(Self::Python),
            "ts" | "tsx" | "mts" | "cts" => Some(Self::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "go" => Some(Self::Go),
            "cs" => Some(Self::CSharp),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Go => "go",
            Self::CSharp => "csharp",
            Self::Other(name) => name,
        }
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for LanguageTag {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for LanguageTag {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<LanguageTag> for String {
    fn from(value: LanguageTag) -> Self {
        value.as_str().to_string()
    }
}

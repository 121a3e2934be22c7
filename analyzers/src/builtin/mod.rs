//! Built-in analyzers, registered statically by name.
//!
//! These are text-level checks that need nothing beyond the source. They
//! double as the host's default analyzer set when no configuration exists.

mod empty_project;
mod line_length;
mod mixed_indentation;
mod todo_comment;
mod trailing_whitespace;

pub use empty_project::EmptyProject;
pub use line_length::LineLength;
pub use mixed_indentation::MixedIndentation;
pub use todo_comment::TodoComment;
pub use trailing_whitespace::TrailingWhitespace;

use std::sync::Arc;

use serde_json::Value;

use crate::{Analyzer, AnalyzerError, CancellationToken};

/// Lines between cancellation checks in the line-oriented analyzers.
const CANCELLATION_POLL_LINES: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown built-in analyzer '{name}'")]
    UnknownAnalyzer { name: String },
    #[error("invalid options for analyzer '{name}': {message}")]
    InvalidOptions { name: String, message: String },
}

/// Name-indexed constructor table for the built-in analyzers.
pub struct BuiltinCatalog;

impl BuiltinCatalog {
    /// Every built-in analyzer name, in the default registration order.
    pub const NAMES: [&'static str; 5] = [
        TrailingWhitespace::NAME,
        LineLength::NAME,
        TodoComment::NAME,
        MixedIndentation::NAME,
        EmptyProject::NAME,
    ];

    /// Construct a built-in analyzer. `options` may be `Value::Null` for
    /// defaults.
    pub fn create(name: &str, options: &Value) -> Result<Arc<dyn Analyzer>, CatalogError> {
        let analyzer: Arc<dyn Analyzer> = match name {
            TrailingWhitespace::NAME => Arc::new(TrailingWhitespace::new()),
            LineLength::NAME => {
                let opts = parse_options::<line_length::Options>(name, options)?;
                Arc::new(LineLength::new(opts.max))
            }
            TodoComment::NAME => Arc::new(TodoComment::new()),
            MixedIndentation::NAME => Arc::new(MixedIndentation::new()),
            EmptyProject::NAME => Arc::new(EmptyProject::new()),
            _ => {
                return Err(CatalogError::UnknownAnalyzer {
                    name: name.to_string(),
                });
            }
        };
        Ok(analyzer)
    }

    #[must_use]
    pub fn contains(name: &str) -> bool {
        Self::NAMES.contains(&name)
    }
}

fn parse_options<T>(name: &str, options: &Value) -> Result<T, CatalogError>
where
    T: serde::de::DeserializeOwned + Default,
{
    if options.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(options.clone()).map_err(|e| CatalogError::InvalidOptions {
        name: name.to_string(),
        message: e.to_string(),
    })
}

/// Poll the token every [`CANCELLATION_POLL_LINES`] lines.
fn check_cancelled(line_index: usize, cancel: &CancellationToken) -> Result<(), AnalyzerError> {
    if line_index % CANCELLATION_POLL_LINES == 0 && cancel.is_cancelled() {
        return Err(AnalyzerError::Cancelled);
    }
    Ok(())
}

/// Length of a string prefix in `char`s, used for column numbers.
fn char_col(line: &str, byte_index: usize) -> u32 {
    line[..byte_index].chars().count() as u32
}

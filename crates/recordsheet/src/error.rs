//! Export error types.

use thiserror::Error;

/// Failure reported by a [`crate::sink::CellSink`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SinkError {
    /// User-facing error text.
    pub message: String,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure to read one field of one record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldAccessError {
    /// The record has no field with this key.
    #[error("record has no field named {0:?}")]
    MissingField(String),
    /// The field exists but could not be read.
    #[error("failed to read field {field:?}: {message}")]
    Unreadable { field: String, message: String },
}

/// "Top-level call failed" errors.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Explicit column request is empty or contains non-letter characters.
    #[error("invalid column letters {letters:?} on field {field:?}")]
    InvalidColumnLetters { field: String, letters: String },
    /// Coercion has no rule for the raw value kind.
    #[error("unsupported value type {kind} for field {field:?}")]
    UnsupportedValueType { field: String, kind: &'static str },
    /// Nothing left to export after filtering.
    #[error("no exportable fields")]
    EmptyFieldSet,
    /// Date pattern cannot be rendered.
    #[error("invalid date format {pattern:?}: {message}")]
    InvalidDateFormat { pattern: String, message: String },
    /// Export options rejected before any write.
    #[error("invalid export options: {0}")]
    InvalidOptions(String),
    /// Record field access failed.
    #[error(transparent)]
    FieldAccess(#[from] FieldAccessError),
    /// Sink write failed.
    #[error(transparent)]
    Sink(#[from] SinkError),
    /// DataFrame record source failed.
    #[error("dataframe source error: {0}")]
    Frame(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_error_propagates_message_unchanged() {
        let err = ExportError::from(SinkError::new("disk full"));
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn test_field_access_display() {
        let err = ExportError::from(FieldAccessError::MissingField("age".to_string()));
        assert_eq!(err.to_string(), "record has no field named \"age\"");
    }
}

use thiserror::Error;

/// Formula conversion failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// A syntax element appeared where the surrounding context did not allow it.
    #[error("malformed formula `{formula}`: {message}{}", describe_position(.ch, .position))]
    MalformedFormula {
        formula: String,
        message: String,
        /// Offending character, when the failure is tied to one.
        ch: Option<char>,
        /// Character offset into the formula text.
        position: usize,
    },
    /// A sheet or name could not be resolved to a slot in the workbook.
    #[error("invalid reference `{reference}` in formula `{formula}`")]
    InvalidReference { formula: String, reference: String },
    /// Should not happen with a well-formed front end.
    #[error("internal error converting `{formula}`: {message}")]
    Internal { formula: String, message: String },
}

fn describe_position(ch: &Option<char>, position: &usize) -> String {
    match ch {
        Some(ch) => format!(" (found {ch:?} at offset {position})"),
        None => format!(" (at offset {position})"),
    }
}

impl ConvertError {
    /// Formula text the error was raised for.
    pub fn formula(&self) -> &str {
        match self {
            ConvertError::MalformedFormula { formula, .. }
            | ConvertError::InvalidReference { formula, .. }
            | ConvertError::Internal { formula, .. } => formula,
        }
    }

    /// Scan position, when known.
    pub fn position(&self) -> Option<usize> {
        match *self {
            ConvertError::MalformedFormula { position, .. } => Some(position),
            _ => None,
        }
    }
}

//! Feed parsing error types.

use std::fmt;

pub type ParseResult<T> = Result<T, ParseError>;

/// A structural problem with a feed payload, with the (1-based) line it was
/// found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: usize,
    pub context: Option<String>,
}

impl ParseError {
    #[must_use]
    pub fn new(kind: ParseErrorKind, line: usize) -> Self {
        Self {
            kind,
            line,
            context: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {}", self.kind, self.line)?;
        if let Some(ref ctx) = self.context {
            write!(f, ": {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Payload is not UTF-8
    InvalidEncoding,
    /// Document does not open with BEGIN:VCALENDAR
    MissingBegin,
    /// A component is never closed
    MissingEnd,
    /// END does not match the open component
    MismatchedComponent,
    MissingPropertyName,
    MissingColon,
    UnclosedQuote,
    /// Property found outside of any component
    StrayProperty,
    InvalidDate,
    InvalidDateTime,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::InvalidEncoding => "payload is not valid UTF-8",
            Self::MissingBegin => "missing BEGIN:VCALENDAR",
            Self::MissingEnd => "missing END",
            Self::MismatchedComponent => "mismatched component",
            Self::MissingPropertyName => "missing property name",
            Self::MissingColon => "missing ':' separator",
            Self::UnclosedQuote => "unclosed quoted parameter",
            Self::StrayProperty => "property outside of a component",
            Self::InvalidDate => "invalid date",
            Self::InvalidDateTime => "invalid date-time",
        };
        f.write_str(msg)
    }
}

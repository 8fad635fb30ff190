//! Error types for document parsing and selector compilation.

/// Error produced while parsing HTML into a [`Document`](crate::Document).
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Markup could not be tokenized.
    #[error("HTML parse error: {0}")]
    Markup(#[from] quick_xml::Error),

    /// Text or names could not be decoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),
}

/// Error produced by [`Selector::parse`](crate::Selector::parse).
#[derive(Debug, thiserror::Error)]
#[error("invalid selector `{selector}`: {reason}")]
pub struct SelectorError {
    /// The selector text as given.
    pub selector: String,
    /// What is wrong with it.
    pub reason: &'static str,
}

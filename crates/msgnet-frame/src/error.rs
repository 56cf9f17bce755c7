/// Errors that can occur while building, encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An extract asked for more bytes than the body holds.
    #[error("body underflow (needed {needed} bytes, {available} available)")]
    Underflow { needed: usize, available: usize },

    /// The body exceeds the configured or representable maximum size.
    #[error("body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// The header carries a tag outside the application's message id set.
    #[error("unknown message id {0}")]
    UnknownMessageId(String),

    /// A header's size field disagrees with the body supplied alongside it.
    #[error("header size {header} does not match body length {body}")]
    SizeMismatch { header: u32, body: usize },

    /// Fewer bytes than a full header were supplied to the decoder.
    #[error("incomplete header ({got} bytes, expected {expected})")]
    IncompleteHeader { got: usize, expected: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;

//! Error types for dcv

use thiserror::Error;

/// Result type alias for dcv operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dcv
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file error (unknown/missing/duplicate key, malformed line)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Quantisation matrix error (wrong shape or non-integer entry)
    #[error("Matrix error: {0}")]
    Matrix(String),

    /// Width/height not a multiple of the block size, or a buffer length
    /// inconsistent with the configured dimensions
    #[error("Dimension error: {0}")]
    Dimension(String),

    /// A decoder consumed past the end of the stream
    #[error("End of stream")]
    EndOfStream,

    /// Malformed Huffman dictionary (group size or code length out of bounds)
    #[error("Huffman error: {0}")]
    Huffman(String),

    /// A settings value could not be converted to the expected numeric type
    #[error("Cast error: cannot convert '{value}' for key '{key}'")]
    Cast { key: String, value: String },

    /// Library API misuse, e.g. driving a predicted frame without a
    /// reference. Never produced by the CLI pipeline or by decoding
    /// untrusted stream data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a matrix error
    pub fn matrix<S: Into<String>>(msg: S) -> Self {
        Error::Matrix(msg.into())
    }

    /// Create a dimension error
    pub fn dimension<S: Into<String>>(msg: S) -> Self {
        Error::Dimension(msg.into())
    }

    /// Create a Huffman error
    pub fn huffman<S: Into<String>>(msg: S) -> Self {
        Error::Huffman(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Error::InvalidInput(msg.into())
    }
}

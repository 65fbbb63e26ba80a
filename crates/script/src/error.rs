use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScriptError {
    #[error("invalid timestamp `{0}`")]
    InvalidTimestamp(String),

    #[error("minutes and seconds must be below 60 in `{0}`")]
    ComponentOutOfRange(String),

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("time range start must come before end")]
    EmptyRange,

    #[error("speed rate must be positive")]
    NonPositiveRate,

    #[error("invalid speed rate `{0}` (expected e.g. `1.5x`)")]
    InvalidRate(String),

    #[error("unexpected trailing input `{0}`")]
    TrailingInput(String),

    #[error("unterminated quoted path")]
    UnterminatedQuote,
}

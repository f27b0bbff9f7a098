use thiserror::Error;

/// Errors surfaced by the filtering core to its callers.
///
/// Ordinary "no match" is never an error (see spec §7); these variants cover
/// the exceptional I/O and configuration paths the pipeline can hit.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("expected 200, got {status}")]
    UnexpectedStatus { status: u16 },

    #[error("empty text, not resetting")]
    EmptyBody,

    #[error("body exceeded max rule list size ({limit} bytes)")]
    BodyTooLarge { limit: u64 },

    #[error("refresh timed out")]
    Timeout,

    #[error("refresh cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid {kind}: {value:?}")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("malformed index entry: {0}")]
    MalformedIndex(String),

    #[error("duplicate filter list id in index: {0}")]
    DuplicateListId(String),

    #[error("invalid prefix in TXT query: {0}")]
    InvalidHashPrefix(String),

    #[error("json decode error: {0}")]
    Json(#[from] serde_json::Error),
}

//! Error types for the protocol layer.

/// Errors that can occur while decoding or encoding protocol lines.
///
/// Decode errors name the message tag they were raised for (when one could
/// be read), so the connection handler can tell a malformed `CONNECT` apart
/// from a malformed presence update.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The line was empty.
    #[error("empty message")]
    Empty,

    /// The line was not valid UTF-8.
    #[error("message is not valid UTF-8")]
    NotUtf8,

    /// The tag in the first field is not one the biller understands.
    #[error("unknown message tag {0:?}")]
    UnknownTag(String),

    /// The message had the wrong number of colon-separated fields.
    #[error("{tag}: expected {expected} fields, got {got}")]
    FieldCount {
        tag: &'static str,
        expected: usize,
        got: usize,
    },

    /// A field that must be numeric (or otherwise structured) was not.
    #[error("{tag}: invalid {field} {value:?}")]
    InvalidField {
        tag: &'static str,
        field: &'static str,
        value: String,
    },

    /// An outbound field contains a delimiter and can't be framed.
    #[error("cannot encode {field}: contains ':' or a line break")]
    Unencodable { field: &'static str },
}

impl ProtocolError {
    /// Returns the message tag the error was raised for, if known.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::FieldCount { tag, .. } | Self::InvalidField { tag, .. } => {
                Some(*tag)
            }
            Self::UnknownTag(tag) => Some(tag.as_str()),
            Self::Empty | Self::NotUtf8 | Self::Unencodable { .. } => None,
        }
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        ErrorKind::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
        .into()
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        ErrorKind::InvalidOperation { name: name.into() }.into()
    }

    pub fn invalid_format(element: impl Into<String>, message: impl Into<String>) -> Error {
        ErrorKind::InvalidFormat {
            element: element.into(),
            message: message.into(),
        }
        .into()
    }

    pub fn access_denied(operation: impl Into<String>, path: impl Into<String>) -> Error {
        ErrorKind::AccessDenied {
            operation: operation.into(),
            path: path.into(),
        }
        .into()
    }

    pub fn out_of_range(offset: i64, len: u64, file_len: u64) -> Error {
        ErrorKind::OutOfRange {
            offset,
            len,
            file_len,
        }
        .into()
    }

    pub fn end_of_stream(pos: u64, requested: u64, len: u64) -> Error {
        ErrorKind::EndOfStream {
            pos,
            requested,
            len,
        }
        .into()
    }

    pub fn malformed_varint(width: u32) -> Error {
        ErrorKind::MalformedVarint { width }.into()
    }

    pub fn unknown_field(name: impl Into<String>) -> Error {
        ErrorKind::UnknownField { name: name.into() }.into()
    }

    pub fn unrecognized_type(type_name: impl Into<String>) -> Error {
        ErrorKind::UnrecognizedType {
            type_name: type_name.into(),
        }
        .into()
    }

    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Error {
        ErrorKind::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
        .into()
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        ErrorKind::Io {
            context: context.into(),
            source,
        }
        .into()
    }

    /// Returns `true` if this error was raised for an out-of-bounds offset or length.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.kind(), ErrorKind::OutOfRange { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("access denied: cannot {operation} '{path}'")]
    AccessDenied { operation: String, path: String },

    #[error("offset {offset} with length {len} is out of range for length {file_len}")]
    OutOfRange { offset: i64, len: u64, file_len: u64 },

    #[error("end of stream: requested {requested} bytes at {pos}, stream length is {len}")]
    EndOfStream { pos: u64, requested: u64, len: u64 },

    #[error("malformed compact {width}-bit integer")]
    MalformedVarint { width: u32 },

    #[error("unknown field name: '{name}'")]
    UnknownField { name: String },

    #[error("unrecognized type: {type_name}")]
    UnrecognizedType { type_name: String },

    #[error("type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("invalid storage format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn test_error_display() {
        let err = Error::out_of_range(-1, 4, 6);
        assert_eq!(
            err.to_string(),
            "offset -1 with length 4 is out of range for length 6"
        );
        assert!(err.is_out_of_range());

        let err = Error::unknown_field("title");
        assert_eq!(err.to_string(), "unknown field name: 'title'");
        assert!(!err.is_out_of_range());
    }

    #[test]
    fn test_error_kind_roundtrip() {
        let err = Error::type_mismatch("price", "float", "text");
        match err.into_kind() {
            ErrorKind::TypeMismatch {
                field,
                expected,
                actual,
            } => {
                assert_eq!(field, "price");
                assert_eq!(expected, "float");
                assert_eq!(actual, "text");
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::from(std::io::ErrorKind::NotFound);
        let err = Error::from(io);
        assert!(matches!(err.kind(), ErrorKind::Io { .. }));
    }
}

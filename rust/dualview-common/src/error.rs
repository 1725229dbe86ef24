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
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn size_mismatch(primary: usize, secondary: usize) -> Error {
        Error(ErrorKind::SizeMismatch { primary, secondary }.into())
    }

    pub fn concurrent_access(operation: &'static str, state: impl Into<String>) -> Error {
        Error(
            ErrorKind::ConcurrentAccessViolation {
                operation,
                state: state.into(),
            }
            .into(),
        )
    }

    pub fn use_after_dispose(operation: &'static str) -> Error {
        Error(ErrorKind::UseAfterDispose { operation }.into())
    }

    pub fn invalidated_handle(generation: u64) -> Error {
        Error(ErrorKind::InvalidatedHandle { generation }.into())
    }

    pub fn job_panicked(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::JobPanicked {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn scheduler(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Scheduler {
                message: message.into(),
            }
            .into(),
        )
    }

    /// Returns `true` if this error was raised by a failed guard check.
    pub fn is_concurrent_access(&self) -> bool {
        matches!(self.kind(), ErrorKind::ConcurrentAccessViolation { .. })
    }

    /// Returns `true` if this error reports an element size mismatch between
    /// the two views of an aliased buffer.
    pub fn is_size_mismatch(&self) -> bool {
        matches!(self.kind(), ErrorKind::SizeMismatch { .. })
    }

    pub fn is_use_after_dispose(&self) -> bool {
        matches!(self.kind(), ErrorKind::UseAfterDispose { .. })
    }

    pub fn is_invalidated_handle(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidatedHandle { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error(
        "element size mismatch: primary view element is {primary} bytes, \
         secondary view element is {secondary} bytes"
    )]
    SizeMismatch { primary: usize, secondary: usize },

    #[error("{operation} conflicts with an outstanding scheduled access ({state})")]
    ConcurrentAccessViolation {
        operation: &'static str,
        state: String,
    },

    #[error("{operation} called on a disposed sequence")]
    UseAfterDispose { operation: &'static str },

    #[error("access handle of generation {generation} has been invalidated")]
    InvalidatedHandle { generation: u64 },

    #[error("scheduled job panicked: {message}")]
    JobPanicked { message: String },

    #[error("failed to start the job scheduler: {message}")]
    Scheduler { message: String },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_predicates() {
        assert!(Error::size_mismatch(4, 8).is_size_mismatch());
        assert!(Error::concurrent_access("clear", "writing").is_concurrent_access());
        assert!(Error::use_after_dispose("resize").is_use_after_dispose());
        assert!(Error::invalidated_handle(3).is_invalidated_handle());
        assert!(!Error::invalid_arg("len", "too large").is_concurrent_access());
    }

    #[test]
    fn test_display() {
        let e = Error::concurrent_access("clear", "1 writer");
        assert_eq!(
            e.to_string(),
            "clear conflicts with an outstanding scheduled access (1 writer)"
        );
        let e = Error::size_mismatch(4, 8);
        assert!(e.to_string().contains("4 bytes"));
        assert!(e.to_string().contains("8 bytes"));
    }

    #[test]
    fn test_into_kind() {
        let e = Error::invalidated_handle(7);
        match e.into_kind() {
            ErrorKind::InvalidatedHandle { generation } => assert_eq!(generation, 7),
            other => panic!("unexpected kind {other:?}"),
        }
    }
}

// Error model shared by the aliasing engine, the API surface, and the CLI.
use std::error::Error as StdError;
use std::fmt;
use std::io;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Conflict,
    Limit,
    Io,
}

/// Both spellings of one logical field were supplied in the same object.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AliasConflict {
    pub old: String,
    pub new: String,
}

impl AliasConflict {
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }
}

impl fmt::Display for AliasConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "alias conflict: {:?} is a deprecated alias of {:?}; specify only one",
            self.old, self.new
        )
    }
}

impl StdError for AliasConflict {}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    offset: Option<u64>,
    conflict: Option<AliasConflict>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            offset: None,
            conflict: None,
            source: None,
        }
    }

    /// Conflict error whose public message names both spellings.
    pub fn conflict(conflict: AliasConflict) -> Self {
        Self::new(ErrorKind::Conflict)
            .with_message(format!(
                "Specify only one of {:?} or {:?}",
                conflict.old, conflict.new
            ))
            .with_conflict(conflict)
    }

    /// Recover a crate error that travelled through an `io::Read` boundary.
    pub fn from_io(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(inner) = inner.downcast::<Error>() {
                    return *inner;
                }
            }
            return Error::new(ErrorKind::Internal).with_message("lost wrapped error");
        }
        Error::new(ErrorKind::Io)
            .with_message("read failed")
            .with_source(err)
    }

    /// Copy of this error without its source, for errors that must be
    /// reported more than once.
    pub fn replicate(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            hint: self.hint.clone(),
            offset: self.offset,
            conflict: self.conflict.clone(),
            source: None,
        }
    }

    pub fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, self)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn alias_conflict(&self) -> Option<&AliasConflict> {
        self.conflict.as_ref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_conflict(mut self, conflict: AliasConflict) -> Self {
        self.conflict = Some(conflict);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " (offset: {offset})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        if let Some(source) = self.source.as_ref() {
            return Some(source.as_ref() as &(dyn StdError + 'static));
        }
        self.conflict
            .as_ref()
            .map(|conflict| conflict as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::Conflict => 3,
        ErrorKind::Limit => 4,
        ErrorKind::Io => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::{AliasConflict, Error, ErrorKind, to_exit_code};
    use std::io;

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Usage, 2),
            (ErrorKind::Conflict, 3),
            (ErrorKind::Limit, 4),
            (ErrorKind::Io, 5),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn conflict_message_names_both_fields() {
        let conflict = AliasConflict::new("team_id", "fleet_id");
        assert!(conflict.to_string().contains("team_id"));
        assert!(conflict.to_string().contains("fleet_id"));

        let err = Error::conflict(conflict.clone());
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            err.message(),
            Some("Specify only one of \"team_id\" or \"fleet_id\"")
        );
        assert_eq!(err.alias_conflict(), Some(&conflict));
    }

    #[test]
    fn from_io_recovers_wrapped_error() {
        let io_err = Error::conflict(AliasConflict::new("a", "b"))
            .with_offset(7)
            .into_io();
        let err = Error::from_io(io_err);
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.offset(), Some(7));
    }

    #[test]
    fn from_io_wraps_foreign_errors() {
        let err = Error::from_io(io::Error::new(io::ErrorKind::TimedOut, "slow peer"));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(std::error::Error::source(&err).is_some());
    }
}

//! Error types for mapping loads, class decoding and archive remapping.

use std::error::Error;
use std::fmt;

use thiserror::Error;

/// The specific kind of a [`MappingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MappingErrorKind {
    /// A line had the wrong shape for its dialect.
    #[error("malformed mapping line")]
    Parse,
    /// An old name was mapped to two different new names.
    #[error("conflicting mapping")]
    Conflict,
    /// An indented member line appeared before any class line.
    #[error("indented member line without a preceding class line")]
    MissingContext,
    /// A compact line could not be reversed because its owner class is unmapped.
    #[error("mapping line could not be reversed")]
    Reversal,
    /// A mapping directory contained none of the required base files.
    #[error("no joined.srg, client.srg or server.srg found")]
    MissingFiles,
    /// Reading a mapping source failed.
    #[error("failed to read mappings")]
    Io,
    /// The load options cannot be combined with this kind of source.
    #[error("unsupported load options")]
    Unsupported,
}

/// Error produced while loading a mapping table.
///
/// Loads are all-or-nothing: when an error is returned no table is handed out.
#[derive(Debug, Error)]
pub struct MappingError {
    pub(crate) kind: MappingErrorKind,
    pub(crate) line: Option<String>,
    pub(crate) detail: Option<String>,
    #[source]
    pub(crate) source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl MappingError {
    pub(crate) fn new(kind: MappingErrorKind, line: &str) -> Self {
        Self {
            kind,
            line: Some(line.to_owned()),
            detail: None,
            source: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// The specific kind of this error.
    pub fn kind(&self) -> MappingErrorKind {
        self.kind
    }

    /// The offending mapping line, if the error is tied to one.
    pub fn line(&self) -> Option<&str> {
        self.line.as_deref()
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        if let Some(line) = &self.line {
            write!(f, " in line={line:?}")?;
        }
        Ok(())
    }
}

impl From<MappingErrorKind> for MappingError {
    fn from(kind: MappingErrorKind) -> Self {
        Self {
            kind,
            line: None,
            detail: None,
            source: None,
        }
    }
}

impl From<std::io::Error> for MappingError {
    fn from(err: std::io::Error) -> Self {
        Self {
            kind: MappingErrorKind::Io,
            line: None,
            detail: None,
            source: Some(Box::new(err)),
        }
    }
}

/// The specific kind of a [`ClassError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ClassError {
    /// The data does not start with `0xCAFEBABE`.
    #[error("bad class file magic")]
    BadMagic,
    /// The class data ended in the middle of a structure.
    #[error("unexpected end of class data")]
    UnexpectedEof,
    /// A constant pool entry carried an unknown tag.
    #[error("unknown constant pool tag {0}")]
    BadConstant(u8),
    /// A constant pool index pointed at a missing or mistyped entry.
    #[error("invalid constant pool index {0}")]
    BadIndex(u16),
    /// A UTF8 constant was not valid modified UTF-8.
    #[error("invalid modified utf-8 in constant pool")]
    InvalidUtf8,
    /// A descriptor or signature could not be parsed.
    #[error("malformed descriptor or signature")]
    Descriptor,
    /// Rewriting needed more than 65535 constant pool slots.
    #[error("constant pool overflow")]
    PoolOverflow,
    /// An attribute body did not match its declared length.
    #[error("malformed attribute")]
    Attribute,
}

impl From<std::io::Error> for ClassError {
    fn from(_: std::io::Error) -> Self {
        // Class data is always decoded from memory, so the only io error is a short read.
        ClassError::UnexpectedEof
    }
}

/// The specific kind of a [`RemapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RemapErrorKind {
    /// Reading or writing an archive entry failed.
    #[error("archive io failure")]
    Io,
    /// The archive container itself was malformed.
    #[error("malformed archive")]
    Zip,
    /// A class entry could not be decoded or re-encoded.
    #[error("invalid class file")]
    Class,
    /// A pre or post processor rejected a class.
    #[error("class processor failed")]
    Processor,
}

/// Error produced while remapping a class or an archive.
///
/// An archive pass fails fast: the first failing entry aborts the whole run.
#[derive(Debug, Error)]
pub struct RemapError {
    pub(crate) kind: RemapErrorKind,
    pub(crate) entry: Option<String>,
    #[source]
    pub(crate) source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl RemapError {
    pub(crate) fn processor(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self {
            kind: RemapErrorKind::Processor,
            entry: None,
            source: Some(message.into()),
        }
    }

    pub(crate) fn in_entry(mut self, entry: &str) -> Self {
        if self.entry.is_none() {
            self.entry = Some(entry.to_owned());
        }
        self
    }

    /// The specific kind of this error.
    pub fn kind(&self) -> RemapErrorKind {
        self.kind
    }

    /// The archive entry that was being processed, if any.
    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }
}

impl fmt::Display for RemapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(entry) = &self.entry {
            write!(f, " in entry {entry}")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl From<RemapErrorKind> for RemapError {
    fn from(kind: RemapErrorKind) -> Self {
        Self {
            kind,
            entry: None,
            source: None,
        }
    }
}

impl From<ClassError> for RemapError {
    fn from(err: ClassError) -> Self {
        Self {
            kind: RemapErrorKind::Class,
            entry: None,
            source: Some(Box::new(err)),
        }
    }
}

impl From<std::io::Error> for RemapError {
    fn from(err: std::io::Error) -> Self {
        Self {
            kind: RemapErrorKind::Io,
            entry: None,
            source: Some(Box::new(err)),
        }
    }
}

impl From<zip::result::ZipError> for RemapError {
    fn from(err: zip::result::ZipError) -> Self {
        let kind = match err {
            zip::result::ZipError::Io(_) => RemapErrorKind::Io,
            _ => RemapErrorKind::Zip,
        };
        Self {
            kind,
            entry: None,
            source: Some(Box::new(err)),
        }
    }
}

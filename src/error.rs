// SPDX-License-Identifier: MIT OR Apache-2.0
//! Module for error handling code.

use std::error::Error as StdError;
use std::fmt::{Display, Formatter};

/// More convenient alias for `Box<dyn StdError + Send + Sync>`.
type BoxedError = Box<dyn StdError + Send + Sync>;

/// Kinds of errors for [Error]. Use [ErrorKind::error] and [ErrorKind::error_from] to generate
/// the [Error] value for this ErrorKind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind
{
    /// Allocation or capacity failure.
    Memory,

    /// Transient or terminal transport I/O failure.
    Io,

    /// Another process or the platform denied access to a device.
    Access,

    /// The referenced board, interface or device has disappeared.
    NotFound,

    /// The requested operation is not available in the board's current mode.
    Mode,

    /// A value (e.g. firmware size) falls outside the range the board accepts.
    Range,

    /// Firmware does not appear to match the target board's model.
    Firmware,

    /// The board's model is not supported without explicit opt-in.
    Unsupported,

    /// Unexpected platform/system-level failure.
    System,
}

impl ErrorKind
{
    /// Creates a new [Error] from this error kind.
    #[inline(always)]
    pub fn error(self) -> Error
    {
        Error::new(self, None)
    }

    /// Creates a new [Error] from this error kind, with the passed error as the source.
    #[inline(always)]
    pub fn error_from<E: StdError + Send + Sync + 'static>(self, source: E) -> Error
    {
        Error::new(self, Some(Box::new(source)))
    }
}

impl From<ErrorKind> for Error
{
    fn from(other: ErrorKind) -> Self
    {
        other.error()
    }
}

impl Display for ErrorKind
{
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result
    {
        use ErrorKind::*;
        match self {
            Memory => write!(f, "out of memory"),
            Io => write!(f, "transport I/O error"),
            Access => write!(f, "access denied"),
            NotFound => write!(f, "device or board not found"),
            Mode => write!(f, "operation not available in this mode"),
            Range => write!(f, "value out of range"),
            Firmware => write!(f, "firmware does not match board model"),
            Unsupported => write!(f, "board model is not supported"),
            System => write!(f, "system error"),
        }
    }
}

/// Error type for board-monitor and upload operations. Easily constructed from [ErrorKind].
#[derive(Debug)]
pub struct Error
{
    pub kind: ErrorKind,
    pub source: Option<BoxedError>,

    /// Additional context about what was being attempted when this error occurred.
    ///
    /// Example: "uploading block at offset 0x400".
    pub context: Option<String>,
}

impl Error
{
    #[inline(always)]
    pub fn new(kind: ErrorKind, source: Option<BoxedError>) -> Self
    {
        Self { kind, source, context: None }
    }

    /// Add additional context about what was being attempted when this error occurred.
    #[must_use]
    pub fn with_ctx(mut self, ctx: &str) -> Self
    {
        self.context = Some(ctx.to_string());
        self
    }

    /// Removes previously added context.
    #[must_use]
    pub fn without_ctx(mut self) -> Self
    {
        self.context = None;
        self
    }

    pub fn kind(&self) -> ErrorKind
    {
        self.kind
    }
}

impl Display for Error
{
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result
    {
        if let Some(ctx) = &self.context {
            write!(f, "(while {}): {}", ctx, self.kind)?;
        } else {
            write!(f, "{}", self.kind)?;
        }

        if let Some(source) = &self.source {
            write!(f, "\nCaused by: {}", source)?;
        }

        Ok(())
    }
}

impl StdError for Error
{
    fn source(&self) -> Option<&(dyn StdError + 'static)>
    {
        self.source.as_deref().map(|e| e as &dyn StdError)
    }
}

/// Extension trait to enable getting the error kind from a `Result<T, Error>` with one method.
pub trait ResErrorKind<T>
{
    fn err_kind(&self) -> Result<&T, ErrorKind>;
}

impl<T> ResErrorKind<T> for Result<T, Error>
{
    fn err_kind(&self) -> Result<&T, ErrorKind>
    {
        self.as_ref().map_err(|e| e.kind)
    }
}

use alloc::string::String;
use enough::StopReason;

/// Outcome of an open or decode call, as reported to callers.
///
/// Every [`CodecError`] maps onto exactly one status through
/// [`CodecError::status`]; a decode that returns `Ok` is [`Status::Success`].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// All requested rows were decoded.
    Success,
    /// The input ended early. Rows already written are valid and decoding
    /// can resume once more bytes are pushed.
    IncompleteInput,
    /// The input is corrupt past some point. Rows already written are valid.
    ErrorInInput,
    /// The input cannot be decoded at all.
    InvalidInput,
    /// The requested output layout or alpha mode is not reachable from the source.
    InvalidConversion,
    /// The input uses a feature this crate does not decode.
    Unimplemented,
    /// The caller's [`enough::Stop`] requested cancellation.
    Cancelled,
}

impl Status {
    /// Whether some pixels were produced (full or partial success).
    pub fn produced_pixels(self) -> bool {
        matches!(
            self,
            Self::Success | Self::IncompleteInput | Self::ErrorInInput
        )
    }
}

/// Errors from BMP, ICO and GIF decoding.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error("unrecognized format magic bytes")]
    UnrecognizedFormat,

    #[error("incomplete input: {rows_decoded} rows decoded")]
    IncompleteInput { rows_decoded: usize },

    #[error("error in input after {rows_decoded} rows")]
    ErrorInInput { rows_decoded: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid conversion: {0}")]
    InvalidConversion(String),

    #[error("unimplemented: {0}")]
    Unimplemented(String),

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("operation cancelled")]
    Cancelled(StopReason),
}

impl CodecError {
    /// The caller-facing status for this error.
    pub fn status(&self) -> Status {
        match self {
            Self::IncompleteInput { .. } => Status::IncompleteInput,
            Self::ErrorInInput { .. } => Status::ErrorInInput,
            Self::InvalidConversion(_) | Self::BufferTooSmall { .. } => Status::InvalidConversion,
            Self::Unimplemented(_) => Status::Unimplemented,
            Self::Cancelled(_) => Status::Cancelled,
            Self::UnrecognizedFormat
            | Self::InvalidInput(_)
            | Self::DimensionsTooLarge { .. }
            | Self::LimitExceeded(_) => Status::InvalidInput,
        }
    }

    /// Rows written before the decode stopped, for partial successes.
    pub fn rows_decoded(&self) -> Option<usize> {
        match self {
            Self::IncompleteInput { rows_decoded } | Self::ErrorInInput { rows_decoded } => {
                Some(*rows_decoded)
            }
            _ => None,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub(crate) fn conversion(msg: impl Into<String>) -> Self {
        Self::InvalidConversion(msg.into())
    }

    pub(crate) fn unimplemented(msg: impl Into<String>) -> Self {
        Self::Unimplemented(msg.into())
    }
}

impl From<StopReason> for CodecError {
    fn from(r: StopReason) -> Self {
        CodecError::Cancelled(r)
    }
}

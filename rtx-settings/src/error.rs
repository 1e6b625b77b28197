use thiserror::Error;

/// Errors reported by the NVM layers and the settings store. Marked as
/// non-exhaustive to allow for future additions without breaking the API;
/// most callers only need to distinguish argument errors from device I/O
/// failures, everything else is handled internally as partition state.
#[derive(Error, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// A bad argument: misaligned address, out-of-bounds access or an
    /// unknown area/partition index.
    #[error("invalid argument")]
    InvalidArgument,

    /// The backend does not implement the requested operation.
    #[error("operation not supported")]
    NotSupported,

    /// No settings frame exists in the scanned partition.
    #[error("no stored settings found")]
    NotFound,

    /// The partition header chain is malformed and cannot be walked.
    #[error("invalid data sequence")]
    IllSequence,

    /// A stored frame reports a length larger than this firmware's frame.
    /// Data written by newer firmware is rejected rather than misread.
    #[error("stored settings too large")]
    TooLarge,

    /// The underlying device failed a read, write, erase or sync.
    #[error("device i/o error")]
    Io,
}

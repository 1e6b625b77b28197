use thiserror::Error;

/// Errors that can occur while scanning, generating or exporting settings
/// partition images.
#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("image of {0} bytes is too small to hold a settings frame")]
    ImageTooSmall(usize),

    #[error("invalid frame chain at offset {offset:#x}")]
    InvalidChain { offset: usize },

    #[error("frame at offset {offset:#x} runs past the end of the image")]
    TruncatedFrame { offset: usize },

    #[error("frame at offset {offset:#x}: {source}")]
    Frame {
        offset: usize,
        source: rtx_settings::error::Error,
    },
}

use std::{
    num::{ParseFloatError, ParseIntError, TryFromIntError},
    path::PathBuf,
    str::Utf8Error,
};
use thiserror::Error;

pub type MnvxResult<T> = std::result::Result<T, MnvxError>;

#[derive(Debug, Error)]
pub enum MnvxError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Htslib(#[from] rust_htslib::errors::Error),
    #[error(transparent)]
    Utf8(#[from] Utf8Error),
    #[error(transparent)]
    ParseInt(#[from] ParseIntError),
    #[error(transparent)]
    ParseFloat(#[from] ParseFloatError),
    #[error(transparent)]
    TryFromInt(#[from] TryFromIntError),
    #[error("Malformed linkage report line {line_number} ({cause}): {line}")]
    MalformedLinkageLine {
        line_number: usize,
        line: String,
        cause: String,
    },
    #[error("Sample {sample} of a merged record is not present in the output header")]
    UnresolvedSample { sample: String },
    #[error("Contig {contig} of a merged record is not declared in the output header")]
    UnknownContig { contig: String },
    #[error("Invalid gzip header: {}", path.display())]
    InvalidGzipHeader { path: PathBuf },
}

impl MnvxError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn malformed_linkage_line(
        line_number: usize,
        line: &str,
        cause: impl Into<String>,
    ) -> Self {
        Self::MalformedLinkageLine {
            line_number,
            line: line.to_string(),
            cause: cause.into(),
        }
    }
}

#[macro_export]
macro_rules! mnvx_error {
    ($($arg:tt)*) => {
        $crate::error::MnvxError::message(format!($($arg)*))
    };
}

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum SkyPartError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Malformed record at line {line}: {reason}")]
    CsvRow { line: u64, reason: String },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Pixel {pixel} does not exist at nside {nside}")]
    PixelOutOfRange { pixel: u64, nside: u32 },

    #[error("Fine pixel {fine} is not inside base pixel {base}")]
    InconsistentCompositeKey { base: u64, fine: u64 },

    #[error("Strict validation failed: {0}")]
    StrictValidation(String),

    #[error("Store connection failed: {0}")]
    StoreConnection(String),

    #[error("Store rejected the write: {0}")]
    RowWrite(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl From<StoreError> for SkyPartError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connection(msg) => SkyPartError::StoreConnection(msg),
            StoreError::Rejected(msg) => SkyPartError::RowWrite(msg),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for SkyPartError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        SkyPartError::WorkerPool(err.to_string())
    }
}

impl PartialEq for SkyPartError {
    fn eq(&self, other: &Self) -> bool {
        use SkyPartError::*;
        match (self, other) {
            (InvalidConfiguration(a), InvalidConfiguration(b)) => a == b,
            (MissingColumn(a), MissingColumn(b)) => a == b,
            (
                CsvRow {
                    line: la,
                    reason: ra,
                },
                CsvRow {
                    line: lb,
                    reason: rb,
                },
            ) => la == lb && ra == rb,
            (InvalidTimestamp(a), InvalidTimestamp(b)) => a == b,
            (
                PixelOutOfRange {
                    pixel: pa,
                    nside: na,
                },
                PixelOutOfRange {
                    pixel: pb,
                    nside: nb,
                },
            ) => pa == pb && na == nb,
            (
                InconsistentCompositeKey { base: ba, fine: fa },
                InconsistentCompositeKey { base: bb, fine: fb },
            ) => ba == bb && fa == fb,
            (StrictValidation(a), StrictValidation(b)) => a == b,
            (StoreConnection(a), StoreConnection(b)) => a == b,
            (RowWrite(a), RowWrite(b)) => a == b,
            (WorkerPool(a), WorkerPool(b)) => a == b,
            (InvalidQuery(a), InvalidQuery(b)) => a == b,

            // Wrapped foreign errors are not comparable: same variant is enough
            (CsvError(_), CsvError(_)) => true,
            (IoError(_), IoError(_)) => true,

            _ => false,
        }
    }
}

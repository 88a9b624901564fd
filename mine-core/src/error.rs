//! Error types for the seed-mining core.
//!
//! Defines the error enum exposed by the public API, a stable machine-readable
//! code for each variant, and a convenient result alias.

use std::fmt;

use thiserror::Error;

/// Stable codes describing [`MineError`] variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum MineErrorCode {
    /// `w` or `h` was not positive.
    InvalidWorldSize,
    /// `samples` was negative.
    InvalidSampleCount,
    /// `days` was negative.
    InvalidDayCount,
    /// An enum string (objective, sampler, diversity mode, metric) was unrecognised.
    UnknownEnumValue,
    /// The score expression failed to compile.
    ExprCompileFailure,
    /// A hydrology routine reported a shape mismatch against the world it was run on.
    HydrologyShapeMismatch,
    /// Checkpoint JSON could not be parsed.
    CheckpointParseFailure,
    /// A checkpoint line had an unexpected `type` for the context it appeared in.
    CheckpointWrongType,
    /// A checkpoint record referenced an out-of-range stage or index.
    CheckpointOutOfRange,
    /// The loaded checkpoint header does not match the requested run configuration.
    CheckpointConfigMismatch,
    /// An I/O failure occurred while reading or writing a checkpoint or export file.
    Io,
}

impl MineErrorCode {
    /// Returns the stable machine-readable representation of this error code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidWorldSize => "MINE_INVALID_WORLD_SIZE",
            Self::InvalidSampleCount => "MINE_INVALID_SAMPLE_COUNT",
            Self::InvalidDayCount => "MINE_INVALID_DAY_COUNT",
            Self::UnknownEnumValue => "MINE_UNKNOWN_ENUM_VALUE",
            Self::ExprCompileFailure => "MINE_EXPR_COMPILE_FAILURE",
            Self::HydrologyShapeMismatch => "MINE_HYDROLOGY_SHAPE_MISMATCH",
            Self::CheckpointParseFailure => "MINE_CHECKPOINT_PARSE_FAILURE",
            Self::CheckpointWrongType => "MINE_CHECKPOINT_WRONG_TYPE",
            Self::CheckpointOutOfRange => "MINE_CHECKPOINT_OUT_OF_RANGE",
            Self::CheckpointConfigMismatch => "MINE_CHECKPOINT_CONFIG_MISMATCH",
            Self::Io => "MINE_IO",
        }
    }
}

impl fmt::Display for MineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type produced while configuring or running a mining session.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MineError {
    /// `w` or `h` was not positive.
    #[error("world dimensions must be positive (got w={w}, h={h})")]
    InvalidWorldSize {
        /// Requested width.
        w: i32,
        /// Requested height.
        h: i32,
    },
    /// `samples` was negative.
    #[error("samples must be non-negative (got {got})")]
    InvalidSampleCount {
        /// Rejected sample count.
        got: i32,
    },
    /// `days` was negative.
    #[error("days must be non-negative (got {got})")]
    InvalidDayCount {
        /// Rejected day count.
        got: i32,
    },
    /// An enum string was unrecognised.
    #[error("unrecognised {kind} value: `{value}`")]
    UnknownEnumValue {
        /// Name of the enum being parsed (`objective`, `seed sampler`, ...).
        kind: &'static str,
        /// Raw string that failed to parse.
        value: String,
    },
    /// The score expression failed to compile.
    #[error("failed to compile score expression at byte {offset}: {message}\n{pointer}")]
    ExprCompileFailure {
        /// Byte offset of the failing token.
        offset: usize,
        /// Human-readable compiler message.
        message: String,
        /// Arrow-pointing rendering of the failing token's location.
        pointer: String,
    },
    /// A hydrology routine reported a shape mismatch against the world it was run on.
    #[error("hydrology routine `{routine}` returned a shape mismatch: {detail}")]
    HydrologyShapeMismatch {
        /// Name of the offending external routine.
        routine: &'static str,
        /// Description of the mismatch.
        detail: String,
    },
    /// Checkpoint JSON could not be parsed.
    #[error("checkpoint parse error at line {line}: {message}")]
    CheckpointParseFailure {
        /// 1-based line number within the checkpoint file.
        line: usize,
        /// Underlying parse message.
        message: String,
    },
    /// A checkpoint line had an unexpected `type` for the context it appeared in.
    #[error("checkpoint line {line} has unexpected type `{found}` (expected `{expected}`)")]
    CheckpointWrongType {
        /// 1-based line number within the checkpoint file.
        line: usize,
        /// `type` value actually present.
        found: String,
        /// `type` value that was required.
        expected: &'static str,
    },
    /// A checkpoint record referenced an out-of-range stage or index.
    #[error("checkpoint line {line} references out-of-range {field} {value}")]
    CheckpointOutOfRange {
        /// 1-based line number within the checkpoint file.
        line: usize,
        /// Name of the offending field (`index` or `stage`).
        field: &'static str,
        /// Offending value.
        value: i64,
    },
    /// The loaded checkpoint header does not match the requested run configuration.
    #[error("checkpoint configuration mismatch: {reason}")]
    CheckpointConfigMismatch {
        /// Human-readable reason, e.g. `"days differs"`.
        reason: String,
    },
    /// An I/O failure occurred while reading or writing a checkpoint or export file.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl MineError {
    /// Retrieves the stable [`MineErrorCode`] for this error.
    #[must_use]
    pub const fn code(&self) -> MineErrorCode {
        match self {
            Self::InvalidWorldSize { .. } => MineErrorCode::InvalidWorldSize,
            Self::InvalidSampleCount { .. } => MineErrorCode::InvalidSampleCount,
            Self::InvalidDayCount { .. } => MineErrorCode::InvalidDayCount,
            Self::UnknownEnumValue { .. } => MineErrorCode::UnknownEnumValue,
            Self::ExprCompileFailure { .. } => MineErrorCode::ExprCompileFailure,
            Self::HydrologyShapeMismatch { .. } => MineErrorCode::HydrologyShapeMismatch,
            Self::CheckpointParseFailure { .. } => MineErrorCode::CheckpointParseFailure,
            Self::CheckpointWrongType { .. } => MineErrorCode::CheckpointWrongType,
            Self::CheckpointOutOfRange { .. } => MineErrorCode::CheckpointOutOfRange,
            Self::CheckpointConfigMismatch { .. } => MineErrorCode::CheckpointConfigMismatch,
            Self::Io { .. } => MineErrorCode::Io,
        }
    }
}

impl From<std::io::Error> for MineError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

/// Convenient alias for results returned by the mining core API.
pub type Result<T> = core::result::Result<T, MineError>;

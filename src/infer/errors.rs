use thiserror::Error;

use crate::global::LocOffsets;

/// A type error found while inferring one method.
///
/// Types and symbols are already rendered, so the error outlives the tables it came from.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("method {method:?} does not exist on {receiver}")]
    UnknownMethod {
        loc: LocOffsets,
        method: String,
        receiver: String,
    },
    #[error("wrong number of arguments for {method}: expected {expected}, got {found}")]
    ArgumentCountMismatch {
        loc: LocOffsets,
        method: String,
        expected: String,
        found: usize,
    },
    #[error("argument {arg:?} of {method} expects {expected}, got {found}")]
    ArgumentTypeMismatch {
        loc: LocOffsets,
        method: String,
        arg: String,
        expected: String,
        found: String,
    },
    #[error("non-private call to private method {method}")]
    PrivateMethodCall { loc: LocOffsets, method: String },
    #[error("expected {expected} but found {found} for method result type")]
    ReturnTypeMismatch {
        loc: LocOffsets,
        expected: String,
        found: String,
    },
    #[error("block passed to {method} returns {found}, expected {expected}")]
    BlockReturnTypeMismatch {
        loc: LocOffsets,
        method: String,
        expected: String,
        found: String,
    },
    #[error("argument to T.{cast} does not have asserted type {expected}, got {found}")]
    CastTypeMismatch {
        loc: LocOffsets,
        cast: String,
        expected: String,
        found: String,
    },
    #[error("control flow could reach T.absurd because the type {found} wasn't handled")]
    NotExhaustive { loc: LocOffsets, found: String },
}

impl InferenceError {
    pub fn loc(&self) -> LocOffsets {
        match self {
            InferenceError::UnknownMethod { loc, .. }
            | InferenceError::ArgumentCountMismatch { loc, .. }
            | InferenceError::ArgumentTypeMismatch { loc, .. }
            | InferenceError::PrivateMethodCall { loc, .. }
            | InferenceError::ReturnTypeMismatch { loc, .. }
            | InferenceError::BlockReturnTypeMismatch { loc, .. }
            | InferenceError::CastTypeMismatch { loc, .. }
            | InferenceError::NotExhaustive { loc, .. } => *loc,
        }
    }

    /// A stable name for the kind of error.
    pub fn code(&self) -> &'static str {
        match self {
            InferenceError::UnknownMethod { .. } => "UnknownMethod",
            InferenceError::ArgumentCountMismatch { .. } => "ArgumentCountMismatch",
            InferenceError::ArgumentTypeMismatch { .. } => "ArgumentTypeMismatch",
            InferenceError::PrivateMethodCall { .. } => "PrivateMethodCall",
            InferenceError::ReturnTypeMismatch { .. } => "ReturnTypeMismatch",
            InferenceError::BlockReturnTypeMismatch { .. } => "BlockReturnTypeMismatch",
            InferenceError::CastTypeMismatch { .. } => "CastTypeMismatch",
            InferenceError::NotExhaustive { .. } => "NotExhaustive",
        }
    }
}

//! Approval broker error types.

use flowgate_core::ApprovalId;
use thiserror::Error;

/// Errors that can occur while resolving an approval.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// `respond` was called with an id that is not (or no longer) pending.
    #[error("no pending approval with id {0}")]
    NotPending(ApprovalId),
    /// The option list supplied to `request` was empty.
    #[error("approval request must offer at least one option")]
    NoOptions,
}

/// Result type for approval broker operations.
pub type Result<T> = std::result::Result<T, ApprovalError>;

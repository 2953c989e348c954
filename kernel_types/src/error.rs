//! Kernel error types

use crate::result::{self, ResultCode};
use thiserror::Error;

/// Errors produced by the kernel object, synchronization and IPC core.
///
/// Every variant lowers to a packed [`ResultCode`] for the guest; none of
/// these errors are retried inside the kernel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// A handle failed validation (stale generation, out-of-range slot, or
    /// an object of the wrong kind for the operation).
    #[error("invalid handle")]
    InvalidHandle,

    /// The handle table has no free slot left.
    #[error("out of handles")]
    OutOfHandles,

    /// Parameters violate an invariant when taken together.
    #[error("invalid combination: {0}")]
    InvalidCombination(String),

    /// A counted resource would exceed its bound.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// Reserved: the caller lacks the authority for the operation.
    #[error("not authorized")]
    NotAuthorized,

    /// Reserved: the operation would exceed a port's session limit.
    /// Currently unreachable; the limit is deliberately not enforced.
    #[error("operation would block")]
    WouldBlock,

    /// The requested capability is recognized but not modeled.
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// Accepting on a port with no queued incoming connections.
    #[error("no pending sessions")]
    NoPendingSessions,

    /// The remote endpoint of the session is gone.
    #[error("session closed by remote")]
    SessionClosed,
}

impl KernelError {
    /// Lowers this error to the packed result word reported to the guest.
    pub fn result_code(&self) -> ResultCode {
        match self {
            KernelError::InvalidHandle => result::ERR_INVALID_HANDLE,
            KernelError::OutOfHandles => result::ERR_OUT_OF_HANDLES,
            KernelError::InvalidCombination(_) => result::ERR_INVALID_COMBINATION,
            KernelError::OutOfRange(_) => result::ERR_OUT_OF_RANGE,
            KernelError::NotAuthorized => result::ERR_NOT_AUTHORIZED,
            KernelError::WouldBlock => result::ERR_MAX_CONNECTIONS_REACHED,
            KernelError::Unimplemented(_) => result::ERR_NOT_IMPLEMENTED,
            KernelError::NoPendingSessions => result::ERR_NO_PENDING_SESSIONS,
            KernelError::SessionClosed => result::ERR_SESSION_CLOSED_BY_REMOTE,
        }
    }
}

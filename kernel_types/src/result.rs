//! Packed guest result codes
//!
//! The guest OS reports every system call outcome as a single 32-bit word
//! packing a `(description, module, summary, level)` tuple. The kernel core
//! treats the word as an opaque discriminated value; only the packing and
//! the well-known kernel constants live here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fine-grained error cause. Only the values this kernel core can produce
/// are modeled; guests treat unknown descriptions as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ErrorDescription {
    Success = 0,
    SessionClosedByRemote = 26,
    NoPendingSessions = 35,
    MaxConnectionsReached = 52,
    NotAuthorized = 1002,
    InvalidCombination = 1006,
    OutOfMemory = 1011,
    NotImplemented = 1012,
    InvalidHandle = 1015,
    OutOfRange = 1021,
}

/// Subsystem that produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ErrorModule {
    Common = 0,
    Kernel = 1,
    Os = 3,
}

/// Coarse classification of the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ErrorSummary {
    Success = 0,
    NothingHappened = 1,
    WouldBlock = 2,
    OutOfResource = 3,
    NotFound = 4,
    InvalidState = 5,
    NotSupported = 6,
    InvalidArgument = 7,
    WrongArgument = 8,
    Canceled = 9,
    StatusChanged = 10,
}

/// Severity of the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ErrorLevel {
    Success = 0,
    Info = 1,
    Status = 25,
    Temporary = 26,
    Permanent = 27,
    Usage = 28,
    Fatal = 31,
}

const DESCRIPTION_SHIFT: u32 = 0;
const MODULE_SHIFT: u32 = 10;
const SUMMARY_SHIFT: u32 = 21;
const LEVEL_SHIFT: u32 = 27;

/// The packed result word returned to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultCode(u32);

/// The all-zero success code.
pub const RESULT_SUCCESS: ResultCode = ResultCode(0);

impl ResultCode {
    /// Packs a result code from its four fields.
    pub const fn new(
        description: ErrorDescription,
        module: ErrorModule,
        summary: ErrorSummary,
        level: ErrorLevel,
    ) -> Self {
        Self(
            (description as u32) << DESCRIPTION_SHIFT
                | (module as u32) << MODULE_SHIFT
                | (summary as u32) << SUMMARY_SHIFT
                | (level as u32) << LEVEL_SHIFT,
        )
    }

    /// Reinterprets a raw guest word as a result code.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw 32-bit word.
    pub const fn as_raw(&self) -> u32 {
        self.0
    }

    /// Error levels of `Status` and above set the sign bit of the word;
    /// guests test it with a single signed comparison.
    pub const fn is_error(&self) -> bool {
        self.0 >> 31 != 0
    }

    pub const fn is_success(&self) -> bool {
        !self.is_error()
    }

    /// Extracts the raw description field.
    pub const fn description(&self) -> u32 {
        (self.0 >> DESCRIPTION_SHIFT) & 0x3FF
    }

    /// Extracts the raw module field.
    pub const fn module(&self) -> u32 {
        (self.0 >> MODULE_SHIFT) & 0xFF
    }

    /// Extracts the raw summary field.
    pub const fn summary(&self) -> u32 {
        (self.0 >> SUMMARY_SHIFT) & 0x3F
    }

    /// Extracts the raw level field.
    pub const fn level(&self) -> u32 {
        (self.0 >> LEVEL_SHIFT) & 0x1F
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResultCode({:#010X})", self.0)
    }
}

/// A handle failed validation: stale generation or out-of-range slot.
pub const ERR_INVALID_HANDLE: ResultCode = ResultCode::new(
    ErrorDescription::InvalidHandle,
    ErrorModule::Kernel,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Permanent,
);

/// The handle table has no free slots left.
pub const ERR_OUT_OF_HANDLES: ResultCode = ResultCode::new(
    ErrorDescription::OutOfMemory,
    ErrorModule::Kernel,
    ErrorSummary::OutOfResource,
    ErrorLevel::Permanent,
);

/// Parameters violate an invariant when taken together.
pub const ERR_INVALID_COMBINATION: ResultCode = ResultCode::new(
    ErrorDescription::InvalidCombination,
    ErrorModule::Kernel,
    ErrorSummary::WrongArgument,
    ErrorLevel::Usage,
);

/// A counted resource would exceed its bound.
pub const ERR_OUT_OF_RANGE: ResultCode = ResultCode::new(
    ErrorDescription::OutOfRange,
    ErrorModule::Kernel,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Usage,
);

/// Reserved: the caller lacks the authority for the operation.
pub const ERR_NOT_AUTHORIZED: ResultCode = ResultCode::new(
    ErrorDescription::NotAuthorized,
    ErrorModule::Kernel,
    ErrorSummary::WrongArgument,
    ErrorLevel::Permanent,
);

/// Reserved: a port has reached its session limit.
pub const ERR_MAX_CONNECTIONS_REACHED: ResultCode = ResultCode::new(
    ErrorDescription::MaxConnectionsReached,
    ErrorModule::Os,
    ErrorSummary::WouldBlock,
    ErrorLevel::Temporary,
);

/// The requested capability is recognized but not modeled.
pub const ERR_NOT_IMPLEMENTED: ResultCode = ResultCode::new(
    ErrorDescription::NotImplemented,
    ErrorModule::Kernel,
    ErrorSummary::NotSupported,
    ErrorLevel::Permanent,
);

/// Accepting on a port with no queued incoming connections.
pub const ERR_NO_PENDING_SESSIONS: ResultCode = ResultCode::new(
    ErrorDescription::NoPendingSessions,
    ErrorModule::Os,
    ErrorSummary::WouldBlock,
    ErrorLevel::Permanent,
);

/// The remote endpoint of a session is gone.
pub const ERR_SESSION_CLOSED_BY_REMOTE: ResultCode = ResultCode::new(
    ErrorDescription::SessionClosedByRemote,
    ErrorModule::Os,
    ErrorSummary::Canceled,
    ErrorLevel::Status,
);

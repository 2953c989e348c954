//! # Kernel Types
//!
//! This crate defines the guest-visible value types of the emulated kernel.
//!
//! ## Philosophy
//!
//! - **Opaque over structural**: guests see 32-bit tokens, never object
//!   identity. The packing is an implementation detail of the kernel.
//! - **Stale references are detectable**: every handle carries a generation
//!   counter so a reused slot invalidates old tokens.
//! - **Errors are values**: guest misuse surfaces as a typed error and a
//!   packed result code, never as a host crash.
//!
//! ## Key Types
//!
//! - [`Handle`]: an opaque guest-visible token referencing a kernel object
//! - [`ResultCode`]: the packed result word returned to the guest
//! - [`KernelError`]: the host-side error taxonomy

pub mod error;
pub mod handle;
pub mod result;

pub use error::KernelError;
pub use handle::{Handle, CURRENT_PROCESS, CURRENT_THREAD};
pub use result::{
    ErrorDescription, ErrorLevel, ErrorModule, ErrorSummary, ResultCode, RESULT_SUCCESS,
};

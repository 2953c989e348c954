//! Opaque guest-visible handles

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bits used for the generation counter in a handle.
pub const GENERATION_BITS: u32 = 15;

/// Mask covering the generation field of a handle.
const GENERATION_MASK: u32 = (1 << GENERATION_BITS) - 1;

/// Pseudo-handle referring to the currently running thread.
pub const CURRENT_THREAD: Handle = Handle(0xFFFF_8000);

/// Pseudo-handle referring to the current process.
pub const CURRENT_PROCESS: Handle = Handle(0xFFFF_8001);

/// An opaque 32-bit token referencing a kernel object.
///
/// Handles are packed as `generation | (slot << 15)`. The generation is a
/// non-zero 15-bit counter incremented each time a table slot is reused, so
/// a handle that outlives its object fails validation instead of silently
/// resolving to the slot's new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle(u32);

impl Handle {
    /// Builds a handle from a table slot and a generation counter.
    pub fn from_parts(slot: u16, generation: u16) -> Self {
        Self((generation as u32 & GENERATION_MASK) | ((slot as u32) << GENERATION_BITS))
    }

    /// Reinterprets a raw guest word as a handle.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw 32-bit token.
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    /// Returns the table slot this handle refers to.
    pub fn slot(&self) -> u16 {
        (self.0 >> GENERATION_BITS) as u16
    }

    /// Returns the generation counter embedded in this handle.
    pub fn generation(&self) -> u16 {
        (self.0 & GENERATION_MASK) as u16
    }

    /// Checks whether this is one of the reserved pseudo-handles that
    /// bypass the handle table.
    pub fn is_pseudo(&self) -> bool {
        *self == CURRENT_THREAD || *self == CURRENT_PROCESS
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#010X})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_round_trip() {
        let handle = Handle::from_parts(42, 7);
        assert_eq!(handle.slot(), 42);
        assert_eq!(handle.generation(), 7);
    }

    #[test]
    fn test_handle_packing_layout() {
        let handle = Handle::from_parts(1, 1);
        assert_eq!(handle.as_raw(), 1 | (1 << 15));
    }

    #[test]
    fn test_generation_is_masked() {
        // A generation above 15 bits must not leak into the slot field.
        let handle = Handle::from_parts(0, u16::MAX);
        assert_eq!(handle.slot(), 0);
        assert_eq!(handle.generation(), (1 << 15) - 1);
    }

    #[test]
    fn test_pseudo_handles() {
        assert!(CURRENT_THREAD.is_pseudo());
        assert!(CURRENT_PROCESS.is_pseudo());
        assert!(!Handle::from_parts(0, 1).is_pseudo());
    }

    #[test]
    fn test_handle_display() {
        let handle = Handle::from_raw(0xDEAD_BEEF);
        assert_eq!(format!("{}", handle), "Handle(0xDEADBEEF)");
    }
}

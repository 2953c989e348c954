//! Counting semaphores
//!
//! The count is stored as `i32` to mirror the guest-visible type, but the
//! creation and release bounds keep it non-negative and at most `max_count`.

use crate::object::{KernelObject, ObjectId};
use crate::wait_object::{SyncEvent, WaitList};
use crate::Kernel;
use kernel_types::KernelError;

#[derive(Debug)]
pub struct Semaphore {
    pub(crate) name: String,
    pub(crate) max_count: i32,
    pub(crate) available_count: i32,
    pub(crate) waiting: WaitList,
}

impl Semaphore {
    pub(crate) fn acquire(&mut self) {
        self.available_count -= 1;
    }
}

impl Kernel {
    /// Creates a semaphore. Requires `0 <= initial_count <= max_count`.
    pub fn create_semaphore(
        &mut self,
        initial_count: i32,
        max_count: i32,
        name: &str,
    ) -> Result<ObjectId, KernelError> {
        if initial_count < 0 || max_count < 0 || initial_count > max_count {
            return Err(KernelError::InvalidCombination(format!(
                "semaphore bounds initial={initial_count} max={max_count}"
            )));
        }
        Ok(self.objects.insert(KernelObject::Semaphore(Semaphore {
            name: name.to_string(),
            max_count,
            available_count: initial_count,
            waiting: WaitList::new(),
        })))
    }

    /// Adds `release_count` to the available count and wakes waiters.
    /// Returns the count as it was before the release. Fails without side
    /// effects if the release would exceed `max_count`.
    pub fn release_semaphore(
        &mut self,
        semaphore: ObjectId,
        release_count: i32,
    ) -> Result<i32, KernelError> {
        let state = self.semaphore(semaphore)?;
        if release_count < 0 || state.max_count - state.available_count < release_count {
            return Err(KernelError::OutOfRange(format!(
                "release of {release_count} exceeds max {} (available {})",
                state.max_count, state.available_count
            )));
        }
        let previous = state.available_count;
        self.semaphore_mut(semaphore)?.available_count += release_count;
        self.sync_audit
            .push(SyncEvent::ObjectSignaled { object: semaphore });
        self.wakeup_all_waiting_threads(semaphore);
        Ok(previous)
    }

    pub fn semaphore_available_count(&self, semaphore: ObjectId) -> Result<i32, KernelError> {
        Ok(self.semaphore(semaphore)?.available_count)
    }
}

//! Events
//!
//! An event is a latch another context raises to release waiters. The reset
//! type decides what happens to the latch when a waiter consumes it.

use crate::object::{KernelObject, ObjectId};
use crate::wait_object::{SyncEvent, WaitList};
use crate::Kernel;
use kernel_types::KernelError;
use serde::{Deserialize, Serialize};

/// How an event's signaled state is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetType {
    /// Clears when a waiter acquires it.
    OneShot,
    /// Stays signaled until cleared explicitly.
    Sticky,
    /// Reserved; creation with this type is rejected.
    Pulse,
}

#[derive(Debug)]
pub struct Event {
    pub(crate) name: String,
    pub(crate) reset_type: ResetType,
    pub(crate) signaled: bool,
    pub(crate) waiting: WaitList,
}

impl Event {
    pub(crate) fn acquire(&mut self) {
        if self.reset_type != ResetType::Sticky {
            self.signaled = false;
        }
    }
}

impl Kernel {
    /// Creates an event, initially unsignaled. The returned id carries the
    /// creation reference.
    pub fn create_event(
        &mut self,
        reset_type: ResetType,
        name: &str,
    ) -> Result<ObjectId, KernelError> {
        if reset_type == ResetType::Pulse {
            return Err(KernelError::Unimplemented(
                "pulse events are not supported".into(),
            ));
        }
        Ok(self.objects.insert(KernelObject::Event(Event {
            name: name.to_string(),
            reset_type,
            signaled: false,
            waiting: WaitList::new(),
        })))
    }

    /// Signals the event and wakes every waiter it can satisfy.
    /// Signaling an already-signaled event is harmless.
    pub fn signal_event(&mut self, event: ObjectId) -> Result<(), KernelError> {
        self.event_mut(event)?.signaled = true;
        self.sync_audit.push(SyncEvent::ObjectSignaled { object: event });
        self.wakeup_all_waiting_threads(event);
        Ok(())
    }

    /// Clears the event without waking anyone.
    pub fn clear_event(&mut self, event: ObjectId) -> Result<(), KernelError> {
        self.event_mut(event)?.signaled = false;
        Ok(())
    }

    pub fn event_signaled(&self, event: ObjectId) -> Result<bool, KernelError> {
        Ok(self.event(event)?.signaled)
    }

    pub fn event_reset_type(&self, event: ObjectId) -> Result<ResetType, KernelError> {
        Ok(self.event(event)?.reset_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::{ThreadStatus, WaitDescriptor, THREADPRIO_DEFAULT};

    #[test]
    fn test_pulse_events_are_rejected() {
        let mut kernel = Kernel::new();
        assert!(matches!(
            kernel.create_event(ResetType::Pulse, "pulse"),
            Err(KernelError::Unimplemented(_))
        ));
    }

    #[test]
    fn test_one_shot_clears_on_acquire() {
        let mut kernel = Kernel::new();
        let event = kernel.create_event(ResetType::OneShot, "evt").unwrap();
        let thread = kernel.create_thread("t", THREADPRIO_DEFAULT).unwrap();

        kernel
            .block_thread(thread, WaitDescriptor::Any(vec![event]), false)
            .unwrap();
        kernel.signal_event(event).unwrap();

        assert_eq!(kernel.thread_status(thread).unwrap(), ThreadStatus::Ready);
        assert!(!kernel.event_signaled(event).unwrap());
    }

    #[test]
    fn test_one_shot_wakes_only_one_waiter() {
        let mut kernel = Kernel::new();
        let event = kernel.create_event(ResetType::OneShot, "evt").unwrap();
        let t1 = kernel.create_thread("t1", 10).unwrap();
        let t2 = kernel.create_thread("t2", 20).unwrap();

        for thread in [t1, t2] {
            kernel
                .block_thread(thread, WaitDescriptor::Any(vec![event]), false)
                .unwrap();
        }
        kernel.signal_event(event).unwrap();

        assert_eq!(kernel.thread_status(t1).unwrap(), ThreadStatus::Ready);
        assert_eq!(kernel.thread_status(t2).unwrap(), ThreadStatus::WaitSync);
    }

    #[test]
    fn test_sticky_wakes_every_waiter_and_stays_signaled() {
        let mut kernel = Kernel::new();
        let event = kernel.create_event(ResetType::Sticky, "evt").unwrap();
        let t1 = kernel.create_thread("t1", 10).unwrap();
        let t2 = kernel.create_thread("t2", 20).unwrap();

        for thread in [t1, t2] {
            kernel
                .block_thread(thread, WaitDescriptor::Any(vec![event]), false)
                .unwrap();
        }
        kernel.signal_event(event).unwrap();

        assert_eq!(kernel.thread_status(t1).unwrap(), ThreadStatus::Ready);
        assert_eq!(kernel.thread_status(t2).unwrap(), ThreadStatus::Ready);
        assert!(kernel.event_signaled(event).unwrap());
    }

    #[test]
    fn test_clear_does_not_wake() {
        let mut kernel = Kernel::new();
        let event = kernel.create_event(ResetType::Sticky, "evt").unwrap();
        let thread = kernel.create_thread("t", THREADPRIO_DEFAULT).unwrap();

        kernel.signal_event(event).unwrap();
        kernel.clear_event(event).unwrap();
        kernel
            .block_thread(thread, WaitDescriptor::Any(vec![event]), false)
            .unwrap();

        assert_eq!(
            kernel.thread_status(thread).unwrap(),
            ThreadStatus::WaitSync
        );
    }

    #[test]
    fn test_signal_twice_is_harmless() {
        let mut kernel = Kernel::new();
        let event = kernel.create_event(ResetType::Sticky, "evt").unwrap();
        kernel.signal_event(event).unwrap();
        kernel.signal_event(event).unwrap();
        assert!(kernel.event_signaled(event).unwrap());
    }
}

//! Thread collaborator interface
//!
//! CPU time-slicing and context switching live outside this crate; the
//! synchronization core consumes only the fields and operations modeled
//! here: a priority, a coarse status, the set of objects a blocked thread
//! is waiting on, and the mailbox through which wait results reach the
//! guest. Threads are themselves wait objects so join-style waits work.

use crate::hle::COMMAND_BUFFER_WORDS;
use crate::object::{KernelObject, ObjectId};
use crate::wait_object::WaitList;
use crate::Kernel;
use kernel_types::{KernelError, ResultCode, RESULT_SUCCESS};
use serde::{Deserialize, Serialize};

/// Most urgent priority.
pub const THREADPRIO_HIGHEST: u32 = 0;
/// Default priority for new threads.
pub const THREADPRIO_DEFAULT: u32 = 48;
/// Least urgent priority.
pub const THREADPRIO_LOWEST: u32 = 63;

/// Coarse thread state, as visible to the synchronization core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadStatus {
    /// Currently executing on the single logical executor.
    Running,
    /// Runnable; the external scheduler will pick it up.
    Ready,
    /// Blocked on one or more wait objects.
    WaitSync,
    /// Created but not yet started.
    Dormant,
    /// Exited; never scheduled again.
    Dead,
}

/// What a blocked thread is waiting for.
///
/// The wait-any / wait-all policies are structurally distinct variants
/// rather than a flag beside a shared list, so each wakeup algorithm can be
/// exercised on its own.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WaitDescriptor {
    /// Not waiting.
    #[default]
    None,
    /// Resumes when any one of the objects is acquirable.
    Any(Vec<ObjectId>),
    /// Resumes only when every object is acquirable at once.
    All(Vec<ObjectId>),
}

impl WaitDescriptor {
    /// The awaited objects, in wait order. Empty when not waiting.
    pub fn objects(&self) -> &[ObjectId] {
        match self {
            WaitDescriptor::None => &[],
            WaitDescriptor::Any(objects) | WaitDescriptor::All(objects) => objects,
        }
    }

    pub fn is_wait_all(&self) -> bool {
        matches!(self, WaitDescriptor::All(_))
    }

    /// Position of `object` in the awaited set, for output-index reporting.
    pub fn index_of(&self, object: ObjectId) -> Option<usize> {
        self.objects().iter().position(|&o| o == object)
    }
}

/// Externally scheduled guest thread, as seen by the synchronization core.
#[derive(Debug)]
pub struct Thread {
    pub(crate) name: String,
    /// Lower value = more urgent.
    pub(crate) priority: u32,
    pub(crate) status: ThreadStatus,
    pub(crate) wait: WaitDescriptor,
    /// Whether the in-flight wait asked for the index of the object that
    /// satisfied it (wait-any over several handles).
    pub(crate) wants_output: bool,
    /// Result delivered by the last completed wait.
    pub(crate) wait_result: ResultCode,
    /// Output index delivered by the last completed wait-any, if requested.
    pub(crate) wait_output: Option<usize>,
    /// Fixed per-thread IPC command buffer. The kernel never interprets it.
    pub(crate) command_buffer: [u32; COMMAND_BUFFER_WORDS],
    /// Threads blocked joining on this one.
    pub(crate) joiners: WaitList,
}

impl Kernel {
    /// Creates a thread in the `Ready` state. The caller owns the returned
    /// creation reference.
    pub fn create_thread(&mut self, name: &str, priority: u32) -> Result<ObjectId, KernelError> {
        if priority > THREADPRIO_LOWEST {
            return Err(KernelError::OutOfRange(format!(
                "thread priority {priority} exceeds {THREADPRIO_LOWEST}"
            )));
        }
        let thread = Thread {
            name: name.to_string(),
            priority,
            status: ThreadStatus::Ready,
            wait: WaitDescriptor::None,
            wants_output: false,
            wait_result: RESULT_SUCCESS,
            wait_output: None,
            command_buffer: [0; COMMAND_BUFFER_WORDS],
            joiners: WaitList::new(),
        };
        Ok(self.objects.insert(KernelObject::Thread(thread)))
    }

    /// Transitions a thread to `WaitSync` on the objects in `descriptor`,
    /// registering it on each object's wait list.
    pub fn block_thread(
        &mut self,
        thread: ObjectId,
        descriptor: WaitDescriptor,
        wants_output: bool,
    ) -> Result<(), KernelError> {
        let objects = descriptor.objects().to_vec();
        {
            let state = self.thread_mut(thread)?;
            state.status = ThreadStatus::WaitSync;
            state.wait = descriptor;
            state.wants_output = wants_output;
            state.wait_output = None;
        }
        for object in objects {
            self.add_waiting_thread(object, thread);
        }
        Ok(())
    }

    /// Wakes a thread blocked in `WaitSync`. Idempotent for threads that
    /// are not blocked. The wait descriptor is cleared; stale wait-list
    /// memberships are purged lazily by the wakeup algorithm.
    pub fn resume_from_wait(&mut self, thread: ObjectId) {
        if let Ok(state) = self.thread_mut(thread) {
            if state.status == ThreadStatus::WaitSync {
                state.status = ThreadStatus::Ready;
                state.wait = WaitDescriptor::None;
                state.wants_output = false;
            }
        }
    }

    /// Marks a thread dead, detaches it from everything it was waiting on,
    /// and wakes any threads joined on it.
    pub fn exit_thread(&mut self, thread: ObjectId) -> Result<(), KernelError> {
        let waited = {
            let state = self.thread_mut(thread)?;
            state.status = ThreadStatus::Dead;
            let waited = state.wait.objects().to_vec();
            state.wait = WaitDescriptor::None;
            waited
        };
        for object in waited {
            self.remove_waiting_thread(object, thread);
        }
        self.wakeup_all_waiting_threads(thread);
        Ok(())
    }

    /// Stores the result the guest observes for its completed wait.
    pub fn set_wait_synchronization_result(&mut self, thread: ObjectId, result: ResultCode) {
        if let Ok(state) = self.thread_mut(thread) {
            state.wait_result = result;
        }
    }

    /// Stores the index of the object that satisfied a wait-any.
    pub fn set_wait_synchronization_output(&mut self, thread: ObjectId, index: usize) {
        if let Ok(state) = self.thread_mut(thread) {
            state.wait_output = Some(index);
        }
    }

    pub fn set_thread_priority(
        &mut self,
        thread: ObjectId,
        priority: u32,
    ) -> Result<(), KernelError> {
        if priority > THREADPRIO_LOWEST {
            return Err(KernelError::OutOfRange(format!(
                "thread priority {priority} exceeds {THREADPRIO_LOWEST}"
            )));
        }
        self.thread_mut(thread)?.priority = priority;
        Ok(())
    }

    pub fn thread_status(&self, thread: ObjectId) -> Result<ThreadStatus, KernelError> {
        Ok(self.thread(thread)?.status)
    }

    pub fn thread_priority(&self, thread: ObjectId) -> Result<u32, KernelError> {
        Ok(self.thread(thread)?.priority)
    }

    /// Result of the thread's last completed wait.
    pub fn thread_wait_result(&self, thread: ObjectId) -> Result<ResultCode, KernelError> {
        Ok(self.thread(thread)?.wait_result)
    }

    /// Output index of the thread's last completed wait-any, if reported.
    pub fn thread_wait_output(&self, thread: ObjectId) -> Result<Option<usize>, KernelError> {
        Ok(self.thread(thread)?.wait_output)
    }
}
